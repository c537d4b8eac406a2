use pembroke::{Cancelable, Cancellable, Reactor, Task, TaskContext};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::thread;
use std::time::Duration;

fn build() -> Reactor {
    pembroke::reactor().build().expect("reactor")
}

fn drive(reactor: &Reactor, ticks: usize) {
    for _ in 0..ticks {
        thread::sleep(Duration::from_millis(2));
        assert!(reactor.tick());
    }
}

#[test]
fn test_once_runs_exactly_once() {
    let reactor = build();
    let count = Rc::new(Cell::new(0));

    let handle = reactor.scheduler().once(
        {
            let count = count.clone();
            move || count.set(count.get() + 1)
        },
        Duration::ZERO,
    );

    drive(&reactor, 5);

    assert_eq!(count.get(), 1);
    assert_eq!(reactor.pending(), 0);
    assert!(handle.cancel(), "Canceling finished work succeeds");
}

#[test]
fn test_once_canceled_before_firing() {
    let reactor = build();
    let count = Rc::new(Cell::new(0));

    let handle = reactor.scheduler().once(
        {
            let count = count.clone();
            move || count.set(count.get() + 1)
        },
        Duration::from_millis(1),
    );

    assert_eq!(reactor.pending(), 1);
    assert!(handle.cancel());
    assert!(handle.canceled());
    assert_eq!(reactor.pending(), 0);

    drive(&reactor, 3);
    assert_eq!(count.get(), 0);
}

#[test]
fn test_repeat_runs_until_canceled() {
    let reactor = build();
    let count = Rc::new(Cell::new(0));

    let handle = reactor.scheduler().repeat(
        {
            let count = count.clone();
            move || count.set(count.get() + 1)
        },
        Duration::ZERO,
        Duration::from_millis(1),
    );

    drive(&reactor, 4);
    assert_eq!(count.get(), 4);

    assert!(handle.cancel());
    assert!(handle.cancel(), "Cancel is idempotent");
    assert_eq!(reactor.pending(), 0);

    drive(&reactor, 3);
    assert_eq!(count.get(), 4);
}

#[test]
fn test_clones_share_cancellation() {
    let reactor = build();
    let count = Rc::new(Cell::new(0));

    let handle = reactor.scheduler().repeat(
        {
            let count = count.clone();
            move || count.set(count.get() + 1)
        },
        Duration::ZERO,
        Duration::from_millis(1),
    );
    let other = handle.clone();

    drive(&reactor, 1);
    assert!(other.cancel());

    assert!(handle.canceled());
    assert!(handle.cancel());

    drive(&reactor, 3);
    assert_eq!(count.get(), 1);
}

#[test]
fn test_repeat_until_checks_predicate_after_task() {
    let reactor = build();
    let runs = Rc::new(Cell::new(0));
    let checks = Rc::new(RefCell::new(Vec::new()));

    reactor.scheduler().repeat_until(
        {
            let runs = runs.clone();
            move || runs.set(runs.get() + 1)
        },
        Duration::ZERO,
        Duration::from_millis(1),
        {
            let runs = runs.clone();
            let checks = checks.clone();
            move || {
                checks.borrow_mut().push(runs.get());
                runs.get() == 3
            }
        },
    );

    drive(&reactor, 8);

    assert_eq!(runs.get(), 3);
    assert_eq!(*checks.borrow(), vec![1, 2, 3], "The predicate sees each completed run");
    assert_eq!(reactor.pending(), 0);
}

#[test]
fn test_repeat_until_runs_at_least_once() {
    let reactor = build();
    let runs = Rc::new(Cell::new(0));

    reactor.scheduler().repeat_until(
        {
            let runs = runs.clone();
            move || runs.set(runs.get() + 1)
        },
        Duration::ZERO,
        Duration::from_millis(1),
        || true,
    );

    drive(&reactor, 4);
    assert_eq!(runs.get(), 1);
}

#[test]
fn test_panicking_predicate_stops_schedule() {
    let reactor = build();
    let runs = Rc::new(Cell::new(0));

    reactor.scheduler().repeat_until(
        {
            let runs = runs.clone();
            move || runs.set(runs.get() + 1)
        },
        Duration::ZERO,
        Duration::from_millis(1),
        || panic!("predicate failure"),
    );

    drive(&reactor, 4);
    assert_eq!(runs.get(), 1);
    assert_eq!(reactor.pending(), 0);
}

#[test]
fn test_repeat_n_is_bounded() {
    let reactor = build();
    let runs = Rc::new(Cell::new(0));

    reactor.scheduler().repeat_n(
        {
            let runs = runs.clone();
            move || runs.set(runs.get() + 1)
        },
        Duration::ZERO,
        Duration::from_millis(1),
        3,
    );

    drive(&reactor, 8);
    assert_eq!(runs.get(), 3);
    assert_eq!(reactor.pending(), 0);
}

#[test]
fn test_repeat_n_zero_never_runs() {
    let reactor = build();
    let runs = Rc::new(Cell::new(0));

    let handle = reactor.scheduler().repeat_n(
        {
            let runs = runs.clone();
            move || runs.set(runs.get() + 1)
        },
        Duration::ZERO,
        Duration::from_millis(1),
        0,
    );

    assert_eq!(reactor.pending(), 0);
    drive(&reactor, 2);
    assert_eq!(runs.get(), 0);
    assert!(handle.cancel());
}

#[test]
fn test_task_context_reports_iterations_and_cancels() {
    let reactor = build();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let task = Task::with_context({
        let seen = seen.clone();
        move |ctx: &mut TaskContext| {
            seen.borrow_mut().push(ctx.iteration());
            if ctx.iteration() == 2 {
                ctx.cancel();
            }
        }
    });

    reactor
        .scheduler()
        .repeat(task, Duration::ZERO, Duration::from_millis(1));

    drive(&reactor, 6);

    assert_eq!(*seen.borrow(), vec![1, 2]);
    assert_eq!(reactor.pending(), 0);
}

#[test]
fn test_cancel_from_inside_scheduled_task() {
    let reactor = build();
    let runs = Rc::new(Cell::new(0));
    let slot: Rc<RefCell<Option<Cancelable>>> = Rc::new(RefCell::new(None));

    let handle = reactor.scheduler().repeat(
        {
            let runs = runs.clone();
            let slot = slot.clone();
            move || {
                runs.set(runs.get() + 1);
                if runs.get() == 2 {
                    let me = slot.borrow_mut().take();
                    if let Some(me) = me {
                        assert!(me.cancel());
                    }
                }
            }
        },
        Duration::ZERO,
        Duration::from_millis(1),
    );
    *slot.borrow_mut() = Some(handle.clone());

    drive(&reactor, 6);

    assert_eq!(runs.get(), 2);
    assert!(handle.canceled());
    assert_eq!(reactor.pending(), 0);
}

#[test]
fn test_dropping_handle_keeps_schedule_alive() {
    let reactor = build();
    let runs = Rc::new(Cell::new(0));

    let handle = reactor.scheduler().repeat_n(
        {
            let runs = runs.clone();
            move || runs.set(runs.get() + 1)
        },
        Duration::ZERO,
        Duration::from_millis(1),
        2,
    );
    drop(handle);

    drive(&reactor, 5);
    assert_eq!(runs.get(), 2);
}

#[test]
fn test_panicking_task_keeps_repeating() {
    let reactor = build();
    let runs = Rc::new(Cell::new(0));

    let handle = reactor.scheduler().repeat(
        {
            let runs = runs.clone();
            move || {
                runs.set(runs.get() + 1);
                panic!("task failure");
            }
        },
        Duration::ZERO,
        Duration::from_millis(1),
    );

    drive(&reactor, 3);
    assert_eq!(runs.get(), 3);
    assert!(handle.cancel());
}

#[test]
fn test_handle_outliving_reactor() {
    let reactor = build();
    let handle = reactor.scheduler().repeat(|| {}, Duration::ZERO, Duration::from_secs(1));

    drop(reactor);

    assert!(handle.cancel());
    assert!(Cancellable::canceled(&handle));
}

#[test]
fn test_custom_cancelable_runs_once() {
    let calls = Rc::new(Cell::new(0));
    let handle = Cancelable::new({
        let calls = calls.clone();
        move || {
            calls.set(calls.get() + 1);
            false
        }
    });

    assert!(!handle.canceled());
    assert!(!handle.cancel(), "The first cancel reports the closure result");
    assert!(handle.cancel());
    assert!(handle.clone().cancel());
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_fired_once_reports_canceled_like_delayed_event() {
    let reactor = build();
    let handle = reactor.scheduler().once(|| {}, Duration::ZERO);
    let event = pembroke::DelayedEvent::new(Duration::ZERO, || {});

    assert!(!handle.canceled());
    assert!(reactor.register(&event));
    assert!(reactor.tick());

    assert!(handle.canceled(), "A fired one-shot schedule behaves as canceled");
    assert_eq!(Cancellable::canceled(&handle), event.canceled());
    assert!(handle.cancel());
}

#[test]
fn test_finished_repeat_until_reports_canceled() {
    let reactor = build();
    let handle = reactor.scheduler().repeat_until(
        || {},
        Duration::ZERO,
        Duration::from_millis(1),
        || true,
    );

    assert!(!handle.canceled());
    drive(&reactor, 2);
    assert!(handle.canceled());
}

#[test]
fn test_exhausted_repeat_n_reports_canceled() {
    let reactor = build();
    let handle = reactor
        .scheduler()
        .repeat_n(|| {}, Duration::ZERO, Duration::from_millis(1), 2);

    drive(&reactor, 1);
    assert!(!handle.canceled(), "One run is still pending");

    drive(&reactor, 3);
    assert!(handle.canceled());

    let never = reactor
        .scheduler()
        .repeat_n(|| {}, Duration::ZERO, Duration::from_millis(1), 0);
    assert!(never.canceled());
}

#[test]
fn test_running_repeat_is_not_canceled() {
    let reactor = build();
    let handle = reactor
        .scheduler()
        .repeat(|| {}, Duration::ZERO, Duration::from_millis(1));

    drive(&reactor, 3);
    assert!(!handle.canceled());
    assert!(handle.cancel());
    assert!(handle.canceled());
}
