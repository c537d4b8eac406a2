use pembroke::event::DelayedEvent;
use pembroke::{ConfigurationError, Features, LoopState, Reactor};
use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

fn build() -> Reactor {
    pembroke::reactor().build().expect("reactor should build with default features")
}

#[test]
fn test_default_builder_requests_every_feature() {
    let builder = pembroke::reactor();
    assert_eq!(builder.requested(), Features::all());

    let reactor = builder.build().expect("default features should be supported");
    assert_eq!(reactor.features(), Features::all());
}

#[test]
fn test_builder_can_drop_features() {
    let reactor = Reactor::builder()
        .require_edge_trigger_support(false)
        .require_file_descriptor_support(false)
        .require_early_close_support(false)
        .require_order_one_trigger_support(false)
        .build()
        .expect("an empty feature set is always supported");

    assert_eq!(reactor.features(), Features::none());
}

#[test]
fn test_configuration_error_is_displayable() {
    let err = ConfigurationError::Unsupported(pembroke::Feature::EarlyClose);
    assert_eq!(
        err.to_string(),
        "unable to update reactor config for early-close support"
    );
}

#[test]
fn test_tick_without_timers_returns_immediately() {
    let reactor = build();
    let start = Instant::now();

    assert!(reactor.tick());
    assert!(reactor.tick_fast());

    assert!(
        start.elapsed() < Duration::from_millis(50),
        "Ticking an empty reactor should not block"
    );
    assert_eq!(reactor.state(), LoopState::Idle);
}

#[test]
fn test_stop_while_idle_is_a_noop() {
    let reactor = build();

    assert!(reactor.stop());
    assert_eq!(reactor.state(), LoopState::Idle);

    // A stop request made while idle must not leak into the next drive.
    let fired = Rc::new(Cell::new(false));
    let event = DelayedEvent::new(Duration::ZERO, {
        let fired = fired.clone();
        move || fired.set(true)
    });

    assert!(reactor.register(&event));
    assert!(reactor.tick());
    assert!(fired.get());
}

#[test]
fn test_tick_waits_for_active_batch() {
    let reactor = build();
    let count = Rc::new(Cell::new(0));

    let events: Vec<_> = (0..3)
        .map(|_| {
            let count = count.clone();
            DelayedEvent::new(Duration::ZERO, move || count.set(count.get() + 1))
        })
        .collect();

    for event in &events {
        assert!(reactor.register(event));
    }

    assert!(reactor.tick());
    assert_eq!(count.get(), 3, "The whole active batch should run in one tick");
}

#[test]
fn test_stop_inside_callback_returns_from_run_blocking() {
    let reactor = build();
    let handle = reactor.handle();
    let late = Rc::new(Cell::new(false));

    let stopper = DelayedEvent::new(Duration::from_millis(5), move || {
        handle.stop();
    });
    let later = DelayedEvent::new(Duration::from_secs(60), {
        let late = late.clone();
        move || late.set(true)
    });

    assert!(reactor.register(&stopper));
    assert!(reactor.register(&later));

    assert!(reactor.run_blocking());
    assert_eq!(reactor.state(), LoopState::Stopped);
    assert!(!late.get(), "Later timers must stay pending after a stop");
    assert!(later.is_registered());
    assert_eq!(reactor.pending(), 1);
}

#[test]
fn test_stop_requeues_rest_of_batch() {
    let reactor = build();
    let handle = reactor.handle();
    let count = Rc::new(Cell::new(0));

    let first = DelayedEvent::new(Duration::ZERO, {
        let count = count.clone();
        move || {
            count.set(count.get() + 1);
            handle.stop();
        }
    });
    let second = DelayedEvent::new(Duration::ZERO, {
        let count = count.clone();
        move || count.set(count.get() + 1)
    });

    assert!(reactor.register(&first));
    assert!(reactor.register(&second));

    assert!(reactor.tick());
    assert_eq!(count.get(), 1, "Stop should interrupt the batch");
    assert_eq!(reactor.state(), LoopState::Stopped);

    assert!(reactor.tick());
    assert_eq!(count.get(), 2, "The interrupted batch resumes on the next drive");
    assert_eq!(reactor.state(), LoopState::Idle);
}

#[test]
fn test_reactor_can_be_resumed_after_stop() {
    let reactor = build();
    let runs = Rc::new(Cell::new(0));

    for _ in 0..2 {
        let handle = reactor.handle();
        let runs = runs.clone();
        let event = DelayedEvent::new(Duration::from_millis(1), move || {
            runs.set(runs.get() + 1);
            handle.stop();
        });

        assert!(reactor.register(&event));
        assert!(reactor.run_blocking());
        assert_eq!(reactor.state(), LoopState::Stopped);
    }

    assert_eq!(runs.get(), 2);
}

#[test]
fn test_state_is_running_inside_callbacks() {
    let reactor = build();
    let handle = reactor.handle();
    let seen = Rc::new(Cell::new(None));

    let event = DelayedEvent::new(Duration::ZERO, {
        let seen = seen.clone();
        move || seen.set(handle.state())
    });

    assert!(reactor.register(&event));
    assert!(reactor.tick());
    assert_eq!(seen.get(), Some(LoopState::Running));
    assert_eq!(reactor.state(), LoopState::Idle);
}

#[test]
fn test_driving_from_inside_a_callback_is_rejected() {
    let reactor = Rc::new(build());
    let nested = Rc::new(Cell::new(None));

    let event = DelayedEvent::new(Duration::ZERO, {
        let reactor = reactor.clone();
        let nested = nested.clone();
        move || nested.set(Some(reactor.tick_fast()))
    });

    assert!(reactor.register(&event));
    assert!(reactor.tick());
    assert_eq!(nested.get(), Some(false));
}

#[test]
fn test_handle_outlives_reactor() {
    let reactor = build();
    let handle = reactor.handle();

    assert!(handle.is_alive());
    assert_eq!(handle.state(), Some(LoopState::Idle));

    drop(reactor);

    assert!(!handle.is_alive());
    assert_eq!(handle.state(), None);
    assert!(handle.stop());
}

#[test]
fn test_pending_counts_armed_timers() {
    let reactor = build();
    let event = DelayedEvent::new(Duration::from_millis(1), || {});

    assert_eq!(reactor.pending(), 0);
    assert!(reactor.register(&event));
    assert_eq!(reactor.pending(), 1);

    thread::sleep(Duration::from_millis(5));
    assert!(reactor.tick());
    assert_eq!(reactor.pending(), 0);
}
