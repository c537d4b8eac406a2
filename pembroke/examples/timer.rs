//! Example: one-shot and repeating timers on a Pembroke reactor

use pembroke::event::{Cancellable, DelayedEvent, TimerEvent};
use pembroke::logging::{self, Level};
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

fn main() {
    logging::register_handler(|level: Level, message: &str| {
        eprintln!("[{level}] {message}");
    })
    .expect("no other logger installed");

    let reactor = pembroke::reactor().build().expect("reactor");
    let start = Instant::now();

    // Tick every 250ms
    let ticks = Rc::new(Cell::new(0));
    let ticker = TimerEvent::new(Duration::from_millis(250), {
        let ticks = ticks.clone();
        move || {
            ticks.set(ticks.get() + 1);
            println!("tick {} at {:?}", ticks.get(), start.elapsed());
        }
    });

    // Stop the ticker after one second, then stop the loop
    let handle = reactor.handle();
    let stopper = DelayedEvent::new(Duration::from_secs(1), {
        let ticker = ticker.clone();
        move || {
            ticker.cancel();
            handle.stop();
        }
    });

    reactor.register(&ticker);
    reactor.register(&stopper);
    reactor.run_blocking();

    println!("ticked {} times in {:?}", ticks.get(), start.elapsed());
}
