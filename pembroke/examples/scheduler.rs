//! Example: scheduling tasks and canceling them

use pembroke::{Task, TaskContext};
use std::time::Duration;

fn main() {
    let reactor = pembroke::reactor().build().expect("reactor");
    let scheduler = reactor.scheduler();

    // Runs forever until canceled below
    let heartbeat = scheduler.repeat(
        || println!("heartbeat"),
        Duration::ZERO,
        Duration::from_millis(200),
    );

    // Stops itself on the fourth run
    scheduler.repeat(
        Task::with_context(|ctx: &mut TaskContext| {
            println!("countdown run {}", ctx.iteration());
            if ctx.iteration() == 4 {
                ctx.cancel();
            }
        }),
        Duration::from_millis(50),
        Duration::from_millis(100),
    );

    // Three retries, 150ms apart
    scheduler.repeat_n(
        || println!("retrying"),
        Duration::ZERO,
        Duration::from_millis(150),
        3,
    );

    let handle = reactor.handle();
    scheduler.once(
        move || {
            println!("shutting down");
            heartbeat.cancel();
            handle.stop();
        },
        Duration::from_secs(1),
    );

    reactor.run_blocking();
}
