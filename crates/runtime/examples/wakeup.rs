//! wakeup
//!
//! Demonstrates the cross-thread `Async` wakeup and `Loop::schedule`: a background thread pushes
//! work onto a loop running on the main thread, and reads the result back through the returned
//! future — the two core paths described in §4.1 and §4.4.

use std::thread;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, prelude::*};
use uvrt::event_loop::RunMode;
use uvrt::Loop;

fn main() {
    let stdout = fmt::layer()
        .compact()
        .with_ansi(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false)
        .with_target(true);
    tracing_subscriber::registry()
        .with(stdout)
        .with(LevelFilter::TRACE)
        .init();

    let l = Loop::make();

    let wakeup = l.async_handle(|n: i32| {
        info!(n, "wakeup callback running on the loop thread");
        n * n
    });

    let l_runner = l.clone();
    let runner = thread::spawn(move || {
        l_runner.run_forever(Duration::from_millis(5), RunMode::NoWait);
    });

    let sender_wakeup = wakeup.clone();
    let sender = thread::spawn(move || {
        for n in 0..5 {
            let square = futures::executor::block_on(sender_wakeup.send(n)).unwrap();
            info!(n, square, "send resolved");
        }
    });
    sender.join().unwrap();

    let fut = l.schedule(|| "hello from the loop thread".to_string());
    let greeting = futures::executor::block_on(fut).unwrap();
    info!(greeting, "schedule resolved");

    l.stop();
    runner.join().unwrap();
}
