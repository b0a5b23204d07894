//! timers
//!
//! Runs a repeating timer and a one-shot timer side by side and stops the loop once the
//! one-shot fires — the same "periodic timer racing a stop timer" shape as the teacher's
//! `examples/timers.rs`, rewritten against this crate's `Timer` handle instead of `TimerPool`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
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

    info!("starting timer demo");

    let l = Loop::make();

    let ticks = Arc::new(AtomicUsize::new(0));
    let ticks_cb = Arc::clone(&ticks);
    let periodic = l.timer();
    periodic
        .start(
            move |_| {
                let n = ticks_cb.fetch_add(1, Ordering::SeqCst) + 1;
                info!(n, "periodic timer fired");
            },
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
        .expect("periodic timer start");

    let stop_timer = l.timer();
    let l_stop = l.clone();
    stop_timer
        .start(
            move |_| {
                info!("stop timer fired, shutting down");
                l_stop.stop();
            },
            Duration::from_millis(2500),
            Duration::ZERO,
        )
        .expect("stop timer start");

    info!("please wait 2.5s for periodic 500ms ticks");
    l.run_forever(Duration::from_millis(5), RunMode::NoWait);

    info!(total = ticks.load(Ordering::SeqCst), "all done");
}
