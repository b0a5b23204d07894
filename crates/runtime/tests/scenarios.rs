//! Black-box end-to-end scenarios (§8), run against the public API only — no `pub(crate)`
//! access, mirroring the teacher's `tests/work.rs` convention of one file per concern.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::executor::block_on;
use uvrt::error::Error;
use uvrt::event_loop::RunMode;
use uvrt::futures::{ready, then_nested};
use uvrt::Loop;

/// S1 — scheduler round trip: a closure submitted from another thread runs on the loop thread
/// and its result is observed back on the caller's thread.
#[test]
fn scheduler_round_trip() {
    let l = Loop::make();
    let stop = Arc::new(AtomicBool::new(false));
    let l2 = l.clone();
    let stop2 = Arc::clone(&stop);
    let runner = std::thread::spawn(move || {
        while !stop2.load(Ordering::SeqCst) {
            l2.run(RunMode::NoWait);
            std::thread::sleep(Duration::from_millis(1));
        }
    });

    let fut = l.schedule(|| 42);
    let value = block_on(fut).unwrap();
    assert_eq!(value, 42);

    stop.store(true, Ordering::SeqCst);
    runner.join().unwrap();
}

/// S2 — async coalescing: two sends issued back to back without yielding both resolve, and the
/// callback is observed to have run at least once.
#[test]
fn async_coalescing_both_sends_resolve() {
    let l = Loop::make();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = Arc::clone(&calls);
    let a = l.async_handle(move |n: i32| {
        calls2.fetch_add(1, Ordering::SeqCst);
        n * 2
    });

    let stop = Arc::new(AtomicBool::new(false));
    let l2 = l.clone();
    let stop2 = Arc::clone(&stop);
    let runner = std::thread::spawn(move || {
        while !stop2.load(Ordering::SeqCst) {
            l2.run(RunMode::NoWait);
            std::thread::sleep(Duration::from_millis(1));
        }
    });

    let fut_a = a.send(3);
    let fut_b = a.send(4);
    assert_eq!(block_on(fut_a).unwrap(), 6);
    assert_eq!(block_on(fut_b).unwrap(), 8);
    assert!(calls.load(Ordering::SeqCst) >= 1);

    stop.store(true, Ordering::SeqCst);
    runner.join().unwrap();
}

/// S3 — timer repeat then close: a 10ms/20ms repeating timer fires at least 4 times across
/// 100ms of wall clock, and closing it both runs the close continuation and rejects a second
/// close with `ClosedAlready`.
#[test]
fn timer_repeats_then_close_is_idempotent() {
    let l = Loop::make();
    let t = l.timer();
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    t.start(
        move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        },
        Duration::from_millis(10),
        Duration::from_millis(20),
    )
    .unwrap();

    let deadline = Instant::now() + Duration::from_millis(100);
    while Instant::now() < deadline {
        l.run(RunMode::NoWait);
        std::thread::sleep(Duration::from_millis(1));
    }

    assert!(count.load(Ordering::SeqCst) >= 4);

    let flag = Arc::new(AtomicUsize::new(0));
    let flag2 = Arc::clone(&flag);
    let first_close = t.close(move |_| {
        flag2.store(1, Ordering::SeqCst);
    });
    block_on(first_close).unwrap();
    assert_eq!(flag.load(Ordering::SeqCst), 1);

    let second_close = t.close(|_| {});
    assert!(matches!(block_on(second_close), Err(Error::ClosedAlready)));
}

/// S4 — work error propagation: a panicking closure surfaces `Error::Panic` without poisoning
/// the loop, and a subsequent `queue` on a fresh `Work` still succeeds.
#[test]
fn work_panic_does_not_poison_loop() {
    let l = Loop::make();
    let w = l.work();
    let fut = w.queue(|| -> i32 { panic!("boom") });
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        l.run(RunMode::NoWait);
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(matches!(block_on(fut), Err(Error::Panic(_))));

    let w2 = l.work();
    let fut2 = w2.queue(|| 7);
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        l.run(RunMode::NoWait);
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(block_on(fut2).unwrap(), 7);
}

/// S5 — cancellation race, first half: cancelling before the worker claims ACTIVE succeeds and
/// the result future rejects with `Cancelled`. Deterministic: every pool worker is saturated
/// with a job that blocks on a shared flag, so the job under test cannot be dequeued — let
/// alone claim ACTIVE — until this test releases them.
#[test]
fn cancel_before_active_rejects_with_cancelled() {
    let l = Loop::make();
    let release = Arc::new(AtomicUsize::new(0));

    let blockers: Vec<_> = (0..uvrt::config::threadpool_size())
        .map(|_| {
            let release = Arc::clone(&release);
            let bw = l.work();
            let bf = bw.queue(move || {
                while release.load(Ordering::SeqCst) == 0 {
                    std::thread::sleep(Duration::from_millis(1));
                }
            });
            (bw, bf)
        })
        .collect();

    let w = l.work();
    let fut = w.queue(|| 9);

    assert!(
        block_on(w.cancel()).is_ok(),
        "cancel should succeed while every pool worker is still busy with a blocker job"
    );

    release.store(1, Ordering::SeqCst);
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        l.run(RunMode::NoWait);
        std::thread::sleep(Duration::from_millis(1));
    }

    assert!(matches!(block_on(fut), Err(Error::Cancelled)));
    for (_, bf) in blockers {
        let _ = block_on(bf);
    }
}

/// S5 — cancellation race, second half: cancelling once the worker has claimed ACTIVE fails
/// with `Busy`, and the original result still resolves. Deterministic: the worker closure flips
/// a flag as its first statement, so the test thread only calls `cancel` once it has observed
/// that flag — by which point `try_activate` has already run.
#[test]
fn cancel_after_active_fails_busy_but_result_still_resolves() {
    let l = Loop::make();
    let w = l.work();
    let started = Arc::new(AtomicUsize::new(0));
    let started2 = Arc::clone(&started);
    let fut = w.queue(move || {
        started2.store(1, Ordering::SeqCst);
        9
    });

    let deadline = Instant::now() + Duration::from_secs(2);
    while started.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        l.run(RunMode::NoWait);
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(started.load(Ordering::SeqCst), 1, "worker closure never started");

    assert!(matches!(block_on(w.cancel()), Err(Error::Busy)));

    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        l.run(RunMode::NoWait);
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(block_on(fut).unwrap(), 9);
}

/// S6 — recursive future collapse: `then_nested` on a future-of-a-future resolves to the same
/// value as manually unwrapping both layers.
#[test]
fn then_nested_collapses_future_of_future() {
    let p = ready(ready(5));
    let out = block_on(then_nested(p, |x| ready(x + 1)));
    assert_eq!(out, 6);
}
