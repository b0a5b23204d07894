//! config
//!
//! All tuning knobs are environment-variable driven and parsed once, mirroring the
//! `UV_*` family of environment variables the original engine exposes.

use crate::futures::LaunchPolicy;
use std::{sync::OnceLock, time::Duration};

/// Default buffer size for I/O wrappers, see `UV_READ_BUFFER_SIZE`. Not used by the core
/// directly, documented here for callers building I/O wrappers on top of this crate.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 16384;

/// Default buffer size for I/O wrappers, see `UV_WRITE_BUFFER_SIZE`.
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 16384;

/// Default capacity for the lock-free task queue backend, if selected.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

/// Number of worker threads backing every `Work` threadpool offload.
///
/// Parses `UV_THREADPOOL_SIZE` once, clamped to `[1, 128]`, defaulting to 4.
pub fn threadpool_size() -> usize {
    static SIZE: OnceLock<usize> = OnceLock::new();
    *SIZE.get_or_init(|| {
        std::env::var("UV_THREADPOOL_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|v| v.clamp(1, 128))
            .unwrap_or(4)
    })
}

/// Idle sleep used by `Loop::run_forever` between iterations that found nothing pending.
///
/// Parses `UV_DEFAULT_LOOP_SLEEP` (milliseconds) once, defaulting to 1ms.
pub fn default_loop_sleep() -> Duration {
    static SLEEP: OnceLock<Duration> = OnceLock::new();
    *SLEEP.get_or_init(|| {
        let ms = std::env::var("UV_DEFAULT_LOOP_SLEEP")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1);
        Duration::from_millis(ms)
    })
}

/// Default launch policy used by `then` when none is given explicitly.
///
/// Parses `UV_ASYNC_LAUNCH` once: one of `"deferred"`, `"async"`, `"detached"`. Unrecognized
/// or absent values fall back to [`LaunchPolicy::Auto`].
pub fn async_launch_policy() -> LaunchPolicy {
    static POLICY: OnceLock<LaunchPolicy> = OnceLock::new();
    *POLICY.get_or_init(|| match std::env::var("UV_ASYNC_LAUNCH").as_deref() {
        Ok("deferred") => LaunchPolicy::Deferred,
        Ok("async") => LaunchPolicy::Async,
        Ok("detached") => LaunchPolicy::Detached,
        _ => LaunchPolicy::Auto,
    })
}
