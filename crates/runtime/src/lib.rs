//! A cooperative, single-threaded event loop core: typed handles, one-shot requests, and the
//! futures that bridge them to application code.
//!
//! The loop itself never blocks application callbacks against I/O — blocking work goes through
//! [`request::Work`] on a threadpool, cross-thread wakeups go through [`handle::Async`], and
//! every public fallible operation returns [`error::Result`].

pub mod config;
pub mod continuation;
pub mod error;
pub mod event_loop;
pub mod fs;
pub mod futures;
pub mod handle;
pub mod registry;
pub mod request;

mod engine;

pub use error::{Error, Result};
pub use event_loop::{Loop, RunMode};
pub use fs::Filesystem;
pub use handle::{Async, Check, Idle, Prepare, Signal, Timer};
pub use request::Work;
