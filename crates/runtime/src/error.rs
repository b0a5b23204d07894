//! error

use std::{any::Any, fmt, io, sync::Arc};

/// The uniform error value returned by every fallible operation in this crate.
///
/// Mirrors the source design's split between an engine-reported error code and a
/// framework-synthesized condition: [`Error::Engine`] wraps whatever the underlying
/// poller/threadpool surfaced, everything else is raised by this crate itself.
#[derive(Clone)]
pub enum Error {
    /// An error surfaced by the underlying engine (poller, timer heap, threadpool).
    Engine(Arc<io::Error>),
    /// An engine-mutating call was made from a thread other than the loop's affinity thread.
    WrongThread,
    /// `close` was called on a handle that is already closing or closed.
    ClosedAlready,
    /// The `Loop` owning this handle/request has been dropped.
    LoopExpired,
    /// `send` was called on an `Async` handle that has been closed.
    AsyncClosed,
    /// The request/handle is not in a state that permits the requested operation.
    InvalidState,
    /// The requested capability is not implemented on this platform.
    NotImplemented,
    /// The request or work slot is busy (e.g. cancelling an in-flight `Work`).
    Busy,
    /// The request was cancelled.
    Cancelled,
    /// A user callback panicked; the payload's message, if recoverable.
    Panic(String),
}

impl Error {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "callback panicked with a non-string payload".to_string()
        };
        Error::Panic(msg)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Engine(e) => write!(f, "engine error => {e}"),
            Error::WrongThread => write!(f, "called from a thread other than the loop's affinity thread"),
            Error::ClosedAlready => write!(f, "handle already closing or closed"),
            Error::LoopExpired => write!(f, "owning loop has been destroyed"),
            Error::AsyncClosed => write!(f, "async handle closed"),
            Error::InvalidState => write!(f, "invalid state"),
            Error::NotImplemented => write!(f, "not implemented"),
            Error::Busy => write!(f, "busy"),
            Error::Cancelled => write!(f, "cancelled"),
            Error::Panic(msg) => write!(f, "callback panicked => {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::Engine(Arc::new(value))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
