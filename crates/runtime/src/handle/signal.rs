//! signal

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Error, Result};
use crate::event_loop::Loop;
use crate::futures::BoxFuture;
use crate::registry::HandleId;

pub(crate) struct SignalInner {
    pub(crate) id: HandleId,
    signum: Mutex<Option<i32>>,
    callback: Mutex<Option<Box<dyn FnMut(i32) + Send>>>,
    closing: AtomicBool,
}

impl SignalInner {
    pub(crate) fn fire(&self, signum: i32) {
        let mut guard = self.callback.lock();
        if let Some(cb) = guard.as_mut() {
            cb(signum);
        }
    }

    pub(crate) fn signum(&self) -> Option<i32> {
        *self.signum.lock()
    }
}

/// Delivers an OS signal to a callback on the loop thread. Bridged from a dedicated background
/// thread running `signal_hook::iterator::Signals` (§2.1) — the loop thread itself never
/// touches a signal mask.
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
    loop_: Loop,
}

impl Signal {
    pub(crate) fn new(loop_: Loop) -> Self {
        let id = loop_.registry().reserve();
        let inner = Arc::new(SignalInner {
            id,
            signum: Mutex::new(None),
            callback: Mutex::new(None),
            closing: AtomicBool::new(false),
        });
        loop_.register_signal(Arc::clone(&inner));
        Self { inner, loop_ }
    }

    pub fn start(&self, signum: i32, f: impl FnMut(Signal, i32) + Send + 'static) -> Result<()> {
        self.loop_.assert_affinity()?;
        self.loop_.bridge_signal(self.inner.id, signum)?;
        *self.inner.signum.lock() = Some(signum);
        let this = self.clone();
        let mut f = f;
        *self.inner.callback.lock() = Some(Box::new(move |n| f(this.clone(), n)));
        trace!(id = ?self.inner.id, signum, "signal started");
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.loop_.assert_affinity()?;
        *self.inner.callback.lock() = None;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.inner.callback.lock().is_some()
    }

    pub fn is_closing(&self) -> bool {
        self.inner.closing.load(Ordering::Acquire)
    }

    pub fn close(&self, f: impl FnOnce(Signal) + Send + 'static) -> BoxFuture<'static, Result<()>> {
        if self.inner.closing.swap(true, Ordering::AcqRel) {
            return crate::futures::errored(Error::ClosedAlready);
        }
        *self.inner.callback.lock() = None;
        let this = self.clone();
        self.loop_.unregister_signal(self.inner.id);
        trace!(id = ?self.inner.id, "signal closing");
        Box::pin(async move {
            f(this);
            Ok(())
        })
    }
}

/// Best-effort signal name lookup (§6 "Signal-name lookup"). The engine black box this crate is
/// grounded on (libuv) falls back to its own table on platforms without `strsignal`; since Rust's
/// standard library exposes no `strsignal` binding at all, this crate always uses its own table,
/// built from the `libc::SIG*` constants already pulled in for `signal_hook`.
#[cfg(unix)]
pub fn signame(signum: i32) -> &'static str {
    match signum {
        libc::SIGHUP => "SIGHUP",
        libc::SIGINT => "SIGINT",
        libc::SIGQUIT => "SIGQUIT",
        libc::SIGILL => "SIGILL",
        libc::SIGTRAP => "SIGTRAP",
        libc::SIGABRT => "SIGABRT",
        libc::SIGBUS => "SIGBUS",
        libc::SIGFPE => "SIGFPE",
        libc::SIGKILL => "SIGKILL",
        libc::SIGUSR1 => "SIGUSR1",
        libc::SIGSEGV => "SIGSEGV",
        libc::SIGUSR2 => "SIGUSR2",
        libc::SIGPIPE => "SIGPIPE",
        libc::SIGALRM => "SIGALRM",
        libc::SIGTERM => "SIGTERM",
        libc::SIGCHLD => "SIGCHLD",
        libc::SIGCONT => "SIGCONT",
        libc::SIGSTOP => "SIGSTOP",
        libc::SIGTSTP => "SIGTSTP",
        libc::SIGTTIN => "SIGTTIN",
        libc::SIGTTOU => "SIGTTOU",
        libc::SIGURG => "SIGURG",
        libc::SIGXCPU => "SIGXCPU",
        libc::SIGXFSZ => "SIGXFSZ",
        libc::SIGVTALRM => "SIGVTALRM",
        libc::SIGPROF => "SIGPROF",
        libc::SIGWINCH => "SIGWINCH",
        libc::SIGIO => "SIGIO",
        libc::SIGSYS => "SIGSYS",
        _ => "UNKNOWN",
    }
}

/// Non-unix platforms have no signal delivery bridge (`Signal::start` returns
/// [`Error::NotImplemented`]); the lookup table still answers so callers that only format a
/// signum for logging don't need to `cfg`-gate their own code.
#[cfg(not(unix))]
pub fn signame(_signum: i32) -> &'static str {
    "UNKNOWN"
}

#[cfg(all(test, unix))]
mod signame_tests {
    use super::signame;

    #[test]
    fn known_signals_are_uppercase_and_named() {
        for signum in [libc::SIGHUP, libc::SIGINT, libc::SIGTERM, libc::SIGUSR1] {
            let name = signame(signum);
            assert!(!name.is_empty());
            assert_eq!(name, name.to_uppercase());
            assert_ne!(name, "UNKNOWN");
        }
    }

    #[test]
    fn unknown_signal_falls_back() {
        assert_eq!(signame(9999), "UNKNOWN");
    }
}
