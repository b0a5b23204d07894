//! request
//!
//! One-shot operations with cancellation. `Status` is a bitflag set rather than a plain enum so
//! `cancel` can peek-and-claim the active slot with `fetch_and` instead of a CAS loop — see
//! `Work::queue` in `work.rs` for the trick this buys.

pub mod work;

pub use work::Work;

use bitflags::bitflags;
use std::sync::atomic::{AtomicU32, Ordering};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Status: u32 {
        const PENDING   = 0b0000;
        const IDLE      = 0b0001;
        const ACTIVE    = 0b0010;
        const CANCELLED = 0b0100;
        const FINISHED  = 0b1000;
    }
}

/// Shared state machine backing every one-shot request. PENDING=0, IDLE=1, ACTIVE=2,
/// CANCELLED=4, FINISHED=8. Legal transitions: IDLE -> PENDING (submit) -> ACTIVE (worker
/// entered) -> FINISHED; IDLE|PENDING -> CANCELLED. ACTIVE -> CANCELLED is forbidden.
#[derive(Debug, Default)]
pub struct RequestState {
    status: AtomicU32,
}

impl RequestState {
    pub fn new() -> Self {
        Self {
            status: AtomicU32::new(Status::IDLE.bits()),
        }
    }

    pub fn status(&self) -> Status {
        Status::from_bits_truncate(self.status.load(Ordering::Acquire))
    }

    pub fn set(&self, status: Status) {
        self.status.store(status.bits(), Ordering::Release);
    }

    /// The submission-side claim: clear everything but ACTIVE, returning the status observed
    /// *before* the clear. If the prior status already had ACTIVE set, the caller lost the
    /// race (a double `queue` on the same request) and must back off with `Busy`. Otherwise the
    /// slot is now effectively PENDING (zero) — the actual PENDING -> ACTIVE transition happens
    /// later, on the pool thread, via [`try_activate`](Self::try_activate).
    pub fn claim_active(&self) -> Status {
        let prev = self.status.fetch_and(Status::ACTIVE.bits(), Ordering::AcqRel);
        Status::from_bits_truncate(prev)
    }

    /// The worker-side transition: PENDING (zero) -> ACTIVE. Fails (returns `false`) if the
    /// request was cancelled between submission and the worker actually starting, in which case
    /// the caller must not run the work closure.
    pub fn try_activate(&self) -> bool {
        self.status
            .compare_exchange(
                Status::PENDING.bits(),
                Status::ACTIVE.bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Best-effort cancellation. Succeeds only from IDLE or PENDING; fails with `false` (maps
    /// to `Error::Busy`) if the request already transitioned to ACTIVE.
    pub fn try_cancel(&self) -> bool {
        self.status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                let current = Status::from_bits_truncate(bits);
                if current.intersects(Status::ACTIVE | Status::FINISHED | Status::CANCELLED) {
                    None
                } else {
                    Some(Status::CANCELLED.bits())
                }
            })
            .is_ok()
    }
}
