//! engine
//!
//! The concrete binding for the "platform event-loop engine" black box (§2.1): a fixed-size
//! threadpool fed by a `crossbeam::channel`, and a min-heap timer wheel. `mio::Poll`/`mio::Waker`
//! live directly on `Loop` rather than here, since the loop's run method needs to own the poll
//! instance across iterations; everything in this module is the part of the "engine" that has
//! no reason to touch the poller.

use std::{
    cmp::Reverse,
    collections::BinaryHeap,
    thread::{self, JoinHandle},
    time::Instant,
};

use crossbeam::channel::{self, Sender};

use crate::registry::HandleId;

pub(crate) type Job = Box<dyn FnOnce() + Send>;

/// A fixed-size worker pool. Every `Work` submission and every filesystem operation in this
/// crate funnels through one of these.
pub(crate) struct Threadpool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl Threadpool {
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = channel::unbounded::<Job>();
        let workers = (0..size)
            .map(|idx| {
                let receiver = receiver.clone();
                thread::Builder::new()
                    .name(format!("uvrt-pool-{idx}"))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            job();
                        }
                    })
                    .expect("failed to spawn threadpool worker thread")
            })
            .collect();
        Self {
            sender: Some(sender),
            workers,
        }
    }

    pub fn submit(&self, job: Job) {
        if let Some(sender) = self.sender.as_ref() {
            let _ = sender.send(job);
        }
    }
}

impl Drop for Threadpool {
    fn drop(&mut self) {
        // Dropping the sender closes the channel; workers exit their `recv` loop and we join.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// One scheduled firing of a `Timer` handle.
struct TimerEntry {
    deadline: Instant,
    seq: u64,
    id: HandleId,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}
impl Eq for TimerEntry {}
impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

/// A min-heap of pending timer deadlines, keyed by handle id so a timer can be cancelled by
/// simply ignoring its entry once it surfaces (the `Timer` handle's own `active` flag gates
/// whether a popped entry still fires).
#[derive(Default)]
pub(crate) struct TimerHeap {
    heap: BinaryHeap<Reverse<TimerEntry>>,
    seq: u64,
}

impl TimerHeap {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    pub fn push(&mut self, id: HandleId, deadline: Instant) {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        self.heap.push(Reverse(TimerEntry { deadline, seq, id }));
    }

    /// Returns the wait duration until the earliest deadline, or `None` if the heap is empty.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(entry)| entry.deadline)
    }

    /// Pop every entry whose deadline has passed, oldest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<HandleId> {
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.deadline > now {
                break;
            }
            let Reverse(entry) = self.heap.pop().unwrap();
            due.push(entry.id);
        }
        due
    }
}

#[cfg(unix)]
pub(crate) mod signals {
    use signal_hook::iterator::{Handle, Signals};
    use std::{io, thread};

    /// Bridges OS signal delivery onto a background thread and into an arbitrary dispatch
    /// closure, so the loop thread never touches a signal mask directly (see §2.1).
    pub(crate) struct SignalBridge {
        handle: Handle,
        _thread: thread::JoinHandle<()>,
    }

    impl SignalBridge {
        pub fn spawn(dispatch: impl Fn(i32) + Send + Sync + 'static) -> io::Result<Self> {
            let signals = Signals::new(std::iter::empty::<i32>())?;
            let handle = signals.handle();
            let thread = thread::Builder::new()
                .name("uvrt-signals".into())
                .spawn(move || {
                    for signal in signals.forever() {
                        dispatch(signal);
                    }
                })?;
            Ok(Self {
                handle,
                _thread: thread,
            })
        }

        pub fn add_signal(&self, signum: i32) -> io::Result<()> {
            self.handle.add_signal(signum)
        }
    }

    impl Drop for SignalBridge {
        fn drop(&mut self) {
            self.handle.close();
        }
    }
}
