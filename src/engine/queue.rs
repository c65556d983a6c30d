//! Serial task queue - the v2 dispatch abstraction.
//!
//! The v2 engine schedules all work through one serial queue (`Hub.Queue`);
//! a typeset call and its completion callback must be appended to that same
//! queue so they run in FIFO order relative to anything the engine already
//! queued. This type models just that contract: enqueue-only, strictly
//! ordered, single-threaded.
//!
//! Tasks run as soon as the queue is free. A task that enqueues more work
//! (reentrant enqueue) does not recurse - the new task is appended and runs
//! after everything already queued, preserving FIFO order.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// A unit of queued engine work.
pub type Task = Box<dyn FnOnce()>;

/// A reentrancy-safe FIFO task queue.
///
/// Thread-confined (`RefCell`-guarded); the scheduling model is one
/// cooperative UI thread, so no locking is needed.
pub struct TaskQueue {
    pending: RefCell<VecDeque<Task>>,
    draining: Cell<bool>,
}

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            pending: RefCell::new(VecDeque::new()),
            draining: Cell::new(false),
        }
    }

    /// Append a task. If the queue is idle it drains immediately; if a
    /// drain is already running (reentrant enqueue from inside a task) the
    /// task simply joins the back of the line.
    pub fn enqueue(&self, task: impl FnOnce() + 'static) {
        self.pending.borrow_mut().push_back(Box::new(task));
        if !self.draining.get() {
            self.drain();
        }
    }

    /// Number of tasks waiting (excluding one currently running).
    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Whether no tasks are waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    fn drain(&self) {
        self.draining.set(true);
        loop {
            // Pop before running so the task can reentrantly enqueue
            // without holding the borrow.
            let next = self.pending.borrow_mut().pop_front();
            match next {
                Some(task) => task(),
                None => break,
            }
        }
        self.draining.set(false);
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
