//! Deferred jobs for the simulator
//!
//! Jobs capture `Rc` state, so they never leave the harness thread. Only
//! their ids travel: a tokio timer sleeps, then posts the id back on a
//! channel, and the driver loop runs the job between two commands.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use bth_core::prelude::*;
use tokio::sync::mpsc;

/// Message posted back to the driver loop when a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimMessage {
    Settle(u64),
}

type Job = Box<dyn FnOnce()>;

struct SchedulerInner {
    tx: mpsc::UnboundedSender<SimMessage>,
    next_id: Cell<u64>,
    pending: RefCell<HashMap<u64, Job>>,
}

/// Cheap to clone; clones share the pending jobs.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SimMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            inner: Rc::new(SchedulerInner {
                tx,
                next_id: Cell::new(0),
                pending: RefCell::new(HashMap::new()),
            }),
        };
        (scheduler, rx)
    }

    /// Run `job` on the driver loop once `delay` has elapsed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn after(&self, delay: Duration, job: impl FnOnce() + 'static) -> u64 {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.pending.borrow_mut().insert(id, Box::new(job));

        let tx = self.inner.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(SimMessage::Settle(id)).is_err() {
                debug!("driver gone before job {} settled", id);
            }
        });
        trace!("scheduled job {} in {:?}", id, delay);
        id
    }

    /// Run the job behind `id`. Returns false for unknown or already run ids.
    pub fn settle(&self, id: u64) -> bool {
        let job = self.inner.pending.borrow_mut().remove(&id);
        match job {
            Some(job) => {
                job();
                true
            }
            None => {
                warn!("no pending job {}", id);
                false
            }
        }
    }

    pub fn handle(&self, message: SimMessage) -> bool {
        match message {
            SimMessage::Settle(id) => self.settle(id),
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.pending.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_job_runs_when_its_id_comes_back() {
        let (scheduler, mut rx) = Scheduler::new();
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let id = scheduler.after(Duration::from_millis(1), move || flag.set(true));
        assert_eq!(scheduler.pending(), 1);
        assert!(!ran.get());

        let message = rx.recv().await.unwrap();
        assert_eq!(message, SimMessage::Settle(id));
        assert!(scheduler.handle(message));
        assert!(ran.get());
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_settle_twice_is_rejected() {
        let (scheduler, mut rx) = Scheduler::new();
        let id = scheduler.after(Duration::ZERO, || {});
        rx.recv().await.unwrap();
        assert!(scheduler.settle(id));
        assert!(!scheduler.settle(id));
    }

    #[tokio::test]
    async fn test_jobs_settle_in_delay_order() {
        let (scheduler, mut rx) = Scheduler::new();
        let slow = scheduler.after(Duration::from_millis(40), || {});
        let fast = scheduler.after(Duration::from_millis(1), || {});
        assert_eq!(rx.recv().await, Some(SimMessage::Settle(fast)));
        assert_eq!(rx.recv().await, Some(SimMessage::Settle(slow)));
    }
}
