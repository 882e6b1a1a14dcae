//! Restart-on-demand wrapper around a single task

use std::cell::Cell;
use std::rc::Rc;

use super::{OnKilled, TaskId};

type Spawn = dyn Fn(OnKilled) -> Option<TaskId>;

/// Lazily creates a task on first [`task`](Self::task) access and forgets it
/// when the task reports itself killed, so the next access starts fresh.
pub struct SmartRestartTaskManager {
    spawn: Box<Spawn>,
    task: Rc<Cell<Option<TaskId>>>,
}

impl SmartRestartTaskManager {
    /// `spawn` must create the task and register the given `on_killed`.
    pub fn new(spawn: impl Fn(OnKilled) -> Option<TaskId> + 'static) -> Self {
        Self {
            spawn: Box::new(spawn),
            task: Rc::new(Cell::new(None)),
        }
    }

    /// The live task, creating it if needed.
    pub fn task(&self) -> Option<TaskId> {
        if let Some(task_id) = self.task.get() {
            return Some(task_id);
        }
        let slot = Rc::clone(&self.task);
        let killed_early = Rc::new(Cell::new(false));
        let early = Rc::clone(&killed_early);
        let on_killed: OnKilled = Box::new(move |killed| match slot.get() {
            Some(current) if current == killed => slot.set(None),
            Some(_) => {}
            None => early.set(true),
        });
        let task_id = (self.spawn)(on_killed);
        if !killed_early.get() {
            self.task.set(task_id);
        }
        task_id
    }

    /// The live task without creating one.
    pub fn cached(&self) -> Option<TaskId> {
        self.task.get()
    }
}
