//! The handle a task uses to reach the manager

use std::rc::Weak;

use bth_core::prelude::*;

use super::{OnKilled, TaskCreator, TaskId, TaskManager, TaskManagerInner};
use crate::context::HarnessContext;

/// Bound to one task id. Holds the manager weakly: once the manager is gone
/// every operation is a no-op.
#[derive(Clone)]
pub struct InterfaceForTask {
    task_id: TaskId,
    manager: Weak<TaskManagerInner>,
    ctx: HarnessContext,
}

impl InterfaceForTask {
    pub(super) fn new(task_id: TaskId, manager: &TaskManager) -> Self {
        Self {
            task_id,
            manager: manager.downgrade(),
            ctx: manager.context().clone(),
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn context(&self) -> &HarnessContext {
        &self.ctx
    }

    /// The manager, unless it has been dropped.
    pub fn manager(&self) -> Option<TaskManager> {
        match self.manager.upgrade() {
            Some(inner) => Some(TaskManager::from_inner(inner)),
            None => {
                debug!("task {}: manager is gone", self.task_id);
                None
            }
        }
    }

    pub fn create_child_task(
        &self,
        creator: TaskCreator,
        name: &str,
        can_be_killed_by_user: bool,
        on_killed: Option<OnKilled>,
    ) -> Option<TaskId> {
        let manager = self.manager()?;
        Some(manager.create_child_task(
            self.task_id,
            creator,
            name,
            can_be_killed_by_user,
            on_killed,
        ))
    }

    pub fn create_brother_task(
        &self,
        creator: TaskCreator,
        name: &str,
        can_be_killed_by_user: bool,
        on_killed: Option<OnKilled>,
    ) -> Option<TaskId> {
        let manager = self.manager()?;
        Some(manager.create_brother_task(
            self.task_id,
            creator,
            name,
            can_be_killed_by_user,
            on_killed,
        ))
    }

    /// Popup owned by this task; it dies with it.
    pub fn create_popup_task(
        &self,
        creator: TaskCreator,
        immediate_killed_when_closed: bool,
        on_killed: Option<OnKilled>,
    ) -> Option<TaskId> {
        let manager = self.manager()?;
        Some(manager.create_owned_popup(
            self.task_id,
            creator,
            immediate_killed_when_closed,
            on_killed,
        ))
    }

    pub fn kill_task(&self, task_id: TaskId) -> bool {
        self.manager()
            .is_some_and(|manager| manager.kill_task(task_id))
    }

    pub fn switch_to_task(&self, task_id: TaskId) -> bool {
        self.manager()
            .is_some_and(|manager| manager.switch_to_task(task_id))
    }

    /// Kill the task this handle is bound to.
    pub fn exit(&self) -> bool {
        self.kill_task(self.task_id)
    }

    /// Replace the task this handle is bound to.
    pub fn exec(&self, creator: TaskCreator) -> bool {
        self.manager()
            .is_some_and(|manager| manager.exec(self.task_id, creator))
    }

    pub fn set_name(&self, name: &str) {
        if let Some(manager) = self.manager() {
            manager.set_name(self.task_id, name);
        }
    }

    pub fn throw_notification(&self, message: &str) {
        self.ctx.views().throw_notification(message);
    }
}
