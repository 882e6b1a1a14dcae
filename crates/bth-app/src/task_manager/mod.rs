//! Task Manager - hosts concurrent tasks as a tree
//!
//! Lifecycle of a task: created (id allocated, container requested, factory
//! invoked) → attached (view mounted, [`Task::attached`] called) → killed
//! (container detached and destroyed, [`Task::destroy`] called, `on_killed`
//! fired). Killing removes the entry from the table before any teardown
//! callback runs, so a re-entrant kill of the same task is a no-op.
//!
//! No table borrow is held while factories, tasks, containers or callbacks
//! run: they are free to call back into the manager.

mod interface;
mod smart_restart;


pub use interface::InterfaceForTask;
pub use smart_restart::SmartRestartTaskManager;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use bth_core::prelude::*;
use bth_core::{Emitter, Subscription};
use indexmap::IndexMap;
use serde::Serialize;

use crate::context::HarnessContext;
use crate::view::{Container, ContainerShape, ViewNode};

/// Unique, monotonically assigned task id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(u64);

impl TaskId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        TaskId(id)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the manager needs from a hosted task.
pub trait Task {
    /// Node mounted into the task's container.
    fn view(&self) -> ViewNode;

    /// Called once the view is mounted.
    fn attached(&self) {}

    /// Release everything; the manager is the only caller.
    fn destroy(&mut self);
}

/// Builds a task; receives the handle the task uses to reach the manager.
pub type TaskCreator = Box<dyn FnOnce(InterfaceForTask) -> Box<dyn Task>>;

/// Notified with the id of the task that was killed.
pub type OnKilled = Box<dyn FnOnce(TaskId)>;

/// Wrap a closure as a [`TaskCreator`].
pub fn task_creator<T, F>(f: F) -> TaskCreator
where
    T: Task + 'static,
    F: FnOnce(InterfaceForTask) -> T + 'static,
{
    Box::new(move |tmi| Box::new(f(tmi)) as Box<dyn Task>)
}

/// Lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    Created(TaskId),
    Attached(TaskId),
    Killed(TaskId),
}

/// Table entry owned by the manager.
struct TaskInfo {
    name: String,
    shape: ContainerShape,
    parent: Option<TaskId>,
    can_be_killed_by_user: bool,
    container: Rc<dyn Container>,
    task: Option<Box<dyn Task>>,
    on_killed: Option<OnKilled>,
    attached: bool,
}

/// Read-only view of a table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub task_id: TaskId,
    pub name: String,
    pub kind: &'static str,
    pub parent: Option<TaskId>,
    pub can_be_killed_by_user: bool,
    pub attached: bool,
}

#[derive(Default)]
struct TaskTable {
    infos: HashMap<TaskId, TaskInfo>,
    order: Vec<TaskId>,
    categories: IndexMap<String, TaskId>,
    last_id: u64,
}

impl TaskTable {
    fn allocate_id(&mut self) -> TaskId {
        self.last_id += 1;
        TaskId(self.last_id)
    }

    fn take(&mut self, task_id: TaskId) -> Option<TaskInfo> {
        let info = self.infos.remove(&task_id)?;
        self.order.retain(|id| *id != task_id);
        self.categories.retain(|_, id| *id != task_id);
        Some(info)
    }

    /// Brothers outlive the task they share a parent with; drop the link.
    fn release_brothers(&mut self, parent: TaskId) {
        for info in self.infos.values_mut() {
            if info.parent == Some(parent) && matches!(info.shape, ContainerShape::Brother { .. }) {
                info.parent = None;
            }
        }
    }
}

pub(crate) struct TaskManagerInner {
    ctx: HarnessContext,
    table: RefCell<TaskTable>,
    events: Emitter<TaskEvent>,
}

/// Shared handle to the manager. Clones address the same table.
#[derive(Clone)]
pub struct TaskManager {
    inner: Rc<TaskManagerInner>,
}

struct TaskSpec {
    shape: ContainerShape,
    parent: Option<TaskId>,
    name: String,
    can_be_killed_by_user: bool,
    on_killed: Option<OnKilled>,
}

impl TaskManager {
    pub fn new(ctx: HarnessContext) -> Self {
        Self {
            inner: Rc::new(TaskManagerInner {
                ctx,
                table: RefCell::new(TaskTable::default()),
                events: Emitter::new(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<TaskManagerInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<TaskManagerInner> {
        Rc::downgrade(&self.inner)
    }

    pub fn context(&self) -> &HarnessContext {
        &self.inner.ctx
    }

    // ─────────────────────────────────────────────────────────
    // Creation
    // ─────────────────────────────────────────────────────────

    /// Pinned top-level page; the user close affordance is never honored.
    pub fn create_category(&self, name: &str, title: &str, creator: TaskCreator) -> TaskId {
        self.setup_task(
            TaskSpec {
                shape: ContainerShape::Category {
                    name: name.to_string(),
                },
                parent: None,
                name: title.to_string(),
                can_be_killed_by_user: false,
                on_killed: None,
            },
            creator,
        )
    }

    /// Top-level popup not owned by any task.
    pub fn create_popup_task(
        &self,
        creator: TaskCreator,
        can_be_killed_by_user: bool,
        on_killed: Option<OnKilled>,
    ) -> TaskId {
        self.setup_task(
            TaskSpec {
                shape: ContainerShape::Popup,
                parent: None,
                name: String::new(),
                can_be_killed_by_user,
                on_killed,
            },
            creator,
        )
    }

    pub(crate) fn create_child_task(
        &self,
        parent: TaskId,
        creator: TaskCreator,
        name: &str,
        can_be_killed_by_user: bool,
        on_killed: Option<OnKilled>,
    ) -> TaskId {
        self.setup_task(
            TaskSpec {
                shape: ContainerShape::Child { parent },
                parent: Some(parent),
                name: name.to_string(),
                can_be_killed_by_user,
                on_killed,
            },
            creator,
        )
    }

    pub(crate) fn create_brother_task(
        &self,
        sibling: TaskId,
        creator: TaskCreator,
        name: &str,
        can_be_killed_by_user: bool,
        on_killed: Option<OnKilled>,
    ) -> TaskId {
        let parent = self.task_info(sibling).and_then(|info| info.parent);
        self.setup_task(
            TaskSpec {
                shape: ContainerShape::Brother { sibling },
                parent,
                name: name.to_string(),
                can_be_killed_by_user,
                on_killed,
            },
            creator,
        )
    }

    pub(crate) fn create_owned_popup(
        &self,
        owner: TaskId,
        creator: TaskCreator,
        can_be_killed_by_user: bool,
        on_killed: Option<OnKilled>,
    ) -> TaskId {
        self.setup_task(
            TaskSpec {
                shape: ContainerShape::Popup,
                parent: Some(owner),
                name: String::new(),
                can_be_killed_by_user,
                on_killed,
            },
            creator,
        )
    }

    fn setup_task(&self, spec: TaskSpec, creator: TaskCreator) -> TaskId {
        let task_id = self.inner.table.borrow_mut().allocate_id();
        let container: Rc<dyn Container> =
            Rc::from(self.inner.ctx.views().create_container(task_id, &spec.shape));
        container.set_title(&spec.name);

        {
            let mut table = self.inner.table.borrow_mut();
            if let ContainerShape::Category { name } = &spec.shape {
                table.categories.insert(name.clone(), task_id);
            }
            table.order.push(task_id);
            table.infos.insert(
                task_id,
                TaskInfo {
                    name: spec.name,
                    shape: spec.shape,
                    parent: spec.parent,
                    can_be_killed_by_user: spec.can_be_killed_by_user,
                    container,
                    task: None,
                    on_killed: spec.on_killed,
                    attached: false,
                },
            );
        }
        debug!("Task {} created", task_id);
        self.inner.events.emit(&TaskEvent::Created(task_id));

        let task = creator(InterfaceForTask::new(task_id, self));
        if let Some(mut displaced) = self.mount(task_id, task) {
            displaced.destroy();
        }
        task_id
    }

    /// Attach `task` into the container of `task_id`, returning the task it
    /// replaced. A task whose entry vanished meanwhile is destroyed.
    fn mount(&self, task_id: TaskId, mut task: Box<dyn Task>) -> Option<Box<dyn Task>> {
        let Some(container) = self.container_of(task_id) else {
            warn!("Task {} was killed before it could be attached", task_id);
            task.destroy();
            return None;
        };
        container.attach(task.view());
        task.attached();

        let (displaced, orphan) = {
            let mut table = self.inner.table.borrow_mut();
            match table.infos.get_mut(&task_id) {
                Some(info) => {
                    info.attached = true;
                    (info.task.replace(task), None)
                }
                None => (None, Some(task)),
            }
        };
        if let Some(mut orphan) = orphan {
            orphan.destroy();
            return None;
        }
        self.inner.events.emit(&TaskEvent::Attached(task_id));
        displaced
    }

    // ─────────────────────────────────────────────────────────
    // Replacement and teardown
    // ─────────────────────────────────────────────────────────

    /// Replace the task behind `task_id` in place, reusing its container and
    /// id. The old task is destroyed only after the new one is attached;
    /// the original `on_killed` stays registered for the shared id.
    pub fn exec(&self, task_id: TaskId, creator: TaskCreator) -> bool {
        if !self.contains(task_id) {
            warn!("exec on unknown task {}", task_id);
            return false;
        }
        let task = creator(InterfaceForTask::new(task_id, self));
        if let Some(mut old) = self.mount(task_id, task) {
            old.destroy();
        }
        true
    }

    /// Tear down a task and everything it owns (children and popups).
    /// Surviving brothers that named it as parent become parentless.
    pub fn kill_task(&self, task_id: TaskId) -> bool {
        let Some(info) = self.inner.table.borrow_mut().take(task_id) else {
            debug!("kill_task: {} is already gone", task_id);
            return false;
        };
        self.inner.table.borrow_mut().release_brothers(task_id);

        for owned in self.owned_by(task_id) {
            self.kill_task(owned);
        }

        info.container.detach();
        info.container.destroy();
        if let Some(mut task) = info.task {
            task.destroy();
        }
        if let Some(on_killed) = info.on_killed {
            on_killed(task_id);
        }
        debug!("Task {} killed", task_id);
        self.inner.events.emit(&TaskEvent::Killed(task_id));
        true
    }

    /// The UI close affordance of a container was used.
    pub fn container_close_requested(&self, task_id: TaskId) -> Result<()> {
        let killable = self
            .task_info(task_id)
            .map(|info| info.can_be_killed_by_user)
            .ok_or_else(|| Error::task_not_found(task_id.as_u64()))?;
        if !killable {
            return Err(Error::TaskPinned {
                task_id: task_id.as_u64(),
            });
        }
        self.kill_task(task_id);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // Navigation
    // ─────────────────────────────────────────────────────────

    pub fn switch_to_task(&self, task_id: TaskId) -> bool {
        match self.container_of(task_id) {
            Some(container) => {
                container.switch_to_foreground();
                true
            }
            None => false,
        }
    }

    pub fn send_to_background(&self, task_id: TaskId) -> bool {
        match self.container_of(task_id) {
            Some(container) => {
                container.switch_to_background();
                true
            }
            None => false,
        }
    }

    pub fn switch_to_category(&self, name: &str) -> bool {
        let Some(task_id) = self.category(name) else {
            return false;
        };
        self.inner.ctx.views().switch_to_category(name);
        self.switch_to_task(task_id)
    }

    pub fn set_name(&self, task_id: TaskId, name: &str) {
        let container = {
            let mut table = self.inner.table.borrow_mut();
            match table.infos.get_mut(&task_id) {
                Some(info) => {
                    info.name = name.to_string();
                    Some(info.container.clone())
                }
                None => None,
            }
        };
        if let Some(container) = container {
            container.set_title(name);
        }
    }

    pub fn throw_notification(&self, message: &str) {
        self.inner.ctx.views().throw_notification(message);
    }

    // ─────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.inner.table.borrow().infos.contains_key(&task_id)
    }

    pub fn task_info(&self, task_id: TaskId) -> Option<TaskSummary> {
        let table = self.inner.table.borrow();
        table.infos.get(&task_id).map(|info| summarize(task_id, info))
    }

    /// All tasks in creation order.
    pub fn tasks(&self) -> Vec<TaskSummary> {
        let table = self.inner.table.borrow();
        table
            .order
            .iter()
            .filter_map(|id| table.infos.get(id).map(|info| summarize(*id, info)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.table.borrow().infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn category(&self, name: &str) -> Option<TaskId> {
        self.inner.table.borrow().categories.get(name).copied()
    }

    /// Node currently mounted for `task_id`.
    pub fn view_of(&self, task_id: TaskId) -> Option<ViewNode> {
        let table = self.inner.table.borrow();
        table
            .infos
            .get(&task_id)
            .and_then(|info| info.task.as_ref())
            .map(|task| task.view())
    }

    /// Children and popups whose owner is `task_id`.
    pub fn owned_by(&self, task_id: TaskId) -> Vec<TaskId> {
        let table = self.inner.table.borrow();
        table
            .order
            .iter()
            .filter(|id| {
                table.infos.get(id).is_some_and(|info| {
                    info.parent == Some(task_id)
                        && !matches!(info.shape, ContainerShape::Brother { .. })
                })
            })
            .copied()
            .collect()
    }

    /// Handle for spawning tasks on behalf of `task_id`.
    pub fn interface_for(&self, task_id: TaskId) -> InterfaceForTask {
        InterfaceForTask::new(task_id, self)
    }

    pub fn subscribe(&self, handler: impl Fn(&TaskEvent) + 'static) -> Subscription {
        self.inner.events.subscribe(handler)
    }

    fn container_of(&self, task_id: TaskId) -> Option<Rc<dyn Container>> {
        self.inner
            .table
            .borrow()
            .infos
            .get(&task_id)
            .map(|info| info.container.clone())
    }
}

fn summarize(task_id: TaskId, info: &TaskInfo) -> TaskSummary {
    TaskSummary {
        task_id,
        name: info.name.clone(),
        kind: info.shape.label(),
        parent: info.parent,
        can_be_killed_by_user: info.can_be_killed_by_user,
        attached: info.attached,
    }
}
