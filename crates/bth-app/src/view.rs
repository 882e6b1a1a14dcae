//! Contracts with the view layer
//!
//! The harness core never renders anything. It asks a [`ViewFactory`] for
//! containers (pages, popups) and per-task views, and hands each container a
//! [`ViewNode`]: the handle a concrete view uses to read state and forward
//! user intents.

use std::rc::Rc;

use bth_core::Value;

use crate::task_manager::TaskId;
use crate::tasks::{
    ClassListTask, CreateInstanceTask, LogTask, ResetValueTask, SaveOrResetTask,
    SetupArgumentsTask, VarTreeTask,
};
use crate::test_task::TestTaskSurface;

/// Where a task's container lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerShape {
    /// Top-level, pinned page.
    Category { name: String },
    /// Page nested under its parent.
    Child { parent: TaskId },
    /// Page next to an existing task.
    Brother { sibling: TaskId },
    /// Modal dialog.
    Popup,
}

impl ContainerShape {
    pub fn label(&self) -> &'static str {
        match self {
            ContainerShape::Category { .. } => "category",
            ContainerShape::Child { .. } => "child",
            ContainerShape::Brother { .. } => "brother",
            ContainerShape::Popup => "popup",
        }
    }
}

/// Mountable handle of a task's interactive surface.
#[derive(Clone, Default)]
pub enum ViewNode {
    TestTask(TestTaskSurface),
    VarTree(Rc<VarTreeTask>),
    ResetValue(Rc<ResetValueTask>),
    SaveOrReset(Rc<SaveOrResetTask>),
    SetupArguments(Rc<SetupArgumentsTask>),
    ClassList(Rc<ClassListTask>),
    CreateInstance(Rc<CreateInstanceTask>),
    Log(Rc<LogTask>),
    #[default]
    Empty,
}

impl ViewNode {
    pub fn kind(&self) -> &'static str {
        match self {
            ViewNode::TestTask(_) => "test_task",
            ViewNode::VarTree(_) => "var_tree",
            ViewNode::ResetValue(_) => "reset_value",
            ViewNode::SaveOrReset(_) => "save_or_reset",
            ViewNode::SetupArguments(_) => "setup_arguments",
            ViewNode::ClassList(_) => "class_list",
            ViewNode::CreateInstance(_) => "create_instance",
            ViewNode::Log(_) => "log",
            ViewNode::Empty => "empty",
        }
    }
}

impl std::fmt::Debug for ViewNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ViewNode({})", self.kind())
    }
}

/// View-hosting context of one task.
#[cfg_attr(test, mockall::automock)]
pub trait Container {
    fn set_title(&self, title: &str);
    fn attach(&self, node: ViewNode);
    fn detach(&self);
    fn destroy(&self);
    fn switch_to_foreground(&self);
    fn switch_to_background(&self);
}

/// A task's rendering component.
pub trait View {
    fn node(&self) -> ViewNode;
    fn destroy(&mut self);
}

/// Rendering side of a var-tree task.
pub trait VarTreeView {
    /// Redraw for the node at `attrs_path`.
    fn reset(&self, attrs_path: &[String], value: &Value);
    fn set_can_modify_attrs(&self, can_modify: bool);
    fn set_can_reset(&self, can_reset: bool);
    fn set_can_select(&self, can_select: bool);
}

/// Supplies containers and views.
pub trait ViewFactory {
    fn create_container(&self, task_id: TaskId, shape: &ContainerShape) -> Box<dyn Container>;
    fn switch_to_category(&self, name: &str);
    fn throw_notification(&self, message: &str);
    fn test_task_view(&self, surface: TestTaskSurface) -> Box<dyn View>;
    fn var_tree_view(&self) -> Rc<dyn VarTreeView>;
}
