//! Headless view layer
//!
//! A [`ViewFactory`] that renders nothing. It keeps one [`Page`] per live
//! container, a foreground history and the thrown notifications;
//! [`render`] turns any mounted node into a serializable snapshot. Drivers
//! read pages and forward intents straight to the node handles.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use bth_core::prelude::*;
use bth_core::{LogEntry, Value};
use indexmap::IndexMap;
use serde::Serialize;

use crate::task_manager::TaskId;
use crate::test_task::{ElementId, ElementKind, TestModel, TestTaskSurface};
use crate::view::{Container, ContainerShape, VarTreeView, View, ViewFactory, ViewNode};

/// One live container.
#[derive(Clone, Debug)]
pub struct Page {
    pub task_id: TaskId,
    pub title: String,
    pub shape: ContainerShape,
    pub node: ViewNode,
}

#[derive(Default)]
struct HeadlessState {
    pages: IndexMap<TaskId, Page>,
    notifications: Vec<String>,
    category: Option<String>,
    /// Most recent last. Popups open on top; closing one uncovers the
    /// previous task.
    foreground: Vec<TaskId>,
}

impl HeadlessState {
    fn bring_to_front(&mut self, task_id: TaskId) {
        self.foreground.retain(|id| *id != task_id);
        self.foreground.push(task_id);
    }

    fn drop_from_front(&mut self, task_id: TaskId) {
        self.foreground.retain(|id| *id != task_id);
    }
}

/// Cheap to clone; clones share the same pages.
#[derive(Clone, Default)]
pub struct HeadlessViews {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessViews {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live pages in creation order.
    pub fn pages(&self) -> Vec<Page> {
        self.state.borrow().pages.values().cloned().collect()
    }

    pub fn page(&self, task_id: TaskId) -> Option<Page> {
        self.state.borrow().pages.get(&task_id).cloned()
    }

    pub fn node(&self, task_id: TaskId) -> Option<ViewNode> {
        self.page(task_id).map(|page| page.node)
    }

    /// Topmost live container in the foreground.
    pub fn foreground(&self) -> Option<TaskId> {
        self.state.borrow().foreground.last().copied()
    }

    pub fn current_category(&self) -> Option<String> {
        self.state.borrow().category.clone()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.state.borrow().notifications.clone()
    }

    /// Drain notifications thrown since the last call.
    pub fn take_notifications(&self) -> Vec<String> {
        std::mem::take(&mut self.state.borrow_mut().notifications)
    }
}

impl ViewFactory for HeadlessViews {
    fn create_container(&self, task_id: TaskId, shape: &ContainerShape) -> Box<dyn Container> {
        let mut state = self.state.borrow_mut();
        state.pages.insert(
            task_id,
            Page {
                task_id,
                title: String::new(),
                shape: shape.clone(),
                node: ViewNode::Empty,
            },
        );
        if matches!(shape, ContainerShape::Popup) {
            state.bring_to_front(task_id);
        }
        Box::new(HeadlessContainer {
            task_id,
            state: Rc::downgrade(&self.state),
        })
    }

    fn switch_to_category(&self, name: &str) {
        self.state.borrow_mut().category = Some(name.to_string());
    }

    fn throw_notification(&self, message: &str) {
        debug!("notification: {}", message);
        self.state
            .borrow_mut()
            .notifications
            .push(message.to_string());
    }

    fn test_task_view(&self, surface: TestTaskSurface) -> Box<dyn View> {
        Box::new(NodeView(ViewNode::TestTask(surface)))
    }

    fn var_tree_view(&self) -> Rc<dyn VarTreeView> {
        Rc::new(TracingVarTreeView)
    }
}

struct HeadlessContainer {
    task_id: TaskId,
    state: Weak<RefCell<HeadlessState>>,
}

impl HeadlessContainer {
    fn with_state(&self, f: impl FnOnce(&mut HeadlessState)) {
        if let Some(state) = self.state.upgrade() {
            f(&mut state.borrow_mut());
        }
    }
}

impl Container for HeadlessContainer {
    fn set_title(&self, title: &str) {
        let task_id = self.task_id;
        self.with_state(|state| {
            if let Some(page) = state.pages.get_mut(&task_id) {
                page.title = title.to_string();
            }
        });
    }

    fn attach(&self, node: ViewNode) {
        let task_id = self.task_id;
        self.with_state(|state| {
            if let Some(page) = state.pages.get_mut(&task_id) {
                page.node = node;
            }
        });
    }

    fn detach(&self) {
        let task_id = self.task_id;
        self.with_state(|state| {
            if let Some(page) = state.pages.get_mut(&task_id) {
                page.node = ViewNode::Empty;
            }
        });
    }

    fn destroy(&self) {
        let task_id = self.task_id;
        self.with_state(|state| {
            state.pages.shift_remove(&task_id);
            state.drop_from_front(task_id);
        });
    }

    fn switch_to_foreground(&self) {
        let task_id = self.task_id;
        self.with_state(|state| state.bring_to_front(task_id));
    }

    fn switch_to_background(&self) {
        let task_id = self.task_id;
        self.with_state(|state| state.drop_from_front(task_id));
    }
}

struct NodeView(ViewNode);

impl View for NodeView {
    fn node(&self) -> ViewNode {
        self.0.clone()
    }

    fn destroy(&mut self) {
        self.0 = ViewNode::Empty;
    }
}

/// Var-tree tasks keep their own state; redraws are only traced.
struct TracingVarTreeView;

impl VarTreeView for TracingVarTreeView {
    fn reset(&self, attrs_path: &[String], value: &Value) {
        trace!("var tree at {:?}: {}", attrs_path, value.to_simple_string());
    }

    fn set_can_modify_attrs(&self, can_modify: bool) {
        trace!("var tree can_modify_attrs={}", can_modify);
    }

    fn set_can_reset(&self, can_reset: bool) {
        trace!("var tree can_reset={}", can_reset);
    }

    fn set_can_select(&self, can_select: bool) {
        trace!("var tree can_select={}", can_select);
    }
}

// ─────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RenderedElement {
    pub id: ElementId,
    pub index: usize,
    pub kind: ElementKind,
    pub name: String,
    pub description: String,
    pub child_task: Option<TaskId>,
    pub removable: bool,
    pub refreshable: bool,
    pub callable: bool,
}

/// A named value shown as its short rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedAttr {
    pub name: String,
    pub value: String,
}

impl RenderedAttr {
    fn new(name: impl Into<String>, value: &Value) -> Self {
        Self {
            name: name.into(),
            value: value.to_simple_string(),
        }
    }
}

/// Serializable snapshot of a mounted node.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderedView {
    TestTask {
        editable: bool,
        elements: Vec<RenderedElement>,
    },
    VarTree {
        attrs_path: Vec<String>,
        value: String,
        attributes: Vec<RenderedAttr>,
        can_modify_attrs: bool,
        can_reset: bool,
        can_select: bool,
    },
    ResetValue {
        default_attrs_path: Vec<String>,
    },
    SaveOrReset {
        value: String,
        can_reset: bool,
    },
    SetupArguments {
        arguments: Vec<RenderedAttr>,
        can_resize: bool,
    },
    ClassList {
        classes: Vec<String>,
    },
    CreateInstance {
        class_name: String,
        arguments: Vec<RenderedAttr>,
    },
    Log {
        entries: Vec<LogEntry>,
    },
    Empty,
}

pub fn render(node: &ViewNode) -> RenderedView {
    match node {
        ViewNode::TestTask(surface) => render_test_task(surface.model.as_ref()),
        ViewNode::VarTree(task) => {
            let value = task.value();
            let attributes = value
                .attr_names()
                .into_iter()
                .map(|name| {
                    let attr = value.get_attr(&name).unwrap_or_default();
                    RenderedAttr::new(name, &attr)
                })
                .collect();
            RenderedView::VarTree {
                attrs_path: task.attrs_path(),
                value: value.to_simple_string(),
                attributes,
                can_modify_attrs: task.can_modify_attrs(),
                can_reset: task.can_reset(),
                can_select: task.can_select(),
            }
        }
        ViewNode::ResetValue(task) => RenderedView::ResetValue {
            default_attrs_path: task.default_attrs_path().to_vec(),
        },
        ViewNode::SaveOrReset(task) => RenderedView::SaveOrReset {
            value: task.value().to_simple_string(),
            can_reset: task.can_reset(),
        },
        ViewNode::SetupArguments(task) => RenderedView::SetupArguments {
            arguments: render_arguments(task.arguments()),
            can_resize: task.can_resize(),
        },
        ViewNode::ClassList(task) => RenderedView::ClassList {
            classes: task.class_names(),
        },
        ViewNode::CreateInstance(task) => RenderedView::CreateInstance {
            class_name: task.class_name().to_string(),
            arguments: render_arguments(task.arguments()),
        },
        ViewNode::Log(task) => RenderedView::Log {
            entries: task.entries(),
        },
        ViewNode::Empty => RenderedView::Empty,
    }
}

fn render_test_task(model: &dyn TestModel) -> RenderedView {
    let elements = model
        .elements()
        .into_iter()
        .map(|element| RenderedElement {
            id: element.id,
            index: element.index,
            kind: element.kind,
            name: element.name,
            description: element.description,
            child_task: element.child_task,
            removable: element.removable,
            refreshable: element.refreshable,
            callable: element.callable,
        })
        .collect();
    RenderedView::TestTask {
        editable: model.editable(),
        elements,
    }
}

fn render_arguments(arguments: Vec<(String, Value)>) -> Vec<RenderedAttr> {
    arguments
        .into_iter()
        .map(|(name, value)| RenderedAttr::new(name, &value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_task::{Element, StaticModel};

    struct Inert;
    impl crate::test_task::Controller for Inert {}

    #[test]
    fn test_container_lifecycle_updates_pages() {
        let views = HeadlessViews::new();
        let id = TaskId::from(7);
        let container = views.create_container(id, &ContainerShape::Popup);
        container.set_title("picker");
        container.switch_to_foreground();
        assert_eq!(views.page(id).unwrap().title, "picker");
        assert_eq!(views.foreground(), Some(id));

        container.detach();
        container.destroy();
        assert!(views.page(id).is_none());
        assert_eq!(views.foreground(), None);
    }

    #[test]
    fn test_closing_a_popup_uncovers_the_previous_task() {
        let views = HeadlessViews::new();
        let (page, popup) = (TaskId::from(1), TaskId::from(2));
        let category = views.create_container(
            page,
            &ContainerShape::Category {
                name: "things".into(),
            },
        );
        assert_eq!(views.foreground(), None);
        category.switch_to_foreground();

        let dialog = views.create_container(popup, &ContainerShape::Popup);
        assert_eq!(views.foreground(), Some(popup));

        dialog.destroy();
        assert_eq!(views.foreground(), Some(page));
        category.switch_to_background();
        assert_eq!(views.foreground(), None);
    }

    #[test]
    fn test_notifications_drain() {
        let views = HeadlessViews::new();
        views.throw_notification("one");
        views.throw_notification("two");
        assert_eq!(views.take_notifications(), vec!["one", "two"]);
        assert!(views.notifications().is_empty());
    }

    #[test]
    fn test_render_test_task_serializes_elements() {
        let model = StaticModel::new([
            Element::new(ElementKind::Attribute, "type").with_description("number"),
            Element::new(ElementKind::Options(vec!["Refresh".into()]), "refresh"),
        ]);
        let node = ViewNode::TestTask(TestTaskSurface {
            model,
            controller: Rc::new(Inert),
        });
        let json = serde_json::to_value(render(&node)).unwrap();
        assert_eq!(json["kind"], "test_task");
        assert_eq!(json["elements"][0]["name"], "type");
        assert_eq!(json["elements"][0]["description"], "number");
        assert_eq!(json["elements"][1]["kind"]["type"], "options");
        assert_eq!(json["elements"][1]["kind"]["options"][0], "Refresh");
    }
}
