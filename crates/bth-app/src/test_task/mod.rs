//! Test task Model/Controller contracts
//!
//! Every test module produces a task made of a Model (an ordered list of
//! [`Element`] rows plus change events), a Controller (the command surface
//! user intents are dispatched to) and an external View. Concrete models
//! hold a [`ModelCore`] and delegate the common surface to it.

mod table;

pub use table::ElementTable;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bth_core::{Emitter, Value};
use serde::Serialize;

use crate::context::HarnessContext;
use crate::task_manager::{Task, TaskId};
use crate::test_module::TestModuleRef;
use crate::view::{View, ViewNode};

/// Identifies an element within one task; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementId(pub(crate) u64);

impl ElementId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a row represents and which intents it accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "options", rename_all = "snake_case")]
pub enum ElementKind {
    Attribute,
    Options(Vec<String>),
    Switch,
    MethodCall,
    EventBucket,
    RemovableValue,
}

/// One row of a test-task model.
#[derive(Clone)]
pub struct Element {
    pub id: ElementId,
    pub index: usize,
    pub kind: ElementKind,
    pub name: String,
    pub description: String,
    pub reference: Option<Value>,
    pub test_module: Option<TestModuleRef>,
    pub child_task: Option<TaskId>,
    pub removable: bool,
    pub refreshable: bool,
    pub callable: bool,
}

impl Element {
    pub fn new(kind: ElementKind, name: impl Into<String>) -> Self {
        let callable = kind == ElementKind::MethodCall;
        let removable = kind == ElementKind::RemovableValue;
        Self {
            id: ElementId(0),
            index: 0,
            kind,
            name: name.into(),
            description: String::new(),
            reference: None,
            test_module: None,
            child_task: None,
            removable,
            refreshable: false,
            callable,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_reference(mut self, value: Value, module: TestModuleRef) -> Self {
        self.reference = Some(value);
        self.test_module = Some(module);
        self
    }

    pub fn refreshable(mut self) -> Self {
        self.refreshable = true;
        self
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id)
            .field("index", &self.index)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("module", &self.test_module.as_ref().map(|m| m.name()))
            .field("child_task", &self.child_task)
            .finish()
    }
}

/// Model change notifications; mutation always happens before the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelEvent {
    ElementAdded(ElementId),
    ElementRemoved(ElementId),
    ElementValueChanged(ElementId),
    EditableStateChanged(bool),
    /// The value behind an element was replaced; the controller may open a
    /// child task for it right away.
    ElementReferenceChanged(ElementId),
}

// ─────────────────────────────────────────────────────────────────
// ModelCore
// ─────────────────────────────────────────────────────────────────

/// Shared state behind every test-task model.
#[derive(Default)]
pub struct ModelCore {
    table: RefCell<ElementTable>,
    events: Emitter<ModelEvent>,
    editable: Cell<bool>,
}

impl ModelCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &Emitter<ModelEvent> {
        &self.events
    }

    pub fn emit(&self, event: ModelEvent) {
        self.events.emit(&event);
    }

    pub fn push(&self, element: Element) -> ElementId {
        let id = self.table.borrow_mut().push(element);
        self.emit(ModelEvent::ElementAdded(id));
        id
    }

    pub fn insert(&self, index: usize, element: Element) -> ElementId {
        let id = self.table.borrow_mut().insert(index, element);
        self.emit(ModelEvent::ElementAdded(id));
        id
    }

    pub fn remove(&self, id: ElementId) -> Option<Element> {
        let removed = self.table.borrow_mut().remove(id);
        if removed.is_some() {
            self.emit(ModelEvent::ElementRemoved(id));
        }
        removed
    }

    pub fn element(&self, id: ElementId) -> Option<Element> {
        self.table.borrow().get(id).cloned()
    }

    pub fn element_ids(&self) -> Vec<ElementId> {
        self.table.borrow().ids()
    }

    pub fn id_at(&self, index: usize) -> Option<ElementId> {
        self.table.borrow().id_at(index)
    }

    pub fn len(&self) -> usize {
        self.table.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mutate one element in place without emitting anything.
    pub fn update<R>(&self, id: ElementId, f: impl FnOnce(&mut Element) -> R) -> Option<R> {
        self.table.borrow_mut().get_mut(id).map(f)
    }

    /// Replace the description and emit `ElementValueChanged`.
    pub fn set_description(&self, id: ElementId, description: String) {
        if self
            .update(id, |element| element.description = description)
            .is_some()
        {
            self.emit(ModelEvent::ElementValueChanged(id));
        }
    }

    pub fn set_child_task(&self, id: ElementId, task: Option<TaskId>) {
        self.update(id, |element| element.child_task = task);
    }

    /// Clear `child_task` only if it still names `task`.
    pub fn forget_child_task(&self, id: ElementId, task: TaskId) {
        self.update(id, |element| {
            if element.child_task == Some(task) {
                element.child_task = None;
            }
        });
    }

    pub fn editable(&self) -> bool {
        self.editable.get()
    }

    pub fn set_editable(&self, editable: bool) {
        self.editable.set(editable);
        self.emit(ModelEvent::EditableStateChanged(editable));
    }
}

/// The surface a View reads from.
pub trait TestModel {
    fn core(&self) -> &ModelCore;

    fn events(&self) -> &Emitter<ModelEvent> {
        self.core().events()
    }

    fn element_ids(&self) -> Vec<ElementId> {
        self.core().element_ids()
    }

    fn element(&self, id: ElementId) -> Option<Element> {
        self.core().element(id)
    }

    /// All elements in render order.
    fn elements(&self) -> Vec<Element> {
        self.element_ids()
            .into_iter()
            .filter_map(|id| self.element(id))
            .collect()
    }

    fn find_by_name(&self, name: &str) -> Option<ElementId> {
        self.elements()
            .into_iter()
            .find(|element| element.name == name)
            .map(|element| element.id)
    }

    fn editable(&self) -> bool {
        self.core().editable()
    }

    fn set_editable(&self, editable: bool) {
        self.core().set_editable(editable)
    }

    /// Release description maintainers; called once by the owning task.
    fn destroy(&self) {}
}

/// Model whose rows are fixed at construction.
pub struct StaticModel {
    core: ModelCore,
}

impl StaticModel {
    pub fn new(elements: impl IntoIterator<Item = Element>) -> Rc<Self> {
        let core = ModelCore::new();
        for element in elements {
            core.push(element);
        }
        Rc::new(Self { core })
    }
}

impl TestModel for StaticModel {
    fn core(&self) -> &ModelCore {
        &self.core
    }
}

/// The command surface user intents are dispatched to. Every command is
/// optional; a test module only implements what its rows support.
pub trait Controller {
    fn save_to_var_tree(&self) {}

    fn edit_by_var_tree(&self) {}

    fn choose_option(&self, _id: ElementId, _option: &str) {}

    fn turn_on(&self, _id: ElementId) {}

    fn turn_off(&self, _id: ElementId) {}

    fn remove_attribute(&self, _id: ElementId) {}

    fn refresh_attribute(&self, _id: ElementId) {}

    fn setup_arguments(&self, _id: ElementId) {}

    fn enter_attribute(&self, _id: ElementId) {}

    fn select_attribute(&self, _id: ElementId) {}

    fn destroy(&self) {}
}

/// Object-specific glue living next to the controller, e.g. auto refresh
/// on a change event.
pub trait MetaController {
    fn destroy(&mut self) {}
}

/// Does nothing.
pub struct VoidMetaController;

impl MetaController for VoidMetaController {}

/// Model and controller of one test task, as handed to its View.
#[derive(Clone)]
pub struct TestTaskSurface {
    pub model: Rc<dyn TestModel>,
    pub controller: Rc<dyn Controller>,
}

/// A test task: view, meta controller, controller and model, torn down in
/// that order.
pub struct TestTask {
    node: ViewNode,
    view: Option<Box<dyn View>>,
    meta: Option<Box<dyn MetaController>>,
    controller: Option<Rc<dyn Controller>>,
    model: Option<Rc<dyn TestModel>>,
}

impl TestTask {
    pub fn new(
        ctx: &HarnessContext,
        model: Rc<dyn TestModel>,
        controller: Rc<dyn Controller>,
        meta: Box<dyn MetaController>,
    ) -> Self {
        let surface = TestTaskSurface {
            model: model.clone(),
            controller: controller.clone(),
        };
        let view = ctx.views().test_task_view(surface);
        Self {
            node: view.node(),
            view: Some(view),
            meta: Some(meta),
            controller: Some(controller),
            model: Some(model),
        }
    }

    /// Task with no meta controller.
    pub fn plain(
        ctx: &HarnessContext,
        model: Rc<dyn TestModel>,
        controller: Rc<dyn Controller>,
    ) -> Self {
        Self::new(ctx, model, controller, Box::new(VoidMetaController))
    }
}

impl Task for TestTask {
    fn view(&self) -> ViewNode {
        self.node.clone()
    }

    fn destroy(&mut self) {
        if let Some(mut view) = self.view.take() {
            view.destroy();
        }
        if let Some(mut meta) = self.meta.take() {
            meta.destroy();
        }
        if let Some(controller) = self.controller.take() {
            controller.destroy();
        }
        if let Some(model) = self.model.take() {
            model.destroy();
        }
        self.node = ViewNode::Empty;
    }
}
