//! Array and object test modules
//!
//! Both render one row per entry of the value (plus a `length` row for
//! arrays and a trailing `refresh` row), classify each entry against its
//! candidate modules and keep the rows in sync only when asked to.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use bth_core::{AttrPath, MessageLog, Subscription, Value};
use indexmap::IndexMap;

use super::{
    check_needs_immediate_handling, description_setter, enter_element_task, get_valid_test_module,
    log_if_invalid, open_element_task, test_modules_name, ConstantDescription,
    DescriptionMaintainer, DescriptionSetter, TestModule, TestModuleRef,
};
use crate::context::HarnessContext;
use crate::task_manager::{InterfaceForTask, Task};
use crate::tasks::{create_put_value_task, create_save_or_reset_task, create_task_on_custom_root, ValueSetter};
use crate::test_task::{
    Controller, Element, ElementId, ElementKind, ModelCore, ModelEvent, TestModel, TestTask,
};

enum Layout {
    Array {
        element_modules: Vec<TestModuleRef>,
    },
    Object {
        attribute_modules: IndexMap<String, Vec<TestModuleRef>>,
        default_modules: Vec<TestModuleRef>,
    },
}

impl Layout {
    fn candidates(&self, key: &str) -> &[TestModuleRef] {
        match self {
            Layout::Array { element_modules } => element_modules,
            Layout::Object {
                attribute_modules,
                default_modules,
            } => attribute_modules
                .get(key)
                .map(Vec::as_slice)
                .unwrap_or(default_modules),
        }
    }

    fn row_name(&self, key: &str) -> String {
        match self {
            Layout::Array { .. } => format!("element_{}", key),
            Layout::Object { .. } => key.to_string(),
        }
    }

    fn assign_error(&self) -> &'static str {
        match self {
            Layout::Array { .. } => "exception caught while assigning value to an element of an array",
            Layout::Object { .. } => {
                "exception caught while assigning value to an attribute of an object"
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Modules
// ─────────────────────────────────────────────────────────────────

/// `array<names>`: lists whose elements are classified against
/// `element_modules`.
pub struct ArrayTestModule {
    name: String,
    default_attrs_path: AttrPath,
    layout: Rc<Layout>,
    needs_immediate_handling: bool,
}

impl ArrayTestModule {
    pub fn new(default_attrs_path: AttrPath, element_modules: Vec<TestModuleRef>) -> Self {
        Self {
            name: format!("array<{}>", test_modules_name(&element_modules)),
            default_attrs_path,
            needs_immediate_handling: check_needs_immediate_handling(&element_modules),
            layout: Rc::new(Layout::Array { element_modules }),
        }
    }
}

impl TestModule for ArrayTestModule {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn default_attrs_path(&self) -> AttrPath {
        self.default_attrs_path.clone()
    }

    fn is_test_data_valid(&self, value: &Value) -> bool {
        matches!(value, Value::List(_))
    }

    fn needs_immediate_handling(&self) -> bool {
        self.needs_immediate_handling
    }

    fn description_maintainer(
        &self,
        value: &Value,
        setter: DescriptionSetter,
    ) -> Box<dyn DescriptionMaintainer> {
        let len = value.attr_names().len();
        ConstantDescription::new(format!("{}({})", self.name, len), setter)
    }

    fn create_task(&self, tmi: InterfaceForTask, value: Value) -> Box<dyn Task> {
        create_collection_task(tmi, value, &self.layout, &self.default_attrs_path)
    }
}

/// `Object`: anything with attributes; each attribute is classified against
/// its own candidates or `default_modules`.
pub struct ObjectTestModule {
    default_attrs_path: AttrPath,
    layout: Rc<Layout>,
}

impl ObjectTestModule {
    pub fn new(
        default_attrs_path: AttrPath,
        attribute_modules: IndexMap<String, Vec<TestModuleRef>>,
        default_modules: Vec<TestModuleRef>,
    ) -> Self {
        Self {
            default_attrs_path,
            layout: Rc::new(Layout::Object {
                attribute_modules,
                default_modules,
            }),
        }
    }
}

impl TestModule for ObjectTestModule {
    fn name(&self) -> String {
        "Object".to_string()
    }

    fn default_attrs_path(&self) -> AttrPath {
        self.default_attrs_path.clone()
    }

    fn is_test_data_valid(&self, value: &Value) -> bool {
        value.is_container()
    }

    fn description_maintainer(
        &self,
        _value: &Value,
        setter: DescriptionSetter,
    ) -> Box<dyn DescriptionMaintainer> {
        ConstantDescription::new("Object".to_string(), setter)
    }

    fn create_task(&self, tmi: InterfaceForTask, value: Value) -> Box<dyn Task> {
        create_collection_task(tmi, value, &self.layout, &self.default_attrs_path)
    }
}

fn create_collection_task(
    tmi: InterfaceForTask,
    value: Value,
    layout: &Rc<Layout>,
    default_attrs_path: &AttrPath,
) -> Box<dyn Task> {
    let ctx = tmi.context().clone();
    let model = CollectionModel::new(value, Rc::clone(layout), ctx.log().clone());
    let controller = CollectionController::new(tmi, &ctx, model.clone(), default_attrs_path.clone());
    Box::new(TestTask::plain(&ctx, model, controller))
}

// ─────────────────────────────────────────────────────────────────
// Model
// ─────────────────────────────────────────────────────────────────

struct Entry {
    id: ElementId,
    key: String,
    maintainer: Box<dyn DescriptionMaintainer>,
}

struct CollectionModel {
    core: Rc<ModelCore>,
    value: Value,
    layout: Rc<Layout>,
    log: MessageLog,
    length_id: Option<ElementId>,
    refresh_id: ElementId,
    entries: RefCell<Vec<Entry>>,
}

impl CollectionModel {
    fn new(value: Value, layout: Rc<Layout>, log: MessageLog) -> Rc<Self> {
        let core = Rc::new(ModelCore::new());
        let length_id = match *layout {
            Layout::Array { .. } => Some(core.push(Element::new(ElementKind::Attribute, "length"))),
            Layout::Object { .. } => None,
        };
        let refresh_id = core.push(Element::new(
            ElementKind::Options(vec!["Refresh".to_string()]),
            "refresh",
        ));
        let model = Rc::new(Self {
            core,
            value,
            layout,
            log,
            length_id,
            refresh_id,
            entries: RefCell::new(Vec::new()),
        });
        model.refresh_all();
        model
    }

    /// Rebuild every entry row from the current value.
    fn refresh_all(&self) {
        let stale = std::mem::take(&mut *self.entries.borrow_mut());
        for mut entry in stale.into_iter().rev() {
            entry.maintainer.dispose();
            self.core.remove(entry.id);
        }

        let keys = self.value.attr_names();
        if let Some(length_id) = self.length_id {
            self.core.set_description(length_id, keys.len().to_string());
        }

        let mut fresh = Vec::with_capacity(keys.len());
        for key in keys {
            let reference = self.value.get_attr(&key).unwrap_or_default();
            let (module, name) = self.classify(&key, &reference);
            let index = self.core.len() - 1;
            let id = self.core.insert(
                index,
                Element::new(ElementKind::Attribute, name)
                    .with_reference(reference.clone(), module.clone())
                    .refreshable(),
            );
            let maintainer =
                module.description_maintainer(&reference, description_setter(&self.core, id));
            fresh.push(Entry { id, key, maintainer });
        }
        let ids: Vec<ElementId> = fresh.iter().map(|entry| entry.id).collect();
        *self.entries.borrow_mut() = fresh;

        for id in ids {
            self.core.emit(ModelEvent::ElementReferenceChanged(id));
        }
    }

    /// Re-read one entry; a no-op unless its value was replaced.
    fn refresh_element(&self, id: ElementId) {
        let Some(key) = self.key_of(id) else {
            return;
        };
        let current = self.value.get_attr(&key).unwrap_or_default();
        let unchanged = self
            .core
            .element(id)
            .and_then(|element| element.reference)
            .is_some_and(|reference| reference.same(&current));
        if unchanged {
            return;
        }

        let old = self.replace_maintainer(id, Box::new(ConstantDescription));
        if let Some(mut old) = old {
            old.dispose();
        }
        let (module, _) = self.classify(&key, &current);
        self.core.update(id, |element| {
            element.reference = Some(current.clone());
            element.test_module = Some(module.clone());
            element.child_task = None;
        });
        let maintainer = module.description_maintainer(&current, description_setter(&self.core, id));
        self.replace_maintainer(id, maintainer);
        self.core.emit(ModelEvent::ElementReferenceChanged(id));
    }

    fn classify(&self, key: &str, value: &Value) -> (TestModuleRef, String) {
        let candidates = self.layout.candidates(key);
        let name = self.layout.row_name(key);
        log_if_invalid(&self.log, &name, candidates, value);
        (get_valid_test_module(candidates, value), name)
    }

    fn key_of(&self, id: ElementId) -> Option<String> {
        self.entries
            .borrow()
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.key.clone())
    }

    fn replace_maintainer(
        &self,
        id: ElementId,
        maintainer: Box<dyn DescriptionMaintainer>,
    ) -> Option<Box<dyn DescriptionMaintainer>> {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.iter_mut().find(|entry| entry.id == id)?;
        Some(std::mem::replace(&mut entry.maintainer, maintainer))
    }
}

impl TestModel for CollectionModel {
    fn core(&self) -> &ModelCore {
        &self.core
    }

    fn destroy(&self) {
        for entry in self.entries.borrow_mut().iter_mut() {
            entry.maintainer.dispose();
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────

struct CollectionController {
    this: Weak<CollectionController>,
    tmi: InterfaceForTask,
    ctx: HarnessContext,
    model: Rc<CollectionModel>,
    default_attrs_path: AttrPath,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl CollectionController {
    fn new(
        tmi: InterfaceForTask,
        ctx: &HarnessContext,
        model: Rc<CollectionModel>,
        default_attrs_path: AttrPath,
    ) -> Rc<Self> {
        let controller = Rc::new_cyclic(|this: &Weak<Self>| Self {
            this: this.clone(),
            tmi,
            ctx: ctx.clone(),
            model,
            default_attrs_path,
            subscriptions: RefCell::new(Vec::new()),
        });

        controller
            .model
            .set_editable(controller.ctx.mode().is_engineer());

        let weak = controller.this.clone();
        let on_mode = controller.ctx.mode().subscribe(move |mode| {
            if let Some(controller) = weak.upgrade() {
                controller.model.set_editable(mode.is_engineer());
            }
        });
        let weak = controller.this.clone();
        let on_reference = controller.model.events().subscribe(move |event| {
            if let (ModelEvent::ElementReferenceChanged(id), Some(controller)) =
                (event, weak.upgrade())
            {
                controller.on_reference_changed(*id);
            }
        });
        controller
            .subscriptions
            .borrow_mut()
            .extend([on_mode, on_reference]);
        controller
    }

    fn on_reference_changed(&self, id: ElementId) {
        let immediate = self
            .model
            .core
            .element(id)
            .and_then(|element| element.test_module)
            .is_some_and(|module| module.needs_immediate_handling());
        if immediate {
            open_element_task(&self.tmi, &self.model.core, id);
        }
    }

    fn setter_for(&self, id: ElementId) -> Option<ValueSetter> {
        if !self.ctx.mode().is_engineer() {
            return None;
        }
        let key = self.model.key_of(id)?;
        let weak = self.this.clone();
        Some(Rc::new(move |value: Value| {
            let Some(controller) = weak.upgrade() else {
                return;
            };
            if let Err(e) = controller.model.value.set_attr(&key, value) {
                controller
                    .ctx
                    .log()
                    .error(controller.model.layout.assign_error(), e.to_detail());
            }
            controller.model.refresh_element(id);
        }))
    }
}

impl Controller for CollectionController {
    fn save_to_var_tree(&self) {
        self.tmi.create_popup_task(
            create_put_value_task(self.default_attrs_path.clone(), self.model.value.clone()),
            true,
            None,
        );
    }

    fn edit_by_var_tree(&self) {
        let model = Rc::downgrade(&self.model);
        self.tmi.create_popup_task(
            create_task_on_custom_root(self.model.value.clone(), false, true),
            true,
            Some(Box::new(move |_| {
                if let Some(model) = model.upgrade() {
                    model.refresh_all();
                }
            })),
        );
    }

    fn choose_option(&self, id: ElementId, _option: &str) {
        if id == self.model.refresh_id {
            self.model.refresh_all();
        }
    }

    fn refresh_attribute(&self, id: ElementId) {
        self.model.refresh_element(id);
    }

    fn enter_attribute(&self, id: ElementId) {
        enter_element_task(&self.tmi, &self.model.core, id);
    }

    fn select_attribute(&self, id: ElementId) {
        let Some(element) = self.model.core.element(id) else {
            return;
        };
        let (Some(reference), Some(module)) = (element.reference, element.test_module) else {
            return;
        };
        self.tmi.create_popup_task(
            create_save_or_reset_task(module.default_attrs_path(), reference, self.setter_for(id)),
            true,
            None,
        );
    }

    fn destroy(&self) {
        self.subscriptions.borrow_mut().clear();
    }
}
