//! Primitive test modules (undefined, null, boolean, number, string)

use std::rc::Rc;

use bth_core::{AttrPath, Value};

use super::{ConstantDescription, DescriptionMaintainer, DescriptionSetter, TestModule};
use crate::task_manager::{InterfaceForTask, Task};
use crate::tasks::create_put_value_task;
use crate::test_task::{Controller, Element, ElementKind, StaticModel, TestTask};

/// Accepts values whose type string is `type_string`.
pub struct PrimitiveTestModule {
    type_string: String,
    name: String,
    default_attrs_path: AttrPath,
}

impl PrimitiveTestModule {
    pub fn new(
        type_string: impl Into<String>,
        name: impl Into<String>,
        default_attrs_path: AttrPath,
    ) -> Self {
        Self {
            type_string: type_string.into(),
            name: name.into(),
            default_attrs_path,
        }
    }

    /// Built-in module named after its type, stored under `[type]`.
    pub fn builtin(type_string: &str) -> Self {
        Self::new(type_string, type_string, vec![type_string.to_string()])
    }
}

impl TestModule for PrimitiveTestModule {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn default_attrs_path(&self) -> AttrPath {
        self.default_attrs_path.clone()
    }

    fn is_test_data_valid(&self, value: &Value) -> bool {
        value.type_string() == self.type_string
    }

    fn description_maintainer(
        &self,
        value: &Value,
        setter: DescriptionSetter,
    ) -> Box<dyn DescriptionMaintainer> {
        ConstantDescription::new(value.to_display_string(), setter)
    }

    fn create_task(&self, tmi: InterfaceForTask, value: Value) -> Box<dyn Task> {
        let model = StaticModel::new([
            Element::new(ElementKind::Attribute, "Type").with_description(&self.type_string),
            value_element(&value),
        ]);
        let controller = Rc::new(SaveOnlyController::new(
            tmi.clone(),
            self.default_attrs_path.clone(),
            value,
        ));
        Box::new(TestTask::plain(tmi.context(), model, controller))
    }
}

/// `Value` row showing the full rendering of `value`.
pub(crate) fn value_element(value: &Value) -> Element {
    let mut element =
        Element::new(ElementKind::Attribute, "Value").with_description(value.to_display_string());
    element.reference = Some(value.clone());
    element
}

/// Controller whose only command is saving the value to the Variable Tree.
pub(crate) struct SaveOnlyController {
    tmi: InterfaceForTask,
    default_attrs_path: AttrPath,
    value: Value,
}

impl SaveOnlyController {
    pub(crate) fn new(tmi: InterfaceForTask, default_attrs_path: AttrPath, value: Value) -> Self {
        Self {
            tmi,
            default_attrs_path,
            value,
        }
    }
}

impl Controller for SaveOnlyController {
    fn save_to_var_tree(&self) {
        self.tmi.create_popup_task(
            create_put_value_task(self.default_attrs_path.clone(), self.value.clone()),
            true,
            None,
        );
    }
}
