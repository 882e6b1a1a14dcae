//! Fallback module for values no candidate accepts

use std::rc::Rc;

use bth_core::prelude::*;
use bth_core::{AttrPath, Value};

use super::primitive::{value_element, SaveOnlyController};
use super::{ConstantDescription, DescriptionMaintainer, DescriptionSetter, TestModule, TestModuleRef};
use crate::task_manager::{InterfaceForTask, Task};
use crate::test_task::{Element, ElementKind, StaticModel, TestTask};

/// Variable Tree location for invalid values.
pub const INVALID_TEST_DATA_PATH: &str = "invalidTestData";

/// Accepts everything; shows why the value was rejected and still allows
/// saving it.
pub struct InvalidTestDataModule {
    tried: Vec<String>,
}

impl InvalidTestDataModule {
    pub fn new(candidates: &[TestModuleRef]) -> Self {
        let tried: Vec<String> = candidates.iter().map(|module| module.name()).collect();
        warn!("test data matched none of [{}]", tried.join(", "));
        Self { tried }
    }

    fn error_message(&self) -> String {
        if self.tried.is_empty() {
            "The test data is not valid.".to_string()
        } else {
            format!(
                "The test data is not valid to the all test modules: {}.",
                self.tried.join(", ")
            )
        }
    }
}

impl TestModule for InvalidTestDataModule {
    fn name(&self) -> String {
        "Invalid Test Data".to_string()
    }

    fn default_attrs_path(&self) -> AttrPath {
        vec![INVALID_TEST_DATA_PATH.to_string()]
    }

    fn is_test_data_valid(&self, _value: &Value) -> bool {
        true
    }

    fn description_maintainer(
        &self,
        value: &Value,
        setter: DescriptionSetter,
    ) -> Box<dyn DescriptionMaintainer> {
        ConstantDescription::new(format!("[invalid] {}", value.to_simple_string()), setter)
    }

    fn create_task(&self, tmi: InterfaceForTask, value: Value) -> Box<dyn Task> {
        let model = StaticModel::new([
            Element::new(ElementKind::Attribute, "Error").with_description(self.error_message()),
            value_element(&value),
        ]);
        let controller = Rc::new(SaveOnlyController::new(
            tmi.clone(),
            self.default_attrs_path(),
            value,
        ));
        Box::new(TestTask::plain(tmi.context(), model, controller))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_module::PrimitiveTestModule;

    #[test]
    fn test_error_message_lists_candidates() {
        let candidates: Vec<TestModuleRef> = vec![
            Rc::new(PrimitiveTestModule::builtin("number")),
            Rc::new(PrimitiveTestModule::builtin("string")),
        ];
        let module = InvalidTestDataModule::new(&candidates);
        assert_eq!(
            module.error_message(),
            "The test data is not valid to the all test modules: number, string."
        );
        assert_eq!(InvalidTestDataModule::new(&[]).error_message(), "The test data is not valid.");
    }

    #[test]
    fn test_description_marks_value_invalid() {
        let module = InvalidTestDataModule::new(&[]);
        let seen = Rc::new(std::cell::RefCell::new(String::new()));
        let sink = seen.clone();
        let _m = module.description_maintainer(
            &Value::from("abcdefghijklmnop"),
            Rc::new(move |d| *sink.borrow_mut() = d),
        );
        assert_eq!(*seen.borrow(), "[invalid] \"abcdefg...\"");
    }
}
