//! Test modules and value classification
//!
//! A test module bundles a membership predicate, a live description of a
//! value and a task factory for one class of values. Candidate lists are
//! priority ordered: [`get_valid_test_module`] takes the first module that
//! accepts the value and never sorts.

mod collection;
mod description;
mod error_module;
mod general;
mod invalid;
mod primitive;
mod promise;
mod async_request;

pub mod interface;

pub use async_request::async_request_test_module;
pub use collection::{ArrayTestModule, ObjectTestModule};
pub use description::{
    description_setter, ConstantDescription, DescriptionMaintainer, DescriptionSetter,
    EventDescription, PromiseDescription,
};
pub use error_module::error_test_module;
pub use general::{BuiltinModules, GeneralTestModule};
pub use invalid::{InvalidTestDataModule, INVALID_TEST_DATA_PATH};
pub use primitive::PrimitiveTestModule;
pub use promise::promise_test_module;

use std::rc::Rc;

use bth_core::{AttrPath, MessageLog, Value};

use crate::task_manager::{InterfaceForTask, Task, TaskCreator, TaskId};
use crate::test_task::{ElementId, ModelCore};

/// Behavior bundle for one class of values.
pub trait TestModule {
    /// Display name, composable (`array<number|string>`).
    fn name(&self) -> String;

    /// Where values of this type are stored in the Variable Tree by default.
    fn default_attrs_path(&self) -> AttrPath;

    fn is_test_data_valid(&self, value: &Value) -> bool;

    /// Values of this type open a child task as soon as they show up.
    fn needs_immediate_handling(&self) -> bool {
        false
    }

    /// Start maintaining the description of `value`; `setter` is called with
    /// every new description, possibly before this returns.
    fn description_maintainer(
        &self,
        value: &Value,
        setter: DescriptionSetter,
    ) -> Box<dyn DescriptionMaintainer>;

    fn create_task(&self, tmi: InterfaceForTask, value: Value) -> Box<dyn Task>;
}

pub type TestModuleRef = Rc<dyn TestModule>;

/// First candidate accepting `value`; the invalid-data fallback when none
/// does.
pub fn get_valid_test_module(candidates: &[TestModuleRef], value: &Value) -> TestModuleRef {
    candidates
        .iter()
        .find(|module| module.is_test_data_valid(value))
        .cloned()
        .unwrap_or_else(|| Rc::new(InvalidTestDataModule::new(candidates)))
}

/// Candidate names joined with `|`.
pub fn test_modules_name(modules: &[TestModuleRef]) -> String {
    modules
        .iter()
        .map(|module| module.name())
        .collect::<Vec<_>>()
        .join("|")
}

pub fn check_needs_immediate_handling(modules: &[TestModuleRef]) -> bool {
    modules.iter().any(|module| module.needs_immediate_handling())
}

/// Append a WARNING naming `name` if no candidate accepts `value`.
pub fn log_if_invalid(log: &MessageLog, name: &str, candidates: &[TestModuleRef], value: &Value) {
    if !candidates
        .iter()
        .any(|module| module.is_test_data_valid(value))
    {
        log.append_message(
            bth_core::LogLevel::Warning,
            format!("{} is an invalid test data", name),
            Some(value.clone()),
        );
    }
}

/// Task creator running `module` on `value`.
pub fn task_creator(module: TestModuleRef, value: Value) -> TaskCreator {
    Box::new(move |tmi| module.create_task(tmi, value))
}

/// Open a child task for the value behind element `id` and remember it on
/// the element until that task is killed.
pub(crate) fn open_element_task(
    tmi: &InterfaceForTask,
    core: &Rc<ModelCore>,
    id: ElementId,
) -> Option<TaskId> {
    let element = core.element(id)?;
    let module = element.test_module?;
    let value = element.reference.unwrap_or_default();
    let name = module.name();

    let weak = Rc::downgrade(core);
    let task = tmi.create_child_task(
        task_creator(module, value),
        &name,
        true,
        Some(Box::new(move |killed| {
            if let Some(core) = weak.upgrade() {
                core.forget_child_task(id, killed);
            }
        })),
    )?;
    core.set_child_task(id, Some(task));
    Some(task)
}

/// Switch to the child task of element `id`, creating it first if needed.
pub(crate) fn enter_element_task(tmi: &InterfaceForTask, core: &Rc<ModelCore>, id: ElementId) {
    let Some(element) = core.element(id) else {
        return;
    };
    if element.test_module.is_none() {
        return;
    }
    let task = match element.child_task {
        Some(task) => Some(task),
        None => open_element_task(tmi, core, id),
    };
    if let Some(task) = task {
        tmi.switch_to_task(task);
    }
}
