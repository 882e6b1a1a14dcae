//! Interface test-module generator
//!
//! Turns a declarative description of a value's capability surface into a
//! test module. The value is first preprocessed into facets, one per
//! [`InterfaceSpec`]; the generated task shows one row per declared
//! attribute, method and event of every facet.

mod controller;
mod meta;
mod model;
mod spec;

#[cfg(test)]
mod tests;

pub use controller::InterfaceController;
pub use meta::AutoRefreshAttributes;
pub use model::{InterfaceModel, Row};
pub use spec::{
    args_spec, normalize, ArgSpec, AttributeSpec, EventSpec, InterfaceSpec, MemberSpec, MethodSpec,
};

use std::rc::Rc;

use bth_core::{AttrPath, ModeSwitch, Value};

use super::{ConstantDescription, DescriptionMaintainer, DescriptionSetter, TestModule, TestModuleRef};
use crate::task_manager::{InterfaceForTask, Task};
use crate::test_task::{MetaController, TestTask, VoidMetaController};

type Validator = Rc<dyn Fn(&Value) -> bool>;
type DescriptionFactory = Rc<dyn Fn(&Value, DescriptionSetter) -> Box<dyn DescriptionMaintainer>>;
type Preprocess = Rc<dyn Fn(&Value) -> Vec<Value>>;
type MetaFactory = Rc<dyn Fn(&Rc<InterfaceModel>, &ModeSwitch) -> Box<dyn MetaController>>;

/// Everything the generator needs to know about one kind of value.
pub struct InterfaceDefinition {
    name: String,
    default_attrs_path: AttrPath,
    is_valid: Validator,
    description: Option<DescriptionFactory>,
    specs: Vec<InterfaceSpec>,
    preprocess: Option<Preprocess>,
    meta: Option<MetaFactory>,
    needs_immediate_handling: bool,
}

impl InterfaceDefinition {
    pub fn new(
        name: impl Into<String>,
        default_attrs_path: AttrPath,
        is_valid: impl Fn(&Value) -> bool + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            default_attrs_path,
            is_valid: Rc::new(is_valid),
            description: None,
            specs: Vec::new(),
            preprocess: None,
            meta: None,
            needs_immediate_handling: false,
        }
    }

    /// Description maintainer; defaults to the module name.
    pub fn description(
        mut self,
        factory: impl Fn(&Value, DescriptionSetter) -> Box<dyn DescriptionMaintainer> + 'static,
    ) -> Self {
        self.description = Some(Rc::new(factory));
        self
    }

    pub fn spec(mut self, spec: InterfaceSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Split the value into facets, one per spec. Defaults to the value
    /// itself.
    pub fn preprocess(mut self, f: impl Fn(&Value) -> Vec<Value> + 'static) -> Self {
        self.preprocess = Some(Rc::new(f));
        self
    }

    pub fn meta(
        mut self,
        f: impl Fn(&Rc<InterfaceModel>, &ModeSwitch) -> Box<dyn MetaController> + 'static,
    ) -> Self {
        self.meta = Some(Rc::new(f));
        self
    }

    pub fn needs_immediate_handling(mut self, needs: bool) -> Self {
        self.needs_immediate_handling = needs;
        self
    }
}

/// Validator accepting live objects whose class is `class_name`.
pub fn is_instance_of(class_name: &'static str) -> impl Fn(&Value) -> bool {
    move |value| {
        value
            .as_object()
            .is_some_and(|object| object.class_name() == class_name)
    }
}

/// Test module generated from an [`InterfaceDefinition`].
pub struct InterfaceTestModule {
    name: String,
    default_attrs_path: AttrPath,
    is_valid: Validator,
    description: Option<DescriptionFactory>,
    specs: Rc<Vec<InterfaceSpec>>,
    preprocess: Option<Preprocess>,
    meta: Option<MetaFactory>,
    needs_immediate_handling: bool,
}

/// Empty module lists in `definition` fall back to `general`.
pub fn generate_interface_test_module(
    definition: InterfaceDefinition,
    general: &TestModuleRef,
) -> Rc<InterfaceTestModule> {
    let mut specs = definition.specs;
    let nested = normalize(&mut specs, general);
    Rc::new(InterfaceTestModule {
        name: definition.name,
        default_attrs_path: definition.default_attrs_path,
        is_valid: definition.is_valid,
        description: definition.description,
        specs: Rc::new(specs),
        preprocess: definition.preprocess,
        meta: definition.meta,
        needs_immediate_handling: definition.needs_immediate_handling || nested,
    })
}

impl InterfaceTestModule {
    fn facets(&self, value: &Value) -> Vec<Value> {
        match &self.preprocess {
            Some(preprocess) => preprocess(value),
            None => vec![value.clone()],
        }
    }
}

impl TestModule for InterfaceTestModule {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn default_attrs_path(&self) -> AttrPath {
        self.default_attrs_path.clone()
    }

    fn is_test_data_valid(&self, value: &Value) -> bool {
        (self.is_valid)(value)
    }

    fn needs_immediate_handling(&self) -> bool {
        self.needs_immediate_handling
    }

    fn description_maintainer(
        &self,
        value: &Value,
        setter: DescriptionSetter,
    ) -> Box<dyn DescriptionMaintainer> {
        match &self.description {
            Some(factory) => factory(value, setter),
            None => ConstantDescription::new(self.name.clone(), setter),
        }
    }

    fn create_task(&self, tmi: InterfaceForTask, value: Value) -> Box<dyn Task> {
        let ctx = tmi.context().clone();
        let model = InterfaceModel::new(self.specs.clone(), self.facets(&value));
        let controller =
            InterfaceController::new(tmi, model.clone(), value, self.default_attrs_path.clone());
        let meta = match &self.meta {
            Some(factory) => factory(&model, ctx.mode()),
            None => Box::new(VoidMetaController),
        };
        Box::new(TestTask::new(&ctx, model, controller, meta))
    }
}
