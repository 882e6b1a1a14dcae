//! The general test module and the built-in module registry

use std::cell::OnceCell;
use std::rc::Rc;

use bth_core::prelude::*;
use bth_core::{AttrPath, Value, VarTree};
use indexmap::IndexMap;

use super::{
    async_request_test_module, error_test_module, get_valid_test_module, promise_test_module,
    ArrayTestModule, DescriptionMaintainer, DescriptionSetter, ObjectTestModule,
    PrimitiveTestModule, TestModule, TestModuleRef, INVALID_TEST_DATA_PATH,
};
use crate::task_manager::{InterfaceForTask, Task};

/// Accepts every value and hands it to the first built-in module that
/// accepts it.
pub struct GeneralTestModule {
    delegates: OnceCell<Vec<TestModuleRef>>,
}

impl GeneralTestModule {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            delegates: OnceCell::new(),
        })
    }

    fn delegate(&self, value: &Value) -> TestModuleRef {
        let delegates = self.delegates.get().map(Vec::as_slice).unwrap_or_default();
        get_valid_test_module(delegates, value)
    }
}

impl TestModule for GeneralTestModule {
    fn name(&self) -> String {
        "general".to_string()
    }

    fn default_attrs_path(&self) -> AttrPath {
        vec!["GeneralTestData".to_string()]
    }

    fn is_test_data_valid(&self, _value: &Value) -> bool {
        true
    }

    fn description_maintainer(
        &self,
        value: &Value,
        setter: DescriptionSetter,
    ) -> Box<dyn DescriptionMaintainer> {
        self.delegate(value).description_maintainer(value, setter)
    }

    fn create_task(&self, tmi: InterfaceForTask, value: Value) -> Box<dyn Task> {
        let module = self.delegate(&value);
        tmi.set_name(&module.name());
        module.create_task(tmi, value)
    }
}

/// The modules every harness ships with.
///
/// The general module and the general containers refer to each other; the
/// registry lives as long as the process.
#[derive(Clone)]
pub struct BuiltinModules {
    undefined: TestModuleRef,
    null: TestModuleRef,
    boolean: TestModuleRef,
    number: TestModuleRef,
    string: TestModuleRef,
    general: TestModuleRef,
    general_array: TestModuleRef,
    general_object: TestModuleRef,
    general_promise: TestModuleRef,
    general_async_request: TestModuleRef,
    error: TestModuleRef,
}

impl BuiltinModules {
    pub fn new() -> Self {
        let general = GeneralTestModule::new();
        let general_ref: TestModuleRef = general.clone();

        let undefined: TestModuleRef = Rc::new(PrimitiveTestModule::builtin("undefined"));
        let null: TestModuleRef = Rc::new(PrimitiveTestModule::builtin("null"));
        let boolean: TestModuleRef = Rc::new(PrimitiveTestModule::builtin("boolean"));
        let number: TestModuleRef = Rc::new(PrimitiveTestModule::builtin("number"));
        let string: TestModuleRef = Rc::new(PrimitiveTestModule::builtin("string"));
        let general_array: TestModuleRef = Rc::new(ArrayTestModule::new(
            vec!["GeneralArray".to_string()],
            vec![general_ref.clone()],
        ));
        let general_object: TestModuleRef = Rc::new(ObjectTestModule::new(
            vec!["GeneralObject".to_string()],
            IndexMap::new(),
            vec![general_ref.clone()],
        ));

        // Order decides classification.
        let delegates = vec![
            undefined.clone(),
            null.clone(),
            boolean.clone(),
            number.clone(),
            string.clone(),
            general_array.clone(),
            general_object.clone(),
        ];
        if general.delegates.set(delegates).is_err() {
            warn!("general test module initialized twice");
        }

        let general_promise = promise_test_module(
            vec!["promise".to_string()],
            vec![general_ref.clone()],
            vec![general_ref.clone()],
            &general_ref,
        );
        let general_async_request = async_request_test_module(
            vec!["domRequest".to_string()],
            vec![general_ref.clone()],
            vec![general_ref.clone()],
            &general_ref,
        );
        let error = error_test_module(&general_ref);

        Self {
            undefined,
            null,
            boolean,
            number,
            string,
            general: general_ref,
            general_array,
            general_object,
            general_promise,
            general_async_request,
            error,
        }
    }

    pub fn undefined(&self) -> TestModuleRef {
        self.undefined.clone()
    }

    pub fn null(&self) -> TestModuleRef {
        self.null.clone()
    }

    pub fn boolean(&self) -> TestModuleRef {
        self.boolean.clone()
    }

    pub fn number(&self) -> TestModuleRef {
        self.number.clone()
    }

    pub fn string(&self) -> TestModuleRef {
        self.string.clone()
    }

    pub fn general(&self) -> TestModuleRef {
        self.general.clone()
    }

    pub fn general_array(&self) -> TestModuleRef {
        self.general_array.clone()
    }

    pub fn general_object(&self) -> TestModuleRef {
        self.general_object.clone()
    }

    pub fn general_promise(&self) -> TestModuleRef {
        self.general_promise.clone()
    }

    pub fn general_async_request(&self) -> TestModuleRef {
        self.general_async_request.clone()
    }

    pub fn error(&self) -> TestModuleRef {
        self.error.clone()
    }

    fn all(&self) -> [&TestModuleRef; 11] {
        [
            &self.undefined,
            &self.null,
            &self.boolean,
            &self.number,
            &self.string,
            &self.general,
            &self.general_array,
            &self.general_object,
            &self.general_promise,
            &self.general_async_request,
            &self.error,
        ]
    }

    /// Put an empty list at every default path so saved values have a
    /// place to land.
    pub fn reserve_default_paths(&self, var_tree: &VarTree) {
        let mut paths: Vec<AttrPath> = self
            .all()
            .iter()
            .map(|module| module.default_attrs_path())
            .collect();
        paths.push(vec![INVALID_TEST_DATA_PATH.to_string()]);
        for path in paths {
            if var_tree.get_value(&path).is_undefined() {
                var_tree.put_value(&path, Value::list(Vec::new()));
            }
        }
    }
}

impl Default for BuiltinModules {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bth_core::Promise;

    fn describe(module: &TestModuleRef, value: &Value) -> String {
        let seen = Rc::new(std::cell::RefCell::new(String::new()));
        let sink = seen.clone();
        let _m = module.description_maintainer(value, Rc::new(move |d| *sink.borrow_mut() = d));
        let description = seen.borrow().clone();
        description
    }

    #[test]
    fn test_general_delegates_in_order() {
        let b = BuiltinModules::new();
        let general = b.general();
        let cases = [
            (Value::Undefined, "undefined"),
            (Value::Null, "null"),
            (Value::from(true), "true"),
            (Value::from(2), "2"),
            (Value::from("s"), "\"s\""),
            (Value::list(vec![Value::Null]), "array<general>(1)"),
            (Value::map(), "Object"),
        ];
        for (value, expected) in cases {
            assert_eq!(describe(&general, &value), expected);
        }
    }

    #[test]
    fn test_general_description_comes_from_delegate() {
        let b = BuiltinModules::new();
        assert_eq!(describe(&b.general(), &Value::from(5)), "5");
        assert_eq!(describe(&b.general(), &Value::from(1.5)), "1.5");
    }

    #[test]
    fn test_live_objects_fall_to_object_module() {
        let b = BuiltinModules::new();
        let promise = Value::Object(Promise::new());
        assert!(b.general_promise().is_test_data_valid(&promise));
        assert!(!b.general_promise().is_test_data_valid(&Value::map()));
        assert!(b.general_object().is_test_data_valid(&promise));
    }

    #[test]
    fn test_reserve_default_paths() {
        let b = BuiltinModules::new();
        let tree = VarTree::new();
        b.reserve_default_paths(&tree);
        for path in ["number", "GeneralTestData", "promise", "domRequest", "invalidTestData"] {
            assert!(
                matches!(tree.get_value(&[path]), Value::List(_)),
                "missing {}",
                path
            );
        }
    }
}
