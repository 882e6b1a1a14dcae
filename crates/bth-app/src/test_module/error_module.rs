//! Test module for errors raised by objects under test

use bth_core::{ErrorObject, Value};

use super::interface::{
    generate_interface_test_module, AttributeSpec, InterfaceDefinition, InterfaceSpec, MethodSpec,
};
use super::{ConstantDescription, TestModuleRef};

const ATTRIBUTES: [&str; 6] = [
    "message",
    "name",
    "fileName",
    "lineNumber",
    "columnNumber",
    "stack",
];

/// `Error`, stored under `["Error"]`, described as `message=<message>`.
pub fn error_test_module(general: &TestModuleRef) -> TestModuleRef {
    let spec = ATTRIBUTES
        .iter()
        .fold(InterfaceSpec::new(), |spec, name| {
            spec.attribute(name, AttributeSpec::new())
        })
        .method("toSource", MethodSpec::new())
        .method("toString", MethodSpec::new());

    let definition = InterfaceDefinition::new("Error", vec!["Error".to_string()], |value: &Value| {
        value.downcast_object::<ErrorObject>().is_some()
    })
    .description(|value, setter| {
        let message = value.get_attr("message").unwrap_or_default();
        ConstantDescription::new(format!("message={}", message.to_display_string()), setter)
    })
    .spec(spec);

    generate_interface_test_module(definition, general)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use bth_core::ErrorRecord;

    use crate::test_module::BuiltinModules;

    #[test]
    fn test_error_description_and_validity() {
        let b = BuiltinModules::new();
        let module = b.error();
        let error = Value::object(ErrorObject::new(ErrorRecord::new("TypeError", "bad")));
        assert!(module.is_test_data_valid(&error));
        assert!(!module.is_test_data_valid(&Value::map()));
        assert_eq!(module.default_attrs_path(), vec!["Error".to_string()]);

        let seen = Rc::new(RefCell::new(String::new()));
        let sink = seen.clone();
        let _m = module.description_maintainer(&error, Rc::new(move |d| *sink.borrow_mut() = d));
        assert_eq!(*seen.borrow(), "message=\"bad\"");
    }
}
