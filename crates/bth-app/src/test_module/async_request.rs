//! DOMRequest test modules

use bth_core::{AsyncRequest, AttrPath, Value};

use super::interface::{
    generate_interface_test_module, AttributeSpec, AutoRefreshAttributes, InterfaceDefinition,
    InterfaceSpec,
};
use super::{test_modules_name, EventDescription, PrimitiveTestModule, TestModuleRef};

fn ready_state_description(value: &Value) -> String {
    let state = value.get_attr("readyState").unwrap_or_default();
    format!("readyState={}", state.as_str().unwrap_or("undefined"))
}

/// `DOMRequest<results, errors>`: `readyState`, `result` and `error` rows,
/// all refreshed when the request completes.
pub fn async_request_test_module(
    default_attrs_path: AttrPath,
    result_modules: Vec<TestModuleRef>,
    error_modules: Vec<TestModuleRef>,
    general: &TestModuleRef,
) -> TestModuleRef {
    let name = format!(
        "DOMRequest<{}, {}>",
        test_modules_name(&result_modules),
        test_modules_name(&error_modules)
    );
    let ready_state: TestModuleRef = std::rc::Rc::new(PrimitiveTestModule::new(
        "string",
        "readyState",
        AttrPath::new(),
    ));

    let definition = InterfaceDefinition::new(name, default_attrs_path, |value: &Value| {
        value.downcast_object::<AsyncRequest>().is_some()
    })
    .description(|value, setter| {
        EventDescription::new(value, &["success", "error"], ready_state_description, setter)
    })
    .spec(
        InterfaceSpec::new()
            .attribute("readyState", AttributeSpec::new().test_module(ready_state))
            .attribute("result", AttributeSpec::new().test_modules(result_modules))
            .attribute("error", AttributeSpec::new().test_modules(error_modules)),
    )
    .meta(|model, _mode| AutoRefreshAttributes::always(model, 0, &["success", "error"], None))
    .needs_immediate_handling(true);

    generate_interface_test_module(definition, general)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::test_module::BuiltinModules;

    #[test]
    fn test_description_follows_ready_state() {
        let b = BuiltinModules::new();
        let module = b.general_async_request();
        assert_eq!(module.name(), "DOMRequest<general, general>");

        let request = AsyncRequest::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _m = module.description_maintainer(
            &Value::Object(request.clone()),
            Rc::new(move |d| sink.borrow_mut().push(d)),
        );
        request.fire_success(Value::from(1));
        assert_eq!(*seen.borrow(), vec!["readyState=pending", "readyState=done"]);
    }
}
