//! Promise test modules

use std::rc::Rc;

use bth_core::{AttrPath, Promise, Value};

use super::interface::{
    generate_interface_test_module, AttributeSpec, AutoRefreshAttributes, EventSpec,
    InterfaceDefinition, InterfaceSpec,
};
use super::{test_modules_name, PrimitiveTestModule, PromiseDescription, TestModuleRef};

/// `Promise<results, reasons>`: a `state` row plus one row collecting the
/// fulfillment value and one collecting the rejection reason. Opens as
/// soon as a promise shows up so its settlement is not missed.
pub fn promise_test_module(
    default_attrs_path: AttrPath,
    result_modules: Vec<TestModuleRef>,
    reject_modules: Vec<TestModuleRef>,
    general: &TestModuleRef,
) -> TestModuleRef {
    let name = format!(
        "Promise<{}, {}>",
        test_modules_name(&result_modules),
        test_modules_name(&reject_modules)
    );
    let state: TestModuleRef = Rc::new(PrimitiveTestModule::new("string", "state", AttrPath::new()));

    let definition = InterfaceDefinition::new(name, default_attrs_path, |value: &Value| {
        value.downcast_object::<Promise>().is_some()
    })
    .description(PromiseDescription::new)
    .spec(
        InterfaceSpec::new()
            .attribute("state", AttributeSpec::new().test_module(state))
            .event(
                "resolved",
                EventSpec::new().event_object_test_modules(result_modules),
            )
            .event(
                "rejected",
                EventSpec::new().event_object_test_modules(reject_modules),
            ),
    )
    .meta(|model, _mode| {
        AutoRefreshAttributes::always(
            model,
            0,
            &["resolved", "rejected"],
            Some(vec!["state".to_string()]),
        )
    })
    .needs_immediate_handling(true);

    generate_interface_test_module(definition, general)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_module::BuiltinModules;

    #[test]
    fn test_name_lists_both_module_sets() {
        let b = BuiltinModules::new();
        let module = promise_test_module(
            vec!["p".into()],
            vec![b.number(), b.string()],
            vec![b.error()],
            &b.general(),
        );
        assert_eq!(module.name(), "Promise<number|string, Error>");
        assert!(module.needs_immediate_handling());
        assert!(module.is_test_data_valid(&Value::Object(Promise::new())));
        assert!(!module.is_test_data_valid(&Value::map()));
    }
}
