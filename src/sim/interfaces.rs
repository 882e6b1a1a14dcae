//! Test modules for the simulated Bluetooth objects

use std::rc::Rc;

use bth_app::test_module::interface::{
    generate_interface_test_module, is_instance_of, ArgSpec, AttributeSpec,
    AutoRefreshAttributes, EventSpec, InterfaceDefinition, InterfaceSpec, MethodSpec,
};
use bth_app::test_module::{
    async_request_test_module, promise_test_module, ArrayTestModule, BuiltinModules,
    EventDescription, TestModuleRef,
};
use bth_app::tasks::ClassRegistry;
use bth_core::{attrs_path, Value};

pub const ADAPTER_CLASS: &str = "BluetoothAdapter";
pub const DEVICE_CLASS: &str = "BluetoothDevice";

#[derive(Clone)]
pub struct BluetoothModules {
    pub adapter: TestModuleRef,
    pub device: TestModuleRef,
}

/// `name=<name>`, redrawn whenever the object announces a change.
fn name_description(value: &Value) -> String {
    format!(
        "name={}",
        value.get_attr("name").unwrap_or_default().to_simple_string()
    )
}

fn void_promise(b: &BuiltinModules, path: &[&str]) -> TestModuleRef {
    promise_test_module(
        attrs_path(path),
        vec![b.undefined()],
        vec![b.error()],
        &b.general(),
    )
}

fn void_request(b: &BuiltinModules, path: &[&str]) -> TestModuleRef {
    async_request_test_module(
        attrs_path(path),
        vec![b.undefined()],
        vec![b.error()],
        &b.general(),
    )
}

fn device_module(b: &BuiltinModules) -> TestModuleRef {
    let definition = InterfaceDefinition::new(
        DEVICE_CLASS,
        attrs_path(&[DEVICE_CLASS]),
        is_instance_of(DEVICE_CLASS),
    )
    .description(|value, setter| {
        EventDescription::new(value, &["attributechanged"], name_description, setter)
    })
    .spec(
        InterfaceSpec::new()
            .attribute("address", AttributeSpec::new().test_module(b.string()))
            .attribute("name", AttributeSpec::new().test_module(b.string()))
            .attribute("paired", AttributeSpec::new().test_module(b.boolean()))
            .attribute("connected", AttributeSpec::new().test_module(b.boolean()))
            .event("attributechanged", EventSpec::new())
            .method(
                "pair",
                MethodSpec::new().return_value_test_module(void_promise(b, &["pairPromise"])),
            )
            .method(
                "connectGatt",
                MethodSpec::new().return_value_test_module(async_request_test_module(
                    attrs_path(&["gattRequest"]),
                    vec![b.boolean()],
                    vec![b.error()],
                    &b.general(),
                )),
            ),
    )
    .meta(|model, mode| AutoRefreshAttributes::new(model, mode, 0, &["attributechanged"], None));
    generate_interface_test_module(definition, &b.general())
}

fn adapter_module(b: &BuiltinModules, device: &TestModuleRef) -> TestModuleRef {
    let paired_devices: TestModuleRef = Rc::new(ArrayTestModule::new(
        attrs_path(&["pairedDevices"]),
        vec![device.clone()],
    ));
    let definition = InterfaceDefinition::new(
        ADAPTER_CLASS,
        attrs_path(&[ADAPTER_CLASS]),
        is_instance_of(ADAPTER_CLASS),
    )
    .description(|value, setter| {
        EventDescription::new(value, &["attributechanged"], name_description, setter)
    })
    .spec(
        InterfaceSpec::new()
            .attribute(
                "name",
                AttributeSpec::new().writable().test_module(b.string()),
            )
            .attribute("address", AttributeSpec::new().test_module(b.string()))
            .attribute("enabled", AttributeSpec::new().writable().switchable())
            .attribute("discoverable", AttributeSpec::new().writable().switchable())
            .attribute("discovering", AttributeSpec::new().test_module(b.boolean()))
            .event(
                "devicefound",
                EventSpec::new().event_object_test_module(device.clone()),
            )
            .event("attributechanged", EventSpec::new())
            .method(
                "startDiscovery",
                MethodSpec::new().return_value_test_module(void_request(b, &["discoveryRequest"])),
            )
            .method(
                "stopDiscovery",
                MethodSpec::new().return_value_test_module(void_request(b, &["discoveryRequest"])),
            )
            .method(
                "getPairedDevices",
                MethodSpec::new().return_value_test_module(promise_test_module(
                    attrs_path(&["pairedDevicesPromise"]),
                    vec![paired_devices],
                    vec![b.error()],
                    &b.general(),
                )),
            ),
    )
    .meta(|model, mode| AutoRefreshAttributes::new(model, mode, 0, &["attributechanged"], None));
    generate_interface_test_module(definition, &b.general())
}

pub fn bluetooth_modules(b: &BuiltinModules) -> BluetoothModules {
    let device = device_module(b);
    let adapter = adapter_module(b, &device);
    BluetoothModules { adapter, device }
}

/// Classes the instance creator offers for the simulated stack.
pub fn register_classes(classes: &ClassRegistry) {
    classes.register_struct(
        "DeviceFilter",
        attrs_path(&["DeviceFilter"]),
        &["name", "address"],
    );
    classes.register_class(
        "ErrorRecord",
        attrs_path(&["Error"]),
        |args| {
            let text = |i: usize| {
                args.get(i)
                    .map(|value| match value {
                        Value::String(s) => s.to_string(),
                        other => other.to_display_string(),
                    })
                    .unwrap_or_default()
            };
            let record = bth_core::ErrorRecord::new(text(0), text(1));
            Ok(Value::Object(Rc::new(bth_core::ErrorObject::new(record))))
        },
        vec![
            ArgSpec::new("name").default_value("Error"),
            ArgSpec::new("message").default_value(""),
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use bth_app::TestModule;
    use bth_core::DynamicObject;

    #[test]
    fn test_modules_accept_their_class_only() {
        let b = BuiltinModules::new();
        let modules = bluetooth_modules(&b);
        let device = Value::Object(DynamicObject::builder(DEVICE_CLASS).build());
        let adapter = Value::Object(DynamicObject::builder(ADAPTER_CLASS).build());

        assert!(modules.device.is_test_data_valid(&device));
        assert!(!modules.device.is_test_data_valid(&adapter));
        assert!(modules.adapter.is_test_data_valid(&adapter));
        assert_eq!(modules.adapter.name(), ADAPTER_CLASS);
        assert_eq!(modules.adapter.default_attrs_path(), vec![ADAPTER_CLASS]);
    }

    #[test]
    fn test_register_classes_builds_error_objects() {
        let classes = ClassRegistry::new();
        register_classes(&classes);
        assert_eq!(classes.class_names(), vec!["DeviceFilter", "ErrorRecord"]);

        let info = classes.get("ErrorRecord").unwrap();
        let error = (info.constructor)(&[Value::from("NotFoundError"), Value::from("gone")])
            .unwrap();
        assert_eq!(error.get_attr("name"), Some(Value::from("NotFoundError")));
        assert_eq!(error.get_attr("message"), Some(Value::from("gone")));
    }
}
