use std::rc::Rc;

use bth_core::{attrs_path, DynamicObject, Exception, LogLevel, Promise, SafetyMode, Value};

use super::*;
use crate::config::Settings;
use crate::context::HarnessContext;
use crate::headless::HeadlessViews;
use crate::task_manager::{TaskId, TaskManager};
use crate::test_module::{task_creator, BuiltinModules};
use crate::test_task::{Element, ElementId, ElementKind, TestTaskSurface};
use crate::view::ViewNode;

struct Fixture {
    manager: TaskManager,
    views: HeadlessViews,
    task: TaskId,
    surface: TestTaskSurface,
}

impl Fixture {
    fn builtins() -> (TaskManager, HeadlessViews, BuiltinModules) {
        let views = HeadlessViews::new();
        let ctx = HarnessContext::new(Settings::default(), Rc::new(views.clone()));
        let builtins = ctx.builtins().clone();
        (TaskManager::new(ctx), views, builtins)
    }

    fn open(
        manager: TaskManager,
        views: HeadlessViews,
        definition: InterfaceDefinition,
        value: Value,
    ) -> Self {
        let general = manager.context().builtins().general();
        let module = generate_interface_test_module(definition, &general);
        let task = manager.create_category("dut", &module.name(), task_creator(module, value));
        let surface = match manager.view_of(task) {
            Some(ViewNode::TestTask(surface)) => surface,
            other => panic!("expected a test task, got {:?}", other),
        };
        Self {
            manager,
            views,
            task,
            surface,
        }
    }

    fn id(&self, name: &str) -> ElementId {
        self.surface
            .model
            .find_by_name(name)
            .unwrap_or_else(|| panic!("no element {}", name))
    }

    fn element(&self, name: &str) -> Element {
        self.surface.model.element(self.id(name)).unwrap()
    }

    fn names(&self) -> Vec<String> {
        self.surface
            .model
            .elements()
            .into_iter()
            .map(|element| element.name)
            .collect()
    }

    fn removable_names(&self) -> Vec<String> {
        self.surface
            .model
            .elements()
            .into_iter()
            .filter(|element| element.kind == ElementKind::RemovableValue)
            .map(|element| element.name)
            .collect()
    }

    fn only_popup(&self) -> TaskId {
        let popups: Vec<TaskId> = self
            .manager
            .owned_by(self.task)
            .into_iter()
            .filter(|id| {
                self.manager
                    .task_info(*id)
                    .is_some_and(|info| info.kind == "popup")
            })
            .collect();
        assert_eq!(popups.len(), 1, "expected one popup, got {:?}", popups);
        popups[0]
    }
}

fn device() -> Rc<DynamicObject> {
    DynamicObject::builder("BluetoothDevice")
        .attribute("address", "00:11:22")
        .writable("name", "dev")
        .writable("mode", 0)
        .writable("enabled", false)
        .method("ping", |_, _| Ok(Value::from(1)))
        .method("explode", |_, _| {
            Err(Exception::error("NetworkError", "connection lost"))
        })
        .method("connect", |object, args| {
            object.update("lastArgs", Value::list(args.to_vec()));
            Ok(Value::Null)
        })
        .build()
}

fn device_definition(b: &BuiltinModules) -> InterfaceDefinition {
    InterfaceDefinition::new(
        "BluetoothDevice",
        attrs_path(&["devices"]),
        is_instance_of("BluetoothDevice"),
    )
    .spec(
        InterfaceSpec::new()
            .attribute("address", AttributeSpec::new().test_module(b.string()))
            .attribute("name", AttributeSpec::new().writable().test_module(b.string()))
            .attribute(
                "mode",
                AttributeSpec::new()
                    .writable()
                    .options([("on", Value::from(1)), ("off", Value::from(0))]),
            )
            .attribute("enabled", AttributeSpec::new().writable().switchable())
            .method("ping", MethodSpec::new())
            .method("explode", MethodSpec::new())
            .method("connect", MethodSpec::new().args([ArgSpec::new("uuid")]))
            .event("devicefound", EventSpec::new()),
    )
}

fn open_device() -> (Fixture, Rc<DynamicObject>) {
    let (manager, views, b) = Fixture::builtins();
    let object = device();
    let fixture = Fixture::open(
        manager,
        views,
        device_definition(&b),
        Value::Object(object.clone()),
    );
    (fixture, object)
}

#[test]
fn test_two_attribute_object_has_three_elements() {
    let (manager, views, b) = Fixture::builtins();
    let definition = InterfaceDefinition::new("Point", attrs_path(&["points"]), Value::is_container)
        .spec(
            InterfaceSpec::new()
                .attribute("x", AttributeSpec::new().test_module(b.number()))
                .attribute("y", AttributeSpec::new().test_module(b.string())),
        );
    let value = Value::map_of([("x", Value::from(1)), ("y", Value::from("hi"))]);
    let f = Fixture::open(manager, views, definition, value.clone());

    assert_eq!(f.names(), vec!["x", "y", "refresh"]);
    assert_eq!(f.element("x").description, "1");

    value.set_attr("x", Value::from(2)).unwrap();
    f.surface.controller.refresh_attribute(f.id("x"));

    assert_eq!(f.element("x").description, "2");
    assert_eq!(f.names(), vec!["x", "y", "refresh"]);
    let indices: Vec<usize> = f.surface.model.elements().iter().map(|e| e.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn test_throwing_method_is_logged_once_and_task_survives() {
    let (f, _object) = open_device();
    let before = f.names();

    f.surface.controller.enter_attribute(f.id("explode"));

    let log = f.manager.context().log();
    assert_eq!(log.count(LogLevel::Error), 1);
    let entries = log.entries();
    let entry = entries.last().unwrap();
    assert_eq!(entry.message, "exception caught while calling method");
    assert!(entry.has_detail);
    assert_eq!(f.names(), before);
    assert!(f.manager.contains(f.task));

    f.surface.controller.enter_attribute(f.id("ping"));
    assert_eq!(f.removable_names(), vec!["return value 0"]);
    assert_eq!(log.count(LogLevel::Error), 1);
}

#[test]
fn test_normal_mode_keeps_latest_return_value_and_enters_it() {
    let (f, _object) = open_device();
    let ping = f.id("ping");

    f.surface.controller.enter_attribute(ping);
    f.surface.controller.enter_attribute(ping);

    assert_eq!(f.removable_names(), vec!["return value 1"]);
    let latest = f.element("return value 1");
    assert_eq!(latest.index, f.surface.model.element(ping).unwrap().index + 1);
    let child = latest.child_task.expect("return value opened as a child task");
    assert!(f.manager.contains(child));
    assert_eq!(f.views.foreground(), Some(child));
    assert_eq!(f.views.page(child).unwrap().title, "number");
}

#[test]
fn test_engineer_mode_accumulates_return_values() {
    let (f, _object) = open_device();
    f.manager.context().mode().set_mode(SafetyMode::Engineer);
    let ping = f.id("ping");
    for _ in 0..3 {
        f.surface.controller.enter_attribute(ping);
    }
    assert_eq!(
        f.removable_names(),
        vec!["return value 2", "return value 1", "return value 0"]
    );
    assert!(f.element("return value 0").child_task.is_none());

    f.surface.controller.remove_attribute(f.id("return value 1"));
    assert_eq!(f.removable_names(), vec!["return value 2", "return value 0"]);
    let indices: Vec<usize> = f.surface.model.elements().iter().map(|e| e.index).collect();
    assert_eq!(indices, (0..indices.len()).collect::<Vec<_>>());
}

#[test]
fn test_event_objects_are_collected_until_destroy() {
    let (f, object) = open_device();
    let bucket = f.id("devicefound event objects:");

    object.fire("devicefound", &Value::from("dev-1"));
    object.fire("devicefound", &Value::from("dev-2"));
    assert_eq!(f.removable_names(), vec!["event object 1", "event object 0"]);
    let bucket_index = f.surface.model.element(bucket).unwrap().index;
    assert_eq!(f.element("event object 1").index, bucket_index + 1);

    f.manager.kill_task(f.task);
    assert_eq!(object.listener_count("devicefound"), 0);
}

#[test]
fn test_read_only_attribute_offers_save_only() {
    let (f, _object) = open_device();
    f.surface.controller.select_attribute(f.id("address"));

    let popup = f.only_popup();
    match f.manager.view_of(popup) {
        Some(ViewNode::SaveOrReset(task)) => {
            assert!(!task.can_reset());
            assert_eq!(*task.value(), Value::from("00:11:22"));
        }
        other => panic!("expected save-or-reset, got {:?}", other),
    }
}

#[test]
fn test_writable_attribute_reset_from_tree() {
    let (f, object) = open_device();
    f.manager
        .context()
        .var_tree()
        .put_value(&["newName"], Value::from("renamed"));
    f.surface.controller.select_attribute(f.id("name"));

    let popup = f.only_popup();
    let Some(ViewNode::SaveOrReset(task)) = f.manager.view_of(popup) else {
        panic!("expected save-or-reset");
    };
    assert!(task.reset());

    let Some(ViewNode::VarTree(picker)) = f.manager.view_of(popup) else {
        panic!("expected a value picker");
    };
    picker.click_attrs_path(0);
    picker.click_attr("newName");
    picker.select();

    assert_eq!(object.value("name"), Value::from("renamed"));
    assert!(f.element("name").description.contains("renamed"));
    assert!(!f.manager.contains(popup));
}

#[test]
fn test_engineer_write_to_read_only_attribute_is_logged() {
    let (f, object) = open_device();
    f.manager.context().mode().set_mode(SafetyMode::Engineer);
    f.manager
        .context()
        .var_tree()
        .put_value(&["other"], Value::from("ff:ff"));
    f.surface.controller.select_attribute(f.id("address"));

    let popup = f.only_popup();
    let Some(ViewNode::SaveOrReset(task)) = f.manager.view_of(popup) else {
        panic!("expected save-or-reset");
    };
    assert!(task.can_reset());
    task.reset();
    let Some(ViewNode::VarTree(picker)) = f.manager.view_of(popup) else {
        panic!("expected a value picker");
    };
    picker.click_attrs_path(0);
    picker.click_attr("other");
    picker.select();

    assert_eq!(object.value("address"), Value::from("00:11:22"));
    let log = f.manager.context().log();
    assert_eq!(log.count(LogLevel::Error), 1);
    assert_eq!(
        log.entries().last().unwrap().message,
        "exception caught while assigning value to attribute \"address\""
    );
}

#[test]
fn test_options_and_switches_write_through() {
    let (f, object) = open_device();
    assert_eq!(
        f.element("mode").kind,
        ElementKind::Options(vec!["on".to_string(), "off".to_string()])
    );
    assert_eq!(f.element("enabled").kind, ElementKind::Switch);

    f.surface.controller.choose_option(f.id("mode"), "on");
    assert_eq!(object.value("mode"), Value::from(1));
    assert_eq!(f.element("mode").description, "1");

    f.surface.controller.choose_option(f.id("mode"), "sideways");
    assert_eq!(object.value("mode"), Value::from(1));

    f.surface.controller.turn_on(f.id("enabled"));
    assert_eq!(object.value("enabled"), Value::Bool(true));
    f.surface.controller.turn_off(f.id("enabled"));
    assert_eq!(object.value("enabled"), Value::Bool(false));
}

#[test]
fn test_refresh_row_rereads_every_attribute() {
    let (f, object) = open_device();
    object.update("address", "aa:bb");
    assert!(f.element("address").description.contains("00:11:22"));

    let refresh = f.id("refresh");
    f.surface.controller.choose_option(refresh, "Refresh");
    assert!(f.element("address").description.contains("aa:bb"));
}

#[test]
fn test_setup_arguments_then_call() {
    let (f, object) = open_device();
    let connect = f.id("connect");
    assert_eq!(f.element("connect").description, "args: [null]");

    f.surface.controller.setup_arguments(connect);
    let popup = f.only_popup();
    let Some(ViewNode::SetupArguments(setup)) = f.manager.view_of(popup) else {
        panic!("expected setup-arguments");
    };
    setup.reset_argument(0);
    let reset = f.manager.owned_by(popup)[0];
    let Some(ViewNode::ResetValue(reset)) = f.manager.view_of(reset) else {
        panic!("expected reset-value");
    };
    reset.value_selected(Value::from(7));
    setup.done();

    assert_eq!(f.element("connect").description, "args: [7]");
    f.surface.controller.enter_attribute(connect);
    assert_eq!(
        object.value("lastArgs").get_attr("0"),
        Some(Value::from(7))
    );
}

#[test]
fn test_editable_follows_mode() {
    let (f, _object) = open_device();
    assert!(!f.surface.model.editable());
    f.manager.context().mode().set_mode(SafetyMode::Engineer);
    assert!(f.surface.model.editable());
    f.manager.context().mode().set_mode(SafetyMode::Normal);
    assert!(!f.surface.model.editable());
}

#[test]
fn test_meta_controller_refreshes_on_event() {
    let (manager, views, b) = Fixture::builtins();
    let object = device();
    let definition = device_definition(&b).meta(|model, mode| {
        AutoRefreshAttributes::new(model, mode, 0, &["attributechanged"], None)
    });
    let f = Fixture::open(manager, views, definition, Value::Object(object.clone()));

    object.update("mode", 1);
    object.fire("attributechanged", &Value::Undefined);
    assert_eq!(f.element("mode").description, "1");

    f.manager.kill_task(f.task);
    assert_eq!(object.listener_count("attributechanged"), 0);
}

#[test]
fn test_promise_return_value_opens_immediately() {
    let (manager, views, b) = Fixture::builtins();
    let promise = Promise::new();
    let returned = promise.clone();
    let object = DynamicObject::builder("BluetoothAdapter")
        .method("getPairedDevices", move |_, _| {
            Ok(Value::Object(returned.clone()))
        })
        .build();
    let definition = InterfaceDefinition::new(
        "BluetoothAdapter",
        attrs_path(&["adapters"]),
        is_instance_of("BluetoothAdapter"),
    )
    .spec(InterfaceSpec::new().method(
        "getPairedDevices",
        MethodSpec::new().return_value_test_module(b.general_promise()),
    ));
    let f = Fixture::open(manager, views, definition, Value::Object(object));
    f.manager.context().mode().set_mode(SafetyMode::Engineer);

    f.surface
        .controller
        .enter_attribute(f.id("getPairedDevices"));

    let row = f.element("return value 0");
    let child = row.child_task.expect("promise opened right away");
    assert!(f.views.page(child).unwrap().title.starts_with("Promise"));
    promise.resolve(Value::list(Vec::new()));
}
