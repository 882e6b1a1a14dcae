//! End-to-end scenarios against the public harness API

use std::cell::Cell;
use std::rc::Rc;

use bth_app::config::Settings;
use bth_app::harness::VAR_TREE_CATEGORY;
use bth_app::task_manager::task_creator;
use bth_app::{Harness, HeadlessViews, Task, ViewNode};
use bth_core::{DynamicObject, Value};

fn harness() -> (Harness, HeadlessViews) {
    let views = HeadlessViews::new();
    let harness = Harness::new(Settings::default(), Rc::new(views.clone()));
    (harness, views)
}

struct CountedTask {
    destroyed: Rc<Cell<u32>>,
}

impl Task for CountedTask {
    fn view(&self) -> ViewNode {
        ViewNode::Empty
    }

    fn destroy(&mut self) {
        self.destroyed.set(self.destroyed.get() + 1);
    }
}

#[test]
fn test_put_creates_intermediate_maps() {
    let (harness, _views) = harness();
    let tree = harness.context().var_tree();

    assert!(tree.put_value(&["a", "b"], Value::from(5)));
    assert!(matches!(tree.get_value(&["a"]), Value::Map(_)));
    assert_eq!(tree.get_value(&["a", "b"]), Value::from(5));
    assert!(tree.get_value(&["a", "c"]).is_undefined());
}

#[test]
fn test_killed_popup_is_destroyed_once_and_forgotten() {
    let (harness, _views) = harness();
    let manager = harness.manager();
    let destroyed = Rc::new(Cell::new(0));
    let counter = destroyed.clone();

    let popup = manager.create_popup_task(
        task_creator(move |_tmi| CountedTask { destroyed: counter }),
        true,
        None,
    );
    assert!(manager.task_info(popup).is_some());

    assert!(manager.kill_task(popup));
    assert!(!manager.kill_task(popup));
    assert_eq!(destroyed.get(), 1);
    assert!(manager.task_info(popup).is_none());
}

#[test]
fn test_var_tree_task_recovers_from_stale_pointer() {
    let (harness, _views) = harness();
    let tree = harness.context().var_tree();
    tree.put_value(&["a", "b", "c"], Value::from(1));

    let task = harness.manager().category(VAR_TREE_CATEGORY).unwrap();
    let Some(ViewNode::VarTree(var_tree)) = harness.manager().view_of(task) else {
        panic!("varTree category is not a var tree task");
    };
    var_tree.click_attr("a");
    var_tree.click_attr("b");
    assert_eq!(var_tree.attrs_path(), vec!["a", "b"]);

    // Someone else replaces `a` while the task is looking at `a.b`
    tree.put_value(&["a"], Value::map());
    var_tree.click_attr("c");
    assert!(var_tree.attrs_path().is_empty());
}

#[test]
fn test_cyclic_structure_collapses_when_browsed() {
    let (harness, _views) = harness();
    let tree = harness.context().var_tree();
    let a = Value::map();
    tree.put_value(&["a"], a.clone());
    a.set_attr("self", a.clone()).unwrap();

    let task = harness.manager().category(VAR_TREE_CATEGORY).unwrap();
    let Some(ViewNode::VarTree(var_tree)) = harness.manager().view_of(task) else {
        panic!("varTree category is not a var tree task");
    };
    var_tree.click_attr("a");
    var_tree.click_attr("self");
    var_tree.click_attr("self");
    assert_eq!(var_tree.attrs_path(), vec!["a"]);
    assert!(harness.context().var_tree().root().to_display_string().len() < 4096);
}

#[test]
fn test_category_switch_follows_harness() {
    let (harness, views) = harness();
    let device = DynamicObject::builder("Thing").attribute("x", 1).build();
    let general = harness.context().builtins().general();

    let task = harness.open_category("things", general, Value::Object(device));
    assert_eq!(views.current_category().as_deref(), Some("things"));
    assert_eq!(harness.manager().category("things"), Some(task));

    assert!(harness.manager().switch_to_category(VAR_TREE_CATEGORY));
    assert_eq!(views.current_category().as_deref(), Some(VAR_TREE_CATEGORY));
}
