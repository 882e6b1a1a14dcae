//! Choose a replacement value
//!
//! Either a literal typed by the user or a node picked from the Variable
//! Tree. In the latter case this task becomes a get-value task in place, so
//! whoever waits for it to be killed keeps waiting for the pick.

use std::rc::Rc;

use bth_core::{AttrPath, Value};

use super::var_tree::create_get_value_task;
use super::ValueSetter;
use crate::task_manager::{task_creator, InterfaceForTask, Task, TaskCreator};
use crate::view::ViewNode;

pub struct ResetValueTask {
    tmi: InterfaceForTask,
    default_attrs_path: AttrPath,
    on_reset: ValueSetter,
}

pub fn create_reset_value_task(default_attrs_path: AttrPath, on_reset: ValueSetter) -> TaskCreator {
    task_creator(move |tmi| {
        Rc::new(ResetValueTask {
            tmi,
            default_attrs_path,
            on_reset,
        })
    })
}

impl ResetValueTask {
    /// Where the tree picker starts.
    pub fn default_attrs_path(&self) -> &[String] {
        &self.default_attrs_path
    }

    pub fn value_selected(&self, value: Value) {
        (self.on_reset)(value);
        self.tmi.exit();
    }

    pub fn select_from_var_tree(&self) {
        self.tmi.exec(create_get_value_task(
            self.default_attrs_path.clone(),
            self.on_reset.clone(),
        ));
    }

    pub fn cancel(&self) {
        self.tmi.exit();
    }
}

impl Task for Rc<ResetValueTask> {
    fn view(&self) -> ViewNode {
        ViewNode::ResetValue(self.clone())
    }

    fn destroy(&mut self) {}
}
