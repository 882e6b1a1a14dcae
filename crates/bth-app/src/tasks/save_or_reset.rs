//! Store a value in the Variable Tree, or replace it from there

use std::rc::Rc;

use bth_core::{AttrPath, Value};

use super::var_tree::{create_get_value_task, create_put_value_task};
use super::ValueSetter;
use crate::task_manager::{task_creator, InterfaceForTask, Task, TaskCreator};
use crate::view::ViewNode;

pub struct SaveOrResetTask {
    tmi: InterfaceForTask,
    default_attrs_path: AttrPath,
    value: Value,
    setter: Option<ValueSetter>,
}

/// Without a `setter` only saving is offered.
pub fn create_save_or_reset_task(
    default_attrs_path: AttrPath,
    value: Value,
    setter: Option<ValueSetter>,
) -> TaskCreator {
    task_creator(move |tmi| {
        Rc::new(SaveOrResetTask {
            tmi,
            default_attrs_path,
            value,
            setter,
        })
    })
}

impl SaveOrResetTask {
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn can_reset(&self) -> bool {
        self.setter.is_some()
    }

    /// "Save to the VarTree"
    pub fn save(&self) {
        self.tmi.exec(create_put_value_task(
            self.default_attrs_path.clone(),
            self.value.clone(),
        ));
    }

    /// "Reset from the VarTree"
    pub fn reset(&self) -> bool {
        let Some(setter) = &self.setter else {
            return false;
        };
        self.tmi.exec(create_get_value_task(
            self.default_attrs_path.clone(),
            setter.clone(),
        ))
    }
}

impl Task for Rc<SaveOrResetTask> {
    fn view(&self) -> ViewNode {
        ViewNode::SaveOrReset(self.clone())
    }

    fn destroy(&mut self) {}
}
