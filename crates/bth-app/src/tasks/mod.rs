//! Auxiliary tasks
//!
//! Tasks that are not test tasks: browsing and editing the Variable Tree,
//! picking or storing a value, editing method arguments, creating instances
//! of registered classes and the message log window.

mod instance_creator;
mod log;
mod reset_value;
mod save_or_reset;
mod setup_arguments;
mod var_tree;


pub use instance_creator::{
    create_class_list_task, ClassConstructor, ClassInfo, ClassListTask, ClassRegistry,
    CreateInstanceTask,
};
pub use log::{create_log_task, LogTask};
pub use reset_value::{create_reset_value_task, ResetValueTask};
pub use save_or_reset::{create_save_or_reset_task, SaveOrResetTask};
pub use setup_arguments::{create_setup_arguments_task, SetupArgumentsEvent, SetupArgumentsTask};
pub use var_tree::{
    create_get_value_task, create_long_life_task, create_put_value_task, create_task_on_custom_root,
    create_task_on_root, VarTreeTask,
};

use std::rc::Rc;

use bth_core::Value;

/// Receives a value picked by the user.
pub type ValueSetter = Rc<dyn Fn(Value)>;
