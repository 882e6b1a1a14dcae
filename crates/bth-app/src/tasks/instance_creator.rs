//! Instance creator
//!
//! Registered classes are listed in the "Instance Creater" category. Each
//! class gets its own creation task (restarted on demand) where the
//! constructor arguments are prepared and the instance is built; a built
//! instance is handed to a put-value popup at the class's default path.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bth_core::prelude::*;
use bth_core::{AttrPath, Exception, ListRef, Value};
use indexmap::IndexMap;

use super::setup_arguments::create_setup_arguments_task;
use super::var_tree::create_put_value_task;
use crate::task_manager::{
    task_creator, InterfaceForTask, SmartRestartTaskManager, Task, TaskCreator, TaskId,
};
use crate::test_module::interface::ArgSpec;
use crate::view::ViewNode;

/// Builds an instance from positional arguments.
pub type ClassConstructor = Rc<dyn Fn(&[Value]) -> std::result::Result<Value, Exception>>;

pub struct ClassInfo {
    pub class_name: String,
    pub default_attrs_path: AttrPath,
    pub constructor: ClassConstructor,
    pub args_spec: Vec<ArgSpec>,
}

impl ClassInfo {
    /// Fresh argument list holding every default value.
    fn default_args(&self) -> Vec<Value> {
        self.args_spec
            .iter()
            .map(|spec| spec.default_value.clone())
            .collect()
    }
}

/// Registered classes by name, in registration order. Clones share state.
#[derive(Clone, Default)]
pub struct ClassRegistry {
    classes: Rc<RefCell<IndexMap<String, Rc<ClassInfo>>>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unnamed arguments are called `arg`; re-registering a name replaces
    /// the previous class.
    pub fn register_class(
        &self,
        class_name: &str,
        default_attrs_path: AttrPath,
        constructor: impl Fn(&[Value]) -> std::result::Result<Value, Exception> + 'static,
        args_spec: Vec<ArgSpec>,
    ) {
        let args_spec = args_spec
            .into_iter()
            .map(|mut spec| {
                if spec.name.is_empty() {
                    spec.name = "arg".to_string();
                }
                spec
            })
            .collect();
        let info = ClassInfo {
            class_name: class_name.to_string(),
            default_attrs_path,
            constructor: Rc::new(constructor),
            args_spec,
        };
        debug!("class {} registered", class_name);
        self.classes
            .borrow_mut()
            .insert(class_name.to_string(), Rc::new(info));
    }

    /// Register a plain record type: the instance is a map holding one
    /// entry per field, filled from the arguments in order.
    pub fn register_struct(&self, class_name: &str, default_attrs_path: AttrPath, fields: &[&str]) {
        let names: Vec<String> = fields.iter().map(|field| field.to_string()).collect();
        let args_spec = names.iter().map(ArgSpec::new).collect();
        self.register_class(
            class_name,
            default_attrs_path,
            move |args| {
                Ok(Value::map_of(names.iter().enumerate().map(|(i, name)| {
                    (name.clone(), args.get(i).cloned().unwrap_or_default())
                })))
            },
            args_spec,
        );
    }

    pub fn get(&self, class_name: &str) -> Option<Rc<ClassInfo>> {
        self.classes.borrow().get(class_name).cloned()
    }

    pub fn class_names(&self) -> Vec<String> {
        self.classes.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.classes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─────────────────────────────────────────────────────────────────
// Class list (category)
// ─────────────────────────────────────────────────────────────────

pub struct ClassListTask {
    tmi: InterfaceForTask,
    tasks: RefCell<HashMap<String, Rc<SmartRestartTaskManager>>>,
}

/// The "Instance Creater" category.
pub fn create_class_list_task() -> TaskCreator {
    task_creator(|tmi| {
        Rc::new(ClassListTask {
            tmi,
            tasks: RefCell::new(HashMap::new()),
        })
    })
}

impl ClassListTask {
    pub fn class_names(&self) -> Vec<String> {
        self.tmi.context().classes().class_names()
    }

    /// Open (or bring back) the creation task of `class_name`.
    pub fn enter_class(&self, class_name: &str) -> Option<TaskId> {
        let Some(info) = self.tmi.context().classes().get(class_name) else {
            warn!("unknown class {}", class_name);
            return None;
        };
        let restart = self
            .tasks
            .borrow_mut()
            .entry(class_name.to_string())
            .or_insert_with(|| {
                let tmi = self.tmi.clone();
                Rc::new(SmartRestartTaskManager::new(move |on_killed| {
                    tmi.create_child_task(
                        create_create_instance_task(info.clone()),
                        &info.class_name,
                        true,
                        Some(on_killed),
                    )
                }))
            })
            .clone();
        let task_id = restart.task()?;
        self.tmi.switch_to_task(task_id);
        Some(task_id)
    }
}

impl Task for Rc<ClassListTask> {
    fn view(&self) -> ViewNode {
        ViewNode::ClassList(self.clone())
    }

    fn destroy(&mut self) {
        self.tasks.borrow_mut().clear();
    }
}

// ─────────────────────────────────────────────────────────────────
// Instance creation
// ─────────────────────────────────────────────────────────────────

pub struct CreateInstanceTask {
    tmi: InterfaceForTask,
    info: Rc<ClassInfo>,
    args: ListRef,
}

fn create_create_instance_task(info: Rc<ClassInfo>) -> TaskCreator {
    task_creator(move |tmi| {
        let args = Rc::new(RefCell::new(info.default_args()));
        Rc::new(CreateInstanceTask { tmi, info, args })
    })
}

impl CreateInstanceTask {
    pub fn class_name(&self) -> &str {
        &self.info.class_name
    }

    /// `(name, value)` per argument; extra arguments are named by position.
    pub fn arguments(&self) -> Vec<(String, Value)> {
        self.args
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let name = self
                    .info
                    .args_spec
                    .get(i)
                    .map(|spec| spec.name.clone())
                    .unwrap_or_else(|| format!("arg{}", i));
                (name, value.clone())
            })
            .collect()
    }

    pub fn reset_args(&self) {
        *self.args.borrow_mut() = self.info.default_args();
    }

    pub fn setup_args(&self) {
        self.tmi.create_popup_task(
            create_setup_arguments_task(self.info.args_spec.clone(), self.args.clone()),
            true,
            None,
        );
    }

    pub fn create_instance(&self) {
        let args = self.args.borrow().clone();
        match (self.info.constructor)(&args) {
            Ok(instance) => {
                self.tmi.create_popup_task(
                    create_put_value_task(self.info.default_attrs_path.clone(), instance),
                    true,
                    None,
                );
            }
            Err(e) => {
                self.tmi.context().log().error(
                    format!(
                        "exception caught while creating an instance of {}",
                        self.info.class_name
                    ),
                    e.to_detail(),
                );
            }
        }
    }
}

impl Task for Rc<CreateInstanceTask> {
    fn view(&self) -> ViewNode {
        ViewNode::CreateInstance(self.clone())
    }

    fn destroy(&mut self) {}
}
