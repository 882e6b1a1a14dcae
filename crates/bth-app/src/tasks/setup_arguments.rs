//! Edit the argument list of a method call
//!
//! The list is shared with the caller and edited in place. Arguments are
//! replaced one at a time through a reset-value popup; growing or shrinking
//! the list is reserved to ENGINEER mode.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use bth_core::prelude::*;
use bth_core::{Emitter, ListRef, Subscription, Value};

use super::reset_value::create_reset_value_task;
use super::ValueSetter;
use crate::task_manager::{task_creator, InterfaceForTask, Task, TaskCreator};
use crate::test_module::interface::ArgSpec;
use crate::view::ViewNode;

/// Change notifications for the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupArgumentsEvent {
    ValuesChanged,
    CanResizeChanged(bool),
}

pub struct SetupArgumentsTask {
    this: Weak<SetupArgumentsTask>,
    tmi: InterfaceForTask,
    args_spec: Vec<ArgSpec>,
    args: ListRef,
    can_resize: Cell<bool>,
    events: Emitter<SetupArgumentsEvent>,
    subscription: RefCell<Option<Subscription>>,
}

pub fn create_setup_arguments_task(args_spec: Vec<ArgSpec>, args: ListRef) -> TaskCreator {
    task_creator(move |tmi| SetupArgumentsTask::open(tmi, args_spec, args))
}

impl SetupArgumentsTask {
    fn open(tmi: InterfaceForTask, args_spec: Vec<ArgSpec>, args: ListRef) -> Rc<Self> {
        let can_resize = tmi.context().mode().is_engineer();
        let task = Rc::new_cyclic(|this: &Weak<Self>| Self {
            this: this.clone(),
            tmi,
            args_spec,
            args,
            can_resize: Cell::new(can_resize),
            events: Emitter::new(),
            subscription: RefCell::new(None),
        });
        let weak = task.this.clone();
        let subscription = task.tmi.context().mode().subscribe(move |mode| {
            if let Some(task) = weak.upgrade() {
                task.set_can_resize(mode.is_engineer());
            }
        });
        *task.subscription.borrow_mut() = Some(subscription);
        task
    }

    pub fn events(&self) -> &Emitter<SetupArgumentsEvent> {
        &self.events
    }

    /// `(name, value)` per argument; extra arguments are named by position.
    pub fn arguments(&self) -> Vec<(String, Value)> {
        self.args
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let name = self
                    .args_spec
                    .get(i)
                    .map(|spec| spec.name.clone())
                    .unwrap_or_else(|| format!("arg{}", i));
                (name, value.clone())
            })
            .collect()
    }

    pub fn can_resize(&self) -> bool {
        self.can_resize.get()
    }

    /// Open a reset-value popup for argument `index`.
    pub fn reset_argument(&self, index: usize) {
        let default_attrs_path = self
            .args_spec
            .get(index)
            .map(|spec| spec.default_attrs_path.clone())
            .unwrap_or_default();
        let weak = self.this.clone();
        let on_value_got: ValueSetter = Rc::new(move |value| {
            if let Some(task) = weak.upgrade() {
                task.set_argument_value(index, value);
            }
        });
        self.tmi.create_popup_task(
            create_reset_value_task(default_attrs_path, on_value_got),
            true,
            None,
        );
    }

    pub fn append_argument(&self) {
        if !self.can_resize.get() {
            debug!("arguments can only be appended in engineer mode");
            return;
        }
        let index = {
            let mut args = self.args.borrow_mut();
            args.push(Value::Undefined);
            args.len() - 1
        };
        self.events.emit(&SetupArgumentsEvent::ValuesChanged);
        self.reset_argument(index);
    }

    pub fn remove_argument(&self, index: usize) {
        if !self.can_resize.get() {
            debug!("arguments can only be removed in engineer mode");
            return;
        }
        let removed = {
            let mut args = self.args.borrow_mut();
            (index < args.len()).then(|| args.remove(index))
        };
        if removed.is_some() {
            self.events.emit(&SetupArgumentsEvent::ValuesChanged);
        }
    }

    pub fn done(&self) {
        self.tmi.exit();
    }

    fn set_argument_value(&self, index: usize, value: Value) {
        let stored = {
            let mut args = self.args.borrow_mut();
            match args.get_mut(index) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            }
        };
        if stored {
            self.events.emit(&SetupArgumentsEvent::ValuesChanged);
        }
    }

    fn set_can_resize(&self, can_resize: bool) {
        self.can_resize.set(can_resize);
        self.events
            .emit(&SetupArgumentsEvent::CanResizeChanged(can_resize));
    }
}

impl Task for Rc<SetupArgumentsTask> {
    fn view(&self) -> ViewNode {
        ViewNode::SetupArguments(self.clone())
    }

    fn destroy(&mut self) {
        self.subscription.borrow_mut().take();
    }
}
