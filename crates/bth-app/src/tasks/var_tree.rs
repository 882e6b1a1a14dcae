//! Variable Tree tasks
//!
//! One task type serves every use of the tree: browsing it from the root,
//! inspecting an arbitrary value, picking a value for a caller and storing a
//! value at a chosen node. Other tasks may rewrite the tree at any time, so
//! the pointer is re-validated before every operation; a stale pointer is
//! truncated and the view redrawn instead of operating.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use bth_core::prelude::*;
use bth_core::{AttrPath, SafetyMode, Subscription, Value, VarPointer, VarPointerSnapshot};

use super::reset_value::create_reset_value_task;
use super::ValueSetter;
use crate::task_manager::{task_creator, InterfaceForTask, Task, TaskCreator};
use crate::view::{VarTreeView, ViewNode};

/// What `select` does with the current node.
enum Selection {
    Disabled,
    Get(ValueSetter),
    Put(Value),
}

impl Selection {
    fn is_enabled(&self) -> bool {
        !matches!(self, Selection::Disabled)
    }
}

pub struct VarTreeTask {
    this: Weak<VarTreeTask>,
    tmi: InterfaceForTask,
    view: Rc<dyn VarTreeView>,
    pointer: RefCell<VarPointer>,
    selection: Selection,
    root_can_reset: bool,
    read_only: bool,
    can_modify_attrs: Cell<bool>,
    can_reset: Cell<bool>,
    destroyed: Cell<bool>,
    subscription: RefCell<Option<Subscription>>,
}

/// Browse the global tree, starting at `attrs_path` when it exists.
pub fn create_task_on_root(attrs_path: AttrPath, read_only: bool) -> TaskCreator {
    task_creator(move |tmi| {
        let pointer = global_pointer(&tmi, &attrs_path);
        VarTreeTask::open(tmi, pointer, Selection::Disabled, false, read_only)
    })
}

/// Browse `root` as if it were a tree of its own.
pub fn create_task_on_custom_root(root: Value, root_can_reset: bool, read_only: bool) -> TaskCreator {
    task_creator(move |tmi| {
        VarTreeTask::open(
            tmi,
            VarPointer::new(root),
            Selection::Disabled,
            root_can_reset,
            read_only,
        )
    })
}

/// Pick a node of the global tree and hand its value to `on_value_got`.
pub fn create_get_value_task(attrs_path: AttrPath, on_value_got: ValueSetter) -> TaskCreator {
    task_creator(move |tmi| {
        let pointer = global_pointer(&tmi, &attrs_path);
        VarTreeTask::open(tmi, pointer, Selection::Get(on_value_got), false, false)
    })
}

/// Pick a node of the global tree and overwrite it with `value`.
pub fn create_put_value_task(attrs_path: AttrPath, value: Value) -> TaskCreator {
    task_creator(move |tmi| {
        let pointer = global_pointer(&tmi, &attrs_path);
        VarTreeTask::open(tmi, pointer, Selection::Put(value), false, false)
    })
}

/// The "Global Var Tree" category.
pub fn create_long_life_task() -> TaskCreator {
    create_task_on_root(AttrPath::new(), false)
}

fn global_pointer(tmi: &InterfaceForTask, attrs_path: &[String]) -> VarPointer {
    let mut pointer = tmi.context().var_tree().pointer();
    if !pointer.move_forward_along(attrs_path) {
        debug!("default path {:?} is not in the tree", attrs_path);
    }
    pointer
}

impl VarTreeTask {
    fn open(
        tmi: InterfaceForTask,
        pointer: VarPointer,
        selection: Selection,
        root_can_reset: bool,
        read_only: bool,
    ) -> Rc<Self> {
        let view = tmi.context().views().var_tree_view();
        let task = Rc::new_cyclic(|this: &Weak<Self>| Self {
            this: this.clone(),
            tmi,
            view,
            pointer: RefCell::new(pointer),
            selection,
            root_can_reset,
            read_only,
            can_modify_attrs: Cell::new(false),
            can_reset: Cell::new(false),
            destroyed: Cell::new(false),
            subscription: RefCell::new(None),
        });

        let weak = task.this.clone();
        let subscription = task.tmi.context().mode().subscribe(move |_| {
            if let Some(task) = weak.upgrade() {
                task.mode_switched();
            }
        });
        *task.subscription.borrow_mut() = Some(subscription);

        task.view.set_can_select(task.selection.is_enabled());
        task.update_mode();
        task.reset_view();
        task
    }

    // ─────────────────────────────────────────────────────────
    // State
    // ─────────────────────────────────────────────────────────

    pub fn attrs_path(&self) -> AttrPath {
        self.pointer.borrow().attrs_path().to_vec()
    }

    /// The node the pointer designates.
    pub fn value(&self) -> Value {
        self.pointer.borrow().value()
    }

    pub fn can_modify_attrs(&self) -> bool {
        self.can_modify_attrs.get()
    }

    pub fn can_reset(&self) -> bool {
        self.can_reset.get()
    }

    pub fn can_select(&self) -> bool {
        self.selection.is_enabled()
    }

    // ─────────────────────────────────────────────────────────
    // Intents
    // ─────────────────────────────────────────────────────────

    pub fn select(&self) {
        if !self.check() {
            return;
        }
        match &self.selection {
            Selection::Disabled => return,
            Selection::Get(on_value_got) => {
                let value = self.value();
                on_value_got(value);
            }
            Selection::Put(value) => {
                let result = self.pointer.borrow_mut().set_value(value.clone());
                if let Err(e) = result {
                    self.tmi
                        .context()
                        .log()
                        .error("exception caught while putting value", e.to_detail());
                    self.reset_view();
                    return;
                }
            }
        }
        self.tmi.exit();
    }

    pub fn cancel(&self) {
        self.tmi.exit();
    }

    /// Replace the current node with a value chosen in a popup. The pointer
    /// must still match the snapshot taken now when the popup answers.
    pub fn reset(&self) {
        if !self.can_reset.get() {
            debug!("reset is not allowed here");
            return;
        }
        if !self.check() {
            return;
        }
        let snapshot = self.pointer.borrow().create_snapshot();
        let weak = self.this.clone();
        let on_reset: ValueSetter = Rc::new(move |value| {
            if let Some(task) = weak.upgrade() {
                task.commit_reset(&snapshot, value);
            }
        });
        self.tmi
            .create_popup_task(create_reset_value_task(AttrPath::new(), on_reset), true, None);
    }

    /// An empty name on a list appends; anything else assigns `null`.
    pub fn add_attr(&self, name: &str) {
        if !self.can_modify_attrs.get() || !self.check() {
            return;
        }
        let current = self.value();
        let result = match &current {
            Value::List(items) if name.is_empty() => {
                items.borrow_mut().push(Value::Null);
                Ok(())
            }
            _ => current.set_attr(name, Value::Null),
        };
        if let Err(e) = result {
            self.tmi.context().log().error(
                format!("exception caught while adding attribute \"{}\"", name),
                e.to_detail(),
            );
        }
        self.reset_view();
    }

    pub fn remove_attr(&self, name: &str) {
        if !self.can_modify_attrs.get() || !self.check() {
            return;
        }
        if !self.value().remove_attr(name) {
            debug!("nothing to remove at {:?}", name);
        }
        self.reset_view();
    }

    /// Step into `name` of the current node.
    pub fn click_attr(&self, name: &str) {
        if !self.check() {
            return;
        }
        if !self.pointer.borrow_mut().move_forward(name) {
            debug!("cannot move into {:?}", name);
        }
        self.update_mode();
        self.reset_view();
    }

    /// Jump back to the ancestor whose path is `depth` segments long.
    pub fn click_attrs_path(&self, depth: usize) {
        if !self.check() {
            return;
        }
        self.pointer.borrow_mut().move_back_to(depth);
        self.update_mode();
        self.reset_view();
    }

    fn mode_switched(&self) {
        if !self.check() {
            return;
        }
        self.update_mode();
    }

    // ─────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────

    fn commit_reset(&self, snapshot: &VarPointerSnapshot, value: Value) {
        if self.destroyed.get() || !self.check() {
            return;
        }
        if !self.pointer.borrow().is_equal_to_snapshot(snapshot) {
            debug!("tree changed while choosing a value; reset dropped");
            self.reset_view();
            return;
        }
        let result = self.pointer.borrow_mut().set_value(value);
        if let Err(e) = result {
            self.tmi
                .context()
                .log()
                .error("exception caught while resetting value", e.to_detail());
        }
        self.reset_view();
    }

    /// Validate the pointer; on failure it is truncated and redrawn.
    fn check(&self) -> bool {
        if self.destroyed.get() {
            return false;
        }
        let consistent = self.pointer.borrow_mut().before_start_operations_check();
        if !consistent {
            self.update_mode();
            self.reset_view();
        }
        consistent
    }

    fn update_mode(&self) {
        let at_root = self.pointer.borrow().is_at_root();
        let (can_modify, can_reset) = match self.tmi.context().mode().mode() {
            SafetyMode::Normal => (
                !self.read_only,
                !self.read_only && (!at_root || self.root_can_reset),
            ),
            SafetyMode::Engineer => (true, !at_root || self.root_can_reset),
        };
        self.can_modify_attrs.set(can_modify);
        self.can_reset.set(can_reset);
        self.view.set_can_modify_attrs(can_modify);
        self.view.set_can_reset(can_reset);
    }

    fn reset_view(&self) {
        let (path, value) = {
            let pointer = self.pointer.borrow();
            (pointer.attrs_path().to_vec(), pointer.value())
        };
        self.view.reset(&path, &value);
    }

    fn teardown(&self) {
        self.destroyed.set(true);
        self.subscription.borrow_mut().take();
    }
}

impl Task for Rc<VarTreeTask> {
    fn view(&self) -> ViewNode {
        ViewNode::VarTree(self.clone())
    }

    fn destroy(&mut self) {
        self.teardown();
    }
}
