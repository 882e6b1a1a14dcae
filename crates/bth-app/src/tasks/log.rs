//! The message log window
//!
//! A background popup created at startup. Every appended message throws a
//! short notification; entering an entry with a detail value opens that
//! value in a read-only var-tree inspector, restarted on demand.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use bth_core::prelude::*;
use bth_core::value::shorten;
use bth_core::{LogEntry, LogEvent, MessageLog, Subscription};

use super::var_tree::create_task_on_custom_root;
use crate::task_manager::{
    task_creator, InterfaceForTask, SmartRestartTaskManager, Task, TaskCreator, TaskId,
};
use crate::view::ViewNode;

pub struct LogTask {
    this: Weak<LogTask>,
    tmi: InterfaceForTask,
    log: MessageLog,
    preview: usize,
    inspectors: RefCell<HashMap<u64, Rc<SmartRestartTaskManager>>>,
    subscription: RefCell<Option<Subscription>>,
}

pub fn create_log_task() -> TaskCreator {
    task_creator(LogTask::open)
}

impl LogTask {
    fn open(tmi: InterfaceForTask) -> Rc<Self> {
        let log = tmi.context().log().clone();
        let preview = tmi.context().settings().log.notification_preview;
        let task = Rc::new_cyclic(|this: &Weak<Self>| Self {
            this: this.clone(),
            tmi,
            log,
            preview,
            inspectors: RefCell::new(HashMap::new()),
            subscription: RefCell::new(None),
        });
        let weak = task.this.clone();
        let subscription = task.log.subscribe(move |event| {
            if let Some(task) = weak.upgrade() {
                task.on_log_event(event);
            }
        });
        *task.subscription.borrow_mut() = Some(subscription);
        task
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.log.entries()
    }

    pub fn remove_entry(&self, id: u64) -> bool {
        self.log.remove(id)
    }

    /// Open the detail of entry `id`; entries without one have nothing to
    /// show.
    pub fn enter_entry(&self, id: u64) -> Option<TaskId> {
        let detail = self.log.detail(id)?;
        let restart = self
            .inspectors
            .borrow_mut()
            .entry(id)
            .or_insert_with(|| {
                let tmi = self.tmi.clone();
                Rc::new(SmartRestartTaskManager::new(move |on_killed| {
                    tmi.create_popup_task(
                        create_task_on_custom_root(detail.clone(), false, true),
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

    fn on_log_event(&self, event: &LogEvent) {
        match event {
            LogEvent::Added(entry) => {
                self.tmi.throw_notification(&format!(
                    "[log] received: {}",
                    shorten(&entry.message, self.preview)
                ));
            }
            LogEvent::Removed(id) => {
                self.inspectors.borrow_mut().remove(id);
            }
        }
    }
}

impl Task for Rc<LogTask> {
    fn view(&self) -> ViewNode {
        ViewNode::Log(self.clone())
    }

    fn destroy(&mut self) {
        self.subscription.borrow_mut().take();
        self.inspectors.borrow_mut().clear();
    }
}
