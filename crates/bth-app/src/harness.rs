//! Harness bootstrap
//!
//! Builds the shared context and the tasks that live for the whole session:
//! the "Global Var Tree" and "Instance Creater" categories and the message
//! log window, which starts in the background.

use std::rc::Rc;

use bth_core::prelude::*;
use bth_core::Value;

use crate::config::Settings;
use crate::context::HarnessContext;
use crate::task_manager::{TaskId, TaskManager};
use crate::tasks::{create_class_list_task, create_log_task, create_long_life_task};
use crate::test_module::{task_creator, TestModuleRef};
use crate::view::ViewFactory;

pub const VAR_TREE_CATEGORY: &str = "varTree";
pub const INSTANCE_CREATOR_CATEGORY: &str = "instanceCreater";

pub struct Harness {
    manager: TaskManager,
    log_task: TaskId,
}

impl Harness {
    pub fn new(settings: Settings, views: Rc<dyn ViewFactory>) -> Self {
        let ctx = HarnessContext::new(settings, views);
        let manager = TaskManager::new(ctx);

        manager.create_category(VAR_TREE_CATEGORY, "Global Var Tree", create_long_life_task());
        manager.create_category(
            INSTANCE_CREATOR_CATEGORY,
            "Instance Creater",
            create_class_list_task(),
        );
        let log_task = manager.create_popup_task(create_log_task(), false, None);
        manager.send_to_background(log_task);

        info!(
            "harness ready in {} mode",
            manager.context().mode().mode()
        );
        Self { manager, log_task }
    }

    pub fn context(&self) -> &HarnessContext {
        self.manager.context()
    }

    pub fn manager(&self) -> &TaskManager {
        &self.manager
    }

    pub fn log_task(&self) -> TaskId {
        self.log_task
    }

    /// Mount `value` as a new category tested by `module`.
    pub fn open_category(&self, name: &str, module: TestModuleRef, value: Value) -> TaskId {
        debug!("opening category {} with {}", name, module.name());
        let title = module.name();
        let task_id = self
            .manager
            .create_category(name, &title, task_creator(module, value));
        self.manager.switch_to_category(name);
        task_id
    }
}
