//! Shared harness context
//!
//! Everything process-wide (the Variable Tree, the message log, the safety
//! mode, the view factory, the built-in test modules and the instance
//! creator's classes) is created once at startup and passed to every task
//! through this handle.

use std::rc::Rc;

use bth_core::{MessageLog, ModeSwitch, VarTree};

use crate::config::Settings;
use crate::tasks::ClassRegistry;
use crate::test_module::BuiltinModules;
use crate::view::ViewFactory;

struct ContextInner {
    var_tree: VarTree,
    log: MessageLog,
    mode: ModeSwitch,
    views: Rc<dyn ViewFactory>,
    builtins: BuiltinModules,
    classes: ClassRegistry,
    settings: Settings,
}

/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct HarnessContext {
    inner: Rc<ContextInner>,
}

impl HarnessContext {
    pub fn new(settings: Settings, views: Rc<dyn ViewFactory>) -> Self {
        let var_tree = VarTree::new();
        let log = MessageLog::new(&var_tree, settings.log.max_entries);
        let mode = ModeSwitch::new(settings.behavior.initial_mode);
        let builtins = BuiltinModules::new();
        builtins.reserve_default_paths(&var_tree);

        Self {
            inner: Rc::new(ContextInner {
                var_tree,
                log,
                mode,
                views,
                builtins,
                classes: ClassRegistry::new(),
                settings,
            }),
        }
    }

    pub fn var_tree(&self) -> &VarTree {
        &self.inner.var_tree
    }

    pub fn log(&self) -> &MessageLog {
        &self.inner.log
    }

    pub fn mode(&self) -> &ModeSwitch {
        &self.inner.mode
    }

    pub fn views(&self) -> &Rc<dyn ViewFactory> {
        &self.inner.views
    }

    pub fn builtins(&self) -> &BuiltinModules {
        &self.inner.builtins
    }

    /// Classes offered by the instance creator.
    pub fn classes(&self) -> &ClassRegistry {
        &self.inner.classes
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }
}
