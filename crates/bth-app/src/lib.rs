//! bth-app - Test task engine for the Bluetooth test harness
//!
//! This crate implements value classification and the built-in test
//! modules, the interface test-module generator, the test-task
//! Model/Controller contracts, the Task Manager, the auxiliary tasks
//! (Variable Tree, argument setup, instance creator, message log), a headless
//! view layer and configuration loading.

pub mod config;
pub mod context;
pub mod harness;
pub mod headless;
pub mod task_manager;
pub mod tasks;
pub mod test_module;
pub mod test_task;
pub mod view;

// Re-export primary types
pub use context::HarnessContext;
pub use harness::Harness;
pub use headless::{render, HeadlessViews, RenderedView};
pub use task_manager::{InterfaceForTask, SmartRestartTaskManager, Task, TaskId, TaskManager};
pub use test_module::{get_valid_test_module, BuiltinModules, TestModule, TestModuleRef};
pub use test_task::{Controller, Element, ElementId, ElementKind, TestModel, TestTask};
pub use view::{ContainerShape, ViewFactory, ViewNode};
