//! Command dispatch for headless mode
//!
//! [`Driver`] owns the harness, the simulated adapter and the headless
//! views. It turns each [`Command`] into intents on the addressed task and
//! answers with the events to emit; it never writes to stdout itself.

use std::cell::RefCell;
use std::rc::Rc;

use bth_app::config::Settings;
use bth_app::harness::{INSTANCE_CREATOR_CATEGORY, VAR_TREE_CATEGORY};
use bth_app::test_task::TestTaskSurface;
use bth_app::{render, ElementId, Harness, HeadlessViews, TaskId, ViewNode};
use bth_core::prelude::*;
use bth_core::{LogEntry, LogEvent, Subscription, LOG_OBJECTS_PATH};

use super::command::{Command, ModeChange, RowRef, SwitchTarget};
use super::HeadlessEvent;
use crate::sim::{bluetooth_modules, register_classes, Scheduler, SimMessage, Simulator};

pub const BLUETOOTH_CATEGORY: &str = "bluetooth";

/// Containers nested deeper than this render in their short form.
const JSON_DEPTH: usize = 4;

pub struct Driver {
    harness: Harness,
    views: HeadlessViews,
    sim: Simulator,
    bluetooth: TaskId,
    appended: Rc<RefCell<Vec<LogEntry>>>,
    _log_subscription: Subscription,
    quit: bool,
}

impl Driver {
    pub fn new(settings: Settings, scheduler: Scheduler) -> Self {
        let views = HeadlessViews::new();
        let sim = Simulator::new(&settings.sim, scheduler);
        let harness = Harness::new(settings, Rc::new(views.clone()));
        register_classes(harness.context().classes());

        let appended = Rc::new(RefCell::new(Vec::new()));
        let sink = appended.clone();
        let log_subscription = harness.context().log().subscribe(move |event| {
            if let LogEvent::Added(entry) = event {
                sink.borrow_mut().push(entry.clone());
            }
        });

        let modules = bluetooth_modules(harness.context().builtins());
        let bluetooth =
            harness.open_category(BLUETOOTH_CATEGORY, modules.adapter, sim.adapter_value());
        info!("headless driver ready, adapter task {}", bluetooth);

        Self {
            harness,
            views,
            sim,
            bluetooth,
            appended,
            _log_subscription: log_subscription,
            quit: false,
        }
    }

    pub fn harness(&self) -> &Harness {
        &self.harness
    }

    pub fn views(&self) -> &HeadlessViews {
        &self.views
    }

    pub fn sim(&self) -> &Simulator {
        &self.sim
    }

    /// Task testing the simulated adapter.
    pub fn bluetooth_task(&self) -> TaskId {
        self.bluetooth
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Events announcing the driver: `ready`, the task table and the
    /// adapter task.
    pub fn startup_events(&mut self) -> Vec<HeadlessEvent> {
        let mode = self.harness.context().mode().mode();
        let mut events = vec![
            HeadlessEvent::ready(
                mode.as_str(),
                vec![
                    VAR_TREE_CATEGORY.to_string(),
                    INSTANCE_CREATOR_CATEGORY.to_string(),
                    BLUETOOTH_CATEGORY.to_string(),
                ],
            ),
            self.tasks_event(),
        ];
        events.extend(self.task_view(self.bluetooth).ok());
        events.extend(self.flush());
        events
    }

    /// Parse and run one input line.
    pub fn handle_line(&mut self, line: &str) -> Vec<HeadlessEvent> {
        match Command::parse(line) {
            Ok(Some(command)) => self.handle_command(command),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("rejected input {:?}: {}", line, e);
                vec![HeadlessEvent::error(e.to_string(), false)]
            }
        }
    }

    pub fn handle_command(&mut self, command: Command) -> Vec<HeadlessEvent> {
        debug!("command: {:?}", command);
        let mut events = match self.execute(command) {
            Ok(events) => events,
            Err(e) => {
                warn!("command failed: {}", e);
                vec![HeadlessEvent::error(e.to_string(), e.is_fatal())]
            }
        };
        events.extend(self.flush());
        events
    }

    /// Run the simulator job a timer posted back.
    pub fn handle_sim_message(&mut self, message: SimMessage) -> Vec<HeadlessEvent> {
        trace!("sim message: {:?}", message);
        self.sim.scheduler().handle(message);
        self.flush()
    }

    /// Notifications and log entries produced since the last call.
    pub fn flush(&mut self) -> Vec<HeadlessEvent> {
        let mut events: Vec<HeadlessEvent> = self
            .views
            .take_notifications()
            .into_iter()
            .map(HeadlessEvent::notification)
            .collect();
        let appended = std::mem::take(&mut *self.appended.borrow_mut());
        events.extend(appended.iter().map(HeadlessEvent::log));
        events
    }

    // ─────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────

    fn execute(&mut self, command: Command) -> Result<Vec<HeadlessEvent>> {
        let task = match command {
            Command::Tasks => return Ok(vec![self.tasks_event()]),
            Command::Show(task) => return Ok(vec![self.task_view(task)?]),
            Command::Mode(change) => return Ok(vec![self.change_mode(change)]),
            Command::Log(id) => return self.log_command(id),
            Command::Get(path) => {
                let value = self.harness.context().var_tree().get_value(&path);
                return Ok(vec![HeadlessEvent::value(path, value.to_json(JSON_DEPTH))]);
            }
            Command::Put(path, value) => {
                let var_tree = self.harness.context().var_tree();
                if !var_tree.put_value(&path, value) {
                    return Err(Error::command(format!(
                        "cannot put a value at \"{}\"",
                        path.join(".")
                    )));
                }
                let value = var_tree.get_value(&path);
                return Ok(vec![HeadlessEvent::value(path, value.to_json(JSON_DEPTH))]);
            }
            Command::Quit => {
                info!("Quit requested");
                self.quit = true;
                return Ok(vec![HeadlessEvent::quit()]);
            }
            Command::Close(task) => {
                self.harness.manager().container_close_requested(task)?;
                return Ok(self.foreground_view().into_iter().collect());
            }
            Command::Tree => {
                let task = self
                    .harness
                    .manager()
                    .category(VAR_TREE_CATEGORY)
                    .ok_or_else(|| Error::command("no variable tree category"))?;
                self.harness.manager().switch_to_category(VAR_TREE_CATEGORY);
                task
            }
            Command::Switch(SwitchTarget::Task(task)) => {
                if !self.harness.manager().switch_to_task(task) {
                    return Err(Error::task_not_found(task.as_u64()));
                }
                task
            }
            Command::Switch(SwitchTarget::Category(name)) => {
                let task = self
                    .harness
                    .manager()
                    .category(&name)
                    .ok_or_else(|| Error::command(format!("unknown category \"{}\"", name)))?;
                self.harness.manager().switch_to_category(&name);
                task
            }
            intent => self.dispatch_intent(intent)?,
        };
        Ok(self.view_after(task).into_iter().collect())
    }

    /// Forward a task intent to the addressed node. Returns the task id.
    fn dispatch_intent(&mut self, command: Command) -> Result<TaskId> {
        let task = match &command {
            Command::Enter(task, _)
            | Command::Select(task, _)
            | Command::Refresh(task, _)
            | Command::Remove(task, _)
            | Command::Option(task, _, _)
            | Command::On(task, _)
            | Command::Off(task, _)
            | Command::Args(task, _)
            | Command::Save(task)
            | Command::Edit(task)
            | Command::Reset(task, _)
            | Command::Set(task, _)
            | Command::Pick(task)
            | Command::Back(task, _)
            | Command::Add(task, _)
            | Command::Create(task)
            | Command::Done(task)
            | Command::Cancel(task) => *task,
            other => return Err(Error::command(format!("{:?} is not a task intent", other))),
        };
        let node = self.node(task)?;
        let kind = node.kind();
        let unsupported = || Error::command(format!("a {} task does not accept this", kind));

        match (command, node) {
            (Command::Enter(_, row), ViewNode::TestTask(surface)) => {
                surface.controller.enter_attribute(element_id(&surface, &row)?)
            }
            (Command::Enter(_, row), ViewNode::VarTree(tree)) => {
                let names = tree.value().attr_names();
                tree.click_attr(&pick_name(&names, &row)?)
            }
            (Command::Enter(_, row), ViewNode::ClassList(list)) => {
                let name = pick_name(&list.class_names(), &row)?;
                if list.enter_class(&name).is_none() {
                    return Err(Error::command(format!("unknown class \"{}\"", name)));
                }
            }
            (Command::Enter(_, row), ViewNode::Log(log)) => {
                let id = log_id(&row)?;
                if log.enter_entry(id).is_none() {
                    return Err(Error::command(format!("log entry {} has no detail", id)));
                }
            }
            (Command::Select(_, Some(row)), ViewNode::TestTask(surface)) => {
                surface.controller.select_attribute(element_id(&surface, &row)?)
            }
            (Command::Select(_, None), ViewNode::VarTree(tree)) => {
                if !tree.can_select() {
                    return Err(Error::command("this variable tree task only browses"));
                }
                tree.select()
            }
            (Command::Refresh(_, row), ViewNode::TestTask(surface)) => {
                surface.controller.refresh_attribute(element_id(&surface, &row)?)
            }
            (Command::Remove(_, row), ViewNode::TestTask(surface)) => {
                surface.controller.remove_attribute(element_id(&surface, &row)?)
            }
            (Command::Remove(_, row), ViewNode::VarTree(tree)) => {
                let names = tree.value().attr_names();
                tree.remove_attr(&pick_name(&names, &row)?)
            }
            (Command::Remove(_, row), ViewNode::Log(log)) => {
                let id = log_id(&row)?;
                if !log.remove_entry(id) {
                    return Err(Error::command(format!("no log entry {}", id)));
                }
            }
            (Command::Remove(_, RowRef::Index(index)), ViewNode::SetupArguments(setup)) => {
                setup.remove_argument(index)
            }
            (Command::Option(_, row, option), ViewNode::TestTask(surface)) => {
                surface
                    .controller
                    .choose_option(element_id(&surface, &row)?, &option)
            }
            (Command::On(_, row), ViewNode::TestTask(surface)) => {
                surface.controller.turn_on(element_id(&surface, &row)?)
            }
            (Command::Off(_, row), ViewNode::TestTask(surface)) => {
                surface.controller.turn_off(element_id(&surface, &row)?)
            }
            (Command::Args(_, Some(row)), ViewNode::TestTask(surface)) => {
                surface.controller.setup_arguments(element_id(&surface, &row)?)
            }
            (Command::Args(_, None), ViewNode::CreateInstance(creator)) => creator.setup_args(),
            (Command::Save(_), ViewNode::TestTask(surface)) => surface.controller.save_to_var_tree(),
            (Command::Save(_), ViewNode::SaveOrReset(task)) => task.save(),
            (Command::Edit(_), ViewNode::TestTask(surface)) => surface.controller.edit_by_var_tree(),
            (Command::Reset(_, None), ViewNode::SaveOrReset(task)) => {
                if !task.reset() {
                    return Err(Error::command("this value cannot be reset"));
                }
            }
            (Command::Reset(_, None), ViewNode::VarTree(tree)) => {
                if !tree.can_reset() {
                    return Err(Error::command("this value cannot be reset"));
                }
                tree.reset()
            }
            (Command::Reset(_, Some(index)), ViewNode::SetupArguments(setup)) => {
                if index >= setup.arguments().len() {
                    return Err(Error::command(format!("no argument {}", index)));
                }
                setup.reset_argument(index)
            }
            (Command::Reset(_, None), ViewNode::CreateInstance(creator)) => creator.reset_args(),
            (Command::Set(_, value), ViewNode::ResetValue(reset)) => reset.value_selected(value),
            (Command::Pick(_), ViewNode::ResetValue(reset)) => reset.select_from_var_tree(),
            (Command::Back(_, depth), ViewNode::VarTree(tree)) => tree.click_attrs_path(depth),
            (Command::Add(_, name), ViewNode::VarTree(tree)) => {
                if !tree.can_modify_attrs() {
                    return Err(Error::command("attributes cannot be modified here"));
                }
                tree.add_attr(&name)
            }
            (Command::Add(_, _), ViewNode::SetupArguments(setup)) => {
                if !setup.can_resize() {
                    return Err(Error::command("arguments can only be added in engineer mode"));
                }
                setup.append_argument()
            }
            (Command::Create(_), ViewNode::CreateInstance(creator)) => creator.create_instance(),
            (Command::Done(_), ViewNode::SetupArguments(setup)) => setup.done(),
            (Command::Cancel(_), ViewNode::VarTree(tree)) => tree.cancel(),
            (Command::Cancel(_), ViewNode::ResetValue(reset)) => reset.cancel(),
            _ => return Err(unsupported()),
        }
        Ok(task)
    }

    // ─────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────

    fn node(&self, task: TaskId) -> Result<ViewNode> {
        self.harness
            .manager()
            .view_of(task)
            .ok_or_else(|| Error::task_not_found(task.as_u64()))
    }

    fn tasks_event(&self) -> HeadlessEvent {
        HeadlessEvent::tasks(self.harness.manager().tasks(), self.views.foreground())
    }

    fn task_view(&self, task: TaskId) -> Result<HeadlessEvent> {
        let node = self.node(task)?;
        let title = self
            .views
            .page(task)
            .map(|page| page.title)
            .unwrap_or_default();
        Ok(HeadlessEvent::task_view(task, &title, render(&node)))
    }

    fn foreground_view(&self) -> Option<HeadlessEvent> {
        let foreground = self.views.foreground()?;
        self.task_view(foreground).ok()
    }

    /// The foreground task after an intent, or `task` when nothing is in
    /// front.
    fn view_after(&self, task: TaskId) -> Option<HeadlessEvent> {
        self.foreground_view().or_else(|| self.task_view(task).ok())
    }

    fn change_mode(&self, change: ModeChange) -> HeadlessEvent {
        let mode = self.harness.context().mode();
        match change {
            ModeChange::Show => {}
            ModeChange::Toggle => {
                mode.toggle();
            }
            ModeChange::Set(next) => {
                mode.set_mode(next);
            }
        }
        info!("safety mode is {}", mode.mode());
        HeadlessEvent::mode(mode.mode().as_str())
    }

    fn log_command(&self, id: Option<u64>) -> Result<Vec<HeadlessEvent>> {
        let log = self.harness.context().log();
        match id {
            None => Ok(log.entries().iter().map(HeadlessEvent::log).collect()),
            Some(id) => {
                let detail = log
                    .detail(id)
                    .ok_or_else(|| Error::command(format!("log entry {} has no detail", id)))?;
                Ok(vec![HeadlessEvent::value(
                    vec![LOG_OBJECTS_PATH.to_string(), id.to_string()],
                    detail.to_json(JSON_DEPTH),
                )])
            }
        }
    }
}

fn element_id(surface: &TestTaskSurface, row: &RowRef) -> Result<ElementId> {
    let found = match row {
        RowRef::Index(index) => surface.model.elements().get(*index).map(|element| element.id),
        RowRef::Name(name) => surface.model.find_by_name(name),
    };
    found.ok_or_else(|| Error::command(format!("no row {}", row)))
}

fn pick_name(names: &[String], row: &RowRef) -> Result<String> {
    match row {
        RowRef::Name(name) => Ok(name.clone()),
        RowRef::Index(index) => names
            .get(*index)
            .cloned()
            .ok_or_else(|| Error::command(format!("no row {}", row))),
    }
}

fn log_id(row: &RowRef) -> Result<u64> {
    match row {
        RowRef::Index(id) => Ok(*id as u64),
        RowRef::Name(name) => Err(Error::command(format!("not a log id: {}", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> Driver {
        let (scheduler, _rx) = Scheduler::new();
        Driver::new(Settings::default(), scheduler)
    }

    fn only_error(events: &[HeadlessEvent]) -> String {
        match events {
            [HeadlessEvent::Error { message, .. }] => message.clone(),
            other => panic!("expected one error, got {:?}", other),
        }
    }

    #[test]
    fn test_startup_announces_categories_and_adapter() {
        let mut driver = driver();
        let events = driver.startup_events();
        let names: Vec<&str> = events.iter().map(HeadlessEvent::name).collect();
        assert_eq!(&names[..3], &["ready", "tasks", "task_view"]);
        match &events[2] {
            HeadlessEvent::TaskView { task_id, title, .. } => {
                assert_eq!(*task_id, driver.bluetooth_task());
                assert!(!title.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_task_is_reported() {
        let mut driver = driver();
        let message = only_error(&driver.handle_line("show 999"));
        assert!(message.contains("999"));
    }

    #[test]
    fn test_put_then_get() {
        let mut driver = driver();
        driver.handle_line("put scratch.answer 42");
        match &driver.handle_line("get scratch")[..] {
            [HeadlessEvent::Value { path, value, .. }] => {
                assert_eq!(path, &vec!["scratch".to_string()]);
                assert_eq!(value["answer"], 42.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mode_command() {
        let mut driver = driver();
        match &driver.handle_line("mode engineer")[..] {
            [HeadlessEvent::Mode { mode, .. }] => assert_eq!(mode, "engineer"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(driver.harness().context().mode().is_engineer());
    }

    #[test]
    fn test_wrong_intent_for_task_kind() {
        let mut driver = driver();
        let task = driver.bluetooth_task();
        let message = only_error(&driver.handle_line(&format!("pick {}", task)));
        assert!(message.contains("test_task"));
    }

    #[test]
    fn test_log_popup_cannot_be_closed() {
        let mut driver = driver();
        let log_task = driver.harness().log_task();
        let message = only_error(&driver.handle_line(&format!("close {}", log_task)));
        assert!(message.contains("cannot be closed"));
        assert!(driver.harness().manager().contains(log_task));
    }

    #[test]
    fn test_quit() {
        let mut driver = driver();
        let events = driver.handle_line("quit");
        assert_eq!(events[0].name(), "quit");
        assert!(driver.should_quit());
    }
}
