//! Headless mode - NDJSON event output driven by line commands
//!
//! The harness has no screen here: commands arrive one per line on stdin
//! and every observable effect is written to stdout as newline-delimited
//! JSON, one event per line, each tagged by its "event" field.
//!
//! # Example Output
//!
//! ```json
//! {"event":"ready","mode":"normal","categories":["varTree","instanceCreater","bluetooth"],"timestamp":1704700001000}
//! {"event":"task_view","task_id":4,"title":"BluetoothAdapter","view":{"kind":"test_task","editable":false,"elements":[]},"timestamp":1704700002000}
//! {"event":"log","id":0,"level":"error","message":"exception caught while calling method","timestamp":1704700003000}
//! ```

pub mod command;
pub mod driver;
pub mod runner;

pub use command::Command;
pub use driver::Driver;
pub use runner::run_headless;

use std::io::{self, Write};

use bth_app::task_manager::TaskSummary;
use bth_app::{RenderedView, TaskId};
use bth_core::{LogEntry, LogLevel};
use chrono::Utc;
use serde::Serialize;
use tracing::error;

/// Events emitted in headless mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// Harness bootstrapped and listening for commands
    Ready {
        mode: String,
        categories: Vec<String>,
        timestamp: i64,
    },

    /// The task table
    Tasks {
        tasks: Vec<TaskSummary>,
        foreground: Option<TaskId>,
        timestamp: i64,
    },

    /// Snapshot of one task's surface
    TaskView {
        task_id: TaskId,
        title: String,
        view: RenderedView,
        timestamp: i64,
    },

    /// Transient message thrown by a task
    Notification { message: String, timestamp: i64 },

    /// Entry appended to the message log
    Log {
        id: u64,
        level: String,
        message: String,
        timestamp: i64,
    },

    /// A value read from the Variable Tree or a log detail
    Value {
        path: Vec<String>,
        value: serde_json::Value,
        timestamp: i64,
    },

    /// Safety mode after a `mode` command
    Mode { mode: String, timestamp: i64 },

    /// Command could not be carried out
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },

    /// Driver is shutting down
    Quit { timestamp: i64 },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = self.write_to(&mut stdout) {
            error!("Failed to write headless event to stdout: {}", e);
        }
    }

    /// Write this event as one NDJSON line and flush
    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        let json = serde_json::to_string(self).map_err(io::Error::other)?;
        writeln!(out, "{}", json)?;
        out.flush()
    }

    /// Event tag, as serialized
    pub fn name(&self) -> &'static str {
        match self {
            HeadlessEvent::Ready { .. } => "ready",
            HeadlessEvent::Tasks { .. } => "tasks",
            HeadlessEvent::TaskView { .. } => "task_view",
            HeadlessEvent::Notification { .. } => "notification",
            HeadlessEvent::Log { .. } => "log",
            HeadlessEvent::Value { .. } => "value",
            HeadlessEvent::Mode { .. } => "mode",
            HeadlessEvent::Error { .. } => "error",
            HeadlessEvent::Quit { .. } => "quit",
        }
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn ready(mode: &str, categories: Vec<String>) -> Self {
        Self::Ready {
            mode: mode.to_string(),
            categories,
            timestamp: Self::now(),
        }
    }

    pub fn tasks(tasks: Vec<TaskSummary>, foreground: Option<TaskId>) -> Self {
        Self::Tasks {
            tasks,
            foreground,
            timestamp: Self::now(),
        }
    }

    pub fn task_view(task_id: TaskId, title: &str, view: RenderedView) -> Self {
        Self::TaskView {
            task_id,
            title: title.to_string(),
            view,
            timestamp: Self::now(),
        }
    }

    pub fn notification(message: String) -> Self {
        Self::Notification {
            message,
            timestamp: Self::now(),
        }
    }

    pub fn log(entry: &LogEntry) -> Self {
        let level = match entry.level {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        Self::Log {
            id: entry.id,
            level: level.to_string(),
            message: entry.message.clone(),
            timestamp: Self::now(),
        }
    }

    pub fn value(path: Vec<String>, value: serde_json::Value) -> Self {
        Self::Value {
            path,
            value,
            timestamp: Self::now(),
        }
    }

    pub fn mode(mode: &str) -> Self {
        Self::Mode {
            mode: mode.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }

    pub fn quit() -> Self {
        Self::Quit {
            timestamp: Self::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_json(event: &HeadlessEvent) -> serde_json::Value {
        let mut buffer = Vec::new();
        event.write_to(&mut buffer).expect("write failed");
        let line = String::from_utf8(buffer).expect("utf8");
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        serde_json::from_str(line.trim_end()).expect("invalid JSON")
    }

    #[test]
    fn test_ready_serialization() {
        let event = HeadlessEvent::ready("normal", vec!["varTree".into(), "bluetooth".into()]);
        let value = to_json(&event);

        assert_eq!(value["event"], "ready");
        assert_eq!(value["mode"], "normal");
        assert_eq!(value["categories"][1], "bluetooth");
        assert!(value["timestamp"].is_number());
    }

    #[test]
    fn test_task_view_serialization() {
        let event = HeadlessEvent::task_view(
            TaskId::from(3),
            "Global Var Tree",
            RenderedView::ClassList {
                classes: vec!["DeviceFilter".into()],
            },
        );
        let value = to_json(&event);

        assert_eq!(value["event"], "task_view");
        assert_eq!(value["task_id"], 3);
        assert_eq!(value["view"]["kind"], "class_list");
        assert_eq!(value["view"]["classes"][0], "DeviceFilter");
    }

    #[test]
    fn test_log_serialization() {
        let entry = LogEntry {
            id: 9,
            level: LogLevel::Error,
            message: "exception caught while calling method".into(),
            timestamp: chrono::Local::now(),
            has_detail: true,
        };
        let value = to_json(&HeadlessEvent::log(&entry));

        assert_eq!(value["event"], "log");
        assert_eq!(value["id"], 9);
        assert_eq!(value["level"], "error");
        assert_eq!(value["message"], "exception caught while calling method");
    }

    #[test]
    fn test_error_serialization() {
        let value = to_json(&HeadlessEvent::error("unknown task 42".to_string(), false));

        assert_eq!(value["event"], "error");
        assert_eq!(value["message"], "unknown task 42");
        assert_eq!(value["fatal"], false);
    }

    #[test]
    fn test_name_matches_tag() {
        let events = [
            HeadlessEvent::quit(),
            HeadlessEvent::mode("engineer"),
            HeadlessEvent::notification("hi".into()),
            HeadlessEvent::value(vec![], serde_json::Value::Null),
        ];
        for event in events {
            assert_eq!(to_json(&event)["event"], event.name());
        }
    }
}
