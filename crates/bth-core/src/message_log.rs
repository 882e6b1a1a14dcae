//! The harness message log
//!
//! Test tasks report outcomes here (`INFO`, `WARNING`, `ERROR`). Detail
//! values are kept in a list published in the Variable Tree at
//! `["logObjects"]`, so they can be inspected and reused like any other
//! stashed value.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use chrono::Local;

use crate::events::{Emitter, Subscription};
use crate::types::{LogEntry, LogLevel};
use crate::value::{ListRef, Value};
use crate::var_tree::VarTree;

/// Variable Tree location of the detail list.
pub const LOG_OBJECTS_PATH: &str = "logObjects";

const DEFAULT_MAX_ENTRIES: usize = 500;

/// Change notifications.
#[derive(Debug, Clone)]
pub enum LogEvent {
    Added(LogEntry),
    Removed(u64),
}

struct StoredEntry {
    entry: LogEntry,
    detail: Option<Value>,
}

struct LogInner {
    entries: RefCell<VecDeque<StoredEntry>>,
    details: ListRef,
    next_id: Cell<u64>,
    max_entries: usize,
    events: Emitter<LogEvent>,
}

/// Shared handle to the log. Clones share state.
#[derive(Clone)]
pub struct MessageLog {
    inner: Rc<LogInner>,
}

impl MessageLog {
    pub fn new(var_tree: &VarTree, max_entries: usize) -> Self {
        let details: ListRef = Rc::new(RefCell::new(Vec::new()));
        var_tree.put_value(&[LOG_OBJECTS_PATH], Value::List(details.clone()));
        Self {
            inner: Rc::new(LogInner {
                entries: RefCell::new(VecDeque::new()),
                details,
                next_id: Cell::new(1),
                max_entries: if max_entries == 0 {
                    DEFAULT_MAX_ENTRIES
                } else {
                    max_entries
                },
                events: Emitter::new(),
            }),
        }
    }

    /// Append a message and mirror it to the tracing log. Returns the entry id.
    pub fn append_message(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        detail: Option<Value>,
    ) -> u64 {
        let message = message.into();
        match level {
            LogLevel::Info => tracing::info!("[log] {}", message),
            LogLevel::Warning => tracing::warn!("[log] {}", message),
            LogLevel::Error => tracing::error!("[log] {}", message),
        }

        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let entry = LogEntry {
            id,
            level,
            message,
            timestamp: Local::now(),
            has_detail: detail.is_some(),
        };
        if let Some(detail) = &detail {
            self.inner.details.borrow_mut().push(detail.clone());
        }

        let evicted = {
            let mut entries = self.inner.entries.borrow_mut();
            entries.push_back(StoredEntry {
                entry: entry.clone(),
                detail,
            });
            let mut evicted = Vec::new();
            while entries.len() > self.inner.max_entries {
                if let Some(old) = entries.pop_front() {
                    evicted.push(old);
                }
            }
            evicted
        };
        for old in evicted {
            self.forget_detail(old.detail.as_ref());
            self.inner.events.emit(&LogEvent::Removed(old.entry.id));
        }

        self.inner.events.emit(&LogEvent::Added(entry));
        id
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.append_message(LogLevel::Info, message, None)
    }

    pub fn warning(&self, message: impl Into<String>) -> u64 {
        self.append_message(LogLevel::Warning, message, None)
    }

    pub fn error(&self, message: impl Into<String>, detail: Value) -> u64 {
        self.append_message(LogLevel::Error, message, Some(detail))
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner
            .entries
            .borrow()
            .iter()
            .map(|stored| stored.entry.clone())
            .collect()
    }

    pub fn entry(&self, id: u64) -> Option<LogEntry> {
        self.inner
            .entries
            .borrow()
            .iter()
            .find(|stored| stored.entry.id == id)
            .map(|stored| stored.entry.clone())
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.inner
            .entries
            .borrow()
            .iter()
            .filter(|stored| stored.entry.level == level)
            .count()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn detail(&self, id: u64) -> Option<Value> {
        self.inner
            .entries
            .borrow()
            .iter()
            .find(|stored| stored.entry.id == id)
            .and_then(|stored| stored.detail.clone())
    }

    /// Drop one entry (and its published detail).
    pub fn remove(&self, id: u64) -> bool {
        let removed = {
            let mut entries = self.inner.entries.borrow_mut();
            entries
                .iter()
                .position(|stored| stored.entry.id == id)
                .and_then(|index| entries.remove(index))
        };
        match removed {
            Some(stored) => {
                self.forget_detail(stored.detail.as_ref());
                self.inner.events.emit(&LogEvent::Removed(id));
                true
            }
            None => false,
        }
    }

    pub fn subscribe(&self, handler: impl Fn(&LogEvent) + 'static) -> Subscription {
        self.inner.events.subscribe(handler)
    }

    fn forget_detail(&self, detail: Option<&Value>) {
        if let Some(detail) = detail {
            let mut details = self.inner.details.borrow_mut();
            if let Some(index) = details.iter().position(|d| d.same(detail)) {
                details.remove(index);
            }
        }
    }
}
