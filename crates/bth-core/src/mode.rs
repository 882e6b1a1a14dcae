//! Global safety mode (normal vs engineer)

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::events::{Emitter, Subscription};

/// Gates destructive and engineer-only affordances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyMode {
    #[default]
    Normal,
    Engineer,
}

impl SafetyMode {
    pub fn next(self) -> Self {
        match self {
            SafetyMode::Normal => SafetyMode::Engineer,
            SafetyMode::Engineer => SafetyMode::Normal,
        }
    }

    pub fn is_engineer(self) -> bool {
        self == SafetyMode::Engineer
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SafetyMode::Normal => "normal",
            SafetyMode::Engineer => "engineer",
        }
    }
}

impl fmt::Display for SafetyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafetyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(SafetyMode::Normal),
            "engineer" => Ok(SafetyMode::Engineer),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

/// Process-wide mode flag with change notifications. Clones share state.
#[derive(Clone)]
pub struct ModeSwitch {
    mode: Rc<Cell<SafetyMode>>,
    changes: Emitter<SafetyMode>,
}

impl Default for ModeSwitch {
    fn default() -> Self {
        Self::new(SafetyMode::default())
    }
}

impl ModeSwitch {
    pub fn new(initial: SafetyMode) -> Self {
        Self {
            mode: Rc::new(Cell::new(initial)),
            changes: Emitter::new(),
        }
    }

    pub fn mode(&self) -> SafetyMode {
        self.mode.get()
    }

    pub fn is_engineer(&self) -> bool {
        self.mode().is_engineer()
    }

    /// Returns true when the mode actually changed; subscribers are only
    /// notified in that case.
    pub fn set_mode(&self, mode: SafetyMode) -> bool {
        if self.mode.get() == mode {
            return false;
        }
        self.mode.set(mode);
        tracing::info!("Safety mode switched to {}", mode);
        self.changes.emit(&mode);
        true
    }

    pub fn toggle(&self) -> SafetyMode {
        let next = self.mode().next();
        self.set_mode(next);
        next
    }

    pub fn subscribe(&self, handler: impl Fn(SafetyMode) + 'static) -> Subscription {
        self.changes.subscribe(move |mode| handler(*mode))
    }
}
