//! Line commands understood by the headless driver
//!
//! One command per line, whitespace separated. Tasks are addressed by id,
//! rows by index or by name. Values are JSON; anything that does not parse
//! as JSON is taken as a plain string. Paths are dot separated, `.` is the
//! tree root.

use std::fmt;
use std::str::FromStr;

use bth_app::TaskId;
use bth_core::prelude::*;
use bth_core::{AttrPath, SafetyMode, Value};

/// A row of a task, by position or by name.
#[derive(Debug, Clone, PartialEq)]
pub enum RowRef {
    Index(usize),
    Name(String),
}

impl RowRef {
    fn parse(token: &str) -> Self {
        match token.parse::<usize>() {
            Ok(index) => RowRef::Index(index),
            Err(_) => RowRef::Name(token.to_string()),
        }
    }
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowRef::Index(index) => write!(f, "#{}", index),
            RowRef::Name(name) => write!(f, "\"{}\"", name),
        }
    }
}

/// Target of `switch`: a task id or a category name.
#[derive(Debug, Clone, PartialEq)]
pub enum SwitchTarget {
    Task(TaskId),
    Category(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    Show,
    Toggle,
    Set(SafetyMode),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Tasks,
    Show(TaskId),
    Enter(TaskId, RowRef),
    Select(TaskId, Option<RowRef>),
    Refresh(TaskId, RowRef),
    Remove(TaskId, RowRef),
    Option(TaskId, RowRef, String),
    On(TaskId, RowRef),
    Off(TaskId, RowRef),
    Args(TaskId, Option<RowRef>),
    Save(TaskId),
    Edit(TaskId),
    Reset(TaskId, Option<usize>),
    /// Literal value for a reset-value task
    Set(TaskId, Value),
    /// Let a reset-value task pick from the Variable Tree
    Pick(TaskId),
    /// Move a var-tree task back to `depth`
    Back(TaskId, usize),
    Add(TaskId, String),
    Create(TaskId),
    Done(TaskId),
    Cancel(TaskId),
    Mode(ModeChange),
    Tree,
    Put(AttrPath, Value),
    Get(AttrPath),
    Close(TaskId),
    Switch(SwitchTarget),
    Log(Option<u64>),
    Quit,
}

pub const HELP: &str = "tasks | show T | enter T ROW | select T [ROW] | refresh T ROW | \
remove T ROW | option T ROW OPTION | on T ROW | off T ROW | args T [ROW] | save T | edit T | \
reset T [INDEX] | set T JSON | pick T | back T DEPTH | add T [NAME] | create T | done T | \
cancel T | mode [normal|engineer|toggle] | tree | put PATH JSON | get PATH | close T | \
switch T|CATEGORY | log [ID] | quit";

fn task_id(token: Option<&str>) -> Result<TaskId> {
    let token = token.ok_or_else(|| Error::command("missing task id"))?;
    token
        .parse::<u64>()
        .map(TaskId::from)
        .map_err(|_| Error::command(format!("not a task id: {}", token)))
}

fn row(token: Option<&str>) -> Result<RowRef> {
    token
        .map(RowRef::parse)
        .ok_or_else(|| Error::command("missing row"))
}

fn number(token: Option<&str>, what: &str) -> Result<usize> {
    let token = token.ok_or_else(|| Error::command(format!("missing {}", what)))?;
    token
        .parse::<usize>()
        .map_err(|_| Error::command(format!("not a {}: {}", what, token)))
}

/// Dot separated path; `.` and the empty string are the root.
pub fn parse_path(token: &str) -> AttrPath {
    if token.is_empty() || token == "." {
        return AttrPath::new();
    }
    token.split('.').map(str::to_string).collect()
}

/// JSON literal, or the raw text as a string.
pub fn parse_value(text: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json) => Value::from_json(&json),
        Err(_) => Value::string(text),
    }
}

/// Everything after the first `skip` whitespace separated tokens.
fn rest(line: &str, skip: usize) -> &str {
    let mut remaining = line.trim_start();
    for _ in 0..skip {
        remaining = match remaining.find(char::is_whitespace) {
            Some(end) => remaining[end..].trim_start(),
            None => "",
        };
    }
    remaining.trim_end()
}

impl Command {
    /// Parse one input line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }
        let mut tokens = trimmed.split_whitespace();
        let verb = tokens.next().unwrap_or_default();
        let command = match verb {
            "tasks" => Command::Tasks,
            "show" => Command::Show(task_id(tokens.next())?),
            "enter" => Command::Enter(task_id(tokens.next())?, row(tokens.next())?),
            "select" => Command::Select(task_id(tokens.next())?, tokens.next().map(RowRef::parse)),
            "refresh" => Command::Refresh(task_id(tokens.next())?, row(tokens.next())?),
            "remove" => Command::Remove(task_id(tokens.next())?, row(tokens.next())?),
            "option" => {
                let task = task_id(tokens.next())?;
                let row = row(tokens.next())?;
                let option = rest(trimmed, 3);
                if option.is_empty() {
                    return Err(Error::command("missing option"));
                }
                Command::Option(task, row, option.to_string())
            }
            "on" => Command::On(task_id(tokens.next())?, row(tokens.next())?),
            "off" => Command::Off(task_id(tokens.next())?, row(tokens.next())?),
            "args" => Command::Args(task_id(tokens.next())?, tokens.next().map(RowRef::parse)),
            "save" => Command::Save(task_id(tokens.next())?),
            "edit" => Command::Edit(task_id(tokens.next())?),
            "reset" => {
                let task = task_id(tokens.next())?;
                let index = match tokens.next() {
                    Some(token) => Some(number(Some(token), "argument index")?),
                    None => None,
                };
                Command::Reset(task, index)
            }
            "set" => {
                let task = task_id(tokens.next())?;
                let text = rest(trimmed, 2);
                if text.is_empty() {
                    return Err(Error::command("missing value"));
                }
                Command::Set(task, parse_value(text))
            }
            "pick" => Command::Pick(task_id(tokens.next())?),
            "back" => Command::Back(task_id(tokens.next())?, number(tokens.next(), "depth")?),
            "add" => Command::Add(task_id(tokens.next())?, rest(trimmed, 2).to_string()),
            "create" => Command::Create(task_id(tokens.next())?),
            "done" => Command::Done(task_id(tokens.next())?),
            "cancel" => Command::Cancel(task_id(tokens.next())?),
            "mode" => Command::Mode(match tokens.next() {
                None => ModeChange::Show,
                Some("toggle") => ModeChange::Toggle,
                Some(mode) => ModeChange::Set(SafetyMode::from_str(mode).map_err(Error::command)?),
            }),
            "tree" => Command::Tree,
            "put" => {
                let path = tokens
                    .next()
                    .ok_or_else(|| Error::command("missing path"))?;
                let text = rest(trimmed, 2);
                if text.is_empty() {
                    return Err(Error::command("missing value"));
                }
                Command::Put(parse_path(path), parse_value(text))
            }
            "get" => Command::Get(parse_path(tokens.next().unwrap_or("."))),
            "close" => Command::Close(task_id(tokens.next())?),
            "switch" => {
                let target = tokens
                    .next()
                    .ok_or_else(|| Error::command("missing task id or category"))?;
                Command::Switch(match target.parse::<u64>() {
                    Ok(id) => SwitchTarget::Task(TaskId::from(id)),
                    Err(_) => SwitchTarget::Category(target.to_string()),
                })
            }
            "log" => Command::Log(match tokens.next() {
                Some(token) => Some(
                    token
                        .parse::<u64>()
                        .map_err(|_| Error::command(format!("not a log id: {}", token)))?,
                ),
                None => None,
            }),
            "q" | "quit" => Command::Quit,
            other => {
                return Err(Error::command(format!(
                    "unknown command \"{}\"; expected {}",
                    other, HELP
                )))
            }
        };
        Ok(Some(command))
    }
}
