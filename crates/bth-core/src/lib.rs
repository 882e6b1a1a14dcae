//! # bth-core - Core domain types for the Bluetooth test harness
//!
//! Pure domain primitives with no task or view knowledge: the dynamic
//! [`Value`] model, the live-object boundary, promises and async requests,
//! the shared Variable Tree, the message log and the global safety mode.
//! Everything here is single-threaded and shared through `Rc`.

pub mod error;
pub mod events;
pub mod exception;
pub mod live;
pub mod logging;
pub mod message_log;
pub mod mode;
pub mod prelude;
pub mod promise;
pub mod types;
pub mod value;
pub mod var_tree;

pub use error::{Error, Result};
pub use events::{Emitter, Subscription};
pub use exception::{ErrorRecord, Exception};
pub use live::{
    DynamicObject, DynamicObjectBuilder, ErrorObject, EventTarget, Listener, ListenerGuard,
    ListenerId, LiveObject, Method,
};
pub use message_log::{LogEvent, MessageLog, LOG_OBJECTS_PATH};
pub use mode::{ModeSwitch, SafetyMode};
pub use promise::{AsyncRequest, Promise, PromiseState, ReadyState};
pub use types::{LogEntry, LogLevel};
pub use value::{FunctionRef, ListRef, MapRef, NativeFunction, ObjectRef, Value};
pub use var_tree::{attrs_path, AttrPath, VarPointer, VarPointerSnapshot, VarTree};
