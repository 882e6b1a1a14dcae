//! Bluetooth test harness
//!
//! Binds the test-task engine in `bth-app` to a simulated Bluetooth adapter
//! and drives it headlessly: line commands on stdin, NDJSON events on
//! stdout.

pub mod headless;
pub mod sim;

// Re-export main entry points
pub use headless::run_headless;
