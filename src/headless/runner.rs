//! Headless mode runner - main event loop without a screen
//!
//! Reads commands from stdin, runs the simulator's settled jobs, and emits
//! NDJSON events to stdout.

use std::path::Path;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use bth_app::config::Settings;
use bth_core::prelude::*;

use super::{Driver, HeadlessEvent};
use crate::sim::{Scheduler, SimMessage};

/// Run in headless mode until `quit` or end of input.
pub async fn run_headless(project_path: &Path, settings: Settings) -> Result<()> {
    info!("═══════════════════════════════════════════════════════");
    info!("Bluetooth test harness starting in HEADLESS mode");
    info!("Config dir: {}", project_path.display());
    info!("═══════════════════════════════════════════════════════");

    let (scheduler, sim_rx) = Scheduler::new();
    let mut driver = Driver::new(settings, scheduler);

    let (line_tx, line_rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        spawn_stdin_reader_blocking(line_tx);
    });

    emit_all(driver.startup_events());
    let result = headless_event_loop(&mut driver, line_rx, sim_rx).await;

    info!("Bluetooth test harness headless mode exiting");
    result
}

/// Main headless event loop
async fn headless_event_loop(
    driver: &mut Driver,
    mut line_rx: mpsc::UnboundedReceiver<String>,
    mut sim_rx: mpsc::UnboundedReceiver<SimMessage>,
) -> Result<()> {
    loop {
        if driver.should_quit() {
            break;
        }

        tokio::select! {
            line = line_rx.recv() => match line {
                Some(line) => emit_all(driver.handle_line(&line)),
                None => {
                    info!("stdin closed");
                    break;
                }
            },
            message = sim_rx.recv() => match message {
                Some(message) => emit_all(driver.handle_sim_message(message)),
                None => {
                    // The driver holds a sender, so this only happens on teardown
                    error!("simulator channel closed");
                    return Err(Error::ChannelClosed);
                }
            },
        }
    }

    Ok(())
}

fn emit_all(events: Vec<HeadlessEvent>) {
    for event in events {
        event.emit();
    }
}

/// Forward stdin lines to the event loop (blocking version)
fn spawn_stdin_reader_blocking(line_tx: mpsc::UnboundedSender<String>) {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    let reader = stdin.lock();

    for line in reader.lines() {
        match line {
            Ok(line) => {
                if line_tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("Error reading stdin: {}", e);
                break;
            }
        }
    }
    info!("Stdin reader finished");
}
