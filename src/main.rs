//! btharness - interactive test harness for Bluetooth live objects
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use bth_app::config::{init_config_dir, load_settings};
use bth_core::SafetyMode;
use clap::Parser;

/// btharness - drive Bluetooth test tasks from the command line
#[derive(Parser, Debug)]
#[command(name = "btharness")]
#[command(about = "Interactive test harness for Bluetooth live objects", long_about = None)]
struct Args {
    /// Directory holding .btharness/config.toml
    #[arg(long, value_name = "PATH")]
    dir: Option<PathBuf>,

    /// Start in engineer mode regardless of the config file
    #[arg(long)]
    engineer: bool,

    /// Write a default .btharness/config.toml and exit
    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let base_path = args
        .dir
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    if args.init {
        init_config_dir(&base_path)?;
        eprintln!(
            "Wrote default config to {}",
            base_path.join(".btharness").display()
        );
        return Ok(());
    }

    bth_core::logging::init()?;

    let mut settings = load_settings(&base_path);
    if args.engineer {
        settings.behavior.initial_mode = SafetyMode::Engineer;
    }

    bt_harness::run_headless(&base_path, settings).await?;
    Ok(())
}
