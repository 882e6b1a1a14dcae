//! Settings parser for .btharness/config.toml

use super::types::Settings;
use bth_core::prelude::*;
use std::path::Path;

const CONFIG_FILENAME: &str = "config.toml";
const HARNESS_DIR: &str = ".btharness";

/// Load settings from `.btharness/config.toml`, falling back to defaults
pub fn load_settings(project_path: &Path) -> Settings {
    let config_path = project_path.join(HARNESS_DIR).join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Create default config files in .btharness/ directory
pub fn init_config_dir(project_path: &Path) -> Result<()> {
    let harness_dir = project_path.join(HARNESS_DIR);

    if !harness_dir.exists() {
        std::fs::create_dir_all(&harness_dir)
            .map_err(|e| Error::config(format!("Failed to create .btharness dir: {}", e)))?;
    }

    let config_path = harness_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        let default_content = r#"# Bluetooth Test Harness Configuration

[behavior]
initial_mode = "normal"   # "normal" or "engineer"

[log]
max_entries = 500
notification_preview = 10

[sim]
discovery_delay_ms = 200
connect_delay_ms = 100
device_count = 3
"#;
        std::fs::write(&config_path, default_content)
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Created default config at {:?}", config_path);
    }

    Ok(())
}

/// Save settings to `.btharness/config.toml`
pub fn save_settings(project_path: &Path, settings: &Settings) -> Result<()> {
    let harness_dir = project_path.join(HARNESS_DIR);

    // Ensure directory exists
    if !harness_dir.exists() {
        std::fs::create_dir_all(&harness_dir)
            .map_err(|e| Error::config(format!("Failed to create .btharness dir: {}", e)))?;
    }

    let config_path = harness_dir.join(CONFIG_FILENAME);
    let temp_path = harness_dir.join(".config.toml.tmp");

    let content = toml::to_string_pretty(settings)
        .map_err(|e| Error::config(format!("Failed to serialize settings: {}", e)))?;
    let full_content = format!("# Bluetooth Test Harness Configuration\n\n{}", content);

    // Atomic write: write to temp, then rename
    std::fs::write(&temp_path, &full_content)
        .map_err(|e| Error::config(format!("Failed to write temp file: {}", e)))?;

    std::fs::rename(&temp_path, &config_path)
        .map_err(|e| Error::config(format!("Failed to rename temp file: {}", e)))?;

    info!("Saved settings to {:?}", config_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bth_core::SafetyMode;
    use tempfile::tempdir;

    #[test]
    fn test_load_settings_defaults_without_file() {
        let dir = tempdir().unwrap();
        let settings = load_settings(dir.path());
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.log.max_entries, 500);
        assert_eq!(settings.behavior.initial_mode, SafetyMode::Normal);
    }

    #[test]
    fn test_init_config_dir_writes_parseable_defaults() {
        let dir = tempdir().unwrap();
        init_config_dir(dir.path()).unwrap();
        assert!(dir.path().join(".btharness/config.toml").exists());
        assert_eq!(load_settings(dir.path()), Settings::default());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".btharness")).unwrap();
        std::fs::write(
            dir.path().join(".btharness/config.toml"),
            "[behavior]\ninitial_mode = \"engineer\"\n\n[log]\nmax_entries = 20\n",
        )
        .unwrap();

        let settings = load_settings(dir.path());
        assert_eq!(settings.behavior.initial_mode, SafetyMode::Engineer);
        assert_eq!(settings.log.max_entries, 20);
        assert_eq!(settings.log.notification_preview, 10);
        assert_eq!(settings.sim.device_count, 3);
    }

    #[test]
    fn test_malformed_config_falls_back() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".btharness")).unwrap();
        std::fs::write(dir.path().join(".btharness/config.toml"), "[log\nbroken").unwrap();
        assert_eq!(load_settings(dir.path()), Settings::default());
    }

    #[test]
    fn test_unwritable_config_dir_is_a_config_error() {
        let dir = tempdir().unwrap();
        // A plain file where the config directory should go
        std::fs::write(dir.path().join(".btharness"), "").unwrap();

        let err = init_config_dir(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("config.toml"));

        let err = save_settings(dir.path(), &Settings::default()).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let mut settings = Settings::default();
        settings.sim.device_count = 7;
        settings.behavior.initial_mode = SafetyMode::Engineer;
        save_settings(dir.path(), &settings).unwrap();
        assert_eq!(load_settings(dir.path()), settings);
    }
}
