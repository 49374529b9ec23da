use std::fs;
use std::path::{Path, PathBuf};

use scrape_engine::write_atomically;
use scrape_logging::{scrape_info, scrape_warn};
use serde::{Deserialize, Serialize};

pub const SETTINGS_FILENAME: &str = ".scrape_settings.ron";

/// Settings that survive between invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub local_mode: bool,
}

pub fn settings_path(dir: &Path) -> PathBuf {
    dir.join(SETTINGS_FILENAME)
}

/// Missing or unreadable settings fall back to defaults.
pub fn load_settings(dir: &Path) -> AppSettings {
    let path = settings_path(dir);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return AppSettings::default();
        }
        Err(err) => {
            scrape_warn!("Failed to read settings from {:?}: {}", path, err);
            return AppSettings::default();
        }
    };

    match ron::from_str(&content) {
        Ok(settings) => settings,
        Err(err) => {
            scrape_warn!("Failed to parse settings from {:?}: {}", path, err);
            AppSettings::default()
        }
    }
}

pub fn save_settings(dir: &Path, settings: &AppSettings) -> anyhow::Result<PathBuf> {
    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(settings, pretty)?;
    let path = write_atomically(&settings_path(dir), &content)?;
    scrape_info!("Saved settings to {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_settings(dir.path()), AppSettings::default());
    }

    #[test]
    fn saved_flag_is_loaded_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_settings(dir.path(), &AppSettings { local_mode: true }).unwrap();
        assert_eq!(path, dir.path().join(SETTINGS_FILENAME));
        assert!(load_settings(dir.path()).local_mode);
    }

    #[test]
    fn corrupt_file_means_defaults() {
        scrape_logging::initialize_for_tests();
        let dir = tempfile::tempdir().unwrap();
        fs::write(settings_path(dir.path()), "not ron at all {").unwrap();
        assert_eq!(load_settings(dir.path()), AppSettings::default());
    }
}
