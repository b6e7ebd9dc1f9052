use crate::loader::LoaderConfig;
use crate::viewport::MAX_WINDOW_ROWS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Most recently opened files kept in settings.
pub const MAX_RECENT_FILES: usize = 20;

fn default_window_rows() -> u64 {
    MAX_WINDOW_ROWS
}

fn default_chunk_size_kib() -> u64 {
    1024
}

fn default_small_file_threshold_mib() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSettings {
    /// Upper bound on materialized rows, clamped to `1..=100`.
    #[serde(default = "default_window_rows")]
    pub window_rows: u64,
    #[serde(default = "default_chunk_size_kib")]
    pub chunk_size_kib: u64,
    #[serde(default = "default_small_file_threshold_mib")]
    pub small_file_threshold_mib: u64,
    /// Most recent first.
    #[serde(default)]
    pub recent_files: Vec<PathBuf>,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            window_rows: default_window_rows(),
            chunk_size_kib: default_chunk_size_kib(),
            small_file_threshold_mib: default_small_file_threshold_mib(),
            recent_files: Vec::new(),
        }
    }
}

impl ViewerSettings {
    pub fn window_rows(&self) -> u64 {
        self.window_rows.clamp(1, MAX_WINDOW_ROWS)
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            chunk_size: self.chunk_size_kib.max(1).saturating_mul(1024),
            small_file_threshold: self.small_file_threshold_mib.saturating_mul(1024 * 1024),
        }
    }

    pub fn record_recent_file(&mut self, path: &Path) {
        if path.as_os_str().is_empty() {
            return;
        }
        self.recent_files.retain(|p| p != path);
        self.recent_files.insert(0, path.to_path_buf());
        self.recent_files.truncate(MAX_RECENT_FILES);
    }
}

fn settings_dir() -> Option<PathBuf> {
    // On macOS: ~/Library/Application Support/hexgrid
    // On Linux: ~/.config/hexgrid (via dirs crate)
    dirs::config_dir().map(|d| d.join("hexgrid"))
}

fn settings_path() -> Option<PathBuf> {
    settings_dir().map(|d| d.join("settings.json"))
}

/// Load settings from the platform config directory.
/// Returns default settings if file is missing or invalid.
pub fn load_settings() -> ViewerSettings {
    match settings_path() {
        Some(path) => load_settings_from(&path),
        None => {
            log::warn!("settings: cannot determine config path");
            ViewerSettings::default()
        }
    }
}

pub fn load_settings_from(path: &Path) -> ViewerSettings {
    let data = match fs::read_to_string(path) {
        Ok(d) => d,
        Err(_) => {
            log::info!("settings: no settings file at {}", path.display());
            return ViewerSettings::default();
        }
    };

    match serde_json::from_str(&data) {
        Ok(s) => {
            log::info!("settings: loaded from {}", path.display());
            s
        }
        Err(e) => {
            log::warn!("settings: failed to parse {}: {}", path.display(), e);
            ViewerSettings::default()
        }
    }
}

/// Save settings to the platform config directory.
/// Creates directory if needed.
pub fn save_settings(settings: &ViewerSettings) {
    match settings_path() {
        Some(path) => save_settings_to(settings, &path),
        None => log::warn!("settings: cannot determine config directory"),
    }
}

pub fn save_settings_to(settings: &ViewerSettings, path: &Path) {
    if let Some(dir) = path.parent() {
        if let Err(e) = fs::create_dir_all(dir) {
            log::error!("settings: failed to create directory {}: {}", dir.display(), e);
            return;
        }
    }

    match serde_json::to_string_pretty(settings) {
        Ok(json) => {
            if let Err(e) = fs::write(path, json) {
                log::error!("settings: failed to write {}: {}", path.display(), e);
            } else {
                log::info!("settings: saved to {}", path.display());
            }
        }
        Err(e) => {
            log::error!("settings: failed to serialize: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_roundtrip() {
        let mut settings = ViewerSettings::default();
        settings.window_rows = 40;
        settings.chunk_size_kib = 256;
        settings.record_recent_file(Path::new("/tmp/a.bin"));
        settings.record_recent_file(Path::new("/tmp/b.bin"));

        let json = serde_json::to_string_pretty(&settings).unwrap();
        let loaded: ViewerSettings = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded, settings);
        assert_eq!(loaded.recent_files[0], PathBuf::from("/tmp/b.bin"));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let loaded: ViewerSettings = serde_json::from_str(r#"{"window_rows": 500}"#).unwrap();
        assert_eq!(loaded.window_rows(), MAX_WINDOW_ROWS);
        assert_eq!(loaded.loader_config(), LoaderConfig::default());
        assert!(loaded.recent_files.is_empty());

        let zero: ViewerSettings = serde_json::from_str(r#"{"window_rows": 0}"#).unwrap();
        assert_eq!(zero.window_rows(), 1);
    }

    #[test]
    fn test_recent_files_dedup_and_cap() {
        let mut settings = ViewerSettings::default();
        for i in 0..25 {
            settings.record_recent_file(&PathBuf::from(format!("/data/{}.bin", i)));
        }
        settings.record_recent_file(Path::new("/data/10.bin"));

        assert_eq!(settings.recent_files.len(), MAX_RECENT_FILES);
        assert_eq!(settings.recent_files[0], PathBuf::from("/data/10.bin"));
        assert_eq!(
            settings
                .recent_files
                .iter()
                .filter(|p| p.as_path() == Path::new("/data/10.bin"))
                .count(),
            1
        );
        assert_eq!(settings.recent_files[1], PathBuf::from("/data/24.bin"));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = ViewerSettings::default();
        settings.small_file_threshold_mib = 2;
        save_settings_to(&settings, &path);

        let loaded = load_settings_from(&path);
        assert_eq!(loaded.small_file_threshold_mib, 2);
        assert_eq!(loaded.loader_config().small_file_threshold, 2 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(load_settings_from(&path), ViewerSettings::default());
        assert_eq!(
            load_settings_from(&dir.path().join("missing.json")),
            ViewerSettings::default()
        );
    }
}
