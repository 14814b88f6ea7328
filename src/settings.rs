use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};

pub const SETTINGS_FILE: &str = "settings.toml";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemeMode {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            other => Err(format!("unknown theme mode '{other}'")),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EngineLogLevel {
    Silent,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl EngineLogLevel {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "silent" => Ok(Self::Silent),
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            other => Err(format!("unknown log level '{other}'")),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Settings {
    #[serde(default)]
    pub enable_tun_mode: bool,
    #[serde(default)]
    pub enable_auto_launch: bool,
    #[serde(default)]
    pub enable_service_mode: bool,
    #[serde(default)]
    pub enable_silent_start: bool,
    #[serde(default)]
    pub enable_system_proxy: bool,
    #[serde(default)]
    pub theme_mode: ThemeMode,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_mixed_port")]
    pub mixed_port: u16,
    #[serde(default)]
    pub allow_lan: bool,
    #[serde(default)]
    pub engine_log_level: EngineLogLevel,
}

fn default_language() -> String {
    "en".into()
}

fn default_mixed_port() -> u16 {
    7890
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_tun_mode: false,
            enable_auto_launch: false,
            enable_service_mode: false,
            enable_silent_start: false,
            enable_system_proxy: false,
            theme_mode: ThemeMode::System,
            language: default_language(),
            mixed_port: default_mixed_port(),
            allow_lan: false,
            engine_log_level: EngineLogLevel::Info,
        }
    }
}

/// A partial settings record; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub enable_tun_mode: Option<bool>,
    pub enable_auto_launch: Option<bool>,
    pub enable_service_mode: Option<bool>,
    pub enable_silent_start: Option<bool>,
    pub enable_system_proxy: Option<bool>,
    pub theme_mode: Option<ThemeMode>,
    pub language: Option<String>,
    pub mixed_port: Option<u16>,
    pub allow_lan: Option<bool>,
    pub engine_log_level: Option<EngineLogLevel>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.enable_tun_mode.is_none()
            && self.enable_auto_launch.is_none()
            && self.enable_service_mode.is_none()
            && self.enable_silent_start.is_none()
            && self.enable_system_proxy.is_none()
            && self.theme_mode.is_none()
            && self.language.is_none()
            && self.mixed_port.is_none()
            && self.allow_lan.is_none()
            && self.engine_log_level.is_none()
    }

    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(value) = self.enable_tun_mode {
            settings.enable_tun_mode = value;
        }
        if let Some(value) = self.enable_auto_launch {
            settings.enable_auto_launch = value;
        }
        if let Some(value) = self.enable_service_mode {
            settings.enable_service_mode = value;
        }
        if let Some(value) = self.enable_silent_start {
            settings.enable_silent_start = value;
        }
        if let Some(value) = self.enable_system_proxy {
            settings.enable_system_proxy = value;
        }
        if let Some(value) = self.theme_mode {
            settings.theme_mode = value;
        }
        if let Some(ref value) = self.language {
            settings.language = value.clone();
        }
        if let Some(value) = self.mixed_port {
            settings.mixed_port = value;
        }
        if let Some(value) = self.allow_lan {
            settings.allow_lan = value;
        }
        if let Some(value) = self.engine_log_level {
            settings.engine_log_level = value;
        }
    }
}

pub fn settings_directory() -> PathBuf {
    let directory = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("proxydesk");
    if let Err(error) = std::fs::create_dir_all(&directory) {
        log::warn!(
            "[settings] failed to create configuration directory {}: {error}",
            directory.display()
        );
    }
    directory
}

pub fn load_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                log::info!("[settings] loaded from {}", path.display());
                settings
            }
            Err(error) => {
                log::warn!("[settings] failed to parse {}: {error}", path.display());
                Settings::default()
            }
        },
        Err(_) => {
            log::info!("[settings] no file at {}, using defaults", path.display());
            Settings::default()
        }
    }
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), String> {
    if let Some(parent) = path.parent()
        && let Err(error) = std::fs::create_dir_all(parent)
    {
        return Err(format!(
            "Failed to create directory {}: {error}",
            parent.display()
        ));
    }
    let content = toml::to_string_pretty(settings)
        .map_err(|error| format!("Failed to serialize settings: {error}"))?;
    std::fs::write(path, content)
        .map_err(|error| format!("Failed to write {}: {error}", path.display()))
}

/// The one shared snapshot of the configuration. Panels hold a handle and
/// read through `snapshot`; writes go through `apply_patch` only.
#[derive(Clone)]
pub struct SettingsStore {
    path: PathBuf,
    inner: Arc<Mutex<Settings>>,
}

impl SettingsStore {
    pub fn load(path: PathBuf) -> Self {
        let settings = load_settings(&path);
        Self {
            path,
            inner: Arc::new(Mutex::new(settings)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Settings {
        match self.inner.lock() {
            Ok(settings) => settings.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn apply_patch(&self, patch: &SettingsPatch) -> Result<(), String> {
        let mut settings = self
            .inner
            .lock()
            .map_err(|_| "settings store lock poisoned".to_string())?;
        patch.apply_to(&mut settings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_touches_only_set_fields() {
        let mut settings = Settings::default();
        let patch = SettingsPatch {
            enable_tun_mode: Some(true),
            mixed_port: Some(9999),
            ..Default::default()
        };
        patch.apply_to(&mut settings);

        assert!(settings.enable_tun_mode);
        assert_eq!(settings.mixed_port, 9999);
        assert!(!settings.enable_system_proxy);
        assert_eq!(settings.language, "en");
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(SettingsPatch::default().is_empty());
        let patch = SettingsPatch {
            allow_lan: Some(true),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn settings_survive_a_save_and_load() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join(SETTINGS_FILE);

        let mut settings = Settings::default();
        settings.enable_system_proxy = true;
        settings.theme_mode = ThemeMode::Dark;
        settings.mixed_port = 1081;
        save_settings(&path, &settings).unwrap();

        let loaded = load_settings(&path);
        assert!(loaded.enable_system_proxy);
        assert_eq!(loaded.theme_mode, ThemeMode::Dark);
        assert_eq!(loaded.mixed_port, 1081);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let directory = tempfile::tempdir().unwrap();
        let loaded = load_settings(&directory.path().join("absent.toml"));
        assert!(!loaded.enable_tun_mode);
        assert_eq!(loaded.mixed_port, 7890);
    }

    #[test]
    fn partial_file_fills_missing_fields_with_defaults() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join(SETTINGS_FILE);
        std::fs::write(&path, "enable_tun_mode = true\n").unwrap();

        let loaded = load_settings(&path);
        assert!(loaded.enable_tun_mode);
        assert_eq!(loaded.language, "en");
        assert_eq!(loaded.engine_log_level, EngineLogLevel::Info);
    }

    #[test]
    fn store_patch_is_visible_in_the_next_snapshot() {
        let directory = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(directory.path().join(SETTINGS_FILE));

        let patch = SettingsPatch {
            enable_auto_launch: Some(true),
            ..Default::default()
        };
        store.apply_patch(&patch).unwrap();

        assert!(store.snapshot().enable_auto_launch);
    }

    #[test]
    fn theme_and_log_level_parse_round() {
        assert_eq!(ThemeMode::parse("dark").unwrap(), ThemeMode::Dark);
        assert!(ThemeMode::parse("midnight").is_err());
        assert_eq!(
            EngineLogLevel::parse("debug").unwrap(),
            EngineLogLevel::Debug
        );
        assert!(EngineLogLevel::parse("loud").is_err());
    }
}
