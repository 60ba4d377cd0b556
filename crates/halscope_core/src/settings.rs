//! Persistent Inspector Settings
//!
//! Handles saving/loading inspector preferences to disk.
//!
//! # Storage Locations
//! - Linux: `~/.config/halscope/settings.json`
//! - Windows: `%APPDATA%\halscope\settings.json`
//! - macOS: `~/Library/Application Support/com.halscope.halscope/settings.json`

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use halscope_hal::{element, scope, Element, Scope};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{InspectorError, InspectorResult};

/// Property scope, by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeSetting {
    Global,
    Input,
    Output,
    PlayThrough,
    #[default]
    Any,
}

impl ScopeSetting {
    pub fn scope(self) -> Scope {
        match self {
            ScopeSetting::Global => scope::GLOBAL,
            ScopeSetting::Input => scope::INPUT,
            ScopeSetting::Output => scope::OUTPUT,
            ScopeSetting::PlayThrough => scope::PLAY_THROUGH,
            ScopeSetting::Any => scope::ANY,
        }
    }
}

impl FromStr for ScopeSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "global" | "glob" => Ok(ScopeSetting::Global),
            "input" | "inpt" => Ok(ScopeSetting::Input),
            "output" | "outp" => Ok(ScopeSetting::Output),
            "play_through" | "playthrough" | "ptru" => Ok(ScopeSetting::PlayThrough),
            "any" | "*" | "****" => Ok(ScopeSetting::Any),
            other => Err(format!("unknown scope '{}'", other)),
        }
    }
}

impl fmt::Display for ScopeSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeSetting::Global => "global",
            ScopeSetting::Input => "input",
            ScopeSetting::Output => "output",
            ScopeSetting::PlayThrough => "play_through",
            ScopeSetting::Any => "any",
        };
        f.write_str(name)
    }
}

/// Root settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectorSettings {
    /// Scope used when listing properties
    #[serde(default)]
    pub scope: ScopeSetting,
    #[serde(default = "default_element")]
    pub element: Element,
    /// List deprecated property sets alongside the current ones
    #[serde(default)]
    pub include_deprecated: bool,
    /// Use the in-memory HAL even where the system HAL is available
    #[serde(default)]
    pub simulated: bool,
    /// `tracing` filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

fn default_element() -> Element {
    element::ANY
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for InspectorSettings {
    fn default() -> Self {
        Self {
            scope: ScopeSetting::default(),
            element: default_element(),
            include_deprecated: false,
            simulated: false,
            log_filter: default_log_filter(),
            saved_at: None,
        }
    }
}

impl InspectorSettings {
    /// Load settings from disk, or return default if missing/corrupt
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                info!("Using default settings");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::File::open(path) {
                Ok(file) => match serde_json::from_reader(file) {
                    Ok(settings) => {
                        info!("Settings loaded from {:?}", path);
                        return settings;
                    }
                    Err(e) => error!("Failed to parse settings file: {}", e),
                },
                Err(e) => error!("Failed to open settings file: {}", e),
            }
        }

        info!("Using default settings");
        Self::default()
    }

    /// Save settings to disk
    pub fn save(&mut self) -> InspectorResult<PathBuf> {
        let path = Self::config_path()
            .ok_or_else(|| InspectorError::Settings("Could not determine config path".into()))?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&mut self, path: &Path) -> InspectorResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| InspectorError::Settings(e.to_string()))?;
        }

        self.saved_at = Some(Utc::now());
        let file = fs::File::create(path).map_err(|e| InspectorError::Settings(e.to_string()))?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| InspectorError::Settings(e.to_string()))?;

        info!("Settings saved to {:?}", path);
        Ok(())
    }

    /// Get the platform-specific configuration file path
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "halscope", "halscope")
            .map(|proj| proj.config_dir().join("settings.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("halscope-settings-{}-{}", name, std::process::id()))
            .join("settings.json")
    }

    #[test]
    fn test_default_settings() {
        let settings = InspectorSettings::default();
        assert_eq!(settings.scope, ScopeSetting::Any);
        assert_eq!(settings.element, element::ANY);
        assert!(!settings.include_deprecated);
        assert!(!settings.simulated);
        assert_eq!(settings.log_filter, "info");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = scratch_path("roundtrip");
        let mut settings = InspectorSettings {
            scope: ScopeSetting::Output,
            include_deprecated: true,
            log_filter: "halscope_hal=trace".into(),
            ..Default::default()
        };

        settings.save_to(&path).unwrap();
        let loaded = InspectorSettings::load_from(&path);
        assert_eq!(loaded, settings);
        assert!(loaded.saved_at.is_some());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_default() {
        let path = scratch_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(InspectorSettings::load_from(&path), InspectorSettings::default());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: InspectorSettings = serde_json::from_str(r#"{ "scope": "input" }"#).unwrap();
        assert_eq!(settings.scope, ScopeSetting::Input);
        assert_eq!(settings.element, element::ANY);
        assert_eq!(settings.log_filter, "info");
    }

    #[test]
    fn test_scope_names() {
        assert_eq!("Output".parse::<ScopeSetting>(), Ok(ScopeSetting::Output));
        assert_eq!("****".parse::<ScopeSetting>(), Ok(ScopeSetting::Any));
        assert!("sideways".parse::<ScopeSetting>().is_err());
        assert_eq!(ScopeSetting::PlayThrough.scope(), scope::PLAY_THROUGH);
        assert_eq!(ScopeSetting::PlayThrough.to_string(), "play_through");
    }
}
