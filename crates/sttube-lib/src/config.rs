//! Application configuration — TOML-based, platform-aware paths.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::discovery::{InterfaceGuid, STM32_DFU_GUID};
use crate::driver::DEFAULT_LIBRARY;

/// Header comment prepended to saved config files.
const CONFIG_HEADER: &str = "# STTube configuration, written by `sttube-cli config --init`.\n\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Vendor library loaded at startup. Default: "STTubeDevice30.dll" (DLL search path).
    #[serde(default = "default_library_path")]
    pub library_path: String,

    /// Interface class GUID used for discovery. Default: the STM32 DFU GUID.
    #[serde(default = "default_device_guid")]
    pub device_guid: String,

    /// Explicit device path. Empty = first device discovered for `device_guid`.
    #[serde(default)]
    pub device_path: String,

    /// Driver transfer timeout applied after open. 0 = keep the driver default.
    #[serde(default)]
    pub default_timeout_ms: u32,

    /// Suspend behaviour applied after open. Unset = keep the driver default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_suspend: Option<bool>,
}

fn default_library_path() -> String {
    DEFAULT_LIBRARY.into()
}
fn default_device_guid() -> String {
    STM32_DFU_GUID.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            library_path: default_library_path(),
            device_guid: default_device_guid(),
            device_path: String::new(),
            default_timeout_ms: 0,
            allow_suspend: None,
        }
    }
}

/// Validation errors that [`Config::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// `library_path` is empty or whitespace-only.
    EmptyLibraryPath,
    /// `device_guid` is not a GUID.
    InvalidGuid(String),
    /// `device_path` contains a NUL byte.
    InvalidDevicePath,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyLibraryPath => write!(f, "Library path cannot be empty"),
            ValidationError::InvalidGuid(e) => write!(f, "Invalid device_guid: {e}"),
            ValidationError::InvalidDevicePath => {
                write!(f, "Invalid device_path: contains a NUL byte")
            }
        }
    }
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        #[cfg(windows)]
        {
            dirs::config_dir().map(|p| p.join("STTube"))
        }
        #[cfg(not(windows))]
        {
            dirs::config_dir().map(|p| p.join("sttube"))
        }
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Load config from disk, or return defaults if not found.
    pub fn load() -> Self {
        let (config, warnings) = Self::load_with_warnings();
        for w in &warnings {
            log::warn!("{w}");
        }
        config
    }

    /// Save config to an arbitrary path atomically (write to temp file, then rename).
    ///
    /// A header comment is prepended to warn that manual edits may be overwritten.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let serialized = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        let contents = format!("{CONFIG_HEADER}{serialized}");
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, &contents)?;
        match std::fs::rename(&tmp, path) {
            Ok(()) => Ok(()),
            Err(_) => {
                // Rename can fail across filesystems; fall back to direct write + cleanup
                let result = std::fs::write(path, &contents);
                let _ = std::fs::remove_file(&tmp);
                result
            }
        }
    }

    /// Save config to the default platform path.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config directory",
            ));
        };
        self.save_to(&path)
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    /// Parsed `device_guid`.
    pub fn guid(&self) -> crate::error::Result<InterfaceGuid> {
        self.device_guid
            .parse()
            .map_err(crate::SttubeError::Config)
    }

    /// Validate the entire config, collecting all errors.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.library_path.trim().is_empty() {
            errors.push(ValidationError::EmptyLibraryPath);
        }
        if let Err(e) = self.device_guid.parse::<InterfaceGuid>() {
            errors.push(ValidationError::InvalidGuid(e));
        }
        if self.device_path.contains('\0') {
            errors.push(ValidationError::InvalidDevicePath);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
