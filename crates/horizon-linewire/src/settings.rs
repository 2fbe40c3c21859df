//! Persisted operator settings.
//!
//! Each tool keeps the fields an operator typed last time in a small TOML
//! file. By default the file lives in the platform configuration directory
//! (via `directories::ProjectDirs`); the binaries accept `--settings <path>`
//! to use another location.
//!
//! A missing file yields defaults. A file that exists but does not parse is an
//! error rather than being silently replaced.
//!
//! ```ignore
//! use horizon_linewire::settings::{ClientSettings, SettingsFile};
//!
//! let path = ClientSettings::default_path()?;
//! let mut settings = ClientSettings::load_from(&path)?;
//! settings.send_text = "ping".into();
//! settings.save_to(&path)?;
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{LinewireError, Result};

/// Default port shared by the client and server settings.
pub const DEFAULT_PORT: u16 = 7000;

/// Configuration directory for all Linewire tools.
pub fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("com", "Horizon Analytic Studios", "Linewire")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(LinewireError::NoConfigDir)
}

/// A settings type stored as one TOML file.
pub trait SettingsFile: Serialize + DeserializeOwned + Default {
    /// File name inside [`config_dir`].
    const FILE_NAME: &'static str;

    /// Location used when no explicit path is given.
    fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join(Self::FILE_NAME))
    }

    /// Load from `path`, falling back to defaults when the file is missing.
    fn load_from(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(LinewireError::io(path, e)),
        };
        toml::from_str(&text).map_err(|source| LinewireError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write to `path`, creating parent directories.
    ///
    /// The file is written next to its destination and renamed into place.
    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| LinewireError::io(parent, e))?;
        }

        let text = toml::to_string_pretty(self)?;
        let staging = path.with_extension("toml.tmp");
        fs::write(&staging, text).map_err(|e| LinewireError::io(&staging, e))?;
        fs::rename(&staging, path).map_err(|e| LinewireError::io(path, e))?;
        tracing::debug!(path = %path.display(), "settings saved");
        Ok(())
    }
}

/// What the client remembers between runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Host name or IP address to connect to.
    pub address: String,
    pub port: u16,
    /// Repeat interval in milliseconds.
    pub repeat_interval_ms: u64,
    /// Text in the send box.
    pub send_text: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            repeat_interval_ms: 1000,
            send_text: String::new(),
        }
    }
}

impl SettingsFile for ClientSettings {
    const FILE_NAME: &'static str = "client.toml";
}

/// What the server remembers between runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    /// Text in the send box.
    pub send_text: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            send_text: String::new(),
        }
    }
}

impl SettingsFile for ServerSettings {
    const FILE_NAME: &'static str = "server.toml";
}

/// Resolve an explicit path, or the default location for `T`.
pub fn resolve_path<T: SettingsFile>(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => T::default_path(),
    }
}
