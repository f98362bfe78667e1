//! Runtime configuration
//!
//! Built once at startup from built-in defaults, the optional
//! `config.json` in the storage directory, and `HUE_RESTORE_*`
//! environment variables (in increasing priority).

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::models::ColorMode;
use crate::{Error, Result};

/// Name of the configuration document inside the storage directory
pub const CONFIG_FILE: &str = "config.json";

/// Visual state a light reports right after it regains power
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultProfile {
    /// Capability profile, e.g. `Extended color light`
    pub light_type: String,
    pub colormode: ColorMode,
    /// Color temperature in mired
    pub ct: u16,
    pub bri: u8,
}

impl Default for DefaultProfile {
    fn default() -> Self {
        DefaultProfile {
            light_type: String::from("Extended color light"),
            colormode: ColorMode::Ct,
            ct: 369,
            bri: 254,
        }
    }
}

/// Everything a command needs to know about its environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Bridge host name or IP address
    pub bridge: Option<String>,

    /// Application credential (whitelisted username) on the bridge
    pub username: Option<String>,

    /// Directory for `snapshots.json`, the journal, and `config.json`
    pub storage_dir: PathBuf,

    /// Number of lights at the default profile which signals a power loss
    pub threshold: usize,

    pub profile: DefaultProfile,

    /// Pause between successive restoration writes
    pub write_interval: Duration,

    /// Timeout for each bridge request
    pub request_timeout: Duration,

    /// `devicetype` sent when registering with the bridge
    pub device_type: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bridge: None,
            username: None,
            storage_dir: PathBuf::from("."),
            threshold: 3,
            profile: DefaultProfile::default(),
            write_interval: Duration::from_millis(100),
            request_timeout: Duration::from_secs(5),
            device_type: String::from("hue-restore#cli"),
        }
    }
}

/// On-disk shape of `config.json`, every key optional
#[serde_with::skip_serializing_none]
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub bridge: Option<String>,
    pub username: Option<String>,
    pub threshold: Option<usize>,
    pub profile: Option<DefaultProfile>,
    pub write_interval_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub device_type: Option<String>,
}

impl ConfigFile {
    /// Read `config.json` from the directory, if there is one
    pub fn read(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content).map_err(Error::JsonLoad)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage("read", &path, e)),
        }
    }

    /// Write this as `config.json` into the directory
    pub fn write(&self, dir: &Path) -> Result<()> {
        let path = dir.join(CONFIG_FILE);
        let contents = serde_json::to_string_pretty(self).map_err(Error::JsonDump)?;
        fs::write(&path, contents).map_err(|e| Error::storage("write", &path, e))
    }
}

/// Storage directory named by `HUE_RESTORE_STORAGE_PATH`, default `.`
///
/// Available before the rest of the configuration is loaded, so that
/// failures loading it can still be journaled.
pub fn storage_dir() -> PathBuf {
    env::var_os("HUE_RESTORE_STORAGE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Config {
    /// Load from the process environment and the storage directory
    pub fn load() -> Result<Self> {
        let file = ConfigFile::read(&storage_dir())?;
        Self::from_sources(file, |key| env::var(key).ok())
    }

    /// Merge defaults, an optional config file and variable lookups
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_restore::config::{Config, ConfigFile};
    ///
    /// let file = ConfigFile {
    ///     bridge: Some("10.0.0.2".to_string()),
    ///     threshold: Some(5),
    ///     ..Default::default()
    /// };
    ///
    /// let config = Config::from_sources(Some(file), |key| match key {
    ///     "HUE_RESTORE_THRESHOLD" => Some("2".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    ///
    /// assert_eq!(config.bridge.as_deref(), Some("10.0.0.2"));
    /// assert_eq!(config.threshold, 2);
    /// ```
    ///
    pub fn from_sources<F>(file: Option<ConfigFile>, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(file) = file {
            debug!("applying {}", CONFIG_FILE);
            config.bridge = file.bridge.or(config.bridge);
            config.username = file.username.or(config.username);
            config.threshold = file.threshold.unwrap_or(config.threshold);
            config.profile = file.profile.unwrap_or(config.profile);
            if let Some(ms) = file.write_interval_ms {
                config.write_interval = Duration::from_millis(ms);
            }
            if let Some(ms) = file.request_timeout_ms {
                config.request_timeout = Duration::from_millis(ms);
            }
            config.device_type = file.device_type.unwrap_or(config.device_type);
        }

        if let Some(path) = var("HUE_RESTORE_STORAGE_PATH") {
            config.storage_dir = PathBuf::from(path);
        }
        if let Some(bridge) = var("HUE_RESTORE_BRIDGE") {
            config.bridge = Some(bridge);
        }
        if let Some(username) = var("HUE_RESTORE_USERNAME") {
            config.username = Some(username);
        }
        if let Some(threshold) = var("HUE_RESTORE_THRESHOLD") {
            config.threshold = threshold.parse::<usize>().map_err(|e| {
                warn!("Invalid threshold: {threshold}: {:?}", e);
                Error::InvalidConfig(format!("threshold {threshold:?} is not a number"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the detector meaningless
    pub fn validate(&self) -> Result<()> {
        if self.threshold < 1 {
            return Err(Error::InvalidConfig(String::from(
                "threshold must be at least 1",
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidConfig(String::from(
                "request timeout must be positive",
            )));
        }
        Ok(())
    }

    /// Bridge address, required for anything talking to the bridge
    pub fn bridge(&self) -> Result<&str> {
        self.bridge
            .as_deref()
            .ok_or(Error::MissingConfig("bridge address (HUE_RESTORE_BRIDGE)"))
    }

    /// Application credential, required for everything but registering
    pub fn username(&self) -> Result<&str> {
        self.username
            .as_deref()
            .ok_or(Error::MissingConfig("bridge username (run `auth` first)"))
    }
}
