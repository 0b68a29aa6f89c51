// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use keyward_core::crypto::Argon2Params;
use keyward_core::error::{KeywardError, Result};
use keyward_core::vault::DEFAULT_NAMESPACE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KdfProfile {
    Testing,
    #[default]
    Default,
    High,
}

impl KdfProfile {
    pub fn params(self) -> Argon2Params {
        match self {
            Self::Testing => Argon2Params::TESTING,
            Self::Default => Argon2Params::DEFAULT,
            Self::High => Argon2Params::HIGH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        f.write_str(s)
    }
}

fn deserialize_path<'de, D>(deserializer: D) -> std::result::Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)
        .map(|opt| opt.map(|s| PathBuf::from(shellexpand::tilde(&s).as_ref())))
}

fn deserialize_namespace<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    if let Some(ns) = &opt {
        let valid = !ns.is_empty()
            && ns
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid {
            return Err(serde::de::Error::custom(format!(
                "Invalid namespace: '{ns}'. Use lowercase letters, digits and '_'"
            )));
        }
    }
    Ok(opt)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, deserialize_with = "deserialize_path")]
    pub data_dir: Option<PathBuf>,
    #[serde(default, deserialize_with = "deserialize_path")]
    pub backup_dir: Option<PathBuf>,
    #[serde(default, deserialize_with = "deserialize_namespace")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub kdf: KdfProfile,
    #[serde(default)]
    pub log_level: LogLevel,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        const MAX_CONFIG_SIZE: u64 = 64 * 1024;
        let unreadable =
            |e: std::io::Error| KeywardError::Other(format!("Cannot read {}: {e}", path.display()));
        if std::fs::metadata(path).map_err(unreadable)?.len() > MAX_CONFIG_SIZE {
            return Err(KeywardError::Other(format!(
                "{} is larger than {MAX_CONFIG_SIZE} bytes",
                path.display()
            )));
        }
        Self::parse(&std::fs::read_to_string(path).map_err(unreadable)?)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| KeywardError::Other(format!("Invalid config: {}", e)))
    }

    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("keyward").join("config.toml"))
            .ok_or(KeywardError::HomeNotFound)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(p) => Ok(p.clone()),
            None => keyward_core::default_data_dir(),
        }
    }

    pub fn backup_dir(&self, data_dir: &Path) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("backups"))
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }
}
