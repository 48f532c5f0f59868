//! INI file configuration adapter.

use crate::domain::error::LedgerError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::{Path, PathBuf};

pub struct FileConfigAdapter {
    config: Ini,
}

impl Default for FileConfigAdapter {
    fn default() -> Self {
        Self { config: Ini::new() }
    }
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| LedgerError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, LedgerError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| LedgerError::ConfigParse {
                file: "<inline>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    /// Strip one pair of matching quotes.
    fn unquote(value: &str) -> &str {
        let v = value.trim();
        ['"', '\'']
            .iter()
            .find_map(|q| v.strip_prefix(*q).and_then(|rest| rest.strip_suffix(*q)))
            .unwrap_or(v)
            .trim()
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }

    fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        let raw = self.config.get(section, key)?;
        let value = Self::unquote(&raw);
        (!value.is_empty()).then(|| PathBuf::from(value))
    }
}
