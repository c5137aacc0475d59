//! INI file configuration adapter.
//!
//! Sections used: `[strategy]` and `[backtest]`. Blank values read as unset.

use crate::domain::error::CrosstraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CrosstraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| CrosstraderError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, CrosstraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| CrosstraderError::ConfigParse {
                file: "<string>".into(),
                reason,
            })?;
        Ok(Self { config })
    }

    /// An adapter with no sections; every lookup falls back to its default.
    pub fn empty() -> Self {
        Self { config: Ini::new() }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }
}
