use crate::{Error, Result};
use serde::Deserialize;
use serde_json;
use std::path::Path;

pub const DEFAULT_HIGH_WATER_MARK: usize = 16 * 1024;

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// bytes the engine may prefetch into a cursor's read-ahead cache
    pub high_water_mark: usize,
    /// open the engine on first use through [`crate::AsyncDB::ensure`]
    pub lazy_open: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            lazy_open: true,
        }
    }
}

impl Config {
    pub fn from_slice(buf: &[u8]) -> Result<Self> {
        let config: Config = serde_json::from_slice(buf)
            .map_err(|e| Error::Config(format!("cannot deserialze Config: {e}")))?;
        if config.high_water_mark == 0 {
            return Err(Error::Config("high_water_mark must be positive".to_owned()));
        }
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let buf = std::fs::read(path)?;
        Self::from_slice(&buf)
    }

    #[inline]
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }
}
