//! Configuration-related functionality for Cascade.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Error;

/// Free-form options handed to a loader at construction time. Loaders carry
/// them for their resolvers without interpreting them.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(transparent)]
pub struct Options(Map<String, Value>);

impl Options {
    /// Builder-style variant of [`Options::set`].
    pub fn with<K, V>(mut self, key: K, value: V) -> Result<Self>
    where
        K: Into<String>,
        V: Serialize,
    {
        self.set(key, value)?;
        Ok(self)
    }

    /// Serialize `value` and store it under `key`, replacing any previous
    /// value.
    pub fn set<K, V>(&mut self, key: K, value: V) -> Result<()>
    where
        K: Into<String>,
        V: Serialize,
    {
        self.0.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Settings describing where views live and how they are named, usually
/// loaded from a YAML file.
///
/// ```yaml
/// paths:
///   - application
///   - modules/blog
///   - system
/// extension: twig
/// options:
///   debug: true
/// ```
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Root directories of the cascading file system, highest priority first.
    pub paths: Vec<PathBuf>,
    /// Default template file extension. Falls back to the loader's default if
    /// not given.
    pub extension: Option<String>,
    /// Passed through to the loader untouched.
    pub options: Options,
}

impl Settings {
    /// Load settings from the given YAML file. Relative root paths are taken
    /// to be relative to the directory containing the file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Attempting to load settings file: {}", path.display());
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Io(path.to_path_buf(), e))
            .wrap_err_with(|| Error::FailedToLoadSettings(path.to_path_buf()))?;
        let mut settings = Self::parse(&content)
            .wrap_err_with(|| Error::FailedToLoadSettings(path.to_path_buf()))?;
        if let Some(base) = path.parent() {
            settings.paths = settings
                .paths
                .into_iter()
                .map(|p| if p.is_relative() { base.join(p) } else { p })
                .collect();
        }
        debug!(
            "Loaded settings with {} root path(s) from {}",
            settings.paths.len(),
            path.display()
        );
        Ok(settings)
    }

    /// Parse settings from a YAML string without touching the file system.
    pub fn parse(content: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(content)?)
    }
}
