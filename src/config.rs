//! This module provides functionality for loading and handling the application's configuration.
//!
//! It defines the `AtlasConfig` struct, which holds the configuration parameters,
//! and `load_config` / `write_config` to read and write it as YAML.
//!
//! # Examples
//!
//! Loading the configuration from a file:
//!
//! ```no_run
//! use embedding_atlas::config::{AtlasConfig, load_config};
//!
//! let config_file_path = "/path/to/config.yaml";
//! let config: AtlasConfig = load_config(config_file_path).unwrap();
//! println!("{:?}", config);
//! ```
//!
//! A minimal file only needs the database:
//!
//! ```yaml
//! database_url: "/home/me/.config/atlas/atlas.db"
//! ```
//!
//! Everything else falls back to defaults: the MiniLM encoder, the whole
//! corpus (no sampling), 5 neighbours and the default UMAP settings.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::debug;

use crate::encoder::DEFAULT_MODEL_ID;
use crate::error::AtlasError;
use crate::layout::LayoutParams;

/// Represents the application's configuration.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct AtlasConfig {
    /// Path of the SQLite database holding the `articles` table.
    pub database_url: String,

    /// Hugging Face model id of the sentence encoder. Must be the model that
    /// produced the stored vectors.
    #[serde(default = "default_model_id")]
    pub model_id: String,

    #[serde(default = "default_model_revision")]
    pub model_revision: String,

    /// Random sample size per session. `None` maps the whole corpus.
    #[serde(default)]
    pub sample_size: Option<usize>,

    /// How many neighbours a query highlights.
    #[serde(default = "default_neighbors")]
    pub neighbors: usize,

    #[serde(default)]
    pub layout: LayoutParams,
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_model_revision() -> String {
    "main".to_string()
}

fn default_neighbors() -> usize {
    5
}

impl AtlasConfig {
    /// Default configuration pointing at `database_url`.
    pub fn with_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            model_id: default_model_id(),
            model_revision: default_model_revision(),
            sample_size: None,
            neighbors: default_neighbors(),
            layout: LayoutParams::default(),
        }
    }

    /// Apply command-line / environment overrides on top of the file values.
    pub fn apply_overrides(&mut self, database_url: Option<String>, model_id: Option<String>) {
        if let Some(url) = database_url {
            debug!("database_url overridden: {}", url);
            self.database_url = url;
        }
        if let Some(model) = model_id {
            debug!("model_id overridden: {}", model);
            self.model_id = model;
        }
    }
}

/// Loads the application's configuration from a YAML file.
///
/// # Errors
///
/// - [`AtlasError::Io`] if the file cannot be read.
/// - [`AtlasError::Config`] if the YAML does not describe an `AtlasConfig`.
pub fn load_config(file: &str) -> Result<AtlasConfig, AtlasError> {
    debug!("loading config from {}", file);
    let content = fs::read_to_string(file)?;
    let config: AtlasConfig = serde_yaml::from_str(&content)?;
    if config.sample_size == Some(0) {
        return Err(AtlasError::Config("sample_size must be at least 1".to_string()));
    }
    if config.neighbors == 0 {
        return Err(AtlasError::Config("neighbors must be at least 1".to_string()));
    }
    Ok(config)
}

/// Serialize `config` as YAML to `path`, creating parent directories.
pub fn write_config(path: &Path, config: &AtlasConfig) -> Result<(), AtlasError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_yaml::to_string(config)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, tempdir};

    #[test]
    fn test_load_config_valid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
database_url: "atlas.db"
model_id: "BAAI/bge-large-en-v1.5"
sample_size: 5000
neighbors: 8
layout:
  n_neighbors: 30
  seed: 7
"#
        )
        .unwrap();

        let config = load_config(temp_file.path().to_str().unwrap());

        assert!(config.is_ok());
        let config = config.unwrap();
        assert_eq!(config.database_url, "atlas.db");
        assert_eq!(config.model_id, "BAAI/bge-large-en-v1.5");
        assert_eq!(config.model_revision, "main");
        assert_eq!(config.sample_size, Some(5000));
        assert_eq!(config.neighbors, 8);
        assert_eq!(config.layout.n_neighbors, 30);
        assert_eq!(config.layout.seed, 7);
        assert_eq!(config.layout.min_dist, 0.1);
    }

    #[test]
    fn test_load_config_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, r#"database_url: "atlas.db""#).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config, AtlasConfig::with_database("atlas.db"));
    }

    #[test]
    fn test_load_config_invalid_file() {
        let config = load_config("non/existent/path");
        assert!(matches!(config, Err(AtlasError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_format() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, r#"invalid: config: format"#).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap());
        assert!(matches!(config, Err(AtlasError::Config(_))));
    }

    #[test]
    fn test_load_config_rejects_zero_counts() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "database_url: \"atlas.db\"\nsample_size: 0").unwrap();
        let config = load_config(temp_file.path().to_str().unwrap());
        assert!(matches!(config, Err(AtlasError::Config(_))));

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "database_url: \"atlas.db\"\nneighbors: 0").unwrap();
        let config = load_config(temp_file.path().to_str().unwrap());
        assert!(matches!(config, Err(AtlasError::Config(_))));
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.yaml");
        let mut config = AtlasConfig::with_database("x.db");
        config.sample_size = Some(100);

        write_config(&path, &config).unwrap();
        let loaded = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_overrides() {
        let mut config = AtlasConfig::with_database("a.db");
        config.apply_overrides(Some("b.db".into()), None);
        assert_eq!(config.database_url, "b.db");
        assert_eq!(config.model_id, DEFAULT_MODEL_ID);
    }
}
