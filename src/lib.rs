//! # Embedding Atlas (library root)
//!
//! Maps a corpus of article-title embeddings onto a 2D plane and places free-text
//! queries on that map next to their nearest articles.
//!
//! The pipeline, one module per stage:
//! - Reading vectors out of SQLite (`vector_store`, `models`, `schema`, `corpus`).
//! - Fitting a UMAP layout and projecting new points into it (`layout`).
//! - Exact Euclidean nearest-neighbour search (`neighbors`).
//! - Turning text into vectors with a local BERT sentence encoder (`encoder`).
//! - Holding the fitted map for a session and answering queries (`session`).
//! - Drawing the map in the terminal or exporting it as Plotly (`pretty`, `plot`).
//!
//! On top of that sit the CLI (`commands`), its handlers (`app`), YAML
//! configuration (`config`) and the shared error type (`error`).
//!
//! ## Configuration directory
//! [`config_dir`] resolves the per-platform location of `config.yaml`, e.g.:
//!
//! - macOS: `~/Library/Application Support/com.awful-sec.atlas`
//! - Linux (XDG): `~/.config/atlas`
//! - Windows: `C:\Users\<you>\AppData\Roaming\awful-sec\atlas\config`
//!
//! ## Modules
//! - [`app`], [`commands`], [`config`], [`corpus`], [`encoder`], [`error`],
//!   [`layout`], [`models`], [`neighbors`], [`plot`], [`pretty`], [`schema`],
//!   [`session`], [`vector_store`]

use directories::ProjectDirs;
use std::error::Error;

pub mod app;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod encoder;
pub mod error;
pub mod layout;
pub mod models;
pub mod neighbors;
pub mod plot;
pub mod pretty;
pub mod schema;
pub mod session;
pub mod vector_store;

/// Retrieves the configuration directory for the application.
///
/// Utilizes the `directories` crate to determine the appropriate configuration directory
/// based on the operating system's conventions.
///
/// # Errors
///
/// Returns an error if unable to determine the configuration directory.
pub fn config_dir() -> Result<std::path::PathBuf, Box<dyn Error>> {
    let proj_dirs = ProjectDirs::from("com", "awful-sec", "atlas")
        .ok_or("Unable to determine config directory")?;
    Ok(proj_dirs.config_dir().to_path_buf())
}
