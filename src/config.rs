//! Run configuration, read once from a TOML file at startup.
//!
//! ```toml
//! music_dir = "/media/music"
//! mode = "automatic"              # or "manual" (default)
//! genres = ["House", "Techno"]    # choices offered in manual mode
//! query_separator = "+"
//!
//! [library]
//! MyLibrary = "catalog-playlist-id"
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, TagMateError};
use crate::library::Layout;
use crate::tagger::DEFAULT_QUERY_SEPARATOR;

/// How the genre of a track is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Ask the operator through a selection provider
    #[default]
    Manual,
    /// Search the metadata service and gate on similarity
    Automatic,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    music_dir: PathBuf,
    library: BTreeMap<String, String>,
    #[serde(default)]
    mode: Mode,
    #[serde(default)]
    genres: Vec<String>,
    query_separator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub music_dir: PathBuf,
    pub library_name: String,
    /// Reference of the library's playlist in the catalog
    pub catalog_ref: String,
    pub mode: Mode,
    pub genres: Vec<String>,
    pub query_separator: String,
}

fn config_error(msg: impl Into<String>) -> TagMateError {
    TagMateError::Config(msg.into())
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents).map_err(|e| config_error(e.to_string()))?;

        if raw.music_dir.as_os_str().is_empty() {
            return Err(config_error("music_dir is empty"));
        }
        if raw.library.len() != 1 {
            return Err(config_error(format!(
                "[library] must hold exactly one entry, found {}",
                raw.library.len()
            )));
        }
        let Some((library_name, catalog_ref)) = raw.library.into_iter().next() else {
            return Err(config_error("[library] is empty"));
        };
        if library_name.contains('/') || library_name.trim().is_empty() {
            return Err(config_error(format!(
                "library name '{}' cannot be used in the comment grammar",
                library_name
            )));
        }

        Ok(Self {
            music_dir: raw.music_dir,
            library_name,
            catalog_ref,
            mode: raw.mode,
            genres: raw.genres,
            query_separator: raw
                .query_separator
                .unwrap_or_else(|| DEFAULT_QUERY_SEPARATOR.to_string()),
        })
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.music_dir, &self.library_name)
    }
}
