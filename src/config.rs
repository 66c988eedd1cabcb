//! Analyzer configuration
//!
//! Read once at startup from JSON; every field has a default so a config
//! file only needs the settings it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Error;
use crate::lexicon::{Lexicon, LexiconPaths, open_text};

/// Settings for an [`crate::pipeline::Analyzer`]
///
/// `Default::default()` uses the built-in lexicon and runs every pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum similarity for an embedding-based verb classification
    pub verb_similarity_threshold: f32,
    /// Word list files replacing the built-in lists
    pub lexicon: Option<LexiconPaths>,
    /// Extract dependencies when a dependency parse is supplied
    pub extract_dependencies: bool,
    /// Look up place and event types the input did not list
    pub complete_types: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verb_similarity_threshold: 0.35,
            lexicon: None,
            extract_dependencies: true,
            complete_types: true,
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON config file (optionally gzip-compressed)
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let reader = open_text(path)?;
        Ok(serde_json::from_reader(reader)?)
    }

    /// The lexicon this config points at
    pub fn load_lexicon(&self) -> Result<Lexicon, Error> {
        match &self.lexicon {
            Some(paths) => Lexicon::load(paths),
            None => Ok(Lexicon::builtin()),
        }
    }
}
