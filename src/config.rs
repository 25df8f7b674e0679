//! Run configuration.
//!
//! Every field has a default reproducing the reference detector, so an empty
//! JSON object is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::geometry::{CellGrid, Geometry, LayoutParams};
use crate::core::vertex::SourceConfig;
use crate::error::Result;
use crate::store::default_output_path;

/// Where run files are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for per-process run files; created if absent.
    pub dir: PathBuf,
    /// Explicit file path. Overrides `dir` when set.
    pub file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            file: None,
        }
    }
}

impl OutputConfig {
    /// Resolved output file path.
    pub fn path(&self) -> PathBuf {
        match &self.file {
            Some(f) => f.clone(),
            None => default_output_path(&self.dir),
        }
    }
}

/// Complete configuration of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaloConfig {
    pub layout: LayoutParams,
    pub cells: CellGrid,
    pub source: SourceConfig,
    pub output: OutputConfig,
    /// RNG seed for primary vertices; `None` for nondeterministic runs.
    pub seed: Option<u64>,
}

impl CaloConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Validate and derive the geometry.
    pub fn geometry(&self) -> Result<Geometry> {
        self.source.validate()?;
        Geometry::new(self.layout.clone(), self.cells)
    }
}
