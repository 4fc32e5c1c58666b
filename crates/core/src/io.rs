//! Job configuration files.
//!
//! A job is described by a TOML file. Only `[waveguide]` is required:
//!
//! ```toml
//! name = "strip"
//!
//! [waveguide]
//! wg_width = 0.5
//! wg_height = 0.22
//! n_wg = "si"
//! n_sub = "sio2"
//! n_clads = ["sio2"]
//!
//! [solver]
//! method = "vectorial"
//! n_modes = 2
//! boundary = "0000"
//!
//! [cache]
//! dir = "cache"
//!
//! [output]
//! dir = "modes"
//! fields = ["Ex", "Ey"]
//!
//! [group_index]
//! wavelength_step = 0.01
//!
//! [sweep]
//! widths = [0.4, 0.5, 0.6]
//! ```

use std::{fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    cache::JsonDirCache,
    error::{SolverError, SolverResult},
    field::FieldComponent,
    geometry::RidgeWaveguide,
    metrics::MetricsConfig,
    solver::SolverConfig,
};

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory of JSON records; caching is off when unset.
    pub dir: Option<PathBuf>,
    /// Solve even when a record exists and replace it.
    pub overwrite: bool,
}

impl CacheConfig {
    pub fn build(&self) -> Option<JsonDirCache> {
        self.dir.as_ref().map(JsonDirCache::new)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for flat-text exports; nothing is written when unset.
    pub dir: Option<PathBuf>,
    /// Components dumped per mode.
    pub fields: Vec<FieldComponent>,
    /// File stem of the per-mode field dumps.
    pub stem: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            fields: FieldComponent::ALL.to_vec(),
            stem: "mode".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupIndexConfig {
    /// Wavelength step of the centred difference, in µm.
    pub wavelength_step: f64,
}

impl Default for GroupIndexConfig {
    fn default() -> Self {
        Self {
            wavelength_step: 0.01,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Core widths to solve, in µm.
    pub widths: Vec<f64>,
    /// Worker threads; rayon's default when unset.
    pub threads: Option<usize>,
}

// ============================================================================
// Job Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Prefix of exported file names.
    #[serde(default = "default_name")]
    pub name: String,
    pub waveguide: RidgeWaveguide,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub group_index: GroupIndexConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_name() -> String {
    "wg".to_string()
}

impl JobConfig {
    pub fn from_toml_str(text: &str) -> SolverResult<Self> {
        let config: JobConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> SolverResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> SolverResult<()> {
        self.waveguide.validate()?;
        self.solver.validate()?;
        if !(self.group_index.wavelength_step.is_finite() && self.group_index.wavelength_step > 0.0)
        {
            return Err(SolverError::invalid(format!(
                "group_index.wavelength_step must be positive (got {})",
                self.group_index.wavelength_step
            )));
        }
        if let Some(bad) = self.sweep.widths.iter().find(|w| !(w.is_finite() && **w > 0.0)) {
            return Err(SolverError::invalid(format!(
                "sweep widths must be positive (got {bad})"
            )));
        }
        if self.sweep.threads == Some(0) {
            return Err(SolverError::invalid("sweep.threads must be at least 1"));
        }
        Ok(())
    }
}
