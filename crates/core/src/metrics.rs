//! Lightweight metrics recorder (JSONL) for the solve pipeline.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use log::warn;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::mode::SolverMethod;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub format: MetricsFormat,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output: None,
            format: MetricsFormat::JsonLines,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsFormat {
    JsonLines,
}

impl Default for MetricsFormat {
    fn default() -> Self {
        Self::JsonLines
    }
}

pub struct MetricsRecorder {
    writer: Mutex<Box<dyn Write + Send>>,
    format: MetricsFormat,
}

impl MetricsRecorder {
    pub fn new(path: &Path, format: MetricsFormat) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        Ok(Self::from_writer(Box::new(file), format))
    }

    pub fn from_writer(writer: Box<dyn Write + Send>, format: MetricsFormat) -> Self {
        Self {
            writer: Mutex::new(writer),
            format,
        }
    }

    pub fn emit(&self, event: MetricsEvent<'_>) {
        if let Err(err) = self.write_event(event) {
            warn!("[metrics] failed to write event: {err}");
        }
    }

    fn write_event(&self, event: MetricsEvent<'_>) -> io::Result<()> {
        match self.format {
            MetricsFormat::JsonLines => {
                let envelope = EventEnvelope {
                    timestamp_ms: now_millis(),
                    event,
                };
                let mut guard = self.writer.lock();
                serde_json::to_writer(&mut *guard, &envelope)?;
                guard.write_all(b"\n")?;
                guard.flush()
            }
        }
    }
}

#[derive(Serialize)]
struct EventEnvelope<'a> {
    timestamp_ms: f64,
    #[serde(flatten)]
    event: MetricsEvent<'a>,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MetricsEvent<'a> {
    SolveStart {
        method: SolverMethod,
        grid_nx: usize,
        grid_ny: usize,
        wavelength: f64,
        n_modes: usize,
        tol: f64,
        boundary: &'a str,
        target_n_eff: f64,
        warm_start: bool,
    },
    CacheLookup {
        key: &'a str,
        outcome: &'a str,
        duration_ms: f64,
    },
    OperatorAssembly {
        unknowns: usize,
        nnz: usize,
        lower_bandwidth: usize,
        upper_bandwidth: usize,
        duration_ms: f64,
    },
    Eigensolve {
        restarts: usize,
        solves: usize,
        max_ritz_residual: f64,
        max_relative_residual: f64,
        duration_ms: f64,
    },
    ModeClassified {
        index: usize,
        n_eff_re: f64,
        n_eff_im: f64,
        mode_type: &'a str,
        percentage: f64,
        fraction_te: f64,
    },
    SolveDone {
        modes: usize,
        from_cache: bool,
        duration_ms: f64,
    },
    SweepPoint {
        index: usize,
        param: f64,
        n_effs: &'a [f64],
        duration_ms: f64,
    },
    GroupIndex {
        wavelength: f64,
        wavelength_step: f64,
        group_indices: &'a [f64],
        duration_ms: f64,
    },
}

fn now_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

impl MetricsConfig {
    pub fn build_recorder(&self) -> io::Result<Option<MetricsRecorder>> {
        if !self.enabled {
            return Ok(None);
        }
        let path = self.output.as_ref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "metrics.output must be set when metrics are enabled",
            )
        })?;
        MetricsRecorder::new(path, self.format).map(Some)
    }
}
