//! Parallel solves over a family of independent structures.
//!
//! Each point is a self-contained solve, so points run on a rayon pool in any
//! order; results are stored by input index and reported in input order.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    error::{SolverError, SolverResult},
    geometry::RidgeWaveguide,
    metrics::MetricsEvent,
    mode::ModeSet,
    polarization::ModeType,
    solver::{JobContext, ModeSolver},
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepResult {
    /// Swept parameter value of each point.
    pub params: Vec<f64>,
    /// Real effective indices, one row per point.
    pub n_effs: Vec<Vec<f64>>,
    pub mode_types: Vec<Vec<(ModeType, f64)>>,
    pub fraction_te: Vec<Vec<f64>>,
    pub fraction_tm: Vec<Vec<f64>>,
}

impl SweepResult {
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    fn push(&mut self, param: f64, set: &ModeSet) {
        self.params.push(param);
        self.n_effs.push(set.n_effs().iter().map(|n| n.re).collect());
        self.mode_types.push(set.mode_types());
        self.fraction_te.push(set.fraction_te());
        self.fraction_tm.push(set.fraction_tm());
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOptions {
    /// Worker threads; `None` lets rayon pick.
    pub threads: Option<usize>,
    pub progress: bool,
}

/// Solves every waveguide in `waveguides`, labelling point `i` with
/// `params[i]`. The first failing point (by index) fails the sweep.
pub fn sweep_waveguides(
    waveguides: &[RidgeWaveguide],
    params: &[f64],
    solver: &ModeSolver,
    ctx: &JobContext<'_>,
    opts: SweepOptions,
) -> SolverResult<SweepResult> {
    if waveguides.len() != params.len() {
        return Err(SolverError::invalid(format!(
            "{} waveguides but {} parameter values",
            waveguides.len(),
            params.len()
        )));
    }
    if opts.threads == Some(0) {
        return Err(SolverError::invalid("sweep threads must be at least 1"));
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.threads.unwrap_or(0))
        .build()?;
    info!(
        "[sweep] points={} threads={}",
        waveguides.len(),
        pool.current_num_threads()
    );

    let slots: Mutex<Vec<Option<ModeSet>>> = Mutex::new(vec![None; waveguides.len()]);
    let errors: Mutex<Vec<(usize, SolverError)>> = Mutex::new(Vec::new());

    let pb = if opts.progress {
        ProgressBar::new(waveguides.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }

    let start = Instant::now();
    pool.install(|| {
        waveguides.par_iter().enumerate().for_each(|(idx, wg)| {
            let point_start = Instant::now();
            match solve_point(wg, solver, ctx) {
                Ok(set) => {
                    let n_effs: Vec<f64> = set.n_effs().iter().map(|n| n.re).collect();
                    debug!("[sweep] point {idx} param={} n_effs={n_effs:?}", params[idx]);
                    if let Some(recorder) = ctx.metrics {
                        recorder.emit(MetricsEvent::SweepPoint {
                            index: idx,
                            param: params[idx],
                            n_effs: &n_effs,
                            duration_ms: point_start.elapsed().as_secs_f64() * 1000.0,
                        });
                    }
                    slots.lock()[idx] = Some(set);
                }
                Err(err) => errors.lock().push((idx, err)),
            }
            pb.inc(1);
        });
    });
    pb.finish_and_clear();

    let mut errors = errors.into_inner();
    errors.sort_by_key(|(idx, _)| *idx);
    if let Some((idx, err)) = errors.into_iter().next() {
        return Err(match err {
            SolverError::InvalidInput(msg) => {
                SolverError::InvalidInput(format!("sweep point {idx}: {msg}"))
            }
            other => other,
        });
    }

    let mut result = SweepResult::default();
    for (param, set) in params.iter().zip(slots.into_inner()) {
        if let Some(set) = set {
            result.push(*param, &set);
        }
    }
    info!(
        "[sweep] done points={} elapsed={:.2?}",
        result.len(),
        start.elapsed()
    );
    Ok(result)
}

/// Sweeps the core width of `base`.
pub fn sweep_widths(
    base: &RidgeWaveguide,
    widths: &[f64],
    solver: &ModeSolver,
    ctx: &JobContext<'_>,
    opts: SweepOptions,
) -> SolverResult<SweepResult> {
    let waveguides: Vec<RidgeWaveguide> = widths.iter().map(|w| base.with_width(*w)).collect();
    sweep_waveguides(&waveguides, widths, solver, ctx, opts)
}

fn solve_point(
    wg: &RidgeWaveguide,
    solver: &ModeSolver,
    ctx: &JobContext<'_>,
) -> SolverResult<ModeSet> {
    let structure = wg.build()?;
    let fingerprint = solver.config().fingerprint(wg.fingerprint());
    solver.solve_with(&structure, &ctx.options(&fingerprint, None))
}
