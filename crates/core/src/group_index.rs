//! Group index from a centred finite difference in wavelength.

use std::time::Instant;

use log::info;
use num_complex::Complex64;
use serde::Serialize;

use crate::{
    error::{SolverError, SolverResult},
    geometry::RidgeWaveguide,
    metrics::MetricsEvent,
    mode::ModeSet,
    solver::{JobContext, ModeSolver, warm_start},
};

/// `n(λ) - λ (n(λ+Δλ) - n(λ-Δλ)) / (2Δλ)` per mode, on the real parts.
/// The result is as long as the shortest input.
pub fn group_index(
    n_ctr: &[Complex64],
    n_bck: &[Complex64],
    n_frw: &[Complex64],
    wavelength: f64,
    step: f64,
) -> Vec<f64> {
    n_ctr
        .iter()
        .zip(n_bck)
        .zip(n_frw)
        .map(|((c, b), f)| c.re - wavelength * (f.re - b.re) / (2.0 * step))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupIndexResult {
    pub wavelength: f64,
    pub step: f64,
    pub n_effs: Vec<f64>,
    pub group_indices: Vec<f64>,
}

/// Solves at `λ - step`, `λ` and `λ + step`. The side-band solves are seeded
/// with the fundamental mode of the centre solve.
pub fn solve_group_index(
    waveguide: &RidgeWaveguide,
    solver: &ModeSolver,
    step: f64,
    ctx: &JobContext<'_>,
) -> SolverResult<GroupIndexResult> {
    let wl = waveguide.wavelength;
    if !(step.is_finite() && step > 0.0 && step < wl) {
        return Err(SolverError::invalid(format!(
            "wavelength step must lie in (0, {wl}) (got {step})"
        )));
    }
    let start = Instant::now();

    let centre = solve_at(waveguide, solver, wl, None, ctx)?;
    let guess = centre.get(0).map(warm_start);
    let back = solve_at(waveguide, solver, wl - step, guess.as_deref(), ctx)?;
    let front = solve_at(waveguide, solver, wl + step, guess.as_deref(), ctx)?;

    let n_ctr = centre.n_effs();
    let group_indices = group_index(&n_ctr, &back.n_effs(), &front.n_effs(), wl, step);
    for (idx, ng) in group_indices.iter().enumerate() {
        info!("[group-index] mode {idx}: n_g={ng:.4}");
    }
    if let Some(recorder) = ctx.metrics {
        recorder.emit(MetricsEvent::GroupIndex {
            wavelength: wl,
            wavelength_step: step,
            group_indices: &group_indices,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        });
    }
    Ok(GroupIndexResult {
        wavelength: wl,
        step,
        n_effs: n_ctr.iter().map(|n| n.re).collect(),
        group_indices,
    })
}

fn solve_at(
    waveguide: &RidgeWaveguide,
    solver: &ModeSolver,
    wavelength: f64,
    guess: Option<&[Complex64]>,
    ctx: &JobContext<'_>,
) -> SolverResult<ModeSet> {
    let wg = waveguide.with_wavelength(wavelength);
    let structure = wg.build()?;
    let fingerprint = solver.config().fingerprint(wg.fingerprint());
    solver.solve_with(&structure, &ctx.options(&fingerprint, guess))
}

impl GroupIndexResult {
    pub fn fundamental(&self) -> Option<f64> {
        self.group_indices.first().copied()
    }
}
