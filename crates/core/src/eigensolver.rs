//! Shift-invert Arnoldi eigensolver with thick restarts.
//!
//! The eigenpairs of `A` closest to a target shift `σ` are the dominant
//! eigenpairs of `(A - σI)^{-1}`. Each Arnoldi step applies that inverse via a
//! banded LU factorization computed once per solve. When the Krylov space is
//! full, the best Ritz vectors are orthonormalized and kept as the start of
//! the next cycle (a Krylov-Schur style restart).
//!
//! Convergence is declared when the Ritz residual `|β_m · y_m| <= tol · |θ|`
//! for every requested pair, where `θ` is the Ritz value of the inverted
//! operator.

pub mod banded;
pub mod dense;
pub mod normalization;

use std::time::Instant;

use log::{debug, warn};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::{
    error::{SolverError, SolverResult},
    operator::{LinearOperator, SparseOperator},
};

use banded::BandedLu;
use normalization::{dot, normalize, norm, orthogonalize};

/// Relative size below which a new Krylov direction is treated as lying in the
/// current subspace.
const BREAKDOWN_RATIO: f64 = 1e-12;
/// Relative perturbation applied to the shift if it hits an eigenvalue.
const SHIFT_NUDGE: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EigenOptions {
    /// Number of eigenpairs to return.
    pub n_modes: usize,
    /// Relative Ritz-residual tolerance.
    pub tol: f64,
    /// Restart budget before reporting a convergence failure.
    pub max_restarts: usize,
    /// Krylov subspace dimension; defaults to `max(2 n_modes + 10, 30)`.
    pub krylov_dim: Option<usize>,
}

impl Default for EigenOptions {
    fn default() -> Self {
        Self {
            n_modes: 2,
            tol: 1e-3,
            max_restarts: 300,
            krylov_dim: None,
        }
    }
}

impl EigenOptions {
    fn subspace_dim(&self, n: usize) -> usize {
        self.krylov_dim
            .unwrap_or_else(|| (2 * self.n_modes + 10).max(30))
            .max(self.n_modes + 1)
            .min(n)
    }
}

#[derive(Debug, Clone)]
pub struct EigenPair {
    /// Eigenvalue of the unshifted operator.
    pub value: Complex64,
    /// Unit-norm eigenvector.
    pub vector: Vec<Complex64>,
    /// Ritz residual estimate relative to the inverted Ritz value.
    pub residual: f64,
}

#[derive(Debug, Clone)]
pub struct EigenResult {
    /// Eigenpairs ordered by distance to the shift, closest first.
    pub pairs: Vec<EigenPair>,
    pub restarts: usize,
    /// Number of applications of the inverted operator.
    pub solves: usize,
    /// Shift actually used (may differ from the requested one by a tiny nudge).
    pub shift: Complex64,
}

/// Finds the `opts.n_modes` eigenpairs of `matrix` closest to `shift`.
///
/// `guess` seeds the Krylov space; without one a fixed deterministic start
/// vector is used, so repeated calls give identical results.
pub fn solve_shift_invert(
    matrix: &SparseOperator,
    shift: Complex64,
    opts: &EigenOptions,
    guess: Option<&[Complex64]>,
) -> SolverResult<EigenResult> {
    let n = matrix.dim();
    let k = opts.n_modes;
    if k == 0 {
        return Err(SolverError::invalid("at least one eigenpair must be requested"));
    }
    if k > n {
        return Err(SolverError::invalid(format!(
            "requested {k} eigenpairs but the operator dimension is {n}"
        )));
    }
    if !(opts.tol > 0.0 && opts.tol.is_finite()) {
        return Err(SolverError::invalid(format!(
            "tolerance must be positive (got {})",
            opts.tol
        )));
    }
    if let Some(g) = guess {
        if g.len() != n {
            return Err(SolverError::invalid(format!(
                "initial guess has length {} but the operator dimension is {n}",
                g.len()
            )));
        }
    }

    let factor_start = Instant::now();
    let (lu, shift) = match BandedLu::factor(matrix, shift) {
        Ok(lu) => (lu, shift),
        Err(err) => {
            let nudged = shift * (1.0 + SHIFT_NUDGE) + SHIFT_NUDGE;
            warn!("[eigen] {err}; retrying with shift {nudged}");
            (BandedLu::factor(matrix, nudged)?, nudged)
        }
    };
    debug!(
        "[eigen] banded LU n={} bandwidth={:?} elapsed={:.2?}",
        n,
        matrix.bandwidth(),
        factor_start.elapsed()
    );

    let m = opts.subspace_dim(n);
    let mut basis: Vec<Vec<Complex64>> = Vec::with_capacity(m + 1);
    basis.push(start_vector(n, guess));
    // Projected matrix, (m + 1) x m row-major.
    let mut h = vec![Complex64::default(); (m + 1) * m];
    let mut locked = 0usize;
    let mut solves = 0usize;
    let mut coeffs = vec![Complex64::default(); m + 1];

    let mut restart = 0usize;
    loop {
        for j in locked..m {
            debug_assert_eq!(basis.len(), j + 1);
            let mut w = basis[j].clone();
            lu.solve_in_place(&mut w);
            solves += 1;
            let before = norm(&w);
            coeffs.iter_mut().for_each(|c| *c = Complex64::default());
            orthogonalize(&basis, &mut w, Some(&mut coeffs[..=j]));
            for (i, c) in coeffs.iter().enumerate().take(j + 1) {
                h[i * m + j] += *c;
            }
            match normalize(&mut w, BREAKDOWN_RATIO * before.max(f64::MIN_POSITIVE)) {
                Some(beta) => {
                    h[(j + 1) * m + j] = Complex64::new(beta, 0.0);
                    basis.push(w);
                }
                None => {
                    // Invariant subspace found; continue from a fresh direction.
                    h[(j + 1) * m + j] = Complex64::default();
                    basis.push(fresh_direction(&basis, n, j + 1));
                }
            }
        }

        let projected = &h[..m * m];
        let ritz = dense::eig(projected, m).ok_or(SolverError::ConvergenceFailure {
            restarts: restart,
            converged: 0,
            requested: k,
        })?;
        let mut order: Vec<usize> = (0..m).collect();
        order.sort_by(|&a, &b| ritz.values[b].norm().total_cmp(&ritz.values[a].norm()));

        let beta = h[m * m + m - 1].norm();
        let residuals: Vec<f64> = order
            .iter()
            .map(|&i| {
                let theta = ritz.values[i].norm().max(f64::MIN_POSITIVE);
                beta * ritz.vectors[i][m - 1].norm() / theta
            })
            .collect();
        let converged = residuals.iter().take(k).take_while(|r| **r <= opts.tol).count();

        if converged == k {
            let pairs = order
                .iter()
                .take(k)
                .zip(&residuals)
                .map(|(&i, &residual)| {
                    let theta = ritz.values[i];
                    let mut vector = combine(&basis[..m], &ritz.vectors[i], n);
                    normalize(&mut vector, 0.0);
                    EigenPair {
                        value: shift + theta.inv(),
                        vector,
                        residual,
                    }
                })
                .collect();
            debug!(
                "[eigen] converged k={} m={} restarts={} solves={}",
                k, m, restart, solves
            );
            return Ok(EigenResult {
                pairs,
                restarts: restart,
                solves,
                shift,
            });
        }
        if restart == opts.max_restarts {
            return Err(SolverError::ConvergenceFailure {
                restarts: restart,
                converged,
                requested: k,
            });
        }

        // Thick restart: keep the leading Ritz vectors plus the residual direction.
        let keep_target = (k + (m - k) / 2).min(m - 1);
        let mut q: Vec<Vec<Complex64>> = Vec::with_capacity(keep_target);
        for &i in order.iter().take(keep_target) {
            let mut y = ritz.vectors[i].clone();
            orthogonalize(&q, &mut y, None);
            if normalize(&mut y, 1e-10).is_some() {
                q.push(y);
            }
        }
        let keep = q.len();
        let residual_vec = basis[m].clone();
        let mut next_basis: Vec<Vec<Complex64>> =
            q.iter().map(|y| combine(&basis[..m], y, n)).collect();
        next_basis.push(residual_vec);

        // H <- Q^H H Q on the kept block.
        let hq: Vec<Vec<Complex64>> = q
            .iter()
            .map(|qb| {
                (0..m)
                    .map(|r| (0..m).map(|s| h[r * m + s] * qb[s]).sum())
                    .collect()
            })
            .collect();
        let mut next_h = vec![Complex64::default(); (m + 1) * m];
        for (a, qa) in q.iter().enumerate() {
            for (b, hqb) in hq.iter().enumerate() {
                next_h[a * m + b] = dot(qa, hqb);
            }
        }
        let tail = h[m * m + m - 1];
        for (c, qc) in q.iter().enumerate() {
            next_h[keep * m + c] = tail * qc[m - 1];
        }
        debug!(
            "[eigen] restart {} converged={}/{} kept={} max_residual={:.3e}",
            restart + 1,
            converged,
            k,
            keep,
            residuals.iter().take(k).fold(0.0_f64, |a, b| a.max(*b))
        );
        h = next_h;
        basis = next_basis;
        locked = keep;
        restart += 1;
    }
}

/// `Σ_r basis[r] · coeffs[r]`.
fn combine(basis: &[Vec<Complex64>], coeffs: &[Complex64], n: usize) -> Vec<Complex64> {
    let mut out = vec![Complex64::default(); n];
    for (v, &c) in basis.iter().zip(coeffs) {
        if c != Complex64::default() {
            normalization::axpy(c, v, &mut out);
        }
    }
    out
}

/// Deterministic, non-symmetric start vector (avoids being orthogonal to
/// modes of either parity), or the normalized caller guess.
fn start_vector(n: usize, guess: Option<&[Complex64]>) -> Vec<Complex64> {
    if let Some(g) = guess {
        let mut v = g.to_vec();
        if normalize(&mut v, 0.0).is_some() {
            return v;
        }
    }
    let mut v = seeded_vector(n, 0);
    normalize(&mut v, 0.0);
    v
}

fn seeded_vector(n: usize, seed: usize) -> Vec<Complex64> {
    (0..n)
        .map(|i| {
            let t = (i + seed * 7919) as f64;
            Complex64::new(
                (1.0 + 0.754_877_666_2 * t).sin(),
                ((0.569_840_291 * t * t) % std::f64::consts::TAU).cos(),
            )
        })
        .collect()
}

fn fresh_direction(basis: &[Vec<Complex64>], n: usize, seed: usize) -> Vec<Complex64> {
    if basis.len() >= n {
        return vec![Complex64::default(); n];
    }
    for attempt in 0..4 {
        let mut v = seeded_vector(n, seed + attempt * 31);
        orthogonalize(basis, &mut v, None);
        if normalize(&mut v, 1e-8 * (n as f64).sqrt()).is_some() {
            return v;
        }
    }
    vec![Complex64::default(); n]
}

/// Maximum of `‖A x - λ x‖ / (|λ| ‖x‖)` over the given pairs.
pub fn max_relative_residual<O: LinearOperator>(op: &O, pairs: &[EigenPair]) -> f64 {
    let mut out = vec![Complex64::default(); op.dim()];
    pairs
        .iter()
        .map(|pair| {
            op.apply(&pair.vector, &mut out);
            let res: f64 = out
                .iter()
                .zip(&pair.vector)
                .map(|(ax, x)| (ax - pair.value * x).norm_sqr())
                .sum::<f64>()
                .sqrt();
            let scale = pair.value.norm() * norm(&pair.vector);
            if scale > 0.0 { res / scale } else { res }
        })
        .fold(0.0_f64, f64::max)
}

/// Rayleigh quotient `<x, A x> / <x, x>`.
pub fn rayleigh_quotient<O: LinearOperator>(op: &O, x: &[Complex64]) -> Complex64 {
    let mut ax = vec![Complex64::default(); op.dim()];
    op.apply(x, &mut ax);
    dot(x, &ax) / dot(x, x)
}
