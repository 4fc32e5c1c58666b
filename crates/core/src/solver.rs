//! Solve pipeline: structure → operator → eigenpairs → classified modes.
//!
//! [`ModeSolver::solve_with`] optionally consults a [`ModeCache`] before doing
//! any numerical work and stores fresh results afterwards. A corrupt or
//! mismatching cache record is logged and treated as a miss.

use std::time::Instant;

use log::{debug, info, warn};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::{
    boundary::BoundaryConditions,
    cache::{Fingerprint, ModeCache},
    eigensolver::{
        EigenOptions, max_relative_residual, normalization::fix_phase, solve_shift_invert,
    },
    error::{SolverError, SolverResult},
    metrics::{MetricsEvent, MetricsRecorder},
    mode::{Mode, ModeProfile, ModeSet, ScalarMode, SolverMethod, VectorMode},
    operator::{FdOperator, GridOrdering, OperatorKind, assemble_semi, assemble_vectorial},
    polarization::SemiComponent,
    recovery::{recover_vector_fields, scalar_field, split_transverse_h},
    structure::Structure,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub method: SolverMethod,
    /// Component solved for by the semi-vectorial method.
    pub semi_component: SemiComponent,
    pub n_modes: usize,
    pub tol: f64,
    pub boundary: BoundaryConditions,
    /// Target effective index; defaults to the largest index in the structure.
    pub n_eff_guess: Option<f64>,
    pub max_restarts: usize,
    pub krylov_dim: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        let eigen = EigenOptions::default();
        Self {
            method: SolverMethod::Vectorial,
            semi_component: SemiComponent::Ex,
            n_modes: eigen.n_modes,
            tol: eigen.tol,
            boundary: BoundaryConditions::zero(),
            n_eff_guess: None,
            max_restarts: eigen.max_restarts,
            krylov_dim: None,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> SolverResult<()> {
        if self.n_modes == 0 {
            return Err(SolverError::invalid("n_modes must be at least 1"));
        }
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(SolverError::invalid(format!(
                "tol must be positive (got {})",
                self.tol
            )));
        }
        if let Some(guess) = self.n_eff_guess {
            if !(guess.is_finite() && guess > 0.0) {
                return Err(SolverError::invalid(format!(
                    "n_eff_guess must be positive (got {guess})"
                )));
            }
        }
        if let Some(m) = self.krylov_dim {
            if m <= self.n_modes {
                return Err(SolverError::invalid(format!(
                    "krylov_dim ({m}) must exceed n_modes ({})",
                    self.n_modes
                )));
            }
        }
        Ok(())
    }

    pub fn eigen_options(&self) -> EigenOptions {
        EigenOptions {
            n_modes: self.n_modes,
            tol: self.tol,
            max_restarts: self.max_restarts,
            krylov_dim: self.krylov_dim,
        }
    }

    /// Adds every solver setting that changes the result to `base`.
    pub fn fingerprint(&self, base: Fingerprint) -> Fingerprint {
        let mut fp = base
            .with("method", self.method.as_str())
            .with("n_modes", self.n_modes)
            .with("tol", self.tol)
            .with("boundary", self.boundary.to_string());
        if self.method == SolverMethod::SemiVectorial {
            fp.insert("semi_component", self.semi_component.to_string());
        }
        if let Some(guess) = self.n_eff_guess {
            fp.insert("n_eff_guess", guess);
        }
        fp
    }
}

/// Cache to consult for a single solve.
#[derive(Clone, Copy)]
pub struct CacheRequest<'a> {
    pub cache: &'a dyn ModeCache,
    pub fingerprint: &'a Fingerprint,
    /// Skip the lookup and always replace the stored record.
    pub overwrite: bool,
}

#[derive(Clone, Copy, Default)]
pub struct SolveOptions<'a> {
    pub cache: Option<CacheRequest<'a>>,
    /// Eigenvector guess, e.g. from [`warm_start`]. Ignored when its length
    /// does not match the operator.
    pub initial_guess: Option<&'a [Complex64]>,
    pub metrics: Option<&'a MetricsRecorder>,
}

/// Cache and metrics shared by the solves of a multi-solve job (group index,
/// sweeps).
#[derive(Clone, Copy, Default)]
pub struct JobContext<'a> {
    pub cache: Option<&'a dyn ModeCache>,
    pub overwrite: bool,
    pub metrics: Option<&'a MetricsRecorder>,
}

impl<'a> JobContext<'a> {
    pub fn options<'b>(
        &self,
        fingerprint: &'b Fingerprint,
        initial_guess: Option<&'b [Complex64]>,
    ) -> SolveOptions<'b>
    where
        'a: 'b,
    {
        SolveOptions {
            cache: self.cache.map(|cache| CacheRequest {
                cache,
                fingerprint,
                overwrite: self.overwrite,
            }),
            initial_guess,
            metrics: self.metrics,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModeSolver {
    config: SolverConfig,
}

impl ModeSolver {
    pub fn new(config: SolverConfig) -> SolverResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn solve(&self, structure: &Structure) -> SolverResult<ModeSet> {
        self.solve_with(structure, &SolveOptions::default())
    }

    pub fn solve_with(
        &self,
        structure: &Structure,
        opts: &SolveOptions<'_>,
    ) -> SolverResult<ModeSet> {
        let start = Instant::now();
        if let Some(request) = opts.cache.filter(|r| !r.overwrite) {
            if let Some(set) = self.lookup(structure, request, opts.metrics) {
                if let Some(recorder) = opts.metrics {
                    recorder.emit(MetricsEvent::SolveDone {
                        modes: set.len(),
                        from_cache: true,
                        duration_ms: start.elapsed().as_secs_f64() * 1000.0,
                    });
                }
                return Ok(set);
            }
        }

        let set = self.solve_fresh(structure, opts.initial_guess, opts.metrics)?;

        if let Some(request) = opts.cache {
            match request.cache.put(request.fingerprint, &set) {
                Ok(()) => debug!("[cache] stored {}", request.fingerprint.name()),
                Err(err) => warn!("[cache] could not store {}: {err}", request.fingerprint.name()),
            }
        }
        if let Some(recorder) = opts.metrics {
            recorder.emit(MetricsEvent::SolveDone {
                modes: set.len(),
                from_cache: false,
                duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            });
        }
        Ok(set)
    }

    /// Assembles the operator this solver would use for `structure`.
    pub fn assemble(&self, structure: &Structure) -> SolverResult<FdOperator> {
        match self.config.method {
            SolverMethod::Vectorial => assemble_vectorial(structure, self.config.boundary),
            SolverMethod::SemiVectorial => {
                assemble_semi(structure, self.config.boundary, self.config.semi_component)
            }
        }
    }

    fn lookup(
        &self,
        structure: &Structure,
        request: CacheRequest<'_>,
        metrics: Option<&MetricsRecorder>,
    ) -> Option<ModeSet> {
        let start = Instant::now();
        let name = request.fingerprint.name();
        let (found, outcome) = match request.cache.get(request.fingerprint) {
            Ok(Some(set)) => match self.check_cached(structure, &set) {
                Ok(()) => {
                    info!("[cache] hit {name}");
                    (Some(set), "hit")
                }
                Err(err) => {
                    warn!("[cache] ignoring {name}: {err}");
                    (None, "corrupt")
                }
            },
            Ok(None) => {
                info!("[cache] miss {name}");
                (None, "miss")
            }
            Err(err @ SolverError::CacheCorruption(_)) => {
                warn!("[cache] {err}; solving afresh");
                (None, "corrupt")
            }
            Err(err) => {
                warn!("[cache] lookup of {name} failed: {err}; solving afresh");
                (None, "error")
            }
        };
        if let Some(recorder) = metrics {
            recorder.emit(MetricsEvent::CacheLookup {
                key: &name,
                outcome,
                duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            });
        }
        found
    }

    /// A cached set must look exactly like a fresh solve of `structure`.
    fn check_cached(&self, structure: &Structure, set: &ModeSet) -> SolverResult<()> {
        if set.method != self.config.method {
            return Err(SolverError::corrupt(format!(
                "record holds {:?} modes, expected {:?}",
                set.method, self.config.method
            )));
        }
        if set.len() != self.config.n_modes {
            return Err(SolverError::corrupt(format!(
                "record holds {} modes, expected {}",
                set.len(),
                self.config.n_modes
            )));
        }
        let grid = structure.grid();
        let cells = (grid.nx(), grid.ny());
        let nodes = (grid.nx() + 1, grid.ny() + 1);
        for (idx, mode) in set.modes().iter().enumerate() {
            let shapes_ok = match mode {
                Mode::Vector(m) => {
                    let f = m.fields();
                    f.e_fields().iter().all(|c| c.shape() == cells)
                        && f.hz.shape() == cells
                        && f.hx.shape() == nodes
                        && f.hy.shape() == nodes
                }
                Mode::Scalar(m) => {
                    m.component() == self.config.semi_component && m.primary().shape() == cells
                }
            };
            if !shapes_ok {
                return Err(SolverError::corrupt(format!(
                    "mode {idx} does not match the {}x{} grid",
                    cells.0, cells.1
                )));
            }
        }
        Ok(())
    }

    fn solve_fresh(
        &self,
        structure: &Structure,
        guess: Option<&[Complex64]>,
        metrics: Option<&MetricsRecorder>,
    ) -> SolverResult<ModeSet> {
        let cfg = &self.config;
        let grid = structure.grid();
        let k0 = structure.k0();
        let target = cfg.n_eff_guess.unwrap_or_else(|| structure.max_index());
        info!(
            "[setup] method={:?} grid={}x{} wavelength={} boundary={} modes={} tol={:e} target_neff={:.4}",
            cfg.method,
            grid.nx(),
            grid.ny(),
            structure.wavelength(),
            cfg.boundary,
            cfg.n_modes,
            cfg.tol,
            target
        );

        let assembly_start = Instant::now();
        let op = self.assemble(structure)?;
        let assembly_elapsed = assembly_start.elapsed();
        let (lower, upper) = op.matrix.bandwidth();
        info!(
            "[assemble] unknowns={} nnz={} bandwidth=({lower},{upper}) elapsed={:.2?}",
            op.dim(),
            op.matrix.nnz(),
            assembly_elapsed
        );

        let guess = guess.filter(|g| {
            let fits = g.len() == op.dim();
            if !fits {
                debug!(
                    "[setup] ignoring initial guess of length {} (operator dimension {})",
                    g.len(),
                    op.dim()
                );
            }
            fits
        });
        if let Some(recorder) = metrics {
            let boundary = cfg.boundary.to_string();
            recorder.emit(MetricsEvent::SolveStart {
                method: cfg.method,
                grid_nx: grid.nx(),
                grid_ny: grid.ny(),
                wavelength: structure.wavelength(),
                n_modes: cfg.n_modes,
                tol: cfg.tol,
                boundary: &boundary,
                target_n_eff: target,
                warm_start: guess.is_some(),
            });
            recorder.emit(MetricsEvent::OperatorAssembly {
                unknowns: op.dim(),
                nnz: op.matrix.nnz(),
                lower_bandwidth: lower,
                upper_bandwidth: upper,
                duration_ms: assembly_elapsed.as_secs_f64() * 1000.0,
            });
        }

        let shift = Complex64::new((k0 * target).powi(2), 0.0);
        let eigen_start = Instant::now();
        let mut eig = solve_shift_invert(&op.matrix, shift, &cfg.eigen_options(), guess)?;
        let eigen_elapsed = eigen_start.elapsed();
        let residual = max_relative_residual(&op.matrix, &eig.pairs);
        let ritz_residual = eig.pairs.iter().map(|p| p.residual).fold(0.0_f64, f64::max);
        info!(
            "[eigen] restarts={} solves={} ritz_residual={:.2e} residual={:.2e} elapsed={:.2?}",
            eig.restarts, eig.solves, ritz_residual, residual, eigen_elapsed
        );
        if let Some(recorder) = metrics {
            recorder.emit(MetricsEvent::Eigensolve {
                restarts: eig.restarts,
                solves: eig.solves,
                max_ritz_residual: ritz_residual,
                max_relative_residual: residual,
                duration_ms: eigen_elapsed.as_secs_f64() * 1000.0,
            });
        }

        let mut modes = Vec::with_capacity(eig.pairs.len());
        for pair in &mut eig.pairs {
            fix_phase(&mut pair.vector);
            let n_eff = effective_index(pair.value, k0);
            let mode = match op.kind {
                OperatorKind::Vectorial => {
                    let (hx, hy) = split_transverse_h(op.ordering, &pair.vector);
                    let fields = recover_vector_fields(structure, n_eff, hx, hy);
                    Mode::Vector(VectorMode::new(n_eff, fields))
                }
                OperatorKind::Semi(component) => {
                    let field = scalar_field(op.ordering, &pair.vector);
                    Mode::Scalar(ScalarMode::new(n_eff, component, field))
                }
            };
            modes.push(mode);
        }
        let set = ModeSet::new(cfg.method, structure.wavelength(), modes);

        for (idx, mode) in set.modes().iter().enumerate() {
            let n = mode.n_eff();
            info!(
                "[mode] #{idx} n_eff={:.6}{:+.2e}i type={} ({:.2}%) te_fraction={:.3}",
                n.re,
                n.im,
                mode.mode_type(),
                mode.percentage(),
                mode.fraction_te()
            );
            if let Some(recorder) = metrics {
                recorder.emit(MetricsEvent::ModeClassified {
                    index: idx,
                    n_eff_re: n.re,
                    n_eff_im: n.im,
                    mode_type: mode.mode_type().label(),
                    percentage: mode.percentage(),
                    fraction_te: mode.fraction_te(),
                });
            }
        }
        Ok(set)
    }
}

/// `sqrt(λ) / k0` on the branch with non-negative real part.
pub fn effective_index(eigenvalue: Complex64, k0: f64) -> Complex64 {
    let n = eigenvalue.sqrt() / k0;
    if n.re < 0.0 { -n } else { n }
}

/// Eigenvector guess reproducing `mode` in the solver's unknown layout. Only
/// useful for an operator built on the same grid with the same method.
pub fn warm_start(mode: &Mode) -> Vec<Complex64> {
    match mode {
        Mode::Vector(m) => {
            let f = m.fields();
            let ordering = GridOrdering::new(f.hx.nx(), f.hx.ny());
            ordering.gather(&[f.hx.as_slice(), f.hy.as_slice()])
        }
        Mode::Scalar(m) => {
            let field = m.primary();
            GridOrdering::new(field.nx(), field.ny()).gather(&[field.as_slice()])
        }
    }
}
