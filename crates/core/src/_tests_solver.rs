#![cfg(test)]

use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use super::boundary::BoundaryConditions;
use super::cache::{JsonDirCache, MemoryCache, ModeCache};
use super::error::SolverError;
use super::field::{Field2D, FieldComponent};
use super::geometry::RidgeWaveguide;
use super::grid::Grid2D;
use super::material::Material;
use super::metrics::{MetricsFormat, MetricsRecorder};
use super::mode::{Mode, ModeProfile, ModeSet, ScalarMode, SolverMethod};
use super::polarization::{ModeType, SemiComponent};
use super::solver::{
    CacheRequest, ModeSolver, SolveOptions, SolverConfig, effective_index, warm_start,
};
use super::structure::Structure;
use num_complex::Complex64;
use parking_lot::Mutex;

/// 0.5 x 0.22 µm strip in a 1.444 background, coarse enough to solve in a
/// fraction of a second.
fn scenario() -> RidgeWaveguide {
    RidgeWaveguide {
        wg_width: 0.5,
        wg_height: 0.22,
        sub_width: 1.5,
        sub_height: 0.5,
        clad_heights: vec![0.5],
        x_step: 0.05,
        y_step: 0.0275,
        n_wg: Material::Constant(3.4777),
        n_sub: Material::Constant(1.444),
        n_clads: vec![Material::Constant(1.444)],
        wavelength: 1.55,
        ..RidgeWaveguide::default()
    }
}

/// Right half of [`scenario`]; the mirror plane is the west edge.
fn half_scenario() -> Structure {
    let grid = Grid2D::covering(0.75, 1.22, 0.05, 0.0275).unwrap();
    Structure::from_fn(grid, 1.55, |x, y| {
        let n: f64 = if y > 0.5 && y < 0.72 && x < 0.25 { 3.4777 } else { 1.444 };
        Complex64::new(n * n, 0.0)
    })
    .unwrap()
}

fn config(method: SolverMethod, n_modes: usize) -> SolverConfig {
    SolverConfig {
        method,
        n_modes,
        tol: 1e-8,
        ..SolverConfig::default()
    }
}

fn semi(component: SemiComponent, n_modes: usize, boundary: &str) -> ModeSolver {
    ModeSolver::new(SolverConfig {
        semi_component: component,
        boundary: boundary.parse().unwrap(),
        ..config(SolverMethod::SemiVectorial, n_modes)
    })
    .unwrap()
}

fn vectorial(n_modes: usize, boundary: &str) -> ModeSolver {
    ModeSolver::new(SolverConfig {
        boundary: boundary.parse().unwrap(),
        ..config(SolverMethod::Vectorial, n_modes)
    })
    .unwrap()
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wgmode-solver-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn events(&self) -> Vec<serde_json::Value> {
        let text = String::from_utf8(self.0.lock().clone()).unwrap();
        text.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

fn event_names(events: &[serde_json::Value]) -> Vec<String> {
    events
        .iter()
        .map(|e| e["event"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn vectorial_strip_finds_quasi_te_and_quasi_tm() {
    let structure = scenario().build().unwrap();
    let set = vectorial(2, "0000").solve(&structure).unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(set.method, SolverMethod::Vectorial);

    let n = set.n_effs();
    assert!((n[0].re - 2.4613).abs() < 5e-3, "fundamental n_eff {}", n[0]);
    assert!((n[1].re - 1.8052).abs() < 5e-3, "second n_eff {}", n[1]);
    assert!(n[0].im.abs() < 1e-6);

    assert_eq!(set.get(0).unwrap().mode_type(), ModeType::QuasiTe);
    assert_eq!(set.get(1).unwrap().mode_type(), ModeType::QuasiTm);
    assert!(set.get(0).unwrap().fraction_te() > 0.9);
    assert!(set.get(1).unwrap().fraction_te() < 0.2);

    assert_eq!(set.n_effs_te(), vec![n[0]]);
    assert_eq!(set.n_effs_tm(), vec![n[1]]);
}

#[test]
fn modes_are_ordered_and_fractions_complementary() {
    let structure = scenario().build().unwrap();
    let set = vectorial(3, "0000").solve(&structure).unwrap();
    for pair in set.n_effs().windows(2) {
        assert!(pair[0].re >= pair[1].re);
    }
    for mode in &set {
        assert!((mode.fraction_te() + mode.fraction_tm() - 1.0).abs() < 1e-12);
        assert!(mode.percentage() >= 33.33 && mode.percentage() <= 100.0);
    }
}

#[test]
fn vectorial_modes_carry_all_six_components() {
    let structure = scenario().build().unwrap();
    let set = vectorial(1, "0000").solve(&structure).unwrap();
    let Mode::Vector(mode) = set.get(0).unwrap() else {
        panic!("expected a vectorial mode");
    };
    let fields = mode.fields();
    assert_eq!(fields.ex.shape(), (30, 44));
    assert_eq!(fields.hz.shape(), (30, 44));
    assert_eq!(fields.hx.shape(), (31, 45));
    assert_eq!(fields.hy.shape(), (31, 45));
    assert_eq!(mode.components().len(), 6);
}

#[test]
fn repeated_solves_agree() {
    let structure = scenario().build().unwrap();
    let solver = vectorial(2, "0000");
    let a = solver.solve(&structure).unwrap();
    let b = solver.solve(&structure).unwrap();
    for (x, y) in a.n_effs().iter().zip(b.n_effs()) {
        assert!((x - y).norm() < 1e-3);
    }
}

#[test]
fn semi_vectorial_components_bracket_the_vectorial_result() {
    let structure = scenario().build().unwrap();
    let ex = semi(SemiComponent::Ex, 2, "0000").solve(&structure).unwrap();
    let ey = semi(SemiComponent::Ey, 1, "0000").solve(&structure).unwrap();

    assert!((ex.n_effs()[0].re - 2.5006).abs() < 5e-3);
    assert!((ex.n_effs()[1].re - 1.378).abs() < 5e-3);
    assert!((ey.n_effs()[0].re - 1.8355).abs() < 5e-3);

    let m = ex.get(0).unwrap();
    assert_eq!(m.mode_type(), ModeType::QuasiTe);
    assert_eq!(m.fraction_te(), 1.0);
    assert_eq!(m.percentage(), 100.0);
    assert_eq!(ey.get(0).unwrap().mode_type(), ModeType::QuasiTm);
    assert_eq!(ey.get(0).unwrap().fraction_tm(), 1.0);
}

/// 0.5 x 0.22 µm strip centred in a 1.6 x 1.21 µm window. Fine columns of
/// `fine` µm cover the middle 0.8 µm; the outer 0.4 µm on each side uses
/// `outer` µm columns. Core edges fall on column boundaries either way.
fn strip_on_columns(fine: f64, outer: f64) -> Structure {
    let side = (0.4 / outer).round() as usize;
    let middle = (0.8 / fine).round() as usize;
    let mut dx = vec![outer; side];
    dx.extend(std::iter::repeat(fine).take(middle));
    dx.extend(std::iter::repeat(outer).take(side));
    let grid = Grid2D::new(dx, vec![0.0275; 44]);
    Structure::from_fn(grid, 1.55, |x, y| {
        let core = (x - 0.8).abs() < 0.25 && y > 0.495 && y < 0.715;
        let n: f64 = if core { 3.4777 } else { 1.444 };
        Complex64::new(n * n, 0.0)
    })
    .unwrap()
}

#[test]
fn coarse_cladding_columns_match_the_uniform_grid() {
    let uniform = strip_on_columns(0.025, 0.025);
    let graded = strip_on_columns(0.025, 0.05);
    assert_eq!(uniform.grid().nx(), 64);
    assert_eq!(graded.grid().nx(), 48);
    assert!((graded.grid().width() - uniform.grid().width()).abs() < 1e-12);

    let solver = vectorial(2, "0000");
    let a = solver.solve(&uniform).unwrap();
    let b = solver.solve(&graded).unwrap();
    for (i, (na, nb)) in a.n_effs().iter().zip(b.n_effs()).enumerate() {
        assert!((na.re - nb.re).abs() < 2e-3, "vectorial mode {i}: {na} vs {nb}");
    }
    assert!(a.n_effs()[0].re > 2.4 && a.n_effs()[0].re < 2.55);
    assert_eq!(b.get(0).unwrap().mode_type(), ModeType::QuasiTe);
    assert_eq!(b.get(1).unwrap().mode_type(), ModeType::QuasiTm);

    let solver = semi(SemiComponent::Ex, 1, "0000");
    let a = solver.solve(&uniform).unwrap();
    let b = solver.solve(&graded).unwrap();
    let (na, nb) = (a.n_effs()[0].re, b.n_effs()[0].re);
    assert!((na - nb).abs() < 2e-3, "semi Ex: {na} vs {nb}");
    // The field lives on the graded grid, one sample per cell.
    let ex = b.get(0).unwrap().field(FieldComponent::Ex).unwrap();
    assert_eq!(ex.shape(), (48, 44));
}

#[test]
fn default_silicon_strip_matches_reference_indices() {
    let wg = RidgeWaveguide {
        x_step: 0.04,
        y_step: 0.04,
        ..RidgeWaveguide::default()
    };
    let structure = wg.build().unwrap();

    let set = vectorial(2, "0000").solve(&structure).unwrap();
    let n = set.n_effs();
    assert!((n[0].re - 2.47).abs() < 0.1, "fundamental n_eff {}", n[0]);
    assert!((n[1].re - 1.81).abs() < 0.1, "second n_eff {}", n[1]);
    let (te, tm) = (set.get(0).unwrap(), set.get(1).unwrap());
    assert_eq!(te.mode_type(), ModeType::QuasiTe);
    assert_eq!(tm.mode_type(), ModeType::QuasiTm);
    assert!(te.fraction_te() > 0.9, "TE fraction {}", te.fraction_te());
    assert!(tm.fraction_te() < 0.2, "TE fraction {}", tm.fraction_te());

    let ex = semi(SemiComponent::Ex, 1, "0000").solve(&structure).unwrap();
    let ey = semi(SemiComponent::Ey, 1, "0000").solve(&structure).unwrap();
    assert!((ex.n_effs()[0].re - 2.47).abs() < 0.1, "semi Ex {}", ex.n_effs()[0]);
    assert!((ey.n_effs()[0].re - 1.81).abs() < 0.1, "semi Ey {}", ey.n_effs()[0]);
    // The semi-vectorial Ex index sits above the vectorial fundamental.
    assert!(ex.n_effs()[0].re > n[0].re);
}

#[test]
fn fundamental_field_is_mirror_symmetric() {
    let structure = scenario().build().unwrap();
    let set = semi(SemiComponent::Ex, 1, "0000").solve(&structure).unwrap();
    let Mode::Scalar(mode) = set.get(0).unwrap() else {
        panic!("expected a scalar mode");
    };
    let field = mode.primary();
    let (nx, ny) = field.shape();
    let peak = field.as_slice().iter().map(|v| v.norm()).fold(0.0, f64::max);
    assert!(peak > 0.0);
    for iy in 0..ny {
        for ix in 0..nx / 2 {
            let a = field.get(ix, iy).norm();
            let b = field.get(nx - 1 - ix, iy).norm();
            assert!((a - b).abs() < 1e-6 * peak, "cell ({ix},{iy}): {a} vs {b}");
        }
    }
}

#[test]
fn half_domain_with_mirror_boundary_selects_parity() {
    let full = scenario().build().unwrap();
    let half = half_scenario();
    assert_eq!(half.grid().nx(), 15);
    assert_eq!(half.grid().ny(), 44);

    let reference = vectorial(2, "0000").solve(&full).unwrap().n_effs();
    let te = vectorial(1, "000A").solve(&half).unwrap().n_effs()[0];
    let tm = vectorial(1, "000S").solve(&half).unwrap().n_effs()[0];
    assert!((te.re - reference[0].re).abs() < 1e-3, "{te} vs {}", reference[0]);
    assert!((tm.re - reference[1].re).abs() < 1e-3, "{tm} vs {}", reference[1]);

    let even = semi(SemiComponent::Ex, 1, "000S").solve(&half).unwrap().n_effs()[0];
    let odd = semi(SemiComponent::Ex, 1, "000A").solve(&half).unwrap().n_effs()[0];
    assert!((even.re - 2.5006).abs() < 5e-3);
    assert!((odd.re - 1.378).abs() < 5e-3);
}

#[test]
fn effective_index_takes_the_positive_branch() {
    let k0 = 2.0 * std::f64::consts::PI / 1.55;
    let n = Complex64::new(2.2, 1e-4);
    let back = effective_index(n * n * k0 * k0, k0);
    assert!((back - n).norm() < 1e-12);
    let neg = effective_index(Complex64::new(-1.0, 0.0) * k0 * k0, k0);
    assert!(neg.re >= 0.0);
}

#[test]
fn warm_start_reproduces_the_cold_result() {
    let structure = scenario().build().unwrap();
    let solver = vectorial(2, "0000");
    let cold = solver.solve(&structure).unwrap();
    let guess = warm_start(cold.get(0).unwrap());
    assert_eq!(guess.len(), 2 * 31 * 45);
    let warm = solver
        .solve_with(
            &structure,
            &SolveOptions {
                initial_guess: Some(&guess),
                ..SolveOptions::default()
            },
        )
        .unwrap();
    for (x, y) in cold.n_effs().iter().zip(warm.n_effs()) {
        assert!((x - y).norm() < 1e-6);
    }

    // A guess for a different operator is ignored rather than rejected.
    let short = vec![Complex64::new(1.0, 0.0); 7];
    let set = solver
        .solve_with(
            &structure,
            &SolveOptions {
                initial_guess: Some(&short),
                ..SolveOptions::default()
            },
        )
        .unwrap();
    assert_eq!(set.len(), 2);
}

#[test]
fn invalid_settings_are_rejected_up_front() {
    let err = ModeSolver::new(SolverConfig {
        n_modes: 0,
        ..SolverConfig::default()
    })
    .unwrap_err();
    assert!(matches!(err, SolverError::InvalidInput(_)));

    let err = ModeSolver::new(SolverConfig {
        tol: -1.0,
        ..SolverConfig::default()
    })
    .unwrap_err();
    assert!(matches!(err, SolverError::InvalidInput(_)));

    let err = ModeSolver::new(SolverConfig {
        n_modes: 4,
        krylov_dim: Some(4),
        ..SolverConfig::default()
    })
    .unwrap_err();
    assert!(matches!(err, SolverError::InvalidInput(_)));
}

#[test]
fn fingerprint_tracks_solver_settings() {
    let base = scenario().fingerprint();
    let a = config(SolverMethod::Vectorial, 2).fingerprint(base.clone());
    let b = config(SolverMethod::Vectorial, 3).fingerprint(base.clone());
    let c = config(SolverMethod::SemiVectorial, 2).fingerprint(base.clone());
    assert_ne!(a.key(), b.key());
    assert_ne!(a.key(), c.key());
    assert!(c.settings().contains_key("semi_component"));
    assert!(!a.settings().contains_key("semi_component"));
    assert_eq!(a.key(), config(SolverMethod::Vectorial, 2).fingerprint(base).key());

    let boundary: BoundaryConditions = "000A".parse().unwrap();
    let d = SolverConfig {
        boundary,
        ..config(SolverMethod::Vectorial, 2)
    }
    .fingerprint(scenario().fingerprint());
    assert_ne!(a.key(), d.key());
}

#[test]
fn metrics_follow_the_pipeline() {
    let structure = scenario().build().unwrap();
    let solver = vectorial(2, "0000");
    let buf = SharedBuf::default();
    let recorder = MetricsRecorder::from_writer(Box::new(buf.clone()), MetricsFormat::JsonLines);
    solver
        .solve_with(
            &structure,
            &SolveOptions {
                metrics: Some(&recorder),
                ..SolveOptions::default()
            },
        )
        .unwrap();

    let events = buf.events();
    assert_eq!(
        event_names(&events),
        [
            "solve_start",
            "operator_assembly",
            "eigensolve",
            "mode_classified",
            "mode_classified",
            "solve_done"
        ]
    );
    assert_eq!(events[0]["grid_nx"], 30);
    assert_eq!(events[0]["boundary"], "0000");
    assert_eq!(events[0]["warm_start"], false);
    assert_eq!(events[1]["unknowns"], 2 * 31 * 45);
    assert_eq!(events[3]["mode_type"], "qTE");
    assert_eq!(events[5]["from_cache"], false);
    assert!(events.iter().all(|e| e["timestamp_ms"].as_f64().is_some()));
}

#[test]
fn memory_cache_serves_the_second_solve() {
    let wg = scenario();
    let structure = wg.build().unwrap();
    let solver = semi(SemiComponent::Ex, 2, "0000");
    let fp = solver.config().fingerprint(wg.fingerprint());
    let cache = MemoryCache::new();
    let buf = SharedBuf::default();
    let recorder = MetricsRecorder::from_writer(Box::new(buf.clone()), MetricsFormat::JsonLines);
    let opts = SolveOptions {
        cache: Some(CacheRequest {
            cache: &cache,
            fingerprint: &fp,
            overwrite: false,
        }),
        metrics: Some(&recorder),
        ..SolveOptions::default()
    };

    let first = solver.solve_with(&structure, &opts).unwrap();
    assert_eq!(cache.len(), 1);
    let second = solver.solve_with(&structure, &opts).unwrap();
    assert_eq!(first, second);

    let lookups: Vec<_> = buf
        .events()
        .into_iter()
        .filter(|e| e["event"] == "cache_lookup")
        .map(|e| e["outcome"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(lookups, ["miss", "hit"]);
    let last = buf.events().pop().unwrap();
    assert_eq!(last["event"], "solve_done");
    assert_eq!(last["from_cache"], true);
}

#[test]
fn overwrite_skips_the_lookup() {
    let wg = scenario();
    let structure = wg.build().unwrap();
    let solver = semi(SemiComponent::Ex, 1, "0000");
    let fp = solver.config().fingerprint(wg.fingerprint());
    let cache = MemoryCache::new();
    let buf = SharedBuf::default();
    let recorder = MetricsRecorder::from_writer(Box::new(buf.clone()), MetricsFormat::JsonLines);
    for _ in 0..2 {
        let opts = SolveOptions {
            cache: Some(CacheRequest {
                cache: &cache,
                fingerprint: &fp,
                overwrite: true,
            }),
            metrics: Some(&recorder),
            ..SolveOptions::default()
        };
        solver.solve_with(&structure, &opts).unwrap();
    }
    let names = event_names(&buf.events());
    assert!(!names.iter().any(|n| n == "cache_lookup"));
    assert_eq!(names.iter().filter(|n| *n == "eigensolve").count(), 2);
    assert_eq!(cache.len(), 1);
}

#[test]
fn corrupt_json_record_is_replaced() {
    let wg = scenario();
    let structure = wg.build().unwrap();
    let solver = semi(SemiComponent::Ey, 1, "0000");
    let fp = solver.config().fingerprint(wg.fingerprint());
    let cache = JsonDirCache::new(scratch_dir("corrupt"));
    fs::create_dir_all(cache.dir()).unwrap();
    fs::write(cache.record_path(&fp), "{ not json").unwrap();

    let opts = SolveOptions {
        cache: Some(CacheRequest {
            cache: &cache,
            fingerprint: &fp,
            overwrite: false,
        }),
        ..SolveOptions::default()
    };
    let set = solver.solve_with(&structure, &opts).unwrap();
    assert_eq!(set.len(), 1);

    let stored = cache.get(&fp).unwrap().expect("record rewritten");
    assert!((stored.n_effs()[0] - set.n_effs()[0]).norm() < 1e-12);
    let _ = fs::remove_dir_all(cache.dir());
}

#[test]
fn mismatched_record_is_ignored() {
    let wg = scenario();
    let structure = wg.build().unwrap();
    let solver = vectorial(2, "0000");
    let fp = solver.config().fingerprint(wg.fingerprint());
    let cache = MemoryCache::new();

    // Right key, wrong content: a scalar set on a different grid.
    let stale = ModeSet::new(
        SolverMethod::SemiVectorial,
        1.55,
        vec![Mode::Scalar(ScalarMode::new(
            Complex64::new(9.0, 0.0),
            SemiComponent::Ex,
            Field2D::zeros(3, 3),
        ))],
    );
    cache.put(&fp, &stale).unwrap();

    let opts = SolveOptions {
        cache: Some(CacheRequest {
            cache: &cache,
            fingerprint: &fp,
            overwrite: false,
        }),
        ..SolveOptions::default()
    };
    let set = solver.solve_with(&structure, &opts).unwrap();
    assert_eq!(set.method, SolverMethod::Vectorial);
    assert_eq!(set.len(), 2);
    assert!(set.n_effs()[0].re < 3.0);

    let replaced = cache.get(&fp).unwrap().unwrap();
    assert_eq!(replaced, set);
}
