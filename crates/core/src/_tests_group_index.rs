#![cfg(test)]

use super::cache::MemoryCache;
use super::error::SolverError;
use super::geometry::RidgeWaveguide;
use super::group_index::{group_index, solve_group_index};
use super::material::Material;
use super::mode::SolverMethod;
use super::polarization::SemiComponent;
use super::solver::{JobContext, ModeSolver, SolverConfig};
use num_complex::Complex64;

fn c(re: f64) -> Complex64 {
    Complex64::new(re, 0.0)
}

fn strip() -> RidgeWaveguide {
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

fn solver(method: SolverMethod, n_modes: usize) -> ModeSolver {
    ModeSolver::new(SolverConfig {
        method,
        n_modes,
        tol: 1e-8,
        semi_component: SemiComponent::Ex,
        ..SolverConfig::default()
    })
    .unwrap()
}

#[test]
fn centred_difference_formula() {
    let ng = group_index(&[c(2.0)], &[c(2.01)], &[c(1.99)], 1.55, 0.01);
    assert_eq!(ng.len(), 1);
    assert!((ng[0] - 3.55).abs() < 1e-12);
}

#[test]
fn flat_dispersion_gives_the_phase_index() {
    let ng = group_index(&[c(2.4), c(1.8)], &[c(2.4), c(1.8)], &[c(2.4), c(1.8)], 1.3, 0.02);
    assert!((ng[0] - 2.4).abs() < 1e-12);
    assert!((ng[1] - 1.8).abs() < 1e-12);
}

#[test]
fn only_real_parts_enter() {
    let ng = group_index(
        &[Complex64::new(2.0, 0.3)],
        &[Complex64::new(2.01, -0.2)],
        &[Complex64::new(1.99, 0.7)],
        1.55,
        0.01,
    );
    assert!((ng[0] - 3.55).abs() < 1e-12);
}

#[test]
fn shortest_input_bounds_the_output() {
    let ng = group_index(&[c(2.0), c(1.9)], &[c(2.01)], &[c(1.99), c(1.8)], 1.55, 0.01);
    assert_eq!(ng.len(), 1);
}

#[test]
fn vectorial_strip_group_indices() {
    let solver = solver(SolverMethod::Vectorial, 2);
    let result = solve_group_index(&strip(), &solver, 0.01, &JobContext::default()).unwrap();
    assert_eq!(result.group_indices.len(), 2);
    assert!((result.n_effs[0] - 2.4613).abs() < 5e-3);
    assert!((result.group_indices[0] - 4.009).abs() < 0.1, "{:?}", result.group_indices);
    assert!((result.group_indices[1] - 3.815).abs() < 0.1, "{:?}", result.group_indices);
    assert_eq!(result.fundamental(), Some(result.group_indices[0]));
    // Waveguide dispersion pushes n_g above n_eff for constant materials.
    assert!(result.group_indices[0] > result.n_effs[0]);
}

#[test]
fn semi_vectorial_strip_group_index() {
    let result = solve_group_index(
        &strip(),
        &solver(SolverMethod::SemiVectorial, 1),
        0.01,
        &JobContext::default(),
    )
    .unwrap();
    assert!((result.group_indices[0] - 3.946).abs() < 0.1);
    assert!((result.wavelength - 1.55).abs() < 1e-12);
    assert!((result.step - 0.01).abs() < 1e-12);
}

#[test]
fn all_three_solves_are_cached() {
    let cache = MemoryCache::new();
    let ctx = JobContext {
        cache: Some(&cache),
        ..JobContext::default()
    };
    let solver = solver(SolverMethod::SemiVectorial, 1);
    let first = solve_group_index(&strip(), &solver, 0.02, &ctx).unwrap();
    assert_eq!(cache.len(), 3);
    let second = solve_group_index(&strip(), &solver, 0.02, &ctx).unwrap();
    assert_eq!(first.group_indices, second.group_indices);
    assert_eq!(cache.len(), 3);
}

#[test]
fn step_must_be_positive_and_shorter_than_the_wavelength() {
    let solver = solver(SolverMethod::SemiVectorial, 1);
    for step in [0.0, -0.01, 1.55, 2.0, f64::NAN] {
        let err = solve_group_index(&strip(), &solver, step, &JobContext::default()).unwrap_err();
        assert!(matches!(err, SolverError::InvalidInput(_)), "step {step}");
    }
}
