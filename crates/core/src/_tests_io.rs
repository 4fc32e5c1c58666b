#![cfg(test)]

use std::{fs, path::PathBuf};

use super::error::SolverError;
use super::field::FieldComponent;
use super::io::JobConfig;
use super::material::Material;
use super::mode::SolverMethod;
use super::polarization::SemiComponent;

const FULL: &str = r#"
name = "rib"

[waveguide]
wg_width = 0.6
wg_height = 0.22
slab_height = 0.09
sub_width = 2.5
clad_heights = [0.5, 0.3]
n_wg = "si"
n_sub = "sio2"
n_clads = ["sio2", 1.0]
x_step = 0.01
y_step = 0.01
wavelength = 1.31
angle = 80.0

[solver]
method = "semi_vectorial"
semi_component = "Ey"
n_modes = 3
tol = 1e-6
boundary = "000A"
n_eff_guess = 3.0

[cache]
dir = "cache"
overwrite = true

[output]
dir = "out"
fields = ["Ex", "Hy"]
stem = "rib"

[group_index]
wavelength_step = 0.005

[sweep]
widths = [0.4, 0.5]
threads = 4

[metrics]
enabled = true
output = "metrics.jsonl"
"#;

#[test]
fn minimal_config_falls_back_to_defaults() {
    let config = JobConfig::from_toml_str("[waveguide]\nwg_width = 0.45\n").unwrap();
    assert_eq!(config.name, "wg");
    assert!((config.waveguide.wg_width - 0.45).abs() < 1e-12);
    assert!((config.waveguide.wavelength - 1.55).abs() < 1e-12);
    assert_eq!(config.waveguide.n_wg, Material::SI);
    assert_eq!(config.solver.method, SolverMethod::Vectorial);
    assert_eq!(config.solver.boundary.to_string(), "0000");
    assert_eq!(config.solver.n_eff_guess, None);
    assert!(config.cache.dir.is_none());
    assert!(config.cache.build().is_none());
    assert!(config.output.dir.is_none());
    assert_eq!(config.output.fields, FieldComponent::ALL.to_vec());
    assert_eq!(config.output.stem, "mode");
    assert!((config.group_index.wavelength_step - 0.01).abs() < 1e-12);
    assert!(config.sweep.widths.is_empty());
    assert!(!config.metrics.enabled);
}

#[test]
fn full_config_round_trips_every_section() {
    let config = JobConfig::from_toml_str(FULL).unwrap();
    assert_eq!(config.name, "rib");

    let wg = &config.waveguide;
    assert!((wg.slab_height - 0.09).abs() < 1e-12);
    assert_eq!(wg.clad_heights, vec![0.5, 0.3]);
    assert_eq!(wg.n_sub, Material::SIO2);
    assert_eq!(wg.n_clads, vec![Material::SIO2, Material::Constant(1.0)]);
    assert!((wg.angle - 80.0).abs() < 1e-12);

    let solver = &config.solver;
    assert_eq!(solver.method, SolverMethod::SemiVectorial);
    assert_eq!(solver.semi_component, SemiComponent::Ey);
    assert_eq!(solver.n_modes, 3);
    assert_eq!(solver.boundary.to_string(), "000A");
    assert_eq!(solver.n_eff_guess, Some(3.0));

    assert_eq!(config.cache.dir, Some(PathBuf::from("cache")));
    assert!(config.cache.overwrite);
    assert_eq!(
        config.cache.build().unwrap().dir(),
        PathBuf::from("cache").as_path()
    );
    assert_eq!(config.output.fields, vec![FieldComponent::Ex, FieldComponent::Hy]);
    assert_eq!(config.output.stem, "rib");
    assert!((config.group_index.wavelength_step - 0.005).abs() < 1e-12);
    assert_eq!(config.sweep.widths, vec![0.4, 0.5]);
    assert_eq!(config.sweep.threads, Some(4));
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.output, Some(PathBuf::from("metrics.jsonl")));
}

#[test]
fn waveguide_section_is_required() {
    let err = JobConfig::from_toml_str("name = \"x\"\n").unwrap_err();
    assert!(matches!(err, SolverError::Toml(_)));
}

#[test]
fn bad_boundary_string_fails_to_parse() {
    let err = JobConfig::from_toml_str("[waveguide]\n[solver]\nboundary = \"00X0\"\n").unwrap_err();
    assert!(matches!(err, SolverError::Toml(_)));
}

#[test]
fn invalid_values_are_rejected() {
    let cases = [
        "[waveguide]\nwg_width = -0.5\n",
        "[waveguide]\n[solver]\nn_modes = 0\n",
        "[waveguide]\n[group_index]\nwavelength_step = 0.0\n",
        "[waveguide]\n[sweep]\nwidths = [0.5, 0.0]\n",
        "[waveguide]\n[sweep]\nthreads = 0\n",
        "[waveguide]\nclad_heights = [0.5, 0.5]\n",
    ];
    for text in cases {
        let err = JobConfig::from_toml_str(text).unwrap_err();
        assert!(matches!(err, SolverError::InvalidInput(_)), "{text}: {err}");
    }
}

#[test]
fn overrides_are_checked_like_file_values() {
    let mut config = JobConfig::from_toml_str("[waveguide]\n").unwrap();
    config.sweep.threads = Some(0);
    let err = config.validate().unwrap_err();
    assert!(matches!(err, SolverError::InvalidInput(_)), "{err}");
    config.sweep.threads = Some(3);
    config.validate().unwrap();
}

#[test]
fn load_reads_from_disk() {
    let path = std::env::temp_dir().join(format!("wgmode-io-{}.toml", std::process::id()));
    fs::write(&path, FULL).unwrap();
    let config = JobConfig::load(&path).unwrap();
    assert_eq!(config.solver.n_modes, 3);
    let _ = fs::remove_file(&path);

    let err = JobConfig::load(&path).unwrap_err();
    assert!(matches!(err, SolverError::Io(_)));
}
