#![cfg(test)]

use std::fs;

use super::metrics::{MetricsConfig, MetricsEvent, MetricsFormat};
use super::mode::SolverMethod;

#[test]
fn disabled_config_builds_no_recorder() {
    let config = MetricsConfig::default();
    assert!(config.build_recorder().unwrap().is_none());
}

#[test]
fn enabled_config_requires_an_output_path() {
    let config = MetricsConfig {
        enabled: true,
        output: None,
        format: MetricsFormat::JsonLines,
    };
    assert!(config.build_recorder().is_err());
}

#[test]
fn events_are_appended_as_json_lines() {
    let dir = std::env::temp_dir().join(format!("wgmode-metrics-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    let path = dir.join("nested").join("run.jsonl");
    let config = MetricsConfig {
        enabled: true,
        output: Some(path.clone()),
        format: MetricsFormat::JsonLines,
    };
    let recorder = config.build_recorder().unwrap().unwrap();
    recorder.emit(MetricsEvent::SolveStart {
        method: SolverMethod::SemiVectorial,
        grid_nx: 30,
        grid_ny: 44,
        wavelength: 1.55,
        n_modes: 2,
        tol: 1e-3,
        boundary: "000A",
        target_n_eff: 3.4777,
        warm_start: true,
    });
    recorder.emit(MetricsEvent::GroupIndex {
        wavelength: 1.55,
        wavelength_step: 0.01,
        group_indices: &[4.01, 3.81],
        duration_ms: 12.5,
    });
    drop(recorder);

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], "solve_start");
    assert_eq!(lines[0]["method"], "semi_vectorial");
    assert_eq!(lines[0]["boundary"], "000A");
    assert_eq!(lines[1]["event"], "group_index");
    assert_eq!(lines[1]["group_indices"][1], 3.81);
    assert!(lines[1]["timestamp_ms"].as_f64().unwrap() > 0.0);
    let _ = fs::remove_dir_all(&dir);
}
