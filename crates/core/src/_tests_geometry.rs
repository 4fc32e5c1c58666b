#![cfg(test)]

use super::error::SolverError;
use super::geometry::RidgeWaveguide;
use super::material::Material;

fn strip() -> RidgeWaveguide {
    RidgeWaveguide {
        n_wg: Material::Constant(3.5),
        n_sub: Material::Constant(1.45),
        n_clads: vec![Material::Constant(1.0)],
        ..RidgeWaveguide::default()
    }
}

#[test]
fn default_strip_builds_expected_grid() {
    let structure = RidgeWaveguide::default().build().unwrap();
    assert_eq!(structure.grid().nx(), 100);
    assert_eq!(structure.grid().ny(), 61);
    assert!((structure.wavelength() - 1.55).abs() < 1e-12);
    assert!((structure.max_index() - 3.476).abs() < 0.01);
}

#[test]
fn layers_are_stacked_bottom_to_top() {
    let wg = strip();
    let centre = 0.5 * wg.sub_width;
    assert_eq!(wg.index_at(centre, 0.1).re, 1.45);
    assert_eq!(wg.index_at(centre, 0.6).re, 3.5);
    assert_eq!(wg.index_at(centre + 0.3, 0.6).re, 1.0);
    assert_eq!(wg.index_at(centre, 1.0).re, 1.0);
    assert_eq!(wg.index_at(centre, wg.total_height()).re, 1.0);
}

#[test]
fn slab_spans_the_full_width() {
    let wg = RidgeWaveguide {
        slab_height: 0.09,
        ..strip()
    };
    assert_eq!(wg.index_at(0.05, 0.55).re, 3.5);
    assert_eq!(wg.index_at(0.05, 0.65).re, 1.0);
    assert_eq!(wg.index_at(wg.sub_width * 0.5, 0.65).re, 3.5);
}

#[test]
fn sloped_sidewalls_widen_towards_the_base() {
    let vertical = strip();
    let sloped = RidgeWaveguide {
        angle: 60.0,
        ..strip()
    };
    let x = 0.5 * vertical.sub_width + 0.27;
    let y = vertical.sub_height + 0.01;
    assert_eq!(vertical.index_at(x, y).re, 1.0);
    assert_eq!(sloped.index_at(x, y).re, 3.5);
    // Near the top the ridge is as wide as `wg_width`.
    assert_eq!(sloped.index_at(x, y + 0.2).re, 1.0);
}

#[test]
fn multiple_cladding_layers() {
    let wg = RidgeWaveguide {
        clad_heights: vec![0.3, 0.2],
        n_clads: vec![Material::Constant(1.45), Material::Constant(1.0)],
        ..strip()
    };
    let centre = 0.5 * wg.sub_width;
    assert!((wg.total_height() - 1.22).abs() < 1e-12);
    assert_eq!(wg.index_at(centre, 0.9).re, 1.45);
    assert_eq!(wg.index_at(centre, 1.1).re, 1.0);
}

#[test]
fn invalid_dimensions_are_rejected() {
    let cases = [
        RidgeWaveguide {
            wg_width: 0.0,
            ..strip()
        },
        RidgeWaveguide {
            clad_heights: vec![],
            n_clads: vec![],
            ..strip()
        },
        RidgeWaveguide {
            clad_heights: vec![0.5, 0.5],
            ..strip()
        },
        RidgeWaveguide {
            wg_width: 2.5,
            ..strip()
        },
        RidgeWaveguide {
            slab_height: 0.3,
            ..strip()
        },
        RidgeWaveguide {
            x_step: -0.01,
            ..strip()
        },
    ];
    for wg in cases {
        let err = wg.build().unwrap_err();
        assert!(matches!(err, SolverError::InvalidInput(_)), "{err}");
    }
}

#[test]
fn fingerprint_tracks_geometry_changes() {
    let a = strip().fingerprint();
    let b = strip().with_width(0.45).fingerprint();
    let c = strip().fingerprint();
    assert_ne!(a.key(), b.key());
    assert_eq!(a.key(), c.key());
    assert!(a.name().starts_with("wg_"));
}
