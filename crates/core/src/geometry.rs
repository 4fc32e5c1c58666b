//! Layered ridge-waveguide cross-sections.
//!
//! ```text
//!   clad[n-1]                      <- stacked cladding layers
//!   ...
//!   clad[0]       ____________
//!                /   n_wg     \    <- ridge, `wg_height - slab_height` tall
//!   ____________/______________\____________
//!   n_wg slab                                <- `slab_height`
//!   --------------------------------------------
//!   n_sub                                    <- `sub_height`
//! ```
//!
//! The first cladding layer surrounds the ridge and extends `clad_heights[0]`
//! above its top; further layers stack upwards. The ridge is centered in a
//! domain `sub_width` wide, `wg_width` is its top width and a sidewall angle
//! below 90° widens it towards the slab.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::{
    cache::Fingerprint,
    error::{SolverError, SolverResult},
    grid::Grid2D,
    material::{Material, MaterialProvider},
    structure::Structure,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RidgeWaveguide {
    pub wg_width: f64,
    pub wg_height: f64,
    pub slab_height: f64,
    pub sub_height: f64,
    pub sub_width: f64,
    pub clad_heights: Vec<f64>,
    pub n_sub: Material,
    pub n_wg: Material,
    pub n_clads: Vec<Material>,
    pub x_step: f64,
    pub y_step: f64,
    pub wavelength: f64,
    /// Sidewall angle in degrees; 90 is vertical.
    pub angle: f64,
}

impl Default for RidgeWaveguide {
    fn default() -> Self {
        Self {
            wg_width: 0.5,
            wg_height: 0.22,
            slab_height: 0.0,
            sub_height: 0.5,
            sub_width: 2.0,
            clad_heights: vec![0.5],
            n_sub: Material::SIO2,
            n_wg: Material::SI,
            n_clads: vec![Material::SIO2],
            x_step: 0.02,
            y_step: 0.02,
            wavelength: 1.55,
            angle: 90.0,
        }
    }
}

impl RidgeWaveguide {
    pub fn with_wavelength(&self, wavelength: f64) -> Self {
        Self {
            wavelength,
            ..self.clone()
        }
    }

    pub fn with_width(&self, wg_width: f64) -> Self {
        Self {
            wg_width,
            ..self.clone()
        }
    }

    pub fn total_height(&self) -> f64 {
        self.sub_height + self.wg_height + self.clad_heights.iter().sum::<f64>()
    }

    pub fn validate(&self) -> SolverResult<()> {
        let positive = [
            ("wg_width", self.wg_width),
            ("wg_height", self.wg_height),
            ("sub_width", self.sub_width),
            ("x_step", self.x_step),
            ("y_step", self.y_step),
            ("wavelength", self.wavelength),
        ];
        if let Some((name, value)) = positive.iter().find(|(_, v)| !(v.is_finite() && *v > 0.0)) {
            return Err(SolverError::invalid(format!("{name} must be positive (got {value})")));
        }
        if self.sub_height < 0.0 || self.slab_height < 0.0 {
            return Err(SolverError::invalid("sub_height and slab_height must be non-negative"));
        }
        if self.slab_height >= self.wg_height {
            return Err(SolverError::invalid(format!(
                "slab_height ({}) must be below wg_height ({})",
                self.slab_height, self.wg_height
            )));
        }
        if self.clad_heights.is_empty() || self.clad_heights.iter().any(|h| *h <= 0.0) {
            return Err(SolverError::invalid("at least one positive cladding height is required"));
        }
        if self.clad_heights.len() != self.n_clads.len() {
            return Err(SolverError::invalid(format!(
                "{} cladding heights but {} cladding materials",
                self.clad_heights.len(),
                self.n_clads.len()
            )));
        }
        if !(self.angle > 0.0 && self.angle <= 90.0) {
            return Err(SolverError::invalid(format!(
                "sidewall angle must lie in (0, 90] degrees (got {})",
                self.angle
            )));
        }
        if self.ridge_base_half_width() * 2.0 >= self.sub_width {
            return Err(SolverError::invalid(format!(
                "ridge ({:.3} wide at its base) does not fit inside sub_width {}",
                2.0 * self.ridge_base_half_width(),
                self.sub_width
            )));
        }
        Ok(())
    }

    fn ridge_height(&self) -> f64 {
        self.wg_height - self.slab_height
    }

    fn ridge_base_half_width(&self) -> f64 {
        0.5 * self.wg_width + self.sidewall_run(self.ridge_height())
    }

    /// Horizontal widening `depth` below the ridge top.
    fn sidewall_run(&self, depth: f64) -> f64 {
        if self.angle >= 90.0 {
            0.0
        } else {
            depth / self.angle.to_radians().tan()
        }
    }

    /// Refractive index at a point of the cross-section.
    pub fn index_at(&self, x: f64, y: f64) -> Complex64 {
        let wl = self.wavelength;
        let slab_top = self.sub_height + self.slab_height;
        let ridge_top = self.sub_height + self.wg_height;
        if y < self.sub_height {
            return self.n_sub.refractive_index(wl);
        }
        if y < slab_top {
            return self.n_wg.refractive_index(wl);
        }
        if y < ridge_top {
            let half = 0.5 * self.wg_width + self.sidewall_run(ridge_top - y);
            if (x - 0.5 * self.sub_width).abs() < half {
                return self.n_wg.refractive_index(wl);
            }
        }
        let mut layer_top = ridge_top;
        for (height, material) in self.clad_heights.iter().zip(&self.n_clads) {
            layer_top += height;
            if y < layer_top {
                return material.refractive_index(wl);
            }
        }
        // Points on the very top edge belong to the last layer.
        self.n_clads
            .last()
            .map_or(Complex64::new(1.0, 0.0), |m| m.refractive_index(wl))
    }

    pub fn grid(&self) -> SolverResult<Grid2D> {
        Grid2D::covering(self.sub_width, self.total_height(), self.x_step, self.y_step)
    }

    pub fn build(&self) -> SolverResult<Structure> {
        self.validate()?;
        let grid = self.grid()?;
        Structure::from_fn(grid, self.wavelength, |x, y| {
            let n = self.index_at(x, y);
            n * n
        })
    }

    /// Cache fingerprint of the geometry (solver settings are added separately).
    pub fn fingerprint(&self) -> Fingerprint {
        let clads: Vec<String> = self.n_clads.iter().map(MaterialProvider::name).collect();
        Fingerprint::new("wg")
            .with("wg_width", self.wg_width)
            .with("wg_height", self.wg_height)
            .with("slab_height", self.slab_height)
            .with("sub_height", self.sub_height)
            .with("sub_width", self.sub_width)
            .with("clad_heights", self.clad_heights.clone())
            .with("n_sub", self.n_sub.name())
            .with("n_wg", self.n_wg.name())
            .with("n_clads", clads)
            .with("x_step", self.x_step)
            .with("y_step", self.y_step)
            .with("wavelength", self.wavelength)
            .with("angle", self.angle)
    }
}
