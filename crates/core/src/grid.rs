//! Rectilinear grid helpers.
//!
//! Cells are addressed row-major (`iy * nx + ix`). Step sizes may vary per
//! column (`dx`) and per row (`dy`); a uniform grid simply repeats one value.

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};

/// Largest cell count [`Grid2D::covering`] will lay out.
pub const MAX_CELLS: usize = 1 << 22;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid2D {
    pub dx: Vec<f64>,
    pub dy: Vec<f64>,
}

impl Grid2D {
    pub fn new(dx: Vec<f64>, dy: Vec<f64>) -> Self {
        Self { dx, dy }
    }

    pub fn uniform(nx: usize, ny: usize, dx: f64, dy: f64) -> Self {
        Self {
            dx: vec![dx; nx],
            dy: vec![dy; ny],
        }
    }

    /// Uniform grid covering `width x height` with steps as close as possible
    /// to the requested ones.
    pub fn covering(width: f64, height: f64, x_step: f64, y_step: f64) -> SolverResult<Self> {
        if !(x_step > 0.0 && y_step > 0.0) {
            return Err(SolverError::invalid(format!(
                "grid steps must be positive (x_step={x_step}, y_step={y_step})"
            )));
        }
        if !(width > 0.0 && height > 0.0) {
            return Err(SolverError::invalid(format!(
                "domain must have positive extent (width={width}, height={height})"
            )));
        }
        let (fx, fy) = ((width / x_step).round().max(1.0), (height / y_step).round().max(1.0));
        if !(fx * fy <= MAX_CELLS as f64) {
            return Err(SolverError::invalid(format!(
                "a {width} x {height} domain at steps ({x_step}, {y_step}) needs {fx} x {fy} \
                 cells, above the limit of {MAX_CELLS}"
            )));
        }
        let (nx, ny) = (fx as usize, fy as usize);
        Ok(Self::uniform(nx, ny, width / nx as f64, height / ny as f64))
    }

    #[inline]
    pub fn nx(&self) -> usize {
        self.dx.len()
    }

    #[inline]
    pub fn ny(&self) -> usize {
        self.dy.len()
    }

    #[inline]
    pub fn idx(&self, ix: usize, iy: usize) -> usize {
        iy * self.nx() + ix
    }

    pub fn len(&self) -> usize {
        self.nx() * self.ny()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn width(&self) -> f64 {
        self.dx.iter().sum()
    }

    pub fn height(&self) -> f64 {
        self.dy.iter().sum()
    }

    /// Column step with the index clamped into range.
    #[inline]
    pub(crate) fn dx_at(&self, ix: isize) -> f64 {
        self.dx[clamp_index(ix, self.nx())]
    }

    #[inline]
    pub(crate) fn dy_at(&self, iy: isize) -> f64 {
        self.dy[clamp_index(iy, self.ny())]
    }

    pub fn x_centers(&self) -> Vec<f64> {
        centers(&self.dx)
    }

    pub fn y_centers(&self) -> Vec<f64> {
        centers(&self.dy)
    }

    pub fn x_nodes(&self) -> Vec<f64> {
        nodes(&self.dx)
    }

    pub fn y_nodes(&self) -> Vec<f64> {
        nodes(&self.dy)
    }

    pub fn validate(&self) -> SolverResult<()> {
        if self.dx.is_empty() || self.dy.is_empty() {
            return Err(SolverError::invalid("grid must contain at least one cell"));
        }
        if let Some(bad) = self.dx.iter().chain(&self.dy).find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(SolverError::invalid(format!(
                "grid steps must be positive and finite (found {bad})"
            )));
        }
        Ok(())
    }
}

#[inline]
pub(crate) fn clamp_index(i: isize, n: usize) -> usize {
    i.clamp(0, n as isize - 1) as usize
}

fn centers(steps: &[f64]) -> Vec<f64> {
    let mut acc = 0.0;
    steps
        .iter()
        .map(|s| {
            let c = acc + 0.5 * s;
            acc += s;
            c
        })
        .collect()
}

fn nodes(steps: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(steps.len() + 1);
    let mut acc = 0.0;
    out.push(acc);
    for s in steps {
        acc += s;
        out.push(acc);
    }
    out
}
