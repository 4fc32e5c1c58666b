//! Sampled permittivity on a rectilinear grid.

use num_complex::Complex64;

use crate::{
    error::{SolverError, SolverResult},
    grid::{Grid2D, clamp_index},
};

/// Complex relative permittivity sampled at cell centers, together with the
/// free-space wavelength it was evaluated at. Immutable once built.
#[derive(Debug, Clone)]
pub struct Structure {
    grid: Grid2D,
    eps: Vec<Complex64>,
    wavelength: f64,
}

impl Structure {
    pub fn new(grid: Grid2D, eps: Vec<Complex64>, wavelength: f64) -> SolverResult<Self> {
        grid.validate()?;
        if !(wavelength.is_finite() && wavelength > 0.0) {
            return Err(SolverError::invalid(format!(
                "wavelength must be positive (got {wavelength})"
            )));
        }
        if eps.len() != grid.len() {
            return Err(SolverError::invalid(format!(
                "permittivity has {} samples but the grid has {} cells",
                eps.len(),
                grid.len()
            )));
        }
        if let Some((idx, bad)) = eps
            .iter()
            .enumerate()
            .find(|(_, e)| !(e.re.is_finite() && e.im.is_finite()) || e.re <= 0.0)
        {
            return Err(SolverError::invalid(format!(
                "permittivity at cell {idx} must be finite with positive real part (got {bad})"
            )));
        }
        Ok(Self {
            grid,
            eps,
            wavelength,
        })
    }

    /// Samples `eps_at(x, y)` at every cell center.
    pub fn from_fn<F>(grid: Grid2D, wavelength: f64, mut eps_at: F) -> SolverResult<Self>
    where
        F: FnMut(f64, f64) -> Complex64,
    {
        grid.validate()?;
        let xs = grid.x_centers();
        let ys = grid.y_centers();
        let mut eps = Vec::with_capacity(grid.len());
        for &y in &ys {
            for &x in &xs {
                eps.push(eps_at(x, y));
            }
        }
        Self::new(grid, eps, wavelength)
    }

    pub fn grid(&self) -> &Grid2D {
        &self.grid
    }

    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    /// Free-space wavenumber `2π/λ`.
    pub fn k0(&self) -> f64 {
        2.0 * std::f64::consts::PI / self.wavelength
    }

    pub fn eps(&self, ix: usize, iy: usize) -> Complex64 {
        self.eps[self.grid.idx(ix, iy)]
    }

    /// Permittivity with both indices clamped to the domain, i.e. the outermost
    /// cells are extended past the boundary.
    #[inline]
    pub(crate) fn eps_clamped(&self, ix: isize, iy: isize) -> Complex64 {
        let ix = clamp_index(ix, self.grid.nx());
        let iy = clamp_index(iy, self.grid.ny());
        self.eps[self.grid.idx(ix, iy)]
    }

    pub fn as_slice(&self) -> &[Complex64] {
        &self.eps
    }

    /// Largest real refractive index present; the default eigenvalue target.
    pub fn max_index(&self) -> f64 {
        self.eps
            .iter()
            .map(|e| e.sqrt().re)
            .fold(0.0_f64, f64::max)
    }

    /// Refractive index map `sqrt(eps)` in the same layout as the permittivity.
    pub fn index_map(&self) -> Vec<Complex64> {
        self.eps.iter().map(|e| e.sqrt()).collect()
    }
}
