//! Contiguous complex-valued field storage.
//!
//! Fields are stored row-major (`iy * nx + ix`). Magnetic components of the
//! vectorial solver live on grid nodes, so their arrays are one larger in each
//! direction than the cell-centered electric components.

use std::{fmt, str::FromStr};

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldComponent {
    Ex,
    Ey,
    Ez,
    Hx,
    Hy,
    Hz,
}

impl FieldComponent {
    pub const ALL: [FieldComponent; 6] = [
        FieldComponent::Ex,
        FieldComponent::Ey,
        FieldComponent::Ez,
        FieldComponent::Hx,
        FieldComponent::Hy,
        FieldComponent::Hz,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ex => "Ex",
            Self::Ey => "Ey",
            Self::Ez => "Ez",
            Self::Hx => "Hx",
            Self::Hy => "Hy",
            Self::Hz => "Hz",
        }
    }
}

impl fmt::Display for FieldComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldComponent {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| SolverError::invalid(format!("unknown field component '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field2D {
    nx: usize,
    ny: usize,
    data: Vec<Complex64>,
}

impl Field2D {
    pub fn zeros(nx: usize, ny: usize) -> Self {
        Self {
            nx,
            ny,
            data: vec![Complex64::default(); nx * ny],
        }
    }

    pub fn from_vec(nx: usize, ny: usize, data: Vec<Complex64>) -> SolverResult<Self> {
        if data.len() != nx * ny {
            return Err(SolverError::invalid(format!(
                "field data has {} samples but a {nx}x{ny} grid needs {}",
                data.len(),
                nx * ny
            )));
        }
        Ok(Self { nx, ny, data })
    }

    /// Rebuilds a field from separately stored real and imaginary rows
    /// (`rows[iy][ix]`), the layout used by the cache record.
    pub fn from_parts(real: &[Vec<f64>], imag: &[Vec<f64>]) -> SolverResult<Self> {
        let ny = real.len();
        if imag.len() != ny {
            return Err(SolverError::corrupt(format!(
                "real part has {ny} rows but imaginary part has {}",
                imag.len()
            )));
        }
        let nx = real.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(nx * ny);
        for (iy, (re_row, im_row)) in real.iter().zip(imag).enumerate() {
            if re_row.len() != nx || im_row.len() != nx {
                return Err(SolverError::corrupt(format!(
                    "row {iy} has {}/{} entries, expected {nx}",
                    re_row.len(),
                    im_row.len()
                )));
            }
            data.extend(
                re_row
                    .iter()
                    .zip(im_row)
                    .map(|(&re, &im)| Complex64::new(re, im)),
            );
        }
        Ok(Self { nx, ny, data })
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn idx(&self, ix: usize, iy: usize) -> usize {
        iy * self.nx + ix
    }

    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Complex64] {
        &mut self.data
    }

    #[inline]
    pub fn get(&self, ix: usize, iy: usize) -> Complex64 {
        self.data[self.idx(ix, iy)]
    }

    #[inline]
    pub fn get_mut(&mut self, ix: usize, iy: usize) -> &mut Complex64 {
        let idx = self.idx(ix, iy);
        &mut self.data[idx]
    }

    /// Sum of squared magnitudes; insensitive to a global phase.
    pub fn energy(&self) -> f64 {
        self.data.iter().map(|v| v.norm_sqr()).sum()
    }

    pub fn real_rows(&self) -> Vec<Vec<f64>> {
        self.rows(|v| v.re)
    }

    pub fn imag_rows(&self) -> Vec<Vec<f64>> {
        self.rows(|v| v.im)
    }

    fn rows(&self, part: impl Fn(&Complex64) -> f64) -> Vec<Vec<f64>> {
        if self.nx == 0 {
            return vec![Vec::new(); self.ny];
        }
        self.data
            .chunks(self.nx)
            .map(|row| row.iter().map(&part).collect())
            .collect()
    }
}

impl From<Field2D> for Vec<Complex64> {
    fn from(field: Field2D) -> Self {
        field.data
    }
}
