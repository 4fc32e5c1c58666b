//! Small dense complex eigenproblems (the projected Krylov matrix).
//!
//! The complex Schur form `A = Q T Q^H` comes from [`nalgebra::Schur`];
//! eigenvectors of the triangular factor follow by back substitution and are
//! mapped back through `Q`. Input matrices are flat row-major `m x m`.

use nalgebra::{DMatrix, DVector, Schur};
use num_complex::Complex64;

const EPS: f64 = f64::EPSILON;
const TINY: f64 = 1e-300;
const SWEEPS_PER_ROW: usize = 100;

#[derive(Debug, Clone)]
pub struct DenseEigen {
    pub values: Vec<Complex64>,
    /// Unit-norm eigenvectors, `vectors[i]` paired with `values[i]`.
    pub vectors: Vec<Vec<Complex64>>,
}

/// Returns `None` when the Schur iteration exceeds its budget.
pub fn eig(matrix: &[Complex64], m: usize) -> Option<DenseEigen> {
    debug_assert_eq!(matrix.len(), m * m);
    if m == 0 {
        return Some(DenseEigen {
            values: Vec::new(),
            vectors: Vec::new(),
        });
    }
    let a = DMatrix::from_row_slice(m, m, matrix);
    let schur = Schur::try_new(a, EPS, SWEEPS_PER_ROW * m)?;
    let values = schur.eigenvalues()?;
    let (q, t) = schur.unpack();
    Some(triangular_eigenvectors(&t, &q, values.as_slice()))
}

fn triangular_eigenvectors(
    t: &DMatrix<Complex64>,
    q: &DMatrix<Complex64>,
    values: &[Complex64],
) -> DenseEigen {
    let m = values.len();
    let scale = t.iter().map(|v| v.norm()).fold(0.0_f64, f64::max).max(TINY);
    let mut vectors = Vec::with_capacity(m);
    for (i, &lambda) in values.iter().enumerate() {
        let mut x = DVector::<Complex64>::zeros(m);
        x[i] = Complex64::new(1.0, 0.0);
        for r in (0..i).rev() {
            let s: Complex64 = (r + 1..=i).map(|c| t[(r, c)] * x[c]).sum();
            let mut d = t[(r, r)] - lambda;
            if d.norm() < EPS * scale {
                d = Complex64::new(EPS * scale, 0.0);
            }
            x[r] = -s / d;
        }
        let mut y = q * x;
        let yn = y.norm().max(TINY);
        y.unscale_mut(yn);
        vectors.push(y.as_slice().to_vec());
    }
    DenseEigen {
        values: values.to_vec(),
        vectors,
    }
}
