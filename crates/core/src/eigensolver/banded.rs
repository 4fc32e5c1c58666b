//! Banded LU factorization with partial pivoting.
//!
//! Storage follows the LAPACK `gbtrf` layout transposed to row-major: row `r`
//! keeps columns `r - kl ..= r + kl + ku`, the extra `kl` superdiagonals
//! absorbing fill-in from row interchanges.

use num_complex::Complex64;

use crate::{
    error::{SolverError, SolverResult},
    operator::{LinearOperator, SparseOperator},
};

#[derive(Debug, Clone)]
pub struct BandedLu {
    n: usize,
    kl: usize,
    ku: usize,
    width: usize,
    ab: Vec<Complex64>,
    pivots: Vec<usize>,
}

impl BandedLu {
    /// Factors `A - shift·I`.
    pub fn factor(matrix: &SparseOperator, shift: Complex64) -> SolverResult<Self> {
        let n = matrix.dim();
        let (kl, ku) = matrix.bandwidth();
        let width = 2 * kl + ku + 1;
        let mut lu = Self {
            n,
            kl,
            ku,
            width,
            ab: vec![Complex64::default(); n * width],
            pivots: vec![0; n],
        };
        for r in 0..n {
            for (c, v) in matrix.row(r) {
                let at = lu.at(r, c);
                lu.ab[at] += v;
            }
            let diag = lu.at(r, r);
            lu.ab[diag] -= shift;
        }

        for k in 0..n {
            let last = (k + kl).min(n - 1);
            let mut pivot = k;
            let mut best = lu.ab[lu.at(k, k)].norm();
            for i in k + 1..=last {
                let v = lu.ab[lu.at(i, k)].norm();
                if v > best {
                    best = v;
                    pivot = i;
                }
            }
            if best == 0.0 {
                return Err(SolverError::invalid(format!(
                    "shifted operator is singular at row {k}; the shift coincides with an eigenvalue"
                )));
            }
            lu.pivots[k] = pivot;
            let jmax = (k + kl + ku).min(n - 1);
            if pivot != k {
                for j in k..=jmax {
                    let (a, b) = (lu.at(k, j), lu.at(pivot, j));
                    lu.ab.swap(a, b);
                }
            }
            let pv = lu.ab[lu.at(k, k)];
            let row_k = lu.at(k, k) - k;
            for i in k + 1..=last {
                let base = lu.at(i, i) - i;
                let l = lu.ab[base + k] / pv;
                lu.ab[base + k] = l;
                if l == Complex64::default() {
                    continue;
                }
                for j in k + 1..=jmax {
                    let u = lu.ab[row_k + j];
                    lu.ab[base + j] -= l * u;
                }
            }
        }
        Ok(lu)
    }

    /// Position of `(r, c)` in the band storage; valid for
    /// `r - kl <= c <= r + kl + ku`.
    #[inline]
    fn at(&self, r: usize, c: usize) -> usize {
        r * self.width + self.kl + c - r
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    /// Solves `(A - shift·I) x = b` in place.
    pub fn solve_in_place(&self, b: &mut [Complex64]) {
        let (n, kl, ku) = (self.n, self.kl, self.ku);
        for k in 0..n {
            let p = self.pivots[k];
            if p != k {
                b.swap(k, p);
            }
            let bk = b[k];
            if bk == Complex64::default() {
                continue;
            }
            for i in k + 1..=(k + kl).min(n - 1) {
                b[i] -= self.ab[self.at(i, k)] * bk;
            }
        }
        for i in (0..n).rev() {
            let mut acc = b[i];
            for j in i + 1..=(i + kl + ku).min(n - 1) {
                acc -= self.ab[self.at(i, j)] * b[j];
            }
            b[i] = acc / self.ab[self.at(i, i)];
        }
    }
}
