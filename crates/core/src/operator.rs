//! Finite-difference operators for the transverse mode problem.
//!
//! Two discretizations are provided:
//!
//! - [`assemble_vectorial`]: the fully-vectorial H-field formulation. Hx and
//!   Hy live on grid nodes and are coupled through cross-derivative terms
//!   that carry the interface conditions between neighbouring cells. The
//!   unknown vector interleaves `(Hx, Hy)` per node.
//! - [`assemble_semi`]: a single cell-centered E component (Ex or Ey) with
//!   the interface-aware second derivative applied along that component.
//!
//! In both cases the eigenvalue of the operator is `β² = (k0 · n_eff)²`.
//! Nodes or cells are numbered with the shorter axis running fastest so the
//! matrix bandwidth stays as small as possible for the banded factorization.

use std::time::Instant;

use log::debug;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use num_complex::Complex64;

use crate::{
    boundary::BoundaryConditions,
    error::SolverResult,
    polarization::SemiComponent,
    structure::Structure,
};

pub trait LinearOperator {
    fn dim(&self) -> usize;
    fn apply(&self, input: &[Complex64], output: &mut [Complex64]);
}

/// Maps 2-D positions onto the flattened unknown vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridOrdering {
    pub nx: usize,
    pub ny: usize,
    y_fast: bool,
}

impl GridOrdering {
    pub fn new(nx: usize, ny: usize) -> Self {
        Self {
            nx,
            ny,
            y_fast: ny <= nx,
        }
    }

    #[inline]
    pub fn index(&self, ix: usize, iy: usize) -> usize {
        if self.y_fast {
            ix * self.ny + iy
        } else {
            iy * self.nx + ix
        }
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Interleaves row-major per-point samples (one slice per stored
    /// component) into an unknown vector in this ordering.
    pub fn gather(&self, fields: &[&[Complex64]]) -> Vec<Complex64> {
        let comps = fields.len();
        let mut out = vec![Complex64::default(); self.len() * comps];
        for iy in 0..self.ny {
            for ix in 0..self.nx {
                let p = self.index(ix, iy);
                for (c, field) in fields.iter().enumerate() {
                    out[comps * p + c] = field[iy * self.nx + ix];
                }
            }
        }
        out
    }
}

/// Compressed sparse row matrix with its lower/upper bandwidth recorded.
#[derive(Debug, Clone)]
pub struct SparseOperator {
    matrix: CsrMatrix<Complex64>,
    lower: usize,
    upper: usize,
}

impl SparseOperator {
    /// Builds the matrix from `(row, col, value)` triplets. Duplicate positions
    /// are summed and exact zeros dropped.
    pub fn from_triplets(dim: usize, triplets: Vec<(usize, usize, Complex64)>) -> Self {
        let mut coo = CooMatrix::new(dim, dim);
        for (r, c, v) in triplets {
            coo.push(r, c, v);
        }
        let matrix = CsrMatrix::from(&coo).filter(|_, _, v| *v != Complex64::default());
        let (lower, upper) = matrix
            .triplet_iter()
            .fold((0usize, 0usize), |(lo, up), (r, c, _)| {
                (lo.max(r.saturating_sub(c)), up.max(c.saturating_sub(r)))
            });
        Self {
            matrix,
            lower,
            upper,
        }
    }

    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// `(lower, upper)` bandwidth: the largest `row - col` and `col - row`
    /// over stored entries.
    pub fn bandwidth(&self) -> (usize, usize) {
        (self.lower, self.upper)
    }

    pub fn row(&self, r: usize) -> impl Iterator<Item = (usize, Complex64)> + '_ {
        let offsets = self.matrix.row_offsets();
        let span = offsets[r]..offsets[r + 1];
        self.matrix.col_indices()[span.clone()]
            .iter()
            .copied()
            .zip(self.matrix.values()[span].iter().copied())
    }

    pub fn get(&self, r: usize, c: usize) -> Complex64 {
        self.matrix
            .get_entry(r, c)
            .map_or(Complex64::default(), |entry| entry.into_value())
    }
}

impl LinearOperator for SparseOperator {
    fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    fn apply(&self, input: &[Complex64], output: &mut [Complex64]) {
        let x = DVector::from_column_slice(input);
        let y = &self.matrix * &x;
        output.copy_from_slice(y.as_slice());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Vectorial,
    Semi(SemiComponent),
}

/// An assembled operator together with the layout of its unknowns.
#[derive(Debug, Clone)]
pub struct FdOperator {
    pub kind: OperatorKind,
    pub matrix: SparseOperator,
    /// Node ordering for the vectorial operator, cell ordering otherwise.
    pub ordering: GridOrdering,
}

impl FdOperator {
    /// Number of unknowns stored per grid point.
    pub fn components(&self) -> usize {
        match self.kind {
            OperatorKind::Vectorial => 2,
            OperatorKind::Semi(_) => 1,
        }
    }

    pub fn dim(&self) -> usize {
        self.matrix.dim()
    }
}

/// Fully-vectorial H-field operator on the `(nx + 1) x (ny + 1)` node grid.
pub fn assemble_vectorial(
    structure: &Structure,
    boundary: BoundaryConditions,
) -> SolverResult<FdOperator> {
    let start = Instant::now();
    let grid = structure.grid();
    let (nx, ny) = (grid.nx(), grid.ny());
    let ordering = GridOrdering::new(nx + 1, ny + 1);
    let k2 = structure.k0().powi(2);
    let mut triplets = Vec::with_capacity(ordering.len() * 20);

    for i in 0..=nx {
        let (ii, w, e) = (i as isize, grid.dx_at(i as isize - 1), grid.dx_at(i as isize));
        for j in 0..=ny {
            let (jj, s, n) = (j as isize, grid.dy_at(j as isize - 1), grid.dy_at(j as isize));
            // e1..e4: cells to the NW, SW, SE and NE of the node.
            let e1 = structure.eps_clamped(ii - 1, jj);
            let e2 = structure.eps_clamped(ii - 1, jj - 1);
            let e3 = structure.eps_clamped(ii, jj - 1);
            let e4 = structure.eps_clamped(ii, jj);

            let ns21 = n * e2 + s * e1;
            let ns34 = n * e3 + s * e4;
            let ew14 = e * e1 + w * e4;
            let ew23 = e * e2 + w * e3;

            let mut axxn = (2.0 * e * e3 / ns34 + 2.0 * w * e2 / ns21) / (n * (e + w));
            let mut axxs = (2.0 * e * e4 / ns34 + 2.0 * w * e1 / ns21) / (s * (e + w));
            let mut ayye = (2.0 * n * e1 / ew14 + 2.0 * s * e2 / ew23) / (e * (n + s));
            let mut ayyw = (2.0 * n * e4 / ew14 + 2.0 * s * e3 / ew23) / (w * (n + s));
            let mut axxe = Complex64::from(2.0 / (e * (e + w)));
            let mut axxw = Complex64::from(2.0 / (w * (e + w)));
            let mut ayyn = Complex64::from(2.0 / (n * (n + s)));
            let mut ayys = Complex64::from(2.0 / (s * (n + s)));

            let axxp = -axxn - axxs - axxe - axxw
                + k2 * (n + s) * (e4 * e3 * e / ns34 + e1 * e2 * w / ns21) / (e + w);
            let ayyp = -ayyn - ayys - ayye - ayyw
                + k2 * (e + w) * (e1 * e4 * n / ew14 + e2 * e3 * s / ew23) / (n + s);

            let d = e2 * e4 - e1 * e3;
            let mut axyn = (e3 / ns34 - e2 / ns21 + s * d / (ns21 * ns34)) / (e + w);
            let mut axys = (e1 / ns21 - e4 / ns34 + n * d / (ns21 * ns34)) / (e + w);
            let mut ayxe = (e1 / ew14 - e2 / ew23 + w * d / (ew23 * ew14)) / (n + s);
            let mut ayxw = (e3 / ew23 - e4 / ew14 + e * d / (ew23 * ew14)) / (n + s);
            let mut axye = (e4 - e3) / (ns34 * (e + w))
                - 2.0 * (e2 - e1) * w * w / (ns21 * e * (e + w).powi(2));
            let mut axyw = (e2 - e1) / (ns21 * (e + w))
                - 2.0 * (e4 - e3) * e * e / (ns34 * w * (e + w).powi(2));
            let mut ayxn = (e4 - e1) / (ew14 * (n + s))
                - 2.0 * (e2 - e3) * s * s / (ew23 * n * (n + s).powi(2));
            let mut ayxs = (e2 - e3) / (ew23 * (n + s))
                - 2.0 * (e4 - e1) * n * n / (ew14 * s * (n + s).powi(2));

            let axyp = -(axyn + axys + axye + axyw);
            let ayxp = -(ayxn + ayxs + ayxe + ayxw);

            // Fold ghost-node coefficients back into the domain. Hx and Hy have
            // opposite parity across each edge.
            if j == ny {
                let sg = boundary.north.sign();
                axxs += sg * axxn;
                ayxs += sg * ayxn;
                ayys -= sg * ayyn;
                axys -= sg * axyn;
            }
            if j == 0 {
                let sg = boundary.south.sign();
                axxn += sg * axxs;
                ayxn += sg * ayxs;
                ayyn -= sg * ayys;
                axyn -= sg * axys;
            }
            if i == nx {
                let sg = boundary.east.sign();
                axxw += sg * axxe;
                ayxw += sg * ayxe;
                ayyw -= sg * ayye;
                axyw -= sg * axye;
            }
            if i == 0 {
                let sg = boundary.west.sign();
                axxe += sg * axxw;
                ayxe += sg * ayxw;
                ayye -= sg * ayyw;
                axye -= sg * axyw;
            }

            let p = ordering.index(i, j);
            let mut push = |q: usize, xx: Complex64, xy: Complex64, yy: Complex64, yx: Complex64| {
                triplets.push((2 * p, 2 * q, xx));
                triplets.push((2 * p, 2 * q + 1, xy));
                triplets.push((2 * p + 1, 2 * q + 1, yy));
                triplets.push((2 * p + 1, 2 * q, yx));
            };
            push(p, axxp, axyp, ayyp, ayxp);
            if i < nx {
                push(ordering.index(i + 1, j), axxe, axye, ayye, ayxe);
            }
            if i > 0 {
                push(ordering.index(i - 1, j), axxw, axyw, ayyw, ayxw);
            }
            if j < ny {
                push(ordering.index(i, j + 1), axxn, axyn, ayyn, ayxn);
            }
            if j > 0 {
                push(ordering.index(i, j - 1), axxs, axys, ayys, ayxs);
            }
        }
    }

    let matrix = SparseOperator::from_triplets(2 * ordering.len(), triplets);
    debug!(
        "[assemble] vectorial nodes={}x{} unknowns={} nnz={} bandwidth={:?} elapsed={:.2?}",
        ordering.nx,
        ordering.ny,
        matrix.dim(),
        matrix.nnz(),
        matrix.bandwidth(),
        start.elapsed()
    );
    Ok(FdOperator {
        kind: OperatorKind::Vectorial,
        matrix,
        ordering,
    })
}

/// Semi-vectorial operator for a single cell-centered E component.
pub fn assemble_semi(
    structure: &Structure,
    boundary: BoundaryConditions,
    component: SemiComponent,
) -> SolverResult<FdOperator> {
    let start = Instant::now();
    let grid = structure.grid();
    let (nx, ny) = (grid.nx(), grid.ny());
    let ordering = GridOrdering::new(nx, ny);
    let k2 = structure.k0().powi(2);
    let mut triplets = Vec::with_capacity(ordering.len() * 5);

    for i in 0..nx {
        let ii = i as isize;
        let p = grid.dx[i];
        // Center-to-center distances to the neighbouring cells.
        let e = 0.5 * (grid.dx_at(ii + 1) + p);
        let w = 0.5 * (grid.dx_at(ii - 1) + p);
        for j in 0..ny {
            let jj = j as isize;
            let q = grid.dy[j];
            let n = 0.5 * (grid.dy_at(jj + 1) + q);
            let s = 0.5 * (grid.dy_at(jj - 1) + q);

            let ep = structure.eps(i, j);
            let en = structure.eps_clamped(ii, jj + 1);
            let es = structure.eps_clamped(ii, jj - 1);
            let ee = structure.eps_clamped(ii + 1, jj);
            let ew = structure.eps_clamped(ii - 1, jj);

            let (an, as_, ae, aw, mut ap) = match component {
                SemiComponent::Ex => {
                    let an = Complex64::from(2.0 / n / (n + s));
                    let as_ = Complex64::from(2.0 / s / (n + s));
                    let denom = (p * (ep - ee) + 2.0 * e * ee)
                        * (p * p * (ep - ew) + 4.0 * w * w * ew)
                        + (p * (ep - ew) + 2.0 * w * ew) * (p * p * (ep - ee) + 4.0 * e * e * ee);
                    let ae = 8.0 * (p * (ep - ew) + 2.0 * w * ew) * ee / denom;
                    let aw = 8.0 * (p * (ep - ee) + 2.0 * e * ee) * ew / denom;
                    let ap = ep * k2 - an - as_ - ae * ep / ee - aw * ep / ew;
                    (an, as_, ae, aw, ap)
                }
                SemiComponent::Ey => {
                    let denom = (q * (ep - en) + 2.0 * n * en)
                        * (q * q * (ep - es) + 4.0 * s * s * es)
                        + (q * (ep - es) + 2.0 * s * es) * (q * q * (ep - en) + 4.0 * n * n * en);
                    let an = 8.0 * (q * (ep - es) + 2.0 * s * es) * en / denom;
                    let as_ = 8.0 * (q * (ep - en) + 2.0 * n * en) * es / denom;
                    let ae = Complex64::from(2.0 / e / (e + w));
                    let aw = Complex64::from(2.0 / w / (e + w));
                    let ap = ep * k2 - an * ep / en - as_ * ep / es - ae - aw;
                    (an, as_, ae, aw, ap)
                }
            };

            if j == ny - 1 {
                ap += boundary.north.sign() * an;
            }
            if j == 0 {
                ap += boundary.south.sign() * as_;
            }
            if i == nx - 1 {
                ap += boundary.east.sign() * ae;
            }
            if i == 0 {
                ap += boundary.west.sign() * aw;
            }

            let r = ordering.index(i, j);
            triplets.push((r, r, ap));
            if i + 1 < nx {
                triplets.push((r, ordering.index(i + 1, j), ae));
            }
            if i > 0 {
                triplets.push((r, ordering.index(i - 1, j), aw));
            }
            if j + 1 < ny {
                triplets.push((r, ordering.index(i, j + 1), an));
            }
            if j > 0 {
                triplets.push((r, ordering.index(i, j - 1), as_));
            }
        }
    }

    let matrix = SparseOperator::from_triplets(ordering.len(), triplets);
    debug!(
        "[assemble] semi-vectorial {} cells={}x{} nnz={} bandwidth={:?} elapsed={:.2?}",
        component,
        nx,
        ny,
        matrix.nnz(),
        matrix.bandwidth(),
        start.elapsed()
    );
    Ok(FdOperator {
        kind: OperatorKind::Semi(component),
        matrix,
        ordering,
    })
}
