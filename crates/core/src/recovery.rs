//! Reconstruction of the full field set from a solved eigenvector.
//!
//! The vectorial solver yields Hx and Hy on grid nodes. With a propagation
//! factor `exp(-iβz)` the remaining components follow from `∇·H = 0` and
//! Ampère's law (in units where `∇×H = i k0 ε E`):
//!
//! ```text
//! Hz = (∂x Hx + ∂y Hy) / (iβ)
//! Ex = (∂y Hz + iβ Hy) / (i k0 ε)
//! Ey = (-iβ Hx - ∂x Hz) / (i k0 ε)
//! Ez = (∂x Hy - ∂y Hx) / (i k0 ε)
//! ```
//!
//! Hz and the E components are evaluated at cell centers; node quantities are
//! averaged or differenced over the four corners of each cell.

use num_complex::Complex64;

use crate::{
    field::Field2D,
    grid::clamp_index,
    operator::GridOrdering,
    structure::Structure,
};

/// All six components of a vectorial mode. H transverse components are
/// `(nx + 1) x (ny + 1)` node arrays, everything else `nx x ny`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFields {
    pub ex: Field2D,
    pub ey: Field2D,
    pub ez: Field2D,
    pub hx: Field2D,
    pub hy: Field2D,
    pub hz: Field2D,
}

impl VectorFields {
    pub fn e_fields(&self) -> [&Field2D; 3] {
        [&self.ex, &self.ey, &self.ez]
    }

    pub fn h_fields(&self) -> [&Field2D; 3] {
        [&self.hx, &self.hy, &self.hz]
    }
}

/// Splits an interleaved `(Hx, Hy)` eigenvector onto the node grid.
pub fn split_transverse_h(ordering: GridOrdering, vector: &[Complex64]) -> (Field2D, Field2D) {
    let mut hx = Field2D::zeros(ordering.nx, ordering.ny);
    let mut hy = Field2D::zeros(ordering.nx, ordering.ny);
    for iy in 0..ordering.ny {
        for ix in 0..ordering.nx {
            let p = ordering.index(ix, iy);
            *hx.get_mut(ix, iy) = vector[2 * p];
            *hy.get_mut(ix, iy) = vector[2 * p + 1];
        }
    }
    (hx, hy)
}

/// Reshapes a semi-vectorial eigenvector onto the cell grid.
pub fn scalar_field(ordering: GridOrdering, vector: &[Complex64]) -> Field2D {
    let mut field = Field2D::zeros(ordering.nx, ordering.ny);
    for iy in 0..ordering.ny {
        for ix in 0..ordering.nx {
            *field.get_mut(ix, iy) = vector[ordering.index(ix, iy)];
        }
    }
    field
}

pub fn recover_vector_fields(
    structure: &Structure,
    n_eff: Complex64,
    hx: Field2D,
    hy: Field2D,
) -> VectorFields {
    let grid = structure.grid();
    let (nx, ny) = (grid.nx(), grid.ny());
    debug_assert_eq!(hx.shape(), (nx + 1, ny + 1));
    let k0 = structure.k0();
    let beta = n_eff * k0;
    let i = Complex64::i();

    let mut hz = Field2D::zeros(nx, ny);
    let mut hx_c = Field2D::zeros(nx, ny);
    let mut hy_c = Field2D::zeros(nx, ny);
    let mut curl_z = Field2D::zeros(nx, ny);
    for iy in 0..ny {
        for ix in 0..nx {
            let (dx, dy) = (grid.dx[ix], grid.dy[iy]);
            let corners = |f: &Field2D| {
                (
                    f.get(ix, iy),
                    f.get(ix + 1, iy),
                    f.get(ix, iy + 1),
                    f.get(ix + 1, iy + 1),
                )
            };
            let (x00, x10, x01, x11) = corners(&hx);
            let (y00, y10, y01, y11) = corners(&hy);
            let dhx_dx = (x10 + x11 - x00 - x01) / (2.0 * dx);
            let dhx_dy = (x01 + x11 - x00 - x10) / (2.0 * dy);
            let dhy_dx = (y10 + y11 - y00 - y01) / (2.0 * dx);
            let dhy_dy = (y01 + y11 - y00 - y10) / (2.0 * dy);
            *hz.get_mut(ix, iy) = (dhx_dx + dhy_dy) / (i * beta);
            *hx_c.get_mut(ix, iy) = (x00 + x10 + x01 + x11) / 4.0;
            *hy_c.get_mut(ix, iy) = (y00 + y10 + y01 + y11) / 4.0;
            *curl_z.get_mut(ix, iy) = dhy_dx - dhx_dy;
        }
    }

    let xc = grid.x_centers();
    let yc = grid.y_centers();
    let mut ex = Field2D::zeros(nx, ny);
    let mut ey = Field2D::zeros(nx, ny);
    let mut ez = Field2D::zeros(nx, ny);
    for iy in 0..ny {
        let (s, n) = (clamp_index(iy as isize - 1, ny), clamp_index(iy as isize + 1, ny));
        for ix in 0..nx {
            let (w, e) = (clamp_index(ix as isize - 1, nx), clamp_index(ix as isize + 1, nx));
            let dhz_dx = centred(hz.get(e, iy), hz.get(w, iy), xc[e] - xc[w]);
            let dhz_dy = centred(hz.get(ix, n), hz.get(ix, s), yc[n] - yc[s]);
            let denom = i * k0 * structure.eps(ix, iy);
            *ex.get_mut(ix, iy) = (dhz_dy + i * beta * hy_c.get(ix, iy)) / denom;
            *ey.get_mut(ix, iy) = (-i * beta * hx_c.get(ix, iy) - dhz_dx) / denom;
            *ez.get_mut(ix, iy) = curl_z.get(ix, iy) / denom;
        }
    }

    VectorFields {
        ex,
        ey,
        ez,
        hx,
        hy,
        hz,
    }
}

#[inline]
fn centred(ahead: Complex64, behind: Complex64, span: f64) -> Complex64 {
    if span > 0.0 {
        (ahead - behind) / span
    } else {
        Complex64::default()
    }
}
