//! Vector kernels used by the Krylov iteration: inner products, classical
//! Gram-Schmidt with one reorthogonalization pass, and phase normalization of
//! converged eigenvectors.
//!
//! Classical Gram-Schmidt loses orthogonality once the new direction is nearly
//! contained in the basis. Running the projection twice ("twice is enough")
//! restores it to working precision without the cost of a QR factorization.

use nalgebra::{DVectorView, DVectorViewMut};
use num_complex::Complex64;

// ============================================================================
// Inner Products
// ============================================================================

/// `<x, y> = Σ conj(x_i) y_i`.
#[inline]
pub fn dot(x: &[Complex64], y: &[Complex64]) -> Complex64 {
    view(x).dotc(&view(y))
}

#[inline]
pub fn norm(x: &[Complex64]) -> f64 {
    view(x).norm()
}

/// `y <- y + alpha x`.
#[inline]
pub fn axpy(alpha: Complex64, x: &[Complex64], y: &mut [Complex64]) {
    let n = y.len();
    DVectorViewMut::from_slice(y, n).axpy(alpha, &view(x), Complex64::new(1.0, 0.0));
}

pub fn scale(alpha: f64, x: &mut [Complex64]) {
    let n = x.len();
    DVectorViewMut::from_slice(x, n).scale_mut(alpha);
}

fn view(x: &[Complex64]) -> DVectorView<'_, Complex64> {
    DVectorView::from_slice(x, x.len())
}

// ============================================================================
// Orthogonalization
// ============================================================================

/// Removes the components of `w` along each (orthonormal) basis vector, twice.
///
/// # Arguments
/// * `basis` - Orthonormal vectors to project out
/// * `w` - The vector to orthogonalize (modified in-place)
/// * `coeffs` - If given, accumulates the projection coefficients; must hold
///   at least `basis.len()` entries
pub fn orthogonalize(
    basis: &[Vec<Complex64>],
    w: &mut [Complex64],
    mut coeffs: Option<&mut [Complex64]>,
) {
    for _ in 0..2 {
        for (i, v) in basis.iter().enumerate() {
            let h = dot(v, w);
            if let Some(c) = coeffs.as_deref_mut() {
                c[i] += h;
            }
            axpy(-h, v, w);
        }
    }
}

/// Normalizes `x` to unit length in-place.
///
/// # Returns
/// The norm before scaling, or `None` (leaving `x` untouched) if it was below
/// `threshold`.
pub fn normalize(x: &mut [Complex64], threshold: f64) -> Option<f64> {
    let n = norm(x);
    if n <= threshold {
        return None;
    }
    scale(1.0 / n, x);
    Some(n)
}

// ============================================================================
// Phase Normalization
// ============================================================================

/// Rotates `x` by a global phase so its largest-magnitude entry is real and
/// positive.
pub fn fix_phase(x: &mut [Complex64]) {
    let pivot = x
        .iter()
        .copied()
        .max_by(|a, b| a.norm_sqr().total_cmp(&b.norm_sqr()));
    if let Some(p) = pivot {
        let mag = p.norm();
        if mag > 0.0 {
            let rot = p.conj() / mag;
            for v in x.iter_mut() {
                *v *= rot;
            }
        }
    }
}
