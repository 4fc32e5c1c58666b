//! Polarization classification of solved modes.
//!
//! Everything here works on squared magnitudes, so results do not depend on
//! the arbitrary global phase (or sign) of an eigenvector.

use serde::{Deserialize, Serialize};

use crate::{
    polarization::{ModeType, SemiComponent},
    recovery::VectorFields,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Share of the total energy per component in percent, summing to 100.
    /// Ordered `[Ex, Ey, Ez, Hx, Hy, Hz]` for vectorial modes and `[Ex, Ey]`
    /// for semi-vectorial ones.
    pub energy_percentages: Vec<f64>,
    /// `E_x / (E_x + E_y)`.
    pub fraction_te: f64,
    /// `E_y / (E_x + E_y)`.
    pub fraction_tm: f64,
    pub mode_type: ModeType,
    /// Share of the electric energy in the dominant component, in percent and
    /// rounded to two decimals.
    pub percentage: f64,
}

pub fn classify_vector(fields: &VectorFields) -> Classification {
    let e = fields.e_fields().map(|f| f.energy());
    let h = fields.h_fields().map(|f| f.energy());
    let total: f64 = e.iter().chain(&h).sum();
    let energy_percentages = e
        .iter()
        .chain(&h)
        .map(|v| if total > 0.0 { 100.0 * v / total } else { 0.0 })
        .collect();

    let (fraction_te, fraction_tm) = transverse_split(e[0], e[1]);

    // argmax over (Ex, Ey, Ez); the first maximum wins on ties.
    let e_total: f64 = e.iter().sum();
    let mut dominant = 0;
    for (idx, v) in e.iter().enumerate().skip(1) {
        if *v > e[dominant] {
            dominant = idx;
        }
    }
    let mode_type = match dominant {
        0 => ModeType::QuasiTe,
        1 => ModeType::QuasiTm,
        _ => ModeType::Mixed,
    };
    let percentage = if e_total > 0.0 {
        round2(100.0 * e[dominant] / e_total)
    } else {
        0.0
    };

    Classification {
        energy_percentages,
        fraction_te,
        fraction_tm,
        mode_type,
        percentage,
    }
}

/// A semi-vectorial mode carries a single E component by construction.
pub fn classify_scalar(component: SemiComponent) -> Classification {
    let (fraction_te, mode_type) = match component {
        SemiComponent::Ex => (1.0, ModeType::QuasiTe),
        SemiComponent::Ey => (0.0, ModeType::QuasiTm),
    };
    Classification {
        energy_percentages: vec![100.0 * fraction_te, 100.0 * (1.0 - fraction_te)],
        fraction_te,
        fraction_tm: 1.0 - fraction_te,
        mode_type,
        percentage: 100.0,
    }
}

fn transverse_split(ex: f64, ey: f64) -> (f64, f64) {
    let sum = ex + ey;
    if sum > 0.0 {
        let te = (ex / sum).clamp(0.0, 1.0);
        (te, 1.0 - te)
    } else {
        (0.5, 0.5)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
