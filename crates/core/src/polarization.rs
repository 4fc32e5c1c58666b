//! Polarization markers: the scalar component solved by the semi-vectorial
//! method and the quasi-TE / quasi-TM labels attached to solved modes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Field component solved for by the semi-vectorial method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemiComponent {
    /// Quasi-TE: Ex dominant.
    Ex,
    /// Quasi-TM: Ey dominant.
    Ey,
}

impl Default for SemiComponent {
    fn default() -> Self {
        Self::Ex
    }
}

impl fmt::Display for SemiComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ex => f.write_str("Ex"),
            Self::Ey => f.write_str("Ey"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModeType {
    #[serde(rename = "qTE")]
    QuasiTe,
    #[serde(rename = "qTM")]
    QuasiTm,
    #[serde(rename = "qTE/qTM")]
    Mixed,
}

impl ModeType {
    pub fn label(self) -> &'static str {
        match self {
            Self::QuasiTe => "qTE",
            Self::QuasiTm => "qTM",
            Self::Mixed => "qTE/qTM",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "qTE" => Some(Self::QuasiTe),
            "qTM" => Some(Self::QuasiTm),
            "qTE/qTM" => Some(Self::Mixed),
            _ => None,
        }
    }
}

impl fmt::Display for ModeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
