//! Boundary-condition symbols for the four domain edges.
//!
//! Written as a four-character string in north, south, east, west order,
//! e.g. `"000A"`:
//!
//! - `A`: Hx antisymmetric and Hy symmetric across the edge (for the scalar
//!   solver, the field flips sign across the edge)
//! - `S`: Hx symmetric and Hy antisymmetric (scalar field mirrored)
//! - `0`: fields vanish immediately outside the edge

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::SolverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundarySymbol {
    Antisymmetric,
    Symmetric,
    Zero,
}

impl BoundarySymbol {
    /// Sign applied to the ghost-point coefficient folded back into the domain.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Self::Symmetric => 1.0,
            Self::Antisymmetric => -1.0,
            Self::Zero => 0.0,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Antisymmetric => 'A',
            Self::Symmetric => 'S',
            Self::Zero => '0',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Self::Antisymmetric),
            'S' => Some(Self::Symmetric),
            '0' => Some(Self::Zero),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoundaryConditions {
    pub north: BoundarySymbol,
    pub south: BoundarySymbol,
    pub east: BoundarySymbol,
    pub west: BoundarySymbol,
}

impl BoundaryConditions {
    pub const fn new(
        north: BoundarySymbol,
        south: BoundarySymbol,
        east: BoundarySymbol,
        west: BoundarySymbol,
    ) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    pub const fn zero() -> Self {
        Self::new(
            BoundarySymbol::Zero,
            BoundarySymbol::Zero,
            BoundarySymbol::Zero,
            BoundarySymbol::Zero,
        )
    }
}

impl Default for BoundaryConditions {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for BoundaryConditions {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let symbols: Vec<BoundarySymbol> = s
            .chars()
            .map(BoundarySymbol::from_char)
            .collect::<Option<_>>()
            .ok_or_else(|| {
                SolverError::invalid(format!(
                    "boundary '{s}' may only contain the symbols A, S and 0"
                ))
            })?;
        match symbols.as_slice() {
            [n, s, e, w] => Ok(Self::new(*n, *s, *e, *w)),
            _ => Err(SolverError::invalid(format!(
                "boundary '{s}' must have exactly four symbols (north, south, east, west)"
            ))),
        }
    }
}

impl TryFrom<String> for BoundaryConditions {
    type Error = SolverError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BoundaryConditions> for String {
    fn from(value: BoundaryConditions) -> Self {
        value.to_string()
    }
}

impl fmt::Display for BoundaryConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sym in [self.north, self.south, self.east, self.west] {
            write!(f, "{}", sym.as_char())?;
        }
        Ok(())
    }
}
