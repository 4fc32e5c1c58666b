//! Finite-difference eigenmode solver for dielectric waveguide cross-sections.

pub mod boundary;
pub mod cache;
pub mod classify;
pub mod eigensolver;
pub mod error;
pub mod export;
pub mod field;
pub mod geometry;
pub mod grid;
pub mod group_index;
pub mod io;
pub mod material;
pub mod metrics;
pub mod mode;
pub mod operator;
pub mod polarization;
pub mod recovery;
pub mod solver;
pub mod structure;
pub mod sweep;

#[cfg(test)]
mod _tests_geometry;
#[cfg(test)]
mod _tests_group_index;
#[cfg(test)]
mod _tests_io;
#[cfg(test)]
mod _tests_metrics;
#[cfg(test)]
mod _tests_solver;
