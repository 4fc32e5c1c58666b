//! Solved modes.
//!
//! A [`Mode`] is either a six-component vectorial mode or a single-component
//! semi-vectorial one; both expose effective index, label and fractions
//! through [`ModeProfile`]. A [`ModeSet`] keeps modes in canonical order
//! (non-increasing real effective index).

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::{
    classify::{Classification, classify_scalar, classify_vector},
    field::{Field2D, FieldComponent},
    polarization::{ModeType, SemiComponent},
    recovery::VectorFields,
};

/// Read-only view shared by both mode kinds.
pub trait ModeProfile {
    fn n_eff(&self) -> Complex64;
    fn classification(&self) -> &Classification;
    fn components(&self) -> Vec<FieldComponent>;
    fn field(&self, component: FieldComponent) -> Option<&Field2D>;

    fn mode_type(&self) -> ModeType {
        self.classification().mode_type
    }

    fn percentage(&self) -> f64 {
        self.classification().percentage
    }

    fn fraction_te(&self) -> f64 {
        self.classification().fraction_te
    }

    fn fraction_tm(&self) -> f64 {
        self.classification().fraction_tm
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorMode {
    n_eff: Complex64,
    fields: VectorFields,
    classification: Classification,
}

impl VectorMode {
    pub fn new(n_eff: Complex64, fields: VectorFields) -> Self {
        let classification = classify_vector(&fields);
        Self::with_classification(n_eff, fields, classification)
    }

    pub fn with_classification(
        n_eff: Complex64,
        fields: VectorFields,
        classification: Classification,
    ) -> Self {
        Self {
            n_eff,
            fields,
            classification,
        }
    }

    pub fn fields(&self) -> &VectorFields {
        &self.fields
    }
}

impl ModeProfile for VectorMode {
    fn n_eff(&self) -> Complex64 {
        self.n_eff
    }

    fn classification(&self) -> &Classification {
        &self.classification
    }

    fn components(&self) -> Vec<FieldComponent> {
        FieldComponent::ALL.to_vec()
    }

    fn field(&self, component: FieldComponent) -> Option<&Field2D> {
        let f = &self.fields;
        Some(match component {
            FieldComponent::Ex => &f.ex,
            FieldComponent::Ey => &f.ey,
            FieldComponent::Ez => &f.ez,
            FieldComponent::Hx => &f.hx,
            FieldComponent::Hy => &f.hy,
            FieldComponent::Hz => &f.hz,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarMode {
    n_eff: Complex64,
    component: SemiComponent,
    field: Field2D,
    classification: Classification,
}

impl ScalarMode {
    pub fn new(n_eff: Complex64, component: SemiComponent, field: Field2D) -> Self {
        let classification = classify_scalar(component);
        Self::with_classification(n_eff, component, field, classification)
    }

    pub fn with_classification(
        n_eff: Complex64,
        component: SemiComponent,
        field: Field2D,
        classification: Classification,
    ) -> Self {
        Self {
            n_eff,
            component,
            field,
            classification,
        }
    }

    pub fn component(&self) -> SemiComponent {
        self.component
    }

    pub fn primary(&self) -> &Field2D {
        &self.field
    }
}

impl ModeProfile for ScalarMode {
    fn n_eff(&self) -> Complex64 {
        self.n_eff
    }

    fn classification(&self) -> &Classification {
        &self.classification
    }

    fn components(&self) -> Vec<FieldComponent> {
        vec![field_component(self.component)]
    }

    fn field(&self, component: FieldComponent) -> Option<&Field2D> {
        (component == field_component(self.component)).then_some(&self.field)
    }
}

pub(crate) fn field_component(component: SemiComponent) -> FieldComponent {
    match component {
        SemiComponent::Ex => FieldComponent::Ex,
        SemiComponent::Ey => FieldComponent::Ey,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Vector(VectorMode),
    Scalar(ScalarMode),
}

impl ModeProfile for Mode {
    fn n_eff(&self) -> Complex64 {
        match self {
            Mode::Vector(m) => m.n_eff(),
            Mode::Scalar(m) => m.n_eff(),
        }
    }

    fn classification(&self) -> &Classification {
        match self {
            Mode::Vector(m) => m.classification(),
            Mode::Scalar(m) => m.classification(),
        }
    }

    fn components(&self) -> Vec<FieldComponent> {
        match self {
            Mode::Vector(m) => m.components(),
            Mode::Scalar(m) => m.components(),
        }
    }

    fn field(&self, component: FieldComponent) -> Option<&Field2D> {
        match self {
            Mode::Vector(m) => m.field(component),
            Mode::Scalar(m) => m.field(component),
        }
    }
}

/// Which discretization produced a mode set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverMethod {
    Vectorial,
    SemiVectorial,
}

impl SolverMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vectorial => "vectorial",
            Self::SemiVectorial => "semi_vectorial",
        }
    }
}

impl Default for SolverMethod {
    fn default() -> Self {
        Self::Vectorial
    }
}

/// Ordered result of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeSet {
    pub method: SolverMethod,
    pub wavelength: f64,
    modes: Vec<Mode>,
}

impl ModeSet {
    /// Sorts `modes` into canonical order. The sort is stable, so modes with
    /// equal real effective index keep their solver order.
    pub fn new(method: SolverMethod, wavelength: f64, mut modes: Vec<Mode>) -> Self {
        modes.sort_by(|a, b| b.n_eff().re.total_cmp(&a.n_eff().re));
        Self {
            method,
            wavelength,
            modes,
        }
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Mode> {
        self.modes.get(idx)
    }

    pub fn n_effs(&self) -> Vec<Complex64> {
        self.modes.iter().map(ModeProfile::n_eff).collect()
    }

    pub fn mode_types(&self) -> Vec<(ModeType, f64)> {
        self.modes
            .iter()
            .map(|m| (m.mode_type(), m.percentage()))
            .collect()
    }

    pub fn fraction_te(&self) -> Vec<f64> {
        self.modes.iter().map(ModeProfile::fraction_te).collect()
    }

    pub fn fraction_tm(&self) -> Vec<f64> {
        self.modes.iter().map(ModeProfile::fraction_tm).collect()
    }

    /// Effective indices of the modes labelled quasi-TE, in canonical order.
    pub fn n_effs_te(&self) -> Vec<Complex64> {
        self.n_effs_of(ModeType::QuasiTe)
    }

    pub fn n_effs_tm(&self) -> Vec<Complex64> {
        self.n_effs_of(ModeType::QuasiTm)
    }

    fn n_effs_of(&self, kind: ModeType) -> Vec<Complex64> {
        self.modes
            .iter()
            .filter(|m| m.mode_type() == kind)
            .map(ModeProfile::n_eff)
            .collect()
    }
}

impl<'a> IntoIterator for &'a ModeSet {
    type Item = &'a Mode;
    type IntoIter = std::slice::Iter<'a, Mode>;

    fn into_iter(self) -> Self::IntoIter {
        self.modes.iter()
    }
}
