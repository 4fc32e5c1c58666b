//! Refractive-index lookup for the layers of a waveguide.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Wavelength-dependent complex refractive index (`n + iκ`). Wavelengths are
/// in micrometres.
pub trait MaterialProvider: Send + Sync {
    fn name(&self) -> String;

    fn refractive_index(&self, wavelength_um: f64) -> Complex64;

    fn permittivity(&self, wavelength_um: f64) -> Complex64 {
        let n = self.refractive_index(wavelength_um);
        n * n
    }
}

/// Built-in materials. In configuration files a material is either a number
/// (constant index) or one of the names `"si"`, `"sio2"`, `"si3n4"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Material {
    Constant(f64),
    Named(NamedMaterial),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamedMaterial {
    /// Crystalline silicon, Sellmeier fit valid 1.2-14 µm.
    Si,
    /// Fused silica, Malitson (1965).
    Sio2,
    /// Stoichiometric LPCVD silicon nitride, Luke et al. (2015).
    Si3n4,
}

impl Material {
    pub const SI: Material = Material::Named(NamedMaterial::Si);
    pub const SIO2: Material = Material::Named(NamedMaterial::Sio2);
    pub const SI3N4: Material = Material::Named(NamedMaterial::Si3n4);
}

impl MaterialProvider for Material {
    fn name(&self) -> String {
        match self {
            Material::Constant(n) => format!("{n}"),
            Material::Named(NamedMaterial::Si) => "si".to_string(),
            Material::Named(NamedMaterial::Sio2) => "sio2".to_string(),
            Material::Named(NamedMaterial::Si3n4) => "si3n4".to_string(),
        }
    }

    fn refractive_index(&self, wavelength_um: f64) -> Complex64 {
        let l2 = wavelength_um * wavelength_um;
        let n2 = match self {
            Material::Constant(n) => return Complex64::new(*n, 0.0),
            Material::Named(NamedMaterial::Si) => {
                let l1 = 1.1071_f64 * 1.1071;
                11.6858 + 0.939_816 / l2 + 0.008_104_61 * l1 / (l2 - l1)
            }
            Material::Named(NamedMaterial::Sio2) => {
                1.0 + sellmeier(l2, 0.696_166_3, 0.068_404_3)
                    + sellmeier(l2, 0.407_942_6, 0.116_241_4)
                    + sellmeier(l2, 0.897_479_4, 9.896_161)
            }
            Material::Named(NamedMaterial::Si3n4) => {
                1.0 + sellmeier(l2, 3.0249, 0.135_340_6) + sellmeier(l2, 40314.0, 1239.842)
            }
        };
        Complex64::new(n2.max(0.0).sqrt(), 0.0)
    }
}

#[inline]
fn sellmeier(l2: f64, b: f64, c: f64) -> f64 {
    b * l2 / (l2 - c * c)
}
