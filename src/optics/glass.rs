//! Optical glasses described by their Sellmeier dispersion coefficients.

use std::sync::Arc;

/// Refractive index of air at visible wavelengths. Used whenever a ray travels
/// outside every solid.
pub const AIR_INDEX: f64 = 1.0003;

/// Step of the central difference used by [`GlassMaterial::dn_dlambda`], in nm.
const DERIVATIVE_STEP_NM: f64 = 0.1;

/// Fraunhofer lines used for the Abbe number, in nm.
const FRAUNHOFER_D: f64 = 587.56;
const FRAUNHOFER_F: f64 = 486.13;
const FRAUNHOFER_C: f64 = 656.27;

/// A transparent material. The index is always derived from the wavelength,
/// never stored, since every ray may carry a different wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct GlassMaterial {
    pub name: String,
    /// Sellmeier B coefficients (dimensionless).
    pub b: [f64; 3],
    /// Sellmeier C coefficients in µm².
    pub c: [f64; 3],
    /// Catalog index at the sodium d line, kept for diagnostics.
    pub nd: f64,
}

impl GlassMaterial {
    pub fn new(name: &str, b: [f64; 3], c: [f64; 3], nd: f64) -> GlassMaterial {
        GlassMaterial {
            name: name.to_string(),
            b,
            c,
            nd,
        }
    }

    pub fn bk7() -> GlassMaterial {
        GlassMaterial::new(
            "N-BK7",
            [1.03961212, 0.231792344, 1.01046945],
            [0.00600069867, 0.0200179144, 103.560653],
            1.5168,
        )
    }

    pub fn bak1() -> GlassMaterial {
        GlassMaterial::new(
            "N-BAK1",
            [1.12365662, 0.309276848, 0.881511957],
            [0.00644742752, 0.0222284402, 107.297751],
            1.5725,
        )
    }

    pub fn f2() -> GlassMaterial {
        GlassMaterial::new(
            "F2",
            [1.34533359, 0.209073176, 0.937357162],
            [0.00997743871, 0.0470450767, 111.886764],
            1.62004,
        )
    }

    pub fn sf10() -> GlassMaterial {
        GlassMaterial::new(
            "N-SF10",
            [1.62153902, 0.256287842, 1.64447552],
            [0.0122241457, 0.0595736775, 147.468793],
            1.72828,
        )
    }

    pub fn sf11() -> GlassMaterial {
        GlassMaterial::new(
            "N-SF11",
            [1.73759695, 0.313747346, 1.89878101],
            [0.013188707, 0.0623068142, 155.23629],
            1.78472,
        )
    }

    pub fn fused_silica() -> GlassMaterial {
        GlassMaterial::new(
            "Fused silica",
            [0.6961663, 0.4079426, 0.8974794],
            [0.00467914826, 0.0135120631, 97.9340025],
            1.4585,
        )
    }

    /// Every glass shipped with the engine.
    pub fn catalog() -> Vec<GlassMaterial> {
        vec![
            GlassMaterial::bk7(),
            GlassMaterial::bak1(),
            GlassMaterial::f2(),
            GlassMaterial::sf10(),
            GlassMaterial::sf11(),
            GlassMaterial::fused_silica(),
        ]
    }

    /// Looks a catalog glass up by a loose name: case, dashes and spaces are ignored,
    /// and the Schott "N-" prefix is optional (`bk7`, `N-BK7`, `fused_silica`).
    pub fn by_name(name: &str) -> Option<GlassMaterial> {
        let key = normalize_name(name);
        GlassMaterial::catalog().into_iter().find(|glass| {
            let full = normalize_name(&glass.name);
            full == key || full.strip_prefix('n') == Some(key.as_str())
        })
    }

    pub fn shared(self) -> Arc<GlassMaterial> {
        Arc::new(self)
    }

    /// Refractive index at `wavelength_nm` from the Sellmeier equation
    /// `n² = 1 + Σ Bᵢλ² / (λ² − Cᵢ)` with λ in micrometers.
    pub fn refractive_index(&self, wavelength_nm: f64) -> f64 {
        let lambda = wavelength_nm / 1000.0;
        let lambda2 = lambda * lambda;
        let n2 = 1.0
            + self
                .b
                .iter()
                .zip(self.c.iter())
                .map(|(b, c)| b * lambda2 / (lambda2 - c))
                .sum::<f64>();
        n2.sqrt()
    }

    /// Numerical derivative of the index per nanometer.
    pub fn dn_dlambda(&self, wavelength_nm: f64) -> f64 {
        let h = DERIVATIVE_STEP_NM;
        (self.refractive_index(wavelength_nm + h) - self.refractive_index(wavelength_nm - h))
            / (2.0 * h)
    }

    /// Abbe number `(n_d − 1) / (n_F − n_C)` computed from the Sellmeier fit.
    pub fn abbe_number(&self) -> f64 {
        (self.refractive_index(FRAUNHOFER_D) - 1.0)
            / (self.refractive_index(FRAUNHOFER_F) - self.refractive_index(FRAUNHOFER_C))
    }
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Index of the medium a ray travels in: the glass if any, otherwise air.
pub fn index_of(medium: Option<&GlassMaterial>, wavelength_nm: f64) -> f64 {
    medium.map_or(AIR_INDEX, |glass| glass.refractive_index(wavelength_nm))
}
