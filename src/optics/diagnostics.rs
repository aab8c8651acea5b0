//! Tabulated dispersion figures for a glass, useful when designing a puzzle.

use super::glass::{GlassMaterial, AIR_INDEX};
use super::physics::minimum_deviation;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispersionRow {
    pub wavelength: f64,
    pub index: f64,
    /// Per nanometer.
    pub dn_dlambda: f64,
    /// Minimum deviation in degrees for the given apex, in air. `None` when the
    /// apex is too steep for any ray of this wavelength to leave the prism.
    pub min_deviation: Option<f64>,
}

pub fn dispersion_table(
    glass: &GlassMaterial,
    apex_deg: f64,
    wavelengths: &[f64],
) -> Vec<DispersionRow> {
    let apex = apex_deg.to_radians();
    wavelengths
        .iter()
        .map(|&wavelength| {
            let index = glass.refractive_index(wavelength);
            DispersionRow {
                wavelength,
                index,
                dn_dlambda: glass.dn_dlambda(wavelength),
                min_deviation: minimum_deviation(index / AIR_INDEX, apex).map(f64::to_degrees),
            }
        })
        .collect()
}

/// Angle in degrees between the minimum-deviation exits of two wavelengths, if both
/// get through the prism.
pub fn angular_spread(
    glass: &GlassMaterial,
    apex_deg: f64,
    short_nm: f64,
    long_nm: f64,
) -> Option<f64> {
    let apex = apex_deg.to_radians();
    let deviation = |wavelength: f64| {
        minimum_deviation(glass.refractive_index(wavelength) / AIR_INDEX, apex)
    };
    let spread = deviation(short_nm)? - deviation(long_nm)?;
    Some(spread.abs().to_degrees())
}
