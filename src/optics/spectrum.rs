//! Wavelength sampling of white light.

use std::ops::RangeInclusive;

use rand::Rng;

use super::math::{Ray, Vec3};

/// Visible band in nanometers.
pub const VISIBLE: RangeInclusive<f64> = 380.0..=780.0;

/// `count` evenly spaced wavelengths from `min` to `max`, both included.
/// A single sample sits in the middle of the band.
pub fn sample_wavelengths(count: usize, min: f64, max: f64) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![(min + max) / 2.0],
        _ => {
            let step = (max - min) / (count - 1) as f64;
            (0..count).map(|i| min + step * i as f64).collect()
        }
    }
}

/// One wavelength drawn uniformly from each of `count` equal sub-bands of
/// `[min, max)`, in increasing order.
pub fn jittered_wavelengths<R: Rng>(rng: &mut R, count: usize, min: f64, max: f64) -> Vec<f64> {
    let width = (max - min) / count.max(1) as f64;
    (0..count)
        .map(|i| min + width * (i as f64 + rng.gen::<f64>()))
        .collect()
}

/// A point source shining a pencil of white light along one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct LightSource {
    pub origin: Vec3,
    pub direction: Vec3,
    pub intensity: f64,
    pub wavelengths: Vec<f64>,
}

impl LightSource {
    /// White light sampled at `samples` evenly spaced visible wavelengths.
    pub fn white(origin: Vec3, direction: Vec3, samples: usize) -> LightSource {
        LightSource {
            origin,
            direction,
            intensity: 1.0,
            wavelengths: sample_wavelengths(samples, *VISIBLE.start(), *VISIBLE.end()),
        }
    }

    /// White light with one wavelength drawn at random from each of `samples` equal
    /// sub-bands of the visible range.
    pub fn jittered<R: Rng>(
        origin: Vec3,
        direction: Vec3,
        samples: usize,
        rng: &mut R,
    ) -> LightSource {
        LightSource {
            origin,
            direction,
            intensity: 1.0,
            wavelengths: jittered_wavelengths(rng, samples, *VISIBLE.start(), *VISIBLE.end()),
        }
    }

    pub fn monochromatic(
        origin: Vec3,
        direction: Vec3,
        wavelength: f64,
        intensity: f64,
    ) -> LightSource {
        LightSource {
            origin,
            direction,
            intensity,
            wavelengths: vec![wavelength],
        }
    }

    /// One ray per wavelength, all with the source intensity.
    pub fn emit(&self) -> Vec<Ray> {
        self.wavelengths
            .iter()
            .map(|&wavelength| {
                Ray::new(self.origin, self.direction, wavelength, self.intensity)
            })
            .collect()
    }
}
