use super::math::{Box3, Vec3};

/// Limits and tolerances of a trace pass. Plain values supplied by the caller;
/// the engine never persists them.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceConfig {
    /// Scene-level bounces (solid traversals) per ray.
    pub max_bounces: usize,
    /// Rays dimmer than this stop being traced.
    pub min_intensity: f64,
    /// Rays whose origin leaves this box are terminated as escaped.
    pub bounds: Box3,
    /// Raycasts performed inside a single solid per entry.
    pub max_solid_bounces: usize,
    /// Total internal reflections allowed per solid entry before the ray is trapped.
    pub max_tir: usize,
    /// Fraction of intensity lost at each total internal reflection.
    pub tir_loss: f64,
    /// Minimum hit distance accepted by the geometric raycasts.
    pub hit_epsilon: f64,
    /// How far past an interface a refracted or reflected ray restarts.
    pub surface_offset: f64,
    /// Hard cap on the number of rays a batch may trace, branches included.
    pub max_rays: usize,
    /// Trace the Fresnel-reflected part of every refraction as its own ray.
    pub trace_partial_reflections: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        TraceConfig {
            max_bounces: 16,
            min_intensity: 0.01,
            bounds: Box3::new(Vec3::zero(), Vec3::splat(100.0)),
            max_solid_bounces: 16,
            max_tir: 6,
            tir_loss: 0.01,
            hit_epsilon: 0.001,
            surface_offset: 0.05,
            max_rays: 5000,
            trace_partial_reflections: false,
        }
    }
}

impl TraceConfig {
    pub fn with_max_bounces(mut self, max_bounces: usize) -> Self {
        self.max_bounces = max_bounces;
        self
    }

    pub fn with_min_intensity(mut self, min_intensity: f64) -> Self {
        self.min_intensity = min_intensity;
        self
    }

    pub fn with_bounds(mut self, bounds: Box3) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_max_tir(mut self, max_tir: usize) -> Self {
        self.max_tir = max_tir;
        self
    }

    pub fn with_max_rays(mut self, max_rays: usize) -> Self {
        self.max_rays = max_rays;
        self
    }

    pub fn with_partial_reflections(mut self, enabled: bool) -> Self {
        self.trace_partial_reflections = enabled;
        self
    }
}
