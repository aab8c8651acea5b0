//! Wavelength-aware ray tracing through refractive prisms, opaque walls and a
//! backdrop plane.

pub mod optics;
