pub mod config;
pub mod diagnostics;
pub mod error;
pub mod glass;
pub mod math;
pub mod parser;
pub mod physics;
pub mod shapes;
pub mod solid;
pub mod spectrum;
pub mod system;
pub mod tracer;

pub use config::TraceConfig;
pub use glass::GlassMaterial;
pub use math::*;
pub use solid::{OpaqueBlocker, OpticalSolid, SolidKind};
pub use system::{
    backdrop_hits, trace, Backdrop, BackdropHit, HitKind, OpticalSystem, PathEnd, RayPath,
    RaySegment, SolidId, TraceOutcome,
};
