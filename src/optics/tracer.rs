//! Traces a ray through a single solid: entry, internal reflections, exit.

use log::{debug, trace};

use super::config::TraceConfig;
use super::math::{Ray, RayHit};
use super::physics::{attempt_tir_reflection, partial_reflection, refract_ray};
use super::solid::OpticalSolid;
use super::system::{HitKind, RaySegment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SolidState {
    Outside,
    Inside,
}

/// Why the solid tracer stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum SolidOutcome {
    /// The ray refracted out of the solid.
    Exited,
    /// The TIR limit was reached: `ray` is the internal ray about to be totally
    /// reflected again at `hit`.
    Trapped { ray: Ray, hit: RayHit },
    /// No surface in front of the ray, or refraction into the solid failed.
    Lost,
    /// `max_solid_bounces` raycasts without reaching an exit.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolidTrace {
    /// The transmitted ray leaving the solid, present only when the outcome is `Exited`.
    pub exit_ray: Option<Ray>,
    /// Fresnel reflections split off at the entry and exit faces. Always empty unless
    /// partial reflections are traced.
    pub reflected_rays: Vec<Ray>,
    /// Segments travelled inside the glass, for drawing.
    pub internal_segments: Vec<RaySegment>,
    pub outcome: SolidOutcome,
}

/// Follows `ray` through `solid` until it exits, is trapped by repeated total internal
/// reflection, or runs out of bounces.
///
/// Partial reflections never count as exits: a ray trapped inside still reports
/// `Trapped` even if its entry reflection left the solid.
///
/// The ray normally starts outside the solid. If its first hit is on the inside of a
/// face (the ray starts within the glass) it is traced as already inside.
pub fn trace_through_solid(ray: &Ray, solid: &OpticalSolid, config: &TraceConfig) -> SolidTrace {
    let glass = solid.glass.as_ref();
    let mut state = SolidState::Outside;
    let mut current = ray.clone();
    let mut exit_ray = None;
    let mut reflected_rays = Vec::new();
    let mut internal_segments = Vec::new();
    let mut tir_count = 0;
    let mut outcome = SolidOutcome::Exhausted;

    for bounce in 0..config.max_solid_bounces {
        let Some(hit) = solid.nearest_intersection(&current, config.hit_epsilon) else {
            outcome = SolidOutcome::Lost;
            break;
        };
        if state == SolidState::Outside && !hit.entering {
            state = SolidState::Inside;
        }
        trace!(
            "solid bounce {} {:?} at {:?}, intensity {:.4}",
            bounce,
            state,
            hit.point,
            current.intensity
        );

        match state {
            SolidState::Outside => {
                let offset = config.surface_offset;
                let Some(inside) = refract_ray(&current, &hit, None, Some(glass), offset) else {
                    // air into glass cannot totally reflect
                    outcome = SolidOutcome::Lost;
                    break;
                };
                if config.trace_partial_reflections {
                    let ghost = partial_reflection(&current, &hit, None, Some(glass), offset);
                    if ghost.intensity >= config.min_intensity {
                        reflected_rays.push(ghost);
                    }
                }
                current = inside;
                state = SolidState::Inside;
            }
            SolidState::Inside => {
                internal_segments.push(RaySegment {
                    start: current.origin,
                    end: hit.point,
                    ray: current.clone(),
                    hit: HitKind::Solid,
                });
                let offset = config.surface_offset;
                match refract_ray(&current, &hit, Some(glass), None, offset) {
                    Some(exit) => {
                        if config.trace_partial_reflections {
                            let ghost =
                                partial_reflection(&current, &hit, Some(glass), None, offset);
                            if ghost.intensity >= config.min_intensity {
                                reflected_rays.push(ghost);
                            }
                        }
                        exit_ray = Some(exit);
                        outcome = SolidOutcome::Exited;
                        break;
                    }
                    None if tir_count >= config.max_tir => {
                        outcome = SolidOutcome::Trapped { ray: current, hit };
                        break;
                    }
                    None => {
                        current = attempt_tir_reflection(&current, &hit, config.tir_loss, offset);
                        tir_count += 1;
                    }
                }
            }
        }
    }

    debug!(
        "solid trace ended {:?} after {} internal reflections, {} reflected rays",
        outcome,
        tir_count,
        reflected_rays.len()
    );
    SolidTrace {
        exit_ray,
        reflected_rays,
        internal_segments,
        outcome,
    }
}
