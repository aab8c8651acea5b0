//! Scene-level tracing: nearest hit across every element, solid dispatch, branching
//! and path termination.

use std::collections::VecDeque;

use log::{debug, trace, warn};

use super::config::TraceConfig;
use super::math::{Plane, Ray, RayHit, Vec3};
use super::physics::{attempt_tir_reflection, refract_ray};
use super::solid::{OpaqueBlocker, OpticalSolid};
use super::tracer::{trace_through_solid, SolidOutcome, SolidTrace};

/// Length of the stub drawn for a ray that starts outside the scene bounds.
const ESCAPE_SEGMENT_LENGTH: f64 = 1.0;

/// What a segment ended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitKind {
    Solid,
    Blocker,
    Backdrop,
    Escaped,
}

/// Straight piece of a ray path. `ray` is the ray as it was at `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct RaySegment {
    pub start: Vec3,
    pub end: Vec3,
    pub ray: Ray,
    pub hit: HitKind,
}

/// How a path terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathEnd {
    /// Stopped by an opaque blocker.
    Absorbed,
    /// Reached the backdrop plane.
    Backdrop,
    /// Left the scene bounds or hit nothing.
    Escaped,
    /// Split into several rays, each traced as its own path.
    Branched,
    /// Caught by total internal reflection inside a solid.
    Trapped,
    /// Intensity dropped below the configured minimum.
    Faded,
    /// Ran out of scene bounces.
    BounceLimit,
}

/// The materialized history of one ray.
#[derive(Debug, Clone, PartialEq)]
pub struct RayPath {
    pub segments: Vec<RaySegment>,
    pub wavelength: f64,
    /// Intensity at the end of the path; zero when absorbed or escaped.
    pub intensity: f64,
    pub final_position: Option<Vec3>,
    pub end: PathEnd,
}

/// Result of tracing one ray: its path plus the rays it branched into.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceOutcome {
    pub path: RayPath,
    pub branches: Vec<Ray>,
}

/// Handle of a solid inside an [`OpticalSystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SolidId(pub usize);

/// Infinite plane ending every ray that reaches it. It detects, it does not absorb.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backdrop {
    pub plane: Plane,
}

impl Backdrop {
    pub fn new(point: Vec3, normal: Vec3) -> Backdrop {
        Backdrop {
            plane: Plane::new(point, normal),
        }
    }
}

/// A ray arriving on the backdrop, as seen by scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackdropHit {
    pub point: Vec3,
    pub wavelength: f64,
    pub intensity: f64,
}

enum Nearest {
    Solid(SolidId, RayHit),
    Blocker(RayHit),
    Backdrop(RayHit),
}

impl Nearest {
    fn distance(&self) -> f64 {
        match self {
            Nearest::Solid(_, hit) | Nearest::Blocker(hit) | Nearest::Backdrop(hit) => hit.distance,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OpticalSystem {
    solids: Vec<OpticalSolid>,
    blockers: Vec<OpaqueBlocker>,
    backdrop: Option<Backdrop>,
    config: TraceConfig,
}

impl OpticalSystem {
    pub fn new(config: TraceConfig) -> OpticalSystem {
        OpticalSystem {
            config,
            ..Default::default()
        }
    }

    pub fn add_solid(&mut self, solid: OpticalSolid) -> SolidId {
        self.solids.push(solid);
        SolidId(self.solids.len() - 1)
    }

    pub fn add_blocker(&mut self, blocker: OpaqueBlocker) {
        self.blockers.push(blocker);
    }

    pub fn set_backdrop(&mut self, backdrop: Option<Backdrop>) {
        self.backdrop = backdrop;
    }

    pub fn solid(&self, id: SolidId) -> Option<&OpticalSolid> {
        self.solids.get(id.0)
    }

    /// Mutable access for moving or rotating a solid between trace passes.
    pub fn solid_mut(&mut self, id: SolidId) -> Option<&mut OpticalSolid> {
        self.solids.get_mut(id.0)
    }

    pub fn solids(&self) -> &[OpticalSolid] {
        &self.solids
    }

    pub fn blockers(&self) -> &[OpaqueBlocker] {
        &self.blockers
    }

    pub fn backdrop(&self) -> Option<&Backdrop> {
        self.backdrop.as_ref()
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut TraceConfig {
        &mut self.config
    }

    /// Backdrop hit, ignored when it falls outside the scene bounds.
    fn backdrop_hit(&self, ray: &Ray) -> Option<RayHit> {
        let backdrop = self.backdrop.as_ref()?;
        ray.intersect_plane(&backdrop.plane, self.config.hit_epsilon)
            .filter(|hit| self.config.bounds.contains(hit.point))
    }

    fn nearest(&self, ray: &Ray, inside: &[SolidId]) -> Option<Nearest> {
        let epsilon = self.config.hit_epsilon;
        let mut nearest: Option<Nearest> = None;
        let mut consider = |candidate: Nearest| {
            if nearest.as_ref().map_or(true, |best| candidate.distance() < best.distance()) {
                nearest = Some(candidate);
            }
        };

        for (index, solid) in self.solids.iter().enumerate() {
            let id = SolidId(index);
            if inside.contains(&id) {
                continue;
            }
            if let Some(hit) = solid.nearest_intersection(ray, epsilon) {
                consider(Nearest::Solid(id, hit));
            }
        }
        for blocker in &self.blockers {
            if let Some(hit) = blocker.nearest_intersection(ray, epsilon) {
                consider(Nearest::Blocker(hit));
            }
        }
        // objects win ties against the backdrop
        if let Some(hit) = self.backdrop_hit(ray) {
            consider(Nearest::Backdrop(hit));
        }
        nearest
    }

    /// Last chance for a ray the solid tracer gave up on: reflect it once more at the
    /// trapped point and try to refract out of the next face.
    fn recover_trapped(
        &self,
        solid: &OpticalSolid,
        outcome: &SolidOutcome,
    ) -> Option<(RaySegment, Ray)> {
        let SolidOutcome::Trapped { ray, hit } = outcome else {
            return None;
        };
        let config = &self.config;
        let reflected = attempt_tir_reflection(ray, hit, config.tir_loss, config.surface_offset);
        let next = solid.nearest_intersection(&reflected, config.hit_epsilon)?;
        let exit = refract_ray(
            &reflected,
            &next,
            Some(solid.glass.as_ref()),
            None,
            config.surface_offset,
        )?;
        let segment = RaySegment {
            start: reflected.origin,
            end: next.point,
            ray: reflected,
            hit: HitKind::Solid,
        };
        Some((segment, exit))
    }

    /// Traces a single ray against the scene. Pure: the same ray on the same scene
    /// always yields the same outcome.
    pub fn trace_ray(&self, ray: Ray) -> TraceOutcome {
        let config = &self.config;
        let wavelength = ray.wavelength;
        let mut segments = Vec::new();
        let mut inside: Vec<SolidId> = Vec::new();
        let mut current = ray;

        let finish = |segments: Vec<RaySegment>,
                      intensity: f64,
                      final_position: Option<Vec3>,
                      end: PathEnd| {
            debug!(
                "{:.1} nm path ended {:?} after {} segments, intensity {:.4}",
                wavelength,
                end,
                segments.len(),
                intensity
            );
            TraceOutcome {
                path: RayPath {
                    segments,
                    wavelength,
                    intensity,
                    final_position,
                    end,
                },
                branches: Vec::new(),
            }
        };

        for bounce in 0..config.max_bounces {
            if !config.bounds.contains(current.origin) {
                segments.push(RaySegment {
                    start: current.origin,
                    end: current.at(ESCAPE_SEGMENT_LENGTH),
                    ray: current.clone(),
                    hit: HitKind::Escaped,
                });
                return finish(segments, 0.0, None, PathEnd::Escaped);
            }
            if current.intensity < config.min_intensity {
                let origin = current.origin;
                return finish(segments, current.intensity, Some(origin), PathEnd::Faded);
            }
            trace!("bounce {} from {:?} towards {:?}", bounce, current.origin, current.direction);

            match self.nearest(&current, &inside) {
                None => {
                    let length = config
                        .bounds
                        .exit_distance(&current)
                        .unwrap_or(ESCAPE_SEGMENT_LENGTH);
                    segments.push(RaySegment {
                        start: current.origin,
                        end: current.at(length),
                        ray: current.clone(),
                        hit: HitKind::Escaped,
                    });
                    return finish(segments, 0.0, None, PathEnd::Escaped);
                }
                Some(Nearest::Blocker(hit)) => {
                    segments.push(RaySegment {
                        start: current.origin,
                        end: hit.point,
                        ray: current.clone(),
                        hit: HitKind::Blocker,
                    });
                    return finish(segments, 0.0, Some(hit.point), PathEnd::Absorbed);
                }
                Some(Nearest::Backdrop(hit)) => {
                    segments.push(RaySegment {
                        start: current.origin,
                        end: hit.point,
                        ray: current.clone(),
                        hit: HitKind::Backdrop,
                    });
                    return finish(segments, current.intensity, Some(hit.point), PathEnd::Backdrop);
                }
                Some(Nearest::Solid(id, hit)) => {
                    // a ray born inside the glass already has its first leg as an internal segment
                    if hit.entering {
                        segments.push(RaySegment {
                            start: current.origin,
                            end: hit.point,
                            ray: current.clone(),
                            hit: HitKind::Solid,
                        });
                    }
                    inside.push(id);
                    let solid = &self.solids[id.0];
                    let SolidTrace {
                        exit_ray,
                        reflected_rays,
                        internal_segments,
                        outcome,
                    } = trace_through_solid(&current, solid, config);
                    let last_internal = internal_segments
                        .last()
                        .map(|segment| (segment.end, segment.ray.intensity));
                    segments.extend(internal_segments);

                    // the transmitted ray decides how the path goes on; reflections only branch
                    let continuation = match exit_ray {
                        Some(exit) => Some(exit),
                        None => self.recover_trapped(solid, &outcome).map(|(segment, exit)| {
                            debug!("recovered trapped ray in solid {:?}", id);
                            segments.push(segment);
                            exit
                        }),
                    };
                    match continuation {
                        Some(exit) if reflected_rays.is_empty() => {
                            inside.retain(|visited| *visited != id);
                            current = exit;
                        }
                        Some(exit) => {
                            let position = segments.last().map_or(hit.point, |segment| segment.end);
                            let intensity = current.intensity;
                            let mut branched =
                                finish(segments, intensity, Some(position), PathEnd::Branched);
                            branched.branches = reflected_rays;
                            branched.branches.push(exit);
                            return branched;
                        }
                        None => {
                            let (position, intensity) = match &outcome {
                                SolidOutcome::Trapped { ray, hit } => (hit.point, ray.intensity),
                                _ => last_internal.unwrap_or((hit.point, current.intensity)),
                            };
                            let mut trapped =
                                finish(segments, intensity, Some(position), PathEnd::Trapped);
                            trapped.branches = reflected_rays;
                            return trapped;
                        }
                    }
                }
            }
        }

        // out of bounces: finish the ray straight onto the backdrop if it gets there
        if let Some(hit) = self.backdrop_hit(&current) {
            segments.push(RaySegment {
                start: current.origin,
                end: hit.point,
                ray: current.clone(),
                hit: HitKind::Backdrop,
            });
            return finish(segments, current.intensity, Some(hit.point), PathEnd::BounceLimit);
        }
        finish(segments, current.intensity, None, PathEnd::BounceLimit)
    }

    /// Traces a batch of rays, branches included, in FIFO order. Stops after
    /// `max_rays` traced rays whatever is left in the queue.
    pub fn trace_rays(&self, rays: impl IntoIterator<Item = Ray>) -> Vec<RayPath> {
        let mut queue: VecDeque<Ray> = rays.into_iter().collect();
        let mut paths = Vec::with_capacity(queue.len());
        while let Some(ray) = queue.pop_front() {
            if paths.len() >= self.config.max_rays {
                warn!(
                    "ray limit {} reached, {} queued rays dropped",
                    self.config.max_rays,
                    queue.len() + 1
                );
                break;
            }
            let TraceOutcome { path, branches } = self.trace_ray(ray);
            queue.extend(branches);
            paths.push(path);
        }
        paths
    }
}

/// Pure entry point: traces `rays` against a frozen scene.
pub fn trace(system: &OpticalSystem, rays: impl IntoIterator<Item = Ray>) -> Vec<RayPath> {
    system.trace_rays(rays)
}

/// Paths that ended on the backdrop, reduced to what scoring needs.
pub fn backdrop_hits(paths: &[RayPath]) -> impl Iterator<Item = BackdropHit> + '_ {
    paths.iter().filter_map(|path| {
        let last = path.segments.last()?;
        if last.hit != HitKind::Backdrop {
            return None;
        }
        Some(BackdropHit {
            point: path.final_position?,
            wavelength: path.wavelength,
            intensity: path.intensity,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optics::glass::GlassMaterial;
    use crate::optics::math::{Box3, Mat4};
    use crate::optics::solid::SolidKind;

    fn backdrop() -> Backdrop {
        Backdrop::new(Vec3::new(0.0, 0.0, 10.0), -Vec3::z_axis())
    }

    fn slab_scene(config: TraceConfig) -> OpticalSystem {
        let mut system = OpticalSystem::new(config);
        system.add_solid(OpticalSolid::block(
            Vec3::new(4.0, 4.0, 1.0),
            Mat4::identity(),
            GlassMaterial::bk7().shared(),
            SolidKind::Director,
        ));
        system.set_backdrop(Some(backdrop()));
        system
    }

    fn oblique_ray() -> Ray {
        Ray::new(Vec3::new(-1.0, 0.2, -3.0), Vec3::new(0.3, 0.0, 1.0), 550.0, 1.0)
    }

    #[test]
    fn backdrop_keeps_intensity() {
        let mut system = OpticalSystem::new(TraceConfig::default());
        system.set_backdrop(Some(backdrop()));
        let path = system.trace_ray(Ray::new(Vec3::zero(), Vec3::z_axis(), 600.0, 0.7)).path;
        assert_eq!(path.end, PathEnd::Backdrop);
        assert_eq!(path.intensity, 0.7);
        assert_eq!(path.final_position, Some(Vec3::new(0.0, 0.0, 10.0)));
        assert_eq!(path.segments.len(), 1);
        assert_eq!(path.segments[0].hit, HitKind::Backdrop);
    }

    #[test]
    fn blocker_absorbs_before_backdrop() {
        let mut system = OpticalSystem::new(TraceConfig::default());
        system.set_backdrop(Some(backdrop()));
        system.add_blocker(OpaqueBlocker::wall(
            Vec3::new(2.0, 2.0, 0.2),
            &Mat4::translate(Vec3::new(0.0, 0.0, 5.0)),
        ));
        let ray = Ray::new(Vec3::new(0.1, -0.3, 0.0), Vec3::z_axis(), 600.0, 1.0);
        let path = system.trace_ray(ray).path;
        assert_eq!(path.end, PathEnd::Absorbed);
        assert_eq!(path.intensity, 0.0);
        assert_eq!(path.segments.last().map(|s| s.hit), Some(HitKind::Blocker));
    }

    #[test]
    fn nothing_hit_escapes_to_the_bounds() {
        let system = OpticalSystem::new(TraceConfig::default());
        let path = system.trace_ray(Ray::new(Vec3::zero(), Vec3::x_axis(), 600.0, 1.0)).path;
        assert_eq!(path.end, PathEnd::Escaped);
        assert_eq!(path.intensity, 0.0);
        assert_eq!(path.final_position, None);
        assert!(path.segments[0].end.is_close(Vec3::new(100.0, 0.0, 0.0), 1e-9));
    }

    #[test]
    fn origin_outside_bounds_terminates_immediately() {
        let config = TraceConfig::default().with_bounds(Box3::new(Vec3::zero(), Vec3::splat(5.0)));
        let system = slab_scene(config);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -8.0), Vec3::z_axis(), 600.0, 1.0);
        let path = system.trace_ray(ray).path;
        assert_eq!(path.end, PathEnd::Escaped);
        assert_eq!(path.intensity, 0.0);
        assert_eq!(path.final_position, None);
        assert_eq!(path.segments.len(), 1);
    }

    #[test]
    fn dim_ray_fades() {
        let system = slab_scene(TraceConfig::default());
        let outcome = system.trace_ray(Ray::new(Vec3::zero(), Vec3::z_axis(), 600.0, 0.005));
        assert_eq!(outcome.path.end, PathEnd::Faded);
        assert!(outcome.path.segments.is_empty());
    }

    #[test]
    fn slab_then_backdrop() {
        let system = slab_scene(TraceConfig::default());
        let path = system.trace_ray(oblique_ray()).path;
        assert_eq!(path.end, PathEnd::Backdrop);
        let kinds: Vec<HitKind> = path.segments.iter().map(|s| s.hit).collect();
        assert_eq!(kinds, vec![HitKind::Solid, HitKind::Solid, HitKind::Backdrop]);
        assert!(path.intensity > 0.9 && path.intensity < 1.0);
    }

    #[test]
    fn bounce_limit_finishes_on_backdrop() {
        let system = slab_scene(TraceConfig::default().with_max_bounces(1));
        let path = system.trace_ray(oblique_ray()).path;
        assert_eq!(path.end, PathEnd::BounceLimit);
        assert!(path.final_position.is_some());
        assert_eq!(path.segments.last().map(|s| s.hit), Some(HitKind::Backdrop));
    }

    #[test]
    fn partial_reflections_branch_into_new_paths() {
        let system = slab_scene(TraceConfig::default().with_partial_reflections(true));
        let outcome = system.trace_ray(oblique_ray());
        assert_eq!(outcome.path.end, PathEnd::Branched);
        assert_eq!(outcome.branches.len(), 3);

        let paths = system.trace_rays(vec![oblique_ray()]);
        assert_eq!(paths.len(), 4);
        assert_eq!(paths.iter().filter(|p| p.end == PathEnd::Branched).count(), 1);
        let hits: Vec<BackdropHit> = backdrop_hits(&paths).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].wavelength, 550.0);
    }

    #[test]
    fn batch_stops_at_ray_limit() {
        let config = TraceConfig::default()
            .with_partial_reflections(true)
            .with_max_rays(2);
        let system = slab_scene(config);
        assert_eq!(system.trace_rays(vec![oblique_ray()]).len(), 2);
    }

    #[test]
    fn ray_trapped_in_cube_ends_inside() {
        let mut system = OpticalSystem::new(TraceConfig::default());
        system.add_solid(OpticalSolid::block(
            Vec3::splat(2.0),
            Mat4::identity(),
            GlassMaterial::bk7().shared(),
            SolidKind::Director,
        ));
        let ray = Ray::new(Vec3::new(0.05, -0.1, 0.02), Vec3::new(1.0, 1.0, 1.0), 550.0, 1.0);
        let path = system.trace_ray(ray).path;
        assert_eq!(path.end, PathEnd::Trapped);
        assert!(path.segments.iter().all(|s| s.hit == HitKind::Solid));
        assert_eq!(path.segments.len(), system.config().max_tir + 1);
        let position = path.final_position.unwrap();
        assert!(system.solids()[0].bounding_box().contains(position));
        assert!((path.intensity - 0.99_f64.powi(6)).abs() < 1e-12);
    }

    #[test]
    fn dim_ray_outside_bounds_escapes() {
        let config = TraceConfig::default().with_bounds(Box3::new(Vec3::zero(), Vec3::splat(5.0)));
        let system = slab_scene(config);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -8.0), Vec3::z_axis(), 600.0, 0.005);
        let path = system.trace_ray(ray).path;
        assert_eq!(path.end, PathEnd::Escaped);
        assert_eq!(path.intensity, 0.0);
        assert_eq!(path.final_position, None);
    }

    /// A BK7 cube with no internal reflections allowed: the ray entering the -z face
    /// is caught at the +x face and only leaves through the extra reflection.
    fn cube_scene(config: TraceConfig) -> OpticalSystem {
        let mut system = OpticalSystem::new(config.with_max_tir(0));
        system.add_solid(OpticalSolid::block(
            Vec3::splat(2.0),
            Mat4::identity(),
            GlassMaterial::bk7().shared(),
            SolidKind::Director,
        ));
        system.set_backdrop(Some(backdrop()));
        system
    }

    fn steep_ray() -> Ray {
        Ray::new(Vec3::new(-1.3, 0.1, -4.0), Vec3::new(0.7, 0.0, 1.0), 550.0, 1.0)
    }

    #[test]
    fn trapped_ray_recovers_through_one_more_reflection() {
        let system = cube_scene(TraceConfig::default());
        let path = system.trace_ray(steep_ray()).path;
        assert_eq!(path.end, PathEnd::Backdrop);
        let kinds: Vec<HitKind> = path.segments.iter().map(|s| s.hit).collect();
        assert_eq!(
            kinds,
            vec![HitKind::Solid, HitKind::Solid, HitKind::Solid, HitKind::Backdrop]
        );
        let trapped = path.segments[1].ray.intensity;
        let recovery = &path.segments[2];
        let tir_loss = system.config().tir_loss;
        assert!((recovery.ray.intensity - trapped * (1.0 - tir_loss)).abs() < 1e-12);
        assert!(recovery.end.is_close(Vec3::new(0.384023050871, 0.1, 1.0), 1e-9));
        let exit = &path.segments[3].ray;
        assert!(exit.direction.is_close(Vec3::new(-0.573462344363, 0.0, 0.819231920519), 1e-9));
        assert!((path.intensity - 0.902045924038).abs() < 1e-9);
    }

    #[test]
    fn entry_reflection_branches_beside_the_recovered_exit() {
        let system = cube_scene(TraceConfig::default().with_partial_reflections(true));
        let outcome = system.trace_ray(steep_ray());
        assert_eq!(outcome.path.end, PathEnd::Branched);
        assert_eq!(outcome.branches.len(), 2);
        let ghost = &outcome.branches[0];
        assert!((ghost.intensity - 0.045454297046).abs() < 1e-9);
        assert!(ghost.direction.z < 0.0);
        // the transmitted light is not lost to the reflection
        let exit = &outcome.branches[1];
        assert!((exit.intensity - 0.902045924038).abs() < 1e-9);
        assert_eq!(outcome.path.segments.len(), 3);

        let paths = system.trace_rays(vec![steep_ray()]);
        let hits: Vec<BackdropHit> = backdrop_hits(&paths).collect();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].intensity - exit.intensity).abs() < 1e-12);
    }

    #[test]
    fn trapped_ray_keeps_its_entry_reflection_as_a_branch() {
        let mut system = OpticalSystem::new(
            TraceConfig::default()
                .with_partial_reflections(true)
                .with_max_tir(0),
        );
        system.add_solid(OpticalSolid::block(
            Vec3::new(0.4, 2.0, 4.0),
            Mat4::identity(),
            GlassMaterial::bk7().shared(),
            SolidKind::Director,
        ));
        let ray = Ray::new(Vec3::new(-2.0, 0.3, -5.0), Vec3::new(0.7, 0.0, 1.0), 550.0, 1.0);
        let outcome = system.trace_ray(ray);
        assert_eq!(outcome.path.end, PathEnd::Trapped);
        assert!((outcome.path.intensity - 0.954545702954).abs() < 1e-9);
        assert_eq!(outcome.branches.len(), 1);
        assert!((outcome.branches[0].intensity - 0.045454297046).abs() < 1e-9);
    }

    #[test]
    fn moved_solid_changes_the_path() {
        let mut system = slab_scene(TraceConfig::default());
        let before = system.trace_ray(oblique_ray()).path;
        if let Some(solid) = system.solid_mut(SolidId(0)) {
            solid.set_transform(Mat4::translate(Vec3::new(50.0, 0.0, 0.0)));
        }
        let after = system.trace_ray(oblique_ray()).path;
        assert_ne!(before, after);
        assert_eq!(after.segments.len(), 1);
    }
}
