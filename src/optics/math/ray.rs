use super::{Plane, Triangle, Vec3};

/// Below this magnitude a determinant or a cosine is treated as parallel.
const PARALLEL_EPSILON: f64 = 1e-8;

/// A monochromatic ray. `direction` is unit length and `intensity` lies in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Wavelength in nanometers.
    pub wavelength: f64,
    pub intensity: f64,
}

/// Result of a successful ray intersection.
///
/// `normal` always faces the incoming ray (`normal · direction < 0`), so it points
/// into the medium the ray is leaving. `entering` tells whether the ray crosses the
/// surface against its geometric normal, i.e. from outside to inside of a solid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f64,
    pub entering: bool,
}

impl RayHit {
    /// The geometric normal of the surface, independent of the ray side.
    pub fn outward_normal(&self) -> Vec3 {
        if self.entering {
            self.normal
        } else {
            -self.normal
        }
    }
}

impl Ray {
    /// Creates a ray, normalizing `direction` and clamping `intensity` to `[0, 1]`.
    /// `direction` must not be the zero vector.
    pub fn new(origin: Vec3, direction: Vec3, wavelength: f64, intensity: f64) -> Ray {
        Ray {
            origin,
            direction: direction.normalize(),
            wavelength,
            intensity: intensity.clamp(0.0, 1.0),
        }
    }

    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.direction * t
    }

    /// A ray of the same wavelength starting somewhere else.
    pub fn redirected(&self, origin: Vec3, direction: Vec3, intensity: f64) -> Ray {
        Ray::new(origin, direction, self.wavelength, intensity)
    }

    /// Möller–Trumbore intersection. Hits closer than `min_distance` are ignored so
    /// that a ray leaving a surface does not hit it again.
    pub fn intersect_triangle(&self, triangle: &Triangle, min_distance: f64) -> Option<RayHit> {
        // https://en.wikipedia.org/wiki/M%C3%B6ller%E2%80%93Trumbore_intersection_algorithm
        let v0v1 = triangle.v1 - triangle.v0;
        let v0v2 = triangle.v2 - triangle.v0;
        let ray_cross_e2 = self.direction.cross(v0v2);
        let determinant = v0v1.dot(ray_cross_e2);
        if determinant.abs() < PARALLEL_EPSILON {
            return None;
        }
        let inverse_determinant = 1.0 / determinant;
        let tvec = self.origin - triangle.v0;
        let u = tvec.dot(ray_cross_e2) * inverse_determinant;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let qvec = tvec.cross(v0v1);
        let v = self.direction.dot(qvec) * inverse_determinant;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = v0v2.dot(qvec) * inverse_determinant;
        if t <= min_distance {
            return None;
        }

        Some(self.hit_with_normal(t, triangle.normal))
    }

    pub fn intersect_plane(&self, plane: &Plane, min_distance: f64) -> Option<RayHit> {
        let dv = plane.normal.dot(self.direction);
        // grazing rays never reach the plane in a useful way
        if dv.abs() < PARALLEL_EPSILON {
            return None;
        }
        let t = (plane.point - self.origin).dot(plane.normal) / dv;
        if t <= min_distance {
            return None;
        }
        Some(self.hit_with_normal(t, plane.normal))
    }

    fn hit_with_normal(&self, t: f64, surface_normal: Vec3) -> RayHit {
        let entering = surface_normal.dot(self.direction) < 0.0;
        RayHit {
            point: self.at(t),
            normal: if entering {
                surface_normal
            } else {
                -surface_normal
            },
            distance: t,
            entering,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy_triangle() -> Triangle {
        Triangle::new(
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(2.0, -1.0, 0.0),
            Vec3::new(-1.0, 2.0, 0.0),
        )
    }

    #[test]
    fn ray_point_at() {
        let ray = Ray::new(Vec3::zero(), Vec3::new(0.0, 0.0, 2.0), 500.0, 1.0);
        assert_eq!(ray.at(3.0), Vec3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn new_clamps_intensity() {
        let ray = Ray::new(Vec3::zero(), Vec3::z_axis(), 500.0, 1.7);
        assert_eq!(ray.intensity, 1.0);
    }

    #[test]
    fn triangle_hit_against_normal_is_entering() {
        // triangle normal is +z, ray travels -z
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), -Vec3::z_axis(), 500.0, 1.0);
        let hit = ray.intersect_triangle(&xy_triangle(), 0.001).unwrap();
        assert!(hit.entering);
        assert!((hit.distance - 5.0).abs() < 1e-12);
        assert_eq!(hit.normal, Vec3::z_axis());
        assert_eq!(hit.outward_normal(), Vec3::z_axis());
    }

    #[test]
    fn triangle_hit_from_behind_flips_normal() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::z_axis(), 500.0, 1.0);
        let hit = ray.intersect_triangle(&xy_triangle(), 0.001).unwrap();
        assert!(!hit.entering);
        assert!(hit.normal.dot(ray.direction) < 0.0);
        assert_eq!(hit.outward_normal(), Vec3::z_axis());
    }

    #[test]
    fn triangle_outside_barycentric_range_misses() {
        let ray = Ray::new(Vec3::new(5.0, 5.0, 5.0), -Vec3::z_axis(), 500.0, 1.0);
        assert!(ray.intersect_triangle(&xy_triangle(), 0.001).is_none());
    }

    #[test]
    fn parallel_ray_misses_triangle() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::x_axis(), 500.0, 1.0);
        assert!(ray.intersect_triangle(&xy_triangle(), 0.001).is_none());
    }

    #[test]
    fn hit_closer_than_epsilon_is_ignored() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 0.0005), -Vec3::z_axis(), 500.0, 1.0);
        assert!(ray.intersect_triangle(&xy_triangle(), 0.001).is_none());
        assert!(ray.intersect_triangle(&xy_triangle(), 0.0).is_some());
    }

    #[test]
    fn plane_behind_origin_is_missed() {
        let plane = Plane::new(Vec3::new(0.0, 0.0, 10.0), -Vec3::z_axis());
        let forward = Ray::new(Vec3::zero(), Vec3::z_axis(), 500.0, 1.0);
        let backward = Ray::new(Vec3::zero(), -Vec3::z_axis(), 500.0, 1.0);
        let hit = forward.intersect_plane(&plane, 0.001).unwrap();
        assert!((hit.distance - 10.0).abs() < 1e-12);
        assert!(hit.entering);
        assert!(backward.intersect_plane(&plane, 0.001).is_none());
    }

    #[test]
    fn grazing_ray_misses_plane() {
        let plane = Plane::new(Vec3::zero(), Vec3::z_axis());
        let ray = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::x_axis(), 500.0, 1.0);
        assert!(ray.intersect_plane(&plane, 0.001).is_none());
    }
}
