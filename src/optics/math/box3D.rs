use super::{Ray, Vec3};

/// Axis-aligned box, used both as the scene's spatial bounds and as a cheap
/// rejection volume around solids and walls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Box3 {
    pub center: Vec3,
    pub half_extension: Vec3,
}

impl Box3 {
    pub fn new(center: Vec3, half_extension: Vec3) -> Box3 {
        Box3 {
            center,
            half_extension,
        }
    }

    pub fn from_single_point(point: Vec3) -> Box3 {
        Box3 {
            center: point,
            half_extension: Vec3::zero(),
        }
    }

    pub fn from_min_max(min: Vec3, max: Vec3) -> Box3 {
        Box3 {
            center: (min + max) * 0.5,
            half_extension: (max - min) * 0.5,
        }
    }

    /// Smallest box enclosing all the points, `None` for an empty iterator.
    pub fn enclosing(points: impl IntoIterator<Item = Vec3>) -> Option<Box3> {
        let mut points = points.into_iter();
        let mut bbox = Box3::from_single_point(points.next()?);
        for point in points {
            bbox.include(point);
        }
        Some(bbox)
    }

    pub fn include(&mut self, point: Vec3) {
        let min = self.min().min(point);
        let max = self.max().max(point);
        *self = Box3::from_min_max(min, max);
    }

    /// Returns a copy grown by `margin` on every side.
    pub fn expanded(&self, margin: f64) -> Box3 {
        Box3::new(self.center, self.half_extension + Vec3::splat(margin))
    }

    #[inline(always)]
    pub fn contains(&self, point: Vec3) -> bool {
        let dist = point - self.center;
        (dist.x >= -self.half_extension.x && dist.x <= self.half_extension.x)
            && (dist.y >= -self.half_extension.y && dist.y <= self.half_extension.y)
            && (dist.z >= -self.half_extension.z && dist.z <= self.half_extension.z)
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.half_extension
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half_extension
    }

    /// Parametric interval `(t_enter, t_exit)` where the ray line overlaps the box.
    /// `t_enter` is negative when the origin is already inside.
    pub fn ray_interval(&self, ray: &Ray) -> Option<(f64, f64)> {
        let dirfrac = Vec3::new(
            1.0 / ray.direction.x,
            1.0 / ray.direction.y,
            1.0 / ray.direction.z,
        );
        let relative_min_box = self.min() - ray.origin;
        let relative_max_box = self.max() - ray.origin;
        let t1 = relative_min_box.x * dirfrac.x;
        let t2 = relative_max_box.x * dirfrac.x;
        let t3 = relative_min_box.y * dirfrac.y;
        let t4 = relative_max_box.y * dirfrac.y;
        let t5 = relative_min_box.z * dirfrac.z;
        let t6 = relative_max_box.z * dirfrac.z;

        let tmin = t1.min(t2).max(t3.min(t4)).max(t5.min(t6));
        let tmax = t1.max(t2).min(t3.max(t4)).min(t5.max(t6));

        // the whole box is behind the origin
        if tmax < 0.0 {
            return None;
        }
        if tmin > tmax {
            return None;
        }
        Some((tmin, tmax))
    }

    #[inline(always)]
    pub fn collide(&self, ray: &Ray) -> bool {
        self.ray_interval(ray).is_some()
    }

    /// Distance along the ray to the point where it leaves the box.
    pub fn exit_distance(&self, ray: &Ray) -> Option<f64> {
        self.ray_interval(ray).map(|(_, t_exit)| t_exit)
    }
}
