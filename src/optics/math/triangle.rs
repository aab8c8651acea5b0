use super::{Mat4, Vec3};

/// World-space triangle. The normal follows the winding `(v1 - v0) x (v2 - v0)`,
/// so a closed solid wound counter-clockwise seen from outside has outward normals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
    pub normal: Vec3,
}

impl Triangle {
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Triangle {
        let normal = (v1 - v0).cross(v2 - v0).normalize();
        Triangle { v0, v1, v2, normal }
    }

    /// Twice the area, along the winding normal.
    pub fn scaled_normal(&self) -> Vec3 {
        (self.v1 - self.v0).cross(self.v2 - self.v0)
    }

    pub fn area(&self) -> f64 {
        self.scaled_normal().len() * 0.5
    }

    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    pub fn vertices(&self) -> [Vec3; 3] {
        [self.v0, self.v1, self.v2]
    }

    pub fn transformed(&self, transform: &Mat4) -> Triangle {
        Triangle::new(
            transform.apply(self.v0),
            transform.apply(self.v1),
            transform.apply(self.v2),
        )
    }
}

/// Infinite plane through `point`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub point: Vec3,
    pub normal: Vec3,
}

impl Plane {
    pub fn new(point: Vec3, normal: Vec3) -> Plane {
        Plane {
            point,
            normal: normal.normalize(),
        }
    }
}
