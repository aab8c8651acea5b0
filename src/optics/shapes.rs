//! Generators for the closed convex shapes the engine ships with, in local space.
//!
//! Every generator returns triangles with outward normals. The solids are centered on
//! their centroid so that rotations keep them in place.

use super::math::{Mat4, Triangle, Vec3};

/// Straight prism with an isosceles triangular cross-section in the XZ plane,
/// extruded along Y.
///
/// The apex (angle `apex_deg` between the two equal faces of length `side`) points
/// along +X and the base face lies parallel to Z, so a ray travelling along +Z inside
/// the glass runs parallel to the base.
pub fn triangular_prism(apex_deg: f64, side: f64, height: f64) -> Vec<Triangle> {
    let half_apex = apex_deg.to_radians() / 2.0;
    let a = side * half_apex.sin();
    let c = side * half_apex.cos();
    let h = height / 2.0;
    // cross-section centroid sits at the origin
    let section = [
        (2.0 * c / 3.0, 0.0),
        (-c / 3.0, -a),
        (-c / 3.0, a),
    ];
    let bottom: Vec<Vec3> = section.iter().map(|&(x, z)| Vec3::new(x, -h, z)).collect();
    let top: Vec<Vec3> = section.iter().map(|&(x, z)| Vec3::new(x, h, z)).collect();

    let mut triangles = Vec::with_capacity(8);
    push_face(&mut triangles, &bottom);
    push_face(&mut triangles, &top);
    for i in 0..3 {
        let j = (i + 1) % 3;
        push_face(&mut triangles, &[bottom[i], bottom[j], top[j], top[i]]);
    }
    triangles
}

/// Rectangular block of the given edge lengths. Used for slabs and for walls.
pub fn block(size: Vec3) -> Vec<Triangle> {
    let h = size * 0.5;
    let ring = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
    let near = ring.map(|(sx, sy)| Vec3::new(sx * h.x, sy * h.y, -h.z));
    let far = ring.map(|(sx, sy)| Vec3::new(sx * h.x, sy * h.y, h.z));

    let mut triangles = Vec::with_capacity(12);
    push_face(&mut triangles, &near);
    push_face(&mut triangles, &far);
    // -x, +x, -y, +y
    for (i, j) in [(0, 3), (1, 2), (0, 1), (3, 2)] {
        push_face(&mut triangles, &[near[i], near[j], far[j], far[i]]);
    }
    triangles
}

pub fn transformed(triangles: &[Triangle], transform: &Mat4) -> Vec<Triangle> {
    triangles
        .iter()
        .map(|triangle| triangle.transformed(transform))
        .collect()
}

/// Fans a planar convex face into triangles wound away from the origin. All shapes
/// here are centered on the origin, so that is the outward side.
fn push_face(triangles: &mut Vec<Triangle>, face: &[Vec3]) {
    let face_center = face.iter().fold(Vec3::zero(), |acc, v| acc + *v) / face.len() as f64;
    for i in 1..face.len() - 1 {
        let mut triangle = Triangle::new(face[0], face[i], face[i + 1]);
        if triangle.normal.dot(face_center) < 0.0 {
            triangle = Triangle::new(face[0], face[i + 1], face[i]);
        }
        triangles.push(triangle);
    }
}
