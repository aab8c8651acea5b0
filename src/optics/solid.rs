use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use log::debug;
use obj::{load_obj, Obj};

use super::error::GeometryError;
use super::glass::GlassMaterial;
use super::math::{Box3, Mat4, Ray, RayHit, Triangle, Vec3};
use super::shapes;

/// Tolerance used by [`OpticalSolid::validate`], relative to the solid's size.
const VALIDATION_TOLERANCE: f64 = 1e-6;

/// Role of a solid in the puzzle. The tracer treats both the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolidKind {
    Splitter,
    Director,
}

/// Returns the closest hit among `triangles`, if any.
fn nearest_hit<'a>(
    triangles: impl IntoIterator<Item = &'a Triangle>,
    ray: &Ray,
    min_distance: f64,
) -> Option<RayHit> {
    let mut closest: Option<RayHit> = None;
    for triangle in triangles {
        if let Some(hit) = ray.intersect_triangle(triangle, min_distance) {
            if closest.map_or(true, |best| hit.distance < best.distance) {
                closest = Some(hit);
            }
        }
    }
    closest
}

fn bounding_box_of(triangles: &[Triangle], margin: f64) -> Box3 {
    Box3::enclosing(triangles.iter().flat_map(|t| t.vertices()))
        .unwrap_or_else(|| Box3::from_single_point(Vec3::zero()))
        .expanded(margin)
}

/// A transparent convex polyhedron.
///
/// The local triangles must form a closed, convex, two-manifold surface with outward
/// normals. Tracing does not check this; call [`OpticalSolid::validate`] for geometry
/// that does not come from [`shapes`].
#[derive(Debug, Clone)]
pub struct OpticalSolid {
    local: Vec<Triangle>,
    transform: Mat4,
    triangles: Vec<Triangle>,
    bounding_box: Box3,
    pub glass: Arc<GlassMaterial>,
    pub kind: SolidKind,
}

impl OpticalSolid {
    pub fn new(
        local: Vec<Triangle>,
        transform: Mat4,
        glass: Arc<GlassMaterial>,
        kind: SolidKind,
    ) -> OpticalSolid {
        let mut solid = OpticalSolid {
            local,
            transform,
            triangles: Vec::new(),
            bounding_box: Box3::from_single_point(Vec3::zero()),
            glass,
            kind,
        };
        solid.rebuild();
        solid
    }

    /// Same as [`OpticalSolid::new`] but rejects malformed geometry.
    pub fn validated(
        local: Vec<Triangle>,
        transform: Mat4,
        glass: Arc<GlassMaterial>,
        kind: SolidKind,
    ) -> Result<OpticalSolid, GeometryError> {
        let solid = OpticalSolid::new(local, transform, glass, kind);
        solid.validate()?;
        Ok(solid)
    }

    pub fn prism(
        apex_deg: f64,
        side: f64,
        height: f64,
        transform: Mat4,
        glass: Arc<GlassMaterial>,
        kind: SolidKind,
    ) -> OpticalSolid {
        OpticalSolid::new(
            shapes::triangular_prism(apex_deg, side, height),
            transform,
            glass,
            kind,
        )
    }

    pub fn block(
        size: Vec3,
        transform: Mat4,
        glass: Arc<GlassMaterial>,
        kind: SolidKind,
    ) -> OpticalSolid {
        OpticalSolid::new(shapes::block(size), transform, glass, kind)
    }

    /// Loads a closed mesh from a Wavefront OBJ file and validates it.
    pub fn load_obj(
        path: impl AsRef<Path>,
        transform: Mat4,
        glass: Arc<GlassMaterial>,
        kind: SolidKind,
    ) -> Result<OpticalSolid, GeometryError> {
        let input = BufReader::new(File::open(path.as_ref())?);
        let obj: Obj = load_obj(input)?;
        let local = triangles_from_obj(&obj);
        debug!(
            "loaded {} with {} triangles",
            path.as_ref().display(),
            local.len()
        );
        OpticalSolid::validated(local, transform, glass, kind)
    }

    /// Moves the solid; world triangles and bounds are recomputed.
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
        self.rebuild();
    }

    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn bounding_box(&self) -> &Box3 {
        &self.bounding_box
    }

    fn rebuild(&mut self) {
        self.triangles = shapes::transformed(&self.local, &self.transform);
        self.bounding_box = bounding_box_of(&self.triangles, 1e-6);
    }

    /// Closest triangle hit further than `min_distance`.
    pub fn nearest_intersection(&self, ray: &Ray, min_distance: f64) -> Option<RayHit> {
        if !self.bounding_box.collide(ray) {
            return None;
        }
        nearest_hit(&self.triangles, ray, min_distance)
    }

    /// Signed volume of the world-space surface; positive for outward normals.
    pub fn signed_volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| t.v0.dot(t.v1.cross(t.v2)) / 6.0)
            .sum()
    }

    /// Checks that the triangles describe a closed, outward-oriented convex solid:
    /// non-degenerate faces, area-weighted normals summing to zero, positive
    /// signed volume, and every vertex behind every face plane.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.triangles.is_empty() {
            return Err(GeometryError::Empty);
        }
        let size = self.bounding_box.half_extension.len().max(f64::MIN_POSITIVE);
        let tolerance = VALIDATION_TOLERANCE * size;

        let mut total_area = 0.0;
        let mut normal_sum = Vec3::zero();
        for (index, triangle) in self.triangles.iter().enumerate() {
            let area = triangle.area();
            if area <= tolerance * tolerance {
                return Err(GeometryError::Degenerate { index });
            }
            total_area += area;
            normal_sum += triangle.scaled_normal() * 0.5;
        }
        let residual = normal_sum.len() / total_area;
        if residual > VALIDATION_TOLERANCE {
            return Err(GeometryError::NotClosed { residual });
        }

        let volume = self.signed_volume();
        if volume <= 0.0 {
            return Err(GeometryError::InvertedNormals { volume });
        }

        for (index, triangle) in self.triangles.iter().enumerate() {
            let outside = self
                .triangles
                .iter()
                .flat_map(|t| t.vertices())
                .any(|v| (v - triangle.v0).dot(triangle.normal) > tolerance);
            if outside {
                return Err(GeometryError::NotConvex { index });
            }
        }
        Ok(())
    }
}

fn triangles_from_obj(obj: &Obj) -> Vec<Triangle> {
    obj.indices
        .chunks_exact(3)
        .map(|face| {
            let v0: Vec3 = obj.vertices[face[0] as usize].position.into();
            let v1: Vec3 = obj.vertices[face[1] as usize].position.into();
            let v2: Vec3 = obj.vertices[face[2] as usize].position.into();
            Triangle::new(v0, v1, v2)
        })
        .collect()
}

/// Fully opaque geometry: any ray touching it is absorbed.
#[derive(Debug, Clone)]
pub struct OpaqueBlocker {
    triangles: Vec<Triangle>,
    bounding_box: Box3,
}

impl OpaqueBlocker {
    pub fn new(triangles: Vec<Triangle>) -> OpaqueBlocker {
        let bounding_box = bounding_box_of(&triangles, 1e-6);
        OpaqueBlocker {
            triangles,
            bounding_box,
        }
    }

    /// A box-shaped wall of the given edge lengths placed by `transform`.
    pub fn wall(size: Vec3, transform: &Mat4) -> OpaqueBlocker {
        OpaqueBlocker::new(shapes::transformed(&shapes::block(size), transform))
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn nearest_intersection(&self, ray: &Ray, min_distance: f64) -> Option<RayHit> {
        if !self.bounding_box.collide(ray) {
            return None;
        }
        nearest_hit(&self.triangles, ray, min_distance)
    }
}
