use thiserror::Error;

/// Problems found while importing or validating solid geometry.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("solid has no triangles")]
    Empty,

    #[error("triangle {index} has zero area")]
    Degenerate { index: usize },

    #[error("solid is not closed: area-weighted normals sum to {residual:.3e}")]
    NotClosed { residual: f64 },

    #[error("solid normals point inwards (signed volume {volume:.3e})")]
    InvertedNormals { volume: f64 },

    #[error("solid is not convex: a vertex lies outside the plane of triangle {index}")]
    NotConvex { index: usize },

    #[error("cannot read mesh: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse mesh: {0}")]
    Obj(#[from] obj::ObjError),
}
