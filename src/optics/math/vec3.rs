use std::ops;

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<[f64; 3]> for Vec3 {
    #[inline(always)]
    fn from(value: [f64; 3]) -> Self {
        Vec3::new(value[0], value[1], value[2])
    }
}

impl From<[f32; 3]> for Vec3 {
    #[inline(always)]
    fn from(value: [f32; 3]) -> Self {
        Vec3::new(value[0] as f64, value[1] as f64, value[2] as f64)
    }
}

impl ops::Add<Vec3> for Vec3 {
    type Output = Self;

    #[inline(always)]
    fn add(self, rhs: Vec3) -> Self::Output {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl ops::AddAssign<Vec3> for Vec3 {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl ops::Sub<Vec3> for Vec3 {
    type Output = Self;

    #[inline(always)]
    fn sub(self, rhs: Vec3) -> Self::Output {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl ops::Neg for Vec3 {
    type Output = Self;

    #[inline(always)]
    fn neg(self) -> Self::Output {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

impl ops::Mul<f64> for Vec3 {
    type Output = Self;

    #[inline(always)]
    fn mul(self, rhs: f64) -> Self::Output {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl ops::Mul<Vec3> for Vec3 {
    type Output = Self;

    #[inline(always)]
    fn mul(self, rhs: Vec3) -> Self::Output {
        Vec3::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }
}

impl ops::Div<f64> for Vec3 {
    type Output = Self;

    #[inline(always)]
    fn div(self, rhs: f64) -> Self::Output {
        Vec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Vec3 {
    #[inline(always)]
    pub fn new(x: f64, y: f64, z: f64) -> Vec3 {
        Vec3 { x, y, z }
    }

    #[inline(always)]
    pub fn zero() -> Vec3 {
        Vec3::new(0.0, 0.0, 0.0)
    }

    #[inline(always)]
    pub fn splat(value: f64) -> Vec3 {
        Vec3::new(value, value, value)
    }

    #[inline(always)]
    pub fn x_axis() -> Vec3 {
        Vec3::new(1.0, 0.0, 0.0)
    }

    #[inline(always)]
    pub fn y_axis() -> Vec3 {
        Vec3::new(0.0, 1.0, 0.0)
    }

    #[inline(always)]
    pub fn z_axis() -> Vec3 {
        Vec3::new(0.0, 0.0, 1.0)
    }

    /// Mirrors this vector about the plane whose normal is `axis`.
    #[inline(always)]
    pub fn reflect(self, axis: Vec3) -> Vec3 {
        self - axis * 2.0 * self.dot(axis)
    }

    #[inline(always)]
    pub fn dot(&self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline(always)]
    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    #[inline(always)]
    pub fn distance(self, other: Vec3) -> f64 {
        (self - other).len()
    }

    #[inline(always)]
    pub fn squared_len(self) -> f64 {
        self.dot(self)
    }

    #[inline(always)]
    pub fn len(self) -> f64 {
        self.squared_len().sqrt()
    }

    #[inline(always)]
    pub fn normalize(&self) -> Vec3 {
        *self / self.len()
    }

    #[inline(always)]
    pub fn min(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    #[inline(always)]
    pub fn max(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// Angle in radians between two non-zero vectors.
    pub fn angle_to(self, other: Vec3) -> f64 {
        let cos = self.dot(other) / (self.len() * other.len());
        cos.clamp(-1.0, 1.0).acos()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn is_close(self, other: Vec3, tolerance: f64) -> bool {
        self.distance(other) <= tolerance
    }
}
