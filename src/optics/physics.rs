//! Interface physics: Snell refraction, Fresnel reflectance and mirror reflection.
//!
//! Every function here expects the surface normal to face the incident ray, which is
//! how [`RayHit`] reports it. Entering a solid that is the geometric (outward)
//! normal, leaving it that is the negated outward normal.

use super::glass::{index_of, GlassMaterial};
use super::math::{Ray, RayHit, Vec3};

/// Refracts `incident` through a surface with `normal` facing the incident side.
/// Returns `None` on total internal reflection.
pub fn snell_refract(incident: Vec3, normal: Vec3, n1: f64, n2: f64) -> Option<Vec3> {
    let mut normal = normal;
    let mut cos_i = -normal.dot(incident);
    if cos_i < 0.0 {
        // normal on the wrong side; refraction is symmetric so just flip it
        normal = -normal;
        cos_i = -cos_i;
    }
    let eta = n1 / n2;
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i);
    if sin2_t > 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    let refracted = incident * eta + normal * (eta * cos_i - cos_t);
    Some(refracted.normalize())
}

/// Unpolarized Fresnel reflectance: the mean of the s and p coefficients.
/// Returns exactly `1.0` when the refracted ray does not exist.
pub fn fresnel_reflectance(cos_i: f64, n1: f64, n2: f64) -> f64 {
    let cos_i = cos_i.abs().min(1.0);
    let eta = n1 / n2;
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i);
    if sin2_t > 1.0 {
        return 1.0;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    let rs = (n1 * cos_i - n2 * cos_t) / (n1 * cos_i + n2 * cos_t);
    let rp = (n1 * cos_t - n2 * cos_i) / (n1 * cos_t + n2 * cos_i);
    (0.5 * (rs * rs + rp * rp)).clamp(0.0, 1.0)
}

pub fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident.reflect(normal).normalize()
}

/// Incidence angle in radians beyond which light going from `n1` into `n2` is
/// totally reflected. `None` when `n1 <= n2`, where TIR cannot happen.
pub fn critical_angle(n1: f64, n2: f64) -> Option<f64> {
    if n1 <= n2 {
        return None;
    }
    Some((n2 / n1).asin())
}

/// Deviation of a ray crossing a prism of apex angle `apex` (radians) with relative
/// index `n`, entering the first face at `incidence` radians. `None` if the ray is
/// totally reflected at the second face.
pub fn prism_deviation(n: f64, apex: f64, incidence: f64) -> Option<f64> {
    let refracted = (incidence.sin() / n).asin();
    let internal = apex - refracted;
    let sin_exit = n * internal.sin();
    if sin_exit.abs() > 1.0 {
        return None;
    }
    Some(incidence + sin_exit.asin() - apex)
}

/// Minimum deviation of a prism, `2·asin(n·sin(A/2)) − A`, reached by the
/// symmetric passage. `None` when even the symmetric ray is totally reflected
/// at the second face.
pub fn minimum_deviation(n: f64, apex: f64) -> Option<f64> {
    let sin_half = n * (apex / 2.0).sin();
    if sin_half.abs() > 1.0 {
        return None;
    }
    Some(2.0 * sin_half.asin() - apex)
}

/// Incidence angle giving the symmetric minimum-deviation passage.
pub fn minimum_deviation_incidence(n: f64, apex: f64) -> Option<f64> {
    minimum_deviation(n, apex).map(|deviation| (deviation + apex) / 2.0)
}

/// Crosses one interface from `from` into `to` (`None` means air).
///
/// The returned ray starts `offset` past the hit point along the refracted direction,
/// far enough that the next raycast does not find the same surface again, and carries
/// `intensity * (1 − R)`. Returns `None` on total internal reflection; reflecting is
/// then up to the caller.
pub fn refract_ray(
    ray: &Ray,
    hit: &RayHit,
    from: Option<&GlassMaterial>,
    to: Option<&GlassMaterial>,
    offset: f64,
) -> Option<Ray> {
    let n1 = index_of(from, ray.wavelength);
    let n2 = index_of(to, ray.wavelength);
    let direction = snell_refract(ray.direction, hit.normal, n1, n2)?;
    let cos_i = -hit.normal.dot(ray.direction);
    let transmittance = 1.0 - fresnel_reflectance(cos_i, n1, n2);
    Some(ray.redirected(
        hit.point + direction * offset,
        direction,
        ray.intensity * transmittance,
    ))
}

/// The part of a ray reflected back at an interface it refracted through:
/// `intensity * R`. Used when partial reflections are traced as separate rays.
pub fn partial_reflection(
    ray: &Ray,
    hit: &RayHit,
    from: Option<&GlassMaterial>,
    to: Option<&GlassMaterial>,
    offset: f64,
) -> Ray {
    let n1 = index_of(from, ray.wavelength);
    let n2 = index_of(to, ray.wavelength);
    let cos_i = -hit.normal.dot(ray.direction);
    let reflectance = fresnel_reflectance(cos_i, n1, n2);
    let direction = reflect(ray.direction, hit.normal);
    ray.redirected(
        hit.point + direction * offset,
        direction,
        ray.intensity * reflectance,
    )
}

/// Mirrors a totally reflected ray at `hit`, losing the fraction `loss` of its
/// intensity to surface imperfections. Shared by the solid tracer and the scene
/// tracer's recovery of trapped rays.
pub fn attempt_tir_reflection(ray: &Ray, hit: &RayHit, loss: f64, offset: f64) -> Ray {
    let direction = reflect(ray.direction, hit.normal);
    ray.redirected(
        hit.point + direction * offset,
        direction,
        ray.intensity * (1.0 - loss),
    )
}
