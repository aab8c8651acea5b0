use std::error::Error;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use prism_tracer::optics::glass::AIR_INDEX;
use prism_tracer::optics::parser::{SceneDescription, SceneParser};
use prism_tracer::optics::physics::{
    fresnel_reflectance, minimum_deviation, minimum_deviation_incidence,
};
use prism_tracer::optics::spectrum::LightSource;
use prism_tracer::optics::{
    backdrop_hits, trace, Backdrop, Box3, GlassMaterial, HitKind, Mat4, OpticalSolid,
    OpticalSystem, PathEnd, Ray, SolidKind, TraceConfig, Vec3,
};

const APEX_DEG: f64 = 60.0;

/// Rotation about Y that puts a +Z ray at the minimum-deviation incidence of the
/// entry face of a `triangular_prism`.
fn minimum_deviation_rotation(glass: &GlassMaterial, wavelength: f64) -> Mat4 {
    let apex = APEX_DEG.to_radians();
    let n = glass.refractive_index(wavelength) / AIR_INDEX;
    let incidence = minimum_deviation_incidence(n, apex).unwrap();
    Mat4::rotate(Vec3::y_axis(), -(incidence - apex / 2.0))
}

/// Prism turned to minimum deviation for 589 nm, with a screen at z = 20.
fn prism_bench() -> (OpticalSystem, Ray) {
    let glass = GlassMaterial::bk7();
    let rotation = minimum_deviation_rotation(&glass, 589.0);
    let mut system = OpticalSystem::new(TraceConfig::default());
    system.add_solid(OpticalSolid::prism(
        APEX_DEG,
        2.0,
        2.0,
        rotation,
        glass.shared(),
        SolidKind::Splitter,
    ));
    system.set_backdrop(Some(Backdrop::new(Vec3::new(0.0, 0.0, 20.0), -Vec3::z_axis())));

    // aim at the middle of the entry face, slightly above the prism mid-plane
    let half_apex = APEX_DEG.to_radians() / 2.0;
    let face_center = rotation.apply(Vec3::new(
        2.0 * half_apex.cos() / 6.0,
        0.0,
        -2.0 * half_apex.sin() / 2.0,
    ));
    let ray = Ray::new(Vec3::new(face_center.x, 0.1, -5.0), Vec3::z_axis(), 589.0, 1.0);
    (system, ray)
}

#[test]
fn bk7_prism_at_minimum_deviation() {
    let (system, ray) = prism_bench();
    let paths = trace(&system, vec![ray]);
    assert_eq!(paths.len(), 1);
    let path = &paths[0];
    assert_eq!(path.end, PathEnd::Backdrop);
    let kinds: Vec<HitKind> = path.segments.iter().map(|s| s.hit).collect();
    assert_eq!(kinds, vec![HitKind::Solid, HitKind::Solid, HitKind::Backdrop]);

    let glass = GlassMaterial::bk7();
    let n = glass.refractive_index(589.0);
    let half_apex = APEX_DEG.to_radians() / 2.0;
    let expected = minimum_deviation(n / AIR_INDEX, APEX_DEG.to_radians()).unwrap();
    let exit = &path.segments[2].ray;
    let deviation = exit.direction.angle_to(Vec3::z_axis());
    assert!((deviation - expected).abs() < 1e-9, "{} vs {}", deviation, expected);
    // deviated away from the apex
    assert!(exit.direction.x < 0.0);
    assert!(exit.direction.y.abs() < 1e-12);

    let incidence = minimum_deviation_incidence(n / AIR_INDEX, 2.0 * half_apex).unwrap();
    let r_in = fresnel_reflectance(incidence.cos(), AIR_INDEX, n);
    let r_out = fresnel_reflectance(half_apex.cos(), n, AIR_INDEX);
    assert!((path.intensity - (1.0 - r_in) * (1.0 - r_out)).abs() < 1e-9);
}

#[test]
fn white_light_fans_out_on_the_backdrop() {
    let (system, ray) = prism_bench();
    let source = LightSource::white(ray.origin, ray.direction, 9);
    let paths = trace(&system, source.emit());
    let hits: Vec<_> = backdrop_hits(&paths).collect();
    assert_eq!(hits.len(), 9);
    // shorter wavelengths are bent further towards -x
    for pair in hits.windows(2) {
        assert!(pair[0].wavelength < pair[1].wavelength);
        assert!(pair[0].point.x < pair[1].point.x);
    }
    let spread = hits[8].point.x - hits[0].point.x;
    assert!(spread > 0.1, "spread {}", spread);
}

#[test]
fn parallel_slab_keeps_direction() {
    let mut system = OpticalSystem::new(TraceConfig::default());
    let tilt = Mat4::rotate(Vec3::new(1.0, 0.3, 0.0), 0.4);
    system.add_solid(OpticalSolid::block(
        Vec3::new(6.0, 6.0, 1.0),
        tilt,
        GlassMaterial::sf11().shared(),
        SolidKind::Director,
    ));
    for direction in [Vec3::new(0.1, 0.05, 1.0), Vec3::new(-0.3, 0.2, 1.0), Vec3::z_axis()] {
        let ray = Ray::new(Vec3::new(0.13, -0.21, -6.0), direction, 480.0, 1.0);
        let path = &trace(&system, vec![ray.clone()])[0];
        assert_eq!(path.end, PathEnd::Escaped);
        let last = path.segments.last().unwrap();
        assert!(last.ray.direction.angle_to(ray.direction) < 1e-4);
        assert_eq!(path.segments.len(), 3);

        let normal = tilt.apply_vector(Vec3::z_axis()).normalize();
        let n = GlassMaterial::sf11().refractive_index(480.0);
        let cos_in = ray.direction.dot(normal).abs();
        let sin_inside = AIR_INDEX / n * (1.0 - cos_in * cos_in).sqrt();
        let cos_inside = (1.0 - sin_inside * sin_inside).sqrt();
        let transmittance = (1.0 - fresnel_reflectance(cos_in, AIR_INDEX, n))
            * (1.0 - fresnel_reflectance(cos_inside, n, AIR_INDEX));
        assert!((last.ray.intensity - transmittance).abs() < 1e-9);
        // laterally displaced unless the ray hits the slab square on
        let offset = (last.ray.origin - ray.origin).cross(ray.direction).len();
        assert!(offset > 1e-6);
    }
}

#[test]
fn rays_outside_bounds_escape() {
    let (mut system, ray) = prism_bench();
    system.config_mut().bounds = Box3::new(Vec3::zero(), Vec3::splat(3.0));
    let path = &trace(&system, vec![ray])[0];
    assert_eq!(path.end, PathEnd::Escaped);
    assert_eq!(path.intensity, 0.0);
    assert_eq!(path.final_position, None);
}

#[test]
fn tracing_is_repeatable() {
    let (system, ray) = prism_bench();
    let source = LightSource::white(ray.origin, ray.direction, 5);
    assert_eq!(trace(&system, source.emit()), trace(&system, source.emit()));
}

#[test]
fn random_rays_terminate_within_limits() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let config = TraceConfig::default().with_partial_reflections(true);
    let mut system = OpticalSystem::new(config.clone());
    system.add_solid(OpticalSolid::prism(
        60.0,
        2.0,
        2.0,
        Mat4::rotate(Vec3::y_axis(), 0.3),
        GlassMaterial::f2().shared(),
        SolidKind::Splitter,
    ));
    system.add_solid(OpticalSolid::block(
        Vec3::new(1.0, 2.0, 0.5),
        Mat4::translate(Vec3::new(0.0, 0.0, 4.0)),
        GlassMaterial::bak1().shared(),
        SolidKind::Director,
    ));
    system.set_backdrop(Some(Backdrop::new(Vec3::new(0.0, 0.0, 15.0), -Vec3::z_axis())));

    let rays: Vec<Ray> = (0..200)
        .map(|_| {
            let origin = Vec3::new(
                rng.gen_range(-3.0..3.0),
                rng.gen_range(-3.0..3.0),
                rng.gen_range(-8.0..-4.0),
            );
            let target = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..5.0),
            );
            Ray::new(origin, target - origin, rng.gen_range(380.0..780.0), 1.0)
        })
        .collect();

    let paths = trace(&system, rays);
    assert!(paths.len() >= 200 && paths.len() <= config.max_rays);
    let max_segments = config.max_bounces * (config.max_solid_bounces + 2) + 1;
    for path in &paths {
        assert!(path.segments.len() <= max_segments);
        assert!((0.0..=1.0).contains(&path.intensity));
        for segment in &path.segments {
            assert!(segment.start.is_finite() && segment.end.is_finite());
            assert!((segment.ray.direction.len() - 1.0).abs() < 1e-9);
        }
    }
}

#[test]
fn shipped_shapes_stay_valid_under_random_placement() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..50 {
        let axis = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 1.0);
        let placement = Mat4::scale(rng.gen_range(0.2..5.0))
            .then(&Mat4::rotate(axis, rng.gen_range(-3.0..3.0)))
            .then(&Mat4::translate(Vec3::new(
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-20.0..20.0),
            )));
        let prism = OpticalSolid::prism(
            rng.gen_range(10.0..150.0),
            rng.gen_range(0.5..4.0),
            rng.gen_range(0.5..4.0),
            placement,
            GlassMaterial::bk7().shared(),
            SolidKind::Splitter,
        );
        prism.validate().unwrap();
        let size = Vec3::new(
            rng.gen_range(0.1..5.0),
            rng.gen_range(0.1..5.0),
            rng.gen_range(0.1..5.0),
        );
        let glass = GlassMaterial::f2().shared();
        let block = OpticalSolid::block(size, placement, glass, SolidKind::Director);
        block.validate().unwrap();
    }
}

#[test]
fn parsed_scene_reaches_the_backdrop() -> Result<(), Box<dyn Error>> {
    let content = "
        backdrop (0,0,20) (0,0,-1)
        prism splitter: bk7 60 2 2 > rotate (0,1,0) -18.6
        ray (0.4,0.1,-5) (0,0,1) 589 1
    ";
    let SceneDescription { system, rays } = SceneParser::new(content).parse_scene()?;
    let paths = trace(&system, rays);
    assert_eq!(paths[0].end, PathEnd::Backdrop);
    let deviation = paths[0].segments.last().unwrap().ray.direction.angle_to(Vec3::z_axis());
    // close to but not exactly at minimum deviation
    assert!((deviation.to_degrees() - 38.6).abs() < 0.1);
    Ok(())
}
