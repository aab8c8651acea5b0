use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use log::{info, LevelFilter};

use prism_tracer::optics::diagnostics::dispersion_table;
use prism_tracer::optics::parser::{SceneDescription, SceneParser};
use prism_tracer::optics::spectrum::{sample_wavelengths, VISIBLE};
use prism_tracer::optics::{backdrop_hits, trace, GlassMaterial, RayPath};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the input path to the scene file
    scene: Option<String>,
    /// override the scene-level bounce limit
    #[arg(long)]
    max_bounces: Option<usize>,
    /// override the intensity below which rays are dropped
    #[arg(long)]
    min_intensity: Option<f64>,
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
    /// print the dispersion table of a catalog glass
    #[arg(long)]
    table: Option<String>,
    /// apex angle in degrees used by --table
    #[arg(long, default_value_t = 60.0)]
    apex: f64,
}

fn print_table(name: &str, apex: f64) -> Result<(), Box<dyn Error>> {
    let glass =
        GlassMaterial::by_name(name).ok_or_else(|| format!("unknown glass '{}'", name))?;
    println!(
        "{}  nd {:.5}  Abbe {:.2}  apex {}°",
        glass.name,
        glass.nd,
        glass.abbe_number(),
        apex
    );
    println!("  λ (nm)        n    dn/dλ (1/nm)   min dev (°)");
    let wavelengths = sample_wavelengths(9, *VISIBLE.start(), *VISIBLE.end());
    for row in dispersion_table(&glass, apex, &wavelengths) {
        let deviation = row
            .min_deviation
            .map_or("TIR".to_string(), |deviation| format!("{:.3}", deviation));
        println!(
            "{:8.1} {:8.5} {:14.3e} {:>13}",
            row.wavelength, row.index, row.dn_dlambda, deviation
        );
    }
    Ok(())
}

fn print_path(index: usize, path: &RayPath) {
    let position = path
        .final_position
        .map_or("-".to_string(), |p| format!("({:.3}, {:.3}, {:.3})", p.x, p.y, p.z));
    println!(
        "#{:<4} {:6.1} nm  {:?}  segments {:<3} intensity {:.4}  at {}",
        index,
        path.wavelength,
        path.end,
        path.segments.len(),
        path.intensity,
        position
    );
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::Builder::from_default_env()
        .filter_level(args.log_level.into())
        .init();

    if let Some(name) = &args.table {
        print_table(name, args.apex)?;
    }
    let Some(scene_path) = &args.scene else {
        if args.table.is_none() {
            return Err(Box::from("nothing to do: give a scene file or --table"));
        }
        return Ok(());
    };

    let content = fs::read_to_string(scene_path)?;
    let mut parser = SceneParser::new(&content);
    if let Some(dir) = Path::new(scene_path).parent() {
        parser = parser.with_base_dir(dir);
    }
    let SceneDescription { mut system, rays } = match parser.parse_scene() {
        Ok(scene) => scene,
        Err(parser_error) => {
            parser_error.print_error_location(&content);
            return Err(Box::from(format!("parser error {}", parser_error.message)));
        }
    };

    if let Some(max_bounces) = args.max_bounces {
        system.config_mut().max_bounces = max_bounces;
    }
    if let Some(min_intensity) = args.min_intensity {
        system.config_mut().min_intensity = min_intensity;
    }
    info!(
        "tracing {} rays through {} solids and {} walls",
        rays.len(),
        system.solids().len(),
        system.blockers().len()
    );

    let start = Instant::now();
    let paths = trace(&system, rays);
    let total_time = start.elapsed();

    for (index, path) in paths.iter().enumerate() {
        print_path(index, path);
    }
    let hits: Vec<_> = backdrop_hits(&paths).collect();
    println!("{} rays reached the backdrop", hits.len());
    for hit in &hits {
        println!(
            "  {:6.1} nm at ({:.4}, {:.4}, {:.4}) intensity {:.4}",
            hit.wavelength, hit.point.x, hit.point.y, hit.point.z, hit.intensity
        );
    }
    println!("Traced {} paths in {:?}", paths.len(), total_time);
    Ok(())
}
