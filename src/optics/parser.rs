//! Reader for the scene description format.
//!
//! ```text
//! bounds (-50,-50,-50) (50,50,50)
//! backdrop (0,0,20) (0,0,-1)
//! glass "crown" 1.04 0.23 1.01 0.006 0.02 103.5 1.517
//! prism splitter: bk7 60 2 2 > rotate (0,1,0) -19.3 > translate (0,0,1)
//! wall (1,1,0.2) > translate (3,0,5)
//! light (0,0,-5) (0,0,1) 7
//! light (0,1,-5) (0,0,1) 7 jitter 42
//! ```
//!
//! A `light` with `jitter <seed>` draws one random wavelength per visible sub-band
//! instead of spacing them evenly; the same seed gives the same rays.
//! Rotations are in degrees. Glasses are referenced by catalog name (`bk7`) or by
//! the quoted name of a `glass` declared earlier in the file.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use super::config::TraceConfig;
use super::glass::GlassMaterial;
use super::math::{Box3, Mat4, Ray, Vec3};
use super::solid::{OpaqueBlocker, OpticalSolid, SolidKind};
use super::spectrum::LightSource;
use super::system::{Backdrop, OpticalSystem};

pub struct SceneParser {
    content: Vec<char>,
    buffer: String,
    position: FilePosition,
    token_start: FilePosition,
    base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FilePosition {
    line: usize,
    column: usize,
    index: usize,
}

impl FilePosition {
    fn new() -> Self {
        FilePosition {
            line: 0,
            column: 0,
            index: 0,
        }
    }

    fn on_new_line(&mut self) {
        self.line += 1;
        self.column = 0;
        self.index += 1;
    }

    fn advance(&mut self) {
        self.column += 1;
        self.index += 1;
    }
}

/// A syntax or content error, with the 1-based position of the offending token.
#[derive(Debug, Error)]
#[error("{message} at {line}:{column}")]
pub struct ParserError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParserError {
    fn new(message: &str, position: FilePosition) -> ParserError {
        ParserError {
            message: message.to_string(),
            line: position.line + 1,
            column: position.column + 1,
        }
    }

    /// Prints the error followed by the faulty line and a caret under the token.
    pub fn print_error_location(&self, content: &str) {
        eprintln!("{}", self);
        if let Some(line) = content.lines().nth(self.line - 1) {
            eprintln!("{}", line);
            let spacing = " ".repeat(self.column - 1);
            eprintln!("{}^", spacing);
        }
    }
}

type ParserResult<T> = Result<T, ParserError>;

/// Everything a scene file describes: the frozen system and the rays to shoot at it.
#[derive(Debug, Clone)]
pub struct SceneDescription {
    pub system: OpticalSystem,
    pub rays: Vec<Ray>,
}

#[derive(Default)]
struct SceneBuilder {
    config: TraceConfig,
    solids: Vec<OpticalSolid>,
    blockers: Vec<OpaqueBlocker>,
    backdrop: Option<Backdrop>,
    rays: Vec<Ray>,
    glasses: HashMap<String, Arc<GlassMaterial>>,
}

impl SceneBuilder {
    fn build(self) -> SceneDescription {
        let mut system = OpticalSystem::new(self.config);
        for solid in self.solids {
            system.add_solid(solid);
        }
        for blocker in self.blockers {
            system.add_blocker(blocker);
        }
        system.set_backdrop(self.backdrop);
        SceneDescription {
            system,
            rays: self.rays,
        }
    }
}

impl SceneParser {
    pub fn new(content: &str) -> SceneParser {
        SceneParser {
            content: content.chars().collect(),
            buffer: String::new(),
            position: FilePosition::new(),
            token_start: FilePosition::new(),
            base_dir: None,
        }
    }

    /// Relative model paths are resolved against `dir` instead of the working directory.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> SceneParser {
        self.base_dir = Some(dir.into());
        self
    }

    fn get_current_char(&self) -> Option<char> {
        self.content.get(self.position.index).copied()
    }

    fn is_empty(&mut self) -> bool {
        self.peek().is_empty()
    }

    fn advance(&mut self) {
        if let Some(current_char) = self.get_current_char() {
            if current_char == '\n' {
                self.position.on_new_line();
            } else {
                self.position.advance();
            }
        }
    }

    fn advance_until(&mut self, f: impl Fn(char) -> bool) {
        while let Some(current_char) = self.get_current_char() {
            if f(current_char) {
                break;
            }
            self.advance();
        }
    }

    fn eat_spaces(&mut self) {
        // empty lines, spaces and comments before the next token
        while let Some(current_char) = self.get_current_char() {
            if current_char == '#' {
                // the end-of-line is consumed below
                self.advance_until(|c| c == '\n');
            } else if !current_char.is_whitespace() {
                break;
            }
            self.advance();
        }
    }

    /// Pushes the current char to `result`, advances and returns the next char.
    fn enqueue(&mut self, result: &mut String) -> Option<char> {
        if let Some(current_char) = self.get_current_char() {
            result.push(current_char);
            self.advance();
        }
        self.get_current_char()
    }

    fn pop(&mut self) -> String {
        // a peeked token is still waiting in the buffer
        if !self.buffer.is_empty() {
            return std::mem::take(&mut self.buffer);
        }

        self.eat_spaces();
        self.token_start = self.position;
        let mut result = String::new();
        let Some(first) = self.get_current_char() else {
            return result;
        };

        match first {
            ',' | '(' | ')' | ':' | '>' => {
                self.enqueue(&mut result);
            }
            '"' => {
                // no escapes
                let mut next = self.enqueue(&mut result);
                while let Some(c) = next {
                    next = self.enqueue(&mut result);
                    if c == '"' {
                        break;
                    }
                }
            }
            '.' | '+' | '-' | '0'..='9' => {
                let mut next = self.enqueue(&mut result);
                while let Some(c) = next.filter(|c| c.is_ascii_digit() || *c == '.' || *c == 'e') {
                    next = self.enqueue(&mut result);
                    // exponent sign
                    if c == 'e' && matches!(next, Some('+') | Some('-')) {
                        next = self.enqueue(&mut result);
                    }
                }
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut next = Some(c);
                while next.map_or(false, |c| c.is_alphanumeric() || c == '_') {
                    next = self.enqueue(&mut result);
                }
            }
            _ => {
                self.enqueue(&mut result);
            }
        }
        result
    }

    fn peek(&mut self) -> &str {
        if self.buffer.is_empty() {
            self.buffer = self.pop();
        }
        &self.buffer
    }

    fn error<T>(&self, message: &str) -> ParserResult<T> {
        Err(ParserError::new(message, self.token_start))
    }

    fn parse_float(&mut self) -> ParserResult<f64> {
        let next_token = self.pop();
        match next_token.parse::<f64>() {
            Ok(num) if num.is_finite() => Ok(num),
            _ => self.error(&format!("cannot interpret '{}' as a number", next_token)),
        }
    }

    fn parse_positive(&mut self, what: &str) -> ParserResult<f64> {
        let value = self.parse_float()?;
        if value <= 0.0 {
            return self.error(&format!("{} must be positive, got {}", what, value));
        }
        Ok(value)
    }

    fn parse_count(&mut self) -> ParserResult<usize> {
        let value = self.parse_float()?;
        if value < 0.0 || value.fract() != 0.0 {
            return self.error(&format!("expected a whole number, got {}", value));
        }
        Ok(value as usize)
    }

    fn match_token(&mut self, expected_lexem: &str) -> ParserResult<()> {
        let next_lexem = self.pop();
        if next_lexem != expected_lexem {
            self.error(&format!(
                "expected '{}', getting '{}' instead",
                expected_lexem, next_lexem
            ))
        } else {
            Ok(())
        }
    }

    /// Consumes the next lexem only if it is `expected_lexem`.
    fn maybe_match(&mut self, expected_lexem: &str) -> bool {
        if self.peek() == expected_lexem {
            self.pop();
            return true;
        }
        false
    }

    fn parse_vec3(&mut self) -> ParserResult<Vec3> {
        self.match_token("(")?;
        let x = self.parse_float()?;
        self.match_token(",")?;
        let y = self.parse_float()?;
        self.match_token(",")?;
        let z = self.parse_float()?;
        self.match_token(")")?;
        Ok(Vec3::new(x, y, z))
    }

    fn parse_direction(&mut self) -> ParserResult<Vec3> {
        let direction = self.parse_vec3()?;
        if direction.squared_len() == 0.0 {
            return self.error("direction must not be zero");
        }
        Ok(direction)
    }

    fn parse_string(&mut self) -> ParserResult<String> {
        let next_token = self.pop();
        match next_token
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
        {
            Some(inner) => Ok(inner.to_string()),
            None => self.error(&format!("expected a quoted string, getting '{}'", next_token)),
        }
    }

    fn parse_kind(&mut self) -> ParserResult<SolidKind> {
        let kind = if self.maybe_match("splitter") {
            SolidKind::Splitter
        } else if self.maybe_match("director") {
            SolidKind::Director
        } else {
            return Ok(SolidKind::Director);
        };
        self.match_token(":")?;
        Ok(kind)
    }

    fn parse_glass_ref(
        &mut self,
        glasses: &HashMap<String, Arc<GlassMaterial>>,
    ) -> ParserResult<Arc<GlassMaterial>> {
        let name = if self.peek().starts_with('"') {
            self.parse_string()?
        } else {
            self.pop()
        };
        if let Some(glass) = glasses.get(&name) {
            return Ok(Arc::clone(glass));
        }
        match GlassMaterial::by_name(&name) {
            Some(glass) => Ok(glass.shared()),
            None => self.error(&format!("unknown glass '{}'", name)),
        }
    }

    fn parse_transformation(&mut self) -> ParserResult<Mat4> {
        let mut transform = Mat4::identity();
        while self.maybe_match(">") {
            let next_transform = match self.pop().as_str() {
                "scale" => Mat4::scale(self.parse_positive("scale factor")?),
                "translate" => Mat4::translate(self.parse_vec3()?),
                "rotate" => {
                    let axis = self.parse_direction()?;
                    let degrees = self.parse_float()?;
                    Mat4::rotate(axis, degrees.to_radians())
                }
                other => return self.error(&format!("unexpected transform '{}'", other)),
            };
            transform = transform.then(&next_transform);
        }
        Ok(transform)
    }

    fn parse_glass(&mut self, scene: &mut SceneBuilder) -> ParserResult<()> {
        self.match_token("glass")?;
        let name = self.parse_string()?;
        let mut coefficients = [0.0; 7];
        for value in coefficients.iter_mut() {
            *value = self.parse_float()?;
        }
        let [b1, b2, b3, c1, c2, c3, nd] = coefficients;
        let glass = GlassMaterial::new(&name, [b1, b2, b3], [c1, c2, c3], nd);
        scene.glasses.insert(name, glass.shared());
        Ok(())
    }

    /// Keeps a generated solid only if its geometry is sound.
    fn push_solid(scene: &mut SceneBuilder, solid: OpticalSolid, what: &str) {
        match solid.validate() {
            Ok(()) => scene.solids.push(solid),
            Err(err) => warn!("skipping {}: {}", what, err),
        }
    }

    fn parse_prism(&mut self, scene: &mut SceneBuilder) -> ParserResult<()> {
        self.match_token("prism")?;
        let kind = self.parse_kind()?;
        let glass = self.parse_glass_ref(&scene.glasses)?;
        let apex = self.parse_positive("apex angle")?;
        if apex >= 180.0 {
            return self.error("apex angle must be below 180 degrees");
        }
        let side = self.parse_positive("side")?;
        let height = self.parse_positive("height")?;
        let transform = self.parse_transformation()?;
        let solid = OpticalSolid::prism(apex, side, height, transform, glass, kind);
        Self::push_solid(scene, solid, "prism");
        Ok(())
    }

    fn parse_block(&mut self, scene: &mut SceneBuilder) -> ParserResult<()> {
        self.match_token("block")?;
        let kind = self.parse_kind()?;
        let glass = self.parse_glass_ref(&scene.glasses)?;
        let size = self.parse_vec3()?;
        let transform = self.parse_transformation()?;
        let solid = OpticalSolid::block(size, transform, glass, kind);
        Self::push_solid(scene, solid, "block");
        Ok(())
    }

    fn parse_model(&mut self, scene: &mut SceneBuilder) -> ParserResult<()> {
        self.match_token("model")?;
        let path = self.parse_string()?;
        // report a bad file at the path token, not at the end of the transform
        let path_position = self.token_start;
        let kind = self.parse_kind()?;
        let glass = self.parse_glass_ref(&scene.glasses)?;
        let transform = self.parse_transformation()?;
        let full_path = match &self.base_dir {
            Some(dir) => dir.join(&path),
            None => PathBuf::from(&path),
        };
        let solid = OpticalSolid::load_obj(&full_path, transform, glass, kind).map_err(|err| {
            ParserError::new(&format!("cannot load model \"{}\": {}", path, err), path_position)
        })?;
        scene.solids.push(solid);
        Ok(())
    }

    fn parse_wall(&mut self, scene: &mut SceneBuilder) -> ParserResult<()> {
        self.match_token("wall")?;
        let size = self.parse_vec3()?;
        let transform = self.parse_transformation()?;
        scene.blockers.push(OpaqueBlocker::wall(size, &transform));
        Ok(())
    }

    fn parse_ray(&mut self, scene: &mut SceneBuilder) -> ParserResult<()> {
        self.match_token("ray")?;
        let origin = self.parse_vec3()?;
        let direction = self.parse_direction()?;
        let wavelength = self.parse_positive("wavelength")?;
        let intensity = self.parse_float()?;
        let source = LightSource::monochromatic(origin, direction, wavelength, intensity);
        scene.rays.extend(source.emit());
        Ok(())
    }

    fn parse_light(&mut self, scene: &mut SceneBuilder) -> ParserResult<()> {
        self.match_token("light")?;
        let origin = self.parse_vec3()?;
        let direction = self.parse_direction()?;
        let samples = self.parse_count()?;
        let source = if self.maybe_match("jitter") {
            let seed = self.parse_count()? as u64;
            let mut rng = StdRng::seed_from_u64(seed);
            LightSource::jittered(origin, direction, samples, &mut rng)
        } else {
            LightSource::white(origin, direction, samples)
        };
        scene.rays.extend(source.emit());
        Ok(())
    }

    /// Parses the whole file.
    pub fn parse_scene(&mut self) -> ParserResult<SceneDescription> {
        let mut scene = SceneBuilder::default();
        while !self.is_empty() {
            match self.peek() {
                "bounds" => {
                    self.pop();
                    let a = self.parse_vec3()?;
                    let b = self.parse_vec3()?;
                    scene.config.bounds = Box3::from_min_max(a.min(b), a.max(b));
                }
                "backdrop" => {
                    self.pop();
                    let point = self.parse_vec3()?;
                    let normal = self.parse_direction()?;
                    scene.backdrop = Some(Backdrop::new(point, normal));
                }
                "max_bounces" => {
                    self.pop();
                    scene.config.max_bounces = self.parse_count()?;
                }
                "min_intensity" => {
                    self.pop();
                    scene.config.min_intensity = self.parse_float()?;
                }
                "reflections" => {
                    self.pop();
                    scene.config.trace_partial_reflections = true;
                }
                "glass" => self.parse_glass(&mut scene)?,
                "prism" => self.parse_prism(&mut scene)?,
                "block" => self.parse_block(&mut scene)?,
                "model" => self.parse_model(&mut scene)?,
                "wall" => self.parse_wall(&mut scene)?,
                "ray" => self.parse_ray(&mut scene)?,
                "light" => self.parse_light(&mut scene)?,
                _ => {
                    let token = self.pop();
                    return self.error(&format!("unexpected token '{}'", token));
                }
            }
        }
        debug!(
            "parsed {} solids, {} walls and {} rays",
            scene.solids.len(),
            scene.blockers.len(),
            scene.rays.len()
        );
        Ok(scene.build())
    }
}
