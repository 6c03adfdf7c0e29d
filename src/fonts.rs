use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::OnceLock;

use fontdue::{Font, FontSettings};

use crate::error::{ComposeError, ComposeResult};

/// Fixed-width face used when a template font reports zero advances.
const FALLBACK_FONT_BYTES: &[u8] = include_bytes!("../assets/fonts/DejaVuSansMono.ttf");
const FALLBACK_ADVANCE_EM: f32 = 0.6;

static FALLBACK_FACE: OnceLock<Option<Font>> = OnceLock::new();

/// A parsed font plus the path it came from.
///
/// Sizes are points at 72 DPI, so one point is one pixel.
pub struct FontHandle {
    path: PathBuf,
    font: Font,
}

impl fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontHandle")
            .field("path", &self.path)
            .field("glyphs", &self.font.glyph_count())
            .finish()
    }
}

impl FontHandle {
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> ComposeResult<Self> {
        let path = path.into();
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|error| {
            ComposeError::FontLoad {
                path: path.clone(),
                message: error.to_owned(),
            }
        })?;
        Ok(Self { path, font })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn font(&self) -> &Font {
        &self.font
    }

    /// Pixel width of `text` at `size_pt` using hinted (whole pixel) glyph
    /// advances and kerning.
    ///
    /// A zero result for non-empty text means the face is unusable for this
    /// string; the built-in fixed-width face is measured instead.
    pub fn measure_width(&self, text: &str, size_pt: f32) -> f32 {
        let width = hinted_advance(&self.font, text, size_pt);
        if width == 0.0 && !text.is_empty() {
            return fallback_width(text, size_pt);
        }
        width
    }

    pub fn missing_glyphs(&self, text: &str) -> Vec<char> {
        let mut missing = Vec::new();
        for ch in text.chars() {
            if ch.is_whitespace() {
                continue;
            }
            if self.font.lookup_glyph_index(ch) == 0 && !missing.contains(&ch) {
                missing.push(ch);
            }
        }
        missing
    }
}

pub fn load_font(path: &Path) -> ComposeResult<FontHandle> {
    let bytes = fs::read(path).map_err(|error| ComposeError::FontLoad {
        path: path.to_path_buf(),
        message: error.to_string(),
    })?;
    FontHandle::from_bytes(path, bytes)
}

fn hinted_advance(font: &Font, text: &str, size_pt: f32) -> f32 {
    let mut width = 0.0;
    let mut previous = None;
    for ch in text.chars() {
        if let Some(prev) = previous {
            if let Some(kern) = font.horizontal_kern(prev, ch, size_pt) {
                width += kern.round();
            }
        }
        width += font.metrics(ch, size_pt).advance_width.round();
        previous = Some(ch);
    }
    width
}

fn fallback_face() -> Option<&'static Font> {
    FALLBACK_FACE
        .get_or_init(|| Font::from_bytes(FALLBACK_FONT_BYTES, FontSettings::default()).ok())
        .as_ref()
}

pub fn fallback_width(text: &str, size_pt: f32) -> f32 {
    match fallback_face() {
        Some(font) => hinted_advance(font, text, size_pt),
        None => (size_pt * FALLBACK_ADVANCE_EM).round() * text.chars().count() as f32,
    }
}

/// Loaded fonts keyed by path, shared by every element of a render run.
#[derive(Debug, Default)]
pub struct FontLibrary {
    fonts: HashMap<PathBuf, Rc<FontHandle>>,
}

impl FontLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, path: &Path) -> ComposeResult<Rc<FontHandle>> {
        if let Some(handle) = self.fonts.get(path) {
            return Ok(Rc::clone(handle));
        }
        let handle = Rc::new(load_font(path)?);
        self.fonts.insert(path.to_path_buf(), Rc::clone(&handle));
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}
