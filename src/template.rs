use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::assets::is_url;
use crate::error::{ComposeError, ComposeResult};

pub const DEFAULT_TEXT_COLOR: &str = "#ffffff";

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One block of text on the card. Position and box width are fractions of the
/// final image size.
///
/// `position.y` is the baseline of the first line, not the top of its glyphs;
/// ascenders extend above it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TextElement {
    #[serde(default)]
    pub text: String,
    pub font: PathBuf,
    pub font_size: f64,
    #[serde(default = "default_color")]
    pub color: String,
    pub position: Position,
    pub box_width: f64,
}

impl Default for TextElement {
    fn default() -> Self {
        Self {
            text: String::new(),
            font: PathBuf::new(),
            font_size: 0.0,
            color: default_color(),
            position: Position::default(),
            box_width: 0.0,
        }
    }
}

fn default_color() -> String {
    DEFAULT_TEXT_COLOR.to_owned()
}

/// Placement of a circular speaker portrait: fractional center, pixel diameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SpeakerImageSpec {
    pub position: Position,
    pub size: i32,
}

/// Legacy templates also carry pixel `position`/`size` keys here; they are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BackgroundSpec {
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Template {
    #[serde(default)]
    pub background: BackgroundSpec,
    #[serde(default)]
    pub speaker1title: TextElement,
    #[serde(default)]
    pub speaker1name: TextElement,
    #[serde(default)]
    pub speaker2title: TextElement,
    #[serde(default)]
    pub speaker2name: TextElement,
    #[serde(default)]
    pub sponsor: TextElement,
    #[serde(default)]
    pub date: TextElement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<TextElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker1image: Option<SpeakerImageSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker2image: Option<SpeakerImageSpec>,
}

impl Template {
    pub fn parse(contents: &str, origin: &Path) -> ComposeResult<Self> {
        let template: Template =
            serde_json::from_str(contents).map_err(|error| ComposeError::TemplateParse {
                path: origin.to_path_buf(),
                message: format!("line {}, column {}: {error}", error.line(), error.column()),
            })?;
        template
            .validate()
            .map_err(|message| ComposeError::TemplateParse {
                path: origin.to_path_buf(),
                message,
            })?;
        Ok(template)
    }

    /// Named text elements in paint order; the optional event title comes last.
    pub fn text_elements(&self) -> Vec<(&'static str, &TextElement)> {
        let mut elements = vec![
            ("speaker1title", &self.speaker1title),
            ("speaker1name", &self.speaker1name),
            ("speaker2title", &self.speaker2title),
            ("speaker2name", &self.speaker2name),
            ("sponsor", &self.sponsor),
            ("date", &self.date),
        ];
        if let Some(title) = &self.title {
            elements.push(("title", title));
        }
        elements
    }

    fn text_elements_mut(&mut self) -> Vec<(&'static str, &mut TextElement)> {
        let mut elements = vec![
            ("speaker1title", &mut self.speaker1title),
            ("speaker1name", &mut self.speaker1name),
            ("speaker2title", &mut self.speaker2title),
            ("speaker2name", &mut self.speaker2name),
            ("sponsor", &mut self.sponsor),
            ("date", &mut self.date),
        ];
        if let Some(title) = &mut self.title {
            elements.push(("title", title));
        }
        elements
    }

    pub fn speaker_image(&self, slot: usize) -> Option<&SpeakerImageSpec> {
        match slot {
            1 => self.speaker1image.as_ref(),
            2 => self.speaker2image.as_ref(),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), String> {
        for (name, element) in self.text_elements() {
            check_fraction(name, "position.x", element.position.x)?;
            check_fraction(name, "position.y", element.position.y)?;
            check_fraction(name, "boxWidth", element.box_width)?;
            if !element.font_size.is_finite() || element.font_size < 0.0 {
                return Err(format!(
                    "{name}.fontSize must be a non-negative number, got {}",
                    element.font_size
                ));
            }
        }
        for (name, spec) in [
            ("speaker1image", self.speaker1image.as_ref()),
            ("speaker2image", self.speaker2image.as_ref()),
        ] {
            if let Some(spec) = spec {
                check_fraction(name, "position.x", spec.position.x)?;
                check_fraction(name, "position.y", spec.position.y)?;
            }
        }
        Ok(())
    }

    /// Rewrites relative font and background paths to point next to the
    /// template file when such a file exists there.
    fn resolve_paths(&mut self, template_dir: &Path) {
        for (_, element) in self.text_elements_mut() {
            if let Some(resolved) = resolve_beside(template_dir, &element.font) {
                element.font = resolved;
            }
        }
        let background = &self.background.image;
        if !background.is_empty() && !is_url(background) {
            if let Some(resolved) = resolve_beside(template_dir, Path::new(background)) {
                self.background.image = resolved.to_string_lossy().into_owned();
            }
        }
    }
}

fn check_fraction(element: &str, field: &str, value: f64) -> Result<(), String> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!(
            "{element}.{field} must be a fraction in [0, 1], got {value}"
        ))
    }
}

fn resolve_beside(template_dir: &Path, path: &Path) -> Option<PathBuf> {
    if path.as_os_str().is_empty() || path.is_absolute() {
        return None;
    }
    let candidate = template_dir.join(path);
    candidate.is_file().then_some(candidate)
}

pub fn load_template(path: &Path) -> ComposeResult<Template> {
    let contents = fs::read_to_string(path).map_err(|error| ComposeError::TemplateParse {
        path: path.to_path_buf(),
        message: format!("unreadable: {error}"),
    })?;
    let mut template = Template::parse(&contents, path)?;
    let template_dir = path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    template.resolve_paths(&template_dir);
    Ok(template)
}

/// Files directly inside `dir`, sorted by name.
pub fn list_templates(dir: &Path) -> ComposeResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| ComposeError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut templates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ComposeError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let is_file = entry
            .file_type()
            .map(|file_type| file_type.is_file())
            .unwrap_or(false);
        if is_file {
            templates.push(entry.path());
        }
    }
    templates.sort();
    Ok(templates)
}
