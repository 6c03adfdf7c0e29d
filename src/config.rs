use std::path::{Path, PathBuf};

use crate::error::{ComposeError, ComposeResult};
use crate::feed::FeedSource;
use crate::layout::DEFAULT_LINE_SPACING;
use crate::speaker_images::DEFAULT_SPEAKER_IMAGES_DIR;

pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";
pub const DEFAULT_TEMPLATES_DIR: &str = "assets/templates";

/// Run-wide settings, filled from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub artifacts_dir: PathBuf,
    pub speaker_images_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub feed: FeedSource,
    pub width: Option<u32>,
    pub line_spacing: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            speaker_images_dir: PathBuf::from(DEFAULT_SPEAKER_IMAGES_DIR),
            templates_dir: PathBuf::from(DEFAULT_TEMPLATES_DIR),
            feed: FeedSource::default(),
            width: None,
            line_spacing: DEFAULT_LINE_SPACING,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> ComposeResult<()> {
        if !self.line_spacing.is_finite() || self.line_spacing <= 0.0 {
            return Err(ComposeError::config(format!(
                "line spacing must be a positive number, got {}",
                self.line_spacing
            )));
        }
        Ok(())
    }

    /// Where the card for `event_id` is written.
    ///
    /// Without an explicit name: `<artifacts>/<id>.jpg`, or `<id>-<width>.jpg`
    /// when resizing. A width of 0 means no resize. A bare file name goes under the artifacts directory; a
    /// name containing `/` or starting with `.` is used as given.
    pub fn output_path_for(&self, event_id: i64, explicit: Option<&str>) -> PathBuf {
        match explicit.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) if name.contains('/') || name.starts_with('.') => PathBuf::from(name),
            Some(name) => self.artifacts_dir.join(name),
            None => {
                let file_name = match self.width.filter(|width| *width > 0) {
                    Some(width) => format!("{event_id}-{width}.jpg"),
                    None => format!("{event_id}.jpg"),
                };
                self.artifacts_dir.join(file_name)
            }
        }
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }
}
