use std::fs;
use std::path::PathBuf;

use crate::assets::{is_url, reference_extension};
use crate::error::{ComposeError, ComposeResult};
use crate::fetch::fetch_bytes;

pub const DEFAULT_SPEAKER_IMAGES_DIR: &str = "assets/speaker-images";

const CACHED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Keeps downloaded speaker portraits on disk as `<event>-<slot>.<ext>` so a
/// rerun does not hit the network again.
#[derive(Debug, Clone)]
pub struct SpeakerImageCache {
    dir: PathBuf,
}

impl SpeakerImageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Turns a talk's image reference into a local path.
    ///
    /// Local references are site-relative: a leading `/` is dropped so they
    /// resolve against the working directory. URLs are served from the cache
    /// when any known extension is already present, otherwise downloaded.
    pub fn resolve(&self, reference: &str, event_id: i64, slot: usize) -> ComposeResult<PathBuf> {
        if !is_url(reference) {
            return Ok(PathBuf::from(reference.trim_start_matches('/')));
        }

        let stem = format!("{event_id}-{slot}");
        if let Some(cached) = self.cached(&stem) {
            tracing::debug!(path = %cached.display(), "speaker image cache hit");
            return Ok(cached);
        }

        let fetched = fetch_bytes(reference)?;
        fs::create_dir_all(&self.dir).map_err(|source| ComposeError::Write {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.dir.join(format!(
            "{stem}.{}",
            extension_for(fetched.content_type.as_deref(), reference)
        ));
        if let Err(source) = fs::write(&path, &fetched.bytes) {
            let _ = fs::remove_file(&path);
            return Err(ComposeError::Write { path, source });
        }
        tracing::info!(url = reference, path = %path.display(), "downloaded speaker image");
        Ok(path)
    }

    fn cached(&self, stem: &str) -> Option<PathBuf> {
        CACHED_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{stem}.{ext}")))
            .find(|candidate| candidate.is_file())
    }
}

impl Default for SpeakerImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_SPEAKER_IMAGES_DIR)
    }
}

/// Extension for a downloaded image: Content-Type first, then the URL path,
/// then `jpg`.
pub fn extension_for(content_type: Option<&str>, url: &str) -> &'static str {
    match content_type {
        Some("image/png") => return "png",
        Some("image/jpeg" | "image/jpg") => return "jpg",
        Some("image/gif") => return "gif",
        Some("image/webp") => return "webp",
        _ => {}
    }
    match reference_extension(url).as_deref() {
        Some("png") => "png",
        Some("jpeg") => "jpeg",
        Some("gif") => "gif",
        Some("webp") => "webp",
        _ => "jpg",
    }
}
