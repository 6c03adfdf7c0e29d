use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::assets::{ensure_parent_dir, persist_canvas, ImageLoader};
use crate::circular::place_circular;
use crate::compositor::{compose_base, Canvas};
use crate::error::{ComposeError, ComposeResult};
use crate::feed::{EventRecord, ResolvedEventData};
use crate::fonts::{fallback_width, FontHandle, FontLibrary};
use crate::layout::{layout_element, layout_pair, ElementLayout, DEFAULT_LINE_SPACING};
use crate::resolve::{apply_overrides, resize_to_width};
use crate::speaker_images::SpeakerImageCache;
use crate::template::{Template, TextElement};
use crate::text_painter::TextPainter;
use crate::wrap::TextMeasure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Something that went wrong with one element while the image was still
/// produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn error(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

/// Everything about a render that stays the same from one event to the next.
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// Without a template only the background and overlays are drawn.
    pub template: Option<Template>,
    /// Used only when the template names no background.
    pub background: Option<String>,
    pub overlays: Vec<String>,
    pub width: Option<u32>,
    pub line_spacing: f64,
}

impl RenderJob {
    pub fn new(template: Template) -> Self {
        Self {
            template: Some(template),
            ..Self::without_template()
        }
    }

    pub fn without_template() -> Self {
        Self {
            template: None,
            background: None,
            overlays: Vec::new(),
            width: None,
            line_spacing: DEFAULT_LINE_SPACING,
        }
    }

    /// The template's background wins over the command line one.
    pub fn background_reference(&self) -> ComposeResult<&str> {
        let from_template = self
            .template
            .as_ref()
            .map_or("", |template| template.background.image.trim());
        if !from_template.is_empty() {
            return Ok(from_template);
        }
        match self.background.as_deref().map(str::trim) {
            Some(background) if !background.is_empty() => Ok(background),
            _ => Err(ComposeError::config(
                "no background image: set background.image in the template or pass --background",
            )),
        }
    }
}

#[derive(Debug)]
pub struct RenderOutput {
    pub canvas: Canvas,
    pub diagnostics: Vec<Diagnostic>,
    /// Laid out text, keyed by element name, in canvas pixels before any
    /// resize.
    pub placements: Vec<(&'static str, ElementLayout)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Measures with a loaded face, or the built-in fallback when the element's
/// font could not be loaded, so dependent layout still has positions.
struct Measurer<'a>(Option<&'a FontHandle>);

impl TextMeasure for Measurer<'_> {
    fn measure_width(&self, text: &str, size_pt: f32) -> f32 {
        match self.0 {
            Some(font) => font.measure_width(text, size_pt),
            None => fallback_width(text, size_pt),
        }
    }
}

/// Renders event cards. Fonts and rasterized glyphs are cached across calls.
pub struct Composer<L> {
    loader: L,
    fonts: FontLibrary,
    painter: TextPainter,
    speaker_images: SpeakerImageCache,
}

impl<L: ImageLoader> Composer<L> {
    pub fn new(loader: L, speaker_images: SpeakerImageCache) -> Self {
        Self {
            loader,
            fonts: FontLibrary::new(),
            painter: TextPainter::new(),
            speaker_images,
        }
    }

    pub fn loaded_fonts(&self) -> usize {
        self.fonts.len()
    }

    /// Produces the card for one event.
    ///
    /// Fails only when the base frame cannot be built; problems with single
    /// portraits or text elements end up in [`RenderOutput::diagnostics`].
    pub fn compose(
        &mut self,
        job: &RenderJob,
        event: &ResolvedEventData,
    ) -> ComposeResult<RenderOutput> {
        let mut canvas = compose_base(&self.loader, job.background_reference()?, &job.overlays)?;
        let mut diagnostics = Vec::new();
        let mut placements = Vec::new();

        match &job.template {
            Some(template) => {
                let mut template = template.clone();
                apply_overrides(&mut template, event);
                for slot in 1..=2 {
                    self.place_portrait(&mut canvas, &template, event, slot, &mut diagnostics);
                }
                self.place_text(
                    &mut canvas,
                    &template,
                    job.line_spacing,
                    &mut placements,
                    &mut diagnostics,
                );
            }
            None => tracing::debug!(
                event = event.event_id,
                "no template, skipping portraits and text"
            ),
        }

        if let Some(target) = job.width.filter(|target| *target > 0) {
            canvas = resize_to_width(&canvas, target);
        }

        Ok(RenderOutput {
            canvas,
            diagnostics,
            placements,
        })
    }

    /// Composes and writes the card to `output`, creating parent directories.
    pub fn render_to_file(
        &mut self,
        job: &RenderJob,
        event: &ResolvedEventData,
        output: &Path,
    ) -> ComposeResult<Vec<Diagnostic>> {
        let rendered = self.compose(job, event)?;
        ensure_parent_dir(output)?;
        persist_canvas(&rendered.canvas, output)?;
        Ok(rendered.diagnostics)
    }

    fn place_text(
        &mut self,
        canvas: &mut Canvas,
        template: &Template,
        line_spacing: f64,
        placements: &mut Vec<(&'static str, ElementLayout)>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let (width, height) = canvas.dimensions();
        let pairs = [
            (
                ("speaker1title", &template.speaker1title),
                ("speaker1name", &template.speaker1name),
            ),
            (
                ("speaker2title", &template.speaker2title),
                ("speaker2name", &template.speaker2name),
            ),
        ];
        for ((title_name, title), (name_name, name)) in pairs {
            let title_font = self.font_for(title_name, title, diagnostics);
            let name_font = self.font_for(name_name, name, diagnostics);
            let pair = layout_pair(
                title,
                &Measurer(title_font.as_deref()),
                name,
                &Measurer(name_font.as_deref()),
                width,
                height,
                line_spacing,
            );
            for (subject, font, layout) in [
                (title_name, title_font, pair.title),
                (name_name, name_font, pair.name),
            ] {
                self.paint(canvas, subject, font.as_deref(), &layout, diagnostics);
                placements.push((subject, layout));
            }
        }

        let mut singles = vec![("sponsor", &template.sponsor), ("date", &template.date)];
        if let Some(title) = &template.title {
            singles.push(("title", title));
        }
        for (subject, element) in singles {
            let font = self.font_for(subject, element, diagnostics);
            let layout = layout_element(
                element,
                &Measurer(font.as_deref()),
                width,
                height,
                line_spacing,
            );
            self.paint(canvas, subject, font.as_deref(), &layout, diagnostics);
            placements.push((subject, layout));
        }
    }

    fn font_for(
        &mut self,
        subject: &str,
        element: &TextElement,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<Rc<FontHandle>> {
        if element.text.trim().is_empty() {
            return None;
        }
        match self.fonts.load(&element.font) {
            Ok(font) => Some(font),
            Err(error) => {
                diagnostics.push(Diagnostic::error(subject, error.to_string()));
                None
            }
        }
    }

    fn paint(
        &mut self,
        canvas: &mut Canvas,
        subject: &str,
        font: Option<&FontHandle>,
        layout: &ElementLayout,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let Some(font) = font else {
            return;
        };
        if layout.color_fallback {
            diagnostics.push(Diagnostic::warning(
                subject,
                "invalid color, drawing in white",
            ));
        }
        let mut missing: Vec<char> = Vec::new();
        for line in &layout.lines {
            let outcome = self.painter.draw_line(
                canvas,
                font,
                line.x,
                line.y,
                &line.text,
                layout.size_pt as f32,
                layout.color,
            );
            for ch in outcome.missing_glyphs {
                if !missing.contains(&ch) {
                    missing.push(ch);
                }
            }
        }
        if !missing.is_empty() {
            let chars: String = missing.into_iter().collect();
            diagnostics.push(Diagnostic::warning(
                subject,
                format!(
                    "font {} has no glyphs for {chars:?}",
                    font.path().display()
                ),
            ));
        }
    }

    fn place_portrait(
        &mut self,
        canvas: &mut Canvas,
        template: &Template,
        event: &ResolvedEventData,
        slot: usize,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let reference = event.speaker_image(slot);
        if reference.is_empty() {
            return;
        }
        let subject = format!("speaker{slot}image");
        let Some(spec) = template.speaker_image(slot) else {
            diagnostics.push(Diagnostic::warning(
                subject,
                "event has a speaker image but the template has no placement for it",
            ));
            return;
        };

        let path = match self.speaker_images.resolve(reference, event.event_id, slot) {
            Ok(path) => path,
            Err(error) => {
                diagnostics.push(Diagnostic::warning(subject, error.to_string()));
                return;
            }
        };
        let source = match self.loader.load_image(&path.to_string_lossy()) {
            Ok(source) => source,
            Err(error) => {
                diagnostics.push(Diagnostic::error(subject, error.to_string()));
                return;
            }
        };

        let (width, height) = canvas.dimensions();
        let center_x = (spec.position.x * f64::from(width)).round() as i32;
        let center_y = (spec.position.y * f64::from(height)).round() as i32;
        place_circular(canvas, &source, center_x, center_y, spec.size);
    }
}

pub fn log_diagnostics(event_id: i64, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        match diagnostic.severity {
            Severity::Warning => tracing::warn!(
                event = event_id,
                subject = %diagnostic.subject,
                "{}",
                diagnostic.message
            ),
            Severity::Error => tracing::error!(
                event = event_id,
                subject = %diagnostic.subject,
                "{}",
                diagnostic.message
            ),
        }
    }
}

/// Renders every event in order. A failing event is logged and counted; the
/// rest still run.
pub fn run_batch<F>(events: &[EventRecord], mut render: F) -> BatchSummary
where
    F: FnMut(&EventRecord) -> ComposeResult<PathBuf>,
{
    let mut summary = BatchSummary::default();
    for event in events {
        match render(event) {
            Ok(path) => {
                summary.succeeded += 1;
                tracing::info!(event = event.id, path = %path.display(), "rendered event card");
            }
            Err(error) => {
                summary.failed += 1;
                tracing::error!(event = event.id, code = error.code(), "{error}");
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Position, SpeakerImageSpec};
    use image::{Rgba, RgbaImage};
    use std::collections::HashMap;

    const BG: Rgba<u8> = Rgba([10, 20, 30, 255]);

    struct MemoryLoader(HashMap<String, RgbaImage>);

    impl ImageLoader for MemoryLoader {
        fn load_image(&self, reference: &str) -> ComposeResult<RgbaImage> {
            self.0
                .get(reference)
                .cloned()
                .ok_or_else(|| ComposeError::fetch(reference, "not in memory"))
        }
    }

    fn bundled_font() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/fonts/DejaVuSans.ttf")
    }

    fn composer() -> Composer<MemoryLoader> {
        let mut images = HashMap::new();
        images.insert("bg.png".to_owned(), RgbaImage::from_pixel(320, 180, BG));
        images.insert(
            "speakers/jane.png".to_owned(),
            RgbaImage::from_pixel(40, 60, Rgba([250, 0, 0, 255])),
        );
        Composer::new(MemoryLoader(images), SpeakerImageCache::new("unused"))
    }

    fn template_of(job: &mut RenderJob) -> &mut Template {
        job.template.as_mut().expect("job should carry a template")
    }

    fn job() -> RenderJob {
        let mut template = Template::default();
        template.background.image = "bg.png".to_owned();
        template.sponsor = TextElement {
            text: "Sponsor".to_owned(),
            font: bundled_font(),
            font_size: 20.0,
            color: "#ffffff".to_owned(),
            position: Position { x: 0.1, y: 0.5 },
            box_width: 0.8,
        };
        template.speaker1image = Some(SpeakerImageSpec {
            position: Position { x: 0.75, y: 0.5 },
            size: 60,
        });
        RenderJob::new(template)
    }

    #[test]
    fn background_from_template_wins_over_flag() {
        let mut job = job();
        job.background = Some("flag.png".to_owned());
        assert_eq!(job.background_reference().expect("background"), "bg.png");

        template_of(&mut job).background.image.clear();
        assert_eq!(job.background_reference().expect("background"), "flag.png");

        job.background = None;
        let err = job.background_reference().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn renders_text_and_portrait_without_diagnostics() {
        let mut composer = composer();
        let event = ResolvedEventData {
            speaker1_image: "/speakers/jane.png".to_owned(),
            sponsor: "ACME".to_owned(),
            event_id: 3,
            ..ResolvedEventData::default()
        };
        let output = composer.compose(&job(), &event).expect("render should succeed");
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        assert_eq!(output.canvas.dimensions(), (320, 180));
        assert_eq!(output.canvas.get_pixel(240, 90), &Rgba([250, 0, 0, 255]));

        let (_, sponsor) = output
            .placements
            .iter()
            .find(|(subject, _)| *subject == "sponsor")
            .expect("sponsor should be placed");
        assert_eq!(sponsor.lines[0].text, "ACME");
        assert_eq!((sponsor.lines[0].x, sponsor.lines[0].y), (32, 90));
        assert_eq!(composer.loaded_fonts(), 1);
    }

    #[test]
    fn element_failures_become_diagnostics() {
        let mut composer = composer();
        let mut job = job();
        template_of(&mut job).date = TextElement {
            text: "Soon".to_owned(),
            font: PathBuf::from("fonts/missing.ttf"),
            font_size: 20.0,
            color: "blue".to_owned(),
            position: Position { x: 0.1, y: 0.9 },
            box_width: 0.5,
        };
        template_of(&mut job).sponsor.color = "not-a-color".to_owned();
        template_of(&mut job).speaker2image = None;
        let event = ResolvedEventData {
            speaker1_image: "speakers/unknown.png".to_owned(),
            speaker2_image: "speakers/jane.png".to_owned(),
            ..ResolvedEventData::default()
        };

        let output = composer.compose(&job, &event).expect("render should still succeed");
        let subjects: Vec<&str> = output
            .diagnostics
            .iter()
            .map(|diagnostic| diagnostic.subject.as_str())
            .collect();
        assert!(subjects.contains(&"speaker1image"));
        assert!(subjects.contains(&"speaker2image"));
        assert!(subjects.contains(&"date"));
        assert!(subjects.contains(&"sponsor"));
        assert!(output
            .diagnostics
            .iter()
            .any(|diagnostic| diagnostic.message.contains("fonts/missing.ttf")));
    }

    #[test]
    fn missing_background_is_fatal() {
        let mut composer = composer();
        let mut job = job();
        template_of(&mut job).background.image = "nowhere.png".to_owned();
        let err = composer
            .compose(&job, &ResolvedEventData::default())
            .unwrap_err();
        assert!(err.to_string().contains("nowhere.png"));
    }

    #[test]
    fn no_template_draws_only_the_base_frame() {
        let mut composer = composer();
        let mut job = RenderJob::without_template();
        job.background = Some("bg.png".to_owned());
        assert_eq!(job.background_reference().expect("background"), "bg.png");
        let event = ResolvedEventData {
            speaker1_title: "Talk".to_owned(),
            speaker1_name: "Jane".to_owned(),
            speaker1_image: "speakers/jane.png".to_owned(),
            sponsor: "ACME".to_owned(),
            date: "2024-05-23".to_owned(),
            event_id: 5,
            ..ResolvedEventData::default()
        };

        let output = composer.compose(&job, &event).expect("render should succeed");
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        assert!(output.placements.is_empty());
        assert!(output.canvas.pixels().all(|pixel| pixel == &BG));
        assert_eq!(composer.loaded_fonts(), 0);
    }

    #[test]
    fn width_resizes_the_output() {
        let mut composer = composer();
        let mut job = job();
        job.width = Some(160);
        let output = composer
            .compose(&job, &ResolvedEventData::default())
            .expect("render should succeed");
        assert_eq!(output.canvas.dimensions(), (160, 90));
    }

    #[test]
    fn batch_continues_past_failures() {
        let events: Vec<EventRecord> = (1..=4)
            .map(|id| EventRecord {
                id,
                ..EventRecord::default()
            })
            .collect();
        let mut seen = Vec::new();
        let summary = run_batch(&events, |event| {
            seen.push(event.id);
            if event.id % 2 == 0 {
                Err(ComposeError::config("boom"))
            } else {
                Ok(PathBuf::from(format!("{}.jpg", event.id)))
            }
        });
        assert_eq!(seen, vec![1, 2, 3, 4]);
        assert_eq!(
            summary,
            BatchSummary {
                succeeded: 2,
                failed: 2
            }
        );
        assert_eq!(summary.total(), 4);
    }
}
