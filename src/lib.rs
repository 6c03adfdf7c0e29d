//! Template-driven promo card compositor for community events.
//!
//! A card is a background photo with optional full-frame overlays, up to two
//! circular speaker portraits and wrapped text laid out from a JSON template,
//! filled in from an events feed and written as JPEG.

pub mod assets;
pub mod circular;
pub mod compositor;
pub mod config;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod fonts;
pub mod layout;
pub mod render;
pub mod resolve;
pub mod speaker_images;
pub mod template;
pub mod text_painter;
pub mod wrap;

pub use assets::{persist_canvas, FsImageLoader, ImageLoader};
pub use compositor::{compose_base, composite, Canvas};
pub use config::Settings;
pub use error::{ComposeError, ComposeResult};
pub use feed::{load_event_feed, EventRecord, FeedSource, ResolvedEventData};
pub use fonts::{load_font, FontHandle, FontLibrary};
pub use layout::{layout_element, layout_pair, DEFAULT_LINE_SPACING};
pub use render::{run_batch, BatchSummary, Composer, Diagnostic, RenderJob, RenderOutput, Severity};
pub use resolve::{apply_overrides, format_event_date, resize_to_width};
pub use template::{list_templates, load_template, Template, TextElement};
pub use wrap::wrap_text;
