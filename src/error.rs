use std::path::PathBuf;

pub type ComposeResult<T> = Result<T, ComposeError>;

pub const IO_ERROR: &str = "IO_ERROR";
pub const DECODE_ERROR: &str = "DECODE_ERROR";
pub const FETCH_ERROR: &str = "FETCH_ERROR";
pub const FONT_LOAD_ERROR: &str = "FONT_LOAD_ERROR";
pub const TEMPLATE_PARSE_ERROR: &str = "TEMPLATE_PARSE_ERROR";
pub const FEED_FETCH_ERROR: &str = "FEED_FETCH_ERROR";
pub const FEED_PARSE_ERROR: &str = "FEED_PARSE_ERROR";
pub const ENCODE_ERROR: &str = "ENCODE_ERROR";
pub const WRITE_ERROR: &str = "WRITE_ERROR";
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const EVENT_NOT_FOUND: &str = "EVENT_NOT_FOUND";

/// Failures surfaced by the collaborators the compositor consumes.
///
/// Every variant names the resource it was working on so a log line is enough
/// to diagnose the problem.
#[derive(thiserror::Error, Debug)]
pub enum ComposeError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image '{reference}': {source}")]
    Decode {
        reference: String,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to fetch '{reference}': {message}")]
    Fetch { reference: String, message: String },

    #[error("failed to load font {}: {message}", path.display())]
    FontLoad { path: PathBuf, message: String },

    #[error("failed to parse template {}: {message}", path.display())]
    TemplateParse { path: PathBuf, message: String },

    #[error("failed to fetch event feed '{origin}': {message}")]
    FeedFetch { origin: String, message: String },

    #[error("failed to parse event feed '{origin}': {message}")]
    FeedParse { origin: String, message: String },

    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("event with id {0} not found in feed")]
    EventNotFound(i64),
}

impl ComposeError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn fetch(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            reference: reference.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => IO_ERROR,
            Self::Decode { .. } => DECODE_ERROR,
            Self::Fetch { .. } => FETCH_ERROR,
            Self::FontLoad { .. } => FONT_LOAD_ERROR,
            Self::TemplateParse { .. } => TEMPLATE_PARSE_ERROR,
            Self::FeedFetch { .. } => FEED_FETCH_ERROR,
            Self::FeedParse { .. } => FEED_PARSE_ERROR,
            Self::Encode { .. } => ENCODE_ERROR,
            Self::Write { .. } => WRITE_ERROR,
            Self::Config(_) => CONFIG_ERROR,
            Self::EventNotFound(_) => EVENT_NOT_FOUND,
        }
    }

    /// Errors that abort the current unit of work outright rather than being
    /// reported against a single element.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TemplateParse { .. }
                | Self::FeedFetch { .. }
                | Self::FeedParse { .. }
                | Self::Config(_)
                | Self::EventNotFound(_)
        )
    }
}

pub fn find_compose_error(error: &anyhow::Error) -> Option<&ComposeError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<ComposeError>())
}
