use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use eventcard::config::{DEFAULT_ARTIFACTS_DIR, DEFAULT_TEMPLATES_DIR};
use eventcard::error::find_compose_error;
use eventcard::feed::{find_event, DEFAULT_FEED_URL};
use eventcard::render::log_diagnostics;
use eventcard::speaker_images::{SpeakerImageCache, DEFAULT_SPEAKER_IMAGES_DIR};
use eventcard::{
    list_templates, load_event_feed, load_template, run_batch, Composer, FeedSource,
    FsImageLoader, RenderJob, ResolvedEventData, Settings, DEFAULT_LINE_SPACING,
};

const LONG_VERSION: &str = match option_env!("EVENTCARD_LONG_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

#[derive(Debug, Parser)]
#[command(name = "eventcard")]
#[command(about = "Compose promo cards for community events from a template and an events feed")]
#[command(version, long_version = LONG_VERSION)]
struct Cli {
    /// Background image, used when the template names none.
    #[arg(long)]
    background: Option<String>,

    /// Comma-separated overlay images drawn over the background in order.
    #[arg(long)]
    overlays: Option<String>,

    /// JSON layout template.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Output file for a single event; bare names land in the artifacts dir.
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// Event to render. Omit to render every event in the feed.
    #[arg(long)]
    id: Option<i64>,

    /// Resize the card to this width, keeping the aspect ratio. 0 keeps the
    /// background's size.
    #[arg(long)]
    width: Option<u32>,

    /// Local events feed instead of the remote one.
    #[arg(long, conflicts_with = "feed_url")]
    file: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_FEED_URL)]
    feed_url: String,

    #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR)]
    artifacts_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_SPEAKER_IMAGES_DIR)]
    speaker_images_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_TEMPLATES_DIR)]
    templates_dir: PathBuf,

    #[arg(long, default_value_t = DEFAULT_LINE_SPACING)]
    line_spacing: f64,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            artifacts_dir: self.artifacts_dir.clone(),
            speaker_images_dir: self.speaker_images_dir.clone(),
            templates_dir: self.templates_dir.clone(),
            feed: match &self.file {
                Some(path) => FeedSource::File(path.clone()),
                None => FeedSource::Remote(self.feed_url.clone()),
            },
            width: self.width.filter(|width| *width > 0),
            line_spacing: self.line_spacing,
        }
    }

    fn overlays(&self) -> Vec<String> {
        self.overlays
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|overlay| !overlay.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// Exit status for errors that reject the inputs (template, feed, settings)
/// rather than a failure while producing the card.
const INPUT_REJECTED: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let compose_error = find_compose_error(&error);
            tracing::error!(
                code = compose_error.map_or("UNEXPECTED", |inner| inner.code()),
                "{error:#}"
            );
            match compose_error {
                Some(inner) if inner.is_fatal() => ExitCode::from(INPUT_REJECTED),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let settings = cli.settings();
    settings.validate()?;
    report_templates(&settings);

    let template = match &cli.template {
        Some(path) => Some(
            load_template(path)
                .with_context(|| format!("loading template {}", path.display()))?,
        ),
        None => {
            tracing::info!("no template given, cards get background and overlays only");
            None
        }
    };
    let job = RenderJob {
        template,
        background: cli.background.clone(),
        overlays: cli.overlays(),
        width: settings.width,
        line_spacing: settings.line_spacing,
    };
    job.background_reference()?;

    let events = load_event_feed(&settings.feed).context("loading events feed")?;
    let mut composer = Composer::new(
        FsImageLoader,
        SpeakerImageCache::new(&settings.speaker_images_dir),
    );

    match cli.id {
        Some(id) => {
            let event = ResolvedEventData::from_event(find_event(&events, id)?);
            let output = settings.output_path_for(id, cli.output.as_deref());
            let diagnostics = composer
                .render_to_file(&job, &event, &output)
                .with_context(|| format!("rendering event {id}"))?;
            log_diagnostics(id, &diagnostics);
            tracing::info!(event = id, path = %output.display(), "card written");
        }
        None => {
            if cli.output.is_some() {
                tracing::warn!("--output is ignored when rendering every event");
            }
            tracing::info!(events = events.len(), "rendering every event in the feed");
            let summary = run_batch(&events, |record| {
                let event = ResolvedEventData::from_event(record);
                let output = settings.output_path_for(record.id, None);
                let diagnostics = composer.render_to_file(&job, &event, &output)?;
                log_diagnostics(record.id, &diagnostics);
                Ok(output)
            });
            tracing::info!(
                succeeded = summary.succeeded,
                total = summary.total(),
                "batch finished"
            );
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn report_templates(settings: &Settings) {
    let dir = settings.templates_dir();
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "templates directory does not exist");
        return;
    }
    match list_templates(dir) {
        Ok(templates) => {
            for template in templates {
                tracing::info!(template = %template.display(), "available template");
            }
        }
        Err(error) => tracing::warn!("{error}"),
    }
}
