mod bundle;
mod config;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use replaykit_core::{build, ClipWindow, ReaderConfig, ReplayReader};
use replaykit_logging::{init_tracing, LogEvent, LogFormat, Logger};

use crate::bundle::Bundle;
use crate::config::ProjectConfig;
use crate::render::View;

/// Exit status when one of the inputs is still missing.
const EXIT_NOT_READY: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "replaykit",
    about = "Reconcile and inspect replay sessions",
    version,
    author
)]
struct Cli {
    /// Config file (default: ./replaykit.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormatChoice>,

    /// Log level / tracing filter
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Keep the declared session window even when frames fall outside it
    #[arg(long, global = true)]
    no_timestamp_correction: bool,

    /// Also run the legacy window computation and report its result
    #[arg(long, global = true)]
    legacy_compat: bool,

    /// Start of the clip window (epoch milliseconds)
    #[arg(long, global = true, requires = "clip_end_ms")]
    clip_start_ms: Option<i64>,

    /// End of the clip window (epoch milliseconds)
    #[arg(long, global = true, requires = "clip_start_ms")]
    clip_end_ms: Option<i64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize a replay bundle
    Inspect {
        /// Directory holding replay.json, attachments.json(l) and errors.json
        dir: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one derived view of a replay bundle
    View {
        /// Directory holding replay.json, attachments.json(l) and errors.json
        dir: PathBuf,

        #[arg(value_enum)]
        view: View,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let mut config = match cli.config {
        Some(ref path) => ProjectConfig::load_from(path)?,
        None => ProjectConfig::load(&working_dir)?.unwrap_or_default(),
    };

    // CLI flags override the config file
    if cli.no_timestamp_correction {
        config.reader.timestamp_correction = false;
    }
    if cli.legacy_compat {
        config.reader.legacy_compat = true;
    }
    if let (Some(start_ms), Some(end_ms)) = (cli.clip_start_ms, cli.clip_end_ms) {
        config.reader.clip_window = Some(ClipWindow { start_ms, end_ms });
    }

    let log_format: LogFormat = cli
        .log_format
        .map(LogFormat::from)
        .unwrap_or_else(|| config.log_format());
    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level().to_string());
    init_tracing(&log_level, log_format);

    let logger = match config.logging.file {
        Some(ref path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };

    let (dir, view, json) = match cli.command {
        Command::Inspect { dir, json } => (dir, None, json),
        Command::View { dir, view, json } => (dir, Some(view), json),
    };

    let Some(reader) = load_reader(&dir, &config, &logger)? else {
        eprintln!("No model available for {}: inputs are still missing.", dir.display());
        std::process::exit(EXIT_NOT_READY);
    };

    match view {
        Some(view) => render::print_view(&reader, view, json)?,
        None => render::print_summary(&reader, json)?,
    }

    Ok(())
}

fn load_reader(
    dir: &std::path::Path,
    config: &ProjectConfig,
    logger: &Logger,
) -> Result<Option<ReplayReader>> {
    tracing::debug!(dir = %dir.display(), "loading replay bundle");
    let bundle = Bundle::load(dir)?;

    let missing = bundle.missing();
    if !missing.is_empty() {
        logger.log(&LogEvent::InputNotReady { missing });
    }
    if let (Some(record), Some(attachments), Some(errors)) =
        (&bundle.record, &bundle.attachments, &bundle.errors)
    {
        logger.log(&LogEvent::BundleLoaded {
            replay_id: record.id.clone(),
            attachments: attachments.len(),
            errors: errors.len(),
        });
    }

    let Some(reader) = build(
        bundle.attachments.as_deref(),
        bundle.errors.as_deref(),
        bundle.record,
        &config.reader,
        logger,
    ) else {
        return Ok(None);
    };

    for event in milestone_events(&reader, &config.reader) {
        logger.log(&event);
    }

    Ok(Some(reader))
}

/// Events describing a freshly built reader. A correction is only reported
/// when one was actually applied to the session record.
fn milestone_events(reader: &ReplayReader, config: &ReaderConfig) -> Vec<LogEvent> {
    let replay_id = reader.replay_record().id.clone();
    let deltas = reader.timestamp_deltas();
    let mut events = Vec::new();

    if config.timestamp_correction && !deltas.is_zero() {
        events.push(LogEvent::TimestampsCorrected {
            replay_id: replay_id.clone(),
            started_at_delta_ms: deltas.started_at_delta_ms,
            finished_at_delta_ms: deltas.finished_at_delta_ms,
        });
    }
    if let Some(legacy) = reader.legacy_deltas().filter(|legacy| *legacy != deltas) {
        events.push(LogEvent::LegacyDivergence {
            replay_id: replay_id.clone(),
            started_at_delta_ms: deltas.started_at_delta_ms,
            finished_at_delta_ms: deltas.finished_at_delta_ms,
            legacy_started_at_delta_ms: legacy.started_at_delta_ms,
            legacy_finished_at_delta_ms: legacy.finished_at_delta_ms,
        });
    }
    events.push(LogEvent::ReaderBuilt {
        replay_id,
        recording_frames: reader.recording_frames().len(),
        breadcrumbs: reader.breadcrumb_frames().len(),
        spans: reader.span_frames().len(),
        errors: reader.error_frames().len(),
        duration_ms: reader.duration_ms(),
        fallback: reader.is_fallback(),
    });

    events
}
