use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

use replaykit_core::{
    BreadcrumbFrame, ErrorFrame, RecordingFrame, ReplayFrame, ReplayReader, SpanFrame,
    TimestampDeltas,
};

/// Views the `view` command can print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum View {
    Recording,
    Console,
    Network,
    Dom,
    Memory,
    Chapters,
    Timeline,
    Errors,
    Navigation,
}

/// Machine-readable summary for `inspect --json`.
#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    pub replay_id: &'a str,
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: i64,
    pub start_offset_ms: i64,
    pub timestamp_deltas: TimestampDeltas,
    pub legacy_deltas: Option<TimestampDeltas>,
    pub fallback: bool,
    pub has_full_snapshot: bool,
    pub network_detail_enabled: bool,
    pub recording_frames: usize,
    pub breadcrumbs: usize,
    pub spans: usize,
    pub errors: usize,
    pub chapters: usize,
}

impl<'a> Summary<'a> {
    pub fn new(reader: &'a ReplayReader) -> Self {
        let record = reader.replay_record();
        Self {
            replay_id: &record.id,
            started_at: record.started_at.to_rfc3339(),
            finished_at: record.finished_at.to_rfc3339(),
            duration_ms: reader.duration_ms(),
            start_offset_ms: reader.start_offset_ms(),
            timestamp_deltas: reader.timestamp_deltas(),
            legacy_deltas: reader.legacy_deltas(),
            fallback: reader.is_fallback(),
            has_full_snapshot: reader.has_full_snapshot(),
            network_detail_enabled: reader.is_network_detail_enabled(),
            recording_frames: reader.recording_frames().len(),
            breadcrumbs: reader.breadcrumb_frames().len(),
            spans: reader.span_frames().len(),
            errors: reader.error_frames().len(),
            chapters: reader.chapter_frames().len(),
        }
    }
}

pub fn print_summary(reader: &ReplayReader, json: bool) -> Result<()> {
    let summary = Summary::new(reader);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let record = reader.replay_record();
    println!("{}", "=== Replay ===".bright_blue().bold());
    println!("{}  {}", "ID:".dimmed(), record.id);
    println!(
        "{}  {}",
        "Started:".dimmed(),
        record.started_at.format("%Y-%m-%d %H:%M:%S%.3f UTC")
    );
    println!(
        "{}  {}",
        "Finished:".dimmed(),
        record.finished_at.format("%Y-%m-%d %H:%M:%S%.3f UTC")
    );
    println!("{}  {}", "Duration:".dimmed(), format_duration_ms(summary.duration_ms));
    if let Some(url) = record.urls.first() {
        println!("{}  {}", "First URL:".dimmed(), url);
    }
    if let Some(clip) = reader.clip_window() {
        println!(
            "{}  {} → {}",
            "Clip:".dimmed(),
            format_offset_ms(clip.start_ms - record.start_ms()),
            format_offset_ms(clip.end_ms - record.start_ms())
        );
    }

    if reader.is_fallback() {
        println!();
        println!(
            "{}",
            "Recording data could not be read; only session metadata is available."
                .bright_red()
        );
        return Ok(());
    }

    let deltas = reader.timestamp_deltas();
    if !deltas.is_zero() {
        println!(
            "{}  start {}ms, end {}ms",
            "Window Delta:".dimmed(),
            deltas.started_at_delta_ms,
            deltas.finished_at_delta_ms
        );
    }
    if let Some(legacy) = reader.legacy_deltas() {
        let styled = format!(
            "start {}ms, end {}ms",
            legacy.started_at_delta_ms, legacy.finished_at_delta_ms
        );
        println!(
            "{}  {}",
            "Legacy Delta:".dimmed(),
            if legacy == deltas {
                styled.bright_green().to_string()
            } else {
                styled.bright_yellow().to_string()
            }
        );
    }

    println!();
    println!("{}", "--- Frames ---".dimmed());
    println!("  {:<14} {}", "recording", summary.recording_frames);
    println!("  {:<14} {}", "breadcrumbs", summary.breadcrumbs);
    println!("  {:<14} {}", "spans", summary.spans);
    println!("  {:<14} {}", "errors", summary.errors);
    println!("  {:<14} {}", "chapters", summary.chapters);
    println!();
    println!(
        "{}  {}",
        "Full Snapshot:".dimmed(),
        yes_no(summary.has_full_snapshot)
    );
    println!(
        "{}  {}",
        "Network Detail:".dimmed(),
        yes_no(summary.network_detail_enabled)
    );

    Ok(())
}

pub fn print_view(reader: &ReplayReader, view: View, json: bool) -> Result<()> {
    if json {
        let value = match view {
            View::Recording => serde_json::to_value(reader.recording_frames())?,
            View::Console => serde_json::to_value(reader.console_frames())?,
            View::Network => serde_json::to_value(reader.network_frames())?,
            View::Dom => serde_json::to_value(reader.dom_frames())?,
            View::Memory => serde_json::to_value(reader.memory_frames())?,
            View::Chapters => serde_json::to_value(reader.chapter_frames())?,
            View::Timeline => serde_json::to_value(reader.timeline_frames())?,
            View::Errors => serde_json::to_value(reader.error_frames())?,
            View::Navigation => serde_json::to_value(reader.navigate_frames())?,
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let rows: Vec<(i64, String, String)> = match view {
        View::Recording => reader.recording_frames().iter().map(recording_row).collect(),
        View::Console | View::Dom => {
            let frames = if view == View::Console {
                reader.console_frames()
            } else {
                reader.dom_frames()
            };
            frames.iter().map(breadcrumb_row).collect()
        }
        View::Network | View::Memory => {
            let frames = if view == View::Network {
                reader.network_frames()
            } else {
                reader.memory_frames()
            };
            frames.iter().map(span_row).collect()
        }
        View::Errors => reader.error_frames().iter().map(error_row).collect(),
        View::Chapters => reader.chapter_frames().iter().map(frame_row).collect(),
        View::Timeline => reader.timeline_frames().iter().map(frame_row).collect(),
        View::Navigation => reader.navigate_frames().iter().map(frame_row).collect(),
    };

    if rows.is_empty() {
        println!("{}", "No frames in this view.".dimmed());
        return Ok(());
    }

    println!(
        "{:<12} {:<28} {}",
        "OFFSET".dimmed(),
        "KIND".dimmed(),
        "DETAIL".dimmed()
    );
    for (offset_ms, kind, detail) in rows {
        println!(
            "{:<12} {:<28} {}",
            format_offset_ms(offset_ms),
            kind,
            truncate(&detail, 80)
        );
    }

    Ok(())
}

fn recording_row(frame: &RecordingFrame) -> (i64, String, String) {
    let kind = if frame.is_session_start() {
        "session start".bright_green().to_string()
    } else if frame.is_session_end() {
        "session end".bright_green().to_string()
    } else {
        format!("{:?}", frame.kind)
    };
    (frame.offset_ms, kind, frame.data.to_string())
}

fn breadcrumb_row(frame: &BreadcrumbFrame) -> (i64, String, String) {
    let detail = frame
        .message
        .clone()
        .unwrap_or_else(|| frame.data.to_string());
    (frame.offset_ms, frame.category.to_string(), detail)
}

fn span_row(frame: &SpanFrame) -> (i64, String, String) {
    (
        frame.offset_ms,
        frame.op.clone(),
        format!("{} ({}ms)", frame.description, frame.duration_ms()),
    )
}

fn error_row(frame: &ErrorFrame) -> (i64, String, String) {
    let kind = frame
        .group_short_id
        .clone()
        .unwrap_or_else(|| "error".to_string());
    (frame.offset_ms, kind.bright_red().to_string(), frame.title.clone())
}

fn frame_row(frame: &ReplayFrame) -> (i64, String, String) {
    match frame {
        ReplayFrame::Breadcrumb(crumb) => breadcrumb_row(crumb),
        ReplayFrame::Span(span) => span_row(span),
        ReplayFrame::Error(error) => error_row(error),
    }
}

fn yes_no(value: bool) -> String {
    if value {
        "yes".bright_green().to_string()
    } else {
        "no".bright_yellow().to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}

/// `mm:ss.mmm`, with a sign for frames before the session start.
fn format_offset_ms(offset_ms: i64) -> String {
    let sign = if offset_ms < 0 { "-" } else { "" };
    let abs = offset_ms.unsigned_abs();
    format!(
        "{}{:02}:{:02}.{:03}",
        sign,
        abs / 60_000,
        (abs / 1000) % 60,
        abs % 1000
    )
}

fn format_duration_ms(ms: i64) -> String {
    let secs = ms as f64 / 1000.0;
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = (secs % 60.0) as u64;
        format!("{}m {}s", mins, remaining_secs)
    }
}
