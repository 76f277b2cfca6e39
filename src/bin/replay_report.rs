use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Parser;
use readalong_rs::pipeline::defaults::{ManualClock, MemorySurface};
use readalong_rs::{
    DocumentLeaf, ReadAlongBuilder, ReadAlongConfig, ReplayMeta, ReplayRecorder, ReplayReport,
};
use tracing_subscriber::EnvFilter;

#[path = "replay_report/json_report_formatter.rs"]
mod json_report_formatter;

#[derive(Debug, Parser)]
#[command(name = "replay_report")]
#[command(about = "Replay a narration transcript against a document and report highlight coverage")]
struct Args {
    /// Plain-text document; paragraphs are separated by blank lines.
    #[arg(long, env = "READALONG_REPORT_TEXT")]
    text: PathBuf,
    /// Transcript JSON (flat word list or nested monologues).
    #[arg(long, env = "READALONG_REPORT_TRANSCRIPT")]
    transcript: PathBuf,
    /// Overrides the config's transcript offset.
    #[arg(long, env = "READALONG_REPORT_OFFSET_MS", allow_hyphen_values = true)]
    offset_ms: Option<i64>,
    #[arg(long, env = "READALONG_REPORT_STEP_MS", default_value_t = 50)]
    step_ms: u64,
    /// Audio duration in seconds; defaults to the end of the last timed word.
    #[arg(long, env = "READALONG_REPORT_DURATION_S")]
    duration_s: Option<f64>,
    #[arg(long, env = "READALONG_REPORT_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "READALONG_REPORT_OUT", default_value = "replay_report.json")]
    out: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    if args.step_ms == 0 {
        return Err("--step-ms must be >= 1.".to_string());
    }

    let mut config = match &args.config {
        Some(path) => ReadAlongConfig::load(path).map_err(|e| e.to_string())?,
        None => ReadAlongConfig::default(),
    };
    if let Some(offset_ms) = args.offset_ms {
        config.transcript_offset_ms = offset_ms;
    }

    let leaves = read_paragraphs(&args.text)?;
    let clock = ManualClock::new(0.0);
    let surface = MemorySurface::new();
    let mut session = ReadAlongBuilder::new(config.clone())
        .with_document(leaves)
        .with_transcript_file(&args.transcript)
        .build(Box::new(clock.clone()), Box::new(surface))
        .map_err(|e| e.to_string())?;

    let last_end = session
        .transcript()
        .words()
        .iter()
        .map(|w| w.end_time)
        .fold(0.0_f64, f64::max);
    let duration = args.duration_s.unwrap_or(last_end);
    if !duration.is_finite() || duration < 0.0 {
        return Err(format!("Invalid audio duration {duration}."));
    }
    clock.set_duration(duration);

    let mut recorder = ReplayRecorder::new();
    session.on_play();
    let step_s = args.step_ms as f64 / 1000.0;
    let mut step: u64 = 0;
    loop {
        let time = step as f64 * step_s;
        if time > duration {
            break;
        }
        clock.set_time(time);
        session.poll();
        recorder.record(time, session.cursor());
        step += 1;
    }
    session.on_end();

    let meta = ReplayMeta {
        generated_at: Utc::now().to_rfc3339(),
        token_count: session.tokens().len(),
        word_count: session.document().word_count(),
        timed_word_count: session.transcript().len(),
        duration_s: duration,
        step_ms: args.step_ms,
        config,
    };
    let report: ReplayReport = recorder.finish(meta, session.cursor());

    json_report_formatter::write_report(&args.out, &report)?;
    println!("{}", json_report_formatter::summary_line(&report));
    tracing::info!(
        out = %args.out.display(),
        coverage = report.aggregates.coverage,
        monotonic = report.aggregates.monotonic,
        max_stall_s = report.aggregates.max_stall_s,
        "replay report written"
    );
    Ok(())
}

fn read_paragraphs(path: &Path) -> Result<Vec<DocumentLeaf>, String> {
    let text = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read document '{}': {err}", path.display()))?;
    let mut leaves = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                leaves.push(DocumentLeaf::new(std::mem::take(&mut current), leaves.len()));
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(line.trim());
    }
    if !current.is_empty() {
        leaves.push(DocumentLeaf::new(current, leaves.len()));
    }
    Ok(leaves)
}
