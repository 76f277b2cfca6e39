use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use readalong_rs::ReplayReport;

pub fn write_report(path: &Path, report: &ReplayReport) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|err| format!("Failed to create '{}': {err}", parent.display()))?;
    }

    let file = File::create(path)
        .map_err(|err| format!("Failed to create replay report '{}': {err}", path.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, report)
        .map_err(|err| format!("Failed to serialize replay report: {err}"))?;
    writeln!(out)
        .and_then(|()| out.flush())
        .map_err(|err| format!("Failed to write replay report '{}': {err}", path.display()))
}

/// One-line digest for the terminal.
pub fn summary_line(report: &ReplayReport) -> String {
    let agg = &report.aggregates;
    let completed = agg
        .completed_at_s
        .map_or_else(|| "never".to_string(), |t| format!("{t:.2}s"));
    format!(
        "tokens={} timed_words={} samples={} coverage={:.1}% (before end {:.1}%) max_stall={:.2}s completed={} monotonic={}",
        report.meta.token_count,
        report.meta.timed_word_count,
        report.samples.len(),
        agg.coverage * 100.0,
        agg.coverage_before_end * 100.0,
        agg.max_stall_s,
        completed,
        agg.monotonic
    )
}
