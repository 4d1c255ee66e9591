//! Operator-facing output on stdout.

use std::io::Write;

use anyhow::{Context, Result};
use reaper_core::domain::{BatchSummary, ReapEvent};
use reaper_core::ports::EventSink;

use crate::cli::OutputFormat;

/// Prints one progress line per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutEventSink;

impl EventSink for StdoutEventSink {
    fn emit(&self, event: &ReapEvent) {
        // A closed stdout must not take the batch down with it.
        let _ = writeln!(std::io::stdout().lock(), "{event}");
    }
}

pub fn render_summary(summary: &BatchSummary, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(summary.to_string()),
        OutputFormat::Json => {
            serde_json::to_string_pretty(summary).context("serializing the summary")
        }
    }
}

pub fn print_summary(summary: &BatchSummary, format: OutputFormat) -> Result<()> {
    println!("{}", render_summary(summary, format)?);
    Ok(())
}
