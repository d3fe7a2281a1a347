//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use docket_domain::FailureEntry;
use docket_pipeline::{PipelineMetrics, PipelineResult};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Longest failure reason shown in a table cell.
const REASON_WIDTH: usize = 72;

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format the result of a batch run.
    pub fn format_result(&self, result: &PipelineResult) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "batch_id": result.batch_id,
                "metrics": result.metrics,
                "failures": result.failures,
            }))?),
            OutputFormat::Table => {
                let mut out = self.format_metrics_table(&result.metrics);
                if !result.failures.is_empty() {
                    out.push('\n');
                    out.push_str(&self.format_failures_table(&result.failures));
                }
                Ok(out)
            }
            OutputFormat::Quiet => Ok(format!(
                "{}/{}",
                result.metrics.succeeded, result.metrics.total
            )),
        }
    }

    /// Format metrics as a two-column table.
    fn format_metrics_table(&self, metrics: &PipelineMetrics) -> String {
        let mut builder = Builder::default();
        builder.push_record(["Metric", "Value"]);
        builder.push_record(["Records".to_string(), metrics.total.to_string()]);
        builder.push_record([
            "Succeeded".to_string(),
            format!(
                "{} ({:.1}%)",
                metrics.succeeded,
                metrics.success_rate() * 100.0
            ),
        ]);
        builder.push_record(["Failed".to_string(), metrics.total_failed().to_string()]);
        for (stage, count) in &metrics.failed {
            builder.push_record([format!("  {}", stage), count.to_string()]);
        }
        if metrics.enriched > 0 {
            builder.push_record(["Enriched".to_string(), metrics.enriched.to_string()]);
        }
        builder.push_record([
            "Cache (hits/loads/coalesced)".to_string(),
            format!(
                "{}/{}/{}",
                metrics.cache_hits, metrics.cache_misses, metrics.cache_coalesced
            ),
        ]);
        builder.push_record(["Attempts".to_string(), metrics.attempts.to_string()]);
        builder.push_record([
            "Elapsed".to_string(),
            format!("{:.1}s", metrics.elapsed_ms as f64 / 1000.0),
        ]);

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Format the failure ledger as a table.
    pub fn format_failures_table(&self, failures: &[FailureEntry]) -> String {
        if failures.is_empty() {
            return self.colorize("No failures.", "green");
        }

        let mut builder = Builder::default();
        builder.push_record(["Position", "Record", "Stage", "Reason"]);
        for entry in failures {
            builder.push_record([
                entry.position.to_string(),
                entry.record_id.to_string(),
                entry.reason.stage().to_string(),
                truncate(&entry.reason.to_string(), REASON_WIDTH),
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
