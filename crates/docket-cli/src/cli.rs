//! CLI command definitions and argument parsing.

use crate::config::OutputFormat;
use clap::{ArgAction, Parser, Subcommand};
use docket_domain::DetailLevel;
use std::path::PathBuf;

/// Docket - Extract the text of council meeting minutes.
#[derive(Debug, Parser)]
#[command(name = "docket")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format for summaries
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (counts only)
    Quiet,
}

impl From<CliFormat> for OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => OutputFormat::Table,
            CliFormat::Json => OutputFormat::Json,
            CliFormat::Quiet => OutputFormat::Quiet,
        }
    }
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download the meeting list from the council API
    Fetch(FetchArgs),

    /// Extract the minutes text for a list of meetings
    Extract(ExtractArgs),
}

/// Arguments for the fetch command.
#[derive(Debug, Parser)]
pub struct FetchArgs {
    /// Where to write the meeting records
    #[arg(short, long, default_value = "council_meetings.json")]
    pub output: PathBuf,

    /// API key sent with the request
    #[arg(long, env = "DOCKET_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Meeting list type passed to the API
    #[arg(long = "type")]
    pub meeting_type: Option<String>,
}

/// Arguments for the extract command.
#[derive(Debug, Parser)]
pub struct ExtractArgs {
    /// Meeting records JSON to read
    #[arg(short, long, default_value = "council_meetings.json")]
    pub input: PathBuf,

    /// Where to write records with their extracted text
    #[arg(short, long, default_value = "council_meetings_with_text.json")]
    pub output: PathBuf,

    /// Where to write the failure ledger (only written when non-empty)
    #[arg(long, default_value = "failed_meetings.json")]
    pub failed: PathBuf,

    /// Fetch the meeting list from the API first (saved to --input)
    #[arg(long)]
    pub fetch: bool,

    /// API key used with --fetch
    #[arg(long, env = "DOCKET_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Only meetings on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<String>,

    /// Only meetings on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<String>,

    /// Print NDJSON events to stdout as records complete
    #[arg(long)]
    pub stream: bool,

    /// Maximum concurrent jobs
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Per-record time budget in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Disable document caching
    #[arg(long)]
    pub no_cache: bool,

    /// Enrich extracted text with an LLM
    #[arg(long)]
    pub enrich: bool,

    /// LLM model used for enrichment
    #[arg(long)]
    pub model: Option<String>,

    /// Ollama endpoint used for enrichment
    #[arg(long)]
    pub ollama_url: Option<String>,

    /// Summary detail level (brief, standard, detailed)
    #[arg(long, value_parser = parse_detail)]
    pub detail: Option<DetailLevel>,
}

fn parse_detail(s: &str) -> std::result::Result<DetailLevel, String> {
    DetailLevel::parse(s)
        .ok_or_else(|| format!("unknown detail level '{}' (brief, standard, detailed)", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_flags() {
        let cli = Cli::try_parse_from([
            "docket",
            "-vv",
            "extract",
            "--input",
            "meetings.json",
            "--workers",
            "8",
            "--start-date",
            "2024-01-01",
            "--detail",
            "brief",
            "--enrich",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Command::Extract(args) = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(args.input, PathBuf::from("meetings.json"));
        assert_eq!(args.output, PathBuf::from("council_meetings_with_text.json"));
        assert_eq!(args.workers, Some(8));
        assert_eq!(args.start_date.as_deref(), Some("2024-01-01"));
        assert_eq!(args.detail, Some(DetailLevel::Brief));
        assert!(args.enrich);
        assert!(!args.stream);
    }

    #[test]
    fn test_unknown_detail_rejected() {
        let result = Cli::try_parse_from(["docket", "extract", "--detail", "verbose"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_fetch_defaults() {
        let cli = Cli::try_parse_from(["docket", "fetch", "--type", "upcoming"]).unwrap();
        let Command::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(args.output, PathBuf::from("council_meetings.json"));
        assert_eq!(args.meeting_type.as_deref(), Some("upcoming"));
    }

    #[test]
    fn test_global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["docket", "extract", "--format", "json", "--no-color"]).unwrap();
        assert!(matches!(cli.format, Some(CliFormat::Json)));
        assert!(cli.no_color);
    }
}
