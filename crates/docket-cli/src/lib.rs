//! Docket CLI library.
//!
//! Command-line front end for the extraction pipeline: fetches the council
//! meeting list, filters it by date, runs extraction in batch or streaming
//! mode and writes the results and the failure ledger.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod records;
pub mod source;

pub use cli::{Cli, Command};
pub use config::Config;
pub use error::{CliError, Result};
pub use output::Formatter;
