//! Fetch command implementation.

use crate::cli::FetchArgs;
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use crate::records::save_json;
use crate::source::MeetingsClient;

/// Execute the fetch command.
pub async fn execute_fetch(args: FetchArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let client = MeetingsClient::new(config.source.clone())?;
    let records = client
        .fetch(args.meeting_type.as_deref(), args.api_key.as_deref())
        .await?;

    save_json(&args.output, &records)?;
    println!(
        "{}",
        formatter.success(&format!(
            "Saved {} meetings to {}",
            records.len(),
            args.output.display()
        ))
    );
    Ok(())
}
