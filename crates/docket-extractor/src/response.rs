//! Parse LLM output into enrichment data

use docket_domain::{AdapterError, Enrichment};
use serde_json::Value;
use tracing::warn;

/// Parse an LLM response into [`Enrichment`]
///
/// Accepts a bare JSON object, one wrapped in a markdown code block, or one
/// surrounded by stray prose. `summary` is required; `topics` and
/// `decisions` default to empty and non-string entries are skipped.
pub fn parse_enrichment_response(response: &str) -> Result<Enrichment, AdapterError> {
    let json_str = extract_json(response)?;

    let json: Value = serde_json::from_str(json_str)
        .map_err(|e| AdapterError::InvalidResponse(format!("JSON parse error: {}", e)))?;

    let obj = json
        .as_object()
        .ok_or_else(|| AdapterError::InvalidResponse("Expected JSON object".to_string()))?;

    let summary = obj
        .get("summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AdapterError::InvalidResponse("Missing or empty 'summary'".to_string()))?
        .to_string();

    Ok(Enrichment {
        summary,
        topics: string_list(obj.get("topics"), "topics"),
        decisions: string_list(obj.get("decisions"), "decisions"),
        model: None,
    })
}

/// Extract the JSON object from a response, handling markdown code blocks
fn extract_json(response: &str) -> Result<&str, AdapterError> {
    let trimmed = response.trim();

    let unfenced = if trimmed.starts_with("```") {
        let body = trimmed
            .split_once('\n')
            .map(|(_, rest)| rest)
            .ok_or_else(|| AdapterError::InvalidResponse("Empty code block".to_string()))?;
        body.trim_end().trim_end_matches("```").trim()
    } else {
        trimmed
    };

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&unfenced[start..=end]),
        _ => Err(AdapterError::InvalidResponse(
            "No JSON object in response".to_string(),
        )),
    }
}

fn string_list(value: Option<&Value>, field: &str) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };
    let Some(items) = value.as_array() else {
        warn!("'{}' is not an array, ignoring", field);
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item.as_str().map(str::trim) {
            Some(s) if !s.is_empty() => Some(s.to_string()),
            _ => {
                warn!("Skipping non-string entry in '{}'", field);
                None
            }
        })
        .collect()
}
