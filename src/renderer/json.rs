use anyhow::{Context, Result};
use serde::Serialize;

use crate::aggregate::EmailSummary;
use crate::event::EventKind;

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    filter: Option<EventKind>,
    total: usize,
    emails: Vec<&'a EmailSummary>,
}

/// Render a view as a pretty-printed JSON document, in view order.
pub fn render(view: &[(&str, &EmailSummary)], filter: Option<EventKind>) -> Result<String> {
    let report = JsonReport {
        filter,
        total: view.len(),
        emails: view.iter().map(|(_, summary)| *summary).collect(),
    };
    let mut output =
        serde_json::to_string_pretty(&report).context("Failed to serialize JSON report")?;
    output.push('\n');
    Ok(output)
}
