pub mod json;
pub mod text;

use anyhow::Result;

use crate::aggregate::Aggregator;
use crate::config::{OutputFormat, ReportOptions};

/// Render the aggregation according to `options`.
pub fn render_report(aggregator: &Aggregator, options: &ReportOptions) -> Result<String> {
    let view = aggregator.view(&options.view);
    match options.format {
        OutputFormat::Text => Ok(text::render(&view, options.view.kind, options.verbose)),
        OutputFormat::Json => json::render(&view, options.view.kind),
    }
}
