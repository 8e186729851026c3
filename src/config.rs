/// Report configuration, validated before any input is read.
use anyhow::Result;

use crate::aggregate::{SortOrder, ViewOptions};
use crate::event::EventKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOptions {
    pub view: ViewOptions,
    /// Print a detail block per email instead of one address per line.
    pub verbose: bool,
    pub format: OutputFormat,
}

impl ReportOptions {
    /// Builds options from raw command-line flags.
    ///
    /// # Errors
    ///
    /// Returns an error when both sort flags are set.
    pub fn from_flags(
        kind: Option<EventKind>,
        sort_by_date: bool,
        sort_by_email: bool,
        verbose: bool,
        json: bool,
    ) -> Result<Self> {
        let sort = SortOrder::from_flags(sort_by_date, sort_by_email)?;
        Ok(Self {
            view: ViewOptions { kind, sort },
            verbose,
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
        })
    }
}
