/// Row ingestion: reads log rows, extracts events and feeds the aggregator.
///
/// Row-level failures (bad CSV records, malformed JSON, missing objects) are logged
/// and counted but never stop the run. Only failures to open or read the input are
/// returned as errors.
use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::aggregate::Aggregator;
use crate::event::{self, Extraction, RawRow};

/// Name of the CSV column holding the notification JSON.
pub const MESSAGE_COLUMN: &str = "message";

/// Counters collected while ingesting one input.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub rows: usize,
    pub updates: usize,
    pub malformed: usize,
    pub unrecognized: usize,
}

/// Result of a completed ingestion run.
#[derive(Debug)]
pub struct Ingested {
    pub aggregator: Aggregator,
    pub stats: IngestStats,
}

/// Incremental ingestion state. Rows must be fed in input order.
#[derive(Debug, Default)]
pub struct Ingest {
    aggregator: Aggregator,
    stats: IngestStats,
}

impl Ingest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes one row. `row_number` is 1-based and `line` is the source line,
    /// when known; both only identify the row in diagnostics.
    pub fn process_row(&mut self, row_number: usize, line: Option<u64>, row: &RawRow) {
        self.stats.rows += 1;

        match event::extract(row) {
            Ok(Extraction::Event(event)) => {
                self.stats.updates += self.aggregator.apply_event(event);
            }
            Ok(Extraction::NoRecipients(kind)) => {
                tracing::debug!("Row {}: {} event without recipients", row_number, kind);
            }
            Ok(Extraction::Unrecognized(kind)) => {
                self.stats.unrecognized += 1;
                tracing::info!(
                    "Row {}{}: skipping event with unknown eventType: {}",
                    row_number,
                    line_suffix(line),
                    kind.as_deref().unwrap_or("<missing>")
                );
            }
            Err(err) => self.malformed(row_number, line, &err),
        }
    }

    /// Counts a row that could not be decoded into a [`RawRow`].
    pub fn record_malformed(&mut self, row_number: usize, line: Option<u64>, err: &anyhow::Error) {
        self.stats.rows += 1;
        self.malformed(row_number, line, err);
    }

    fn malformed(&mut self, row_number: usize, line: Option<u64>, err: &anyhow::Error) {
        self.stats.malformed += 1;
        tracing::warn!(
            "Row {}{}: skipping malformed row: {:#}",
            row_number,
            line_suffix(line),
            err
        );
    }

    pub fn finish(self) -> Ingested {
        let stats = self.stats;
        tracing::info!(
            "Processed {} rows: {} updates, {} malformed, {} unrecognized, {} emails",
            stats.rows,
            stats.updates,
            stats.malformed,
            stats.unrecognized,
            self.aggregator.len()
        );
        Ingested {
            aggregator: self.aggregator,
            stats,
        }
    }
}

fn line_suffix(line: Option<u64>) -> String {
    line.map(|l| format!(" (line {})", l)).unwrap_or_default()
}

/// Ingests an in-memory sequence of rows.
pub fn ingest_rows<I>(rows: I) -> Ingested
where
    I: IntoIterator<Item = RawRow>,
{
    let mut ingest = Ingest::new();
    for (index, row) in rows.into_iter().enumerate() {
        ingest.process_row(index + 1, None, &row);
    }
    ingest.finish()
}

/// Ingests CSV data with a header row containing a `message` column.
///
/// # Errors
///
/// Returns an error when the header cannot be read, lacks a `message` column,
/// or when the underlying reader fails mid-stream.
pub fn ingest_reader<R: Read>(reader: R) -> Result<Ingested> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .context("Failed to read CSV header")?
        .clone();
    if !headers.iter().any(|h| h == MESSAGE_COLUMN) {
        bail!("CSV header has no `{}` column", MESSAGE_COLUMN);
    }

    let mut ingest = Ingest::new();
    let mut record = csv::StringRecord::new();
    let mut row_number = 0;
    loop {
        match csv_reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {
                row_number += 1;
                let line = record.position().map(|p| p.line());
                match record.deserialize::<RawRow>(Some(&headers)) {
                    Ok(row) => ingest.process_row(row_number, line, &row),
                    Err(err) => {
                        ingest.record_malformed(row_number, line, &anyhow::Error::new(err))
                    }
                }
            }
            Err(err) if err.is_io_error() => {
                return Err(err).context("Failed to read CSV input");
            }
            Err(err) => {
                row_number += 1;
                let line = err.position().map(|p| p.line());
                ingest.record_malformed(row_number, line, &anyhow::Error::new(err));
            }
        }
    }

    Ok(ingest.finish())
}

/// Ingests a CSV file. The file handle is released before returning.
///
/// # Errors
///
/// Returns an error when the file cannot be opened or read.
pub fn ingest_file(path: &Path) -> Result<Ingested> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    tracing::debug!("Reading rows from {}", path.display());
    ingest_reader(file).with_context(|| format!("Failed to ingest CSV file: {}", path.display()))
}
