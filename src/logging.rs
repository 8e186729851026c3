/// Diagnostic logging setup.
///
/// Diagnostics always go to stderr so they never mix with the report on stdout.
/// When a log directory is given, they are also appended to `ses-recap.log` there,
/// with a separator marking the start of each run.
use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name used inside the log directory.
pub const LOG_FILE_NAME: &str = "ses-recap.log";

/// Initializes logging for one run.
///
/// # Arguments
///
/// * `log_dir` - Optional directory receiving a copy of every diagnostic
/// * `input_label` - Identifies the run in the log file separator
pub fn init_logging(log_dir: Option<&Path>, input_label: &str) -> Result<()> {
    // Default to INFO level, but allow override via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            write_separator(dir, input_label);

            let file_appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            Some(
                fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false) // No ANSI codes in log files
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .ok(); // Ignore error if already initialized

    tracing::debug!("Logging initialized for {}", input_label);

    Ok(())
}

fn write_separator(dir: &Path, input_label: &str) {
    let separator = format!(
        "\n{sep}\n[{ts}] New run: {input}\n{sep}\n",
        sep = "=".repeat(80),
        ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        input = input_label
    );

    use std::io::Write;
    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE_NAME))
    {
        let _ = writeln!(file, "{}", separator);
    }
}
