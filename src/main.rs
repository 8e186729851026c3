use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use ses_recap::config::ReportOptions;
use ses_recap::event::EventKind;
use ses_recap::{ingest, logging, renderer};

const HELP_EXAMPLES: &str = "\
Examples:
  ses-recap --csv logs.csv
  ses-recap --csv logs.csv --type bounce --verbose --sort-by-date
  ses-recap --csv logs.csv --sort-by-email --json > report.json

Diagnostics go to stderr. Set RUST_LOG (e.g. RUST_LOG=warn) to change their level.";

const REMOTE_SOURCE_DISABLED: &str = "\
Reading events straight from CloudWatch is disabled: each log event lives in its own \
log stream, so only the most recent streams can be queried and the results are incomplete. \
Export the log group to CSV and pass it with --csv instead.";

#[derive(Parser)]
#[command(name = "ses-recap", version)]
#[command(about = "Summarize SES bounce, delivery and send events per email address", long_about = None)]
#[command(after_help = HELP_EXAMPLES)]
struct Cli {
    /// Path to the CSV export (must contain a `message` column)
    #[arg(short, long)]
    csv: Option<PathBuf>,

    /// Print kind, timestamp and bounce reasons for each email
    #[arg(short, long)]
    verbose: bool,

    /// Sort emails by the date of their latest event
    #[arg(short = 'd', long)]
    sort_by_date: bool,

    /// Sort emails alphabetically
    #[arg(short = 'e', long)]
    sort_by_email: bool,

    /// Only show emails whose latest event has this kind
    #[arg(short = 't', long = "type", value_enum)]
    kind: Option<KindArg>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Also append diagnostics to <DIR>/ses-recap.log
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Bounce,
    Delivery,
    Send,
}

impl From<KindArg> for EventKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Bounce => EventKind::Bounce,
            KindArg::Delivery => EventKind::Delivery,
            KindArg::Send => EventKind::Send,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Reject conflicting options before touching the input
    let options = ReportOptions::from_flags(
        cli.kind.map(EventKind::from),
        cli.sort_by_date,
        cli.sort_by_email,
        cli.verbose,
        cli.json,
    )?;

    let Some(csv_path) = cli.csv else {
        eprintln!("{}", REMOTE_SOURCE_DISABLED);
        return Ok(());
    };

    logging::init_logging(cli.log_dir.as_deref(), &csv_path.display().to_string())?;

    let ingested = ingest::ingest_file(&csv_path)?;
    let report = renderer::render_report(&ingested.aggregator, &options)?;
    print!("{}", report);

    Ok(())
}
