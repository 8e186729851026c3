use crate::aggregate::EmailSummary;
use crate::event::EventKind;
use crate::timefmt::format_occurred_at;

const DIVIDER_WIDTH: usize = 50;

/// Render a view as the plain-text report.
///
/// Compact mode prints one address per line. Verbose mode prints a block per
/// email with its kind, timestamp and, for bounces, each distinct reason.
pub fn render(view: &[(&str, &EmailSummary)], filter: Option<EventKind>, verbose: bool) -> String {
    let mut output = String::new();

    render_header(&mut output, filter, view.len());

    for (email, summary) in view {
        if verbose {
            render_block(&mut output, email, summary);
        } else {
            output.push_str(email);
            output.push('\n');
        }
    }

    output
}

fn render_header(output: &mut String, filter: Option<EventKind>, total: usize) {
    output.push_str(&"-".repeat(DIVIDER_WIDTH));
    output.push('\n');

    let label = match filter {
        Some(EventKind::Bounce) => "Bounced emails",
        Some(EventKind::Delivery) => "Delivered emails",
        Some(EventKind::Send) => "Sent emails",
        None => "Processed emails",
    };
    output.push_str(&format!("{} (total={}):\n", label, total));
}

fn render_block(output: &mut String, email: &str, summary: &EmailSummary) {
    output.push_str(&format!("+ {}:\n", email));
    output.push_str(&format!("  • Type: {}\n", summary.last_kind));
    output.push_str(&format!(
        "  • Occurred at: {}\n",
        format_occurred_at(summary.occurred_at.as_deref())
    ));
    // Reasons are only shown while the address is currently bounced.
    if summary.last_kind == EventKind::Bounce {
        for reason in &summary.reasons {
            output.push_str(&format!("  • {}\n", reason));
        }
    }
    output.push('\n');
}
