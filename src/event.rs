/// Event extraction from SES notification payloads.
///
/// Each log row carries a JSON-encoded notification in its `message` column. This module
/// decodes that payload, classifies it by event kind and pulls out the recipients,
/// timestamp and (for bounces) the cleaned diagnostic text.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

/// Reason recorded for a bounced recipient that carries no `diagnosticCode`.
pub const MISSING_DIAGNOSTIC: &str = "No diagnostic code provided";

/// One raw log row. Only the `message` column is read; other columns are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawRow {
    pub message: String,
}

impl RawRow {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Lifecycle event kinds understood by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum EventKind {
    Bounce,
    Delivery,
    Send,
}

impl EventKind {
    /// Matches the exact `eventType` spelling used by SES.
    pub fn from_event_type(value: &str) -> Option<Self> {
        match value {
            "Bounce" => Some(Self::Bounce),
            "Delivery" => Some(Self::Delivery),
            "Send" => Some(Self::Send),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bounce => "Bounce",
            Self::Delivery => "Delivery",
            Self::Send => "Send",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified notification with every usable recipient.
///
/// `recipients` is never empty and holds no empty addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    pub kind: EventKind,
    pub recipients: Vec<Recipient>,
    pub occurred_at: Option<String>,
}

/// A recipient of an event. `reason` is the cleaned diagnostic, bounces only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub email: String,
    pub reason: Option<String>,
}

impl Recipient {
    pub fn plain(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            reason: None,
        }
    }
}

/// A recipient-level update, ready to be merged into the aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub email: String,
    pub kind: EventKind,
    pub occurred_at: Option<String>,
    pub reasons: BTreeSet<String>,
}

impl ParsedEvent {
    /// Distinct diagnostics across all recipients.
    pub fn reasons(&self) -> BTreeSet<&str> {
        self.recipients
            .iter()
            .filter_map(|r| r.reason.as_deref())
            .collect()
    }

    /// Splits the event into one update per recipient, in payload order.
    pub fn into_updates(self) -> Vec<Update> {
        let ParsedEvent {
            kind,
            recipients,
            occurred_at,
        } = self;

        recipients
            .into_iter()
            .map(|recipient| Update {
                email: recipient.email,
                kind,
                occurred_at: occurred_at.clone(),
                reasons: recipient.reason.into_iter().collect(),
            })
            .collect()
    }
}

/// Outcome of extracting a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Event(ParsedEvent),
    /// Known kind, but no recipient with a usable address.
    NoRecipients(EventKind),
    /// `eventType` was absent or named a kind this tool does not handle.
    Unrecognized(Option<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    event_type: Option<String>,
    notification_type: Option<String>,
    bounce: Option<serde_json::Value>,
    delivery: Option<serde_json::Value>,
    mail: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BouncePayload {
    timestamp: Option<String>,
    #[serde(default)]
    bounced_recipients: Vec<BouncedRecipient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BouncedRecipient {
    email_address: Option<String>,
    diagnostic_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeliveryPayload {
    timestamp: Option<String>,
    #[serde(default)]
    recipients: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MailPayload {
    timestamp: Option<String>,
    #[serde(default)]
    destination: Vec<String>,
}

/// Extracts the event carried by one row.
///
/// # Errors
///
/// Returns an error when the message is not valid JSON, or when the object
/// required by the event kind (`bounce`, `delivery` or `mail`) is missing or
/// has the wrong shape. Callers are expected to log the error and move on.
pub fn extract(row: &RawRow) -> Result<Extraction> {
    let message = escape_control_chars(&row.message);
    let envelope: Envelope =
        serde_json::from_str(&message).context("Failed to parse notification JSON")?;

    let kind_name = envelope
        .event_type
        .clone()
        .or_else(|| envelope.notification_type.clone());
    let Some(kind) = kind_name.as_deref().and_then(EventKind::from_event_type) else {
        return Ok(Extraction::Unrecognized(kind_name));
    };

    let event = match kind {
        EventKind::Bounce => {
            let bounce: BouncePayload = nested(envelope.bounce, "bounce")?;
            let recipients = bounce
                .bounced_recipients
                .into_iter()
                .filter_map(|recipient| {
                    let email = recipient.email_address.filter(|e| !e.is_empty())?;
                    let reason = recipient
                        .diagnostic_code
                        .as_deref()
                        .unwrap_or(MISSING_DIAGNOSTIC);
                    Some(Recipient {
                        email,
                        reason: Some(clean_text(reason)),
                    })
                })
                .collect();
            ParsedEvent {
                kind,
                recipients,
                occurred_at: bounce.timestamp,
            }
        }
        EventKind::Delivery => {
            let delivery: DeliveryPayload = nested(envelope.delivery, "delivery")?;
            plain_event(kind, delivery.recipients, delivery.timestamp)
        }
        EventKind::Send => {
            let mail: MailPayload = nested(envelope.mail, "mail")?;
            plain_event(kind, mail.destination, mail.timestamp)
        }
    };

    if event.recipients.is_empty() {
        return Ok(Extraction::NoRecipients(kind));
    }
    Ok(Extraction::Event(event))
}

fn plain_event(kind: EventKind, recipients: Vec<String>, occurred_at: Option<String>) -> ParsedEvent {
    ParsedEvent {
        kind,
        recipients: recipients
            .into_iter()
            .filter(|e| !e.is_empty())
            .map(Recipient::plain)
            .collect(),
        occurred_at,
    }
}

fn nested<T: serde::de::DeserializeOwned>(value: Option<serde_json::Value>, field: &str) -> Result<T> {
    let value = value.with_context(|| format!("Missing `{}` object in notification", field))?;
    serde_json::from_value(value).with_context(|| format!("Unexpected shape for `{}` object", field))
}

/// Collapses every whitespace run into a single space and trims both ends.
///
/// Multi-line SMTP diagnostics become one-line summaries this way.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escapes raw control characters found inside JSON string literals.
///
/// Exported log rows often contain diagnostic codes with literal line breaks,
/// which strict JSON rejects. Everything outside string literals is left alone.
fn escape_control_chars(raw: &str) -> Cow<'_, str> {
    if !raw.chars().any(|c| c < '\u{20}') {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len() + 8);
    let mut in_string = false;
    let mut escaped = false;
    for ch in raw.chars() {
        if !in_string {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
            continue;
        }

        if escaped {
            escaped = false;
            out.push(ch);
            continue;
        }

        match ch {
            '\\' => {
                escaped = true;
                out.push(ch);
            }
            '"' => {
                in_string = false;
                out.push(ch);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c < '\u{20}' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}
