/// Per-email aggregation of lifecycle events.
///
/// Folds recipient-level updates into one summary per address and produces
/// filtered, ordered views for reporting.
///
/// Updates are last-write-wins in *processing* order: `last_kind` and `occurred_at`
/// always reflect the most recently applied update, even when an earlier row
/// carried a later timestamp. Exported logs are not guaranteed to be in time
/// order, so this may not match the true latest event. Bounce reasons, on the
/// other hand, accumulate for the lifetime of the run.
use anyhow::{bail, Result};
use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::event::{EventKind, ParsedEvent, Update};
use crate::timefmt::compare_occurred_at;

/// Aggregated state for one email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailSummary {
    pub email: String,
    pub last_kind: EventKind,
    pub occurred_at: Option<String>,
    pub reasons: BTreeSet<String>,
}

impl From<Update> for EmailSummary {
    fn from(update: Update) -> Self {
        Self {
            email: update.email,
            last_kind: update.kind,
            occurred_at: update.occurred_at,
            reasons: update.reasons,
        }
    }
}

/// Ordering applied by [`Aggregator::view`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Order in which each address was first seen.
    #[default]
    Insertion,
    /// Ascending by `occurred_at`.
    Date,
    /// Ascending lexicographic by address.
    Email,
}

impl SortOrder {
    /// Builds a sort order from the two command-line flags.
    ///
    /// # Errors
    ///
    /// Returns an error when both flags are set.
    pub fn from_flags(by_date: bool, by_email: bool) -> Result<Self> {
        match (by_date, by_email) {
            (true, true) => bail!(
                "You can't sort by date and email at the same time. Please choose one or the other."
            ),
            (true, false) => Ok(Self::Date),
            (false, true) => Ok(Self::Email),
            (false, false) => Ok(Self::Insertion),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewOptions {
    /// Keep only summaries whose `last_kind` matches.
    pub kind: Option<EventKind>,
    pub sort: SortOrder,
}

/// Mapping from email address to its summary, in first-seen order.
#[derive(Debug, Default)]
pub struct Aggregator {
    summaries: IndexMap<String, EmailSummary>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one update: overwrites kind and timestamp, unions reasons.
    pub fn apply(&mut self, update: Update) {
        match self.summaries.entry(update.email.clone()) {
            Entry::Occupied(mut entry) => {
                let summary = entry.get_mut();
                summary.last_kind = update.kind;
                summary.occurred_at = update.occurred_at;
                summary.reasons.extend(update.reasons);
            }
            Entry::Vacant(entry) => {
                entry.insert(EmailSummary::from(update));
            }
        }
    }

    /// Applies every recipient of `event`. Returns the number of updates applied.
    pub fn apply_event(&mut self, event: ParsedEvent) -> usize {
        let updates = event.into_updates();
        let count = updates.len();
        for update in updates {
            self.apply(update);
        }
        count
    }

    pub fn get(&self, email: &str) -> Option<&EmailSummary> {
        self.summaries.get(email)
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// Returns the filtered summaries in the requested order.
    pub fn view(&self, options: &ViewOptions) -> Vec<(&str, &EmailSummary)> {
        let mut entries: Vec<(&str, &EmailSummary)> = self
            .summaries
            .iter()
            .filter(|(_, summary)| options.kind.is_none_or(|kind| summary.last_kind == kind))
            .map(|(email, summary)| (email.as_str(), summary))
            .collect();

        match options.sort {
            SortOrder::Insertion => {}
            SortOrder::Date => entries.sort_by(|(_, a), (_, b)| {
                compare_occurred_at(a.occurred_at.as_deref(), b.occurred_at.as_deref())
            }),
            SortOrder::Email => entries.sort_by(|(a, _), (b, _)| a.cmp(b)),
        }

        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(email: &str, kind: EventKind, at: &str, reasons: &[&str]) -> Update {
        Update {
            email: email.to_string(),
            kind,
            occurred_at: Some(at.to_string()),
            reasons: reasons.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn emails(view: &[(&str, &EmailSummary)]) -> Vec<String> {
        view.iter().map(|(email, _)| email.to_string()).collect()
    }

    #[test]
    fn later_update_overwrites_kind_but_keeps_reasons() {
        let mut agg = Aggregator::new();
        agg.apply(update("u@d.com", EventKind::Bounce, "T0", &["550 mailbox full"]));
        agg.apply(update("u@d.com", EventKind::Delivery, "T1", &[]));

        let summary = agg.get("u@d.com").expect("summary exists");
        assert_eq!(summary.last_kind, EventKind::Delivery);
        assert_eq!(summary.occurred_at.as_deref(), Some("T1"));
        assert_eq!(summary.reasons, BTreeSet::from(["550 mailbox full".to_string()]));
    }

    #[test]
    fn processing_order_wins_over_timestamp_order() {
        let mut agg = Aggregator::new();
        agg.apply(update("a@x.com", EventKind::Delivery, "2024-05-01T00:00:00Z", &[]));
        agg.apply(update("a@x.com", EventKind::Send, "2024-01-01T00:00:00Z", &[]));

        let summary = agg.get("a@x.com").expect("summary exists");
        assert_eq!(summary.last_kind, EventKind::Send);
        assert_eq!(summary.occurred_at.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn duplicate_reasons_are_kept_once() {
        let mut agg = Aggregator::new();
        let bounce = update("a@x.com", EventKind::Bounce, "T0", &["full", "blocked"]);
        agg.apply(bounce.clone());
        agg.apply(bounce);
        agg.apply(update("a@x.com", EventKind::Bounce, "T2", &["full"]));

        let summary = agg.get("a@x.com").expect("summary exists");
        assert_eq!(summary.reasons.len(), 2);
        assert_eq!(summary.occurred_at.as_deref(), Some("T2"));
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn kind_filter_uses_last_kind_only() {
        let mut agg = Aggregator::new();
        agg.apply(update("a@x.com", EventKind::Bounce, "T0", &["full"]));
        agg.apply(update("a@x.com", EventKind::Send, "T1", &[]));
        agg.apply(update("b@x.com", EventKind::Bounce, "T2", &["blocked"]));

        let view = agg.view(&ViewOptions {
            kind: Some(EventKind::Bounce),
            sort: SortOrder::Insertion,
        });
        assert_eq!(emails(&view), vec!["b@x.com"]);
    }

    #[test]
    fn sorts_by_email() {
        let mut agg = Aggregator::new();
        for email in ["m@x.com", "b@x.com", "z@x.com", "a@x.com"] {
            agg.apply(update(email, EventKind::Send, "T", &[]));
        }

        let view = agg.view(&ViewOptions {
            kind: None,
            sort: SortOrder::Email,
        });
        assert_eq!(emails(&view), vec!["a@x.com", "b@x.com", "m@x.com", "z@x.com"]);
    }

    #[test]
    fn sorts_by_date_with_missing_first_and_stable_ties() {
        let mut agg = Aggregator::new();
        agg.apply(update("late@x.com", EventKind::Send, "2024-03-02T00:00:00Z", &[]));
        agg.apply(Update {
            email: "none@x.com".to_string(),
            kind: EventKind::Send,
            occurred_at: None,
            reasons: BTreeSet::new(),
        });
        agg.apply(update("tie1@x.com", EventKind::Send, "2024-03-01T00:00:00Z", &[]));
        agg.apply(update("tie2@x.com", EventKind::Send, "2024-03-01T00:00:00Z", &[]));

        let view = agg.view(&ViewOptions {
            kind: None,
            sort: SortOrder::Date,
        });
        assert_eq!(
            emails(&view),
            vec!["none@x.com", "tie1@x.com", "tie2@x.com", "late@x.com"]
        );
    }

    #[test]
    fn default_view_keeps_first_seen_order() {
        let mut agg = Aggregator::new();
        agg.apply(update("b@x.com", EventKind::Send, "T0", &[]));
        agg.apply(update("a@x.com", EventKind::Send, "T1", &[]));
        agg.apply(update("b@x.com", EventKind::Delivery, "T2", &[]));

        let view = agg.view(&ViewOptions::default());
        assert_eq!(emails(&view), vec!["b@x.com", "a@x.com"]);
    }

    #[test]
    fn rejects_both_sort_flags() {
        assert!(SortOrder::from_flags(true, true).is_err());
        assert_eq!(SortOrder::from_flags(true, false).ok(), Some(SortOrder::Date));
        assert_eq!(SortOrder::from_flags(false, true).ok(), Some(SortOrder::Email));
        assert_eq!(
            SortOrder::from_flags(false, false).ok(),
            Some(SortOrder::Insertion)
        );
    }
}
