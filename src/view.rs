//! View projection.
//!
//! Turns Mirror contents, optionally with queued outbox entries, into the
//! single ordered list the UI renders. Pure functions: the same input always
//! yields the same list.

use crate::model::{OutboxEntry, Record};
use serde::Serialize;
use std::fmt;

/// One rendered row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewItem {
    pub id: String,
    pub text: String,
    pub created_at: Option<i64>,
    /// Queued locally, not yet confirmed by the remote.
    pub is_local_only: bool,
}

impl ViewItem {
    #[must_use]
    pub fn sort_key(&self) -> i64 {
        self.created_at.unwrap_or(0)
    }
}

impl From<&Record> for ViewItem {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            text: record.text.clone(),
            created_at: record.created_at,
            is_local_only: false,
        }
    }
}

impl From<&OutboxEntry> for ViewItem {
    fn from(entry: &OutboxEntry) -> Self {
        Self {
            id: entry.local_id(),
            text: entry.text.clone(),
            created_at: Some(entry.created_at),
            is_local_only: true,
        }
    }
}

impl fmt::Display for ViewItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_local_only {
            write!(f, "{} (local)", self.text)
        } else {
            f.write_str(&self.text)
        }
    }
}

/// Sort ascending by `created_at`; missing timestamps sort first and ties
/// keep input order.
#[must_use]
pub fn project(mut items: Vec<ViewItem>) -> Vec<ViewItem> {
    items.sort_by_key(ViewItem::sort_key);
    items
}

/// Project Mirror contents.
#[must_use]
pub fn from_mirror(records: &[Record]) -> Vec<ViewItem> {
    project(records.iter().map(ViewItem::from).collect())
}

/// Mirror contents with every queued entry appended as a local row.
///
/// The local rows are view-only; nothing here is persisted.
#[must_use]
pub fn compose_offline(mirror: &[Record], outbox: &[OutboxEntry]) -> Vec<ViewItem> {
    let items = mirror
        .iter()
        .map(ViewItem::from)
        .chain(outbox.iter().map(ViewItem::from))
        .collect();
    project(items)
}

/// Display lines for a rendered list.
#[must_use]
pub fn render_lines(items: &[ViewItem]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seq: i64, text: &str, created_at: i64) -> OutboxEntry {
        OutboxEntry {
            seq,
            text: text.into(),
            created_at,
            idempotency_key: format!("key-{seq}"),
        }
    }

    #[test]
    fn test_sorted_by_created_at() {
        let records = vec![Record::new("b", "y", 2), Record::new("a", "x", 1)];
        assert_eq!(render_lines(&from_mirror(&records)), vec!["x", "y"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let records = vec![
            Record::new("1", "first", 5),
            Record::new("2", "second", 5),
            Record::new("3", "third", 5),
        ];
        assert_eq!(
            render_lines(&from_mirror(&records)),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn test_missing_timestamp_sorts_first() {
        let undated = Record {
            id: "u".into(),
            text: "undated".into(),
            created_at: None,
        };
        let records = vec![Record::new("a", "x", 1), undated];
        assert_eq!(render_lines(&from_mirror(&records)), vec!["undated", "x"]);
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let records = vec![Record::new("b", "y", 2), Record::new("a", "x", 1)];
        let once = from_mirror(&records);
        let twice = project(once.clone());
        assert_eq!(once, twice);
        assert_eq!(render_lines(&once), render_lines(&twice));
    }

    #[test]
    fn test_compose_marks_outbox_entries_local() {
        let mirror = vec![Record::new("a", "x", 1)];
        let outbox = vec![entry(1, "buy cones", 5)];

        let items = compose_offline(&mirror, &outbox);
        assert_eq!(render_lines(&items), vec!["x", "buy cones (local)"]);
        assert_eq!(items[1].id, "local-5");
        assert!(items[1].is_local_only);
        assert!(!items[0].is_local_only);
    }

    #[test]
    fn test_compose_interleaves_by_timestamp() {
        let mirror = vec![Record::new("a", "early", 1), Record::new("b", "late", 10)];
        let outbox = vec![entry(1, "middle", 5)];
        assert_eq!(
            render_lines(&compose_offline(&mirror, &outbox)),
            vec!["early", "middle (local)", "late"]
        );
    }
}
