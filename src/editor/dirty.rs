//! Unsaved-change detection.
//!
//! The document is snapshotted as a normalized JSON tree and compared
//! structurally against the live state.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::post::types::Document;

/// Encodings the rich-text widget produces for an untouched editor
pub const EMPTY_RICH_TEXT: [&str; 2] = ["<p></p>", "<p><br></p>"];

/// Object keys whose string values are rich text
const RICH_TEXT_KEYS: [&str; 2] = ["description", "answer"];

/// Host-owned form values that are compared along with the document
pub type ExtraScalars = BTreeMap<String, Value>;

/// Normalized copy of a document plus extras.
///
/// `document` is `None` when the document could not be serialized; such a
/// snapshot matches nothing, so the document reads as dirty.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    document: Option<Value>,
    extras: Value,
}

impl Snapshot {
    pub fn capture(doc: &Document, extras: &ExtraScalars) -> Self {
        let document = match serde_json::to_value(doc) {
            Ok(value) => Some(normalize(value)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to snapshot document");
                None
            }
        };
        let extras = Value::Object(extras.clone().into_iter().collect());

        Snapshot {
            document,
            extras: normalize(extras),
        }
    }

    /// Structural equality of two snapshots
    pub fn matches(&self, other: &Snapshot) -> bool {
        match (&self.document, &other.document) {
            (Some(a), Some(b)) => deep_equal(a, b) && deep_equal(&self.extras, &other.extras),
            _ => false,
        }
    }

    /// Top-level document fields whose values differ, in key order
    pub fn changed_fields(&self, other: &Snapshot) -> Vec<String> {
        let (Some(Value::Object(a)), Some(Value::Object(b))) = (&self.document, &other.document)
        else {
            return Vec::new();
        };

        let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
        keys.sort();
        keys.dedup();

        keys.into_iter()
            .filter(|k| match (a.get(*k), b.get(*k)) {
                (Some(x), Some(y)) => !deep_equal(x, y),
                _ => true,
            })
            .cloned()
            .collect()
    }
}

/// `baseline` vs live state; false until a baseline exists
pub fn is_dirty(baseline: Option<&Snapshot>, current: &Document, extras: &ExtraScalars) -> bool {
    match baseline {
        Some(baseline) => !baseline.matches(&Snapshot::capture(current, extras)),
        None => false,
    }
}

/// Holds the baseline snapshot
#[derive(Debug, Default)]
pub struct DirtyTracker {
    baseline: Option<Snapshot>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&mut self, doc: &Document, extras: &ExtraScalars) {
        self.baseline = Some(Snapshot::capture(doc, extras));
    }

    pub fn clear(&mut self) {
        self.baseline = None;
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn baseline(&self) -> Option<&Snapshot> {
        self.baseline.as_ref()
    }

    pub fn is_dirty(&self, doc: &Document, extras: &ExtraScalars) -> bool {
        is_dirty(self.baseline.as_ref(), doc, extras)
    }

    pub fn changed_fields(&self, doc: &Document, extras: &ExtraScalars) -> Vec<String> {
        match &self.baseline {
            Some(baseline) => baseline.changed_fields(&Snapshot::capture(doc, extras)),
            None => Vec::new(),
        }
    }
}

/// Whether `html` is one of the empty-editor encodings
pub fn is_empty_rich_text(html: &str) -> bool {
    let trimmed = html.trim();
    EMPTY_RICH_TEXT.contains(&trimmed)
}

/// Coerce empty rich text to `""` throughout the tree
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::String(s)
                            if RICH_TEXT_KEYS.contains(&key.as_str()) && is_empty_rich_text(&s) =>
                        {
                            Value::String(String::new())
                        }
                        other => normalize(other),
                    };
                    (key, value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

/// Structural equality: exact key sets, arrays by length then element, NaN == NaN.
///
/// Non-finite floats snapshot as `null`, so two NaN fields compare equal.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x == y;
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x == y;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x == y || (x.is_nan() && y.is_nan()),
                _ => false,
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(key, xv)| y.get(key).is_some_and(|yv| deep_equal(xv, yv)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Block, BlockContent, BlockKind, FaqEntry};
    use serde_json::json;

    fn doc_with_text() -> Document {
        let mut doc = Document::new("en");
        let mut block = Block::new(BlockKind::Text);
        block.id = "t1".to_string();
        doc.blocks.append(block);
        doc
    }

    #[test]
    fn test_no_baseline_is_never_dirty() {
        let mut doc = doc_with_text();
        doc.title = "changed".to_string();
        assert!(!is_dirty(None, &doc, &ExtraScalars::new()));
    }

    #[test]
    fn test_clean_after_capture_dirty_after_change() {
        let mut tracker = DirtyTracker::new();
        let mut doc = doc_with_text();
        let extras = ExtraScalars::new();
        tracker.capture(&doc, &extras);
        assert!(!tracker.is_dirty(&doc, &extras));

        doc.title = "Breaking".to_string();
        assert!(tracker.is_dirty(&doc, &extras));
        assert_eq!(tracker.changed_fields(&doc, &extras), vec!["title".to_string()]);
    }

    #[test]
    fn test_block_field_change_is_dirty() {
        let mut tracker = DirtyTracker::new();
        let mut doc = doc_with_text();
        tracker.capture(&doc, &ExtraScalars::new());

        doc.blocks.update("t1", |b| b.title = "Intro".to_string());
        assert!(tracker.is_dirty(&doc, &ExtraScalars::new()));
    }

    #[test]
    fn test_empty_rich_text_equals_empty_string() {
        let mut tracker = DirtyTracker::new();
        let mut doc = doc_with_text();
        doc.faqs.push(FaqEntry {
            question: "Why?".to_string(),
            answer: String::new(),
        });
        tracker.capture(&doc, &ExtraScalars::new());

        doc.blocks.update("t1", |b| b.description = "<p></p>".to_string());
        doc.faqs[0].answer = " <p><br></p> ".to_string();
        assert!(!tracker.is_dirty(&doc, &ExtraScalars::new()));

        doc.blocks.update("t1", |b| b.description = "<p>x</p>".to_string());
        assert!(tracker.is_dirty(&doc, &ExtraScalars::new()));
    }

    #[test]
    fn test_rich_text_rule_only_applies_to_rich_text_keys() {
        let a = normalize(json!({ "title": "<p></p>" }));
        let b = normalize(json!({ "title": "" }));
        assert!(!deep_equal(&a, &b));
    }

    #[test]
    fn test_unserializable_snapshots_never_match() {
        let broken = Snapshot {
            document: None,
            extras: json!({}),
        };
        assert!(!broken.matches(&broken.clone()));

        let doc = Snapshot::capture(&Document::new("en"), &ExtraScalars::new());
        assert!(!broken.matches(&doc));
        assert!(!doc.matches(&broken));
        assert!(doc.matches(&doc.clone()));
    }

    #[test]
    fn test_nan_scores_compare_equal() {
        let mut tracker = DirtyTracker::new();
        let mut doc = Document::new("en");
        let mut review = Block::new(BlockKind::Review);
        review.id = "r1".to_string();
        if let BlockContent::Review(data) = &mut review.content {
            data.score = f64::NAN;
        }
        doc.blocks.append(review);
        tracker.capture(&doc, &ExtraScalars::new());

        doc.blocks.update("r1", |b| {
            if let BlockContent::Review(data) = &mut b.content {
                data.score = f64::NAN;
            }
        });
        assert!(!tracker.is_dirty(&doc, &ExtraScalars::new()));
    }

    #[test]
    fn test_deep_equal_rules() {
        assert!(deep_equal(&json!({"a": 1, "b": [1, 2]}), &json!({"b": [1, 2], "a": 1})));
        assert!(!deep_equal(&json!({"a": 1}), &json!({"a": 1, "b": null})));
        assert!(!deep_equal(&json!([1, 2]), &json!([1, 2, 3])));
        assert!(deep_equal(&json!(1.0), &json!(1.0)));
        assert!(!deep_equal(&json!(1), &json!("1")));
    }

    #[test]
    fn test_extras_participate() {
        let mut tracker = DirtyTracker::new();
        let doc = doc_with_text();
        let mut extras = ExtraScalars::new();
        extras.insert("tagDraft".to_string(), json!(""));
        tracker.capture(&doc, &extras);

        extras.insert("tagDraft".to_string(), json!("elections"));
        assert!(tracker.is_dirty(&doc, &extras));
    }
}
