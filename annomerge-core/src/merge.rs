use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

use crate::task::{ExportBatch, Task};

/// Deduplication key for one task, derived from its `data` payload.
///
/// When a dedup field is given and the task carries a non-null, non-empty
/// value for it, the fingerprint is that value's string form (JSON text for
/// non-strings). Otherwise it is the SHA-256 digest of the payload's
/// canonical serialization, so structurally identical payloads collide no
/// matter how their keys were ordered on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn of(data: &Map<String, Value>, dedup_field: Option<&str>) -> Self {
        if let Some(field) = dedup_field {
            if let Some(value) = data.get(field) {
                match value {
                    Value::Null => {}
                    Value::String(s) if s.is_empty() => {}
                    Value::String(s) => return Self(s.clone()),
                    other => return Self(other.to_string()),
                }
            }
        }

        let mut canonical = String::new();
        write_canonical_object(data, &mut canonical);

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Canonical form: object keys sorted at every nesting level, compact
// separators. Written by hand so the digest does not depend on which map
// implementation serde_json was compiled with.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_canonical_object(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

fn write_canonical_object(map: &Map<String, Value>, out: &mut String) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort_unstable();

    out.push('{');
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::from(key.as_str()).to_string());
        out.push(':');
        if let Some(child) = map.get(*key) {
            write_canonical(child, out);
        }
    }
    out.push('}');
}

/// The deduplicated union of several export batches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergedSet {
    /// Surviving tasks in first-seen order.
    pub tasks: Vec<Task>,
    /// How many input tasks were dropped as duplicates.
    pub dropped: usize,
}

impl MergedSet {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Merge batches in caller order, keeping the first occurrence of every
/// fingerprint and counting the rest as dropped.
///
/// Total: never fails, and `merged.len() + merged.dropped` always equals the
/// number of input tasks. Output order is the input order restricted to
/// survivors, so equal inputs give byte-equal merges.
pub fn merge(batches: &[ExportBatch], dedup_field: Option<&str>) -> MergedSet {
    let mut seen: HashSet<Fingerprint> = HashSet::new();
    let mut tasks = Vec::new();
    let mut dropped = 0usize;

    for batch in batches {
        for task in &batch.tasks {
            let fingerprint = Fingerprint::of(&task.data, dedup_field);
            if seen.insert(fingerprint) {
                tasks.push(task.clone());
            } else {
                dropped += 1;
            }
        }
    }

    MergedSet { tasks, dropped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data_of(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_fingerprint_ignores_key_insertion_order() {
        let mut forward = Map::new();
        forward.insert("a".to_string(), json!(1));
        forward.insert("b".to_string(), json!({"y": 2, "x": [1, 2]}));

        let mut backward = Map::new();
        backward.insert("b".to_string(), json!({"x": [1, 2], "y": 2}));
        backward.insert("a".to_string(), json!(1));

        assert_eq!(Fingerprint::of(&forward, None), Fingerprint::of(&backward, None));
    }

    #[test]
    fn test_fingerprint_uses_dedup_field_when_usable() {
        let data = data_of(json!({"image": "cat.jpg", "noise": 1}));
        assert_eq!(
            Fingerprint::of(&data, Some("image")).as_str(),
            "cat.jpg"
        );

        let numeric = data_of(json!({"image": 7}));
        assert_eq!(Fingerprint::of(&numeric, Some("image")).as_str(), "7");
    }

    #[test]
    fn test_fingerprint_falls_back_on_null_and_empty() {
        let empty = data_of(json!({"image": "", "rest": true}));
        let null = data_of(json!({"image": null, "rest": true}));
        let missing = data_of(json!({"rest": true}));

        let by_hash = Fingerprint::of(&missing, None);
        assert_ne!(Fingerprint::of(&empty, Some("image")).as_str(), "");
        assert_eq!(Fingerprint::of(&missing, Some("image")), by_hash);
        // Hashes, not raw values: 64 hex chars.
        assert_eq!(Fingerprint::of(&null, Some("image")).as_str().len(), 64);
    }

    #[test]
    fn test_canonical_form_is_compact_and_sorted() {
        let mut out = String::new();
        write_canonical(&json!({"b": 1, "a": {"d": null, "c": "x"}}), &mut out);
        assert_eq!(out, r#"{"a":{"c":"x","d":null},"b":1}"#);
    }
}
