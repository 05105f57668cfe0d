//! Snapshot archive decoding
//!
//! Finished export jobs download as a zip holding one JSON document whose
//! name and top-level shape differ between server versions. The member is
//! picked by a fixed preference order, then the document is unwrapped to a
//! task list.

use crate::error::{SdkError, SdkResult};
use crate::resources::tasks::RawTask;
use annomerge_core::ProjectId;
use serde_json::Value;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Member names tried in order before falling back to the first `*.json`.
const PREFERRED_MEMBERS: [&str; 4] = ["tasks.json", "result.json", "export.json", "project.json"];

/// Keys tried in order when the document is a mapping instead of a list.
const UNWRAP_KEYS: [&str; 4] = ["tasks", "result", "items", "data"];

/// Decode a downloaded snapshot archive into raw tasks.
pub fn decode_snapshot(bytes: &[u8], project: ProjectId) -> SdkResult<Vec<RawTask>> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| SdkError::MalformedExport {
            project,
            reason: format!("unreadable archive: {}", e),
        })?;

    let names: Vec<String> = archive.file_names().map(String::from).collect();
    let member = PREFERRED_MEMBERS
        .iter()
        .find(|preferred| names.iter().any(|name| name == *preferred))
        .map(|name| name.to_string())
        .or_else(|| {
            names
                .iter()
                .find(|name| name.to_lowercase().ends_with(".json"))
                .cloned()
        })
        .ok_or(SdkError::NoDataFound { project })?;

    let mut text = String::new();
    archive
        .by_name(&member)
        .map_err(|e| SdkError::MalformedExport {
            project,
            reason: format!("cannot open archive member {}: {}", member, e),
        })?
        .read_to_string(&mut text)
        .map_err(|e| SdkError::MalformedExport {
            project,
            reason: format!("cannot read archive member {}: {}", member, e),
        })?;

    parse_export_document(&text, project)
}

/// Parse an export document: a task array, or a mapping with the list under
/// one of the usual keys.
pub fn parse_export_document(text: &str, project: ProjectId) -> SdkResult<Vec<RawTask>> {
    let value: Value = serde_json::from_str(text).map_err(|e| SdkError::MalformedExport {
        project,
        reason: format!("document is not valid JSON: {}", e),
    })?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => UNWRAP_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| SdkError::MalformedExport {
                project,
                reason: "mapping document holds no task list under tasks/result/items/data"
                    .to_string(),
            })?,
        _ => {
            return Err(SdkError::MalformedExport {
                project,
                reason: "document is neither a task list nor a mapping".to_string(),
            })
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<RawTask>(item).map_err(|e| SdkError::MalformedExport {
                project,
                reason: format!("task {} does not parse: {}", index, e),
            })
        })
        .collect()
}
