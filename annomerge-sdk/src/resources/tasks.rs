//! Tasks resource client
//!
//! Paginated task listing and chunk import. Task listing exists at two
//! places depending on server generation: a typed task-collection route
//! (`/api/tasks?project=...`) and an older project-scoped route
//! (`/api/projects/{id}/tasks/`). The exporter probes once and sticks with
//! whichever the server supports; this client only speaks the wire shapes.

use crate::client::HttpClient;
use crate::error::{SdkError, SdkResult};
use annomerge_core::{Annotation, Prediction, ProjectId, Task};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Client for task operations
#[derive(Debug, Clone)]
pub struct TasksClient {
    client: Arc<HttpClient>,
}

impl TasksClient {
    /// Create a new tasks client
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    /// Fetch one page from the task-collection route
    pub async fn collection_page(
        &self,
        project: ProjectId,
        fields: &str,
        page: u32,
        page_size: u32,
    ) -> SdkResult<TaskPage> {
        self.client
            .get_with_query(
                "/api/tasks",
                &[
                    ("project", project.to_string()),
                    ("fields", fields.to_string()),
                    ("page", page.to_string()),
                    ("page_size", page_size.to_string()),
                ],
            )
            .await
    }

    /// Fetch one page from the project-scoped route
    pub async fn scoped_page(
        &self,
        project: ProjectId,
        page: u32,
        page_size: u32,
    ) -> SdkResult<ScopedPage> {
        let value: Value = self
            .client
            .get_with_query(
                &format!("/api/projects/{}/tasks/", project),
                &[("page", page), ("page_size", page_size)],
            )
            .await?;
        ScopedPage::from_value(value)
    }

    /// Import a chunk of tasks into a project
    pub async fn import_batch(
        &self,
        project: ProjectId,
        tasks: &[Task],
    ) -> SdkResult<ImportResponse> {
        self.client
            .post(&format!("/api/projects/{}/import", project), tasks)
            .await
    }
}

/// One page from the task-collection route: `{total, tasks}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskPage {
    /// Total task count across all pages, when the server reports one
    #[serde(default)]
    pub total: Option<i64>,
    /// Tasks on this page
    #[serde(default)]
    pub tasks: Vec<RawTask>,
}

/// One page from the project-scoped route.
///
/// Older servers answer with a bare JSON array holding the whole listing;
/// newer ones wrap pages in a `{results, next}` envelope where `next` is
/// absent on the last page.
#[derive(Debug, Clone)]
pub struct ScopedPage {
    /// Tasks on this page
    pub tasks: Vec<RawTask>,
    /// URL of the next page; absent on the last one
    pub next: Option<String>,
    /// Whether the response was a `{results, next}` envelope.
    pub enveloped: bool,
}

impl ScopedPage {
    fn from_value(value: Value) -> SdkResult<Self> {
        match value {
            Value::Array(items) => Ok(Self {
                tasks: parse_raw_tasks(items)?,
                next: None,
                enveloped: false,
            }),
            Value::Object(mut map) => {
                let items = match map.remove("results") {
                    Some(Value::Array(items)) => items,
                    _ => {
                        return Err(SdkError::SerializationError(serde::de::Error::custom(
                            "task page has no results array",
                        )))
                    }
                };
                let next = match map.remove("next") {
                    Some(Value::String(url)) => Some(url),
                    _ => None,
                };
                Ok(Self {
                    tasks: parse_raw_tasks(items)?,
                    next,
                    enveloped: true,
                })
            }
            _ => Err(SdkError::SerializationError(serde::de::Error::custom(
                "task page is neither an array nor an object",
            ))),
        }
    }
}

fn parse_raw_tasks(items: Vec<Value>) -> SdkResult<Vec<RawTask>> {
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(SdkError::SerializationError))
        .collect()
}

/// A task exactly as the server lists it; unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTask {
    /// Server-assigned task id; dropped on conversion
    #[serde(default)]
    pub id: Option<i64>,
    /// Application data payload
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Annotations attached to the task
    #[serde(default)]
    pub annotations: Vec<RawResult>,
    /// Model predictions attached to the task
    #[serde(default)]
    pub predictions: Vec<RawResult>,
}

/// An annotation or prediction on the wire; only `result` matters here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawResult {
    /// Opaque result items, passed through unchanged
    #[serde(default)]
    pub result: Vec<Value>,
}

impl RawTask {
    /// Reduce to the portable [`Task`] shape, dropping the server id.
    ///
    /// Empty annotation/prediction lists come out as `None` so the fields
    /// are omitted entirely on re-import.
    pub fn into_task(self, include_annotations: bool, include_predictions: bool) -> Task {
        let mut task = Task::new(self.data);

        if include_annotations && !self.annotations.is_empty() {
            task.annotations = Some(
                self.annotations
                    .into_iter()
                    .map(|a| Annotation::new(a.result))
                    .collect(),
            );
        }

        if include_predictions && !self.predictions.is_empty() {
            task.predictions = Some(
                self.predictions
                    .into_iter()
                    .map(|p| Prediction::new(p.result))
                    .collect(),
            );
        }

        task
    }
}

/// Server response to a task import
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportResponse {
    /// Tasks the server created from this batch
    #[serde(default)]
    pub task_count: Option<i64>,
    /// Annotations the server created from this batch
    #[serde(default)]
    pub annotation_count: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scoped_page_from_bare_array() {
        let page = ScopedPage::from_value(json!([
            {"id": 1, "data": {"image": "a.jpg"}},
            {"id": 2, "data": {"image": "b.jpg"}, "annotations": [{"result": [{"v": 1}]}]}
        ]))
        .unwrap();

        assert!(!page.enveloped);
        assert!(page.next.is_none());
        assert_eq!(page.tasks.len(), 2);
        assert_eq!(page.tasks[1].annotations.len(), 1);
    }

    #[test]
    fn test_scoped_page_from_envelope() {
        let page = ScopedPage::from_value(json!({
            "results": [{"data": {"image": "a.jpg"}}],
            "next": "http://server/api/projects/5/tasks/?page=2"
        }))
        .unwrap();

        assert!(page.enveloped);
        assert!(page.next.is_some());
        assert_eq!(page.tasks.len(), 1);
    }

    #[test]
    fn test_scoped_page_envelope_without_next() {
        let page = ScopedPage::from_value(json!({"results": [], "next": null})).unwrap();
        assert!(page.enveloped);
        assert!(page.next.is_none());
    }

    #[test]
    fn test_into_task_omits_empty_sections() {
        let raw: RawTask = serde_json::from_value(json!({
            "id": 9,
            "data": {"image": "x.jpg"},
            "annotations": [],
            "predictions": [{"result": [{"p": 1}]}]
        }))
        .unwrap();

        let task = raw.into_task(true, false);
        assert!(task.annotations.is_none());
        assert!(task.predictions.is_none());
        assert!(!task.data.is_empty());
    }

    #[test]
    fn test_into_task_strips_extra_annotation_fields() {
        let raw: RawTask = serde_json::from_value(json!({
            "data": {"image": "x.jpg"},
            "annotations": [
                {"id": 4, "completed_by": 2, "result": [{"value": "yes"}], "lead_time": 3.2}
            ]
        }))
        .unwrap();

        let task = raw.into_task(true, true);
        let annotations = task.annotations.unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].result, vec![json!({"value": "yes"})]);
    }
}
