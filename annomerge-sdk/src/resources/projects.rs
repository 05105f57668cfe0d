//! Projects resource client
//!
//! Listing, fetching and creating projects. List responses vary between
//! server generations: either a bare JSON array or a `{results: [...]}`
//! envelope; both are accepted.

use crate::client::HttpClient;
use crate::error::{SdkError, SdkResult};
use annomerge_core::ProjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Client for project operations
#[derive(Debug, Clone)]
pub struct ProjectsClient {
    client: Arc<HttpClient>,
}

impl ProjectsClient {
    /// Create a new projects client
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    /// List projects, newest servers and legacy ones alike
    pub async fn list(&self, page_size: u32) -> SdkResult<Vec<Project>> {
        let value: serde_json::Value = self
            .client
            .get_with_query("/api/projects/", &[("page_size", page_size)])
            .await?;
        parse_project_list(value)
    }

    /// Get a project by id
    pub async fn get(&self, id: ProjectId) -> SdkResult<Project> {
        self.client.get(&format!("/api/projects/{}/", id)).await
    }

    /// Create a new project
    pub async fn create(&self, request: CreateProjectRequest) -> SdkResult<Project> {
        self.client.post("/api/projects/", request).await
    }
}

fn parse_project_list(value: serde_json::Value) -> SdkResult<Vec<Project>> {
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("results") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(SdkError::SerializationError(serde::de::Error::custom(
                    "project list response has no results array",
                )))
            }
        },
        _ => {
            return Err(SdkError::SerializationError(serde::de::Error::custom(
                "project list response is neither an array nor an object",
            )))
        }
    };

    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(SdkError::SerializationError))
        .collect()
}

/// A project as reported by the server.
///
/// Counter fields are optional; some servers omit them or report zero until
/// a background job refreshes them, in which case callers fall back to
/// counting via the task stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Server-assigned project id
    pub id: ProjectId,
    /// Project title
    #[serde(default)]
    pub title: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Labeling schema markup
    #[serde(default)]
    pub label_config: String,
    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Task counter, possibly stale or absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_number: Option<i64>,
    /// Annotation counter, possibly stale or absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_number: Option<i64>,
}

/// Request to create a new project
#[derive(Debug, Clone, Serialize)]
pub struct CreateProjectRequest {
    /// Title of the new project
    pub title: String,
    /// Labeling schema markup; omitted when `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_config: Option<String>,
    /// Free-form description; omitted when `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CreateProjectRequest {
    /// Create a new project request
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            label_config: None,
            description: None,
        }
    }

    /// Set the labeling schema
    pub fn with_label_config(mut self, label_config: impl Into<String>) -> Self {
        self.label_config = Some(label_config.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
