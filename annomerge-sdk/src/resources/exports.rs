//! Exports resource client
//!
//! Lifecycle of server-side snapshot export jobs: create, poll status,
//! list, and download the finished archive.

use crate::client::HttpClient;
use crate::error::SdkResult;
use annomerge_core::{ExportJobId, ProjectId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Client for snapshot export jobs
#[derive(Debug, Clone)]
pub struct ExportsClient {
    client: Arc<HttpClient>,
}

impl ExportsClient {
    /// Create a new exports client
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    /// Create a snapshot export job
    pub async fn create(
        &self,
        project: ProjectId,
        request: CreateExportRequest,
    ) -> SdkResult<ExportJob> {
        self.client
            .post(&format!("/api/projects/{}/exports/", project), request)
            .await
    }

    /// Refresh one job's status
    pub async fn get(&self, project: ProjectId, job: ExportJobId) -> SdkResult<ExportJob> {
        self.client
            .get(&format!("/api/projects/{}/exports/{}/", project, job))
            .await
    }

    /// List all export jobs of a project
    pub async fn list(&self, project: ProjectId) -> SdkResult<Vec<ExportJob>> {
        self.client
            .get(&format!("/api/projects/{}/exports/", project))
            .await
    }

    /// Download a finished job's zip archive
    pub async fn download(&self, project: ProjectId, job: ExportJobId) -> SdkResult<Vec<u8>> {
        self.client
            .get_bytes(&format!(
                "/api/projects/{}/exports/{}/download/",
                project, job
            ))
            .await
    }
}

/// Request to create a snapshot export job
#[derive(Debug, Clone, Serialize)]
pub struct CreateExportRequest {
    /// Title shown for the job in the server UI
    pub title: String,
}

impl CreateExportRequest {
    /// Create a new export job request
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

/// A snapshot export job as reported by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    /// Server-assigned job id
    pub id: ExportJobId,
    /// Last observed job state
    #[serde(default)]
    pub status: ExportStatus,
}

/// Snapshot job state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    /// Job accepted, not yet running
    Created,
    /// Job running
    #[serde(rename = "in_progress")]
    InProgress,
    /// Archive ready for download
    Completed,
    /// Job finished without an archive
    Failed,
    /// Job aborted server-side
    Error,
    /// Any status string this SDK does not know; treated as still pending.
    #[default]
    #[serde(other)]
    Unknown,
}

impl ExportStatus {
    /// Whether the job will never change state again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExportStatus::Completed | ExportStatus::Failed | ExportStatus::Error
        )
    }
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportStatus::Created => "created",
            ExportStatus::InProgress => "in_progress",
            ExportStatus::Completed => "completed",
            ExportStatus::Failed => "failed",
            ExportStatus::Error => "error",
            ExportStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_deserialization() {
        let job: ExportJob =
            serde_json::from_str(r#"{"id": 3, "status": "in_progress"}"#).unwrap();
        assert_eq!(job.id, ExportJobId(3));
        assert_eq!(job.status, ExportStatus::InProgress);

        let job: ExportJob = serde_json::from_str(r#"{"id": 4}"#).unwrap();
        assert_eq!(job.status, ExportStatus::Unknown);

        let job: ExportJob =
            serde_json::from_str(r#"{"id": 5, "status": "something_new"}"#).unwrap();
        assert_eq!(job.status, ExportStatus::Unknown);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ExportStatus::Completed.is_terminal());
        assert!(ExportStatus::Failed.is_terminal());
        assert!(ExportStatus::Error.is_terminal());
        assert!(!ExportStatus::InProgress.is_terminal());
        assert!(!ExportStatus::Unknown.is_terminal());
    }
}
