//! Annomerge SDK
//!
//! This crate is a Rust client for annotation-platform servers, built for
//! one job: pulling every task out of several projects and pushing a
//! merged, deduplicated set into a fresh one.
//!
//! # Features
//!
//! - **Typed API clients**: projects, task listings, export jobs, imports
//! - **Two export strategies**: paginated streaming or server-side
//!   snapshot jobs, with automatic stream fallback when a job cannot be
//!   created
//! - **Route probing**: the task-listing route and the auth header style
//!   vary across server generations; both are probed once and pinned
//! - **Merge pipeline**: schema compatibility gate, field rewriting,
//!   first-seen-wins deduplication, chunked import with progress
//! - **Detailed error types**: every failure carries the project and
//!   stage it came from
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use annomerge_sdk::{MergePlan, ProjectId, SdkConfig, StudioClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SdkConfig::new("http://localhost:8080").with_token("api-token");
//!     let client = StudioClient::connect(config).await?;
//!
//!     let plan = MergePlan::new(vec![ProjectId(12), ProjectId(15)], "Merged Project");
//!     let outcome = client
//!         .pipeline()
//!         .run(&plan, |sent, total| eprintln!("imported {sent}/{total}"))
//!         .await?;
//!
//!     println!(
//!         "created project {} with {} tasks ({} duplicates dropped)",
//!         outcome.destination.id, outcome.imported.tasks_sent, outcome.dropped
//!     );
//!     Ok(())
//! }
//! ```
//!
//! # Exporting a single project
//!
//! ```rust,no_run
//! use annomerge_sdk::{ExportStrategy, ProjectId, SdkConfig, StudioClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = StudioClient::connect(SdkConfig::new("http://localhost:8080")).await?;
//! let exporter = client.exporter(ProjectId(12)).await?;
//! let report = exporter.export(ProjectId(12), &ExportStrategy::snapshot()).await?;
//! println!("{} tasks, fell back to stream: {}", report.batch.len(), report.fell_back);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod archive;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod pipeline;
pub mod resources;

// Re-export main types for convenience
pub use client::HttpClient;
pub use config::{AuthStyle, SdkConfig};
pub use error::{SdkError, SdkResult};
pub use export::{
    AnnotationCount, ExportReport, ExportStrategy, ListingRoute, SnapshotOptions, StreamOptions,
    TaskExporter, DEFAULT_PAGE_SIZE, DEFAULT_POLL_INTERVAL, DEFAULT_SNAPSHOT_TIMEOUT,
};
pub use import::{BatchImporter, ImportSummary, DEFAULT_BATCH_SIZE};
pub use pipeline::{
    MergeError, MergeOutcome, MergePipeline, MergePlan, MergePreview, DEFAULT_DESCRIPTION,
};

// Re-export resource clients
pub use resources::exports::{CreateExportRequest, ExportJob, ExportStatus, ExportsClient};
pub use resources::projects::{CreateProjectRequest, Project, ProjectsClient};
pub use resources::tasks::{ImportResponse, RawTask, ScopedPage, TaskPage, TasksClient};

// Re-export the core domain types callers hold
pub use annomerge_core::{ExportBatch, MergedSet, ProjectId, RewriteSpec, Task};

use std::sync::Arc;
use tracing::{debug, info};

/// The main client for an annotation-platform server.
///
/// Provides access to the typed resource clients and to the higher-level
/// exporter, importer, and merge pipeline. Authentication style is probed
/// once at [`StudioClient::connect`] and pinned for the session.
///
/// # Example
///
/// ```rust,no_run
/// use annomerge_sdk::{SdkConfig, StudioClient};
///
/// # async fn example() -> Result<(), annomerge_sdk::SdkError> {
/// let config = SdkConfig::new("http://localhost:8080").with_token("api-token");
/// let client = StudioClient::connect(config).await?;
///
/// let projects = client.projects().list(100).await?;
/// println!("{} projects on {}", projects.len(), client.base_url());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StudioClient {
    http_client: Arc<HttpClient>,
    projects: ProjectsClient,
    tasks: TasksClient,
    exports: ExportsClient,
}

impl StudioClient {
    /// Create a client without probing the server.
    ///
    /// With [`AuthStyle::Auto`] the token is sent as a `Bearer` header;
    /// use [`StudioClient::connect`] to let the server pick, or pin a
    /// style explicitly via [`SdkConfig::with_auth_style`].
    pub fn new(config: SdkConfig) -> SdkResult<Self> {
        let http_client = Arc::new(HttpClient::new(config)?);

        Ok(Self {
            projects: ProjectsClient::new(Arc::clone(&http_client)),
            tasks: TasksClient::new(Arc::clone(&http_client)),
            exports: ExportsClient::new(Arc::clone(&http_client)),
            http_client,
        })
    }

    /// Create a client, probing which `Authorization` header style the
    /// server accepts.
    ///
    /// Modern servers take `Bearer {token}`, older ones `Token {token}`.
    /// The probe tries Bearer first and falls back on a 401; the winning
    /// style is pinned for the whole session. The probe is skipped when no
    /// token is configured or when a style is set explicitly.
    pub async fn connect(config: SdkConfig) -> SdkResult<Self> {
        let mut config = config;
        if config.token.is_some() && config.auth_style == AuthStyle::Auto {
            config.auth_style = Self::probe_auth(&config).await?;
            info!(style = %config.auth_style, "authorization header style pinned");
        }
        Self::new(config)
    }

    async fn probe_auth(config: &SdkConfig) -> SdkResult<AuthStyle> {
        for style in [AuthStyle::Bearer, AuthStyle::Legacy] {
            let mut probe_config = config.clone();
            probe_config.auth_style = style;
            let http = HttpClient::new(probe_config)?;

            match http
                .get::<serde_json::Value>("/api/projects/?page_size=1")
                .await
            {
                Ok(_) => return Ok(style),
                Err(err) => match err.status_code() {
                    // Wrong header style; try the next one.
                    Some(401) => {
                        debug!(style = %style, "authorization style rejected");
                        continue;
                    }
                    // Any other HTTP answer means the token was accepted.
                    Some(_) => return Ok(style),
                    None => return Err(err),
                },
            }
        }

        Err(SdkError::AuthenticationError(
            "server rejected the token with both Bearer and Token header styles".to_string(),
        ))
    }

    /// The projects resource client.
    pub fn projects(&self) -> &ProjectsClient {
        &self.projects
    }

    /// The task listing and import resource client.
    pub fn tasks(&self) -> &TasksClient {
        &self.tasks
    }

    /// The export jobs resource client.
    pub fn exports(&self) -> &ExportsClient {
        &self.exports
    }

    /// Build a [`TaskExporter`], probing the task-listing routes against
    /// `probe_project` (any project readable with this token).
    pub async fn exporter(&self, probe_project: ProjectId) -> SdkResult<TaskExporter> {
        TaskExporter::connect(self.tasks.clone(), self.exports.clone(), probe_project).await
    }

    /// Build a [`BatchImporter`] with the default batch size.
    pub fn importer(&self) -> BatchImporter {
        BatchImporter::new(self.tasks.clone())
    }

    /// Build a [`MergePipeline`] borrowing this client.
    pub fn pipeline(&self) -> MergePipeline<'_> {
        MergePipeline::new(self)
    }

    /// The underlying HTTP client, for requests the resource clients do
    /// not cover.
    pub fn http_client(&self) -> &HttpClient {
        &self.http_client
    }

    /// The server base URL.
    pub fn base_url(&self) -> &str {
        &self.http_client.config().base_url
    }

    /// The authorization header style in effect.
    pub fn auth_style(&self) -> AuthStyle {
        self.http_client.config().auth_style
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_new() {
        let config = SdkConfig::new("http://localhost:8080").with_token("token");
        let client = StudioClient::new(config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.auth_style(), AuthStyle::Auto);
    }

    #[test]
    fn test_client_rejects_invalid_config() {
        let config = SdkConfig::new("not a url");
        assert!(StudioClient::new(config).is_err());
    }

    #[test]
    fn test_client_resource_access() {
        let config = SdkConfig::new("http://localhost:8080");
        let client = StudioClient::new(config).unwrap();

        let _ = client.projects();
        let _ = client.tasks();
        let _ = client.exports();
        let _ = client.importer();
        let _ = client.pipeline();
    }
}
