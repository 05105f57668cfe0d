//! Task export strategies
//!
//! Two interchangeable ways of pulling a project's full task set:
//!
//! * **Stream** walks the paginated task listing until the server signals
//!   the end. Cheap for small projects, no server-side state.
//! * **Snapshot** asks the server to materialize an export job, polls it to
//!   completion, downloads the zip archive, and decodes it. If the job
//!   cannot even be created the exporter falls back to streaming and says
//!   so in the report.
//!
//! Task listing lives at different routes depending on server generation,
//! so the exporter probes the ranked routes once at construction and pins
//! the first one that answers.

use crate::archive;
use crate::error::{SdkError, SdkResult};
use crate::resources::exports::{CreateExportRequest, ExportJob, ExportStatus, ExportsClient};
use crate::resources::tasks::{RawTask, TasksClient};
use annomerge_core::{ExportBatch, ExportJobId, ProjectId, Task};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default page size for streamed exports.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Default interval between snapshot job status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default bound on how long a snapshot job may stay non-terminal.
pub const DEFAULT_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(1800);

/// Which task-listing route the server supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingRoute {
    /// `GET /api/tasks?project=...` returning `{total, tasks}`
    TaskCollection,
    /// `GET /api/projects/{id}/tasks/` returning an array or `{results, next}`
    ProjectScoped,
}

/// How to pull a project's tasks.
#[derive(Debug, Clone)]
pub enum ExportStrategy {
    /// Walk the paginated task listing
    Stream(StreamOptions),
    /// Server-side export job with stream fallback on creation failure
    Snapshot(SnapshotOptions),
}

impl ExportStrategy {
    /// Stream with default options
    pub fn stream() -> Self {
        ExportStrategy::Stream(StreamOptions::default())
    }

    /// Snapshot with default options
    pub fn snapshot() -> Self {
        ExportStrategy::Snapshot(SnapshotOptions::default())
    }
}

/// Options for the stream strategy
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Tasks requested per page
    pub page_size: u32,
    /// Carry annotation results on exported tasks
    pub include_annotations: bool,
    /// Carry prediction results on exported tasks
    pub include_predictions: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            include_annotations: true,
            include_predictions: false,
        }
    }
}

impl StreamOptions {
    /// Create stream options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page size
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Include annotations in exported tasks
    pub fn with_annotations(mut self, include: bool) -> Self {
        self.include_annotations = include;
        self
    }

    /// Include predictions in exported tasks
    pub fn with_predictions(mut self, include: bool) -> Self {
        self.include_predictions = include;
        self
    }
}

/// Options for the snapshot strategy
#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    /// Job title; defaults to `snapshot-{project_id}`
    pub title: Option<String>,
    /// Interval between status polls
    pub poll_interval: Duration,
    /// Bound on how long the job may stay non-terminal
    pub timeout: Duration,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            title: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_SNAPSHOT_TIMEOUT,
        }
    }
}

impl SnapshotOptions {
    /// Create snapshot options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the export job title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the status poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the overall snapshot timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// What an export run produced.
#[derive(Debug, Clone)]
pub struct ExportReport {
    /// The exported tasks, in server listing order
    pub batch: ExportBatch,
    /// True when a snapshot was requested but job creation failed and the
    /// tasks were streamed instead.
    pub fell_back: bool,
}

/// Tally from [`TaskExporter::count_annotations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationCount {
    /// Tasks seen in the listing
    pub tasks: usize,
    /// Annotations across those tasks
    pub annotations: usize,
}

/// Exports one project's full task set via a pinned listing route.
#[derive(Debug, Clone)]
pub struct TaskExporter {
    tasks: TasksClient,
    exports: ExportsClient,
    route: ListingRoute,
}

impl TaskExporter {
    /// Probe the ranked listing routes against `probe_project` and build an
    /// exporter pinned to the first one the server answers.
    pub async fn connect(
        tasks: TasksClient,
        exports: ExportsClient,
        probe_project: ProjectId,
    ) -> SdkResult<Self> {
        let route = Self::probe_route(&tasks, probe_project).await?;
        info!(route = ?route, "task listing route selected");
        Ok(Self {
            tasks,
            exports,
            route,
        })
    }

    /// Build an exporter with a known route, skipping the probe.
    pub fn with_route(tasks: TasksClient, exports: ExportsClient, route: ListingRoute) -> Self {
        Self {
            tasks,
            exports,
            route,
        }
    }

    /// The route this exporter is pinned to.
    pub fn route(&self) -> ListingRoute {
        self.route
    }

    async fn probe_route(tasks: &TasksClient, project: ProjectId) -> SdkResult<ListingRoute> {
        match tasks.collection_page(project, "task_only", 1, 1).await {
            Ok(_) => Ok(ListingRoute::TaskCollection),
            Err(err) if is_route_missing(&err) => {
                debug!(error = %err, "task collection route unavailable, trying project-scoped route");
                tasks
                    .scoped_page(project, 1, 1)
                    .await
                    .map(|_| ListingRoute::ProjectScoped)
            }
            Err(err) => Err(err),
        }
    }

    /// Export a project with the given strategy.
    ///
    /// Any transport failure mid-export aborts the whole project: partial
    /// results are discarded, never merged.
    pub async fn export(
        &self,
        project: ProjectId,
        strategy: &ExportStrategy,
    ) -> SdkResult<ExportReport> {
        match strategy {
            ExportStrategy::Stream(opts) => {
                let tasks = self.stream_tasks(project, opts).await?;
                info!(project = %project, tasks = tasks.len(), "stream export finished");
                Ok(ExportReport {
                    batch: ExportBatch::new(project, tasks),
                    fell_back: false,
                })
            }
            ExportStrategy::Snapshot(opts) => {
                let title = opts
                    .title
                    .clone()
                    .unwrap_or_else(|| format!("snapshot-{}", project));
                match self
                    .exports
                    .create(project, CreateExportRequest::new(title))
                    .await
                {
                    Ok(job) => {
                        let tasks = self.finish_snapshot(project, job, opts).await?;
                        info!(project = %project, tasks = tasks.len(), "snapshot export finished");
                        Ok(ExportReport {
                            batch: ExportBatch::new(project, tasks),
                            fell_back: false,
                        })
                    }
                    Err(err) => {
                        warn!(
                            project = %project,
                            error = %err,
                            "snapshot job creation failed, falling back to stream export"
                        );
                        let fallback = StreamOptions::default();
                        let tasks = self.stream_tasks(project, &fallback).await?;
                        Ok(ExportReport {
                            batch: ExportBatch::new(project, tasks),
                            fell_back: true,
                        })
                    }
                }
            }
        }
    }

    /// Count tasks and annotations by streaming the listing.
    ///
    /// Some servers report zero counters on the project resource until a
    /// background job runs; this is the exact fallback.
    pub async fn count_annotations(&self, project: ProjectId) -> SdkResult<AnnotationCount> {
        let raw = self
            .collect_raw(project, "annotations", DEFAULT_PAGE_SIZE)
            .await?;
        let annotations = raw.iter().map(|task| task.annotations.len()).sum();
        Ok(AnnotationCount {
            tasks: raw.len(),
            annotations,
        })
    }

    async fn stream_tasks(
        &self,
        project: ProjectId,
        opts: &StreamOptions,
    ) -> SdkResult<Vec<Task>> {
        let raw = self
            .collect_raw(project, "all", opts.page_size.max(1))
            .await?;
        Ok(raw
            .into_iter()
            .map(|task| task.into_task(opts.include_annotations, opts.include_predictions))
            .collect())
    }

    /// Walk the pinned listing route page by page, accumulating every task.
    async fn collect_raw(
        &self,
        project: ProjectId,
        fields: &str,
        page_size: u32,
    ) -> SdkResult<Vec<RawTask>> {
        let mut collected: Vec<RawTask> = Vec::new();
        let mut page = 1u32;

        loop {
            match self.route {
                ListingRoute::TaskCollection => {
                    let task_page = match self
                        .tasks
                        .collection_page(project, fields, page, page_size)
                        .await
                    {
                        Ok(task_page) => task_page,
                        // Past the final page; some servers 404 instead of
                        // returning an empty page.
                        Err(err) if page > 1 && err.status_code() == Some(404) => break,
                        Err(err) => return Err(err),
                    };
                    let count = task_page.tasks.len();
                    collected.extend(task_page.tasks);

                    if count == 0 || (count as u32) < page_size {
                        break;
                    }
                    if let Some(total) = task_page.total {
                        if collected.len() as i64 >= total {
                            break;
                        }
                    }
                }
                ListingRoute::ProjectScoped => {
                    let scoped = match self.tasks.scoped_page(project, page, page_size).await {
                        Ok(scoped) => scoped,
                        Err(err) if page > 1 && err.status_code() == Some(404) => break,
                        Err(err) => return Err(err),
                    };
                    let empty = scoped.tasks.is_empty();
                    let last = !scoped.enveloped || scoped.next.is_none();
                    collected.extend(scoped.tasks);

                    if empty || last {
                        break;
                    }
                }
            }
            page += 1;
        }

        debug!(project = %project, tasks = collected.len(), pages = page, "listing walked");
        Ok(collected)
    }

    async fn finish_snapshot(
        &self,
        project: ProjectId,
        job: ExportJob,
        opts: &SnapshotOptions,
    ) -> SdkResult<Vec<Task>> {
        self.wait_for_completion(project, &job, opts).await?;

        let bytes = self.exports.download(project, job.id).await?;
        debug!(project = %project, bytes = bytes.len(), "snapshot archive downloaded");

        let raw = archive::decode_snapshot(&bytes, project)?;
        Ok(raw
            .into_iter()
            .map(|task| task.into_task(true, true))
            .collect())
    }

    async fn wait_for_completion(
        &self,
        project: ProjectId,
        job: &ExportJob,
        opts: &SnapshotOptions,
    ) -> SdkResult<()> {
        let started = Instant::now();
        let mut status = job.status;

        loop {
            match status {
                ExportStatus::Completed => return Ok(()),
                ExportStatus::Failed | ExportStatus::Error => {
                    return Err(SdkError::ExportFailed { project, status })
                }
                _ => {}
            }

            if started.elapsed() >= opts.timeout {
                return Err(SdkError::Timeout {
                    project,
                    waited: started.elapsed().as_secs(),
                });
            }

            tokio::time::sleep(opts.poll_interval).await;
            status = self.refresh_status(project, job.id).await?;
        }
    }

    /// Refresh a job's status, retrying once through the job list when the
    /// direct lookup fails.
    async fn refresh_status(
        &self,
        project: ProjectId,
        job: ExportJobId,
    ) -> SdkResult<ExportStatus> {
        match self.exports.get(project, job).await {
            Ok(fresh) => Ok(fresh.status),
            Err(err) => {
                debug!(project = %project, error = %err, "status lookup failed, trying the job list");
                let jobs = self.exports.list(project).await?;
                jobs.into_iter()
                    .find(|j| j.id == job)
                    .map(|j| j.status)
                    .ok_or_else(|| {
                        SdkError::NotFound(format!("export job {} of project {}", job, project))
                    })
            }
        }
    }
}

fn is_route_missing(err: &SdkError) -> bool {
    matches!(err.status_code(), Some(404) | Some(405))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_defaults_match_fallback_contract() {
        let opts = StreamOptions::default();
        assert_eq!(opts.page_size, DEFAULT_PAGE_SIZE);
        assert!(opts.include_annotations);
        assert!(!opts.include_predictions);
    }

    #[test]
    fn test_snapshot_defaults() {
        let opts = SnapshotOptions::default();
        assert!(opts.title.is_none());
        assert_eq!(opts.poll_interval, Duration::from_secs(2));
        assert_eq!(opts.timeout, Duration::from_secs(1800));
    }

    #[test]
    fn test_route_missing_detection() {
        assert!(is_route_missing(&SdkError::NotFound("gone".to_string())));
        assert!(is_route_missing(&SdkError::ApiError {
            status: 405,
            message: "method not allowed".to_string(),
        }));
        assert!(!is_route_missing(&SdkError::ServerError("boom".to_string())));
    }
}
