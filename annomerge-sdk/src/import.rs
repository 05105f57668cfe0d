//! Chunked task import
//!
//! Uploads a merged task set in fixed-size batches so a single oversized
//! request cannot take down the import. Batches are sent strictly in
//! order; a failure surfaces the 1-based index of the batch that failed,
//! and everything imported before it stays imported (the server offers no
//! rollback).

use crate::error::{SdkError, SdkResult};
use crate::resources::tasks::TasksClient;
use annomerge_core::{ProjectId, Task};
use tracing::{debug, info};

/// Default number of tasks per import request.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Totals accumulated over a finished import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Tasks handed to the server across all batches
    pub tasks_sent: usize,
    /// Tasks the server confirmed creating
    pub task_count: i64,
    /// Annotations the server confirmed creating
    pub annotation_count: i64,
    /// Number of batches sent
    pub batches: usize,
}

/// Imports tasks into a project in batches.
#[derive(Debug, Clone)]
pub struct BatchImporter {
    tasks: TasksClient,
    batch_size: usize,
}

impl BatchImporter {
    /// Create an importer with the default batch size
    pub fn new(tasks: TasksClient) -> Self {
        Self {
            tasks,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the batch size. Zero is clamped to one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// The effective batch size
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Import without progress reporting.
    pub async fn import(&self, project: ProjectId, tasks: &[Task]) -> SdkResult<ImportSummary> {
        self.import_with_progress(project, tasks, |_, _| {}).await
    }

    /// Import, invoking `progress(sent_so_far, total)` after every batch
    /// the server accepts.
    pub async fn import_with_progress<F>(
        &self,
        project: ProjectId,
        tasks: &[Task],
        mut progress: F,
    ) -> SdkResult<ImportSummary>
    where
        F: FnMut(usize, usize),
    {
        let total = tasks.len();
        let mut summary = ImportSummary::default();

        for (index, batch) in tasks.chunks(self.batch_size).enumerate() {
            let response = self
                .tasks
                .import_batch(project, batch)
                .await
                .map_err(|err| SdkError::ImportBatchFailed {
                    batch: index + 1,
                    source: Box::new(err),
                })?;

            summary.tasks_sent += batch.len();
            summary.task_count += response.task_count.unwrap_or(batch.len() as i64);
            summary.annotation_count += response.annotation_count.unwrap_or(0);
            summary.batches += 1;

            debug!(
                project = %project,
                batch = index + 1,
                sent = summary.tasks_sent,
                total,
                "import batch accepted"
            );
            progress(summary.tasks_sent, total);
        }

        info!(
            project = %project,
            tasks = summary.tasks_sent,
            batches = summary.batches,
            "import finished"
        );
        Ok(summary)
    }
}
