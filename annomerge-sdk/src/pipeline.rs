//! End-to-end merge pipeline
//!
//! Drives a whole merge: schema compatibility gate, per-source export,
//! field rewriting, deduplicating merge, destination creation, chunked
//! import. Stages run strictly in order and the gate fires before
//! anything is written to the server.
//!
//! [`MergePipeline::dry_run`] stops after the merge and hands back the
//! merged set, so callers can show a preview (or write an artifact file)
//! and then [`MergePipeline::commit`] the same preview without exporting
//! twice.

use crate::error::SdkError;
use crate::export::ExportStrategy;
use crate::import::{ImportSummary, DEFAULT_BATCH_SIZE};
use crate::resources::projects::{CreateProjectRequest, Project};
use crate::StudioClient;
use annomerge_core::{
    check_compatibility, merge, rewrite, ExportBatch, MergedSet, ProjectId, RewriteSpec,
    SchemaReport,
};
use thiserror::Error;
use tracing::{info, warn};

/// Description given to the destination project when the plan has none.
pub const DEFAULT_DESCRIPTION: &str =
    "Auto-merged from selected source projects. Originals left unchanged.";

/// Errors specific to the merge pipeline.
#[derive(Error, Debug)]
pub enum MergeError {
    /// Merging fewer than two projects is meaningless.
    #[error("merging needs at least two source projects, got {0}")]
    TooFewSources(usize),

    /// The sources disagree on their labeling schema. The report carries
    /// every project's raw and normalized schema for display.
    #[error("source projects have incompatible labeling schemas")]
    ConfigMismatch(SchemaReport),

    /// Transport or API failure from the underlying client
    #[error(transparent)]
    Sdk(#[from] SdkError),
}

/// Everything a merge run needs to know.
#[derive(Debug, Clone)]
pub struct MergePlan {
    /// Source projects, in merge-priority order (first wins on duplicates).
    pub sources: Vec<ProjectId>,
    /// Title for the destination project
    pub title: String,
    /// Destination description; [`DEFAULT_DESCRIPTION`] when `None`
    pub description: Option<String>,
    /// How each source is exported
    pub strategy: ExportStrategy,
    /// Per-task payload edits applied between export and merge
    pub rewrite: RewriteSpec,
    /// Field whose string value overrides the content fingerprint
    pub dedup_field: Option<String>,
    /// Tasks per import request
    pub batch_size: usize,
}

impl MergePlan {
    /// Create a plan with stream export, no rewriting, and default batching
    pub fn new(sources: Vec<ProjectId>, title: impl Into<String>) -> Self {
        Self {
            sources,
            title: title.into(),
            description: None,
            strategy: ExportStrategy::stream(),
            rewrite: RewriteSpec::new(),
            dedup_field: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the destination description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the export strategy
    pub fn with_strategy(mut self, strategy: ExportStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the field rewrite spec
    pub fn with_rewrite(mut self, rewrite: RewriteSpec) -> Self {
        self.rewrite = rewrite;
        self
    }

    /// Dedup on a field's string value instead of the content hash
    pub fn with_dedup_field(mut self, field: impl Into<String>) -> Self {
        self.dedup_field = Some(field.into());
        self
    }

    /// Set the import batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// The description the destination will actually get.
    pub fn effective_description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string())
    }

    fn validate(&self) -> Result<(), MergeError> {
        if self.sources.len() < 2 {
            return Err(MergeError::TooFewSources(self.sources.len()));
        }
        Ok(())
    }
}

/// Result of a dry run: everything short of writing to the server.
#[derive(Debug, Clone)]
pub struct MergePreview {
    /// The deduplicated merge result
    pub merged: MergedSet,
    /// The compatibility report that let the run proceed
    pub schema: SchemaReport,
    /// Tasks exported per source, in plan order
    pub per_source: Vec<(ProjectId, usize)>,
    /// Sources whose snapshot fell back to streaming
    pub fallbacks: Vec<ProjectId>,
    /// True when merged tasks still reference `file_upload` ids, which do
    /// not carry over to the destination server-side.
    pub file_upload_refs: bool,
}

/// Result of a committed merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The freshly created destination project
    pub destination: Project,
    /// Import totals across all batches
    pub imported: ImportSummary,
    /// Duplicates dropped by the merge
    pub dropped: usize,
    /// Tasks exported per source, in plan order
    pub per_source: Vec<(ProjectId, usize)>,
    /// Sources whose snapshot fell back to streaming
    pub fallbacks: Vec<ProjectId>,
    /// True when merged tasks still reference `file_upload` ids
    pub file_upload_refs: bool,
}

/// Orchestrates a merge against one server connection.
#[derive(Debug)]
pub struct MergePipeline<'a> {
    client: &'a StudioClient,
}

impl<'a> MergePipeline<'a> {
    /// Create a pipeline over an existing client connection
    pub fn new(client: &'a StudioClient) -> Self {
        Self { client }
    }

    /// Run every read-only stage: gate on schema compatibility, export the
    /// sources, rewrite, merge. Nothing is written to the server.
    pub async fn dry_run(&self, plan: &MergePlan) -> Result<MergePreview, MergeError> {
        plan.validate()?;

        let schema = self.check_schemas(plan).await?;
        let (batches, per_source, fallbacks) = self.export_sources(plan).await?;
        let batches = rewrite_batches(batches, &plan.rewrite);
        let merged = merge(&batches, plan.dedup_field.as_deref());
        info!(
            tasks = merged.len(),
            dropped = merged.dropped,
            "sources merged"
        );

        let file_upload_refs = merged
            .tasks
            .iter()
            .any(|task| task.data.contains_key("file_upload"));

        Ok(MergePreview {
            merged,
            schema,
            per_source,
            fallbacks,
            file_upload_refs,
        })
    }

    /// Write a previewed merge to the server: create the destination with
    /// the first source's raw schema, then import the merged set in
    /// batches. `progress(sent, total)` fires after every accepted batch.
    ///
    /// Batches already accepted stay on the server if a later one fails;
    /// the server offers no rollback.
    pub async fn commit<F>(
        &self,
        plan: &MergePlan,
        preview: MergePreview,
        progress: F,
    ) -> Result<MergeOutcome, MergeError>
    where
        F: FnMut(usize, usize),
    {
        let label_config = preview
            .schema
            .entries
            .first()
            .map(|entry| entry.raw.clone())
            .unwrap_or_default();
        if label_config.trim().is_empty() {
            warn!("first source project has an empty labeling schema, destination starts unconfigured");
        }

        let mut request =
            CreateProjectRequest::new(plan.title.clone()).with_description(plan.effective_description());
        if !label_config.trim().is_empty() {
            request = request.with_label_config(label_config);
        }
        let destination = self.client.projects().create(request).await?;
        info!(destination = %destination.id, title = %destination.title, "destination project created");

        let importer = self.client.importer().with_batch_size(plan.batch_size);
        let imported = importer
            .import_with_progress(destination.id, &preview.merged.tasks, progress)
            .await?;

        Ok(MergeOutcome {
            destination,
            imported,
            dropped: preview.merged.dropped,
            per_source: preview.per_source,
            fallbacks: preview.fallbacks,
            file_upload_refs: preview.file_upload_refs,
        })
    }

    /// Dry run and commit in one call.
    pub async fn run<F>(&self, plan: &MergePlan, progress: F) -> Result<MergeOutcome, MergeError>
    where
        F: FnMut(usize, usize),
    {
        let preview = self.dry_run(plan).await?;
        self.commit(plan, preview, progress).await
    }

    /// Fetch every source's labeling schema and gate on compatibility.
    ///
    /// A failed fetch records an empty schema rather than aborting; the
    /// mismatch it usually causes is the right answer when a source cannot
    /// even be read.
    async fn check_schemas(&self, plan: &MergePlan) -> Result<SchemaReport, MergeError> {
        let mut configs = Vec::with_capacity(plan.sources.len());
        for &source in &plan.sources {
            let label_config = match self.client.projects().get(source).await {
                Ok(project) => project.label_config,
                Err(err) => {
                    warn!(project = %source, error = %err, "schema fetch failed, treating it as empty");
                    String::new()
                }
            };
            configs.push((source, label_config));
        }

        let report = check_compatibility(&configs);
        if !report.compatible {
            return Err(MergeError::ConfigMismatch(report));
        }
        Ok(report)
    }

    async fn export_sources(
        &self,
        plan: &MergePlan,
    ) -> Result<(Vec<ExportBatch>, Vec<(ProjectId, usize)>, Vec<ProjectId>), MergeError> {
        // validate() has guaranteed at least two sources
        let exporter = self.client.exporter(plan.sources[0]).await?;

        let mut batches = Vec::with_capacity(plan.sources.len());
        let mut per_source = Vec::with_capacity(plan.sources.len());
        let mut fallbacks = Vec::new();

        for &source in &plan.sources {
            let report = exporter.export(source, &plan.strategy).await?;
            per_source.push((source, report.batch.len()));
            if report.fell_back {
                fallbacks.push(source);
            }
            batches.push(report.batch);
        }

        Ok((batches, per_source, fallbacks))
    }
}

fn rewrite_batches(batches: Vec<ExportBatch>, spec: &RewriteSpec) -> Vec<ExportBatch> {
    if spec.is_noop() {
        return batches;
    }
    batches
        .into_iter()
        .map(|batch| {
            let tasks = batch
                .tasks
                .iter()
                .map(|task| rewrite(task, spec))
                .collect();
            ExportBatch::new(batch.project_id, tasks)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_refuses_single_source() {
        let plan = MergePlan::new(vec![ProjectId(1)], "solo");
        match plan.validate() {
            Err(MergeError::TooFewSources(1)) => {}
            other => panic!("expected TooFewSources, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_plan_defaults() {
        let plan = MergePlan::new(vec![ProjectId(1), ProjectId(2)], "pair");
        assert!(plan.validate().is_ok());
        assert_eq!(plan.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(plan.effective_description(), DEFAULT_DESCRIPTION);
        assert!(plan.rewrite.is_noop());
    }

    #[test]
    fn test_rewrite_batches_short_circuits_on_noop() {
        let batch = ExportBatch::new(ProjectId(1), vec![]);
        let out = rewrite_batches(vec![batch], &RewriteSpec::new());
        assert_eq!(out.len(), 1);
    }
}
