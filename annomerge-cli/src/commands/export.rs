//! Single-project export

use annomerge_sdk::{ExportStrategy, ProjectId, SnapshotOptions, StreamOptions};
use anyhow::{Context as _, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use crate::context::Context;

/// Export one project's tasks as a JSON array
#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Project to export
    #[arg(long)]
    pub project: ProjectId,

    /// Use a server-side snapshot job instead of streaming pages
    #[arg(long)]
    pub snapshot: bool,

    /// Include model predictions (streaming only carries annotations)
    #[arg(long)]
    pub include_predictions: bool,

    /// Leave annotations behind
    #[arg(long)]
    pub no_annotations: bool,

    /// Tasks per page when streaming
    #[arg(long, default_value = "1000")]
    pub page_size: u32,

    /// Snapshot poll timeout in seconds
    #[arg(long, default_value = "1800")]
    pub timeout: u64,

    /// Write the JSON artifact to this file instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

/// Execute the export command
pub async fn execute(ctx: &Context, args: ExportArgs) -> Result<()> {
    let client = ctx.create_client().await?;

    let strategy = if args.snapshot {
        ExportStrategy::Snapshot(
            SnapshotOptions::new().with_timeout(Duration::from_secs(args.timeout)),
        )
    } else {
        ExportStrategy::Stream(
            StreamOptions::new()
                .with_page_size(args.page_size)
                .with_annotations(!args.no_annotations)
                .with_predictions(args.include_predictions),
        )
    };

    let spinner = ctx
        .output
        .spinner(&format!("Exporting project {}...", args.project));
    let exporter = client.exporter(args.project).await?;
    let result = exporter.export(args.project, &strategy).await;
    if let Some(s) = spinner {
        s.finish_and_clear();
    }

    let report = result.with_context(|| format!("Failed to export project {}", args.project))?;

    if report.fell_back {
        ctx.output.warning(
            "Snapshot job could not be created; tasks were streamed instead (no predictions)",
        );
    }

    let artifact = serde_json::to_string_pretty(&report.batch.tasks)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, &artifact)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            ctx.output.success(&format!(
                "Wrote {} task(s) from project {} to {}",
                report.batch.tasks.len(),
                args.project,
                path.display()
            ));
        }
        None => println!("{artifact}"),
    }

    Ok(())
}
