//! Merge pipeline command

use annomerge_core::{parse_rename, RewriteSpec};
use annomerge_sdk::{
    ExportStrategy, MergeError, MergeOutcome, MergePlan, MergePreview, ProjectId, SdkError,
};
use anyhow::{Context as _, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use crate::context::Context;
use crate::output::{print_field, print_section};

/// Merge several source projects into a new destination project
#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Source projects in priority order; the first wins on duplicates
    #[arg(long, value_delimiter = ',', required = true, num_args = 2..)]
    pub projects: Vec<ProjectId>,

    /// Title for the destination project
    #[arg(short, long)]
    pub title: String,

    /// Description for the destination project
    #[arg(short, long)]
    pub description: Option<String>,

    /// Export with server-side snapshot jobs instead of streaming pages
    #[arg(long)]
    pub snapshot: bool,

    /// Data field whose string value identifies duplicates
    #[arg(long)]
    pub dedup_field: Option<String>,

    /// Rename a data key, "old:new"; "old:" deletes the key (repeatable)
    #[arg(long = "rename", value_name = "OLD:NEW")]
    pub renames: Vec<String>,

    /// Field whose values get prefixed with --base-url
    #[arg(long, requires = "base_url")]
    pub prefix_field: Option<String>,

    /// Base URL to prepend to --prefix-field values
    #[arg(long, requires = "prefix_field")]
    pub base_url: Option<String>,

    /// Keep only the file name when prefixing
    #[arg(long, requires = "prefix_field")]
    pub strip_dirs: bool,

    /// Field to run --pattern / --replacement over
    #[arg(long, requires = "pattern", requires = "replacement")]
    pub regex_field: Option<String>,

    /// Regular expression applied to --regex-field values
    #[arg(long, requires = "regex_field")]
    pub pattern: Option<String>,

    /// Replacement for --pattern matches ($1 style capture references)
    #[arg(long, requires = "regex_field")]
    pub replacement: Option<String>,

    /// Tasks per import request
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Export, rewrite, and dedup, but create nothing on the server
    #[arg(long)]
    pub dry_run: bool,

    /// Write the merged task list to this file as JSON
    #[arg(short = 'o', long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Execute the merge command
pub async fn execute(ctx: &Context, args: MergeArgs) -> Result<()> {
    let rewrite = build_rewrite_spec(&args)?;
    let plan = build_plan(ctx, &args, rewrite);

    let client = ctx.create_client().await?;
    let pipeline = client.pipeline();

    let spinner = ctx.output.spinner("Exporting and merging sources...");
    let result = pipeline.dry_run(&plan).await;
    if let Some(s) = spinner {
        s.finish_and_clear();
    }

    let preview = match result {
        Ok(preview) => preview,
        Err(MergeError::ConfigMismatch(report)) => {
            for entry in &report.entries {
                let matches = report
                    .entries
                    .first()
                    .is_some_and(|first| entry.normalized == first.normalized);
                println!(
                    "  project {}: {} ({} chars)",
                    entry.project_id,
                    if matches { "matches first" } else { "DIFFERS" },
                    entry.raw.chars().count()
                );
            }
            anyhow::bail!(
                "source projects have different labeling schemas; run `annomerge check` for details"
            );
        }
        Err(err) => return Err(err.into()),
    };

    render_preview(ctx, &plan, &preview);

    if let Some(path) = &args.out {
        write_artifact(ctx, path, &preview)?;
    }

    if args.dry_run {
        ctx.output
            .info("Dry run: no destination project was created");
        return Ok(());
    }

    if preview.merged.is_empty() {
        anyhow::bail!("nothing to import: the sources exported zero tasks");
    }

    if !args.yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Create project \"{}\" and import {} task(s)?",
                plan.title,
                preview.merged.len()
            ))
            .default(false)
            .interact()
            .context("Failed to get confirmation")?;
        if !confirmed {
            ctx.output.info("Cancelled");
            return Ok(());
        }
    }

    let bar = ctx
        .output
        .progress_bar(preview.merged.len() as u64, "Importing tasks");
    let result = pipeline
        .commit(&plan, preview, |sent, _total| {
            if let Some(bar) = &bar {
                bar.set_position(sent as u64);
            }
        })
        .await;
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }

    let outcome = result.map_err(partial_import_error)?;
    render_outcome(ctx, &outcome);

    Ok(())
}

fn build_rewrite_spec(args: &MergeArgs) -> Result<RewriteSpec> {
    let mut spec = RewriteSpec::new();

    for raw in &args.renames {
        let (old, new) =
            parse_rename(raw).with_context(|| format!("Invalid --rename value '{raw}'"))?;
        spec = spec.with_rename(old, new);
    }

    if let (Some(field), Some(base)) = (&args.prefix_field, &args.base_url) {
        spec = spec
            .with_url_prefix(field.as_str(), base.as_str())
            .with_strip_dirs(args.strip_dirs);
    }

    if let (Some(field), Some(pattern), Some(replacement)) =
        (&args.regex_field, &args.pattern, &args.replacement)
    {
        spec = spec.with_regex(field.as_str(), pattern.as_str(), replacement.as_str());
    }

    Ok(spec)
}

fn build_plan(ctx: &Context, args: &MergeArgs, rewrite: RewriteSpec) -> MergePlan {
    let strategy = if args.snapshot {
        ExportStrategy::snapshot()
    } else {
        ExportStrategy::stream()
    };

    let mut plan = MergePlan::new(args.projects.clone(), args.title.clone())
        .with_strategy(strategy)
        .with_rewrite(rewrite)
        .with_batch_size(args.batch_size.unwrap_or(ctx.config.settings.batch_size));

    if let Some(description) = &args.description {
        plan = plan.with_description(description.clone());
    }
    if let Some(field) = &args.dedup_field {
        plan = plan.with_dedup_field(field.clone());
    }

    plan
}

fn render_preview(ctx: &Context, plan: &MergePlan, preview: &MergePreview) {
    if ctx.output.format() == crate::output::OutputFormat::Table {
        print_section("Merge preview");
        for (project, count) in &preview.per_source {
            print_field(&format!("Project {project}"), &format!("{count} task(s)"));
        }
        print_field("Merged", &format!("{} task(s)", preview.merged.len()));
        print_field("Duplicates dropped", &preview.merged.dropped.to_string());
        if let Some(field) = &plan.dedup_field {
            print_field("Dedup field", field);
        }
    }

    for project in &preview.fallbacks {
        ctx.output.warning(&format!(
            "Project {project}: snapshot job could not be created, tasks were streamed instead"
        ));
    }

    if preview.file_upload_refs {
        ctx.output.warning(
            "Heads-up: tasks reference `file_upload` in their data; those file ids do not \
             carry over. Prefer URLs or cloud storage paths (see --rename and --prefix-field)",
        );
    }
}

fn render_outcome(ctx: &Context, outcome: &MergeOutcome) {
    ctx.output.success(&format!(
        "Created project {} \"{}\"",
        outcome.destination.id, outcome.destination.title
    ));

    if ctx.output.format() == crate::output::OutputFormat::Table {
        print_field(
            "Imported",
            &format!(
                "{} task(s) in {} batch(es)",
                outcome.imported.tasks_sent, outcome.imported.batches
            ),
        );
        print_field("Duplicates dropped", &outcome.dropped.to_string());
        if outcome.imported.annotation_count > 0 {
            print_field(
                "Annotations",
                &outcome.imported.annotation_count.to_string(),
            );
        }
    }
}

fn write_artifact(ctx: &Context, path: &Path, preview: &MergePreview) -> Result<()> {
    let artifact = serde_json::to_string_pretty(&preview.merged.tasks)?;
    std::fs::write(path, &artifact)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    ctx.output.success(&format!(
        "Wrote {} merged task(s) to {}",
        preview.merged.len(),
        path.display()
    ));
    Ok(())
}

/// Batches accepted before a failure stay on the server; say so.
fn partial_import_error(err: MergeError) -> anyhow::Error {
    match &err {
        MergeError::Sdk(SdkError::ImportBatchFailed { batch, .. }) => {
            let batch = *batch;
            anyhow::Error::new(err).context(format!(
                "Import stopped at batch {batch}; tasks from earlier batches remain in the destination project"
            ))
        }
        _ => err.into(),
    }
}
