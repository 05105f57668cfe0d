//! Labeling-schema compatibility check

use annomerge_core::check_compatibility;
use annomerge_sdk::ProjectId;
use anyhow::Result;
use clap::Args;
use comfy_table::Cell;
use serde::Serialize;
use tracing::warn;

use crate::context::Context;
use crate::output::TableDisplay;

/// Compare labeling schemas across projects
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Projects to compare (at least two)
    #[arg(required = true, num_args = 2..)]
    pub ids: Vec<ProjectId>,
}

/// Execute the check command
pub async fn execute(ctx: &Context, args: CheckArgs) -> Result<()> {
    let client = ctx.create_client().await?;

    let spinner = ctx.output.spinner("Fetching labeling schemas...");
    let mut configs = Vec::with_capacity(args.ids.len());
    for &id in &args.ids {
        let label_config = match client.projects().get(id).await {
            Ok(project) => project.label_config,
            Err(err) => {
                warn!(project = %id, error = %err, "schema fetch failed, treating as empty");
                String::new()
            }
        };
        configs.push((id, label_config));
    }
    if let Some(s) = spinner {
        s.finish_and_clear();
    }

    let report = check_compatibility(&configs);

    let rows: Vec<SchemaDisplay> = report
        .entries
        .iter()
        .map(|entry| SchemaDisplay {
            project: entry.project_id.into(),
            chars: entry.raw.chars().count(),
            matches_first: report
                .entries
                .first()
                .is_some_and(|first| entry.normalized == first.normalized),
            schema: preview(&entry.raw),
        })
        .collect();

    ctx.output
        .write_list(&rows, &["Project", "Chars", "Matches first", "Schema"])?;

    if report.compatible {
        ctx.output
            .success("All labeling schemas are compatible");
        Ok(())
    } else {
        let divergent: Vec<String> = report
            .divergent()
            .iter()
            .map(ToString::to_string)
            .collect();
        ctx.output.error(&format!(
            "Project(s) {} do not match the first source",
            divergent.join(", ")
        ));
        anyhow::bail!("labeling schemas differ");
    }
}

fn preview(raw: &str) -> String {
    let collapsed: String = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > 60 {
        let head: String = collapsed.chars().take(60).collect();
        format!("{head}...")
    } else if collapsed.is_empty() {
        "(empty or no config)".to_string()
    } else {
        collapsed
    }
}

/// Display representation of one project's schema
#[derive(Debug, Serialize)]
struct SchemaDisplay {
    project: i64,
    chars: usize,
    matches_first: bool,
    schema: String,
}

impl TableDisplay for SchemaDisplay {
    fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::new(self.project),
            Cell::new(self.chars),
            Cell::new(if self.matches_first { "yes" } else { "NO" }),
            Cell::new(&self.schema),
        ]
    }

    fn display_single(&self) {
        println!(
            "project {}: {} ({} chars)",
            self.project,
            if self.matches_first {
                "matches first"
            } else {
                "differs"
            },
            self.chars
        );
    }

    fn display_compact(&self) {
        self.display_single();
    }
}
