//! Project inspection commands

use anyhow::{Context as _, Result};
use annomerge_sdk::{Project, ProjectId};
use clap::{Args, Subcommand};
use comfy_table::Cell;
use serde::Serialize;

use crate::context::Context;
use crate::output::{
    format_relative_time, print_field, print_optional_field, print_section, TableDisplay,
};

/// Project inspection commands
#[derive(Debug, Args)]
pub struct ProjectsCommands {
    #[command(subcommand)]
    pub command: ProjectsSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ProjectsSubcommand {
    /// List projects
    List {
        /// Maximum number of projects to return
        #[arg(long, default_value = "100")]
        page_size: u32,
    },

    /// Get project details
    Get {
        /// Project ID
        id: ProjectId,

        /// Count tasks and annotations by streaming the task listing
        #[arg(short, long)]
        count: bool,
    },
}

/// Execute project commands
pub async fn execute(ctx: &Context, cmd: ProjectsCommands) -> Result<()> {
    match cmd.command {
        ProjectsSubcommand::List { page_size } => list_projects(ctx, page_size).await,
        ProjectsSubcommand::Get { id, count } => get_project(ctx, id, count).await,
    }
}

async fn list_projects(ctx: &Context, page_size: u32) -> Result<()> {
    let client = ctx.create_client().await?;

    let spinner = ctx.output.spinner("Fetching projects...");
    let result = client.projects().list(page_size).await;
    if let Some(s) = spinner {
        s.finish_and_clear();
    }

    let projects = result.context("Failed to list projects")?;
    let displays: Vec<ProjectDisplay> = projects.into_iter().map(ProjectDisplay::from).collect();

    ctx.output.write_list(
        &displays,
        &["ID", "Title", "Tasks", "Annotations", "Created"],
    )?;

    Ok(())
}

async fn get_project(ctx: &Context, id: ProjectId, count: bool) -> Result<()> {
    let client = ctx.create_client().await?;

    let spinner = ctx.output.spinner("Fetching project...");
    let result = client.projects().get(id).await;

    let project = match result {
        Ok(project) => project,
        Err(err) => {
            if let Some(s) = spinner {
                s.finish_and_clear();
            }
            return Err(err).with_context(|| format!("Failed to get project {}", id));
        }
    };

    // Server counters can be absent or stale; stream the listing when asked
    // or when they look empty.
    let needs_count = count || project.task_number.unwrap_or(0) == 0;
    let mut display = ProjectDisplay::from(project);
    if needs_count {
        if let Some(s) = &spinner {
            s.set_message("Counting tasks and annotations...");
        }
        let exporter = client.exporter(id).await?;
        let tally = exporter
            .count_annotations(id)
            .await
            .context("Failed to count annotations")?;
        display.tasks = Some(tally.tasks as i64);
        display.annotations = Some(tally.annotations as i64);
    }

    if let Some(s) = spinner {
        s.finish_and_clear();
    }

    ctx.output.write(&display)?;

    Ok(())
}

/// Display representation of a project
#[derive(Debug, Serialize)]
struct ProjectDisplay {
    id: i64,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tasks: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    annotations: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    label_config: String,
}

impl From<Project> for ProjectDisplay {
    fn from(project: Project) -> Self {
        Self {
            id: project.id.into(),
            title: project.title,
            description: project.description,
            tasks: project.task_number,
            annotations: project.annotation_number,
            created_at: project.created_at.as_ref().map(format_relative_time),
            label_config: project.label_config,
        }
    }
}

impl TableDisplay for ProjectDisplay {
    fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::new(self.id),
            Cell::new(&self.title),
            Cell::new(
                self.tasks
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(
                self.annotations
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(self.created_at.as_deref().unwrap_or("-")),
        ]
    }

    fn display_single(&self) {
        print_section("Project");
        print_field("ID", &self.id.to_string());
        print_field("Title", &self.title);
        print_optional_field("Description", self.description.as_deref());
        print_optional_field(
            "Tasks",
            self.tasks.map(|n| n.to_string()).as_deref(),
        );
        print_optional_field(
            "Annotations",
            self.annotations.map(|n| n.to_string()).as_deref(),
        );
        print_optional_field("Created", self.created_at.as_deref());

        print_section("Labeling schema");
        if self.label_config.trim().is_empty() {
            println!("  (empty or no config)");
        } else {
            println!("{}", self.label_config);
        }
    }

    fn display_compact(&self) {
        println!(
            "{}\t{}\t{} task(s)",
            self.id,
            self.title,
            self.tasks
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string())
        );
    }
}
