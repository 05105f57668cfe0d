//! Terminal rendering: tables, structured output, and status lines.

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use serde::Serialize;

/// How command results are rendered.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable tables and detail views (default)
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
    /// YAML documents
    Yaml,
    /// One line per item, suitable for piping
    Compact,
}

impl OutputFormat {
    fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Compact => "compact",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders command results in the selected format.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    /// Create a writer, disabling ANSI colors globally when asked.
    pub fn new(format: OutputFormat, no_color: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format }
    }

    /// The format this writer renders
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn emit_serialized<T: Serialize>(&self, value: &T) -> Result<()> {
        if self.format == OutputFormat::Yaml {
            print!("{}", serde_yaml::to_string(value)?);
        } else {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        Ok(())
    }

    /// Render a single item in detail.
    pub fn write<T: Serialize + TableDisplay>(&self, item: &T) -> Result<()> {
        match self.format {
            OutputFormat::Table => item.display_single(),
            OutputFormat::Compact => item.display_compact(),
            OutputFormat::Json | OutputFormat::Yaml => self.emit_serialized(item)?,
        }
        Ok(())
    }

    /// Render a list of items, as a table when in table mode.
    pub fn write_list<T: Serialize + TableDisplay>(
        &self,
        items: &[T],
        headers: &[&str],
    ) -> Result<()> {
        match self.format {
            OutputFormat::Table => {
                if items.is_empty() {
                    println!("{}", "No items found.".dimmed());
                    return Ok(());
                }
                let mut table = styled_table(headers);
                for item in items {
                    table.add_row(item.to_row());
                }
                println!("{table}");
                println!(
                    "\n{} {} item(s)",
                    "Total:".bold(),
                    items.len().to_string().green()
                );
            }
            OutputFormat::Compact => {
                for item in items {
                    item.display_compact();
                }
            }
            OutputFormat::Json | OutputFormat::Yaml => self.emit_serialized(&items)?,
        }
        Ok(())
    }

    /// Print a success line.
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Table => println!("{} {}", "✓".green(), message),
            _ => println!("{}", message),
        }
    }

    /// Print an error line to stderr.
    pub fn error(&self, message: &str) {
        match self.format {
            OutputFormat::Table => eprintln!("{} {}", "✗".red(), message),
            _ => eprintln!("Error: {}", message),
        }
    }

    /// Print a warning line.
    pub fn warning(&self, message: &str) {
        match self.format {
            OutputFormat::Table => println!("{} {}", "⚠".yellow(), message),
            _ => println!("Warning: {}", message),
        }
    }

    /// Print an informational line.
    pub fn info(&self, message: &str) {
        match self.format {
            OutputFormat::Table => println!("{} {}", "ℹ".blue(), message),
            _ => println!("{}", message),
        }
    }

    /// Spinner for long-running operations; `None` outside table mode.
    pub fn spinner(&self, message: &str) -> Option<indicatif::ProgressBar> {
        if self.format != OutputFormat::Table {
            return None;
        }
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_style(
            indicatif::ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(pb)
    }

    /// Progress bar with a known total; `None` outside table mode.
    pub fn progress_bar(&self, total: u64, message: &str) -> Option<indicatif::ProgressBar> {
        if self.format != OutputFormat::Table {
            return None;
        }
        let pb = indicatif::ProgressBar::new(total);
        pb.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );
        pb.set_message(message.to_string());
        Some(pb)
    }
}

fn styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

/// Implemented by display structs that know how to render themselves
/// as table rows and detail views.
pub trait TableDisplay {
    /// One table row for list output
    fn to_row(&self) -> Vec<Cell>;

    /// Multi-line detail view
    fn display_single(&self);

    /// Single-line view for compact output
    fn display_compact(&self);
}

/// Print an indented `key: value` line.
pub fn print_field(key: &str, value: &str) {
    println!("  {}: {}", key.cyan(), value);
}

/// Print a `key: value` line only when the value is present.
pub fn print_optional_field(key: &str, value: Option<&str>) {
    if let Some(v) = value {
        print_field(key, v);
    }
}

/// Print an underlined section heading.
pub fn print_section(title: &str) {
    println!("\n{}", title.bold().underline());
}

/// Absolute timestamp for display.
pub fn format_timestamp(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Human-friendly age; falls back to the absolute timestamp past 30 days.
pub fn format_relative_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let elapsed = chrono::Utc::now().signed_duration_since(*dt);

    if elapsed.num_days() >= 30 {
        format_timestamp(dt)
    } else if elapsed.num_hours() >= 24 {
        format!("{} day(s) ago", elapsed.num_days())
    } else if elapsed.num_minutes() >= 60 {
        format!("{} hour(s) ago", elapsed.num_hours())
    } else if elapsed.num_seconds() >= 60 {
        format!("{} minute(s) ago", elapsed.num_minutes())
    } else {
        "just now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_round_trip() {
        for fmt in [
            OutputFormat::Table,
            OutputFormat::Json,
            OutputFormat::Yaml,
            OutputFormat::Compact,
        ] {
            assert_eq!(fmt.to_string(), fmt.as_str());
        }
        assert_eq!(OutputFormat::Compact.to_string(), "compact");
    }

    #[test]
    fn absolute_timestamp_formatting() {
        let dt = chrono::DateTime::parse_from_rfc3339("2024-03-01T12:30:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        assert_eq!(format_timestamp(&dt), "2024-03-01 12:30:00 UTC");
    }

    #[test]
    fn relative_time_for_recent_instant() {
        let dt = chrono::Utc::now() - chrono::Duration::seconds(5);
        assert_eq!(format_relative_time(&dt), "just now");
    }
}
