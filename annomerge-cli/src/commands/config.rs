//! Configuration commands

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::io::IsTerminal;

use crate::config::CliConfig;
use crate::context::Context;

/// Configuration management commands
#[derive(Debug, Args)]
pub struct ConfigCommands {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., settings.batch_size or profile.prod.url)
        key: String,

        /// Value to set
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// List all profiles
    Profiles,

    /// Set the default profile
    UseProfile {
        /// Profile name to use as default
        name: String,
    },

    /// Create a new profile
    CreateProfile {
        /// Server URL for this profile
        #[arg(long, value_name = "URL")]
        server: Option<String>,

        /// Copy settings from another profile
        #[arg(long)]
        from: Option<String>,

        /// Profile name
        name: String,
    },

    /// Delete a profile
    DeleteProfile {
        /// Profile name to delete
        name: String,

        /// Force deletion without confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,

    /// Reset configuration to defaults
    Reset {
        /// Force reset without confirmation
        #[arg(short, long)]
        force: bool,
    },
}

/// Execute configuration commands
pub async fn execute(ctx: &Context, cmd: ConfigCommands) -> Result<()> {
    match cmd.command {
        ConfigSubcommand::Show => show(ctx).await,
        ConfigSubcommand::Set { key, value } => set(ctx, &key, &value).await,
        ConfigSubcommand::Get { key } => get(ctx, &key).await,
        ConfigSubcommand::Profiles => list_profiles(ctx).await,
        ConfigSubcommand::UseProfile { name } => use_profile(ctx, &name).await,
        ConfigSubcommand::CreateProfile { server, from, name } => {
            create_profile(ctx, &name, server.as_deref(), from.as_deref()).await
        }
        ConfigSubcommand::DeleteProfile { name, force } => delete_profile(ctx, &name, force).await,
        ConfigSubcommand::Path => show_path().await,
        ConfigSubcommand::Reset { force } => reset(ctx, force).await,
    }
}

async fn show(ctx: &Context) -> Result<()> {
    println!("{}", "Configuration".bold().underline());
    println!();

    println!("{}", "Settings:".cyan());
    println!("  output_format: {}", ctx.config.settings.output_format);
    println!("  color: {}", ctx.config.settings.color);
    println!("  verbose: {}", ctx.config.settings.verbose);
    println!("  timeout_secs: {}", ctx.config.settings.timeout_secs);
    println!("  batch_size: {}", ctx.config.settings.batch_size);

    if let Some(default) = &ctx.config.default_profile {
        println!();
        println!("{}: {}", "Default profile".cyan(), default);
    }

    println!();
    println!("{}", "Profiles:".cyan());

    if ctx.config.profiles.is_empty() {
        println!("  No profiles configured");
    } else {
        for (name, p) in &ctx.config.profiles {
            let default_marker = if ctx.config.default_profile.as_deref() == Some(name) {
                " (default)".green().to_string()
            } else {
                String::new()
            };
            println!("  [{}]{}", name, default_marker);
            println!("    url: {}", p.url());
            println!(
                "    token: {}",
                if p.token.is_some() { "(set)" } else { "(not set)" }
            );
            if let Some(style) = &p.auth_style {
                println!("    auth_style: {}", style);
            }
            if !p.headers.is_empty() {
                println!("    headers:");
                for (k, v) in &p.headers {
                    println!("      {}: {}", k, v);
                }
            }
        }
    }

    Ok(())
}

async fn set(ctx: &Context, key: &str, value: &str) -> Result<()> {
    let mut config = ctx.config.clone();

    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["settings", setting] => match *setting {
            "output_format" => config.settings.output_format = value.to_string(),
            "color" => config.settings.color = value.parse().context("Invalid boolean value")?,
            "verbose" => {
                config.settings.verbose = value.parse().context("Invalid boolean value")?
            }
            "timeout_secs" => {
                config.settings.timeout_secs = value.parse().context("Invalid number")?
            }
            "batch_size" => {
                config.settings.batch_size = value.parse().context("Invalid number")?
            }
            _ => anyhow::bail!("Unknown setting: {}", setting),
        },
        ["profile", pname, field] => {
            let p = config.get_or_create_profile(pname);
            set_profile_field(p, field, value)?;
        }
        ["default_profile"] => {
            if !config.profiles.contains_key(value) {
                anyhow::bail!("Profile '{}' not found", value);
            }
            config.set_default_profile(value);
        }
        [field] => {
            let pname = ctx.profile_name.as_deref().unwrap_or("default");
            let p = config.get_or_create_profile(pname);
            set_profile_field(p, field, value)?;
            if config.default_profile.is_none() {
                config.set_default_profile(pname);
            }
        }
        _ => anyhow::bail!("Unknown configuration key: {}", key),
    }

    config.save().context("Failed to save configuration")?;
    if key.ends_with("token") {
        ctx.output.success(&format!("Set {}", key));
    } else {
        ctx.output.success(&format!("Set {} = {}", key, value));
    }

    Ok(())
}

fn set_profile_field(p: &mut crate::config::Profile, field: &str, value: &str) -> Result<()> {
    match field {
        "url" => p.url = Some(value.to_string()),
        "token" => p.token = Some(value.to_string()),
        "auth_style" => p.auth_style = Some(value.to_string()),
        "output_format" => p.output_format = Some(value.to_string()),
        _ => anyhow::bail!("Unknown profile field: {}", field),
    }
    Ok(())
}

async fn get(ctx: &Context, key: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();

    let value = match parts.as_slice() {
        ["settings", setting] => match *setting {
            "output_format" => ctx.config.settings.output_format.clone(),
            "color" => ctx.config.settings.color.to_string(),
            "verbose" => ctx.config.settings.verbose.to_string(),
            "timeout_secs" => ctx.config.settings.timeout_secs.to_string(),
            "batch_size" => ctx.config.settings.batch_size.to_string(),
            _ => anyhow::bail!("Unknown setting: {}", setting),
        },
        ["profile", pname, field] => {
            let p = ctx
                .config
                .get_profile(Some(*pname))
                .with_context(|| format!("Profile '{}' not found", pname))?;
            get_profile_field(p, field)?
        }
        ["default_profile"] => ctx
            .config
            .default_profile
            .clone()
            .unwrap_or_else(|| "not set".to_string()),
        [field] => {
            let pname = ctx.profile_name.as_deref().unwrap_or("default");
            let p = ctx
                .config
                .get_profile(Some(pname))
                .with_context(|| format!("Profile '{}' not found", pname))?;
            get_profile_field(p, field)?
        }
        _ => anyhow::bail!("Unknown configuration key: {}", key),
    };

    println!("{}", value);
    Ok(())
}

fn get_profile_field(p: &crate::config::Profile, field: &str) -> Result<String> {
    let value = match field {
        "url" => p.url().to_string(),
        // Never echo the secret back
        "token" => if p.token.is_some() { "(set)" } else { "(not set)" }.to_string(),
        "auth_style" => p.auth_style.clone().unwrap_or_default(),
        "output_format" => p.output_format.clone().unwrap_or_default(),
        _ => anyhow::bail!("Unknown profile field: {}", field),
    };
    Ok(value)
}

async fn list_profiles(ctx: &Context) -> Result<()> {
    if ctx.config.profiles.is_empty() {
        ctx.output.info(
            "No profiles configured. Run 'annomerge config create-profile <name>' to create one.",
        );
        return Ok(());
    }

    println!("{}", "Configured profiles:".bold());
    println!();

    for name in ctx.config.list_profiles() {
        let is_default = ctx.config.default_profile.as_deref() == Some(name);
        if is_default {
            println!("  {} {}", "→".green(), name.green().bold());
        } else {
            println!("    {}", name);
        }
    }

    Ok(())
}

async fn use_profile(ctx: &Context, name: &str) -> Result<()> {
    let mut config = ctx.config.clone();

    if !config.profiles.contains_key(name) {
        anyhow::bail!(
            "Profile '{}' not found. Run 'annomerge config profiles' to list available profiles.",
            name
        );
    }

    config.set_default_profile(name);
    config.save().context("Failed to save configuration")?;

    ctx.output.success(&format!("Now using profile '{}'", name));
    Ok(())
}

async fn create_profile(
    ctx: &Context,
    name: &str,
    server: Option<&str>,
    from: Option<&str>,
) -> Result<()> {
    let mut config = ctx.config.clone();

    if config.profiles.contains_key(name) {
        anyhow::bail!("Profile '{}' already exists", name);
    }

    let mut new_profile = if let Some(source) = from {
        config
            .get_profile(Some(source))
            .cloned()
            .with_context(|| format!("Source profile '{}' not found", source))?
    } else {
        crate::config::Profile::default()
    };

    if let Some(url) = server {
        new_profile.url = Some(url.to_string());
    }

    // Scripts set the token with `config set profile.<name>.token` instead.
    if new_profile.token.is_none() && std::io::stdin().is_terminal() {
        let entered = dialoguer::Password::new()
            .with_prompt(format!("API token for '{}' (empty to skip)", name))
            .allow_empty_password(true)
            .interact()
            .context("Failed to read token")?;
        if !entered.is_empty() {
            new_profile.token = Some(entered);
        }
    }

    config.profiles.insert(name.to_string(), new_profile);
    if config.default_profile.is_none() {
        config.set_default_profile(name);
    }
    config.save().context("Failed to save configuration")?;

    ctx.output.success(&format!("Created profile '{}'", name));

    if let Some(source) = from {
        ctx.output.info(&format!("Copied settings from '{}'", source));
    }

    Ok(())
}

async fn delete_profile(ctx: &Context, name: &str, force: bool) -> Result<()> {
    let mut config = ctx.config.clone();

    if !config.profiles.contains_key(name) {
        anyhow::bail!("Profile '{}' not found", name);
    }

    if !force {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!("Delete profile '{}'?", name))
            .default(false)
            .interact()
            .context("Failed to get confirmation")?;

        if !confirm {
            ctx.output.info("Cancelled");
            return Ok(());
        }
    }

    config.remove_profile(name);
    config.save().context("Failed to save configuration")?;

    ctx.output.success(&format!("Deleted profile '{}'", name));
    Ok(())
}

async fn show_path() -> Result<()> {
    println!("{}", "Configuration path:".bold());
    println!();

    match CliConfig::config_path() {
        Ok(path) => {
            let exists = path.exists();
            let status = if exists { "✓".green() } else { "✗".red() };
            println!("  Config: {} {}", status, path.display());
        }
        Err(e) => println!("  Config: Error: {}", e),
    }

    Ok(())
}

async fn reset(ctx: &Context, force: bool) -> Result<()> {
    if !force {
        let confirm = dialoguer::Confirm::new()
            .with_prompt("Reset all configuration to defaults? This cannot be undone.")
            .default(false)
            .interact()
            .context("Failed to get confirmation")?;

        if !confirm {
            ctx.output.info("Cancelled");
            return Ok(());
        }
    }

    let config = CliConfig::default();
    config.save().context("Failed to save configuration")?;

    ctx.output.success("Configuration reset to defaults");
    Ok(())
}
