//! CLI execution context

use anyhow::{Context as _, Result};
use annomerge_sdk::{AuthStyle, SdkConfig, StudioClient};
use clap::ValueEnum;
use std::time::Duration;

use crate::cli::Cli;
use crate::config::{CliConfig, Profile, DEFAULT_URL};
use crate::output::{OutputFormat, OutputWriter};

/// Execution context for CLI commands
pub struct Context {
    /// CLI configuration
    pub config: CliConfig,

    /// Active profile name
    pub profile_name: Option<String>,

    /// Active profile
    pub profile: Profile,

    /// Output format
    pub output_format: OutputFormat,

    /// Output writer
    pub output: OutputWriter,

    /// Verbose mode
    pub verbose: bool,

    /// Server URL override (flag or environment)
    pub url_override: Option<String>,

    /// API token override (flag or environment)
    pub token_override: Option<String>,

    /// Auth header style override (flag)
    pub auth_style_override: Option<String>,
}

impl Context {
    /// Create a new context from CLI arguments
    pub fn new(cli: &Cli) -> Result<Self> {
        // Load configuration
        let config = CliConfig::load().unwrap_or_default();

        // Determine active profile
        let profile_name = cli.profile.clone().or_else(|| config.default_profile.clone());
        let profile = config
            .get_profile(profile_name.as_deref())
            .cloned()
            .unwrap_or_default();

        // Determine output format: flag, then profile, then settings
        let output_format = cli
            .output
            .or_else(|| parse_format(profile.output_format.as_deref()))
            .or_else(|| parse_format(Some(&config.settings.output_format)))
            .unwrap_or(OutputFormat::Table);
        let no_color = cli.no_color || !config.settings.color;
        let output = OutputWriter::new(output_format, no_color);

        Ok(Self {
            verbose: cli.verbose || config.settings.verbose,
            config,
            profile_name,
            profile,
            output_format,
            output,
            url_override: cli.url.clone(),
            token_override: cli.token.clone(),
            auth_style_override: cli.auth_style.clone(),
        })
    }

    /// Get the effective server URL
    pub fn base_url(&self) -> &str {
        self.url_override
            .as_deref()
            .or(self.profile.url.as_deref())
            .unwrap_or(DEFAULT_URL)
    }

    /// Get the effective API token, if any
    pub fn token(&self) -> Option<&str> {
        self.token_override
            .as_deref()
            .or(self.profile.token.as_deref())
    }

    /// Get the effective auth header style
    pub fn auth_style(&self) -> Result<AuthStyle> {
        let raw = self
            .auth_style_override
            .as_deref()
            .or(self.profile.auth_style.as_deref());
        match raw {
            Some(style) => style
                .parse()
                .map_err(|err| anyhow::anyhow!("Invalid auth style: {err}")),
            None => Ok(AuthStyle::Auto),
        }
    }

    /// Build the SDK configuration from flags, profile, and settings
    pub fn sdk_config(&self) -> Result<SdkConfig> {
        let mut config = SdkConfig::new(self.base_url())
            .with_auth_style(self.auth_style()?)
            .with_timeout(Duration::from_secs(self.config.settings.timeout_secs))
            .with_logging(self.verbose);

        if let Some(token) = self.token() {
            config = config.with_token(token);
        }
        for (name, value) in &self.profile.headers {
            config = config.with_header(name.clone(), value.clone());
        }

        config
            .validate()
            .context("Invalid server configuration")?;
        Ok(config)
    }

    /// Connect to the server, probing the auth header style when unset
    pub async fn create_client(&self) -> Result<StudioClient> {
        StudioClient::connect(self.sdk_config()?)
            .await
            .with_context(|| format!("Failed to connect to {}", self.base_url()))
    }
}

fn parse_format(raw: Option<&str>) -> Option<OutputFormat> {
    OutputFormat::from_str(raw?, true).ok()
}
