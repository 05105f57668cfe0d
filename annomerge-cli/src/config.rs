//! Persistent CLI configuration: named server profiles plus global settings,
//! stored as TOML under the platform config directory.

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Server URL used when neither a flag nor a profile provides one.
pub const DEFAULT_URL: &str = "http://localhost:8080";

/// On-disk configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CliConfig {
    /// Profile selected when `--profile` is not given
    #[serde(default)]
    pub default_profile: Option<String>,

    /// Named server profiles, kept sorted for stable output
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,

    /// Settings that apply across profiles
    #[serde(default)]
    pub settings: Settings,
}

impl CliConfig {
    /// Load the configuration file, or defaults when none exists yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Write the configuration back, creating the directory if needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory {:?}", dir))?;
        }
        let text = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, text).with_context(|| format!("Failed to write config to {:?}", path))
    }

    /// Platform-specific path of the configuration file.
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("io", "annomerge", "annomerge")
            .context("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Look up a profile by name, or the default profile when `name` is `None`.
    pub fn get_profile(&self, name: Option<&str>) -> Option<&Profile> {
        self.profiles
            .get(name.or(self.default_profile.as_deref())?)
    }

    /// Mutable handle on a profile, inserting an empty one if absent.
    pub fn get_or_create_profile(&mut self, name: &str) -> &mut Profile {
        self.profiles.entry(name.to_string()).or_default()
    }

    /// Mark a profile as the default.
    pub fn set_default_profile(&mut self, name: &str) {
        self.default_profile = Some(name.to_string());
    }

    /// Delete a profile; clears the default when it pointed at it.
    pub fn remove_profile(&mut self, name: &str) -> Option<Profile> {
        if self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }
        self.profiles.remove(name)
    }

    /// Profile names in sorted order.
    pub fn list_profiles(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}

/// Connection settings for one annotation server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Profile {
    /// Server base URL
    #[serde(default)]
    pub url: Option<String>,

    /// API token
    #[serde(default)]
    pub token: Option<String>,

    /// Authorization header style: auto, bearer, or token
    #[serde(default)]
    pub auth_style: Option<String>,

    /// Output format preferred for this profile
    #[serde(default)]
    pub output_format: Option<String>,

    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Profile {
    /// Server URL, falling back to [`DEFAULT_URL`].
    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_URL)
    }
}

/// Profile-independent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Output format when neither flag nor profile chooses one
    #[serde(default = "defaults::output_format")]
    pub output_format: String,

    /// Colored terminal output
    #[serde(default = "defaults::color")]
    pub color: bool,

    /// Verbose logging by default
    #[serde(default)]
    pub verbose: bool,

    /// HTTP request timeout in seconds
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,

    /// Tasks per import batch
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_format: defaults::output_format(),
            color: defaults::color(),
            verbose: false,
            timeout_secs: defaults::timeout_secs(),
            batch_size: defaults::batch_size(),
        }
    }
}

mod defaults {
    pub fn output_format() -> String {
        "table".to_string()
    }

    pub fn color() -> bool {
        true
    }

    pub fn timeout_secs() -> u64 {
        120
    }

    pub fn batch_size() -> usize {
        1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_has_no_profiles() {
        let config = CliConfig::default();
        assert!(config.default_profile.is_none());
        assert!(config.profiles.is_empty());
        assert!(config.get_profile(None).is_none());
    }

    #[test]
    fn profile_url_falls_back_to_default() {
        assert_eq!(Profile::default().url(), DEFAULT_URL);

        let profile = Profile {
            url: Some("http://annotate.example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(profile.url(), "http://annotate.example.com");
    }

    #[test]
    fn settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.output_format, "table");
        assert!(settings.color);
        assert!(!settings.verbose);
        assert_eq!(settings.timeout_secs, 120);
        assert_eq!(settings.batch_size, 1000);
    }

    #[test]
    fn removing_the_default_profile_clears_the_default() {
        let mut config = CliConfig::default();
        config.get_or_create_profile("staging");
        config.set_default_profile("staging");

        config.remove_profile("staging");
        assert!(config.default_profile.is_none());
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn profile_names_come_back_sorted() {
        let mut config = CliConfig::default();
        config.get_or_create_profile("prod");
        config.get_or_create_profile("dev");
        config.get_or_create_profile("staging");
        assert_eq!(config.list_profiles(), vec!["dev", "prod", "staging"]);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = CliConfig::default();
        let profile = config.get_or_create_profile("prod");
        profile.url = Some("http://annotate.example.com".to_string());
        profile.token = Some("secret".to_string());
        config.set_default_profile("prod");

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: CliConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.default_profile.as_deref(), Some("prod"));
        assert_eq!(
            parsed.profiles["prod"].url.as_deref(),
            Some("http://annotate.example.com")
        );
    }
}
