//! Site configuration.
//!
//! Both passes are parameterless; the only knobs are the site paths and the
//! placeholder domain. They live in an optional `labroster.json` at the site
//! root. Every key is optional and falls back to the layout of the lab website.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Default config file name, resolved against the working directory.
pub const CONFIG_FILE: &str = "labroster.json";

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "LABROSTER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RosterConfig {
    /// Root of the person record tree; categories are subdirectories.
    #[serde(default = "default_people_dir")]
    pub people_dir: PathBuf,
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    /// Domain used for synthesized placeholder emails.
    #[serde(default = "default_placeholder_domain")]
    pub placeholder_domain: String,
    /// Identity store (`alias: email` lines).
    #[serde(default = "default_emails_file")]
    pub emails_file: PathBuf,
    /// Bibliographic catalog (BibTeX).
    #[serde(default = "default_bib_file")]
    pub bib_file: PathBuf,
    /// Entry field holding the alias annotations.
    #[serde(default = "default_annotation_field")]
    pub annotation_field: String,
    /// Leave ambiguous author matches unannotated instead of taking the
    /// first candidate.
    #[serde(default)]
    pub skip_ambiguous: bool,
}

fn default_people_dir() -> PathBuf {
    PathBuf::from("_people/alumni")
}
fn default_categories() -> Vec<String> {
    ["phd-graduates", "mtech-graduates", "mtech-research-graduates"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}
fn default_placeholder_domain() -> String {
    "placeholder.com".to_string()
}
fn default_emails_file() -> PathBuf {
    PathBuf::from("_data/emails.yml")
}
fn default_bib_file() -> PathBuf {
    PathBuf::from("_bibliography/papers.bib")
}
fn default_annotation_field() -> String {
    "emails".to_string()
}

impl Default for RosterConfig {
    fn default() -> Self {
        RosterConfig {
            people_dir: default_people_dir(),
            categories: default_categories(),
            placeholder_domain: default_placeholder_domain(),
            emails_file: default_emails_file(),
            bib_file: default_bib_file(),
            annotation_field: default_annotation_field(),
            skip_ambiguous: false,
        }
    }
}

impl RosterConfig {
    /// Resolve every relative path against `root`.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        self.people_dir = root.join(&self.people_dir);
        self.emails_file = root.join(&self.emails_file);
        self.bib_file = root.join(&self.bib_file);
        self
    }

    fn validate(&self) -> Result<(), SyncError> {
        if self.placeholder_domain.trim().is_empty() {
            return Err(SyncError::Config("placeholderDomain must not be empty".into()));
        }
        if self.annotation_field.trim().is_empty() {
            return Err(SyncError::Config("annotationField must not be empty".into()));
        }
        Ok(())
    }
}

/// Load the configuration from `$LABROSTER_CONFIG` or `./labroster.json`.
///
/// A missing file is not an error: the defaults describe the standard site
/// layout. A file that exists but does not parse is fatal.
pub fn load_config() -> Result<RosterConfig, SyncError> {
    let path = std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<RosterConfig, SyncError> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(RosterConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| SyncError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let config: RosterConfig = serde_json::from_str(&content)
        .map_err(|e| SyncError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
    config.validate()?;

    Ok(config)
}
