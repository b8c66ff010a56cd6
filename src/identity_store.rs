//! Identity store on disk: a flat `alias: email` file (`_data/emails.yml`).
//!
//! The file is hand-maintained above the generated block, so it is never
//! rewritten. Loading tolerates comments, blank lines, section keys without
//! a value and quoted values. New identities are appended one line at a time
//! and synced before the pass moves on.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::SyncError;
use crate::registry::{Identity, IdentityJournal};

/// Marker placed once above the generated entries.
pub const GENERATED_HEADER: &str = "# Auto-generated Alumni Emails";

fn entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^\s#:'][^:]*?)\s*:\s+(\S.*)$").unwrap())
}

/// Parse one line of the identity file. Returns `None` for anything that is
/// not a top-level `key: value` pair.
pub fn parse_line(line: &str) -> Option<Identity> {
    let line = line.trim_end();
    let caps = entry_re().captures(line)?;
    let alias = caps.get(1)?.as_str().trim_matches('"').to_string();

    let mut value = caps.get(2)?.as_str();
    // YAML comments need a space before the hash.
    if let Some(idx) = value.find(" #") {
        value = &value[..idx];
    }
    let value = value.trim();
    let value = strip_quotes(value);
    if alias.is_empty() || value.is_empty() {
        return None;
    }

    Some(Identity::new(alias, value))
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// File-backed [`IdentityJournal`].
#[derive(Debug, Clone)]
pub struct IdentityFile {
    path: PathBuf,
    /// Whether the file ends without a newline. `None` until first read.
    needs_newline: Option<bool>,
}

impl IdentityFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        IdentityFile {
            path: path.into(),
            needs_newline: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the generated-entries header once. Creates the file (and its
    /// directory) if needed. Returns true if the header was written.
    pub fn ensure_header(&mut self) -> Result<bool, SyncError> {
        let content = self.read_existing()?;
        if content.contains(GENERATED_HEADER) {
            self.remember_tail(&content);
            return Ok(false);
        }

        let mut file = self.open_append()?;
        write!(file, "\n\n{}\n", GENERATED_HEADER)
            .and_then(|_| file.sync_data())
            .map_err(|e| SyncError::store(&self.path, e))?;
        self.needs_newline = Some(false);
        log::debug!("Added header to {}", self.path.display());
        Ok(true)
    }

    fn remember_tail(&mut self, content: &str) {
        self.needs_newline = Some(!content.is_empty() && !content.ends_with('\n'));
    }

    fn read_existing(&self) -> Result<String, SyncError> {
        if !self.path.exists() {
            return Ok(String::new());
        }
        fs::read_to_string(&self.path).map_err(|e| SyncError::store(&self.path, e))
    }

    fn open_append(&self) -> Result<fs::File, SyncError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| SyncError::store(dir, e))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SyncError::store(&self.path, e))
    }
}

impl IdentityJournal for IdentityFile {
    fn load(&mut self) -> Result<Vec<Identity>, SyncError> {
        let content = self.read_existing()?;
        self.remember_tail(&content);
        Ok(content.lines().filter_map(parse_line).collect())
    }

    fn append(&mut self, identity: &Identity) -> Result<(), SyncError> {
        if self.needs_newline.is_none() {
            let content = self.read_existing()?;
            self.remember_tail(&content);
        }

        let mut line = String::new();
        if self.needs_newline == Some(true) {
            line.push('\n');
        }
        line.push_str(&format!("{}: {}\n", identity.alias, identity.email));

        let mut file = self.open_append()?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| SyncError::store(&self.path, e))?;
        self.needs_newline = Some(false);
        Ok(())
    }
}
