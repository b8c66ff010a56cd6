//! Person record tree I/O.
//!
//! Each person is one markdown document under a category directory:
//!   {peopleDir}/{category}/{name}.md
//!
//! The document starts with a YAML front matter block holding at least
//! `firstname`, and optionally `lastname` and `email`. The only write this
//! module ever performs is putting a synthesized `email:` into that block.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use walkdir::WalkDir;

use crate::error::{SkipReason, SyncError};
use crate::resolver::PersonSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonRecord {
    pub path: PathBuf,
    pub category: String,
    /// Trimmed; may be empty (the resolver skips such records).
    pub firstname: String,
    pub lastname: Option<String>,
    pub declared_email: Option<String>,
}

impl PersonRecord {
    pub fn new(firstname: &str, lastname: Option<&str>, declared_email: Option<&str>) -> Self {
        PersonRecord {
            path: PathBuf::new(),
            category: String::new(),
            firstname: firstname.trim().to_string(),
            lastname: non_blank(lastname),
            declared_email: non_blank(declared_email),
        }
    }

    /// File name used in log lines.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{} {}", self.firstname, self.lastname.as_deref().unwrap_or("")))
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// A document that could not be turned into a [`PersonRecord`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    pub path: PathBuf,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// One scanned document, usable or not.
#[derive(Debug, Clone, PartialEq)]
pub enum PersonDocument {
    Record(PersonRecord),
    Unusable(SkippedRecord),
}

impl PersonDocument {
    pub fn record(&self) -> Option<&PersonRecord> {
        match self {
            PersonDocument::Record(r) => Some(r),
            PersonDocument::Unusable(_) => None,
        }
    }
}

// =============================================================================
// Front matter
// =============================================================================

fn front_matter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\A---\r?\n(.*?)\r?\n---").unwrap())
}

fn email_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^email:[^\r\n]*$").unwrap())
}

/// Byte range of the front matter text (without delimiters), if any.
fn front_matter_span(content: &str) -> Option<std::ops::Range<usize>> {
    front_matter_re()
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.range())
}

fn extract_string(fm: &Mapping, key: &str) -> Option<String> {
    match fm.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a person document's front matter.
pub fn parse_person(path: &Path, category: &str, content: &str) -> Result<PersonRecord, SkipReason> {
    let span = front_matter_span(content).ok_or(SkipReason::MissingFrontMatter)?;
    let value: Value = serde_yaml::from_str(&content[span])
        .map_err(|e| SkipReason::InvalidFrontMatter(e.to_string()))?;
    let fm = match value {
        Value::Mapping(m) => m,
        _ => {
            return Err(SkipReason::InvalidFrontMatter(
                "front matter is not a mapping".to_string(),
            ))
        }
    };

    let firstname = extract_string(&fm, "firstname");
    let lastname = extract_string(&fm, "lastname");
    let email = extract_string(&fm, "email");

    let mut record = PersonRecord::new(
        firstname.as_deref().unwrap_or(""),
        lastname.as_deref(),
        email.as_deref(),
    );
    record.path = path.to_path_buf();
    record.category = category.to_string();
    Ok(record)
}

/// Put `email` into the front matter of `content`, replacing an existing
/// `email:` line or appending one as the last line of the block.
pub fn insert_email(content: &str, email: &str) -> Option<String> {
    let span = front_matter_span(content)?;
    let fm = &content[span.clone()];
    let line = format!("email: {}", email);

    let new_fm = if email_line_re().is_match(fm) {
        email_line_re()
            .replace(fm, regex::NoExpand(line.as_str()))
            .into_owned()
    } else {
        format!("{}\n{}", fm, line)
    };

    let mut out = String::with_capacity(content.len() + line.len() + 1);
    out.push_str(&content[..span.start]);
    out.push_str(&new_fm);
    out.push_str(&content[span.end..]);
    Some(out)
}

// =============================================================================
// Store
// =============================================================================

/// The person record tree: `root/{category}/*.md`.
#[derive(Debug, Clone)]
pub struct PersonStore {
    root: PathBuf,
    categories: Vec<String>,
}

impl PersonStore {
    pub fn new(root: impl Into<PathBuf>, categories: &[String]) -> Self {
        PersonStore {
            root: root.into(),
            categories: categories.to_vec(),
        }
    }

    /// Read every person document, category by category, files sorted by name.
    ///
    /// Missing category directories are skipped.
    pub fn scan(&self) -> Vec<PersonDocument> {
        let mut documents = Vec::new();

        for category in &self.categories {
            let dir = self.root.join(category);
            if !dir.is_dir() {
                log::debug!("No directory for category {}, skipping", category);
                continue;
            }
            log::info!("Processing {}...", category);

            let walker = WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name();
            for entry in walker {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        log::warn!("Failed to list {}: {}", dir.display(), e);
                        continue;
                    }
                };
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|e| e.to_str()) != Some("md")
                {
                    continue;
                }

                let parsed = fs::read_to_string(path)
                    .map_err(|e| SkipReason::Unreadable(e.to_string()))
                    .and_then(|content| parse_person(path, category, &content));
                documents.push(match parsed {
                    Ok(record) => PersonDocument::Record(record),
                    Err(reason) => PersonDocument::Unusable(SkippedRecord {
                        path: path.to_path_buf(),
                        reason,
                    }),
                });
            }
        }

        documents
    }
}

impl PersonSink for PersonStore {
    fn write_back_email(&mut self, record: &PersonRecord, email: &str) -> Result<(), SyncError> {
        let path = &record.path;
        let content = fs::read_to_string(path).map_err(|e| SyncError::store(path, e))?;
        let updated = insert_email(&content, email)
            .ok_or_else(|| SyncError::Parse(format!("front matter of {}", path.display())))?;
        crate::util::atomic_write_str(path, &updated).map_err(|e| SyncError::store(path, e))?;
        log::info!("Updated {} with placeholder email", record.display_name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JANE: &str = "---\nlayout: person\nfirstname: Jane\nlastname: Doe\n---\n\nThesis on signals.\n";

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_person_basic() {
        let record = parse_person(Path::new("jane.md"), "phd-graduates", JANE).unwrap();
        assert_eq!(record.firstname, "Jane");
        assert_eq!(record.lastname.as_deref(), Some("Doe"));
        assert_eq!(record.declared_email, None);
        assert_eq!(record.category, "phd-graduates");
    }

    #[test]
    fn test_parse_person_blank_values_are_absent() {
        let doc = "---\nfirstname: '  Sam '\nlastname: ''\nemail:\n---\n";
        let record = parse_person(Path::new("sam.md"), "c", doc).unwrap();
        assert_eq!(record.firstname, "Sam");
        assert_eq!(record.lastname, None);
        assert_eq!(record.declared_email, None);
    }

    #[test]
    fn test_parse_person_without_front_matter() {
        let err = parse_person(Path::new("x.md"), "c", "# Just a page\n").unwrap_err();
        assert_eq!(err, SkipReason::MissingFrontMatter);
    }

    #[test]
    fn test_parse_person_invalid_yaml() {
        let err = parse_person(Path::new("x.md"), "c", "---\nfirstname: [unclosed\n---\n").unwrap_err();
        assert!(matches!(err, SkipReason::InvalidFrontMatter(_)));
    }

    #[test]
    fn test_parse_person_missing_firstname_still_parses() {
        let record = parse_person(Path::new("x.md"), "c", "---\nlastname: Doe\n---\n").unwrap();
        assert!(record.firstname.is_empty());
    }

    #[test]
    fn test_insert_email_appends_line() {
        let updated = insert_email(JANE, "jane.doe@example.org").unwrap();
        assert_eq!(
            updated,
            "---\nlayout: person\nfirstname: Jane\nlastname: Doe\nemail: jane.doe@example.org\n---\n\nThesis on signals.\n"
        );
    }

    #[test]
    fn test_insert_email_replaces_empty_key() {
        let doc = "---\nfirstname: Sam\nemail:\nlastname: Lee\n---\nbody\n";
        let updated = insert_email(doc, "sam.lee@example.org").unwrap();
        assert_eq!(
            updated,
            "---\nfirstname: Sam\nemail: sam.lee@example.org\nlastname: Lee\n---\nbody\n"
        );
        let record = parse_person(Path::new("x.md"), "c", &updated).unwrap();
        assert_eq!(record.declared_email.as_deref(), Some("sam.lee@example.org"));
    }

    #[test]
    fn test_insert_email_without_front_matter() {
        assert_eq!(insert_email("no front matter", "a@b.c"), None);
    }

    #[test]
    fn test_scan_orders_by_category_then_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "phd/zed.md", "---\nfirstname: Zed\n---\n");
        write(dir.path(), "phd/amy.md", "---\nfirstname: Amy\n---\n");
        write(dir.path(), "phd/notes.txt", "ignored");
        write(dir.path(), "mtech/bob.md", "no front matter");

        let store = PersonStore::new(
            dir.path(),
            &["phd".to_string(), "missing".to_string(), "mtech".to_string()],
        );
        let docs = store.scan();

        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].record().unwrap().firstname, "Amy");
        assert_eq!(docs[1].record().unwrap().firstname, "Zed");
        assert!(matches!(
            &docs[2],
            PersonDocument::Unusable(SkippedRecord { reason: SkipReason::MissingFrontMatter, .. })
        ));
    }

    #[test]
    fn test_write_back_email() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(dir.path(), "phd/jane.md", JANE);
        let mut store = PersonStore::new(dir.path(), &["phd".to_string()]);

        let record = store.scan()[0].record().cloned().unwrap();
        store.write_back_email(&record, "jane.doe@example.org").unwrap();

        let rescanned = store.scan();
        let record = rescanned[0].record().unwrap();
        assert_eq!(record.declared_email.as_deref(), Some("jane.doe@example.org"));
        assert!(fs::read_to_string(&path).unwrap().ends_with("\n\nThesis on signals.\n"));
    }
}
