//! Bibliographic annotation: record matched aliases on catalog entries.
//!
//! Aliases are only ever appended. An alias already on the entry, or already
//! collected earlier for the same entry, is not added again, so re-running
//! over the same catalog changes nothing.

use chrono::Utc;
use serde::Serialize;

use crate::bibtex::{BibEntry, Catalog};
use crate::matcher::{match_author, KnownAuthor, MatchMethod};

/// What to do when several known people tie for one author string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguityPolicy {
    /// Take the first candidate in known-author order.
    #[default]
    FirstCandidate,
    /// Leave the author unannotated; the tie is only reported.
    Skip,
}

/// An author string that matched more than one known person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbiguousMatch {
    pub entry_key: String,
    pub author: String,
    pub method: MatchMethod,
    pub candidates: Vec<String>,
    /// Alias that was recorded, if any.
    pub applied: Option<String>,
}

/// Result of annotating a single entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOutcome {
    pub added: Vec<String>,
    pub matched_authors: usize,
    pub ambiguous: Vec<AmbiguousMatch>,
}

/// Summary of one Bibliographic Annotation Pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateReport {
    pub entries: usize,
    /// Entries without an author field.
    pub without_authors: usize,
    pub authors_seen: usize,
    pub authors_matched: usize,
    pub updated_entries: Vec<String>,
    pub aliases_added: usize,
    pub ambiguous: Vec<AmbiguousMatch>,
    /// Byte offset where the catalog stopped parsing; entries after it were
    /// not examined.
    pub unparsed_tail: Option<usize>,
    pub completed_at: String,
}

/// Match every author of `entry` and append the new aliases to `field`.
///
/// The entry is only touched when at least one alias is added.
pub fn annotate_entry(
    entry: &mut BibEntry,
    field: &str,
    known: &[KnownAuthor],
    policy: AmbiguityPolicy,
) -> EntryOutcome {
    let mut outcome = EntryOutcome::default();
    let existing = entry.annotations(field);

    for author in entry.authors() {
        let result = match_author(&author, known);
        let Some(alias) = result.alias() else {
            continue;
        };
        outcome.matched_authors += 1;

        let chosen = if result.is_ambiguous() {
            let applied = match policy {
                AmbiguityPolicy::FirstCandidate => Some(alias.to_string()),
                AmbiguityPolicy::Skip => None,
            };
            log::warn!(
                "Ambiguous author '{}' in {}: {} (using {})",
                author,
                entry.key,
                result.candidates.join(", "),
                applied.as_deref().unwrap_or("none")
            );
            outcome.ambiguous.push(AmbiguousMatch {
                entry_key: entry.key.clone(),
                author: author.clone(),
                method: result.method.unwrap_or(MatchMethod::Initial),
                candidates: result.candidates.clone(),
                applied: applied.clone(),
            });
            applied
        } else {
            Some(alias.to_string())
        };

        if let Some(alias) = chosen {
            if !existing.contains(&alias) && !outcome.added.contains(&alias) {
                log::debug!("Matched {} -> {}", author, alias);
                outcome.added.push(alias);
            }
        }
    }

    if !outcome.added.is_empty() {
        let mut aliases = existing;
        aliases.extend(outcome.added.iter().cloned());
        entry.set_annotations(field, &aliases);
    }

    outcome
}

/// Annotate every entry of the catalog in memory. Persisting is up to the
/// caller, in a single write.
pub fn annotate_catalog(
    catalog: &mut Catalog,
    field: &str,
    known: &[KnownAuthor],
    policy: AmbiguityPolicy,
) -> AnnotateReport {
    let mut report = AnnotateReport::default();

    for entry in catalog.entries_mut() {
        report.entries += 1;
        let authors = entry.authors().len();
        if authors == 0 {
            report.without_authors += 1;
            continue;
        }
        report.authors_seen += authors;

        let outcome = annotate_entry(entry, field, known, policy);
        report.authors_matched += outcome.matched_authors;
        report.ambiguous.extend(outcome.ambiguous);
        if !outcome.added.is_empty() {
            report.aliases_added += outcome.added.len();
            report.updated_entries.push(entry.key.clone());
        }
    }

    report.unparsed_tail = catalog.unparsed_tail();
    if let Some(offset) = report.unparsed_tail {
        log::warn!(
            "Catalog not parsed past byte {}; later entries were not annotated",
            offset
        );
    }

    report.completed_at = Utc::now().to_rfc3339();
    log::info!(
        "Updated {} entries ({} aliases added, {} of {} authors matched, {} ambiguous)",
        report.updated_entries.len(),
        report.aliases_added,
        report.authors_matched,
        report.authors_seen,
        report.ambiguous.len()
    );
    report
}
