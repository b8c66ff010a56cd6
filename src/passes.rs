//! The two batch passes, wired from configuration to stores.
//!
//! 1. Identity Build Pass: person records → emails file
//! 2. Bibliographic Annotation Pass: emails file + person records → papers.bib
//!
//! Each pass is one-shot: load everything, compute, write, return a report.

use crate::annotator::{annotate_catalog, AmbiguityPolicy, AnnotateReport};
use crate::bibtex::Catalog;
use crate::config::RosterConfig;
use crate::error::SyncError;
use crate::identity_store::IdentityFile;
use crate::matcher::known_authors;
use crate::people::PersonStore;
use crate::registry::IdentityRegistry;
use crate::resolver::{resolve_identities, ResolveReport};

/// Assign an alias and an email to everyone in the configured categories.
pub fn run_identity_build(config: &RosterConfig) -> Result<ResolveReport, SyncError> {
    let mut store = IdentityFile::new(&config.emails_file);
    store.ensure_header()?;
    let mut registry = IdentityRegistry::load(store)?;
    log::info!(
        "Loaded {} identities from {}",
        registry.len(),
        config.emails_file.display()
    );

    let mut people = PersonStore::new(&config.people_dir, &config.categories);
    let mut documents = people.scan();

    resolve_identities(
        &mut documents,
        &mut registry,
        &config.placeholder_domain,
        &mut people,
    )
}

/// Annotate catalog entries with the aliases of the people who wrote them.
pub fn run_bib_annotation(config: &RosterConfig) -> Result<AnnotateReport, SyncError> {
    let registry = IdentityRegistry::load(IdentityFile::new(&config.emails_file))?;
    let documents = PersonStore::new(&config.people_dir, &config.categories).scan();
    let known = known_authors(&documents, &registry);
    log::info!("Loaded {} alumni records.", known.len());

    let mut catalog = Catalog::load(&config.bib_file)?;
    let policy = if config.skip_ambiguous {
        AmbiguityPolicy::Skip
    } else {
        AmbiguityPolicy::FirstCandidate
    };
    let report = annotate_catalog(&mut catalog, &config.annotation_field, &known, policy);

    if catalog.is_modified() {
        catalog.save(&config.bib_file)?;
    } else {
        log::debug!("{} unchanged, not rewritten", config.bib_file.display());
    }
    Ok(report)
}
