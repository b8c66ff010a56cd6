//! Email resolution for person records (Identity Build Pass).
//!
//! For every record, in scan order:
//! - declared email already registered → nothing to do
//! - declared email not registered → new alias, registered with that email
//! - no declared email → placeholder `first.last@domain`, registered under a
//!   new alias and written back into the record so the next run takes the
//!   first branch
//!
//! Per-record problems are skipped and reported. Only a registry write
//! failure stops the pass.

use chrono::Utc;
use serde::Serialize;

use crate::alias::{alias_base, generate_alias};
use crate::error::{SkipReason, SyncError};
use crate::people::{PersonDocument, PersonRecord, SkippedRecord};
use crate::registry::{Identity, IdentityJournal, IdentityRegistry};

/// Where synthesized emails are written back to.
pub trait PersonSink {
    fn write_back_email(&mut self, record: &PersonRecord, email: &str) -> Result<(), SyncError>;
}

/// Summary of one Identity Build Pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveReport {
    pub processed: usize,
    /// Declared emails that were already registered.
    pub already_registered: usize,
    pub declared_added: Vec<Identity>,
    pub placeholder_added: Vec<Identity>,
    /// Placeholder emails already registered for someone else with the same
    /// name. The record gets no identity of its own.
    pub placeholder_collisions: Vec<Identity>,
    pub skipped: Vec<SkippedRecord>,
    pub completed_at: String,
}

impl ResolveReport {
    pub fn added(&self) -> usize {
        self.declared_added.len() + self.placeholder_added.len()
    }
}

/// Build the placeholder email for a person with no declared address.
///
/// An absent last name leaves a trailing dot (`jane.@domain`), as the site
/// has always done.
pub fn placeholder_email(firstname: &str, lastname: Option<&str>, domain: &str) -> String {
    format!(
        "{}.{}@{}",
        firstname.to_lowercase(),
        lastname.unwrap_or("").to_lowercase(),
        domain
    )
}

/// Run the Identity Build Pass over already scanned documents.
///
/// Records whose placeholder email was written back are updated in place.
pub fn resolve_identities<J: IdentityJournal>(
    documents: &mut [PersonDocument],
    registry: &mut IdentityRegistry<J>,
    placeholder_domain: &str,
    sink: &mut impl PersonSink,
) -> Result<ResolveReport, SyncError> {
    let mut report = ResolveReport::default();

    for document in documents.iter_mut() {
        report.processed += 1;
        let record = match document {
            PersonDocument::Record(record) => record,
            PersonDocument::Unusable(skipped) => {
                log::warn!("Skipping {}: {}", skipped.path.display(), skipped.reason);
                report.skipped.push(skipped.clone());
                continue;
            }
        };

        if let Some(reason) = precheck(record) {
            log::warn!("Skipping {}: {}", record.display_name(), reason);
            report.skipped.push(SkippedRecord {
                path: record.path.clone(),
                reason,
            });
            continue;
        }

        match record.declared_email.clone() {
            Some(email) => {
                if registry.contains_email(&email) {
                    report.already_registered += 1;
                    continue;
                }
                let alias = register(registry, record, &email)?;
                log::info!("Adding existing email: {} -> {}", alias, email);
                report.declared_added.push(Identity::new(alias, email));
            }
            None => {
                let email = placeholder_email(
                    &record.firstname,
                    record.lastname.as_deref(),
                    placeholder_domain,
                );
                if registry.contains_email(&email) {
                    let owner = registry.alias_for_email(&email).unwrap_or_default().to_string();
                    log::warn!(
                        "Placeholder {} for {} already belongs to {}, no identity created",
                        email,
                        record.display_name(),
                        owner
                    );
                    report.placeholder_collisions.push(Identity::new(owner, email));
                    continue;
                }

                let alias = register(registry, record, &email)?;
                log::info!("Adding placeholder email: {} -> {}", alias, email);
                report.placeholder_added.push(Identity::new(alias, email.clone()));

                match sink.write_back_email(record, &email) {
                    Ok(()) => record.declared_email = Some(email),
                    Err(e) => {
                        log::warn!("Could not update {}: {}", record.display_name(), e);
                        report.skipped.push(SkippedRecord {
                            path: record.path.clone(),
                            reason: SkipReason::WriteBackFailed(e.to_string()),
                        });
                    }
                }
            }
        }
    }

    report.completed_at = Utc::now().to_rfc3339();
    log::info!(
        "Identity pass: {} records, {} added ({} declared, {} placeholder), {} already registered, {} collisions, {} skipped",
        report.processed,
        report.added(),
        report.declared_added.len(),
        report.placeholder_added.len(),
        report.already_registered,
        report.placeholder_collisions.len(),
        report.skipped.len()
    );
    Ok(report)
}

fn precheck(record: &PersonRecord) -> Option<SkipReason> {
    if record.firstname.is_empty() {
        return Some(SkipReason::MissingFirstname);
    }
    let base = alias_base(&record.firstname, record.lastname.as_deref());
    if base.is_empty() {
        return Some(SkipReason::EmptyAlias);
    }
    None
}

/// Generate a fresh alias and register it in one step, so no other
/// generation can observe the gap.
fn register<J: IdentityJournal>(
    registry: &mut IdentityRegistry<J>,
    record: &PersonRecord,
    email: &str,
) -> Result<String, SyncError> {
    let alias = generate_alias(&record.firstname, record.lastname.as_deref(), &*registry);
    registry.insert(&alias, email)?;
    Ok(alias)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryJournal;

    #[derive(Default)]
    struct RecordingSink {
        written: Vec<(String, String)>,
        fail: bool,
    }

    impl PersonSink for RecordingSink {
        fn write_back_email(&mut self, record: &PersonRecord, email: &str) -> Result<(), SyncError> {
            if self.fail {
                return Err(SyncError::Io("read-only".into()));
            }
            self.written.push((record.firstname.clone(), email.to_string()));
            Ok(())
        }
    }

    fn doc(first: &str, last: Option<&str>, email: Option<&str>) -> PersonDocument {
        PersonDocument::Record(PersonRecord::new(first, last, email))
    }

    fn empty_registry() -> IdentityRegistry<MemoryJournal> {
        IdentityRegistry::load(MemoryJournal::default()).unwrap()
    }

    #[test]
    fn test_placeholder_email() {
        assert_eq!(
            placeholder_email("Jane", Some("Doe"), "example.org"),
            "jane.doe@example.org"
        );
        assert_eq!(placeholder_email("Jane", None, "example.org"), "jane.@example.org");
    }

    #[test]
    fn test_placeholder_synthesis_and_write_back() {
        let mut docs = vec![doc("Jane", Some("Doe"), None)];
        let mut registry = empty_registry();
        let mut sink = RecordingSink::default();

        let report = resolve_identities(&mut docs, &mut registry, "example.org", &mut sink).unwrap();

        assert_eq!(
            report.placeholder_added,
            vec![Identity::new("jane_doe", "jane.doe@example.org")]
        );
        assert_eq!(
            sink.written,
            vec![("Jane".to_string(), "jane.doe@example.org".to_string())]
        );
        assert_eq!(
            docs[0].record().unwrap().declared_email.as_deref(),
            Some("jane.doe@example.org")
        );
    }

    #[test]
    fn test_declared_email_registered() {
        let mut docs = vec![doc("Jane", Some("Doe"), Some("jane@uni.edu"))];
        let mut registry = empty_registry();
        let mut sink = RecordingSink::default();

        let report = resolve_identities(&mut docs, &mut registry, "example.org", &mut sink).unwrap();

        assert_eq!(report.declared_added, vec![Identity::new("jane_doe", "jane@uni.edu")]);
        assert!(sink.written.is_empty());
        assert!(registry.contains_alias("jane_doe"));
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let mut docs = vec![
            doc("Jane", Some("Doe"), Some("jane@uni.edu")),
            doc("Ravi", Some("Kumar"), None),
        ];
        let mut registry = empty_registry();
        let mut sink = RecordingSink::default();
        resolve_identities(&mut docs, &mut registry, "example.org", &mut sink).unwrap();
        let after_first = registry.journal().entries.clone();

        let report = resolve_identities(&mut docs, &mut registry, "example.org", &mut sink).unwrap();

        assert_eq!(report.added(), 0);
        assert_eq!(report.already_registered, 2);
        assert_eq!(registry.journal().entries, after_first);
        assert_eq!(sink.written.len(), 1);
    }

    #[test]
    fn test_alias_collision_gets_suffix() {
        let mut docs = vec![
            doc("Jane", Some("Doe"), Some("jane@uni.edu")),
            doc("Jane", Some("Doe"), Some("jdoe@corp.com")),
        ];
        let mut registry = empty_registry();
        let report =
            resolve_identities(&mut docs, &mut registry, "example.org", &mut RecordingSink::default())
                .unwrap();

        let aliases: Vec<&str> = report.declared_added.iter().map(|i| i.alias.as_str()).collect();
        assert_eq!(aliases, vec!["jane_doe", "jane_doe2"]);
    }

    #[test]
    fn test_placeholder_collision_is_reported() {
        let mut docs = vec![doc("Jane", Some("Doe"), None), doc("Jane", Some("Doe"), None)];
        let mut registry = empty_registry();
        let mut sink = RecordingSink::default();

        let report = resolve_identities(&mut docs, &mut registry, "example.org", &mut sink).unwrap();

        assert_eq!(report.placeholder_added.len(), 1);
        assert_eq!(
            report.placeholder_collisions,
            vec![Identity::new("jane_doe", "jane.doe@example.org")]
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(sink.written.len(), 1);
    }

    #[test]
    fn test_skips_are_reported_and_pass_completes() {
        let mut docs = vec![
            doc("", Some("Doe"), Some("x@y.z")),
            PersonDocument::Unusable(SkippedRecord {
                path: "broken.md".into(),
                reason: SkipReason::MissingFrontMatter,
            }),
            doc("李", None, None),
            doc("Ann", None, Some("ann@x.org")),
        ];
        let mut registry = empty_registry();

        let report =
            resolve_identities(&mut docs, &mut registry, "example.org", &mut RecordingSink::default())
                .unwrap();

        assert_eq!(report.processed, 4);
        let reasons: Vec<SkipReason> = report.skipped.iter().map(|s| s.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::MissingFirstname,
                SkipReason::MissingFrontMatter,
                SkipReason::EmptyAlias
            ]
        );
        assert_eq!(report.declared_added, vec![Identity::new("ann", "ann@x.org")]);
    }

    #[test]
    fn test_underscore_only_alias_is_registered() {
        let mut docs = vec![
            doc("李", Some("王"), Some("li@uni.edu")),
            doc("张", Some("伟"), Some("zhang@uni.edu")),
        ];
        let mut registry = empty_registry();

        let report =
            resolve_identities(&mut docs, &mut registry, "example.org", &mut RecordingSink::default())
                .unwrap();

        assert!(report.skipped.is_empty());
        assert_eq!(
            report.declared_added,
            vec![
                Identity::new("_", "li@uni.edu"),
                Identity::new("_2", "zhang@uni.edu")
            ]
        );
        assert!(registry.contains_alias("_"));
    }

    #[test]
    fn test_failed_write_back_keeps_identity() {
        let mut docs = vec![doc("Jane", Some("Doe"), None)];
        let mut registry = empty_registry();
        let mut sink = RecordingSink {
            fail: true,
            ..Default::default()
        };

        let report = resolve_identities(&mut docs, &mut registry, "example.org", &mut sink).unwrap();

        assert!(registry.contains_email("jane.doe@example.org"));
        assert_eq!(report.placeholder_added.len(), 1);
        assert!(matches!(report.skipped[0].reason, SkipReason::WriteBackFailed(_)));
        assert_eq!(docs[0].record().unwrap().declared_email, None);
    }

    #[test]
    fn test_aliases_unique_across_run() {
        let mut docs: Vec<PersonDocument> = (0..4)
            .map(|i| doc("Jane", Some("Doe"), Some(&format!("jane{}@x.org", i))))
            .chain([doc("Jane", Some("Doe"), None), doc("José", Some("Doe"), None)])
            .collect();
        let mut registry = empty_registry();
        resolve_identities(&mut docs, &mut registry, "example.org", &mut RecordingSink::default())
            .unwrap();

        let mut aliases: Vec<&str> = registry.identities().iter().map(|i| i.alias.as_str()).collect();
        let total = aliases.len();
        aliases.sort();
        aliases.dedup();
        assert_eq!(aliases.len(), total);
        assert_eq!(total, 6);
    }
}
