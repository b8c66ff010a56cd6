//! Identity registry: the authoritative, append-only set of `alias → email`
//! pairs.
//!
//! The registry is loaded once from its journal, then only grows. Every
//! insertion is written through the journal before the in-memory sets see it,
//! so an interrupted pass leaves a store that the next run can pick up as is.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::alias::AliasLookup;
use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub alias: String,
    pub email: String,
}

impl Identity {
    pub fn new(alias: impl Into<String>, email: impl Into<String>) -> Self {
        Identity {
            alias: alias.into(),
            email: email.into(),
        }
    }
}

/// Persistence seam for the registry.
pub trait IdentityJournal {
    /// Every identity persisted so far, in store order. An absent store is
    /// empty, not an error.
    fn load(&mut self) -> Result<Vec<Identity>, SyncError>;

    /// Durably record one new identity.
    fn append(&mut self, identity: &Identity) -> Result<(), SyncError>;
}

/// Journal that keeps everything in memory. Used for dry runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryJournal {
    pub entries: Vec<Identity>,
}

impl IdentityJournal for MemoryJournal {
    fn load(&mut self) -> Result<Vec<Identity>, SyncError> {
        Ok(self.entries.clone())
    }

    fn append(&mut self, identity: &Identity) -> Result<(), SyncError> {
        self.entries.push(identity.clone());
        Ok(())
    }
}

pub struct IdentityRegistry<J: IdentityJournal> {
    journal: J,
    identities: Vec<Identity>,
    aliases: HashSet<String>,
    emails: HashSet<String>,
    /// First alias (store order) declared for each email.
    by_email: HashMap<String, String>,
}

impl<J: IdentityJournal> IdentityRegistry<J> {
    pub fn load(mut journal: J) -> Result<Self, SyncError> {
        let persisted = journal.load()?;

        // Later lines win for a repeated alias, the same way a YAML mapping
        // resolves duplicate keys.
        let mut identities: Vec<Identity> = Vec::with_capacity(persisted.len());
        let mut position: HashMap<String, usize> = HashMap::new();
        for identity in persisted {
            match position.get(&identity.alias) {
                Some(&idx) => {
                    log::warn!(
                        "Alias '{}' declared twice in the identity store, keeping {}",
                        identity.alias,
                        identity.email
                    );
                    identities[idx] = identity;
                }
                None => {
                    position.insert(identity.alias.clone(), identities.len());
                    identities.push(identity);
                }
            }
        }

        let mut registry = IdentityRegistry {
            journal,
            identities: Vec::new(),
            aliases: HashSet::new(),
            emails: HashSet::new(),
            by_email: HashMap::new(),
        };
        for identity in identities {
            registry.remember(identity);
        }

        log::debug!("Loaded {} identities", registry.len());
        Ok(registry)
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.aliases.contains(alias)
    }

    pub fn contains_email(&self, email: &str) -> bool {
        self.emails.contains(email)
    }

    pub fn alias_for_email(&self, email: &str) -> Option<&str> {
        self.by_email.get(email).map(String::as_str)
    }

    /// Append a new identity. The caller guarantees `alias` is fresh
    /// (see [`crate::alias::generate_alias`]).
    pub fn insert(&mut self, alias: &str, email: &str) -> Result<(), SyncError> {
        debug_assert!(!self.contains_alias(alias), "alias {} already registered", alias);

        let identity = Identity::new(alias, email);
        self.journal.append(&identity)?;
        self.remember(identity);
        Ok(())
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    fn remember(&mut self, identity: Identity) {
        self.aliases.insert(identity.alias.clone());
        self.emails.insert(identity.email.clone());
        self.by_email
            .entry(identity.email.clone())
            .or_insert_with(|| identity.alias.clone());
        self.identities.push(identity);
    }
}

impl<J: IdentityJournal> AliasLookup for IdentityRegistry<J> {
    fn is_taken(&self, alias: &str) -> bool {
        self.contains_alias(alias)
    }
}
