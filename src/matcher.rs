//! Author-name matching: map one raw BibTeX author string to a known alias.
//!
//! Author strings come in two conventional shapes, `"Last, First"` and
//! `"First [Middle...] Last"`. The last name must match exactly (case
//! insensitive). Each candidate, in known-author order, is then tried
//! against an ordered cascade on the first name:
//!
//! 1. Exact: full first name equal, case insensitive.
//! 2. Initial: the query is an initial (`"S"`, `"S."`, `"S. K."`) and it
//!    equals the first letter of the known first name.
//!
//! The first candidate accepted by either rule decides. Later candidates
//! accepted by the same rule are returned with it so ambiguous matches can be
//! surfaced instead of silently guessed.

use serde::Serialize;

use crate::people::PersonDocument;
use crate::registry::{IdentityJournal, IdentityRegistry};

/// A person the matcher can resolve to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownAuthor {
    pub firstname: String,
    pub lastname: String,
    pub alias: String,
}

impl KnownAuthor {
    pub fn new(firstname: &str, lastname: &str, alias: &str) -> Self {
        KnownAuthor {
            firstname: firstname.to_string(),
            lastname: lastname.to_string(),
            alias: alias.to_string(),
        }
    }
}

/// A parsed author string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorName {
    pub first: String,
    pub last: String,
}

/// Which rule of the cascade produced the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Initial,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchOutcome {
    pub method: Option<MatchMethod>,
    /// The winning alias first, then later aliases tied at `method`.
    pub candidates: Vec<String>,
}

impl MatchOutcome {
    fn none() -> Self {
        MatchOutcome::default()
    }

    fn found(method: MatchMethod, candidates: Vec<String>) -> Self {
        if candidates.is_empty() {
            return MatchOutcome::none();
        }
        MatchOutcome {
            method: Some(method),
            candidates,
        }
    }

    /// The alias to use: the first tied candidate.
    pub fn alias(&self) -> Option<&str> {
        self.candidates.first().map(String::as_str)
    }

    pub fn is_match(&self) -> bool {
        !self.candidates.is_empty()
    }

    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }
}

/// Split an author string into first and last name.
///
/// Exactly one comma means `"Last, First"`; anything else is treated as
/// `"First [Middle...] Last"` split on single spaces, so multi-word surnames
/// are not recognized in that form.
pub fn parse_author(raw: &str) -> AuthorName {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() == 2 {
        return AuthorName {
            last: parts[0].trim().to_string(),
            first: parts[1].trim().to_string(),
        };
    }

    let mut tokens: Vec<&str> = raw.split(' ').collect();
    let last = tokens.pop().unwrap_or("");
    AuthorName {
        last: last.trim().to_string(),
        first: tokens.join(" ").trim().to_string(),
    }
}

/// Dots become spaces, then trim and lowercase: `"S. K."` → `"s  k"`.
fn normalize_first(name: &str) -> String {
    name.replace('.', " ").trim().to_lowercase()
}

/// True for `"s"` or anything whose second character is a space (`"s k"`).
fn looks_like_initial(normalized: &str) -> bool {
    let mut chars = normalized.chars();
    chars.next().is_some() && matches!(chars.next(), None | Some(' '))
}

/// Which rule, if any, accepts `candidate` for the parsed query.
fn rule_for(
    query_first: &str,
    query_initial: Option<char>,
    candidate: &KnownAuthor,
) -> Option<MatchMethod> {
    if candidate.firstname.to_lowercase() == query_first {
        return Some(MatchMethod::Exact);
    }
    let letter = query_initial?;
    let candidate_initial = normalize_first(&candidate.firstname).chars().next();
    (candidate_initial == Some(letter)).then_some(MatchMethod::Initial)
}

/// Candidates sharing the last name are tried in list order, exact rule
/// before initial rule for each one. The first candidate accepted by either
/// rule wins. Later candidates accepted by the same rule are reported as ties.
pub fn match_author(raw: &str, known: &[KnownAuthor]) -> MatchOutcome {
    let query = parse_author(raw);
    let last = query.last.to_lowercase();
    let first = query.first.to_lowercase();
    let initial = normalize_first(&query.first);
    let letter = if looks_like_initial(&initial) {
        initial.chars().next()
    } else {
        None
    };

    let candidates: Vec<&KnownAuthor> = known
        .iter()
        .filter(|k| k.lastname.to_lowercase() == last)
        .collect();

    let Some(method) = candidates.iter().find_map(|k| rule_for(&first, letter, k)) else {
        return MatchOutcome::none();
    };

    let tied: Vec<String> = candidates
        .iter()
        .filter(|k| rule_for(&first, letter, k) == Some(method))
        .map(|k| k.alias.clone())
        .collect();

    MatchOutcome::found(method, tied)
}

/// Known authors: every person record with a first name and a declared email
/// that the registry knows an alias for.
pub fn known_authors<J: IdentityJournal>(
    documents: &[PersonDocument],
    registry: &IdentityRegistry<J>,
) -> Vec<KnownAuthor> {
    documents
        .iter()
        .filter_map(PersonDocument::record)
        .filter(|r| !r.firstname.is_empty())
        .filter_map(|r| {
            let email = r.declared_email.as_deref()?;
            let alias = registry.alias_for_email(email)?;
            Some(KnownAuthor::new(
                &r.firstname,
                r.lastname.as_deref().unwrap_or(""),
                alias,
            ))
        })
        .collect()
}
