//! Alias generation: `(firstname, lastname)` → unique `[a-z0-9_]` identifier.
//!
//! The base candidate is `first_last` (or `first` alone), lowercased, with
//! accents folded and everything outside `[a-z0-9_]` removed. Collisions are
//! resolved by appending `2`, `3`, … until a free candidate is found.

use std::collections::HashSet;

use crate::util::fold_diacritics;

/// Anything that knows which aliases are already taken.
pub trait AliasLookup {
    fn is_taken(&self, alias: &str) -> bool;
}

impl AliasLookup for HashSet<String> {
    fn is_taken(&self, alias: &str) -> bool {
        self.contains(alias)
    }
}

/// Normalize a name pair into the base alias candidate (no collision handling).
pub fn alias_base(firstname: &str, lastname: Option<&str>) -> String {
    let joined = match lastname.map(str::trim).filter(|l| !l.is_empty()) {
        Some(last) => format!("{}_{}", firstname.trim(), last),
        None => firstname.trim().to_string(),
    };
    fold_diacritics(&joined)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

/// Generate the first alias for this name that `taken` does not contain.
///
/// The result is only guaranteed free at the moment of the call: the caller
/// must register it before generating the next one.
pub fn generate_alias(firstname: &str, lastname: Option<&str>, taken: &impl AliasLookup) -> String {
    let base = alias_base(firstname, lastname);
    if !taken.is_taken(&base) {
        return base;
    }

    let mut counter: u32 = 2;
    loop {
        let candidate = format!("{}{}", base, counter);
        if !taken.is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
