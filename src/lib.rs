//! Roster reconciliation for the lab website.
//!
//! Keeps three hand-edited stores in agreement: the person records under
//! `_people/`, the alias → email registry in `_data/emails.yml`, and the
//! author annotations in `_bibliography/papers.bib`.

pub mod alias;
pub mod annotator;
pub mod bibtex;
pub mod config;
pub mod error;
pub mod identity_store;
pub mod matcher;
pub mod passes;
pub mod people;
pub mod registry;
pub mod resolver;
pub mod util;

use serde::Serialize;

/// Log to stderr at `info` unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();
}

/// Print a pass report as pretty JSON on stdout.
pub fn print_report<T: Serialize>(report: &T) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{}", json),
        Err(e) => log::warn!("Could not serialize report: {}", e),
    }
}
