//! Bibliographic Annotation Pass: tag papers with the aliases of their
//! authors, using the identities built by `update_identities`.
//!
//! Run from the site root. Reads `labroster.json` if present.

use std::process::ExitCode;

use labroster_lib::config::load_config;
use labroster_lib::passes::run_bib_annotation;

fn main() -> ExitCode {
    labroster_lib::init_logging();

    let result = load_config().and_then(|config| run_bib_annotation(&config));
    match result {
        Ok(report) => {
            labroster_lib::print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Annotation pass failed: {}", e);
            log::error!("{}", e.recovery_suggestion());
            ExitCode::FAILURE
        }
    }
}
