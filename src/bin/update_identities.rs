//! Identity Build Pass: give every person record an alias and an email.
//!
//! Run from the site root. Reads `labroster.json` if present.

use std::process::ExitCode;

use labroster_lib::config::load_config;
use labroster_lib::passes::run_identity_build;

fn main() -> ExitCode {
    labroster_lib::init_logging();

    let result = load_config().and_then(|config| run_identity_build(&config));
    match result {
        Ok(report) => {
            labroster_lib::print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Identity pass failed: {}", e);
            log::error!("{}", e.recovery_suggestion());
            ExitCode::FAILURE
        }
    }
}
