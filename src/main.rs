//! Runs both passes in order: identities first, then the bibliography,
//! which depends on the identities the first pass registered.

use std::process::ExitCode;

use serde::Serialize;

use labroster_lib::annotator::AnnotateReport;
use labroster_lib::config::load_config;
use labroster_lib::error::SyncError;
use labroster_lib::passes::{run_bib_annotation, run_identity_build};
use labroster_lib::resolver::ResolveReport;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReport {
    identities: ResolveReport,
    bibliography: AnnotateReport,
}

fn run() -> Result<RunReport, SyncError> {
    let config = load_config()?;
    let identities = run_identity_build(&config)?;
    let bibliography = run_bib_annotation(&config)?;
    Ok(RunReport {
        identities,
        bibliography,
    })
}

fn main() -> ExitCode {
    labroster_lib::init_logging();

    match run() {
        Ok(report) => {
            labroster_lib::print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            log::error!("{}", e.recovery_suggestion());
            ExitCode::FAILURE
        }
    }
}
