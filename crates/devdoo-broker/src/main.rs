//! Command-line entry point for the devdoo broker.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match devdoo_broker::run_broker() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let mut stderr = io::stderr().lock();
            // Nothing else can report a failure to write to stderr.
            drop(writeln!(stderr, "devdoo-broker: {error}"));
            ExitCode::FAILURE
        }
    }
}
