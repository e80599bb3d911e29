//! Entry point for the `srd` command-line interface.
#![forbid(unsafe_code)]

use srd_cli::CliError;

fn main() {
    match srd_cli::run() {
        Ok(()) => {}
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("srd: {err}");
            std::process::exit(1);
        }
    }
}
