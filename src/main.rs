//! buildinit - Build initialization from the command line

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = buildinit::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
