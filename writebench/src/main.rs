use std::process::ExitCode;

use yansi::{Condition, Paint};

fn main() -> ExitCode {
    yansi::whenever(Condition::TTY_AND_COLOR);

    match writebench::cli::execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{} {error:?}", "Error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
