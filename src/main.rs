//! Webforge - command-line front-end asset pipeline

use std::process::ExitCode;

use webforge::cli;

fn main() -> ExitCode {
    cli::run()
}
