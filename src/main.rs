//! superpix - command-line tool for pixel-art-preserving downscaling

use std::process::ExitCode;

use superpix::cli;

fn main() -> ExitCode {
    cli::run()
}
