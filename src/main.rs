//! serverprobe entry point

use std::process::ExitCode;

use clap::Parser;
use serverprobe::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.init_logging();

    println!("Running Integration Tests...");
    let report = serverprobe::run(&cli.into_config());
    println!("{report}");
    ExitCode::from(report.exit_code())
}
