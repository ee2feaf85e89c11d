use std::process::ExitCode;

use clap::Parser;
use llb_cli::Args;
use llb_tracing::TracingBuilder;

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = TracingBuilder::default()
        .level(args.log_level)
        .format(args.log_format.into())
        .build()
    {
        eprintln!("unable to set up logging: {}", e);
        return ExitCode::FAILURE;
    }

    match llb_cli::run(&args) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
