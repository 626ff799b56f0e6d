use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use rusty_pivot::logging;
use rusty_pivot::spreadsheet::PackageLimits;
use rusty_pivot::spreadsheet::DEFAULT_MAX_PART_SIZE;
use rusty_pivot::RunOptions;
use std::process::ExitCode;

#[derive(Parser)]
#[command(version, about = "Add pivot table sheets to an xlsx workbook from a JSON layout description.")]
struct Args {
    /// Source workbook.
    input: String,

    /// Pivot layouts as inline JSON, e.g. '{"Sheet1":[{"sheet_name":"summary","dimension":["Unit"]}]}'.
    config: String,

    /// Destination workbook; written only when every step succeeded.
    output: String,

    /// Largest workbook part, in bytes, that may be loaded into memory.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_PART_SIZE)]
    max_part_size: u64,

    /// Also print debug diagnostics.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(logging::level(args.verbose, args.quiet));
    log::info!("Execution started at {}", logging::timestamp());

    match run(&args) {
        Ok(()) => {
            log::info!("Execution finished at {}", logging::timestamp());
            ExitCode::SUCCESS
        }
        Err(error) => {
            log::error!("{:#}", error);
            log::info!("Execution aborted at {}", logging::timestamp());
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let options = RunOptions {
        limits: PackageLimits { max_part_size: args.max_part_size },
        ..Default::default()
    };
    let summary = rusty_pivot::run(&args.input, &args.config, &args.output, &options)
        .with_context(|| format!("Failed to build '{}' from '{}'", args.output, args.input))?;
    for (sheet, reason) in summary.skipped() {
        log::info!("Skipped a pivot for '{}': {}", sheet, reason);
    }
    Ok(())
}
