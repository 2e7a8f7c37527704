//! The `framemark validate` subcommand.
//!
//! Checks NDJSON record streams against the schema the runner emits and
//! prints every finding with its line number. All streams are checked even
//! when an early one fails; the exit status aggregates.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use framemark_runtime::{validate_reader, ValidationReport};

use crate::output;

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Record streams to check; `-` reads stdin
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Cap on findings printed per stream
    #[arg(long, default_value_t = 50)]
    pub max_errors: usize,
}

fn validate_one(file: &PathBuf) -> Result<(String, ValidationReport)> {
    if file.as_os_str() == "-" {
        let report =
            validate_reader(io::stdin().lock()).context("failed to read records from stdin")?;
        return Ok(("stdin".to_string(), report));
    }

    let handle =
        File::open(file).with_context(|| format!("failed to open {}", file.display()))?;
    let report = validate_reader(BufReader::new(handle))
        .with_context(|| format!("failed to read {}", file.display()))?;
    Ok((file.display().to_string(), report))
}

pub fn run(args: &ValidateArgs) -> Result<()> {
    let mut total_valid = 0;
    let mut total_findings = 0;

    for file in &args.files {
        let (source, report) = validate_one(file)?;
        output::print_validation_report(&source, &report, args.max_errors);
        total_valid += report.records_valid;
        total_findings += report.findings.len();
    }

    if args.files.len() > 1 {
        output::print_validation_totals(args.files.len(), total_valid, total_findings);
    }

    if total_findings > 0 {
        std::process::exit(1);
    }
    Ok(())
}
