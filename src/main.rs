//! Swagger From Source - command-line tool generating Swagger 2.0 / OpenAPI 3.0 documents.
//!
//! # Usage
//!
//! ```bash
//! swagger-from-source [-c CONFIG] [-v]
//! ```
//!
//! The configuration file (default `swagger.json`) holds a `swagger` section naming the entry
//! files, output directories and document options.

use anyhow::Result;
use clap::Parser;
use log::info;
use swagger_from_source::cli;

fn main() -> Result<()> {
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("Swagger generator starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    Ok(())
}
