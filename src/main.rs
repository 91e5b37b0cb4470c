// src/main.rs

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use eessi_ingest::{Config, CvmfsServer, IngestOptions, Pipeline, Provenance, Publisher};
use std::process::ExitCode;
use tracing::debug;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are the only successful "errors"
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(cli.config.as_deref())
        .context("failed to load the configuration")?;
    debug!("Configuration: {:?}", config);

    let mut options = IngestOptions::from_config(&config);
    options.validation.check_filename_content_type |= cli.check_filename_type;
    options.expected_sha256 = cli.sha256.clone();

    let provenance = Provenance::new(cli.source_repo, cli.branch, cli.change_id, cli.submitter);
    let pipeline = Pipeline::new(config.taxonomy(), options);

    if cli.dry_run {
        let inspection = pipeline.inspect(&cli.archive, provenance)?;
        println!("{}", inspection.request.archive.descriptor);
        println!();
        print!("{}", inspection.overview);
        println!(
            "Dry run: {} would be ingested into {}",
            inspection.request.file_name(),
            config.repository.base_path().display()
        );
        return Ok(());
    }

    let service = CvmfsServer::locate(&config.service.cvmfs_server)?;
    let mut publisher = Publisher::from_config(service, &config);
    let outcome = pipeline.run(&mut publisher, &cli.archive, provenance)?;

    for warning in &outcome.dispatch.report.warnings {
        eprintln!("WARNING: {}", warning);
    }
    if let Some(tag) = &outcome.dispatch.report.audit_tag {
        println!("Audit tag: {}", tag);
    }
    println!(
        "SUCCESS: {} has been published to {} ({})",
        outcome.inspection.request.file_name(),
        config.repository.name,
        outcome.dispatch.workflow
    );
    Ok(())
}
