//! This module implements the CLI interface for cms-ingest: command parsing,
//! wiring of the real collaborators and user-visible output.
//!
//! All pipeline logic lives in the [`cms-ingest-core`] crate. This module only
//! loads configuration, constructs the HTTP/S3/SES clients once per process and
//! hands them to the orchestrator.
//!
//! ## How To Use
//! - From a scheduler: run the installed `cms-ingest run` binary weekly.
//! - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
//!
//! [`cms-ingest-core`]: ../../cms-ingest-core/

use crate::load_config::{base_url_from_env, load_catalog, parse_trigger};
use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use clap::{Parser, Subcommand};
use cms_ingest_core::config::{Settings, ERROR_POLICY};
use cms_ingest_core::fetch::HttpFetcher;
use cms_ingest_core::ingest::Orchestrator;
use cms_ingest_core::notify::SesNotifier;
use cms_ingest_core::publish::S3Publisher;
use cms_ingest_core::result::ErrorPolicy;
use std::path::PathBuf;

/// CLI for cms-ingest: fetch CMS provider datasets into S3 and email a run report.
#[derive(Parser)]
#[clap(
    name = "cms-ingest",
    version,
    about = "Fetch CMS provider datasets, publish them to S3 and email a run report"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch every catalog file, upload it to the bucket and send the report
    Run {
        /// YAML catalog file; the built-in CMS provider catalog is used when omitted
        #[clap(long)]
        catalog: Option<PathBuf>,
        /// Invocation event as JSON, logged at the start of the run
        #[clap(long)]
        event: Option<String>,
        /// Overrides ERROR_POLICY: last-wins or accumulate
        #[clap(long)]
        error_policy: Option<ErrorPolicy>,
    },
    /// Resolve the catalog and print it as YAML without fetching anything
    Catalog {
        /// YAML catalog file; the built-in CMS provider catalog is used when omitted
        #[clap(long)]
        catalog: Option<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Run {
            catalog,
            event,
            error_policy,
        } => {
            let settings = Settings::from_lookup(|key| match (key, error_policy) {
                (ERROR_POLICY, Some(policy)) => Some(policy.to_string()),
                _ => std::env::var(key).ok(),
            })
            .context("Invalid configuration")?;
            let catalog = load_catalog(catalog.as_deref(), &settings.base_url)?;
            let trigger = parse_trigger(event.as_deref())?;
            tracing::info!(command = "run", categories = catalog.len(), "Starting ingestion run");

            let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
            let fetcher = HttpFetcher::default();
            let publisher =
                S3Publisher::new(aws_sdk_s3::Client::new(&sdk_config), settings.bucket.clone());
            let notifier = SesNotifier::new(
                aws_sdk_sesv2::Client::new(&sdk_config),
                settings.ses_configuration_set.clone(),
            );

            let orchestrator =
                Orchestrator::new(&catalog, &settings, &fetcher, &publisher, &notifier);
            match orchestrator.run(&trigger).await {
                Ok(completion) => {
                    tracing::info!(
                        command = "run",
                        failed_categories = completion.body.per_category_errors.len(),
                        "Ingestion run complete"
                    );
                    println!("{}", serde_json::to_string_pretty(&completion)?);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "run", error = %e, "Ingestion run failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
        Commands::Catalog { catalog } => {
            let base_url = base_url_from_env()?;
            let catalog = load_catalog(catalog.as_deref(), &base_url)?;
            print!("{}", serde_yaml::to_string(&catalog.to_file())?);
            Ok(())
        }
    }
}
