//! Workflow runner binary.
//!
//! Runs one transformation end to end:
//!
//! ```text
//! imgx-orchestrator upscale https://example.com/photo.png
//! imgx-orchestrator generate "a red fox in the snow"
//! ```
//!
//! The requesting user comes from `IMGX_USER_ID`; provider, storage, and
//! database endpoints come from their component environment variables.

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use imgx_ledger::{CreditLedger, SupabaseClient, UsageRecorder};
use imgx_models::{ServiceKind, TransformRequest};
use imgx_orchestrator::Orchestrator;
use imgx_provider::{JobPoller, PollerConfig, ProviderClient};
use imgx_storage::{ArtifactStore, StorageClient};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("imgx=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }

    let request = match request_from_args() {
        Ok(request) => request,
        Err(e) => {
            error!("{e:#}");
            std::process::exit(2);
        }
    };

    let orchestrator = match build().await {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!("Failed to initialize: {e:#}");
            std::process::exit(1);
        }
    };

    // Ctrl-C abandons polling; the provider-side job is left to finish or
    // expire on its own.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal, canceling");
        let _ = cancel_tx.send(true);
    });

    let result = orchestrator
        .run(request, cancel_rx, |event| {
            info!(status = %event.status, "Job progress");
        })
        .await;

    match result {
        Ok(outcome) => {
            for warning in &outcome.warnings {
                warn!("Degraded: {warning}");
            }
            match &outcome.output_url {
                Some(url) => info!(url = %url, "Transformation complete"),
                None => info!("Transformation complete with no output"),
            }
        }
        Err(e) => {
            error!("Workflow failed: {e}");
            std::process::exit(1);
        }
    }
}

/// Assemble the orchestrator from environment configuration.
async fn build() -> anyhow::Result<Orchestrator> {
    let provider = ProviderClient::from_env().context("provider client")?;
    let poller = JobPoller::new(provider.clone(), PollerConfig::from_env());

    let storage = StorageClient::from_env().await.context("storage client")?;
    let artifacts = ArtifactStore::new(storage).context("artifact store")?;

    let db = SupabaseClient::from_env().context("database client")?;
    let ledger = CreditLedger::new(db.clone());
    let usage = UsageRecorder::new(db);

    Ok(Orchestrator::new(provider, poller, artifacts, ledger, usage))
}

/// Build a request from `<service> <image-url | prompt>`.
fn request_from_args() -> anyhow::Result<TransformRequest> {
    let mut args = std::env::args().skip(1);

    let service = args
        .next()
        .and_then(|s| ServiceKind::from_str(&s))
        .context("usage: imgx-orchestrator <upscale|colorize|generate> <image-url|prompt>")?;
    let subject = args.next().context("missing image URL or prompt")?;
    let user_id = std::env::var("IMGX_USER_ID").context("IMGX_USER_ID not set")?;

    let request = match service {
        ServiceKind::Generate => TransformRequest::new(user_id, service).with_prompt(subject),
        _ => TransformRequest::new(user_id, service).with_source_image(subject),
    };

    Ok(request)
}
