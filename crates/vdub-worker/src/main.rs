//! Standalone dubbing run: `vdub-worker <video>`.

use anyhow::Context;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vdub_models::StatusEvent;
use vdub_worker::{Orchestrator, StatusBroadcaster, WorkerConfig};

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?
        .add_directive("vdub=info".parse()?)
        .add_directive("hyper=warn".parse()?);

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
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    let Some(video) = std::env::args().nth(1) else {
        eprintln!("Usage: vdub-worker <video>");
        std::process::exit(2);
    };

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let broadcaster = StatusBroadcaster::new();
    let orchestrator =
        Orchestrator::from_config(config, broadcaster.clone()).context("failed to build orchestrator")?;

    let mut subscription = broadcaster.subscribe();
    tokio::spawn(async move {
        loop {
            match subscription.events.recv().await {
                Ok(StatusEvent::Status(s)) => {
                    info!("[{}] {:.1}% {}", s.phase, s.progress, s.message)
                }
                Ok(StatusEvent::Result(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Status log skipped {} update(s)", n)
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let running = orchestrator.start(&video).context("failed to start workflow")?;

    let cancel_handle = running.handle.clone();
    let cancel_orchestrator = orchestrator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, cancelling workflow");
            cancel_orchestrator.cancel(&cancel_handle);
        }
    });

    let result = running.wait().await;
    if result.success {
        let show = |p: &Option<std::path::PathBuf>| {
            p.as_ref().map(|p| p.display().to_string()).unwrap_or_default()
        };
        println!("Final video: {}", show(&result.final_video));
        println!("Dubbed audio: {}", show(&result.dubbed_audio));
        println!("Merged dubbed video: {}", show(&result.merged_dubbed_video));
        Ok(())
    } else {
        let message = result.error.unwrap_or_else(|| "unknown error".to_string());
        error!("Workflow failed: {}", message);
        anyhow::bail!(message)
    }
}
