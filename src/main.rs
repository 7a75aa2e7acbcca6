//! AA Wire Ingest — Binary Entrypoint
//! Boots the Axum HTTP server: ingest trigger, status/test actions, health
//! and Prometheus metrics, plus the optional background ingest scheduler.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aa_wire_ingest::api::{self, AppState};
use aa_wire_ingest::ingest::scheduler::{self, IngestSchedulerCfg};
use aa_wire_ingest::metrics::Metrics;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("aa_wire_ingest=info,ingest=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    // Install the Prometheus recorder before the first pipeline run.
    let metrics = Metrics::init();

    let state = AppState::from_env();

    // Optional periodic re-ingest; manual HTTP triggers work either way.
    match (scheduler::interval_from_env(), state.wire.clone()) {
        (Some(interval), Some(wire)) => {
            let cfg = IngestSchedulerCfg {
                interval,
                request_delay: state.request_delay,
            };
            scheduler::spawn_ingest_scheduler(
                wire,
                state.store.clone(),
                state.defaults.clone(),
                cfg,
            );
            tracing::info!(interval_secs = interval.as_secs(), "ingest scheduler enabled");
        }
        (Some(_), None) => {
            tracing::warn!("ingest scheduler requested but wire is not configured; disabled");
        }
        (None, _) => {}
    }

    let app = api::router(state).merge(metrics.router());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(8080);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
