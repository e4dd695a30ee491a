mod config;
mod http;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;
use tsad_core::admission::AdmissionFilter;
use tsad_core::clock::SystemClock;
use tsad_core::collab::{HttpTsFetcher, IdentityPreprocessor, IdentitySourceDeriver, LoggingAlertSink, SeasonalNaiveCodec, SeasonalNaiveTrainer};
use tsad_detector::{Detector, DetectorContext};

use config::Args;

pub struct AppState {
    detector: Detector,
    ctx: Arc<DetectorContext>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(tracing_subscriber::EnvFilter::from_default_env()))
        .init();

    let args = Args::parse();

    let options = sqlx::postgres::PgConnectOptions::from_str(&args.database_url)
        .context("failed to parse DATABASE_URL")?
        .application_name("tsad-worker");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(60))
        .max_connections(50)
        .connect_with(options)
        .await
        .context("failed to connect to the database")?;

    if args.migrate {
        tsad_migrate::run(&pool).await.context("failed to run database migrations")?;
    }

    let admission = AdmissionFilter::new(&args.white_source_list, &args.black_source_list)
        .context("invalid white/black source list pattern")?;

    let ctx = Arc::new(DetectorContext {
        host: args.host.clone(),
        pool: pool.clone(),
        clock: Arc::new(SystemClock),
        deriver: Arc::new(IdentitySourceDeriver),
        fetcher: Arc::new(HttpTsFetcher::new(args.tsdb_endpoint.clone())),
        preprocessor: Arc::new(IdentityPreprocessor),
        trainer: Arc::new(SeasonalNaiveTrainer),
        alert_sink: Arc::new(LoggingAlertSink),
        admission: Arc::new(admission),
        codecs: vec![Arc::new(SeasonalNaiveCodec)],
        fetch_semaphore: Arc::new(tokio::sync::Semaphore::new(5)),
    });

    let state = Arc::new(AppState { detector: Detector::new(ctx.clone()), ctx });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let heartbeat = tokio::spawn(heartbeat_loop(state.clone(), pool.clone(), args.heartbeat_interval(), shutdown_rx.clone()));

    let app = axum::Router::new()
        .nest("/detector", http::router(state.clone()))
        .layer(tower_http::trace::TraceLayer::new_for_http());
    let bind = format!("0.0.0.0:{}", args.worker_port);
    let listener = TcpListener::bind(&bind).await.with_context(|| format!("bind worker to {bind}"))?;
    tracing::info!(addr = %bind, "worker listening");

    let mut server_shutdown = shutdown_rx.clone();
    let server = axum::serve(listener, app.into_make_service()).with_graceful_shutdown(async move {
        while !*server_shutdown.borrow() {
            if server_shutdown.changed().await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        res = server => res.context("worker serve")?,
        _ = wait_for_signal() => {
            tracing::info!("worker shutting down");
            let _ = shutdown_tx.send(true);
        }
    }

    let _ = heartbeat.await;
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Publishes this worker's heartbeat row every `interval` and prunes
/// fully-cancelled tasks from the in-memory map so it doesn't grow without
/// bound (§4.5, §4.6).
async fn heartbeat_loop(state: Arc<AppState>, pool: sqlx::PgPool, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow() {
            return;
        }

        state.detector.prune_cancelled();
        let num_tasks = state.detector.num_active_tasks();
        if let Err(error) = tsad_store::WorkerRegistry::heartbeat(&pool, &state.ctx.host, num_tasks, state.ctx.now()).await {
            tracing::warn!(%error, "worker heartbeat failed");
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_rx.changed() => {}
        }
    }
}
