mod config;
mod control_plane;
mod detail;
mod dispatcher;
mod http;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use config::Args;
use control_plane::ControlPlane;
use dispatcher::Dispatcher;

pub struct AppState {
    pool: PgPool,
    control_plane: ControlPlane,
    worker_port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(tracing_subscriber::EnvFilter::from_default_env()))
        .init();

    let args = Args::parse();

    let options = sqlx::postgres::PgConnectOptions::from_str(&args.database_url)
        .context("failed to parse DATABASE_URL")?
        .application_name("tsad-manager");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(60))
        .max_connections(50)
        .connect_with(options)
        .await
        .context("failed to connect to the database")?;

    if args.migrate {
        tsad_migrate::run(&pool).await.context("failed to run database migrations")?;
    }

    let state = Arc::new(AppState {
        pool: pool.clone(),
        control_plane: ControlPlane::new(pool.clone(), args.worker_port),
        worker_port: args.worker_port,
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = Dispatcher::new(pool, args.host.clone(), args.worker_port);
    let dispatcher_task = tokio::spawn(dispatcher.run(shutdown_rx.clone()));

    let app = http::router(state.clone()).layer(tower_http::trace::TraceLayer::new_for_http());

    let bind = format!("0.0.0.0:{}", args.manager_port);
    let listener = TcpListener::bind(&bind).await.with_context(|| format!("bind manager to {bind}"))?;
    tracing::info!(addr = %bind, "manager listening");

    let mut server_shutdown = shutdown_rx.clone();
    let server = axum::serve(listener, app.into_make_service()).with_graceful_shutdown(async move {
        while !*server_shutdown.borrow() {
            if server_shutdown.changed().await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        res = server => res.context("manager serve")?,
        _ = wait_for_signal() => {
            tracing::info!("manager shutting down");
            let _ = shutdown_tx.send(true);
        }
    }

    let _ = dispatcher_task.await;
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
