//! Taskdeck HTTP server.
//!
//! Configuration is read from the environment (and a `.env` file when
//! present); see [`taskdeck::config`] for the recognised variables.

use std::process::ExitCode;
use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use tokio::net::TcpListener;
use tokio::signal;

use taskdeck::app::TaskApp;
use taskdeck::config::{AppConfig, LogFormat, StorageMode};
use taskdeck::task::adapters::{memory::InMemoryTaskRepository, postgres};
use taskdeck::task::ports::{TaskRepository, TaskRepositoryError};
use taskdeck::telemetry;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> ExitCode {
    drop(dotenvy::dotenv());

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            if telemetry::init(LogFormat::default()).is_ok() {
                tracing::error!(%error, "configuration error");
            }
            return ExitCode::FAILURE;
        }
    };
    if telemetry::init(config.log_format).is_err() {
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!(%error, "failed to create tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "server terminated with error");
            ExitCode::FAILURE
        }
    }
}

async fn async_main(config: AppConfig) -> Result<(), BoxError> {
    tracing::info!(
        storage_mode = ?config.storage_mode,
        bind_addr = %config.bind_addr,
        processor_interval = ?config.processor_interval,
        "starting taskdeck"
    );

    let clock = Arc::new(DefaultClock);
    match config.storage_mode {
        StorageMode::InMemory => {
            tracing::warn!("in-memory storage selected; data is lost on exit");
            serve(&config, Arc::new(InMemoryTaskRepository::new()), clock).await
        }
        StorageMode::Postgres => {
            let database_url = config.database_url.clone();
            let pool_size = config.pool_size;
            let pool = tokio::task::spawn_blocking(move || {
                let pool = postgres::connect(&database_url, pool_size)?;
                postgres::initialise_schema(&pool)?;
                Ok::<_, TaskRepositoryError>(pool)
            })
            .await??;
            let repository = Arc::new(postgres::PostgresTaskRepository::new(pool));
            serve(&config, repository, clock).await
        }
    }
}

async fn serve<R, C>(
    config: &AppConfig,
    repository: Arc<R>,
    clock: Arc<C>,
) -> Result<(), BoxError>
where
    R: TaskRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    let mut app = TaskApp::new(repository, clock, config.processor_interval);
    app.start();

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!(address = %config.bind_addr, "listening");
    let served = axum::serve(listener, app.router())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    app.stop().await;
    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
