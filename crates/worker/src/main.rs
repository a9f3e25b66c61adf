use std::sync::Arc;

use courier_common::config::AppConfig;
use courier_common::db;
use courier_notifier::render::FileTemplateRenderer;
use courier_notifier::store::PgRecipientStore;
use courier_notifier::transport::build_transport;
use courier_notifier::{BatchProcessor, Scheduler, WelcomeDispatch};

mod seed;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier_worker=info,courier_notifier=info".into()),
        )
        .json()
        .init();

    tracing::info!("Courier worker starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to database; an unreachable store is fatal
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;

    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let store = Arc::new(PgRecipientStore::new(pool));

    if let Some(path) = &config.seed_file {
        let recipients = seed::load_seed_file(path).await?;
        store.seed_if_empty(&recipients).await?;
    }

    let pending = store.count_pending().await?;
    tracing::info!(pending, "Recipients awaiting welcome email");

    let renderer = Arc::new(FileTemplateRenderer::new(&config.mail.template_dir));
    let transport = build_transport(&config.mail)?;

    let dispatch = WelcomeDispatch::new(
        store.clone(),
        renderer,
        transport,
        config.mail.welcome_template.clone(),
        config.mail.welcome_subject.clone(),
    );
    let processor = BatchProcessor::new(&config.worker, store, dispatch);
    let handle = Scheduler::new(&config.worker, processor).start();

    shutdown_signal().await;
    tracing::info!("Received shutdown signal, stopping gracefully...");

    handle.stop(Some(config.worker.shutdown_grace)).await?;

    tracing::info!("Courier worker stopped.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
