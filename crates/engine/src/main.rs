use std::path::Path;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use domainwatch_engine::api;
use domainwatch_engine::config::{self, EngineConfig};
use domainwatch_engine::inventory::PgInventorySource;
use domainwatch_engine::ledger::PgAlertLedger;
use domainwatch_engine::metrics::EngineMetrics;
use domainwatch_engine::notify::email::{MemoryAddressBook, SmtpEmailSender};
use domainwatch_engine::notify::push::WebPushRelay;
use domainwatch_engine::notify::{EmailSender, NotificationFanout, PushSender};
use domainwatch_engine::pattern::PgPatternStore;
use domainwatch_engine::run::{spawn_retention_task, spawn_sweep_task, Pipeline};
use domainwatch_engine::storage::migrator::run_migrations;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config_path = std::env::var("DOMAINWATCH_CONFIG").unwrap_or_else(|_| "domainwatch.yaml".into());
    let mut cfg = if Path::new(&config_path).exists() {
        config::load_from_file(Path::new(&config_path))?
    } else {
        tracing::info!(path = %config_path, "no config file, using defaults");
        EngineConfig::default()
    };
    if let Ok(url) = std::env::var("DATABASE_URL") {
        cfg.database_url = Some(url);
    }
    let database_url = cfg
        .database_url
        .clone()
        .ok_or("DATABASE_URL or config database_url is required")?;
    let api_addr = std::env::var("WORKER_API_ADDR").unwrap_or_else(|_| "0.0.0.0:9090".into());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;
    let applied = run_migrations(&pool).await?;
    if !applied.is_empty() {
        tracing::info!(count = applied.len(), "applied migrations");
    }

    let engine_metrics = EngineMetrics::new();

    let api_metrics = engine_metrics.clone();
    let api_handle = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&api_addr).await?;
        tracing::info!(%api_addr, "worker API server starting");
        api::serve(listener, api_metrics).await
    });

    let push: Option<Arc<dyn PushSender>> =
        match (&cfg.notify.push_relay_url, &cfg.notify.push_relay_secret) {
            (Some(url), Some(secret)) => Some(Arc::new(WebPushRelay::new(
                url.clone(),
                secret.clone().into_bytes(),
            ))),
            _ => {
                tracing::info!("push relay not configured, push channel disabled");
                None
            }
        };
    let email: Option<Arc<dyn EmailSender>> = match (
        &cfg.notify.smtp_host,
        &cfg.notify.smtp_username,
        &cfg.notify.smtp_password,
    ) {
        (Some(host), Some(user), Some(pass)) => {
            let book = MemoryAddressBook::new();
            for (owner, address) in &cfg.notify.email_addresses {
                book.set(owner, address);
            }
            let sender = SmtpEmailSender::new(
                host,
                cfg.notify.smtp_port,
                user,
                pass,
                cfg.notify.email_from.clone(),
                Arc::new(book),
            )?;
            Some(Arc::new(sender))
        }
        _ => {
            tracing::info!("smtp not configured, email channel disabled");
            None
        }
    };
    let fanout = NotificationFanout::new(push, email).with_summary_cap(cfg.notify.summary_cap);

    let pipeline = Arc::new(Pipeline::new(
        Arc::new(PgPatternStore::new(pool.clone())),
        Arc::new(PgInventorySource::new(pool.clone())),
        Arc::new(PgAlertLedger::new(pool)),
        fanout,
        engine_metrics,
        cfg,
    ));

    let sweep = spawn_sweep_task(pipeline.clone());
    let retention = spawn_retention_task(pipeline);
    tracing::info!("domainwatch worker running");

    tokio::select! {
        r = api_handle => {
            match r {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("API: {e}"),
                Err(e) => tracing::error!("API join: {e}"),
            }
        }
        _ = wait_for_shutdown() => {
            tracing::info!("shutdown signal received");
        }
    }

    sweep.abort();
    retention.abort();
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting on ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
