use std::sync::Arc;

use agent_studio::catalog::OptionCatalog;
use agent_studio::config::StudioConfig;
use agent_studio::notify::{DisabledDelivery, EmailConfig, EmailDelivery, SmtpDelivery};
use agent_studio::routes::{AppState, studio_routes};
use agent_studio::store::{LibSqlStore, RelationalStore, RestStore};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let config = StudioConfig::from_env()?;

    // ── Logging ─────────────────────────────────────────────────────────
    let (file_writer, _log_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "agent-studio.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .with(file_writer.map(|writer| {
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
        }))
        .init();

    eprintln!("🛠  Agent Studio v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Dashboard: http://0.0.0.0:{}", config.port);

    // ── Relational store ────────────────────────────────────────────────
    let records: Arc<dyn RelationalStore> = match &config.rest {
        Some(rest) => {
            eprintln!("   Store: {} (REST)", rest.base_url);
            Arc::new(RestStore::new(rest.clone()))
        }
        None => {
            let store = LibSqlStore::new_local(&config.db_path).await?;
            eprintln!("   Store: {} (libSQL)", config.db_path.display());
            Arc::new(store)
        }
    };

    // ── Email ───────────────────────────────────────────────────────────
    let delivery: Arc<dyn EmailDelivery> = match EmailConfig::from_env() {
        Some(email) => {
            eprintln!("   Email: enabled ({}:{})", email.smtp_host, email.smtp_port);
            Arc::new(SmtpDelivery::new(email))
        }
        None => {
            eprintln!("   Email: disabled (set EMAIL_SMTP_HOST to enable)");
            Arc::new(DisabledDelivery)
        }
    };

    if config.allowed_emails.is_empty() {
        tracing::warn!("STUDIO_ALLOWED_EMAILS is empty, every signed-in user will be rejected");
    }

    let state = AppState::new(&config, OptionCatalog::default(), records, delivery);
    let app = studio_routes(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Agent Studio server started");
    axum::serve(listener, app).await?;

    Ok(())
}
