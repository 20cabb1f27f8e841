use album_service::chat::{ChatService, LlmClient, OpenAiClient};
use album_service::db::{self, AlbumRepository, Migrator, SqliteAlbumRepository};
use album_service::{api, config::Config};
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the environment may already be set.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;

    let pool = db::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    let applied = Migrator::default()
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!(applied, "Database ready");

    let albums: Arc<dyn AlbumRepository> = Arc::new(SqliteAlbumRepository::with_timeout(
        pool.clone(),
        config.database.timeout,
    ));

    let mut state = api::AppState::new(albums.clone()).with_request_timeout(config.request_timeout);
    match &config.chat {
        Some(chat) => {
            tracing::info!(model = %chat.model, "Chat endpoint enabled");
            let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(chat));
            state = state.with_chat(Arc::new(ChatService::new(llm, albums)));
        }
        None => tracing::warn!("OPENAI_API_KEY not set, /chat will answer 503"),
    }

    let app = api::create_router(state);

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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

    tracing::info!("Shutdown signal received");
}
