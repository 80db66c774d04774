use dotenvy::dotenv;
use split_buddy::{
    api::{self, AppState},
    config::{self, database},
    errors::Result,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load settings
    let settings = config::load_app_settings()
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;
    info!("Settings loaded.");

    // 4. Connect and make sure the schema exists
    let db = database::create_connection(&settings.database.url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Serve the API until Ctrl-C
    let bind = settings.server.bind.clone();
    let app = api::router(Arc::new(AppState::new(db, settings)));
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {}", bind, e))?;
    info!("Listening on {}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
