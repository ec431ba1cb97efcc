use dotenvy::dotenv;
use snafu::ResultExt as _;
use tokio::net::TcpListener;

use offensive::api::{self, AppState};
use offensive::completion::Engine;
use offensive::config;
use offensive::database::Database;
use offensive::error::{ApplicationError, BindAddressSnafu, ConnectDatabaseSnafu, WebServerSnafu};
use offensive::logger;

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = config::load()?;

    let _guard = logger::init(&config)?;

    let settings = config.settings()?;
    let database = Database::connect(&config.surreal_url)
        .await
        .context(ConnectDatabaseSnafu)?;

    let engine = Engine::new(database, settings);
    let state = AppState::new(engine, config.access_policy.build());
    let app = api::router(state);

    let listener = TcpListener::bind(config.host)
        .await
        .context(BindAddressSnafu {
            address: config.host,
        })?;
    tracing::info!(address = %config.host, policy = ?config.access_policy, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context(WebServerSnafu)?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "could not listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
}
