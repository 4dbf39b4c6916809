use std::error::Error;

use clap::Parser;
use routescribe::{AppState, config::Settings, create_router, http_clients::HttpClients};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let settings = Settings::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("routescribe={},tower_http=info", settings.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    settings.validate()?;
    tracing::info!(
        "settings loaded: model={} geocoder={} directions={}",
        settings.model_name,
        settings.yandex_geocoder_url,
        settings.ors_directions_url
    );

    let clients = HttpClients::from_settings(&settings)?;
    let state = AppState::from_settings(&settings, &clients)?;
    let app = create_router(state);

    let addr = settings.socket_addr()?;
    tracing::info!("starting backend on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    clients.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
