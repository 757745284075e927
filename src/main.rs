//! HTTP server for the daycare billing engine.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use daycare_billing::api::{AppState, create_router};
use daycare_billing::config::ConfigLoader;
use daycare_billing::engine::{DaycareEngine, TracingNotificationSink};
use daycare_billing::store::InMemoryStore;

const DEFAULT_CONFIG_DIR: &str = "./config/daycare";

fn now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_dir =
        std::env::var("DAYCARE_CONFIG_DIR").unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());
    let loader = ConfigLoader::load(&config_dir)?;
    let settings = loader.settings().clone();
    info!(
        config_dir = %config_dir,
        organizations = settings.organizations.len(),
        schedules = loader.schedule_seeds().len(),
        "Configuration loaded"
    );

    let engine = Arc::new(DaycareEngine::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(TracingNotificationSink),
        settings.clone(),
    ));
    for org in &settings.organizations {
        engine
            .seed_schedules(org, loader.schedule_seeds(), now())
            .await?;
    }

    let sweeper = engine.sweeper().clone().spawn(now);

    let app = create_router(AppState::with_clock(engine, now));
    let listener = tokio::net::TcpListener::bind(&settings.server.bind_address).await?;
    info!(address = %settings.server.bind_address, "Listening");

    if let Err(err) = axum::serve(listener, app).await {
        error!(error = %err, "Server stopped");
        sweeper.abort();
        return Err(err.into());
    }
    sweeper.abort();
    Ok(())
}
