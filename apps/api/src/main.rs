//! Coursewright API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dev_seed;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use coursewright_core::AppError;
use tokio::net::TcpListener;
use tracing::info;

use crate::api_config::ApiConfig;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    api_config::init_tracing();

    let config = ApiConfig::load()?;
    let storage = api_services::connect_storage(&config).await?;

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    if let Some(course) = &config.dev_seed_course {
        dev_seed::run(&storage, course).await?;
    }

    let runtime = api_services::build_api_runtime(&storage, &config)?;
    let email_worker = runtime.email_worker.spawn();
    let app = api_router::build_router(runtime.state, config.frontend_url.as_str())?;

    let address = config.socket_address()?;
    let listener = TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind {address}: {error}")))?;

    info!(%address, "coursewright api listening");
    let served = axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server failed: {error}")));

    email_worker.abort();
    served
}
