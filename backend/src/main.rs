use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::config::Settings;
use crate::games::backend_wheel_game::{create_router as create_wheel_game_router, WheelGameState};
use crate::services::playbasis::PlaybasisClient;

mod config;
mod error;
mod games;
mod logging;
mod services;

const ALLOWED_ORIGINS: [&str; 2] = ["http://127.0.0.1:8080", "http://127.0.0.1:3000"];

pub async fn health_check() -> impl IntoResponse {
    "OK"
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(ALLOWED_ORIGINS.map(HeaderValue::from_static).to_vec())
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS, Method::DELETE])
        .allow_headers(vec![HeaderName::from_static("content-type")])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::from_path(".env").ok();

    let settings = Settings::from_env();
    logging::setup(settings.as_ref().map_or(true, |s| s.wheel.show_debug_log));
    let settings = settings.map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    let client = PlaybasisClient::new(
        &settings.playbasis_base_url,
        settings.wheel.api_key.as_deref().unwrap_or_default(),
        settings.wheel.api_secret.as_deref().unwrap_or_default(),
    )?;
    if !settings.wheel.has_credentials() {
        info!("PB_API_KEY or PB_API_SECRET is not set, wheel sessions will be refused");
    }

    let wheel_game_state = Arc::new(WheelGameState::new(client, settings.wheel.clone()));

    let app = Router::new()
        .route("/api/health_check", get(health_check))
        .nest("/wheel", create_wheel_game_router().with_state(wheel_game_state))
        .layer(cors_layer());

    info!("listening on {}", settings.bind_addr);
    let listener = TcpListener::bind(settings.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
