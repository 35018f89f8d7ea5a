//! REST API over the program service.

mod error;
mod handlers;
mod health;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, patch, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::App;
use crate::error::Result;

pub use health::{health_check, HealthResponse};

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub app: Arc<App>,
}

impl AppState {
    pub fn new(app: App) -> Self {
        Self { app: Arc::new(app) }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/programas",
            get(handlers::list_programs).post(handlers::create_program),
        )
        .route("/api/programas/stats", get(handlers::collection_stats))
        .route(
            "/api/programas/:id",
            get(handlers::get_program)
                .put(handlers::update_program)
                .delete(handlers::delete_program),
        )
        .route("/api/programas/:id/criterios", get(handlers::get_criterios))
        .route("/api/programas/:id/status", patch(handlers::update_status))
        .route(
            "/api/programas/:id/calificacion",
            put(handlers::update_calificacion),
        )
        .route(
            "/api/universidades",
            get(handlers::list_universities).post(handlers::add_university),
        )
        .route("/api/analysis", get(handlers::analysis))
        .route("/api/busqueda", get(handlers::search))
        .route("/api/enrich", axum::routing::post(handlers::enrich))
        .route(
            "/api/criteria",
            get(handlers::get_criteria).put(handlers::save_criteria),
        )
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(app: App, port: u16) -> Result<()> {
    let router = build_router(AppState::new(app));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running on port {}", port);

    axum::serve(listener, router).await?;
    Ok(())
}
