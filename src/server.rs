use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::traffic::{TimeFilter, controller::RecomputeController, render::GeoJsonRenderer};

/// The mutex serializes recomputes; each request's recompute finishes before the next starts.
pub type SharedController = Arc<Mutex<RecomputeController<GeoJsonRenderer>>>;

pub fn create_router(controller: SharedController) -> Router {
    Router::new()
        .route("/stations", get(stations))
        .route("/health", get(health))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(controller)
}

pub async fn serve(controller: SharedController, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, create_router(controller)).await?;
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
pub struct StationsQuery {
    time: Option<String>,
}

async fn stations(
    State(controller): State<SharedController>,
    Query(query): Query<StationsQuery>,
) -> Response {
    let filter = match query.time.as_deref().map(str::parse::<TimeFilter>) {
        None => TimeFilter::Any,
        Some(Ok(filter)) => filter,
        Some(Err(err)) => return (StatusCode::BAD_REQUEST, format!("{err:#}")).into_response(),
    };

    let Ok(mut controller) = controller.lock() else {
        warn!("controller lock poisoned");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    controller.on_time_filter_changed(filter);
    match controller.renderer().latest() {
        Some(collection) => Json(collection.clone()).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "station data not loaded").into_response(),
    }
}

async fn health() -> &'static str {
    "OK"
}
