use axum::http::HeaderName;
use axum::{Router, routing::get};
use tower::ServiceBuilder;
use tower_http::request_id::PropagateRequestIdLayer;

use soba_core::health::healthz;
use soba_core::middleware::{REQUEST_ID_HEADER, request_id_layer, trace_layer};

use crate::handlers::{engines::list_engines, health::readyz, outbox::outbox_stats};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Outbox
        .route("/outbox/stats", get(outbox_stats))
        // Engines
        .route("/engines", get(list_engines))
        .layer(
            ServiceBuilder::new()
                .layer(request_id_layer())
                .layer(trace_layer())
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID_HEADER,
                ))),
        )
        .with_state(state)
}
