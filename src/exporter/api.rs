use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;

use super::SnapshotStore;

async fn local_topology(store: State<SnapshotStore>) -> Response {
    match store.latest() {
        Some(doc) => (StatusCode::OK, Json(doc)).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "no snapshot has been published yet",
        )
            .into_response(),
    }
}

async fn node_topology(store: State<SnapshotStore>, Path(name): Path<String>) -> Response {
    match store.get(&name) {
        Some(doc) => (StatusCode::OK, Json(doc)).into_response(),
        None => (StatusCode::NOT_FOUND, format!("unknown node `{name}`")).into_response(),
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Read-only HTTP view of the published node documents.
pub struct ApiServer {
    router: axum::Router,
}

impl ApiServer {
    pub fn new(store: SnapshotStore) -> Self {
        let router = axum::Router::new()
            .route("/noderesourcetopology", get(local_topology))
            .route("/noderesourcetopology/{name}", get(node_topology))
            .route("/healthz", get(healthz))
            .with_state(store);
        Self { router }
    }

    pub fn router(&self) -> axum::Router {
        self.router.clone()
    }

    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        if let Ok(addr) = listener.local_addr() {
            log::info!("serving node resource topology on http://{addr}");
        }
        axum::serve(listener, self.router.into_make_service()).await
    }
}
