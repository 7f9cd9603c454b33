//! Operational surface of the worker process: liveness, readiness and a
//! Prometheus scrape endpoint. No pattern or alert data is exposed here.

use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::{health, metrics};
use crate::metrics::engine_metrics::EngineMetrics;

pub fn router(engine_metrics: Arc<EngineMetrics>) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/ready", get(health::ready))
        .route("/metrics", get(metrics::metrics).with_state(engine_metrics))
}

pub async fn serve(
    listener: TcpListener,
    engine_metrics: Arc<EngineMetrics>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "operational API listening");
    }
    axum::serve(listener, router(engine_metrics)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn send(app: Router, uri: &str) -> (StatusCode, String) {
        let req = Request::get(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn routes_respond() {
        let m = EngineMetrics::new();
        let app = router(m);

        let (status, _) = send(app.clone(), "/healthz").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(app.clone(), "/ready").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("domainwatch_"));
    }
}
