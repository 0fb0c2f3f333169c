use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Response, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::get,
};
use rust_embed::Embed;
use tokio::{net::TcpListener, signal};
use tracing::{error, info};

use crate::{analytics::Analytics, middleware::record_exchange, report::ApiResponse};

pub const LOGS_PATH: &str = "/api/_analytics/logs";
pub const DASHBOARD_PATH: &str = "/api/_analytics/dashboard";
pub const METRICS_PATH: &str = "/api/_analytics/metrics";

#[derive(Embed)]
#[folder = "assets/"]
struct Templates;

/// The plugin's own endpoints.
pub fn router(analytics: Arc<Analytics>) -> Router {
    let mut router = Router::new().route(LOGS_PATH, get(logs));
    if analytics.config().ui {
        router = router.route(DASHBOARD_PATH, get(dashboard));
    }
    if analytics.config().metrics {
        router = router.route(METRICS_PATH, get(metrics));
    }
    router.with_state(analytics)
}

/// Mounts the analytics endpoints on `app` and wraps every route with the
/// request hook.
pub fn attach(app: Router, analytics: Arc<Analytics>) -> Router {
    app.merge(router(analytics.clone()))
        .layer(middleware::from_fn_with_state(analytics, record_exchange))
}

async fn logs(State(analytics): State<Arc<Analytics>>) -> impl IntoResponse {
    Json(ApiResponse::ok(analytics.report()))
}

async fn dashboard() -> Response<Body> {
    match Templates::get("dashboard.html") {
        Some(file) => (
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            )],
            file.data.into_owned(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "dashboard template missing").into_response(),
    }
}

async fn metrics(State(analytics): State<Arc<Analytics>>) -> Response<Body> {
    match analytics.export_to_prometheus() {
        Ok(buffer) => (
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )],
            buffer,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Serves `app` with peer addresses until Ctrl+C or SIGTERM.
pub async fn serve(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{AnalyticsConfig, FileLogConfig},
        format::Console,
    };
    use axum::{body::to_bytes, http::Request};
    use tower::ServiceExt;

    fn host(config: AnalyticsConfig) -> (Router, Arc<Analytics>) {
        let analytics = Arc::new(Analytics::new(config).unwrap().0);
        let app = Router::new()
            .route("/api/users", get(|| async { Json(vec!["ada", "grace"]) }))
            .route("/favicon.ico", get(|| async { "icon" }))
            .route(
                "/boom",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );
        (attach(app, analytics.clone()), analytics)
    }

    async fn get_json(app: &Router, uri: &str) -> serde_json::Value {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn hit(app: &Router, uri: &str) -> StatusCode {
        app.clone()
            .oneshot(
                Request::get(uri)
                    .header(header::USER_AGENT, "agent/1.0 (test)")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn logs_endpoint_reports_host_traffic() {
        let (app, _) = host(AnalyticsConfig::quiet());
        assert_eq!(hit(&app, "/api/users").await, StatusCode::OK);
        assert_eq!(hit(&app, "/boom").await, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(hit(&app, "/favicon.ico").await, StatusCode::OK);

        let json = get_json(&app, LOGS_PATH).await;
        assert_eq!(json["success"], true);
        let data = &json["data"];
        assert_eq!(data["summary"]["totalRequests"], 2);
        assert_eq!(data["summary"]["errorRate"], 0.5);
        assert_eq!(data["summary"]["requestsPerMinute"], 2);
        assert_eq!(data["recentLogs"][0]["url"], "/boom");
        assert_eq!(data["recentLogs"][0]["status"], 500);
        assert_eq!(data["recentLogs"][1]["userAgent"], "agent/1.0");
        assert_eq!(data["statistics"]["requestsByCategory"]["api"], 1);
        assert_eq!(data["statistics"]["requestsByCategory"]["page"], 1);
    }

    #[tokio::test]
    async fn polling_does_not_pollute_statistics() {
        let (app, analytics) = host(AnalyticsConfig::quiet());
        for _ in 0..3 {
            get_json(&app, LOGS_PATH).await;
        }
        assert_eq!(hit(&app, DASHBOARD_PATH).await, StatusCode::OK);
        assert_eq!(analytics.report().summary.total_requests, 0);
        assert_eq!(analytics.active_endpoints(), 0);
    }

    #[tokio::test]
    async fn unknown_routes_are_still_logged() {
        let (app, analytics) = host(AnalyticsConfig::quiet());
        assert_eq!(hit(&app, "/nope").await, StatusCode::NOT_FOUND);
        let snapshot = analytics.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].status, 404);
    }

    #[tokio::test]
    async fn dashboard_serves_html_that_polls_logs() {
        let (app, _) = host(AnalyticsConfig::quiet());
        let response = app
            .oneshot(Request::get(DASHBOARD_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains(LOGS_PATH));
        assert!(html.contains(r#"id="theme""#));
        assert!(html.contains("prefers-color-scheme: dark"));
    }

    #[tokio::test]
    async fn dashboard_can_be_disabled() {
        let (app, _) = host(AnalyticsConfig {
            ui: false,
            metrics: false,
            ..AnalyticsConfig::quiet()
        });
        assert_eq!(hit(&app, DASHBOARD_PATH).await, StatusCode::NOT_FOUND);
        assert_eq!(hit(&app, METRICS_PATH).await, StatusCode::NOT_FOUND);
        assert_eq!(hit(&app, LOGS_PATH).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_exposes_text_format() {
        let (app, _) = host(AnalyticsConfig::quiet());
        hit(&app, "/api/users").await;
        let response = app
            .oneshot(Request::get(METRICS_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(r#"analytics_requests_total{category="api",status="200"} 1"#));
    }

    #[tokio::test]
    async fn response_size_comes_from_body() {
        let (app, analytics) = host(AnalyticsConfig::quiet());
        hit(&app, "/api/users").await;
        // ["ada","grace"]
        assert_eq!(analytics.snapshot()[0].size, "15B");
    }

    struct ClosedPipe;

    impl std::io::Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
    }

    #[tokio::test]
    async fn host_response_survives_closed_console() {
        let analytics = Analytics::new(AnalyticsConfig::quiet())
            .unwrap()
            .0
            .with_console(Console::new(ClosedPipe));
        let analytics = Arc::new(analytics);
        let app = attach(
            Router::new().route("/api/users", get(|| async { "ada,grace" })),
            analytics.clone(),
        );

        let response = app
            .oneshot(Request::get("/api/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ada,grace");
        assert_eq!(analytics.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn analytics_traffic_stays_out_of_access_log() {
        let dir = tempfile::tempdir().unwrap();
        let file_log = FileLogConfig {
            dir: dir.path().to_path_buf(),
            file_name: "access.json".into(),
        };
        let (analytics, writer) = Analytics::new(AnalyticsConfig {
            file_log: Some(file_log.clone()),
            ..AnalyticsConfig::quiet()
        })
        .unwrap();
        let analytics = Arc::new(analytics);
        let app = attach(
            Router::new().route("/api/users", get(|| async { "ok" })),
            analytics.clone(),
        );

        assert_eq!(hit(&app, "/api/users").await, StatusCode::OK);
        for _ in 0..3 {
            get_json(&app, LOGS_PATH).await;
        }
        assert_eq!(hit(&app, DASHBOARD_PATH).await, StatusCode::OK);
        assert_eq!(hit(&app, METRICS_PATH).await, StatusCode::OK);

        // Last sink handle goes with the state; the writer then drains and exits.
        drop(app);
        drop(analytics);
        writer.unwrap().await.unwrap();

        let log = std::fs::read_to_string(file_log.path()).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains(r#""endpoint":"/api/users""#));
        assert!(!log.contains("/api/_analytics/"));
    }
}
