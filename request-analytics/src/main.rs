use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use axum::{
    Json, Router,
    http::{StatusCode, header},
    response::{Html, IntoResponse},
    routing::get,
};
use clap::Parser;
use request_analytics::{Analytics, AnalyticsConfig, ExpiryPolicy, FileLogConfig, attach, serve};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Demo host with request analytics attached", long_about = None)]
struct Args {
    #[arg(long, default_value_t = 8080)]
    port: u16,

    #[arg(long, default_value = "./logs")]
    logs_dir: PathBuf,

    #[arg(long, default_value_t = 1000)]
    capacity: usize,

    #[arg(long, value_enum, default_value_t = ExpiryPolicy::PerIncrement)]
    expiry: ExpiryPolicy,

    /// Do not register the dashboard page.
    #[arg(long)]
    no_ui: bool,

    /// Do not register the Prometheus endpoint.
    #[arg(long)]
    no_metrics: bool,

    #[arg(long)]
    no_file_log: bool,

    /// Suppress per-request console lines.
    #[arg(long)]
    quiet: bool,
}

impl Args {
    fn analytics_config(&self) -> AnalyticsConfig {
        AnalyticsConfig {
            ui: !self.no_ui,
            metrics: !self.no_metrics,
            capacity: self.capacity,
            expiry: self.expiry,
            console: !self.quiet,
            file_log: (!self.no_file_log).then(|| FileLogConfig {
                dir: self.logs_dir.clone(),
                ..FileLogConfig::default()
            }),
            ..AnalyticsConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    let (analytics, writer) = Analytics::new(args.analytics_config())?;
    let app = attach(host_routes(), Arc::new(analytics));

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), args.port);
    info!(
        dashboard = %format!("http://localhost:{}/api/_analytics/dashboard", args.port),
        "Demo host starting"
    );
    serve(app, addr).await?;

    // The router owned the last sink handle; the writer exits once it drains.
    if let Some(writer) = writer {
        writer.await?;
    }
    Ok(())
}

fn host_routes() -> Router {
    Router::new()
        .route("/up", get(up))
        .route("/", get(|| async { Html("<h1>Home</h1>") }))
        .route("/about", get(|| async { Html("<h1>About</h1>") }))
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/slow", get(slow))
        .route("/api/fail", get(fail))
        .route("/auth/login", get(|| async { (StatusCode::UNAUTHORIZED, "login required") }))
        .route(
            "/assets/app.js",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/javascript")],
                    "console.log('app')",
                )
            }),
        )
        .route(
            "/static/logo.svg",
            get(|| async { ([(header::CONTENT_TYPE, "image/svg+xml")], "<svg/>") }),
        )
        .route("/docs/guide.pdf", get(|| async { "%PDF-1.7" }))
}

async fn up() -> impl IntoResponse {}

async fn list_users() -> impl IntoResponse {
    Json(json!([{ "id": 1, "name": "ada" }, { "id": 2, "name": "grace" }]))
}

async fn create_user() -> impl IntoResponse {
    (StatusCode::CREATED, Json(json!({ "id": 3 })))
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_millis(250)).await;
    "done"
}

async fn fail() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream unavailable")
}
