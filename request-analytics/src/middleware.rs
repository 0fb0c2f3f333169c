use std::{net::SocketAddr, sync::Arc, time::Instant};

use axum::{
    body::HttpBody,
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::{analytics::Analytics, models::Exchange};

/// Request hook: times the inner service and records the finished exchange.
///
/// Recording never fails and never touches the response.
pub async fn record_exchange(
    State(analytics): State<Arc<Analytics>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_owned();
    let endpoint = request
        .uri()
        .path_and_query()
        .map_or_else(|| path.clone(), |pq| pq.as_str().to_owned());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let response = next.run(request).await;

    let content_length = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .or_else(|| response.body().size_hint().exact());

    let exchange = Exchange {
        at: Utc::now(),
        method,
        path,
        endpoint,
        status: response.status().as_u16(),
        elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        content_length,
        user_agent,
        remote_addr,
    };
    analytics.record(&exchange);
    response
}
