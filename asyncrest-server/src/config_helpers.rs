use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Parse host:port into a SocketAddr, with fallback to 0.0.0.0.
pub fn parse_bind_address(host: &str, port: u16) -> SocketAddr {
    host.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .or_else(|_| host.parse::<SocketAddr>())
        .or_else(|_| host.parse::<Ipv6Addr>().map(|ip| SocketAddr::new(IpAddr::V6(ip), port)))
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)))
}

/// Fallback handler answering 503 while the server runs in maintenance mode.
pub async fn service_unavailable_handler() -> impl IntoResponse {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": "service is in maintenance mode: authentication is not configured"
        })),
    )
}
