//! Client IP extraction utilities.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};

/// Key used when the peer address is unavailable (e.g. requests driven
/// through the router directly without a listener).
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Peer IP address from `ConnectInfo`, or [`UNKNOWN_CLIENT`].
pub fn client_ip<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
