//! Reverse proxy to the live generation

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::response::Response;
use futures_util::StreamExt;
use shared::{component_debug, Component};
use tokio_util::sync::CancellationToken;

use crate::error::{RouterError, RouterResult};
use crate::proxy;
use crate::state::RouterState;

/// Forward any request to the worker currently serving traffic
///
/// Waits for a live port and claims it, counting the request against that
/// port for as long as the response body is streaming, then relays status,
/// headers and body.
pub async fn forward(
    State(state): State<RouterState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> RouterResult<Response> {
    let cancel = CancellationToken::new();
    // Stops the port waiter if this handler returns or is dropped first
    let _stop_waiter = cancel.clone().drop_guard();

    let deadline = tokio::time::Instant::now() + state.config.live_port_timeout;
    let guard = loop {
        if let Some(guard) = state.controller.claim_live_port() {
            break guard;
        }
        // A new deploy can hide the live port again between delivery and
        // claim; wait for the next promotion within the same deadline
        let live = state.controller.live_port_channel(cancel.child_token());
        match tokio::time::timeout_at(deadline, live).await {
            Ok(Ok(_)) => continue,
            _ => return Err(RouterError::LivePortTimeout),
        }
    };
    let port = guard.port();

    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(RouterError::invalid_request)?;

    let path = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let url = format!("http://{}:{}{}", state.controller.host(), port, path);
    let headers = proxy::outbound_headers(&parts.headers, connect.map(|ConnectInfo(addr)| addr.ip()));

    component_debug!(Component::Router, "{} {} -> port {}", parts.method, path, port);

    let upstream = state
        .client
        .request(parts.method, url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(RouterError::ProxyDispatch)?;

    let status = upstream.status();
    let headers = proxy::end_to_end_headers(upstream.headers());
    let stream = upstream.bytes_stream().map(move |chunk| {
        // Counted until the last chunk is relayed
        let _inflight = &guard;
        chunk
    });

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}
