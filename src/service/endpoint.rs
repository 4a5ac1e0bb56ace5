use http::{Method, StatusCode};
use pingora::Result;
use pingora_proxy::Session;
use serde_json::json;

use crate::{
    config::{BRIDGE_ENDPOINT, HEALTH_ENDPOINT, HEALTH_STATUS},
    mcp::OutputMode,
    metrics,
    proxy::BridgeContext,
    service::{bridge::BridgeProxyService, response::ResponseBuilder},
    utils::request::get_req_header_value,
};

/// Routes a request to the health or bridge handler.
pub async fn route_request(
    bridge: &BridgeProxyService,
    session: &mut Session,
    ctx: &mut BridgeContext,
) -> Result<bool> {
    let path = session.req_header().uri.path().to_string();
    let method = session.req_header().method.clone();

    match path.as_str() {
        HEALTH_ENDPOINT if method == Method::GET => handle_health_endpoint(session).await,
        BRIDGE_ENDPOINT if method == Method::POST => {
            handle_bridge_endpoint(bridge, session, ctx).await
        }
        HEALTH_ENDPOINT | BRIDGE_ENDPOINT => {
            log::warn!("Method {method} not allowed on {path}");
            ResponseBuilder::send_error(session, StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
                .await
        }
        _ => {
            log::warn!("Route not found for path: {path}");
            ResponseBuilder::send_error(session, StatusCode::NOT_FOUND, "Not Found").await
        }
    }
}

/// Liveness probe, no side effects
pub async fn handle_health_endpoint(session: &mut Session) -> Result<bool> {
    let body = json!({ "status": HEALTH_STATUS, "endpoint": BRIDGE_ENDPOINT });
    ResponseBuilder::send_json(session, StatusCode::OK, &body).await
}

/// Bridges one call; any failure before headers are written becomes a 500.
pub async fn handle_bridge_endpoint(
    bridge: &BridgeProxyService,
    session: &mut Session,
    ctx: &mut BridgeContext,
) -> Result<bool> {
    ctx.output_mode = OutputMode::from_accept(get_req_header_value(session.req_header(), "accept"));
    let mode = ctx.output_mode.as_str();

    match bridge.bridge(session, ctx).await {
        Ok(reply) => {
            metrics::record_request(mode, "ok");
            bridge.send_reply(session, reply).await
        }
        Err(e) => {
            log::error!("[{}] Bridge error: {e}", ctx.request_id);
            metrics::record_request(mode, e.kind());
            ResponseBuilder::send_bridge_error(session, &e).await
        }
    }
}
