//! HTTP transport.
//!
//! - POST /graphql - queries and mutations
//! - GET /graphql - usage page, if the playground is enabled
//! - GET /health - health check
//! - GET /.well-known/codegql - server capabilities

use crate::config::ServerConfig;
use crate::ServerError;
use bytes::Bytes;
use codegql_core::{Actor, ErrorCode, GqlError, RequestContext};
use codegql_resolvers::{Request as GraphQLRequest, Response as GraphQLResponse, Schema};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

pub const ACTOR_UID_HEADER: &str = "x-actor-uid";
pub const ACTOR_INTERNAL_HEADER: &str = "x-actor-internal";

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// What every connection handler shares.
pub struct AppState {
    pub schema: Schema,
    pub config: ServerConfig,
}

fn full<T: Into<Bytes>>(chunk: T) -> BoxBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

fn response(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<BoxBody> {
    let mut response = Response::new(full(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response<BoxBody> {
    match serde_json::to_vec(data) {
        Ok(body) => response(status, "application/json", body),
        Err(err) => {
            error!(error = %err, "serializing response");
            response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "application/json",
                r#"{"errors":[{"message":"internal error"}]}"#,
            )
        }
    }
}

/// The HTTP status for an error raised before execution.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        code if code.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: GqlError) -> Response<BoxBody> {
    json_response(status_for(err.code), &GraphQLResponse::from_error(err))
}

/// Reads the acting user from the actor headers.
///
/// `X-Actor-Internal` is only honoured when `trust_internal` is set. Otherwise
/// its presence is rejected.
pub fn actor_from_headers(headers: &HeaderMap, trust_internal: bool) -> Result<Actor, GqlError> {
    if let Some(value) = headers.get(ACTOR_INTERNAL_HEADER) {
        if !trust_internal {
            return Err(GqlError::forbidden("X-Actor-Internal header is not accepted"));
        }
        let internal = value
            .to_str()
            .is_ok_and(|v| matches!(v.trim(), "1" | "true"));
        if internal {
            return Ok(Actor::internal());
        }
    }
    let Some(uid) = headers.get(ACTOR_UID_HEADER) else {
        return Ok(Actor::anonymous());
    };
    let uid = uid
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i32>().ok())
        .filter(|uid| *uid > 0)
        .ok_or_else(|| GqlError::bad_request("invalid X-Actor-UID header"))?;
    Ok(Actor::user(uid))
}

fn request_context(headers: &HeaderMap, actor: Actor) -> RequestContext {
    headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)))
        .fold(RequestContext::new(actor), |ctx, (name, value)| {
            ctx.with_header(name, value)
        })
}

async fn handle_graphql<B>(state: &AppState, headers: &HeaderMap, body: B) -> Response<BoxBody>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let body = match Limited::new(body, state.config.max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            warn!(limit = state.config.max_body_bytes, "request body too large");
            return json_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                &GraphQLResponse::from_error(GqlError::bad_request(format!(
                    "request body exceeds {} bytes",
                    state.config.max_body_bytes
                ))),
            );
        }
        Err(err) => {
            warn!(error = %err, "reading request body");
            return error_response(GqlError::bad_request(format!("reading body: {}", err)));
        }
    };
    let request: GraphQLRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            return error_response(GqlError::bad_request(format!("invalid JSON: {}", err)));
        }
    };
    let actor = match actor_from_headers(headers, state.config.trust_internal_header) {
        Ok(actor) => actor,
        Err(err) => return error_response(err),
    };

    debug!(operation = request.operation.as_str(), uid = ?actor.uid, "executing request");
    let ctx = request_context(headers, actor);
    let result = state.schema.execute(request, ctx).await;
    json_response(StatusCode::OK, &result)
}

pub(crate) fn playground_html(endpoint: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>codegql</title></head>
<body>
    <h1>codegql</h1>
    <p>POST a selection tree to <code>{endpoint}</code>.</p>
    <pre>curl -s http://localhost:3080{endpoint} \
  -H "Content-Type: application/json" \
  -H "X-Actor-UID: 1" \
  -d '{{"selection": {{"currentUser": {{"username": true}}}}}}'</pre>
    <p>Mutations set <code>"operation": "mutation"</code>.</p>
</body>
</html>"#
    )
}

pub(crate) fn well_known(config: &ServerConfig) -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "graphql": "/graphql",
            "health": "/health"
        },
        "features": {
            "playground": config.playground,
            "teams": config.teams_enabled && !config.dotcom_mode,
            "dotcom": config.dotcom_mode
        },
        "limits": {
            "maxPageSize": config.max_page_size
        }
    })
}

/// Routes one request.
pub async fn route<B>(state: &AppState, req: Request<B>) -> Response<BoxBody>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    match (&parts.method, parts.uri.path()) {
        (&Method::GET, "/health") => response(
            StatusCode::OK,
            "application/json",
            r#"{"status":"healthy"}"#,
        ),
        (&Method::GET, "/.well-known/codegql") => {
            json_response(StatusCode::OK, &well_known(&state.config))
        }
        (&Method::POST, "/graphql") => handle_graphql(state, &parts.headers, body).await,
        (&Method::GET, "/graphql" | "/") if state.config.playground => response(
            StatusCode::OK,
            "text/html; charset=utf-8",
            playground_html("/graphql"),
        ),
        (&Method::OPTIONS, "/graphql") => {
            let mut response = response(StatusCode::OK, "text/plain", "");
            let headers = response.headers_mut();
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, OPTIONS"),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type, X-Actor-UID, X-Actor-Internal"),
            );
            response
        }
        _ => response(
            StatusCode::NOT_FOUND,
            "application/json",
            r#"{"error":"Not Found"}"#,
        ),
    }
}

/// Accepts connections until ctrl-c, serving each on its own task.
pub async fn run_server(state: Arc<AppState>) -> Result<(), ServerError> {
    let config = &state.config;
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|source| ServerError::Bind {
            addr: format!("{}:{}", config.host, config.port),
            source,
        })?;
    let addr = listener.local_addr().map_err(ServerError::Accept)?;
    info!("listening on http://{}", addr);
    if config.playground {
        info!("playground: http://{}/graphql", addr);
    }

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted.map_err(ServerError::Accept)?,
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        };

        let state = state.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(|req: Request<Incoming>| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(route(&state, req).await) }
            });
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                if !err.is_incomplete_message() {
                    error!(peer = %peer, error = ?err, "connection error");
                }
            }
        });
    }
}
