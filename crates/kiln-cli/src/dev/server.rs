//! HTTP side of the development server.
//!
//! Serves the in-memory build under the public path, the live-update event
//! stream and the browser client that listens to it. Requests under a
//! configured proxy prefix are forwarded to their upstream instead.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    routing::get,
    Router,
};
use kiln_config::DevServerOptions;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

use crate::dev::port::PortAllocation;
use crate::dev::state::SharedState;
use crate::error::{CliError, Result};

pub const LIVE_PATH: &str = "/__kiln_live__";
pub const CLIENT_SCRIPT_PATH: &str = "/__kiln_client__.js";

const CLIENT_SCRIPT: &str = include_str!("../../assets/live-client.js");

/// A server accepting connections on its resolved port.
pub struct RunningServer {
    pub allocation: PortAllocation,
    pub url: String,
    pub handle: JoinHandle<Result<()>>,
}

/// Largest request body forwarded to a proxy upstream.
const PROXY_BODY_LIMIT: usize = 64 * 1024 * 1024;

#[derive(Clone)]
struct ServerContext {
    state: SharedState,
    history_fallback: bool,
    live_reload: bool,
    /// Path prefix and upstream origin, longest prefix first.
    proxy: Arc<Vec<(String, String)>>,
    client: reqwest::Client,
}

/// Serve `state` on an already-bound listener.
pub fn start(
    listener: TcpListener,
    allocation: PortAllocation,
    state: SharedState,
    options: &DevServerOptions,
) -> RunningServer {
    let url = format!("http://{}:{}/", options.host, allocation.resolved);
    let app = router(state, options);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .map_err(|e| CliError::Server(e.to_string()))
    });
    tracing::debug!(%url, "dev server listening");
    RunningServer {
        allocation,
        url,
        handle,
    }
}

pub fn router(state: SharedState, options: &DevServerOptions) -> Router {
    let mut proxy: Vec<(String, String)> = options
        .proxy
        .iter()
        .map(|(prefix, upstream)| (prefix.clone(), upstream.trim_end_matches('/').to_string()))
        .collect();
    proxy.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    Router::new()
        .route(LIVE_PATH, get(handle_live))
        .route(CLIENT_SCRIPT_PATH, get(handle_client_script))
        .fallback(handle_request)
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(ServerContext {
            state,
            history_fallback: options.history_fallback,
            live_reload: options.live_reload,
            proxy: Arc::new(proxy),
            client: reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap_or_default(),
        })
}

async fn handle_live(
    State(ctx): State<ServerContext>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let (id, rx) = ctx.state.register_client();
    tracing::debug!(id, "live client connected");

    let current = ctx
        .state
        .get_status()
        .as_event()
        .and_then(|event| serde_json::to_string(&event).ok());
    let stream = tokio_stream::iter(current)
        .chain(ReceiverStream::new(rx))
        .map(|data| Ok(Event::default().data(data)));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

async fn handle_client_script() -> Response {
    respond(
        StatusCode::OK,
        "application/javascript",
        CLIENT_SCRIPT.as_bytes().to_vec(),
    )
}

async fn handle_request(State(ctx): State<ServerContext>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    if let Some(upstream) = proxy_target(&ctx.proxy, &path) {
        return forward(&ctx.client, upstream, request).await;
    }
    let method = request.method().clone();
    let path = path.as_str();

    if is_navigation(path) {
        if let Some(overlay) = ctx.state.get_status().overlay() {
            return respond(StatusCode::OK, "text/html; charset=utf-8", overlay.as_bytes().to_vec());
        }
    }

    let mut hit = ctx.state.get_cached_file(path);
    if hit.is_none() && path.ends_with('/') {
        hit = ctx.state.get_cached_file(&format!("{path}index.html"));
    }
    if hit.is_none() && ctx.history_fallback && method == Method::GET && is_navigation(path) {
        hit = ctx.state.get_cached_file(&ctx.state.document_url);
    }

    match hit {
        Some((content, content_type)) if ctx.live_reload && content_type.starts_with("text/html") => respond(
            StatusCode::OK,
            &content_type,
            inject_client_script(&content),
        ),
        Some((content, content_type)) => respond(StatusCode::OK, &content_type, content),
        None => respond(
            StatusCode::NOT_FOUND,
            "text/plain; charset=utf-8",
            format!("Not found: {path}").into_bytes(),
        ),
    }
}

/// The upstream for `path`: the longest prefix that matches at a segment
/// boundary.
fn proxy_target<'a>(proxy: &'a [(String, String)], path: &str) -> Option<&'a str> {
    proxy.iter().find_map(|(prefix, upstream)| {
        let prefix = prefix.trim_end_matches('/');
        let rest = path.strip_prefix(prefix)?;
        (rest.is_empty() || rest.starts_with('/') || prefix.is_empty()).then_some(upstream.as_str())
    })
}

/// Replay `request` against `upstream` and relay the answer.
async fn forward(client: &reqwest::Client, upstream: &str, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{upstream}{path_and_query}");

    let body = match body::to_bytes(body, PROXY_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => return bad_gateway(&url, e),
    };
    let mut headers = parts.headers;
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    strip_hop_headers(&mut headers);

    let reply = match client
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(reply) => reply,
        Err(e) => return bad_gateway(&url, e),
    };
    tracing::debug!(%url, status = %reply.status(), "proxied");

    let status = reply.status();
    let mut headers = reply.headers().clone();
    strip_hop_headers(&mut headers);
    headers.remove(header::CONTENT_LENGTH);
    match reply.bytes().await {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        Err(e) => bad_gateway(&url, e),
    }
}

fn strip_hop_headers(headers: &mut HeaderMap) {
    for name in [
        header::CONNECTION,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
        header::TE,
        header::TRAILER,
        header::PROXY_AUTHORIZATION,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

fn bad_gateway(url: &str, err: impl std::fmt::Display) -> Response {
    tracing::warn!(%url, "proxy request failed: {err}");
    respond(
        StatusCode::BAD_GATEWAY,
        "text/plain; charset=utf-8",
        format!("Proxy error: {url}: {err}").into_bytes(),
    )
}

fn respond(status: StatusCode, content_type: &str, body: Vec<u8>) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        body,
    )
        .into_response()
}

/// A page request rather than a file: no extension, or an `.html` one.
fn is_navigation(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or_default();
    !last.contains('.') || last.ends_with(".html")
}

/// Add the live client before `</body>`, or at the end without one.
pub fn inject_client_script(content: &[u8]) -> Vec<u8> {
    let html = String::from_utf8_lossy(content);
    let tag = format!(r#"<script src="{CLIENT_SCRIPT_PATH}" data-live="{LIVE_PATH}"></script>"#);
    match html.rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], tag, &html[pos..]).into_bytes(),
        None => format!("{html}{tag}").into_bytes(),
    }
}
