//! Request dispatch.
//!
//! `/protocol-handler` is an ordinary route. Every other request goes
//! through [`dispatch`], which tries its matchers in order: passthrough,
//! tune trigger, then plain static serving.

use std::path::Path;

use axum::body::Body;
use axum::extract::{RawQuery, Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;
use streamgate_common::{Error, StreamAddress, StreamId};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use super::error::AppError;
use super::passthrough::{self, PASSTHROUGH_SEGMENT};
use super::AppContext;
use crate::tuner::TuneOutcome;

/// Prefix browsers put in front of addresses handed to a registered
/// `web+` protocol handler.
const PROTOCOL_PREFIX: &str = "web+";

/// `GET /protocol-handler?url=<address>`: permanent redirect to the
/// address's stream directory.
pub async fn protocol_handler(RawQuery(query): RawQuery) -> Result<Response, AppError> {
    let query = query.unwrap_or_default();
    let mut urls = url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned());

    let raw = match (urls.next(), urls.next()) {
        (Some(raw), None) if !raw.is_empty() => raw,
        (None, _) => return Err(Error::invalid_input("missing url parameter").into()),
        _ => return Err(Error::invalid_input("expected exactly one non-empty url parameter").into()),
    };

    let address = StreamAddress::new(raw.strip_prefix(PROTOCOL_PREFIX).unwrap_or(&raw));
    let id = StreamId::encode(&address);
    tracing::info!(address = %address, stream_id = %id, "Redirecting protocol handler request");

    // Redirect::permanent is a 308; browsers registering protocol handlers expect 301.
    Ok((
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, format!("/{id}/"))],
    )
        .into_response())
}

/// Fallback for every path other than `/protocol-handler`.
pub async fn dispatch(State(ctx): State<AppContext>, request: Request) -> Response {
    match dispatch_inner(ctx, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn dispatch_inner(ctx: AppContext, request: Request) -> Result<Response, AppError> {
    let method = request.method().clone();
    if method != Method::GET && method != Method::HEAD {
        return Ok((StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "GET, HEAD")]).into_response());
    }

    let path = percent_decode_str(request.uri().path())
        .decode_utf8()
        .map_err(|_| Error::invalid_input("request path is not valid UTF-8"))?
        .into_owned();

    if let Some(id) = passthrough_target(&path) {
        if let Some(playback) = ctx.playback.clone() {
            return serve_passthrough(&ctx, playback.as_ref(), &method, id, request.headers()).await;
        }
    }

    let resolved = ctx.resolver.resolve(&path)?;

    if tokio::fs::metadata(&resolved.path)
        .await
        .is_ok_and(|m| m.is_dir())
    {
        return Ok(redirect_to_directory(request.uri()));
    }

    if let Some(id) = resolved.tune {
        tune(&ctx, id).await?;
        wait_for_first_output(&ctx, &resolved.path).await;
    }

    Ok(serve_file(&resolved.path, request).await)
}

/// A directory named without its trailing slash redirects to the slash form.
fn redirect_to_directory(uri: &Uri) -> Response {
    let location = match uri.query() {
        Some(query) => format!("{}/?{}", uri.path(), query),
        None => format!("{}/", uri.path()),
    };
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}

/// `/<identifier>/videoplayback` names the identifier to pass through.
fn passthrough_target(path: &str) -> Option<StreamId> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    match (segments.next(), segments.next(), segments.next()) {
        (Some(id), Some(PASSTHROUGH_SEGMENT), None) => Some(StreamId::new(id)),
        _ => None,
    }
}

async fn serve_passthrough(
    ctx: &AppContext,
    playback: &dyn passthrough::PlaybackResolver,
    method: &Method,
    id: StreamId,
    headers: &HeaderMap,
) -> Result<Response, AppError> {
    let address = id.decode()?;
    if !ctx.tuner.allow_list().permits(&address) {
        return Err(Error::NotAllowed(address.to_string()).into());
    }

    let url = playback.resolve(&address).await?;
    tracing::debug!(stream_id = %id, address = %address, "Proxying direct playback URL");

    let response = passthrough::proxy(&ctx.http, method, &url, headers).await?;
    Ok(response.into_response())
}

async fn tune(ctx: &AppContext, id: StreamId) -> Result<(), AppError> {
    let tuner = ctx.tuner.clone();
    let outcome = tokio::task::spawn_blocking(move || tuner.ensure_tuned(&id))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(format!("tune task failed: {e}"))))?;

    match outcome {
        TuneOutcome::Tuned => Ok(()),
        TuneOutcome::Rejected(address) => Err(Error::NotAllowed(address.to_string()).into()),
        TuneOutcome::Failed(e) => Err(e.into()),
    }
}

/// A freshly started segmenter needs a moment before its first playlist
/// appears. Wait once, then serve whatever is there.
async fn wait_for_first_output(ctx: &AppContext, path: &Path) {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return;
    }
    let wait = ctx.first_output_wait();
    tracing::debug!("Waiting {:?} for {:?} to appear", wait, path);
    tokio::time::sleep(wait).await;
}

async fn serve_file(path: &Path, request: Request) -> Response {
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.map(Body::new).into_response(),
        Err(never) => match never {},
    }
}
