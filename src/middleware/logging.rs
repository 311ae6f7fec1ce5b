//! Access logging into the memory log (the memory-logging stage).
//!
//! Runs outside auth and timeout, so it observes the final response for
//! every request, including 403s from the auth stage and 503s from the
//! deadline stage. Each completed exchange produces one line that is sent
//! to the log channel and emitted through tracing.
//!
//! The response body is not buffered: a counting wrapper passes frames
//! through unchanged and tallies their bytes, so streaming responses keep
//! streaming and the access line carries the real byte count once the body
//! finishes (or the client goes away).
//!
//! Health probes and log-inspection requests are not recorded; a capacity-n
//! ring would otherwise fill with its own observers.

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Uri};
use axum::middleware::Next;
use axum::response::Response;
use http_body::{Frame, SizeHint};
use tracing::info;

use super::auth::AuthUser;
use super::request_id::REQUEST_ID_HEADER;
use crate::memlog::MemoryLogHandle;
use crate::state::AppState;

/// Tracing target for access lines. The diagnostic tee matches on this to
/// avoid re-forwarding lines the logging stage already sent to the ring.
pub const ACCESS_LOG_TARGET: &str = "cradle::access";

/// Identity headers consulted when the auth stage did not tag a user,
/// in priority order. Set by trusted proxies in front of the service.
const FALLBACK_IDENTITY_HEADERS: [&str; 2] = ["x-goog-authenticated-user-email", "x-chariot-user"];

pub async fn access_log(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let path = uri.path().to_string();
    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let fallback_user = fallback_identity(req.headers());

    let response = next.run(req).await;

    if !is_recorded(&path) {
        return response;
    }
    let Some(handle) = state.mem_log.clone() else {
        return response;
    };

    let status = response.status().as_u16();
    let content_type = header_str(&response, CONTENT_TYPE.as_str());
    let request_id = header_str(&response, REQUEST_ID_HEADER);
    let user = response
        .extensions()
        .get::<AuthUser>()
        .map(|u| u.0.clone())
        // The no-auth strategy tags "anonymous"; a proxy-asserted identity
        // is still more informative than that.
        .filter(|u| !u.is_empty() && u != "anonymous")
        .or(fallback_user)
        .unwrap_or_else(|| "anonymous".to_string());

    let pending = PendingAccessLine {
        handle,
        request_id,
        user,
        remote_addr,
        method,
        uri,
        status,
        content_type,
    };

    let (parts, body) = response.into_parts();
    Response::from_parts(
        parts,
        Body::new(CountingBody {
            inner: body,
            counted: 0,
            pending: Some(pending),
        }),
    )
}

/// Everything the access line needs except the body length, which is only
/// known once the response body has been fully written.
struct PendingAccessLine {
    handle: MemoryLogHandle,
    request_id: String,
    user: String,
    remote_addr: String,
    method: Method,
    uri: Uri,
    status: u16,
    content_type: String,
}

impl PendingAccessLine {
    fn emit(self, content_length: u64) {
        let line = format!(
            "Request: requestID={}, user={}, remoteAddr={}, {} {} ; \
             Response: status={}, CT={}, CL={content_length}",
            self.request_id, self.user, self.remote_addr, self.method, self.uri, self.status,
            self.content_type,
        );
        info!(target: ACCESS_LOG_TARGET, "{line}");
        self.handle.emit(line);
    }
}

/// Pass-through body that tallies data-frame bytes and emits the access
/// line when the stream ends. `Drop` covers aborted transfers, so every
/// recorded exchange produces exactly one line.
struct CountingBody {
    inner: Body,
    counted: u64,
    pending: Option<PendingAccessLine>,
}

impl CountingBody {
    fn finish(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.emit(self.counted);
        }
    }
}

impl http_body::Body for CountingBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.counted += data.len() as u64;
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finish();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CountingBody {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Health probes and log-inspection endpoints are not recorded.
fn is_recorded(path: &str) -> bool {
    path != "/healthz" && !path.starts_with("/logs")
}

fn header_str(response: &Response, name: &str) -> String {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

fn fallback_identity(headers: &axum::http::HeaderMap) -> Option<String> {
    FALLBACK_IDENTITY_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    })
}
