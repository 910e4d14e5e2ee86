//! Framework Adapter (§4.H) for axum: converts between axum's native
//! request/response types and this crate's `http::Request<Bytes>`/
//! `http::Response<Bytes>` handler shape. Gated behind the `axum` feature
//! so the rest of the crate never depends on `axum-core`.

use axum_core::body::Body;
use axum_core::extract::Request as AxumRequest;
use axum_core::response::{IntoResponse, Response as AxumResponse};
use bytes::Bytes;

use super::Handlers;

/// Buffer an axum request's body into a `http::Request<Bytes>`, dispatch it
/// through `handler`, and convert the resulting `http::Response<Bytes>`
/// back into an axum response.
async fn dispatch(
    request: AxumRequest,
    handler: impl FnOnce(http::Request<Bytes>) -> std::pin::Pin<Box<dyn std::future::Future<Output = http::Response<Bytes>> + Send>>,
) -> AxumResponse {
    let (parts, body) = request.into_parts();
    let bytes = match axum_core::body::to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            return (http::StatusCode::BAD_REQUEST, format!("failed to read request body: {e}")).into_response();
        }
    };
    let request = http::Request::from_parts(parts, bytes);
    let response = handler(request).await;
    let (parts, body) = response.into_parts();
    AxumResponse::from_parts(parts, Body::from(body))
}

/// Adapts [`Handlers::get`]/[`Handlers::post`] to axum handler functions,
/// e.g. `.route("/upload", get(to_axum_get(handlers.clone())).post(to_axum_post(handlers)))`.
#[derive(Clone)]
pub struct AxumHandlers(Handlers);

impl AxumHandlers {
    pub fn new(handlers: Handlers) -> Self {
        Self(handlers)
    }

    pub async fn get(&self, request: AxumRequest) -> AxumResponse {
        let handlers = self.0.clone();
        dispatch(request, |req| Box::pin(async move { handlers.get(req).await })).await
    }

    pub async fn post(&self, request: AxumRequest) -> AxumResponse {
        let handlers = self.0.clone();
        dispatch(request, |req| Box::pin(async move { handlers.post(req).await })).await
    }
}
