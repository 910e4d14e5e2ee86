//! Universal Handlers (§4.G): a web-standard `(Request) -> Response`
//! dispatcher, exposed as `{GET, POST}`, built over [`http::Request<Bytes>`]/
//! [`http::Response<Bytes>`] so any framework that can produce/consume
//! those types (directly, or via a thin [`adapter`]) can serve a
//! [`crate::router::Router`].

#[cfg(feature = "axum")]
pub mod adapter;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::router::{CompletionRequest, Router};
use crate::schema::{FileDescriptor, Metadata};

fn parse_query(uri: &http::Uri) -> HashMap<String, String> {
    uri.query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

fn json_response(status: StatusCode, body: &impl Serialize) -> Response<Bytes> {
    let payload = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Bytes::from(payload))
        .expect("response with static headers is always well-formed")
}

fn error_response(status: StatusCode, message: impl Into<String>, code: Option<&str>) -> Response<Bytes> {
    json_response(status, &json!({ "success": false, "error": message.into(), "code": code }))
}

/// Attach `Access-Control-Allow-Origin` when `Origin` matches
/// `security.allowedOrigins` (an exact match, or `"*"` allowing any).
fn apply_cors(response: &mut Response<Bytes>, allowed_origins: &[String], request_headers: &HeaderMap) {
    let Some(origin) = request_headers.get(http::header::ORIGIN).and_then(|v| v.to_str().ok()) else {
        return;
    };
    let allowed = allowed_origins.iter().any(|o| o == "*" || o == origin);
    if allowed {
        if let Ok(value) = http::HeaderValue::from_str(origin) {
            response.headers_mut().insert("access-control-allow-origin", value);
        }
    }
}

#[derive(Deserialize)]
struct PresignRequestBody {
    files: Vec<FileDescriptor>,
}

#[derive(Deserialize)]
struct CompletionEntry {
    key: String,
    file: FileDescriptor,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Deserialize)]
struct CompleteRequestBody {
    completions: Vec<CompletionEntry>,
}

/// `router.handlers` from spec §4.F/§4.G: a `{GET, POST}` pair of async
/// functions bound to one [`Router`].
#[derive(Clone)]
pub struct Handlers {
    router: Router,
}

impl Handlers {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    /// GET — introspection. Always `200 {success:true, routes:[...]}`.
    pub async fn get(&self, request: Request<Bytes>) -> Response<Bytes> {
        let mut response = json_response(
            StatusCode::OK,
            &json!({ "success": true, "routes": self.router.describe_routes() }),
        );
        apply_cors(&mut response, &self.router.config().security.allowed_origins, request.headers());
        response
    }

    /// POST — dispatches to `presign` or `complete` based on the `action`
    /// query parameter. See spec §4.F for the per-action algorithm.
    pub async fn post(&self, request: Request<Bytes>) -> Response<Bytes> {
        let query = parse_query(request.uri());
        let headers = Arc::new(request.headers().clone());

        let Some(route_name) = query.get("route") else {
            return error_response(StatusCode::BAD_REQUEST, "missing 'route' query parameter", Some("BAD_REQUEST"));
        };
        let action = query.get("action").map(String::as_str).unwrap_or("");

        let body: serde_json::Value = match serde_json::from_slice(request.body()) {
            Ok(v) => v,
            Err(_) => {
                return error_response(StatusCode::BAD_REQUEST, "request body is not valid JSON", Some("BAD_REQUEST"));
            }
        };

        let mut response = match action {
            "presign" => self.handle_presign(route_name, headers, body).await,
            "complete" => self.handle_complete(route_name, body).await,
            other => error_response(StatusCode::BAD_REQUEST, format!("unknown action: {other}"), Some("BAD_REQUEST")),
        };
        apply_cors(&mut response, &self.router.config().security.allowed_origins, request.headers());
        response
    }

    async fn handle_presign(&self, route_name: &str, headers: Arc<HeaderMap>, body: serde_json::Value) -> Response<Bytes> {
        let parsed: PresignRequestBody = match serde_json::from_value(body) {
            Ok(v) => v,
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, format!("invalid presign body: {e}"), Some("BAD_REQUEST"));
            }
        };

        match self.router.presign(route_name, headers, parsed.files).await {
            Ok(results) => json_response(StatusCode::OK, &json!({ "success": true, "results": results })),
            Err(e) => error_response(
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                e.to_string(),
                Some(e.code()),
            ),
        }
    }

    async fn handle_complete(&self, route_name: &str, body: serde_json::Value) -> Response<Bytes> {
        let parsed: CompleteRequestBody = match serde_json::from_value(body) {
            Ok(v) => v,
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, format!("invalid complete body: {e}"), Some("BAD_REQUEST"));
            }
        };
        let completions = parsed
            .completions
            .into_iter()
            .map(|e| CompletionRequest {
                key: e.key,
                file: e.file,
                metadata: e.metadata,
            })
            .collect();

        match self.router.complete(route_name, completions).await {
            Ok(results) => json_response(StatusCode::OK, &json!({ "success": true, "results": results })),
            Err(e) => error_response(
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                e.to_string(),
                Some(e.code()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfigBuilder;
    use crate::provider::{AwsConfig, ProviderConfig};
    use crate::router::Route;
    use crate::schema::image;

    fn handlers() -> Handlers {
        let built = UploadConfigBuilder::new()
            .provider(ProviderConfig::Aws(AwsConfig {
                access_key_id: "AKIA".into(),
                secret_access_key: "secret".into(),
                region: "us-east-1".into(),
                bucket: "b".into(),
                endpoint: None,
                force_path_style: None,
                custom_domain: None,
            }))
            .security(crate::config::SecurityConfig {
                allowed_origins: vec!["https://app.example.com".to_string()],
                ..Default::default()
            })
            .build()
            .unwrap();
        let router = built.s3.router([("imageUpload".to_string(), Route::from(image()))]);
        Handlers::new(router)
    }

    fn request(method: &str, uri: &str, body: &str) -> Request<Bytes> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Bytes::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_introspection_lists_routes() {
        let response = handlers().get(request("GET", "/upload", "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["routes"][0]["name"], "imageUpload");
    }

    #[tokio::test]
    async fn test_post_missing_route_is_bad_request() {
        let response = handlers().post(request("POST", "/upload?action=presign", "{}")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_post_unknown_route_is_not_found() {
        let response = handlers()
            .post(request("POST", "/upload?route=missing&action=presign", r#"{"files":[]}"#))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_non_json_body_is_bad_request() {
        let response = handlers()
            .post(request("POST", "/upload?route=imageUpload&action=presign", "not json"))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_presign_success_roundtrip() {
        let response = handlers()
            .post(request(
                "POST",
                "/upload?route=imageUpload&action=presign",
                r#"{"files":[{"name":"a.png","size":100,"type":"image/png"}]}"#,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["results"][0]["success"], true);
    }

    #[tokio::test]
    async fn test_cors_header_reflects_allowed_origin() {
        let mut request = request("GET", "/upload", "");
        request
            .headers_mut()
            .insert(http::header::ORIGIN, "https://app.example.com".parse().unwrap());
        let response = handlers().get(request).await;
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "https://app.example.com"
        );
    }

    #[tokio::test]
    async fn test_cors_header_absent_for_disallowed_origin() {
        let mut request = request("GET", "/upload", "");
        request
            .headers_mut()
            .insert(http::header::ORIGIN, "https://evil.example.com".parse().unwrap());
        let response = handlers().get(request).await;
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }
}
