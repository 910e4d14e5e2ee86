//! The unified error type for the upload router.

use thiserror::Error;

/// Errors produced anywhere in the upload router.
///
/// Each variant carries enough context to build both the machine-readable
/// `code` and the human-readable `message` the wire protocol's error
/// envelope (`{success:false, error, code?}`) needs. Request-fatal variants
/// (`RouteNotFound`, `Auth`, `BadRequest`) short-circuit the whole request;
/// the rest are recovered locally per file or per completion and never
/// produce a 5xx to the caller.
#[derive(Error, Debug)]
pub enum UploadError {
    /// A provider/builder configuration was invalid (empty bucket, missing
    /// credentials, malformed endpoint, …). Thrown by `.build()`.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A file failed schema validation. Never aborts a request — surfaced
    /// per-file in the result array.
    #[error("{message}")]
    Validation {
        /// Machine-readable code, e.g. `ARRAY_TOO_LONG`, `FILE_TOO_LARGE`.
        code: &'static str,
        /// Human-readable explanation.
        message: String,
        /// Dotted field path for nested object schemas, if applicable.
        field: Option<String>,
    },

    /// Middleware threw, or the storage backend rejected the signed
    /// request with a 403. Surfaced as HTTP 401 for middleware failures.
    #[error("{0}")]
    Auth(String),

    /// The requested route, or the requested key, does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The computed object key violates the path engine's rules (leading
    /// `/`, `..` segment, or longer than 1024 bytes).
    #[error("key too long or otherwise invalid: {0}")]
    KeyTooLong(String),

    /// Transport-level failure talking to the object storage backend.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The object storage backend returned an error response.
    #[error("provider error ({status}): {message}")]
    Provider {
        /// HTTP status returned by the backend.
        status: u16,
        /// Backend error message (parsed from the XML error body when possible).
        message: String,
    },

    /// A lifecycle hook (`onUploadStart`/`onUploadComplete`/`onUploadError`)
    /// threw. Swallowed (logged) for `onUploadStart`; converted to an
    /// `onUploadError` call and a per-entry failure for `onUploadComplete`.
    #[error("hook error: {0}")]
    Hook(String),

    /// The request body was not valid JSON, or was missing required fields.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The caller exceeded `security.rateLimiting`'s best-effort,
    /// in-process window for its key (IP or user id).
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),
}

/// Convenience alias for `Result<T, UploadError>`.
pub type UploadResult<T> = Result<T, UploadError>;

impl UploadError {
    /// Machine-readable error code for the wire protocol's `code` field.
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::Config(_) => "CONFIG_ERROR",
            UploadError::Validation { code, .. } => code,
            UploadError::Auth(_) => "AUTH_ERROR",
            UploadError::NotFound(_) => "NOT_FOUND",
            UploadError::KeyTooLong(_) => "KEY_TOO_LONG",
            UploadError::Network(_) => "NETWORK_ERROR",
            UploadError::Provider { .. } => "PROVIDER_ERROR",
            UploadError::Hook(_) => "HOOK_ERROR",
            UploadError::BadRequest(_) => "BAD_REQUEST",
            UploadError::RateLimited(_) => "RATE_LIMITED",
        }
    }

    /// The HTTP status the router should respond with when this error is
    /// request-fatal (as opposed to recovered per-file/per-entry).
    pub fn http_status(&self) -> u16 {
        match self {
            UploadError::NotFound(_) => 404,
            UploadError::Auth(_) => 401,
            UploadError::BadRequest(_) => 400,
            UploadError::Config(_) => 500,
            UploadError::Validation { .. } => 200,
            UploadError::KeyTooLong(_) => 200,
            UploadError::Network(_) | UploadError::Provider { .. } => 502,
            UploadError::Hook(_) => 200,
            UploadError::RateLimited(_) => 429,
        }
    }

    /// Build a validation failure with no field path (leaf `FileSchema`).
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        UploadError::Validation {
            code,
            message: message.into(),
            field: None,
        }
    }

    /// Build a validation failure scoped to a named field (`ObjectSchema`)
    /// or an array index (`ArraySchema`).
    pub fn validation_at(code: &'static str, message: impl Into<String>, field: impl Into<String>) -> Self {
        UploadError::Validation {
            code,
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(UploadError::Config("x".into()).code(), "CONFIG_ERROR");
        assert_eq!(UploadError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(
            UploadError::validation("ARRAY_TOO_LONG", "too many files").code(),
            "ARRAY_TOO_LONG"
        );
        assert_eq!(UploadError::RateLimited("x".into()).code(), "RATE_LIMITED");
        assert_eq!(UploadError::RateLimited("x".into()).http_status(), 429);
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(UploadError::NotFound("x".into()).http_status(), 404);
        assert_eq!(UploadError::Auth("x".into()).http_status(), 401);
        assert_eq!(UploadError::BadRequest("x".into()).http_status(), 400);
    }

    #[test]
    fn test_validation_at_carries_field() {
        let err = UploadError::validation_at("REQUIRED", "missing field", "avatar");
        match err {
            UploadError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("avatar")),
            _ => panic!("expected Validation variant"),
        }
    }
}
