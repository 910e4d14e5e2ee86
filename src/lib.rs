//! # upload-router
//!
//! A library that orchestrates direct-to-object-storage uploads between a
//! browser client and an S3-compatible backend (AWS S3, Cloudflare R2,
//! DigitalOcean Spaces, MinIO, Google Cloud Storage, and generic
//! S3-compatible endpoints). The server never proxies file bytes: it signs
//! short-lived presigned URLs, validates each request against a
//! declarative schema, invokes user lifecycle hooks, and returns results to
//! the client, which then PUTs bytes directly to the object store.
//!
//! ## Quick start
//!
//! ```rust
//! use upload_router::prelude::*;
//!
//! # fn main() -> UploadResult<()> {
//! let built = UploadConfigBuilder::new()
//!     .provider(ProviderConfig::Aws(AwsConfig {
//!         access_key_id: "AKIA...".into(),
//!         secret_access_key: "secret".into(),
//!         region: "us-east-1".into(),
//!         bucket: "my-bucket".into(),
//!         endpoint: None,
//!         force_path_style: None,
//!         custom_domain: None,
//!     }))
//!     .build()?;
//!
//! let router = built.s3.router([
//!     ("imageUpload".to_string(), Route::from(image().max("5MB"))),
//! ]);
//! let handlers = Handlers::new(router);
//! # let _ = handlers;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module overview
//!
//! - [`errors`] — the unified [`errors::UploadError`] type and its wire codes
//! - [`provider`] — normalizes the six supported backends into a [`provider::SigningConfig`]
//! - [`signer`] — AWS SigV4 request signing and presigned URL generation
//! - [`path`] — deterministic object-key composition and sanitization
//! - [`schema`] — the declarative file/object/array schema DSL
//! - [`storage`] — the Storage Client (presign, list, head, delete)
//! - [`config`] — `UploadConfigBuilder` and the frozen `UploadConfig`
//! - [`router`] — the named-route `Router` and its presign/complete protocol
//! - [`handler`] — the web-standard `{GET, POST}` dispatcher (+ `axum` adapter)

pub mod config;
pub mod errors;
pub mod handler;
pub mod path;
pub mod provider;
pub mod router;
pub mod schema;
pub mod signer;
pub mod storage;

pub mod prelude;

pub use config::{UploadConfig, UploadConfigBuilder};
pub use errors::{UploadError, UploadResult};
pub use router::Router;
