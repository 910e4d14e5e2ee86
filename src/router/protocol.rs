//! Wire-protocol result and introspection types for the Router (§4.F).
//! `FileDescriptor` itself lives in [`crate::schema`] — it's shared between
//! the schema DSL and the request body here.

use serde::Serialize;

use crate::schema::{FileDescriptor, Metadata};

/// A redacted view of one route's schema, returned by `GET` introspection.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SchemaDescriptor {
    File {
        #[serde(rename = "maxSize")]
        max_size: Option<u64>,
        #[serde(rename = "allowedTypes")]
        allowed_types: Vec<String>,
        #[serde(rename = "isImage")]
        is_image: bool,
    },
    Object {
        fields: Vec<String>,
    },
    Array {
        #[serde(rename = "maxCount")]
        max_count: Option<usize>,
    },
}

/// `{ name, schema }` — one entry of the `GET` introspection response.
#[derive(Debug, Clone, Serialize)]
pub struct RouteDescriptor {
    pub name: String,
    pub schema: SchemaDescriptor,
}

/// Body of one entry in `POST ?action=complete`'s `completions` array.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub key: String,
    pub file: FileDescriptor,
    pub metadata: Metadata,
}

/// Per-file result of `POST ?action=presign`.
#[derive(Debug, Clone, Serialize)]
pub struct PresignResult {
    pub success: bool,
    pub file: FileDescriptor,
    #[serde(rename = "presignedUrl", skip_serializing_if = "Option::is_none")]
    pub presigned_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-entry result of `POST ?action=complete`.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResult {
    pub success: bool,
    pub file: FileDescriptor,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "presignedUrl", skip_serializing_if = "Option::is_none")]
    pub presigned_url: Option<String>,
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
