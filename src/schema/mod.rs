//! Fluent, composable file schemas.
//!
//! Variants `{file, image, object, array}` are a discriminated union; every
//! modifier returns a new node rather than mutating through `&mut self` —
//! the same `mut self -> Self` chain shape `brylix::config::ConfigBuilder`
//! uses, generalized so two chains derived from the same base share no
//! mutable state (schema nodes must not alias once built).
//!
//! Middleware/hook chains are plain ordered vectors of type-erased async
//! closures, composed at schema-build time — no class hierarchy.

mod bytesize;

pub use bytesize::ByteSize;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{UploadError, UploadResult};

/// Arbitrary, shallow-mergeable metadata produced by middleware and carried
/// through presign/complete.
pub type Metadata = Map<String, Value>;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Wire shape of one file in a presign request: `{name, size, type}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
}

/// Context passed to a middleware closure: the request, the file(s) being
/// presigned (absent for `complete`-only middleware runs), and metadata
/// accumulated so far.
#[derive(Debug, Clone)]
pub struct MiddlewareContext {
    pub headers: Arc<http::HeaderMap>,
    pub file: Option<FileDescriptor>,
    pub files: Option<Vec<FileDescriptor>>,
    pub metadata: Metadata,
}

/// `{file, metadata}` passed to `onUploadStart`.
#[derive(Debug, Clone)]
pub struct StartContext {
    pub file: FileDescriptor,
    pub metadata: Metadata,
}

/// `{file, key, url, metadata}` passed to `onUploadComplete`.
#[derive(Debug, Clone)]
pub struct CompleteContext {
    pub file: FileDescriptor,
    pub key: String,
    pub url: String,
    pub metadata: Metadata,
}

/// `{file, error}` passed to `onUploadError`, fired when `onUploadComplete`
/// throws for that entry.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub file: FileDescriptor,
    pub error: String,
}

/// An async middleware closure: `ctx -> augmented metadata`. Throwing (an
/// `Err`) rejects the route with `UploadError::Auth`, converted to HTTP 401
/// by the router, by convention.
pub type MiddlewareFn =
    Arc<dyn Fn(MiddlewareContext) -> BoxFuture<UploadResult<Metadata>> + Send + Sync>;

/// An async lifecycle hook closure taking context `T` and returning nothing
/// meaningful on success; errors are handled per-hook-kind by the router.
pub type HookFn<T> = Arc<dyn Fn(T) -> BoxFuture<UploadResult<()>> + Send + Sync>;

/// Per-route hook set, appended to left-to-right as `.on_upload_*()` is
/// called.
#[derive(Clone, Default)]
pub struct Hooks {
    pub on_upload_start: Vec<HookFn<StartContext>>,
    pub on_upload_complete: Vec<HookFn<CompleteContext>>,
    pub on_upload_error: Vec<HookFn<ErrorContext>>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("on_upload_start", &self.on_upload_start.len())
            .field("on_upload_complete", &self.on_upload_complete.len())
            .field("on_upload_error", &self.on_upload_error.len())
            .finish()
    }
}

/// Per-route path overrides (§4.I). `generate_key` may return the *entire*
/// key (the escape hatch) — callers flag that via [`PathOverride::full_path`].
#[derive(Clone, Default)]
pub struct PathOverride {
    pub prefix: Option<String>,
    pub generate_key: Option<Arc<dyn Fn(&FileDescriptor, &Metadata) -> String + Send + Sync>>,
    pub full_path: bool,
}

impl std::fmt::Debug for PathOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathOverride")
            .field("prefix", &self.prefix)
            .field("generate_key", &self.generate_key.is_some())
            .field("full_path", &self.full_path)
            .finish()
    }
}

/// A leaf file schema. `.image()` is this struct with `is_image: true` and
/// `allowed_types` defaulted to `["image/*"]` — kept as one type (not a
/// separate enum variant) so `.types()`/`.formats()` share one validation
/// path; `.formats()` is only meaningful when `is_image` is set.
#[derive(Clone, Debug, Default)]
pub struct FileSchema {
    pub max_size: Option<ByteSize>,
    pub allowed_types: Vec<String>,
    pub is_image: bool,
    pub middleware: Vec<MiddlewareFn>,
    pub hooks: Hooks,
    pub path_override: Option<PathOverride>,
}

impl FileSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image() -> Self {
        Self {
            is_image: true,
            allowed_types: vec!["image/*".to_string()],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn max(mut self, size: impl Into<SizeArg>) -> Self {
        self.max_size = Some(size.into().resolve());
        self
    }

    /// Alias for [`Self::max`], matching the `.maxFileSize()` spelling.
    #[must_use]
    pub fn max_file_size(self, size: impl Into<SizeArg>) -> Self {
        self.max(size)
    }

    #[must_use]
    pub fn types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Image subtypes (`jpeg`, `png`, `webp`); equivalent to `.types()` of
    /// `image/<f>`. Meaningful only when this schema was built via
    /// [`FileSchema::image`].
    #[must_use]
    pub fn formats(mut self, formats: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_types = formats
            .into_iter()
            .map(|f| format!("image/{}", f.into()))
            .collect();
        self
    }

    #[must_use]
    pub fn middleware(mut self, f: MiddlewareFn) -> Self {
        self.middleware.push(f);
        self
    }

    #[must_use]
    pub fn on_upload_start(mut self, f: HookFn<StartContext>) -> Self {
        self.hooks.on_upload_start.push(f);
        self
    }

    #[must_use]
    pub fn on_upload_complete(mut self, f: HookFn<CompleteContext>) -> Self {
        self.hooks.on_upload_complete.push(f);
        self
    }

    #[must_use]
    pub fn on_upload_error(mut self, f: HookFn<ErrorContext>) -> Self {
        self.hooks.on_upload_error.push(f);
        self
    }

    #[must_use]
    pub fn paths(mut self, overrides: PathOverride) -> Self {
        self.path_override = Some(overrides);
        self
    }

    /// Promote this leaf to an [`ArraySchema`] with `self` as the element
    /// schema and `n` as `maxCount`.
    #[must_use]
    pub fn max_files(self, n: usize) -> ArraySchema {
        ArraySchema {
            element: Box::new(Schema::File(self)),
            max_count: Some(n),
        }
    }

    fn type_matches(allowed: &str, actual: &str) -> bool {
        if let Some(prefix) = allowed.strip_suffix("/*") {
            actual
                .split('/')
                .next()
                .map(|a| a == prefix)
                .unwrap_or(false)
        } else {
            allowed == actual
        }
    }

    /// Reject when `type` mismatches `allowedTypes`/`formats`, or
    /// `size > maxSize`.
    pub fn validate(&self, file: &FileDescriptor) -> UploadResult<()> {
        if let Some(max) = self.max_size {
            if file.size > max.bytes() {
                return Err(UploadError::validation(
                    "FILE_TOO_LARGE",
                    format!("{} exceeds the maximum size of {} bytes", file.name, max.bytes()),
                ));
            }
        }
        if !self.allowed_types.is_empty()
            && !self
                .allowed_types
                .iter()
                .any(|allowed| Self::type_matches(allowed, &file.content_type))
        {
            return Err(UploadError::validation(
                "INVALID_TYPE",
                format!("{} has disallowed type {}", file.name, file.content_type),
            ));
        }
        Ok(())
    }
}

/// A field-name -> schema map, validated as a record.
#[derive(Clone, Debug, Default)]
pub struct ObjectSchema {
    pub fields: BTreeMap<String, Schema>,
}

impl ObjectSchema {
    pub fn new(fields: impl IntoIterator<Item = (String, Schema)>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    /// Validate each named field; a missing required field is an error.
    pub fn validate(&self, input: &BTreeMap<String, FileDescriptor>) -> UploadResult<()> {
        for (field_name, schema) in &self.fields {
            match input.get(field_name) {
                None => {
                    return Err(UploadError::validation_at(
                        "REQUIRED",
                        format!("missing required field {field_name}"),
                        field_name.clone(),
                    ))
                }
                Some(file) => {
                    if let Schema::File(file_schema) = schema {
                        file_schema.validate(file).map_err(|e| match e {
                            UploadError::Validation { code, message, .. } => {
                                UploadError::validation_at(code, message, field_name.clone())
                            }
                            other => other,
                        })?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// An element schema plus `maxCount`; promoted from a leaf by `.max_files(n)`.
#[derive(Clone, Debug)]
pub struct ArraySchema {
    pub element: Box<Schema>,
    pub max_count: Option<usize>,
}

impl ArraySchema {
    /// Reject with `ARRAY_TOO_LONG` when `input.len() > maxCount`; validate
    /// each element, failing fast on the first element failure and
    /// reporting its index.
    pub fn validate(&self, input: &[FileDescriptor]) -> UploadResult<()> {
        if let Some(max) = self.max_count {
            if input.len() > max {
                return Err(UploadError::validation(
                    "ARRAY_TOO_LONG",
                    format!("expected at most {max} files, got {}", input.len()),
                ));
            }
        }
        for (index, file) in input.iter().enumerate() {
            if let Schema::File(file_schema) = self.element.as_ref() {
                file_schema.validate(file).map_err(|e| match e {
                    UploadError::Validation { code, message, .. } => {
                        UploadError::validation_at(code, message, index.to_string())
                    }
                    other => other,
                })?;
            }
        }
        Ok(())
    }
}

/// The algebraic schema type: `{file, object, array}` (image is a `File`
/// variant with `is_image` set, see [`FileSchema::image`]).
#[derive(Clone, Debug)]
pub enum Schema {
    File(FileSchema),
    Object(ObjectSchema),
    Array(ArraySchema),
}

impl Default for Schema {
    fn default() -> Self {
        Schema::File(FileSchema::default())
    }
}

/// Accepts either a pre-parsed [`ByteSize`], a raw byte count, or a size
/// string like `"5MB"` at `.max()`/`.max_file_size()` call sites.
pub enum SizeArg {
    Bytes(ByteSize),
    Str(String),
}

impl SizeArg {
    fn resolve(self) -> ByteSize {
        match self {
            SizeArg::Bytes(b) => b,
            SizeArg::Str(s) => s.parse().unwrap_or(ByteSize(0)),
        }
    }
}

impl From<ByteSize> for SizeArg {
    fn from(value: ByteSize) -> Self {
        SizeArg::Bytes(value)
    }
}

impl From<u64> for SizeArg {
    fn from(value: u64) -> Self {
        SizeArg::Bytes(ByteSize(value))
    }
}

impl From<&str> for SizeArg {
    fn from(value: &str) -> Self {
        SizeArg::Str(value.to_string())
    }
}

/// Entry points matching the wire DSL's `s3.file()` / `s3.image()` /
/// `s3.object({...})` spelling.
pub fn file() -> FileSchema {
    FileSchema::new()
}

pub fn image() -> FileSchema {
    FileSchema::image()
}

pub fn object(fields: impl IntoIterator<Item = (String, Schema)>) -> ObjectSchema {
    ObjectSchema::new(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, size: u64, content_type: &str) -> FileDescriptor {
        FileDescriptor {
            name: name.to_string(),
            size,
            content_type: content_type.to_string(),
        }
    }

    #[test]
    fn test_file_schema_rejects_oversize() {
        let schema = file().max("1KB");
        let err = schema
            .validate(&descriptor("a.png", 2048, "image/png"))
            .unwrap_err();
        assert_eq!(err.code(), "FILE_TOO_LARGE");
    }

    #[test]
    fn test_file_schema_accepts_within_size() {
        let schema = file().max("1MB");
        assert!(schema
            .validate(&descriptor("a.png", 1024, "image/png"))
            .is_ok());
    }

    #[test]
    fn test_image_schema_wildcard_match() {
        let schema = image();
        assert!(schema
            .validate(&descriptor("a.png", 10, "image/png"))
            .is_ok());
        let err = schema
            .validate(&descriptor("a.pdf", 10, "application/pdf"))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_TYPE");
    }

    #[test]
    fn test_formats_maps_to_image_subtypes() {
        let schema = image().formats(["jpeg", "png"]);
        assert!(schema
            .validate(&descriptor("a.jpg", 10, "image/jpeg"))
            .is_ok());
        assert!(schema
            .validate(&descriptor("a.webp", 10, "image/webp"))
            .is_err());
    }

    #[test]
    fn test_array_schema_too_long() {
        let array = file().max_files(2);
        let files = vec![
            descriptor("a.png", 1, "image/png"),
            descriptor("b.png", 1, "image/png"),
            descriptor("c.png", 1, "image/png"),
        ];
        let err = array.validate(&files).unwrap_err();
        assert_eq!(err.code(), "ARRAY_TOO_LONG");
    }

    #[test]
    fn test_array_schema_within_limit_validates_elements() {
        let array = image().max(10u64).max_files(3);
        let files = vec![
            descriptor("a.png", 5, "image/png"),
            descriptor("b.png", 500, "image/png"),
        ];
        let err = array.validate(&files).unwrap_err();
        assert_eq!(err.code(), "FILE_TOO_LARGE");
    }

    #[test]
    fn test_object_schema_missing_required_field() {
        let schema = object([("avatar".to_string(), Schema::File(image()))]);
        let input = BTreeMap::new();
        let err = schema.validate(&input).unwrap_err();
        match err {
            UploadError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("avatar")),
            _ => panic!("expected Validation"),
        }
    }

    #[test]
    fn test_object_schema_validates_present_fields() {
        let schema = object([("avatar".to_string(), Schema::File(image().max(10u64)))]);
        let mut input = BTreeMap::new();
        input.insert("avatar".to_string(), descriptor("a.png", 999, "image/png"));
        let err = schema.validate(&input).unwrap_err();
        match err {
            UploadError::Validation { code, field, .. } => {
                assert_eq!(code, "FILE_TOO_LARGE");
                assert_eq!(field.as_deref(), Some("avatar"));
            }
            _ => panic!("expected Validation"),
        }
    }

    #[test]
    fn test_non_mutating_chains_do_not_alias() {
        let base = file().max("1MB");
        let a = base.clone().types(["image/png"]);
        let b = base.clone().types(["application/pdf"]);
        assert_ne!(a.allowed_types, b.allowed_types);
    }
}
