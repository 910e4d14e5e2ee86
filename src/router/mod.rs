//! Router: a named map of schemas, owning the single HTTP endpoint shape
//! (`GET` introspection, `POST presign`, `POST complete`).
//!
//! Grounded on `brylix::handler`'s shape of pure async functions taking a
//! `&Config` plus request data and returning a response value — generalized
//! here so the config is `Arc<UploadConfig>` captured once at construction,
//! never a global. A [`Router`] is a thin `Arc`-wrapped handle; cloning it
//! is cheap and safe to share across concurrent requests.

mod protocol;

pub use protocol::{CompletionRequest, CompletionResult, PresignResult, RouteDescriptor, SchemaDescriptor};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::warn;

use crate::config::UploadConfig;
use crate::errors::{UploadError, UploadResult};
use crate::path;
use crate::schema::{
    CompleteContext, ErrorContext, FileDescriptor, FileSchema, Hooks, MiddlewareContext,
    MiddlewareFn, Metadata, PathOverride, Schema, StartContext,
};
use crate::storage::{self, UploadUrlOptions};

const PRESIGN_EXPIRES_SECS: u64 = 3600;
const DOWNLOAD_EXPIRES_SECS: u64 = 3600;

/// One named schema plus the route-level middleware/hooks/path override
/// that apply to it. `FileSchema` also carries its own middleware/hooks/
/// path fields for standalone use; constructing a `Route` from a
/// `FileSchema` lifts them here so the router only has one place to run
/// them from.
#[derive(Clone, Default)]
pub struct Route {
    pub schema: Schema,
    pub middleware: Vec<MiddlewareFn>,
    pub hooks: Hooks,
    pub path_override: Option<PathOverride>,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("schema", &self.schema)
            .field("middleware", &self.middleware.len())
            .field("hooks", &self.hooks)
            .field("path_override", &self.path_override.is_some())
            .finish()
    }
}

impl Route {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            middleware: Vec::new(),
            hooks: Hooks::default(),
            path_override: None,
        }
    }

    #[must_use]
    pub fn middleware(mut self, f: MiddlewareFn) -> Self {
        self.middleware.push(f);
        self
    }

    #[must_use]
    pub fn paths(mut self, overrides: PathOverride) -> Self {
        self.path_override = Some(overrides);
        self
    }
}

impl From<FileSchema> for Route {
    /// Lift a leaf schema's own middleware/hooks/path override up to route
    /// level, so `File(schema)` used directly as a route behaves the same
    /// as wrapping it in `Route::new(...)` by hand.
    fn from(schema: FileSchema) -> Self {
        Route {
            middleware: schema.middleware.clone(),
            hooks: schema.hooks.clone(),
            path_override: schema.path_override.clone(),
            schema: Schema::File(schema),
        }
    }
}

impl From<Schema> for Route {
    fn from(schema: Schema) -> Self {
        match schema {
            Schema::File(fs) => Route::from(fs),
            other => Route::new(other),
        }
    }
}

fn describe(schema: &Schema) -> SchemaDescriptor {
    match schema {
        Schema::File(fs) => SchemaDescriptor::File {
            max_size: fs.max_size.map(|s| s.bytes()),
            allowed_types: fs.allowed_types.clone(),
            is_image: fs.is_image,
        },
        Schema::Object(obj) => SchemaDescriptor::Object {
            fields: obj.fields.keys().cloned().collect(),
        },
        Schema::Array(arr) => SchemaDescriptor::Array {
            max_count: arr.max_count,
        },
    }
}

/// Apply `config.defaults` (`maxFileSize`/`allowedFileTypes`) as a fallback
/// for whichever of those a leaf schema left unset — the per-route schema
/// always wins when it specifies its own constraint.
fn with_config_defaults(leaf: &FileSchema, defaults: &crate::config::Defaults) -> FileSchema {
    let mut merged = leaf.clone();
    if merged.max_size.is_none() {
        merged.max_size = defaults.max_file_size;
    }
    if merged.allowed_types.is_empty() {
        merged.allowed_types = defaults.allowed_file_types.clone();
    }
    merged
}

/// Resolve the leaf `FileSchema` that governs the file at `index` of a
/// `files.len() == total` request. `Schema::Array`'s `maxCount` is checked
/// once against `total`, not per element. The wire protocol carries a flat
/// `FileDescriptor[]`, so `Object` routes validate positionally against
/// their fields in name order.
fn leaf_schema_for(schema: &Schema, index: usize, total: usize) -> UploadResult<&FileSchema> {
    match schema {
        Schema::File(fs) => Ok(fs),
        Schema::Array(arr) => {
            if let Some(max) = arr.max_count {
                if total > max {
                    return Err(UploadError::validation(
                        "ARRAY_TOO_LONG",
                        format!("expected at most {max} files, got {total}"),
                    ));
                }
            }
            match arr.element.as_ref() {
                Schema::File(fs) => Ok(fs),
                _ => Err(UploadError::Config(
                    "array element schema must be a file schema".to_string(),
                )),
            }
        }
        Schema::Object(obj) => {
            let field_name = obj.fields.keys().nth(index).ok_or_else(|| {
                UploadError::validation_at(
                    "REQUIRED",
                    "no schema field at this position",
                    index.to_string(),
                )
            })?;
            match obj.fields.get(field_name) {
                Some(Schema::File(fs)) => Ok(fs),
                _ => Err(UploadError::Config(
                    "object field schema must be a file schema".to_string(),
                )),
            }
        }
    }
}

struct RouterInner {
    config: Arc<UploadConfig>,
    routes: BTreeMap<String, Route>,
}

/// `{ routes, config, handlers: {GET, POST} }` from spec §4.F, minus the
/// HTTP-level `handlers` (see [`crate::handler`], which wraps a `Router`).
#[derive(Clone)]
pub struct Router(Arc<RouterInner>);

impl Router {
    pub fn new(config: Arc<UploadConfig>, routes: impl IntoIterator<Item = (String, Route)>) -> Self {
        Router(Arc::new(RouterInner {
            config,
            routes: routes.into_iter().collect(),
        }))
    }

    pub fn get_route_names(&self) -> Vec<String> {
        self.0.routes.keys().cloned().collect()
    }

    pub fn get_route(&self, name: &str) -> Option<&Route> {
        self.0.routes.get(name)
    }

    /// The config this router was bound to at construction.
    pub fn config(&self) -> &Arc<UploadConfig> {
        &self.0.config
    }

    /// GET introspection payload.
    pub fn describe_routes(&self) -> Vec<RouteDescriptor> {
        self.0
            .routes
            .iter()
            .map(|(name, route)| RouteDescriptor {
                name: name.clone(),
                schema: describe(&route.schema),
            })
            .collect()
    }

    async fn run_middleware(
        middleware: &[MiddlewareFn],
        headers: Arc<http::HeaderMap>,
        files: &[FileDescriptor],
        base_metadata: Metadata,
    ) -> UploadResult<Metadata> {
        let mut metadata = base_metadata;
        for f in middleware {
            let ctx = MiddlewareContext {
                headers: headers.clone(),
                file: None,
                files: Some(files.to_vec()),
                metadata: metadata.clone(),
            };
            let augmented = f(ctx).await.map_err(|e| UploadError::Auth(e.to_string()))?;
            metadata.extend(augmented);
        }
        Ok(metadata)
    }

    fn compose_key(&self, route: &Route, file: &FileDescriptor, metadata: &Metadata) -> UploadResult<String> {
        let global_prefix = self.0.config.paths.prefix.as_deref();
        let route_prefix = route.path_override.as_ref().and_then(|p| p.prefix.as_deref());

        let route_generate = route.path_override.as_ref().and_then(|p| p.generate_key.as_ref());
        let full_path = route.path_override.as_ref().map(|p| p.full_path).unwrap_or(false);

        let tail = if let Some(generate) = route_generate {
            generate(file, metadata)
        } else if let Some(generate) = &self.0.config.paths.generate_key {
            generate(file, metadata)
        } else {
            let user_id = metadata.get("userId").and_then(serde_json::Value::as_str);
            path::default_tail(user_id, Utc::now().timestamp_millis(), &file.name)
        };

        path::compose_key(global_prefix, route_prefix, &tail, full_path)
    }

    /// `POST ?route=<name>&action=presign`. See spec §4.F algorithm.
    pub async fn presign(
        &self,
        route_name: &str,
        headers: Arc<http::HeaderMap>,
        files: Vec<FileDescriptor>,
    ) -> UploadResult<Vec<PresignResult>> {
        let route = self
            .get_route(route_name)
            .ok_or_else(|| UploadError::NotFound(format!("route not found: {route_name}")))?
            .clone();
        let config = self.0.config.clone();

        let auth_header = headers.get(http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
        if config.security.require_auth && auth_header.is_none() {
            return Err(UploadError::Auth("authorization header required".to_string()));
        }

        let caller_key = auth_header.unwrap_or("anonymous");
        if !config.check_rate_limit(caller_key).await {
            return Err(UploadError::RateLimited(format!(
                "rate limit exceeded for route {route_name}"
            )));
        }

        let base_metadata = config.defaults.metadata.clone().unwrap_or_default();
        let metadata = Self::run_middleware(&route.middleware, headers, &files, base_metadata).await?;
        let total = files.len();

        let tasks = files.into_iter().enumerate().map(|(index, file)| {
            let route = route.clone();
            let metadata = metadata.clone();
            let config = config.clone();
            let router = self.clone();
            async move {
                match leaf_schema_for(&route.schema, index, total).and_then(|leaf| {
                    let effective = with_config_defaults(leaf, &config.defaults);
                    effective.validate(&file)?;
                    router.compose_key(&route, &file, &metadata)
                }) {
                    Err(e) => PresignResult {
                        success: false,
                        file,
                        presigned_url: None,
                        key: None,
                        metadata: None,
                        url: None,
                        error: Some(e.to_string()),
                    },
                    Ok(key) => {
                        match storage::generate_presigned_upload_url(
                            &config.provider,
                            &key,
                            UploadUrlOptions {
                                content_type: Some(file.content_type.clone()),
                                expires_in_secs: Some(PRESIGN_EXPIRES_SECS),
                            },
                            Utc::now(),
                        ) {
                            Err(e) => PresignResult {
                                success: false,
                                file,
                                presigned_url: None,
                                key: None,
                                metadata: None,
                                url: None,
                                error: Some(e.to_string()),
                            },
                            Ok(presigned) => {
                                let start_hooks = route.hooks.on_upload_start.iter().chain(&config.hooks.on_upload_start);
                                for hook in start_hooks {
                                    let ctx = StartContext {
                                        file: file.clone(),
                                        metadata: metadata.clone(),
                                    };
                                    if let Err(e) = hook(ctx).await {
                                        warn!(error = %e, route = route_name, "onUploadStart hook failed; ignoring");
                                    }
                                }
                                let url = storage::get_file_url(&config.provider, &key);
                                PresignResult {
                                    success: true,
                                    file,
                                    presigned_url: Some(presigned.url),
                                    key: Some(key),
                                    metadata: Some(metadata.clone()),
                                    url: Some(url),
                                    error: None,
                                }
                            }
                        }
                    }
                }
            }
        });

        Ok(join_all(tasks).await)
    }

    /// `POST ?route=<name>&action=complete`. See spec §4.F algorithm.
    pub async fn complete(
        &self,
        route_name: &str,
        completions: Vec<CompletionRequest>,
    ) -> UploadResult<Vec<CompletionResult>> {
        let route = self
            .get_route(route_name)
            .ok_or_else(|| UploadError::NotFound(format!("route not found: {route_name}")))?
            .clone();
        let config = self.0.config.clone();

        let mut results = Vec::with_capacity(completions.len());
        for entry in completions {
            let complete_ctx = CompleteContext {
                file: entry.file.clone(),
                key: entry.key.clone(),
                url: storage::get_file_url(&config.provider, &entry.key),
                metadata: entry.metadata.clone(),
            };

            let mut hook_error = None;
            let complete_hooks = route.hooks.on_upload_complete.iter().chain(&config.hooks.on_upload_complete);
            for hook in complete_hooks {
                if let Err(e) = hook(complete_ctx.clone()).await {
                    hook_error = Some(e.to_string());
                    break;
                }
            }

            if let Some(error) = hook_error {
                let error_hooks = route.hooks.on_upload_error.iter().chain(&config.hooks.on_upload_error);
                for hook in error_hooks {
                    let ctx = ErrorContext {
                        file: entry.file.clone(),
                        error: error.clone(),
                    };
                    if let Err(e) = hook(ctx).await {
                        warn!(error = %e, route = route_name, "onUploadError hook failed; ignoring");
                    }
                }
                results.push(CompletionResult {
                    success: false,
                    file: entry.file,
                    key: entry.key,
                    url: None,
                    presigned_url: None,
                    metadata: entry.metadata,
                    error: Some(error),
                });
                continue;
            }

            let presigned_url =
                storage::generate_presigned_download_url(&config.provider, &entry.key, DOWNLOAD_EXPIRES_SECS, Utc::now())
                    .ok();

            results.push(CompletionResult {
                success: true,
                file: entry.file,
                key: entry.key.clone(),
                url: Some(storage::get_file_url(&config.provider, &entry.key)),
                presigned_url,
                metadata: entry.metadata,
                error: None,
            });
        }

        Ok(results)
    }
}
