//! `UploadConfigBuilder` — a `brylix::config::ConfigBuilder`-shaped
//! `mut self -> Self` chain ending in `.build()`, generalized so the
//! product is an `Arc`-wrapped value plus config-scoped facades instead of
//! a global singleton.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::Stream;

use super::{Defaults, PathsConfig, SecurityConfig, UploadConfig};
use crate::errors::UploadResult;
use crate::provider::{normalize, ProviderConfig};
use crate::router::{Route, Router};
use crate::schema::Hooks;
use crate::storage::{
    self, DeleteManyResult, DeleteResult, FileInfo, ListFilesOptions, ListFilesPage,
    PresignedUpload, UploadUrlOptions, ValidationOutcome, ValidationRules,
};

/// What `.build()` produces: the frozen config plus two facades that each
/// hold their own `Arc` clone of it.
pub struct Built {
    pub config: Arc<UploadConfig>,
    pub s3: SchemaFactory,
    pub storage: StorageFacade,
}

/// Builds [`Router`]s bound to one config. Distinct [`Built`] values never
/// share a `SchemaFactory` — each clones its own `Arc<UploadConfig>` at
/// `.build()` time.
#[derive(Clone)]
pub struct SchemaFactory {
    config: Arc<UploadConfig>,
}

impl SchemaFactory {
    /// Build a [`Router`] over `routes`, bound to this factory's config.
    pub fn router(&self, routes: impl IntoIterator<Item = (String, Route)>) -> Router {
        Router::new(self.config.clone(), routes)
    }

    pub fn config(&self) -> &Arc<UploadConfig> {
        &self.config
    }
}

/// Storage operations pre-bound to one config's provider, so callers don't
/// thread `&SigningConfig` through every call site.
#[derive(Clone)]
pub struct StorageFacade {
    config: Arc<UploadConfig>,
}

impl StorageFacade {
    pub fn presign_upload_url(
        &self,
        key: &str,
        options: UploadUrlOptions,
    ) -> UploadResult<PresignedUpload> {
        storage::generate_presigned_upload_url(&self.config.provider, key, options, Utc::now())
    }

    pub fn presign_download_url(&self, key: &str, expires_in_secs: u64) -> UploadResult<String> {
        storage::generate_presigned_download_url(
            &self.config.provider,
            key,
            expires_in_secs,
            Utc::now(),
        )
    }

    pub fn file_url(&self, key: &str) -> String {
        storage::get_file_url(&self.config.provider, key)
    }

    pub async fn exists(&self, key: &str) -> UploadResult<bool> {
        storage::check_file_exists(&self.config.provider, key, Utc::now()).await
    }

    pub async fn info(&self, key: &str) -> UploadResult<Option<FileInfo>> {
        storage::get_file_info(&self.config.provider, key, Utc::now()).await
    }

    pub async fn delete(&self, key: &str) -> UploadResult<DeleteResult> {
        storage::delete_file(&self.config.provider, key, Utc::now()).await
    }

    pub async fn delete_many(&self, keys: &[String]) -> UploadResult<DeleteManyResult> {
        storage::delete_files(&self.config.provider, keys, Utc::now()).await
    }

    pub async fn list(&self, options: ListFilesOptions) -> UploadResult<ListFilesPage> {
        storage::list_files(&self.config.provider, options, Utc::now()).await
    }

    pub fn list_stream(
        &self,
        options: ListFilesOptions,
    ) -> impl Stream<Item = UploadResult<ListFilesPage>> + '_ {
        storage::list_files_stream(&self.config.provider, options, Utc::now())
    }

    pub async fn validate(
        &self,
        key: &str,
        rules: ValidationRules,
    ) -> UploadResult<ValidationOutcome> {
        storage::validate_file(&self.config.provider, key, rules, Utc::now()).await
    }
}

/// Fluent builder for [`UploadConfig`]. Every setter takes and returns
/// `Self` by value, same chain shape as `brylix::config::ConfigBuilder`.
#[derive(Default)]
pub struct UploadConfigBuilder {
    provider: Option<ProviderConfig>,
    defaults: Defaults,
    paths: PathsConfig,
    security: SecurityConfig,
    hooks: Hooks,
}

impl UploadConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    #[must_use]
    pub fn paths(mut self, paths: PathsConfig) -> Self {
        self.paths = paths;
        self
    }

    #[must_use]
    pub fn security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    #[must_use]
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Normalize the provider config and freeze everything into an `Arc`.
    ///
    /// # Errors
    /// Returns an error if no provider was set, or if the provider's own
    /// fields fail [`normalize`]'s validation (e.g. an empty bucket).
    pub fn build(self) -> UploadResult<Built> {
        let provider = self.provider.ok_or_else(|| {
            crate::errors::UploadError::Config("a provider must be set before build()".to_string())
        })?;
        let signing = normalize(&provider)?;
        let config = Arc::new(UploadConfig::new(
            signing,
            self.defaults,
            self.paths,
            self.security,
            self.hooks,
        ));

        Ok(Built {
            config: config.clone(),
            s3: SchemaFactory {
                config: config.clone(),
            },
            storage: StorageFacade { config },
        })
    }
}
