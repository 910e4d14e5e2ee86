//! Configuration management: `provider → defaults → paths → security →
//! hooks → build`, producing a frozen [`UploadConfig`] plus config-scoped
//! `s3`/`storage` facades.
//!
//! [`UploadConfig`] is `Arc`-wrapped once built rather than a process-wide
//! singleton (`brylix::config::Config` keeps its instance behind a
//! `static OnceLock<Config>`; this crate deliberately doesn't) — two
//! distinct builds never alias. [`SchemaFactory`] and [`StorageFacade`]
//! each hold their own `Arc<UploadConfig>` clone, which is what makes two
//! builds' factories independent without any crate-level `static`.

mod builder;

pub use builder::{Built, SchemaFactory, StorageFacade, UploadConfigBuilder};

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::provider::SigningConfig;
use crate::schema::{ByteSize, FileDescriptor, Hooks, Metadata};

/// `{maxFileSize?, allowedFileTypes?, acl?, metadata?}`.
#[derive(Clone, Debug, Default)]
pub struct Defaults {
    pub max_file_size: Option<ByteSize>,
    pub allowed_file_types: Vec<String>,
    pub acl: Option<String>,
    pub metadata: Option<Metadata>,
}

/// `{prefix?, generateKey?(file, metadata) -> tail}`, applied when a route
/// doesn't override its own [`crate::schema::PathOverride`].
#[derive(Clone, Default)]
pub struct PathsConfig {
    pub prefix: Option<String>,
    pub generate_key: Option<Arc<dyn Fn(&FileDescriptor, &Metadata) -> String + Send + Sync>>,
}

impl std::fmt::Debug for PathsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathsConfig")
            .field("prefix", &self.prefix)
            .field("generate_key", &self.generate_key.is_some())
            .finish()
    }
}

/// `{maxUploads, windowMs}`.
#[derive(Clone, Copy, Debug)]
pub struct RateLimiting {
    pub max_uploads: u32,
    pub window_ms: u64,
}

/// `{requireAuth?, allowedOrigins?, rateLimiting?}`.
#[derive(Clone, Debug, Default)]
pub struct SecurityConfig {
    pub require_auth: bool,
    pub allowed_origins: Vec<String>,
    pub rate_limiting: Option<RateLimiting>,
}

struct RateWindow {
    count: u32,
    window_start: Instant,
}

/// Immutable once built. Rate-limit state lives here, per-config, behind a
/// `tokio::sync::Mutex` rather than a crate-level `static`, so two configs
/// never share buckets — a best-effort, single-process counter, not a
/// cluster-wide limiter.
pub struct UploadConfig {
    pub provider: SigningConfig,
    pub defaults: Defaults,
    pub paths: PathsConfig,
    pub security: SecurityConfig,
    pub hooks: Hooks,
    rate_limit_state: Mutex<HashMap<String, RateWindow>>,
}

impl std::fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadConfig")
            .field("provider", &self.provider)
            .field("defaults", &self.defaults)
            .field("paths", &self.paths)
            .field("security", &self.security)
            .finish_non_exhaustive()
    }
}

impl UploadConfig {
    fn new(
        provider: SigningConfig,
        defaults: Defaults,
        paths: PathsConfig,
        security: SecurityConfig,
        hooks: Hooks,
    ) -> Self {
        Self {
            provider,
            defaults,
            paths,
            security,
            hooks,
            rate_limit_state: Mutex::new(HashMap::new()),
        }
    }

    /// Best-effort, in-process rate check for `caller_key` (an IP or user
    /// id). Returns `true` if the caller is still within its window;
    /// always `true` when `security.rate_limiting` is unset.
    pub async fn check_rate_limit(&self, caller_key: &str) -> bool {
        let Some(rule) = self.security.rate_limiting else {
            return true;
        };
        let mut state = self.rate_limit_state.lock().await;
        let now = Instant::now();
        let window = state.entry(caller_key.to_string()).or_insert(RateWindow {
            count: 0,
            window_start: now,
        });

        if now.duration_since(window.window_start).as_millis() as u64 >= rule.window_ms {
            window.count = 0;
            window.window_start = now;
        }

        if window.count >= rule.max_uploads {
            false
        } else {
            window.count += 1;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{normalize, AwsConfig, ProviderConfig};

    fn aws_signing() -> SigningConfig {
        normalize(&ProviderConfig::Aws(AwsConfig {
            access_key_id: "k".into(),
            secret_access_key: "s".into(),
            region: "us-east-1".into(),
            bucket: "b".into(),
            endpoint: None,
            force_path_style: None,
            custom_domain: None,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_rate_limit_allows_up_to_max() {
        let config = UploadConfig::new(
            aws_signing(),
            Defaults::default(),
            PathsConfig::default(),
            SecurityConfig {
                rate_limiting: Some(RateLimiting {
                    max_uploads: 2,
                    window_ms: 60_000,
                }),
                ..SecurityConfig::default()
            },
            Hooks::default(),
        );
        assert!(config.check_rate_limit("ip1").await);
        assert!(config.check_rate_limit("ip1").await);
        assert!(!config.check_rate_limit("ip1").await);
    }

    #[tokio::test]
    async fn test_rate_limit_is_per_caller() {
        let config = UploadConfig::new(
            aws_signing(),
            Defaults::default(),
            PathsConfig::default(),
            SecurityConfig {
                rate_limiting: Some(RateLimiting {
                    max_uploads: 1,
                    window_ms: 60_000,
                }),
                ..SecurityConfig::default()
            },
            Hooks::default(),
        );
        assert!(config.check_rate_limit("ip1").await);
        assert!(config.check_rate_limit("ip2").await);
    }

    #[tokio::test]
    async fn test_no_rate_limiting_configured_always_allows() {
        let config = UploadConfig::new(
            aws_signing(),
            Defaults::default(),
            PathsConfig::default(),
            SecurityConfig::default(),
            Hooks::default(),
        );
        for _ in 0..100 {
            assert!(config.check_rate_limit("anyone").await);
        }
    }
}
