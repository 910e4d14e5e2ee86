//! Provider registry: normalizes the six supported backends into one
//! signing-ready configuration.
//!
//! This module is a pure translator — [`normalize`] takes a
//! [`ProviderConfig`] and produces a [`SigningConfig`] the [`crate::signer`]
//! and [`crate::storage`] modules consume. No I/O, no globals; every rule
//! here is the table in spec §4.B made concrete.
//!
//! # Usage
//!
//! ```rust
//! use upload_router::provider::{ProviderConfig, AwsConfig, normalize};
//!
//! let cfg = ProviderConfig::Aws(AwsConfig {
//!     access_key_id: "AKIA...".into(),
//!     secret_access_key: "secret".into(),
//!     region: "us-east-1".into(),
//!     bucket: "my-bucket".into(),
//!     endpoint: None,
//!     force_path_style: None,
//!     custom_domain: None,
//! });
//! let signing = normalize(&cfg).unwrap();
//! assert_eq!(signing.endpoint, "https://s3.us-east-1.amazonaws.com");
//! ```

use crate::errors::{UploadError, UploadResult};

/// Credentials used to sign requests. Never logged or serialized.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .finish()
    }
}

/// AWS S3 provider configuration.
#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
    /// Override the default `s3.<region>.amazonaws.com` endpoint.
    pub endpoint: Option<String>,
    pub force_path_style: Option<bool>,
    pub custom_domain: Option<String>,
}

/// Cloudflare R2 provider configuration. No `region` field on purpose —
/// R2's region is always `"auto"`, so there is nothing to normalize wrong.
#[derive(Debug, Clone)]
pub struct R2Config {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub account_id: String,
    pub bucket: String,
    pub custom_domain: Option<String>,
}

/// DigitalOcean Spaces provider configuration.
#[derive(Debug, Clone)]
pub struct SpacesConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
    pub custom_domain: Option<String>,
}

/// MinIO provider configuration. `endpoint` and `use_ssl` are required —
/// MinIO has no well-known default host.
#[derive(Debug, Clone)]
pub struct MinIoConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
    pub endpoint: String,
    pub use_ssl: bool,
    pub custom_domain: Option<String>,
}

/// Generic S3-compatible provider configuration (same shape as MinIO, but
/// path style defaults to `true` rather than being fixed).
#[derive(Debug, Clone)]
pub struct CompatibleConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
    pub endpoint: String,
    pub force_path_style: Option<bool>,
    pub custom_domain: Option<String>,
}

/// Google Cloud Storage, accessed through its S3-interoperability API.
#[derive(Debug, Clone)]
pub struct GcsConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub custom_domain: Option<String>,
}

/// Tagged union of the six supported storage backends.
///
/// Invariant: `bucket` is non-empty and credentials are non-empty for
/// every variant; [`normalize`] rejects configs that violate this.
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Aws(AwsConfig),
    R2(R2Config),
    Spaces(SpacesConfig),
    MinIo(MinIoConfig),
    Gcs(GcsConfig),
    Compatible(CompatibleConfig),
}

/// The normalized, signing-ready configuration every backend is reduced to.
///
/// This is what [`crate::signer`] and [`crate::storage`] operate on; they
/// never match on [`ProviderConfig`] directly.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    /// Scheme + host, no trailing slash, e.g. `https://s3.us-east-1.amazonaws.com`.
    pub endpoint: String,
    pub bucket: String,
    /// SigV4 region; `"auto"` for R2.
    pub region: String,
    /// Path-style (`endpoint/bucket/key`) vs virtual-hosted (`bucket.endpoint/key`).
    pub force_path_style: bool,
    /// CDN front for public reads. Never used for S3 API calls — see
    /// `crate::storage::get_file_url`, the only function that honors it.
    pub custom_domain: Option<String>,
    pub credentials: Credentials,
}

impl SigningConfig {
    /// The host the signer signs against: `bucket.host` (virtual-hosted) or
    /// just `host` (path-style, bucket goes in the path instead).
    pub fn signing_host(&self) -> String {
        let host = self
            .endpoint
            .strip_prefix("https://")
            .or_else(|| self.endpoint.strip_prefix("http://"))
            .unwrap_or(&self.endpoint);
        if self.force_path_style {
            host.to_string()
        } else {
            format!("{}.{}", self.bucket, host)
        }
    }

    /// Base URL (scheme + signing host) a key is resolved against for S3 API
    /// calls — presigned PUT/GET, list/head/delete. Never the custom domain.
    pub fn api_base_url(&self) -> String {
        let scheme = if self.endpoint.starts_with("http://") { "http" } else { "https" };
        format!("{}://{}", scheme, self.signing_host())
    }
}

fn require_nonempty(value: &str, field: &str) -> UploadResult<()> {
    if value.trim().is_empty() {
        return Err(UploadError::Config(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Normalize any [`ProviderConfig`] variant into a [`SigningConfig`].
///
/// Pure and deterministic — no I/O, no env lookups (those happen in the
/// `*_from_env` constructors, one layer up). See spec §4.B for the endpoint
/// defaults and path-style defaults this function encodes.
pub fn normalize(cfg: &ProviderConfig) -> UploadResult<SigningConfig> {
    match cfg {
        ProviderConfig::Aws(c) => {
            require_nonempty(&c.access_key_id, "accessKeyId")?;
            require_nonempty(&c.secret_access_key, "secretAccessKey")?;
            require_nonempty(&c.bucket, "bucket")?;
            require_nonempty(&c.region, "region")?;
            let endpoint = c
                .endpoint
                .clone()
                .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", c.region));
            Ok(SigningConfig {
                endpoint,
                bucket: c.bucket.clone(),
                region: c.region.clone(),
                force_path_style: c.force_path_style.unwrap_or(false),
                custom_domain: c.custom_domain.clone(),
                credentials: Credentials {
                    access_key_id: c.access_key_id.clone(),
                    secret_access_key: c.secret_access_key.clone(),
                },
            })
        }
        ProviderConfig::R2(c) => {
            require_nonempty(&c.access_key_id, "accessKeyId")?;
            require_nonempty(&c.secret_access_key, "secretAccessKey")?;
            require_nonempty(&c.bucket, "bucket")?;
            require_nonempty(&c.account_id, "accountId")?;
            Ok(SigningConfig {
                endpoint: format!("https://{}.r2.cloudflarestorage.com", c.account_id),
                bucket: c.bucket.clone(),
                region: "auto".to_string(),
                force_path_style: false,
                custom_domain: c.custom_domain.clone(),
                credentials: Credentials {
                    access_key_id: c.access_key_id.clone(),
                    secret_access_key: c.secret_access_key.clone(),
                },
            })
        }
        ProviderConfig::Spaces(c) => {
            require_nonempty(&c.access_key_id, "accessKeyId")?;
            require_nonempty(&c.secret_access_key, "secretAccessKey")?;
            require_nonempty(&c.bucket, "bucket")?;
            require_nonempty(&c.region, "region")?;
            Ok(SigningConfig {
                endpoint: format!("https://{}.digitaloceanspaces.com", c.region),
                bucket: c.bucket.clone(),
                region: c.region.clone(),
                force_path_style: false,
                custom_domain: c.custom_domain.clone(),
                credentials: Credentials {
                    access_key_id: c.access_key_id.clone(),
                    secret_access_key: c.secret_access_key.clone(),
                },
            })
        }
        ProviderConfig::MinIo(c) => {
            require_nonempty(&c.access_key_id, "accessKeyId")?;
            require_nonempty(&c.secret_access_key, "secretAccessKey")?;
            require_nonempty(&c.bucket, "bucket")?;
            require_nonempty(&c.endpoint, "endpoint")?;
            let scheme = if c.use_ssl { "https" } else { "http" };
            let host = c
                .endpoint
                .trim_start_matches("http://")
                .trim_start_matches("https://");
            Ok(SigningConfig {
                endpoint: format!("{scheme}://{host}"),
                bucket: c.bucket.clone(),
                region: if c.region.is_empty() { "us-east-1".to_string() } else { c.region.clone() },
                force_path_style: true,
                custom_domain: c.custom_domain.clone(),
                credentials: Credentials {
                    access_key_id: c.access_key_id.clone(),
                    secret_access_key: c.secret_access_key.clone(),
                },
            })
        }
        ProviderConfig::Compatible(c) => {
            require_nonempty(&c.access_key_id, "accessKeyId")?;
            require_nonempty(&c.secret_access_key, "secretAccessKey")?;
            require_nonempty(&c.bucket, "bucket")?;
            require_nonempty(&c.endpoint, "endpoint")?;
            Ok(SigningConfig {
                endpoint: c.endpoint.trim_end_matches('/').to_string(),
                bucket: c.bucket.clone(),
                region: if c.region.is_empty() { "us-east-1".to_string() } else { c.region.clone() },
                force_path_style: c.force_path_style.unwrap_or(true),
                custom_domain: c.custom_domain.clone(),
                credentials: Credentials {
                    access_key_id: c.access_key_id.clone(),
                    secret_access_key: c.secret_access_key.clone(),
                },
            })
        }
        ProviderConfig::Gcs(c) => {
            require_nonempty(&c.access_key_id, "accessKeyId")?;
            require_nonempty(&c.secret_access_key, "secretAccessKey")?;
            require_nonempty(&c.bucket, "bucket")?;
            Ok(SigningConfig {
                endpoint: "https://storage.googleapis.com".to_string(),
                bucket: c.bucket.clone(),
                region: "auto".to_string(),
                force_path_style: true,
                custom_domain: c.custom_domain.clone(),
                credentials: Credentials {
                    access_key_id: c.access_key_id.clone(),
                    secret_access_key: c.secret_access_key.clone(),
                },
            })
        }
    }
}

/// Read an AWS provider config from the standard environment variables
/// (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_REGION`, `S3_BUCKET`,
/// plus the optional overrides listed in spec §6). Mirrors the
/// `env::var(...).map_err(...)` style `brylix::config::Config::from_env` uses.
pub fn aws_config_from_env() -> UploadResult<AwsConfig> {
    use std::env;
    let missing = |name: &str| UploadError::Config(format!("{name} must be set"));
    Ok(AwsConfig {
        access_key_id: env::var("AWS_ACCESS_KEY_ID").map_err(|_| missing("AWS_ACCESS_KEY_ID"))?,
        secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| missing("AWS_SECRET_ACCESS_KEY"))?,
        region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        bucket: env::var("S3_BUCKET").map_err(|_| missing("S3_BUCKET"))?,
        endpoint: env::var("S3_ENDPOINT").ok(),
        force_path_style: env::var("S3_FORCE_PATH_STYLE").ok().map(|v| v == "true"),
        custom_domain: env::var("S3_CUSTOM_DOMAIN").ok(),
    })
}

/// Read an R2 provider config from the environment, sharing the same
/// credential variables as [`aws_config_from_env`] (R2 uses the same
/// access-key/secret-key shape as AWS) plus `R2_ACCOUNT_ID`.
pub fn r2_config_from_env() -> UploadResult<R2Config> {
    use std::env;
    let missing = |name: &str| UploadError::Config(format!("{name} must be set"));
    Ok(R2Config {
        access_key_id: env::var("AWS_ACCESS_KEY_ID").map_err(|_| missing("AWS_ACCESS_KEY_ID"))?,
        secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| missing("AWS_SECRET_ACCESS_KEY"))?,
        account_id: env::var("R2_ACCOUNT_ID").map_err(|_| missing("R2_ACCOUNT_ID"))?,
        bucket: env::var("S3_BUCKET").map_err(|_| missing("S3_BUCKET"))?,
        custom_domain: env::var("S3_CUSTOM_DOMAIN").ok(),
    })
}

/// Read a generic S3-compatible (or MinIO-shaped) provider config from the
/// environment. `S3_ENDPOINT` is mandatory here, unlike [`aws_config_from_env`].
pub fn compatible_config_from_env() -> UploadResult<CompatibleConfig> {
    use std::env;
    let missing = |name: &str| UploadError::Config(format!("{name} must be set"));
    Ok(CompatibleConfig {
        access_key_id: env::var("AWS_ACCESS_KEY_ID").map_err(|_| missing("AWS_ACCESS_KEY_ID"))?,
        secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| missing("AWS_SECRET_ACCESS_KEY"))?,
        region: env::var("AWS_REGION").unwrap_or_default(),
        bucket: env::var("S3_BUCKET").map_err(|_| missing("S3_BUCKET"))?,
        endpoint: env::var("S3_ENDPOINT").map_err(|_| missing("S3_ENDPOINT"))?,
        force_path_style: env::var("S3_FORCE_PATH_STYLE").ok().map(|v| v == "true"),
        custom_domain: env::var("S3_CUSTOM_DOMAIN").ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aws(region: &str) -> ProviderConfig {
        ProviderConfig::Aws(AwsConfig {
            access_key_id: "AKIA".into(),
            secret_access_key: "secret".into(),
            region: region.into(),
            bucket: "b".into(),
            endpoint: None,
            force_path_style: None,
            custom_domain: None,
        })
    }

    #[test]
    fn test_aws_default_endpoint_virtual_hosted() {
        let signing = normalize(&aws("us-east-1")).unwrap();
        assert_eq!(signing.endpoint, "https://s3.us-east-1.amazonaws.com");
        assert!(!signing.force_path_style);
        assert_eq!(signing.signing_host(), "b.s3.us-east-1.amazonaws.com");
    }

    #[test]
    fn test_r2_forces_auto_region_and_account_host() {
        let cfg = ProviderConfig::R2(R2Config {
            access_key_id: "k".into(),
            secret_access_key: "s".into(),
            account_id: "abc123".into(),
            bucket: "bucket-2".into(),
            custom_domain: None,
        });
        let signing = normalize(&cfg).unwrap();
        assert_eq!(signing.region, "auto");
        assert_eq!(signing.endpoint, "https://abc123.r2.cloudflarestorage.com");
        assert_eq!(signing.signing_host(), "bucket-2.abc123.r2.cloudflarestorage.com");
    }

    #[test]
    fn test_minio_defaults_to_path_style() {
        let cfg = ProviderConfig::MinIo(MinIoConfig {
            access_key_id: "k".into(),
            secret_access_key: "s".into(),
            region: "".into(),
            bucket: "b".into(),
            endpoint: "minio.local:9000".into(),
            use_ssl: false,
            custom_domain: None,
        });
        let signing = normalize(&cfg).unwrap();
        assert!(signing.force_path_style);
        assert_eq!(signing.endpoint, "http://minio.local:9000");
        assert_eq!(signing.signing_host(), "minio.local:9000");
    }

    #[test]
    fn test_gcs_uses_interop_endpoint_and_path_style() {
        let cfg = ProviderConfig::Gcs(GcsConfig {
            access_key_id: "k".into(),
            secret_access_key: "s".into(),
            bucket: "b".into(),
            custom_domain: None,
        });
        let signing = normalize(&cfg).unwrap();
        assert_eq!(signing.endpoint, "https://storage.googleapis.com");
        assert!(signing.force_path_style);
    }

    #[test]
    fn test_empty_bucket_rejected() {
        let mut cfg = match aws("us-east-1") {
            ProviderConfig::Aws(c) => c,
            _ => unreachable!(),
        };
        cfg.bucket = String::new();
        let result = normalize(&ProviderConfig::Aws(cfg));
        assert!(matches!(result, Err(UploadError::Config(_))));
    }

    #[test]
    fn test_api_base_url_never_uses_custom_domain() {
        let mut cfg = match aws("us-east-1") {
            ProviderConfig::Aws(c) => c,
            _ => unreachable!(),
        };
        cfg.custom_domain = Some("https://cdn.example.com".into());
        let signing = normalize(&ProviderConfig::Aws(cfg)).unwrap();
        assert!(signing.api_base_url().contains("amazonaws.com"));
        assert!(!signing.api_base_url().contains("cdn.example.com"));
    }
}
