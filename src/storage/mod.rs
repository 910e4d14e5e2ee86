//! Storage Client: presign upload/download URLs; list, head, delete
//! objects; apply custom-domain policy.
//!
//! Every function here is a pure `(config, …) -> Result<…>` call — no
//! hidden singletons, grounded on the "pure functions taking a config"
//! shape `brylix::handler` closures use for `Config`, generalized so the
//! config is a parameter rather than captured from a global. Network calls
//! go over `reqwest` (`rust-s3`'s choice for the same operations); list
//! responses are parsed with `quick-xml` (see [`xml`]).

mod xml;

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};

use crate::errors::{UploadError, UploadResult};
use crate::provider::SigningConfig;
use crate::schema::Metadata;
use crate::signer::{self, Method};

const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Result of a successful presign: the URL, the key it was issued for, and
/// its expiry.
#[derive(Debug, Clone)]
pub struct PresignedUpload {
    pub url: String,
    pub key: String,
    pub expires_at: DateTime<Utc>,
}

/// `{key, url, size, contentType, lastModified, etag, metadata?}`.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub key: String,
    pub url: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub etag: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Parameters for [`generate_presigned_upload_url`].
#[derive(Debug, Clone, Default)]
pub struct UploadUrlOptions {
    pub content_type: Option<String>,
    pub expires_in_secs: Option<u64>,
}

fn reqwest_client() -> UploadResult<reqwest::Client> {
    reqwest::Client::builder()
        .build()
        .map_err(UploadError::Network)
}

/// The URL uses the S3 endpoint, never `customDomain` — custom domains are
/// CDN fronts and cannot accept S3 API PUTs.
pub fn generate_presigned_upload_url(
    config: &SigningConfig,
    key: &str,
    options: UploadUrlOptions,
    now: DateTime<Utc>,
) -> UploadResult<PresignedUpload> {
    let expires_in = options.expires_in_secs.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    let presigned = signer::presign(
        config,
        Method::Put,
        key,
        expires_in,
        now,
        options.content_type.as_deref(),
    )?;
    Ok(PresignedUpload {
        url: presigned.url,
        key: key.to_string(),
        expires_at: presigned.expires_at,
    })
}

/// Also uses the S3 endpoint, never `customDomain`.
pub fn generate_presigned_download_url(
    config: &SigningConfig,
    key: &str,
    expires_in_secs: u64,
    now: DateTime<Utc>,
) -> UploadResult<String> {
    Ok(signer::presign(config, Method::Get, key, expires_in_secs, now, None)?.url)
}

/// Public URL for a key. Uses `customDomain` if set (trailing slash
/// normalized), else the provider's virtual-hosted/path-style S3 URL. This
/// is the only function that honors `customDomain`.
pub fn get_file_url(config: &SigningConfig, key: &str) -> String {
    match &config.custom_domain {
        Some(domain) => format!("{}/{key}", domain.trim_end_matches('/')),
        None => format!("{}/{key}", config.api_base_url()),
    }
}

async fn head_object(
    client: &reqwest::Client,
    config: &SigningConfig,
    key: &str,
    now: DateTime<Utc>,
) -> UploadResult<reqwest::Response> {
    let payload_hash = signer::empty_payload_hash();
    let headers = signer::sign_request(config, Method::Head, key, &[], &payload_hash, now)?;
    let url = format!("{}{}", config.api_base_url(), signed_object_path(config, key));

    let mut request = client.head(&url);
    for (name, value) in headers {
        request = request.header(name, value);
    }
    request.send().await.map_err(UploadError::Network)
}

fn signed_object_path(config: &SigningConfig, key: &str) -> String {
    if config.force_path_style {
        format!("/{}/{key}", config.bucket)
    } else {
        format!("/{key}")
    }
}

/// `HEAD` the object; returns whether it exists. 404 is `Ok(false)`, any
/// other non-success status is a `Provider` error.
pub async fn check_file_exists(
    config: &SigningConfig,
    key: &str,
    now: DateTime<Utc>,
) -> UploadResult<bool> {
    let client = reqwest_client()?;
    let response = head_object(&client, config, key, now).await?;
    match response.status().as_u16() {
        200..=299 => Ok(true),
        404 => Ok(false),
        status => Err(UploadError::Provider {
            status,
            message: "HEAD request failed".to_string(),
        }),
    }
}

/// `HEAD` the object and translate response headers into a [`FileInfo`].
pub async fn get_file_info(
    config: &SigningConfig,
    key: &str,
    now: DateTime<Utc>,
) -> UploadResult<Option<FileInfo>> {
    let client = reqwest_client()?;
    let response = head_object(&client, config, key, now).await?;
    if response.status().as_u16() == 404 {
        return Ok(None);
    }
    if !response.status().is_success() {
        return Err(UploadError::Provider {
            status: response.status().as_u16(),
            message: "HEAD request failed".to_string(),
        });
    }

    let headers = response.headers().clone();
    let size = headers
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let content_type = headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let etag = headers
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let last_modified = headers
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);

    Ok(Some(FileInfo {
        key: key.to_string(),
        url: get_file_url(config, key),
        size,
        content_type,
        last_modified,
        etag,
        metadata: None,
    }))
}

/// Result of [`delete_file`].
#[derive(Debug, Clone)]
pub struct DeleteResult {
    pub success: bool,
}

/// `DELETE` the object. S3 returns success even for keys that never
/// existed, so this reports the backend's own idempotent semantics.
pub async fn delete_file(
    config: &SigningConfig,
    key: &str,
    now: DateTime<Utc>,
) -> UploadResult<DeleteResult> {
    let client = reqwest_client()?;
    let payload_hash = signer::empty_payload_hash();
    let headers = signer::sign_request(config, Method::Delete, key, &[], &payload_hash, now)?;
    let url = format!("{}{}", config.api_base_url(), signed_object_path(config, key));

    let mut request = client.delete(&url);
    for (name, value) in headers {
        request = request.header(name, value);
    }
    let response = request.send().await.map_err(UploadError::Network)?;

    if response.status().is_success() || response.status().as_u16() == 404 {
        Ok(DeleteResult { success: true })
    } else {
        Err(UploadError::Provider {
            status: response.status().as_u16(),
            message: "DELETE request failed".to_string(),
        })
    }
}

/// Result of [`delete_files`]: which keys succeeded and which failed.
#[derive(Debug, Clone, Default)]
pub struct DeleteManyResult {
    pub deleted: Vec<String>,
    pub errors: Vec<(String, String)>,
}

/// Delete every key in `keys`, concurrently; partial failure does not abort
/// the batch.
pub async fn delete_files(
    config: &SigningConfig,
    keys: &[String],
    now: DateTime<Utc>,
) -> UploadResult<DeleteManyResult> {
    let results = futures::future::join_all(
        keys.iter()
            .map(|key| async move { (key.clone(), delete_file(config, key, now).await) }),
    )
    .await;

    let mut out = DeleteManyResult::default();
    for (key, result) in results {
        match result {
            Ok(_) => out.deleted.push(key),
            Err(e) => out.errors.push((key, e.to_string())),
        }
    }
    Ok(out)
}

/// Parameters for [`list_files`].
#[derive(Debug, Clone, Default)]
pub struct ListFilesOptions {
    pub prefix: Option<String>,
    pub max_keys: Option<u32>,
    pub continuation_token: Option<String>,
}

/// One page of [`list_files`] results.
#[derive(Debug, Clone, Default)]
pub struct ListFilesPage {
    pub files: Vec<FileInfo>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// `ListObjectsV2` against the bucket, one page at a time.
pub async fn list_files(
    config: &SigningConfig,
    options: ListFilesOptions,
    now: DateTime<Utc>,
) -> UploadResult<ListFilesPage> {
    let client = reqwest_client()?;

    let mut query: Vec<(&str, String)> = vec![("list-type", "2".to_string())];
    if let Some(prefix) = &options.prefix {
        query.push(("prefix", prefix.clone()));
    }
    if let Some(max_keys) = options.max_keys {
        query.push(("max-keys", max_keys.to_string()));
    }
    if let Some(token) = &options.continuation_token {
        query.push(("continuation-token", token.clone()));
    }

    let payload_hash = signer::empty_payload_hash();
    let headers = signer::sign_request(config, Method::Get, "/", &query, &payload_hash, now)?;

    let base = if config.force_path_style {
        format!("{}/{}", config.api_base_url(), config.bucket)
    } else {
        config.api_base_url()
    };
    let query_string = query
        .iter()
        .map(|(k, v)| format!("{k}={}", signer_url_encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let url = format!("{base}/?{query_string}");

    let mut request = client.get(&url);
    for (name, value) in headers {
        request = request.header(name, value);
    }
    let response = request.send().await.map_err(UploadError::Network)?;
    let status = response.status();
    let body = response.text().await.map_err(UploadError::Network)?;

    if !status.is_success() {
        let message = xml::parse_error_response(&body)
            .map(|e| e.message)
            .unwrap_or_else(|| "list request failed".to_string());
        return Err(UploadError::Provider {
            status: status.as_u16(),
            message,
        });
    }

    let parsed = xml::parse_list_bucket_result(&body)
        .map_err(|e| UploadError::Provider { status: status.as_u16(), message: e.to_string() })?;

    let files = parsed
        .contents
        .into_iter()
        .map(|entry| FileInfo {
            url: get_file_url(config, &entry.key),
            key: entry.key,
            size: entry.size,
            content_type: None,
            last_modified: DateTime::parse_from_rfc3339(&entry.last_modified)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(now),
            etag: entry.etag,
            metadata: None,
        })
        .collect();

    Ok(ListFilesPage {
        files,
        is_truncated: parsed.is_truncated,
        next_continuation_token: parsed.next_continuation_token,
    })
}

fn signer_url_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// `files.filter(|f| f.key.ends_with(ext))`, applied client-side over one
/// already-fetched page.
pub fn by_extension(files: &[FileInfo], extension: &str) -> Vec<FileInfo> {
    files
        .iter()
        .filter(|f| f.key.ends_with(extension))
        .cloned()
        .collect()
}

pub fn by_size(files: &[FileInfo], min: u64, max: u64) -> Vec<FileInfo> {
    files
        .iter()
        .filter(|f| f.size >= min && f.size <= max)
        .cloned()
        .collect()
}

pub fn by_date(files: &[FileInfo], from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<FileInfo> {
    files
        .iter()
        .filter(|f| f.last_modified >= from && f.last_modified <= to)
        .cloned()
        .collect()
}

/// A paginated stream of [`ListFilesPage`]s, following `nextContinuationToken`
/// until the listing is exhausted.
pub fn list_files_stream<'a>(
    config: &'a SigningConfig,
    mut options: ListFilesOptions,
    now: DateTime<Utc>,
) -> impl Stream<Item = UploadResult<ListFilesPage>> + 'a {
    stream::unfold(Some(options.continuation_token.take()), move |state| {
        let options = options.clone();
        async move {
            let token = state?;
            let page_options = ListFilesOptions {
                continuation_token: token,
                ..options
            };
            let page = list_files(config, page_options, now).await;
            match page {
                Ok(page) => {
                    let next = if page.is_truncated {
                        Some(page.next_continuation_token.clone())
                    } else {
                        None
                    };
                    Some((Ok(page), next))
                }
                Err(e) => Some((Err(e), None)),
            }
        }
    })
}

/// Rules enforced by [`validate_file`].
#[derive(Debug, Clone, Default)]
pub struct ValidationRules {
    pub max_size: Option<u64>,
    pub allowed_types: Vec<String>,
    pub required_extensions: Vec<String>,
}

/// Result of [`validate_file`].
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub info: Option<FileInfo>,
}

/// Fetch `key`'s [`FileInfo`] and enforce `rules` against it.
pub async fn validate_file(
    config: &SigningConfig,
    key: &str,
    rules: ValidationRules,
    now: DateTime<Utc>,
) -> UploadResult<ValidationOutcome> {
    let info = get_file_info(config, key, now).await?;
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let Some(info) = info else {
        return Ok(ValidationOutcome {
            valid: false,
            errors: vec!["object does not exist".to_string()],
            warnings,
            info: None,
        });
    };

    if let Some(max) = rules.max_size {
        if info.size > max {
            errors.push(format!("size {} exceeds limit {}", info.size, max));
        }
    }
    if !rules.allowed_types.is_empty() {
        match &info.content_type {
            Some(ct) if rules.allowed_types.iter().any(|t| t == ct) => {}
            Some(ct) => errors.push(format!("content type {ct} not allowed")),
            None => warnings.push("object has no content type".to_string()),
        }
    }
    if !rules.required_extensions.is_empty()
        && !rules.required_extensions.iter().any(|ext| key.ends_with(ext.as_str()))
    {
        errors.push("key does not match any required extension".to_string());
    }

    Ok(ValidationOutcome {
        valid: errors.is_empty(),
        errors,
        warnings,
        info: Some(info),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Credentials;

    fn config(custom_domain: Option<&str>) -> SigningConfig {
        SigningConfig {
            endpoint: "https://s3.us-east-1.amazonaws.com".to_string(),
            bucket: "b".to_string(),
            region: "us-east-1".to_string(),
            force_path_style: false,
            custom_domain: custom_domain.map(str::to_string),
            credentials: Credentials {
                access_key_id: "AKIA".to_string(),
                secret_access_key: "secret".to_string(),
            },
        }
    }

    fn now() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_get_file_url_without_custom_domain() {
        let cfg = config(None);
        assert_eq!(
            get_file_url(&cfg, "a/b.png"),
            "https://b.s3.us-east-1.amazonaws.com/a/b.png"
        );
    }

    #[test]
    fn test_get_file_url_with_custom_domain_strips_trailing_slash() {
        let cfg = config(Some("https://cdn.example.com/"));
        assert_eq!(get_file_url(&cfg, "a/b.png"), "https://cdn.example.com/a/b.png");
    }

    #[test]
    fn test_generate_presigned_upload_url_never_uses_custom_domain() {
        let cfg = config(Some("https://cdn.example.com"));
        let presigned =
            generate_presigned_upload_url(&cfg, "a/b.png", UploadUrlOptions::default(), now())
                .unwrap();
        assert!(presigned.url.contains("amazonaws.com"));
        assert!(!presigned.url.contains("cdn.example.com"));
    }

    #[test]
    fn test_by_extension_filters() {
        let files = vec![
            FileInfo {
                key: "a.png".into(),
                url: String::new(),
                size: 1,
                content_type: None,
                last_modified: now(),
                etag: None,
                metadata: None,
            },
            FileInfo {
                key: "b.pdf".into(),
                url: String::new(),
                size: 1,
                content_type: None,
                last_modified: now(),
                etag: None,
                metadata: None,
            },
        ];
        assert_eq!(by_extension(&files, ".png").len(), 1);
    }

    #[test]
    fn test_by_size_filters_inclusive_range() {
        let files = vec![
            FileInfo {
                key: "a".into(),
                url: String::new(),
                size: 10,
                content_type: None,
                last_modified: now(),
                etag: None,
                metadata: None,
            },
            FileInfo {
                key: "b".into(),
                url: String::new(),
                size: 100,
                content_type: None,
                last_modified: now(),
                etag: None,
                metadata: None,
            },
        ];
        assert_eq!(by_size(&files, 0, 50).len(), 1);
    }
}
