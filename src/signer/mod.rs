//! Hand-rolled AWS SigV4 signing.
//!
//! Grounded on `sebadob-s3-simple`'s `signature` module and
//! `LLM-Dev-Ops-integrations`'s `PresignService`, adapted to produce
//! presigned URLs against any of the six normalized [`crate::provider`]
//! backends rather than AWS alone. No SDK: the signer only ever needs
//! `GetObject`/`PutObject`/`HeadObject`/`DeleteObject`/`ListObjectsV2`
//! against an arbitrary host, which a from-scratch canonical-request
//! builder expresses more directly than adapting `aws-sdk-s3`'s
//! AWS-only endpoint resolver would.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::errors::{UploadError, UploadResult};
use crate::provider::SigningConfig;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "s3";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// HTTP verb a presigned URL or signed request is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Head,
    Delete,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Head => "HEAD",
            Method::Delete => "DELETE",
        }
    }
}

/// RFC 3986 percent-encoding with SigV4's `~` exception (unreserved, unlike
/// plain RFC 3986 which reserves it in some contexts). Used for both path
/// segments and canonical query values.
fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char);
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn signing_key(date: &DateTime<Utc>, secret: &str, region: &str) -> Vec<u8> {
    let date_stamp = date.format("%Y%m%d").to_string();
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, SERVICE.as_bytes());
    hmac(&k_service, b"aws4_request")
}

fn credential_scope(date: &DateTime<Utc>, region: &str) -> String {
    format!("{}/{}/{}/aws4_request", date.format("%Y%m%d"), region, SERVICE)
}

/// A finished presigned URL plus the expiry it was computed for.
#[derive(Debug, Clone)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Build the path (URL-encoded, leading slash) for a key under `config`,
/// honoring path-style vs virtual-hosted addressing.
fn object_path(config: &SigningConfig, key: &str) -> String {
    let encoded_key = uri_encode(key, true);
    if config.force_path_style {
        format!("/{}/{}", uri_encode(&config.bucket, true), encoded_key)
    } else {
        format!("/{encoded_key}")
    }
}

fn canonical_query_string(pairs: &[(&str, String)]) -> String {
    let mut sorted: Vec<(&str, String)> = pairs.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
        .into_iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k, true), uri_encode(&v, true)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Generate a presigned URL for `method` against `key`, valid for
/// `expires_in_secs` seconds from `now`. `signed_content_type` is included
/// in `X-Amz-SignedHeaders` (and must then be sent by the caller) only when
/// `Some` — PUT presigns pass the schema-resolved content type; GET/HEAD/
/// DELETE presigns pass `None` and sign only `host`.
pub fn presign(
    config: &SigningConfig,
    method: Method,
    key: &str,
    expires_in_secs: u64,
    now: DateTime<Utc>,
    signed_content_type: Option<&str>,
) -> UploadResult<PresignedUrl> {
    if expires_in_secs == 0 || expires_in_secs > 7 * 24 * 3600 {
        return Err(UploadError::Config(
            "expires_in_secs must be between 1 and 604800".to_string(),
        ));
    }

    let host = config.signing_host();
    let path = object_path(config, key);
    let scope = credential_scope(&now, &config.region);
    let credential = format!("{}/{scope}", config.credentials.access_key_id);
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

    let mut signed_headers = vec!["host"];
    if signed_content_type.is_some() {
        signed_headers.push("content-type");
    }
    signed_headers.sort_unstable();
    let signed_headers_str = signed_headers.join(";");

    let mut query_pairs: Vec<(&str, String)> = vec![
        ("X-Amz-Algorithm", ALGORITHM.to_string()),
        ("X-Amz-Credential", credential),
        ("X-Amz-Date", amz_date.clone()),
        ("X-Amz-Expires", expires_in_secs.to_string()),
        ("X-Amz-SignedHeaders", signed_headers_str.clone()),
    ];
    if let Some(ct) = signed_content_type {
        query_pairs.push(("X-Amz-Content-Type", ct.to_string()));
    }

    let canonical_query = canonical_query_string(&query_pairs);

    let mut canonical_headers = format!("host:{host}\n");
    if let Some(ct) = signed_content_type {
        canonical_headers = format!("content-type:{ct}\nhost:{host}\n");
    }

    let canonical_request = format!(
        "{method}\n{path}\n{query}\n{headers}\n{signed}\n{payload}",
        method = method.as_str(),
        path = path,
        query = canonical_query,
        headers = canonical_headers,
        signed = signed_headers_str,
        payload = UNSIGNED_PAYLOAD,
    );

    let mut hasher = Sha256::new();
    hasher.update(canonical_request.as_bytes());
    let hashed_canonical_request = hex::encode(hasher.finalize());

    let string_to_sign =
        format!("{ALGORITHM}\n{amz_date}\n{scope}\n{hashed_canonical_request}");

    let key_bytes = signing_key(&now, &config.credentials.secret_access_key, &config.region);
    let signature = hex::encode(hmac(&key_bytes, string_to_sign.as_bytes()));

    let scheme = if config.endpoint.starts_with("http://") { "http" } else { "https" };
    let url = format!(
        "{scheme}://{host}{path}?{canonical_query}&X-Amz-Signature={signature}",
    );

    Ok(PresignedUrl {
        url,
        expires_at: now + chrono::Duration::seconds(expires_in_secs as i64),
    })
}

/// Headers (including `Authorization`) for a non-presigned, directly-signed
/// request — used by the storage client for list/head/delete calls this
/// process makes itself, where the payload is known up front.
pub fn sign_request(
    config: &SigningConfig,
    method: Method,
    key_or_path: &str,
    query_pairs: &[(&str, String)],
    payload_sha256_hex: &str,
    now: DateTime<Utc>,
) -> UploadResult<Vec<(String, String)>> {
    let host = config.signing_host();
    let path = if key_or_path.starts_with('/') && config.force_path_style {
        key_or_path.to_string()
    } else {
        object_path(config, key_or_path)
    };
    let scope = credential_scope(&now, &config.region);
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

    let canonical_query = canonical_query_string(query_pairs);
    let canonical_headers = format!(
        "host:{host}\nx-amz-content-sha256:{payload_sha256_hex}\nx-amz-date:{amz_date}\n"
    );
    let signed_headers = "host;x-amz-content-sha256;x-amz-date";

    let canonical_request = format!(
        "{method}\n{path}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{payload_sha256_hex}",
        method = method.as_str(),
    );

    let mut hasher = Sha256::new();
    hasher.update(canonical_request.as_bytes());
    let hashed_canonical_request = hex::encode(hasher.finalize());

    let string_to_sign =
        format!("{ALGORITHM}\n{amz_date}\n{scope}\n{hashed_canonical_request}");

    let key_bytes = signing_key(&now, &config.credentials.secret_access_key, &config.region);
    let signature = hex::encode(hmac(&key_bytes, string_to_sign.as_bytes()));

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        config.credentials.access_key_id,
    );

    Ok(vec![
        ("host".to_string(), host),
        ("x-amz-content-sha256".to_string(), payload_sha256_hex.to_string()),
        ("x-amz-date".to_string(), amz_date),
        ("authorization".to_string(), authorization),
    ])
}

/// Hex-encoded SHA-256 of an empty payload — the value S3 expects in
/// `x-amz-content-sha256` for bodyless requests (GET/HEAD/DELETE/list).
pub fn empty_payload_hash() -> String {
    hex::encode(Sha256::digest(b""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Credentials;

    fn test_config(force_path_style: bool) -> SigningConfig {
        SigningConfig {
            endpoint: "https://s3.us-east-1.amazonaws.com".to_string(),
            bucket: "my-bucket".to_string(),
            region: "us-east-1".to_string(),
            force_path_style,
            custom_domain: None,
            credentials: Credentials {
                access_key_id: "AKIAEXAMPLE".to_string(),
                secret_access_key: "secretkey".to_string(),
            },
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_presign_put_contains_signed_headers_and_signature() {
        let config = test_config(false);
        let presigned = presign(
            &config,
            Method::Put,
            "uploads/avatar.png",
            900,
            fixed_now(),
            Some("image/png"),
        )
        .unwrap();
        assert!(presigned.url.contains("X-Amz-Signature="));
        assert!(presigned.url.contains("X-Amz-SignedHeaders=content-type%3Bhost"));
        assert!(presigned.url.starts_with("https://my-bucket.s3.us-east-1.amazonaws.com/"));
    }

    #[test]
    fn test_presign_get_signs_only_host() {
        let config = test_config(false);
        let presigned = presign(&config, Method::Get, "uploads/avatar.png", 300, fixed_now(), None)
            .unwrap();
        assert!(presigned.url.contains("X-Amz-SignedHeaders=host"));
    }

    #[test]
    fn test_presign_path_style_puts_bucket_in_path() {
        let config = test_config(true);
        let presigned =
            presign(&config, Method::Get, "a/b.txt", 300, fixed_now(), None).unwrap();
        assert!(presigned.url.starts_with("https://s3.us-east-1.amazonaws.com/my-bucket/"));
    }

    #[test]
    fn test_presign_rejects_out_of_range_expiry() {
        let config = test_config(false);
        assert!(presign(&config, Method::Get, "k", 0, fixed_now(), None).is_err());
        assert!(presign(&config, Method::Get, "k", 700_000, fixed_now(), None).is_err());
    }

    #[test]
    fn test_uri_encode_preserves_tilde_and_slash() {
        assert_eq!(uri_encode("a~b/c", false), "a~b/c");
        assert_eq!(uri_encode("a~b/c", true), "a~b%2Fc");
        assert_eq!(uri_encode("a b", false), "a%20b");
    }

    #[test]
    fn test_canonical_query_string_sorted() {
        let pairs = vec![("b", "2".to_string()), ("a", "1".to_string())];
        assert_eq!(canonical_query_string(&pairs), "a=1&b=2");
    }

    #[test]
    fn test_sign_request_produces_authorization_header() {
        let config = test_config(false);
        let headers = sign_request(
            &config,
            Method::Delete,
            "uploads/avatar.png",
            &[],
            &empty_payload_hash(),
            fixed_now(),
        )
        .unwrap();
        assert!(headers.iter().any(|(k, v)| k == "authorization" && v.starts_with(ALGORITHM)));
    }
}
