//! S3 `ListObjectsV2`/error XML response shapes.
//!
//! Grounded on `rust-s3`'s `serde-xml-rs`-backed `ListBucketResult`, ported
//! to `quick-xml`'s `serde` support (the more actively maintained of the
//! two XML crates in the retrieval pack).

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Contents {
    pub key: String,
    pub size: u64,
    pub last_modified: String,
    #[serde(rename = "ETag")]
    pub etag: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ListBucketResult {
    #[serde(default, rename = "Contents")]
    pub contents: Vec<Contents>,
    #[serde(default)]
    pub is_truncated: bool,
    #[serde(default)]
    pub next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

pub fn parse_list_bucket_result(body: &str) -> Result<ListBucketResult, quick_xml::DeError> {
    quick_xml::de::from_str(body)
}

pub fn parse_error_response(body: &str) -> Option<ErrorResponse> {
    quick_xml::de::from_str(body).ok()
}
