//! `ByteSize` — parses `"5MB"`, `"1GB"`, or a raw byte count.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::UploadError;

lazy_static! {
    static ref SIZE_PATTERN: Regex =
        Regex::new(r"(?i)^\s*(\d+)\s*(B|KB|MB|GB)?\s*$").unwrap();
}

/// A byte count, parsed from either a raw number or a `"<n>(B|KB|MB|GB)"`
/// string. Units are 1024-based (`KB` means `KiB`), matching how S3 SDKs and
/// upload tooling commonly read these suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ByteSize {
    fn from(value: u64) -> Self {
        ByteSize(value)
    }
}

impl TryFrom<i64> for ByteSize {
    type Error = UploadError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 0 {
            return Err(UploadError::Config(format!(
                "byte size must not be negative: {value}"
            )));
        }
        Ok(ByteSize(value as u64))
    }
}

impl FromStr for ByteSize {
    type Err = UploadError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let captures = SIZE_PATTERN
            .captures(input)
            .ok_or_else(|| UploadError::Config(format!("invalid byte size: {input:?}")))?;

        let number: u64 = captures[1]
            .parse()
            .map_err(|_| UploadError::Config(format!("invalid byte size: {input:?}")))?;

        let unit = captures.get(2).map(|m| m.as_str().to_ascii_uppercase());
        let multiplier: u64 = match unit.as_deref() {
            None | Some("B") => 1,
            Some("KB") => 1024,
            Some("MB") => 1024 * 1024,
            Some("GB") => 1024 * 1024 * 1024,
            Some(other) => {
                return Err(UploadError::Config(format!("unknown byte size unit: {other}")))
            }
        };

        Ok(ByteSize(number * multiplier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_plain_bytes() {
        assert_eq!("1024".parse::<ByteSize>().unwrap().bytes(), 1024);
    }

    #[test]
    fn test_parses_kb_mb_gb_as_1024_based() {
        assert_eq!("5MB".parse::<ByteSize>().unwrap().bytes(), 5 * 1024 * 1024);
        assert_eq!("1GB".parse::<ByteSize>().unwrap().bytes(), 1024 * 1024 * 1024);
        assert_eq!("10KB".parse::<ByteSize>().unwrap().bytes(), 10 * 1024);
    }

    #[test]
    fn test_case_insensitive_and_whitespace_tolerant() {
        assert_eq!("5mb".parse::<ByteSize>().unwrap().bytes(), 5 * 1024 * 1024);
        assert_eq!(" 5 MB ".parse::<ByteSize>().unwrap().bytes(), 5 * 1024 * 1024);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("five megabytes".parse::<ByteSize>().is_err());
        assert!("5TB".parse::<ByteSize>().is_err());
    }

    #[test]
    fn test_try_from_negative_i64_rejected() {
        assert!(ByteSize::try_from(-1i64).is_err());
    }
}
