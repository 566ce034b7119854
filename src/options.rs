use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scan configuration. Fixed for the lifetime of a scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanOptions {
    /// Number of parallel workers.
    pub threads: usize,
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    pub follow_redirects: bool,
    /// Count body codepoints when the server does not declare a length.
    pub include_length: bool,
    pub insecure_tls: bool,
    pub proxy: Option<String>,
    /// Accepted for callers that inject it into request headers; the scanner never sends it.
    pub cookies: Option<String>,
    pub ignore_wildcard: bool,
    pub search_extensions: bool,
    pub show_progress: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            threads: 10,
            timeout: Duration::from_secs(10),
            follow_redirects: false,
            include_length: false,
            insecure_tls: false,
            proxy: None,
            cookies: None,
            ignore_wildcard: false,
            search_extensions: false,
            show_progress: true,
        }
    }
}

impl ScanOptions {
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.threads == 0 {
            return Err(ScanError::InvalidConfig(
                "thread count must be positive".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ScanError::InvalidConfig("timeout must be non-zero".into()));
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
