//! Client configuration.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Matches the backend's `MAX_UPLOAD_SIZE`.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Root of the backend REST surface, e.g. `http://host:8000/api`.
    pub base_url: String,
    /// Unset means requests run to natural completion.
    pub request_timeout_secs: Option<u64>,
    pub max_upload_bytes: u64,
    /// `limit` sent with every document listing.
    pub document_page_size: u32,
    /// SQLite file backing client-local storage.
    pub storage_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            document_page_size: DEFAULT_PAGE_SIZE,
            storage_path: PathBuf::from("deeptalk.db"),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load a JSON config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&raw)?;
        tracing::debug!(path = %path.display(), base_url = %config.base_url, "loaded client config");
        Ok(config)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Join an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url": "https://kb.example.com/api/"}"#).unwrap();
        assert_eq!(config.base_url, "https://kb.example.com/api/");
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.document_page_size, 100);
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = ClientConfig::new("https://kb.example.com/api/");
        assert_eq!(
            config.endpoint("/kb/documents"),
            "https://kb.example.com/api/kb/documents"
        );
        assert_eq!(
            ClientConfig::default().endpoint("conversation/query"),
            "http://localhost:8000/api/conversation/query"
        );
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = ClientConfig::load(Path::new("/nonexistent/deeptalk.json")).unwrap_err();
        assert!(matches!(err, crate::error::ClientError::Io(_)));
    }
}
