//! Engine and application configuration.
//!
//! `UploaderConfig` is stored as TOML; see `uploader.example.toml`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, TransportError};
use crate::upload::{
    BatchOrchestrator, HeaderInjector, HookScope, ReqwestTransport, DEFAULT_CHUNK_SIZE,
};
use crate::utils::csrf::csrf_token_from_html;
use crate::utils::header_parser::parse_header_lines;

pub const DEFAULT_DIRECT_UPLOADS_PATH: &str = "/rails/active_storage/direct_uploads";
pub const CSRF_HEADER: &str = "x-csrf-token";
pub const CONFIG_ENV: &str = "DIRECT_UPLOADER_CONFIG";

/// Where the application backend lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    pub base_url: String,
    #[serde(default = "default_direct_uploads_path")]
    pub direct_uploads_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
}

fn default_direct_uploads_path() -> String {
    DEFAULT_DIRECT_UPLOADS_PATH.to_string()
}

impl HostConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            direct_uploads_path: default_direct_uploads_path(),
            csrf_token: None,
        }
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    /// Picks the CSRF token out of the hosting document's meta tags.
    pub fn with_csrf_from_document(mut self, html: &str) -> Self {
        if let Some(token) = csrf_token_from_html(html) {
            self.csrf_token = Some(token);
        }
        self
    }

    /// Resolves a path or absolute URL against `base_url`.
    pub fn resolve(&self, location: &str) -> Result<Url, TransportError> {
        let base = Url::parse(&self.base_url).map_err(|e| {
            TransportError::InvalidRequest(format!("bad base url {}: {e}", self.base_url))
        })?;
        base.join(location)
            .map_err(|e| TransportError::InvalidRequest(format!("bad url {location}: {e}")))
    }

    pub fn direct_uploads_url(&self) -> Result<Url, TransportError> {
        self.resolve(&self.direct_uploads_path)
    }

    /// Headers shared by every JSON request to the application host.
    pub fn json_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.csrf_token {
            match HeaderValue::from_str(token) {
                Ok(value) => {
                    headers.insert(HeaderName::from_static(CSRF_HEADER), value);
                }
                Err(_) => debug!("csrf token is not a valid header value, skipping"),
            }
        }
        headers
    }
}

/// The application endpoint that receives the signed ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub path: String,
    pub method: String,
    pub attribute: String,
    pub model: String,
}

impl Endpoint {
    pub fn new(
        path: impl Into<String>,
        method: impl Into<String>,
        attribute: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            attribute: attribute.into(),
            model: model.into(),
        }
    }

    pub fn http_method(&self) -> Result<Method, TransportError> {
        Method::from_bytes(self.method.to_uppercase().as_bytes())
            .map_err(|_| TransportError::InvalidRequest(format!("bad method {}", self.method)))
    }
}

/// How the signed ids are shaped and authorized on submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Send an array of ids instead of a bare id.
    pub multiple: bool,
    /// Sent verbatim as `Authorization`.
    pub token: Option<String>,
}

/// Everything the desktop uploader needs, as read from `uploader.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploaderConfig {
    pub host: HostConfig,
    pub endpoint: Endpoint,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// `Name: value` lines added to every blob request.
    #[serde(default)]
    pub headers: Vec<String>,
    /// Glob applied when a whole folder is picked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            host: HostConfig::new("http://localhost:3000"),
            endpoint: Endpoint::new("/uploads", "POST", "files", "Upload"),
            multiple: true,
            token: None,
            headers: Vec::new(),
            include: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl UploaderConfig {
    /// `$DIRECT_UPLOADER_CONFIG`, or `uploader.toml` in the working directory.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("uploader.toml"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: UploaderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.host
            .direct_uploads_url()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.host
            .resolve(&self.endpoint.path)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.endpoint
            .http_method()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.endpoint.attribute.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint.attribute is empty".into()));
        }
        if self.endpoint.model.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint.model is empty".into()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".into()));
        }
        Ok(())
    }

    pub fn submit_options(&self) -> SubmitOptions {
        SubmitOptions {
            multiple: self.multiple,
            token: self.token.clone(),
        }
    }

    /// Wires a ready-to-use orchestrator on top of reqwest.
    pub fn build_orchestrator(&self) -> Result<BatchOrchestrator, ConfigError> {
        self.validate()?;
        let transport = ReqwestTransport::new()?.with_chunk_size(self.chunk_size);
        let injector = HeaderInjector::new(
            parse_header_lines(&self.headers.join("\n")),
            HookScope::BlobRequests,
        );

        Ok(
            BatchOrchestrator::new(Arc::new(transport), self.host.clone(), self.endpoint.clone())
                .with_options(self.submit_options())
                .with_hooks(Arc::new(injector)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
multiple = false
token = "Bearer abc"
headers = ["X-Tenant: acme"]

[host]
base_url = "https://app.example.com"
csrf_token = "tok"

[endpoint]
path = "/posts/1"
method = "patch"
attribute = "avatar"
model = "Post"
"#;

    #[test]
    fn parses_toml_with_defaults() {
        let config = UploaderConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.host.direct_uploads_path, DEFAULT_DIRECT_UPLOADS_PATH);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.endpoint.http_method().unwrap(), Method::PATCH);
        assert_eq!(
            config.submit_options(),
            SubmitOptions {
                multiple: false,
                token: Some("Bearer abc".into())
            }
        );
    }

    #[test]
    fn rejects_invalid_values() {
        let bad_url = SAMPLE.replace("https://app.example.com", "not a url");
        assert!(matches!(
            UploaderConfig::from_toml_str(&bad_url),
            Err(ConfigError::Invalid(_))
        ));

        let no_model = SAMPLE.replace("model = \"Post\"", "model = \" \"");
        assert!(matches!(
            UploaderConfig::from_toml_str(&no_model),
            Err(ConfigError::Invalid(_))
        ));

        assert!(matches!(
            UploaderConfig::from_toml_str("multiple = true"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uploader.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = UploaderConfig::load(&path).unwrap();
        assert_eq!(config.endpoint.model, "Post");
        assert!(matches!(
            UploaderConfig::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn resolve_handles_relative_and_absolute() {
        let host = HostConfig::new("https://app.example.com/");
        assert_eq!(
            host.direct_uploads_url().unwrap().as_str(),
            "https://app.example.com/rails/active_storage/direct_uploads"
        );
        assert_eq!(
            host.resolve("https://bucket.s3.test/key?sig=1").unwrap().as_str(),
            "https://bucket.s3.test/key?sig=1"
        );
    }

    #[test]
    fn json_headers_carry_csrf_token() {
        let host = HostConfig::new("https://app.example.com").with_csrf_from_document(
            r#"<head><meta name="csrf-token" content="from-doc"></head>"#,
        );
        let headers = host.json_headers();
        assert_eq!(headers[ACCEPT], "application/json");
        assert_eq!(headers[CSRF_HEADER], "from-doc");

        let bare = HostConfig::new("https://app.example.com").json_headers();
        assert!(bare.get(CSRF_HEADER).is_none());
    }

    #[test]
    fn example_file_matches_defaults() {
        let config = UploaderConfig::from_toml_str(include_str!("../uploader.example.toml")).unwrap();
        assert_eq!(config, UploaderConfig::default());
    }

    #[test]
    fn builds_orchestrator_from_config() {
        let config = UploaderConfig::from_toml_str(SAMPLE).unwrap();
        let orchestrator = config.build_orchestrator().unwrap();
        assert!(orchestrator.is_ready());
    }
}
