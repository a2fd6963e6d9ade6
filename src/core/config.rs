//! Configuration management for the chat relay.
//!
//! All settings are read once at startup from the process environment
//! (optionally seeded from a `.env` file). Nothing here is reloaded at runtime.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default upstream chat-completions endpoint.
pub const DEFAULT_UPSTREAM_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Main application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port)
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream provider settings, including the credential
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Per-caller rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Cross-origin policy
    #[serde(default)]
    pub cors: CorsConfig,

    /// Optional JSON file replacing the built-in model registry
    #[serde(default)]
    pub model_registry_path: Option<String>,

    /// Optional directory holding the web front-end
    #[serde(default)]
    pub static_dir: Option<String>,

    /// Service name reported by the health endpoint
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Upstream provider configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Bearer credential for the provider. Absent means every chat call fails
    /// with a configuration error while health/models keep working.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Chat-completions endpoint
    #[serde(default = "default_upstream_url")]
    pub url: String,

    /// Value of the `HTTP-Referer` header identifying this application
    #[serde(default = "default_app_referer")]
    pub app_referer: String,

    /// Value of the `X-Title` header identifying this application
    #[serde(default = "default_app_title")]
    pub app_title: String,

    /// Request timeout in seconds for upstream calls
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Whether to verify SSL certificates for upstream requests
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            url: default_upstream_url(),
            app_referer: default_app_referer(),
            app_title: default_app_title(),
            request_timeout_secs: default_request_timeout(),
            verify_ssl: default_verify_ssl(),
        }
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("url", &self.url)
            .field("app_referer", &self.app_referer)
            .field("app_title", &self.app_title)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("verify_ssl", &self.verify_ssl)
            .finish()
    }
}

/// Fixed-window rate limit applied per caller key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Maximum requests per caller within one window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Identify callers by `X-Forwarded-For` / `X-Real-IP`. Only safe behind a
    /// reverse proxy that overwrites those headers.
    #[serde(default)]
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
            trust_proxy: false,
        }
    }
}

impl RateLimitConfig {
    /// Retry hint handed to rejected callers, in whole seconds (never zero).
    pub fn retry_after_secs(&self) -> u64 {
        self.window_ms.div_ceil(1000).max(1)
    }
}

/// Cross-origin policy.
///
/// An empty allow-list means every origin is accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn is_permissive(&self) -> bool {
        self.allowed_origins.is_empty()
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_upstream_url() -> String {
    DEFAULT_UPSTREAM_URL.to_string()
}

fn default_app_referer() -> String {
    "http://localhost:3000".to_string()
}

fn default_app_title() -> String {
    "LLM Chat Relay".to_string()
}

fn default_request_timeout() -> u64 {
    300
}

fn default_verify_ssl() -> bool {
    true
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_requests() -> u32 {
    30
}

fn default_service_name() -> String {
    "llm-chat-relay".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
            model_registry_path: None,
            static_dir: None,
            service_name: default_service_name(),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("server", &self.server)
            .field("upstream", &self.upstream)
            .field("rate_limit", &self.rate_limit)
            .field("cors", &self.cors)
            .field("model_registry_path", &self.model_registry_path)
            .field("static_dir", &self.static_dir)
            .field("service_name", &self.service_name)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables fall back to defaults; set-but-unparsable numeric
    /// variables are reported as errors.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use llm_chat_relay::core::config::AppConfig;
    ///
    /// let config = AppConfig::from_env().expect("invalid configuration");
    /// println!("listening on port {}", config.server.port);
    /// ```
    pub fn from_env() -> Result<Self> {
        let mut config = AppConfig::default();

        if let Ok(host) = std::env::var("HOST") {
            config.server.host = host;
        }
        if let Some(port) = parse_env::<u16>("PORT")? {
            config.server.port = port;
        }

        config.upstream.api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        if let Ok(url) = std::env::var("UPSTREAM_URL") {
            config.upstream.url = url;
        }
        if let Ok(referer) = std::env::var("APP_REFERER") {
            config.upstream.app_referer = referer;
        }
        if let Ok(title) = std::env::var("APP_TITLE") {
            config.upstream.app_title = title;
        }
        if let Some(timeout) = parse_env::<u64>("REQUEST_TIMEOUT_SECS")? {
            config.upstream.request_timeout_secs = timeout;
        }
        if let Ok(verify_ssl) = std::env::var("VERIFY_SSL") {
            config.upstream.verify_ssl = str_to_bool(&verify_ssl);
        }

        if let Some(window_ms) = parse_env::<u64>("RATE_LIMIT_WINDOW_MS")? {
            config.rate_limit.window_ms = window_ms;
        }
        if let Some(max_requests) = parse_env::<u32>("RATE_LIMIT_MAX_REQUESTS")? {
            config.rate_limit.max_requests = max_requests;
        }
        if let Ok(trust_proxy) = std::env::var("TRUST_PROXY") {
            config.rate_limit.trust_proxy = str_to_bool(&trust_proxy);
        }

        if let Ok(origins) = std::env::var("ALLOWED_ORIGINS") {
            config.cors.allowed_origins = split_list(&origins);
        }

        config.model_registry_path = std::env::var("MODEL_REGISTRY_PATH")
            .ok()
            .filter(|p| !p.is_empty());
        config.static_dir = std::env::var("STATIC_DIR").ok().filter(|p| !p.is_empty());
        if let Ok(name) = std::env::var("SERVICE_NAME") {
            config.service_name = name;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the server misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.window_ms == 0 {
            anyhow::bail!("RATE_LIMIT_WINDOW_MS must be greater than zero");
        }
        if self.rate_limit.max_requests == 0 {
            anyhow::bail!("RATE_LIMIT_MAX_REQUESTS must be greater than zero");
        }
        if self.upstream.url.is_empty() {
            anyhow::bail!("UPSTREAM_URL must not be empty");
        }
        Ok(())
    }

    /// Whether the upstream credential was supplied.
    pub fn has_credential(&self) -> bool {
        self.upstream.api_key.is_some()
    }
}

/// Parse an optional environment variable, failing on malformed values.
fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        _ => Ok(None),
    }
}

/// Split a comma-separated list, dropping blanks.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Convert string to boolean.
///
/// Accepts: "true", "1", "yes", "on" (case-insensitive)
fn str_to_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ALL_VARS: &[&str] = &[
        "HOST",
        "PORT",
        "OPENROUTER_API_KEY",
        "UPSTREAM_URL",
        "APP_REFERER",
        "APP_TITLE",
        "REQUEST_TIMEOUT_SECS",
        "VERIFY_SSL",
        "RATE_LIMIT_WINDOW_MS",
        "RATE_LIMIT_MAX_REQUESTS",
        "TRUST_PROXY",
        "ALLOWED_ORIGINS",
        "MODEL_REGISTRY_PATH",
        "STATIC_DIR",
        "SERVICE_NAME",
    ];

    fn clear_env() {
        for var in ALL_VARS {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_str_to_bool() {
        assert!(str_to_bool("true"));
        assert!(str_to_bool("TRUE"));
        assert!(str_to_bool("1"));
        assert!(str_to_bool("yes"));
        assert!(str_to_bool("On"));
        assert!(!str_to_bool("false"));
        assert!(!str_to_bool("0"));
        assert!(!str_to_bool(""));
        assert!(!str_to_bool("invalid"));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list("https://a.example, https://b.example ,,"),
            vec!["https://a.example", "https://b.example"]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_retry_after_secs() {
        assert_eq!(RateLimitConfig::default().retry_after_secs(), 60);
        let short = RateLimitConfig {
            window_ms: 1500,
            ..RateLimitConfig::default()
        };
        assert_eq!(short.retry_after_secs(), 2);
        let tiny = RateLimitConfig {
            window_ms: 1,
            ..RateLimitConfig::default()
        };
        assert_eq!(tiny.retry_after_secs(), 1);
    }

    #[test]
    #[serial]
    fn test_defaults_from_empty_env() {
        clear_env();
        let config = AppConfig::from_env().unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert!(config.upstream.api_key.is_none());
        assert!(!config.has_credential());
        assert_eq!(config.upstream.url, DEFAULT_UPSTREAM_URL);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.rate_limit.max_requests, 30);
        assert!(!config.rate_limit.trust_proxy);
        assert!(config.cors.is_permissive());
        assert!(config.model_registry_path.is_none());
        assert!(config.static_dir.is_none());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        unsafe {
            std::env::set_var("PORT", "8081");
            std::env::set_var("OPENROUTER_API_KEY", "  sk-test  ");
            std::env::set_var("RATE_LIMIT_WINDOW_MS", "1000");
            std::env::set_var("RATE_LIMIT_MAX_REQUESTS", "5");
            std::env::set_var("ALLOWED_ORIGINS", "https://chat.example.com");
            std::env::set_var("VERIFY_SSL", "false");
            std::env::set_var("TRUST_PROXY", "true");
        }

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.upstream.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.rate_limit.window_ms, 1000);
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://chat.example.com".to_string()]
        );
        assert!(!config.upstream.verify_ssl);
        assert!(config.rate_limit.trust_proxy);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_blank_credential_is_treated_as_missing() {
        clear_env();
        unsafe {
            std::env::set_var("OPENROUTER_API_KEY", "   ");
        }
        let config = AppConfig::from_env().unwrap();
        assert!(!config.has_credential());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_port_is_an_error() {
        clear_env();
        unsafe {
            std::env::set_var("PORT", "not-a-port");
        }
        let err = AppConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("PORT"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_rate_limit_rejected() {
        clear_env();
        unsafe {
            std::env::set_var("RATE_LIMIT_MAX_REQUESTS", "0");
        }
        assert!(AppConfig::from_env().is_err());
        clear_env();
    }

    #[test]
    fn test_debug_redacts_credential() {
        let mut config = AppConfig::default();
        config.upstream.api_key = Some("sk-very-secret".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_serialization_skips_credential() {
        let mut config = AppConfig::default();
        config.upstream.api_key = Some("sk-very-secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-very-secret"));
    }
}
