//! Provider configuration.
//!
//! The provider block accepts an access token, an API URL and a request
//! timeout. Token and URL fall back to `SYNTROPY_ACCESS_TOKEN` and
//! `SYNTROPY_API_URL` when they are not set in configuration.

use std::fmt;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, Diagnostic, Schema};
use crate::validation;

/// Public SyntropyStack controller.
pub const DEFAULT_API_URL: &str = "https://controller-prod-server.syntropystack.com";

/// Environment variable consulted when `access_token` is not configured.
pub const ACCESS_TOKEN_ENV: &str = "SYNTROPY_ACCESS_TOKEN";

/// Environment variable consulted when `api_url` is not configured.
pub const API_URL_ENV: &str = "SYNTROPY_API_URL";

/// Timeout applied to every API request unless configured otherwise.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    api_url: Option<String>,
    #[serde(default)]
    request_timeout: Option<i64>,
}

impl RawConfig {
    fn parse(config: &Value) -> Result<Self, ProviderError> {
        if config.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(config.clone())?)
    }
}

/// Resolved provider settings used to build a [`crate::client::SyntropyClient`].
#[derive(Clone)]
pub struct ProviderConfig {
    /// Bearer token sent with every request.
    pub access_token: String,
    /// Controller base URL.
    pub api_url: Url,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("access_token", &"<redacted>")
            .field("api_url", &self.api_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ProviderConfig {
    /// Schema of the provider configuration block.
    pub fn schema() -> Schema {
        Schema::v0()
            .describe("SyntropyStack platform connection settings")
            .attribute(
                "access_token",
                Attribute::string(AttributeFlags::OPTIONAL)
                    .sensitive()
                    .describe("Syntropy platform access token. Defaults to SYNTROPY_ACCESS_TOKEN."),
            )
            .attribute(
                "api_url",
                Attribute::string(AttributeFlags::OPTIONAL)
                    .describe("Syntropy platform API URL. Defaults to SYNTROPY_API_URL or the public controller."),
            )
            .attribute(
                "request_timeout",
                Attribute::int64(AttributeFlags::OPTIONAL)
                    .describe("Timeout in seconds for each API request")
                    .default_value(serde_json::json!(DEFAULT_REQUEST_TIMEOUT.as_secs())),
            )
    }

    /// Resolve configuration against the process environment.
    pub fn resolve(config: &Value) -> Result<Self, ProviderError> {
        Self::resolve_with(config, |key| std::env::var(key).ok())
    }

    /// Resolve configuration, reading fallbacks through `env`.
    pub fn resolve_with<F>(config: &Value, env: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = RawConfig::parse(config)?;

        let access_token = non_empty(raw.access_token)
            .or_else(|| non_empty(env(ACCESS_TOKEN_ENV)))
            .ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "access_token is not set in provider configuration or {}",
                    ACCESS_TOKEN_ENV
                ))
            })?;

        let url = non_empty(raw.api_url)
            .or_else(|| non_empty(env(API_URL_ENV)))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = parse_api_url(&url)?;

        let request_timeout = match raw.request_timeout {
            None => DEFAULT_REQUEST_TIMEOUT,
            Some(secs) if secs > 0 => Duration::from_secs(secs as u64),
            Some(secs) => {
                return Err(ProviderError::Validation(format!(
                    "request_timeout must be positive, got {}",
                    secs
                )))
            },
        };

        Ok(Self {
            access_token,
            api_url,
            request_timeout,
        })
    }

    /// Check a configuration value without requiring the token to be present.
    ///
    /// The token may still arrive through the environment at configure time.
    pub fn check(config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&Self::schema(), config);
        if validation::has_errors(&diagnostics) {
            return diagnostics;
        }

        if let Some(url) = config.get("api_url").and_then(Value::as_str) {
            if let Err(err) = parse_api_url(url) {
                diagnostics.push(
                    Diagnostic::error("Invalid api_url")
                        .with_detail(err.message())
                        .with_attribute("api_url"),
                );
            }
        }

        if let Some(secs) = config.get("request_timeout").and_then(Value::as_i64) {
            if secs <= 0 {
                diagnostics.push(
                    Diagnostic::error("Invalid request_timeout")
                        .with_detail(format!("must be a positive number of seconds, got {}", secs))
                        .with_attribute("request_timeout"),
                );
            }
        }

        diagnostics
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_api_url(url: &str) -> Result<Url, ProviderError> {
    let parsed = Url::parse(url)
        .map_err(|e| ProviderError::Validation(format!("'{}' is not a valid URL: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ProviderError::Validation(format!(
            "'{}' must use http or https, not {}",
            url, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_resolve_from_config() {
        let config = ProviderConfig::resolve_with(
            &json!({"access_token": "tok", "api_url": "http://localhost:8080", "request_timeout": 5}),
            no_env,
        )
        .unwrap();

        assert_eq!(config.access_token, "tok");
        assert_eq!(config.api_url.as_str(), "http://localhost:8080/");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_resolve_env_fallback() {
        let env = |key: &str| match key {
            ACCESS_TOKEN_ENV => Some("env-token".to_string()),
            API_URL_ENV => Some("https://controller.example.com".to_string()),
            _ => None,
        };
        let config = ProviderConfig::resolve_with(&json!({}), env).unwrap();

        assert_eq!(config.access_token, "env-token");
        assert_eq!(config.api_url.host_str(), Some("controller.example.com"));
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_config_wins_over_env() {
        let env = |key: &str| match key {
            ACCESS_TOKEN_ENV => Some("env-token".to_string()),
            _ => None,
        };
        let config = ProviderConfig::resolve_with(&json!({"access_token": "cfg-token"}), env).unwrap();
        assert_eq!(config.access_token, "cfg-token");
    }

    #[test]
    fn test_default_url() {
        let config = ProviderConfig::resolve_with(&json!({"access_token": "tok"}), no_env).unwrap();
        assert_eq!(config.api_url.as_str(), format!("{}/", DEFAULT_API_URL));
    }

    #[test]
    fn test_missing_token() {
        let err = ProviderConfig::resolve_with(&Value::Null, no_env).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.message().contains(ACCESS_TOKEN_ENV));

        let err = ProviderConfig::resolve_with(&json!({"access_token": "  "}), no_env).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_rejects_bad_url_and_timeout() {
        let err = ProviderConfig::resolve_with(
            &json!({"access_token": "tok", "api_url": "ftp://controller"}),
            no_env,
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));

        let err = ProviderConfig::resolve_with(
            &json!({"access_token": "tok", "request_timeout": 0}),
            no_env,
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[test]
    fn test_check_reports_attribute() {
        let diagnostics = ProviderConfig::check(&json!({"api_url": "not a url"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("api_url"));

        let diagnostics = ProviderConfig::check(&json!({"request_timeout": "soon"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("request_timeout"));

        assert!(ProviderConfig::check(&json!({})).is_empty());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ProviderConfig::resolve_with(&json!({"access_token": "secret"}), no_env).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
