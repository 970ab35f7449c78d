//! Configuration loading and credential resolution.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::protocol::Credential;

/// Top-level Tether configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket endpoint of the orchestrator, e.g. `ws://localhost:8000/ws/agent`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<CredentialsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Credentials presented in the auth request.
///
/// The token may be given directly or through an environment variable;
/// the direct value takes priority.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

impl CredentialsConfig {
    /// Resolve the auth token from direct value or env var.
    pub fn resolve_token(&self) -> Option<String> {
        resolve_secret_field(&self.token, &self.token_env)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter directive, e.g. "info" or "tether_client=debug".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// Resolve a secret: check the direct field first, then the named environment variable.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::TetherError::Io)?;

        // Substitute ${ENV_VAR} references before parsing
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::TetherError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Build the credential from config, if both fields resolve.
    pub fn credential(&self) -> Option<Credential> {
        let creds = self.credentials.as_ref()?;
        Some(Credential {
            name: creds.name.clone()?,
            token: creds.resolve_token()?,
        })
    }

    /// Log filter directive, defaulting to "info".
    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_TETHER_SUB", "ws://example:9/ws") };
        let input = r#"{"endpoint": "${TEST_TETHER_SUB}"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains("ws://example:9/ws"));
        unsafe { std::env::remove_var("TEST_TETHER_SUB") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"endpoint": "${NONEXISTENT_VAR_TETHER_TEST}"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains(r#""""#)); // empty string
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let config = Config::load(Path::new("/nonexistent/tether.json")).unwrap();
        assert!(config.endpoint.is_none());
        assert!(config.credential().is_none());
    }

    #[test]
    fn test_load_json5_with_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                // orchestrator to tether to
                endpoint: "ws://localhost:8000/ws/agent",
                credentials: { name: "Fake Client", token: "fake-token" },
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("ws://localhost:8000/ws/agent"));
        let credential = config.credential().unwrap();
        assert_eq!(credential.name, "Fake Client");
        assert_eq!(credential.token, "fake-token");
    }

    #[test]
    fn test_resolve_token_direct_over_env() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_TETHER_TOKEN", "from-env") };
        let creds = CredentialsConfig {
            name: Some("agent".into()),
            token: Some("direct".into()),
            token_env: Some("TEST_TETHER_TOKEN".into()),
        };
        assert_eq!(creds.resolve_token(), Some("direct".into()));

        let creds_env_only = CredentialsConfig {
            name: Some("agent".into()),
            token: None,
            token_env: Some("TEST_TETHER_TOKEN".into()),
        };
        assert_eq!(creds_env_only.resolve_token(), Some("from-env".into()));
        unsafe { std::env::remove_var("TEST_TETHER_TOKEN") };
    }

    #[test]
    fn test_credential_requires_both_fields() {
        let config = Config {
            credentials: Some(CredentialsConfig {
                name: Some("agent".into()),
                token: None,
                token_env: None,
            }),
            ..Default::default()
        };
        assert!(config.credential().is_none());
    }

    #[test]
    fn test_log_level_default() {
        assert_eq!(Config::default().log_level(), "info");
        let config = Config {
            logging: Some(LoggingConfig {
                level: Some("debug".into()),
            }),
            ..Default::default()
        };
        assert_eq!(config.log_level(), "debug");
    }
}
