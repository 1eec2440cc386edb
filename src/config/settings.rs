use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Settings stored in config.toml
#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub ssh: SshDefaults,
}

impl AppConfig {
    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match super::paths::config_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(ConfigError::Parse)
    }

    /// Apply command-line and environment overrides on top of the file values.
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(api) = overrides.api_endpoint {
            self.target.api_endpoint = Some(api);
        }
        if let Some(token) = overrides.access_token {
            self.target.access_token = Some(token);
        }
        if let Some(auth) = overrides.authorization_endpoint {
            self.target.authorization_endpoint = Some(auth);
        }
    }

    /// Display name of the config file for error messages
    pub fn location_hint() -> String {
        super::paths::config_file()
            .unwrap_or_else(|| PathBuf::from("config.toml"))
            .display()
            .to_string()
    }
}

/// Values that take precedence over the config file
#[derive(Debug, Default)]
pub struct Overrides {
    pub api_endpoint: Option<String>,
    pub access_token: Option<SecretString>,
    pub authorization_endpoint: Option<String>,
}

fn default_oauth_client() -> String {
    "ssh-proxy".to_string()
}

/// Control-plane target the CLI talks to
#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub access_token: Option<SecretString>,
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    #[serde(default = "default_oauth_client")]
    pub ssh_oauth_client: String,
    #[serde(default)]
    pub space_guid: Option<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            api_endpoint: None,
            access_token: None,
            authorization_endpoint: None,
            ssh_oauth_client: default_oauth_client(),
            space_guid: None,
        }
    }
}

impl TargetConfig {
    /// API endpoint with any trailing slash removed.
    pub fn require_api_endpoint(&self) -> Result<String, ConfigError> {
        let raw = self
            .api_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingApiEndpoint(AppConfig::location_hint()))?;
        validate_url(raw)?;
        Ok(raw.trim_end_matches('/').to_string())
    }

    pub fn require_access_token(&self) -> Result<&SecretString, ConfigError> {
        self.access_token
            .as_ref()
            .ok_or_else(|| ConfigError::MissingAccessToken(AppConfig::location_hint()))
    }
}

fn validate_url(raw: &str) -> Result<(), ConfigError> {
    let url = url::Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

fn default_timeout() -> u64 {
    30
}

fn default_keepalive() -> u64 {
    30
}

fn default_ssh_program() -> String {
    "ssh".to_string()
}

fn default_term() -> String {
    "xterm".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshDefaults {
    #[serde(default = "default_timeout")]
    pub connection_timeout_secs: u64,
    #[serde(default = "default_keepalive")]
    pub keepalive_interval_secs: u64,
    /// External client used for the legacy substrate
    #[serde(default = "default_ssh_program")]
    pub ssh_program: String,
    /// Terminal type sent with a pty request when $TERM is unset
    #[serde(default = "default_term")]
    pub default_term: String,
}

impl Default for SshDefaults {
    fn default() -> Self {
        Self {
            connection_timeout_secs: default_timeout(),
            keepalive_interval_secs: default_keepalive(),
            ssh_program: default_ssh_program(),
            default_term: default_term(),
        }
    }
}

impl SshDefaults {
    pub fn connection_timeout(&self) -> Result<Duration, ConfigError> {
        if self.connection_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ssh.connection_timeout_secs".to_string(),
                reason: "must be at least 1 second".to_string(),
            });
        }
        Ok(Duration::from_secs(self.connection_timeout_secs))
    }

    /// Zero means "no keepalive"
    pub fn keepalive_interval(&self) -> Option<Duration> {
        if self.keepalive_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.keepalive_interval_secs))
        }
    }
}
