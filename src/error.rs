use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No API endpoint set. Use --api or set it in {0}")]
    MissingApiEndpoint(String),

    #[error("No access token set. Use --token or set it in {0}")]
    MissingAccessToken(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Control-plane discovery errors (endpoint, credentials, application lookup)
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Server error from {url}: status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("App {0} not found")]
    AppNotFound(String),
}

/// SSH-related errors raised by the session engine
#[derive(Error, Debug)]
pub enum SshError {
    #[error("Connection failed to {host}:{port}: {reason}")]
    ConnectionFailed {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Timeout connecting to {0}")]
    Timeout(String),

    #[error("Host key verification failed: {0}")]
    HostKeyVerification(String),

    #[error("Invalid SSH endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("Failed to listen on {address}: {source}")]
    ForwardBind {
        address: String,
        source: std::io::Error,
    },

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("russh error: {0}")]
    Russh(String),
}

impl From<russh::Error> for SshError {
    fn from(err: russh::Error) -> Self {
        SshError::Russh(err.to_string())
    }
}

/// One-time code exchange failed
#[derive(Error, Debug)]
#[error("{0}")]
pub struct AuthError(pub String);

/// Errors from local resources used by the external client path
#[derive(Error, Debug)]
pub enum LocalResourceError {
    #[error("Failed to create temporary directory: {0}")]
    TempDir(std::io::Error),

    #[error("Failed to write identity file '{path}': {source}")]
    WriteKey {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// Key material may still be on disk. Never downgraded.
    #[error("Failed to remove '{path}', private key material may remain on disk: {source}")]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Top-level failure of an `ssh` invocation
#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Error authenticating: {0}")]
    Auth(String),

    #[error("Error opening SSH connection: {0}")]
    Connection(String),

    #[error(transparent)]
    LocalResource(#[from] LocalResourceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<AuthError> for CommandError {
    fn from(err: AuthError) -> Self {
        CommandError::Auth(err.0)
    }
}

impl From<SshError> for CommandError {
    fn from(err: SshError) -> Self {
        match err {
            SshError::AuthenticationFailed(_) | SshError::HostKeyVerification(_) => {
                CommandError::Auth(err.to_string())
            }
            other => CommandError::Connection(other.to_string()),
        }
    }
}

impl CommandError {
    /// Exit code used for every failure that is not a remote exit status.
    pub const GENERIC_FAILURE: i32 = 1;

    /// True when this error means key material may have been left on disk.
    pub fn is_cleanup_failure(&self) -> bool {
        matches!(
            self,
            CommandError::LocalResource(LocalResourceError::Cleanup { .. })
        )
    }
}
