use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Config};
use secrecy::ExposeSecret;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::api::{OneTimeCode, SshEndpointInfo};
use crate::error::SshError;
use crate::security_log;

use super::handler::ClientHandler;
use super::session::SecureShell;

const AUTH_METHOD: &str = "password";

/// SSH client for the platform proxy
pub struct SshClient {
    config: Arc<Config>,
    connection_timeout: Duration,
}

impl SshClient {
    pub fn new(connection_timeout: Duration, keepalive_interval: Option<Duration>) -> Self {
        // No inactivity timeout: forwards may sit idle indefinitely
        let config = Config {
            inactivity_timeout: None,
            keepalive_interval,
            keepalive_max: 3,
            ..Default::default()
        };

        Self {
            config: Arc::new(config),
            connection_timeout,
        }
    }

    /// Dial the proxy, verify its host key and authenticate with the one-time code.
    ///
    /// Dial, handshake and the password exchange share one time budget. The
    /// code is consumed by the single password attempt; there is no retry.
    pub async fn connect(
        &self,
        endpoint: &SshEndpointInfo,
        username: &str,
        code: OneTimeCode,
        skip_host_validation: bool,
    ) -> Result<SecureShell, SshError> {
        let (host, port) = split_endpoint(&endpoint.endpoint)?;

        let handle = timeout(
            self.connection_timeout,
            self.establish(&host, port, endpoint, username, code, skip_host_validation),
        )
        .await
        .map_err(|_| {
            tracing::warn!("Connecting to {} timed out", endpoint.endpoint);
            SshError::Timeout(endpoint.endpoint.clone())
        })??;

        tracing::info!("SSH connection established to {}:{}", host, port);
        Ok(SecureShell::new(handle, host, port))
    }

    async fn establish(
        &self,
        host: &str,
        port: u16,
        endpoint: &SshEndpointInfo,
        username: &str,
        code: OneTimeCode,
        skip_host_validation: bool,
    ) -> Result<client::Handle<ClientHandler>, SshError> {
        let mut handle = self
            .handshake(host, port, &endpoint.host_key_fingerprint, skip_host_validation)
            .await?;

        security_log::log_auth_attempt(host, port, username, AUTH_METHOD);

        let secret = code.into_secret();
        let auth_result = match handle
            .authenticate_password(username, secret.expose_secret())
            .await
        {
            Ok(result) => result,
            Err(e) => {
                let reason = e.to_string();
                security_log::log_auth_failure(host, port, username, AUTH_METHOD, &reason);
                return Err(SshError::AuthenticationFailed(reason));
            }
        };

        if !auth_result.success() {
            let reason = "One-time code rejected by server";
            security_log::log_auth_failure(host, port, username, AUTH_METHOD, reason);
            return Err(SshError::AuthenticationFailed(reason.to_string()));
        }

        security_log::log_auth_success(host, port, username, AUTH_METHOD);
        Ok(handle)
    }

    async fn handshake(
        &self,
        host: &str,
        port: u16,
        expected_fingerprint: &str,
        skip_host_validation: bool,
    ) -> Result<client::Handle<ClientHandler>, SshError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| SshError::ConnectionFailed {
                host: host.to_string(),
                port,
                reason: e.to_string(),
            })?;

        let handler = ClientHandler::new(
            host.to_string(),
            port,
            expected_fingerprint.to_string(),
            skip_host_validation,
        );

        client::connect_stream(self.config.clone(), stream, handler)
            .await
            .map_err(|e| match e {
                SshError::HostKeyVerification(_) => e,
                other => SshError::ConnectionFailed {
                    host: host.to_string(),
                    port,
                    reason: other.to_string(),
                },
            })
    }

    #[cfg(test)]
    fn config(&self) -> &Config {
        &self.config
    }
}

/// Split `host:port` (or `[v6]:port`) into its parts.
pub fn split_endpoint(endpoint: &str) -> Result<(String, u16), SshError> {
    let invalid = || SshError::InvalidEndpoint(endpoint.to_string());

    let (host, port) = endpoint.rsplit_once(':').ok_or_else(invalid)?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() || (host.contains(':') && !endpoint.starts_with('[')) {
        return Err(invalid());
    }

    let port = port.parse::<u16>().map_err(|_| invalid())?;
    Ok((host.to_string(), port))
}
