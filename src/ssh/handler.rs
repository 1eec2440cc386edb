use std::future::Future;

use russh::client::Handler;
use russh::keys::PublicKey;

use crate::error::SshError;
use crate::security_log;

use super::fingerprint::{self, FingerprintCheck};

/// SSH client handler that pins the proxy's host key to the advertised fingerprint
pub struct ClientHandler {
    host: String,
    port: u16,
    expected_fingerprint: String,
    skip_host_validation: bool,
}

impl ClientHandler {
    pub fn new(
        host: String,
        port: u16,
        expected_fingerprint: String,
        skip_host_validation: bool,
    ) -> Self {
        Self {
            host,
            port,
            expected_fingerprint,
            skip_host_validation,
        }
    }

    fn verify(&self, key: &PublicKey) -> Result<bool, SshError> {
        if self.skip_host_validation {
            security_log::log_host_key_validation_skipped(
                &self.host,
                self.port,
                &fingerprint::display_fingerprint(key),
            );
            return Ok(true);
        }

        match fingerprint::check_key(&self.expected_fingerprint, key) {
            FingerprintCheck::Match => {
                security_log::log_host_key_accepted(
                    &self.host,
                    self.port,
                    &self.expected_fingerprint,
                );
                Ok(true)
            }
            FingerprintCheck::Mismatch { actual } => {
                security_log::log_host_key_mismatch(
                    &self.host,
                    self.port,
                    &self.expected_fingerprint,
                    &actual,
                );
                Err(SshError::HostKeyVerification(
                    "Host key fingerprint mismatch".to_string(),
                ))
            }
            FingerprintCheck::UnsupportedFormat => Err(SshError::HostKeyVerification(
                "Unsupported host key fingerprint format".to_string(),
            )),
        }
    }
}

impl Handler for ClientHandler {
    type Error = SshError;

    fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        let result = self.verify(server_public_key);
        async move { result }
    }
}
