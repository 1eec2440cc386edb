//! Security event logging for audit trails.
//!
//! Structured events for authentication, host key verification, staged key
//! material and tunnels. All events use `target: "security"` so they can be
//! filtered on their own:
//!
//! ```bash
//! RUST_LOG=security=info appssh ssh my-app
//! ```
//!
//! Secrets (one-time codes, private keys, access tokens) are never logged.

use std::path::Path;

use tracing::{info, warn};

/// Log an SSH authentication attempt.
pub fn log_auth_attempt(host: &str, port: u16, username: &str, method: &str) {
    info!(
        target: "security",
        event = "auth_attempt",
        host = %host,
        port = port,
        username = %username,
        method = %method,
        "SSH authentication attempt"
    );
}

/// Log a successful SSH authentication.
pub fn log_auth_success(host: &str, port: u16, username: &str, method: &str) {
    info!(
        target: "security",
        event = "auth_success",
        host = %host,
        port = port,
        username = %username,
        method = %method,
        "SSH authentication succeeded"
    );
}

/// Log a failed SSH authentication attempt.
pub fn log_auth_failure(host: &str, port: u16, username: &str, method: &str, reason: &str) {
    warn!(
        target: "security",
        event = "auth_failure",
        host = %host,
        port = port,
        username = %username,
        method = %method,
        reason = %reason,
        "SSH authentication failed"
    );
}

/// Log a host key that matched the expected fingerprint.
pub fn log_host_key_accepted(host: &str, port: u16, fingerprint: &str) {
    info!(
        target: "security",
        event = "host_key_accepted",
        host = %host,
        port = port,
        fingerprint = %fingerprint,
        "Host key matches expected fingerprint"
    );
}

/// Log a host key that did not match the expected fingerprint.
pub fn log_host_key_mismatch(host: &str, port: u16, expected: &str, actual: &str) {
    warn!(
        target: "security",
        event = "host_key_mismatch",
        host = %host,
        port = port,
        expected = %expected,
        actual = %actual,
        "Host key does NOT match expected fingerprint"
    );
}

/// Log that host key validation was skipped on request.
pub fn log_host_key_validation_skipped(host: &str, port: u16, fingerprint: &str) {
    warn!(
        target: "security",
        event = "host_key_validation_skipped",
        host = %host,
        port = port,
        fingerprint = %fingerprint,
        "Host key validation skipped"
    );
}

/// Log that private key material was written to disk.
pub fn log_key_staged(path: &Path) {
    info!(
        target: "security",
        event = "key_staged",
        path = %path.display(),
        "Private key staged on disk"
    );
}

/// Log that staged private key material was removed.
pub fn log_key_removed(path: &Path) {
    info!(
        target: "security",
        event = "key_removed",
        path = %path.display(),
        "Staged private key removed"
    );
}

/// Log a staged private key that could not be removed.
pub fn log_key_cleanup_failed(path: &Path, reason: &str) {
    warn!(
        target: "security",
        event = "key_cleanup_failed",
        path = %path.display(),
        reason = %reason,
        "Failed to remove staged private key material"
    );
}

/// Log a local port forward listener being opened.
pub fn log_forward_opened(bind: &str, target: &str) {
    info!(
        target: "security",
        event = "forward_opened",
        bind = %bind,
        destination = %target,
        "Local port forward listening"
    );
}

/// Log SSH disconnection.
pub fn log_ssh_disconnect(host: &str, port: u16) {
    info!(
        target: "security",
        event = "ssh_disconnect",
        host = %host,
        port = port,
        "SSH connection closed"
    );
}
