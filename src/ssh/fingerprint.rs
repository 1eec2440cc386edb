//! Host key fingerprint matching against the control plane's advertised value.
//!
//! The expected fingerprint may be an MD5 or SHA-1 colon-separated hex digest
//! or an unpadded base64 SHA-256 digest (optionally prefixed `SHA256:`).

use data_encoding::{BASE64_NOPAD, HEXLOWER};
use md5::{Digest, Md5};
use russh::keys::PublicKey;
use sha1::Sha1;
use sha2::Sha256;

const MD5_FINGERPRINT_LENGTH: usize = 47;
const SHA1_FINGERPRINT_LENGTH: usize = 59;
const SHA256_FINGERPRINT_LENGTH: usize = 43;

/// Digest algorithm implied by the expected fingerprint's shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintKind {
    Md5,
    Sha1,
    Sha256,
}

impl FingerprintKind {
    /// Classify an expected fingerprint, or `None` if the shape is unknown.
    pub fn detect(expected: &str) -> Option<Self> {
        if let Some(rest) = expected.strip_prefix("SHA256:") {
            return (rest.len() == SHA256_FINGERPRINT_LENGTH).then_some(Self::Sha256);
        }
        let expected = expected.strip_prefix("MD5:").unwrap_or(expected);
        match expected.len() {
            MD5_FINGERPRINT_LENGTH => Some(Self::Md5),
            SHA1_FINGERPRINT_LENGTH => Some(Self::Sha1),
            SHA256_FINGERPRINT_LENGTH => Some(Self::Sha256),
            _ => None,
        }
    }
}

/// Fingerprint of an encoded public key blob in the given form.
pub fn fingerprint_of(kind: FingerprintKind, key_blob: &[u8]) -> String {
    match kind {
        FingerprintKind::Md5 => colon_hex(&Md5::digest(key_blob)),
        FingerprintKind::Sha1 => colon_hex(&Sha1::digest(key_blob)),
        FingerprintKind::Sha256 => BASE64_NOPAD.encode(&Sha256::digest(key_blob)),
    }
}

fn colon_hex(digest: &[u8]) -> String {
    digest
        .iter()
        .map(|b| HEXLOWER.encode(&[*b]))
        .collect::<Vec<_>>()
        .join(":")
}

/// Outcome of comparing a presented key with the expected fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerprintCheck {
    Match,
    Mismatch { actual: String },
    UnsupportedFormat,
}

/// Compare the presented key blob with the expected fingerprint.
pub fn check_blob(expected: &str, key_blob: &[u8]) -> FingerprintCheck {
    let expected = expected.trim();
    let Some(kind) = FingerprintKind::detect(expected) else {
        return FingerprintCheck::UnsupportedFormat;
    };

    let actual = fingerprint_of(kind, key_blob);
    let normalized = expected
        .strip_prefix("SHA256:")
        .or_else(|| expected.strip_prefix("MD5:"))
        .unwrap_or(expected);

    let matches = match kind {
        // Hex digests are case-insensitive, base64 is not
        FingerprintKind::Md5 | FingerprintKind::Sha1 => normalized.eq_ignore_ascii_case(&actual),
        FingerprintKind::Sha256 => normalized == actual,
    };

    if matches {
        FingerprintCheck::Match
    } else {
        FingerprintCheck::Mismatch { actual }
    }
}

/// Compare a server public key with the expected fingerprint.
pub fn check_key(expected: &str, key: &PublicKey) -> FingerprintCheck {
    match key.to_bytes() {
        Ok(blob) => check_blob(expected, &blob),
        Err(e) => {
            tracing::warn!("Failed to encode server host key: {}", e);
            FingerprintCheck::Mismatch {
                actual: display_fingerprint(key),
            }
        }
    }
}

/// SHA-256 fingerprint for diagnostics
pub fn display_fingerprint(key: &PublicKey) -> String {
    key.fingerprint(russh::keys::HashAlg::Sha256).to_string()
}
