//! Host key pinning tests

use appssh::error::SshError;
use appssh::ssh::fingerprint::{FingerprintKind, fingerprint_of};

use super::fixtures::{TEST_CODE, TEST_USER, TestProxy, client, code};

#[tokio::test]
async fn test_matching_sha256_fingerprint_connects() {
    let proxy = TestProxy::start().await;

    let shell = client()
        .connect(&proxy.endpoint(&proxy.fingerprint()), TEST_USER, code(TEST_CODE), false)
        .await
        .expect("Pinned key should be accepted");
    shell.close().await;
}

#[tokio::test]
async fn test_matching_md5_fingerprint_connects() {
    let proxy = TestProxy::start().await;
    let blob = proxy.host_key.public_key().to_bytes().unwrap();
    let md5 = fingerprint_of(FingerprintKind::Md5, &blob).to_uppercase();

    let shell = client()
        .connect(&proxy.endpoint(&md5), TEST_USER, code(TEST_CODE), false)
        .await
        .expect("Upper-case MD5 pin should be accepted");
    shell.close().await;
}

#[tokio::test]
async fn test_fingerprint_mismatch_is_rejected() {
    let proxy = TestProxy::start().await;
    let wrong = "a6:d1:08:da:0c:3e:bf:5f:06:d4:f9:d3:7b:44:a8:52";

    let err = client()
        .connect(&proxy.endpoint(wrong), TEST_USER, code(TEST_CODE), false)
        .await
        .unwrap_err();
    assert!(
        matches!(err, SshError::HostKeyVerification(_)),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_unsupported_fingerprint_format_is_rejected() {
    let proxy = TestProxy::start().await;

    let err = client()
        .connect(&proxy.endpoint("not-a-fingerprint"), TEST_USER, code(TEST_CODE), false)
        .await
        .unwrap_err();
    assert!(matches!(err, SshError::HostKeyVerification(_)));
}

#[tokio::test]
async fn test_skip_host_validation_ignores_mismatch() {
    let proxy = TestProxy::start().await;
    let wrong = "a6:d1:08:da:0c:3e:bf:5f:06:d4:f9:d3:7b:44:a8:52";

    let shell = client()
        .connect(&proxy.endpoint(wrong), TEST_USER, code(TEST_CODE), true)
        .await
        .expect("Skipping validation should accept any key");
    shell.close().await;
}
