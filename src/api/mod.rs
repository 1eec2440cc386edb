//! Control-plane access for the SSH subsystem
//!
//! Endpoint discovery, application lookup and one-time code issuance.
//! Each operation is a single authenticated request with no retry.

pub mod client;
pub mod models;
pub mod oauth;

pub use client::ControlPlaneClient;
pub use models::{
    Application, ApplicationInstance, OneTimeCode, SshConnectionDetails, SshEndpointInfo,
    Substrate,
};
pub use oauth::UaaCodeProvider;

use crate::error::{AuthError, ResolutionError};

/// Resolves where and how to connect to an application instance
#[allow(async_fn_in_trait)]
pub trait EndpointResolver {
    /// Per-instance address and credential for the legacy substrate.
    async fn resolve_legacy(
        &self,
        app_guid: &str,
        instance_index: u32,
    ) -> Result<SshConnectionDetails, ResolutionError>;

    /// Platform SSH proxy address and expected host key fingerprint.
    async fn resolve_orchestrated(&self) -> Result<SshEndpointInfo, ResolutionError>;
}

/// Looks up applications by name
#[allow(async_fn_in_trait)]
pub trait AppRepository {
    async fn find_app(&self, name: &str) -> Result<Application, ResolutionError>;
}

/// Issues single-use SSH authorization codes
#[allow(async_fn_in_trait)]
pub trait OneTimeCodeProvider {
    async fn get(&self) -> Result<OneTimeCode, AuthError>;
}

impl<T: EndpointResolver> EndpointResolver for std::sync::Arc<T> {
    async fn resolve_legacy(
        &self,
        app_guid: &str,
        instance_index: u32,
    ) -> Result<SshConnectionDetails, ResolutionError> {
        (**self).resolve_legacy(app_guid, instance_index).await
    }

    async fn resolve_orchestrated(&self) -> Result<SshEndpointInfo, ResolutionError> {
        (**self).resolve_orchestrated().await
    }
}
