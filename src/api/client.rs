use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::error::ResolutionError;

use super::models::{AppsPage, Application, SshConnectionDetails, SshEndpointInfo};
use super::{AppRepository, EndpointResolver};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticated reader for the control-plane API.
///
/// Every call is a single GET; failures are returned as-is, never retried.
pub struct ControlPlaneClient {
    http: reqwest::Client,
    api_endpoint: String,
    access_token: SecretString,
    space_guid: Option<String>,
}

impl std::fmt::Debug for ControlPlaneClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlaneClient")
            .field("api_endpoint", &self.api_endpoint)
            .field("access_token", &"[REDACTED]")
            .field("space_guid", &self.space_guid)
            .finish()
    }
}

impl ControlPlaneClient {
    pub fn new(
        api_endpoint: impl Into<String>,
        access_token: SecretString,
        space_guid: Option<String>,
    ) -> Result<Self, ResolutionError> {
        let api_endpoint = api_endpoint.into();
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ResolutionError::Request {
                url: api_endpoint.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            api_endpoint: api_endpoint.trim_end_matches('/').to_string(),
            access_token,
            space_guid,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ResolutionError> {
        let url = format!("{}{}", self.api_endpoint, path);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, self.access_token.expose_secret())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ResolutionError::Request {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolutionError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ResolutionError::Decode {
                url,
                reason: e.to_string(),
            })
    }
}

impl EndpointResolver for ControlPlaneClient {
    async fn resolve_legacy(
        &self,
        app_guid: &str,
        instance_index: u32,
    ) -> Result<SshConnectionDetails, ResolutionError> {
        self.get_json(&format!(
            "/v2/apps/{}/instances/{}/ssh",
            app_guid, instance_index
        ))
        .await
    }

    async fn resolve_orchestrated(&self) -> Result<SshEndpointInfo, ResolutionError> {
        self.get_json("/v2/info").await
    }
}

impl AppRepository for ControlPlaneClient {
    async fn find_app(&self, name: &str) -> Result<Application, ResolutionError> {
        let query = url::form_urlencoded::byte_serialize(format!("name:{}", name).as_bytes())
            .collect::<String>();
        let path = match &self.space_guid {
            Some(space) => format!("/v2/spaces/{}/apps?q={}", space, query),
            None => format!("/v2/apps?q={}", query),
        };

        let page: AppsPage = self.get_json(&path).await?;
        page.resources
            .into_iter()
            .next()
            .map(Application::from)
            .ok_or_else(|| ResolutionError::AppNotFound(name.to_string()))
    }
}
