use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, LOCATION};
use reqwest::redirect::Policy;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::AuthError;

use super::OneTimeCodeProvider;
use super::models::OneTimeCode;

/// Requests a one-time SSH authorization code from the login server.
///
/// The code arrives as the `code` query parameter of the redirect issued by
/// `/oauth/authorize`; redirects are therefore never followed.
pub struct UaaCodeProvider {
    http: reqwest::Client,
    authorization_endpoint: Option<String>,
    client_id: String,
    access_token: SecretString,
}

impl UaaCodeProvider {
    /// A missing authorization endpoint only fails when a code is requested.
    pub fn new(
        authorization_endpoint: Option<String>,
        client_id: impl Into<String>,
        access_token: SecretString,
    ) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| AuthError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            authorization_endpoint: authorization_endpoint
                .map(|endpoint| endpoint.trim_end_matches('/').to_string()),
            client_id: client_id.into(),
            access_token,
        })
    }

    fn authorize_url(&self) -> Result<Url, AuthError> {
        let endpoint = self.authorization_endpoint.as_deref().ok_or_else(|| {
            AuthError("No authorization endpoint set. Use --auth-endpoint".to_string())
        })?;
        let mut url = Url::parse(&format!("{}/oauth/authorize", endpoint))
            .map_err(|e| AuthError(format!("Invalid authorization endpoint: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("grant_type", "authorization_code")
            .append_pair("client_id", &self.client_id);
        Ok(url)
    }
}

impl OneTimeCodeProvider for UaaCodeProvider {
    async fn get(&self) -> Result<OneTimeCode, AuthError> {
        let url = self.authorize_url()?;

        let response = self
            .http
            .get(url.clone())
            .header(AUTHORIZATION, self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| AuthError(format!("Failed to request one-time code: {}", e)))?;

        if response.status() != StatusCode::FOUND {
            return Err(AuthError(format!(
                "Unexpected response from authorization server: {}",
                response.status()
            )));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AuthError("Authorization response has no Location".to_string()))?;

        code_from_location(&url, location)
            .map(|code| OneTimeCode::new(SecretString::from(code)))
    }
}

fn code_from_location(base: &Url, location: &str) -> Result<String, AuthError> {
    let redirect = base
        .join(location)
        .map_err(|e| AuthError(format!("Invalid redirect location: {}", e)))?;

    redirect
        .query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AuthError("Authorization server did not return a code".to_string()))
}
