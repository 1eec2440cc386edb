use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

/// Execution environment an application runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Substrate {
    /// Per-instance credentials, external `ssh` client
    Legacy,
    /// Platform SSH proxy with one-time codes
    Orchestrated,
}

/// Application as returned by the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub guid: String,
    pub name: String,
    pub diego: bool,
}

impl Application {
    pub fn instance(self, instance_index: u32) -> ApplicationInstance {
        ApplicationInstance {
            guid: self.guid,
            name: self.name,
            diego: self.diego,
            instance_index,
        }
    }
}

/// The instance targeted by one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInstance {
    pub guid: String,
    pub name: String,
    pub diego: bool,
    pub instance_index: u32,
}

impl ApplicationInstance {
    pub fn substrate(&self) -> Substrate {
        if self.diego {
            Substrate::Orchestrated
        } else {
            Substrate::Legacy
        }
    }
}

/// Per-instance credentials for the legacy substrate.
///
/// Fetched fresh for every invocation and never persisted, except for the
/// staged identity file owned by the launcher.
#[derive(Debug, Deserialize)]
pub struct SshConnectionDetails {
    pub ip: String,
    pub port: u16,
    pub user: String,
    #[serde(rename = "sshkey", deserialize_with = "deserialize_secret")]
    pub ssh_key: SecretString,
}

/// Platform SSH proxy address and its expected host key fingerprint
#[derive(Debug, Clone, Deserialize)]
pub struct SshEndpointInfo {
    #[serde(rename = "app_ssh_endpoint")]
    pub endpoint: String,
    #[serde(rename = "app_ssh_host_key_fingerprint", default)]
    pub host_key_fingerprint: String,
}

/// Single-use bearer code exchanged during SSH authentication.
///
/// Deliberately not `Clone`: consuming it moves it.
#[derive(Debug)]
pub struct OneTimeCode(SecretString);

impl OneTimeCode {
    pub fn new(code: SecretString) -> Self {
        Self(code)
    }

    pub fn into_secret(self) -> SecretString {
        self.0
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(SecretString::from(String::deserialize(deserializer)?))
}

/// `GET /v2/apps?q=name:...` response envelope
#[derive(Debug, Deserialize)]
pub(crate) struct AppsPage {
    #[serde(default)]
    pub resources: Vec<AppResource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AppResource {
    pub metadata: AppMetadata,
    pub entity: AppEntity,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AppMetadata {
    pub guid: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AppEntity {
    pub name: String,
    #[serde(default)]
    pub diego: bool,
}

impl From<AppResource> for Application {
    fn from(resource: AppResource) -> Self {
        Self {
            guid: resource.metadata.guid,
            name: resource.entity.name,
            diego: resource.entity.diego,
        }
    }
}
