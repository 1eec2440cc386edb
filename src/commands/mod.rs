//! Command implementations

pub mod ssh;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::api::{ControlPlaneClient, UaaCodeProvider};
use crate::config::AppConfig;
use crate::error::CommandError;
use crate::launcher::{LegacyLauncher, TokioProcessRunner};
use crate::ssh::{LocalTerminal, SshClient};

use self::ssh::{Dispatcher, ExternalClientPath, SessionEnginePath};

type Orchestrated = SessionEnginePath<Arc<ControlPlaneClient>, UaaCodeProvider, LocalTerminal>;
type Legacy = ExternalClientPath<Arc<ControlPlaneClient>, TokioProcessRunner>;

/// Fully wired `ssh` command
pub struct SshCommand {
    pub apps: Arc<ControlPlaneClient>,
    pub dispatcher: Dispatcher<Orchestrated, Legacy>,
}

/// Construct the `ssh` command and its dependencies from configuration.
pub fn build(config: &AppConfig) -> Result<SshCommand, CommandError> {
    let target = &config.target;
    let api_endpoint = target.require_api_endpoint()?;
    let access_token = target.require_access_token()?.expose_secret();

    let control_plane = Arc::new(ControlPlaneClient::new(
        api_endpoint,
        SecretString::from(access_token.to_string()),
        target.space_guid.clone(),
    )?);

    let codes = UaaCodeProvider::new(
        target.authorization_endpoint.clone(),
        target.ssh_oauth_client.clone(),
        SecretString::from(access_token.to_string()),
    )?;

    let client = SshClient::new(
        config.ssh.connection_timeout()?,
        config.ssh.keepalive_interval(),
    );

    let orchestrated = SessionEnginePath::new(
        control_plane.clone(),
        codes,
        client,
        LocalTerminal,
        config.ssh.default_term.clone(),
    );
    let legacy = ExternalClientPath::new(
        control_plane.clone(),
        LegacyLauncher::new(TokioProcessRunner, config.ssh.ssh_program.clone()),
    );

    Ok(SshCommand {
        apps: control_plane,
        dispatcher: Dispatcher::new(orchestrated, legacy),
    })
}
