//! `appssh ssh`: open a shell or tunnel into an application instance.
//!
//! The [`Dispatcher`] picks exactly one connection path from the
//! application's execution substrate. Both paths are constructor
//! parameters so tests can substitute them.

use crate::api::{
    AppRepository, ApplicationInstance, EndpointResolver, OneTimeCodeProvider, Substrate,
};
use crate::error::CommandError;
use crate::launcher::{LegacyLauncher, ProcessRunner};
use crate::ssh::{
    RemoteExit, SecureShell, SessionRequest, SshClient, SshOptions, TerminalControl, TerminalIo,
};

/// How an `ssh` invocation finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A remote (or external client) process ended with this status
    Exited(RemoteExit),
    /// Forward-only session ended without a remote process
    Completed,
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Exited(exit) => exit.code(),
            Outcome::Completed => 0,
        }
    }
}

/// Connection path for orchestrated instances
#[allow(async_fn_in_trait)]
pub trait OrchestratedPath {
    async fn run(
        &self,
        app: &ApplicationInstance,
        options: &SshOptions,
    ) -> Result<Outcome, CommandError>;
}

/// Connection path for legacy instances
#[allow(async_fn_in_trait)]
pub trait LegacyPath {
    async fn run(
        &self,
        app: &ApplicationInstance,
        options: &SshOptions,
    ) -> Result<Outcome, CommandError>;
}

/// Selects one connection path per invocation. There is no fallback.
pub struct Dispatcher<O, L> {
    orchestrated: O,
    legacy: L,
}

impl<O: OrchestratedPath, L: LegacyPath> Dispatcher<O, L> {
    pub fn new(orchestrated: O, legacy: L) -> Self {
        Self {
            orchestrated,
            legacy,
        }
    }

    pub async fn dispatch(
        &self,
        app: &ApplicationInstance,
        options: &SshOptions,
    ) -> Result<Outcome, CommandError> {
        eprintln!(
            "SSHing to application {}, instance {}...",
            app.name, app.instance_index
        );

        match app.substrate() {
            Substrate::Orchestrated => self.orchestrated.run(app, options).await,
            Substrate::Legacy => self.legacy.run(app, options).await,
        }
    }
}

/// Look the application up by name and dispatch to its path.
pub async fn run<A, O, L>(
    apps: &A,
    dispatcher: &Dispatcher<O, L>,
    options: &SshOptions,
) -> Result<Outcome, CommandError>
where
    A: AppRepository,
    O: OrchestratedPath,
    L: LegacyPath,
{
    let app = apps.find_app(&options.app_name).await?;
    let instance_index = if app.diego {
        options.instance_index
    } else {
        options.legacy_index()
    };

    dispatcher
        .dispatch(&app.instance(instance_index), options)
        .await
}

/// Username the platform proxy expects for an instance
pub fn proxy_username(app: &ApplicationInstance) -> String {
    format!("cf:{}/{}", app.guid, app.instance_index)
}

/// In-process SSH session through the platform proxy
pub struct SessionEnginePath<R, P, T> {
    resolver: R,
    codes: P,
    client: SshClient,
    terminal: T,
    default_term: String,
}

impl<R, P, T> SessionEnginePath<R, P, T> {
    pub fn new(
        resolver: R,
        codes: P,
        client: SshClient,
        terminal: T,
        default_term: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            codes,
            client,
            terminal,
            default_term: default_term.into(),
        }
    }
}

impl<R, P, T> OrchestratedPath for SessionEnginePath<R, P, T>
where
    R: EndpointResolver,
    P: OneTimeCodeProvider,
    T: TerminalControl,
{
    async fn run(
        &self,
        app: &ApplicationInstance,
        options: &SshOptions,
    ) -> Result<Outcome, CommandError> {
        let endpoint = self.resolver.resolve_orchestrated().await?;
        let code = self.codes.get().await?;

        let mut shell = self
            .client
            .connect(
                &endpoint,
                &proxy_username(app),
                code,
                options.skip_host_validation,
            )
            .await?;

        let result = self.drive(&mut shell, options).await;
        shell.close().await;
        result
    }
}

impl<R, P, T: TerminalControl> SessionEnginePath<R, P, T> {
    async fn drive(
        &self,
        shell: &mut SecureShell,
        options: &SshOptions,
    ) -> Result<Outcome, CommandError> {
        shell.forward_local(&options.forwards).await?;

        if options.skip_remote_execution {
            shell.wait().await;
            return Ok(Outcome::Completed);
        }

        let request = SessionRequest {
            command: options.remote_command(),
            tty: options.tty,
            term: crate::ssh::terminal::term_type(&self.default_term),
        };
        let exit = shell
            .interactive_session(&request, &self.terminal, TerminalIo::stdio())
            .await?;
        Ok(Outcome::Exited(exit))
    }
}

/// External `ssh` client with a staged per-instance key
pub struct ExternalClientPath<R, P> {
    resolver: R,
    launcher: LegacyLauncher<P>,
}

impl<R, P> ExternalClientPath<R, P> {
    pub fn new(resolver: R, launcher: LegacyLauncher<P>) -> Self {
        Self { resolver, launcher }
    }
}

impl<R: EndpointResolver, P: ProcessRunner> LegacyPath for ExternalClientPath<R, P> {
    async fn run(
        &self,
        app: &ApplicationInstance,
        _options: &SshOptions,
    ) -> Result<Outcome, CommandError> {
        let details = self
            .resolver
            .resolve_legacy(&app.guid, app.instance_index)
            .await?;
        let exit = self.launcher.launch(&details).await?;
        Ok(Outcome::Exited(exit))
    }
}
