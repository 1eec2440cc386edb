//! CLI argument parsing with clap derive

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use secrecy::SecretString;

use crate::commands::{self, ssh::Outcome};
use crate::config::AppConfig;
use crate::config::paths::expand_tilde;
use crate::config::settings::Overrides;
use crate::error::CommandError;
use crate::ssh::{LocalForward, SshOptions, TtyPolicy};

/// Shell and tunnel access to application instances
#[derive(Parser, Debug)]
#[command(
    name = "appssh",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Control-plane API endpoint
    #[arg(long = "api", global = true, env = "APPSSH_API")]
    pub api: Option<String>,

    /// Access token sent with every control-plane request
    #[arg(long, global = true, env = "APPSSH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Authorization server issuing one-time SSH codes
    #[arg(long = "auth-endpoint", global = true, env = "APPSSH_AUTH_ENDPOINT")]
    pub auth_endpoint: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// SSH to an application container instance
    Ssh(SshArgs),
}

/// Arguments for the ssh command.
#[derive(Args, Debug)]
pub struct SshArgs {
    /// Name of the application
    #[arg(value_name = "APP_NAME")]
    pub app_name: String,

    /// Application instance index
    #[arg(short = 'i', long = "app-instance-index", default_value_t = 0)]
    pub app_instance_index: u32,

    /// Instance index on the legacy substrate
    #[arg(long = "instance", value_name = "N")]
    pub instance: Option<u32>,

    /// Remote command to run instead of a shell (repeatable, joined with spaces)
    #[arg(
        short = 'c',
        long = "command",
        value_name = "COMMAND",
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,

    /// Local port forward: [bind_address:]port:host:hostport (repeatable)
    #[arg(short = 'L', long = "local-forward", value_name = "SPEC", value_parser = parse_forward)]
    pub local_forward: Vec<LocalForward>,

    /// Skip host key validation
    #[arg(short = 'k', long = "skip-host-validation")]
    pub skip_host_validation: bool,

    /// Do not open a shell or run a command; only forward ports
    #[arg(short = 'N', long = "skip-remote-execution")]
    pub skip_remote_execution: bool,

    /// Request a pseudo-tty (-tt forces one)
    #[arg(short = 't', long = "request-pseudo-tty", action = ArgAction::Count)]
    pub request_pseudo_tty: u8,

    /// Force pseudo-tty allocation even without a local terminal
    #[arg(long = "force-pseudo-tty", conflicts_with = "disable_pseudo_tty")]
    pub force_pseudo_tty: bool,

    /// Disable pseudo-tty allocation
    #[arg(
        short = 'T',
        long = "disable-pseudo-tty",
        conflicts_with = "request_pseudo_tty"
    )]
    pub disable_pseudo_tty: bool,
}

fn parse_forward(spec: &str) -> Result<LocalForward, String> {
    spec.parse()
}

impl SshArgs {
    pub fn tty_policy(&self) -> TtyPolicy {
        if self.disable_pseudo_tty {
            TtyPolicy::Disable
        } else if self.force_pseudo_tty || self.request_pseudo_tty >= 2 {
            TtyPolicy::Force
        } else if self.request_pseudo_tty == 1 {
            TtyPolicy::Request
        } else {
            TtyPolicy::Auto
        }
    }

    pub fn into_options(self) -> SshOptions {
        let tty = self.tty_policy();
        SshOptions {
            app_name: self.app_name,
            instance_index: self.app_instance_index,
            legacy_instance_index: self.instance,
            commands: self.command,
            forwards: self.local_forward,
            skip_host_validation: self.skip_host_validation,
            skip_remote_execution: self.skip_remote_execution,
            tty,
        }
    }
}

impl Cli {
    /// Execute the CLI command.
    pub async fn run(self) -> Result<Outcome, CommandError> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load_from(&expand_tilde(&path.to_string_lossy()))?,
            None => AppConfig::load()?,
        };
        config.apply_overrides(Overrides {
            api_endpoint: self.api,
            access_token: self.token.map(SecretString::from),
            authorization_endpoint: self.auth_endpoint,
        });

        match self.command {
            Command::Ssh(args) => {
                let options = args.into_options();
                let command = commands::build(&config)?;
                commands::ssh::run(command.apps.as_ref(), &command.dispatcher, &options).await
            }
        }
    }
}
