//! Options for one `ssh` invocation and the pseudo-tty decision.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

/// Pseudo-tty allocation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtyPolicy {
    /// Allocate only for an interactive shell on a local terminal
    #[default]
    Auto,
    /// Allocate whenever local stdin is a terminal, even with a command
    Request,
    /// Always allocate
    Force,
    /// Never allocate
    Disable,
}

/// Decide whether the session channel asks for a pty.
pub fn should_request_pty(policy: TtyPolicy, has_command: bool, stdin_is_tty: bool) -> bool {
    match policy {
        TtyPolicy::Force => true,
        TtyPolicy::Disable => false,
        TtyPolicy::Request => stdin_is_tty,
        TtyPolicy::Auto => !has_command && stdin_is_tty,
    }
}

/// Local port forward: `[bind_address:]port:host:hostport`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalForward {
    pub bind_address: String,
    pub bind_port: u16,
    pub host: String,
    pub host_port: u16,
}

impl LocalForward {
    pub fn bind_addr(&self) -> String {
        join_host_port(&self.bind_address, self.bind_port)
    }

    pub fn target_addr(&self) -> String {
        join_host_port(&self.host, self.host_port)
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

impl fmt::Display for LocalForward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.bind_addr(), self.target_addr())
    }
}

static FORWARD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<bind>\[[^\]]+\]|[^:\[\]]+):)?(?P<port>\d+):(?P<host>\[[^\]]+\]|[^:\[\]]+):(?P<hostport>\d+)$",
    )
    .unwrap()
});

/// Bind address used when a forward omits one
pub const DEFAULT_BIND_ADDRESS: &str = "localhost";

impl FromStr for LocalForward {
    type Err = String;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let caps = FORWARD_REGEX.captures(spec.trim()).ok_or_else(|| {
            format!(
                "invalid local forward '{}', expected [bind_address:]port:host:hostport",
                spec
            )
        })?;

        let bind_address = caps
            .name("bind")
            .map(|m| strip_brackets(m.as_str()))
            .unwrap_or(DEFAULT_BIND_ADDRESS)
            .to_string();
        let bind_port = parse_port(&caps["port"], spec)?;
        let host = strip_brackets(&caps["host"]).to_string();
        let host_port = parse_port(&caps["hostport"], spec)?;

        Ok(Self {
            bind_address,
            bind_port,
            host,
            host_port,
        })
    }
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

fn parse_port(raw: &str, spec: &str) -> Result<u16, String> {
    match raw.parse::<u16>() {
        Ok(0) | Err(_) => Err(format!("invalid port '{}' in local forward '{}'", raw, spec)),
        Ok(port) => Ok(port),
    }
}

/// Everything the subsystem needs to know about one invocation
#[derive(Debug, Clone, Default)]
pub struct SshOptions {
    pub app_name: String,
    pub instance_index: u32,
    /// Legacy substrate's own `--instance` flag; wins over `instance_index` there
    pub legacy_instance_index: Option<u32>,
    pub commands: Vec<String>,
    pub forwards: Vec<LocalForward>,
    pub skip_host_validation: bool,
    pub skip_remote_execution: bool,
    pub tty: TtyPolicy,
}

impl SshOptions {
    /// Remote commands joined into the single exec request, if any.
    pub fn remote_command(&self) -> Option<String> {
        if self.commands.is_empty() {
            None
        } else {
            Some(self.commands.join(" "))
        }
    }

    pub fn legacy_index(&self) -> u32 {
        self.legacy_instance_index.unwrap_or(self.instance_index)
    }
}
