//! SSH session engine for orchestrated application instances
//!
//! Connects to the platform SSH proxy, pins its host key, authenticates with
//! a one-time code and runs local forwards and an interactive channel.

pub mod client;
pub mod fingerprint;
pub mod handler;
pub mod options;
pub mod session;
pub mod terminal;

pub use client::SshClient;
pub use options::{LocalForward, SshOptions, TtyPolicy, should_request_pty};
pub use session::{RemoteExit, SecureShell, SessionRequest};
pub use terminal::{LocalTerminal, TerminalControl, TerminalIo};
