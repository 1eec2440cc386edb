//! Local terminal access for interactive sessions.
//!
//! [`TerminalControl`] covers what the session engine needs from the local
//! terminal: whether stdin is a tty, its size, raw mode and resize events.
//! [`TerminalIo`] carries the byte streams so tests can substitute their own.

use std::io::IsTerminal;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::error::SshError;

/// Fallback size when the terminal cannot be queried
pub const DEFAULT_SIZE: (u16, u16) = (80, 24);

/// Terminal state queries and mode changes
pub trait TerminalControl {
    fn stdin_is_tty(&self) -> bool;

    /// Current `(cols, rows)`
    fn size(&self) -> (u16, u16);

    /// Switch the local terminal to raw mode until the guard drops.
    fn enter_raw_mode(&self) -> Result<RawModeGuard, SshError>;

    /// Stream of new sizes, one per local resize.
    fn resize_events(&self) -> mpsc::Receiver<(u16, u16)>;
}

/// Restores cooked mode on drop
#[derive(Debug)]
pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    /// Guard that restores nothing.
    pub fn inactive() -> Self {
        Self { active: false }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = crossterm::terminal::disable_raw_mode() {
                tracing::warn!("Failed to restore terminal mode: {}", e);
            }
        }
    }
}

/// The process's own terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTerminal;

impl TerminalControl for LocalTerminal {
    fn stdin_is_tty(&self) -> bool {
        std::io::stdin().is_terminal()
    }

    fn size(&self) -> (u16, u16) {
        crossterm::terminal::size().unwrap_or(DEFAULT_SIZE)
    }

    fn enter_raw_mode(&self) -> Result<RawModeGuard, SshError> {
        crossterm::terminal::enable_raw_mode()
            .map_err(|e| SshError::Terminal(format!("Failed to enable raw mode: {}", e)))?;
        Ok(RawModeGuard { active: true })
    }

    #[cfg(unix)]
    fn resize_events(&self) -> mpsc::Receiver<(u16, u16)> {
        use tokio::signal::unix::{SignalKind, signal};

        let (tx, rx) = mpsc::channel(8);
        let mut sig = match signal(SignalKind::window_change()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::debug!("SIGWINCH unavailable: {}", e);
                return rx;
            }
        };

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = sig.recv() => {
                        if received.is_none() {
                            break;
                        }
                        let size = crossterm::terminal::size().unwrap_or(DEFAULT_SIZE);
                        if tx.send(size).await.is_err() {
                            break;
                        }
                    }
                    _ = tx.closed() => break,
                }
            }
        });

        rx
    }

    #[cfg(not(unix))]
    fn resize_events(&self) -> mpsc::Receiver<(u16, u16)> {
        let (_tx, rx) = mpsc::channel(1);
        rx
    }
}

/// Byte streams an interactive session reads from and writes to
pub struct TerminalIo {
    pub stdin: Box<dyn AsyncRead + Send + Unpin>,
    pub stdout: Box<dyn AsyncWrite + Send + Unpin>,
    pub stderr: Box<dyn AsyncWrite + Send + Unpin>,
}

impl TerminalIo {
    /// The process's standard streams.
    pub fn stdio() -> Self {
        Self {
            stdin: Box::new(tokio::io::stdin()),
            stdout: Box::new(tokio::io::stdout()),
            stderr: Box::new(tokio::io::stderr()),
        }
    }
}

/// `TERM` to advertise in a pty request
pub fn term_type(default_term: &str) -> String {
    std::env::var("TERM")
        .ok()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| default_term.to_string())
}
