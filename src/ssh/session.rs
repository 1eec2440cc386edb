use std::sync::Arc;
use std::time::Duration;

use russh::client::Handle;
use russh::{Channel, ChannelMsg, Sig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::error::{CommandError, SshError};
use crate::security_log;

use super::handler::ClientHandler;
use super::options::{LocalForward, TtyPolicy, should_request_pty};
use super::terminal::{RawModeGuard, TerminalControl, TerminalIo};

const STDIN_BUFFER_SIZE: usize = 8192;
const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// What to run on the remote side of an interactive session
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Joined remote command; `None` starts a login shell
    pub command: Option<String>,
    pub tty: TtyPolicy,
    /// `TERM` advertised with a pty request
    pub term: String,
}

/// How the remote process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteExit {
    pub status: u32,
    /// Signal name when the process was killed by a signal
    pub signal: Option<String>,
}

impl RemoteExit {
    pub fn exited(status: u32) -> Self {
        Self {
            status,
            signal: None,
        }
    }

    /// Exit caused by a signal, reported as 128 plus the signal number.
    pub fn signaled(name: impl Into<String>) -> Self {
        let name = name.into();
        let status = 128 + signal_number(&name).unwrap_or(0);
        Self {
            status,
            signal: Some(name),
        }
    }

    /// Process exit code; statuses beyond `i32` collapse to a generic failure.
    pub fn code(&self) -> i32 {
        i32::try_from(self.status).unwrap_or(CommandError::GENERIC_FAILURE)
    }

    /// Line printed to stderr when the process was killed by a signal.
    pub fn diagnostic(&self) -> Option<String> {
        self.signal.as_ref().map(|name| {
            format!(
                "Process terminated by signal: {}. Exited with {}.",
                name, self.status
            )
        })
    }
}

/// POSIX number for an SSH signal name
pub fn signal_number(name: &str) -> Option<u32> {
    let number = match name {
        "HUP" => 1,
        "INT" => 2,
        "QUIT" => 3,
        "ILL" => 4,
        "ABRT" => 6,
        "FPE" => 8,
        "KILL" => 9,
        "USR1" => 10,
        "SEGV" => 11,
        "USR2" => 12,
        "PIPE" => 13,
        "ALRM" => 14,
        "TERM" => 15,
        _ => return None,
    };
    Some(number)
}

fn signal_name(sig: &Sig) -> String {
    match sig {
        Sig::ABRT => "ABRT".to_string(),
        Sig::ALRM => "ALRM".to_string(),
        Sig::FPE => "FPE".to_string(),
        Sig::HUP => "HUP".to_string(),
        Sig::ILL => "ILL".to_string(),
        Sig::INT => "INT".to_string(),
        Sig::KILL => "KILL".to_string(),
        Sig::PIPE => "PIPE".to_string(),
        Sig::QUIT => "QUIT".to_string(),
        Sig::SEGV => "SEGV".to_string(),
        Sig::TERM => "TERM".to_string(),
        Sig::USR1 => "USR1".to_string(),
        Sig::Custom(name) => name.clone(),
    }
}

/// Commands sent from the local side to the channel loop
enum ChannelCommand {
    Data(Vec<u8>),
    Eof,
}

/// Authenticated connection to the platform SSH proxy.
///
/// Owns the listeners and relays started by [`SecureShell::forward_local`];
/// they are aborted when the shell is closed or dropped.
pub struct SecureShell {
    handle: Arc<Handle<ClientHandler>>,
    forwards: JoinSet<()>,
    host: String,
    port: u16,
}

impl std::fmt::Debug for SecureShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureShell")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("forwards", &self.forwards.len())
            .finish()
    }
}

impl SecureShell {
    pub(crate) fn new(handle: Handle<ClientHandler>, host: String, port: u16) -> Self {
        Self {
            handle: Arc::new(handle),
            forwards: JoinSet::new(),
            host,
            port,
        }
    }

    /// Start every local forward.
    ///
    /// All listeners are bound before any is served, so a bind failure
    /// leaves nothing running.
    pub async fn forward_local(&mut self, forwards: &[LocalForward]) -> Result<(), SshError> {
        let mut listeners = Vec::with_capacity(forwards.len());
        for forward in forwards {
            let address = forward.bind_addr();
            let listener = TcpListener::bind(&address)
                .await
                .map_err(|source| SshError::ForwardBind { address, source })?;
            listeners.push((listener, forward.clone()));
        }

        for (listener, forward) in listeners {
            security_log::log_forward_opened(&forward.bind_addr(), &forward.target_addr());
            let handle = self.handle.clone();
            self.forwards.spawn(serve_forward(listener, forward, handle));
        }
        Ok(())
    }

    /// Run one session channel to completion, relaying local terminal I/O.
    pub async fn interactive_session(
        &self,
        request: &SessionRequest,
        terminal: &impl TerminalControl,
        io: TerminalIo,
    ) -> Result<RemoteExit, SshError> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| SshError::Channel(format!("Failed to open session: {}", e)))?;

        let stdin_is_tty = terminal.stdin_is_tty();
        let pty = should_request_pty(request.tty, request.command.is_some(), stdin_is_tty);

        let _raw_mode = if pty {
            let (cols, rows) = terminal.size();
            channel
                .request_pty(false, &request.term, cols as u32, rows as u32, 0, 0, &[])
                .await
                .map_err(|e| SshError::Channel(format!("PTY request failed: {}", e)))?;

            if stdin_is_tty {
                terminal.enter_raw_mode()?
            } else {
                RawModeGuard::inactive()
            }
        } else {
            RawModeGuard::inactive()
        };

        match &request.command {
            Some(command) => channel
                .exec(true, command.as_str())
                .await
                .map_err(|e| SshError::Channel(format!("Exec request failed: {}", e)))?,
            None => channel
                .request_shell(true)
                .await
                .map_err(|e| SshError::Channel(format!("Shell request failed: {}", e)))?,
        }

        let resize_rx = pty.then(|| terminal.resize_events());
        relay_channel(channel, io, resize_rx).await
    }

    /// Block until the connection ends or every forward listener has stopped.
    pub async fn wait(&mut self) {
        let had_forwards = !self.forwards.is_empty();
        let mut ticker = tokio::time::interval(CLOSE_POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.handle.is_closed() {
                        break;
                    }
                }
                Some(result) = self.forwards.join_next(), if !self.forwards.is_empty() => {
                    if let Err(e) = result {
                        if e.is_panic() {
                            tracing::error!("Forward listener panicked: {}", e);
                        }
                    }
                    if had_forwards && self.forwards.is_empty() {
                        break;
                    }
                }
            }
        }
    }

    /// Stop every forward and disconnect.
    pub async fn close(mut self) {
        self.forwards.shutdown().await;
        if let Err(e) = self
            .handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!("Disconnect failed: {}", e);
        }
        security_log::log_ssh_disconnect(&self.host, self.port);
    }

    /// Number of running forward listeners.
    pub fn forward_count(&self) -> usize {
        self.forwards.len()
    }
}

async fn relay_channel(
    mut channel: Channel<russh::client::Msg>,
    io: TerminalIo,
    mut resize_rx: Option<mpsc::Receiver<(u16, u16)>>,
) -> Result<RemoteExit, SshError> {
    let TerminalIo {
        mut stdin,
        mut stdout,
        mut stderr,
    } = io;

    let (command_tx, mut command_rx) = mpsc::channel::<ChannelCommand>(64);
    let stdin_task = tokio::spawn(async move {
        let mut buf = vec![0u8; STDIN_BUFFER_SIZE];
        loop {
            match stdin.read(&mut buf).await {
                Ok(0) => {
                    let _ = command_tx.send(ChannelCommand::Eof).await;
                    break;
                }
                Ok(n) => {
                    if command_tx
                        .send(ChannelCommand::Data(buf[..n].to_vec()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("stdin read failed: {}", e);
                    let _ = command_tx.send(ChannelCommand::Eof).await;
                    break;
                }
            }
        }
    });

    let mut exit: Option<RemoteExit> = None;
    let mut input_open = true;

    loop {
        tokio::select! {
            msg = channel.wait() => {
                match msg {
                    Some(ChannelMsg::Data { data }) => {
                        stdout.write_all(&data).await.map_err(terminal_write_error)?;
                        stdout.flush().await.map_err(terminal_write_error)?;
                    }
                    Some(ChannelMsg::ExtendedData { data, .. }) => {
                        stderr.write_all(&data).await.map_err(terminal_write_error)?;
                        stderr.flush().await.map_err(terminal_write_error)?;
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        tracing::debug!("Exit status: {}", exit_status);
                        exit = Some(RemoteExit::exited(exit_status));
                    }
                    Some(ChannelMsg::ExitSignal { signal_name: sig, .. }) => {
                        let name = signal_name(&sig);
                        tracing::debug!("Exit signal: {}", name);
                        exit = Some(RemoteExit::signaled(name));
                    }
                    Some(ChannelMsg::Failure) => {
                        stdin_task.abort();
                        return Err(SshError::Channel(
                            "Remote side rejected the session request".to_string(),
                        ));
                    }
                    Some(ChannelMsg::Eof) => {
                        tracing::debug!("Remote EOF");
                    }
                    Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                }
            }
            cmd = command_rx.recv(), if input_open => {
                match cmd {
                    Some(ChannelCommand::Data(data)) => {
                        if let Err(e) = channel.data(&data[..]).await {
                            tracing::debug!("Failed to send data: {}", e);
                        }
                    }
                    Some(ChannelCommand::Eof) | None => {
                        input_open = false;
                        if let Err(e) = channel.eof().await {
                            tracing::debug!("Failed to send EOF: {}", e);
                        }
                    }
                }
            }
            size = next_resize(&mut resize_rx) => {
                match size {
                    Some((cols, rows)) => {
                        if let Err(e) = channel.window_change(cols as u32, rows as u32, 0, 0).await {
                            tracing::debug!("Failed to send window change: {}", e);
                        }
                    }
                    None => resize_rx = None,
                }
            }
        }
    }

    stdin_task.abort();

    exit.ok_or_else(|| {
        SshError::Channel("Remote session ended without an exit status".to_string())
    })
}

async fn next_resize(rx: &mut Option<mpsc::Receiver<(u16, u16)>>) -> Option<(u16, u16)> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn terminal_write_error(e: std::io::Error) -> SshError {
    SshError::Terminal(format!("Failed to write output: {}", e))
}

async fn serve_forward(
    listener: TcpListener,
    forward: LocalForward,
    handle: Arc<Handle<ClientHandler>>,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!("Forward {} accepted {}", forward, peer);
                        connections.spawn(relay_connection(
                            stream,
                            peer,
                            forward.clone(),
                            handle.clone(),
                        ));
                    }
                    Err(e) => {
                        tracing::warn!("Forward {} accept failed: {}", forward, e);
                    }
                }
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn relay_connection(
    mut stream: TcpStream,
    peer: std::net::SocketAddr,
    forward: LocalForward,
    handle: Arc<Handle<ClientHandler>>,
) {
    let channel = match handle
        .channel_open_direct_tcpip(
            forward.host.clone(),
            forward.host_port as u32,
            peer.ip().to_string(),
            peer.port() as u32,
        )
        .await
    {
        Ok(channel) => channel,
        Err(e) => {
            tracing::warn!("Forward {} could not open channel: {}", forward, e);
            return;
        }
    };

    let mut remote = channel.into_stream();
    match tokio::io::copy_bidirectional(&mut stream, &mut remote).await {
        Ok((sent, received)) => {
            tracing::debug!(
                "Forward {} closed ({} bytes out, {} bytes in)",
                forward,
                sent,
                received
            );
        }
        Err(e) => {
            tracing::debug!("Forward {} relay ended: {}", forward, e);
        }
    }
}
