//! In-process SSH proxy fixture

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use russh::keys::PrivateKey;
use russh::keys::ssh_key::Algorithm;
use russh::keys::ssh_key::rand_core::OsRng;
use russh::server::{Auth, Handler, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec, Sig};
use secrecy::SecretString;
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};

use appssh::api::{
    EndpointResolver, OneTimeCode, OneTimeCodeProvider, SshConnectionDetails, SshEndpointInfo,
};
use appssh::error::{AuthError, ResolutionError, SshError};
use appssh::ssh::fingerprint::display_fingerprint;
use appssh::ssh::terminal::RawModeGuard;
use appssh::ssh::{SecureShell, SshClient, TerminalControl, TerminalIo};

pub const TEST_USER: &str = "cf:app-guid/0";
pub const TEST_CODE: &str = "one-time-code";

/// Exec command the proxy holds open until a window-change arrives
pub const WAIT_FOR_RESIZE: &str = "wait-for-resize";

/// Scripted misbehaviour of the proxy
#[derive(Debug, Clone, Default)]
pub struct ProxyBehavior {
    /// Stall this long before answering a password attempt
    pub auth_delay: Option<Duration>,
}

/// Pty request as seen by the proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyRequest {
    pub term: String,
    pub cols: u32,
    pub rows: u32,
}

/// Everything the proxy observed across all connections
#[derive(Debug, Default)]
pub struct Observed {
    pub session_channels: AtomicUsize,
    pub direct_tcpip: Mutex<Vec<(String, u32)>>,
    pub ptys: Mutex<Vec<PtyRequest>>,
    pub window_changes: Mutex<Vec<(u32, u32)>>,
    pub commands: Mutex<Vec<String>>,
}

impl Observed {
    pub fn session_channels(&self) -> usize {
        self.session_channels.load(Ordering::SeqCst)
    }
}

/// Loopback SSH proxy running for the lifetime of the fixture
pub struct TestProxy {
    pub port: u16,
    pub host_key: PrivateKey,
    pub observed: Arc<Observed>,
    server: JoinHandle<()>,
}

impl TestProxy {
    pub async fn start() -> Self {
        Self::start_with(ProxyBehavior::default()).await
    }

    pub async fn start_with(behavior: ProxyBehavior) -> Self {
        let host_key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)
            .expect("Failed to generate host key");

        let config = Arc::new(russh::server::Config {
            keys: vec![host_key.clone()],
            auth_rejection_time: Duration::from_millis(10),
            auth_rejection_time_initial: Some(Duration::from_millis(0)),
            inactivity_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test proxy");
        let port = listener.local_addr().unwrap().port();
        let observed = Arc::new(Observed::default());

        let server_observed = observed.clone();
        let server = tokio::spawn(async move {
            // Connections live in this set so stopping the proxy drops them
            let mut connections = JoinSet::new();
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let handler = ProxyHandler {
                    observed: server_observed.clone(),
                    behavior: behavior.clone(),
                    awaiting_resize: HashSet::new(),
                };
                let config = config.clone();
                connections.spawn(async move {
                    if let Ok(session) = russh::server::run_stream(config, stream, handler).await {
                        let _ = session.await;
                    }
                });
            }
        });

        Self {
            port,
            host_key,
            observed,
            server,
        }
    }

    /// SHA256 fingerprint of the proxy's host key.
    pub fn fingerprint(&self) -> String {
        display_fingerprint(self.host_key.public_key())
    }

    pub fn endpoint(&self, fingerprint: &str) -> SshEndpointInfo {
        SshEndpointInfo {
            endpoint: format!("127.0.0.1:{}", self.port),
            host_key_fingerprint: fingerprint.to_string(),
        }
    }

    /// Connect as the expected user with the expected code.
    pub async fn connect(&self) -> SecureShell {
        client()
            .connect(&self.endpoint(&self.fingerprint()), TEST_USER, code(TEST_CODE), false)
            .await
            .expect("Failed to connect to test proxy")
    }

    /// Drop the listener and every open connection.
    pub fn stop(&self) {
        self.server.abort();
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.server.abort();
    }
}

pub fn client() -> SshClient {
    client_with_timeout(Duration::from_secs(5))
}

pub fn client_with_timeout(connection_timeout: Duration) -> SshClient {
    SshClient::new(connection_timeout, None)
}

pub fn code(value: &str) -> OneTimeCode {
    OneTimeCode::new(SecretString::from(value.to_string()))
}

struct ProxyHandler {
    observed: Arc<Observed>,
    behavior: ProxyBehavior,
    awaiting_resize: HashSet<ChannelId>,
}

impl ProxyHandler {
    fn finish(session: &mut Session, channel: ChannelId, command: &str) {
        let _ = session.data(channel, CryptoVec::from_slice(format!("ran {}\n", command).as_bytes()));

        if command == "kill" {
            let _ = session.exit_signal_request(channel, Sig::KILL, false, "", "");
        } else {
            let status = command
                .strip_prefix("exit ")
                .map(|status| status.trim().parse().unwrap_or(1))
                .unwrap_or(0);
            let _ = session.exit_status_request(channel, status);
        }

        let _ = session.eof(channel);
        let _ = session.close(channel);
    }
}

impl Handler for ProxyHandler {
    type Error = russh::Error;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        if let Some(delay) = self.behavior.auth_delay {
            tokio::time::sleep(delay).await;
        }
        if user == TEST_USER && password == TEST_CODE {
            return Ok(Auth::Accept);
        }
        Ok(Auth::Reject {
            proceed_with_methods: None,
            partial_success: false,
        })
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        self.observed.session_channels.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn pty_request(
        &mut self,
        channel: ChannelId,
        term: &str,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(russh::Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.observed.ptys.lock().await.push(PtyRequest {
            term: term.to_string(),
            cols: col_width,
            rows: row_height,
        });
        let _ = session.channel_success(channel);
        Ok(())
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let command = String::from_utf8_lossy(data).to_string();
        self.observed.commands.lock().await.push(command.clone());
        let _ = session.channel_success(channel);
        if command == WAIT_FOR_RESIZE {
            self.awaiting_resize.insert(channel);
        } else {
            Self::finish(session, channel, &command);
        }
        Ok(())
    }

    async fn window_change_request(
        &mut self,
        channel: ChannelId,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.observed
            .window_changes
            .lock()
            .await
            .push((col_width, row_height));
        if self.awaiting_resize.remove(&channel) {
            Self::finish(session, channel, WAIT_FOR_RESIZE);
        }
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let _ = session.channel_success(channel);
        Self::finish(session, channel, "shell");
        Ok(())
    }

    async fn channel_open_direct_tcpip(
        &mut self,
        channel: Channel<Msg>,
        host_to_connect: &str,
        port_to_connect: u32,
        _originator_address: &str,
        _originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        self.observed
            .direct_tcpip
            .lock()
            .await
            .push((host_to_connect.to_string(), port_to_connect));

        tokio::spawn(async move {
            let (mut reader, mut writer) = tokio::io::split(channel.into_stream());
            let _ = tokio::io::copy(&mut reader, &mut writer).await;
        });
        Ok(true)
    }
}

/// Scripted local terminal
pub struct FakeTerminal {
    tty: bool,
    size: (u16, u16),
    resizes: std::sync::Mutex<Option<mpsc::Receiver<(u16, u16)>>>,
}

impl FakeTerminal {
    pub fn new(tty: bool, size: (u16, u16)) -> Self {
        Self {
            tty,
            size,
            resizes: std::sync::Mutex::new(None),
        }
    }

    pub fn piped() -> Self {
        Self::new(false, (100, 40))
    }

    /// Terminal whose resize events the test sends through the returned sender.
    pub fn with_resizes(self) -> (Self, mpsc::Sender<(u16, u16)>) {
        let (tx, rx) = mpsc::channel(8);
        *self.resizes.lock().unwrap() = Some(rx);
        (self, tx)
    }
}

impl TerminalControl for FakeTerminal {
    fn stdin_is_tty(&self) -> bool {
        self.tty
    }

    fn size(&self) -> (u16, u16) {
        self.size
    }

    fn enter_raw_mode(&self) -> Result<RawModeGuard, SshError> {
        Ok(RawModeGuard::inactive())
    }

    fn resize_events(&self) -> mpsc::Receiver<(u16, u16)> {
        self.resizes.lock().unwrap().take().unwrap_or_else(|| {
            let (_tx, rx) = mpsc::channel(1);
            rx
        })
    }
}

/// Terminal streams with empty stdin and captured stdout
pub struct CapturedIo {
    stdout: DuplexStream,
}

impl CapturedIo {
    pub fn new() -> (TerminalIo, Self) {
        let (stdout_tx, stdout) = tokio::io::duplex(64 * 1024);
        let io = TerminalIo {
            stdin: Box::new(tokio::io::empty()),
            stdout: Box::new(stdout_tx),
            stderr: Box::new(tokio::io::sink()),
        };
        (io, Self { stdout })
    }

    /// Everything written to stdout; call after the session's I/O is dropped.
    pub async fn stdout(mut self) -> String {
        let mut out = String::new();
        self.stdout
            .read_to_string(&mut out)
            .await
            .expect("Failed to read captured output");
        out
    }
}

/// Resolver pointing the orchestrated path at a [`TestProxy`]
pub struct ProxyResolver(pub SshEndpointInfo);

impl EndpointResolver for ProxyResolver {
    async fn resolve_legacy(
        &self,
        _app_guid: &str,
        _instance_index: u32,
    ) -> Result<SshConnectionDetails, ResolutionError> {
        unreachable!("orchestrated path never resolves legacy credentials")
    }

    async fn resolve_orchestrated(&self) -> Result<SshEndpointInfo, ResolutionError> {
        Ok(self.0.clone())
    }
}

/// Code provider handing out the code the proxy accepts
pub struct ProxyCodes;

impl OneTimeCodeProvider for ProxyCodes {
    async fn get(&self) -> Result<OneTimeCode, AuthError> {
        Ok(code(TEST_CODE))
    }
}
