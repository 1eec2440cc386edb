//! Interactive session tests

use appssh::ssh::{SessionRequest, TtyPolicy};

use super::fixtures::{CapturedIo, FakeTerminal, PtyRequest, TestProxy, WAIT_FOR_RESIZE};

fn exec(command: &str, tty: TtyPolicy) -> SessionRequest {
    SessionRequest {
        command: Some(command.to_string()),
        tty,
        term: "xterm-256color".to_string(),
    }
}

#[tokio::test]
async fn test_remote_exit_status_is_forwarded() {
    let proxy = TestProxy::start().await;
    let shell = proxy.connect().await;
    let (io, captured) = CapturedIo::new();

    let exit = shell
        .interactive_session(&exec("exit 3", TtyPolicy::Auto), &FakeTerminal::piped(), io)
        .await
        .expect("Session should complete");
    shell.close().await;

    assert_eq!(exit.code(), 3);
    assert_eq!(exit.diagnostic(), None);
    assert_eq!(captured.stdout().await, "ran exit 3\n");
    assert_eq!(*proxy.observed.commands.lock().await, vec!["exit 3".to_string()]);
}

#[tokio::test]
async fn test_successful_command_exits_zero() {
    let proxy = TestProxy::start().await;
    let shell = proxy.connect().await;
    let (io, _captured) = CapturedIo::new();

    let exit = shell
        .interactive_session(&exec("true", TtyPolicy::Auto), &FakeTerminal::piped(), io)
        .await
        .unwrap();
    shell.close().await;

    assert_eq!(exit.code(), 0);
}

#[tokio::test]
async fn test_signal_exit_maps_to_128_plus_signal() {
    let proxy = TestProxy::start().await;
    let shell = proxy.connect().await;
    let (io, _captured) = CapturedIo::new();

    let exit = shell
        .interactive_session(&exec("kill", TtyPolicy::Auto), &FakeTerminal::piped(), io)
        .await
        .unwrap();
    shell.close().await;

    assert_eq!(exit.code(), 137);
    assert_eq!(exit.signal.as_deref(), Some("KILL"));
    assert_eq!(
        exit.diagnostic().as_deref(),
        Some("Process terminated by signal: KILL. Exited with 137.")
    );
}

#[tokio::test]
async fn test_forced_pty_is_requested_without_local_tty() {
    let proxy = TestProxy::start().await;
    let shell = proxy.connect().await;
    let (io, _captured) = CapturedIo::new();

    shell
        .interactive_session(&exec("true", TtyPolicy::Force), &FakeTerminal::piped(), io)
        .await
        .unwrap();
    shell.close().await;

    assert_eq!(
        *proxy.observed.ptys.lock().await,
        vec![PtyRequest {
            term: "xterm-256color".to_string(),
            cols: 100,
            rows: 40,
        }]
    );
}

#[tokio::test]
async fn test_disabled_pty_is_never_requested() {
    let proxy = TestProxy::start().await;
    let shell = proxy.connect().await;
    let (io, _captured) = CapturedIo::new();
    let terminal = FakeTerminal::new(true, (80, 24));

    let request = SessionRequest {
        command: None,
        tty: TtyPolicy::Disable,
        term: "xterm".to_string(),
    };
    shell.interactive_session(&request, &terminal, io).await.unwrap();
    shell.close().await;

    assert!(proxy.observed.ptys.lock().await.is_empty());
}

#[tokio::test]
async fn test_auto_pty_for_shell_on_local_tty() {
    let proxy = TestProxy::start().await;
    let shell = proxy.connect().await;
    let (io, captured) = CapturedIo::new();
    let terminal = FakeTerminal::new(true, (132, 50));

    let request = SessionRequest {
        command: None,
        tty: TtyPolicy::Auto,
        term: "vt100".to_string(),
    };
    let exit = shell.interactive_session(&request, &terminal, io).await.unwrap();
    shell.close().await;

    assert_eq!(exit.code(), 0);
    assert_eq!(captured.stdout().await, "ran shell\n");
    let ptys = proxy.observed.ptys.lock().await;
    assert_eq!(ptys.len(), 1);
    assert_eq!((ptys[0].cols, ptys[0].rows), (132, 50));
    assert_eq!(ptys[0].term, "vt100");
}

#[tokio::test]
async fn test_auto_pty_not_requested_for_command() {
    let proxy = TestProxy::start().await;
    let shell = proxy.connect().await;
    let (io, _captured) = CapturedIo::new();
    let terminal = FakeTerminal::new(true, (80, 24));

    shell
        .interactive_session(&exec("true", TtyPolicy::Auto), &terminal, io)
        .await
        .unwrap();
    shell.close().await;

    assert!(proxy.observed.ptys.lock().await.is_empty());
}

#[tokio::test]
async fn test_resize_is_forwarded_with_pty() {
    let proxy = TestProxy::start().await;
    let shell = proxy.connect().await;
    let (io, _captured) = CapturedIo::new();
    let (terminal, resizes) = FakeTerminal::piped().with_resizes();
    resizes.send((120, 30)).await.unwrap();

    let exit = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        shell.interactive_session(&exec(WAIT_FOR_RESIZE, TtyPolicy::Force), &terminal, io),
    )
    .await
    .expect("Remote side never saw the resize")
    .unwrap();
    shell.close().await;

    assert_eq!(exit.code(), 0);
    assert_eq!(*proxy.observed.window_changes.lock().await, vec![(120, 30)]);
}

#[tokio::test]
async fn test_resize_is_ignored_without_pty() {
    let proxy = TestProxy::start().await;
    let shell = proxy.connect().await;
    let (io, _captured) = CapturedIo::new();
    let (terminal, resizes) = FakeTerminal::new(true, (80, 24)).with_resizes();
    resizes.send((120, 30)).await.unwrap();

    let exit = shell
        .interactive_session(&exec("exit 0", TtyPolicy::Disable), &terminal, io)
        .await
        .unwrap();
    shell.close().await;

    assert_eq!(exit.code(), 0);
    assert!(proxy.observed.ptys.lock().await.is_empty());
    assert!(proxy.observed.window_changes.lock().await.is_empty());
}
