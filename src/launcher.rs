//! External `ssh` client path for legacy application instances.
//!
//! The per-instance private key is staged in a private temporary directory,
//! the external client is run with inherited stdio, and the key material is
//! removed again whatever the client did.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use secrecy::{ExposeSecret, SecretString};
use tempfile::TempDir;

use crate::api::SshConnectionDetails;
use crate::error::LocalResourceError;
use crate::security_log;
use crate::ssh::RemoteExit;

const TEMP_DIR_PREFIX: &str = "appssh";
const IDENTITY_FILE: &str = "identity";

/// Runs an external program attached to this process's terminal
#[allow(async_fn_in_trait)]
pub trait ProcessRunner {
    /// Run `program` with inherited stdio and wait for it to exit.
    async fn run_status(&self, program: &str, args: &[String]) -> std::io::Result<ExitStatus>;
}

/// Production [`ProcessRunner`] backed by `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

impl ProcessRunner for TokioProcessRunner {
    async fn run_status(&self, program: &str, args: &[String]) -> std::io::Result<ExitStatus> {
        tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .status()
            .await
    }
}

/// Private key written to disk for the lifetime of one client run
#[derive(Debug)]
pub struct StagedKey {
    dir: TempDir,
    path: PathBuf,
}

impl StagedKey {
    /// Write `key` to `identity` (mode 0600) inside a fresh private directory.
    pub fn stage(key: &SecretString) -> Result<Self, LocalResourceError> {
        let dir = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir()
            .map_err(LocalResourceError::TempDir)?;
        Self::stage_into(dir, key)
    }

    /// Write `key` into `dir`, removing the directory again if the write fails.
    fn stage_into(dir: TempDir, key: &SecretString) -> Result<Self, LocalResourceError> {
        let path = dir.path().join(IDENTITY_FILE);

        if let Err(source) = write_private_file(&path, key.expose_secret().as_bytes()) {
            let dir_path = dir.path().to_path_buf();
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    security_log::log_key_cleanup_failed(&path, &e.to_string());
                    return Err(LocalResourceError::Cleanup { path, source: e });
                }
            }
            dir.close().map_err(|e| {
                security_log::log_key_cleanup_failed(&dir_path, &e.to_string());
                LocalResourceError::Cleanup {
                    path: dir_path,
                    source: e,
                }
            })?;
            return Err(LocalResourceError::WriteKey { path, source });
        }

        security_log::log_key_staged(&path);
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the key file, then its directory.
    pub fn destroy(self) -> Result<(), LocalResourceError> {
        let Self { dir, path } = self;

        if let Err(source) = std::fs::remove_file(&path) {
            security_log::log_key_cleanup_failed(&path, &source.to_string());
            return Err(LocalResourceError::Cleanup { path, source });
        }

        let dir_path = dir.path().to_path_buf();
        if let Err(source) = dir.close() {
            security_log::log_key_cleanup_failed(&dir_path, &source.to_string());
            return Err(LocalResourceError::Cleanup {
                path: dir_path,
                source,
            });
        }

        security_log::log_key_removed(&path);
        Ok(())
    }
}

#[cfg(unix)]
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Argument vector for the external client, in the order it expects.
pub fn build_args(key_path: &Path, details: &SshConnectionDetails) -> Vec<String> {
    vec![
        "-i".to_string(),
        key_path.display().to_string(),
        "-o".to_string(),
        "ConnectTimeout=5".to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        "UserKnownHostsFile=/dev/null".to_string(),
        "-p".to_string(),
        details.port.to_string(),
        format!("{}@{}", details.user, details.ip),
    ]
}

/// Runs the external client against a legacy instance
pub struct LegacyLauncher<R> {
    runner: R,
    program: String,
}

impl<R: ProcessRunner> LegacyLauncher<R> {
    pub fn new(runner: R, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// Stage the key, run the client, destroy the key.
    ///
    /// A cleanup failure wins over any error from the client run.
    pub async fn launch(
        &self,
        details: &SshConnectionDetails,
    ) -> Result<RemoteExit, LocalResourceError> {
        let staged = StagedKey::stage(&details.ssh_key)?;

        eprintln!("SSH username is {}", details.user);
        eprintln!("SSH IP Address is {}", details.ip);
        eprintln!("SSH Port is {}", details.port);
        eprintln!("SSH Identity is {}", staged.path().display());
        eprintln!();

        let args = build_args(staged.path(), details);
        eprintln!("Command: {} {}", self.program, args.join(" "));

        let run_result = self.runner.run_status(&self.program, &args).await;

        staged.destroy()?;

        let status = run_result.map_err(|source| LocalResourceError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        eprintln!("SSH Finished");
        Ok(RemoteExit::exited(exit_code(status)))
    }
}

fn exit_code(status: ExitStatus) -> u32 {
    if let Some(code) = status.code() {
        return code as u32;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal as u32;
        }
    }

    1
}
