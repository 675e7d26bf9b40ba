// ABOUTME: SSH session management using russh.
// ABOUTME: Connects, authenticates via an Authenticator, and runs the install command.

use super::error::{Error, Result};
use super::install::{install_command, interpret_install_output};
use super::InstallOutcome;
use crate::auth::{Authenticator, ChallengePrompt};
use crate::types::{PublicKeyLine, Target};
use russh::client::{self, Config, Handle, KeyboardInteractiveAuthResponse};
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::ssh_key;
use russh::{ChannelMsg, Disconnect};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Settings for a provisioning connection.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// SSH port (default: 22).
    pub port: u16,
    /// Bounded connect timeout (default: 15 seconds).
    pub connect_timeout: Duration,
    /// Timeout for the remote install command.
    pub command_timeout: Duration,
    /// Whether to accept unknown hosts (Trust On First Use).
    /// If false, connection to unknown hosts fails as unverifiable.
    pub trust_on_first_use: bool,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
}

impl ClientSettings {
    pub fn new() -> Self {
        Self {
            port: 22,
            connect_timeout: Duration::from_secs(15),
            command_timeout: Duration::from_secs(60),
            trust_on_first_use: false,
            known_hosts_path: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }

    pub fn known_hosts(mut self, path: Option<PathBuf>) -> Self {
        self.known_hosts_path = path;
        self
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Output from a remote command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// SSH client handler verifying the server key against known_hosts.
struct HostVerifier {
    host: String,
    port: u16,
    trust_on_first_use: bool,
    known_hosts_path: Option<PathBuf>,
}

impl client::Handler for HostVerifier {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let check_result = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match check_result {
            Ok(true) => Ok(true),
            Ok(false) => {
                // Host not in known_hosts
                if self.trust_on_first_use {
                    tracing::warn!(
                        "Trust-On-First-Use: accepting unknown host key for {}:{}",
                        self.host,
                        self.port
                    );
                    let learn_result = match &self.known_hosts_path {
                        Some(path) => {
                            learn_known_hosts_path(&self.host, self.port, server_public_key, path)
                        }
                        None => learn_known_hosts(&self.host, self.port, server_public_key),
                    };
                    if let Err(e) = learn_result {
                        tracing::warn!("Failed to save host key to known_hosts: {}", e);
                    }
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            // A changed key is never trusted, TOFU or not.
            Err(russh::keys::Error::KeyChanged { .. }) => Ok(false),
            Err(_) => Ok(self.trust_on_first_use),
        }
    }
}

/// Install `key` for `target` by connecting, authenticating through
/// `authenticator`, and running the idempotent install command.
///
/// Each failure is terminal for this attempt; nothing is retried here.
pub async fn provision(
    target: &Target,
    key: &PublicKeyLine,
    authenticator: &dyn Authenticator,
    settings: &ClientSettings,
) -> Result<InstallOutcome> {
    let mut handle = connect(target, settings).await?;

    if let Err(err) = authenticate(&mut handle, target, authenticator).await {
        let _ = handle.disconnect(Disconnect::ByApplication, "", "en").await;
        return Err(err);
    }
    tracing::info!(%target, "authenticated, installing public key");

    let command = install_command(key);
    let result = exec(&handle, &command, settings.command_timeout).await;
    let _ = handle.disconnect(Disconnect::ByApplication, "", "en").await;

    Ok(interpret_install_output(&result?))
}

async fn connect(target: &Target, settings: &ClientSettings) -> Result<Handle<HostVerifier>> {
    let config = Config {
        // The handshake may idle for minutes while a challenge waits on the
        // user; an inactivity timeout would tear the connection down first.
        inactivity_timeout: None,
        ..Default::default()
    };

    let verifier = HostVerifier {
        host: target.host().to_string(),
        port: settings.port,
        trust_on_first_use: settings.trust_on_first_use,
        known_hosts_path: settings.known_hosts_path.clone(),
    };

    let attempt = client::connect(
        Arc::new(config),
        (target.host(), settings.port),
        verifier,
    );

    match tokio::time::timeout(settings.connect_timeout, attempt).await {
        Err(_) => Err(Error::Connection(format!(
            "timed out after {}s connecting to {}:{}",
            settings.connect_timeout.as_secs(),
            target.host(),
            settings.port
        ))),
        Ok(Err(russh::Error::UnknownKey)) => {
            Err(Error::HostKeyUnverifiable(target.host().to_string()))
        }
        Ok(Err(e)) => {
            if e.to_string().contains("Connection refused") {
                Err(Error::Connection(format!(
                    "connection refused to {}:{}",
                    target.host(),
                    settings.port
                )))
            } else {
                Err(Error::Connection(e.to_string()))
            }
        }
        Ok(Ok(handle)) => Ok(handle),
    }
}

/// Drive password-first authentication, falling through to
/// keyboard-interactive rounds answered by the authenticator.
async fn authenticate(
    handle: &mut Handle<HostVerifier>,
    target: &Target,
    authenticator: &dyn Authenticator,
) -> Result<()> {
    let password = authenticator.password_for(target).await;
    let outcome = handle
        .authenticate_password(target.user(), password.as_str())
        .await?;
    if outcome.success() {
        return Ok(());
    }

    tracing::debug!(%target, "password method rejected, trying keyboard-interactive");
    let mut response = handle
        .authenticate_keyboard_interactive_start(target.user(), None::<String>)
        .await?;

    loop {
        match response {
            KeyboardInteractiveAuthResponse::Success => return Ok(()),
            KeyboardInteractiveAuthResponse::Failure { .. } => {
                return Err(Error::AuthenticationFailed);
            }
            KeyboardInteractiveAuthResponse::InfoRequest { prompts, .. } => {
                let prompts: Vec<ChallengePrompt> = prompts
                    .into_iter()
                    .map(|p| ChallengePrompt {
                        text: p.prompt,
                        echo: p.echo,
                    })
                    .collect();

                // Servers may send an empty info request; answer in kind.
                let answers = if prompts.is_empty() {
                    Vec::new()
                } else {
                    authenticator.challenge(&prompts).await?
                };

                response = handle
                    .authenticate_keyboard_interactive_respond(answers)
                    .await?;
            }
        }
    }
}

async fn exec(
    handle: &Handle<HostVerifier>,
    command: &str,
    timeout: Duration,
) -> Result<CommandOutput> {
    match tokio::time::timeout(timeout, exec_inner(handle, command)).await {
        Ok(result) => result,
        Err(_) => Err(Error::CommandTimeout(timeout)),
    }
}

async fn exec_inner(handle: &Handle<HostVerifier>, command: &str) -> Result<CommandOutput> {
    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

    channel
        .exec(true, command)
        .await
        .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_code = 0u32;

    let mut got_exit_status = false;
    let mut got_eof = false;

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => {
                stdout.extend_from_slice(&data);
            }
            Some(ChannelMsg::ExtendedData { data, ext }) => {
                if ext == 1 {
                    // stderr
                    stderr.extend_from_slice(&data);
                }
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                exit_code = exit_status;
                got_exit_status = true;
                if got_eof {
                    break;
                }
            }
            Some(ChannelMsg::Eof) => {
                got_eof = true;
                if got_exit_status {
                    break;
                }
            }
            Some(ChannelMsg::Close) => {
                break;
            }
            Some(_) => {}
            None => break,
        }
    }

    // A channel that closed without an exit status indicates abnormal
    // termination (connection drop, network issue).
    if !got_exit_status {
        return Err(Error::ChannelClosed);
    }

    Ok(CommandOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        stderr: String::from_utf8_lossy(&stderr).to_string(),
    })
}
