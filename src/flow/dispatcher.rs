// ABOUTME: Event dispatcher for the conversation state machine.
// ABOUTME: Cancel preempts state matching; provisioning runs as a supervised task.

use super::state::FlowState;
use super::text;
use crate::auth::Bridge;
use crate::digest::HashAlgorithm;
use crate::error::Result;
use crate::keygen::{self, KeyKind};
use crate::session::{ChallengeReply, Store};
use crate::ssh::{self, ClientSettings, InstallOutcome};
use crate::transport::{Conversation, Event, EventKind, MenuChoice, MessageHandle};
use crate::types::{PublicKeyLine, SessionId, Target};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

/// Literal-text escape hatch honored while waiting for the password.
const CANCEL_WORDS: [&str; 2] = ["cancel", "отмена"];

fn is_cancel_word(reply: &str) -> bool {
    let normalized = reply.trim().to_lowercase();
    CANCEL_WORDS.contains(&normalized.as_str())
}

/// Drives every session's state machine over a shared store and transport.
pub struct Dispatcher {
    store: Arc<Store>,
    conversation: Arc<dyn Conversation>,
    settings: ClientSettings,
}

impl Dispatcher {
    pub fn new(
        store: Arc<Store>,
        conversation: Arc<dyn Conversation>,
        settings: ClientSettings,
    ) -> Self {
        Self {
            store,
            conversation,
            settings,
        }
    }

    /// Consume events until the channel closes.
    pub async fn run(&self, mut events: mpsc::Receiver<Event>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event).await;
        }
    }

    /// Handle one event. Faults never escape the session boundary: they are
    /// logged, reported generically, and the session is reset.
    pub async fn dispatch(&self, event: Event) {
        let session = event.session;
        if let Err(err) = self.handle_event(&event).await {
            tracing::error!(%session, "failure while handling event: {err}");
            self.store.reset(session);
            let _ = self
                .conversation
                .send_prompt(session, text::UNEXPECTED_FAILURE)
                .await;
            let _ = self.conversation.send_prompt(session, text::MAIN_MENU).await;
        }
    }

    async fn handle_event(&self, event: &Event) -> Result<()> {
        let session = event.session;

        // Start, help, and cancel preempt per-state matching.
        match &event.kind {
            EventKind::Start => {
                self.store.cancel_attempt(session);
                self.store.reset(session);
                self.send(session, text::WELCOME).await?;
                self.send(session, text::MAIN_MENU).await?;
                return Ok(());
            }
            EventKind::Help => {
                self.store.cancel_attempt(session);
                self.store.reset(session);
                self.send(session, text::HELP).await?;
                self.send(session, text::MAIN_MENU).await?;
                return Ok(());
            }
            EventKind::Select(MenuChoice::Cancel) => {
                return self.cancel(session).await;
            }
            _ => {}
        }

        let state = self.store.state(session);
        match (state, &event.kind) {
            (FlowState::MainMenu, EventKind::Select(MenuChoice::SshMenu)) => {
                self.store.set_state(session, FlowState::SshMenu);
                self.send(session, text::SSH_MENU).await?;
            }
            (FlowState::MainMenu, EventKind::Select(MenuChoice::HashMenu)) => {
                self.store.set_state(session, FlowState::HashMenu);
                self.send(session, text::HASH_MENU).await?;
            }

            (FlowState::SshMenu, EventKind::Select(MenuChoice::GenerateKey)) => {
                self.store.set_state(session, FlowState::ChooseKeyType);
                self.send(session, text::CHOOSE_KEY_TYPE).await?;
            }
            (FlowState::SshMenu, EventKind::Select(MenuChoice::ExportExisting)) => {
                self.store.set_state(session, FlowState::GetExistingPublicKey);
                self.send(session, text::SEND_PUBLIC_KEY).await?;
            }
            (FlowState::SshMenu, EventKind::Select(MenuChoice::MainMenu)) => {
                self.store.set_state(session, FlowState::MainMenu);
                self.send(session, text::MAIN_MENU).await?;
            }

            (FlowState::ChooseKeyType, EventKind::Select(MenuChoice::KeyRsa4096)) => {
                self.begin_passphrase(session, KeyKind::Rsa4096).await?;
            }
            (FlowState::ChooseKeyType, EventKind::Select(MenuChoice::KeyEd25519)) => {
                self.begin_passphrase(session, KeyKind::Ed25519).await?;
            }
            (FlowState::ChooseKeyType, EventKind::Select(MenuChoice::SshMenu)) => {
                self.store.set_state(session, FlowState::SshMenu);
                self.send(session, text::SSH_MENU).await?;
            }

            (FlowState::GetPassphrase, EventKind::Select(MenuChoice::NoPassphrase)) => {
                self.generate_and_deliver(session, None).await?;
            }
            (FlowState::GetPassphrase, EventKind::Reply(reply)) => {
                self.scrub_reply(session, event).await;
                let trimmed = reply.trim();
                let passphrase =
                    (!trimmed.is_empty()).then(|| Zeroizing::new(trimmed.to_string()));
                self.generate_and_deliver(session, passphrase).await?;
            }

            (FlowState::KeysReady, EventKind::Select(MenuChoice::ExportToServer)) => {
                self.store.set_state(session, FlowState::GetServerInfo);
                self.send(session, text::SEND_SERVER_INFO).await?;
            }
            (FlowState::KeysReady, EventKind::Select(MenuChoice::SshMenu)) => {
                self.store.set_state(session, FlowState::SshMenu);
                self.send(session, text::SSH_MENU).await?;
            }
            (
                FlowState::KeysReady | FlowState::GetServerInfo,
                EventKind::Reply(reply),
            ) => {
                self.accept_target(session, reply).await?;
            }

            (FlowState::GetExistingPublicKey, EventKind::Reply(reply)) => {
                match PublicKeyLine::parse(reply) {
                    Ok(key) => {
                        self.store.with(session, |s| s.public_key = Some(key));
                        self.store.set_state(session, FlowState::GetServerInfo);
                        self.send(session, text::PUBLIC_KEY_ACCEPTED).await?;
                    }
                    Err(err) => {
                        tracing::debug!(%session, "rejected public key: {err}");
                        self.send(session, text::PUBLIC_KEY_REJECTED).await?;
                    }
                }
            }

            (FlowState::WaitForPassword, EventKind::Reply(reply)) => {
                self.scrub_reply(session, event).await;
                self.scrub_stored_prompts(session).await;
                if is_cancel_word(reply) {
                    return self.cancel(session).await;
                }
                self.launch_provisioning(session, Zeroizing::new(reply.clone()))
                    .await?;
            }

            (FlowState::WaitFor2fa, EventKind::Reply(reply)) => {
                self.scrub_reply(session, event).await;
                let answer = ChallengeReply::Answer(reply.trim().to_string());
                if self.store.resolve_challenge(session, answer) {
                    self.store.set_state(session, FlowState::WaitForPassword);
                } else {
                    tracing::debug!(%session, "discarding reply with no pending challenge");
                }
            }

            (FlowState::HashMenu, EventKind::Select(MenuChoice::HashCalculate)) => {
                self.store.set_state(session, FlowState::ChooseHashAlgorithm);
                self.send(session, text::CHOOSE_HASH_ALGORITHM).await?;
            }
            (FlowState::HashMenu, EventKind::Select(MenuChoice::HashInfo)) => {
                self.send(session, text::HASH_INFO).await?;
            }
            (FlowState::HashMenu, EventKind::Select(MenuChoice::MainMenu)) => {
                self.store.set_state(session, FlowState::MainMenu);
                self.send(session, text::MAIN_MENU).await?;
            }
            (FlowState::ChooseHashAlgorithm, EventKind::Select(choice)) => {
                if let Some(algorithm) = hash_algorithm_for(*choice) {
                    self.store
                        .with(session, |s| s.hash_algorithm = Some(algorithm));
                    self.store.set_state(session, FlowState::HashInput);
                    self.send(session, &text::hash_input(algorithm)).await?;
                } else if *choice == MenuChoice::HashMenu {
                    self.store.set_state(session, FlowState::HashMenu);
                    self.send(session, text::HASH_MENU).await?;
                } else {
                    tracing::debug!(%session, ?choice, "selection not valid here, ignoring");
                }
            }
            (FlowState::HashInput, EventKind::Reply(reply)) => {
                let algorithm = self
                    .store
                    .with(session, |s| s.hash_algorithm)
                    .unwrap_or(HashAlgorithm::Sha256);
                let digest = algorithm.hex_digest(reply.as_bytes());
                self.send(session, &text::hash_result(algorithm, &digest, reply.chars().count()))
                    .await?;
                // Stays in HashInput so more text can be hashed.
            }

            (state, kind) => {
                tracing::debug!(%session, ?state, ?kind, "event not valid for state, ignoring");
            }
        }

        Ok(())
    }

    async fn cancel(&self, session: SessionId) -> Result<()> {
        self.store.cancel_attempt(session);
        self.store.reset(session);
        self.send(session, text::CANCELLED).await?;
        self.send(session, text::MAIN_MENU).await?;
        Ok(())
    }

    async fn begin_passphrase(&self, session: SessionId, kind: KeyKind) -> Result<()> {
        self.store.with(session, |s| s.key_kind = Some(kind));
        self.store.set_state(session, FlowState::GetPassphrase);
        self.send(session, text::ASK_PASSPHRASE).await?;
        Ok(())
    }

    /// Generate a keypair off the event loop and deliver all three
    /// serializations. Private material only lives inside this call.
    async fn generate_and_deliver(
        &self,
        session: SessionId,
        passphrase: Option<Zeroizing<String>>,
    ) -> Result<()> {
        let Some(kind) = self.store.with(session, |s| s.key_kind) else {
            return self.restart_lost_session(session).await;
        };

        self.send(session, text::GENERATING).await?;

        let encrypted_requested = passphrase.is_some();
        let generated = tokio::task::spawn_blocking(move || {
            keygen::generate(kind, passphrase.as_ref().map(|p| p.as_str()))
        })
        .await?;

        let generated = match generated {
            Ok(generated) => generated,
            Err(err) => {
                tracing::error!(%session, "key generation failed: {err}");
                self.store.reset(session);
                self.send(session, text::GENERATION_FAILED).await?;
                self.send(session, text::MAIN_MENU).await?;
                return Ok(());
            }
        };

        if generated.weak_encryption {
            self.send(session, text::WEAK_ENCRYPTION_WARNING).await?;
        }

        let stem = kind.file_stem();
        let label = kind.label();
        self.conversation
            .send_document(
                session,
                &format!("{stem}_openssh.pem"),
                generated.private_openssh.as_bytes(),
                &format!("Private SSH key {label} (OpenSSH format). Keep it safe."),
            )
            .await?;
        self.conversation
            .send_document(
                session,
                &format!("{stem}_pkcs8.pem"),
                generated.private_pkcs8.as_bytes(),
                &format!("Private SSH key {label} (PKCS#8 format), for library use."),
            )
            .await?;
        self.send(
            session,
            &format!(
                "Public SSH key (share this with servers):\n{}",
                generated.public_openssh
            ),
        )
        .await?;

        if encrypted_requested && !generated.weak_encryption {
            self.send(session, text::PASSPHRASE_NOTICE).await?;
        } else {
            self.send(session, text::UNENCRYPTED_NOTICE).await?;
        }

        match PublicKeyLine::parse(&generated.public_openssh) {
            Ok(key) => self.store.with(session, |s| s.public_key = Some(key)),
            Err(err) => {
                tracing::error!(%session, "generated public key failed validation: {err}");
                return self.restart_lost_session(session).await;
            }
        }
        self.store.set_state(session, FlowState::KeysReady);
        self.send(session, &text::keys_ready(label)).await?;

        Ok(())
    }

    async fn accept_target(&self, session: SessionId, input: &str) -> Result<()> {
        if self.store.with(session, |s| s.public_key.is_none()) {
            return self.restart_lost_session(session).await;
        }

        match Target::parse(input) {
            Ok(target) => {
                self.store
                    .with(session, |s| s.target = Some(target.clone()));
                self.store.set_state(session, FlowState::WaitForPassword);

                let notice = self.send(session, &text::connecting(&target)).await?;
                let prompt = self.send(session, &text::ask_password(&target)).await?;
                self.store.with(session, |s| {
                    s.prompts_to_scrub.push(notice);
                    s.prompts_to_scrub.push(prompt);
                });
            }
            Err(err) => {
                tracing::debug!(%session, "rejected target: {err}");
                self.send(session, text::TARGET_REJECTED).await?;
            }
        }
        Ok(())
    }

    /// Spawn the provisioning attempt as a supervised task. The dispatcher
    /// stays responsive; `WaitForPassword` remains the supervisory state.
    async fn launch_provisioning(
        &self,
        session: SessionId,
        password: Zeroizing<String>,
    ) -> Result<()> {
        let (target, key) = self
            .store
            .with(session, |s| (s.target.clone(), s.public_key.clone()));
        let (Some(target), Some(key)) = (target, key) else {
            return self.restart_lost_session(session).await;
        };

        let token = CancellationToken::new();
        if !self.store.begin_attempt(session, token.clone()) {
            tracing::debug!(%session, "provisioning already running, ignoring extra reply");
            return Ok(());
        }

        let notice = self.send(session, &text::authenticating(&target)).await?;

        let label = self
            .store
            .with(session, |s| s.key_kind.map(|k| k.label()))
            .unwrap_or("SSH");
        let store = Arc::clone(&self.store);
        let conversation = Arc::clone(&self.conversation);
        let settings = self.settings.clone();

        tokio::spawn(async move {
            let bridge = Bridge::new(
                session,
                Arc::clone(&store),
                Arc::clone(&conversation),
                password,
            );

            let result = tokio::select! {
                _ = token.cancelled() => Err(ssh::Error::Cancelled),
                result = ssh::provision(&target, &key, &bridge, &settings) => result,
            };

            let _ = conversation.delete_message(session, notice).await;

            if matches!(result, Err(ssh::Error::Cancelled)) {
                // The cancel path already reported and reset the session;
                // dropping the provision future tore the connection down.
                tracing::info!(%session, %target, "provisioning cancelled");
                return;
            }

            report_outcome(&conversation, session, &target, label, result).await;
            store.finish_attempt(session);
            let _ = conversation.send_prompt(session, text::MAIN_MENU).await;
        });

        Ok(())
    }

    async fn restart_lost_session(&self, session: SessionId) -> Result<()> {
        self.store.reset(session);
        self.send(session, text::SESSION_LOST).await?;
        self.send(session, text::MAIN_MENU).await?;
        Ok(())
    }

    async fn scrub_reply(&self, session: SessionId, event: &Event) {
        if let Some(handle) = event.message {
            let _ = self.conversation.delete_message(session, handle).await;
        }
    }

    async fn scrub_stored_prompts(&self, session: SessionId) {
        let handles: Vec<MessageHandle> = self
            .store
            .with(session, |s| std::mem::take(&mut s.prompts_to_scrub));
        for handle in handles {
            let _ = self.conversation.delete_message(session, handle).await;
        }
    }

    async fn send(&self, session: SessionId, message: &str) -> Result<MessageHandle> {
        Ok(self.conversation.send_prompt(session, message).await?)
    }
}

fn hash_algorithm_for(choice: MenuChoice) -> Option<HashAlgorithm> {
    match choice {
        MenuChoice::HashMd5 => Some(HashAlgorithm::Md5),
        MenuChoice::HashSha1 => Some(HashAlgorithm::Sha1),
        MenuChoice::HashSha256 => Some(HashAlgorithm::Sha256),
        MenuChoice::HashSha512 => Some(HashAlgorithm::Sha512),
        MenuChoice::HashBlake2b => Some(HashAlgorithm::Blake2b),
        _ => None,
    }
}

async fn report_outcome(
    conversation: &Arc<dyn Conversation>,
    session: SessionId,
    target: &Target,
    label: &str,
    result: ssh::Result<InstallOutcome>,
) {
    let message = match result {
        Ok(InstallOutcome::Added) => format!(
            "The {label} key was added to {target}. \
             You can now log in with `ssh {target}` without a password."
        ),
        Ok(InstallOutcome::AlreadyPresent) => format!(
            "The {label} key is already present on {target}. \
             `ssh {target}` works without a password."
        ),
        Ok(InstallOutcome::RemoteCommandFailed(excerpt)) => format!(
            "The server rejected the install command:\n{excerpt}\n\
             Check the permissions of ~/.ssh on the server."
        ),
        Err(ssh::Error::AuthenticationFailed) => format!(
            "Authentication failed for {target}: wrong password, or the \
             server requires a 2FA method that was not completed. Try again."
        ),
        Err(ssh::Error::HostKeyUnverifiable(host)) => format!(
            "The host key for {host} is not in known_hosts. Connect once \
             manually with `ssh {target}`, accept the fingerprint, and retry."
        ),
        Err(ssh::Error::ChallengeTimeout) => "The 2FA challenge timed out.".to_string(),
        Err(ssh::Error::Connection(detail)) => format!("Connection failed: {detail}"),
        Err(ssh::Error::Cancelled) => text::CANCELLED.to_string(),
        Err(other) => {
            tracing::error!(%session, %target, "provisioning failed: {other}");
            format!(
                "Unexpected failure: {}",
                ssh::truncate_excerpt(&other.to_string())
            )
        }
    };

    let _ = conversation.send_prompt(session, &message).await;
}
