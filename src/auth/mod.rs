// ABOUTME: Authentication bridge between the SSH layer and the conversation.
// ABOUTME: Turns server-initiated auth prompts into conversational round-trips.

use crate::flow::FlowState;
use crate::session::{ChallengeReply, Store};
use crate::transport::Conversation;
use crate::types::{SessionId, Target};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use zeroize::Zeroizing;

/// Hard deadline for a keyboard-interactive challenge response.
pub const CHALLENGE_TIMEOUT: Duration = Duration::from_secs(120);

/// One prompt of a keyboard-interactive round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengePrompt {
    pub text: String,
    /// Whether the response may be echoed back to the user.
    pub echo: bool,
}

#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("challenge response timed out after {}s", CHALLENGE_TIMEOUT.as_secs())]
    Timeout,

    #[error("authentication cancelled")]
    Cancelled,

    #[error("another challenge is already pending for this session")]
    AlreadyPending,

    #[error("challenge prompt could not be delivered")]
    PromptDelivery,
}

/// Credential capabilities the SSH client needs during authentication.
///
/// Implemented by a plain value closing over session context; any client
/// that accepts pluggable authenticators can consume it without
/// inheritance-style hooks.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// The password already captured for this session.
    async fn password_for(&self, target: &Target) -> Zeroizing<String>;

    /// Answer one round of server-supplied prompts. Must not block the
    /// caller's scheduling thread; suspension is cooperative.
    async fn challenge(
        &self,
        prompts: &[ChallengePrompt],
    ) -> Result<Vec<String>, ChallengeError>;
}

/// Bridge wiring one session's conversation into the authenticator seam.
pub struct Bridge {
    session: SessionId,
    store: Arc<Store>,
    conversation: Arc<dyn Conversation>,
    password: Zeroizing<String>,
}

impl Bridge {
    pub fn new(
        session: SessionId,
        store: Arc<Store>,
        conversation: Arc<dyn Conversation>,
        password: Zeroizing<String>,
    ) -> Self {
        Self {
            session,
            store,
            conversation,
            password,
        }
    }
}

#[async_trait]
impl Authenticator for Bridge {
    async fn password_for(&self, _target: &Target) -> Zeroizing<String> {
        self.password.clone()
    }

    async fn challenge(
        &self,
        prompts: &[ChallengePrompt],
    ) -> Result<Vec<String>, ChallengeError> {
        let mut answers = Vec::with_capacity(prompts.len());

        for prompt in prompts {
            let (tx, rx) = oneshot::channel();
            let token = self
                .store
                .begin_challenge(self.session, tx)
                .map_err(|_| ChallengeError::AlreadyPending)?;

            // The dispatcher routes the next reply in this state to the
            // challenge slot instead of interpreting it as flow input.
            self.store.set_state(self.session, FlowState::WaitFor2fa);

            let text = format!("2FA challenge from the server:\n{}\nEnter the code:", prompt.text);
            let handle = self
                .conversation
                .send_prompt(self.session, &text)
                .await
                .map_err(|err| {
                    tracing::warn!(session = %self.session, "challenge prompt delivery failed: {err}");
                    self.store.clear_challenge(self.session, token);
                    ChallengeError::PromptDelivery
                })?;

            let reply = tokio::time::timeout(CHALLENGE_TIMEOUT, rx).await;
            let _ = self.conversation.delete_message(self.session, handle).await;

            match reply {
                Ok(Ok(ChallengeReply::Answer(answer))) => answers.push(answer),
                Ok(Ok(ChallengeReply::Cancelled)) => return Err(ChallengeError::Cancelled),
                // Sender dropped: the session was torn down underneath us.
                Ok(Err(_)) => return Err(ChallengeError::Cancelled),
                Err(_) => {
                    self.store.clear_challenge(self.session, token);
                    self.store.set_state(self.session, FlowState::WaitForPassword);
                    return Err(ChallengeError::Timeout);
                }
            }
        }

        Ok(answers)
    }
}
