// ABOUTME: Per-session state store for the provisioning flow.
// ABOUTME: Owns transient secrets, the pending-challenge slot, and attempt cancellation.

use crate::digest::HashAlgorithm;
use crate::flow::FlowState;
use crate::keygen::KeyKind;
use crate::transport::MessageHandle;
use crate::types::{PublicKeyLine, SessionId, Target};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Correlation token tying a challenge prompt to the reply that resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeToken(u64);

/// Resolution of a pending challenge.
#[derive(Debug, PartialEq, Eq)]
pub enum ChallengeReply {
    Answer(String),
    Cancelled,
}

/// An outstanding interactive-auth prompt waiting for a correlated reply.
struct PendingChallenge {
    token: ChallengeToken,
    responder: oneshot::Sender<ChallengeReply>,
}

/// State of one conversation. Secrets are transient: the passphrase lives
/// only between entry and key generation, and private key material never
/// enters the store at all.
#[derive(Default)]
pub struct Session {
    pub state: FlowState,
    pub key_kind: Option<KeyKind>,
    pub public_key: Option<PublicKeyLine>,
    pub target: Option<Target>,
    pub hash_algorithm: Option<HashAlgorithm>,
    /// Prompt messages to scrub once the secret reply they asked for arrives.
    pub prompts_to_scrub: Vec<MessageHandle>,
    pending: Option<PendingChallenge>,
    cancellation: Option<CancellationToken>,
}

impl Session {
    pub fn attempt_running(&self) -> bool {
        self.cancellation.is_some()
    }

    pub fn challenge_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Store of all sessions, keyed by session id.
///
/// Mutations are confined to the owning session's task; the mutex only
/// guards the map itself and is never held across an await point.
pub struct Store {
    sessions: Mutex<HashMap<SessionId, Session>>,
    next_token: AtomicU64,
}

impl Store {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Run `f` against the session, creating it in its initial state first
    /// if this is the first interaction.
    pub fn with<R>(&self, id: SessionId, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.sessions.lock();
        f(sessions.entry(id).or_default())
    }

    pub fn state(&self, id: SessionId) -> FlowState {
        self.with(id, |s| s.state)
    }

    pub fn set_state(&self, id: SessionId, state: FlowState) {
        self.with(id, |s| s.state = state);
    }

    /// Clear everything back to the initial state. Resolves a pending
    /// challenge with the cancellation sentinel and cancels any in-flight
    /// provisioning attempt so nothing is left dangling.
    pub fn reset(&self, id: SessionId) {
        let session = {
            let mut sessions = self.sessions.lock();
            sessions.remove(&id)
        };

        if let Some(session) = session {
            if let Some(pending) = session.pending {
                let _ = pending.responder.send(ChallengeReply::Cancelled);
            }
            if let Some(token) = session.cancellation {
                token.cancel();
            }
        }
    }

    /// Register the single allowed pending challenge for a session.
    /// Fails when one is already outstanding.
    pub fn begin_challenge(
        &self,
        id: SessionId,
        responder: oneshot::Sender<ChallengeReply>,
    ) -> Result<ChallengeToken, ChallengeInProgress> {
        let token = ChallengeToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.with(id, |s| {
            if s.pending.is_some() {
                return Err(ChallengeInProgress);
            }
            s.pending = Some(PendingChallenge { token, responder });
            Ok(token)
        })
    }

    /// Resolve the pending challenge, if any. Returns false when there is
    /// none (a stale or mis-addressed reply, which the caller discards).
    pub fn resolve_challenge(&self, id: SessionId, reply: ChallengeReply) -> bool {
        let pending = self.with(id, |s| s.pending.take());
        match pending {
            Some(p) => p.responder.send(reply).is_ok(),
            None => false,
        }
    }

    /// Drop the pending challenge slot, but only if it still belongs to
    /// `token`. A newer challenge registered after a timeout stays intact.
    pub fn clear_challenge(&self, id: SessionId, token: ChallengeToken) {
        self.with(id, |s| {
            if s.pending.as_ref().is_some_and(|p| p.token == token) {
                s.pending = None;
            }
        });
    }

    /// Record the cancellation token of a provisioning attempt about to be
    /// spawned. Returns false (and leaves the session untouched) when an
    /// attempt is already running.
    pub fn begin_attempt(&self, id: SessionId, token: CancellationToken) -> bool {
        self.with(id, |s| {
            if s.cancellation.is_some() {
                return false;
            }
            s.cancellation = Some(token);
            true
        })
    }

    /// Cancel an in-flight attempt: resolve the challenge slot with the
    /// cancellation sentinel and fire the cancellation token.
    pub fn cancel_attempt(&self, id: SessionId) {
        let (pending, cancellation) = self.with(id, |s| (s.pending.take(), s.cancellation.take()));
        if let Some(p) = pending {
            let _ = p.responder.send(ChallengeReply::Cancelled);
        }
        if let Some(token) = cancellation {
            token.cancel();
        }
    }

    /// Mark the attempt finished and return the session to the main menu,
    /// clearing per-attempt state.
    pub fn finish_attempt(&self, id: SessionId) {
        self.with(id, |s| {
            s.pending = None;
            s.cancellation = None;
            s.target = None;
            s.public_key = None;
            s.key_kind = None;
            s.prompts_to_scrub.clear();
            s.state = FlowState::MainMenu;
        });
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Returned by `begin_challenge` when the per-session slot is occupied.
#[derive(Debug, PartialEq, Eq)]
pub struct ChallengeInProgress;

#[cfg(test)]
mod tests {
    use super::*;

    const ID: SessionId = SessionId::CONSOLE;

    #[test]
    fn sessions_start_in_main_menu() {
        let store = Store::new();
        assert_eq!(store.state(ID), FlowState::MainMenu);
    }

    #[test]
    fn at_most_one_pending_challenge() {
        let store = Store::new();
        let (tx1, _rx1) = oneshot::channel();
        let (tx2, _rx2) = oneshot::channel();

        store.begin_challenge(ID, tx1).unwrap();
        assert_eq!(store.begin_challenge(ID, tx2), Err(ChallengeInProgress));
    }

    #[test]
    fn resolve_without_pending_is_discarded() {
        let store = Store::new();
        assert!(!store.resolve_challenge(ID, ChallengeReply::Answer("123".into())));
    }

    #[test]
    fn resolve_delivers_reply() {
        let store = Store::new();
        let (tx, mut rx) = oneshot::channel();
        store.begin_challenge(ID, tx).unwrap();

        assert!(store.resolve_challenge(ID, ChallengeReply::Answer("otp".into())));
        assert_eq!(rx.try_recv().unwrap(), ChallengeReply::Answer("otp".into()));
        // Slot is free again.
        assert!(!store.resolve_challenge(ID, ChallengeReply::Cancelled));
    }

    #[test]
    fn clear_challenge_respects_token_ownership() {
        let store = Store::new();
        let (tx1, _rx1) = oneshot::channel();
        let stale = store.begin_challenge(ID, tx1).unwrap();

        store.resolve_challenge(ID, ChallengeReply::Cancelled);
        let (tx2, _rx2) = oneshot::channel();
        let fresh = store.begin_challenge(ID, tx2).unwrap();

        // Clearing with the stale token must not drop the fresh challenge.
        store.clear_challenge(ID, stale);
        assert_eq!(store.begin_challenge(ID, oneshot::channel().0), Err(ChallengeInProgress));

        store.clear_challenge(ID, fresh);
        let (tx3, _rx3) = oneshot::channel();
        assert!(store.begin_challenge(ID, tx3).is_ok());
    }

    #[test]
    fn reset_resolves_pending_with_cancellation() {
        let store = Store::new();
        let (tx, mut rx) = oneshot::channel();
        store.begin_challenge(ID, tx).unwrap();

        store.reset(ID);
        assert_eq!(rx.try_recv().unwrap(), ChallengeReply::Cancelled);
        assert_eq!(store.state(ID), FlowState::MainMenu);
    }

    #[test]
    fn second_attempt_is_refused_while_one_runs() {
        let store = Store::new();
        assert!(store.begin_attempt(ID, CancellationToken::new()));
        assert!(!store.begin_attempt(ID, CancellationToken::new()));

        store.finish_attempt(ID);
        assert!(store.begin_attempt(ID, CancellationToken::new()));
    }

    #[test]
    fn cancel_attempt_fires_token() {
        let store = Store::new();
        let token = CancellationToken::new();
        store.begin_attempt(ID, token.clone());

        store.cancel_attempt(ID);
        assert!(token.is_cancelled());
    }

    #[test]
    fn finish_attempt_clears_session_data() {
        let store = Store::new();
        store.with(ID, |s| {
            s.state = FlowState::WaitForPassword;
            s.target = Some(Target::parse("root@host").unwrap());
            s.public_key = Some(PublicKeyLine::parse("ssh-ed25519 AAAA").unwrap());
        });

        store.finish_attempt(ID);
        store.with(ID, |s| {
            assert_eq!(s.state, FlowState::MainMenu);
            assert!(s.target.is_none());
            assert!(s.public_key.is_none());
        });
    }
}
