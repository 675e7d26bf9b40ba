// ABOUTME: Integration tests for the authentication bridge.
// ABOUTME: Covers correlation, the 120-second deadline, and cancellation semantics.

mod support;

use keyferry::auth::{Authenticator, Bridge, ChallengeError, ChallengePrompt};
use keyferry::flow::FlowState;
use keyferry::session::{ChallengeReply, Store};
use keyferry::transport::Conversation;
use keyferry::types::{SessionId, Target};
use std::sync::Arc;
use std::time::Duration;
use support::ScriptedConversation;
use zeroize::Zeroizing;

const SESSION: SessionId = SessionId::CONSOLE;

struct Fixture {
    store: Arc<Store>,
    conversation: Arc<ScriptedConversation>,
    bridge: Arc<Bridge>,
}

fn fixture() -> Fixture {
    support::init_tracing();
    let store = Arc::new(Store::new());
    let conversation = Arc::new(ScriptedConversation::new());
    let bridge = Arc::new(Bridge::new(
        SESSION,
        Arc::clone(&store),
        Arc::clone(&conversation) as Arc<dyn Conversation>,
        Zeroizing::new("hunter2".to_string()),
    ));
    Fixture {
        store,
        conversation,
        bridge,
    }
}

fn prompt(text: &str) -> ChallengePrompt {
    ChallengePrompt {
        text: text.to_string(),
        echo: false,
    }
}

async fn wait_for_pending(store: &Store) {
    for _ in 0..250 {
        if store.with(SESSION, |s| s.challenge_pending()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("challenge never became pending");
}

/// Test: the captured password is returned as-is.
#[tokio::test]
async fn password_for_returns_captured_password() {
    let fx = fixture();
    let target = Target::parse("root@example.com").unwrap();
    let password = fx.bridge.password_for(&target).await;
    assert_eq!(password.as_str(), "hunter2");
}

/// Test: a correlated reply resolves the challenge with the user's answer.
#[tokio::test]
async fn correlated_reply_resolves_challenge() {
    let fx = fixture();

    let bridge = Arc::clone(&fx.bridge);
    let task = tokio::spawn(async move { bridge.challenge(&[prompt("Verification code:")]).await });

    wait_for_pending(&fx.store).await;
    // The prompt reached the conversation and the state flipped to 2FA wait.
    assert!(
        fx.conversation
            .prompts()
            .iter()
            .any(|p| p.contains("Verification code:"))
    );
    assert_eq!(fx.store.state(SESSION), FlowState::WaitFor2fa);

    assert!(
        fx.store
            .resolve_challenge(SESSION, ChallengeReply::Answer("123456".into()))
    );

    let answers = task.await.unwrap().unwrap();
    assert_eq!(answers, vec!["123456".to_string()]);
    assert!(!fx.store.with(SESSION, |s| s.challenge_pending()));
}

/// Test: multiple prompts are answered one at a time over the same slot.
#[tokio::test]
async fn prompts_are_answered_sequentially() {
    let fx = fixture();

    let bridge = Arc::clone(&fx.bridge);
    let task = tokio::spawn(async move {
        bridge
            .challenge(&[prompt("First code:"), prompt("Second code:")])
            .await
    });

    wait_for_pending(&fx.store).await;
    fx.store
        .resolve_challenge(SESSION, ChallengeReply::Answer("one".into()));

    wait_for_pending(&fx.store).await;
    fx.store
        .resolve_challenge(SESSION, ChallengeReply::Answer("two".into()));

    let answers = task.await.unwrap().unwrap();
    assert_eq!(answers, vec!["one".to_string(), "two".to_string()]);
    assert_eq!(fx.conversation.prompt_count(), 2);
}

/// Test: no reply within 120 seconds resolves to Timeout.
/// Expected: the pending slot is cleared, state reverts to the password wait.
#[tokio::test(start_paused = true)]
async fn no_reply_times_out_after_deadline() {
    let fx = fixture();

    let result = fx.bridge.challenge(&[prompt("Code:")]).await;

    assert!(matches!(result, Err(ChallengeError::Timeout)));
    assert!(!fx.store.with(SESSION, |s| s.challenge_pending()));
    assert_eq!(fx.store.state(SESSION), FlowState::WaitForPassword);

    // A reply arriving after the deadline is discarded, not delivered.
    assert!(
        !fx.store
            .resolve_challenge(SESSION, ChallengeReply::Answer("late".into()))
    );
}

/// Test: cancelling the session resolves the challenge with the sentinel.
#[tokio::test]
async fn cancellation_resolves_challenge_with_sentinel() {
    let fx = fixture();

    let bridge = Arc::clone(&fx.bridge);
    let task = tokio::spawn(async move { bridge.challenge(&[prompt("Code:")]).await });

    wait_for_pending(&fx.store).await;
    fx.store.cancel_attempt(SESSION);

    let result = task.await.unwrap();
    assert!(matches!(result, Err(ChallengeError::Cancelled)));
    assert!(!fx.store.with(SESSION, |s| s.challenge_pending()));
}

/// Test: the single-challenge invariant is enforced per session.
#[tokio::test]
async fn concurrent_challenge_is_refused() {
    let fx = fixture();

    let (tx, _rx) = tokio::sync::oneshot::channel();
    fx.store.begin_challenge(SESSION, tx).unwrap();

    let result = fx.bridge.challenge(&[prompt("Code:")]).await;
    assert!(matches!(result, Err(ChallengeError::AlreadyPending)));
}
