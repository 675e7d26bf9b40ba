// ABOUTME: SSH-specific error types.
// ABOUTME: Maps connection, host key, authentication, and challenge failures.

use crate::auth::ChallengeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authentication failed: the server rejected the credentials")]
    AuthenticationFailed,

    #[error("host key for {0} could not be verified")]
    HostKeyUnverifiable(String),

    #[error("2FA challenge timed out")]
    ChallengeTimeout,

    #[error("provisioning cancelled")]
    Cancelled,

    #[error("challenge prompt could not be relayed to the user")]
    PromptRelay,

    #[error("command execution failed: {0}")]
    CommandFailed(String),

    #[error("command timed out after {0:?}")]
    CommandTimeout(std::time::Duration),

    #[error("channel closed unexpectedly without exit status")]
    ChannelClosed,

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),
}

impl From<ChallengeError> for Error {
    fn from(err: ChallengeError) -> Self {
        match err {
            ChallengeError::Timeout => Error::ChallengeTimeout,
            ChallengeError::Cancelled => Error::Cancelled,
            ChallengeError::AlreadyPending | ChallengeError::PromptDelivery => Error::PromptRelay,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
