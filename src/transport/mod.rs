// ABOUTME: Conversational transport seam and the event model driving the flow.
// ABOUTME: The core never renders markup; transports own presentation entirely.

pub mod console;

pub use console::ConsoleTransport;

use crate::types::SessionId;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Handle to a delivered message, usable for later deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(u64);

impl MessageHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Outbound half of the conversational transport.
///
/// Implementations deliver text and documents to the user of a session and
/// can delete previously delivered messages (used to scrub prompts that
/// carried secrets).
#[async_trait]
pub trait Conversation: Send + Sync {
    async fn send_prompt(&self, session: SessionId, text: &str) -> Result<MessageHandle>;

    async fn delete_message(&self, session: SessionId, handle: MessageHandle) -> Result<()>;

    async fn send_document(
        &self,
        session: SessionId,
        filename: &str,
        content: &[u8],
        caption: &str,
    ) -> Result<()>;
}

/// One discrete user interaction delivered by a transport subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub session: SessionId,
    pub kind: EventKind,
    /// Handle of the message that carried this event, when the transport can
    /// delete it. Replies holding secrets are scrubbed through this.
    pub message: Option<MessageHandle>,
}

impl Event {
    pub fn select(session: SessionId, choice: MenuChoice) -> Self {
        Self {
            session,
            kind: EventKind::Select(choice),
            message: None,
        }
    }

    pub fn reply(session: SessionId, text: impl Into<String>) -> Self {
        Self {
            session,
            kind: EventKind::Reply(text.into()),
            message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Start over: reset the session and show the main menu.
    Start,
    /// Show the capability summary.
    Help,
    /// A menu button was selected.
    Select(MenuChoice),
    /// A free-text reply.
    Reply(String),
}

/// Every menu button the flow understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    MainMenu,
    SshMenu,
    HashMenu,
    GenerateKey,
    ExportExisting,
    KeyRsa4096,
    KeyEd25519,
    NoPassphrase,
    ExportToServer,
    HashCalculate,
    HashInfo,
    HashMd5,
    HashSha1,
    HashSha256,
    HashSha512,
    HashBlake2b,
    Cancel,
}

impl MenuChoice {
    /// Keyword used by line-oriented transports (`/rsa`, `/cancel`, ...).
    pub fn keyword(&self) -> &'static str {
        match self {
            MenuChoice::MainMenu => "menu",
            MenuChoice::SshMenu => "ssh",
            MenuChoice::HashMenu => "hash",
            MenuChoice::GenerateKey => "generate",
            MenuChoice::ExportExisting => "export",
            MenuChoice::KeyRsa4096 => "rsa",
            MenuChoice::KeyEd25519 => "ed25519",
            MenuChoice::NoPassphrase => "nopass",
            MenuChoice::ExportToServer => "server",
            MenuChoice::HashCalculate => "calc",
            MenuChoice::HashInfo => "info",
            MenuChoice::HashMd5 => "md5",
            MenuChoice::HashSha1 => "sha1",
            MenuChoice::HashSha256 => "sha256",
            MenuChoice::HashSha512 => "sha512",
            MenuChoice::HashBlake2b => "blake2b",
            MenuChoice::Cancel => "cancel",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        const ALL: [MenuChoice; 17] = [
            MenuChoice::MainMenu,
            MenuChoice::SshMenu,
            MenuChoice::HashMenu,
            MenuChoice::GenerateKey,
            MenuChoice::ExportExisting,
            MenuChoice::KeyRsa4096,
            MenuChoice::KeyEd25519,
            MenuChoice::NoPassphrase,
            MenuChoice::ExportToServer,
            MenuChoice::HashCalculate,
            MenuChoice::HashInfo,
            MenuChoice::HashMd5,
            MenuChoice::HashSha1,
            MenuChoice::HashSha256,
            MenuChoice::HashSha512,
            MenuChoice::HashBlake2b,
            MenuChoice::Cancel,
        ];
        ALL.into_iter().find(|c| c.keyword() == keyword)
    }
}

impl fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.keyword())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_roundtrip() {
        for keyword in ["ssh", "rsa", "ed25519", "cancel", "blake2b"] {
            let choice = MenuChoice::from_keyword(keyword).unwrap();
            assert_eq!(choice.keyword(), keyword);
        }
    }

    #[test]
    fn unknown_keyword_is_none() {
        assert!(MenuChoice::from_keyword("frobnicate").is_none());
    }
}
