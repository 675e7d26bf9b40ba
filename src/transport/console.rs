// ABOUTME: Line-oriented console transport for running the flow interactively.
// ABOUTME: Menu selections arrive as /keyword commands, anything else is a reply.

use super::{Conversation, Event, EventKind, MenuChoice, MessageHandle, Result};
use crate::types::SessionId;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Single-session transport over stdin/stdout.
///
/// Messages cannot be retracted from a terminal, so `delete_message` is a
/// no-op; documents are printed inline.
pub struct ConsoleTransport {
    next_handle: AtomicU64,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
        }
    }

    fn allocate_handle(&self) -> MessageHandle {
        MessageHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Conversation for ConsoleTransport {
    async fn send_prompt(&self, _session: SessionId, text: &str) -> Result<MessageHandle> {
        println!("{text}");
        Ok(self.allocate_handle())
    }

    async fn delete_message(&self, _session: SessionId, _handle: MessageHandle) -> Result<()> {
        Ok(())
    }

    async fn send_document(
        &self,
        _session: SessionId,
        filename: &str,
        content: &[u8],
        caption: &str,
    ) -> Result<()> {
        println!("--- {filename} ---");
        println!("{}", String::from_utf8_lossy(content));
        println!("--- end of {filename} ---");
        println!("{caption}");
        Ok(())
    }
}

/// Parse one console line into an event for `session`.
pub fn parse_line(session: SessionId, line: &str) -> Option<Event> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let kind = match line.strip_prefix('/') {
        Some("start") => EventKind::Start,
        Some("help") => EventKind::Help,
        Some(keyword) => match MenuChoice::from_keyword(&keyword.to_ascii_lowercase()) {
            Some(choice) => EventKind::Select(choice),
            None => EventKind::Reply(line.to_string()),
        },
        None => EventKind::Reply(line.to_string()),
    };

    Some(Event {
        session,
        kind,
        message: None,
    })
}

/// Read stdin lines and feed parsed events into the dispatcher channel until
/// stdin closes or the receiver goes away.
pub async fn read_events(session: SessionId, events: mpsc::Sender<Event>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(event) = parse_line(session, &line) {
            if events.send(event).await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION: SessionId = SessionId::CONSOLE;

    #[test]
    fn slash_keyword_becomes_selection() {
        let event = parse_line(SESSION, "/rsa").unwrap();
        assert_eq!(event.kind, EventKind::Select(MenuChoice::KeyRsa4096));
    }

    #[test]
    fn start_and_help_are_distinct_events() {
        assert_eq!(parse_line(SESSION, "/start").unwrap().kind, EventKind::Start);
        assert_eq!(parse_line(SESSION, "/help").unwrap().kind, EventKind::Help);
    }

    #[test]
    fn plain_text_becomes_reply() {
        let event = parse_line(SESSION, "root@192.168.1.100").unwrap();
        assert_eq!(
            event.kind,
            EventKind::Reply("root@192.168.1.100".to_string())
        );
    }

    #[test]
    fn unknown_slash_word_falls_back_to_reply() {
        let event = parse_line(SESSION, "/whatever").unwrap();
        assert_eq!(event.kind, EventKind::Reply("/whatever".to_string()));
    }

    #[test]
    fn blank_lines_are_dropped() {
        assert!(parse_line(SESSION, "   ").is_none());
    }
}
