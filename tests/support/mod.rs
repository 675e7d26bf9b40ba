// ABOUTME: Test support utilities.
// ABOUTME: Provides a scripted in-memory transport for flow and bridge tests.

use async_trait::async_trait;
use keyferry::transport::{Conversation, MessageHandle, Result as TransportResult};
use keyferry::types::SessionId;
use parking_lot::Mutex;
use std::sync::Once;
use std::sync::atomic::{AtomicU64, Ordering};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("keyferry=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A delivered document: filename, content, caption.
#[derive(Debug, Clone)]
pub struct SentDocument {
    pub filename: String,
    pub content: String,
    pub caption: String,
}

/// In-memory transport recording everything the flow sends.
#[derive(Default)]
pub struct ScriptedConversation {
    prompts: Mutex<Vec<String>>,
    documents: Mutex<Vec<SentDocument>>,
    deleted: Mutex<Vec<MessageHandle>>,
    next_handle: AtomicU64,
}

#[allow(dead_code)]
impl ScriptedConversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn documents(&self) -> Vec<SentDocument> {
        self.documents.lock().clone()
    }

    pub fn deleted(&self) -> Vec<MessageHandle> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl Conversation for ScriptedConversation {
    async fn send_prompt(&self, _session: SessionId, text: &str) -> TransportResult<MessageHandle> {
        self.prompts.lock().push(text.to_string());
        Ok(MessageHandle::new(
            self.next_handle.fetch_add(1, Ordering::Relaxed),
        ))
    }

    async fn delete_message(&self, _session: SessionId, handle: MessageHandle) -> TransportResult<()> {
        self.deleted.lock().push(handle);
        Ok(())
    }

    async fn send_document(
        &self,
        _session: SessionId,
        filename: &str,
        content: &[u8],
        caption: &str,
    ) -> TransportResult<()> {
        self.documents.lock().push(SentDocument {
            filename: filename.to_string(),
            content: String::from_utf8_lossy(content).to_string(),
            caption: caption.to_string(),
        });
        Ok(())
    }
}
