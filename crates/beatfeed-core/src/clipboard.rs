use crate::{FeedError, FeedResult};
use async_trait::async_trait;
use std::sync::Mutex;

/// "Write text to the system clipboard", as offered by the host.
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> FeedResult<()>;
}

/// Keeps the last written text in memory.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|val| val.clone())
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> FeedResult<()> {
        let mut contents = self.contents.lock().map_err(|_| FeedError::Clipboard {
            msg: "clipboard lock poisoned".into(),
        })?;
        *contents = Some(text.to_owned());
        Ok(())
    }
}
