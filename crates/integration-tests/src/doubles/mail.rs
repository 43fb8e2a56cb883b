//! Recording mailer and an in-memory chapter library.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use guidebook_core::Chapter;
use guidebook_storefront::services::chapters::{
    CHAPTER_CONTENT_TYPE, ChapterLibrary, attachment_name,
};
use guidebook_storefront::services::email::{Attachment, EmailError, Mailer, OutgoingEmail};

/// Keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every message addressed to `recipient`.
    pub fn fail_for(&self, recipient: &str) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(recipient.to_owned());
    }

    /// Messages accepted so far.
    #[must_use]
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        if self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(email.to.as_str())
        {
            return Err(EmailError::InvalidAddress(email.to.to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email);
        Ok(())
    }
}

/// Chapter files held in memory.
#[derive(Default)]
pub struct InMemoryChapterLibrary {
    files: BTreeMap<u32, Vec<u8>>,
}

impl InMemoryChapterLibrary {
    /// Library with a small fake PDF for chapters `1..=count`.
    #[must_use]
    pub fn with_chapters(count: u32) -> Self {
        let files = (1..=count)
            .map(|n| (n, format!("%PDF-1.4 chapter {n}").into_bytes()))
            .collect();
        Self { files }
    }
}

#[async_trait]
impl ChapterLibrary for InMemoryChapterLibrary {
    async fn attachment(&self, chapter: Chapter) -> Option<Attachment> {
        self.files.get(&chapter.get()).map(|bytes| Attachment {
            filename: attachment_name(chapter),
            content_type: CHAPTER_CONTENT_TYPE.to_owned(),
            bytes: bytes.clone(),
        })
    }
}
