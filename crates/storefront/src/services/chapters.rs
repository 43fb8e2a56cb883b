//! Protected chapter PDFs.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use guidebook_core::Chapter;

use super::email::Attachment;

/// MIME type of every chapter file.
pub const CHAPTER_CONTENT_TYPE: &str = "application/pdf";

/// Source of chapter files.
#[async_trait]
pub trait ChapterLibrary: Send + Sync {
    /// Load a chapter as a mail attachment, or `None` if it isn't available.
    async fn attachment(&self, chapter: Chapter) -> Option<Attachment>;
}

/// Chapters stored as `{dir}/{n}.pdf`.
#[derive(Debug, Clone)]
pub struct FsChapterLibrary {
    dir: PathBuf,
}

impl FsChapterLibrary {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, chapter: Chapter) -> PathBuf {
        self.dir.join(format!("{chapter}.pdf"))
    }
}

/// Attachment file name for a chapter.
#[must_use]
pub fn attachment_name(chapter: Chapter) -> String {
    format!("rozdzial-{chapter}.pdf")
}

#[async_trait]
impl ChapterLibrary for FsChapterLibrary {
    async fn attachment(&self, chapter: Chapter) -> Option<Attachment> {
        let path = self.path(chapter);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(Attachment {
                filename: attachment_name(chapter),
                content_type: CHAPTER_CONTENT_TYPE.to_owned(),
                bytes,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read chapter file");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_existing_chapter() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("2.pdf"), b"%PDF-chapter-two").unwrap();

        let library = FsChapterLibrary::new(dir.path());
        let attachment = library.attachment(Chapter::new(2)).await.unwrap();

        assert_eq!(attachment.filename, "rozdzial-2.pdf");
        assert_eq!(attachment.content_type, "application/pdf");
        assert_eq!(attachment.bytes, b"%PDF-chapter-two");
    }

    #[tokio::test]
    async fn test_missing_chapter_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let library = FsChapterLibrary::new(dir.path());
        assert!(library.attachment(Chapter::new(7)).await.is_none());
    }
}
