//! Multipart upload assembly with byte-counted progress.

use super::ProgressFn;
use crate::error::Result;
use futures::{Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const CHUNK_SIZE: usize = 64 * 1024;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const TEXT_MIME: &str = "text/plain";

/// File types the knowledge base accepts for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentKind {
    pub fn mime(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => PDF_MIME,
            DocumentKind::Docx => DOCX_MIME,
            DocumentKind::PlainText => TEXT_MIME,
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        // Drop parameters such as "; charset=utf-8".
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        match essence.as_str() {
            PDF_MIME => Some(DocumentKind::Pdf),
            DOCX_MIME => Some(DocumentKind::Docx),
            TEXT_MIME => Some(DocumentKind::PlainText),
            _ => None,
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            "txt" => Some(DocumentKind::PlainText),
            _ => None,
        }
    }

    /// Content type first, extension as fallback.
    pub fn detect(file: &UploadFile) -> Option<Self> {
        Self::from_content_type(&file.content_type).or_else(|| Self::from_file_name(&file.name))
    }
}

/// A file selected for upload, held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, deriving its content type from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let bytes = std::fs::read(path)?;
        let content_type = DocumentKind::from_file_name(&name)
            .map(|kind| kind.mime())
            .unwrap_or("application/octet-stream");
        Ok(Self::new(name, content_type, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Whole-batch percentage, rounded to nearest.
pub fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (sent.min(total) as f64 * 100.0 / total as f64).round();
    pct as u8
}

/// Shared byte counter for every part of one submission.
pub struct ProgressCounter {
    sent: AtomicU64,
    total: u64,
    on_progress: ProgressFn,
}

impl ProgressCounter {
    pub fn new(total: u64, on_progress: ProgressFn) -> Self {
        Self {
            sent: AtomicU64::new(0),
            total,
            on_progress,
        }
    }

    fn advance(&self, n: u64) {
        let sent = self.sent.fetch_add(n, Ordering::Relaxed) + n;
        (self.on_progress)(sent.min(self.total), self.total);
    }
}

/// Chunk `bytes` into a stream that reports each chunk as it is pulled.
pub fn counted_chunks(
    bytes: Vec<u8>,
    counter: Arc<ProgressCounter>,
) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + Sync + 'static {
    let chunks: Vec<std::io::Result<Vec<u8>>> =
        bytes.chunks(CHUNK_SIZE).map(|c| Ok(c.to_vec())).collect();
    futures::stream::iter(chunks).inspect(move |chunk| {
        if let Ok(chunk) = chunk {
            counter.advance(chunk.len() as u64);
        }
    })
}

/// Build the `files[]` + `tags` form for one submission.
pub fn build_form(files: Vec<UploadFile>, tags: Option<String>, on_progress: ProgressFn) -> Result<Form> {
    let total: u64 = files.iter().map(UploadFile::size).sum();
    let counter = Arc::new(ProgressCounter::new(total, on_progress));

    let mut form = Form::new();
    for file in files {
        let len = file.size();
        // Screening may have accepted the file by extension alone.
        let mime = DocumentKind::detect(&file)
            .map(|kind| kind.mime().to_string())
            .unwrap_or_else(|| file.content_type.clone());
        let body = Body::wrap_stream(counted_chunks(file.bytes, counter.clone()));
        let part = Part::stream_with_length(body, len)
            .file_name(file.name)
            .mime_str(&mime)?;
        form = form.part("files", part);
    }
    if let Some(tags) = tags.filter(|t| !t.is_empty()) {
        form = form.text("tags", tags);
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_detect_by_content_type_then_extension() {
        let pdf = UploadFile::new("report", "application/pdf", vec![]);
        assert_eq!(DocumentKind::detect(&pdf), Some(DocumentKind::Pdf));

        let txt = UploadFile::new("notes.TXT", "", vec![]);
        assert_eq!(DocumentKind::detect(&txt), Some(DocumentKind::PlainText));

        let charset = UploadFile::new("a", "text/plain; charset=utf-8", vec![]);
        assert_eq!(DocumentKind::detect(&charset), Some(DocumentKind::PlainText));

        let png = UploadFile::new("photo.png", "image/png", vec![]);
        assert_eq!(DocumentKind::detect(&png), None);
    }

    #[test]
    fn test_percent_rounds_and_clamps() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(5, 3), 100);
    }

    #[test]
    fn test_counter_spans_every_part() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let on_progress: ProgressFn = Arc::new(move |sent: u64, total: u64| {
            sink.lock().unwrap().push((sent, total));
        });
        let first = vec![0u8; CHUNK_SIZE + 10];
        let second = vec![1u8; 20];
        let total = (first.len() + second.len()) as u64;
        let counter = Arc::new(ProgressCounter::new(total, on_progress));

        let a: Vec<_> =
            futures::executor::block_on(counted_chunks(first, counter.clone()).collect());
        let b: Vec<_> = futures::executor::block_on(counted_chunks(second, counter).collect());
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 1);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (CHUNK_SIZE as u64, total),
                (CHUNK_SIZE as u64 + 10, total),
                (total, total),
            ]
        );
    }

    #[test]
    fn test_build_form_rejects_bad_mime_of_unknown_kind() {
        let noop: ProgressFn = Arc::new(|_: u64, _: u64| {});
        let file = UploadFile::new("a.bin", "not a mime", b"x".to_vec());
        assert!(build_form(vec![file], None, noop).is_err());
    }

    #[test]
    fn test_form_accepts_file_typed_by_extension_only() {
        let noop: ProgressFn = Arc::new(|_: u64, _: u64| {});
        let files = vec![
            UploadFile::new("notes.txt", "", b"hello".to_vec()),
            UploadFile::new("spec.docx", "not a mime", vec![0u8; 4]),
        ];
        assert!(build_form(files, None, noop).is_ok());
    }
}
