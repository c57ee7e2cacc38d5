use crate::api::upload::percent;
use crate::api::{Backend, DocumentKind, DocumentQuery, ProgressFn, UploadFile, UrlImportRequest};
use crate::config::ClientConfig;
use crate::db::models::Document;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Text inputs shared by the upload and URL import forms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportForm {
    pub url: String,
    pub title: String,
    /// Comma-separated tags.
    pub tags: String,
}

#[derive(Debug, Clone, Default)]
pub struct KnowledgeState {
    pub documents: Vec<Document>,
    pub total: u64,
    pub is_loading: bool,
    pub search: String,
    pub selected_tags: Vec<String>,
    /// Percent complete per file name for the batch in flight.
    pub upload_progress: BTreeMap<String, u8>,
    pub form: ImportForm,
    /// Listing and import requests still outstanding.
    in_flight: usize,
}

impl KnowledgeState {
    fn begin_fetch(&mut self) {
        self.in_flight += 1;
        self.is_loading = true;
    }

    fn end_fetch(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.is_loading = self.in_flight > 0;
    }

    /// Distinct tags across the loaded page, in first-seen order.
    pub fn all_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for tag in self.documents.iter().flat_map(|d| d.tags.iter()) {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }

    /// Loaded documents carrying every selected tag.
    pub fn visible_documents(&self) -> Vec<Document> {
        self.documents
            .iter()
            .filter(|d| self.selected_tags.iter().all(|t| d.tags.contains(t)))
            .cloned()
            .collect()
    }
}

/// Split a comma-separated tag input, dropping blanks.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    UnsupportedType,
    TooLarge { size: u64, limit: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub file: String,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    /// Every file was rejected; no request was made.
    NothingToSend,
    Uploaded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadReport {
    pub status: UploadStatus,
    pub rejected: Vec<Rejection>,
}

pub struct KnowledgeBaseManager<B> {
    backend: B,
    state: Arc<Mutex<KnowledgeState>>,
    max_upload_bytes: u64,
    page_size: u32,
}

fn lock(state: &Mutex<KnowledgeState>) -> MutexGuard<'_, KnowledgeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B: Backend> KnowledgeBaseManager<B> {
    pub fn new(backend: B, config: &ClientConfig) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(KnowledgeState::default())),
            max_upload_bytes: config.max_upload_bytes,
            page_size: config.document_page_size,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn state(&self) -> MutexGuard<'_, KnowledgeState> {
        lock(&self.state)
    }

    pub fn snapshot(&self) -> KnowledgeState {
        self.state().clone()
    }

    pub fn all_tags(&self) -> Vec<String> {
        self.state().all_tags()
    }

    pub fn visible_documents(&self) -> Vec<Document> {
        self.state().visible_documents()
    }

    pub fn upload_progress(&self) -> BTreeMap<String, u8> {
        self.state().upload_progress.clone()
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.state().form.url = url.into();
    }

    pub fn set_url_title(&self, title: impl Into<String>) {
        self.state().form.title = title.into();
    }

    pub fn set_tag_input(&self, tags: impl Into<String>) {
        self.state().form.tags = tags.into();
    }

    /// Fetch the first page using the current search text and tag filter.
    pub async fn list_documents(&self) {
        let query = {
            let mut state = self.state();
            state.begin_fetch();
            DocumentQuery {
                search: Some(state.search.clone()).filter(|s| !s.is_empty()),
                tags: state.selected_tags.clone(),
                skip: 0,
                limit: self.page_size,
            }
        };

        let result = self.backend.list_documents(&query).await;

        let mut state = self.state();
        state.end_fetch();
        match result {
            Ok(page) => {
                tracing::debug!(count = page.items.len(), total = page.total, "loaded documents");
                state.documents = page.items;
                state.total = page.total;
            }
            Err(e) => tracing::error!(error = %e, "error fetching documents"),
        }
    }

    pub async fn search(&self, text: &str) {
        self.state().search = text.to_string();
        self.list_documents().await;
    }

    /// Add or remove `tag` from the filter, then re-list.
    pub async fn toggle_tag(&self, tag: &str) {
        {
            let mut state = self.state();
            let selected = &mut state.selected_tags;
            if let Some(pos) = selected.iter().position(|t| t == tag) {
                selected.remove(pos);
            } else {
                selected.push(tag.to_string());
            }
        }
        self.list_documents().await;
    }

    fn screen(&self, file: &UploadFile) -> Option<RejectReason> {
        if DocumentKind::detect(file).is_none() {
            return Some(RejectReason::UnsupportedType);
        }
        if file.size() > self.max_upload_bytes {
            return Some(RejectReason::TooLarge {
                size: file.size(),
                limit: self.max_upload_bytes,
            });
        }
        None
    }

    /// Send every acceptable file in one submission, tagged from the tag input.
    ///
    /// Progress is tracked for the batch as a whole and applied to each file.
    pub async fn upload_files(&self, files: Vec<UploadFile>) -> UploadReport {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for file in files {
            match self.screen(&file) {
                Some(reason) => {
                    tracing::warn!(file = %file.name, ?reason, "rejected file for upload");
                    rejected.push(Rejection {
                        file: file.name,
                        reason,
                    });
                }
                None => accepted.push(file),
            }
        }
        if accepted.is_empty() {
            return UploadReport {
                status: UploadStatus::NothingToSend,
                rejected,
            };
        }

        let names: Vec<String> = accepted.iter().map(|f| f.name.clone()).collect();
        let tags = {
            let mut state = self.state();
            state.upload_progress = names.iter().map(|n| (n.clone(), 0)).collect();
            let tags = parse_tags(&state.form.tags);
            (!tags.is_empty()).then(|| tags.join(","))
        };

        let shared = Arc::clone(&self.state);
        let batch = names.clone();
        let on_progress: ProgressFn = Arc::new(move |sent: u64, total: u64| {
            let pct = percent(sent, total);
            let mut state = lock(&shared);
            for name in &batch {
                if let Some(entry) = state.upload_progress.get_mut(name) {
                    *entry = pct;
                }
            }
        });

        let result = self
            .backend
            .upload_documents(accepted, tags, on_progress)
            .await;

        let status = match result {
            Ok(results) => {
                for failed in results.iter().filter(|r| !r.success) {
                    tracing::warn!(
                        file = %failed.filename,
                        error = failed.error.as_deref().unwrap_or("unknown"),
                        "backend rejected uploaded file"
                    );
                }
                tracing::info!(files = ?names, "uploaded documents");
                {
                    let mut state = self.state();
                    state.upload_progress.clear();
                    state.form.tags.clear();
                }
                self.list_documents().await;
                UploadStatus::Uploaded
            }
            Err(e) => {
                tracing::error!(files = ?names, error = %e, "error uploading files");
                self.state().upload_progress.clear();
                UploadStatus::Failed
            }
        };
        UploadReport { status, rejected }
    }

    /// Import the URL in the form. Returns false if nothing was imported.
    pub async fn import_url(&self) -> bool {
        let request = {
            let mut state = self.state();
            let url = state.form.url.trim().to_string();
            if url.is_empty() {
                return false;
            }
            state.begin_fetch();
            let title = state.form.title.trim();
            let tags = parse_tags(&state.form.tags);
            UrlImportRequest {
                url,
                title: (!title.is_empty()).then(|| title.to_string()),
                tags: (!tags.is_empty()).then_some(tags),
            }
        };

        let result = self.backend.import_url(&request).await;
        self.state().end_fetch();
        match result {
            Ok(()) => {
                tracing::info!(url = %request.url, "imported url");
                self.state().form = ImportForm::default();
                self.list_documents().await;
                true
            }
            Err(e) => {
                tracing::error!(url = %request.url, error = %e, "error importing url");
                false
            }
        }
    }

    /// Remove a document. The local list and total update without a re-fetch.
    pub async fn delete_document(&self, id: &str) -> bool {
        if let Err(e) = self.backend.delete_document(id).await {
            tracing::error!(document_id = %id, error = %e, "error deleting document");
            return false;
        }
        let mut state = self.state();
        if let Some(pos) = state.documents.iter().position(|d| d.id == id) {
            state.documents.remove(pos);
            state.total = state.total.saturating_sub(1);
        }
        true
    }

    pub async fn update_document_tags(&self, id: &str, tags: &[String]) -> bool {
        if let Err(e) = self.backend.update_document_tags(id, tags).await {
            tracing::error!(document_id = %id, error = %e, "error updating document tags");
            return false;
        }
        let mut state = self.state();
        if let Some(doc) = state.documents.iter_mut().find(|d| d.id == id) {
            doc.tags = tags.to_vec();
        }
        true
    }
}
