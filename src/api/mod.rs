pub mod http;
pub mod upload;

use crate::db::models::{ConversationSummary, Document, Settings, Source, WireMessage};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use upload::{DocumentKind, UploadFile};

/// Called with `(bytes_sent, bytes_total)` as an upload body is streamed.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct QueryRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_base_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_params: Option<ModelParams>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ModelParams {
    pub model_id: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
}

impl From<&Settings> for ModelParams {
    fn from(settings: &Settings) -> Self {
        Self {
            model_id: settings.model_id.as_str().to_string(),
            temperature: settings.temperature,
            top_p: settings.top_p,
            max_tokens: settings.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct QueryResponse {
    pub response: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CreateConversationRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_base_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CreatedConversation {
    pub id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConversationList {
    pub items: Vec<ConversationSummary>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConversationDetail {
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub knowledge_base_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DocumentPage {
    pub items: Vec<Document>,
    #[serde(default)]
    pub total: u64,
}

/// Filters for the document listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentQuery {
    pub search: Option<String>,
    pub tags: Vec<String>,
    pub skip: u32,
    pub limit: u32,
}

impl DocumentQuery {
    /// Query-string pairs. Tags repeat, one pair per tag.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        for tag in &self.tags {
            pairs.push(("tags", tag.clone()));
        }
        pairs.push(("skip", self.skip.to_string()));
        pairs.push(("limit", self.limit.to_string()));
        pairs
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct UrlImportRequest {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Per-file outcome reported by the upload endpoint.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct UploadResult {
    pub filename: String,
    pub success: bool,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The backend REST surface the views consume.
#[allow(async_fn_in_trait)]
pub trait Backend {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>>;

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail>;

    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> Result<CreatedConversation>;

    async fn delete_conversation(&self, id: &str) -> Result<()>;

    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse>;

    async fn list_documents(&self, query: &DocumentQuery) -> Result<DocumentPage>;

    /// One multipart submission carrying every file.
    async fn upload_documents(
        &self,
        files: Vec<UploadFile>,
        tags: Option<String>,
        on_progress: ProgressFn,
    ) -> Result<Vec<UploadResult>>;

    async fn import_url(&self, request: &UrlImportRequest) -> Result<()>;

    async fn delete_document(&self, id: &str) -> Result<()>;

    async fn update_document_tags(&self, id: &str, tags: &[String]) -> Result<()>;
}

/// Views sharing one backend hold it behind an `Arc`.
impl<T: Backend> Backend for Arc<T> {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        (**self).list_conversations().await
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail> {
        (**self).get_conversation(id).await
    }

    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> Result<CreatedConversation> {
        (**self).create_conversation(request).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        (**self).delete_conversation(id).await
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        (**self).query(request).await
    }

    async fn list_documents(&self, query: &DocumentQuery) -> Result<DocumentPage> {
        (**self).list_documents(query).await
    }

    async fn upload_documents(
        &self,
        files: Vec<UploadFile>,
        tags: Option<String>,
        on_progress: ProgressFn,
    ) -> Result<Vec<UploadResult>> {
        (**self).upload_documents(files, tags, on_progress).await
    }

    async fn import_url(&self, request: &UrlImportRequest) -> Result<()> {
        (**self).import_url(request).await
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        (**self).delete_document(id).await
    }

    async fn update_document_tags(&self, id: &str, tags: &[String]) -> Result<()> {
        (**self).update_document_tags(id, tags).await
    }
}
