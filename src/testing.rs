//! Scripted `Backend` for view tests.

use crate::api::{
    Backend, ConversationDetail, CreateConversationRequest, CreatedConversation, DocumentPage,
    DocumentQuery, ProgressFn, QueryRequest, QueryResponse, UploadFile, UploadResult,
    UrlImportRequest,
};
use crate::db::models::{ConversationSummary, Document};
use crate::error::{ClientError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListConversations,
    GetConversation(String),
    CreateConversation(CreateConversationRequest),
    DeleteConversation(String),
    Query(QueryRequest),
    ListDocuments(DocumentQuery),
    Upload { files: Vec<String>, tags: Option<String> },
    ImportUrl(UrlImportRequest),
    DeleteDocument(String),
    UpdateTags(String, Vec<String>),
}

#[derive(Default)]
pub struct FakeBackend {
    pub calls: Mutex<Vec<Call>>,
    pub conversations: Mutex<Vec<ConversationSummary>>,
    pub details: Mutex<HashMap<String, serde_json::Value>>,
    pub created_id: Mutex<String>,
    pub replies: Mutex<Vec<QueryResponse>>,
    pub documents: Mutex<Vec<Document>>,
    pub upload_results: Mutex<Vec<UploadResult>>,
    failing: Mutex<HashSet<&'static str>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    /// The next gated call (conversation load, query, document listing or
    /// upload) waits until the sender fires.
    pub fn hold_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn with_documents(self, docs: Vec<Document>) -> Self {
        *self.documents.lock().unwrap() = docs;
        self
    }

    pub fn push_reply(&self, reply: QueryResponse) {
        self.replies.lock().unwrap().push(reply);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, op: &'static str) -> Result<()> {
        if self.failing.lock().unwrap().contains(op) {
            return Err(ClientError::Api {
                status: 500,
                message: format!("{} failed", op),
            });
        }
        Ok(())
    }

    async fn pass_gate(&self) {
        let gate = self.gate.lock().unwrap().take();
        if let Some(rx) = gate {
            rx.await.ok();
        }
    }
}

pub fn doc(id: &str, title: &str, tags: &[&str]) -> Document {
    Document {
        id: id.to_string(),
        title: title.to_string(),
        kind: Some("pdf".to_string()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        created_at: None,
        source_url: None,
        status: None,
    }
}

impl Backend for FakeBackend {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        self.record(Call::ListConversations);
        self.check("list_conversations")?;
        Ok(self.conversations.lock().unwrap().clone())
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail> {
        self.record(Call::GetConversation(id.to_string()));
        self.pass_gate().await;
        self.check("get_conversation")?;
        let detail = self
            .details
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({ "messages": [] }));
        serde_json::from_value(detail).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> Result<CreatedConversation> {
        self.record(Call::CreateConversation(request.clone()));
        self.check("create_conversation")?;
        let id = self.created_id.lock().unwrap().clone();
        self.conversations.lock().unwrap().push(ConversationSummary {
            id: id.clone(),
            title: request.title.clone(),
        });
        Ok(CreatedConversation { id })
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        self.record(Call::DeleteConversation(id.to_string()));
        self.check("delete_conversation")?;
        self.conversations.lock().unwrap().retain(|c| c.id != id);
        Ok(())
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        self.record(Call::Query(request.clone()));
        self.pass_gate().await;
        self.check("query")?;
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                QueryResponse {
                    response: format!("echo: {}", request.query),
                    sources: Vec::new(),
                    conversation_id: request.conversation_id.clone(),
                }
            } else {
                replies.remove(0)
            }
        };
        if let Some(id) = &reply.conversation_id {
            let mut conversations = self.conversations.lock().unwrap();
            if !conversations.iter().any(|c| &c.id == id) {
                conversations.push(ConversationSummary {
                    id: id.clone(),
                    title: "New Conversation".to_string(),
                });
            }
        }
        Ok(reply)
    }

    async fn list_documents(&self, query: &DocumentQuery) -> Result<DocumentPage> {
        self.record(Call::ListDocuments(query.clone()));
        self.pass_gate().await;
        self.check("list_documents")?;
        let items = self.documents.lock().unwrap().clone();
        let total = items.len() as u64;
        Ok(DocumentPage { items, total })
    }

    async fn upload_documents(
        &self,
        files: Vec<UploadFile>,
        tags: Option<String>,
        on_progress: ProgressFn,
    ) -> Result<Vec<UploadResult>> {
        self.record(Call::Upload {
            files: files.iter().map(|f| f.name.clone()).collect(),
            tags,
        });
        let total: u64 = files.iter().map(UploadFile::size).sum();
        on_progress(total / 2, total);
        self.pass_gate().await;
        self.check("upload")?;
        on_progress(total, total);
        Ok(self.upload_results.lock().unwrap().clone())
    }

    async fn import_url(&self, request: &UrlImportRequest) -> Result<()> {
        self.record(Call::ImportUrl(request.clone()));
        self.check("import_url")
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        self.record(Call::DeleteDocument(id.to_string()));
        self.check("delete_document")?;
        self.documents.lock().unwrap().retain(|d| d.id != id);
        Ok(())
    }

    async fn update_document_tags(&self, id: &str, tags: &[String]) -> Result<()> {
        self.record(Call::UpdateTags(id.to_string(), tags.to_vec()));
        self.check("update_document_tags")
    }
}
