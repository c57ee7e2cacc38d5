use super::{
    upload, Backend, ConversationDetail, ConversationList, CreateConversationRequest,
    CreatedConversation, DocumentPage, DocumentQuery, ProgressFn, QueryRequest, QueryResponse,
    UploadFile, UploadResult, UrlImportRequest,
};
use crate::config::ClientConfig;
use crate::db::models::ConversationSummary;
use crate::error::{ClientError, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

/// `Backend` over the DeepTalk REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn conversations_url(&self) -> String {
        self.config.endpoint("conversation/conversations")
    }

    pub(crate) fn conversation_url(&self, id: &str) -> String {
        self.config
            .endpoint(&format!("conversation/conversations/{}", id))
    }

    pub(crate) fn query_url(&self) -> String {
        self.config.endpoint("conversation/query")
    }

    pub(crate) fn documents_url(&self) -> String {
        self.config.endpoint("kb/documents")
    }

    pub(crate) fn document_url(&self, id: &str) -> String {
        self.config.endpoint(&format!("kb/documents/{}", id))
    }

    pub(crate) fn document_tags_url(&self, id: &str) -> String {
        self.config.endpoint(&format!("kb/documents/{}/tags", id))
    }

    pub(crate) fn upload_url(&self) -> String {
        self.config.endpoint("kb/upload")
    }

    pub(crate) fn url_import_url(&self) -> String {
        self.config.endpoint("kb/url")
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, message });
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = self.send(req).await?;
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

impl Backend for HttpBackend {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let list: ConversationList = self
            .send_json(self.client.get(self.conversations_url()))
            .await?;
        Ok(list.items)
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail> {
        self.send_json(self.client.get(self.conversation_url(id)))
            .await
    }

    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> Result<CreatedConversation> {
        self.send_json(self.client.post(self.conversations_url()).json(request))
            .await
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        self.send(self.client.delete(self.conversation_url(id)))
            .await?;
        Ok(())
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        self.send_json(self.client.post(self.query_url()).json(request))
            .await
    }

    async fn list_documents(&self, query: &DocumentQuery) -> Result<DocumentPage> {
        self.send_json(
            self.client
                .get(self.documents_url())
                .query(&query.to_pairs()),
        )
        .await
    }

    async fn upload_documents(
        &self,
        files: Vec<UploadFile>,
        tags: Option<String>,
        on_progress: ProgressFn,
    ) -> Result<Vec<UploadResult>> {
        let form = upload::build_form(files, tags, on_progress)?;
        let resp = self
            .send(self.client.post(self.upload_url()).multipart(form))
            .await?;
        let bytes = resp.bytes().await?;
        // Per-file results are informational; an older backend may answer with no body.
        match serde_json::from_slice(&bytes) {
            Ok(results) => Ok(results),
            Err(e) => {
                tracing::debug!(error = %e, "upload response carried no per-file results");
                Ok(Vec::new())
            }
        }
    }

    async fn import_url(&self, request: &UrlImportRequest) -> Result<()> {
        self.send(self.client.post(self.url_import_url()).json(request))
            .await?;
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        self.send(self.client.delete(self.document_url(id)))
            .await?;
        Ok(())
    }

    async fn update_document_tags(&self, id: &str, tags: &[String]) -> Result<()> {
        self.send(self.client.post(self.document_tags_url(id)).json(tags))
            .await?;
        Ok(())
    }
}
