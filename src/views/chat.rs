use crate::api::{Backend, CreateConversationRequest, DocumentQuery, ModelParams, QueryRequest};
use crate::config::DEFAULT_PAGE_SIZE;
use crate::db::models::{ConversationSummary, Delivery, Document, Message, Settings};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

pub const NEW_CONVERSATION_TITLE: &str = "New Conversation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatPhase {
    #[default]
    Idle,
    AwaitingResponse,
}

#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub conversations: Vec<ConversationSummary>,
    pub active_conversation: Option<String>,
    pub messages: Vec<Message>,
    pub selected_knowledge_bases: Vec<String>,
    pub available_knowledge_bases: Vec<Document>,
    pub phase: ChatPhase,
    pub is_loading: bool,
    /// Bumped on every switch of the active conversation.
    load_generation: u64,
}

impl ChatState {
    pub fn input_enabled(&self) -> bool {
        self.phase == ChatPhase::Idle
    }

    pub fn is_thinking(&self) -> bool {
        self.phase == ChatPhase::AwaitingResponse
    }

    fn set_delivery(&mut self, message_id: Uuid, to: Delivery) {
        for message in self.messages.iter_mut() {
            if let Message::User { id, delivery, .. } = message {
                if *id == message_id {
                    *delivery = to;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input; nothing sent.
    Ignored,
    /// Another query from this view is still outstanding.
    Busy,
    Answered,
    /// The query failed and an error reply was appended.
    Failed,
}

/// Conversation list, active thread and query submission for one view.
pub struct ConversationManager<B> {
    backend: B,
    state: Mutex<ChatState>,
    model_params: Mutex<Option<ModelParams>>,
}

impl<B: Backend> ConversationManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: Mutex::new(ChatState::default()),
            model_params: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn state(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ChatState {
        self.state().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    pub fn active_conversation(&self) -> Option<String> {
        self.state().active_conversation.clone()
    }

    pub fn is_thinking(&self) -> bool {
        self.state().is_thinking()
    }

    pub fn input_enabled(&self) -> bool {
        self.state().input_enabled()
    }

    /// Attach model parameters to every subsequent query. `None` stops sending them.
    pub fn set_model_params(&self, settings: Option<&Settings>) {
        *self
            .model_params
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = settings.map(ModelParams::from);
    }

    pub async fn list_conversations(&self) {
        match self.backend.list_conversations().await {
            Ok(items) => {
                tracing::debug!(count = items.len(), "loaded conversations");
                self.state().conversations = items;
            }
            Err(e) => tracing::error!(error = %e, "error fetching conversations"),
        }
    }

    /// Load the selectable knowledge-base documents.
    pub async fn fetch_knowledge_bases(&self) {
        let query = DocumentQuery {
            limit: DEFAULT_PAGE_SIZE,
            ..Default::default()
        };
        match self.backend.list_documents(&query).await {
            Ok(page) => self.state().available_knowledge_bases = page.items,
            Err(e) => tracing::error!(error = %e, "error fetching knowledge bases"),
        }
    }

    /// Switch the active conversation. `None` clears the thread.
    pub async fn load_conversation(&self, id: Option<&str>) {
        let (id, generation) = {
            let mut state = self.state();
            state.active_conversation = id.map(str::to_string);
            state.load_generation += 1;
            match id {
                Some(id) => {
                    state.is_loading = true;
                    (id.to_string(), state.load_generation)
                }
                None => {
                    state.is_loading = false;
                    state.messages.clear();
                    return;
                }
            }
        };

        let result = self.backend.get_conversation(&id).await;

        let mut state = self.state();
        if state.load_generation != generation {
            tracing::debug!(conversation_id = %id, "dropping stale conversation load");
            return;
        }
        state.is_loading = false;
        match result {
            Ok(detail) => {
                state.messages = detail
                    .messages
                    .into_iter()
                    .filter_map(Message::from_wire)
                    .collect();
                if let Some(ids) = detail.knowledge_base_ids {
                    state.selected_knowledge_bases = ids;
                }
            }
            Err(e) => tracing::error!(conversation_id = %id, error = %e, "error fetching messages"),
        }
    }

    /// Create a conversation bound to the current selection and make it active.
    pub async fn create_conversation(&self) -> Option<String> {
        let request = CreateConversationRequest {
            title: NEW_CONVERSATION_TITLE.to_string(),
            knowledge_base_ids: self.selection(),
        };
        match self.backend.create_conversation(&request).await {
            Ok(created) => {
                tracing::info!(conversation_id = %created.id, "created conversation");
                self.list_conversations().await;
                self.load_conversation(Some(&created.id)).await;
                Some(created.id)
            }
            Err(e) => {
                tracing::error!(error = %e, "error creating conversation");
                None
            }
        }
    }

    pub async fn delete_conversation(&self, id: &str) -> bool {
        if let Err(e) = self.backend.delete_conversation(id).await {
            tracing::error!(conversation_id = %id, error = %e, "error deleting conversation");
            return false;
        }
        let mut state = self.state();
        state.conversations.retain(|c| c.id != id);
        if state.active_conversation.as_deref() == Some(id) {
            state.active_conversation = None;
            state.load_generation += 1;
            state.is_loading = false;
            state.messages.clear();
        }
        true
    }

    pub fn toggle_knowledge_base(&self, id: &str) {
        let mut state = self.state();
        let selected = &mut state.selected_knowledge_bases;
        if let Some(pos) = selected.iter().position(|s| s == id) {
            selected.remove(pos);
        } else {
            selected.push(id.to_string());
        }
    }

    fn selection(&self) -> Option<Vec<String>> {
        let state = self.state();
        (!state.selected_knowledge_bases.is_empty())
            .then(|| state.selected_knowledge_bases.clone())
    }

    /// Submit one user turn and merge the reply.
    ///
    /// The user message is appended before the request goes out and stays
    /// `Pending` until the reply lands. A failed query appends an error reply
    /// instead of returning the error.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Ignored;
        }

        let model_params = self
            .model_params
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let (request, user_id, sent_from) = {
            let mut state = self.state();
            if state.is_thinking() {
                return SendOutcome::Busy;
            }
            let user = Message::pending_user(text);
            let user_id = user.id();
            state.messages.push(user);
            state.phase = ChatPhase::AwaitingResponse;
            let request = QueryRequest {
                query: text.to_string(),
                conversation_id: state.active_conversation.clone(),
                knowledge_base_ids: (!state.selected_knowledge_bases.is_empty())
                    .then(|| state.selected_knowledge_bases.clone()),
                model_params,
            };
            (request, user_id, state.active_conversation.clone())
        };

        let result = self.backend.query(&request).await;

        let (outcome, refresh) = {
            let mut state = self.state();
            state.phase = ChatPhase::Idle;
            let still_here = state.active_conversation == sent_from;
            match result {
                Ok(reply) => {
                    if !still_here {
                        tracing::debug!("active conversation changed while awaiting reply");
                        // The server may still have started a thread for this turn.
                        let created = sent_from.is_none() && reply.conversation_id.is_some();
                        (SendOutcome::Answered, created)
                    } else {
                        state.set_delivery(user_id, Delivery::Confirmed);
                        state
                            .messages
                            .push(Message::assistant(reply.response, reply.sources));
                        let adopted = match (sent_from, reply.conversation_id) {
                            (None, Some(id)) => {
                                tracing::info!(conversation_id = %id, "adopted new conversation");
                                state.active_conversation = Some(id);
                                true
                            }
                            _ => false,
                        };
                        (SendOutcome::Answered, adopted)
                    }
                }
                Err(e) => {
                    tracing::error!(
                        conversation_id = ?request.conversation_id,
                        error = %e,
                        "error sending message"
                    );
                    if still_here {
                        state.set_delivery(user_id, Delivery::Unconfirmed);
                        state.messages.push(Message::assistant_error());
                    }
                    (SendOutcome::Failed, false)
                }
            }
        };

        if refresh {
            self.list_conversations().await;
        }
        outcome
    }
}
