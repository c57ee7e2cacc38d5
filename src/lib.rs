pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod views;

#[cfg(test)]
mod testing;

pub use api::http::HttpBackend;
pub use api::Backend;
pub use config::ClientConfig;
pub use db::LocalStore;
pub use error::{ClientError, Result};
pub use logging::init_logging;

use views::chat::ConversationManager;
use views::knowledge::KnowledgeBaseManager;
use views::navigation::{NavigationShell, Route};
use views::settings::SettingsStore;

/// The four views over one backend. Each view owns its own state.
pub struct App<B> {
    pub navigation: NavigationShell,
    pub chat: ConversationManager<B>,
    pub knowledge: KnowledgeBaseManager<B>,
    pub settings: SettingsStore,
}

impl App<HttpBackend> {
    pub fn open(config: ClientConfig) -> Result<Self> {
        let backend = HttpBackend::new(config.clone())?;
        let store = LocalStore::open(&config.storage_path)?;
        tracing::info!(base_url = %config.base_url, "opening client");
        Ok(Self::with_backend(backend, store, &config))
    }
}

impl<B: Backend + Clone> App<B> {
    pub fn with_backend(backend: B, store: LocalStore, config: &ClientConfig) -> Self {
        Self {
            navigation: NavigationShell::default(),
            chat: ConversationManager::new(backend.clone()),
            knowledge: KnowledgeBaseManager::new(backend, config),
            settings: SettingsStore::new(store),
        }
    }

    /// Move to `path` and run the fetches the target view performs on entry.
    pub async fn navigate(&mut self, path: &str) {
        let previous = self.navigation.route();
        self.navigation.navigate(path);
        match self.navigation.route() {
            Route::Chat { conversation_id } => {
                if !matches!(previous, Route::Chat { .. }) {
                    self.chat.list_conversations().await;
                    self.chat.fetch_knowledge_bases().await;
                }
                if self.chat.active_conversation() != conversation_id
                    || !matches!(previous, Route::Chat { .. })
                {
                    self.chat.load_conversation(conversation_id.as_deref()).await;
                }
            }
            Route::KnowledgeBase if previous != Route::KnowledgeBase => {
                self.knowledge.list_documents().await;
            }
            _ => {}
        }
    }
}
