#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavEntry {
    pub name: &'static str,
    pub href: &'static str,
}

pub static NAVIGATION: [NavEntry; 4] = [
    NavEntry { name: "Home", href: "/" },
    NavEntry { name: "Chat", href: "/chat" },
    NavEntry { name: "Knowledge Base", href: "/knowledge-base" },
    NavEntry { name: "Settings", href: "/settings" },
];

impl NavEntry {
    /// Exact match, or prefix match for everything but the root.
    pub fn is_active(&self, path: &str) -> bool {
        path == self.href || (self.href != "/" && path.starts_with(self.href))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Chat { conversation_id: Option<String> },
    KnowledgeBase,
    Settings,
    NotFound,
}

impl Route {
    pub fn parse(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Route::Home,
            ["chat"] => Route::Chat {
                conversation_id: None,
            },
            ["chat", id] => Route::Chat {
                conversation_id: Some(id.to_string()),
            },
            ["knowledge-base"] => Route::KnowledgeBase,
            ["settings"] => Route::Settings,
            _ => Route::NotFound,
        }
    }
}

/// Side navigation state: the current location and the mobile drawer.
#[derive(Debug, Clone)]
pub struct NavigationShell {
    location: String,
    drawer_open: bool,
}

impl Default for NavigationShell {
    fn default() -> Self {
        Self::new("/")
    }
}

impl NavigationShell {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            drawer_open: false,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn route(&self) -> Route {
        Route::parse(&self.location)
    }

    pub fn is_drawer_open(&self) -> bool {
        self.drawer_open
    }

    pub fn open_drawer(&mut self) {
        self.drawer_open = true;
    }

    pub fn close_drawer(&mut self) {
        self.drawer_open = false;
    }

    /// Follow a link; the drawer closes behind it.
    pub fn navigate(&mut self, path: impl Into<String>) {
        self.location = path.into();
        self.drawer_open = false;
    }

    pub fn active_entry(&self) -> Option<&'static NavEntry> {
        NAVIGATION.iter().find(|e| e.is_active(&self.location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_entry_matching() {
        let mut shell = NavigationShell::default();
        assert_eq!(shell.active_entry().map(|e| e.name), Some("Home"));

        shell.navigate("/chat/c1");
        assert_eq!(shell.active_entry().map(|e| e.name), Some("Chat"));
        assert!(!NAVIGATION[0].is_active("/chat/c1"));

        shell.navigate("/knowledge-base");
        assert_eq!(shell.active_entry().map(|e| e.name), Some("Knowledge Base"));
    }

    #[test]
    fn test_navigate_closes_drawer() {
        let mut shell = NavigationShell::new("/settings");
        shell.open_drawer();
        assert!(shell.is_drawer_open());
        shell.navigate("/chat");
        assert!(!shell.is_drawer_open());
        shell.open_drawer();
        shell.close_drawer();
        assert!(!shell.is_drawer_open());
    }

    #[test]
    fn test_route_parse() {
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(
            Route::parse("/chat"),
            Route::Chat {
                conversation_id: None
            }
        );
        assert_eq!(
            Route::parse("/chat/c1?x=1"),
            Route::Chat {
                conversation_id: Some("c1".into())
            }
        );
        assert_eq!(Route::parse("/knowledge-base/"), Route::KnowledgeBase);
        assert_eq!(Route::parse("/settings"), Route::Settings);
        assert_eq!(Route::parse("/chat/c1/extra"), Route::NotFound);
    }
}
