//! Per-session chat state.
//!
//! Each visitor gets a [`ChatSession`] holding their history, admin flag and
//! current page. Sessions live in a [`SessionRegistry`] from `create` until
//! `destroy`; nothing is persisted.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::auth::AdminCredentials;
use crate::error::{Error, Result};
use crate::knowledge::Retriever;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Which screen the session is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Chat,
    Login,
    Admin,
}

#[derive(Debug)]
pub struct ChatSession {
    id: Uuid,
    history: Vec<ChatMessage>,
    is_admin: bool,
    page: Page,
    created_at: DateTime<Utc>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            history: Vec::new(),
            is_admin: false,
            page: Page::Chat,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Ask a question and record the turn.
    ///
    /// The user message is kept even when answering fails.
    pub async fn ask(&mut self, retriever: &Retriever, question: &str) -> Result<String> {
        self.history.push(ChatMessage {
            role: Role::User,
            content: question.to_string(),
        });

        let reply = retriever.answer(question).await?;
        self.history.push(ChatMessage {
            role: Role::Assistant,
            content: reply.clone(),
        });
        Ok(reply)
    }

    pub fn login(&mut self, credentials: &AdminCredentials, username: &str, password: &str) -> Result<()> {
        self.page = Page::Login;
        credentials.login(username, password)?;

        self.is_admin = true;
        self.page = Page::Admin;
        info!(session = %self.id, "Admin logged in");
        Ok(())
    }

    pub fn logout(&mut self) {
        if self.is_admin {
            info!(session = %self.id, "Admin logged out");
        }
        self.is_admin = false;
        self.page = Page::Chat;
    }

    /// Switch page; the admin page needs a prior login.
    pub fn navigate(&mut self, page: Page) -> Result<()> {
        if page == Page::Admin {
            self.require_admin()?;
        }
        self.page = page;
        Ok(())
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(Error::AuthFailure)
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        info!(session = %self.id, "Conversation history cleared");
    }
}

pub type SessionHandle = Arc<Mutex<ChatSession>>;

/// Live sessions keyed by id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Uuid {
        let session = ChatSession::new();
        let id = session.id();
        self.sessions
            .lock()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.lock().await.get(&id).cloned()
    }

    /// Run `f` against one session; `None` when the id is unknown.
    pub async fn with_session<R>(&self, id: Uuid, f: impl FnOnce(&mut ChatSession) -> R) -> Option<R> {
        let handle = self.get(id).await?;
        let mut session = handle.lock().await;
        Some(f(&mut session))
    }

    pub async fn destroy(&self, id: Uuid) -> bool {
        self.sessions.lock().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{Generator, LocalEmbedder, LocalStore};
    use crate::prompts::NO_CONTEXT_REPLY;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Generator for Echo {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }
    }

    fn retriever() -> Retriever {
        Retriever::new(
            Arc::new(LocalEmbedder::new(16)),
            Arc::new(LocalStore::in_memory()),
            Arc::new(Echo),
            "kb",
        )
    }

    #[tokio::test]
    async fn ask_records_both_turns() {
        let mut session = ChatSession::new();
        let reply = session.ask(&retriever(), "Where is block 32?").await.unwrap();

        assert_eq!(reply, NO_CONTEXT_REPLY);
        assert_eq!(
            session.history(),
            &[
                ChatMessage {
                    role: Role::User,
                    content: "Where is block 32?".into()
                },
                ChatMessage {
                    role: Role::Assistant,
                    content: NO_CONTEXT_REPLY.into()
                },
            ]
        );

        session.clear_history();
        assert!(session.history().is_empty());
    }

    #[test]
    fn login_and_logout_route_pages() {
        let creds = AdminCredentials::with_password("admin", "pw");
        let mut session = ChatSession::new();
        assert_eq!(session.page(), Page::Chat);
        assert!(matches!(session.require_admin(), Err(Error::AuthFailure)));

        assert!(session.login(&creds, "admin", "bad").is_err());
        assert!(!session.is_admin());
        assert_eq!(session.page(), Page::Login);

        session.login(&creds, "admin", "pw").unwrap();
        assert!(session.is_admin());
        assert_eq!(session.page(), Page::Admin);

        session.logout();
        assert!(!session.is_admin());
        assert_eq!(session.page(), Page::Chat);
    }

    #[test]
    fn admin_page_requires_login() {
        let mut session = ChatSession::new();
        assert!(session.navigate(Page::Admin).is_err());
        session.navigate(Page::Login).unwrap();
        assert_eq!(session.page(), Page::Login);
    }

    #[tokio::test]
    async fn registry_lifecycle() {
        let registry = SessionRegistry::new();
        let a = registry.create().await;
        let b = registry.create().await;
        assert_ne!(a, b);
        assert_eq!(registry.len().await, 2);

        let creds = AdminCredentials::with_password("admin", "pw");
        registry
            .with_session(a, |s| s.login(&creds, "admin", "pw"))
            .await
            .unwrap()
            .unwrap();

        // Admin state is per session
        assert_eq!(registry.with_session(a, |s| s.is_admin()).await, Some(true));
        assert_eq!(registry.with_session(b, |s| s.is_admin()).await, Some(false));

        assert!(registry.destroy(a).await);
        assert!(!registry.destroy(a).await);
        assert!(registry.with_session(a, |s| s.id()).await.is_none());
        assert_eq!(registry.len().await, 1);
    }
}
