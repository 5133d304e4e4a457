//! # Application state
//!
//! ## Responsibility
//! Own everything the editor remembers between runs (document bundle, theme,
//! block size, chat sessions) and apply user [`Command`]s to it. Handlers
//! return [`Notice`]s instead of rendering anything.
//!
//! ## Guarantees
//! - Loaded once from a [`KvStore`]; missing or corrupt entries fall back to
//!   defaults with a warning rather than failing startup
//! - Command handlers never panic and never fail; problems become error notices
//! - Chat failures leave the state usable so the user can retry
//!
//! ## NOT Responsible For
//! - Deciding when to save (the caller writes back after each mutation)
//! - Rendering notices or the theme

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assistant::{system_prompt_for, CHAT_TEMPERATURE};
use crate::blocks::{chunk, clamp_char_limit, parse_char_limit, Block, DEFAULT_CHAR_LIMIT};
use crate::chat::{classify_snippet, ChatSession, SessionList};
use crate::client::{ChatClient, ChatError, ChatRequest};
use crate::document::{Document, FragmentKind};
use crate::error::{CodeflowError, Result};
use crate::store::KvStore;

pub const KEY_DOCUMENT: &str = "code_storage";
pub const KEY_THEME: &str = "theme";
pub const KEY_CHAR_LIMIT: &str = "char_limit";
pub const KEY_SESSIONS: &str = "chat_sessions";
pub const KEY_ACTIVE_SESSION: &str = "active_session";

const AUTH_NOTICE: &str = "API key missing, expired or invalid.";

// ---------------------------------------------------------------------------
// Small value types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Dark => write!(f, "dark"),
            Theme::Light => write!(f, "light"),
        }
    }
}

/// Which view is in front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Complete,
    Html,
    Css,
    Js,
    Blocks,
    Chat,
}

impl Tab {
    /// The document field this tab edits. Blocks and chat have none.
    pub fn fragment(&self) -> Option<FragmentKind> {
        match self {
            Tab::Complete => Some(FragmentKind::Complete),
            Tab::Html => Some(FragmentKind::Markup),
            Tab::Css => Some(FragmentKind::Style),
            Tab::Js => Some(FragmentKind::Script),
            Tab::Blocks | Tab::Chat => None,
        }
    }
}

impl From<FragmentKind> for Tab {
    fn from(kind: FragmentKind) -> Self {
        match kind {
            FragmentKind::Complete => Tab::Complete,
            FragmentKind::Markup => Tab::Html,
            FragmentKind::Style => Tab::Css,
            FragmentKind::Script => Tab::Js,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A short user-facing message produced by a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Notice { level: NoticeLevel::Success, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Notice { level: NoticeLevel::Info, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice { level: NoticeLevel::Error, message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace a document field. `None` targets the current tab, or the
    /// combined document when the current tab has no field.
    Edit { target: Option<FragmentKind>, text: String },
    LoadFile { name: String, content: String },
    Clear,
    SetTab(Tab),
    ToggleTheme,
    /// Raw user input; parsed and clamped.
    SetCharLimit(String),
    NewSession,
    SelectSession(String),
    DeleteSession(String),
    SetDraft(String),
    /// Splice a code snippet from the chat into the matching fragment.
    ApplySnippet(String),
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AppState {
    pub theme: Theme,
    pub tab: Tab,
    pub document: Document,
    pub char_limit: usize,
    pub sessions: SessionList,
    /// False after the chat collaborator rejected our credentials.
    pub connected: bool,
}

impl Default for AppState {
    fn default() -> Self {
        AppState::new(DEFAULT_CHAR_LIMIT)
    }
}

fn load_json<T: DeserializeOwned>(store: &impl KvStore, key: &str) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(key, error = %e, "ignoring corrupt stored value");
            Ok(None)
        }
    }
}

impl AppState {
    pub fn new(char_limit: usize) -> Self {
        AppState {
            theme: Theme::default(),
            tab: Tab::default(),
            document: Document::default(),
            char_limit: clamp_char_limit(char_limit),
            sessions: SessionList::new(),
            connected: true,
        }
    }

    /// Restore state from `store`. `default_char_limit` applies when no block
    /// size was saved yet.
    pub fn load(store: &impl KvStore, default_char_limit: usize) -> Result<Self> {
        let mut state = AppState::new(default_char_limit);

        if let Some(document) = load_json::<Document>(store, KEY_DOCUMENT)? {
            state.document = document;
        }
        if let Some(raw) = store.get(KEY_THEME)? {
            match Theme::parse(&raw) {
                Some(theme) => state.theme = theme,
                None => warn!(value = %raw, "ignoring unknown theme"),
            }
        }
        if let Some(raw) = store.get(KEY_CHAR_LIMIT)? {
            state.char_limit = parse_char_limit(&raw);
        }
        if let Some(sessions) = load_json::<Vec<ChatSession>>(store, KEY_SESSIONS)? {
            state.sessions = SessionList::from_saved(sessions);
        }
        if let Some(active) = store.get(KEY_ACTIVE_SESSION)? {
            state.sessions.select(&active);
        }

        info!(
            sessions = state.sessions.len(),
            empty_document = state.document.is_empty(),
            "state loaded"
        );
        Ok(state)
    }

    pub fn save(&self, store: &mut impl KvStore) -> Result<()> {
        store.set(KEY_DOCUMENT, &serde_json::to_string(&self.document)?)?;
        store.set(KEY_THEME, &self.theme.to_string())?;
        store.set(KEY_CHAR_LIMIT, &self.char_limit.to_string())?;
        store.set(KEY_SESSIONS, &serde_json::to_string(self.sessions.sessions())?)?;
        store.set(KEY_ACTIVE_SESSION, self.sessions.active_id())?;
        Ok(())
    }

    /// Blocks of whatever the current tab shows (the combined document for
    /// tabs without a field of their own).
    pub fn current_blocks(&self) -> Vec<Block> {
        let kind = self.tab.fragment().unwrap_or(FragmentKind::Complete);
        chunk(self.document.get(kind), self.char_limit)
    }

    pub fn handle(&mut self, command: Command) -> Vec<Notice> {
        match command {
            Command::Edit { target, text } => {
                let kind = target
                    .or_else(|| self.tab.fragment())
                    .unwrap_or(FragmentKind::Complete);
                self.document.apply_edit(kind, &text);
                Vec::new()
            }
            Command::LoadFile { name, content } => {
                let kind = self.document.load_file(&name, &content);
                self.tab = Tab::from(kind);
                vec![Notice::success("File loaded successfully!")]
            }
            Command::Clear => {
                self.document.clear();
                vec![Notice::info("All content was removed")]
            }
            Command::SetTab(tab) => {
                self.tab = tab;
                Vec::new()
            }
            Command::ToggleTheme => {
                self.theme = self.theme.toggled();
                Vec::new()
            }
            Command::SetCharLimit(raw) => {
                self.char_limit = parse_char_limit(&raw);
                Vec::new()
            }
            Command::NewSession => {
                self.sessions.create();
                Vec::new()
            }
            Command::SelectSession(id) => {
                if self.sessions.select(&id) {
                    Vec::new()
                } else {
                    vec![Notice::error(CodeflowError::UnknownSession(id).to_string())]
                }
            }
            Command::DeleteSession(id) => {
                if self.sessions.get(&id).is_none() {
                    vec![Notice::error(CodeflowError::UnknownSession(id).to_string())]
                } else if self.sessions.remove(&id) {
                    Vec::new()
                } else {
                    vec![Notice::error("The last conversation cannot be deleted")]
                }
            }
            Command::SetDraft(text) => {
                self.sessions.set_draft(&text);
                Vec::new()
            }
            Command::ApplySnippet(code) => {
                let kind = classify_snippet(&code);
                self.document.apply_edit(kind, &code);
                vec![Notice::success(format!("Applied to {}", kind.to_string().to_uppercase()))]
            }
        }
    }

    /// Send `input` on the active session and record the reply.
    ///
    /// Blank input is ignored. Without credentials nothing is recorded and
    /// the connection flag drops. Once a request is made, the user message is
    /// kept even when it fails, so the conversation shows what was attempted.
    pub async fn send_message<C: ChatClient>(&mut self, client: &C, input: &str) -> Vec<Notice> {
        if input.trim().is_empty() {
            return Vec::new();
        }
        if !client.has_credentials() {
            self.connected = false;
            return vec![Notice::error(AUTH_NOTICE)];
        }
        let session_id = self.sessions.active_id().to_string();
        let Some(history) = self.sessions.begin_turn(input) else {
            return Vec::new();
        };
        let request = ChatRequest::new(system_prompt_for(&self.document), history, CHAT_TEMPERATURE);

        match client.complete(&request).await {
            Ok(reply) => {
                self.connected = true;
                self.sessions.record_reply(&session_id, &reply);
                Vec::new()
            }
            Err(ChatError::AuthRequired) => {
                self.connected = false;
                warn!(session = %session_id, "chat credentials rejected");
                vec![Notice::error(AUTH_NOTICE)]
            }
            Err(ChatError::Offline { detail }) => {
                warn!(session = %session_id, %detail, "chat request failed");
                vec![Notice::error("Could not reach the assistant. Try again.")]
            }
        }
    }
}
