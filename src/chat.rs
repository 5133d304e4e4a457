//! Chat sessions: message logs, drafts, titles and the active-session pointer.
//!
//! ## Session lifecycle
//! 1. A fresh store starts with one empty "New Conversation" session
//! 2. `create` prepends a "New Session" and makes it active
//! 3. `begin_turn` appends the user message and hands back the history to send
//! 4. `record_reply` appends the assistant answer once the collaborator returns
//! 5. `remove` never deletes the last remaining session

use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::FragmentKind;

static FENCE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[a-zA-Z]*\n?").expect("invalid fence pattern"));

pub const INITIAL_SESSION_TITLE: &str = "New Conversation";
pub const NEW_SESSION_TITLE: &str = "New Session";
pub const EMPTY_REPLY_FALLBACK: &str = "The assistant went quiet. Try sending again.";

/// Titles derived from the first message are cut to this many chars.
pub const TITLE_MAX_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp_ms: u64,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message { role: Role::User, content: content.into(), timestamp_ms: now_ms() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message { role: Role::Assistant, content: content.into(), timestamp_ms: now_ms() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub draft: String,
    pub created_at_ms: u64,
}

impl ChatSession {
    pub fn new(title: impl Into<String>) -> Self {
        ChatSession {
            id: generate_session_id(),
            title: title.into(),
            messages: Vec::new(),
            draft: String::new(),
            created_at_ms: now_ms(),
        }
    }
}

/// Generate a random 7-character lowercase base-36 session id.
pub fn generate_session_id() -> String {
    use rand::Rng;
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..7)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

/// Current Unix epoch in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Session title derived from the first message of a conversation.
pub fn title_from_input(input: &str) -> String {
    let mut title: String = input.chars().take(TITLE_MAX_CHARS).collect();
    if input.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}

// ---------------------------------------------------------------------------
// SessionList
// ---------------------------------------------------------------------------

/// Ordered sessions plus the id of the active one. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionList {
    sessions: Vec<ChatSession>,
    active_id: String,
}

impl Default for SessionList {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionList {
    pub fn new() -> Self {
        let first = ChatSession::new(INITIAL_SESSION_TITLE);
        let active_id = first.id.clone();
        SessionList { sessions: vec![first], active_id }
    }

    /// Restore previously saved sessions; the first one becomes active.
    pub fn from_saved(sessions: Vec<ChatSession>) -> Self {
        match sessions.first() {
            Some(first) => {
                let active_id = first.id.clone();
                SessionList { sessions, active_id }
            }
            None => Self::new(),
        }
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// The active session, or the first one if the active id is stale.
    pub fn active(&self) -> &ChatSession {
        let idx = self.active_index();
        &self.sessions[idx]
    }

    fn active_index(&self) -> usize {
        self.sessions
            .iter()
            .position(|s| s.id == self.active_id)
            .unwrap_or(0)
    }

    fn active_mut(&mut self) -> &mut ChatSession {
        let idx = self.active_index();
        &mut self.sessions[idx]
    }

    /// Prepend a fresh session and make it active. Returns its id.
    pub fn create(&mut self) -> String {
        let session = ChatSession::new(NEW_SESSION_TITLE);
        let id = session.id.clone();
        self.sessions.insert(0, session);
        self.active_id = id.clone();
        id
    }

    pub fn select(&mut self, id: &str) -> bool {
        if self.get(id).is_some() {
            self.active_id = id.to_string();
            true
        } else {
            false
        }
    }

    /// Delete a session. Refused when it is the last one or does not exist.
    pub fn remove(&mut self, id: &str) -> bool {
        if self.sessions.len() <= 1 {
            return false;
        }
        let Some(pos) = self.sessions.iter().position(|s| s.id == id) else {
            return false;
        };
        self.sessions.remove(pos);
        if self.active_id == id {
            self.active_id = self.sessions[0].id.clone();
        }
        true
    }

    pub fn set_draft(&mut self, text: &str) {
        self.active_mut().draft = text.to_string();
    }

    /// Start a turn on the active session.
    ///
    /// Returns `None` for blank input. Otherwise titles an untitled
    /// conversation, clears the draft, appends the user message and returns
    /// the full history to send.
    pub fn begin_turn(&mut self, input: &str) -> Option<Vec<Message>> {
        if input.trim().is_empty() {
            return None;
        }
        let session = self.active_mut();
        if session.messages.is_empty() {
            session.title = title_from_input(input);
        }
        session.draft.clear();
        session.messages.push(Message::user(input));
        Some(session.messages.clone())
    }

    /// Append an assistant reply to session `id`. Returns false if the
    /// session no longer exists.
    pub fn record_reply(&mut self, id: &str, text: &str) -> bool {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) else {
            return false;
        };
        let content = if text.trim().is_empty() { EMPTY_REPLY_FALLBACK } else { text };
        session.messages.push(Message::assistant(content));
        true
    }
}

// ---------------------------------------------------------------------------
// Code fences
// ---------------------------------------------------------------------------

/// A piece of an assistant message: prose or a fenced code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePart {
    Text(String),
    Code(String),
}

/// Split a message into prose and fenced code, in order. Code parts have the
/// fences and language tag removed and are trimmed. An unterminated fence is
/// kept as text.
pub fn split_code_fences(content: &str) -> Vec<MessagePart> {
    let mut parts = Vec::new();
    let mut rest = content;

    while let Some(open) = rest.find("```") {
        let Some(close_rel) = rest[open + 3..].find("```") else {
            break;
        };
        let close = open + 3 + close_rel;
        if open > 0 {
            parts.push(MessagePart::Text(rest[..open].to_string()));
        }
        parts.push(MessagePart::Code(strip_code_fences(&rest[open..close + 3])));
        rest = &rest[close + 3..];
    }
    if !rest.is_empty() {
        parts.push(MessagePart::Text(rest.to_string()));
    }
    parts
}

/// Code blocks of a message, in order.
pub fn code_blocks(content: &str) -> Vec<String> {
    split_code_fences(content)
        .into_iter()
        .filter_map(|p| match p {
            MessagePart::Code(code) => Some(code),
            MessagePart::Text(_) => None,
        })
        .collect()
}

/// Remove every fence marker, the language tag right after it and one
/// following newline, then trim.
pub fn strip_code_fences(text: &str) -> String {
    FENCE_MARKER.replace_all(text, "").trim().to_string()
}

/// Guess which fragment a snippet belongs in.
pub fn classify_snippet(code: &str) -> FragmentKind {
    let lower = code.to_lowercase();
    if lower.contains("document.") || lower.contains("function") {
        FragmentKind::Script
    } else if lower.contains('{') && lower.contains(':') {
        FragmentKind::Style
    } else {
        FragmentKind::Markup
    }
}
