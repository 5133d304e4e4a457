//! Tests for application state: chat turns against a scripted collaborator,
//! and persistence through the SQLite store.

use std::cell::RefCell;
use std::collections::VecDeque;

use codeflow::chat::{Role, EMPTY_REPLY_FALLBACK};
use codeflow::client::{ChatClient, ChatError, ChatRequest, ClientConfig, HttpChatClient};
use codeflow::document::FragmentKind;
use codeflow::providers::Provider;
use codeflow::state::*;
use codeflow::store::{KvStore, SqliteStore};

/// Replies in order and records every request it saw.
struct ScriptedClient {
    replies: RefCell<VecDeque<Result<String, ChatError>>>,
    requests: RefCell<Vec<ChatRequest>>,
}

impl ScriptedClient {
    fn new(replies: Vec<Result<&str, ChatError>>) -> Self {
        ScriptedClient {
            replies: RefCell::new(replies.into_iter().map(|r| r.map(str::to_string)).collect()),
            requests: RefCell::new(Vec::new()),
        }
    }
}

impl ChatClient for ScriptedClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError> {
        self.requests.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ChatError::offline("script exhausted")))
    }
}

// ---------------------------------------------------------------------------
// Chat turns
// ---------------------------------------------------------------------------

#[test]
fn test_send_message_records_reply() {
    let client = ScriptedClient::new(vec![Ok("Use flexbox.")]);
    let mut state = AppState::default();
    let notices = tokio_test::block_on(state.send_message(&client, "center a div"));
    assert!(notices.is_empty());

    let session = state.sessions.active();
    assert_eq!(session.title, "center a div");
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[1].role, Role::Assistant);
    assert_eq!(session.messages[1].content, "Use flexbox.");
}

#[test]
fn test_send_message_passes_history_and_system_prompt() {
    let client = ScriptedClient::new(vec![Ok("first"), Ok("second")]);
    let mut state = AppState::default();
    state.handle(Command::Edit {
        target: Some(FragmentKind::Complete),
        text: "<style>abc</style><p>x</p>".into(),
    });
    tokio_test::block_on(state.send_message(&client, "one"));
    tokio_test::block_on(state.send_message(&client, "two"));

    let requests = client.requests.borrow();
    assert_eq!(requests.len(), 2);
    let contents: Vec<&str> = requests[1].messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "first", "two"]);
    assert!(requests[1].system.contains("CSS(3)"));
    assert_eq!(requests[1].temperature, 0.7);
}

#[test]
fn test_blank_message_sends_nothing() {
    let client = ScriptedClient::new(vec![]);
    let mut state = AppState::default();
    let notices = tokio_test::block_on(state.send_message(&client, "  "));
    assert!(notices.is_empty());
    assert!(client.requests.borrow().is_empty());
}

#[test]
fn test_auth_failure_marks_disconnected() {
    let client = ScriptedClient::new(vec![Err(ChatError::AuthRequired), Ok("back")]);
    let mut state = AppState::default();

    let notices = tokio_test::block_on(state.send_message(&client, "hi"));
    assert!(!state.connected);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);

    tokio_test::block_on(state.send_message(&client, "retry"));
    assert!(state.connected);
}

#[test]
fn test_missing_key_leaves_session_untouched() {
    let client = HttpChatClient::new(ClientConfig::new(Provider::Gemini));
    let mut state = AppState::default();
    state.handle(Command::SetDraft("hi".into()));

    for _ in 0..2 {
        let notices = tokio_test::block_on(state.send_message(&client, "hi"));
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
    }

    assert!(!state.connected);
    let session = state.sessions.active();
    assert!(session.messages.is_empty());
    assert_eq!(session.title, "New Conversation");
    assert_eq!(session.draft, "hi");
}

#[test]
fn test_offline_failure_keeps_connection_flag() {
    let client = ScriptedClient::new(vec![Err(ChatError::offline("timeout"))]);
    let mut state = AppState::default();
    let notices = tokio_test::block_on(state.send_message(&client, "hi"));
    assert!(state.connected);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    // user message is kept for context
    assert_eq!(state.sessions.active().messages.len(), 1);
}

#[test]
fn test_empty_reply_uses_fallback() {
    let client = ScriptedClient::new(vec![Ok("   ")]);
    let mut state = AppState::default();
    tokio_test::block_on(state.send_message(&client, "hi"));
    let last = state.sessions.active().messages.last().expect("reply");
    assert_eq!(last.content, EMPTY_REPLY_FALLBACK);
}

#[test]
fn test_reply_lands_in_original_session() {
    let client = ScriptedClient::new(vec![Ok("answer")]);
    let mut state = AppState::default();
    let first = state.sessions.active_id().to_string();
    tokio_test::block_on(state.send_message(&client, "question"));
    state.handle(Command::NewSession);
    let session = state.sessions.get(&first).expect("session");
    assert_eq!(session.messages.len(), 2);
    assert!(state.sessions.active().messages.is_empty());
}

#[test]
fn test_draft_is_cleared_after_send() {
    let client = ScriptedClient::new(vec![Ok("ok")]);
    let mut state = AppState::default();
    state.handle(Command::SetDraft("pending".into()));
    let draft = state.sessions.active().draft.clone();
    tokio_test::block_on(state.send_message(&client, &draft));
    assert!(state.sessions.active().draft.is_empty());
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn test_state_survives_sqlite_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("codeflow.db");

    {
        let mut store = SqliteStore::open(&path).expect("open");
        let mut state = AppState::load(&store, 4000).expect("load");
        state.handle(Command::LoadFile {
            name: "page.html".into(),
            content: "<html><head></head><body><script>go()</script></body></html>".into(),
        });
        state.handle(Command::SetCharLimit("300".into()));
        state.handle(Command::ToggleTheme);
        state.save(&mut store).expect("save");
    }

    let store = SqliteStore::open(&path).expect("reopen");
    let state = AppState::load(&store, 4000).expect("load");
    assert_eq!(state.document.js, "go()");
    assert_eq!(state.document.html, "<html><head></head><body></body></html>");
    assert_eq!(state.char_limit, 300);
    assert_eq!(state.theme, Theme::Light);
}

#[test]
fn test_stored_keys_match_layout() {
    let mut store = SqliteStore::open_in_memory().expect("open");
    AppState::default().save(&mut store).expect("save");
    for key in [KEY_DOCUMENT, KEY_THEME, KEY_CHAR_LIMIT, KEY_SESSIONS, KEY_ACTIVE_SESSION] {
        assert!(store.get(key).expect("get").is_some(), "missing {key}");
    }
    assert_eq!(store.get(KEY_THEME).expect("get").as_deref(), Some("dark"));
}

#[test]
fn test_stale_active_session_falls_back_to_first() {
    let mut store = SqliteStore::open_in_memory().expect("open");
    let state = AppState::default();
    state.save(&mut store).expect("save");
    store.set(KEY_ACTIVE_SESSION, "gone").expect("set");

    let loaded = AppState::load(&store, 4000).expect("load");
    assert_eq!(loaded.sessions.active_id(), loaded.sessions.sessions()[0].id);
}

#[test]
fn test_current_blocks_follow_tab() {
    let mut state = AppState::default();
    state.handle(Command::Edit {
        target: Some(FragmentKind::Complete),
        text: format!("<style>{}</style>", "a".repeat(250)),
    });
    state.handle(Command::SetTab(Tab::Css));
    state.handle(Command::SetCharLimit("100".into()));
    let blocks = state.current_blocks();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[2].length, 50);
}
