pub mod assistant;
pub mod blocks;
pub mod chat;
pub mod cli;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod providers;
pub mod state;
pub mod store;

pub use blocks::{chunk, Block};
pub use client::{ChatClient, ChatError, ChatRequest, HttpChatClient};
pub use document::{reassemble, split, Document, Fragments, FragmentKind};
pub use error::{CodeflowError, Result};
pub use state::{AppState, Command, Notice};
pub use store::{KvStore, MemoryStore, SqliteStore};
