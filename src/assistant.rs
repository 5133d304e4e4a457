//! One-shot code assistant tasks and the chat system prompt.

use clap::ValueEnum;
use tracing::info;

use crate::chat::strip_code_fences;
use crate::client::{ChatClient, ChatRequest};
use crate::document::Document;
use crate::error::{CodeflowError, Result};

pub const CHAT_TEMPERATURE: f32 = 0.7;
pub const TASK_TEMPERATURE: f32 = 0.1;
pub const NO_RESPONSE: &str = "No response generated.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AssistantTask {
    /// Rewrite the code for performance and return only code.
    Optimize,
    /// Summarize what the code does in three short points.
    Explain,
}

impl AssistantTask {
    pub fn system_instruction(&self) -> &'static str {
        match self {
            AssistantTask::Optimize => {
                "You are a code optimization engine. Optimize the code for maximum performance. \
                 Return ONLY the raw code."
            }
            AssistantTask::Explain => {
                "You are a code mentor. Explain the code in three very short bullet points."
            }
        }
    }
}

impl std::fmt::Display for AssistantTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssistantTask::Optimize => write!(f, "optimize"),
            AssistantTask::Explain => write!(f, "explain"),
        }
    }
}

/// Run a one-shot task over `code`.
///
/// Blank code is rejected before any request is made. Optimize replies have
/// their markdown fences removed so they can be pasted back directly.
pub async fn analyze<C: ChatClient>(client: &C, task: AssistantTask, code: &str) -> Result<String> {
    if code.trim().is_empty() {
        return Err(CodeflowError::EmptyInput);
    }
    info!(%task, chars = code.chars().count(), "running assistant task");
    let request = ChatRequest::single(task.system_instruction(), code, TASK_TEMPERATURE);
    let mut text = client.complete(&request).await?;
    if task == AssistantTask::Optimize {
        text = strip_code_fences(&text);
    }
    if text.trim().is_empty() {
        text = NO_RESPONSE.to_string();
    }
    Ok(text)
}

/// System prompt for the chat sidebar, including the size of each fragment.
pub fn system_prompt_for(document: &Document) -> String {
    format!(
        "You are a senior web developer.\n\
         Answer technically and directly.\n\
         If the user asks for code, use markdown code blocks.\n\
         The current project has: HTML({} chars), CSS({}), JS({}).",
        document.html.chars().count(),
        document.css.chars().count(),
        document.js.chars().count(),
    )
}
