use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::assistant::AssistantTask;
use crate::config::DEFAULT_CONFIG_FILE;
use crate::document::FragmentKind;
use crate::providers::Provider;

#[derive(Parser)]
#[command(name = "codeflow")]
#[command(version)]
#[command(about = "Split, chunk and reassemble HTML/CSS/JS documents, with an LLM chat assistant")]
pub struct Args {
    /// Path to the TOML settings file (optional)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// SQLite file holding the document, settings and chat sessions
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// LLM provider, overriding the config file
    #[arg(long, global = true, value_enum)]
    pub provider: Option<Provider>,

    /// Model name, overriding the config file
    #[arg(long, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Cmd,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Cmd {
    /// Print the markup, style and script of a combined document (stdin if no file)
    Split {
        file: Option<PathBuf>,
        /// Emit JSON instead of labelled sections
        #[arg(long)]
        json: bool,
    },
    /// Reassemble a document from separate fragment files
    Join {
        #[arg(long)]
        html: Option<PathBuf>,
        #[arg(long)]
        css: Option<PathBuf>,
        #[arg(long)]
        js: Option<PathBuf>,
    },
    /// Chunk text into copy-sized blocks (the stored document if no file)
    Blocks {
        file: Option<PathBuf>,
        /// Block size in chars (clamped to at least 100)
        #[arg(long, short)]
        size: Option<usize>,
        #[arg(long, value_enum)]
        section: Option<FragmentKind>,
        #[arg(long)]
        json: bool,
    },
    /// Load a file into the stored document (.css and .js go to their fragment)
    Load { file: PathBuf },
    /// Print one section of the stored document
    Show {
        #[arg(value_enum, default_value = "complete")]
        section: FragmentKind,
    },
    /// Replace one section of the stored document (stdin if no file)
    Edit {
        #[arg(value_enum)]
        section: FragmentKind,
        file: Option<PathBuf>,
    },
    /// Remove all stored document content
    Clear,
    /// Write sections of the stored document to files
    Export {
        /// Section to export; all non-empty sections when omitted
        #[arg(value_enum)]
        section: Option<FragmentKind>,
        /// Base file name
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Set the stored block size
    Limit {
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Toggle between the dark and light theme
    Theme,
    /// Chat with the assistant
    Chat {
        #[command(subcommand)]
        action: ChatAction,
    },
    /// Ask the assistant to optimize or explain a section
    Ask {
        #[arg(value_enum)]
        task: AssistantTask,
        #[arg(long, value_enum, default_value = "complete")]
        section: FragmentKind,
        /// Write an optimize result back into the section
        #[arg(long)]
        apply: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ChatAction {
    /// Send a message on the active session (the saved draft if omitted)
    Send { message: Option<String> },
    /// Start a new session and make it active
    New,
    /// List sessions
    List,
    /// Print the active session
    Show,
    Select { id: String },
    Delete { id: String },
    /// Save a draft on the active session
    Draft { text: String },
    /// Apply code block N (1-based) of the last assistant reply
    Apply { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_split_minimal() {
        let args = Args::parse_from(["codeflow", "split"]);
        assert_eq!(args.command, Cmd::Split { file: None, json: false });
        assert_eq!(args.config, PathBuf::from("codeflow.toml"));
        assert!(args.store.is_none());
        assert!(args.provider.is_none());
    }

    #[test]
    fn test_args_global_flags_after_subcommand() {
        let args = Args::parse_from(["codeflow", "show", "--provider", "anthropic", "--store", "x.db"]);
        assert_eq!(args.provider, Some(Provider::Anthropic));
        assert_eq!(args.store, Some(PathBuf::from("x.db")));
        assert_eq!(args.command, Cmd::Show { section: FragmentKind::Complete });
    }

    #[test]
    fn test_args_blocks_size_and_section() {
        let args = Args::parse_from(["codeflow", "blocks", "page.html", "-s", "500", "--section", "css"]);
        assert_eq!(
            args.command,
            Cmd::Blocks {
                file: Some(PathBuf::from("page.html")),
                size: Some(500),
                section: Some(FragmentKind::Style),
                json: false,
            }
        );
    }

    #[test]
    fn test_args_section_names() {
        let args = Args::parse_from(["codeflow", "edit", "js"]);
        assert_eq!(args.command, Cmd::Edit { section: FragmentKind::Script, file: None });
        let args = Args::parse_from(["codeflow", "show", "html"]);
        assert_eq!(args.command, Cmd::Show { section: FragmentKind::Markup });
    }

    #[test]
    fn test_args_limit_accepts_negative_text() {
        let args = Args::parse_from(["codeflow", "limit", "-5"]);
        assert_eq!(args.command, Cmd::Limit { value: "-5".into() });
    }

    #[test]
    fn test_args_chat_send() {
        let args = Args::parse_from(["codeflow", "chat", "send", "make it blue"]);
        assert_eq!(
            args.command,
            Cmd::Chat { action: ChatAction::Send { message: Some("make it blue".into()) } }
        );
    }

    #[test]
    fn test_args_chat_send_uses_draft() {
        let args = Args::parse_from(["codeflow", "chat", "send"]);
        assert_eq!(args.command, Cmd::Chat { action: ChatAction::Send { message: None } });
    }

    #[test]
    fn test_args_ask() {
        let args = Args::parse_from(["codeflow", "ask", "optimize", "--section", "js", "--apply"]);
        assert_eq!(
            args.command,
            Cmd::Ask { task: AssistantTask::Optimize, section: FragmentKind::Script, apply: true }
        );
    }

    #[test]
    fn test_args_export_defaults() {
        let args = Args::parse_from(["codeflow", "export"]);
        assert_eq!(
            args.command,
            Cmd::Export { section: None, name: None, dir: PathBuf::from(".") }
        );
    }

    #[test]
    fn test_args_unknown_section_rejected() {
        assert!(Args::try_parse_from(["codeflow", "show", "markdown"]).is_err());
    }
}
