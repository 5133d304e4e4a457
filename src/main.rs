use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser};
use colored::*;
use tracing_subscriber::EnvFilter;

use codeflow::assistant::{analyze, AssistantTask};
use codeflow::blocks::{chunk, chunk_document, clamp_char_limit, Block, SectionBlocks};
use codeflow::chat::{code_blocks, split_code_fences, MessagePart, Role};
use codeflow::cli::{Args, ChatAction, Cmd};
use codeflow::config::Settings;
use codeflow::document::{bundle_export_name, reassemble, split, Document, FragmentKind, Fragments};
use codeflow::state::{AppState, Command, Notice, NoticeLevel};
use codeflow::store::SqliteStore;
use codeflow::{CodeflowError, HttpChatClient};

type BoxResult<T> = Result<T, Box<dyn std::error::Error>>;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CODEFLOW_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Read a file, or stdin when no path is given.
fn read_input(path: Option<&Path>) -> io::Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn read_optional(path: Option<&PathBuf>) -> io::Result<String> {
    path.map(std::fs::read_to_string).transpose().map(Option::unwrap_or_default)
}

fn print_notices(notices: &[Notice]) {
    for notice in notices {
        let line = match notice.level {
            NoticeLevel::Success => notice.message.bright_green(),
            NoticeLevel::Info => notice.message.bright_blue(),
            NoticeLevel::Error => notice.message.bright_red(),
        };
        eprintln!("{}", line);
    }
}

fn print_section(label: &str, body: &str) {
    println!("{}", format!("== {} ==", label).bright_yellow().bold());
    if body.is_empty() {
        println!("{}", "(empty)".dimmed());
    } else {
        println!("{}", body);
    }
}

fn print_blocks(label: &str, blocks: &[Block]) {
    println!(
        "{}",
        format!("== {} · {} block(s) ==", label, blocks.len()).bright_yellow().bold()
    );
    for block in blocks {
        println!(
            "{}",
            format!(
                "-- block {} · {} chars · {} lines --",
                block.index + 1,
                block.length,
                block.lines
            )
            .bright_cyan()
        );
        println!("{}", block.content);
    }
}

fn print_message_body(content: &str) {
    let mut n = 0;
    for part in split_code_fences(content) {
        match part {
            MessagePart::Text(text) => print!("{}", text),
            MessagePart::Code(code) => {
                n += 1;
                println!("\n{}", format!("[code {}]", n).bright_magenta());
                println!("{}", code.bright_white());
            }
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// Stateless commands
// ---------------------------------------------------------------------------

fn run_split(file: Option<&Path>, json: bool) -> BoxResult<()> {
    let fragments = split(&read_input(file)?);
    if json {
        println!("{}", serde_json::to_string_pretty(&fragments)?);
    } else {
        print_section("html", &fragments.markup);
        print_section("css", &fragments.style);
        print_section("js", &fragments.script);
    }
    Ok(())
}

fn run_join(html: Option<&PathBuf>, css: Option<&PathBuf>, js: Option<&PathBuf>) -> BoxResult<()> {
    let fragments = Fragments {
        markup: read_optional(html)?,
        style: read_optional(css)?,
        script: read_optional(js)?,
    };
    println!("{}", reassemble(&fragments));
    Ok(())
}

fn run_blocks_on_text(
    text: &str,
    size: usize,
    section: Option<FragmentKind>,
    json: bool,
) -> BoxResult<()> {
    let document = Document::from_combined(text);
    match section {
        Some(kind) => emit_blocks(&[SectionBlocks { kind, blocks: chunk(document.get(kind), size) }], json),
        None => emit_blocks(&[SectionBlocks { kind: FragmentKind::Complete, blocks: chunk(text, size) }], json),
    }
}

fn emit_blocks(sections: &[SectionBlocks], json: bool) -> BoxResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(sections)?);
        return Ok(());
    }
    for section in sections {
        print_blocks(&section.kind.to_string(), &section.blocks);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Stateful commands
// ---------------------------------------------------------------------------

fn export_sections(
    document: &Document,
    section: Option<FragmentKind>,
    base_name: &str,
    dir: &Path,
) -> BoxResult<Vec<Notice>> {
    let kinds: Vec<FragmentKind> = match section {
        Some(kind) => vec![kind],
        None => FragmentKind::ALL.to_vec(),
    };
    let mut notices = Vec::new();
    for kind in kinds {
        match document.export(kind, base_name) {
            Ok(file) => {
                let name = if section.is_none() {
                    bundle_export_name(base_name, kind)
                } else {
                    file.file_name
                };
                std::fs::write(dir.join(&name), &file.content)?;
                notices.push(Notice::success(format!("{} saved", name)));
            }
            Err(CodeflowError::EmptyExport(k)) if section.is_none() => {
                tracing::debug!(section = %k, "skipping empty section");
            }
            Err(e) => notices.push(Notice::error(e.to_string())),
        }
    }
    Ok(notices)
}

async fn run_chat(
    state: &mut AppState,
    settings: &Settings,
    action: ChatAction,
) -> BoxResult<Vec<Notice>> {
    let notices = match action {
        ChatAction::Send { message } => {
            let input = message.unwrap_or_else(|| state.sessions.active().draft.clone());
            let client = HttpChatClient::new(settings.client_config());
            let notices = state.send_message(&client, &input).await;
            if !state.connected {
                eprintln!(
                    "{} export {}=<your key> and retry",
                    "hint:".bright_yellow(),
                    settings.api_key_var()
                );
            }
            if let Some(last) = state.sessions.active().messages.last() {
                if last.role == Role::Assistant {
                    print_message_body(&last.content);
                }
            }
            notices
        }
        ChatAction::New => {
            let notices = state.handle(Command::NewSession);
            println!("{}", state.sessions.active_id());
            notices
        }
        ChatAction::List => {
            for session in state.sessions.sessions() {
                let marker = if session.id == state.sessions.active_id() { "*" } else { " " };
                println!(
                    "{} {}  {}  ({} messages)",
                    marker.bright_green(),
                    session.id.bright_cyan(),
                    session.title,
                    session.messages.len()
                );
            }
            Vec::new()
        }
        ChatAction::Show => {
            let session = state.sessions.active();
            println!("{}", session.title.bright_yellow().bold());
            for message in &session.messages {
                match message.role {
                    Role::User => println!("{} {}", "you:".bright_blue().bold(), message.content),
                    Role::Assistant => {
                        println!("{}", "assistant:".bright_magenta().bold());
                        print_message_body(&message.content);
                    }
                }
            }
            if !session.draft.is_empty() {
                println!("{} {}", "draft:".dimmed(), session.draft);
            }
            Vec::new()
        }
        ChatAction::Select { id } => state.handle(Command::SelectSession(id)),
        ChatAction::Delete { id } => state.handle(Command::DeleteSession(id)),
        ChatAction::Draft { text } => state.handle(Command::SetDraft(text)),
        ChatAction::Apply { index } => {
            let snippet = state
                .sessions
                .active()
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::Assistant)
                .and_then(|m| code_blocks(&m.content).into_iter().nth(index.saturating_sub(1)));
            match snippet {
                Some(code) if index > 0 => state.handle(Command::ApplySnippet(code)),
                _ => vec![Notice::error(format!("No code block {} in the last reply", index))],
            }
        }
    };
    Ok(notices)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let mut settings = Settings::load(&args.config)?;
    if let Some(provider) = args.provider {
        settings.provider = provider;
    }
    if args.model.is_some() {
        settings.model = args.model.clone();
    }
    if let Some(store) = &args.store {
        settings.store_path = store.clone();
    }

    // Commands that never touch the store.
    match &args.command {
        Cmd::Split { file, json } => return run_split(file.as_deref(), *json),
        Cmd::Join { html, css, js } => return run_join(html.as_ref(), css.as_ref(), js.as_ref()),
        Cmd::Blocks { file: Some(file), size, section, json } => {
            let size = clamp_char_limit(size.unwrap_or(settings.char_limit));
            return run_blocks_on_text(&std::fs::read_to_string(file)?, size, *section, *json);
        }
        Cmd::Completions { shell } => {
            clap_complete::generate(*shell, &mut Args::command(), "codeflow", &mut io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let mut store = SqliteStore::open(&settings.store_path)?;
    let mut state = AppState::load(&store, settings.char_limit)?;

    let notices = match args.command {
        Cmd::Blocks { size, section, json, .. } => {
            let size = size.map(clamp_char_limit).unwrap_or(state.char_limit);
            let sections = match section {
                Some(kind) => vec![SectionBlocks { kind, blocks: chunk(state.document.get(kind), size) }],
                None => chunk_document(&state.document, size),
            };
            emit_blocks(&sections, json)?;
            Vec::new()
        }
        Cmd::Load { file } => {
            let content = std::fs::read_to_string(&file)?;
            let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            state.handle(Command::LoadFile { name, content })
        }
        Cmd::Show { section } => {
            println!("{}", state.document.get(section));
            Vec::new()
        }
        Cmd::Edit { section, file } => {
            let text = read_input(file.as_deref())?;
            state.handle(Command::Edit { target: Some(section), text })
        }
        Cmd::Clear => state.handle(Command::Clear),
        Cmd::Export { section, name, dir } => {
            let base = name.unwrap_or_else(|| settings.export_name.clone());
            export_sections(&state.document, section, &base, &dir)?
        }
        Cmd::Limit { value } => {
            let notices = state.handle(Command::SetCharLimit(value));
            println!("block size: {}", state.char_limit);
            notices
        }
        Cmd::Theme => {
            let notices = state.handle(Command::ToggleTheme);
            println!("theme: {}", state.theme);
            notices
        }
        Cmd::Chat { action } => run_chat(&mut state, &settings, action).await?,
        Cmd::Ask { task, section, apply } => {
            let client = HttpChatClient::new(settings.client_config());
            match analyze(&client, task, state.document.get(section)).await {
                Ok(result) => {
                    println!("{}", result);
                    if apply && task == AssistantTask::Optimize {
                        state.handle(Command::Edit { target: Some(section), text: result })
                    } else {
                        Vec::new()
                    }
                }
                Err(e) => vec![Notice::error(e.to_string())],
            }
        }
        Cmd::Split { .. } | Cmd::Join { .. } | Cmd::Completions { .. } => Vec::new(),
    };

    state.save(&mut store)?;
    print_notices(&notices);
    Ok(())
}
