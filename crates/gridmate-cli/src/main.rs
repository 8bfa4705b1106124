//! gridmate - spreadsheet assistant sandbox REPL
//!
//! Drives a chat session against an in-memory workbook so the assistant and
//! its tool catalogue can be exercised from the terminal.

mod config;

use anyhow::Context as _;
use base64::Engine as _;
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use gridmate_agent::{
    AnthropicService, ChatSession, FileAttachment, SessionConfig, SessionEvent,
};
use gridmate_tools::{MemoryWorkbook, SpreadsheetBackend, builtin_tools};

use config::Config;

/// gridmate - AI spreadsheet assistant (sandbox mode)
#[derive(Parser, Debug)]
#[command(name = "gridmate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (default: claude-haiku-4-5-20251001)
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum tokens per response
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Extended-thinking token budget (0 disables thinking)
    #[arg(long)]
    thinking_budget: Option<u32>,

    /// Run a single prompt and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Start with an empty workbook instead of the demo sheet
    #[arg(long)]
    empty: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.init_config {
        let path = Config::init().context("failed to write config file")?;
        println!("Config file at: {}", path.display());
        println!("\n{}", config::example_config());
        return Ok(());
    }

    let config = Config::load();
    tracing::debug!("config path: {}", Config::config_path().display());
    let api_key = config
        .api_key()
        .context("no API key found: set ANTHROPIC_API_KEY or add it to the config file")?;

    let model_id = args
        .model
        .or(config.model)
        .unwrap_or_else(|| gridmate_ai::models::default_model().id);
    let model = gridmate_ai::models::resolve_model(&model_id);

    let thinking_budget = args
        .thinking_budget
        .or(config.thinking_budget)
        .filter(|&budget| budget > 0);
    let session_config = SessionConfig {
        model,
        max_tokens: args.max_tokens.or(config.max_tokens),
        thinking_budget,
        ..Default::default()
    };

    let workbook = Arc::new(MemoryWorkbook::new());
    if !args.empty {
        seed_demo_sheet(workbook.as_ref()).await?;
    }
    let tools = builtin_tools(workbook.clone());
    let service = Arc::new(AnthropicService::new(api_key));
    let mut session = ChatSession::new(session_config, service, tools);

    spawn_event_printer(&session);

    if let Some(prompt) = args.command {
        session.send_message(&prompt, None, vec![]).await;
        // Give the printer task a beat to drain the trailing events
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        return Ok(());
    }

    println!("gridmate sandbox - chatting against an in-memory workbook ({})", model_id);
    println!("Commands: :sheet  :attach <path>  :clear  :quit");

    let stdin = std::io::stdin();
    let mut pending_attachments: Vec<FileAttachment> = Vec::new();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();

        match line {
            "" => continue,
            ":quit" | ":q" => break,
            ":clear" => {
                session.clear_messages();
                pending_attachments.clear();
                println!("(conversation cleared)");
            }
            ":sheet" => match workbook.render_sheet(None) {
                Ok(rendered) => println!("{}", rendered),
                Err(e) => eprintln!("error: {}", e),
            },
            _ if line.starts_with(":attach ") => {
                let path = line.trim_start_matches(":attach ").trim();
                match stage_attachment(Path::new(path)) {
                    Ok(attachment) => {
                        println!(
                            "(staged {} for the next message)",
                            attachment.name.as_deref().unwrap_or(path)
                        );
                        pending_attachments.push(attachment);
                    }
                    Err(e) => eprintln!("error: {}", e),
                }
            }
            _ => {
                let attachments = std::mem::take(&mut pending_attachments);
                session.send_message(line, None, attachments).await;
            }
        }
    }

    Ok(())
}

/// Print streamed text and tool activity from the session event channel.
fn spawn_event_printer(session: &ChatSession) {
    let mut rx = session.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(SessionEvent::MessageDelta { delta, .. }) => {
                    print!("{}", delta);
                    std::io::stdout().flush().ok();
                }
                Ok(SessionEvent::ToolBatchStart { calls }) => {
                    let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
                    eprintln!("\n[tools: {}]", names.join(", "));
                }
                Ok(SessionEvent::TurnEnd { .. }) | Ok(SessionEvent::Aborted) => {
                    println!();
                }
                Ok(SessionEvent::Error { message }) => {
                    eprintln!("\n[error: {}]", message);
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Read a file and stage it as a base64 attachment for the next message.
fn stage_attachment(path: &Path) -> anyhow::Result<FileAttachment> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    let attachment = match extension.as_str() {
        "png" => FileAttachment::image(encoded, "image/png"),
        "jpg" | "jpeg" => FileAttachment::image(encoded, "image/jpeg"),
        "gif" => FileAttachment::image(encoded, "image/gif"),
        "webp" => FileAttachment::image(encoded, "image/webp"),
        "pdf" => FileAttachment::document(encoded, "application/pdf"),
        other => anyhow::bail!("unsupported attachment type: .{}", other),
    };

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string());
    Ok(match name {
        Some(name) => attachment.with_name(name),
        None => attachment,
    })
}

/// Seed the sandbox with a small expense sheet so there is data to play with.
async fn seed_demo_sheet(workbook: &MemoryWorkbook) -> anyhow::Result<()> {
    use serde_json::json;

    workbook
        .write_range(
            None,
            "A1",
            vec![
                vec![json!("Date"), json!("Merchant"), json!("Category"), json!("Amount")],
                vec![json!("2026-07-02"), json!("Cafe Luna"), json!("Food"), json!(12.50)],
                vec![json!("2026-07-05"), json!("Metro Card"), json!("Transport"), json!(20.00)],
                vec![json!("2026-07-09"), json!("Grocer & Co"), json!("Food"), json!(54.30)],
                vec![json!("2026-07-15"), json!("Cloud Hosting"), json!("Software"), json!(18.00)],
            ],
        )
        .await
        .map_err(|e| anyhow::anyhow!("failed to seed workbook: {}", e))?;
    workbook.set_selection("A1:D5");
    Ok(())
}
