//! nira - private on-device chat assistant

mod commands;
mod config;
mod render;
mod transcript_log;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use nira_engine::{ModelDescriptor, providers::OllamaEngine};
use nira_session::{
    DEFAULT_FAILURE_NOTICE, DEFAULT_SYSTEM_PROMPT, SessionConfig, SessionEvent,
    SessionOrchestrator,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use commands::CommandResult;
use render::Renderer;
use transcript_log::TranscriptLog;

/// nira - chat with a small language model running on this device
#[derive(Parser, Debug)]
#[command(name = "nira")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to load (default: smollm2:360m)
    #[arg(short, long)]
    model: Option<String>,

    /// Engine base URL (default: $OLLAMA_HOST or http://localhost:11434)
    #[arg(long)]
    engine_url: Option<String>,

    /// List available models and exit
    #[arg(long)]
    list_models: bool,

    /// Run in non-interactive mode with a single prompt
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

type StdoutRenderer = Renderer<std::io::Stdout>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    let filter = if args.verbose {
        EnvFilter::new("nira_cli=debug,nira_engine=debug,nira_session=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Initialize config and exit
    if args.init_config {
        let path = config::Config::init().context("Error creating config")?;
        println!("Config file created at: {}", path.display());
        println!("\nExample config:\n{}", config::example_config());
        return Ok(());
    }

    let cfg = config::Config::load();
    let catalog = cfg.catalog().context("Invalid model list in config")?;

    if args.list_models {
        for model in catalog.list() {
            let marker = if model.id == catalog.default_model().id {
                " (default)"
            } else {
                ""
            };
            println!("{:<16} {:<32} {}{}", model.id, model.label, model.size_label(), marker);
        }
        return Ok(());
    }

    // Merge config with CLI args (CLI takes precedence)
    let selected = cfg
        .select_model(&catalog, args.model.as_deref())
        .context("Use `nira --list-models` to see the available models")?;

    let engine = match args.engine_url.or(cfg.engine_url.clone()) {
        Some(url) => OllamaEngine::new(url),
        None => OllamaEngine::from_env(),
    };
    tracing::debug!("Using engine at {}", engine.base_url());

    let session_config = SessionConfig {
        system_prompt: cfg
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        sampling: cfg.sampling.unwrap_or_default(),
        failure_notice: DEFAULT_FAILURE_NOTICE.to_string(),
    };
    let session = SessionOrchestrator::new(session_config, catalog, Arc::new(engine));
    let mut events = session.subscribe();

    let log = match TranscriptLog::create(session.session_id(), &selected.id) {
        Ok(log) => {
            tracing::debug!("Transcript log at {}", log.path().display());
            Some(log)
        }
        Err(e) => {
            tracing::warn!("Transcript log disabled: {}", e);
            None
        }
    };
    let mut renderer = Renderer::new(std::io::stdout(), log);

    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        let id = session.session_id().to_string();
        eprintln!("nira ({}, {}) session: {}", selected.label, selected.size_label(), &id[..8]);
        eprintln!();
    }

    let loaded = renderer
        .drive(&mut events, session.load_model(&selected.id))
        .await
        .is_ok();

    // Non-interactive mode
    if let Some(prompt) = args.command {
        if !loaded {
            std::process::exit(1);
        }
        let result = renderer
            .drive(&mut events, session.send_message(&prompt))
            .await;
        if result.is_err() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let topics = cfg.topics();
    run_interactive(&session, &mut events, &mut renderer, selected, &topics).await
}

async fn run_interactive(
    session: &SessionOrchestrator,
    events: &mut broadcast::Receiver<SessionEvent>,
    renderer: &mut StdoutRenderer,
    mut selected: ModelDescriptor,
    topics: &[(String, String)],
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            // EOF
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let prompt = match commands::execute_command(input, session, &selected, topics) {
            None => input.to_string(),
            Some(CommandResult::Send(template)) => {
                println!("> {}", template);
                template
            }
            Some(CommandResult::Exit) => break,
            Some(CommandResult::Message(msg)) => {
                println!("{}", msg);
                continue;
            }
            Some(CommandResult::SelectModel(model)) => {
                println!(
                    "Selected: {} ({}). Use /load to load it.",
                    model.label,
                    model.size_label()
                );
                selected = model;
                continue;
            }
            Some(CommandResult::Load) => {
                let _ = renderer
                    .drive(events, session.load_model(&selected.id))
                    .await;
                continue;
            }
            Some(CommandResult::NewChat) => {
                session.new_chat();
                renderer.drain(events);
                println!("Started a new conversation.");
                continue;
            }
            Some(CommandResult::Unknown(cmd)) => {
                println!("Unknown command: /{}", cmd);
                println!("Type /help for available commands.");
                continue;
            }
        };

        // Failures are already rendered from the event stream
        if let Err(e) = renderer.drive(events, session.send_message(&prompt)).await {
            tracing::debug!("Turn ended with error: {}", e);
        }
    }

    Ok(())
}
