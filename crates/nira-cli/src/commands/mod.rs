//! Slash commands for interactive mode

mod model;
mod topic;

pub use model::ModelCommand;
pub use topic::TopicCommand;

use nira_engine::ModelDescriptor;
use nira_session::SessionOrchestrator;

/// Result of executing a slash command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Select a model for the next `/load`
    SelectModel(ModelDescriptor),
    /// Load or reload the selected model
    Load,
    /// Start a new conversation
    NewChat,
    /// Send a prompt as if the user typed it
    Send(String),
    /// Show a message to the user (not sent to the model)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(
    input: &str,
    session: &SessionOrchestrator,
    selected: &ModelDescriptor,
    topics: &[(String, String)],
) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let parts: Vec<&str> = rest.splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "models" => CommandResult::Message(ModelCommand::list_models_text(session, selected)),

        "model" | "m" => ModelCommand::execute(args, session, selected),

        "load" | "l" => CommandResult::Load,

        "new" | "clear" | "c" => CommandResult::NewChat,

        "topic" | "t" => TopicCommand::execute(args, topics),

        "usage" | "u" => CommandResult::Message(usage_message(session)),

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

fn usage_message(session: &SessionOrchestrator) -> String {
    let usage = session.usage();
    format!(
        "{}\n  prompt: {}  completion: {}  turns: {}\n  state: {}",
        session.status_line(),
        usage.prompt_tokens,
        usage.completion_tokens,
        usage.turns,
        session.state()
    )
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /models              List available models
  /model, /m <name>    Select a model (then /load)
  /load, /l            Load or reload the selected model
  /new, /c             Start a new conversation
  /topic, /t [name]    List quick topics or ask one
  /usage, /u           Show token usage
  /quit, /exit, /q     Exit nira

Examples:
  /model phi           Select the first model matching "phi"
  /topic school        Ask the School quick topic"#
        .to_string()
}
