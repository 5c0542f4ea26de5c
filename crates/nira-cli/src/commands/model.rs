//! /model and /models commands - list and select models

use super::CommandResult;
use nira_engine::ModelDescriptor;
use nira_session::SessionOrchestrator;

pub struct ModelCommand;

impl ModelCommand {
    /// Execute /model: list models if no args, or select the matching model
    pub fn execute(
        args: &str,
        session: &SessionOrchestrator,
        selected: &ModelDescriptor,
    ) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(Self::list_models_text(session, selected));
        }

        match session.catalog().search(args) {
            Some(model) => CommandResult::SelectModel(model.clone()),
            None => CommandResult::Message(format!(
                "No model found matching '{}'\nUse /models to list available models",
                args
            )),
        }
    }

    /// List models with size, marking the selected and loaded ones
    pub fn list_models_text(session: &SessionOrchestrator, selected: &ModelDescriptor) -> String {
        let models = session.catalog().list();
        if models.is_empty() {
            return "No models available".to_string();
        }

        let loaded = session.current_model();
        let mut output = String::from("Available models:\n");
        for model in models {
            let marker = if model.id == selected.id { "*" } else { " " };
            let status = match &loaded {
                Some(current) if current.id == model.id => "  (loaded)",
                _ => "",
            };
            output.push_str(&format!(
                "{} {:<16} {:<32} {}{}\n",
                marker,
                model.id,
                model.label,
                model.size_label(),
                status
            ));
        }

        output.push_str("\nSelect with: /model <name>, then /load");
        output
    }
}
