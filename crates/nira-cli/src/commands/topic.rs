//! /topic command - quick-start prompts

use super::CommandResult;

pub struct TopicCommand;

impl TopicCommand {
    /// List topics if no args, or send the matching topic's template
    pub fn execute(args: &str, topics: &[(String, String)]) -> CommandResult {
        if args.is_empty() {
            let mut output = String::from("Quick topics:\n");
            for (name, template) in topics {
                output.push_str(&format!("  {:<18} {}\n", name, template));
            }
            output.push_str("\nAsk one with: /topic <name>");
            return CommandResult::Message(output);
        }

        match find_topic(args, topics) {
            Some(template) => CommandResult::Send(template.to_string()),
            None => CommandResult::Message(format!(
                "No topic matching '{}'\nUse /topic to list topics",
                args
            )),
        }
    }
}

fn find_topic<'a>(query: &str, topics: &'a [(String, String)]) -> Option<&'a str> {
    let query_lower = query.to_lowercase();

    topics
        .iter()
        .find(|(name, _)| name.to_lowercase() == query_lower)
        .or_else(|| {
            topics
                .iter()
                .find(|(name, _)| name.to_lowercase().contains(&query_lower))
        })
        .map(|(_, template)| template.as_str())
}
