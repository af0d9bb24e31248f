use std::collections::HashMap;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::inventory;
use super::payload::{ActionPayload, ActionResult, TodoItem};
use super::request::{ActionError, CardAction};
use crate::cards::{TemplateStore, VariableMap};

pub const FEEDBACK_THANKS_TITLE: &str = "Thank You for Your Feedback!";

/// Maps validated card actions to their results. Stateless apart from the
/// template catalog it resolves reply cards from.
#[derive(Debug, Clone, Copy)]
pub struct ActionDispatcher {
    templates: &'static TemplateStore,
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new(TemplateStore::builtin())
    }
}

impl ActionDispatcher {
    pub fn new(templates: &'static TemplateStore) -> Self {
        Self { templates }
    }

    /// Validates `payload` and produces exactly one result for it.
    pub fn dispatch(&self, payload: &ActionPayload) -> Result<ActionResult, ActionError> {
        let action = CardAction::try_from(payload).inspect_err(|err| {
            debug!(error = %err, "rejected card action");
        })?;
        Ok(self.handle(action))
    }

    pub fn handle(&self, action: CardAction) -> ActionResult {
        debug!(action = action.name(), "dispatching card action");
        match action {
            CardAction::ExecutePrompt { prompt } => {
                info!(%prompt, "executing prompt");
                ActionResult::message("Executing your prompt...").with_prompt(prompt)
            }
            CardAction::GetStarted => ActionResult::message("Welcome! How can I help you today?"),
            CardAction::SubmitFeedback { rating, comments } => {
                info!(?rating, ?comments, "received feedback");
                let variables: VariableMap = HashMap::from([
                    ("title".to_string(), FEEDBACK_THANKS_TITLE.to_string()),
                    (
                        "message".to_string(),
                        "We appreciate your input and will use it to improve our service."
                            .to_string(),
                    ),
                ]);
                ActionResult::message("Thank you for your feedback!")
                    .with_card(self.templates.resolve("thankYou", &variables))
            }
            CardAction::SubmitQuiz { answers } => {
                let transcript = answers
                    .iter()
                    .map(|(question, answer)| format!("{question}: {answer}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                ActionResult::message("Processing your answers...").with_prompt(format!(
                    "Here are my answers to the quiz:\n{transcript}\n\nPlease check if they are correct and provide feedback."
                ))
            }
            CardAction::AddTodo { text } => {
                info!(%text, "adding todo item");
                ActionResult {
                    message: format!("Added todo: {text}"),
                    todo_item: Some(TodoItem {
                        id: Uuid::new_v4().to_string(),
                        text,
                        completed: false,
                    }),
                    ..Default::default()
                }
            }
            CardAction::CopyQuery { query } => {
                debug!(%query, "copying query");
                ActionResult::message("Query copied to clipboard")
            }
            CardAction::RunQuery { query } => {
                info!(%query, "running query");
                let rows = inventory::run_query(&query);
                let table = serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".into());
                ActionResult::message("Executing your query...").with_prompt(format!(
                    "Here are the results of the KQL query:\n\n```kql\n{query}\n```\n\nPlease display these results in a table:\n\n{table}"
                ))
            }
            CardAction::RestartVms { vms } => {
                let list = vms.join(", ");
                info!(vms = %list, "restarting virtual machines");
                ActionResult::message("VMs restarted successfully").with_prompt(format!(
                    "I've successfully restarted the following VMs: {list}. The operation completed successfully."
                ))
            }
            CardAction::ShowCode { language } => {
                ActionResult::message(format!("Showing {language} code example")).with_prompt(
                    format!("Please update the code display to show the {language} example."),
                )
            }
            CardAction::Unknown { action } => {
                warn!(%action, "unrecognized card action, deferring to the model");
                ActionResult::message("Processing your response...").with_prompt(format!(
                    "Use the following action to generate a response:\n{action}\n\nPlease respond to the user with a card."
                ))
            }
        }
    }
}
