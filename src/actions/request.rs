//! Validation of loosely-typed payloads into typed action requests.

use std::fmt;

use serde_json::Value;

use super::payload::{display_value, ActionPayload};

/// A payload that passed validation, keyed by its discriminator.
#[derive(Debug, Clone, PartialEq)]
pub enum CardAction {
    ExecutePrompt {
        prompt: String,
    },
    GetStarted,
    SubmitFeedback {
        rating: Option<String>,
        comments: Option<String>,
    },
    SubmitQuiz {
        answers: Vec<(String, String)>,
    },
    AddTodo {
        text: String,
    },
    CopyQuery {
        query: String,
    },
    RunQuery {
        query: String,
    },
    RestartVms {
        vms: Vec<String>,
    },
    ShowCode {
        language: String,
    },
    Unknown {
        action: String,
    },
}

impl CardAction {
    pub fn name(&self) -> &str {
        match self {
            CardAction::ExecutePrompt { .. } => "executePrompt",
            CardAction::GetStarted => "getStarted",
            CardAction::SubmitFeedback { .. } => "submitFeedback",
            CardAction::SubmitQuiz { .. } => "submitQuiz",
            CardAction::AddTodo { .. } => "addTodo",
            CardAction::CopyQuery { .. } => "copyQuery",
            CardAction::RunQuery { .. } => "runQuery",
            CardAction::RestartVms { .. } => "restartVMs",
            CardAction::ShowCode { .. } => "showCode",
            CardAction::Unknown { action } => action,
        }
    }
}

/// Validation failures. All of them are the caller's fault and map to 4xx.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The body was not a JSON object.
    InvalidPayload(String),
    /// No non-blank `action` discriminator.
    MissingAction,
    /// A field the discriminator requires is absent or blank.
    MissingField {
        field: &'static str,
        description: &'static str,
    },
    /// A destructive action arrived without its confirmation flag.
    NotConfirmed {
        action: &'static str,
        flag: &'static str,
    },
}

impl ActionError {
    pub fn status_code(&self) -> u16 {
        400
    }

    /// The offending field, when there is one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ActionError::MissingField { field, .. } => Some(field),
            ActionError::NotConfirmed { flag, .. } => Some(flag),
            ActionError::MissingAction => Some(super::payload::ACTION_KEY),
            ActionError::InvalidPayload(_) => None,
        }
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::InvalidPayload(detail) => write!(f, "Invalid action payload: {detail}"),
            ActionError::MissingAction => write!(f, "Missing action type"),
            ActionError::MissingField { field, description } => {
                write!(f, "Missing {description} (field '{field}' is required)")
            }
            ActionError::NotConfirmed { action, flag } => {
                write!(f, "Action not confirmed: {action} requires '{flag}' to be true")
            }
        }
    }
}

impl std::error::Error for ActionError {}

impl TryFrom<&ActionPayload> for CardAction {
    type Error = ActionError;

    fn try_from(payload: &ActionPayload) -> Result<Self, Self::Error> {
        let action = payload.action().ok_or(ActionError::MissingAction)?;

        let request = match action {
            "executePrompt" => CardAction::ExecutePrompt {
                prompt: required(payload, "prompt", "prompt text")?,
            },
            "getStarted" => CardAction::GetStarted,
            "submitFeedback" => CardAction::SubmitFeedback {
                rating: payload.text("rating"),
                comments: payload.text("comments"),
            },
            "submitQuiz" => CardAction::SubmitQuiz {
                answers: payload
                    .fields()
                    .map(|(question, answer)| (question.clone(), display_value(answer)))
                    .collect(),
            },
            "addTodo" => CardAction::AddTodo {
                text: required(payload, "newTodo", "todo text")?,
            },
            "copyQuery" => CardAction::CopyQuery {
                query: required(payload, "query", "query text")?,
            },
            "runQuery" => CardAction::RunQuery {
                query: required(payload, "query", "query text")?,
            },
            "restartVMs" => {
                let vms = vm_selection(payload.get("vmSelection")).ok_or(
                    ActionError::MissingField {
                        field: "vmSelection",
                        description: "VM selection",
                    },
                )?;
                if !is_confirmed(payload.get("confirmToggle")) {
                    return Err(ActionError::NotConfirmed {
                        action: "restartVMs",
                        flag: "confirmToggle",
                    });
                }
                CardAction::RestartVms { vms }
            }
            "showCode" => CardAction::ShowCode {
                language: required(payload, "language", "language selection")?,
            },
            other => CardAction::Unknown {
                action: other.to_string(),
            },
        };

        Ok(request)
    }
}

fn required(
    payload: &ActionPayload,
    field: &'static str,
    description: &'static str,
) -> Result<String, ActionError> {
    payload
        .text(field)
        .ok_or(ActionError::MissingField { field, description })
}

/// Accepts a comma separated string or an array of strings.
fn vm_selection(value: Option<&Value>) -> Option<Vec<String>> {
    let names: Vec<String> = match value? {
        Value::String(list) => list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    (!names.is_empty()).then_some(names)
}

fn is_confirmed(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => text.trim() == "true",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::payload::ACTION_KEY;
    use serde_json::json;

    fn parse(payload: ActionPayload) -> Result<CardAction, ActionError> {
        CardAction::try_from(&payload)
    }

    #[test]
    fn missing_discriminator_fails_fast() {
        assert_eq!(parse(ActionPayload::new()), Err(ActionError::MissingAction));
        assert_eq!(
            parse(ActionPayload::new().with(ACTION_KEY, "")),
            Err(ActionError::MissingAction)
        );
    }

    #[test]
    fn required_fields_are_named_in_errors() {
        let err = parse(ActionPayload::for_action("addTodo")).expect_err("missing newTodo");
        assert_eq!(err.field(), Some("newTodo"));
        assert!(err.to_string().contains("newTodo"));

        let err = parse(ActionPayload::for_action("executePrompt").with("prompt", ""))
            .expect_err("blank prompt");
        assert_eq!(err.field(), Some("prompt"));
    }

    #[test]
    fn feedback_fields_are_optional() {
        assert_eq!(
            parse(ActionPayload::for_action("submitFeedback")),
            Ok(CardAction::SubmitFeedback {
                rating: None,
                comments: None
            })
        );
        assert_eq!(
            parse(ActionPayload::for_action("submitFeedback").with("rating", 4)),
            Ok(CardAction::SubmitFeedback {
                rating: Some("4".to_string()),
                comments: None
            })
        );
    }

    #[test]
    fn quiz_collects_every_field_but_the_discriminator() {
        let payload = ActionPayload::for_action("submitQuiz")
            .with("capital", "Paris")
            .with("answer2", 42);
        assert_eq!(
            parse(payload),
            Ok(CardAction::SubmitQuiz {
                answers: vec![
                    ("capital".to_string(), "Paris".to_string()),
                    ("answer2".to_string(), "42".to_string())
                ]
            })
        );
    }

    #[test]
    fn restart_distinguishes_missing_selection_from_missing_confirmation() {
        let no_selection = parse(ActionPayload::for_action("restartVMs").with("confirmToggle", "true"))
            .expect_err("no selection");
        assert!(matches!(
            no_selection,
            ActionError::MissingField {
                field: "vmSelection",
                ..
            }
        ));

        let unconfirmed = parse(
            ActionPayload::for_action("restartVMs")
                .with("vmSelection", "vm-a")
                .with("confirmToggle", "false"),
        )
        .expect_err("unconfirmed");
        assert!(matches!(unconfirmed, ActionError::NotConfirmed { .. }));
        assert_ne!(no_selection, unconfirmed);
    }

    #[test]
    fn restart_accepts_string_or_array_selection() {
        assert_eq!(
            parse(
                ActionPayload::for_action("restartVMs")
                    .with("vmSelection", "vm-a, vm-b,")
                    .with("confirmToggle", true)
            ),
            Ok(CardAction::RestartVms {
                vms: vec!["vm-a".to_string(), "vm-b".to_string()]
            })
        );
        assert_eq!(
            parse(
                ActionPayload::for_action("restartVMs")
                    .with("vmSelection", json!(["vm-c"]))
                    .with("confirmToggle", "true")
            ),
            Ok(CardAction::RestartVms {
                vms: vec!["vm-c".to_string()]
            })
        );
    }

    #[test]
    fn unknown_discriminator_is_preserved() {
        let action = parse(ActionPayload::for_action("frobnicate")).expect("fallback");
        assert_eq!(
            action,
            CardAction::Unknown {
                action: "frobnicate".to_string()
            }
        );
        assert_eq!(action.name(), "frobnicate");
    }
}
