//! Builtin card catalog and `${var}` placeholder resolution.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{CardDocument, CARD_SCHEMA_VERSION};

/// Replacement values keyed by placeholder name.
pub type VariableMap = HashMap<String, String>;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(\w+)\}").expect("placeholder pattern is valid"));

static BUILTIN_STORE: LazyLock<TemplateStore> =
    LazyLock::new(|| TemplateStore::from_templates_unchecked(builtin_templates()));

/// A named card skeleton. String leaves may contain `${name}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct CardTemplate {
    name: String,
    document: Value,
}

impl CardTemplate {
    pub fn new(name: impl Into<String>, document: Value) -> Self {
        Self {
            name: name.into(),
            document,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Placeholder names referenced anywhere in the template, in first-seen order.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_placeholders(&self.document, &mut names);
        names
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateTemplate(pub String);

impl fmt::Display for DuplicateTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "duplicate card template name: {}", self.0)
    }
}

impl std::error::Error for DuplicateTemplate {}

/// Read-only catalog of card templates.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    templates: Vec<CardTemplate>,
}

impl TemplateStore {
    pub fn new(templates: Vec<CardTemplate>) -> Result<Self, DuplicateTemplate> {
        for (index, template) in templates.iter().enumerate() {
            if templates[..index]
                .iter()
                .any(|earlier| earlier.name == template.name)
            {
                return Err(DuplicateTemplate(template.name.clone()));
            }
        }
        Ok(Self { templates })
    }

    fn from_templates_unchecked(templates: Vec<CardTemplate>) -> Self {
        Self { templates }
    }

    /// The process-wide builtin catalog.
    pub fn builtin() -> &'static TemplateStore {
        &BUILTIN_STORE
    }

    pub fn lookup(&self, name: &str) -> Option<&CardTemplate> {
        self.templates.iter().find(|template| template.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(|template| template.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Instantiate `name` with `variables`. Unknown names resolve to `None`.
    pub fn resolve(&self, name: &str, variables: &VariableMap) -> Option<CardDocument> {
        let Some(template) = self.lookup(name) else {
            debug!(template = name, "card template not found");
            return None;
        };
        CardDocument::from_value(substitute(&template.document, variables))
    }
}

/// Resolve a template from the builtin catalog.
pub fn resolve(name: &str, variables: &VariableMap) -> Option<CardDocument> {
    TemplateStore::builtin().resolve(name, variables)
}

/// Builds a new tree with every string leaf substituted. Keys and non-string
/// scalars are copied as-is.
pub fn substitute(value: &Value, variables: &VariableMap) -> Value {
    match value {
        Value::String(text) => Value::String(substitute_str(text, variables)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute(item, variables))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), substitute(item, variables)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

pub fn substitute_str(text: &str, variables: &VariableMap) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| match variables.get(&caps[1]) {
            Some(replacement) if !replacement.is_empty() => replacement.clone(),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

fn collect_placeholders(value: &Value, names: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            for caps in PLACEHOLDER.captures_iter(text) {
                let name = caps[1].to_string();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Value::Array(items) => items
            .iter()
            .for_each(|item| collect_placeholders(item, names)),
        Value::Object(map) => map
            .values()
            .for_each(|item| collect_placeholders(item, names)),
        _ => {}
    }
}

fn prompt_button(title: &str, prompt: &str) -> Value {
    json!({
        "type": "Action.Submit",
        "title": title,
        "data": {
            "action": "executePrompt",
            "prompt": prompt
        }
    })
}

fn builtin_templates() -> Vec<CardTemplate> {
    vec![
        CardTemplate::new(
            "welcome",
            json!({
                "type": "AdaptiveCard",
                "version": CARD_SCHEMA_VERSION,
                "body": [
                    {
                        "type": "TextBlock",
                        "size": "Large",
                        "weight": "Bolder",
                        "text": "Welcome to Copilot in Azure!"
                    },
                    {
                        "type": "TextBlock",
                        "text": "I can help you with Azure cloud services using interactive cards for a better experience.",
                        "wrap": true
                    },
                    {
                        "type": "TextBlock",
                        "text": "Choose a prompt to get started or type your own message:",
                        "wrap": true,
                        "spacing": "Medium"
                    },
                    {
                        "type": "ActionSet",
                        "actions": [
                            prompt_button(
                                "Generate a KQL query",
                                "Generate a KQL query to list all virtual machines in my Azure subscription"
                            ),
                            prompt_button("Show Azure VM management", "I need to restart some Azure VMs"),
                            prompt_button(
                                "Create a storage account",
                                "Show me how to create an Azure Storage Account with different methods"
                            ),
                            prompt_button(
                                "Explain Azure VMs",
                                "What are Azure Virtual Machines and how do they work?"
                            )
                        ]
                    }
                ]
            }),
        ),
        CardTemplate::new(
            "weather",
            json!({
                "type": "AdaptiveCard",
                "version": CARD_SCHEMA_VERSION,
                "body": [
                    {
                        "type": "TextBlock",
                        "size": "Medium",
                        "weight": "Bolder",
                        "text": "Weather for ${location}"
                    },
                    {
                        "type": "ColumnSet",
                        "columns": [
                            {
                                "type": "Column",
                                "width": "auto",
                                "items": [
                                    {"type": "Image", "url": "${weatherIconUrl}", "size": "Small"}
                                ]
                            },
                            {
                                "type": "Column",
                                "width": "stretch",
                                "items": [
                                    {
                                        "type": "TextBlock",
                                        "text": "${temperature}°C",
                                        "size": "ExtraLarge",
                                        "weight": "Bolder"
                                    },
                                    {"type": "TextBlock", "text": "${weatherDescription}", "spacing": "None"}
                                ]
                            }
                        ]
                    },
                    {
                        "type": "FactSet",
                        "facts": [
                            {"title": "Humidity", "value": "${humidity}%"},
                            {"title": "Wind", "value": "${windSpeed} km/h"}
                        ]
                    }
                ]
            }),
        ),
        CardTemplate::new(
            "todoList",
            json!({
                "type": "AdaptiveCard",
                "version": CARD_SCHEMA_VERSION,
                "body": [
                    {"type": "TextBlock", "size": "Medium", "weight": "Bolder", "text": "To-Do List"},
                    {"type": "Input.Text", "id": "newTodo", "placeholder": "Add a new task"},
                    {
                        "type": "ActionSet",
                        "actions": [
                            {"type": "Action.Submit", "title": "Add Task", "data": {"action": "addTodo"}}
                        ]
                    },
                    {"type": "Container", "id": "todoItems", "items": []}
                ]
            }),
        ),
        CardTemplate::new(
            "quiz",
            json!({
                "type": "AdaptiveCard",
                "version": CARD_SCHEMA_VERSION,
                "body": [
                    {"type": "TextBlock", "size": "Medium", "weight": "Bolder", "text": "${quizTitle}"},
                    {"type": "TextBlock", "text": "${quizQuestion}", "wrap": true},
                    {
                        "type": "Input.ChoiceSet",
                        "id": "quizAnswer",
                        "style": "expanded",
                        "isMultiSelect": false,
                        "choices": []
                    }
                ],
                "actions": [
                    {"type": "Action.Submit", "title": "Submit Answer", "data": {"action": "submitQuiz"}}
                ]
            }),
        ),
        CardTemplate::new(
            "error",
            json!({
                "type": "AdaptiveCard",
                "version": CARD_SCHEMA_VERSION,
                "body": [
                    {
                        "type": "TextBlock",
                        "size": "Medium",
                        "weight": "Bolder",
                        "text": "Error",
                        "color": "Attention"
                    },
                    {"type": "TextBlock", "text": "${errorMessage}", "wrap": true}
                ]
            }),
        ),
        CardTemplate::new(
            "thankYou",
            json!({
                "type": "AdaptiveCard",
                "version": CARD_SCHEMA_VERSION,
                "body": [
                    {
                        "type": "TextBlock",
                        "size": "Medium",
                        "weight": "Bolder",
                        "text": "${title}",
                        "color": "Good"
                    },
                    {"type": "TextBlock", "text": "${message}", "wrap": true}
                ]
            }),
        ),
    ]
}
