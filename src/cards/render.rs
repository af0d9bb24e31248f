//! Rendering boundary for card documents.
//!
//! Visual layout belongs to whatever implements [`CardRenderer`]. The crate
//! ships [`TextRenderer`], an indented plain-text outline that is enough for a
//! terminal session: it lists the card's content, its inputs, and numbered
//! controls the user can activate.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::CardDocument;
use crate::actions::ActionPayload;

/// Cosmetic settings handed to a renderer. Nothing here changes behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostConfig {
    pub font_family: String,
    pub container_styles: BTreeMap<String, ContainerStyle>,
    pub spacing: Spacing,
    pub font_sizes: FontSizes,
    pub max_actions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStyle {
    pub background_color: String,
    pub foreground: String,
    pub subtle: String,
}

impl ContainerStyle {
    fn new(background_color: &str, foreground: &str, subtle: &str) -> Self {
        Self {
            background_color: background_color.to_string(),
            foreground: foreground.to_string(),
            subtle: subtle.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Spacing {
    pub small: u16,
    pub default: u16,
    pub medium: u16,
    pub large: u16,
    pub extra_large: u16,
}

impl Default for Spacing {
    fn default() -> Self {
        Self {
            small: 4,
            default: 8,
            medium: 12,
            large: 16,
            extra_large: 24,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontSizes {
    pub small: u16,
    pub default: u16,
    pub medium: u16,
    pub large: u16,
    pub extra_large: u16,
}

impl Default for FontSizes {
    fn default() -> Self {
        Self {
            small: 14,
            default: 17,
            medium: 20,
            large: 23,
            extra_large: 26,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        let white = "#FFFFFF";
        let container_styles = BTreeMap::from([
            (
                "default".to_string(),
                ContainerStyle::new("#FFFFFF", "#000000", "#767676"),
            ),
            (
                "emphasis".to_string(),
                ContainerStyle::new("#F0F0F0", "#000000", "#767676"),
            ),
            ("accent".to_string(), ContainerStyle::new("#0070f3", white, white)),
            ("good".to_string(), ContainerStyle::new("#10b981", white, white)),
            ("attention".to_string(), ContainerStyle::new("#f59e0b", white, white)),
            ("warning".to_string(), ContainerStyle::new("#f59e0b", white, white)),
            ("remove".to_string(), ContainerStyle::new("#ef4444", white, white)),
        ]);

        Self {
            font_family: "sans-serif".to_string(),
            container_styles,
            spacing: Spacing::default(),
            font_sizes: FontSizes::default(),
            max_actions: 5,
        }
    }
}

impl HostConfig {
    /// Columns of indentation per nesting level in text output.
    pub fn indent_width(&self) -> usize {
        usize::from(self.spacing.default / 4).max(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlKind {
    /// Sends `data` merged with the card's input values to the dispatcher.
    Submit { data: Map<String, Value> },
    OpenUrl { url: String },
    ToggleVisibility { targets: Vec<String> },
    ShowCard { card: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardControl {
    pub title: String,
    pub kind: ControlKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    Text { multiline: bool },
    Choice { choices: Vec<(String, String)>, multi: bool },
    Toggle { value_on: String, value_off: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardInput {
    pub id: String,
    pub label: String,
    pub kind: InputKind,
    pub default_value: Option<String>,
}

/// What activating a control asks the host to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    /// Goes to the action dispatcher.
    Submit(ActionPayload),
    /// Handled natively by the host.
    OpenUrl(String),
    /// Handled natively: flip visibility of these element ids.
    ToggleVisibility(Vec<String>),
    /// Handled natively: show the nested card inline.
    ShowCard(CardDocument),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedCard {
    pub lines: Vec<String>,
    pub controls: Vec<CardControl>,
    pub inputs: Vec<CardInput>,
}

impl RenderedCard {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Activates control `index` (zero based). `values` are the user's input
    /// values keyed by input id; blank values are left out of the payload.
    pub fn activate(&self, index: usize, values: &HashMap<String, String>) -> Option<Interaction> {
        let control = self.controls.get(index)?;
        let interaction = match &control.kind {
            ControlKind::Submit { data } => {
                let mut payload = ActionPayload::from(data.clone());
                for input in &self.inputs {
                    let value = values
                        .get(&input.id)
                        .cloned()
                        .or_else(|| input.default_value.clone());
                    if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
                        payload.insert(input.id.clone(), value);
                    }
                }
                Interaction::Submit(payload)
            }
            ControlKind::OpenUrl { url } => Interaction::OpenUrl(url.clone()),
            ControlKind::ToggleVisibility { targets } => {
                Interaction::ToggleVisibility(targets.clone())
            }
            ControlKind::ShowCard { card } => {
                Interaction::ShowCard(CardDocument::from_value(card.clone())?)
            }
        };
        Some(interaction)
    }
}

pub trait CardRenderer {
    fn render(&self, card: &CardDocument, host: &HostConfig) -> RenderedCard;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl CardRenderer for TextRenderer {
    fn render(&self, card: &CardDocument, host: &HostConfig) -> RenderedCard {
        let mut out = Outline {
            host,
            rendered: RenderedCard::default(),
        };
        if let Some(body) = card.as_value().get("body").and_then(Value::as_array) {
            out.elements(body, 0);
        }
        if let Some(actions) = card.as_value().get("actions").and_then(Value::as_array) {
            out.actions(actions, 0);
        }
        out.rendered
    }
}

/// Returns a copy of `card` with the `isVisible` flag of each target flipped.
pub fn toggle_visibility(card: &CardDocument, targets: &[String]) -> CardDocument {
    let mut value = card.as_value().clone();
    flip_visibility(&mut value, targets);
    CardDocument::from_value(value).unwrap_or_else(|| card.clone())
}

fn flip_visibility(value: &mut Value, targets: &[String]) {
    match value {
        Value::Object(map) => {
            let matches = map
                .get("id")
                .and_then(Value::as_str)
                .is_some_and(|id| targets.iter().any(|target| target == id));
            if matches {
                let visible = map.get("isVisible").and_then(Value::as_bool).unwrap_or(true);
                map.insert("isVisible".to_string(), Value::Bool(!visible));
            }
            map.values_mut()
                .for_each(|child| flip_visibility(child, targets));
        }
        Value::Array(items) => items
            .iter_mut()
            .for_each(|child| flip_visibility(child, targets)),
        _ => {}
    }
}

struct Outline<'a> {
    host: &'a HostConfig,
    rendered: RenderedCard,
}

fn str_field<'v>(element: &'v Value, key: &str) -> Option<&'v str> {
    element.get(key).and_then(Value::as_str)
}

impl Outline<'_> {
    fn push(&mut self, depth: usize, text: impl AsRef<str>) {
        let indent = " ".repeat(depth * self.host.indent_width());
        for line in text.as_ref().lines() {
            self.rendered.lines.push(format!("{indent}{line}"));
        }
    }

    fn elements(&mut self, elements: &[Value], depth: usize) {
        for element in elements {
            if element.get("isVisible").and_then(Value::as_bool) == Some(false) {
                continue;
            }
            self.element(element, depth);
        }
    }

    fn element(&mut self, element: &Value, depth: usize) {
        let kind = str_field(element, "type").unwrap_or_default();
        match kind {
            "TextBlock" => {
                let text = str_field(element, "text").unwrap_or_default();
                if text.is_empty() {
                    return;
                }
                let heading = str_field(element, "weight") == Some("Bolder")
                    && matches!(
                        str_field(element, "size"),
                        Some("Medium" | "Large" | "ExtraLarge")
                    );
                if heading {
                    self.push(depth, format!("== {text} =="));
                } else {
                    self.push(depth, text);
                }
            }
            "RichTextBlock" => {
                let text: String = element
                    .get("inlines")
                    .and_then(Value::as_array)
                    .map(|inlines| {
                        inlines
                            .iter()
                            .filter_map(|inline| inline.as_str().or_else(|| str_field(inline, "text")))
                            .collect()
                    })
                    .unwrap_or_default();
                if !text.is_empty() {
                    self.push(depth, text);
                }
            }
            "Image" => {
                let label = str_field(element, "altText")
                    .or_else(|| str_field(element, "url"))
                    .unwrap_or("image");
                self.push(depth, format!("[image] {label}"));
            }
            "ImageSet" => {
                if let Some(images) = element.get("images").and_then(Value::as_array) {
                    self.elements(images, depth);
                }
            }
            "FactSet" => {
                for fact in element
                    .get("facts")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                {
                    let title = str_field(fact, "title").unwrap_or_default();
                    let value = str_field(fact, "value").unwrap_or_default();
                    self.push(depth, format!("{title}: {value}"));
                }
            }
            "ColumnSet" => {
                for column in element
                    .get("columns")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                {
                    if column.get("isVisible").and_then(Value::as_bool) == Some(false) {
                        continue;
                    }
                    if let Some(items) = column.get("items").and_then(Value::as_array) {
                        self.elements(items, depth + 1);
                    }
                }
            }
            "Container" | "Column" => {
                if let Some(items) = element.get("items").and_then(Value::as_array) {
                    self.elements(items, depth);
                }
            }
            "ActionSet" => {
                if let Some(actions) = element.get("actions").and_then(Value::as_array) {
                    self.actions(actions, depth);
                }
            }
            "Input.Text" | "Input.Number" | "Input.Date" | "Input.Time" => {
                let multiline = element.get("isMultiline").and_then(Value::as_bool) == Some(true);
                self.input(element, depth, InputKind::Text { multiline });
            }
            "Input.Toggle" => {
                let value_on = str_field(element, "valueOn").unwrap_or("true").to_string();
                let value_off = str_field(element, "valueOff").unwrap_or("false").to_string();
                self.input(element, depth, InputKind::Toggle { value_on, value_off });
            }
            "Input.ChoiceSet" => {
                let choices: Vec<(String, String)> = element
                    .get("choices")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .map(|choice| {
                        let value = str_field(choice, "value").unwrap_or_default();
                        let title = str_field(choice, "title").unwrap_or(value);
                        (title.to_string(), value.to_string())
                    })
                    .collect();
                let multi = element.get("isMultiSelect").and_then(Value::as_bool) == Some(true);
                self.input(element, depth, InputKind::Choice { choices, multi });
            }
            other => {
                debug!(element = other, "unsupported card element");
                if let Some(items) = element.get("items").and_then(Value::as_array) {
                    self.elements(items, depth);
                }
            }
        }
    }

    fn input(&mut self, element: &Value, depth: usize, kind: InputKind) {
        let Some(id) = str_field(element, "id") else {
            debug!("card input without an id is ignored");
            return;
        };
        let label = str_field(element, "label")
            .or_else(|| str_field(element, "title"))
            .or_else(|| str_field(element, "placeholder"))
            .unwrap_or(id)
            .to_string();
        let default_value = match element.get("value") {
            Some(Value::String(value)) => Some(value.clone()),
            Some(Value::Number(value)) => Some(value.to_string()),
            _ => None,
        };

        self.push(depth, format!("[{id}] {label}"));
        if let InputKind::Choice { choices, .. } = &kind {
            for (title, value) in choices {
                self.push(depth + 1, format!("- {title} ({value})"));
            }
        }

        self.rendered.inputs.push(CardInput {
            id: id.to_string(),
            label,
            kind,
            default_value,
        });
    }

    fn actions(&mut self, actions: &[Value], depth: usize) {
        for action in actions.iter().take(self.host.max_actions) {
            let title = str_field(action, "title").unwrap_or("Submit").to_string();
            let kind = match str_field(action, "type").unwrap_or_default() {
                "Action.Submit" | "Action.Execute" => ControlKind::Submit {
                    data: action
                        .get("data")
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default(),
                },
                "Action.OpenUrl" => ControlKind::OpenUrl {
                    url: str_field(action, "url").unwrap_or_default().to_string(),
                },
                "Action.ToggleVisibility" => ControlKind::ToggleVisibility {
                    targets: action
                        .get("targetElements")
                        .and_then(Value::as_array)
                        .into_iter()
                        .flatten()
                        .filter_map(|target| {
                            target
                                .as_str()
                                .or_else(|| str_field(target, "elementId"))
                                .map(str::to_string)
                        })
                        .collect(),
                },
                "Action.ShowCard" => ControlKind::ShowCard {
                    card: action.get("card").cloned().unwrap_or(Value::Null),
                },
                other => {
                    debug!(action = other, "unsupported card action type");
                    continue;
                }
            };
            let number = self.rendered.controls.len() + 1;
            self.push(depth, format!("({number}) {title}"));
            self.rendered.controls.push(CardControl { title, kind });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{resolve, VariableMap};
    use serde_json::json;

    fn card(value: Value) -> CardDocument {
        CardDocument::from_value(value).expect("card")
    }

    fn render(card: &CardDocument) -> RenderedCard {
        TextRenderer.render(card, &HostConfig::default())
    }

    #[test]
    fn renders_welcome_template_with_prompt_controls() {
        let welcome = resolve("welcome", &VariableMap::new()).expect("welcome");
        let rendered = render(&welcome);
        assert_eq!(rendered.lines[0], "== Welcome to Copilot in Azure! ==");
        assert_eq!(rendered.controls.len(), 4);
        assert!(rendered.text().contains("(1) Generate a KQL query"));

        match rendered.activate(1, &HashMap::new()) {
            Some(Interaction::Submit(payload)) => {
                assert_eq!(payload.action(), Some("executePrompt"));
                assert_eq!(
                    payload.text("prompt").as_deref(),
                    Some("I need to restart some Azure VMs")
                );
            }
            other => panic!("expected submit, got {other:?}"),
        }
    }

    #[test]
    fn submit_merges_input_values() {
        let todo = resolve("todoList", &VariableMap::new()).expect("todoList");
        let rendered = render(&todo);
        assert_eq!(rendered.inputs.len(), 1);
        assert_eq!(rendered.inputs[0].id, "newTodo");

        let values = HashMap::from([("newTodo".to_string(), "buy milk".to_string())]);
        let Some(Interaction::Submit(payload)) = rendered.activate(0, &values) else {
            panic!("expected submit");
        };
        assert_eq!(payload.action(), Some("addTodo"));
        assert_eq!(payload.text("newTodo").as_deref(), Some("buy milk"));

        let Some(Interaction::Submit(empty)) = rendered.activate(0, &HashMap::new()) else {
            panic!("expected submit");
        };
        assert!(empty.get("newTodo").is_none());
    }

    #[test]
    fn native_controls_do_not_submit() {
        let doc = card(json!({
            "type": "AdaptiveCard",
            "body": [{"type": "TextBlock", "id": "details", "text": "Hidden", "isVisible": false}],
            "actions": [
                {"type": "Action.OpenUrl", "title": "Docs", "url": "https://adaptivecards.io"},
                {"type": "Action.ToggleVisibility", "title": "More", "targetElements": ["details"]},
                {"type": "Action.ShowCard", "title": "Nested", "card": {"type": "AdaptiveCard", "body": []}}
            ]
        }));
        let rendered = render(&doc);
        assert!(!rendered.text().contains("Hidden"));
        assert_eq!(
            rendered.activate(0, &HashMap::new()),
            Some(Interaction::OpenUrl("https://adaptivecards.io".to_string()))
        );
        let Some(Interaction::ToggleVisibility(targets)) = rendered.activate(1, &HashMap::new())
        else {
            panic!("expected toggle");
        };
        let shown = render(&toggle_visibility(&doc, &targets));
        assert!(shown.text().contains("Hidden"));
        assert!(matches!(
            rendered.activate(2, &HashMap::new()),
            Some(Interaction::ShowCard(_))
        ));
        assert_eq!(rendered.activate(3, &HashMap::new()), None);
    }

    #[test]
    fn renders_facts_columns_and_choices() {
        let doc = card(json!({
            "type": "AdaptiveCard",
            "body": [
                {"type": "ColumnSet", "columns": [
                    {"type": "Column", "items": [{"type": "Image", "url": "https://example.com/i.png"}]},
                    {"type": "Column", "items": [{"type": "TextBlock", "text": "21°C"}]}
                ]},
                {"type": "FactSet", "facts": [{"title": "Humidity", "value": "60%"}]},
                {"type": "Input.ChoiceSet", "id": "rating", "choices": [
                    {"title": "Excellent", "value": "5"},
                    {"title": "Poor", "value": "2"}
                ]}
            ]
        }));
        let rendered = render(&doc);
        assert_eq!(
            rendered.lines,
            vec![
                "  [image] https://example.com/i.png",
                "  21°C",
                "Humidity: 60%",
                "[rating] rating",
                "  - Excellent (5)",
                "  - Poor (2)",
            ]
        );
        assert!(matches!(
            rendered.inputs[0].kind,
            InputKind::Choice { multi: false, .. }
        ));
    }

    #[test]
    fn max_actions_caps_controls() {
        let actions: Vec<Value> = (0..8)
            .map(|i| json!({"type": "Action.Submit", "title": format!("a{i}"), "data": {"action": "x"}}))
            .collect();
        let doc = card(json!({"type": "AdaptiveCard", "actions": actions}));
        let host = HostConfig {
            max_actions: 3,
            ..HostConfig::default()
        };
        assert_eq!(TextRenderer.render(&doc, &host).controls.len(), 3);
    }
}
