//! Instruction sent ahead of every conversation.

use std::sync::LazyLock;

use serde_json::{json, Value};

use crate::cards::CARD_SCHEMA_VERSION;

const PREAMBLE: &str = "\
You are a helpful assistant that can answer with interactive Adaptive Cards.

Use an Adaptive Card when the answer is better presented as structured, interactive content:
- structured data such as forecasts, listings, or event details
- a set of options the user can pick from
- forms, surveys, quizzes, polls, or feedback requests
- rich media presentations

To answer with a card, put the card JSON in a fenced code block tagged json, like this:

```json
{CARD}
```

You may follow the card with a short plain-text explanation. Only the first json block is shown as a card.
Submit actions must carry a `data` object with an `action` field. Use `executePrompt` with a `prompt` field to offer follow-up questions.

Examples of cards you can create:";

const CLOSING: &str = "\
Cards support TextBlock, Image, ColumnSet, FactSet, Input elements, and actions. Use them where they help.

For regular answers that need no special formatting, reply with plain text.";

static SYSTEM_PROMPT: LazyLock<String> = LazyLock::new(build_system_prompt);

/// The full instruction, built once.
pub fn system_prompt() -> &'static str {
    SYSTEM_PROMPT.as_str()
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn build_system_prompt() -> String {
    let skeleton = json!({
        "type": "AdaptiveCard",
        "version": CARD_SCHEMA_VERSION,
        "body": [
            {"type": "TextBlock", "size": "Medium", "weight": "Bolder", "text": "Your title here"},
            {"type": "TextBlock", "text": "Your content here", "wrap": true}
        ]
    });

    let examples = [
        (
            "Simple information card",
            json!({
                "type": "AdaptiveCard",
                "version": CARD_SCHEMA_VERSION,
                "body": [
                    {"type": "TextBlock", "size": "Medium", "weight": "Bolder", "text": "Information Card"},
                    {"type": "TextBlock", "text": "This is a simple information card with text content.", "wrap": true},
                    {"type": "FactSet", "facts": [
                        {"title": "Fact 1", "value": "Value 1"},
                        {"title": "Fact 2", "value": "Value 2"}
                    ]}
                ]
            }),
        ),
        (
            "Card with columns and images",
            json!({
                "type": "AdaptiveCard",
                "version": CARD_SCHEMA_VERSION,
                "body": [
                    {"type": "TextBlock", "size": "Medium", "weight": "Bolder", "text": "Column Layout Card"},
                    {"type": "ColumnSet", "columns": [
                        {"type": "Column", "width": "auto", "items": [
                            {"type": "Image", "url": "https://adaptivecards.io/content/adaptive-card-50.png", "size": "Small"}
                        ]},
                        {"type": "Column", "width": "stretch", "items": [
                            {"type": "TextBlock", "text": "This card uses columns for layout", "wrap": true}
                        ]}
                    ]}
                ]
            }),
        ),
        (
            "Interactive card with inputs and actions",
            json!({
                "type": "AdaptiveCard",
                "version": CARD_SCHEMA_VERSION,
                "body": [
                    {"type": "TextBlock", "size": "Medium", "weight": "Bolder", "text": "Feedback Form"},
                    {"type": "TextBlock", "text": "Please rate your experience:", "wrap": true},
                    {"type": "Input.ChoiceSet", "id": "rating", "style": "expanded", "isMultiSelect": false, "choices": [
                        {"title": "Excellent", "value": "5"},
                        {"title": "Good", "value": "4"},
                        {"title": "Average", "value": "3"},
                        {"title": "Poor", "value": "2"},
                        {"title": "Very Poor", "value": "1"}
                    ]},
                    {"type": "Input.Text", "id": "comments", "placeholder": "Additional comments", "isMultiline": true}
                ],
                "actions": [
                    {"type": "Action.Submit", "title": "Submit Feedback", "data": {"action": "submitFeedback"}}
                ]
            }),
        ),
    ];

    let mut prompt = PREAMBLE.replace("{CARD}", &pretty(&skeleton));
    for (index, (title, card)) in examples.iter().enumerate() {
        prompt.push_str(&format!(
            "\n\n{}. {title}:\n```json\n{}\n```",
            index + 1,
            pretty(card)
        ));
    }
    prompt.push_str("\n\n");
    prompt.push_str(CLOSING);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::extract;

    #[test]
    fn prompt_embeds_parsable_examples() {
        let prompt = system_prompt();
        let card = extract(prompt).expect("first example parses");
        assert_eq!(card.title(), Some("Your title here"));
        assert_eq!(prompt.matches("```json\n").count(), 4);
        assert!(prompt.contains("submitFeedback"));
        assert!(!prompt.contains("{CARD}"));
    }
}
