//! Finds the card payload embedded in an assistant turn.
//!
//! The model is instructed to emit cards as a fenced block tagged `json`.
//! Only the first such block counts; everything else is commentary.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::CardDocument;

/// Info string that marks a fenced block as a card payload.
pub const CARD_FENCE_LANGUAGE: &str = "json";

static CARD_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```json[ \t]*\r?\n([\s\S]*?)\r?\n```").expect("card fence pattern is valid")
});

/// Result of splitting an assistant turn into card and commentary.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedTurn {
    pub card: Option<CardDocument>,
    /// Prose outside the card block. Only set when a card was found.
    pub commentary: Option<String>,
}

/// Returns the card carried by `text`, if any. Never fails: a missing block,
/// malformed JSON, or a non-object payload all yield `None`.
pub fn extract(text: &str) -> Option<CardDocument> {
    let (_, body) = first_fenced_block(text)?;
    parse_card(body)
}

/// Like [`extract`], also returning the prose around the card block.
pub fn split(text: &str) -> ExtractedTurn {
    let Some((span, body)) = first_fenced_block(text) else {
        return ExtractedTurn {
            card: None,
            commentary: None,
        };
    };

    let Some(card) = parse_card(body) else {
        return ExtractedTurn {
            card: None,
            commentary: None,
        };
    };

    let before = text[..span.start].trim();
    let after = text[span.end..].trim();
    let commentary = match (before.is_empty(), after.is_empty()) {
        (true, true) => None,
        (false, true) => Some(before.to_string()),
        (true, false) => Some(after.to_string()),
        (false, false) => Some(format!("{before}\n\n{after}")),
    };

    ExtractedTurn {
        card: Some(card),
        commentary,
    }
}

/// Cheap check used before committing to card rendering.
pub fn contains_card_fence(text: &str) -> bool {
    card_fence_start(text).is_some()
}

/// Byte offset of the first opening card fence, complete block or not.
/// Streaming hosts use it to stop echoing raw payload text.
pub fn card_fence_start(text: &str) -> Option<usize> {
    text.match_indices("```")
        .find(|(index, fence)| text[index + fence.len()..].starts_with(CARD_FENCE_LANGUAGE))
        .map(|(index, _)| index)
}

/// Byte range of the first card block, fences included, when its payload
/// is a card.
pub fn card_span(text: &str) -> Option<Range<usize>> {
    let (span, body) = first_fenced_block(text)?;
    parse_card(body).map(|_| span)
}

fn first_fenced_block(text: &str) -> Option<(Range<usize>, &str)> {
    let caps = CARD_FENCE.captures(text)?;
    let whole = caps.get(0)?;
    let body = caps.get(1)?;
    Some((whole.range(), body.as_str()))
}

fn parse_card(body: &str) -> Option<CardDocument> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => {
            let card = CardDocument::from_value(value);
            if card.is_none() {
                debug!("fenced payload parsed but is not a JSON object");
            }
            card
        }
        Err(err) => {
            debug!(error = %err, "failed to parse fenced card payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_text_has_no_card() {
        assert!(extract("no code here").is_none());
        assert!(extract("").is_none());
        assert!(!contains_card_fence("no code here"));
    }

    #[test]
    fn extracts_minimal_card() {
        let card = extract("```json\n{\"type\":\"AdaptiveCard\"}\n```").expect("card");
        assert_eq!(card.as_value(), &json!({"type": "AdaptiveCard"}));
    }

    #[test]
    fn malformed_payload_is_none() {
        assert!(extract("```json\n{\"type\": \"AdaptiveCard\",\n```").is_none());
        assert!(extract("```json\n\n```").is_none());
        assert!(extract("```json\n{\"unterminated\": true}").is_none());
    }

    #[test]
    fn non_object_payload_is_none() {
        assert!(extract("```json\n[1, 2, 3]\n```").is_none());
        assert!(extract("```json\n\"text\"\n```").is_none());
    }

    #[test]
    fn other_fence_languages_are_ignored() {
        let text = "```rust\nfn main() {}\n```\n\n```kql\nResources\n```";
        assert!(extract(text).is_none());
    }

    #[test]
    fn first_card_block_wins() {
        let text = concat!(
            "Here you go:\n",
            "```json\n{\"type\":\"AdaptiveCard\",\"body\":[{\"type\":\"TextBlock\",\"text\":\"first\"}]}\n```\n",
            "and another\n",
            "```json\n{\"type\":\"AdaptiveCard\",\"body\":[{\"type\":\"TextBlock\",\"text\":\"second\"}]}\n```"
        );
        let card = extract(text).expect("card");
        assert_eq!(card.title(), Some("first"));
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let card = extract("```json\r\n{\"type\":\"AdaptiveCard\"}\r\n```").expect("card");
        assert_eq!(card.card_type(), Some("AdaptiveCard"));
    }

    #[test]
    fn split_returns_commentary_around_card() {
        let text = "Intro line.\n```json\n{\"type\":\"AdaptiveCard\"}\n```\nTrailing note.";
        let turn = split(text);
        assert!(turn.card.is_some());
        assert_eq!(turn.commentary.as_deref(), Some("Intro line.\n\nTrailing note."));

        let bare = split("```json\n{\"type\":\"AdaptiveCard\"}\n```");
        assert!(bare.card.is_some());
        assert!(bare.commentary.is_none());

        let none = split("just words");
        assert_eq!(
            none,
            ExtractedTurn {
                card: None,
                commentary: None
            }
        );
    }

    #[test]
    fn fence_offsets_cover_partial_and_complete_blocks() {
        let partial = "Sure.\n```json\n{\"type\":";
        assert_eq!(card_fence_start(partial), Some(6));
        assert!(card_span(partial).is_none());
        assert_eq!(card_fence_start("```python\nprint()\n```"), None);

        let text = "Sure.\n```json\n{}\n```\nDone.";
        let span = card_span(text).expect("span");
        assert_eq!(&text[span.end..], "\nDone.");
        assert_eq!(span.start, 6);
        assert!(card_span("```json\n[1]\n```").is_none());
    }

    #[test]
    fn extraction_is_total_over_odd_inputs() {
        let inputs = [
            "```",
            "```json",
            "```json\n",
            "```json\n```",
            "``` json\n{}\n```",
            "\u{0}\u{feff}```json\n{}\n```",
            "```json\n{\"a\":\"\u{1F600}\"}\n```",
        ];
        for input in inputs {
            let _ = extract(input);
            let _ = split(input);
        }
        assert!(extract("\u{0}\u{feff}```json\n{}\n```").is_some());
    }
}
