//! Transcript assembly
//!
//! Produces the two artifacts of a turn: the chat bubble (envelope unwrapped,
//! citations rendered) and the side panels (citation entries, grouped trace).

use std::borrow::Cow;
use std::fmt::Write as _;

use serde_json::Value;
use shared_types::{ChatMessage, Citation, CitationEntry, RawTraceBucket, TraceView};

use crate::citations::{citation_entries, render_citations};
use crate::normalizer::InvocationOutput;
use crate::trace::{group_trace, TraceLayout};

const TRANSACTIONS_PANEL_TRIGGER: &str = "motor vehicle";

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledTurn {
    pub message: ChatMessage,
    pub citations: Vec<Citation>,
    pub citation_entries: Vec<CitationEntry>,
    pub trace: RawTraceBucket,
    pub trace_view: TraceView,
    pub show_transactions_panel: bool,
}

pub fn assemble_turn(output: InvocationOutput, layout: &TraceLayout) -> AssembledTurn {
    let InvocationOutput {
        output_text,
        citations,
        trace,
    } = output;

    let body = unwrap_embedded_result(&output_text);
    let content = render_citations(&body, &citations);
    let show_transactions_panel = mentions_transactions(&content);

    AssembledTurn {
        message: ChatMessage::assistant(content),
        citation_entries: citation_entries(&citations),
        trace_view: group_trace(&trace, layout),
        citations,
        trace,
        show_transactions_panel,
    }
}

/// The agent sometimes answers with `{"instruction": ..., "result": ...}`;
/// show only `result` then. Anything that does not parse is kept verbatim.
pub fn unwrap_embedded_result(text: &str) -> Cow<'_, str> {
    let Some(Value::Object(envelope)) = parse_lenient(text) else {
        return Cow::Borrowed(text);
    };
    if !envelope.contains_key("instruction") {
        return Cow::Borrowed(text);
    }
    match envelope.get("result") {
        Some(Value::String(result)) => Cow::Owned(result.clone()),
        Some(other) => Cow::Owned(other.to_string()),
        None => Cow::Borrowed(text),
    }
}

fn parse_lenient(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    // Raw newlines inside string values are common in agent output
    serde_json::from_str(&escape_control_chars_in_strings(text)).ok()
}

fn escape_control_chars_in_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if !in_string {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
            continue;
        }

        if escaped {
            escaped = false;
            out.push(ch);
            continue;
        }

        match ch {
            '\\' => {
                escaped = true;
                out.push(ch);
            }
            '"' => {
                in_string = false;
                out.push(ch);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }

    out
}

fn mentions_transactions(content: &str) -> bool {
    content.to_lowercase().contains(TRANSACTIONS_PANEL_TRIGGER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::{RetrievedReference, Role, TraceFragment, TracePhase};

    #[test]
    fn test_plain_text_kept() {
        assert_eq!(unwrap_embedded_result("Hello there"), "Hello there");
        assert_eq!(unwrap_embedded_result("{not json"), "{not json");
        assert_eq!(unwrap_embedded_result("42"), "42");
    }

    #[test]
    fn test_envelope_unwrapped_to_result() {
        let text = r#"{"instruction": "summarise", "result": "Your total is $48,123."}"#;
        assert_eq!(unwrap_embedded_result(text), "Your total is $48,123.");
    }

    #[test]
    fn test_envelope_with_raw_newlines_unwrapped() {
        let text = "{\"instruction\": \"list\", \"result\": \"line one\nline two\"}";
        assert_eq!(unwrap_embedded_result(text), "line one\nline two");
    }

    #[test]
    fn test_object_without_both_fields_kept() {
        let text = r#"{"result": "only result"}"#;
        assert_eq!(unwrap_embedded_result(text), text);
    }

    #[test]
    fn test_non_string_result_rendered_as_json() {
        let text = r#"{"instruction": "x", "result": {"count": 3}}"#;
        assert_eq!(unwrap_embedded_result(text), r#"{"count":3}"#);
    }

    #[test]
    fn test_assemble_turn_renders_message_and_panels() {
        let mut trace = RawTraceBucket::new();
        trace.push(
            TracePhase::Orchestration,
            TraceFragment(json!({"rationale": {"traceId": "o-0", "text": "thinking"}})),
        );
        let output = InvocationOutput {
            output_text: "Motor Vehicle expenses total %[1]%.".to_string(),
            citations: vec![Citation {
                generated_response_part: json!({}),
                retrieved_references: vec![RetrievedReference::s3("s3://tax/rules.pdf")],
            }],
            trace,
        };

        let turn = assemble_turn(output, &TraceLayout::default());
        assert_eq!(turn.message.role, Role::Assistant);
        assert_eq!(
            turn.message.content,
            "Motor Vehicle expenses total <sup>[1]</sup>.\n\n<br>[1] s3://tax/rules.pdf"
        );
        assert_eq!(turn.citation_entries.len(), 1);
        assert_eq!(turn.trace_view.step_count(), 1);
        assert!(turn.show_transactions_panel);
    }

    #[test]
    fn test_envelope_unwrapped_before_citations() {
        let output = InvocationOutput {
            output_text: r#"{"instruction": "i", "result": "See %[1]%"}"#.to_string(),
            citations: vec![Citation {
                generated_response_part: json!({}),
                retrieved_references: vec![RetrievedReference::s3("s3://a")],
            }],
            trace: RawTraceBucket::new(),
        };
        let turn = assemble_turn(output, &TraceLayout::default());
        assert_eq!(turn.message.content, "See <sup>[1]</sup>\n\n<br>[1] s3://a");
        assert!(!turn.show_transactions_panel);
    }
}
