//! Citation rendering
//!
//! Rewrites the agent's inline `%[n]%` markers into superscripts and appends a
//! numbered reference list. Reference numbers come from enumerating
//! citations, then their retrieved references, in order; they are never
//! checked against the `n` the agent wrote into the text.

use std::sync::OnceLock;

use regex::Regex;
use shared_types::{Citation, CitationEntry};

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"%\[(\d+)\]%").expect("static citation marker regex"))
}

/// Rewrite every `%[n]%` marker as `<sup>[n]</sup>`.
pub fn rewrite_markers(text: &str) -> String {
    marker_pattern()
        .replace_all(text, "<sup>[$1]</sup>")
        .into_owned()
}

/// Reference lines `[k] <source>`, k running across all citations from 1.
pub fn reference_lines(citations: &[Citation]) -> Vec<String> {
    citations
        .iter()
        .flat_map(|citation| citation.retrieved_references.iter())
        .enumerate()
        .map(|(index, reference)| {
            format!(
                "[{}] {}",
                index + 1,
                reference.location.source_uri().unwrap_or_default()
            )
        })
        .collect()
}

/// Display text for a chat bubble. With no citations the text is returned
/// unchanged.
pub fn render_citations(text: &str, citations: &[Citation]) -> String {
    if citations.is_empty() {
        return text.to_string();
    }

    let mut rendered = rewrite_markers(text);
    rendered.push('\n');
    for line in reference_lines(citations) {
        rendered.push_str("\n<br>");
        rendered.push_str(&line);
    }
    rendered
}

/// Entries for the citations side panel, numbered like [`reference_lines`].
pub fn citation_entries(citations: &[Citation]) -> Vec<CitationEntry> {
    let mut entries = Vec::new();
    let mut number = 1;
    for citation in citations {
        for reference in &citation.retrieved_references {
            entries.push(CitationEntry {
                number,
                generated_response_part: citation.generated_response_part.clone(),
                retrieved_reference: serde_json::to_value(reference)
                    .unwrap_or(serde_json::Value::Null),
            });
            number += 1;
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::RetrievedReference;

    fn citation(uris: &[&str]) -> Citation {
        Citation {
            generated_response_part: json!({"textResponsePart": {"text": "span"}}),
            retrieved_references: uris.iter().map(|u| RetrievedReference::s3(*u)).collect(),
        }
    }

    #[test]
    fn test_no_citations_is_identity() {
        let text = "Value %[1]%. Nothing else";
        assert_eq!(render_citations(text, &[]), text);
    }

    #[test]
    fn test_single_citation_two_references() {
        let rendered = render_citations(
            "Value %[1]%.",
            &[citation(&["s3://bucket/a.pdf", "s3://bucket/b.pdf"])],
        );
        assert_eq!(
            rendered,
            "Value <sup>[1]</sup>.\n\n<br>[1] s3://bucket/a.pdf\n<br>[2] s3://bucket/b.pdf"
        );
    }

    #[test]
    fn test_numbering_runs_across_citations() {
        let lines = reference_lines(&[citation(&["s3://a"]), citation(&["s3://b", "s3://c"])]);
        assert_eq!(lines, vec!["[1] s3://a", "[2] s3://b", "[3] s3://c"]);
    }

    #[test]
    fn test_numbering_independent_of_markers() {
        let rendered = render_citations(
            "Only %[7]% appears, twice %[7]%",
            &[citation(&["s3://a"]), citation(&["s3://b"])],
        );
        assert!(rendered.starts_with("Only <sup>[7]</sup> appears, twice <sup>[7]</sup>"));
        assert!(rendered.ends_with("\n<br>[1] s3://a\n<br>[2] s3://b"));
    }

    #[test]
    fn test_markers_require_digits() {
        assert_eq!(rewrite_markers("%[x]% and %[]%"), "%[x]% and %[]%");
        assert_eq!(rewrite_markers("%[12]%"), "<sup>[12]</sup>");
    }

    #[test]
    fn test_reference_without_location_keeps_numbering() {
        let mut cited = citation(&["s3://a"]);
        cited.retrieved_references.push(RetrievedReference::default());
        cited
            .retrieved_references
            .push(RetrievedReference::s3("s3://c"));
        assert_eq!(
            reference_lines(&[cited]),
            vec!["[1] s3://a", "[2] ", "[3] s3://c"]
        );
    }

    #[test]
    fn test_citation_entries_one_per_reference() {
        let entries = citation_entries(&[citation(&["s3://a", "s3://b"]), citation(&["s3://c"])]);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].number, 3);
        assert_eq!(
            entries[1].retrieved_reference["location"]["s3Location"]["uri"],
            "s3://b"
        );
        assert_eq!(
            entries[0].generated_response_part["textResponsePart"]["text"],
            "span"
        );
    }

    #[test]
    fn test_citation_entry_keeps_reference_verbatim() {
        let raw = json!({
            "content": {"text": "Logbook method"},
            "extra": {"score": 0.9},
            "location": {"newKindLocation": {"uri": "x://y"}, "type": "NEW_KIND"},
            "metadata": {"x-amz-bedrock-kb-chunk-id": "c-1"}
        });
        let cited = Citation {
            generated_response_part: json!({}),
            retrieved_references: vec![serde_json::from_value(raw.clone()).unwrap()],
        };

        let entries = citation_entries(std::slice::from_ref(&cited));
        assert_eq!(entries[0].retrieved_reference, raw);
        assert_eq!(reference_lines(&[cited]), vec!["[1] "]);
    }
}
