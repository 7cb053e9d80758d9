use llm_client::{LlmError, LlmResult};

/// Shortest output accepted as an analysis, in characters
pub const MIN_ANALYSIS_CHARS: usize = 50;

/// Markup that only appears when the upstream response was mangled into HTML
const HTML_MARKERS: &[&str] = &["<div", "</div>", "<span", "</span>", "<html", "<body", "<script", "<style"];

/// Template leftovers and encoding debris seen in corrupted responses
const CORRUPTED_PLACEHOLDERS: &[&str] = &[
    "{user_query}",
    "{rag_context}",
    "{context_text}",
    "{company_info",
    "[object Object]",
    "$nan",
    "\u{FFFD}",
];

/// Trimmed model output, or `MalformedResponse` naming the first problem found.
pub fn validate_response(raw: &str) -> LlmResult<String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(LlmError::MalformedResponse("empty response".to_string()));
    }

    let lowered = text.to_lowercase();
    if let Some(marker) = HTML_MARKERS.iter().find(|m| lowered.contains(*m)) {
        return Err(LlmError::MalformedResponse(format!("contains HTML fragment '{}'", marker)));
    }
    if let Some(placeholder) = CORRUPTED_PLACEHOLDERS
        .iter()
        .find(|p| text.contains(*p) || lowered.contains(*p))
    {
        return Err(LlmError::MalformedResponse(format!(
            "contains corrupted placeholder '{}'",
            placeholder
        )));
    }

    let length = text.chars().count();
    if length < MIN_ANALYSIS_CHARS {
        return Err(LlmError::MalformedResponse(format!(
            "response too short ({} characters)",
            length
        )));
    }

    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str =
        "Revenue declined 10% in 2022 after strong growth in 2021, pointing to slowing demand.";

    fn reason(raw: &str) -> String {
        match validate_response(raw) {
            Err(LlmError::MalformedResponse(reason)) => reason,
            other => panic!("expected malformed response, got {:?}", other),
        }
    }

    #[test]
    fn test_accepts_and_trims_normal_analysis() {
        let padded = format!("\n  {}  \n", GOOD);
        assert_eq!(validate_response(&padded).unwrap(), GOOD);
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert_eq!(reason(""), "empty response");
        assert_eq!(reason(" \n\t "), "empty response");
    }

    #[test]
    fn test_rejects_html_fragments() {
        let html = format!("<DIV class=\"card\">{}</DIV>", GOOD);
        assert!(reason(&html).contains("HTML fragment"));
    }

    #[test]
    fn test_rejects_corrupted_placeholders() {
        let leaked = format!("{} Question: {{user_query}}", GOOD);
        assert!(reason(&leaked).contains("{user_query}"));
        let nan = format!("{} Revenue was $nan billion.", GOOD);
        assert!(reason(&nan).contains("placeholder"));
    }

    #[test]
    fn test_rejects_short_output() {
        assert!(reason("Revenue fell.").contains("too short"));
        // exactly the minimum is accepted
        assert!(validate_response(&"a".repeat(MIN_ANALYSIS_CHARS)).is_ok());
    }
}
