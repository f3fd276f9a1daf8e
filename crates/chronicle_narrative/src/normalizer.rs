//! Normalizer for JSON emitted by language models.
//!
//! Model output that is meant to be JSON regularly arrives wrapped in Markdown
//! fences, surrounded by commentary, or with integers written as `05`. The
//! pre-pass here repairs those malformations before anything is parsed:
//!
//! 1. Unwrap the first fenced code block, closed or not.
//! 2. Cut out the first balanced `{ ... }` object.
//! 3. Rewrite integers with leading zeros (`05` to `5`) outside string literals.

use chronicle_core::{ChapterContent, ChapterResponse};
use chronicle_error::{ChronicleResult, JsonError};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

/// Opening fence with optional language tag, then the body up to the closing fence or the end.
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)(?:```|\z)").expect("Valid fence regex")
});

/// Run the full pre-pass over raw model text.
///
/// # Examples
///
/// ```
/// use chronicle_narrative::normalize_llm_json;
///
/// let fixed = normalize_llm_json("```json\n{\"chapter\": 05, \"title\": \"x\"}\n```").unwrap();
/// assert_eq!(fixed, "{\"chapter\": 5, \"title\": \"x\"}");
/// ```
pub fn normalize_llm_json(raw: &str) -> ChronicleResult<String> {
    let unfenced = strip_code_fences(raw);
    let object = extract_object(&unfenced).unwrap_or(unfenced);
    Ok(fix_leading_zeros(&object))
}

/// Normalize and deserialize model text.
pub fn parse_normalized<T: DeserializeOwned>(raw: &str) -> ChronicleResult<T> {
    let normalized = normalize_llm_json(raw)?;
    serde_json::from_str(&normalized).map_err(|e| {
        tracing::debug!(error = %e, length = raw.len(), "Model output is not valid JSON");
        JsonError::new(format!("Failed to parse model output: {}", e)).into()
    })
}

/// Parse backend output into chapter fields.
pub fn parse_chapter_content(response: &ChapterResponse) -> ChronicleResult<ChapterContent> {
    match response {
        ChapterResponse::Text(text) => parse_normalized(text),
        ChapterResponse::Json(value) => serde_json::from_value(value.clone())
            .map_err(|e| JsonError::new(format!("Chapter JSON has wrong shape: {}", e)).into()),
    }
}

/// Content of the first fenced code block, or the trimmed input when there is none.
///
/// A missing closing fence (truncated response) keeps everything after the opening one.
pub fn strip_code_fences(raw: &str) -> String {
    match FENCE.captures(raw).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim().to_string(),
        None => raw.trim().to_string(),
    }
}

/// The first balanced `{ ... }` object, ignoring braces inside strings.
fn extract_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(text[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Strip illegal leading zeros from the integer part of numbers outside strings.
///
/// `05` becomes `5`, `-007` becomes `-7`; `0`, `0.5` and digits inside string
/// literals are left alone.
pub fn fix_leading_zeros(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escape_next = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if in_string {
            out.push(ch);
            if escape_next {
                escape_next = false;
            } else if ch == '\\' {
                escape_next = true;
            } else if ch == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if ch == '"' {
            in_string = true;
            out.push(ch);
            i += 1;
            continue;
        }

        let starts_number = ch.is_ascii_digit()
            || (ch == '-' && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()));
        let inside_token = out
            .chars()
            .last()
            .is_some_and(|prev| prev.is_ascii_alphanumeric() || prev == '.' || prev == '_');

        if starts_number && !inside_token {
            if ch == '-' {
                out.push('-');
                i += 1;
            }
            let digits_start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let digits: String = chars[digits_start..i].iter().collect();
            let trimmed = digits.trim_start_matches('0');
            out.push_str(if trimmed.is_empty() { "0" } else { trimmed });
            continue;
        }

        out.push(ch);
        i += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_leading_zero_integer_parses() {
        let value: Value = parse_normalized(r#"{"chapter": 05, "title": "x"}"#).unwrap();
        assert_eq!(value, json!({"chapter": 5, "title": "x"}));
    }

    #[test]
    fn test_fenced_output_parses() {
        let raw = "```json\n{\"title\": \"Night\", \"narrative\": \"It rained.\"}\n```";
        let value: Value = parse_normalized(raw).unwrap();
        assert_eq!(value["title"], "Night");
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{}"), "{}");
        assert_eq!(strip_code_fences("  {\"plain\": true} "), "{\"plain\": true}");
    }

    #[test]
    fn test_unterminated_fence_and_chatter() {
        let raw = "Sure! Here it is:\n```\n{\"a\": [01, 2]}\n";
        let value: Value = parse_normalized(raw).unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));

        let chatty = "The chapter follows. {\"a\": {\"b\": \"}\"}} Hope that helps!";
        let value: Value = parse_normalized(chatty).unwrap();
        assert_eq!(value, json!({"a": {"b": "}"}}));
    }

    #[test]
    fn test_leading_zero_fix_leaves_valid_numbers_and_strings() {
        assert_eq!(fix_leading_zeros("[0, 0.5, -05, 007, 10]"), "[0, 0.5, -5, 7, 10]");
        assert_eq!(
            fix_leading_zeros(r#"{"time": "09:05", "n": 08}"#),
            r#"{"time": "09:05", "n": 8}"#
        );
        assert_eq!(
            fix_leading_zeros(r#"{"q": "say \"01\"", "e": 1e05}"#),
            r#"{"q": "say \"01\"", "e": 1e05}"#
        );
    }

    #[test]
    fn test_parse_chapter_content_from_text_and_json() {
        let text = ChapterResponse::Text(
            "```json\n{\"chapterNumber\": 03, \"title\": \"T\", \"narrative\": \"N\", \"keyQuotes\": [\"q\"]}\n```"
                .to_string(),
        );
        let content = parse_chapter_content(&text).unwrap();
        assert_eq!(content.chapter_number, Some(3));
        assert_eq!(content.key_quotes, vec!["q".to_string()]);

        let structured = ChapterResponse::Json(json!({"title": "T", "narrative": "N"}));
        assert_eq!(parse_chapter_content(&structured).unwrap().title, "T");
    }

    #[test]
    fn test_garbage_is_an_error() {
        let missing = ChapterResponse::Text("I cannot help with that.".to_string());
        assert!(parse_chapter_content(&missing).is_err());
    }
}
