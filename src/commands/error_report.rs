use std::fmt::Display;

use serde_json::Value;

/// Render any failure as a fenced block for the follow-up channel.
///
/// An error whose text embeds a JSON object (from the first `{` onward) is
/// pretty-printed in a `json` block. Anything else is fenced verbatim.
pub fn format_error(error: &dyn Display) -> String {
    let text = error.to_string();
    match extract_embedded_json(&text) {
        Some(pretty) => format!("```json\n{}\n```", pretty),
        None if text.trim().is_empty() => "```\nunknown error\n```".to_string(),
        None => format!("```\n{}\n```", text),
    }
}

pub fn extract_embedded_json(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let value: Value = serde_json::from_str(&text[start..]).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::to_string_pretty(&value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DirectoryError;

    #[test]
    fn upstream_json_is_pretty_printed() {
        let err = DirectoryError::Upstream {
            status: 404,
            body: r#"{"error":{"code":404,"message":"Not Found"}}"#.to_string(),
        };
        let out = format_error(&err);
        let expected = "```json\n{\n  \"error\": {\n    \"code\": 404,\n    \"message\": \"Not Found\"\n  }\n}\n```";
        assert_eq!(out, expected);
        assert!(!out.contains("Google API"));
    }

    #[test]
    fn plain_text_is_fenced_unchanged() {
        let out = format_error(&"connection reset by peer");
        assert_eq!(out, "```\nconnection reset by peer\n```");
    }

    #[test]
    fn broken_json_falls_back_to_raw_text() {
        let out = format_error(&"Token error 400 {not json");
        assert_eq!(out, "```\nToken error 400 {not json\n```");
    }

    #[test]
    fn empty_message_still_renders() {
        let out = format_error(&"");
        assert!(!out.is_empty());
        assert!(out.starts_with("```"));
    }
}
