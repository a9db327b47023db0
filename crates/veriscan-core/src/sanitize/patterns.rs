//! Patterns for recognizing JSON debris in prose.
//!
//! Models sometimes echo pieces of their own output structure into the
//! analysis or into grounding segments. These patterns classify lines as
//! structure, key/value debris, or prose.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Markdown code fence marker, with optional language tag
    pub static ref CODE_FENCE: Regex = Regex::new(r"```[A-Za-z0-9_-]*").unwrap();

    /// Key prefix at line start: `"key": `, `\"key\": ` or `key: `
    pub static ref KEY_PREFIX: Regex = Regex::new(
        r#"^\s*(\\?")?([A-Za-z_][A-Za-z0-9_]*)(\\?")?\s*:\s*"#
    ).unwrap();

    /// Line made only of JSON punctuation, or a bare boolean/null literal
    pub static ref STRUCTURAL_LINE: Regex = Regex::new(
        r#"(?i)^\s*(?:[{}\[\],"\\]+|(?:\\?")?(?:true|false|null)(?:\\?")?\s*,?)\s*$"#
    ).unwrap();

    /// A lone JSON scalar: one bare token or one quoted string, optional comma
    pub static ref SCALAR_VALUE: Regex = Regex::new(
        r#"^\s*(?:\\?"[^"\\]*\\?"|[^\s"\\,]*)\s*,?\s*$"#
    ).unwrap();
}

/// Keys whose lines are dropped outright.
pub const METADATA_KEYS: &[&str] = &[
    "verdict",
    "confidence_score",
    "multimodal_cross_check",
    "type",
    "provided_url",
    "page_title",
];

/// Keys whose value is prose worth keeping.
pub const CONTENT_KEYS: &[&str] = &[
    "analysis",
    "key_findings",
    "snippet",
    "text",
    "tone_analysis",
    "logical_fallacies",
    "source_metadata",
    "media_literacy",
];

pub fn is_metadata_key(key: &str) -> bool {
    METADATA_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

pub fn is_content_key(key: &str) -> bool {
    CONTENT_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

pub fn is_structural(line: &str) -> bool {
    STRUCTURAL_LINE.is_match(line)
}

pub fn is_scalar_value(value: &str) -> bool {
    SCALAR_VALUE.is_match(value)
}

/// Residue trimmed from both ends of a sanitized text.
pub fn is_edge_residue(c: char) -> bool {
    c.is_whitespace() || matches!(c, '"' | '{' | '}' | '[' | ']' | ',' | '\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_prefix_variants() {
        let caps = KEY_PREFIX.captures(r#""analysis": "x""#).unwrap();
        assert_eq!(&caps[2], "analysis");
        assert!(caps.get(1).is_some() && caps.get(3).is_some());

        let caps = KEY_PREFIX.captures(r#"\"verdict\": \"TRUE\""#).unwrap();
        assert_eq!(&caps[2], "verdict");

        let caps = KEY_PREFIX.captures("Note: this is prose").unwrap();
        assert!(caps.get(1).is_none());

        assert!(KEY_PREFIX.captures("Type 2 diabetes: a claim").is_none());
    }

    #[test]
    fn test_structural_lines() {
        assert!(is_structural("},"));
        assert!(is_structural("  ]  "));
        assert!(is_structural("\"\","));
        assert!(is_structural("true,"));
        assert!(is_structural("NULL"));
        assert!(!is_structural("True story."));
        assert!(!is_structural("The wall is visible"));
    }

    #[test]
    fn test_scalar_values() {
        assert!(is_scalar_value("\"FALSE\","));
        assert!(is_scalar_value("0.92"));
        assert!(is_scalar_value("\\\"MOSTLY FALSE\\\""));
        assert!(is_scalar_value(""));
        assert!(!is_scalar_value("the post is old"));
        assert!(!is_scalar_value("satire piece"));
    }

    #[test]
    fn test_key_classes() {
        assert!(is_metadata_key("Verdict"));
        assert!(is_content_key("snippet"));
        assert!(!is_metadata_key("note"));
        assert!(!is_content_key("note"));
    }
}
