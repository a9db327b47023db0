//! Removal of JSON debris from prose.
//!
//! Applied to the analysis text, every grounding segment, and every
//! citation snippet. A line-oriented pass classifies each line:
//!
//! | Line                                   | Action              |
//! |----------------------------------------|---------------------|
//! | metadata key with a scalar value       | drop                |
//! | quoted key or known content key        | keep the value only |
//! | unquoted unknown key (`Note: ...`)     | keep as prose       |
//! | punctuation or bare literal (`},`)     | drop                |
//! | anything else                          | keep verbatim       |
//!
//! The pass only ever deletes characters, so repeating it until nothing
//! changes terminates and makes [`sanitize`] idempotent.

pub mod patterns;

use patterns::{
    is_content_key, is_edge_residue, is_metadata_key, is_scalar_value, is_structural, CODE_FENCE,
    KEY_PREFIX,
};

enum LineKind<'a> {
    Drop,
    Value(&'a str),
    Prose,
}

/// Strip JSON fragments and fence markers from text, keeping prose.
pub fn sanitize(text: &str) -> String {
    let mut current = clean_pass(text);
    loop {
        let next = clean_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_pass(text: &str) -> String {
    let unfenced = CODE_FENCE.replace_all(text, "");
    let mut kept: Vec<&str> = Vec::new();

    for line in unfenced.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            kept.push("");
            continue;
        }
        match classify(trimmed) {
            LineKind::Drop => {}
            LineKind::Value(value) => kept.push(value),
            LineKind::Prose => kept.push(line),
        }
    }

    kept.join("\n").trim_matches(is_edge_residue).to_string()
}

fn classify(line: &str) -> LineKind<'_> {
    if let Some(caps) = KEY_PREFIX.captures(line) {
        let key = &caps[2];
        let quoted = caps.get(1).is_some() && caps.get(3).is_some();
        let end = caps.get(0).map_or(0, |m| m.end());

        // An unquoted metadata key followed by a sentence is a prose label.
        if is_metadata_key(key) && (quoted || is_scalar_value(&line[end..])) {
            return LineKind::Drop;
        }
        if quoted || is_content_key(key) {
            let value = line[end..]
                .trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | ',' | '\\'));
            return if value.is_empty() || is_structural(value) {
                LineKind::Drop
            } else {
                LineKind::Value(value)
            };
        }
        return LineKind::Prose;
    }

    if is_structural(line) {
        LineKind::Drop
    } else {
        LineKind::Prose
    }
}
