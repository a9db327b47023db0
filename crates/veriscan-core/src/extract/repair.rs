//! Targeted JSON repairs.
//!
//! Both repairs are conservative: they only touch string contents and never
//! reorder or drop keys.

use lazy_static::lazy_static;
use regex::Regex;

use super::{FIELD_TERMINATORS, REPAIR_FIELD};

lazy_static! {
    /// Opening of the repaired field's string value: `"analysis": "`
    static ref FIELD_OPENER: Regex =
        Regex::new(&format!(r#""{}"\s*:\s*""#, regex::escape(REPAIR_FIELD))).unwrap();

    /// End of the repaired value: `", "<terminator>":`
    static ref FIELD_TERMINATOR: Regex = Regex::new(&format!(
        r#""\s*,\s*"(?:{})"\s*:"#,
        FIELD_TERMINATORS
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|")
    ))
    .unwrap();
}

/// Escape raw control characters that appear inside JSON strings.
///
/// Characters outside strings are left alone, so structural whitespace
/// survives untouched.
pub fn escape_control_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }

        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }

        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }

    out
}

/// Escape unescaped double quotes inside the `analysis` string value.
///
/// The value is taken to end right before the first `", "<terminator>":`
/// that follows it, or at the last quote before the final `}` when no
/// terminator key follows. Returns `None` when the field is absent or
/// nothing needed escaping.
pub fn escape_field_quotes(text: &str) -> Option<String> {
    let value_start = FIELD_OPENER.find(text)?.end();

    let value_end = match FIELD_TERMINATOR.find_at(text, value_start) {
        Some(m) => m.start(),
        None => {
            let last_brace = text.rfind('}')?;
            let quote = text[..last_brace].rfind('"')?;
            if quote < value_start {
                return None;
            }
            quote
        }
    };

    let value = &text[value_start..value_end];
    let escaped = escape_unescaped_quotes(value);
    if escaped == value {
        return None;
    }

    Some(format!("{}{}{}", &text[..value_start], escaped, &text[value_end..]))
}

/// Prefix a backslash to every quote preceded by an even number of backslashes.
fn escape_unescaped_quotes(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 8);
    let mut backslashes = 0usize;

    for c in value.chars() {
        if c == '"' && backslashes % 2 == 0 {
            out.push('\\');
        }
        if c == '\\' {
            backslashes += 1;
        } else {
            backslashes = 0;
        }
        out.push(c);
    }

    out
}
