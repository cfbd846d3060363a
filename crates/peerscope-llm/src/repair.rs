//! Normalizes a language model's text output into JSON.
//!
//! Steps, in order:
//! 1. strip a surrounding code fence (with optional language tag);
//! 2. trim whitespace;
//! 3. if the text still does not parse, drop thousands separators from bare
//!    numbers (`1,250,000` becomes `1250000`), leaving string contents alone;
//! 4. parse.
//!
//! Separators are only touched when the text fails to parse as-is, so a valid
//! compact array like `[100,200]` is never merged into one number. Every step
//! is a no-op on already-clean JSON.

use std::sync::LazyLock;

use peerscope_core::ExternalError;
use peerscope_http::truncate_for_log;
use regex::Regex;
use serde_json::Value;

/// Characters of the cleaned text carried in a `MalformedResponse`.
const SNIPPET_CHARS: usize = 500;

static OPENING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_+\-]*[ \t]*\r?\n?").expect("valid fence regex"));
static CLOSING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n?[ \t]*```$").expect("valid fence regex"));

fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let start = OPENING_FENCE.find(text).map_or(0, |m| m.end());
    let rest = &text[start..];
    let end = CLOSING_FENCE.find(rest).map_or(rest.len(), |m| m.start());
    &rest[..end]
}

/// Removes commas that separate digit groups in bare (unquoted) numbers.
///
/// A number qualifies when it starts with one to three digits followed by one
/// or more `,ddd` groups, each of exactly three digits. Numbers inside string
/// literals are copied verbatim.
fn remove_thousands_separators(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
            continue;
        }

        let starts_number = c.is_ascii_digit()
            && (i == 0 || !(chars[i - 1].is_ascii_alphanumeric() || chars[i - 1] == '.'));
        if !starts_number {
            out.push(c);
            i += 1;
            continue;
        }

        let lead_end = digits_end(&chars, i);
        let mut groups_end = lead_end;
        if lead_end - i <= 3 {
            while groups_end < chars.len() && chars[groups_end] == ',' {
                let group_end = digits_end(&chars, groups_end + 1);
                if group_end - (groups_end + 1) != 3 {
                    break;
                }
                groups_end = group_end;
            }
        }

        out.extend(chars[i..groups_end].iter().filter(|ch| **ch != ','));
        i = groups_end;
    }

    out
}

fn digits_end(chars: &[char], from: usize) -> usize {
    let mut end = from;
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    end
}

/// Steps 1–3: the text that [`repair_json`] will parse.
#[must_use]
pub fn clean_json_text(raw: &str) -> String {
    let stripped = strip_fences(raw).trim();
    if serde_json::from_str::<Value>(stripped).is_ok() {
        return stripped.to_string();
    }
    remove_thousands_separators(stripped)
}

/// Cleans and parses model output.
///
/// # Errors
///
/// Returns [`ExternalError::MalformedResponse`] carrying the first 500
/// characters of the cleaned text when it does not parse.
pub fn repair_json(raw: &str) -> Result<Value, ExternalError> {
    let cleaned = clean_json_text(raw);
    serde_json::from_str(&cleaned).map_err(|e| {
        let snippet = truncate_for_log(&cleaned, SNIPPET_CHARS);
        tracing::error!(error = %e, snippet = %snippet, "model output is not valid JSON");
        ExternalError::MalformedResponse {
            snippet,
            reason: e.to_string(),
        }
    })
}
