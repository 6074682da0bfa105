// Repair near-JSON model output into parseable JSON.
//
// The model is asked for a single JSON object but routinely wraps it in prose,
// leaves trailing commas, uses single quotes or JavaScript literals. The repair
// is an ordered list of pure text transforms; later steps rely on the
// normalization done by earlier ones, so the order in REPAIR_STEPS is fixed.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Returned whenever no usable object can be recovered.
pub const EMPTY_OBJECT: &str = "{}";

/// One named text transform of the repair chain.
pub struct RepairStep {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

/// Repair steps applied, in order, to the extracted object span.
pub const REPAIR_STEPS: &[RepairStep] = &[
    RepairStep {
        name: "strip_control_chars",
        apply: strip_control_chars,
    },
    RepairStep {
        name: "escape_backslashes",
        apply: escape_backslashes,
    },
    RepairStep {
        name: "collapse_string_whitespace",
        apply: collapse_string_whitespace,
    },
    RepairStep {
        name: "remove_trailing_commas",
        apply: remove_trailing_commas,
    },
    RepairStep {
        name: "replace_bare_tokens",
        apply: replace_bare_tokens,
    },
    RepairStep {
        name: "convert_single_quotes",
        apply: convert_single_quotes,
    },
    RepairStep {
        name: "clamp_overflowing_numbers",
        apply: clamp_overflowing_numbers,
    },
];

/// Sanitize a raw model completion into a JSON object string.
///
/// Never fails: when nothing parseable can be recovered the result is `"{}"`,
/// leaving it to the normalizer to produce a placeholder report.
pub fn sanitize(raw: &str) -> String {
    let Some(span) = extract_object_span(raw) else {
        tracing::debug!(input_len = raw.len(), "No JSON object span in model response");
        return EMPTY_OBJECT.to_string();
    };

    let repaired = REPAIR_STEPS
        .iter()
        .fold(span.to_string(), |text, step| (step.apply)(&text));

    match serde_json::from_str::<Value>(&repaired) {
        Ok(Value::Object(_)) => repaired,
        Ok(_) => EMPTY_OBJECT.to_string(),
        Err(e) => {
            tracing::warn!(
                error = %e,
                span_len = span.len(),
                "Model response still unparseable after repair"
            );
            EMPTY_OBJECT.to_string()
        }
    }
}

/// Sanitize and parse in one go. Always yields a JSON object.
pub fn sanitize_to_value(raw: &str) -> Value {
    serde_json::from_str(&sanitize(raw)).unwrap_or_else(|_| Value::Object(Map::new()))
}

/// Greedy outer match: first `{` through last `}`.
pub fn extract_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Remove C0 control characters (U+0000–U+001F).
pub fn strip_control_chars(text: &str) -> String {
    text.chars().filter(|c| !('\u{0}'..='\u{1F}').contains(c)).collect()
}

/// Double every backslash that does not begin a valid JSON escape.
///
/// `\'` is left alone; `convert_single_quotes` resolves it.
pub fn escape_backslashes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '\\' {
            out.push(c);
            i += 1;
            continue;
        }

        match chars.get(i + 1) {
            Some(&next @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | '\'')) => {
                out.push('\\');
                out.push(next);
                i += 2;
            }
            Some('u') if is_hex4(&chars, i + 2) => {
                out.push_str("\\u");
                i += 2;
            }
            _ => {
                out.push_str("\\\\");
                i += 1;
            }
        }
    }

    out
}

fn is_hex4(chars: &[char], from: usize) -> bool {
    chars
        .get(from..from + 4)
        .is_some_and(|digits| digits.iter().all(|c| c.is_ascii_hexdigit()))
}

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",(\s*[}\]])").unwrap());
static BARE_NULLISH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:null|undefined)\b").unwrap());
static BARE_NAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bNaN\b").unwrap());
static NUMBER_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?").unwrap());

/// Collapse whitespace runs inside string literals to a single space.
pub fn collapse_string_whitespace(text: &str) -> String {
    map_segments(
        text,
        |code| code.to_string(),
        |_, body| WHITESPACE_RUN.replace_all(body, " ").into_owned(),
    )
}

/// Drop a comma that only has whitespace between it and `}` or `]`.
pub fn remove_trailing_commas(text: &str) -> String {
    map_segments(
        text,
        |code| TRAILING_COMMA.replace_all(code, "$1").into_owned(),
        |_, body| body.to_string(),
    )
}

/// Bare `null`/`undefined` become `""`, bare `NaN` becomes `0`.
pub fn replace_bare_tokens(text: &str) -> String {
    map_segments(
        text,
        |code| {
            let code = BARE_NULLISH.replace_all(code, "\"\"");
            BARE_NAN.replace_all(&code, "0").into_owned()
        },
        |_, body| body.to_string(),
    )
}

/// Rewrite `'...'` literals as `"..."` literals.
///
/// Inside the converted body `\'` becomes `'` and bare `"` is escaped. A stray
/// `\'` inside a double-quoted literal is also unescaped, since JSON rejects it.
pub fn convert_single_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in segments(text) {
        match segment {
            Segment::Code(code) => out.push_str(code),
            Segment::Literal { quote, body, closed } => {
                out.push('"');
                out.push_str(&requote_body(body, quote));
                if closed {
                    out.push('"');
                }
            }
        }
    }
    out
}

/// Number literals outside strings that overflow `f64` (`1e400`) become `0`.
///
/// serde_json rejects such literals, which would otherwise discard the whole
/// object over one field.
pub fn clamp_overflowing_numbers(text: &str) -> String {
    map_segments(
        text,
        |code| {
            NUMBER_LITERAL
                .replace_all(code, |caps: &regex::Captures| {
                    let literal = &caps[0];
                    match literal.parse::<f64>() {
                        Ok(v) if v.is_infinite() => "0".to_string(),
                        _ => literal.to_string(),
                    }
                })
                .into_owned()
        },
        |_, body| body.to_string(),
    )
}

fn requote_body(body: &str, quote: char) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\'') => out.push('\''),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push_str("\\\\"),
            },
            '"' if quote == '\'' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

// ──────────────────────────────────────────────
// String-literal aware segmentation
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    /// Text outside any string literal.
    Code(&'a str),
    /// Literal body without its quotes. `closed` is false for a literal
    /// running to the end of the input.
    Literal { quote: char, body: &'a str, closed: bool },
}

fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut code_start = 0;
    let mut chars = text.char_indices();

    while let Some((i, c)) = chars.next() {
        if c != '"' && c != '\'' {
            continue;
        }
        if code_start < i {
            out.push(Segment::Code(&text[code_start..i]));
        }

        let body_start = i + 1;
        let mut end = None;
        while let Some((j, d)) = chars.next() {
            if d == '\\' {
                chars.next();
            } else if d == c {
                end = Some(j);
                break;
            }
        }

        match end {
            Some(j) => {
                out.push(Segment::Literal { quote: c, body: &text[body_start..j], closed: true });
                code_start = j + 1;
            }
            None => {
                out.push(Segment::Literal { quote: c, body: &text[body_start..], closed: false });
                code_start = text.len();
            }
        }
    }

    if code_start < text.len() {
        out.push(Segment::Code(&text[code_start..]));
    }
    out
}

/// Rebuild `text`, transforming code and literal bodies separately.
/// Quote characters are preserved as found.
fn map_segments(
    text: &str,
    code_fn: impl Fn(&str) -> String,
    literal_fn: impl Fn(char, &str) -> String,
) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in segments(text) {
        match segment {
            Segment::Code(code) => out.push_str(&code_fn(code)),
            Segment::Literal { quote, body, closed } => {
                out.push(quote);
                out.push_str(&literal_fn(quote, body));
                if closed {
                    out.push(quote);
                }
            }
        }
    }
    out
}
