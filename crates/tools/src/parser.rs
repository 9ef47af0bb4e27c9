//! Tool-call parser: extracts structured calls from free-form model text.
//!
//! Wire format:
//!
//! ```text
//! TOOL_CALL: weather(city="Paris", days=3, units={"t":"c"})
//! ```
//!
//! Scanning is a pure function of `(text, start)`; no cursor is shared
//! between calls. All delimiters are ASCII, so the scanner walks bytes and
//! every index it slices at is a char boundary.
//!
//! A malformed call never aborts the scan. If the argument list never
//! closes, or the name or `(` is missing, a warning is recorded and the
//! scan resumes right after the marker. If the list closes but an argument
//! is malformed, the call is returned with `ok = false` so the model can be
//! told what went wrong.

use serde::Serialize;
use serde_json::{Number, Value};
use sidekick_core::{ToolArgs, ToolCall};
use tracing::warn;

/// Literal token that introduces a tool call.
pub const TOOL_CALL_MARKER: &str = "TOOL_CALL:";

/// Why part of the text could not be turned into a well-formed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseWarningKind {
    /// Marker not followed by a tool-name identifier
    MissingName,
    /// Tool name not followed by `(`
    MissingArguments,
    /// Argument list never closes
    UnterminatedArguments,
    /// List closed but an argument could not be resolved
    MalformedArgument,
}

/// A non-fatal parse problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub kind: ParseWarningKind,
    /// Byte offset of the marker that produced the warning
    pub offset: usize,
    pub message: String,
}

/// Everything extracted from one model response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseReport {
    /// Calls in the order they appear in the text
    pub calls: Vec<ToolCall>,
    pub warnings: Vec<ParseWarning>,
}

impl ParseReport {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.warnings.is_empty()
    }
}

/// The outcome of scanning one marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    pub call: Option<ToolCall>,
    pub warning: Option<ParseWarning>,
    /// Where scanning for the next marker resumes
    pub next: usize,
}

/// Whether `text` contains a tool-call marker at all.
pub fn contains_tool_call(text: &str) -> bool {
    text.contains(TOOL_CALL_MARKER)
}

/// Whether `name` is a valid tool identifier: `[A-Za-z_][A-Za-z0-9_.-]*`.
pub fn is_valid_tool_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    match bytes.first() {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return false,
    }
    bytes[1..].iter().all(|b| is_name_byte(*b))
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-')
}

/// Parse every tool call in `text`.
pub fn parse_tool_calls(text: &str) -> ParseReport {
    let mut report = ParseReport::default();
    let mut cursor = 0;

    while let Some(rel) = text[cursor..].find(TOOL_CALL_MARKER) {
        let scan = scan_call(text, cursor + rel);
        if let Some(warning) = scan.warning {
            warn!(
                kind = ?warning.kind,
                offset = warning.offset,
                message = %warning.message,
                "Malformed tool call"
            );
            report.warnings.push(warning);
        }
        if let Some(call) = scan.call {
            report.calls.push(call);
        }
        cursor = scan.next;
    }

    report
}

/// Scan the call whose marker starts at byte `start`.
pub fn scan_call(text: &str, start: usize) -> Scan {
    let bytes = text.as_bytes();
    let after_marker = start + TOOL_CALL_MARKER.len();
    let skip = |kind: ParseWarningKind, message: String| Scan {
        call: None,
        warning: Some(ParseWarning {
            kind,
            offset: start,
            message,
        }),
        next: after_marker,
    };

    let name_start = skip_whitespace(bytes, after_marker);
    let mut name_end = name_start;
    while name_end < bytes.len() && is_name_byte(bytes[name_end]) {
        name_end += 1;
    }
    let name = &text[name_start..name_end];
    if !is_valid_tool_name(name) {
        return skip(
            ParseWarningKind::MissingName,
            "tool call marker is not followed by a tool name".into(),
        );
    }

    let open = skip_whitespace(bytes, name_end);
    if bytes.get(open) != Some(&b'(') {
        return skip(
            ParseWarningKind::MissingArguments,
            format!("tool '{name}' is not followed by an argument list"),
        );
    }

    let Some(close) = find_closing_paren(bytes, open) else {
        return skip(
            ParseWarningKind::UnterminatedArguments,
            format!("argument list for '{name}' is never closed"),
        );
    };

    let (call, warning) = match parse_arguments(&text[open + 1..close]) {
        Ok(args) => (ToolCall::new(name, args), None),
        Err(reason) => (
            ToolCall::malformed(name, reason.clone()),
            Some(ParseWarning {
                kind: ParseWarningKind::MalformedArgument,
                offset: start,
                message: format!("tool '{name}': {reason}"),
            }),
        ),
    };

    Scan {
        call: Some(call),
        warning,
        next: close + 1,
    }
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

// ── Lexer ────────────────────────────────────────────────────────────

/// Tracks bracket nesting and string state across an argument list.
///
/// A quote opens a string only when the previous significant byte is a
/// delimiter (`( , = [ { :`), so an apostrophe inside a bare word stays
/// literal. A closer that does not match the innermost opener is ignored.
struct Lexer {
    closers: Vec<u8>,
    quote: Option<u8>,
    escaped: bool,
    prev_sig: u8,
}

impl Lexer {
    fn new() -> Self {
        Self {
            closers: Vec::new(),
            quote: None,
            escaped: false,
            prev_sig: b'(',
        }
    }

    fn at_top_level(&self) -> bool {
        self.closers.is_empty() && self.quote.is_none()
    }

    fn feed(&mut self, b: u8) {
        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if b == b'\\' {
                self.escaped = true;
            } else if b == q {
                self.quote = None;
                self.prev_sig = b;
            }
            return;
        }

        match b {
            b'"' | b'\'' if matches!(self.prev_sig, b'(' | b',' | b'=' | b'[' | b'{' | b':') => {
                self.quote = Some(b);
            }
            b'(' => self.closers.push(b')'),
            b'[' => self.closers.push(b']'),
            b'{' => self.closers.push(b'}'),
            b')' | b']' | b'}' => {
                if self.closers.last() == Some(&b) {
                    self.closers.pop();
                }
            }
            _ => {}
        }
        if !b.is_ascii_whitespace() {
            self.prev_sig = b;
        }
    }
}

/// Index of the `)` closing the list opened at `open`.
fn find_closing_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut lexer = Lexer::new();
    for (i, &b) in bytes.iter().enumerate().skip(open + 1) {
        if b == b')' && lexer.at_top_level() {
            return Some(i);
        }
        lexer.feed(b);
    }
    None
}

/// Split an argument list at top-level commas.
fn split_arguments(inner: &str) -> Vec<&str> {
    let mut lexer = Lexer::new();
    let mut pieces = Vec::new();
    let mut piece_start = 0;
    for (i, &b) in inner.as_bytes().iter().enumerate() {
        if b == b',' && lexer.at_top_level() {
            pieces.push(&inner[piece_start..i]);
            piece_start = i + 1;
        }
        lexer.feed(b);
    }
    pieces.push(&inner[piece_start..]);
    pieces
}

// ── Arguments ────────────────────────────────────────────────────────

fn parse_arguments(inner: &str) -> Result<ToolArgs, String> {
    let mut args = ToolArgs::new();
    if inner.trim().is_empty() {
        return Ok(args);
    }

    let pieces = split_arguments(inner);
    let last = pieces.len() - 1;
    for (i, piece) in pieces.into_iter().enumerate() {
        let piece = piece.trim();
        if piece.is_empty() {
            // A single trailing comma is tolerated.
            if i == last {
                continue;
            }
            return Err(format!("empty argument at position {}", i + 1));
        }
        let (key, value) = parse_argument(piece)?;
        if args.contains_key(&key) {
            return Err(format!("duplicate argument '{key}'"));
        }
        args.insert(key, value);
    }
    Ok(args)
}

fn parse_argument(piece: &str) -> Result<(String, Value), String> {
    let Some(eq) = piece.find('=') else {
        return Err(format!("missing '=' in argument '{piece}'"));
    };
    let key = piece[..eq].trim();
    if key.is_empty() {
        return Err(format!("missing argument name in '{piece}'"));
    }
    if !is_valid_key(key) {
        return Err(format!("invalid argument name '{key}'"));
    }
    let raw = piece[eq + 1..].trim();
    if raw.is_empty() {
        return Err(format!("missing value for '{key}'"));
    }
    let value = parse_value(raw).map_err(|e| format!("argument '{key}': {e}"))?;
    Ok((key.to_string(), value))
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_value(raw: &str) -> Result<Value, String> {
    match raw.as_bytes()[0] {
        q @ (b'"' | b'\'') => parse_quoted(raw, q as char),
        b'{' | b'[' => Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))),
        _ => {
            if raw.contains('"') {
                return Err("dangling quote in value".into());
            }
            Ok(coerce_bare(raw))
        }
    }
}

fn parse_quoted(raw: &str, quote: char) -> Result<Value, String> {
    let mut out = String::new();
    let mut chars = raw.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, e @ ('"' | '\'' | '\\'))) => out.push(e),
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => return Err("unterminated string".into()),
            },
            c if c == quote => {
                let rest = raw[i + c.len_utf8()..].trim();
                if !rest.is_empty() {
                    return Err(format!("unexpected text after quoted value: '{rest}'"));
                }
                return Ok(Value::String(out));
            }
            c => out.push(c),
        }
    }
    Err("unterminated string".into())
}

/// Coerce a bare token: boolean, then null, then number, then string.
fn coerce_bare(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(u) = raw.parse::<u64>() {
        return Value::Number(u.into());
    }
    if let Some(n) = raw
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
    {
        return Value::Number(n);
    }
    Value::String(raw.to_string())
}

// ── Rendering ────────────────────────────────────────────────────────

/// Render a call in canonical wire form. [`parse_tool_calls`] reads the
/// result back into an equal argument mapping.
pub fn render_tool_call(name: &str, args: &ToolArgs) -> String {
    let rendered: Vec<String> = args
        .iter()
        .map(|(key, value)| format!("{key}={}", render_value(value)))
        .collect();
    format!("{TOOL_CALL_MARKER} {name}({})", rendered.join(", "))
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => {
            let mut out = String::with_capacity(s.len() + 2);
            out.push('"');
            for c in s.chars() {
                match c {
                    '\\' => out.push_str("\\\\"),
                    '"' => out.push_str("\\\""),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    '\r' => out.push_str("\\r"),
                    c => out.push(c),
                }
            }
            out.push('"');
            out
        }
        other => other.to_string(),
    }
}
