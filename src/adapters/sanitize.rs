//! Log sanitization for clinical values, identifiers and secrets.
//!
//! Assessment logs must never carry a patient's risk factors. This module
//! redacts, line by line, anything that looks like:
//! - a clinical field assignment (`age=52`, `"cholesterol": 212`, or the
//!   escaped `\"age\": 52` found inside JSON-formatted messages)
//! - patient identifiers (UUIDs, MRNs, emails)
//! - secrets and long hex key material
//!
//! Sanitizing strings is a fallback. The engine avoids passing record values
//! to logging calls in the first place.
//!
//! # Performance / DoS
//!
//! `sanitize()` caps the input it scans (see `CARDIORISK_SANITIZE_MAX_BYTES`).

use regex::{Captures, Regex, RegexSet};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

use crate::domain::RECORD_FIELDS;

static PATTERNS: OnceLock<RedactionPatterns> = OnceLock::new();

/// Defaults to 16 KiB; can be overridden via `CARDIORISK_SANITIZE_MAX_BYTES`.
const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

enum Replacement {
    Fixed(String),
    /// Redact the value of a clinical field, keeping the key's quoting so
    /// JSON log lines stay well-formed.
    FieldValue,
}

struct Redaction {
    regex: Regex,
    replacement: Replacement,
}

struct RedactionPatterns {
    set: RegexSet,
    rules: Vec<Redaction>,
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

fn max_sanitize_bytes() -> usize {
    std::env::var("CARDIORISK_SANITIZE_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

fn clinical_field_pattern() -> String {
    // `age=52`, `age: 52`, `"age": 52`, `"oldpeak":-1.5`, `\"age\": 52`
    let fields = RECORD_FIELDS.join("|");
    format!(
        r#"(\\?")?\b({fields})\b(\\?")?(\s*[:=]\s*)-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?"#
    )
}

fn redact_field_value(caps: &Captures<'_>) -> String {
    let quote = caps.get(1).map_or("", |m| m.as_str());
    let close = caps.get(3).map_or("", |m| m.as_str());
    format!(
        "{quote}{}{close}{}{quote}[REDACTED]{quote}",
        &caps[2], &caps[4]
    )
}

fn patterns() -> &'static RedactionPatterns {
    PATTERNS.get_or_init(|| {
        let fixed = [
            (
                r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
                "[REDACTED-UUID]",
            ),
            (r"\bMRN[:\s]?\d{6,10}\b", "[REDACTED-MRN]"),
            (
                r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
                "[REDACTED-EMAIL]",
            ),
            (
                r"(?i)\b(?:api[_-]?key|access[_-]?token|secret|password|token)\b\s*[:=]\s*\S{8,}",
                "[REDACTED-SECRET]",
            ),
            (r"\b[0-9a-fA-F]{32,}\b", "[REDACTED-KEY]"),
        ];

        let mut rules: Vec<(String, Replacement)> =
            vec![(clinical_field_pattern(), Replacement::FieldValue)];
        rules.extend(
            fixed
                .into_iter()
                .map(|(p, r)| (p.to_string(), Replacement::Fixed(r.to_string()))),
        );

        // Patterns are compile-time constants; failure here is a programming error.
        let set = RegexSet::new(rules.iter().map(|(p, _)| p.as_str())).expect("Valid regex set");
        let rules = rules
            .into_iter()
            .map(|(pattern, replacement)| Redaction {
                regex: Regex::new(&pattern).expect("Valid regex"),
                replacement,
            })
            .collect();

        RedactionPatterns { set, rules }
    })
}

/// Redact clinical values, identifiers and secrets from `input`.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let patterns = patterns();
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut result = prefix.to_string();
    for idx in patterns.set.matches(prefix).into_iter() {
        let rule = &patterns.rules[idx];
        result = match &rule.replacement {
            Replacement::Fixed(text) => rule.regex.replace_all(&result, text.as_str()),
            Replacement::FieldValue => rule.regex.replace_all(&result, redact_field_value),
        }
        .into_owned();
    }

    if truncated {
        result.push_str(" [TRUNCATED]");
    }
    result
}

/// Check whether `input` contains anything `sanitize` would redact.
#[must_use]
pub fn contains_sensitive(input: &str) -> bool {
    let (prefix, _) = truncate_to_char_boundary(input, max_sanitize_bytes());
    patterns().set.is_match(prefix)
}

/// A `tracing_subscriber` writer wrapper that sanitizes each formatted log
/// line before it reaches the underlying sink.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

pub struct SanitizingWriter<W: std::io::Write> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W> SanitizingWriter<W>
where
    W: std::io::Write,
{
    fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }

    fn write_sanitized(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let text = String::from_utf8_lossy(bytes);
        self.inner.write_all(sanitize(&text).as_bytes())
    }

    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.write_sanitized(&line)?;
        }
        Ok(())
    }
}

impl<W> std::io::Write for SanitizingWriter<W>
where
    W: std::io::Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // A formatter that never emits a newline must not grow the buffer unbounded.
        let hard_cap = max_sanitize_bytes().saturating_mul(2);
        if self.buffer.len() > hard_cap {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
            self.inner.write_all(b"\n")?;
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;
        if !self.buffer.is_empty() {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
        }
        self.inner.flush()
    }
}

impl<W> Drop for SanitizingWriter<W>
where
    W: std::io::Write,
{
    fn drop(&mut self) {
        let _ = std::io::Write::flush(self);
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter::new(self.inner.make_writer())
    }
}
