// Output diagnostics - interprets what obabel printed on stderr
//
// obabel does not use exit codes consistently: a conversion that read nothing
// still exits 0. The molecule count line on stderr is the authoritative
// signal, and toolkit error blocks explain what went wrong.

use regex::Regex;

lazy_static::lazy_static! {
    static ref NOTHING_CONVERTED_RE: Regex = Regex::new(r"\b0 molecules converted").unwrap();
    static ref CONVERTED_RE: Regex = Regex::new(r"\b(\d+) molecules? converted").unwrap();
    static ref ERROR_HEADER_RE: Regex = Regex::new(r"^\*\*\* Open Babel (Error|Warning)\s+in\s+(\S+)").unwrap();
}

/// Severity of a toolkit message block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One `*** Open Babel Error in <Where>` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolkitMessage {
    pub severity: Severity,
    pub origin: String,
    pub text: String,
}

impl ToolkitMessage {
    pub fn summary(&self) -> String {
        if self.text.is_empty() {
            format!("in {}", self.origin)
        } else {
            format!("{} (in {})", self.text, self.origin)
        }
    }
}

/// Everything learned from a captured stderr stream
#[derive(Debug, Clone, Default)]
pub struct OutputDiagnostics {
    /// Number from the last "N molecules converted" line
    pub converted: Option<usize>,
    pub messages: Vec<ToolkitMessage>,
    nothing_converted: bool,
}

impl OutputDiagnostics {
    /// Whether obabel reported that it converted nothing
    pub fn is_failure(&self) -> bool {
        self.nothing_converted
    }

    pub fn errors(&self) -> impl Iterator<Item = &ToolkitMessage> {
        self.messages.iter().filter(|m| m.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ToolkitMessage> {
        self.messages
            .iter()
            .filter(|m| m.severity == Severity::Warning)
    }
}

/// Check for the "0 molecules converted" failure marker
pub fn conversion_failed(stderr: &str) -> bool {
    NOTHING_CONVERTED_RE.is_match(stderr)
}

/// Analyze captured stderr
pub fn analyze_output(stderr: &str) -> OutputDiagnostics {
    let converted = CONVERTED_RE
        .captures_iter(stderr)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok());

    OutputDiagnostics {
        converted,
        messages: extract_messages(stderr),
        nothing_converted: conversion_failed(stderr),
    }
}

/// Collect toolkit message blocks.
///
/// A block is a header line followed by indented text lines, usually framed
/// by a row of `=` characters.
fn extract_messages(stderr: &str) -> Vec<ToolkitMessage> {
    let mut messages = Vec::new();
    let mut lines = stderr.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(caps) = ERROR_HEADER_RE.captures(line.trim_start()) else {
            continue;
        };

        let severity = match &caps[1] {
            "Error" => Severity::Error,
            _ => Severity::Warning,
        };
        let origin = caps[2].to_string();

        let mut text = Vec::new();
        while let Some(next) = lines.peek() {
            let trimmed = next.trim();
            if trimmed.is_empty()
                || trimmed.starts_with("***")
                || trimmed.starts_with("===")
                || !next.starts_with(char::is_whitespace)
            {
                break;
            }
            text.push(trimmed.to_string());
            lines.next();
        }

        messages.push(ToolkitMessage {
            severity,
            origin,
            text: text.join(" "),
        });
    }

    messages
}
