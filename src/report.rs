//! Failure reporting strategies.
//!
//! Every mismatch the engine finds is routed through a [`FailureReporter`]
//! supplied by the caller. [`FailFast`] turns the first mismatch into
//! [`AssertError::Failure`], which the engine propagates with `?` and so
//! aborts the comparison. [`CollectAll`] records the mismatch and lets the
//! comparison run to completion.

use std::{borrow::Cow, fmt, fmt::Write as _};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{AssertError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn with_values(
        message: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            expected: Some(expected.into()),
            actual: Some(actual.into()),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.expected, &self.actual) {
            (Some(expected), Some(actual)) => write!(
                f,
                "{} expected:<{}> but was:<{}>",
                self.message, expected, actual
            ),
            _ => f.write_str(&self.message),
        }
    }
}

pub trait FailureReporter {
    fn handle_failure(&mut self, message: &str) -> Result<()>;

    fn handle_failure_with_values(
        &mut self,
        message: &str,
        expected: &str,
        actual: &str,
    ) -> Result<()>;
}

/// Aborts on the first mismatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailFast;

impl FailureReporter for FailFast {
    fn handle_failure(&mut self, message: &str) -> Result<()> {
        debug!("Failing fast: {message}");
        Err(AssertError::Failure(Failure::new(message)))
    }

    fn handle_failure_with_values(
        &mut self,
        message: &str,
        expected: &str,
        actual: &str,
    ) -> Result<()> {
        debug!("Failing fast: {message}");
        Err(AssertError::Failure(Failure::with_values(
            message, expected, actual,
        )))
    }
}

/// Accumulates every mismatch and never aborts.
#[derive(Debug, Clone, Default)]
pub struct CollectAll {
    failures: Vec<Failure>,
}

impl CollectAll {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<Failure> {
        self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl FailureReporter for CollectAll {
    fn handle_failure(&mut self, message: &str) -> Result<()> {
        self.failures.push(Failure::new(message));
        Ok(())
    }

    fn handle_failure_with_values(
        &mut self,
        message: &str,
        expected: &str,
        actual: &str,
    ) -> Result<()> {
        self.failures
            .push(Failure::with_values(message, expected, actual));
        Ok(())
    }
}

/// Renders failures as an aligned plain-text table for terminal output.
pub fn render_failures(failures: &[Failure]) -> String {
    let headers = ["#", "failure", "expected", "actual"];
    let rows = failures
        .iter()
        .enumerate()
        .map(|(idx, failure)| {
            [
                (idx + 1).to_string(),
                failure.message.clone(),
                failure.expected.clone().unwrap_or_default(),
                failure.actual.clone().unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();

    let mut widths = headers.map(display_width);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(display_width(&sanitize_cell(cell)));
        }
    }

    let mut output = String::new();
    let header_cells = headers.map(str::to_string);
    let _ = writeln!(output, "{}", format_row(&header_cells, &widths));
    let separator = widths.map(|w| "-".repeat(w.max(3)));
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in &rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(cells: &[String; 4], widths: &[usize; 4]) -> String {
    let mut line = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, width)| {
            let sanitized = sanitize_cell(cell);
            let padding = width.saturating_sub(display_width(&sanitized));
            format!("{sanitized}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.truncate(line.trim_end().len());
    line
}

/// Terminal columns taken by `value`: ANSI escapes take none, East Asian
/// wide characters and emoji take two.
fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else if is_wide(ch) {
            width += 2;
        } else {
            width += 1;
        }
    }
    width
}

fn is_wide(ch: char) -> bool {
    matches!(
        u32::from(ch),
        0x1100..=0x115F
            | 0x2E80..=0x303E
            | 0x3041..=0x33FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xA000..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
            | 0x1F300..=0x1F64F
            | 0x1F900..=0x1F9FF
            | 0x20000..=0x3FFFD
    )
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_fast_raises_structured_failure() {
        let mut reporter = FailFast;
        let err = reporter
            .handle_failure_with_values("row count (table=T)", "1", "2")
            .unwrap_err();
        let failure = err.as_failure().expect("failure variant");
        assert_eq!(failure.message, "row count (table=T)");
        assert_eq!(failure.expected.as_deref(), Some("1"));
        assert_eq!(failure.actual.as_deref(), Some("2"));
    }

    #[test]
    fn collect_all_accumulates_and_continues() {
        let mut reporter = CollectAll::new();
        reporter.handle_failure("table count").unwrap();
        reporter
            .handle_failure_with_values("tables", "[A]", "[B]")
            .unwrap();
        assert_eq!(reporter.len(), 2);
        assert_eq!(reporter.failures()[0], Failure::new("table count"));
        assert_eq!(reporter.failures()[1].actual.as_deref(), Some("[B]"));
    }

    #[test]
    fn failure_display_includes_values() {
        let failure = Failure::with_values("value (table=T, row=0, col=C)", "3", "9");
        assert_eq!(
            failure.to_string(),
            "value (table=T, row=0, col=C) expected:<3> but was:<9>"
        );
    }

    #[test]
    fn render_failures_aligns_columns() {
        let failures = vec![
            Failure::with_values("row count (table=T)", "1", "2"),
            Failure::new("column mismatch\n(table=T)"),
        ];
        let rendered = render_failures(&failures);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("#  failure"));
        assert_eq!(lines[2], "1  row count (table=T)        1         2");
        assert_eq!(lines[3], "2  column mismatch (table=T)");
    }

    #[test]
    fn render_failures_pads_wide_characters_by_display_width() {
        let failures = vec![
            Failure::with_values("a", "東京", "x"),
            Failure::with_values("b", "abcd", "y"),
        ];
        let rendered = render_failures(&failures);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[2], "1  a        東京      x");
        assert_eq!(lines[3], "2  b        abcd      y");
        assert_eq!(display_width("\u{1b}[31mred\u{1b}[0m"), 3);
    }
}
