//! Rendering of errors as colored diagnostics.
//!
//! The format follows rustc: a title, a `-->` locator line,
//!     the source line with the offending token underlined, notes,
//!     and finally the stack of commands that were running.

use crate::error;
use crate::token::trace::SourceCodeTrace;
use colored::*;
use std::fmt::{Formatter, Result};

pub fn format_error(f: &mut Formatter<'_>, err: &error::Error) -> Result {
    let (stack, root) = err.stack_view();
    let innermost = stack.last().copied();
    let located_at_root = !matches!(root.kind(), error::Kind::FailedPrecondition);

    Section {
        severity: Severity::Error,
        title: format!["{} [{}]", root.title(), root.category()],
        trace: err.locator(),
        annotation: root.source_annotation(),
        notes: root.notes().iter().map(ToString::to_string).collect(),
    }
    .fmt(f)?;

    // When the root error has no location of its own the innermost command
    //     was already shown above.
    let Some(command) = innermost.filter(|_| located_at_root) else {
        return Ok(());
    };
    let mut notes = vec![];
    if stack.len() > 1 {
        let mut full_stack = String::new();
        for (i, propagated) in stack.iter().rev().enumerate() {
            if i > 0 {
                full_stack.push('\n');
            }
            full_stack.push_str(&compact_trace(
                &propagated.trace,
                Severity::Context.color(),
                propagated.context.action(),
            ));
        }
        notes.push(format!["this is the full stack trace of the error:\n\n{full_stack}"]);
    }
    writeln!(f)?;
    Section {
        severity: Severity::Context,
        title: format!["this error occurred while {}:", command.context.action()],
        trace: Some(&command.trace),
        annotation: String::new(),
        notes,
    }
    .fmt(f)
}

#[derive(Clone, Copy)]
enum Severity {
    Error,
    Context,
}

impl Severity {
    fn color(self) -> Color {
        match self {
            Severity::Error => Color::BrightRed,
            Severity::Context => Color::Yellow,
        }
    }

    fn label(self) -> ColoredString {
        let s = match self {
            Severity::Error => "error",
            Severity::Context => "context",
        };
        s.color(self.color()).bold()
    }
}

/// One titled block of a diagnostic.
struct Section<'a> {
    severity: Severity,
    title: String,
    trace: Option<&'a SourceCodeTrace>,
    annotation: String,
    notes: Vec<String>,
}

impl<'a> Section<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let gutter = Gutter {
            width: self
                .trace
                .map_or(1, |trace| trace.line_number.to_string().len())
                + 1,
        };
        writeln!(f, "{}: {}", self.severity.label(), self.title.bold())?;
        if let Some(trace) = self.trace {
            gutter.locator(f, trace)?;
            gutter.row(f, "", Some('|'), "")?;
            let width = underline_width(trace);
            gutter.row(
                f,
                &trace.line_number.to_string(),
                Some('|'),
                &highlight_substring(&trace.line_content, trace.index, width),
            )?;
            let color = self.severity.color();
            gutter.row(
                f,
                "",
                Some('|'),
                &format![
                    "{}{} {}",
                    " ".repeat(trace.index),
                    "^".repeat(width).color(color).bold(),
                    self.annotation.color(color).bold(),
                ],
            )?;
        }
        let num_notes = self.notes.len();
        for (i, note) in self.notes.iter().enumerate() {
            let mut lines = note.trim_end().lines();
            let Some(first) = lines.next() else {
                continue;
            };
            gutter.row(f, "", Some('|'), "")?;
            gutter.row(f, "", Some('='), &format!["{} {first}", "note:".bold()])?;
            let separator = if i + 1 == num_notes { ' ' } else { '|' };
            for line in lines {
                gutter.row(f, "", Some(separator), &format!["      {line}"])?;
            }
        }
        Ok(())
    }
}

/// The left margin of a section, which holds line numbers and separators.
struct Gutter {
    width: usize,
}

impl Gutter {
    fn row(&self, f: &mut Formatter<'_>, margin: &str, separator: Option<char>, content: &str) -> Result {
        let padding = self.width.saturating_sub(margin.len() + 1);
        let margin = format!["{}{margin} ", " ".repeat(padding)];
        let separator = separator.map(|c| format!["{c} "]).unwrap_or_default();
        writeln!(f, "{}{}{}", margin.bright_cyan(), separator.bright_cyan(), content)
    }

    fn locator(&self, f: &mut Formatter<'_>, trace: &SourceCodeTrace) -> Result {
        let padding = self.width.saturating_sub(2);
        writeln!(
            f,
            "{} {} {}",
            " ".repeat(padding),
            "-->".bright_cyan().bold(),
            location(trace)
        )
    }
}

fn location(trace: &SourceCodeTrace) -> String {
    format!["{}:{}:{}", trace.origin, trace.line_number, trace.index + 1]
}

fn underline_width(trace: &SourceCodeTrace) -> usize {
    trace.value.chars().count().max(1)
}

/// Bolds the characters `[start, start+length)` of the line.
///
/// Positions are character offsets, not byte offsets.
fn highlight_substring(line: &str, start: usize, length: usize) -> String {
    let byte_offset = |n: usize| line.char_indices().nth(n).map(|(i, _)| i);
    let Some(start_byte) = byte_offset(start) else {
        return line.into();
    };
    let end_byte = byte_offset(start + length).unwrap_or(line.len());
    format![
        "{}{}{}",
        &line[..start_byte],
        line[start_byte..end_byte].bold(),
        line[end_byte..].trim_end(),
    ]
}

/// Two-line rendering of a trace used inside notes: `file:line:column  <line>` and the underline.
fn compact_trace(trace: &SourceCodeTrace, underline: Color, annotation: &str) -> String {
    let prefix = format!["  {}", location(trace)];
    let width = underline_width(trace);
    format![
        "{prefix}  {}\n{}  {} {annotation}\n",
        highlight_substring(&trace.line_content, trace.index, width),
        " ".repeat(prefix.chars().count() + trace.index),
        "^".repeat(width).color(underline).bold(),
    ]
}

/// An extra piece of information attached to an error.
#[derive(Debug)]
pub enum Note<'a> {
    Text(String),
    /// Text followed by a pointer into the source code, e.g. where a conditional began.
    SourceCodeTrace(String, &'a SourceCodeTrace),
}

impl<'a, T: Into<String>> From<T> for Note<'a> {
    fn from(value: T) -> Self {
        Note::Text(value.into())
    }
}

impl<'a> std::fmt::Display for Note<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Note::Text(s) => write!(f, "{s}"),
            Note::SourceCodeTrace(s, trace) => {
                write!(
                    f,
                    "{s}\n\n{}",
                    compact_trace(trace, Severity::Error.color(), "")
                )
            }
        }
    }
}
