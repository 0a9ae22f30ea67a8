//! Shared error utilities used across the compilation pipeline.
//!
//! Every stage stops at the first problem it finds and hands back a
//! `CompileError` anchored at a byte offset into the source. Formatting the
//! offending line with a caret is deferred to `CompileError::render`, which is
//! the only place that needs the file name.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

/// Columns a tab advances the caret by when rendering a diagnostic.
const TAB_WIDTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum CompileError {
  #[snafu(display("{message}"))]
  LexError { loc: usize, message: String },

  #[snafu(display("{message}"))]
  SyntaxError { loc: usize, message: String },

  #[snafu(display("{message}"))]
  NameError { loc: usize, message: String },

  #[snafu(display("{message}"))]
  TypeError { loc: usize, message: String },
}

/// Coarse classification of a `CompileError`, handy for tests and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Lex,
  Syntax,
  Name,
  Type,
}

impl CompileError {
  pub fn lex(loc: usize, message: impl Into<String>) -> Self {
    Self::LexError {
      loc,
      message: message.into(),
    }
  }

  pub fn syntax(loc: usize, message: impl Into<String>) -> Self {
    Self::SyntaxError {
      loc,
      message: message.into(),
    }
  }

  pub fn name(loc: usize, message: impl Into<String>) -> Self {
    Self::NameError {
      loc,
      message: message.into(),
    }
  }

  pub fn type_error(loc: usize, message: impl Into<String>) -> Self {
    Self::TypeError {
      loc,
      message: message.into(),
    }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::LexError { .. } => ErrorKind::Lex,
      Self::SyntaxError { .. } => ErrorKind::Syntax,
      Self::NameError { .. } => ErrorKind::Name,
      Self::TypeError { .. } => ErrorKind::Type,
    }
  }

  /// Byte offset into the source the error is anchored at.
  pub fn loc(&self) -> usize {
    match self {
      Self::LexError { loc, .. }
      | Self::SyntaxError { loc, .. }
      | Self::NameError { loc, .. }
      | Self::TypeError { loc, .. } => *loc,
    }
  }

  pub fn message(&self) -> &str {
    match self {
      Self::LexError { message, .. }
      | Self::SyntaxError { message, .. }
      | Self::NameError { message, .. }
      | Self::TypeError { message, .. } => message,
    }
  }

  /// Format the error the way it is shown to users:
  ///
  /// ```text
  /// main.go:3: x := y + 1
  ///                 ^ undefined: y
  /// ```
  pub fn render(&self, file_name: &str, source: &str) -> String {
    let (line_number, column) = locate(source, self.loc());
    let line = source.lines().nth(line_number - 1).unwrap_or("");
    let prefix = format!("{file_name}:{line_number}: ");
    let marker = " ".repeat(prefix.chars().count() + column);
    format!("{prefix}{line}\n{marker}^ {}", self.message())
  }
}

/// 1-based line number and display column of byte offset `loc`.
fn locate(source: &str, loc: usize) -> (usize, usize) {
  let mut safe_loc = loc.min(source.len());
  while !source.is_char_boundary(safe_loc) {
    safe_loc -= 1;
  }

  let mut line_number = 1;
  let mut column = 0;
  for c in source[..safe_loc].chars() {
    match c {
      '\n' => {
        line_number += 1;
        column = 0;
      }
      '\t' => column += TAB_WIDTH,
      _ => column += 1,
    }
  }
  (line_number, column)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn render_points_at_offending_column() {
    let source = "package main\nx := y + 1\n";
    let loc = source.find('y').unwrap();
    let err = CompileError::name(loc, "undefined: y");
    let rendered = err.render("main.go", source);
    let mut lines = rendered.lines();
    assert_eq!(lines.next(), Some("main.go:2: x := y + 1"));
    let caret = lines.next().unwrap();
    assert_eq!(caret.find('^'), Some("main.go:2: ".len() + 5));
    assert!(caret.ends_with("^ undefined: y"));
  }

  #[test]
  fn tabs_count_as_four_columns() {
    let source = "func f() {\n\treturn z\n}";
    let loc = source.find('z').unwrap();
    let rendered = CompileError::syntax(loc, "boom").render("a.go", source);
    let caret = rendered.lines().nth(1).unwrap();
    assert_eq!(caret.find('^'), Some("a.go:2: ".len() + 4 + 7));
  }

  #[test]
  fn location_past_end_is_clamped() {
    let source = "var x int";
    let rendered = CompileError::lex(100, "unexpected end").render("f.go", source);
    assert!(rendered.starts_with("f.go:1: var x int\n"));
  }

  #[test]
  fn kind_and_message_accessors() {
    let err = CompileError::type_error(7, "mismatched types int and bool");
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.loc(), 7);
    assert_eq!(err.to_string(), "mismatched types int and bool");
  }
}
