//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! Multi-character punctuators are matched before single-character ones to
//! avoid ambiguity. Newlines are significant (they terminate statements just
//! like `;`) and therefore come out as punctuator tokens; every other kind of
//! whitespace, as well as `//` comments, is dropped.

use log::debug;

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Punctuator,
  Keyword,
  Ident,
  Num,
  Str,
  Eof,
}

pub const KEYWORDS: [&str; 12] = [
  "package", "import", "func", "var", "type", "struct", "return", "if", "else", "for", "true",
  "false",
];

const TWO_CHAR_PUNCTUATORS: [&str; 7] = ["==", "!=", "<=", ">=", ":=", "&&", "||"];

const ONE_CHAR_PUNCTUATORS: &[u8] = b"+-*/(){}[]<>=;\n,.&:!";

/// Thin wrapper for lexical information needed by later stages. The text of a
/// token is recovered from the source with `text`.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<i64>,
  pub loc: usize,
  pub len: usize,
}

impl Token {
  pub fn new(kind: TokenKind, loc: usize, len: usize, value: Option<i64>) -> Self {
    Self {
      kind,
      value,
      loc,
      len,
    }
  }

  pub fn text<'a>(&self, source: &'a str) -> &'a str {
    &source[self.loc..self.loc + self.len]
  }

  /// Contents of a string literal without the surrounding quotes.
  pub fn string_value<'a>(&self, source: &'a str) -> Option<&'a str> {
    match self.kind {
      TokenKind::Str => Some(&source[self.loc + 1..self.loc + self.len - 1]),
      _ => None,
    }
  }
}

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];
    if matches!(c, b' ' | b'\t' | b'\r') {
      i += 1;
      continue;
    }

    if input[i..].starts_with("//") {
      while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
      }
      continue;
    }

    if let Some(op) = TWO_CHAR_PUNCTUATORS
      .into_iter()
      .find(|op| input[i..].starts_with(op))
    {
      tokens.push(Token::new(TokenKind::Punctuator, i, op.len(), None));
      i += op.len();
      continue;
    }

    if c.is_ascii_alphabetic() || c == b'_' {
      let start = i;
      while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
      }
      let kind = if KEYWORDS.contains(&&input[start..i]) {
        TokenKind::Keyword
      } else {
        TokenKind::Ident
      };
      tokens.push(Token::new(kind, start, i - start, None));
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      let value = input[start..i]
        .parse::<i64>()
        .map_err(|err| CompileError::lex(start, format!("invalid number: {err}")))?;
      tokens.push(Token::new(TokenKind::Num, start, i - start, Some(value)));
      continue;
    }

    if c == b'"' {
      let start = i;
      i += 1;
      loop {
        match bytes.get(i) {
          Some(b'"') => break,
          Some(b'\\') if i + 1 < bytes.len() && bytes[i + 1] != b'\n' => i += 2,
          Some(b'\n') | None => {
            return Err(CompileError::lex(start, "unterminated string literal"));
          }
          Some(_) => i += 1,
        }
      }
      i += 1;
      tokens.push(Token::new(TokenKind::Str, start, i - start, None));
      continue;
    }

    if ONE_CHAR_PUNCTUATORS.contains(&c) {
      tokens.push(Token::new(TokenKind::Punctuator, i, 1, None));
      i += 1;
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::lex(
      i,
      format!("invalid token: '{invalid_char}'"),
    ));
  }

  tokens.push(Token::new(TokenKind::Eof, input.len(), 0, None));
  debug!("tokenized {} bytes into {} tokens", input.len(), tokens.len());
  Ok(tokens)
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  match token {
    Some(t) => match t.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ if t.text(source) == "\n" => "newline".to_string(),
      _ => t.text(source).to_string(),
    },
    None => "EOF".to_string(),
  }
}
