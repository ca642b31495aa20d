//! Scanner (spec.md §4.1): a token stream with position and a keyword
//! dictionary. Tokens carry a byte [`Span`]; a human-readable [`Position`]
//! is resolved from it lazily, only when a diagnostic needs to be rendered,
//! keeping the hot lexing path allocation-free.

use span::Span;

use crate::error::{Error, Result};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Kw {
  Undef,
  And,
  Or,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
  My,
  If,
  Unless,
  While,
  Else,
  Sub,
  For,
  Do,
  Eval,
  Package,
  Scalar,
  Print,
  Next,
  Last,
  Return,
  Require,
  Go,
  M,
  S,
}

fn lookup_keyword(s: &str) -> Option<Kw> {
  Some(match s {
    "undef" => Kw::Undef,
    "and" => Kw::And,
    "or" => Kw::Or,
    "eq" => Kw::Eq,
    "ne" => Kw::Ne,
    "lt" => Kw::Lt,
    "le" => Kw::Le,
    "gt" => Kw::Gt,
    "ge" => Kw::Ge,
    "my" => Kw::My,
    "if" => Kw::If,
    "unless" => Kw::Unless,
    "while" => Kw::While,
    "else" => Kw::Else,
    "sub" => Kw::Sub,
    "for" => Kw::For,
    "do" => Kw::Do,
    "eval" => Kw::Eval,
    "package" => Kw::Package,
    "scalar" => Kw::Scalar,
    "print" => Kw::Print,
    "next" => Kw::Next,
    "last" => Kw::Last,
    "return" => Kw::Return,
    "require" => Kw::Require,
    "go" => Kw::Go,
    "m" => Kw::M,
    "s" => Kw::S,
    _ => return None,
  })
}

#[derive(Clone, Debug)]
pub enum TokenKind {
  Ident(String),
  Int(i64),
  Float(f64),
  /// A `$`/`@`/`%`-sigiled name, with the sigil stored separately.
  Sigil(char),
  Str(String),
  RawStr(String),
  /// `m/.../` or `s/.../.../` body split on its delimiters, with the
  /// trailing flag characters (e.g. `g`) kept verbatim.
  Regex { pattern: String, replacement: Option<String>, flags: String },
  Keyword(Kw),
  Punct(&'static str),
  Eof,
}

#[derive(Clone, Debug)]
pub struct Token {
  pub kind: TokenKind,
  pub span: Span,
}

pub struct Lexer<'src> {
  src: &'src str,
  bytes: &'src [u8],
  pos: usize,
}

const PUNCTS: &[&str] = &[
  "<=>", "...", "==", "!=", "<=", ">=", "&&", "||", "=~", "->", "=>", "+=", "-=", "*=", "/=", ".=", "%=", "++", "--",
  "+", "-", "*", "/", "%", ".", "=", "<", ">", "!", "~", "?", ":", "(", ")", "[", "]", "{", "}", ";", ",", "&", "|",
  "^", "$", "@",
];

impl<'src> Lexer<'src> {
  pub fn new(src: &'src str) -> Self {
    Lexer { src, bytes: src.as_bytes(), pos: 0 }
  }

  fn peek(&self) -> Option<u8> {
    self.bytes.get(self.pos).copied()
  }

  fn peek_at(&self, n: usize) -> Option<u8> {
    self.bytes.get(self.pos + n).copied()
  }

  fn bump(&mut self) -> Option<u8> {
    let b = self.peek()?;
    self.pos += 1;
    Some(b)
  }

  fn skip_trivia(&mut self) {
    loop {
      match self.peek() {
        Some(b) if b.is_ascii_whitespace() => {
          self.pos += 1;
        }
        Some(b'#') => {
          while let Some(b) = self.peek() {
            if b == b'\n' {
              break;
            }
            self.pos += 1;
          }
        }
        _ => break,
      }
    }
  }

  fn span_from(&self, start: usize) -> Span {
    Span { start, end: self.pos }
  }

  /// Reaches `__END__`: the rest of the source is ignored (spec.md §4.3).
  fn at_end_marker(&self) -> bool {
    self.src[self.pos..].starts_with("__END__")
  }

  pub fn next_token(&mut self) -> Result<Token> {
    self.skip_trivia();
    let start = self.pos;

    if self.pos >= self.bytes.len() || self.at_end_marker() {
      return Ok(Token { kind: TokenKind::Eof, span: self.span_from(start) });
    }

    let b = self.peek().unwrap();

    if b == b'"' || b == b'\'' {
      return self.lex_quoted(b == b'"');
    }

    if b.is_ascii_digit() {
      return self.lex_number();
    }

    if b == b'$' || b == b'@' || b == b'%' {
      // Bare sigil punctuation; the parser decides what follows.
      self.pos += 1;
      return Ok(Token { kind: TokenKind::Punct(match b {
        b'$' => "$",
        b'@' => "@",
        _ => "%",
      }), span: self.span_from(start) });
    }

    if b.is_ascii_alphabetic() || b == b'_' {
      return self.lex_ident_or_keyword();
    }

    for p in PUNCTS {
      if self.src[self.pos..].starts_with(p) {
        self.pos += p.len();
        return Ok(Token { kind: TokenKind::Punct(p), span: self.span_from(start) });
      }
    }

    Err(Error::lexical(format!("unexpected character {:?}", b as char), self.span_from(start)))
  }

  fn lex_ident_or_keyword(&mut self) -> Result<Token> {
    let start = self.pos;
    while let Some(b) = self.peek() {
      if b.is_ascii_alphanumeric() || b == b'_' {
        self.pos += 1;
      } else {
        break;
      }
    }
    let text = &self.src[start..self.pos];

    // `m` / `s` introduce regex literals only when immediately followed by
    // a delimiter (not whitespace), so `my` and `sub` aren't misparsed.
    if (text == "m" || text == "s") && matches!(self.peek(), Some(b) if !b.is_ascii_alphanumeric() && b != b'_' && b != b' ' ) {
      return self.lex_regex(text == "s", start);
    }

    if let Some(kw) = lookup_keyword(text) {
      return Ok(Token { kind: TokenKind::Keyword(kw), span: self.span_from(start) });
    }
    Ok(Token { kind: TokenKind::Ident(text.to_string()), span: self.span_from(start) })
  }

  fn lex_number(&mut self) -> Result<Token> {
    let start = self.pos;
    while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
      self.pos += 1;
    }
    let mut is_float = false;
    if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b) if b.is_ascii_digit()) {
      is_float = true;
      self.pos += 1;
      while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
        self.pos += 1;
      }
    }
    let text = &self.src[start..self.pos];
    if is_float {
      let v: f64 = text
        .parse()
        .map_err(|_| Error::lexical("invalid float literal", self.span_from(start)))?;
      Ok(Token { kind: TokenKind::Float(v), span: self.span_from(start) })
    } else {
      let v: i64 = text
        .parse()
        .map_err(|_| Error::lexical("invalid integer literal", self.span_from(start)))?;
      Ok(Token { kind: TokenKind::Int(v), span: self.span_from(start) })
    }
  }

  fn unquote_escape(&mut self, out: &mut String, raw: bool) -> Result<()> {
    let start = self.pos;
    self.pos += 1; // consume backslash
    let Some(b) = self.bump() else {
      return Err(Error::lexical("unterminated escape", self.span_from(start)));
    };
    if raw {
      match b {
        b'\\' => out.push('\\'),
        b'\'' => out.push('\''),
        other => {
          out.push('\\');
          out.push(other as char);
        }
      }
      return Ok(());
    }
    match b {
      b'n' => out.push('\n'),
      b't' => out.push('\t'),
      b'r' => out.push('\r'),
      b'\\' => out.push('\\'),
      b'"' => out.push('"'),
      b'$' => out.push('$'),
      b'@' => out.push('@'),
      b'0' => out.push('\0'),
      other => out.push(other as char),
    }
    Ok(())
  }

  fn lex_quoted(&mut self, double: bool) -> Result<Token> {
    let start = self.pos;
    let quote = self.bump().unwrap();
    let mut out = String::new();
    loop {
      match self.peek() {
        None => return Err(Error::lexical("unterminated string literal", self.span_from(start))),
        Some(b) if b == quote => {
          self.pos += 1;
          break;
        }
        Some(b'\\') => self.unquote_escape(&mut out, !double)?,
        Some(_) => {
          let ch_start = self.pos;
          let ch = self.src[ch_start..].chars().next().unwrap();
          out.push(ch);
          self.pos += ch.len_utf8();
        }
      }
    }
    let kind = if double { TokenKind::Str(out) } else { TokenKind::RawStr(out) };
    Ok(Token { kind, span: self.span_from(start) })
  }

  fn read_delimited(&mut self, delim: u8, start: usize) -> Result<String> {
    let close = match delim {
      b'(' => b')',
      b'{' => b'}',
      b'[' => b']',
      b'<' => b'>',
      other => other,
    };
    let mut out = String::new();
    loop {
      match self.peek() {
        None => return Err(Error::lexical("unterminated regex literal", self.span_from(start))),
        Some(b) if b == close => {
          self.pos += 1;
          break;
        }
        Some(b'\\') => {
          out.push('\\');
          self.pos += 1;
          if let Some(b) = self.bump() {
            out.push(b as char);
          }
        }
        Some(_) => {
          let ch = self.src[self.pos..].chars().next().unwrap();
          out.push(ch);
          self.pos += ch.len_utf8();
        }
      }
    }
    Ok(out)
  }

  fn lex_regex(&mut self, is_subst: bool, start: usize) -> Result<Token> {
    let delim = self.bump().unwrap();
    let pattern = self.read_delimited(delim, start)?;
    let replacement = if is_subst { Some(self.read_delimited(delim, start)?) } else { None };
    let flag_start = self.pos;
    while matches!(self.peek(), Some(b) if b.is_ascii_alphabetic()) {
      self.pos += 1;
    }
    let flags = self.src[flag_start..self.pos].to_string();
    Ok(Token { kind: TokenKind::Regex { pattern, replacement, flags }, span: self.span_from(start) })
  }
}

pub fn tokenize(src: &str) -> Result<Vec<Token>> {
  let mut lexer = Lexer::new(src);
  let mut out = Vec::new();
  loop {
    let tok = lexer.next_token()?;
    let is_eof = matches!(tok.kind, TokenKind::Eof);
    out.push(tok);
    if is_eof {
      break;
    }
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tokenizes_simple_assignment() {
    let toks = tokenize("my $x = 1 + 2;").unwrap();
    assert!(matches!(toks[0].kind, TokenKind::Keyword(Kw::My)));
    assert!(matches!(toks[1].kind, TokenKind::Punct("$")));
  }

  #[test]
  fn stops_at_end_marker() {
    let toks = tokenize("1; __END__\ngarbage(((").unwrap();
    assert!(matches!(toks.last().unwrap().kind, TokenKind::Eof));
  }

  #[test]
  fn regex_literal_splits_pattern_and_flags() {
    let toks = tokenize("m/(\\w+)/g").unwrap();
    match &toks[0].kind {
      TokenKind::Regex { pattern, flags, .. } => {
        assert_eq!(pattern, "(\\w+)");
        assert_eq!(flags, "g");
      }
      other => panic!("expected regex token, got {other:?}"),
    }
  }

  #[test]
  fn double_quoted_escapes() {
    let toks = tokenize("\"a\\nb\"").unwrap();
    assert!(matches!(&toks[0].kind, TokenKind::Str(s) if s == "a\nb"));
  }
}
