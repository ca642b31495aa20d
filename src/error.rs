//! The error taxonomy from spec.md §7: Lexical, Parse, Compile, Regex and
//! Runtime errors, each optionally carrying a [`Span`] so it can be rendered
//! through [`diag::Report`].

use std::fmt::{self, Display};

use span::Span;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A message with an optional source location. Compile-time error kinds
/// (lexical/parse/compile/regex) always carry a span; runtime errors may
/// not, since some failures (e.g. a host-reported error) have no
/// associated source position.
#[derive(Debug, Clone)]
pub struct Located {
  pub message: String,
  pub span: Option<Span>,
}

impl Display for Located {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.message)
  }
}

#[derive(Debug)]
pub enum Error {
  /// Unterminated literal, invalid escape. Aborts compilation.
  Lexical(Located),
  /// Unexpected token, or failure past a cut marker. Aborts compilation.
  Parse(Located),
  /// Redeclaration, assignment to a non-assignable expression, unknown
  /// operator. Aborts compilation.
  Compile(Located),
  /// Invalid regex pattern, detected at compile time. Aborts compilation.
  Regex(Located),
  /// Nil-dereference, missing method, module load failure. Terminates the
  /// current call; recovered silently in a `go`-spawned task.
  Runtime(Located),
  /// An error surfaced by a host binding.
  User(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
  pub fn lexical(message: impl Into<String>, span: Span) -> Self {
    Error::Lexical(Located {
      message: message.into(),
      span: Some(span),
    })
  }

  pub fn parse(message: impl Into<String>, span: Span) -> Self {
    Error::Parse(Located {
      message: message.into(),
      span: Some(span),
    })
  }

  pub fn compile(message: impl Into<String>, span: Span) -> Self {
    Error::Compile(Located {
      message: message.into(),
      span: Some(span),
    })
  }

  pub fn regex(message: impl Into<String>, span: Span) -> Self {
    Error::Regex(Located {
      message: message.into(),
      span: Some(span),
    })
  }

  /// A runtime error with no known source position (e.g. raised deep inside
  /// value coercion code that doesn't carry a span).
  pub fn runtime(message: impl Into<String>) -> Self {
    Error::Runtime(Located {
      message: message.into(),
      span: None,
    })
  }

  pub fn runtime_at(message: impl Into<String>, span: Span) -> Self {
    Error::Runtime(Located {
      message: message.into(),
      span: Some(span),
    })
  }

  pub fn user(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Error::User(Box::new(err))
  }

  pub fn span(&self) -> Option<Span> {
    match self {
      Error::Lexical(l) | Error::Parse(l) | Error::Compile(l) | Error::Regex(l) | Error::Runtime(l) => l.span,
      Error::User(_) => None,
    }
  }

  /// Whether this error kind is fatal to the whole compilation (as opposed
  /// to terminating only the current call, per spec.md §7).
  pub fn aborts_compilation(&self) -> bool {
    matches!(
      self,
      Error::Lexical(_) | Error::Parse(_) | Error::Compile(_) | Error::Regex(_)
    )
  }

  /// Render this error as a [`diag::Report`] against `source`, for
  /// embedders that want the teacher-style `error: ... > file:line` output.
  pub fn report<'a>(&'a self, source: impl Into<diag::Source<'a>>) -> diag::Report<'a> {
    let span = self.span().unwrap_or_default();
    diag::Report::error()
      .source(source)
      .message(self.to_string())
      .span(span)
      .build()
  }
}

impl Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Error::Lexical(l) => write!(f, "lexical error: {l}"),
      Error::Parse(l) => write!(f, "parse error: {l}"),
      Error::Compile(l) => write!(f, "compile error: {l}"),
      Error::Regex(l) => write!(f, "regex error: {l}"),
      Error::Runtime(l) => write!(f, "runtime error: {l}"),
      Error::User(e) => write!(f, "{e}"),
    }
  }
}

impl std::error::Error for Error {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Error::User(e) => Some(e.as_ref()),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn runtime_error_has_no_span_by_default() {
    let err = Error::runtime("undefined global foo");
    assert_eq!(err.span(), None);
    assert!(!err.aborts_compilation());
  }

  #[test]
  fn compile_error_aborts() {
    let err = Error::compile("redeclaration of `x`", Span { start: 0, end: 1 });
    assert!(err.aborts_compilation());
  }
}
