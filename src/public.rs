//! The embedder-facing conversions between [`Scalar`] and ordinary Rust
//! types (spec.md §6.5's host boundary). Mirrors the teacher's
//! `public::conv::{FromHebi, IntoHebi}` pair, renamed to this language's
//! vocabulary and simplified: there is no arena-borrowed `Value<'a>` here
//! because `Scalar` already owns everything it needs (`Arc<str>`, `Arc<[u8]>`,
//! `Reference`) without borrowing from the interpreter.

use crate::error::Result;
use crate::value::Scalar;

/// Converts a [`Scalar`] returned from script code into a Rust value.
pub trait FromCamel: Sized {
  fn from_camel(value: Scalar) -> Result<Self>;
}

/// Converts a Rust value into a [`Scalar`] to pass into script code.
pub trait IntoCamel {
  fn into_camel(self) -> Scalar;
}

impl FromCamel for Scalar {
  fn from_camel(value: Scalar) -> Result<Self> {
    Ok(value)
  }
}

impl IntoCamel for Scalar {
  fn into_camel(self) -> Scalar {
    self
  }
}

impl FromCamel for () {
  fn from_camel(_value: Scalar) -> Result<Self> {
    Ok(())
  }
}

impl FromCamel for i64 {
  fn from_camel(value: Scalar) -> Result<Self> {
    Ok(value.as_int())
  }
}

impl FromCamel for f64 {
  fn from_camel(value: Scalar) -> Result<Self> {
    Ok(value.as_float())
  }
}

impl FromCamel for bool {
  fn from_camel(value: Scalar) -> Result<Self> {
    Ok(value.as_bool())
  }
}

impl FromCamel for String {
  fn from_camel(value: Scalar) -> Result<Self> {
    Ok(value.as_string().to_string())
  }
}

impl FromCamel for Vec<u8> {
  fn from_camel(value: Scalar) -> Result<Self> {
    Ok(value.as_bytes().to_vec())
  }
}

impl IntoCamel for i64 {
  fn into_camel(self) -> Scalar {
    Scalar::Int(self)
  }
}

impl IntoCamel for f64 {
  fn into_camel(self) -> Scalar {
    Scalar::Float(self)
  }
}

impl IntoCamel for bool {
  fn into_camel(self) -> Scalar {
    Scalar::Int(self as i64)
  }
}

impl IntoCamel for &str {
  fn into_camel(self) -> Scalar {
    Scalar::str(self)
  }
}

impl IntoCamel for String {
  fn into_camel(self) -> Scalar {
    Scalar::str(self)
  }
}

impl<T: IntoCamel> IntoCamel for Option<T> {
  fn into_camel(self) -> Scalar {
    match self {
      Some(v) => v.into_camel(),
      None => Scalar::Null,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scalar_round_trips_through_into_and_from_camel() {
    let s: Scalar = 42i64.into_camel();
    assert_eq!(i64::from_camel(s).unwrap(), 42);
  }

  #[test]
  fn string_conversions() {
    let s = "hello".into_camel();
    assert_eq!(String::from_camel(s).unwrap(), "hello");
  }
}
