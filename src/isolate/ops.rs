//! Arithmetic, comparison and regex dispatch tables for the isolate's
//! `BinOp`/`CmpOp`/`RegexMatch` family of instructions.
//!
//! Grounded on `examples/jprochazk-hebi/src/isolate/binop.rs` and `cmp.rs`'s
//! per-operator free-function shape, adapted to this language's "always
//! coerce, never a type error" arithmetic (spec.md §3): unlike the
//! teacher's `to_int()`/`to_float()` fallible coercions that raise a
//! `RuntimeError` on a non-numeric operand, `Scalar::as_int`/`as_float`
//! already total-function coerce (`"abc"` reads as `0`), so these never
//! fail.

use regex::Regex;

use crate::error::{Error, Result};
use crate::op::{BinOp, CmpOp};
use crate::value::Scalar;

fn numeric_float(op: BinOp, a: f64, b: f64) -> Result<Scalar> {
  Ok(match op {
    BinOp::Add => Scalar::Float(a + b),
    BinOp::Sub => Scalar::Float(a - b),
    BinOp::Mul => Scalar::Float(a * b),
    BinOp::Div => Scalar::Float(a / b),
    BinOp::Rem => Scalar::Float(a % b),
    BinOp::Concat => unreachable!("concat dispatched separately"),
  })
}

fn numeric_int(op: BinOp, a: i64, b: i64) -> Result<Scalar> {
  Ok(match op {
    BinOp::Add => Scalar::Int(a.wrapping_add(b)),
    BinOp::Sub => Scalar::Int(a.wrapping_sub(b)),
    BinOp::Mul => Scalar::Int(a.wrapping_mul(b)),
    BinOp::Div => {
      if b == 0 {
        return Err(Error::runtime("division by zero"));
      }
      Scalar::Int(a.wrapping_div(b))
    }
    BinOp::Rem => {
      if b == 0 {
        return Err(Error::runtime("division by zero"));
      }
      Scalar::Int(a.wrapping_rem(b))
    }
    BinOp::Concat => unreachable!("concat dispatched separately"),
  })
}

/// Promotes to float arithmetic the moment either operand is a `Float`
/// (spec.md §3's coercion rule); otherwise both sides coerce to `Int`.
pub fn binop(op: BinOp, a: &Scalar, b: &Scalar) -> Result<Scalar> {
  if matches!(op, BinOp::Concat) {
    return Ok(a.concat(b));
  }
  if a.is_float() || b.is_float() {
    numeric_float(op, a.as_float(), b.as_float())
  } else {
    numeric_int(op, a.as_int(), b.as_int())
  }
}

pub fn cmp(op: CmpOp, a: &Scalar, b: &Scalar) -> Scalar {
  let result = match op {
    CmpOp::NumEq => a.as_float() == b.as_float(),
    CmpOp::NumNe => a.as_float() != b.as_float(),
    CmpOp::NumLt => a.as_float() < b.as_float(),
    CmpOp::NumLe => a.as_float() <= b.as_float(),
    CmpOp::NumGt => a.as_float() > b.as_float(),
    CmpOp::NumGe => a.as_float() >= b.as_float(),
    CmpOp::StrEq => a.as_string() == b.as_string(),
    CmpOp::StrNe => a.as_string() != b.as_string(),
    CmpOp::StrLt => a.as_string() < b.as_string(),
    CmpOp::StrLe => a.as_string() <= b.as_string(),
    CmpOp::StrGt => a.as_string() > b.as_string(),
    CmpOp::StrGe => a.as_string() >= b.as_string(),
  };
  Scalar::Int(result as i64)
}

pub fn unop(op: crate::op::UnOp, a: &Scalar) -> Scalar {
  match op {
    crate::op::UnOp::Neg => {
      if a.is_float() {
        Scalar::Float(-a.as_float())
      } else {
        Scalar::Int(-a.as_int())
      }
    }
    crate::op::UnOp::Plus => {
      if a.is_float() {
        Scalar::Float(a.as_float())
      } else {
        Scalar::Int(a.as_int())
      }
    }
    crate::op::UnOp::BitNot => Scalar::Int(!a.as_int()),
    crate::op::UnOp::Not => Scalar::Int(!a.as_bool() as i64),
  }
}

pub fn compile_regex(pattern: &str) -> Result<Regex> {
  Regex::new(pattern).map_err(|e| Error::regex(e.to_string(), Default::default()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn int_arithmetic_stays_int_until_a_float_operand_appears() {
    assert!(matches!(binop(BinOp::Add, &Scalar::Int(1), &Scalar::Int(2)).unwrap(), Scalar::Int(3)));
    assert!(matches!(binop(BinOp::Add, &Scalar::Int(1), &Scalar::Float(2.0)).unwrap(), Scalar::Float(f) if f == 3.0));
  }

  #[test]
  fn division_by_zero_is_a_runtime_error() {
    assert!(binop(BinOp::Div, &Scalar::Int(1), &Scalar::Int(0)).is_err());
  }

  #[test]
  fn string_comparison_is_lexical() {
    assert!(matches!(cmp(CmpOp::StrLt, &Scalar::str("a"), &Scalar::str("b")), Scalar::Int(1)));
  }
}
