//! Register allocator (spec.md §4.4): a `Defined` name→register table plus a
//! monotonic high-water mark. Unlike the source's temporary free-list with
//! use-counts, this allocator never reuses a temporary once assigned — every
//! `fresh()` bumps the high-water mark. That trades a denser register file
//! for a much simpler allocator; register counts are a compile-time detail
//! with no behavioral effect, so the tradeoff costs nothing but a few extra
//! register slots per `Procedure`.
use std::collections::HashMap;

use crate::error::{Error, Result};

/// One class (scalar, array or hash) of a procedure's register file.
#[derive(Default)]
pub struct RegAlloc {
  defined: HashMap<String, u16>,
  next: u16,
  scopes: Vec<Vec<(String, Option<u16>)>>,
}

impl RegAlloc {
  pub fn new() -> Self {
    RegAlloc { defined: HashMap::new(), next: 0, scopes: vec![Vec::new()] }
  }

  /// A fresh register with no name bound to it.
  pub fn fresh(&mut self) -> u16 {
    let r = self.next;
    self.next += 1;
    r
  }

  /// Opens a lexical scope; names defined within it are unbound again on
  /// [`Self::pop_scope`], restoring whatever binding (if any) shadowed.
  pub fn push_scope(&mut self) {
    self.scopes.push(Vec::new());
  }

  pub fn pop_scope(&mut self) {
    let scope = self.scopes.pop().expect("scope stack underflow");
    for (name, prev) in scope.into_iter().rev() {
      match prev {
        Some(r) => {
          self.defined.insert(name, r);
        }
        None => {
          self.defined.remove(&name);
        }
      }
    }
  }

  /// Binds `name` to a fresh register in the current scope, shadowing any
  /// outer binding of the same name for the scope's lifetime. Rejects a
  /// second `my` of the same name within the same scope.
  pub fn define(&mut self, name: &str) -> Result<u16> {
    if self.scopes.last().expect("no open scope").iter().any(|(n, _)| n == name) {
      return Err(redeclaration_error(name));
    }
    let r = self.fresh();
    let prev = self.defined.insert(name.to_string(), r);
    self.scopes.last_mut().expect("no open scope").push((name.to_string(), prev));
    Ok(r)
  }

  pub fn lookup(&self, name: &str) -> Option<u16> {
    self.defined.get(name).copied()
  }

  /// Rebinds `name` to a fresh register without the same-scope redeclaration
  /// check `define` applies. Used for regex capture registers (`$1`, `$2`,
  /// ...), which Perl rebinds on every match rather than lexically scoping.
  pub fn bind(&mut self, name: &str) -> u16 {
    let r = self.fresh();
    self.defined.insert(name.to_string(), r);
    r
  }

  pub fn high_water(&self) -> u16 {
    self.next
  }
}

/// The compiler's calling convention for where a compiled value lands
/// (spec.md §4.4's "Target Hint" / ScTH).
#[derive(Clone, Copy, Debug)]
pub enum TargetHint {
  Any,
  Discard,
  Exact(u16),
}

impl TargetHint {
  pub fn resolve(self, alloc: &mut RegAlloc) -> u16 {
    match self {
      TargetHint::Exact(r) => r,
      TargetHint::Any | TargetHint::Discard => alloc.fresh(),
    }
  }
}

pub fn redeclaration_error(name: &str) -> Error {
  Error::compile(format!("redeclaration of `{name}`"), Default::default())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn shadowing_restores_outer_binding_on_scope_exit() {
    let mut ra = RegAlloc::new();
    let outer = ra.define("x").unwrap();
    ra.push_scope();
    let inner = ra.define("x").unwrap();
    assert_ne!(outer, inner);
    assert_eq!(ra.lookup("x"), Some(inner));
    ra.pop_scope();
    assert_eq!(ra.lookup("x"), Some(outer));
  }

  #[test]
  fn rejects_redeclaration_in_same_scope() {
    let mut ra = RegAlloc::new();
    ra.define("x").unwrap();
    assert!(ra.define("x").is_err());
  }

  #[test]
  fn high_water_mark_tracks_every_fresh_register() {
    let mut ra = RegAlloc::new();
    ra.fresh();
    ra.fresh();
    assert_eq!(ra.high_water(), 2);
  }
}
