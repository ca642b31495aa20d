//! String interning context, shared by the parser, compiler and runtime.
//!
//! Identifiers and string literals are interned once so that later equality
//! checks (global name lookup, hash-key comparison) are pointer/length
//! comparisons rather than byte-by-byte ones.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use beef::lean::Cow;
use indexmap::IndexMap;

#[derive(Default, Clone)]
pub struct Context {
  inner: Rc<RefCell<Inner>>,
}

#[derive(Default)]
struct Inner {
  string_table: IndexMap<Cow<'static, str>, Arc<str>>,
}

impl Context {
  pub fn intern(&self, s: impl Into<Cow<'static, str>>) -> Arc<str> {
    let s = s.into();

    if let Some(s) = self.inner.borrow().string_table.get(&s) {
      return s.clone();
    }

    let v: Arc<str> = Arc::from(s.as_ref());
    self.inner.borrow_mut().string_table.insert(s, v.clone());
    v
  }
}

impl Context {
  #[cfg(test)]
  pub(crate) fn for_test() -> Context {
    Context::default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interning_returns_same_allocation() {
    let ctx = Context::for_test();
    let a = ctx.intern("hello");
    let b = ctx.intern("hello".to_string());
    assert!(Arc::ptr_eq(&a, &b));
  }
}
