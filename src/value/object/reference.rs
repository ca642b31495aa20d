//! Reference — a heap-allocated cell with stable identity (spec.md §3).
//!
//! Payloads are shared via `Arc<Mutex<_>>` rather than `Rc<RefCell<_>>`
//! because a reference must remain usable after a `go`-spawn snapshot moves
//! it onto an independent OS thread (spec.md §4.9, §5's "AV/HV behind
//! references are shared"). Identity uses a process-global monotonic
//! counter rather than the original's address-derived `Refid uintptr`
//! (`examples/original_source/values/types.go`), since `Arc` payloads may be
//! relocated by clone/drop and addresses aren't stable handles here.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use crate::value::{Av, Hv, ModuleHandle, Scalar};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
  NEXT_ID.fetch_add(1, AtomicOrdering::Relaxed)
}

#[derive(Debug)]
pub enum Payload {
  Scalar(Scalar),
  Av(Av),
  Hv(Hv),
}

#[derive(Clone, Debug)]
pub struct Reference {
  id: u64,
  payload: Arc<Mutex<Payload>>,
  blessed: Option<ModuleHandle>,
}

impl Reference {
  fn new(payload: Payload) -> Self {
    Reference {
      id: next_id(),
      payload: Arc::new(Mutex::new(payload)),
      blessed: None,
    }
  }

  pub fn scalar(s: Scalar) -> Self {
    Reference::new(Payload::Scalar(s))
  }

  pub fn av(av: Av) -> Self {
    Reference::new(Payload::Av(av))
  }

  pub fn hv(hv: Hv) -> Self {
    Reference::new(Payload::Hv(hv))
  }

  pub fn id(&self) -> u64 {
    self.id
  }

  pub fn bless(&mut self, module: ModuleHandle) {
    self.blessed = Some(module);
  }

  pub fn blessed(&self) -> Option<&ModuleHandle> {
    self.blessed.as_ref()
  }

  pub fn with_payload<R>(&self, f: impl FnOnce(&Payload) -> R) -> R {
    let guard = self.payload.lock().unwrap_or_else(|e| e.into_inner());
    f(&guard)
  }

  pub fn with_payload_mut<R>(&self, f: impl FnOnce(&mut Payload) -> R) -> R {
    let mut guard = self.payload.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut guard)
  }

  /// Dereferences a scalar-cell payload, returning `Null` for any other
  /// payload kind (a runtime type error is raised by the caller instead).
  pub fn get_scalar(&self) -> Option<Scalar> {
    self.with_payload(|p| match p {
      Payload::Scalar(s) => Some(s.clone()),
      _ => None,
    })
  }

  pub fn set_scalar(&self, value: Scalar) -> bool {
    self.with_payload_mut(|p| match p {
      Payload::Scalar(s) => {
        *s = value;
        true
      }
      _ => false,
    })
  }
}

impl PartialEq for Reference {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}
impl Eq for Reference {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn identity_is_stable_and_unique() {
    let a = Reference::scalar(Scalar::Int(1));
    let b = a.clone();
    let c = Reference::scalar(Scalar::Int(1));
    assert_eq!(a, b);
    assert_ne!(a, c);
  }

  #[test]
  fn shares_mutation_through_clones() {
    let r = Reference::scalar(Scalar::Int(1));
    let r2 = r.clone();
    r.set_scalar(Scalar::Int(42));
    assert_eq!(r2.get_scalar().unwrap().as_int(), 42);
  }
}
