//! Module and ModuleHandle (spec.md §3). The source-loader SPI that backs
//! `require` (spec.md §6.4) lives in [`crate::classloader`], one level up,
//! since resolving a name to a `Module` is a classloader concern rather
//! than something a `Module` does to itself.
//!
//! Grounded on `examples/jprochazk-hebi/src/value/object/module.rs`'s
//! `ModuleRegistry`/`Path` shapes; globals here are three separate maps
//! (scalars/arrays/hashes) per spec.md §3 rather than one generic table,
//! and use coarse per-kind locks rather than per-slot locking — the weaker
//! of the two options spec.md §9's "Globals concurrency" design note
//! permits, documented in DESIGN.md.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use crate::value::object::native::NativeFn;
use crate::value::object::procedure::Procedure;
use crate::value::{Av, Hv, Scalar};

/// Anything a `SubCall`/`MethodCall` instruction can target: compiled
/// bytecode, or a host function registered via `#[host_fn]`.
#[derive(Clone)]
pub enum Callable {
  Procedure(Arc<Procedure>),
  Native(Arc<NativeFn>),
}

#[derive(Default)]
pub struct Module {
  pub name: Arc<str>,
  pub main: OnceLock<Arc<Procedure>>,
  procedures: RwLock<HashMap<Arc<str>, Arc<Procedure>>>,
  natives: Mutex<HashMap<Arc<str>, Arc<NativeFn>>>,
  scalars: Mutex<HashMap<Arc<str>, Scalar>>,
  arrays: Mutex<HashMap<Arc<str>, Arc<Mutex<Av>>>>,
  hashes: Mutex<HashMap<Arc<str>, Arc<Mutex<Hv>>>>,
}

impl Module {
  pub fn new(name: impl Into<Arc<str>>) -> Self {
    Module {
      name: name.into(),
      ..Default::default()
    }
  }

  pub fn set_main(&self, main: Arc<Procedure>) {
    let _ = self.main.set(main);
  }

  pub fn define_procedure(&self, proc: Arc<Procedure>) {
    self.procedures.write().unwrap().insert(proc.name.clone(), proc);
  }

  pub fn procedure(&self, name: &str) -> Option<Arc<Procedure>> {
    self.procedures.read().unwrap().get(name).cloned()
  }

  pub fn define_native(&self, native: NativeFn) {
    let native = Arc::new(native);
    self.natives.lock().unwrap().insert(Arc::from(native.name), native);
  }

  /// Looks up `name` as a compiled procedure first, falling back to a
  /// registered host function — the two namespaces share a name, the same
  /// way `examples/jprochazk-hebi/src/value/object/module.rs`'s single
  /// registry doesn't distinguish a function's origin from its callers.
  pub fn callable(&self, name: &str) -> Option<Callable> {
    if let Some(proc) = self.procedure(name) {
      return Some(Callable::Procedure(proc));
    }
    self.natives.lock().unwrap().get(name).cloned().map(Callable::Native)
  }

  /// Auto-vivifies on first write, per spec.md §3.
  pub fn get_scalar(&self, name: &str) -> Scalar {
    self.scalars.lock().unwrap().get(name).cloned().unwrap_or(Scalar::Null)
  }

  pub fn set_scalar(&self, name: Arc<str>, value: Scalar) {
    self.scalars.lock().unwrap().insert(name, value);
  }

  pub fn array(&self, name: &str) -> Arc<Mutex<Av>> {
    let mut arrays = self.arrays.lock().unwrap();
    arrays
      .entry(Arc::from(name))
      .or_insert_with(|| Arc::new(Mutex::new(Av::new())))
      .clone()
  }

  pub fn hash(&self, name: &str) -> Arc<Mutex<Hv>> {
    let mut hashes = self.hashes.lock().unwrap();
    hashes
      .entry(Arc::from(name))
      .or_insert_with(|| Arc::new(Mutex::new(Hv::new())))
      .clone()
  }
}

static NEXT_CLASSLOADER_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

pub fn next_classloader_id() -> u64 {
  NEXT_CLASSLOADER_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
}

/// `{name, classloader-identity, resolved-module?}` (spec.md §3). Equality
/// is by `(classloader_id, name)`; resolution is cached lazily.
#[derive(Clone)]
pub struct ModuleHandle {
  pub name: Arc<str>,
  pub classloader_id: u64,
  resolved: Arc<OnceLock<Arc<Module>>>,
}

impl std::fmt::Debug for ModuleHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ModuleHandle").field("name", &self.name).finish()
  }
}

impl ModuleHandle {
  pub fn new(name: impl Into<Arc<str>>, classloader_id: u64) -> Self {
    ModuleHandle {
      name: name.into(),
      classloader_id,
      resolved: Arc::new(OnceLock::new()),
    }
  }

  pub fn resolve_with(&self, f: impl FnOnce() -> Option<Arc<Module>>) -> Option<Arc<Module>> {
    if let Some(m) = self.resolved.get() {
      return Some(m.clone());
    }
    let m = f()?;
    let _ = self.resolved.set(m.clone());
    Some(m)
  }

  pub fn cached(&self) -> Option<Arc<Module>> {
    self.resolved.get().cloned()
  }
}

impl PartialEq for ModuleHandle {
  fn eq(&self, other: &Self) -> bool {
    self.classloader_id == other.classloader_id && self.name == other.name
  }
}
impl Eq for ModuleHandle {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn handle_equality_is_classloader_and_name() {
    let a = ModuleHandle::new("Foo", 1);
    let b = ModuleHandle::new("Foo", 1);
    let c = ModuleHandle::new("Foo", 2);
    assert_eq!(a, b);
    assert_ne!(a, c);
  }

  #[test]
  fn globals_auto_vivify() {
    let m = Module::new("Main");
    assert!(matches!(m.get_scalar("x"), Scalar::Null));
    m.set_scalar(Arc::from("x"), Scalar::Int(5));
    assert_eq!(m.get_scalar("x").as_int(), 5);
  }

  #[test]
  fn procedures_take_precedence_over_natives_of_the_same_name() {
    let m = Module::new("Main");
    m.define_native(NativeFn::new("dup", |_| Ok(())));
    assert!(matches!(m.callable("dup"), Some(Callable::Native(_))));
    m.define_procedure(Arc::new(Procedure::new(
      "dup",
      Default::default(),
      Vec::new(),
      Vec::new(),
    )));
    assert!(matches!(m.callable("dup"), Some(Callable::Procedure(_))));
  }
}
