//! Classloader hierarchy (spec.md §6): each classloader owns a local module
//! table and falls back to a parent chain on miss, then to a
//! [`SourceLoader`] SPI that turns a name into source text to be parsed and
//! compiled on demand.
//!
//! Grounded on `examples/jprochazk-hebi/src/value/object/module.rs`'s
//! `ModuleRegistry` (a by-id table with lazy `init_state`) generalized to a
//! parent-chained hierarchy, since this language's modules are loaded by
//! name through a classloader tree rather than registered up front by a
//! single embedder-owned registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::ctx::Context;
use crate::emit;
use crate::error::{Error, Result};
use crate::syntax::parse;
use crate::value::object::module::{next_classloader_id, Module, ModuleHandle};

/// Resolves a dotted module name (`A::B::C`) to source text. The classloader
/// consults this only after both its own table and its parent chain miss
/// (spec.md §6.4).
pub trait SourceLoader: Send + Sync {
  fn load(&self, name: &str) -> Result<String>;
}

/// Maps `A::B::C` to `<root>/A/B/C.dm`, searched across a configurable path
/// list — the filesystem counterpart of `SourceLoader` that an embedder
/// wires up for script-driven (as opposed to host-registered) modules.
pub struct FileModuleLoader {
  roots: Vec<std::path::PathBuf>,
}

impl FileModuleLoader {
  pub fn new(roots: Vec<std::path::PathBuf>) -> Self {
    FileModuleLoader { roots }
  }

  fn relative_path(name: &str) -> std::path::PathBuf {
    let mut p = std::path::PathBuf::new();
    for part in name.split("::") {
      p.push(part);
    }
    p.set_extension("dm");
    p
  }
}

impl SourceLoader for FileModuleLoader {
  fn load(&self, name: &str) -> Result<String> {
    let rel = Self::relative_path(name);
    for root in &self.roots {
      let candidate = root.join(&rel);
      if let Ok(text) = std::fs::read_to_string(&candidate) {
        return Ok(text);
      }
    }
    Err(Error::runtime(format!("module `{name}` not found on any search path")))
  }
}

/// No modules beyond those already loaded into a classloader directly; an
/// embedder that never uses `require` with a dynamic loader can use this.
pub struct NoopSourceLoader;

impl SourceLoader for NoopSourceLoader {
  fn load(&self, name: &str) -> Result<String> {
    Err(Error::runtime(format!("module `{name}` not found (no source loader configured)")))
  }
}

enum Slot {
  Loading,
  Ready(Arc<Module>),
}

/// One node of the classloader tree. `load` is linearizable per name: a
/// racing second caller for the same name observes `Slot::Loading` and
/// waits on the table lock rather than compiling twice.
pub struct Classloader {
  id: u64,
  parent: Option<Arc<Classloader>>,
  modules: Mutex<HashMap<Arc<str>, Slot>>,
  loader: Box<dyn SourceLoader>,
}

impl Classloader {
  pub fn new(loader: Box<dyn SourceLoader>) -> Arc<Classloader> {
    Arc::new(Classloader {
      id: next_classloader_id(),
      parent: None,
      modules: Mutex::new(HashMap::new()),
      loader,
    })
  }

  pub fn child(parent: &Arc<Classloader>, loader: Box<dyn SourceLoader>) -> Arc<Classloader> {
    Arc::new(Classloader {
      id: next_classloader_id(),
      parent: Some(parent.clone()),
      modules: Mutex::new(HashMap::new()),
      loader,
    })
  }

  pub fn id(&self) -> u64 {
    self.id
  }

  /// Makes a pre-built module (e.g. a host-registered one) resolvable by
  /// name without going through the source loader.
  pub fn define(&self, name: impl Into<Arc<str>>, module: Arc<Module>) {
    self.modules.lock().unwrap().insert(name.into(), Slot::Ready(module));
  }

  fn find_local(&self, name: &str) -> Option<Arc<Module>> {
    match self.modules.lock().unwrap().get(name) {
      Some(Slot::Ready(m)) => Some(m.clone()),
      _ => None,
    }
  }

  fn find_in_chain(&self, name: &str) -> Option<Arc<Module>> {
    if let Some(m) = self.find_local(name) {
      return Some(m);
    }
    self.parent.as_ref().and_then(|p| p.find_in_chain(name))
  }

  /// Two-phase lookup (spec.md §6.4): local table, then parent chain, then
  /// `SourceLoader::load` + parse + compile, cached under this classloader
  /// for subsequent lookups.
  pub fn load(self: &Arc<Self>, name: &str) -> Result<Arc<Module>> {
    if let Some(m) = self.find_in_chain(name) {
      return Ok(m);
    }
    {
      let mut modules = self.modules.lock().unwrap();
      if let Some(Slot::Ready(m)) = modules.get(name) {
        return Ok(m.clone());
      }
      modules.insert(Arc::from(name), Slot::Loading);
    }
    let source = self.loader.load(name);
    // A fresh `Context` per compile: its `Rc`-backed string table never
    // needs to outlive a single parse+emit pass, and (unlike `Classloader`)
    // it must never be asked to cross a `go`-spawned thread boundary.
    let module = source.and_then(|text| {
      let ast = parse(&text)?;
      let ctx = Context::default();
      emit::emit(&ctx, &ast)
    });
    let mut modules = self.modules.lock().unwrap();
    match module {
      Ok(module) => {
        let module = Arc::new(module);
        modules.insert(Arc::from(name), Slot::Ready(module.clone()));
        Ok(module)
      }
      Err(e) => {
        modules.remove(name);
        Err(e)
      }
    }
  }

  pub fn handle(self: &Arc<Self>, name: impl Into<Arc<str>>) -> ModuleHandle {
    ModuleHandle::new(name, self.id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct StaticLoader(&'static str, &'static str);
  impl SourceLoader for StaticLoader {
    fn load(&self, name: &str) -> Result<String> {
      if name == self.0 {
        Ok(self.1.to_string())
      } else {
        Err(Error::runtime("not found"))
      }
    }
  }

  #[test]
  fn loads_and_caches_a_module_by_name() {
    let cl = Classloader::new(Box::new(StaticLoader("Foo", "my $x = 1;")));
    let m1 = cl.load("Foo").unwrap();
    let m2 = cl.load("Foo").unwrap();
    assert!(Arc::ptr_eq(&m1, &m2));
  }

  #[test]
  fn child_sees_parent_defined_modules() {
    let parent = Classloader::new(Box::new(NoopSourceLoader));
    let module = Arc::new(Module::new("Shared"));
    parent.define("Shared", module.clone());
    let child = Classloader::child(&parent, Box::new(NoopSourceLoader));
    assert!(Arc::ptr_eq(&child.load("Shared").unwrap(), &module));
  }

  #[test]
  fn missing_module_is_a_runtime_error() {
    let cl = Classloader::new(Box::new(NoopSourceLoader));
    assert!(cl.load("Nope").is_err());
  }
}
