#![allow(clippy::wrong_self_convention)]

pub mod builtins;
pub mod classloader;
mod ctx;
pub mod emit;
pub mod error;
pub mod isolate;
pub mod op;
pub mod public;
pub mod syntax;
pub mod value;

use std::io::Write;
use std::sync::Arc;

pub use error::Error;
pub use public::{FromCamel, IntoCamel};

pub type Result<T, E = Error> = std::result::Result<T, E>;

use classloader::{Classloader, NoopSourceLoader, SourceLoader};
use isolate::ThreadState;
use value::object::module::Module;

/// An interpreter instance: one classloader hierarchy and one thread of
/// execution, the way `examples/jprochazk-hebi`'s `Hebi` bundles a `Context`
/// and an `Isolate`. Unlike `Hebi`, nothing here borrows an `Rc`, so `Camel`
/// needs no unsafe `Send` impl — `ThreadState` and `Classloader` are
/// ordinarily `Send + Sync`.
pub struct Camel {
  thread: Arc<ThreadState>,
}

impl Camel {
  pub fn builder() -> CamelBuilder {
    CamelBuilder {
      stdout: None,
      loader: None,
    }
  }

  /// Parses, compiles and runs `src` as an anonymous module's `main` body,
  /// converting its result into `T`.
  pub fn eval<T: FromCamel>(&self, src: &str) -> Result<T> {
    let ast = syntax::parse(src)?;
    let ctx = ctx::Context::default();
    let module = Arc::new(emit::emit(&ctx, &ast)?);
    let result = self.thread.run_main(&module)?;
    T::from_camel(result)
  }

  /// Checks that `src` parses without running it.
  pub fn check(&self, src: &str) -> Result<()> {
    syntax::parse(src)?;
    Ok(())
  }

  pub fn globals(&self) -> &Classloader {
    self.thread.classloader.as_ref()
  }

  /// Exposes every function in `natives` under `module_name`, loadable from
  /// script code the same way any other module is (`require Foo;`).
  pub fn register_builtins(&self, module_name: impl Into<Arc<str>>, natives: impl IntoIterator<Item = builtins::NativeFn>) {
    let module = Module::new(module_name.into());
    builtins::register_into(&module, natives);
    self.thread.classloader.define(module.name.clone(), Arc::new(module));
  }
}

pub struct CamelBuilder {
  stdout: Option<Box<dyn Write + Send>>,
  loader: Option<Box<dyn SourceLoader>>,
}

impl CamelBuilder {
  pub fn with_stdout(mut self, stdout: impl Write + Send + 'static) -> Self {
    self.stdout = Some(Box::new(stdout));
    self
  }

  pub fn with_module_loader(mut self, loader: impl SourceLoader + 'static) -> Self {
    self.loader = Some(Box::new(loader));
    self
  }

  pub fn build(mut self) -> Camel {
    let stdout = self.stdout.take().unwrap_or_else(|| Box::new(std::io::stdout()));
    let loader = self.loader.take().unwrap_or_else(|| Box::new(NoopSourceLoader) as Box<dyn SourceLoader>);
    let classloader = Classloader::new(loader);
    Camel {
      thread: ThreadState::new(classloader, stdout),
    }
  }
}

impl Default for Camel {
  fn default() -> Self {
    Self::builder().build()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use value::Scalar;

  #[test]
  fn eval_returns_an_explicit_top_level_return() {
    let camel = Camel::default();
    let n: i64 = camel.eval("return 1 + 2;").unwrap();
    assert_eq!(n, 3);
  }

  #[test]
  fn eval_runs_print_against_the_configured_stdout() {
    let out = Arc::new(std::sync::Mutex::new(Vec::new()));
    struct Sink(Arc<std::sync::Mutex<Vec<u8>>>);
    impl Write for Sink {
      fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
      }
      fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
      }
    }
    let camel = Camel::builder().with_stdout(Sink(out.clone())).build();
    let _: Scalar = camel.eval("print \"hi\";").unwrap();
    assert_eq!(String::from_utf8(out.lock().unwrap().clone()).unwrap(), "hi");
  }
}
