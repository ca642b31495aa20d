//! Host binding (spec.md §6.5): the concrete machinery that lets a host
//! embedder reflect Rust functions into a `Module`'s callable namespace.
//! Reflection over arbitrary host objects is explicitly out of scope — what
//! lives here is the thin, explicit registration path a CLI or embedding
//! crate builds built-ins on top of.
//!
//! Grounded on `examples/jprochazk-hebi/src/value/object/native.rs`'s
//! native-function-as-module-entry idea; the macro that produces a
//! `NativeFn` from a plain `fn` lives in `camel_derive::host_fn`.

pub use crate::value::object::native::NativeFn;
use crate::value::object::module::Module;

/// Registers every function a `#[host_fn]` shim group produced into
/// `module`'s callable namespace, so script code can call them by name the
/// same way it calls a compiled sub.
///
/// ```ignore
/// #[camel_derive::host_fn]
/// fn say_hello(thread: &ThreadState) -> camel::Result<()> {
///   let name = thread.native_args().first().cloned().unwrap_or(Scalar::Null).as_string();
///   thread.set_native_return(Scalar::str(format!("hello, {name}")));
///   Ok(())
/// }
///
/// builtins::register_into(&module, [__host_fn_say_hello()]);
/// ```
pub fn register_into(module: &Module, natives: impl IntoIterator<Item = NativeFn>) {
  for native in natives {
    module.define_native(native);
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::classloader::{Classloader, NoopSourceLoader};
  use crate::error::Result;
  use crate::isolate::ThreadState;
  use crate::value::Scalar;

  fn shout(thread: &ThreadState) -> Result<()> {
    let arg = thread.native_args().first().cloned().unwrap_or(Scalar::Null).as_string();
    thread.set_native_return(Scalar::str(arg.to_uppercase()));
    Ok(())
  }

  #[test]
  fn registered_native_is_reachable_as_a_module_callable() {
    let module = Module::new("Main");
    register_into(&module, [NativeFn::new("shout", shout)]);
    let callable = module.callable("shout").expect("registered native should be found");
    let thread = ThreadState::new(Classloader::new(Box::new(NoopSourceLoader)), Box::new(std::io::sink()));
    let module = Arc::new(module);
    let result = thread.call(&module, &callable, vec![Scalar::str("hi")]).unwrap();
    assert_eq!(result.as_string().as_ref(), "HI");
  }
}
