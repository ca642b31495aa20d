//! Host functions (spec.md §6.5): a name plus a function pointer the
//! `#[host_fn]` macro in `camel_derive` produces from an ordinary Rust
//! `fn(&ThreadState) -> Result<()>`.
//!
//! Grounded on `examples/jprochazk-hebi/src/value/object/native.rs`'s
//! native-function-as-registry-entry shape, simplified to a bare function
//! pointer — this language's host functions don't need the teacher's
//! closure-capturing `NativeFunction` (no bound-method currying), since
//! every host call is dispatched by name from a `Module`.

use crate::error::Result;
use crate::isolate::ThreadState;
use crate::value::Scalar;

pub struct NativeFn {
  pub name: &'static str,
  func: fn(&ThreadState) -> Result<()>,
}

impl NativeFn {
  pub const fn new(name: &'static str, func: fn(&ThreadState) -> Result<()>) -> Self {
    NativeFn { name, func }
  }

  /// Runs the wrapped function with `args` bound as its `@_`, returning
  /// whatever it left in the thread's native-return slot (`Null` if it
  /// never set one).
  pub fn call(&self, thread: &ThreadState, args: Vec<Scalar>) -> Result<Scalar> {
    thread.enter_native(args);
    (self.func)(thread)?;
    Ok(thread.take_native_return())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::classloader::{Classloader, NoopSourceLoader};

  fn test_thread() -> std::sync::Arc<ThreadState> {
    ThreadState::new(Classloader::new(Box::new(NoopSourceLoader)), Box::new(std::io::sink()))
  }

  fn double(thread: &ThreadState) -> Result<()> {
    let args = thread.native_args();
    let n = args.first().cloned().unwrap_or(Scalar::Null).as_int();
    thread.set_native_return(Scalar::Int(n * 2));
    Ok(())
  }

  #[test]
  fn native_fn_round_trips_args_and_return() {
    let thread = test_thread();
    let native = NativeFn::new("double", double);
    let result = native.call(&thread, vec![Scalar::Int(21)]).unwrap();
    assert_eq!(result.as_int(), 42);
  }
}
