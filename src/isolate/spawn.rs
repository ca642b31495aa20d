//! `go`-spawn (spec.md §4.9): fire-and-forget concurrency. A spawned call
//! runs on its own OS thread with its own register pool acquisition; its
//! return value (if any) is discarded and a panic is caught and logged
//! rather than propagated, since there is no join point to propagate to.
//!
//! Grounded on the teacher's absence of any such primitive — there is
//! nothing in `examples/jprochazk-hebi` to imitate here, so this follows
//! `examples/original_source`'s `go`-statement semantics directly: launch,
//! don't wait, don't fail the caller if the callee fails.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::value::object::module::{Callable, Module};
use crate::value::Scalar;

use super::ThreadState;

fn callable_name(callable: &Callable) -> Arc<str> {
  match callable {
    Callable::Procedure(proc) => proc.name.clone(),
    Callable::Native(native) => Arc::from(native.name),
  }
}

/// Spawns `callable` with `args` on a new OS thread, owned by nobody. Any
/// runtime error or panic raised inside it is logged and otherwise
/// swallowed — the caller already moved on.
pub fn spawn(thread: Arc<ThreadState>, module: Arc<Module>, callable: Callable, args: Vec<Scalar>) {
  let name = callable_name(&callable);
  std::thread::spawn(move || {
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| thread.call(&module, &callable, args)));
    match result {
      Ok(Ok(_)) => {}
      Ok(Err(e)) => tracing::warn!(procedure = %name, error = %e, "go-spawned call failed"),
      Err(_) => tracing::error!(procedure = %name, "go-spawned call panicked"),
    }
  });
}
