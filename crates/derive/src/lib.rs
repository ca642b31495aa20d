use proc_macro::TokenStream;

mod host_fn;

/// Marks a Rust function as a host binding reachable from script code.
///
/// The function must have the signature `fn(&ThreadState) -> camel::Result<()>`.
/// It reads its arguments with `ThreadState::native_args` and reports its
/// result with `ThreadState::set_native_return` — there is no `Frame`
/// parameter, since a `Frame` is private to the bytecode dispatch loop. The
/// attribute wraps the function in a `NativeFn` shim that a `Module`
/// registers under a name via `Module::define_native`.
#[proc_macro_attribute]
pub fn host_fn(args: TokenStream, input: TokenStream) -> TokenStream {
  host_fn::macro_impl(args, input)
}
