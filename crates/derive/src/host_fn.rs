use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::spanned::Spanned;
use syn::{FnArg, ItemFn, ReturnType};

pub fn macro_impl(args: TokenStream, input: TokenStream) -> TokenStream {
  if !args.is_empty() {
    return syn::Error::new(Span::call_site(), "#[host_fn] does not accept any arguments")
      .into_compile_error()
      .into();
  }

  let input = syn::parse_macro_input!(input as ItemFn);

  if let Err(e) = check_signature(&input) {
    return e.into_compile_error().into();
  }

  let vis = &input.vis;
  let name = &input.sig.ident;
  let shim_name = format_ident!("__host_fn_{}", name);

  // Resolves to `crate` when `#[host_fn]` is used inside the `camel` crate
  // itself (built-ins shipped alongside the interpreter) and to the
  // dependency's import name otherwise — the same indirection
  // `examples/jprochazk-hebi/crates/derive/src/function.rs` uses for its
  // `#[mu::func]`-equivalent macro.
  let crate_name = match proc_macro_crate::crate_name("camel") {
    Ok(proc_macro_crate::FoundCrate::Itself) => format_ident!("crate"),
    Ok(proc_macro_crate::FoundCrate::Name(name)) => format_ident!("{name}"),
    Err(_) => format_ident!("camel"),
  };

  let expanded = quote! {
    #input

    #[doc(hidden)]
    #vis fn #shim_name() -> #crate_name::builtins::NativeFn {
      #crate_name::builtins::NativeFn::new(stringify!(#name), #name)
    }
  };

  expanded.into()
}

/// Enforces the `fn(&ThreadState) -> camel::Result<()>` shape the host
/// binding interface describes (minus the `(ip*, n)` tail, which only
/// opcode handlers need).
fn check_signature(input: &ItemFn) -> syn::Result<()> {
  let sig = &input.sig;

  if sig.asyncness.is_some() {
    return Err(syn::Error::new(sig.span(), "host functions cannot be async"));
  }

  let mut inputs = sig.inputs.iter();
  match inputs.next() {
    Some(FnArg::Typed(_)) => {}
    Some(FnArg::Receiver(r)) => {
      return Err(syn::Error::new(r.span(), "`self` is not supported"));
    }
    None => {
      return Err(syn::Error::new(
        sig.span(),
        "host functions take `&ThreadState` as their only argument",
      ))
    }
  }

  if inputs.next().is_some() {
    return Err(syn::Error::new(
      sig.span(),
      "host functions take exactly one argument: `&ThreadState`",
    ));
  }

  if matches!(sig.output, ReturnType::Default) {
    return Err(syn::Error::new(
      sig.span(),
      "host functions must return `camel::Result<()>`",
    ));
  }

  Ok(())
}
