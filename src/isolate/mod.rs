//! The register VM runtime (spec.md §4.7): `ThreadState` drives one call
//! stack of `Frame`s, each executing a `Procedure`'s `op::Instruction`
//! stream via [`run`]. Grounded on `examples/jprochazk-hebi/src/isolate.rs`'s
//! `Isolate` (fields for globals/frames/stdout, a `match` dispatch loop)
//! but restructured around recursive Rust calls per VM call frame instead
//! of a single flattened frame stack, since `Return` here unwinds through
//! ordinary function return rather than a manual frame-pop.

mod ops;
pub mod pool;
pub mod spawn;

use std::cell::RefCell;
use std::io::Write;
use std::sync::{Arc, Mutex, Weak};

use crate::classloader::Classloader;
use crate::error::{Error, Result};
use crate::op::{Instruction, ScratchOp};
use crate::value::object::module::{Callable, Module};
use crate::value::object::procedure::Procedure;
use crate::value::object::reference::{Payload, Reference};
use crate::value::{Av, Hv, ModuleHandle, Scalar};

use pool::{RegisterFile, RegisterPool};

thread_local! {
  /// A host function's `@_` and return slot. Thread-local rather than a
  /// `ThreadState` field: a native call only ever runs synchronously on
  /// whichever OS thread invoked it (the bytecode loop's own thread, or a
  /// freshly spawned `go` thread), so there is never a second native call
  /// in flight on the same thread to collide with.
  static NATIVE_ARGS: RefCell<Vec<Scalar>> = RefCell::new(Vec::new());
  static NATIVE_RETURN: RefCell<Scalar> = RefCell::new(Scalar::Null);
}

/// An array register's storage: a call-local `Av`, an aliased handle into a
/// module's global array table, or an aliased handle into a reference's
/// payload. `Global`/`Ref` are cheap `Arc`/`Reference` clones — never a data
/// copy — so mutation through any alias of the same register is visible to
/// every other alias (spec.md §5's "AV/HV behind globals and references are
/// shared").
pub enum ArraySlot {
  Local(Av),
  Global(Arc<Mutex<Av>>),
  Ref(Reference),
}

pub enum HashSlot {
  Local(Hv),
  Global(Arc<Mutex<Hv>>),
  Ref(Reference),
}

impl ArraySlot {
  pub fn with<R>(&self, f: impl FnOnce(&Av) -> R) -> Result<R> {
    match self {
      ArraySlot::Local(av) => Ok(f(av)),
      ArraySlot::Global(shared) => Ok(f(&shared.lock().unwrap_or_else(|e| e.into_inner()))),
      ArraySlot::Ref(r) => {
        let mut out = None;
        r.with_payload(|p| {
          if let Payload::Av(av) = p {
            out = Some(f(av));
          }
        });
        out.ok_or_else(|| Error::runtime("value is not an array reference"))
      }
    }
  }

  pub fn with_mut<R>(&mut self, f: impl FnOnce(&mut Av) -> R) -> Result<R> {
    match self {
      ArraySlot::Local(av) => Ok(f(av)),
      ArraySlot::Global(shared) => Ok(f(&mut shared.lock().unwrap_or_else(|e| e.into_inner()))),
      ArraySlot::Ref(r) => {
        let mut out = None;
        r.with_payload_mut(|p| {
          if let Payload::Av(av) = p {
            out = Some(f(av));
          }
        });
        out.ok_or_else(|| Error::runtime("value is not an array reference"))
      }
    }
  }

  fn snapshot(&self) -> Result<Av> {
    self.with(|av| av.clone())
  }
}

impl HashSlot {
  pub fn with<R>(&self, f: impl FnOnce(&Hv) -> R) -> Result<R> {
    match self {
      HashSlot::Local(hv) => Ok(f(hv)),
      HashSlot::Global(shared) => Ok(f(&shared.lock().unwrap_or_else(|e| e.into_inner()))),
      HashSlot::Ref(r) => {
        let mut out = None;
        r.with_payload(|p| {
          if let Payload::Hv(hv) = p {
            out = Some(f(hv));
          }
        });
        out.ok_or_else(|| Error::runtime("value is not a hash reference"))
      }
    }
  }

  pub fn with_mut<R>(&mut self, f: impl FnOnce(&mut Hv) -> R) -> Result<R> {
    match self {
      HashSlot::Local(hv) => Ok(f(hv)),
      HashSlot::Global(shared) => Ok(f(&mut shared.lock().unwrap_or_else(|e| e.into_inner()))),
      HashSlot::Ref(r) => {
        let mut out = None;
        r.with_payload_mut(|p| {
          if let Payload::Hv(hv) = p {
            out = Some(f(hv));
          }
        });
        out.ok_or_else(|| Error::runtime("value is not a hash reference"))
      }
    }
  }

  fn snapshot(&self) -> Result<Hv> {
    self.with(|hv| hv.clone())
  }
}

/// One VM call: its register file plus the `@_` it was invoked with.
struct Frame {
  regs: RegisterFile,
  args: Vec<Scalar>,
}

fn fetch_args(args: &[Scalar], index: i64) -> Scalar {
  usize::try_from(index).ok().and_then(|i| args.get(i).cloned()).unwrap_or(Scalar::Null)
}

/// Outcome of running an instruction slice: fell off the end (`Next`), or
/// hit `Return` (carrying the value). `EvalBlock` bodies propagate `Return`
/// the same way a top-level body does, rather than swallowing it — an
/// explicit `return` inside `eval { }` ends the enclosing call, matching
/// how `next`/`last` inside `eval { }` still target the enclosing loop.
enum Flow {
  Next,
  Return(Scalar),
}

pub struct ThreadState {
  pub classloader: Arc<Classloader>,
  pool: RegisterPool,
  stdout: Mutex<Box<dyn Write + Send>>,
  /// Lets a call dispatch loop hand a `go`-spawned call its own `Arc`
  /// without every method needing `self: &Arc<Self>` — nothing else here
  /// needs unique ownership of the thread, only a clonable handle to it.
  self_ref: Weak<ThreadState>,
}

impl ThreadState {
  pub fn new(classloader: Arc<Classloader>, stdout: Box<dyn Write + Send>) -> Arc<ThreadState> {
    Arc::new_cyclic(|weak| ThreadState {
      classloader,
      pool: RegisterPool::new(),
      stdout: Mutex::new(stdout),
      self_ref: weak.clone(),
    })
  }

  fn arc(&self) -> Arc<ThreadState> {
    self.self_ref.upgrade().expect("ThreadState dropped while still running")
  }

  /// Runs `module`'s `main` procedure to completion.
  pub fn run_main(&self, module: &Arc<Module>) -> Result<Scalar> {
    let main = module
      .main
      .get()
      .cloned()
      .ok_or_else(|| Error::runtime("module has no main body"))?;
    self.call(module, &Callable::Procedure(main), Vec::new())
  }

  /// Invokes `callable` with `args`. A bytecode procedure acquires a fresh
  /// register file from the pool and releases it on every exit path; a
  /// native function runs through its own thread-local `@_`/return slot.
  pub fn call(&self, module: &Arc<Module>, callable: &Callable, args: Vec<Scalar>) -> Result<Scalar> {
    match callable {
      Callable::Procedure(proc) => self.call_proc(module, proc, args),
      Callable::Native(native) => native.call(self, args),
    }
  }

  fn call_proc(&self, module: &Arc<Module>, proc: &Arc<Procedure>, args: Vec<Scalar>) -> Result<Scalar> {
    let regs = self.pool.acquire(proc.metrics);
    let mut frame = Frame { regs, args };
    let result = self.run(module, proc, &mut frame, &proc.instructions);
    self.pool.release(proc.metrics, frame.regs);
    match result? {
      Flow::Return(v) => Ok(v),
      Flow::Next => Ok(Scalar::Null),
    }
  }

  /// The `@_`-equivalent argument vector for the host function currently
  /// executing on this thread.
  pub fn native_args(&self) -> Vec<Scalar> {
    NATIVE_ARGS.with(|a| a.borrow().clone())
  }

  /// Sets the value a host function call returns to its caller.
  pub fn set_native_return(&self, value: Scalar) {
    NATIVE_RETURN.with(|r| *r.borrow_mut() = value);
  }

  pub(crate) fn enter_native(&self, args: Vec<Scalar>) {
    NATIVE_ARGS.with(|a| *a.borrow_mut() = args);
    NATIVE_RETURN.with(|r| *r.borrow_mut() = Scalar::Null);
  }

  pub(crate) fn take_native_return(&self) -> Scalar {
    NATIVE_RETURN.with(|r| r.borrow().clone())
  }

  fn resolve_module_handle(&self, handle: &ModuleHandle) -> Result<Arc<Module>> {
    handle
      .resolve_with(|| self.classloader.load(&handle.name).ok())
      .ok_or_else(|| Error::runtime(format!("cannot resolve module `{}`", handle.name)))
  }

  fn run(&self, module: &Arc<Module>, proc: &Arc<Procedure>, frame: &mut Frame, code: &[Instruction]) -> Result<Flow> {
    let mut pc: usize = 0;
    while pc < code.len() {
      let next_pc = pc + 1;
      match &code[pc] {
        Instruction::Noop => {}

        Instruction::LoadConst(d, c) => {
          frame.regs.scalars[d.0 as usize] = proc.constant(c.0).clone();
        }
        Instruction::LoadNull(d) => {
          frame.regs.scalars[d.0 as usize] = Scalar::Null;
        }
        Instruction::LoadGlobalScalar(d, c) => {
          let name = proc.constant(c.0).as_string();
          frame.regs.scalars[d.0 as usize] = module.get_scalar(&name);
        }
        Instruction::StoreGlobalScalar(c, s) => {
          let name = proc.constant(c.0).as_string();
          let value = frame.regs.scalars[s.0 as usize].clone();
          module.set_scalar(name, value);
        }
        Instruction::LoadGlobalArray(d, c) => {
          let name = proc.constant(c.0).as_string();
          frame.regs.arrays[d.0 as usize] = ArraySlot::Global(module.array(&name));
        }
        Instruction::LoadGlobalHash(d, c) => {
          let name = proc.constant(c.0).as_string();
          frame.regs.hashes[d.0 as usize] = HashSlot::Global(module.hash(&name));
        }

        Instruction::MoveScalar(d, s) => {
          frame.regs.scalars[d.0 as usize] = frame.regs.scalars[s.0 as usize].clone();
        }
        Instruction::MoveArray(d, s) => {
          let snapshot = frame.regs.arrays[s.0 as usize].snapshot()?;
          frame.regs.arrays[d.0 as usize] = ArraySlot::Local(snapshot);
        }
        Instruction::MoveHash(d, s) => {
          let snapshot = frame.regs.hashes[s.0 as usize].snapshot()?;
          frame.regs.hashes[d.0 as usize] = HashSlot::Local(snapshot);
        }

        Instruction::UnrefLoadScalar(d, s) => {
          let r = expect_ref(&frame.regs.scalars[s.0 as usize])?;
          let value = r.get_scalar().ok_or_else(|| Error::runtime("value is not a scalar reference"))?;
          frame.regs.scalars[d.0 as usize] = value;
        }
        Instruction::UnrefStoreScalar(s, v) => {
          let r = expect_ref(&frame.regs.scalars[s.0 as usize])?;
          let value = frame.regs.scalars[v.0 as usize].clone();
          if !r.set_scalar(value) {
            return Err(Error::runtime("value is not a scalar reference"));
          }
        }
        Instruction::UnrefLoadArray(d, s) => {
          let r = expect_ref(&frame.regs.scalars[s.0 as usize])?;
          frame.regs.arrays[d.0 as usize] = ArraySlot::Ref(r.clone());
        }
        Instruction::UnrefLoadHash(d, s) => {
          let r = expect_ref(&frame.regs.scalars[s.0 as usize])?;
          frame.regs.hashes[d.0 as usize] = HashSlot::Ref(r.clone());
        }

        Instruction::AvLoad(d, a, i) => {
          let idx = frame.regs.scalars[i.0 as usize].as_int();
          let value = frame.regs.arrays[a.0 as usize].with(|av| av.fetch(idx))?;
          frame.regs.scalars[d.0 as usize] = value;
        }
        Instruction::AvStore(a, i, v) => {
          let idx = frame.regs.scalars[i.0 as usize].as_int();
          let value = frame.regs.scalars[v.0 as usize].clone();
          frame.regs.arrays[a.0 as usize].with_mut(|av| av.store(idx, value))?;
        }
        Instruction::AvLoadArgs(d, i) => {
          let idx = frame.regs.scalars[i.0 as usize].as_int();
          frame.regs.scalars[d.0 as usize] = fetch_args(&frame.args, idx);
        }
        Instruction::AvLen(d, a) => {
          let len = frame.regs.arrays[a.0 as usize].with(|av| av.len())?;
          frame.regs.scalars[d.0 as usize] = Scalar::Int(len as i64);
        }
        Instruction::LoadArgsArray(d) => {
          frame.regs.arrays[d.0 as usize] = ArraySlot::Local(Av::from_vec(frame.args.clone()));
        }

        Instruction::HvLoad(d, h, k) => {
          let key = frame.regs.scalars[k.0 as usize].clone();
          let value = frame.regs.hashes[h.0 as usize].with(|hv| hv.get(&key))?;
          frame.regs.scalars[d.0 as usize] = value;
        }
        Instruction::HvStore(h, k, v) => {
          let key = frame.regs.scalars[k.0 as usize].clone();
          let value = frame.regs.scalars[v.0 as usize].clone();
          frame.regs.hashes[h.0 as usize].with_mut(|hv| hv.put(key, value))?;
        }
        Instruction::HvDelete(h, k) => {
          let key = frame.regs.scalars[k.0 as usize].clone();
          frame.regs.hashes[h.0 as usize].with_mut(|hv| hv.delete(&key))?;
        }

        Instruction::Scratch(a, op) => self.exec_scratch(frame, a.0 as usize, op)?,
        Instruction::CreateArrayRef(d, a) => {
          let snapshot = frame.regs.arrays[a.0 as usize].snapshot()?;
          frame.regs.scalars[d.0 as usize] = Scalar::Ref(Reference::av(snapshot));
        }
        Instruction::CreateHashRef(d, h) => {
          let snapshot = frame.regs.hashes[h.0 as usize].snapshot()?;
          frame.regs.scalars[d.0 as usize] = Scalar::Ref(Reference::hv(snapshot));
        }
        Instruction::HashFromArray(h, a) => {
          let hv = frame.regs.arrays[a.0 as usize].with(Hv::from_av)?;
          frame.regs.hashes[h.0 as usize] = HashSlot::Local(hv);
        }
        Instruction::ArrayFromHash(a, h) => {
          let av = frame.regs.hashes[h.0 as usize].with(Hv::to_av)?;
          frame.regs.arrays[a.0 as usize] = ArraySlot::Local(av);
        }

        Instruction::BinOp(d, op, a, b) => {
          let value = ops::binop(*op, &frame.regs.scalars[a.0 as usize], &frame.regs.scalars[b.0 as usize])?;
          frame.regs.scalars[d.0 as usize] = value;
        }
        Instruction::CmpOp(d, op, a, b) => {
          let value = ops::cmp(*op, &frame.regs.scalars[a.0 as usize], &frame.regs.scalars[b.0 as usize]);
          frame.regs.scalars[d.0 as usize] = value;
        }
        Instruction::UnOp(d, op, a) => {
          frame.regs.scalars[d.0 as usize] = ops::unop(*op, &frame.regs.scalars[a.0 as usize]);
        }
        Instruction::LogicalNot(d, a) => {
          let truthy = frame.regs.scalars[a.0 as usize].as_bool();
          frame.regs.scalars[d.0 as usize] = Scalar::Int(!truthy as i64);
        }

        Instruction::RegexMatch(d, s, pat, first) => {
          let subject = frame.regs.scalars[s.0 as usize].as_string();
          let pattern = proc.constant(pat.0).as_string();
          let re = ops::compile_regex(&pattern)?;
          let matched = self.bind_capture_groups(frame, &re, &subject, first.0 as usize);
          frame.regs.scalars[d.0 as usize] = Scalar::Int(matched as i64);
        }
        Instruction::RegexMatchGlobal(a, s, pat) => {
          let subject = frame.regs.scalars[s.0 as usize].as_string();
          let pattern = proc.constant(pat.0).as_string();
          let re = ops::compile_regex(&pattern)?;
          let matches: Vec<Scalar> = re.find_iter(&subject).map(|m| Scalar::str(m.as_str())).collect();
          frame.regs.arrays[a.0 as usize] = ArraySlot::Local(Av::from_vec(matches));
        }
        Instruction::RegexReplace(d, s, pat, repl) => {
          let subject = frame.regs.scalars[s.0 as usize].as_string();
          let pattern = proc.constant(pat.0).as_string();
          let replacement = proc.constant(repl.0).as_string();
          let re = ops::compile_regex(&pattern)?;
          let replaced = re.replace_all(&subject, replacement.as_ref());
          frame.regs.scalars[d.0 as usize] = Scalar::str(replaced.into_owned());
        }

        Instruction::Jump(offset) => {
          pc = (next_pc as i64 + offset.0 as i64) as usize;
          continue;
        }
        Instruction::JumpIf(offset, c) => {
          if frame.regs.scalars[c.0 as usize].as_bool() {
            pc = (next_pc as i64 + offset.0 as i64) as usize;
            continue;
          }
        }
        Instruction::JumpUnless(offset, c) => {
          if !frame.regs.scalars[c.0 as usize].as_bool() {
            pc = (next_pc as i64 + offset.0 as i64) as usize;
            continue;
          }
        }
        Instruction::Return(s) => {
          return Ok(Flow::Return(frame.regs.scalars[s.0 as usize].clone()));
        }

        Instruction::SubCall(d, name, args) => {
          let target = self.resolve_callable(module, proc, name.0)?;
          let call_args = frame.regs.arrays[args.0 as usize].with(|av| av.as_slice().to_vec())?;
          let result = self.call(module, &target, call_args)?;
          frame.regs.scalars[d.0 as usize] = result;
        }
        Instruction::SubCallGo(name, args) => {
          let target = self.resolve_callable(module, proc, name.0)?;
          let call_args = frame.regs.arrays[args.0 as usize].with(|av| av.as_slice().to_vec())?;
          spawn::spawn(self.arc(), module.clone(), target, call_args);
        }
        Instruction::MethodCall(d, recv, name, args) => {
          let call_args = frame.regs.arrays[args.0 as usize].with(|av| av.as_slice().to_vec())?;
          let (target_module, target, full_args) =
            self.resolve_method(&frame.regs.scalars[recv.0 as usize], &proc.constant(name.0).as_string(), call_args)?;
          let result = self.call(&target_module, &target, full_args)?;
          frame.regs.scalars[d.0 as usize] = result;
        }
        Instruction::MethodCallGo(recv, name, args) => {
          let call_args = frame.regs.arrays[args.0 as usize].with(|av| av.as_slice().to_vec())?;
          let (target_module, target, full_args) =
            self.resolve_method(&frame.regs.scalars[recv.0 as usize], &proc.constant(name.0).as_string(), call_args)?;
          spawn::spawn(self.arc(), target_module, target, full_args);
        }

        Instruction::RequireModule(name) => {
          let name = proc.constant(name.0).as_string();
          self.classloader.load(&name)?;
        }
        Instruction::RequireModuleRegister(s) => {
          let name = frame.regs.scalars[s.0 as usize].as_string();
          self.classloader.load(&name)?;
        }

        Instruction::Print(a) => {
          let rendered = frame.regs.arrays[a.0 as usize].with(|av| {
            let mut s = String::new();
            for scalar in av.iter() {
              s.push_str(&scalar.as_string());
            }
            s
          })?;
          let mut out = self.stdout.lock().unwrap_or_else(|e| e.into_inner());
          let _ = out.write_all(rendered.as_bytes());
        }

        Instruction::EvalBlock(inner) => match self.run(module, proc, frame, inner) {
          Ok(Flow::Return(v)) => return Ok(Flow::Return(v)),
          Ok(Flow::Next) => {
            module.set_scalar(Arc::from("@"), Scalar::str(""));
          }
          Err(Error::Runtime(located)) => {
            module.set_scalar(Arc::from("@"), Scalar::str(located.message));
          }
          Err(other) => return Err(other),
        },

        Instruction::ClearArgs => {
          frame.args.clear();
        }
      }
      pc = next_pc;
    }
    Ok(Flow::Next)
  }

  fn resolve_callable(&self, module: &Arc<Module>, proc: &Arc<Procedure>, name_const: u32) -> Result<Callable> {
    let name = proc.constant(name_const).as_string();
    module
      .callable(&name)
      .ok_or_else(|| Error::runtime(format!("undefined subroutine `{name}`")))
  }

  fn resolve_method(
    &self,
    receiver: &Scalar,
    name: &str,
    mut args: Vec<Scalar>,
  ) -> Result<(Arc<Module>, Callable, Vec<Scalar>)> {
    let handle = match receiver {
      Scalar::Ref(r) => r.blessed().ok_or_else(|| Error::runtime("method call on an unblessed reference"))?.clone(),
      Scalar::Module(handle) => handle.clone(),
      _ => return Err(Error::runtime("method call on a value that is neither an object nor a module")),
    };
    let target_module = self.resolve_module_handle(&handle)?;
    let target = target_module
      .callable(name)
      .ok_or_else(|| Error::runtime(format!("undefined method `{name}` on `{}`", handle.name)))?;
    args.insert(0, receiver.clone());
    Ok((target_module, target, args))
  }

  fn exec_scratch(&self, frame: &mut Frame, areg: usize, op: &ScratchOp) -> Result<()> {
    match op {
      ScratchOp::Clear => {
        frame.regs.arrays[areg].with_mut(|av| av.clear())?;
      }
      ScratchOp::PushNull => {
        frame.regs.arrays[areg].with_mut(|av| av.push(Scalar::Null))?;
      }
      ScratchOp::InitFrom(src) => {
        let snapshot = frame.regs.arrays[src.0 as usize].snapshot()?;
        frame.regs.arrays[areg] = ArraySlot::Local(snapshot);
      }
      ScratchOp::AddScalar(s) => {
        let value = frame.regs.scalars[s.0 as usize].clone();
        frame.regs.arrays[areg].with_mut(|av| av.push(value))?;
      }
      ScratchOp::AddArray(src) => {
        let items = frame.regs.arrays[src.0 as usize].with(|av| av.as_slice().to_vec())?;
        frame.regs.arrays[areg].with_mut(|av| {
          for item in items {
            av.push(item);
          }
        })?;
      }
      ScratchOp::ShiftScalar(dst) => {
        let value = frame.regs.arrays[areg].with_mut(|av| {
          let items = av.as_slice().to_vec();
          av.clear();
          let mut rest = items.into_iter();
          let first = rest.next().unwrap_or(Scalar::Null);
          for item in rest {
            av.push(item);
          }
          first
        })?;
        frame.regs.scalars[dst.0 as usize] = value;
      }
      ScratchOp::ShiftArray(src) => {
        let prefix = frame.regs.arrays[src.0 as usize].with(|av| av.as_slice().to_vec())?;
        frame.regs.arrays[areg].with_mut(|av| {
          let rest = av.as_slice().to_vec();
          av.clear();
          for item in prefix {
            av.push(item);
          }
          for item in rest {
            av.push(item);
          }
        })?;
      }
    }
    Ok(())
  }

  /// Matches `pattern` against `subject`, binding capture groups
  /// `0..captures_len()` into the contiguous register block starting at
  /// `first` on success; clears them to `Null` on failure.
  fn bind_capture_groups(&self, frame: &mut Frame, re: &regex::Regex, subject: &str, first: usize) -> bool {
    match re.captures(subject) {
      Some(caps) => {
        for i in 0..re.captures_len() {
          let value = caps.get(i).map(|m| Scalar::str(m.as_str())).unwrap_or(Scalar::Null);
          if first + i < frame.regs.scalars.len() {
            frame.regs.scalars[first + i] = value;
          }
        }
        true
      }
      None => {
        for i in 0..re.captures_len() {
          if first + i < frame.regs.scalars.len() {
            frame.regs.scalars[first + i] = Scalar::Null;
          }
        }
        false
      }
    }
  }
}

fn expect_ref(s: &Scalar) -> Result<&Reference> {
  match s {
    Scalar::Ref(r) => Ok(r),
    _ => Err(Error::runtime("value is not a reference")),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::classloader::{Classloader, NoopSourceLoader};
  use crate::emit;
  use crate::syntax::parse;

  fn run_source(src: &str) -> (Arc<Module>, Vec<u8>) {
    let ctx = crate::ctx::Context::for_test();
    let ast = parse(src).unwrap();
    let module = Arc::new(emit::emit(&ctx, &ast).unwrap());
    let classloader = Classloader::new(Box::new(NoopSourceLoader));
    let out = Arc::new(Mutex::new(Vec::new()));
    struct Sink(Arc<Mutex<Vec<u8>>>);
    impl Write for Sink {
      fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
      }
      fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
      }
    }
    let thread = ThreadState::new(classloader, Box::new(Sink(out.clone())));
    thread.run_main(&module).unwrap();
    let bytes = out.lock().unwrap().clone();
    (module, bytes)
  }

  #[test]
  fn arithmetic_and_print() {
    let (_, out) = run_source("print 1 + 2 * 3;");
    assert_eq!(String::from_utf8(out).unwrap(), "7");
  }

  #[test]
  fn global_array_mutation_through_a_second_load_is_visible() {
    let (module, _) = run_source("$globalArr[0] = 5; $globalArr[1] = 6;");
    let arr = module.array("globalArr");
    let snapshot = arr.lock().unwrap().clone();
    assert_eq!(snapshot.fetch(0).as_int(), 5);
    assert_eq!(snapshot.fetch(1).as_int(), 6);
  }

  #[test]
  fn while_loop_with_last_terminates_early() {
    let (_, out) = run_source("my $i = 0; while (1) { $i = $i + 1; if ($i >= 3) { last; } } print $i;");
    assert_eq!(String::from_utf8(out).unwrap(), "3");
  }

  #[test]
  fn eval_catches_runtime_errors_into_at_global() {
    let (module, _) = run_source("eval { my $x = 1 / 0; }");
    assert!(!module.get_scalar("@").as_string().is_empty());
  }
}
