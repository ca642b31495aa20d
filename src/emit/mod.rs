//! Compiler (spec.md §4.4–§4.5): three mutually recursive entry points
//! (`compile_scalar`, `compile_array`, `compile_stmt`) lowering the AST to a
//! flat `op::Instruction` stream per `Procedure`. Grounded on
//! `examples/jprochazk-hebi/src/emit/{emitter,stmt,expr}.rs`'s shape (one
//! `State`/`Emitter` struct threading a register allocator and a single
//! instruction buffer through mutually recursive `emit_*` methods) but
//! retargeted at this language's register classes and opcode vocabulary.

pub mod regalloc;

use std::sync::Arc;

use crate::ctx::Context;
use crate::error::{Error, Result};
use crate::op::{
  self, AReg, BinOp, CmpOp, Const as OpConst, HReg, Instruction, Offset, SReg, ScratchOp, UnOp,
};
use crate::syntax::ast::*;
use crate::value::object::module::Module;
use crate::value::object::procedure::{Procedure, RegisterMetrics};
use crate::value::Scalar;

use regalloc::{RegAlloc, TargetHint};

/// Compiles a parsed module into a `Module` of `Procedure`s, ready for a
/// classloader to store under `ast.name`.
pub fn emit(ctx: &Context, ast: &ModuleAst) -> Result<Module> {
  let module = Module::new(ctx.intern(ast.name.clone()));
  for sub in &ast.subs {
    let proc = Emitter::new(ctx).compile_sub(sub)?;
    module.define_procedure(Arc::new(proc));
  }
  let main = Emitter::new(ctx).compile_main(&ast.main)?;
  module.set_main(Arc::new(main));
  Ok(module)
}

struct LoopCtx {
  continue_patches: Vec<usize>,
  break_patches: Vec<usize>,
}

struct Emitter<'a> {
  ctx: &'a Context,
  scalars: RegAlloc,
  arrays: RegAlloc,
  hashes: RegAlloc,
  constants: Vec<Scalar>,
  code: Vec<Instruction>,
  loops: Vec<LoopCtx>,
}

/// Counts top-level capturing groups so the regex compiler can statically
/// allocate contiguous capture registers `$0..$n` (spec.md §4.5). `(?...)`
/// introduces a non-capturing or lookaround group; a backslash escapes the
/// next byte. This is an approximation of a full regex parse, sufficient to
/// size the capture-register block the same way the `regex` crate's own
/// capture count would.
fn count_capture_groups(pattern: &str) -> usize {
  let bytes = pattern.as_bytes();
  let mut n = 0;
  let mut i = 0;
  while i < bytes.len() {
    match bytes[i] {
      b'\\' => i += 2,
      b'(' => {
        if bytes.get(i + 1) == Some(&b'?') {
          i += 1;
        } else {
          n += 1;
          i += 1;
        }
      }
      _ => i += 1,
    }
  }
  n
}

impl<'a> Emitter<'a> {
  fn new(ctx: &'a Context) -> Self {
    Emitter {
      ctx,
      scalars: RegAlloc::new(),
      arrays: RegAlloc::new(),
      hashes: RegAlloc::new(),
      constants: Vec::new(),
      code: Vec::new(),
      loops: Vec::new(),
    }
  }

  fn const_scalar(&mut self, s: Scalar) -> OpConst {
    let idx = self.constants.len() as u32;
    self.constants.push(s);
    OpConst(idx)
  }

  fn const_str(&mut self, s: &str) -> OpConst {
    let interned = self.ctx.intern(s.to_string());
    self.const_scalar(Scalar::Str(interned))
  }

  fn here(&self) -> usize {
    self.code.len()
  }

  fn push(&mut self, instr: Instruction) -> usize {
    self.code.push(instr);
    self.code.len() - 1
  }

  fn patch(&mut self, idx: usize, target: usize) {
    let offset = Offset(target as i32 - (idx as i32 + 1));
    match &mut self.code[idx] {
      Instruction::Jump(o) => *o = offset,
      Instruction::JumpIf(o, _) => *o = offset,
      Instruction::JumpUnless(o, _) => *o = offset,
      other => panic!("patch target is not a jump instruction: {other:?}"),
    }
  }

  fn jump_to(&mut self, target: usize) {
    let idx = self.push(Instruction::Jump(Offset(0)));
    self.patch(idx, target);
  }

  fn finish(self, name: impl Into<Arc<str>>) -> Procedure {
    Procedure::new(
      name,
      RegisterMetrics {
        scalars: self.scalars.high_water(),
        arrays: self.arrays.high_water(),
        hashes: self.hashes.high_water(),
      },
      self.code,
      self.constants,
    )
  }

  fn compile_sub(mut self, sub: &SubDecl) -> Result<Procedure> {
    self.compile_block(&sub.body)?;
    let name = self.ctx.intern(sub.name.clone());
    Ok(self.finish(name))
  }

  fn compile_main(mut self, stmts: &[Stmt]) -> Result<Procedure> {
    self.compile_block(stmts)?;
    self.push(Instruction::ClearArgs);
    Ok(self.finish("main"))
  }

  fn compile_block(&mut self, stmts: &[Stmt]) -> Result<()> {
    for s in stmts {
      self.compile_stmt(s)?;
    }
    Ok(())
  }

  fn compile_scoped_block(&mut self, stmts: &[Stmt]) -> Result<()> {
    self.scalars.push_scope();
    self.arrays.push_scope();
    self.hashes.push_scope();
    let result = self.compile_block(stmts);
    self.scalars.pop_scope();
    self.arrays.pop_scope();
    self.hashes.pop_scope();
    result
  }

  // ---- statements ---------------------------------------------------------

  fn compile_stmt(&mut self, stmt: &Stmt) -> Result<()> {
    match stmt {
      Stmt::My(decls) => {
        for (sigil, name) in decls {
          match sigil {
            Sigil::Scalar => {
              let r = self.scalars.define(name)?;
              self.push(Instruction::LoadNull(SReg(r)));
            }
            Sigil::Array => {
              self.arrays.define(name)?;
            }
            Sigil::Hash => {
              self.hashes.define(name)?;
            }
          }
        }
        Ok(())
      }
      Stmt::ExprStmt(e) => {
        self.compile_scalar(e, TargetHint::Discard)?;
        Ok(())
      }
      Stmt::ArrayExprStmt(e) => {
        self.compile_array(e, TargetHint::Discard)?;
        Ok(())
      }
      Stmt::Print(exprs) => {
        let scratch = self.build_scratch(exprs)?;
        self.push(Instruction::Print(AReg(scratch)));
        Ok(())
      }
      Stmt::Block(stmts) => self.compile_scoped_block(stmts),
      Stmt::If(cond, then, else_) => self.compile_if(cond, then, else_.as_deref(), false),
      Stmt::Unless(cond, then, else_) => self.compile_if(cond, then, else_.as_deref(), true),
      Stmt::While(cond, body) => self.compile_while(cond, body),
      Stmt::ForIn(var, arr, body) => self.compile_for_in(var, arr, body),
      Stmt::Eval(body) => self.compile_eval(body),
      Stmt::Next => {
        let idx = self.push(Instruction::Jump(Offset(0)));
        let ctx = self
          .loops
          .last_mut()
          .ok_or_else(|| Error::compile("`next` outside of a loop", Default::default()))?;
        ctx.continue_patches.push(idx);
        Ok(())
      }
      Stmt::Last => {
        let idx = self.push(Instruction::Jump(Offset(0)));
        let ctx = self
          .loops
          .last_mut()
          .ok_or_else(|| Error::compile("`last` outside of a loop", Default::default()))?;
        ctx.break_patches.push(idx);
        Ok(())
      }
      Stmt::Return(value) => {
        let r = match value {
          Some(e) => self.compile_scalar(e, TargetHint::Any)?,
          None => {
            let r = self.scalars.fresh();
            self.push(Instruction::LoadNull(SReg(r)));
            r
          }
        };
        self.push(Instruction::Return(SReg(r)));
        Ok(())
      }
      Stmt::RequireStatic(name) => {
        let c = self.const_str(name);
        self.push(Instruction::RequireModule(c));
        Ok(())
      }
      Stmt::RequireDynamic(e) => {
        let r = self.compile_scalar(e, TargetHint::Any)?;
        self.push(Instruction::RequireModuleRegister(SReg(r)));
        Ok(())
      }
    }
  }

  fn compile_if(&mut self, cond: &Expr, then: &[Stmt], else_: Option<&[Stmt]>, invert: bool) -> Result<()> {
    let cr = self.compile_scalar(cond, TargetHint::Any)?;
    let skip_then = if invert {
      self.push(Instruction::JumpIf(Offset(0), SReg(cr)))
    } else {
      self.push(Instruction::JumpUnless(Offset(0), SReg(cr)))
    };
    self.compile_scoped_block(then)?;
    match else_ {
      Some(else_stmts) => {
        let skip_else = self.push(Instruction::Jump(Offset(0)));
        self.patch(skip_then, self.here());
        self.compile_scoped_block(else_stmts)?;
        self.patch(skip_else, self.here());
      }
      None => {
        self.patch(skip_then, self.here());
      }
    }
    Ok(())
  }

  fn compile_while(&mut self, cond: &Expr, body: &[Stmt]) -> Result<()> {
    let loop_start = self.here();
    let cr = self.compile_scalar(cond, TargetHint::Any)?;
    let jf = self.push(Instruction::JumpUnless(Offset(0), SReg(cr)));
    self.loops.push(LoopCtx { continue_patches: Vec::new(), break_patches: vec![jf] });
    self.compile_scoped_block(body)?;
    let ctx = self.loops.pop().unwrap();
    for idx in ctx.continue_patches {
      self.patch(idx, loop_start);
    }
    self.jump_to(loop_start);
    let end = self.here();
    for idx in ctx.break_patches {
      self.patch(idx, end);
    }
    Ok(())
  }

  fn compile_for_in(&mut self, var: &str, source: &ArrayExpr, body: &[Stmt]) -> Result<()> {
    let a_reg = self.compile_array(source, TargetHint::Any)?;
    let len_reg = self.scalars.fresh();
    self.push(Instruction::AvLen(SReg(len_reg), AReg(a_reg)));
    let idx_reg = self.scalars.fresh();
    let zero = self.const_scalar(Scalar::Int(0));
    self.push(Instruction::LoadConst(SReg(idx_reg), zero));
    let one = self.const_scalar(Scalar::Int(1));

    self.scalars.push_scope();
    self.arrays.push_scope();
    self.hashes.push_scope();
    let var_reg = self.scalars.define(var)?;

    let loop_start = self.here();
    let cmp_reg = self.scalars.fresh();
    self.push(Instruction::CmpOp(SReg(cmp_reg), CmpOp::NumLt, SReg(idx_reg), SReg(len_reg)));
    let jf = self.push(Instruction::JumpUnless(Offset(0), SReg(cmp_reg)));
    self.push(Instruction::AvLoad(SReg(var_reg), AReg(a_reg), SReg(idx_reg)));

    self.loops.push(LoopCtx { continue_patches: Vec::new(), break_patches: vec![jf] });
    let body_result = self.compile_block(body);
    let ctx = self.loops.pop().unwrap();
    let continue_target = self.here();
    for idx in ctx.continue_patches {
      self.patch(idx, continue_target);
    }

    let one_reg = self.scalars.fresh();
    self.push(Instruction::LoadConst(SReg(one_reg), one));
    self.push(Instruction::BinOp(SReg(idx_reg), BinOp::Add, SReg(idx_reg), SReg(one_reg)));
    self.jump_to(loop_start);
    let end = self.here();
    for idx in ctx.break_patches {
      self.patch(idx, end);
    }

    self.scalars.pop_scope();
    self.arrays.pop_scope();
    self.hashes.pop_scope();
    body_result
  }

  /// `eval { ... }` compiles its body as a self-contained instruction slice
  /// (spec.md §7), run by a dedicated `EvalBlock` opcode that catches a
  /// runtime error from it and binds the message into the enclosing
  /// module's `$@` global rather than letting it terminate the call.
  fn compile_eval(&mut self, body: &[Stmt]) -> Result<()> {
    let saved_code = std::mem::take(&mut self.code);
    self.scalars.push_scope();
    self.arrays.push_scope();
    self.hashes.push_scope();
    let result = self.compile_block(body);
    self.scalars.pop_scope();
    self.arrays.pop_scope();
    self.hashes.pop_scope();
    result?;
    let inner = std::mem::replace(&mut self.code, saved_code);
    self.push(Instruction::EvalBlock(inner));
    Ok(())
  }

  // ---- scalar expressions -------------------------------------------------

  fn resolve_scalar_hint(&mut self, hint: TargetHint, got: u16) -> u16 {
    match hint {
      TargetHint::Exact(d) if d != got => {
        self.push(Instruction::MoveScalar(SReg(d), SReg(got)));
        d
      }
      _ => got,
    }
  }

  fn resolve_array_hint(&mut self, hint: TargetHint, got: u16) -> u16 {
    match hint {
      TargetHint::Exact(d) if d != got => {
        self.push(Instruction::MoveArray(AReg(d), AReg(got)));
        d
      }
      _ => got,
    }
  }

  fn resolve_hash_hint(&mut self, hint: TargetHint, got: u16) -> u16 {
    match hint {
      TargetHint::Exact(d) if d != got => {
        self.push(Instruction::MoveHash(HReg(d), HReg(got)));
        d
      }
      _ => got,
    }
  }

  fn compile_scalar(&mut self, e: &Expr, hint: TargetHint) -> Result<u16> {
    match e {
      Expr::Int(n) => {
        let c = self.const_scalar(Scalar::Int(*n));
        let d = hint.resolve(&mut self.scalars);
        self.push(Instruction::LoadConst(SReg(d), c));
        Ok(d)
      }
      Expr::Float(f) => {
        let c = self.const_scalar(Scalar::Float(*f));
        let d = hint.resolve(&mut self.scalars);
        self.push(Instruction::LoadConst(SReg(d), c));
        Ok(d)
      }
      Expr::Str(s) => {
        let c = self.const_str(s);
        let d = hint.resolve(&mut self.scalars);
        self.push(Instruction::LoadConst(SReg(d), c));
        Ok(d)
      }
      Expr::Buf(b) => {
        let c = self.const_scalar(Scalar::buf(b.clone()));
        let d = hint.resolve(&mut self.scalars);
        self.push(Instruction::LoadConst(SReg(d), c));
        Ok(d)
      }
      Expr::Undef => {
        let d = hint.resolve(&mut self.scalars);
        self.push(Instruction::LoadNull(SReg(d)));
        Ok(d)
      }
      Expr::ScalarAccess(name) | Expr::ArrayAccessBase(name) => self.compile_scalar_access(name, hint),
      Expr::HashElem(base, key) => {
        let hreg = self.resolve_hash_reg(base)?;
        let kreg = self.compile_scalar(key, TargetHint::Any)?;
        let d = hint.resolve(&mut self.scalars);
        self.push(Instruction::HvLoad(SReg(d), HReg(hreg), SReg(kreg)));
        Ok(d)
      }
      Expr::ArrayElem(base, idx) => {
        let areg = self.resolve_array_reg(base)?;
        let ireg = self.compile_scalar(idx, TargetHint::Any)?;
        let d = hint.resolve(&mut self.scalars);
        self.push(Instruction::AvLoad(SReg(d), AReg(areg), SReg(ireg)));
        Ok(d)
      }
      Expr::Unary(op, inner) => {
        let r = self.compile_scalar(inner, TargetHint::Any)?;
        let d = hint.resolve(&mut self.scalars);
        match op {
          UnOpKind::Not => self.push(Instruction::LogicalNot(SReg(d), SReg(r))),
          UnOpKind::Neg => self.push(Instruction::UnOp(SReg(d), UnOp::Neg, SReg(r))),
          UnOpKind::Plus => self.push(Instruction::UnOp(SReg(d), UnOp::Plus, SReg(r))),
          UnOpKind::BitNot => self.push(Instruction::UnOp(SReg(d), UnOp::BitNot, SReg(r))),
        };
        Ok(d)
      }
      Expr::Binary(BinOpKind::And, l, r) => self.compile_and(l, r, hint),
      Expr::Binary(BinOpKind::Or, l, r) => self.compile_or(l, r, hint),
      Expr::Binary(op, l, r) => self.compile_binop(*op, l, r, hint),
      Expr::RegexMatch(inner, pattern) => self.compile_regex_match(inner, pattern, hint),
      Expr::RegexMatchGlobal(inner, pattern) => self.compile_regex_match_global(inner, pattern, hint),
      Expr::RegexReplace(inner, pattern, repl) => self.compile_regex_replace(inner, pattern, repl, hint),
      Expr::ScalarAssign(target, rhs) => self.compile_scalar_assign(target, rhs, hint),
      Expr::OpAssign(op, target, rhs) => self.compile_op_assign(*op, target, rhs, hint),
      Expr::ScalarOfArray(arr) => {
        let areg = self.compile_array(arr, TargetHint::Any)?;
        let d = hint.resolve(&mut self.scalars);
        self.push(Instruction::AvLen(SReg(d), AReg(areg)));
        Ok(d)
      }
      Expr::ArrayCtor(arr) => {
        let areg = self.compile_array(arr, TargetHint::Any)?;
        let d = hint.resolve(&mut self.scalars);
        self.push(Instruction::CreateArrayRef(SReg(d), AReg(areg)));
        Ok(d)
      }
      Expr::HashCtor(arr) => {
        let areg = self.compile_array(arr, TargetHint::Any)?;
        let hreg = self.hashes.fresh();
        self.push(Instruction::HashFromArray(HReg(hreg), AReg(areg)));
        let d = hint.resolve(&mut self.scalars);
        self.push(Instruction::CreateHashRef(SReg(d), HReg(hreg)));
        Ok(d)
      }
      Expr::Ternary(cond, t, f) => self.compile_ternary(cond, t, f, hint),
      Expr::ModuleRef(name) => {
        // An unquoted bareword that resolved to neither a call nor a hash
        // key autoquotes to its own text (a common Perl convenience).
        let c = self.const_str(name);
        let d = hint.resolve(&mut self.scalars);
        self.push(Instruction::LoadConst(SReg(d), c));
        Ok(d)
      }
      Expr::SubCall(name, args) => self.compile_sub_call(name, args, hint, false),
      Expr::MethodCall(recv, name, args) => self.compile_method_call(recv, name, args, hint, false),
      Expr::GoSpawn(call) => self.compile_go_spawn(call, hint),
      Expr::ScalarOf(inner) => self.compile_scalar(inner, hint),
    }
  }

  fn compile_scalar_access(&mut self, name: &Name, hint: TargetHint) -> Result<u16> {
    match name {
      Name::Ident(n) => {
        if let Some(r) = self.scalars.lookup(n) {
          return Ok(self.resolve_scalar_hint(hint, r));
        }
        let c = self.const_str(n);
        let d = hint.resolve(&mut self.scalars);
        self.push(Instruction::LoadGlobalScalar(SReg(d), c));
        Ok(d)
      }
      Name::Expr(e) => {
        let r = self.compile_scalar(e, TargetHint::Any)?;
        let d = hint.resolve(&mut self.scalars);
        self.push(Instruction::UnrefLoadScalar(SReg(d), SReg(r)));
        Ok(d)
      }
    }
  }

  /// Resolves the array an `$x[i]` / `->[i]` subscript indexes: a name
  /// (`Expr::ArrayAccessBase`) reads the local/global array directly; any
  /// other expression is dereferenced through a `Ref` (spec.md §4.5).
  fn resolve_array_reg(&mut self, base: &Expr) -> Result<u16> {
    match base {
      Expr::ArrayAccessBase(name) => self.array_by_name(name),
      other => {
        let r = self.compile_scalar(other, TargetHint::Any)?;
        let dest = self.arrays.fresh();
        self.push(Instruction::UnrefLoadArray(AReg(dest), SReg(r)));
        Ok(dest)
      }
    }
  }

  fn resolve_hash_reg(&mut self, base: &Expr) -> Result<u16> {
    match base {
      Expr::ArrayAccessBase(name) => self.hash_by_name(name),
      other => {
        let r = self.compile_scalar(other, TargetHint::Any)?;
        let dest = self.hashes.fresh();
        self.push(Instruction::UnrefLoadHash(HReg(dest), SReg(r)));
        Ok(dest)
      }
    }
  }

  fn array_by_name(&mut self, name: &Name) -> Result<u16> {
    match name {
      Name::Ident(n) if self.arrays.lookup(n).is_some() => Ok(self.arrays.lookup(n).unwrap()),
      Name::Ident(n) => {
        let dest = self.arrays.fresh();
        if n == "_" {
          self.push(Instruction::LoadArgsArray(AReg(dest)));
        } else {
          let c = self.const_str(n);
          self.push(Instruction::LoadGlobalArray(AReg(dest), c));
        }
        Ok(dest)
      }
      Name::Expr(e) => {
        let r = self.compile_scalar(e, TargetHint::Any)?;
        let dest = self.arrays.fresh();
        self.push(Instruction::UnrefLoadArray(AReg(dest), SReg(r)));
        Ok(dest)
      }
    }
  }

  fn hash_by_name(&mut self, name: &Name) -> Result<u16> {
    match name {
      Name::Ident(n) if self.hashes.lookup(n).is_some() => Ok(self.hashes.lookup(n).unwrap()),
      Name::Ident(n) => {
        let dest = self.hashes.fresh();
        let c = self.const_str(n);
        self.push(Instruction::LoadGlobalHash(HReg(dest), c));
        Ok(dest)
      }
      Name::Expr(e) => {
        let r = self.compile_scalar(e, TargetHint::Any)?;
        let dest = self.hashes.fresh();
        self.push(Instruction::UnrefLoadHash(HReg(dest), SReg(r)));
        Ok(dest)
      }
    }
  }

  fn compile_and(&mut self, l: &Expr, r: &Expr, hint: TargetHint) -> Result<u16> {
    let d = hint.resolve(&mut self.scalars);
    self.compile_scalar(l, TargetHint::Exact(d))?;
    let jf = self.push(Instruction::JumpUnless(Offset(0), SReg(d)));
    self.compile_scalar(r, TargetHint::Exact(d))?;
    self.patch(jf, self.here());
    Ok(d)
  }

  /// Correctly short-circuits (`a || b`), in contrast to the source's
  /// apparent `a && a` duplication bug flagged by spec.md §9.
  fn compile_or(&mut self, l: &Expr, r: &Expr, hint: TargetHint) -> Result<u16> {
    let d = hint.resolve(&mut self.scalars);
    self.compile_scalar(l, TargetHint::Exact(d))?;
    let jt = self.push(Instruction::JumpIf(Offset(0), SReg(d)));
    self.compile_scalar(r, TargetHint::Exact(d))?;
    self.patch(jt, self.here());
    Ok(d)
  }

  fn compile_binop(&mut self, op: BinOpKind, l: &Expr, r: &Expr, hint: TargetHint) -> Result<u16> {
    let lr = self.compile_scalar(l, TargetHint::Any)?;
    let rr = self.compile_scalar(r, TargetHint::Any)?;
    let d = hint.resolve(&mut self.scalars);
    let instr = match op {
      BinOpKind::Add => Instruction::BinOp(SReg(d), BinOp::Add, SReg(lr), SReg(rr)),
      BinOpKind::Sub => Instruction::BinOp(SReg(d), BinOp::Sub, SReg(lr), SReg(rr)),
      BinOpKind::Mul => Instruction::BinOp(SReg(d), BinOp::Mul, SReg(lr), SReg(rr)),
      BinOpKind::Div => Instruction::BinOp(SReg(d), BinOp::Div, SReg(lr), SReg(rr)),
      BinOpKind::Rem => Instruction::BinOp(SReg(d), BinOp::Rem, SReg(lr), SReg(rr)),
      BinOpKind::Concat => Instruction::BinOp(SReg(d), BinOp::Concat, SReg(lr), SReg(rr)),
      BinOpKind::NumEq => Instruction::CmpOp(SReg(d), CmpOp::NumEq, SReg(lr), SReg(rr)),
      BinOpKind::NumNe => Instruction::CmpOp(SReg(d), CmpOp::NumNe, SReg(lr), SReg(rr)),
      BinOpKind::NumLt => Instruction::CmpOp(SReg(d), CmpOp::NumLt, SReg(lr), SReg(rr)),
      BinOpKind::NumLe => Instruction::CmpOp(SReg(d), CmpOp::NumLe, SReg(lr), SReg(rr)),
      BinOpKind::NumGt => Instruction::CmpOp(SReg(d), CmpOp::NumGt, SReg(lr), SReg(rr)),
      BinOpKind::NumGe => Instruction::CmpOp(SReg(d), CmpOp::NumGe, SReg(lr), SReg(rr)),
      BinOpKind::StrEq => Instruction::CmpOp(SReg(d), CmpOp::StrEq, SReg(lr), SReg(rr)),
      BinOpKind::StrNe => Instruction::CmpOp(SReg(d), CmpOp::StrNe, SReg(lr), SReg(rr)),
      BinOpKind::StrLt => Instruction::CmpOp(SReg(d), CmpOp::StrLt, SReg(lr), SReg(rr)),
      BinOpKind::StrLe => Instruction::CmpOp(SReg(d), CmpOp::StrLe, SReg(lr), SReg(rr)),
      BinOpKind::StrGt => Instruction::CmpOp(SReg(d), CmpOp::StrGt, SReg(lr), SReg(rr)),
      BinOpKind::StrGe => Instruction::CmpOp(SReg(d), CmpOp::StrGe, SReg(lr), SReg(rr)),
      BinOpKind::And | BinOpKind::Or => unreachable!("handled by compile_and/compile_or"),
    };
    self.push(instr);
    Ok(d)
  }

  fn compile_regex_match(&mut self, inner: &Expr, pattern: &str, hint: TargetHint) -> Result<u16> {
    let sreg = self.compile_scalar(inner, TargetHint::Any)?;
    let pat_const = self.const_str(pattern);
    let n = count_capture_groups(pattern);
    let first_capture = self.scalars.bind("0");
    for i in 1..=n {
      self.scalars.bind(&i.to_string());
    }
    let d = hint.resolve(&mut self.scalars);
    self.push(Instruction::RegexMatch(SReg(d), SReg(sreg), pat_const, SReg(first_capture)));
    Ok(d)
  }

  /// Models `=~ m//g` as a scalar match count: the global-match opcode
  /// fills a scratch array with every match, and the expression's scalar
  /// value is that array's length (truthy iff there was at least one).
  fn compile_regex_match_global(&mut self, inner: &Expr, pattern: &str, hint: TargetHint) -> Result<u16> {
    let sreg = self.compile_scalar(inner, TargetHint::Any)?;
    let pat_const = self.const_str(pattern);
    let areg = self.arrays.fresh();
    self.push(Instruction::RegexMatchGlobal(AReg(areg), SReg(sreg), pat_const));
    let d = hint.resolve(&mut self.scalars);
    self.push(Instruction::AvLen(SReg(d), AReg(areg)));
    Ok(d)
  }

  fn compile_regex_replace(&mut self, inner: &Expr, pattern: &str, repl: &str, hint: TargetHint) -> Result<u16> {
    let sreg = self.compile_scalar(inner, TargetHint::Any)?;
    let pat_const = self.const_str(pattern);
    let repl_const = self.const_str(repl);
    let d = hint.resolve(&mut self.scalars);
    self.push(Instruction::RegexReplace(SReg(d), SReg(sreg), pat_const, repl_const));
    // `s///` mutates its subject in place when the subject is an lvalue.
    if matches!(inner, Expr::ScalarAccess(_) | Expr::HashElem(..) | Expr::ArrayElem(..)) {
      self.store_scalar(inner, d)?;
    }
    Ok(d)
  }

  fn store_scalar(&mut self, target: &Expr, value: u16) -> Result<()> {
    match target {
      Expr::ScalarAccess(Name::Ident(n)) => {
        if let Some(r) = self.scalars.lookup(n) {
          if r != value {
            self.push(Instruction::MoveScalar(SReg(r), SReg(value)));
          }
        } else {
          let c = self.const_str(n);
          self.push(Instruction::StoreGlobalScalar(c, SReg(value)));
        }
        Ok(())
      }
      Expr::ScalarAccess(Name::Expr(e)) => {
        let rref = self.compile_scalar(e, TargetHint::Any)?;
        self.push(Instruction::UnrefStoreScalar(SReg(rref), SReg(value)));
        Ok(())
      }
      Expr::HashElem(base, key) => {
        let hreg = self.resolve_hash_reg(base)?;
        let kreg = self.compile_scalar(key, TargetHint::Any)?;
        self.push(Instruction::HvStore(HReg(hreg), SReg(kreg), SReg(value)));
        Ok(())
      }
      Expr::ArrayElem(base, idx) => {
        let areg = self.resolve_array_reg(base)?;
        let ireg = self.compile_scalar(idx, TargetHint::Any)?;
        self.push(Instruction::AvStore(AReg(areg), SReg(ireg), SReg(value)));
        Ok(())
      }
      other => Err(Error::compile(format!("cannot assign to {other:?}"), Default::default())),
    }
  }

  fn compile_scalar_assign(&mut self, target: &Expr, rhs: &Expr, hint: TargetHint) -> Result<u16> {
    if let Expr::ScalarAccess(Name::Ident(n)) = target {
      if let Some(r) = self.scalars.lookup(n) {
        self.compile_scalar(rhs, TargetHint::Exact(r))?;
        return Ok(self.resolve_scalar_hint(hint, r));
      }
    }
    let v = self.compile_scalar(rhs, TargetHint::Any)?;
    self.store_scalar(target, v)?;
    Ok(self.resolve_scalar_hint(hint, v))
  }

  fn compile_op_assign(&mut self, op: AssignOp, target: &Expr, rhs: &Expr, hint: TargetHint) -> Result<u16> {
    if matches!(op, AssignOp::Set) {
      return self.compile_scalar_assign(target, rhs, hint);
    }
    let cur = self.compile_scalar(target, TargetHint::Any)?;
    let rv = self.compile_scalar(rhs, TargetHint::Any)?;
    let d = self.scalars.fresh();
    let binop = match op {
      AssignOp::Add => BinOp::Add,
      AssignOp::Sub => BinOp::Sub,
      AssignOp::Mul => BinOp::Mul,
      AssignOp::Div => BinOp::Div,
      AssignOp::Rem => BinOp::Rem,
      AssignOp::Concat => BinOp::Concat,
      AssignOp::Set => unreachable!(),
    };
    self.push(Instruction::BinOp(SReg(d), binop, SReg(cur), SReg(rv)));
    self.store_scalar(target, d)?;
    Ok(self.resolve_scalar_hint(hint, d))
  }

  fn compile_ternary(&mut self, cond: &Expr, t: &Expr, f: &Expr, hint: TargetHint) -> Result<u16> {
    let d = hint.resolve(&mut self.scalars);
    let cr = self.compile_scalar(cond, TargetHint::Any)?;
    let jf = self.push(Instruction::JumpUnless(Offset(0), SReg(cr)));
    self.compile_scalar(t, TargetHint::Exact(d))?;
    let jend = self.push(Instruction::Jump(Offset(0)));
    self.patch(jf, self.here());
    self.compile_scalar(f, TargetHint::Exact(d))?;
    self.patch(jend, self.here());
    Ok(d)
  }

  fn build_scratch(&mut self, exprs: &[Expr]) -> Result<u16> {
    let scratch = self.arrays.fresh();
    self.push(Instruction::Scratch(AReg(scratch), ScratchOp::Clear));
    for e in exprs {
      let r = self.compile_scalar(e, TargetHint::Any)?;
      self.push(Instruction::Scratch(AReg(scratch), ScratchOp::AddScalar(SReg(r))));
    }
    Ok(scratch)
  }

  fn compile_sub_call(&mut self, name: &str, args: &[Expr], hint: TargetHint, go: bool) -> Result<u16> {
    let scratch = self.build_scratch(args)?;
    let c = self.const_str(name);
    if go {
      self.push(Instruction::SubCallGo(c, AReg(scratch)));
      let d = hint.resolve(&mut self.scalars);
      self.push(Instruction::LoadNull(SReg(d)));
      Ok(d)
    } else {
      let d = hint.resolve(&mut self.scalars);
      self.push(Instruction::SubCall(SReg(d), c, AReg(scratch)));
      Ok(d)
    }
  }

  fn compile_method_call(&mut self, recv: &Expr, name: &str, args: &[Expr], hint: TargetHint, go: bool) -> Result<u16> {
    // A bareword receiver (`Foo->bar()`) names a module to resolve at the
    // call site, not a string value — load it as a `Scalar::Module` so the
    // isolate's `MethodCall` can dispatch on the tag rather than guessing
    // from an ordinary string. The classloader id is left unbound (0); the
    // handle's own `resolve_with` memoizes the lookup regardless of id.
    let rreg = if let Expr::ModuleRef(module_name) = recv {
      let handle = crate::value::ModuleHandle::new(module_name.clone(), 0);
      let c = self.const_scalar(Scalar::Module(handle));
      let d = self.scalars.fresh();
      self.push(Instruction::LoadConst(SReg(d), c));
      d
    } else {
      self.compile_scalar(recv, TargetHint::Any)?
    };
    let scratch = self.build_scratch(args)?;
    let c = self.const_str(name);
    if go {
      self.push(Instruction::MethodCallGo(SReg(rreg), c, AReg(scratch)));
      let d = hint.resolve(&mut self.scalars);
      self.push(Instruction::LoadNull(SReg(d)));
      Ok(d)
    } else {
      let d = hint.resolve(&mut self.scalars);
      self.push(Instruction::MethodCall(SReg(d), SReg(rreg), c, AReg(scratch)));
      Ok(d)
    }
  }

  fn compile_go_spawn(&mut self, call: &Expr, hint: TargetHint) -> Result<u16> {
    match call {
      Expr::SubCall(name, args) => self.compile_sub_call(name, args, hint, true),
      Expr::MethodCall(recv, name, args) => self.compile_method_call(recv, name, args, hint, true),
      other => Err(Error::compile(format!("`go` may only follow a call expression, found {other:?}"), Default::default())),
    }
  }

  // ---- array expressions --------------------------------------------------

  fn compile_array(&mut self, ast: &ArrayExpr, hint: TargetHint) -> Result<u16> {
    let got = match ast {
      ArrayExpr::ArrayAccess(name) => self.array_by_name(name)?,
      ArrayExpr::HashAsArray(name) => {
        let h = self.hash_by_name(name)?;
        let d = self.arrays.fresh();
        self.push(Instruction::ArrayFromHash(AReg(d), HReg(h)));
        d
      }
      ArrayExpr::Concat(items) => self.build_scratch(items)?,
      ArrayExpr::ArrayAssign(target, rhs) => self.compile_array_assign(target, rhs)?,
      ArrayExpr::Ternary(cond, t, f) => self.compile_array_ternary(cond, t, f)?,
    };
    Ok(self.resolve_array_hint(hint, got))
  }

  /// `(target) = rhs` (spec.md §4.5): materialize `rhs` then copy it
  /// wholesale into `target`'s storage. The grammar only ever constructs
  /// this node with a single named-array or named-hash-as-array target
  /// (from `my @a = ...` / `my %h = ...` desugaring), so there is no
  /// multi-slot list-unpacking destructuring to perform here.
  fn compile_array_assign(&mut self, target: &ArrayExpr, rhs: &ArrayExpr) -> Result<u16> {
    let rhs_reg = self.compile_array(rhs, TargetHint::Any)?;
    match target {
      ArrayExpr::ArrayAccess(name) => {
        let dest = self.array_by_name(name)?;
        self.push(Instruction::MoveArray(AReg(dest), AReg(rhs_reg)));
        Ok(dest)
      }
      ArrayExpr::HashAsArray(name) => {
        let dest = self.hash_by_name(name)?;
        self.push(Instruction::HashFromArray(HReg(dest), AReg(rhs_reg)));
        Ok(rhs_reg)
      }
      other => Err(Error::compile(format!("cannot assign to {other:?}"), Default::default())),
    }
  }

  fn compile_array_ternary(&mut self, cond: &Expr, t: &ArrayExpr, f: &ArrayExpr) -> Result<u16> {
    let d = self.arrays.fresh();
    let cr = self.compile_scalar(cond, TargetHint::Any)?;
    let jf = self.push(Instruction::JumpUnless(Offset(0), SReg(cr)));
    self.compile_array(t, TargetHint::Exact(d))?;
    let jend = self.push(Instruction::Jump(Offset(0)));
    self.patch(jf, self.here());
    self.compile_array(f, TargetHint::Exact(d))?;
    self.patch(jend, self.here());
    Ok(d)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::syntax::parse;

  fn compile(src: &str) -> Module {
    let ctx = Context::for_test();
    let ast = parse(src).unwrap();
    emit(&ctx, &ast).unwrap()
  }

  #[test]
  fn compiles_main_with_clear_args_suffix() {
    let module = compile("my $x = 1 + 2 * 3;");
    let main = module.main.get().unwrap();
    assert!(matches!(main.instructions.last(), Some(Instruction::ClearArgs)));
  }

  #[test]
  fn compiles_sub_with_return() {
    let module = compile("sub inc { my @a = @_; return $a[0] + 1; } print inc(10);");
    assert!(module.procedure("inc").is_some());
  }

  #[test]
  fn for_loop_allocates_a_loop_variable_register() {
    let module = compile("for $i (1,2,3) { print $i; }");
    let main = module.main.get().unwrap();
    assert!(main.metrics.scalars >= 2);
  }

  #[test]
  fn regex_match_binds_contiguous_capture_registers() {
    let module = compile(r#"if ($s =~ m/(\w+) (\w+)/) { print "$1,$2"; }"#);
    let main = module.main.get().unwrap();
    let found = main.instructions.iter().any(|i| matches!(i, Instruction::RegexMatch(..)));
    assert!(found);
  }
}
