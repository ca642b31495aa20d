//! The opcode vocabulary (spec.md §4.6) as a tagged instruction enum.
//!
//! spec.md §9 is explicit: "A systems-language implementation should prefer
//! a tagged enum whose payload holds operand indices; the main loop becomes
//! a match" rather than the source's closures-as-opcodes. `Instruction` is
//! that enum; `isolate::exec_one` is the `match` over it.

/// A scalar register index. Bounds are checked at compile time against the
/// owning `Procedure`'s `RegisterMetrics` (spec.md §3's invariant).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SReg(pub u16);

/// An array register index.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AReg(pub u16);

/// A hash register index.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HReg(pub u16);

/// Index into the owning `Module`'s constant pool.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Const(pub u32);

/// Signed jump distance in instructions, relative to the instruction
/// following the jump.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Offset(pub i32);

/// A binary arithmetic/comparison operator, dispatched by the isolate's
/// `binop`/`cmp` tables (spec.md §4.6).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinOp {
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  Concat,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CmpOp {
  NumEq,
  NumNe,
  NumLt,
  NumLe,
  NumGt,
  NumGe,
  StrEq,
  StrNe,
  StrLt,
  StrLe,
  StrGt,
  StrGe,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnOp {
  Neg,
  Not,
  BitNot,
  Plus,
}

/// How a call's arguments/scratch list are assembled before transfer into
/// the thread's `@_` (spec.md §4.6's "scratch array operations").
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScratchOp {
  Clear,
  PushNull,
  InitFrom(AReg),
  AddScalar(SReg),
  AddArray(AReg),
  ShiftScalar(SReg),
  ShiftArray(AReg),
}

#[derive(Clone, Debug)]
pub enum Instruction {
  Noop,

  // Literals & globals
  LoadConst(SReg, Const),
  LoadNull(SReg),
  LoadGlobalScalar(SReg, Const),
  StoreGlobalScalar(Const, SReg),
  LoadGlobalArray(AReg, Const),
  LoadGlobalHash(HReg, Const),

  // Register moves
  MoveScalar(SReg, SReg),
  MoveArray(AReg, AReg),
  MoveHash(HReg, HReg),

  // Unref loads/stores: dereference a Scalar-cell/AV/HV via a reference
  // held in a scalar register.
  UnrefLoadScalar(SReg, SReg),
  UnrefStoreScalar(SReg, SReg),
  UnrefLoadArray(AReg, SReg),
  UnrefLoadHash(HReg, SReg),

  // AV element: loader families {local, global, args, unref} x {load, store, slot}
  AvLoad(SReg, AReg, SReg),
  AvStore(AReg, SReg, SReg),
  AvLoadArgs(SReg, SReg),
  AvLen(SReg, AReg),
  /// Copies the thread's current `@_` wholesale into an array register
  /// (spec.md §4.5: "`@_`... refers to the caller-supplied argument vector
  /// carried in the thread-state, not a register").
  LoadArgsArray(AReg),

  // HV element
  HvLoad(SReg, HReg, SReg),
  HvStore(HReg, SReg, SReg),
  HvDelete(HReg, SReg),

  // Scratch array ops (argument / list-literal construction)
  Scratch(AReg, ScratchOp),
  CreateArrayRef(SReg, AReg),
  CreateHashRef(SReg, HReg),
  HashFromArray(HReg, AReg),
  ArrayFromHash(AReg, HReg),

  // Arithmetic & comparison
  BinOp(SReg, BinOp, SReg, SReg),
  CmpOp(SReg, CmpOp, SReg, SReg),
  UnOp(SReg, UnOp, SReg),
  LogicalNot(SReg, SReg),

  // Regex: `match` binds capture groups 0..n into the registers starting
  // at `first_capture`; `replace` writes the substituted value.
  RegexMatch(SReg, SReg, Const, SReg),
  RegexMatchGlobal(AReg, SReg, Const),
  RegexReplace(SReg, SReg, Const, Const),

  // Control flow: a single signed `Jump` serves both forward branches and
  // loop back-edges, so `next`/`last`/`while`/`for` all lower to it plus
  // conditional variants — no separate nested-slice loop instruction.
  Jump(Offset),
  JumpIf(Offset, SReg),
  JumpUnless(Offset, SReg),
  /// Unwinds to the enclosing `Procedure` boundary, carrying the register
  /// holding the value `@_`'s post-call scalar read will observe.
  Return(SReg),

  // Calls. A call's receiver register may hold either a blessed `Reference`
  // or a bare `Module` scalar — the isolate dispatches on the runtime tag,
  // so method-call and module-qualified call share one instruction rather
  // than the source's separate `methodcall`/`modcall` opcodes.
  SubCall(SReg, Const, AReg),
  SubCallGo(Const, AReg),
  MethodCall(SReg, SReg, Const, AReg),
  MethodCallGo(SReg, Const, AReg),

  RequireModule(Const),
  RequireModuleRegister(SReg),

  Print(AReg),

  /// `eval { ... }` (spec.md §7): runs a nested instruction slice, catching
  /// a runtime error from it and binding the message into the module's `@`
  /// global instead of propagating. Variadic per-opcode state (an owned
  /// sub-program) doesn't fit the fixed-width variants above, so this one
  /// stays closure-shaped rather than forcing it into operand indices.
  EvalBlock(Vec<Instruction>),

  ClearArgs,
}
