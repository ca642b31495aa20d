//! AST (spec.md §4.2). Each "field of type any" in the distilled source is
//! modeled as an explicit variant rather than a boxed `dyn Any`; a `Name`
//! distinguishes "identifier" from "evaluate this expression" wherever the
//! grammar allows either (`$x` vs `${expr}`, hash keys, etc).

use span::Span;

/// `array`, `hybrid` and `call` capability markers (spec.md §4.2, §9): a
/// single `kind()` method rather than a trait hierarchy.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Kind {
  Scalar,
  Array,
  Hybrid,
  Call,
}

#[derive(Clone, Debug)]
pub enum Name {
  Ident(String),
  Expr(Box<Expr>),
}

#[derive(Clone, Copy, Debug)]
pub enum BinOpKind {
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  Concat,
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
  And,
  Or,
}

#[derive(Clone, Copy, Debug)]
pub enum UnOpKind {
  Neg,
  Plus,
  Not,
  BitNot,
}

#[derive(Clone, Copy, Debug)]
pub enum AssignOp {
  Set,
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  Concat,
}

#[derive(Clone, Debug)]
pub struct Spanned<T> {
  pub node: T,
  pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Expr {
  Int(i64),
  Float(f64),
  Str(String),
  Buf(Vec<u8>),
  Undef,
  /// `$name` / `${expr}`.
  ScalarAccess(Name),
  /// The bare container name in `$x[i]` / `$x{k}`: these index `@x`/`%x`,
  /// not a dereference of scalar `$x`, so the base is its own node.
  ArrayAccessBase(Name),
  /// `$h{k}`.
  HashElem(Box<Expr>, Box<Expr>),
  /// `$a[i]`.
  ArrayElem(Box<Expr>, Box<Expr>),
  Unary(UnOpKind, Box<Expr>),
  Binary(BinOpKind, Box<Expr>, Box<Expr>),
  /// `expr =~ m/pat/`.
  RegexMatch(Box<Expr>, String),
  /// `expr =~ m/pat/g`.
  RegexMatchGlobal(Box<Expr>, String),
  /// `expr =~ s/pat/repl/`.
  RegexReplace(Box<Expr>, String, String),
  ScalarAssign(Box<Expr>, Box<Expr>),
  OpAssign(AssignOp, Box<Expr>, Box<Expr>),
  /// `scalar @a` / `scalar %h`: array/hash coerced to a length.
  ScalarOfArray(Box<ArrayExpr>),
  /// `[...]`.
  ArrayCtor(Box<ArrayExpr>),
  /// `{...}`.
  HashCtor(Box<ArrayExpr>),
  Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
  ModuleRef(String),
  /// `name(args)`.
  SubCall(String, Vec<Expr>),
  /// `expr->name(args)`.
  MethodCall(Box<Expr>, String, Vec<Expr>),
  /// A call expression suffixed with `go`.
  GoSpawn(Box<Expr>),
  /// Explicit `scalar EXPR` coercion of a hybrid node.
  ScalarOf(Box<Expr>),
}

#[derive(Clone, Debug)]
pub enum ArrayExpr {
  /// `@name` / `@{expr}`.
  ArrayAccess(Name),
  /// `%name` / `%{expr}` used in array (flattened) context.
  HashAsArray(Name),
  ArrayAssign(Box<ArrayExpr>, Box<ArrayExpr>),
  /// `(a, b, ...)`; argument lists flatten nested concats one level
  /// (spec.md §4.3).
  Concat(Vec<Expr>),
  Ternary(Box<Expr>, Box<ArrayExpr>, Box<ArrayExpr>),
}

#[derive(Clone, Copy, Debug)]
pub enum Sigil {
  Scalar,
  Array,
  Hash,
}

#[derive(Clone, Debug)]
pub enum Stmt {
  My(Vec<(Sigil, String)>),
  ExprStmt(Expr),
  ArrayExprStmt(ArrayExpr),
  Print(Vec<Expr>),
  Block(Vec<Stmt>),
  If(Expr, Vec<Stmt>, Option<Vec<Stmt>>),
  Unless(Expr, Vec<Stmt>, Option<Vec<Stmt>>),
  While(Expr, Vec<Stmt>),
  /// `for $v (expr) { ... }`.
  ForIn(String, ArrayExpr, Vec<Stmt>),
  Eval(Vec<Stmt>),
  Next,
  Last,
  Return(Option<Expr>),
  RequireStatic(String),
  RequireDynamic(Expr),
}

#[derive(Clone, Debug)]
pub struct SubDecl {
  pub name: String,
  pub body: Vec<Stmt>,
  pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ModuleAst {
  pub name: String,
  pub subs: Vec<SubDecl>,
  pub main: Vec<Stmt>,
}

impl Expr {
  /// spec.md §9's `kind()`: most expressions are plain scalars; calls are
  /// marked `Call` so the parser/compiler can apply call-specific context
  /// rules (e.g. a trailing `go`).
  pub fn kind(&self) -> Kind {
    match self {
      Expr::SubCall(..) | Expr::MethodCall(..) => Kind::Call,
      _ => Kind::Scalar,
    }
  }
}

impl ArrayExpr {
  pub fn kind(&self) -> Kind {
    Kind::Array
  }
}
