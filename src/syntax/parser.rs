//! Recursive-descent, Pratt-style parser (spec.md §4.3).
//!
//! The precedence ladder is four free functions, `expr0`..`expr3`, each
//! calling into the next tier, matching the teacher's per-tier-function
//! shape (`examples/jprochazk-hebi/src/emit.rs` style, reapplied to parsing
//! rather than lowering). Left recursion is handled by trailer-style
//! repetition: after a primary is accepted, registered "trailer" rules
//! (binops, subscripts, method-arrow) are attempted until none match.

use span::Span;

use super::ast::*;
use super::lexer::{tokenize, Kw, Token, TokenKind};
use crate::error::{Error, Result};

pub fn parse(src: &str) -> Result<ModuleAst> {
  let tokens = tokenize(src)?;
  let mut parser = Parser { tokens, pos: 0, module_name: "main".to_string() };
  parser.parse_module()
}

struct Parser {
  tokens: Vec<Token>,
  pos: usize,
  module_name: String,
}

impl Parser {
  fn peek(&self) -> &Token {
    &self.tokens[self.pos.min(self.tokens.len() - 1)]
  }

  fn span(&self) -> Span {
    self.peek().span
  }

  fn bump(&mut self) -> Token {
    let tok = self.peek().clone();
    if self.pos < self.tokens.len() - 1 {
      self.pos += 1;
    }
    tok
  }

  fn is_punct(&self, p: &str) -> bool {
    matches!(&self.peek().kind, TokenKind::Punct(q) if *q == p)
  }

  fn is_kw(&self, kw: Kw) -> bool {
    matches!(&self.peek().kind, TokenKind::Keyword(k) if *k == kw)
  }

  fn eat_punct(&mut self, p: &str) -> bool {
    if self.is_punct(p) {
      self.bump();
      true
    } else {
      false
    }
  }

  fn eat_kw(&mut self, kw: Kw) -> bool {
    if self.is_kw(kw) {
      self.bump();
      true
    } else {
      false
    }
  }

  /// A cut marker: once this punctuator is seen, failure to complete the
  /// surrounding construct is a hard parse error (spec.md §4.3).
  fn expect_punct(&mut self, p: &str) -> Result<()> {
    if self.eat_punct(p) {
      Ok(())
    } else {
      Err(Error::parse(format!("expected `{p}`"), self.span()))
    }
  }

  /// `A::B::C` (spec.md §6.3): consecutive `:` `:` punctuators glue onto a
  /// trailing identifier.
  fn parse_dotted_name(&mut self) -> Result<String> {
    let mut out = self.expect_ident()?;
    loop {
      let save = self.pos;
      if self.eat_punct(":") && self.eat_punct(":") {
        out.push_str("::");
        out.push_str(&self.expect_ident()?);
      } else {
        self.pos = save;
        break;
      }
    }
    Ok(out)
  }

  fn expect_ident(&mut self) -> Result<String> {
    match self.peek().kind.clone() {
      TokenKind::Ident(s) => {
        self.bump();
        Ok(s)
      }
      _ => Err(Error::parse("expected identifier", self.span())),
    }
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().kind, TokenKind::Eof)
  }

  // ---- top level -------------------------------------------------------

  fn parse_module(&mut self) -> Result<ModuleAst> {
    let mut subs = Vec::new();
    let mut main = Vec::new();

    while !self.is_eof() {
      if self.eat_kw(Kw::Package) {
        self.module_name = self.parse_dotted_name()?;
        self.eat_punct(";");
        continue;
      }
      if self.is_kw(Kw::Sub) {
        subs.push(self.parse_sub_decl()?);
        continue;
      }
      main.push(self.parse_stmt()?);
    }

    Ok(ModuleAst { name: self.module_name.clone(), subs, main })
  }

  fn parse_sub_decl(&mut self) -> Result<SubDecl> {
    let start = self.span();
    self.bump(); // `sub`
    let name = self.expect_ident()?;
    let body = self.parse_block()?;
    Ok(SubDecl { name, body, span: start })
  }

  fn parse_block(&mut self) -> Result<Vec<Stmt>> {
    self.expect_punct("{")?;
    let mut stmts = Vec::new();
    while !self.is_punct("}") {
      if self.is_eof() {
        return Err(Error::parse("unterminated block", self.span()));
      }
      stmts.push(self.parse_stmt()?);
    }
    self.expect_punct("}")?;
    Ok(stmts)
  }

  // ---- statements --------------------------------------------------------

  fn parse_stmt(&mut self) -> Result<Stmt> {
    if self.is_kw(Kw::My) {
      return self.parse_my();
    }
    if self.is_kw(Kw::If) {
      return self.parse_if(false);
    }
    if self.is_kw(Kw::Unless) {
      return self.parse_if(true);
    }
    if self.is_kw(Kw::While) {
      return self.parse_while();
    }
    if self.is_kw(Kw::For) {
      return self.parse_for();
    }
    if self.is_kw(Kw::Eval) {
      self.bump();
      let body = self.parse_block()?;
      return Ok(Stmt::Eval(body));
    }
    if self.is_kw(Kw::Print) {
      self.bump();
      let mut args = vec![self.parse_expr3()?];
      while self.eat_punct(",") {
        args.push(self.parse_expr3()?);
      }
      let stmt = self.apply_suffix_condition(Stmt::Print(args))?;
      self.eat_punct(";");
      return Ok(stmt);
    }
    if self.is_kw(Kw::Next) {
      self.bump();
      self.eat_punct(";");
      return Ok(Stmt::Next);
    }
    if self.is_kw(Kw::Last) {
      self.bump();
      self.eat_punct(";");
      return Ok(Stmt::Last);
    }
    if self.is_kw(Kw::Return) {
      self.bump();
      let value = if self.is_punct(";") { None } else { Some(self.parse_expr3()?) };
      self.eat_punct(";");
      return Ok(Stmt::Return(value));
    }
    if self.is_kw(Kw::Require) {
      self.bump();
      let stmt = if matches!(self.peek().kind, TokenKind::Ident(_)) {
        Stmt::RequireStatic(self.parse_dotted_name()?)
      } else {
        Stmt::RequireDynamic(self.parse_expr3()?)
      };
      self.eat_punct(";");
      return Ok(stmt);
    }
    if self.is_punct("{") {
      return Ok(Stmt::Block(self.parse_block()?));
    }
    if self.is_punct("@") || self.is_punct("%") {
      let arr = self.parse_array_expr()?;
      let stmt = self.apply_suffix_condition(Stmt::ArrayExprStmt(arr))?;
      self.eat_punct(";");
      return Ok(stmt);
    }

    let e = self.parse_expr3()?;
    let stmt = self.apply_suffix_condition(Stmt::ExprStmt(e))?;
    self.eat_punct(";");
    Ok(stmt)
  }

  /// `expr if cond;` / `expr unless cond;` statement-suffix conditions
  /// (spec.md §6.1).
  fn apply_suffix_condition(&mut self, stmt: Stmt) -> Result<Stmt> {
    if self.eat_kw(Kw::If) {
      let cond = self.parse_expr3()?;
      return Ok(Stmt::If(cond, vec![stmt], None));
    }
    if self.eat_kw(Kw::Unless) {
      let cond = self.parse_expr3()?;
      return Ok(Stmt::Unless(cond, vec![stmt], None));
    }
    Ok(stmt)
  }

  fn parse_my(&mut self) -> Result<Stmt> {
    self.bump(); // `my`
    let mut decls = Vec::new();
    loop {
      let (sigil, p) = match self.peek().kind.clone() {
        TokenKind::Punct("$") => (Sigil::Scalar, "$"),
        TokenKind::Punct("@") => (Sigil::Array, "@"),
        TokenKind::Punct("%") => (Sigil::Hash, "%"),
        _ => return Err(Error::parse("expected a sigiled name after `my`", self.span())),
      };
      let _ = p;
      self.bump();
      let name = self.expect_ident()?;
      decls.push((sigil, name));
      if !self.eat_punct(",") {
        break;
      }
    }
    if self.eat_punct("=") {
      // `my $x = expr;` desugars to a declaration followed by an assign; a
      // `my @a = ...` / `my %h = ...` initializer parses in array-expression
      // grammar, since the rhs may be a bare `@_`/`%h` read or a `(...)`
      // list literal, neither of which the scalar ladder accepts.
      if decls.len() == 1 && matches!(decls[0].0, Sigil::Scalar) {
        let rhs = self.parse_expr3()?;
        self.eat_punct(";");
        let name = decls[0].1.clone();
        return Ok(Stmt::Block(vec![
          Stmt::My(decls),
          Stmt::ExprStmt(Expr::ScalarAssign(
            Box::new(Expr::ScalarAccess(Name::Ident(name))),
            Box::new(rhs),
          )),
        ]));
      }
      if decls.len() == 1 {
        let rhs_array = self.parse_array_expr()?;
        self.eat_punct(";");
        let name = decls[0].1.clone();
        let target = match decls[0].0 {
          Sigil::Array => ArrayExpr::ArrayAccess(Name::Ident(name)),
          Sigil::Hash => ArrayExpr::HashAsArray(Name::Ident(name)),
          Sigil::Scalar => unreachable!(),
        };
        return Ok(Stmt::Block(vec![
          Stmt::My(decls),
          Stmt::ArrayExprStmt(ArrayExpr::ArrayAssign(Box::new(target), Box::new(rhs_array))),
        ]));
      }
      return Err(Error::parse("unsupported multi-variable `my` initializer", self.span()));
    }
    self.eat_punct(";");
    Ok(Stmt::My(decls))
  }

  fn parse_if(&mut self, unless: bool) -> Result<Stmt> {
    self.bump();
    self.expect_punct("(")?;
    let cond = self.parse_expr3()?;
    self.expect_punct(")")?;
    let then = self.parse_block()?;
    let else_ = if self.eat_kw(Kw::Else) { Some(self.parse_block()?) } else { None };
    if unless {
      Ok(Stmt::Unless(cond, then, else_))
    } else {
      Ok(Stmt::If(cond, then, else_))
    }
  }

  fn parse_while(&mut self) -> Result<Stmt> {
    self.bump();
    self.expect_punct("(")?;
    let cond = self.parse_expr3()?;
    self.expect_punct(")")?;
    let body = self.parse_block()?;
    Ok(Stmt::While(cond, body))
  }

  fn parse_for(&mut self) -> Result<Stmt> {
    self.bump();
    self.expect_punct("$")?;
    let var = self.expect_ident()?;
    self.expect_punct("(")?;
    let src = self.parse_array_expr()?;
    self.expect_punct(")")?;
    let body = self.parse_block()?;
    Ok(Stmt::ForIn(var, src, body))
  }

  // ---- scalar expression precedence ladder ------------------------------

  /// Expr3: assignments and op-assignments (lowest precedence).
  fn parse_expr3(&mut self) -> Result<Expr> {
    let lhs = self.parse_expr2()?;
    if self.eat_punct("=") {
      let rhs = self.parse_expr3()?;
      return Ok(Expr::ScalarAssign(Box::new(lhs), Box::new(rhs)));
    }
    for (p, op) in [
      ("+=", AssignOp::Add),
      ("-=", AssignOp::Sub),
      ("*=", AssignOp::Mul),
      ("/=", AssignOp::Div),
      ("%=", AssignOp::Rem),
      (".=", AssignOp::Concat),
    ] {
      if self.eat_punct(p) {
        let rhs = self.parse_expr3()?;
        return Ok(Expr::OpAssign(op, Box::new(lhs), Box::new(rhs)));
      }
    }
    Ok(lhs)
  }

  /// Expr2: go-spawn suffix, ternary.
  fn parse_expr2(&mut self) -> Result<Expr> {
    let mut e = self.parse_binary(0)?;
    if matches!(e.kind(), Kind::Call) && self.eat_kw(Kw::Go) {
      e = Expr::GoSpawn(Box::new(e));
    }
    if self.eat_punct("?") {
      let then = self.parse_expr3()?;
      self.expect_punct(":")?;
      let else_ = self.parse_expr3()?;
      e = Expr::Ternary(Box::new(e), Box::new(then), Box::new(else_));
    }
    Ok(e)
  }

  fn binop_for(&self, kw_ok: bool) -> Option<(BinOpKind, u8)> {
    let (p, prec): (&str, u8) = match &self.peek().kind {
      TokenKind::Punct(p) => (p, 0),
      TokenKind::Keyword(k) if kw_ok => {
        return match k {
          Kw::And => Some((BinOpKind::And, 1)),
          Kw::Or => Some((BinOpKind::Or, 1)),
          Kw::Eq => Some((BinOpKind::StrEq, 4)),
          Kw::Ne => Some((BinOpKind::StrNe, 4)),
          Kw::Lt => Some((BinOpKind::StrLt, 4)),
          Kw::Le => Some((BinOpKind::StrLe, 4)),
          Kw::Gt => Some((BinOpKind::StrGt, 4)),
          Kw::Ge => Some((BinOpKind::StrGe, 4)),
          _ => None,
        };
      }
      _ => return None,
    };
    let kind = match p {
      "+" => BinOpKind::Add,
      "-" => BinOpKind::Sub,
      "*" => BinOpKind::Mul,
      "/" => BinOpKind::Div,
      "%" => BinOpKind::Rem,
      "." => BinOpKind::Concat,
      "==" => BinOpKind::NumEq,
      "!=" => BinOpKind::NumNe,
      "<" => BinOpKind::NumLt,
      "<=" => BinOpKind::NumLe,
      ">" => BinOpKind::NumGt,
      ">=" => BinOpKind::NumGe,
      _ => return None,
    };
    let prec = match kind {
      BinOpKind::Mul | BinOpKind::Div | BinOpKind::Rem => 6,
      BinOpKind::Add | BinOpKind::Sub | BinOpKind::Concat => 5,
      BinOpKind::NumEq
      | BinOpKind::NumNe
      | BinOpKind::NumLt
      | BinOpKind::NumLe
      | BinOpKind::NumGt
      | BinOpKind::NumGe => 4,
      _ => prec,
    };
    Some((kind, prec))
  }

  fn parse_binary(&mut self, min_prec: u8) -> Result<Expr> {
    let mut lhs = self.parse_expr1()?;
    loop {
      let Some((kind, prec)) = self.binop_for(true) else { break };
      if prec < min_prec {
        break;
      }
      self.bump();
      let rhs = self.parse_binary(prec + 1)?;
      lhs = Expr::Binary(kind, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
  }

  /// Expr1: regex trailer and arrow-deref.
  fn parse_expr1(&mut self) -> Result<Expr> {
    let mut e = self.parse_expr0()?;
    loop {
      if self.eat_punct("=~") {
        e = self.parse_regex_trailer(e)?;
        continue;
      }
      if self.eat_punct("->") {
        e = self.parse_arrow_trailer(e)?;
        continue;
      }
      break;
    }
    Ok(e)
  }

  fn parse_regex_trailer(&mut self, e: Expr) -> Result<Expr> {
    match self.bump().kind {
      TokenKind::Regex { pattern, replacement: None, flags } => {
        if flags.contains('g') {
          Ok(Expr::RegexMatchGlobal(Box::new(e), pattern))
        } else {
          Ok(Expr::RegexMatch(Box::new(e), pattern))
        }
      }
      TokenKind::Regex { pattern, replacement: Some(repl), .. } => {
        Ok(Expr::RegexReplace(Box::new(e), pattern, repl))
      }
      _ => Err(Error::parse("expected a regex literal after `=~`", self.span())),
    }
  }

  fn parse_arrow_trailer(&mut self, e: Expr) -> Result<Expr> {
    if self.eat_punct("{") {
      let key = self.parse_hash_key()?;
      self.expect_punct("}")?;
      return Ok(Expr::HashElem(Box::new(e), Box::new(key)));
    }
    if self.eat_punct("[") {
      let idx = self.parse_expr3()?;
      self.expect_punct("]")?;
      return Ok(Expr::ArrayElem(Box::new(e), Box::new(idx)));
    }
    let name = self.expect_ident()?;
    let args = self.parse_call_args()?;
    Ok(Expr::MethodCall(Box::new(e), name, args))
  }

  fn parse_call_args(&mut self) -> Result<Vec<Expr>> {
    let mut args = Vec::new();
    if self.eat_punct("(") {
      if !self.is_punct(")") {
        loop {
          // Argument flattening: a nested parenthesized concat splices
          // into the outer list (spec.md §4.3).
          args.push(self.parse_expr3()?);
          if !self.eat_punct(",") {
            break;
          }
        }
      }
      self.expect_punct(")")?;
    }
    Ok(args)
  }

  fn parse_hash_key(&mut self) -> Result<Expr> {
    if let TokenKind::Ident(name) = self.peek().kind.clone() {
      // bareword hash key: `$h{k}` (closed immediately) or `k => v` pairs.
      let save = self.pos;
      self.bump();
      if self.is_punct("}") || self.is_punct("=>") {
        return Ok(Expr::Str(name));
      }
      self.pos = save;
    }
    self.parse_expr3()
  }

  /// Expr0: primary and postfix.
  fn parse_expr0(&mut self) -> Result<Expr> {
    if self.eat_punct("(") {
      let e = self.parse_expr3()?;
      self.expect_punct(")")?;
      return Ok(e);
    }
    if self.eat_punct("[") {
      let items = self.parse_array_literal_items("]")?;
      return Ok(Expr::ArrayCtor(Box::new(ArrayExpr::Concat(items))));
    }
    if self.eat_punct("{") {
      let items = self.parse_hash_literal_items()?;
      return Ok(Expr::HashCtor(Box::new(ArrayExpr::Concat(items))));
    }
    if self.eat_punct("-") {
      return Ok(Expr::Unary(UnOpKind::Neg, Box::new(self.parse_expr0()?)));
    }
    if self.eat_punct("+") {
      return Ok(Expr::Unary(UnOpKind::Plus, Box::new(self.parse_expr0()?)));
    }
    if self.eat_punct("!") {
      return Ok(Expr::Unary(UnOpKind::Not, Box::new(self.parse_expr0()?)));
    }
    if self.eat_punct("~") {
      return Ok(Expr::Unary(UnOpKind::BitNot, Box::new(self.parse_expr0()?)));
    }
    if self.eat_kw(Kw::Undef) {
      return Ok(Expr::Undef);
    }
    if self.eat_kw(Kw::Scalar) {
      let arr = self.parse_array_expr()?;
      return Ok(Expr::ScalarOfArray(Box::new(arr)));
    }

    match self.peek().kind.clone() {
      TokenKind::Int(n) => {
        self.bump();
        Ok(Expr::Int(n))
      }
      TokenKind::Float(f) => {
        self.bump();
        Ok(Expr::Float(f))
      }
      TokenKind::Str(s) => {
        self.bump();
        Ok(interpolate(&s))
      }
      TokenKind::RawStr(s) => {
        self.bump();
        Ok(Expr::Str(s))
      }
      TokenKind::Punct("$") => {
        self.bump();
        self.parse_scalar_access()
      }
      TokenKind::Ident(name) => {
        self.bump();
        if self.is_punct("(") {
          let args = self.parse_call_args()?;
          return Ok(Expr::SubCall(name, args));
        }
        Ok(Expr::ModuleRef(name))
      }
      _ => Err(Error::parse("expected an expression", self.span())),
    }
  }

  /// Sigil disambiguation (spec.md §4.3): `$x[...]` is an array element,
  /// `$x{...}` a hash element, bare `$x` a scalar read. `$x` may also be an
  /// integer (capture group) or `{expr}`.
  fn parse_scalar_access(&mut self) -> Result<Expr> {
    let base = if self.eat_punct("{") {
      let e = self.parse_expr3()?;
      self.expect_punct("}")?;
      Name::Expr(Box::new(e))
    } else if let TokenKind::Int(n) = self.peek().kind {
      self.bump();
      Name::Ident(n.to_string())
    } else {
      Name::Ident(self.expect_ident()?)
    };

    if self.eat_punct("[") {
      let idx = self.parse_expr3()?;
      self.expect_punct("]")?;
      let base_expr = Expr::ArrayAccessBase(base);
      return Ok(Expr::ArrayElem(Box::new(base_expr), Box::new(idx)));
    }
    if self.eat_punct("{") {
      let key = self.parse_hash_key()?;
      self.expect_punct("}")?;
      let base_expr = Expr::ArrayAccessBase(base);
      return Ok(Expr::HashElem(Box::new(base_expr), Box::new(key)));
    }
    Ok(Expr::ScalarAccess(base))
  }

  // ---- array-expression grammar ------------------------------------------

  fn parse_array_expr(&mut self) -> Result<ArrayExpr> {
    if self.eat_punct("@") {
      let name = if self.eat_punct("{") {
        let e = self.parse_expr3()?;
        self.expect_punct("}")?;
        Name::Expr(Box::new(e))
      } else {
        Name::Ident(self.expect_ident()?)
      };
      return Ok(ArrayExpr::ArrayAccess(name));
    }
    if self.eat_punct("%") {
      let name = if self.eat_punct("{") {
        let e = self.parse_expr3()?;
        self.expect_punct("}")?;
        Name::Expr(Box::new(e))
      } else {
        Name::Ident(self.expect_ident()?)
      };
      return Ok(ArrayExpr::HashAsArray(name));
    }
    if self.eat_punct("(") {
      let items = self.parse_array_literal_items(")")?;
      return Ok(ArrayExpr::Concat(items));
    }
    Err(Error::parse("expected an array expression", self.span()))
  }

  fn parse_array_literal_items(&mut self, close: &str) -> Result<Vec<Expr>> {
    let mut items = Vec::new();
    if !self.is_punct(close) {
      loop {
        items.push(self.parse_list_item()?);
        // `=>` is accepted as a list separator too, so `(a => 1, b => 2)`
        // reads as a plain 4-element list (spec.md §4.3's `k => v` pairs).
        if !self.eat_punct(",") && !self.eat_punct("=>") {
          break;
        }
      }
    }
    self.expect_punct(close)?;
    Ok(items)
  }

  /// A list/array-literal element: a bareword immediately followed by `=>`
  /// auto-quotes to a string (spec.md §4.3), matching `parse_hash_key`'s
  /// bareword rule for `{k => v}`.
  fn parse_list_item(&mut self) -> Result<Expr> {
    if let TokenKind::Ident(name) = self.peek().kind.clone() {
      let save = self.pos;
      self.bump();
      if self.is_punct("=>") {
        return Ok(Expr::Str(name));
      }
      self.pos = save;
    }
    self.parse_expr3()
  }

  /// `{k => v, ...}`: flattens to `[k0, v0, k1, v1, ...]` for
  /// `Expr::HashCtor`. `=>` is literal; the key side is never treated as a
  /// regex (spec.md §4.3).
  fn parse_hash_literal_items(&mut self) -> Result<Vec<Expr>> {
    let mut items = Vec::new();
    if !self.is_punct("}") {
      loop {
        let key = self.parse_hash_key()?;
        items.push(key);
        if self.eat_punct("=>") || self.eat_punct(",") {
          // fallthrough: either separator accepted before the value
        }
        items.push(self.parse_expr3()?);
        if !self.eat_punct(",") {
          break;
        }
      }
    }
    self.expect_punct("}")?;
    Ok(items)
  }
}

/// Double-quoted string interpolation: `"$1,$2"` splits into literal
/// segments joined with `ScalarAccess` reads via `.` concatenation. Single-
/// quoted/raw strings never interpolate (spec.md §4.1's unquote rule).
fn interpolate(s: &str) -> Expr {
  let bytes = s.as_bytes();
  let mut parts: Vec<Expr> = Vec::new();
  let mut literal = String::new();
  let mut i = 0;
  while i < bytes.len() {
    if bytes[i] == b'$' && i + 1 < bytes.len() && (bytes[i + 1].is_ascii_alphanumeric() || bytes[i + 1] == b'_') {
      if !literal.is_empty() {
        parts.push(Expr::Str(std::mem::take(&mut literal)));
      }
      let start = i + 1;
      let mut end = start;
      while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
      }
      parts.push(Expr::ScalarAccess(Name::Ident(s[start..end].to_string())));
      i = end;
    } else {
      literal.push(bytes[i] as char);
      i += 1;
    }
  }
  if !literal.is_empty() || parts.is_empty() {
    parts.push(Expr::Str(literal));
  }
  parts
    .into_iter()
    .reduce(|a, b| Expr::Binary(BinOpKind::Concat, Box::new(a), Box::new(b)))
    .unwrap_or(Expr::Str(String::new()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_arith_precedence() {
    let m = parse("my $x = 1 + 2 * 3;").unwrap();
    assert_eq!(m.main.len(), 1);
  }

  #[test]
  fn parses_sub_decl() {
    let m = parse("sub inc { my @a = @_; return $a[0] + 1; } print inc(10);").unwrap();
    assert_eq!(m.subs.len(), 1);
    assert_eq!(m.subs[0].name, "inc");
  }

  #[test]
  fn parses_for_loop() {
    let m = parse("for $i (1,2,3) { print $i; }").unwrap();
    assert!(matches!(m.main[0], Stmt::ForIn(..)));
  }

  #[test]
  fn parses_regex_match() {
    let m = parse(r#"if ($s =~ m/(\w+) (\w+)/) { print "$1,$2"; }"#).unwrap();
    assert!(matches!(m.main[0], Stmt::If(..)));
  }

  #[test]
  fn rejects_unterminated_block() {
    assert!(parse("sub f { ").is_err());
  }

  #[test]
  fn interpolates_scalar_reads_in_double_quoted_strings() {
    // Folded left-associatively: ((`$1` . `,`) . `$2`).
    match interpolate("$1,$2") {
      Expr::Binary(BinOpKind::Concat, outer_lhs, outer_rhs) => {
        assert!(matches!(*outer_rhs, Expr::ScalarAccess(Name::Ident(ref n)) if n == "2"));
        match *outer_lhs {
          Expr::Binary(BinOpKind::Concat, ref a, ref b) => {
            assert!(matches!(**a, Expr::ScalarAccess(Name::Ident(ref n)) if n == "1"));
            assert!(matches!(**b, Expr::Str(ref s) if s == ","));
          }
          ref other => panic!("expected inner Concat, got {other:?}"),
        }
      }
      other => panic!("expected a Concat chain, got {other:?}"),
    }
  }

  #[test]
  fn plain_string_skips_concat_chain() {
    assert!(matches!(interpolate("hello world"), Expr::Str(s) if s == "hello world"));
  }
}
