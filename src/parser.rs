//! Recursive-descent parser producing the program AST.
//!
//! The parser mirrors the classic chibicc structure: a precedence-climbing set
//! of expression helpers under a thin statement layer. Names are resolved while
//! parsing: declarations go straight into the `Environment` and every variable
//! reference is bound to its `VarId` on the spot, so a variable must be declared
//! before it is used. Function signatures are registered as soon as their header
//! has been read, which lets bodies call functions defined further down; those
//! calls are matched against the signature by `sema`.

use log::debug;

use crate::ast::{
  BinaryOp, Block, ElseBranch, Expr, ExprKind, FieldInit, FuncDef, LogicalOp, Program, Stmt,
  StmtKind,
};
use crate::env::{Environment, Signature};
use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind, describe_token};
use crate::ty::{Member, Type};

/// Parse a whole source file. Returns the program together with the populated
/// environment (functions, structs, variables, string literals).
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<(Program, Environment)> {
  let mut parser = Parser::new(tokens, source);
  let program = parser.program()?;
  debug!(
    "parsed {} top-level declarations ({} functions)",
    program.stmts.len(),
    program.functions().count()
  );
  Ok((program, parser.into_environment()))
}

/// Parser state: the token cursor plus the environment being populated.
pub struct Parser<'a> {
  stream: TokenStream<'a>,
  env: Environment,
}

impl<'a> Parser<'a> {
  pub fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self::with_environment(tokens, source, Environment::new())
  }

  /// Start from an existing environment, e.g. one with variables already in
  /// scope.
  pub fn with_environment(tokens: Vec<Token>, source: &'a str, env: Environment) -> Self {
    Self {
      stream: TokenStream::new(tokens, source),
      env,
    }
  }

  pub fn into_environment(self) -> Environment {
    self.env
  }

  fn expr(&self, kind: ExprKind, loc: usize) -> Expr {
    Expr::new(kind, self.env.current(), loc)
  }

  fn stmt(&self, kind: StmtKind, loc: usize) -> Stmt {
    Stmt {
      kind,
      scope: self.env.current(),
      loc,
    }
  }

  pub fn program(&mut self) -> CompileResult<Program> {
    let mut stmts = Vec::new();
    let mut terminator_required = false;

    while !self.stream.is_eof() {
      if self.stream.consume_end_line() {
        terminator_required = false;
        continue;
      }
      if terminator_required {
        return Err(self.stream.error_here("missing statement terminator"));
      }
      let stmt = self.top_level_stmt(stmts.is_empty())?;
      stmts.push(stmt);
      terminator_required = true;
    }

    Ok(Program { stmts })
  }

  fn top_level_stmt(&mut self, first: bool) -> CompileResult<Stmt> {
    let loc = self.stream.loc();
    match self.stream.peek_keyword() {
      Some("package") if first => self.package_decl(),
      Some("package") => Err(CompileError::syntax(
        loc,
        "package clause must come first",
      )),
      Some("import") => self.import_decl(),
      Some("type") => self.struct_decl(),
      Some("var") => self.top_level_var(),
      Some("func") => self.func_def(),
      Some(keyword @ ("if" | "for" | "return")) => Err(CompileError::syntax(
        loc,
        format!("{keyword} statement is not allowed at top level"),
      )),
      _ => Err(CompileError::syntax(
        loc,
        format!(
          "expected declaration, but got \"{}\"",
          self.stream.describe_current()
        ),
      )),
    }
  }

  fn package_decl(&mut self) -> CompileResult<Stmt> {
    let loc = self.stream.loc();
    self.stream.expect_keyword("package")?;
    let (name, _) = self.stream.get_ident()?;
    Ok(self.stmt(StmtKind::Package { name }, loc))
  }

  fn import_decl(&mut self) -> CompileResult<Stmt> {
    let loc = self.stream.loc();
    self.stream.expect_keyword("import")?;
    let mut paths = Vec::new();
    if self.stream.equal("(") {
      loop {
        while self.stream.consume_end_line() {}
        if self.stream.equal(")") {
          break;
        }
        paths.push(self.stream.get_string()?);
      }
    } else {
      paths.push(self.stream.get_string()?);
    }
    Ok(self.stmt(StmtKind::Import { paths }, loc))
  }

  /// `type Name struct { a, b int; c *Name2 }`
  fn struct_decl(&mut self) -> CompileResult<Stmt> {
    let loc = self.stream.loc();
    self.stream.expect_keyword("type")?;
    let (name, name_loc) = self.stream.get_ident()?;
    self.stream.expect_keyword("struct")?;
    self.stream.skip("{")?;

    let mut members: Vec<Member> = Vec::new();
    loop {
      while self.stream.consume_end_line() {}
      if self.stream.equal("}") {
        break;
      }
      let mut names = vec![self.stream.get_ident()?];
      while self.stream.equal(",") {
        names.push(self.stream.get_ident()?);
      }
      let ty = self.parse_type()?;
      for (member, member_loc) in names {
        if members.iter().any(|m| m.name == member) {
          return Err(CompileError::name(
            member_loc,
            format!("duplicate field {member}"),
          ));
        }
        members.push(Member {
          name: member,
          ty: ty.clone(),
        });
      }
      if !self.stream.is("}") {
        self.stream.expect_end_line()?;
      }
    }

    let ty = Type::structure(name.clone(), members);
    self.env.register_struct(&name, ty.clone(), name_loc)?;
    Ok(self.stmt(StmtKind::StructDecl { name, ty }, loc))
  }

  /// Top-level variables always spell out their type and start zeroed.
  fn top_level_var(&mut self) -> CompileResult<Stmt> {
    let loc = self.stream.loc();
    self.stream.expect_keyword("var")?;
    let (name, name_loc) = self.stream.get_ident()?;
    let ty = self.parse_type()?;
    if self.stream.is("=") {
      return Err(self.stream.error_here(
        "top-level variables cannot have an initializer",
      ));
    }
    let var = self.env.add_top_level_variable(&name, ty, name_loc)?;
    Ok(self.stmt(StmtKind::TopLevelVar { var }, loc))
  }

  fn func_def(&mut self) -> CompileResult<Stmt> {
    let loc = self.stream.loc();
    self.stream.expect_keyword("func")?;
    let (name, name_loc) = self.stream.get_ident()?;
    self.env.enter_function(&name);

    self.stream.skip("(")?;
    self.stream.skip_newlines();
    let mut params = Vec::new();
    let mut param_types = Vec::new();
    // Names waiting for the type that ends a group like `a, b int`.
    let mut pending: Vec<(String, usize)> = Vec::new();
    while !self.stream.equal(")") {
      if !params.is_empty() || !pending.is_empty() {
        self.stream.skip(",")?;
        self.stream.skip_newlines();
      }
      pending.push(self.stream.get_ident()?);
      if self.stream.is(",") {
        continue;
      }
      let ty = self.parse_type()?;
      for (param, param_loc) in pending.drain(..) {
        params.push(self.env.add_local_variable(&param, Some(ty.clone()), param_loc)?);
        param_types.push(ty.clone());
      }
      self.stream.skip_newlines();
    }
    if let Some((param, param_loc)) = pending.first() {
      return Err(CompileError::syntax(
        *param_loc,
        format!("missing type for parameter {param}"),
      ));
    }

    let ret = if self.stream.equal("(") {
      let mut types = vec![self.parse_type()?];
      while self.stream.equal(",") {
        types.push(self.parse_type()?);
      }
      self.stream.skip(")")?;
      if types.len() == 1 {
        types.remove(0)
      } else {
        Type::multi(types)
      }
    } else if self.stream.is("{") {
      // main reports its result as the exit status.
      if name == "main" { Type::Int } else { Type::Void }
    } else {
      self.parse_type()?
    };

    let signature = Signature {
      params: param_types,
      ret,
    };
    self.env.register_function(&name, signature, name_loc)?;

    let body = self.block()?;
    self.env.leave();

    Ok(self.stmt(
      StmtKind::Func(FuncDef {
        name,
        params,
        body,
        loc: name_loc,
      }),
      loc,
    ))
  }

  /// `{ stmt* }` in the current scope; callers decide whether to fork first.
  fn block(&mut self) -> CompileResult<Block> {
    self.stream.skip("{")?;
    let stmts = self.stmt_list()?;
    self.stream.skip("}")?;
    Ok(Block {
      stmts,
      scope: self.env.current(),
    })
  }

  fn stmt_list(&mut self) -> CompileResult<Vec<Stmt>> {
    let mut stmts = Vec::new();
    let mut terminator_required = false;

    while !self.stream.is("}") {
      if self.stream.is_eof() {
        return Err(self.stream.error_here("expected \"}\", but reached end of input"));
      }
      if self.stream.consume_end_line() {
        terminator_required = false;
        continue;
      }
      if terminator_required {
        return Err(self.stream.error_here("missing statement terminator"));
      }
      stmts.push(self.local_stmt()?);
      terminator_required = true;
    }

    Ok(stmts)
  }

  fn local_stmt(&mut self) -> CompileResult<Stmt> {
    let loc = self.stream.loc();
    match self.stream.peek_keyword() {
      Some("if") => self.if_stmt(),
      Some("for") => self.for_stmt(),
      Some("var") => self.local_var(),
      Some("return") => self.return_stmt(),
      Some(keyword @ ("package" | "import" | "type" | "func")) => Err(CompileError::syntax(
        loc,
        format!("{keyword} declaration is not allowed inside a function"),
      )),
      _ => match self.simple_stmt()? {
        Some(stmt) => Ok(stmt),
        None => Err(CompileError::syntax(
          loc,
          format!(
            "expected statement, but got \"{}\"",
            self.stream.describe_current()
          ),
        )),
      },
    }
  }

  /// Assignment, short variable declaration or expression statement. Returns
  /// `None` when the statement is empty.
  fn simple_stmt(&mut self) -> CompileResult<Option<Stmt>> {
    let loc = self.stream.loc();
    if self.stream.is(";") || self.stream.is("\n") || self.stream.is("{") {
      return Ok(None);
    }

    let kind = match self.stream.scan_assignment() {
      Some(":=") => {
        let mut names = vec![self.stream.get_ident()?];
        while self.stream.equal(",") {
          names.push(self.stream.get_ident()?);
        }
        self.stream.skip(":=")?;
        // Initializers are resolved before the new names come into scope.
        let values = self.expr_list()?;
        let vars = names
          .into_iter()
          .map(|(name, name_loc)| self.env.add_local_variable(&name, None, name_loc))
          .collect::<CompileResult<Vec<_>>>()?;
        StmtKind::ShortVarDecl { vars, values }
      }
      Some(_) => {
        let targets = self.expr_list()?;
        self.stream.skip("=")?;
        let values = self.expr_list()?;
        StmtKind::Assign { targets, values }
      }
      None => StmtKind::Expr(self.parse_expr()?),
    };
    Ok(Some(self.stmt(kind, loc)))
  }

  /// `var x T`, `var x T = e` or `var x = e`.
  fn local_var(&mut self) -> CompileResult<Stmt> {
    let loc = self.stream.loc();
    self.stream.expect_keyword("var")?;
    let (name, name_loc) = self.stream.get_ident()?;
    let ty = if self.stream.is("=") {
      None
    } else {
      Some(self.parse_type()?)
    };
    let init = if self.stream.equal("=") {
      Some(self.parse_expr()?)
    } else {
      None
    };
    let var = self.env.add_local_variable(&name, ty, name_loc)?;
    Ok(self.stmt(StmtKind::LocalVar { var, init }, loc))
  }

  fn return_stmt(&mut self) -> CompileResult<Stmt> {
    let loc = self.stream.loc();
    self.stream.expect_keyword("return")?;
    let values = if self.stream.at_stmt_end() {
      Vec::new()
    } else {
      self.expr_list()?
    };
    Ok(self.stmt(StmtKind::Return { values }, loc))
  }

  fn if_stmt(&mut self) -> CompileResult<Stmt> {
    let loc = self.stream.loc();
    self.stream.expect_keyword("if")?;

    self.env.fork();
    let cond = self.parse_expr()?;
    let then = self.block()?;
    self.env.leave();

    let otherwise = if self.stream.equal_keyword("else") {
      self.env.fork();
      let block = if self.stream.is_keyword("if") {
        let nested = self.if_stmt()?;
        Block {
          stmts: vec![nested],
          scope: self.env.current(),
        }
      } else {
        self.block()?
      };
      self.env.leave();
      ElseBranch::Block(block)
    } else {
      ElseBranch::Absent
    };

    Ok(self.stmt(
      StmtKind::If {
        cond,
        then,
        otherwise,
      },
      loc,
    ))
  }

  /// `for { }`, `for cond { }` or `for init; cond; update { }`.
  fn for_stmt(&mut self) -> CompileResult<Stmt> {
    let loc = self.stream.loc();
    self.stream.expect_keyword("for")?;
    self.env.fork();

    let (init, cond, update) = if self.stream.is("{") {
      (None, None, None)
    } else {
      let first = self.simple_stmt()?;
      if self.stream.is("{") {
        match first {
          Some(Stmt {
            kind: StmtKind::Expr(cond),
            ..
          }) => (None, Some(cond), None),
          other => {
            let at = other.map_or(loc, |stmt| stmt.loc);
            return Err(CompileError::syntax(
              at,
              "for loop condition must be an expression",
            ));
          }
        }
      } else {
        self.stream.skip(";")?;
        let cond = if self.stream.is(";") {
          None
        } else {
          Some(self.parse_expr()?)
        };
        self.stream.skip(";")?;
        let update = self.simple_stmt()?;
        (first.map(Box::new), cond, update.map(Box::new))
      }
    };

    self.env.fork();
    let body = self.block()?;
    self.env.leave();
    self.env.leave();

    Ok(self.stmt(
      StmtKind::For {
        init,
        cond,
        update,
        body,
      },
      loc,
    ))
  }

  fn expr_list(&mut self) -> CompileResult<Vec<Expr>> {
    let mut exprs = vec![self.parse_expr()?];
    while self.stream.equal(",") {
      exprs.push(self.parse_expr()?);
    }
    Ok(exprs)
  }

  /// Comma-separated items up to `close`, which is consumed. Newlines and a
  /// trailing comma are allowed.
  fn comma_list<T>(
    &mut self,
    close: &str,
    mut item: impl FnMut(&mut Self) -> CompileResult<T>,
  ) -> CompileResult<Vec<T>> {
    let mut items = Vec::new();
    self.stream.skip_newlines();
    while !self.stream.equal(close) {
      if !items.is_empty() {
        self.stream.skip(",")?;
        self.stream.skip_newlines();
        if self.stream.equal(close) {
          break;
        }
      }
      items.push(item(self)?);
      self.stream.skip_newlines();
    }
    Ok(items)
  }

  pub fn parse_type(&mut self) -> CompileResult<Type> {
    let loc = self.stream.loc();
    if self.stream.equal("*") {
      return Ok(Type::pointer_to(self.parse_type()?));
    }
    if self.stream.equal("[") {
      if self.stream.equal("]") {
        return Ok(Type::slice_of(self.parse_type()?));
      }
      let (len, _) = self.stream.get_number()?;
      self.stream.skip("]")?;
      let base = self.parse_type()?;
      return Ok(Type::array_of(base, len as usize));
    }
    if matches!(
      self.stream.peek().map(|token| token.kind),
      Some(TokenKind::Ident)
    ) {
      let (name, name_loc) = self.stream.get_ident()?;
      return match name.as_str() {
        "int" => Ok(Type::Int),
        "rune" => Ok(Type::Rune),
        "bool" => Ok(Type::Bool),
        "string" => Ok(Type::string()),
        _ => self
          .env
          .lookup_struct(&name)
          .cloned()
          .ok_or_else(|| CompileError::name(name_loc, format!("undefined type: {name}"))),
      };
    }
    Err(CompileError::syntax(
      loc,
      format!(
        "expected a type, but got \"{}\"",
        self.stream.describe_current()
      ),
    ))
  }

  pub fn parse_expr(&mut self) -> CompileResult<Expr> {
    self.parse_or()
  }

  fn parse_or(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_and()?;
    loop {
      let loc = self.stream.loc();
      if !self.stream.equal("||") {
        break;
      }
      let rhs = self.parse_and()?;
      node = self.logical(LogicalOp::Or, node, rhs, loc);
    }
    Ok(node)
  }

  fn parse_and(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_equality()?;
    loop {
      let loc = self.stream.loc();
      if !self.stream.equal("&&") {
        break;
      }
      let rhs = self.parse_equality()?;
      node = self.logical(LogicalOp::And, node, rhs, loc);
    }
    Ok(node)
  }

  fn parse_equality(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_relational()?;

    loop {
      let loc = self.stream.loc();
      let op = match self.stream.peek_punctuator() {
        Some("==") => BinaryOp::Eq,
        Some("!=") => BinaryOp::Ne,
        _ => break,
      };
      self.stream.advance();
      let rhs = self.parse_relational()?;
      node = self.binary(op, node, rhs, loc);
    }

    Ok(node)
  }

  fn parse_relational(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_add()?;

    loop {
      let loc = self.stream.loc();
      let op = match self.stream.peek_punctuator() {
        Some("<") => BinaryOp::Lt,
        Some("<=") => BinaryOp::Le,
        Some(">") => BinaryOp::Gt,
        Some(">=") => BinaryOp::Ge,
        _ => break,
      };
      self.stream.advance();
      let rhs = self.parse_add()?;
      node = self.binary(op, node, rhs, loc);
    }

    Ok(node)
  }

  fn parse_add(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_mul()?;

    loop {
      let loc = self.stream.loc();
      let op = match self.stream.peek_punctuator() {
        Some("+") => BinaryOp::Add,
        Some("-") => BinaryOp::Sub,
        _ => break,
      };
      self.stream.advance();
      let rhs = self.parse_mul()?;
      node = self.binary(op, node, rhs, loc);
    }

    Ok(node)
  }

  fn parse_mul(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_unary()?;

    loop {
      let loc = self.stream.loc();
      let op = match self.stream.peek_punctuator() {
        Some("*") => BinaryOp::Mul,
        Some("/") => BinaryOp::Div,
        _ => break,
      };
      self.stream.advance();
      let rhs = self.parse_unary()?;
      node = self.binary(op, node, rhs, loc);
    }

    Ok(node)
  }

  fn parse_unary(&mut self) -> CompileResult<Expr> {
    let loc = self.stream.loc();

    if self.stream.equal("+") {
      return self.parse_unary();
    }

    if self.stream.equal("-") {
      let operand = self.parse_unary()?;
      let zero = self.expr(ExprKind::Num { value: 0 }, loc);
      return Ok(self.binary(BinaryOp::Sub, zero, operand, loc));
    }

    if self.stream.equal("*") {
      let operand = Box::new(self.parse_unary()?);
      return Ok(self.expr(ExprKind::Deref { operand }, loc));
    }

    if self.stream.equal("&") {
      let operand = Box::new(self.parse_unary()?);
      return Ok(self.expr(ExprKind::Addr { operand }, loc));
    }

    if self.stream.equal("!") {
      let operand = Box::new(self.parse_unary()?);
      return Ok(self.expr(ExprKind::Not { operand }, loc));
    }

    self.parse_postfix()
  }

  fn parse_postfix(&mut self) -> CompileResult<Expr> {
    let mut node = self.parse_primary()?;

    loop {
      let loc = self.stream.loc();
      if self.stream.equal("[") {
        let index = Box::new(self.parse_expr()?);
        self.stream.skip("]")?;
        node = self.expr(
          ExprKind::Index {
            base: Box::new(node),
            index,
          },
          loc,
        );
      } else if self.stream.equal(".") {
        let (member, member_loc) = self.stream.get_ident()?;
        node = self.expr(
          ExprKind::Field {
            owner: Box::new(node),
            member,
          },
          member_loc,
        );
      } else {
        break;
      }
    }

    Ok(node)
  }

  fn parse_primary(&mut self) -> CompileResult<Expr> {
    let loc = self.stream.loc();

    if self.stream.equal("(") {
      let node = self.parse_expr()?;
      self.stream.skip(")")?;
      return Ok(node);
    }

    if let Some(keyword @ ("true" | "false")) = self.stream.peek_keyword() {
      self.stream.advance();
      let value = keyword == "true";
      return Ok(self.expr(ExprKind::Bool { value }, loc));
    }

    match self.stream.peek().map(|token| token.kind) {
      Some(TokenKind::Num) => {
        let (value, _) = self.stream.get_number()?;
        return Ok(self.expr(ExprKind::Num { value }, loc));
      }
      Some(TokenKind::Str) => {
        let value = self.stream.get_string()?;
        let label = self.env.intern_string_literal(&value);
        return Ok(self.expr(ExprKind::Str { label, value }, loc));
      }
      Some(TokenKind::Ident) => return self.parse_identifier(),
      _ => {}
    }

    if self.stream.is("[") {
      return self.slice_literal();
    }

    Err(CompileError::syntax(
      loc,
      format!(
        "expected an expression, but got \"{}\"",
        self.stream.describe_current()
      ),
    ))
  }

  /// Call, builtin call, struct literal or variable reference.
  fn parse_identifier(&mut self) -> CompileResult<Expr> {
    let (name, loc) = self.stream.get_ident()?;

    if self.stream.equal("(") {
      let mut args = self.comma_list(")", |p| p.parse_expr())?;
      let kind = match name.as_str() {
        "append" => {
          check_builtin_arity(&name, &args, 2, loc)?;
          let value = Box::new(args.remove(1));
          let slice = Box::new(args.remove(0));
          ExprKind::Append { slice, value }
        }
        "len" => {
          check_builtin_arity(&name, &args, 1, loc)?;
          let operand = Box::new(args.remove(0));
          ExprKind::Len { operand }
        }
        _ => ExprKind::Call { name, args },
      };
      return Ok(self.expr(kind, loc));
    }

    if self.stream.is("{")
      && let Some(ty) = self.env.lookup_struct(&name).cloned()
    {
      return self.struct_literal(ty, loc);
    }

    match self.env.find_variable(&name) {
      Some(var) => Ok(self.expr(ExprKind::Var { var }, loc)),
      None => Err(CompileError::name(loc, format!("undefined: {name}"))),
    }
  }

  /// `Name{field: value, ...}`
  fn struct_literal(&mut self, ty: Type, loc: usize) -> CompileResult<Expr> {
    self.stream.skip("{")?;
    let fields = self.comma_list("}", |p| {
      let (name, field_loc) = p.stream.get_ident()?;
      p.stream.skip(":")?;
      p.stream.skip_newlines();
      let value = p.parse_expr()?;
      Ok(FieldInit {
        name,
        loc: field_loc,
        value,
      })
    })?;
    let slot = self.env.add_temporary(ty.clone(), loc)?;
    Ok(self.expr(ExprKind::StructLit { ty, fields, slot }, loc))
  }

  /// `[]T{a, b, ...}`
  fn slice_literal(&mut self) -> CompileResult<Expr> {
    let loc = self.stream.loc();
    self.stream.skip("[")?;
    self.stream.skip("]")?;
    let elem = self.parse_type()?;
    self.stream.skip("{")?;
    let elements = self.comma_list("}", |p| p.parse_expr())?;
    Ok(self.expr(ExprKind::SliceLit { elem, elements }, loc))
  }

  fn binary(&self, op: BinaryOp, lhs: Expr, rhs: Expr, loc: usize) -> Expr {
    self.expr(
      ExprKind::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      loc,
    )
  }

  fn logical(&self, op: LogicalOp, lhs: Expr, rhs: Expr, loc: usize) -> Expr {
    self.expr(
      ExprKind::Logical {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      loc,
    )
  }
}

fn check_builtin_arity(name: &str, args: &[Expr], want: usize, loc: usize) -> CompileResult<()> {
  if args.len() == want {
    return Ok(());
  }
  Err(CompileError::type_error(
    loc,
    format!(
      "wrong number of arguments in call to {name}: have {}, want {want}",
      args.len()
    ),
  ))
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn advance(&mut self) {
    if !self.is_eof() {
      self.pos += 1;
    }
  }

  /// Byte offset of the current token.
  fn loc(&self) -> usize {
    self.peek().map_or(self.source.len(), |token| token.loc)
  }

  fn describe_current(&self) -> String {
    describe_token(self.peek(), self.source)
  }

  fn error_here(&self, message: impl Into<String>) -> CompileError {
    CompileError::syntax(self.loc(), message)
  }

  fn peek_punctuator(&self) -> Option<&'a str> {
    self
      .peek()
      .filter(|token| token.kind == TokenKind::Punctuator)
      .map(|token| token.text(self.source))
  }

  fn peek_keyword(&self) -> Option<&'a str> {
    self
      .peek()
      .filter(|token| token.kind == TokenKind::Keyword)
      .map(|token| token.text(self.source))
  }

  fn is(&self, op: &str) -> bool {
    self.peek_punctuator() == Some(op)
  }

  /// Consume the current token if it matches the provided punctuator.
  fn equal(&mut self, op: &str) -> bool {
    if self.is(op) {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      Err(self.error_here(format!(
        "expected \"{}\", but got \"{}\"",
        s.escape_default(),
        self.describe_current()
      )))
    }
  }

  fn is_keyword(&self, keyword: &str) -> bool {
    self.peek_keyword() == Some(keyword)
  }

  fn equal_keyword(&mut self, keyword: &str) -> bool {
    if self.is_keyword(keyword) {
      self.pos += 1;
      return true;
    }
    false
  }

  fn expect_keyword(&mut self, keyword: &str) -> CompileResult<()> {
    if self.equal_keyword(keyword) {
      Ok(())
    } else {
      Err(self.error_here(format!(
        "expected \"{keyword}\", but got \"{}\"",
        self.describe_current()
      )))
    }
  }

  /// Consume one statement terminator (`;` or newline).
  fn consume_end_line(&mut self) -> bool {
    self.equal(";") || self.equal("\n")
  }

  fn expect_end_line(&mut self) -> CompileResult<()> {
    if self.consume_end_line() {
      Ok(())
    } else {
      Err(self.error_here("missing statement terminator"))
    }
  }

  fn skip_newlines(&mut self) {
    while self.equal("\n") {}
  }

  fn at_stmt_end(&self) -> bool {
    self.is(";") || self.is("\n") || self.is("}") || self.is_eof()
  }

  /// Look ahead to the end of the current simple statement for `=` or `:=`.
  /// A `{` ends the scan so loop headers and bodies are not confused.
  fn scan_assignment(&self) -> Option<&'static str> {
    for token in &self.tokens[self.pos..] {
      if token.kind == TokenKind::Eof {
        break;
      }
      if token.kind != TokenKind::Punctuator {
        continue;
      }
      match token.text(self.source) {
        ";" | "\n" | "{" => break,
        "=" => return Some("="),
        ":=" => return Some(":="),
        _ => {}
      }
    }
    None
  }

  /// Parse the current token as an integer literal returning its value and location.
  fn get_number(&mut self) -> CompileResult<(i64, usize)> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Num
    {
      let loc = token.loc;
      let value = token.value.ok_or_else(|| {
        CompileError::syntax(loc, "internal error: numeric token missing value")
      })?;
      self.pos += 1;
      return Ok((value, loc));
    }

    Err(self.error_here(format!(
      "expected a number, but got \"{}\"",
      self.describe_current()
    )))
  }

  /// Parse the current token as an identifier.
  fn get_ident(&mut self) -> CompileResult<(String, usize)> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Ident
    {
      let ident = token.text(self.source).to_string();
      let loc = token.loc;
      self.pos += 1;
      return Ok((ident, loc));
    }

    Err(self.error_here(format!(
      "expected an identifier, but got \"{}\"",
      self.describe_current()
    )))
  }

  fn get_string(&mut self) -> CompileResult<String> {
    if let Some(token) = self.peek()
      && let Some(value) = token.string_value(self.source)
    {
      self.pos += 1;
      return Ok(value.to_string());
    }

    Err(self.error_here(format!(
      "expected a string, but got \"{}\"",
      self.describe_current()
    )))
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof) | None)
  }
}
