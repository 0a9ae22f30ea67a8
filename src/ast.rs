//! Syntax tree produced by the parser and annotated by the checker.
//!
//! Each node kind carries exactly the fields it needs. Expressions remember
//! the scope that was active when they were parsed together with their
//! resolved type; the type starts out as `Void` and is filled in by `sema`.

use crate::env::{ScopeId, VarId};
use crate::ty::Type;

/// Ordered list of top-level declarations.
#[derive(Debug, Clone)]
pub struct Program {
  pub stmts: Vec<Stmt>,
}

impl Program {
  pub fn functions(&self) -> impl Iterator<Item = &FuncDef> {
    self.stmts.iter().filter_map(|stmt| match &stmt.kind {
      StmtKind::Func(func) => Some(func),
      _ => None,
    })
  }
}

/// Arithmetic and comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl BinaryOp {
  pub fn is_arithmetic(self) -> bool {
    matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div)
  }

  pub fn is_equality(self) -> bool {
    matches!(self, Self::Eq | Self::Ne)
  }

  pub fn symbol(self) -> &'static str {
    match self {
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
      Self::Eq => "==",
      Self::Ne => "!=",
      Self::Lt => "<",
      Self::Le => "<=",
      Self::Gt => ">",
      Self::Ge => ">=",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
  And,
  Or,
}

#[derive(Debug, Clone)]
pub struct Expr {
  pub kind: ExprKind,
  pub ty: Type,
  pub scope: ScopeId,
  pub loc: usize,
}

impl Expr {
  pub fn new(kind: ExprKind, scope: ScopeId, loc: usize) -> Self {
    Self {
      kind,
      ty: Type::Void,
      scope,
      loc,
    }
  }

  /// Whether the expression denotes a memory location.
  pub fn is_addressable(&self) -> bool {
    matches!(
      self.kind,
      ExprKind::Var { .. }
        | ExprKind::Deref { .. }
        | ExprKind::Index { .. }
        | ExprKind::Field { .. }
    )
  }
}

#[derive(Debug, Clone)]
pub struct FieldInit {
  pub name: String,
  pub loc: usize,
  pub value: Expr,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
  Num {
    value: i64,
  },
  Bool {
    value: bool,
  },
  Str {
    label: String,
    value: String,
  },
  Var {
    var: VarId,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Logical {
    op: LogicalOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Not {
    operand: Box<Expr>,
  },
  Addr {
    operand: Box<Expr>,
  },
  Deref {
    operand: Box<Expr>,
  },
  Index {
    base: Box<Expr>,
    index: Box<Expr>,
  },
  Field {
    owner: Box<Expr>,
    member: String,
  },
  Call {
    name: String,
    args: Vec<Expr>,
  },
  Append {
    slice: Box<Expr>,
    value: Box<Expr>,
  },
  Len {
    operand: Box<Expr>,
  },
  /// `slot` is the anonymous frame slot the literal is built in.
  StructLit {
    ty: Type,
    fields: Vec<FieldInit>,
    slot: VarId,
  },
  SliceLit {
    elem: Type,
    elements: Vec<Expr>,
  },
}

#[derive(Debug, Clone)]
pub struct Stmt {
  pub kind: StmtKind,
  pub scope: ScopeId,
  pub loc: usize,
}

#[derive(Debug, Clone)]
pub struct Block {
  pub stmts: Vec<Stmt>,
  pub scope: ScopeId,
}

#[derive(Debug, Clone)]
pub enum ElseBranch {
  Absent,
  Block(Block),
}

#[derive(Debug, Clone)]
pub struct FuncDef {
  pub name: String,
  pub params: Vec<VarId>,
  pub body: Block,
  pub loc: usize,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
  Package {
    name: String,
  },
  Import {
    paths: Vec<String>,
  },
  StructDecl {
    name: String,
    ty: Type,
  },
  TopLevelVar {
    var: VarId,
  },
  Func(FuncDef),
  LocalVar {
    var: VarId,
    init: Option<Expr>,
  },
  ShortVarDecl {
    vars: Vec<VarId>,
    values: Vec<Expr>,
  },
  Assign {
    targets: Vec<Expr>,
    values: Vec<Expr>,
  },
  Expr(Expr),
  Return {
    values: Vec<Expr>,
  },
  If {
    cond: Expr,
    then: Block,
    otherwise: ElseBranch,
  },
  For {
    init: Option<Box<Stmt>>,
    cond: Option<Expr>,
    update: Option<Box<Stmt>>,
    body: Block,
  },
}
