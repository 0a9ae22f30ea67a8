//! Type checking over the parsed program.
//!
//! Runs once the whole file has been parsed, so calls to functions declared
//! later in the file resolve against their registered signatures. The walk is
//! in source order: a short variable declaration fixes the type of its names
//! before any later statement reads them. Every expression gets its `ty`
//! filled in, and frames are laid out at the end.

use log::debug;

use crate::ast::{Block, ElseBranch, Expr, ExprKind, FuncDef, Program, Stmt, StmtKind};
use crate::env::{Environment, Signature, VarId};
use crate::error::{CompileError, CompileResult};
use crate::ty::Type;

/// Registers available for multi-value results.
pub const MAX_RESULTS: usize = 6;

pub fn check(program: &mut Program, env: &mut Environment) -> CompileResult<()> {
  let mut checker = Checker {
    env: &mut *env,
    function: String::new(),
    ret: Type::Void,
  };
  for stmt in &mut program.stmts {
    checker.stmt(stmt)?;
  }
  env.layout()?;
  debug!("checked {} functions", program.functions().count());
  Ok(())
}

struct Checker<'e> {
  env: &'e mut Environment,
  function: String,
  ret: Type,
}

impl Checker<'_> {
  fn func(&mut self, func: &mut FuncDef) -> CompileResult<()> {
    let Some(signature) = self.env.lookup_function(&func.name).cloned() else {
      return Err(CompileError::name(
        func.loc,
        format!("undefined: {}", func.name),
      ));
    };
    check_signature(&func.name, &signature, func.loc)?;
    self.function = func.name.clone();
    self.ret = signature.ret;
    self.block(&mut func.body)
  }

  fn block(&mut self, block: &mut Block) -> CompileResult<()> {
    for stmt in &mut block.stmts {
      self.stmt(stmt)?;
    }
    Ok(())
  }

  fn stmt(&mut self, stmt: &mut Stmt) -> CompileResult<()> {
    let loc = stmt.loc;
    match &mut stmt.kind {
      StmtKind::Package { .. }
      | StmtKind::Import { .. }
      | StmtKind::StructDecl { .. }
      | StmtKind::TopLevelVar { .. } => Ok(()),
      StmtKind::Func(func) => self.func(func),
      StmtKind::LocalVar { var, init } => {
        let Some(init) = init else {
          return Ok(());
        };
        let ty = self.value(init)?;
        match self.env.variable(*var).ty.clone() {
          Some(declared) => expect_assignable(&ty, &declared, init.loc, "variable declaration"),
          None => {
            self.env.set_variable_type(*var, ty);
            Ok(())
          }
        }
      }
      StmtKind::ShortVarDecl { vars, values } => {
        let types = self.sources(vars.len(), values, loc)?;
        for (var, ty) in vars.iter().zip(types) {
          self.env.set_variable_type(*var, ty);
        }
        Ok(())
      }
      StmtKind::Assign { targets, values } => {
        let mut target_types = Vec::with_capacity(targets.len());
        for target in targets.iter_mut() {
          let ty = self.value(target)?;
          if !target.is_addressable() {
            return Err(CompileError::type_error(
              target.loc,
              "cannot assign to expression",
            ));
          }
          target_types.push(ty);
        }
        let types = self.sources(targets.len(), values, loc)?;
        for ((target, want), have) in targets.iter().zip(&target_types).zip(&types) {
          expect_assignable(have, want, target.loc, "assignment")?;
        }
        Ok(())
      }
      StmtKind::Expr(expr) => self.expr(expr).map(|_| ()),
      StmtKind::Return { values } => self.return_stmt(values, loc),
      StmtKind::If {
        cond,
        then,
        otherwise,
      } => {
        self.condition(cond, "if statement")?;
        self.block(then)?;
        if let ElseBranch::Block(block) = otherwise {
          self.block(block)?;
        }
        Ok(())
      }
      StmtKind::For {
        init,
        cond,
        update,
        body,
      } => {
        if let Some(init) = init {
          self.stmt(init)?;
        }
        if let Some(cond) = cond {
          self.condition(cond, "for loop")?;
        }
        if let Some(update) = update {
          self.stmt(update)?;
        }
        self.block(body)
      }
    }
  }

  /// Types of the right-hand side of an assignment to `count` places: either
  /// one single-valued expression per place, or one call with that many
  /// results.
  fn sources(&mut self, count: usize, values: &mut [Expr], loc: usize) -> CompileResult<Vec<Type>> {
    if count > 1 && values.len() == 1 {
      let value = &mut values[0];
      let ty = self.expr(value)?;
      return match ty {
        Type::Multi(components) if components.len() == count => Ok(components),
        Type::Multi(components) => Err(CompileError::type_error(
          loc,
          format!(
            "assignment mismatch: {count} variables but call returns {} values",
            components.len()
          ),
        )),
        _ => Err(CompileError::type_error(
          loc,
          format!("assignment mismatch: {count} variables but 1 value"),
        )),
      };
    }

    if count != values.len() {
      return Err(CompileError::type_error(
        loc,
        format!(
          "assignment mismatch: {count} variables but {} values",
          values.len()
        ),
      ));
    }

    let mut types = Vec::with_capacity(count);
    for value in values.iter_mut() {
      let ty = self.value(value)?;
      if count > 1 && ty.is_composite() {
        return Err(CompileError::type_error(
          value.loc,
          format!("cannot assign {ty} values in parallel"),
        ));
      }
      types.push(ty);
    }
    Ok(types)
  }

  fn return_stmt(&mut self, values: &mut [Expr], loc: usize) -> CompileResult<()> {
    let want: Vec<Type> = match &self.ret {
      Type::Void => Vec::new(),
      Type::Multi(components) => components.clone(),
      ty => vec![ty.clone()],
    };

    // A bare return from main exits with status 0.
    if values.is_empty() && (want.is_empty() || self.function == "main") {
      return Ok(());
    }

    if want.len() > 1 && values.len() == 1 {
      let ty = self.expr(&mut values[0])?;
      if ty == self.ret {
        return Ok(());
      }
      return Err(CompileError::type_error(
        values[0].loc,
        format!("cannot use {ty} as {} value in return statement", self.ret),
      ));
    }

    if values.len() != want.len() {
      let problem = if values.len() > want.len() {
        "too many"
      } else {
        "not enough"
      };
      return Err(CompileError::type_error(
        loc,
        format!(
          "{problem} return values: have {}, want {}",
          values.len(),
          want.len()
        ),
      ));
    }

    for (value, want) in values.iter_mut().zip(&want) {
      let ty = self.value(value)?;
      expect_assignable(&ty, want, value.loc, "return statement")?;
    }
    Ok(())
  }

  fn condition(&mut self, cond: &mut Expr, context: &str) -> CompileResult<()> {
    let ty = self.value(cond)?;
    if ty != Type::Bool {
      return Err(CompileError::type_error(
        cond.loc,
        format!("non-boolean condition in {context}"),
      ));
    }
    Ok(())
  }

  /// Type of an expression used where exactly one value is required.
  fn value(&mut self, expr: &mut Expr) -> CompileResult<Type> {
    let ty = self.expr(expr)?;
    match &ty {
      Type::Void => Err(CompileError::type_error(
        expr.loc,
        "expression has no value",
      )),
      Type::Multi(_) => Err(CompileError::type_error(
        expr.loc,
        format!("multiple-value expression of type {ty} in single-value context"),
      )),
      _ => Ok(ty),
    }
  }

  fn expr(&mut self, expr: &mut Expr) -> CompileResult<Type> {
    let loc = expr.loc;
    let ty = match &mut expr.kind {
      ExprKind::Num { .. } => Type::Int,
      ExprKind::Bool { .. } => Type::Bool,
      ExprKind::Str { .. } => Type::string(),
      ExprKind::Var { var } => self.var_type(*var, loc)?,
      ExprKind::Binary { op, lhs, rhs } => {
        let op = *op;
        let lt = self.value(lhs)?;
        let rt = self.value(rhs)?;
        if lt != rt {
          return Err(CompileError::type_error(
            loc,
            format!("invalid operation: mismatched types {lt} and {rt}"),
          ));
        }
        let defined = if op.is_equality() {
          lt.is_scalar()
        } else {
          lt.is_numeric()
        };
        if !defined {
          return Err(CompileError::type_error(
            loc,
            format!("invalid operation: operator {} not defined on {lt}", op.symbol()),
          ));
        }
        if op.is_arithmetic() { lt } else { Type::Bool }
      }
      ExprKind::Logical { lhs, rhs, .. } => {
        for side in [lhs, rhs] {
          let ty = self.value(side)?;
          if ty != Type::Bool {
            return Err(CompileError::type_error(
              side.loc,
              format!("invalid operation: operand of type {ty} is not bool"),
            ));
          }
        }
        Type::Bool
      }
      ExprKind::Not { operand } => {
        let ty = self.value(operand)?;
        if ty != Type::Bool {
          return Err(CompileError::type_error(
            loc,
            format!("invalid operation: operator ! not defined on {ty}"),
          ));
        }
        Type::Bool
      }
      ExprKind::Addr { operand } => {
        let ty = self.value(operand)?;
        if !operand.is_addressable() {
          return Err(CompileError::type_error(
            loc,
            "invalid operation: cannot take address of expression",
          ));
        }
        Type::pointer_to(ty)
      }
      ExprKind::Deref { operand } => {
        let ty = self.value(operand)?;
        match ty {
          Type::Pointer(base) => *base,
          _ => {
            return Err(CompileError::type_error(
              loc,
              format!("invalid operation: cannot indirect value of type {ty}"),
            ));
          }
        }
      }
      ExprKind::Index { base, index } => {
        let base_ty = self.value(base)?;
        let index_ty = self.value(index)?;
        let elem = match &base_ty {
          Type::Array(elem, _) | Type::Slice(elem) => (**elem).clone(),
          _ => {
            return Err(CompileError::type_error(
              loc,
              format!("invalid operation: cannot index value of type {base_ty}"),
            ));
          }
        };
        if index_ty != Type::Int {
          return Err(CompileError::type_error(
            index.loc,
            format!("invalid argument: index of type {index_ty} must be int"),
          ));
        }
        if let Type::Array(_, len) = base_ty
          && let ExprKind::Num { value } = index.kind
          && value >= len as i64
        {
          return Err(CompileError::type_error(
            index.loc,
            format!("invalid argument: index {value} out of bounds [0:{len}]"),
          ));
        }
        elem
      }
      ExprKind::Field { owner, member } => {
        let owner_ty = self.value(owner)?;
        let st = match &owner_ty {
          Type::Pointer(base) if matches!(**base, Type::Struct(_)) => (**base).clone(),
          Type::Struct(_) => owner_ty.clone(),
          _ => {
            return Err(CompileError::type_error(
              loc,
              format!("{member} undefined (type {owner_ty} has no fields)"),
            ));
          }
        };
        match st.member(member) {
          Some((_, ty)) => ty.clone(),
          None => {
            return Err(CompileError::name(
              loc,
              format!("{member} undefined (type {st} has no field {member})"),
            ));
          }
        }
      }
      ExprKind::Call { name, args } => {
        let Some(signature) = self.env.lookup_function(name).cloned() else {
          return Err(CompileError::name(loc, format!("undefined: {name}")));
        };
        if args.len() != signature.params.len() {
          let problem = if args.len() > signature.params.len() {
            "too many"
          } else {
            "not enough"
          };
          return Err(CompileError::type_error(
            loc,
            format!(
              "{problem} arguments in call to {name}: have {}, want {}",
              args.len(),
              signature.params.len()
            ),
          ));
        }
        for (arg, param) in args.iter_mut().zip(&signature.params) {
          let ty = self.value(arg)?;
          expect_assignable(&ty, param, arg.loc, &format!("argument to {name}"))?;
        }
        signature.ret
      }
      ExprKind::Append { slice, value } => {
        let slice_ty = self.value(slice)?;
        let Type::Slice(elem) = &slice_ty else {
          return Err(CompileError::type_error(
            slice.loc,
            format!("invalid argument: {slice_ty} is not a slice"),
          ));
        };
        let value_ty = self.value(value)?;
        expect_assignable(&value_ty, elem, value.loc, "argument to append")?;
        slice_ty
      }
      ExprKind::Len { operand } => {
        let ty = self.value(operand)?;
        if !matches!(ty, Type::Array(..) | Type::Slice(_)) {
          return Err(CompileError::type_error(
            operand.loc,
            format!("invalid argument: {ty} for built-in len"),
          ));
        }
        Type::Int
      }
      ExprKind::StructLit { ty, fields, .. } => {
        let ty = ty.clone();
        let mut seen: Vec<String> = Vec::new();
        for field in fields.iter_mut() {
          if seen.contains(&field.name) {
            return Err(CompileError::type_error(
              field.loc,
              format!("duplicate field name {} in struct literal", field.name),
            ));
          }
          let Some((_, member_ty)) = ty.member(&field.name) else {
            return Err(CompileError::name(
              field.loc,
              format!("unknown field {} in struct literal of type {ty}", field.name),
            ));
          };
          let member_ty = member_ty.clone();
          let value_ty = self.value(&mut field.value)?;
          expect_assignable(&value_ty, &member_ty, field.value.loc, "struct literal")?;
          seen.push(field.name.clone());
        }
        ty
      }
      ExprKind::SliceLit { elem, elements } => {
        let elem = elem.clone();
        for element in elements.iter_mut() {
          let ty = self.value(element)?;
          expect_assignable(&ty, &elem, element.loc, "slice literal")?;
        }
        Type::slice_of(elem)
      }
    };
    expr.ty = ty.clone();
    Ok(ty)
  }

  fn var_type(&self, var: VarId, loc: usize) -> CompileResult<Type> {
    let variable = self.env.variable(var);
    variable.ty.clone().ok_or_else(|| {
      CompileError::type_error(
        loc,
        format!("cannot use {} before its type is known", variable.name),
      )
    })
  }
}

/// Parameters must fit a register or be copied in by address. Results come
/// back in registers only.
fn check_signature(name: &str, signature: &Signature, loc: usize) -> CompileResult<()> {
  if let Some(param) = signature
    .params
    .iter()
    .find(|ty| !ty.is_scalar() && !ty.is_composite())
  {
    return Err(CompileError::type_error(
      loc,
      format!("invalid parameter type {param} in {name}"),
    ));
  }

  match &signature.ret {
    Type::Void => Ok(()),
    Type::Multi(components) if components.len() > MAX_RESULTS => Err(CompileError::type_error(
      loc,
      format!("{name} returns {} values, at most {MAX_RESULTS} are supported", components.len()),
    )),
    Type::Multi(components) => match components.iter().find(|ty| !ty.is_scalar()) {
      Some(ty) => Err(CompileError::type_error(
        loc,
        format!("invalid result type {ty} in {name}"),
      )),
      None => Ok(()),
    },
    ty if ty.is_scalar() => Ok(()),
    ty => Err(CompileError::type_error(
      loc,
      format!("invalid result type {ty} in {name}"),
    )),
  }
}

fn expect_assignable(have: &Type, want: &Type, loc: usize, context: &str) -> CompileResult<()> {
  if have == want {
    return Ok(());
  }
  Err(CompileError::type_error(
    loc,
    format!("cannot use value of type {have} as {want} value in {context}"),
  ))
}
