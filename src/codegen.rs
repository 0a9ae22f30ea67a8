//! Code generation: lower the checked AST into Intel-syntax x86-64 assembly.
//!
//! The emitter is a simple stack machine: every expression leaves its value in
//! `rax` (composite values leave their address) and binary operators park the
//! left operand on the stack while the right one is computed. `depth` counts
//! the words currently pushed so calls can be padded to keep `rsp` 16-byte
//! aligned. Locals live in the frame and are addressed relative to `rbp`;
//! top-level variables live in `.data` and are addressed relative to `rip`.

use std::fmt;

use log::{debug, trace};

use crate::ast::{
  BinaryOp, Block, ElseBranch, Expr, ExprKind, FuncDef, LogicalOp, Program, Stmt, StmtKind,
};
use crate::env::{Environment, VarId};
use crate::error::{CompileError, CompileResult};
use crate::ty::{Type, WORD_SIZE};

const ARG_REGS: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

/// Registers carrying the results of a multi-value return, in order.
const RESULT_REGS: [&str; 6] = ["rax", "rdx", "rdi", "rsi", "rcx", "r8"];

/// A slice value points to a descriptor `[len, cap, data]`. Descriptors are
/// never written after they are built, so every copy keeps its own length.
const SLICE_DESCRIPTOR: usize = 3 * WORD_SIZE;
const SLICE_CAP: usize = WORD_SIZE;
const SLICE_DATA: usize = 2 * WORD_SIZE;

macro_rules! emit {
  ($cg:expr, $($arg:tt)*) => {
    $cg.lines.push(format!($($arg)*))
  };
}

/// Emitted program. Renders to the text handed to the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
  /// Instructions and labels, unindented.
  pub lines: Vec<String>,
  /// `(label, raw value)` for every string literal.
  pub string_literals: Vec<(String, String)>,
  /// `(label, size in bytes)` for every top-level variable.
  pub globals: Vec<(String, usize)>,
}

impl fmt::Display for Assembly {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, ".intel_syntax noprefix")?;
    writeln!(f, ".globl main")?;
    writeln!(f, ".data")?;
    for (label, value) in &self.string_literals {
      writeln!(f, "{label}:")?;
      writeln!(f, "    .string \"{value}\"")?;
    }
    for (label, size) in &self.globals {
      writeln!(f, "{label}:")?;
      writeln!(f, "    .zero {size}")?;
    }
    writeln!(f, ".section .note.GNU-stack,\"\",@progbits")?;
    writeln!(f, ".text")?;
    for line in &self.lines {
      if line.ends_with(':') {
        writeln!(f, "{line}")?;
      } else {
        writeln!(f, "    {line}")?;
      }
    }
    Ok(())
  }
}

/// Emit assembly for a checked program.
pub fn generate(program: &Program, env: &Environment) -> CompileResult<Assembly> {
  let mut codegen = CodeGen {
    env,
    lines: Vec::new(),
    depth: 0,
    labels: 0,
    function: String::new(),
  };
  for func in program.functions() {
    codegen.function(func)?;
  }

  let globals = env
    .top_level_variables()
    .filter_map(|var| var.ty.as_ref().map(|ty| (var.label(), ty.size())))
    .collect();
  let asm = Assembly {
    lines: codegen.lines,
    string_literals: env.string_literals().to_vec(),
    globals,
  };
  debug!("emitted {} assembly lines", asm.lines.len());
  Ok(asm)
}

/// Where an assignment stores: a declared variable or an addressable
/// expression.
#[derive(Clone, Copy)]
enum Place<'p> {
  Var(VarId),
  Expr(&'p Expr),
}

struct CodeGen<'e> {
  env: &'e Environment,
  lines: Vec<String>,
  depth: usize,
  labels: usize,
  function: String,
}

impl CodeGen<'_> {
  fn next_label(&mut self) -> usize {
    self.labels += 1;
    self.labels
  }

  fn push(&mut self, reg: &str) {
    emit!(self, "push {reg}");
    self.depth += 1;
  }

  fn pop(&mut self, reg: &str) {
    emit!(self, "pop {reg}");
    self.depth -= 1;
  }

  /// Call a C library routine, padding the stack if it is misaligned.
  fn call_aligned(&mut self, name: &str) {
    if self.depth % 2 == 1 {
      emit!(self, "sub rsp, 8");
      emit!(self, "call {name}");
      emit!(self, "add rsp, 8");
    } else {
      emit!(self, "call {name}");
    }
  }

  fn function(&mut self, func: &FuncDef) -> CompileResult<()> {
    let frame_size = self
      .env
      .function(&func.name)
      .map(|info| info.frame_size)
      .ok_or_else(|| CompileError::name(func.loc, format!("undefined: {}", func.name)))?;
    trace!("generating {} (frame {frame_size} bytes)", func.name);
    self.function = func.name.clone();
    self.depth = 0;

    emit!(self, "{}:", func.name);
    emit!(self, "push rbp");
    emit!(self, "mov rbp, rsp");
    if frame_size > 0 {
      emit!(self, "sub rsp, {frame_size}");
    }

    for (i, &param) in func.params.iter().enumerate() {
      let var = self.env.variable(param);
      let ty = self.var_type(param)?;
      let offset = var.offset;
      let source = match ARG_REGS.get(i) {
        Some(reg) => (*reg).to_string(),
        None => {
          let slot = 16 + (i - ARG_REGS.len()) * WORD_SIZE;
          emit!(self, "mov r10, [rbp+{slot}]");
          "r10".to_string()
        }
      };
      if ty.is_composite() {
        // The caller passed an address; copy the value into our frame.
        for word in 0..ty.footprint() {
          emit!(self, "mov r11, [{source}+{}]", word * WORD_SIZE);
          emit!(self, "mov [rbp-{}], r11", offset - word * WORD_SIZE);
        }
      } else {
        emit!(self, "mov [rbp-{offset}], {source}");
      }
    }

    self.block(&func.body)?;

    emit!(self, "mov rax, 0");
    emit!(self, ".L.return.{}:", func.name);
    emit!(self, "mov rsp, rbp");
    emit!(self, "pop rbp");
    emit!(self, "ret");
    Ok(())
  }

  fn block(&mut self, block: &Block) -> CompileResult<()> {
    for stmt in &block.stmts {
      self.stmt(stmt)?;
    }
    Ok(())
  }

  fn stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match &stmt.kind {
      StmtKind::Package { .. }
      | StmtKind::Import { .. }
      | StmtKind::StructDecl { .. }
      | StmtKind::TopLevelVar { .. }
      | StmtKind::Func(_) => Ok(()),
      StmtKind::LocalVar { var, init } => match init {
        Some(init) => self.assign(&[Place::Var(*var)], std::slice::from_ref(init)),
        None => {
          let ty = self.var_type(*var)?;
          let offset = self.env.variable(*var).offset;
          for word in 0..ty.footprint() {
            emit!(self, "mov qword ptr [rbp-{}], 0", offset - word * WORD_SIZE);
          }
          Ok(())
        }
      },
      StmtKind::ShortVarDecl { vars, values } => {
        let places: Vec<Place> = vars.iter().map(|var| Place::Var(*var)).collect();
        self.assign(&places, values)
      }
      StmtKind::Assign { targets, values } => {
        let places: Vec<Place> = targets.iter().map(Place::Expr).collect();
        self.assign(&places, values)
      }
      StmtKind::Expr(expr) => self.expr(expr),
      StmtKind::Return { values } => {
        match values.as_slice() {
          [] => emit!(self, "mov rax, 0"),
          [value] => self.expr(value)?,
          _ => {
            for value in values {
              self.expr(value)?;
              self.push("rax");
            }
            for reg in RESULT_REGS[..values.len()].iter().rev() {
              self.pop(reg);
            }
          }
        }
        emit!(self, "jmp .L.return.{}", self.function);
        Ok(())
      }
      StmtKind::If {
        cond,
        then,
        otherwise,
      } => {
        let c = self.next_label();
        self.expr(cond)?;
        emit!(self, "cmp rax, 0");
        emit!(self, "je .L.else.{c}");
        self.block(then)?;
        emit!(self, "jmp .L.end.{c}");
        emit!(self, ".L.else.{c}:");
        if let ElseBranch::Block(block) = otherwise {
          self.block(block)?;
        }
        emit!(self, ".L.end.{c}:");
        Ok(())
      }
      StmtKind::For {
        init,
        cond,
        update,
        body,
      } => {
        let c = self.next_label();
        if let Some(init) = init {
          self.stmt(init)?;
        }
        emit!(self, ".L.begin.{c}:");
        if let Some(cond) = cond {
          self.expr(cond)?;
          emit!(self, "cmp rax, 0");
          emit!(self, "je .L.end.{c}");
        }
        self.block(body)?;
        if let Some(update) = update {
          self.stmt(update)?;
        }
        emit!(self, "jmp .L.begin.{c}");
        emit!(self, ".L.end.{c}:");
        Ok(())
      }
    }
  }

  /// Store `values` into `places`. Either one value per place, or a single
  /// call whose results are spread over the places.
  fn assign(&mut self, places: &[Place], values: &[Expr]) -> CompileResult<()> {
    if let ([place], [value]) = (places, values) {
      self.place_addr(*place)?;
      self.push("rax");
      self.expr(value)?;
      emit!(self, "mov rdi, rax");
      self.pop("rax");
      let ty = self.place_type(*place)?;
      self.store(&ty);
      return Ok(());
    }

    if let [call] = values {
      self.expr(call)?;
      for reg in &RESULT_REGS[..places.len()] {
        self.push(reg);
      }
    } else {
      for value in values {
        self.expr(value)?;
        self.push("rax");
      }
    }

    // Every right-hand side is on the stack; assign from the last one back.
    for place in places.iter().rev() {
      self.place_addr(*place)?;
      self.pop("rdi");
      let ty = self.place_type(*place)?;
      self.store(&ty);
    }
    Ok(())
  }

  fn place_addr(&mut self, place: Place) -> CompileResult<()> {
    match place {
      Place::Var(var) => {
        self.var_addr(var);
        Ok(())
      }
      Place::Expr(expr) => self.addr(expr),
    }
  }

  fn place_type(&self, place: Place) -> CompileResult<Type> {
    match place {
      Place::Var(var) => self.var_type(var),
      Place::Expr(expr) => Ok(expr.ty.clone()),
    }
  }

  fn var_type(&self, var: VarId) -> CompileResult<Type> {
    let variable = self.env.variable(var);
    variable.ty.clone().ok_or_else(|| {
      CompileError::type_error(
        variable.loc,
        format!("cannot infer the type of {}", variable.name),
      )
    })
  }

  fn var_addr(&mut self, var: VarId) {
    let variable = self.env.variable(var);
    if variable.is_global() {
      emit!(self, "lea rax, [rip+{}]", variable.label());
    } else {
      emit!(self, "lea rax, [rbp-{}]", variable.offset);
    }
  }

  /// Compute the address of an addressable expression into `rax`.
  fn addr(&mut self, expr: &Expr) -> CompileResult<()> {
    match &expr.kind {
      ExprKind::Var { var } => {
        self.var_addr(*var);
        Ok(())
      }
      ExprKind::Deref { operand } => self.expr(operand),
      ExprKind::Index { base, index } => {
        let elem_size = expr.ty.size();
        // Arrays evaluate to their address, slices to their descriptor.
        self.expr(base)?;
        self.push("rax");
        self.expr(index)?;
        emit!(self, "imul rax, rax, {elem_size}");
        emit!(self, "mov rdi, rax");
        self.pop("rax");
        if matches!(base.ty, Type::Slice(_)) {
          emit!(self, "mov rax, [rax+{SLICE_DATA}]");
        }
        emit!(self, "add rax, rdi");
        Ok(())
      }
      ExprKind::Field { owner, member } => {
        let st = match &owner.ty {
          Type::Pointer(base) => base.as_ref(),
          ty => ty,
        };
        let Some((offset, _)) = st.member(member) else {
          return Err(CompileError::name(
            expr.loc,
            format!("{member} undefined (type {st} has no field {member})"),
          ));
        };
        // Both a struct value and a pointer to one evaluate to an address.
        self.expr(owner)?;
        if offset > 0 {
          emit!(self, "add rax, {offset}");
        }
        Ok(())
      }
      _ if expr.ty.is_composite() => self.expr(expr),
      _ => Err(CompileError::type_error(
        expr.loc,
        "cannot take the address of expression",
      )),
    }
  }

  /// Replace the address in `rax` with the value stored there.
  fn load(&mut self, ty: &Type) {
    match ty {
      // Composite values are represented by their address.
      Type::Array(..) | Type::Struct(_) => {}
      Type::Rune => emit!(self, "movzx rax, byte ptr [rax]"),
      _ => emit!(self, "mov rax, [rax]"),
    }
  }

  /// Store the value in `rdi` at the address in `rax`.
  fn store(&mut self, ty: &Type) {
    match ty {
      Type::Array(..) | Type::Struct(_) => {
        for word in 0..ty.footprint() {
          let offset = word * WORD_SIZE;
          emit!(self, "mov rdx, [rdi+{offset}]");
          emit!(self, "mov [rax+{offset}], rdx");
        }
      }
      Type::Rune => emit!(self, "mov byte ptr [rax], dil"),
      _ => emit!(self, "mov [rax], rdi"),
    }
  }

  fn expr(&mut self, expr: &Expr) -> CompileResult<()> {
    match &expr.kind {
      ExprKind::Num { value } => emit!(self, "mov rax, {value}"),
      ExprKind::Bool { value } => emit!(self, "mov rax, {}", i64::from(*value)),
      ExprKind::Str { label, .. } => emit!(self, "lea rax, [rip+{label}]"),
      ExprKind::Var { .. }
      | ExprKind::Deref { .. }
      | ExprKind::Index { .. }
      | ExprKind::Field { .. } => {
        self.addr(expr)?;
        self.load(&expr.ty);
      }
      ExprKind::Addr { operand } => self.addr(operand)?,
      ExprKind::Binary { op, lhs, rhs } => {
        self.expr(lhs)?;
        self.push("rax");
        self.expr(rhs)?;
        emit!(self, "mov rdi, rax");
        self.pop("rax");
        self.binary(*op);
      }
      ExprKind::Logical { op, lhs, rhs } => {
        let c = self.next_label();
        // Either operand can decide the result on its own.
        let (jump, label, decided) = match op {
          LogicalOp::And => ("je", "false", 0),
          LogicalOp::Or => ("jne", "true", 1),
        };
        self.expr(lhs)?;
        emit!(self, "cmp rax, 0");
        emit!(self, "{jump} .L.{label}.{c}");
        self.expr(rhs)?;
        emit!(self, "cmp rax, 0");
        emit!(self, "{jump} .L.{label}.{c}");
        emit!(self, "mov rax, {}", 1 - decided);
        emit!(self, "jmp .L.end.{c}");
        emit!(self, ".L.{label}.{c}:");
        emit!(self, "mov rax, {decided}");
        emit!(self, ".L.end.{c}:");
      }
      ExprKind::Not { operand } => {
        self.expr(operand)?;
        emit!(self, "cmp rax, 0");
        emit!(self, "sete al");
        emit!(self, "movzx rax, al");
      }
      ExprKind::Call { name, args } => self.call(name, args)?,
      ExprKind::Append { slice, value } => self.append(slice, value)?,
      ExprKind::Len { operand } => {
        self.expr(operand)?;
        match &operand.ty {
          Type::Array(_, len) => emit!(self, "mov rax, {len}"),
          _ => {
            // A nil slice has length zero.
            let c = self.next_label();
            emit!(self, "cmp rax, 0");
            emit!(self, "je .L.end.{c}");
            emit!(self, "mov rax, [rax]");
            emit!(self, ".L.end.{c}:");
          }
        }
      }
      ExprKind::StructLit { ty, fields, slot } => {
        let base = self.env.variable(*slot).offset;
        for word in 0..ty.footprint() {
          emit!(self, "mov qword ptr [rbp-{}], 0", base - word * WORD_SIZE);
        }
        for field in fields {
          let Some((offset, member_ty)) = ty.member(&field.name) else {
            return Err(CompileError::name(
              field.loc,
              format!("unknown field {} in struct literal of type {ty}", field.name),
            ));
          };
          self.expr(&field.value)?;
          emit!(self, "mov rdi, rax");
          emit!(self, "lea rax, [rbp-{}]", base - offset);
          self.store(member_ty);
        }
        emit!(self, "lea rax, [rbp-{base}]");
      }
      ExprKind::SliceLit { elem, elements } => {
        let elem_size = elem.size();
        let count = elements.len();
        // The elements follow the descriptor in the same block.
        emit!(self, "mov rdi, {}", SLICE_DESCRIPTOR + count * elem_size);
        self.call_aligned("malloc");
        emit!(self, "mov qword ptr [rax], {count}");
        emit!(self, "mov qword ptr [rax+{SLICE_CAP}], {count}");
        emit!(self, "lea rdi, [rax+{SLICE_DESCRIPTOR}]");
        emit!(self, "mov [rax+{SLICE_DATA}], rdi");
        self.push("rax");
        for (i, element) in elements.iter().enumerate() {
          self.expr(element)?;
          emit!(self, "mov rdi, rax");
          emit!(self, "mov rax, [rsp]");
          emit!(self, "mov rax, [rax+{SLICE_DATA}]");
          if i > 0 {
            emit!(self, "add rax, {}", i * elem_size);
          }
          self.store(elem);
        }
        self.pop("rax");
      }
    }
    Ok(())
  }

  /// Combine `rax` (left) and `rdi` (right) into `rax`.
  fn binary(&mut self, op: BinaryOp) {
    let set = match op {
      BinaryOp::Add => return emit!(self, "add rax, rdi"),
      BinaryOp::Sub => return emit!(self, "sub rax, rdi"),
      BinaryOp::Mul => return emit!(self, "imul rax, rdi"),
      BinaryOp::Div => {
        emit!(self, "cqo");
        emit!(self, "idiv rdi");
        return;
      }
      BinaryOp::Eq => "sete",
      BinaryOp::Ne => "setne",
      BinaryOp::Lt => "setl",
      BinaryOp::Le => "setle",
      BinaryOp::Gt => "setg",
      BinaryOp::Ge => "setge",
    };
    emit!(self, "cmp rax, rdi");
    emit!(self, "{set} al");
    emit!(self, "movzx rax, al");
  }

  /// Arguments are evaluated left to right into a reserved area, the first six
  /// are then popped into registers and the rest stay on the stack for the
  /// callee.
  fn call(&mut self, name: &str, args: &[Expr]) -> CompileResult<()> {
    let stack_args = args.len().saturating_sub(ARG_REGS.len());
    let pad = (self.depth + stack_args) % 2;
    if pad == 1 {
      emit!(self, "sub rsp, 8");
      self.depth += 1;
    }
    if !args.is_empty() {
      emit!(self, "sub rsp, {}", args.len() * WORD_SIZE);
      self.depth += args.len();
    }
    for (i, arg) in args.iter().enumerate() {
      self.expr(arg)?;
      emit!(self, "mov [rsp+{}], rax", i * WORD_SIZE);
    }
    for reg in ARG_REGS.iter().take(args.len()) {
      self.pop(reg);
    }

    emit!(self, "call {name}");

    let reserved = stack_args + pad;
    if reserved > 0 {
      emit!(self, "add rsp, {}", reserved * WORD_SIZE);
      self.depth -= reserved;
    }
    Ok(())
  }

  /// `append(slice, value)`: build a new descriptor one element longer.
  /// Elements stay shared while capacity remains; a full slice is copied into
  /// a fresh array of capacity `2 * cap + 1`. The old descriptor is untouched.
  fn append(&mut self, slice: &Expr, value: &Expr) -> CompileResult<()> {
    let elem = match &slice.ty {
      Type::Slice(elem) => elem.as_ref().clone(),
      ty => {
        return Err(CompileError::type_error(
          slice.loc,
          format!("invalid argument: {ty} is not a slice"),
        ));
      }
    };
    let elem_size = elem.size();
    let c = self.next_label();

    self.expr(slice)?;
    self.push("rax");
    self.expr(value)?;
    self.push("rax");
    emit!(self, "mov rdi, {SLICE_DESCRIPTOR}");
    self.call_aligned("malloc");
    self.push("rax");

    // Stack: [rsp] = new descriptor, [rsp+8] = value, [rsp+16] = old one.
    for word in 0..3 {
      emit!(self, "mov qword ptr [rax+{}], 0", word * WORD_SIZE);
    }
    emit!(self, "mov rdi, [rsp+16]");
    emit!(self, "cmp rdi, 0");
    emit!(self, "je .L.grow.{c}");
    for word in 0..3 {
      let offset = word * WORD_SIZE;
      emit!(self, "mov rsi, [rdi+{offset}]");
      emit!(self, "mov [rax+{offset}], rsi");
    }
    emit!(self, "mov rsi, [rax+{SLICE_CAP}]");
    emit!(self, "cmp qword ptr [rax], rsi");
    emit!(self, "jl .L.store.{c}");

    emit!(self, ".L.grow.{c}:");
    emit!(self, "mov rdi, [rax+{SLICE_CAP}]");
    emit!(self, "lea rdi, [rdi+rdi+1]");
    emit!(self, "mov [rax+{SLICE_CAP}], rdi");
    emit!(self, "imul rdi, rdi, {elem_size}");
    self.call_aligned("malloc");
    emit!(self, "mov rdi, [rsp]");
    emit!(self, "mov rsi, [rdi+{SLICE_DATA}]");
    emit!(self, "mov rdx, [rdi]");
    emit!(self, "imul rdx, rdx, {elem_size}");
    emit!(self, "mov [rdi+{SLICE_DATA}], rax");
    emit!(self, "mov rdi, rax");
    self.call_aligned("memcpy");

    emit!(self, ".L.store.{c}:");
    emit!(self, "mov rax, [rsp]");
    emit!(self, "mov rdi, [rax]");
    emit!(self, "add qword ptr [rax], 1");
    emit!(self, "imul rdi, rdi, {elem_size}");
    emit!(self, "add rdi, [rax+{SLICE_DATA}]");
    emit!(self, "mov rax, rdi");
    emit!(self, "mov rdi, [rsp+8]");
    self.store(&elem);
    self.pop("rax");
    emit!(self, "add rsp, {}", 2 * WORD_SIZE);
    self.depth -= 2;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;
  use crate::sema::check;
  use crate::tokenizer::tokenize;

  fn compile(source: &str) -> Assembly {
    let (mut program, mut env) = parse(tokenize(source).unwrap(), source).unwrap();
    check(&mut program, &mut env).unwrap();
    generate(&program, &env).unwrap()
  }

  fn function_lines<'a>(asm: &'a Assembly, name: &str) -> &'a [String] {
    let start = asm
      .lines
      .iter()
      .position(|l| *l == format!("{name}:"))
      .expect("function label");
    let end = asm.lines[start..]
      .iter()
      .position(|l| l == "ret")
      .expect("ret")
      + start;
    &asm.lines[start..=end]
  }

  #[test]
  fn constant_main() {
    let asm = compile("func main() { return 40 + 2 }");
    let lines = function_lines(&asm, "main");
    assert_eq!(
      lines,
      [
        "main:",
        "push rbp",
        "mov rbp, rsp",
        "mov rax, 40",
        "push rax",
        "mov rax, 2",
        "mov rdi, rax",
        "pop rax",
        "add rax, rdi",
        "jmp .L.return.main",
        "mov rax, 0",
        ".L.return.main:",
        "mov rsp, rbp",
        "pop rbp",
        "ret",
      ]
    );
  }

  #[test]
  fn rendering_layout() {
    let asm = compile("var g [2]int\nfunc main() { s := \"hi\"; return g[1] }");
    let text = asm.to_string();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], ".intel_syntax noprefix");
    assert_eq!(lines[1], ".globl main");
    assert_eq!(lines[2], ".data");
    assert_eq!(lines[3], ".Lstr.0:");
    assert_eq!(lines[4], "    .string \"hi\"");
    assert_eq!(lines[5], "gvar.g:");
    assert_eq!(lines[6], "    .zero 16");
    assert!(lines.contains(&".text"));
    assert!(lines.contains(&"main:"));
    assert!(lines.contains(&"    lea rax, [rip+gvar.g]"));
    assert!(lines.contains(&"    lea rax, [rip+.Lstr.0]"));
  }

  #[test]
  fn frame_is_reserved_and_locals_use_offsets() {
    let asm = compile("func main() { a := 1; b := 2; return a + b }");
    let lines = function_lines(&asm, "main");
    assert!(lines.contains(&"sub rsp, 16".to_string()));
    assert!(lines.contains(&"lea rax, [rbp-8]".to_string()));
    assert!(lines.contains(&"lea rax, [rbp-16]".to_string()));
  }

  #[test]
  fn control_flow_labels_share_one_counter() {
    let asm = compile(
      "func main() { x := 0; if x < 1 { x = 1 } else { x = 2 }; for x < 5 { x = x + 1 }; return x }",
    );
    let labels: Vec<&str> = asm
      .lines
      .iter()
      .filter(|l| l.starts_with(".L.") && l.ends_with(':'))
      .map(String::as_str)
      .collect();
    assert_eq!(
      labels,
      [
        ".L.else.1:",
        ".L.end.1:",
        ".L.begin.2:",
        ".L.end.2:",
        ".L.return.main:"
      ]
    );
  }

  #[test]
  fn logical_operators_short_circuit() {
    let asm = compile("func main() { a := true && false; b := true || false }");
    assert!(asm.lines.contains(&"je .L.false.1".to_string()));
    assert!(asm.lines.contains(&".L.false.1:".to_string()));
    assert!(asm.lines.contains(&"jne .L.true.2".to_string()));
    assert!(asm.lines.contains(&".L.true.2:".to_string()));
  }

  #[test]
  fn parameters_are_spilled_from_registers_and_stack() {
    let asm = compile(
      "func f(a, b, c, d, e, f, g, h int) int { return h }\nfunc main() { return f(1, 2, 3, 4, 5, 6, 7, 8) }",
    );
    let callee = function_lines(&asm, "f");
    assert!(callee.contains(&"mov [rbp-8], rdi".to_string()));
    assert!(callee.contains(&"mov [rbp-48], r9".to_string()));
    assert!(callee.contains(&"mov r10, [rbp+16]".to_string()));
    assert!(callee.contains(&"mov r10, [rbp+24]".to_string()));

    let caller = function_lines(&asm, "main");
    assert!(caller.contains(&"sub rsp, 64".to_string()));
    assert!(caller.contains(&"mov [rsp+56], rax".to_string()));
    assert!(caller.contains(&"pop r9".to_string()));
    assert!(caller.contains(&"call f".to_string()));
    assert!(caller.contains(&"add rsp, 16".to_string()));
  }

  #[test]
  fn calls_are_padded_to_keep_alignment() {
    // One pushed operand means the call needs an extra word of padding.
    let asm = compile("func one() int { return 1 }\nfunc main() { return 1 + one() }");
    let caller = function_lines(&asm, "main");
    let call = caller.iter().position(|l| l == "call one").unwrap();
    assert_eq!(caller[call - 1], "sub rsp, 8");
    assert_eq!(caller[call + 1], "add rsp, 8");
  }

  #[test]
  fn multi_value_returns_use_result_registers() {
    let asm = compile(
      "func pair() (int, int) { return 1, 2 }\nfunc main() { a, b := pair(); return a - b }",
    );
    let callee = function_lines(&asm, "pair");
    let pops: Vec<&str> = callee
      .iter()
      .filter(|l| l.starts_with("pop ") && *l != "pop rbp")
      .map(String::as_str)
      .collect();
    assert_eq!(pops, ["pop rdx", "pop rax"]);
    let caller = function_lines(&asm, "main");
    assert!(caller.contains(&"push rdx".to_string()));
  }

  #[test]
  fn runes_are_bytes() {
    let asm = compile("func main() { s := \"A\"; r := *s; *s = r }");
    assert!(asm.lines.contains(&"movzx rax, byte ptr [rax]".to_string()));
    assert!(asm.lines.contains(&"mov byte ptr [rax], dil".to_string()));
  }

  #[test]
  fn uninitialized_locals_are_zero_filled() {
    let asm = compile("func main() { var a [2]int }");
    assert!(asm.lines.contains(&"mov qword ptr [rbp-16], 0".to_string()));
    assert!(asm.lines.contains(&"mov qword ptr [rbp-8], 0".to_string()));
  }

  #[test]
  fn composite_assignment_copies_words() {
    let asm = compile("type P struct { x, y int }\nfunc main() { p := P{x: 1, y: 2}; q := p }");
    assert!(asm.lines.contains(&"mov rdx, [rdi+8]".to_string()));
    assert!(asm.lines.contains(&"mov [rax+8], rdx".to_string()));
  }

  #[test]
  fn append_builds_a_fresh_descriptor() {
    let asm = compile("func main() { var s []int; s = append(s, 1); return len(s) }");
    for line in [
      "mov rdi, 24",
      "lea rdi, [rdi+rdi+1]",
      "call memcpy",
      "add qword ptr [rax], 1",
    ] {
      assert!(asm.lines.iter().any(|l| l == line), "missing {line}");
    }
    assert!(!asm.lines.iter().any(|l| l == "call realloc"));
    // Only the new descriptor's length is bumped.
    let bumps = asm.lines.iter().filter(|l| l.starts_with("add qword ptr")).count();
    assert_eq!(bumps, 1);
  }
}
