//! Symbol environment shared by the parser, the checker and codegen.
//!
//! Scopes live in an arena and point at their parent by index, so lookups walk
//! outward without any ownership cycles. The parser keeps a stack of active
//! scopes that mirrors block nesting. Variables also live in an arena; AST nodes
//! refer to them by `VarId` once a name has been resolved.

use std::collections::HashMap;

use log::trace;

use crate::error::{CompileError, CompileResult};
use crate::ty::Type;

/// Names handled by the compiler itself rather than by user functions.
pub const BUILTINS: [&str; 2] = ["append", "len"];

const STACK_ALIGN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(usize);

#[derive(Debug)]
struct Scope {
  parent: Option<ScopeId>,
  function: Option<String>,
  variables: HashMap<String, VarId>,
}

#[derive(Debug, Clone)]
pub struct Variable {
  pub name: String,
  /// `None` until the checker infers it from the initializer.
  pub ty: Option<Type>,
  /// Owning function; `None` for top-level variables.
  pub function: Option<String>,
  /// Distance below `rbp`, assigned by `Environment::layout`.
  pub offset: usize,
  pub loc: usize,
}

impl Variable {
  pub fn is_global(&self) -> bool {
    self.function.is_none()
  }

  /// Assembly label of a top-level variable.
  pub fn label(&self) -> String {
    format!("gvar.{}", self.name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
  pub params: Vec<Type>,
  pub ret: Type,
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
  pub signature: Signature,
  pub frame_size: usize,
}

#[derive(Debug)]
pub struct Environment {
  scopes: Vec<Scope>,
  active: Vec<ScopeId>,
  variables: Vec<Variable>,
  functions: HashMap<String, FunctionInfo>,
  structs: HashMap<String, Type>,
  string_labels: HashMap<String, String>,
  string_literals: Vec<(String, String)>,
}

impl Default for Environment {
  fn default() -> Self {
    Self::new()
  }
}

impl Environment {
  pub fn new() -> Self {
    let root = Scope {
      parent: None,
      function: None,
      variables: HashMap::new(),
    };
    Self {
      scopes: vec![root],
      active: vec![ScopeId(0)],
      variables: Vec::new(),
      functions: HashMap::new(),
      structs: HashMap::new(),
      string_labels: HashMap::new(),
      string_literals: Vec::new(),
    }
  }

  pub fn root(&self) -> ScopeId {
    ScopeId(0)
  }

  pub fn current(&self) -> ScopeId {
    self.active.last().copied().unwrap_or(ScopeId(0))
  }

  /// Push a child of the current scope and make it active.
  pub fn fork(&mut self) -> ScopeId {
    let parent = self.current();
    let function = self.scopes[parent.0].function.clone();
    self.push_scope(parent, function)
  }

  /// Like `fork`, but the new scope starts the body of function `name`.
  pub fn enter_function(&mut self, name: &str) -> ScopeId {
    let parent = self.current();
    self.push_scope(parent, Some(name.to_string()))
  }

  fn push_scope(&mut self, parent: ScopeId, function: Option<String>) -> ScopeId {
    let id = ScopeId(self.scopes.len());
    self.scopes.push(Scope {
      parent: Some(parent),
      function,
      variables: HashMap::new(),
    });
    self.active.push(id);
    trace!("enter scope {id:?} (parent {parent:?})");
    id
  }

  /// Pop back to the parent scope. The root scope is never popped.
  pub fn leave(&mut self) {
    if self.active.len() > 1
      && let Some(id) = self.active.pop()
    {
      trace!("leave scope {id:?}");
    }
  }

  /// Name of the function whose body contains `scope`.
  pub fn function_of(&self, scope: ScopeId) -> Option<&str> {
    self.scopes[scope.0].function.as_deref()
  }

  pub fn current_function(&self) -> Option<&str> {
    self.function_of(self.current())
  }

  pub fn add_local_variable(
    &mut self,
    name: &str,
    ty: Option<Type>,
    loc: usize,
  ) -> CompileResult<VarId> {
    let scope = self.current();
    if self.scopes[scope.0].variables.contains_key(name) {
      return Err(CompileError::name(
        loc,
        format!("{name} redeclared in this block"),
      ));
    }
    let function = self.scopes[scope.0].function.clone();
    let id = self.push_variable(name, ty, function, loc);
    self.scopes[scope.0].variables.insert(name.to_string(), id);
    Ok(id)
  }

  /// Reserve an anonymous frame slot in the current function.
  pub fn add_temporary(&mut self, ty: Type, loc: usize) -> CompileResult<VarId> {
    let Some(function) = self.current_function().map(str::to_string) else {
      return Err(CompileError::syntax(
        loc,
        "composite literal outside of a function body",
      ));
    };
    Ok(self.push_variable("", Some(ty), Some(function), loc))
  }

  pub fn add_top_level_variable(
    &mut self,
    name: &str,
    ty: Type,
    loc: usize,
  ) -> CompileResult<VarId> {
    if self.find_top_level_variable(name).is_some() {
      return Err(CompileError::name(
        loc,
        format!("{name} redeclared in this block"),
      ));
    }
    let id = self.push_variable(name, Some(ty), None, loc);
    self.scopes[0].variables.insert(name.to_string(), id);
    Ok(id)
  }

  fn push_variable(
    &mut self,
    name: &str,
    ty: Option<Type>,
    function: Option<String>,
    loc: usize,
  ) -> VarId {
    let id = VarId(self.variables.len());
    self.variables.push(Variable {
      name: name.to_string(),
      ty,
      function,
      offset: 0,
      loc,
    });
    id
  }

  /// Nearest binding of `name`, searching from the current scope outward.
  pub fn find_variable(&self, name: &str) -> Option<VarId> {
    let mut scope = Some(self.current());
    while let Some(id) = scope {
      let s = &self.scopes[id.0];
      if let Some(var) = s.variables.get(name) {
        return Some(*var);
      }
      scope = s.parent;
    }
    None
  }

  pub fn find_top_level_variable(&self, name: &str) -> Option<VarId> {
    self.scopes[0].variables.get(name).copied()
  }

  pub fn variable(&self, id: VarId) -> &Variable {
    &self.variables[id.0]
  }

  pub fn set_variable_type(&mut self, id: VarId, ty: Type) {
    self.variables[id.0].ty = Some(ty);
  }

  pub fn top_level_variables(&self) -> impl Iterator<Item = &Variable> {
    self.variables.iter().filter(|v| v.is_global())
  }

  pub fn register_function(
    &mut self,
    name: &str,
    signature: Signature,
    loc: usize,
  ) -> CompileResult<()> {
    if BUILTINS.contains(&name) {
      return Err(CompileError::name(
        loc,
        format!("cannot redefine builtin function {name}"),
      ));
    }
    if self.functions.contains_key(name) {
      return Err(CompileError::name(
        loc,
        format!("function {name} is already defined"),
      ));
    }
    self.functions.insert(
      name.to_string(),
      FunctionInfo {
        signature,
        frame_size: 0,
      },
    );
    Ok(())
  }

  pub fn lookup_function(&self, name: &str) -> Option<&Signature> {
    self.functions.get(name).map(|info| &info.signature)
  }

  pub fn function(&self, name: &str) -> Option<&FunctionInfo> {
    self.functions.get(name)
  }

  pub fn register_struct(&mut self, name: &str, ty: Type, loc: usize) -> CompileResult<()> {
    if self.structs.contains_key(name) {
      return Err(CompileError::name(
        loc,
        format!("type {name} is already declared"),
      ));
    }
    self.structs.insert(name.to_string(), ty);
    Ok(())
  }

  pub fn lookup_struct(&self, name: &str) -> Option<&Type> {
    self.structs.get(name)
  }

  /// Label for a string literal, allocating one the first time a value is
  /// seen.
  pub fn intern_string_literal(&mut self, value: &str) -> String {
    if let Some(label) = self.string_labels.get(value) {
      return label.clone();
    }
    let label = format!(".Lstr.{}", self.string_literals.len());
    self
      .string_labels
      .insert(value.to_string(), label.clone());
    self
      .string_literals
      .push((label.clone(), value.to_string()));
    label
  }

  /// `(label, value)` pairs in first-seen order.
  pub fn string_literals(&self) -> &[(String, String)] {
    &self.string_literals
  }

  /// Assign frame offsets in declaration order and size every frame. Must run
  /// after all variable types are known.
  pub fn layout(&mut self) -> CompileResult<()> {
    let mut running: HashMap<String, usize> = HashMap::new();
    for var in &mut self.variables {
      let Some(function) = &var.function else {
        continue;
      };
      let Some(ty) = &var.ty else {
        return Err(CompileError::type_error(
          var.loc,
          format!("cannot infer the type of {}", var.name),
        ));
      };
      let offset = running.entry(function.clone()).or_default();
      *offset += ty.size();
      var.offset = *offset;
    }

    for (name, info) in &mut self.functions {
      let used = running.get(name).copied().unwrap_or(0);
      info.frame_size = used.div_ceil(STACK_ALIGN) * STACK_ALIGN;
      trace!("frame of {name}: {} bytes", info.frame_size);
    }
    Ok(())
  }
}
