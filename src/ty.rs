use std::fmt;

/// Bytes per machine word; every footprint is expressed in these.
pub const WORD_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
  Void,
  Int,
  Rune,
  Bool,
  Pointer(Box<Type>),
  Array(Box<Type>, usize),
  Slice(Box<Type>),
  Struct(StructType),
  /// Results of a function returning more than one value. Never nested and
  /// never stored.
  Multi(Vec<Type>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
  pub name: String,
  pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
  pub name: String,
  pub ty: Type,
}

impl Type {
  /// `string` is a pointer to its first rune; there is no separate runtime
  /// string type.
  pub fn string() -> Self {
    Self::pointer_to(Type::Rune)
  }

  pub fn pointer_to(base: Type) -> Self {
    Self::Pointer(Box::new(base))
  }

  pub fn array_of(base: Type, len: usize) -> Self {
    Self::Array(Box::new(base), len)
  }

  pub fn slice_of(base: Type) -> Self {
    Self::Slice(Box::new(base))
  }

  pub fn structure(name: impl Into<String>, members: Vec<Member>) -> Self {
    Self::Struct(StructType {
      name: name.into(),
      members,
    })
  }

  pub fn multi(components: Vec<Type>) -> Self {
    Self::Multi(components)
  }

  pub fn is_numeric(&self) -> bool {
    matches!(self, Type::Int | Type::Rune)
  }

  /// Values that fit in one register and are copied by a single move.
  pub fn is_scalar(&self) -> bool {
    matches!(
      self,
      Type::Int | Type::Rune | Type::Bool | Type::Pointer(_) | Type::Slice(_)
    )
  }

  /// Values handled by address and copied word by word.
  pub fn is_composite(&self) -> bool {
    matches!(self, Type::Array(..) | Type::Struct(_))
  }

  /// Number of words a value of this type occupies.
  pub fn footprint(&self) -> usize {
    match self {
      Type::Void | Type::Multi(_) => 0,
      Type::Int | Type::Rune | Type::Bool | Type::Pointer(_) | Type::Slice(_) => 1,
      Type::Array(base, len) => base.footprint() * len,
      Type::Struct(st) => st.members.iter().map(|m| m.ty.footprint()).sum(),
    }
  }

  pub fn size(&self) -> usize {
    self.footprint() * WORD_SIZE
  }

  /// Byte offset and type of a struct member.
  pub fn member(&self, name: &str) -> Option<(usize, &Type)> {
    let Type::Struct(st) = self else {
      return None;
    };
    let mut offset = 0;
    for member in &st.members {
      if member.name == name {
        return Some((offset, &member.ty));
      }
      offset += member.ty.size();
    }
    None
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Type::Void => write!(f, "void"),
      Type::Int => write!(f, "int"),
      Type::Rune => write!(f, "rune"),
      Type::Bool => write!(f, "bool"),
      Type::Pointer(base) if **base == Type::Rune => write!(f, "string"),
      Type::Pointer(base) => write!(f, "*{base}"),
      Type::Array(base, len) => write!(f, "[{len}]{base}"),
      Type::Slice(base) => write!(f, "[]{base}"),
      Type::Struct(st) => write!(f, "{}", st.name),
      Type::Multi(components) => {
        write!(f, "(")?;
        for (i, ty) in components.iter().enumerate() {
          if i > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{ty}")?;
        }
        write!(f, ")")
      }
    }
  }
}
