//! Type System for KernelScript

use std::fmt;

/// Built-in primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Void,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Bool,
}

impl PrimitiveType {
    /// Every primitive, in registration order
    pub const ALL: [PrimitiveType; 8] = [
        Self::Void,
        Self::Char,
        Self::Short,
        Self::Int,
        Self::Long,
        Self::Float,
        Self::Double,
        Self::Bool,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bool => "bool",
        }
    }

    /// Get the size in bytes
    pub fn size_of(&self) -> usize {
        match self {
            Self::Void => 0,
            Self::Char | Self::Bool => 1,
            Self::Short => 2,
            Self::Int | Self::Float => 4,
            Self::Long | Self::Double => 8,
        }
    }
}

/// Size in bytes of a built-in type name
pub fn primitive_size(name: &str) -> Option<usize> {
    PrimitiveType::from_name(name).map(|p| p.size_of())
}

/// Type attached to a symbol, compared structurally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    Primitive { name: String },
    Pointer(Box<TypeDescriptor>),
    Array { element: Box<TypeDescriptor> },
    Function { ret: Box<TypeDescriptor> },
    Struct { name: String },
    Union { name: String },
    Enum { name: String },
    /// typedef name
    Alias { target: Box<TypeDescriptor> },
}

impl TypeDescriptor {
    pub fn primitive(name: impl Into<String>) -> Self {
        Self::Primitive { name: name.into() }
    }

    /// Wrap in `depth` levels of pointer
    pub fn pointer_to(self, depth: usize) -> Self {
        (0..depth).fold(self, |ty, _| Self::Pointer(Box::new(ty)))
    }

    pub fn array_of(self) -> Self {
        Self::Array {
            element: Box::new(self),
        }
    }

    pub fn function_returning(self) -> Self {
        Self::Function { ret: Box::new(self) }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Self::Function { .. })
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive { name } => write!(f, "{}", name),
            Self::Pointer(inner) => write!(f, "{}*", inner),
            Self::Array { element } => write!(f, "{}[]", element),
            Self::Function { ret } => write!(f, "fn() -> {}", ret),
            Self::Struct { name } => write!(f, "struct {}", name),
            Self::Union { name } => write!(f, "union {}", name),
            Self::Enum { name } => write!(f, "enum {}", name),
            Self::Alias { target } => write!(f, "{}", target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_primitive_sizes() {
        assert_eq!(primitive_size("void"), Some(0));
        assert_eq!(primitive_size("char"), Some(1));
        assert_eq!(primitive_size("long"), Some(8));
        assert_eq!(primitive_size("Point"), None);
    }

    #[test]
    fn test_descriptors_compare_structurally() {
        let a = TypeDescriptor::primitive("int").pointer_to(2).array_of();
        let b = TypeDescriptor::primitive("int").pointer_to(2).array_of();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "int**[]");
        assert_ne!(a, TypeDescriptor::primitive("int").array_of());
    }

    #[test]
    fn test_alias_and_function_display() {
        let alias = TypeDescriptor::Alias {
            target: Box::new(TypeDescriptor::Struct { name: "Point".to_string() }),
        };
        assert_eq!(alias.to_string(), "struct Point");
        let func = TypeDescriptor::primitive("int").function_returning();
        assert!(func.is_function());
        assert!(!alias.is_function());
        assert_eq!(func.to_string(), "fn() -> int");
    }
}
