//! Neutral metadata model for managed assemblies
//!
//! Just enough reflection data to lay out serialized fields: types, their
//! base types, generic parameters and declared fields. Nothing here knows
//! about method bodies.

use std::fmt;

/// Kind of a type definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Reference type
    Class,
    /// Value type
    Struct,
    /// Enumeration backed by an integer type
    Enum,
    /// Interface (never serialized by value)
    Interface,
}

impl TypeKind {
    /// Encoded tag for the metadata image
    pub fn to_u8(self) -> u8 {
        match self {
            TypeKind::Class => 0,
            TypeKind::Struct => 1,
            TypeKind::Enum => 2,
            TypeKind::Interface => 3,
        }
    }

    /// Decode a tag written by [`TypeKind::to_u8`]
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(TypeKind::Class),
            1 => Some(TypeKind::Struct),
            2 => Some(TypeKind::Enum),
            3 => Some(TypeKind::Interface),
            _ => None,
        }
    }
}

/// Type definition flags
pub mod type_flags {
    /// Type is abstract
    pub const ABSTRACT: u32 = 1 << 0;
    /// Type carries `[Serializable]`
    pub const SERIALIZABLE: u32 = 1 << 1;
    /// Type is sealed
    pub const SEALED: u32 = 1 << 2;
}

/// Field definition flags
pub mod field_flags {
    /// Static field
    pub const STATIC: u32 = 1 << 0;
    /// Public field
    pub const PUBLIC: u32 = 1 << 1;
    /// `readonly` field
    pub const INIT_ONLY: u32 = 1 << 2;
    /// `const` field
    pub const LITERAL: u32 = 1 << 3;
    /// Field carries `[NonSerialized]`
    pub const NOT_SERIALIZED: u32 = 1 << 4;
    /// Field carries `[SerializeField]`
    pub const SERIALIZE_FIELD: u32 = 1 << 5;
    /// Field carries `[SerializeReference]`
    pub const SERIALIZE_REFERENCE: u32 = 1 << 6;
}

/// Reference to a type from a field, base type or generic argument
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A named type, optionally qualified by its assembly's simple name
    Named {
        /// Full name including namespace, e.g. `System.Int32`
        full_name: String,
        /// Assembly simple name when the reference is qualified
        assembly: Option<String>,
    },
    /// Generic parameter of the declaring type, by position
    GenericParam(u32),
    /// Instantiation of a generic definition
    Generic {
        /// The open generic definition
        definition: Box<TypeRef>,
        /// Type arguments in order
        args: Vec<TypeRef>,
    },
    /// Single-dimensional native array
    Array(Box<TypeRef>),
}

impl TypeRef {
    /// Unqualified named reference
    pub fn named(full_name: impl Into<String>) -> Self {
        TypeRef::Named {
            full_name: full_name.into(),
            assembly: None,
        }
    }

    /// Named reference qualified by an assembly
    pub fn qualified(full_name: impl Into<String>, assembly: impl Into<String>) -> Self {
        TypeRef::Named {
            full_name: full_name.into(),
            assembly: Some(assembly.into()),
        }
    }

    /// Generic parameter reference
    pub fn param(index: u32) -> Self {
        TypeRef::GenericParam(index)
    }

    /// Generic instantiation
    pub fn generic(definition: TypeRef, args: Vec<TypeRef>) -> Self {
        TypeRef::Generic {
            definition: Box::new(definition),
            args,
        }
    }

    /// Native array of `element`
    pub fn array(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    /// Full name of a named reference
    pub fn full_name(&self) -> Option<&str> {
        match self {
            TypeRef::Named { full_name, .. } => Some(full_name),
            _ => None,
        }
    }

    /// Whether this reference is a native array
    pub fn is_array(&self) -> bool {
        matches!(self, TypeRef::Array(_))
    }

    /// Whether any generic parameter appears in this reference
    pub fn has_generic_params(&self) -> bool {
        match self {
            TypeRef::Named { .. } => false,
            TypeRef::GenericParam(_) => true,
            TypeRef::Generic { definition, args } => {
                definition.has_generic_params() || args.iter().any(TypeRef::has_generic_params)
            }
            TypeRef::Array(element) => element.has_generic_params(),
        }
    }

    /// Largest generic parameter index used, if any
    pub fn max_param_index(&self) -> Option<u32> {
        match self {
            TypeRef::Named { .. } => None,
            TypeRef::GenericParam(index) => Some(*index),
            TypeRef::Generic { definition, args } => args
                .iter()
                .filter_map(TypeRef::max_param_index)
                .chain(definition.max_param_index())
                .max(),
            TypeRef::Array(element) => element.max_param_index(),
        }
    }

    /// Replace generic parameters with `args`
    ///
    /// Returns the index of the first parameter without a binding on failure.
    pub fn substitute(&self, args: &[TypeRef]) -> Result<TypeRef, u32> {
        match self {
            TypeRef::Named { .. } => Ok(self.clone()),
            TypeRef::GenericParam(index) => {
                args.get(*index as usize).cloned().ok_or(*index)
            }
            TypeRef::Generic {
                definition,
                args: inner,
            } => Ok(TypeRef::Generic {
                definition: Box::new(definition.substitute(args)?),
                args: inner
                    .iter()
                    .map(|arg| arg.substitute(args))
                    .collect::<Result<_, _>>()?,
            }),
            TypeRef::Array(element) => Ok(TypeRef::Array(Box::new(element.substitute(args)?))),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named {
                full_name,
                assembly: None,
            } => write!(f, "{}", full_name),
            TypeRef::Named {
                full_name,
                assembly: Some(assembly),
            } => write!(f, "{}, {}", full_name, assembly),
            TypeRef::GenericParam(index) => write!(f, "!{}", index),
            TypeRef::Generic { definition, args } => {
                write!(f, "{}[", definition)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "[{}]", arg)?;
                }
                write!(f, "]")
            }
            TypeRef::Array(element) => write!(f, "{}[]", element),
        }
    }
}

/// Field definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Declared field type
    pub ty: TypeRef,
    /// Field flags (see [`field_flags`])
    pub flags: u32,
}

impl FieldDef {
    /// Create a public instance field
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            flags: field_flags::PUBLIC,
        }
    }

    /// Whether the field is static
    pub fn is_static(&self) -> bool {
        self.flags & field_flags::STATIC != 0
    }

    /// Check a flag
    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

/// Type definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    /// Namespace (empty for the global namespace)
    pub namespace: String,
    /// Simple name, including a generic arity suffix such as ``List`1``
    pub name: String,
    /// Kind of the type
    pub kind: TypeKind,
    /// Type flags (see [`type_flags`])
    pub flags: u32,
    /// Base type, `None` at the root of the inheritance chain
    pub base: Option<TypeRef>,
    /// Generic parameter names in order
    pub generic_params: Vec<String>,
    /// Fields in declaration order
    pub fields: Vec<FieldDef>,
    /// Full name of the underlying integer type for enums
    pub enum_underlying: Option<String>,
}

impl TypeDef {
    /// Create an empty type definition
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            kind,
            flags: 0,
            base: None,
            generic_params: Vec::new(),
            fields: Vec::new(),
            enum_underlying: None,
        }
    }

    /// Namespace-qualified name
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Whether `full_name` names this type, without allocating
    pub fn matches_full_name(&self, full_name: &str) -> bool {
        if self.namespace.is_empty() {
            return self.name == full_name;
        }
        full_name.len() == self.namespace.len() + 1 + self.name.len()
            && full_name.starts_with(self.namespace.as_str())
            && full_name.as_bytes()[self.namespace.len()] == b'.'
            && full_name.ends_with(self.name.as_str())
    }

    /// Whether this is an enum
    pub fn is_enum(&self) -> bool {
        self.kind == TypeKind::Enum
    }

    /// Whether this is a value type
    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::Struct | TypeKind::Enum)
    }

    /// Whether this definition has generic parameters
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Check a flag
    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    /// Instance fields in declaration order
    pub fn instance_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|field| !field.is_static())
    }
}

/// A loaded assembly's metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyDef {
    /// Assembly simple name, e.g. `Assembly-CSharp`
    pub name: String,
    /// Type definitions in metadata order
    pub types: Vec<TypeDef>,
}

impl AssemblyDef {
    /// Create an empty assembly
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
        }
    }

    /// Find a type by full name (linear scan)
    pub fn find_type(&self, full_name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|ty| ty.matches_full_name(full_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name() {
        let ty = TypeDef::new("Game.Items", "Sword", TypeKind::Class);
        assert_eq!(ty.full_name(), "Game.Items.Sword");
        assert!(ty.matches_full_name("Game.Items.Sword"));
        assert!(!ty.matches_full_name("Game.ItemsXSword"));
        assert!(!ty.matches_full_name("Game.Items.Swords"));

        let global = TypeDef::new("", "Global", TypeKind::Struct);
        assert_eq!(global.full_name(), "Global");
        assert!(global.matches_full_name("Global"));
    }

    #[test]
    fn test_substitute_generic_params() {
        let field_ty = TypeRef::generic(
            TypeRef::named("System.Collections.Generic.List`1"),
            vec![TypeRef::param(1)],
        );
        let bound = field_ty
            .substitute(&[TypeRef::named("System.String"), TypeRef::named("System.Int32")])
            .unwrap();
        assert_eq!(
            bound,
            TypeRef::generic(
                TypeRef::named("System.Collections.Generic.List`1"),
                vec![TypeRef::named("System.Int32")],
            )
        );
        assert!(!bound.has_generic_params());
    }

    #[test]
    fn test_substitute_missing_binding() {
        let field_ty = TypeRef::array(TypeRef::param(2));
        assert_eq!(field_ty.substitute(&[TypeRef::named("A")]), Err(2));
        assert_eq!(field_ty.max_param_index(), Some(2));
    }

    #[test]
    fn test_instance_fields_skip_static() {
        let mut ty = TypeDef::new("", "Counter", TypeKind::Class);
        ty.fields.push(FieldDef::new("value", TypeRef::named("System.Int32")));
        let mut shared = FieldDef::new("instances", TypeRef::named("System.Int32"));
        shared.flags |= field_flags::STATIC;
        ty.fields.push(shared);

        let names: Vec<_> = ty.instance_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["value"]);
    }

    #[test]
    fn test_type_ref_display() {
        let ty = TypeRef::generic(
            TypeRef::named("Wrapper`1"),
            vec![TypeRef::qualified("Game.Item", "Assembly-CSharp")],
        );
        assert_eq!(ty.to_string(), "Wrapper`1[[Game.Item, Assembly-CSharp]]");
        assert_eq!(TypeRef::array(TypeRef::param(0)).to_string(), "!0[]");
    }
}
