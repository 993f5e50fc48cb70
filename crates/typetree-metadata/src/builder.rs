//! Fluent construction of assembly metadata
//!
//! ```
//! use typetree_metadata::{AssemblyBuilder, TypeRef};
//!
//! let assembly = AssemblyBuilder::new("Assembly-CSharp")
//!     .class("Game", "Player", |t| {
//!         t.base(TypeRef::named("UnityEngine.MonoBehaviour"))
//!             .field("health", TypeRef::named("System.Int32"))
//!     })
//!     .build();
//! assert_eq!(assembly.types.len(), 1);
//! ```

use crate::model::{field_flags, type_flags, AssemblyDef, FieldDef, TypeDef, TypeKind, TypeRef};

/// Builder for an [`AssemblyDef`]
#[derive(Debug, Clone)]
pub struct AssemblyBuilder {
    assembly: AssemblyDef,
}

impl AssemblyBuilder {
    /// Start a new assembly
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            assembly: AssemblyDef::new(name),
        }
    }

    /// Add a `[Serializable]` class
    pub fn class(
        self,
        namespace: &str,
        name: &str,
        f: impl FnOnce(TypeBuilder) -> TypeBuilder,
    ) -> Self {
        self.with_type(namespace, name, TypeKind::Class, type_flags::SERIALIZABLE, f)
    }

    /// Add a struct
    pub fn structure(
        self,
        namespace: &str,
        name: &str,
        f: impl FnOnce(TypeBuilder) -> TypeBuilder,
    ) -> Self {
        self.with_type(namespace, name, TypeKind::Struct, type_flags::SERIALIZABLE, f)
    }

    /// Add an enum with the given underlying integer type
    pub fn enumeration(mut self, namespace: &str, name: &str, underlying: &str) -> Self {
        let mut ty = TypeDef::new(namespace, name, TypeKind::Enum);
        ty.enum_underlying = Some(underlying.to_string());
        self.assembly.types.push(ty);
        self
    }

    /// Add an interface
    pub fn interface(mut self, namespace: &str, name: &str) -> Self {
        let mut ty = TypeDef::new(namespace, name, TypeKind::Interface);
        ty.flags = type_flags::ABSTRACT;
        self.assembly.types.push(ty);
        self
    }

    /// Add a prebuilt type definition
    pub fn type_def(mut self, ty: TypeDef) -> Self {
        self.assembly.types.push(ty);
        self
    }

    fn with_type(
        mut self,
        namespace: &str,
        name: &str,
        kind: TypeKind,
        flags: u32,
        f: impl FnOnce(TypeBuilder) -> TypeBuilder,
    ) -> Self {
        let mut ty = TypeDef::new(namespace, name, kind);
        ty.flags = flags;
        self.assembly.types.push(f(TypeBuilder { ty }).ty);
        self
    }

    /// Finish and return the assembly
    pub fn build(self) -> AssemblyDef {
        self.assembly
    }

    /// Finish and encode as a metadata image
    pub fn build_image(self) -> Vec<u8> {
        self.assembly.encode_image()
    }
}

/// Builder for a single [`TypeDef`]
#[derive(Debug, Clone)]
pub struct TypeBuilder {
    ty: TypeDef,
}

impl TypeBuilder {
    /// Set the base type
    pub fn base(mut self, base: TypeRef) -> Self {
        self.ty.base = Some(base);
        self
    }

    /// Declare a generic parameter
    pub fn generic_param(mut self, name: &str) -> Self {
        self.ty.generic_params.push(name.to_string());
        self
    }

    /// Add type flags
    pub fn flags(mut self, flags: u32) -> Self {
        self.ty.flags |= flags;
        self
    }

    /// Clear type flags
    pub fn clear_flags(mut self, flags: u32) -> Self {
        self.ty.flags &= !flags;
        self
    }

    /// Add a public instance field
    pub fn field(mut self, name: &str, ty: TypeRef) -> Self {
        self.ty.fields.push(FieldDef::new(name, ty));
        self
    }

    /// Add a field with explicit flags
    pub fn field_with(mut self, name: &str, ty: TypeRef, flags: u32) -> Self {
        self.ty.fields.push(FieldDef {
            name: name.to_string(),
            ty,
            flags,
        });
        self
    }

    /// Add a private `[SerializeField]` field
    pub fn serialized_private(self, name: &str, ty: TypeRef) -> Self {
        self.field_with(name, ty, field_flags::SERIALIZE_FIELD)
    }

    /// Add a public static field
    pub fn static_field(self, name: &str, ty: TypeRef) -> Self {
        self.field_with(name, ty, field_flags::PUBLIC | field_flags::STATIC)
    }
}
