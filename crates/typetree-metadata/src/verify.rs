//! Metadata verification
//!
//! Structural checks run on every assembly after decoding, before the
//! engine ever sees it.

use crate::model::{AssemblyDef, TypeDef, TypeKind, TypeRef};
use rustc_hash::FxHashSet;

/// Metadata verification errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// Assembly has no name
    #[error("Assembly name is empty")]
    EmptyAssemblyName,

    /// Type has no name
    #[error("Type #{index} has an empty name")]
    EmptyTypeName {
        /// Position of the type in the assembly
        index: usize,
    },

    /// Two types share a full name
    #[error("Duplicate type {0}")]
    DuplicateType(String),

    /// Field has no name
    #[error("Type {type_name} has a field with an empty name")]
    EmptyFieldName {
        /// Full name of the declaring type
        type_name: String,
    },

    /// Two fields of one type share a name
    #[error("Duplicate field {field} in type {type_name}")]
    DuplicateField {
        /// Full name of the declaring type
        type_name: String,
        /// Field name
        field: String,
    },

    /// A type reference uses a generic parameter the type does not declare
    #[error("Generic parameter !{index} out of range in {type_name} (arity {arity})")]
    GenericParamOutOfRange {
        /// Full name of the declaring type
        type_name: String,
        /// Parameter index used
        index: u32,
        /// Declared arity
        arity: usize,
    },

    /// Enum without an underlying integer type
    #[error("Enum {0} has no underlying type")]
    MissingEnumUnderlying(String),

    /// Enum declaring generic parameters
    #[error("Enum {0} cannot be generic")]
    GenericEnum(String),
}

/// Verify an assembly's metadata
pub fn verify_assembly(assembly: &AssemblyDef) -> Result<(), VerifyError> {
    if assembly.name.is_empty() {
        return Err(VerifyError::EmptyAssemblyName);
    }

    let mut seen = FxHashSet::default();
    for (index, ty) in assembly.types.iter().enumerate() {
        if ty.name.is_empty() {
            return Err(VerifyError::EmptyTypeName { index });
        }
        let full_name = ty.full_name();
        if !seen.insert(full_name.clone()) {
            return Err(VerifyError::DuplicateType(full_name));
        }
        verify_type(ty, &full_name)?;
    }

    Ok(())
}

/// Verify a single type definition
fn verify_type(ty: &TypeDef, full_name: &str) -> Result<(), VerifyError> {
    if ty.kind == TypeKind::Enum {
        if ty.enum_underlying.is_none() {
            return Err(VerifyError::MissingEnumUnderlying(full_name.to_string()));
        }
        if ty.is_generic() {
            return Err(VerifyError::GenericEnum(full_name.to_string()));
        }
    }

    let arity = ty.generic_params.len();
    if let Some(base) = &ty.base {
        check_params(base, full_name, arity)?;
    }

    let mut names = FxHashSet::default();
    for field in &ty.fields {
        if field.name.is_empty() {
            return Err(VerifyError::EmptyFieldName {
                type_name: full_name.to_string(),
            });
        }
        if !names.insert(field.name.as_str()) {
            return Err(VerifyError::DuplicateField {
                type_name: full_name.to_string(),
                field: field.name.clone(),
            });
        }
        check_params(&field.ty, full_name, arity)?;
    }

    Ok(())
}

fn check_params(ty: &TypeRef, type_name: &str, arity: usize) -> Result<(), VerifyError> {
    match ty.max_param_index() {
        Some(index) if index as usize >= arity => Err(VerifyError::GenericParamOutOfRange {
            type_name: type_name.to_string(),
            index,
            arity,
        }),
        _ => Ok(()),
    }
}
