//! Type resolution
//!
//! Turns an `(assembly, type name)` request into a fully qualified
//! [`TypeRef`] the tree builder can expand. Generic arguments are resolved
//! recursively and bound to the definition's parameters.

use crate::alias::{is_collection, AliasTable};
use crate::assembly_set::{AssemblySet, TypeHandle};
use crate::error::{GeneratorError, Result};
use crate::type_name::{self, TypeName};
use typetree_metadata::TypeRef;

/// A resolved tree root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    /// Root type with every loaded name qualified by its assembly
    pub ty: TypeRef,
    /// Assembly the request was made against
    pub assembly: usize,
    /// Definition of the root, `None` for aliases and collections
    pub handle: Option<TypeHandle>,
}

/// Resolves type names against an [`AssemblySet`]
pub struct Resolver<'a> {
    set: &'a AssemblySet,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over a set of loaded assemblies
    pub fn new(set: &'a AssemblySet) -> Self {
        Self { set }
    }

    /// Resolve `full_type_name` requested from `assembly_name`
    pub fn resolve(&self, assembly_name: &str, full_type_name: &str) -> Result<ResolvedType> {
        let assembly =
            self.set
                .assembly_index(assembly_name)
                .ok_or_else(|| GeneratorError::AssemblyNotLoaded {
                    name: assembly_name.to_string(),
                })?;

        let parsed = type_name::parse(full_type_name)?;
        if let Some(qualifier) = &parsed.assembly {
            if qualifier != assembly_name {
                return Err(GeneratorError::invalid_type_name(
                    full_type_name,
                    format!("qualified with {} but requested from {}", qualifier, assembly_name),
                ));
            }
        }

        let handle = self.root_handle(&parsed, assembly, assembly_name)?;
        let ty = self.bind(&parsed, handle, assembly, assembly_name)?;

        tracing::debug!(assembly = assembly_name, ty = %ty, "resolved type");
        Ok(ResolvedType {
            ty,
            assembly,
            handle,
        })
    }

    /// The root definition must live in the requested assembly
    fn root_handle(
        &self,
        parsed: &TypeName,
        assembly: usize,
        assembly_name: &str,
    ) -> Result<Option<TypeHandle>> {
        if self.is_builtin(parsed) {
            return Ok(None);
        }
        self.set
            .find_in(assembly, &parsed.name)
            .map(Some)
            .ok_or_else(|| GeneratorError::type_not_found(assembly_name, &parsed.name))
    }

    /// Resolve a generic argument, searching its qualifier or every assembly
    fn resolve_arg(&self, parsed: &TypeName, context: usize, requested: &str) -> Result<TypeRef> {
        let handle = if self.is_builtin(parsed) {
            None
        } else {
            let handle = self
                .set
                .resolve_name(&parsed.name, parsed.assembly.as_deref(), context)
                .ok_or_else(|| {
                    GeneratorError::type_not_found(
                        parsed.assembly.as_deref().unwrap_or(requested),
                        &parsed.name,
                    )
                })?;
            Some(handle)
        };
        self.bind(parsed, handle, context, requested)
    }

    fn is_builtin(&self, parsed: &TypeName) -> bool {
        (parsed.args.is_empty() && AliasTable::global().contains(&parsed.name))
            || is_collection(&parsed.name, parsed.args.len())
    }

    /// Build the qualified reference for a parsed name and its definition
    fn bind(
        &self,
        parsed: &TypeName,
        handle: Option<TypeHandle>,
        context: usize,
        requested: &str,
    ) -> Result<TypeRef> {
        let definition = match handle {
            Some(handle) => {
                let def = self.set.get(handle);
                let arity = def.generic_params.len();
                if arity != parsed.args.len() {
                    let reason = if parsed.args.is_empty() {
                        format!("open generic type needs {} type arguments", arity)
                    } else {
                        format!("expects {} type arguments, got {}", arity, parsed.args.len())
                    };
                    return Err(GeneratorError::invalid_type_name(parsed.to_string(), reason));
                }
                TypeRef::qualified(def.full_name(), self.set.assembly_name(handle))
            }
            None => TypeRef::named(parsed.name.clone()),
        };

        let mut ty = if parsed.args.is_empty() {
            definition
        } else {
            let args = parsed
                .args
                .iter()
                .map(|arg| self.resolve_arg(arg, context, requested))
                .collect::<Result<Vec<_>>>()?;
            TypeRef::generic(definition, args)
        };

        for _ in 0..parsed.array_rank {
            ty = TypeRef::array(ty);
        }
        Ok(ty)
    }
}
