//! Loaded assemblies of one generator

use crate::error::{GeneratorError, Result};
use rustc_hash::FxHashMap;
use typetree_metadata::{AssemblyDef, TypeDef, TypeRef};

/// Reference to a type definition inside an [`AssemblySet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeHandle {
    /// Assembly index in load order
    pub assembly: usize,
    /// Type index within the assembly
    pub index: usize,
}

/// Base chains longer than this are treated as cyclic
const MAX_BASE_CHAIN: usize = 256;

/// Assemblies in load order with a name index
///
/// The set never shrinks. Lookup maps are only used for finding things;
/// anything that produces output walks the vectors in order.
#[derive(Debug, Default)]
pub struct AssemblySet {
    assemblies: Vec<AssemblyDef>,
    by_name: FxHashMap<String, usize>,
    type_index: Vec<FxHashMap<String, usize>>,
}

impl AssemblySet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of loaded assemblies
    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    /// Whether nothing is loaded
    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }

    /// Add an assembly, rejecting duplicate names
    pub fn insert(&mut self, assembly: AssemblyDef) -> Result<usize> {
        if self.by_name.contains_key(&assembly.name) {
            return Err(GeneratorError::DuplicateAssembly {
                name: assembly.name,
            });
        }

        let index = self.assemblies.len();
        let types = assembly
            .types
            .iter()
            .enumerate()
            .map(|(i, ty)| (ty.full_name(), i))
            .collect();
        self.by_name.insert(assembly.name.clone(), index);
        self.type_index.push(types);
        self.assemblies.push(assembly);
        Ok(index)
    }

    /// Assembly names in load order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assemblies.iter().map(|a| a.name.as_str())
    }

    /// Index of a loaded assembly
    pub fn assembly_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Assembly by index
    pub fn assembly(&self, index: usize) -> &AssemblyDef {
        &self.assemblies[index]
    }

    /// Type definition behind a handle
    pub fn get(&self, handle: TypeHandle) -> &TypeDef {
        &self.assemblies[handle.assembly].types[handle.index]
    }

    /// Name of the assembly a handle points into
    pub fn assembly_name(&self, handle: TypeHandle) -> &str {
        &self.assemblies[handle.assembly].name
    }

    /// Find a type in one assembly
    pub fn find_in(&self, assembly: usize, full_name: &str) -> Option<TypeHandle> {
        let index = *self.type_index.get(assembly)?.get(full_name)?;
        Some(TypeHandle { assembly, index })
    }

    /// Find a type, trying `preferred` first and then every assembly in load order
    pub fn find_any(&self, full_name: &str, preferred: Option<usize>) -> Option<TypeHandle> {
        if let Some(handle) = preferred.and_then(|a| self.find_in(a, full_name)) {
            return Some(handle);
        }
        (0..self.assemblies.len())
            .filter(|&a| Some(a) != preferred)
            .find_map(|a| self.find_in(a, full_name))
    }

    /// Resolve a named reference as seen from `context`
    ///
    /// A qualifier naming a loaded assembly is searched first; otherwise (or
    /// when that misses) the context assembly and then all others.
    pub fn resolve_name(
        &self,
        full_name: &str,
        assembly: Option<&str>,
        context: usize,
    ) -> Option<TypeHandle> {
        if let Some(index) = assembly.and_then(|name| self.assembly_index(name)) {
            if let Some(handle) = self.find_in(index, full_name) {
                return Some(handle);
            }
        }
        self.find_any(full_name, Some(context))
    }

    /// Resolve a type by assembly name and full name
    pub fn resolve_type(&self, assembly_name: &str, full_name: &str) -> Result<TypeHandle> {
        let assembly =
            self.assembly_index(assembly_name)
                .ok_or_else(|| GeneratorError::AssemblyNotLoaded {
                    name: assembly_name.to_string(),
                })?;
        self.find_in(assembly, full_name)
            .ok_or_else(|| GeneratorError::type_not_found(assembly_name, full_name))
    }

    /// Resolve the definition a type reference names, ignoring type arguments
    pub fn resolve_ref(&self, ty: &TypeRef, context: usize) -> Option<TypeHandle> {
        match ty {
            TypeRef::Named {
                full_name,
                assembly,
            } => self.resolve_name(full_name, assembly.as_deref(), context),
            TypeRef::Generic { definition, .. } => self.resolve_ref(definition, context),
            TypeRef::GenericParam(_) | TypeRef::Array(_) => None,
        }
    }

    /// Whether any base in the chain of `handle` satisfies `pred`
    ///
    /// The chain is followed by name through loaded assemblies; it ends at a
    /// base that does not resolve.
    pub fn inherits_from(&self, handle: TypeHandle, pred: impl Fn(&str) -> bool) -> bool {
        let mut current = handle;
        for _ in 0..MAX_BASE_CHAIN {
            let Some(base) = &self.get(current).base else {
                return false;
            };
            let Some(name) = base_definition_name(base) else {
                return false;
            };
            if pred(name) {
                return true;
            }
            match self.resolve_ref(base, current.assembly) {
                Some(next) => current = next,
                None => return false,
            }
        }
        false
    }

    /// All type handles in load and declaration order
    pub fn handles(&self) -> impl Iterator<Item = TypeHandle> + '_ {
        self.assemblies
            .iter()
            .enumerate()
            .flat_map(|(assembly, def)| {
                (0..def.types.len()).map(move |index| TypeHandle { assembly, index })
            })
    }
}

/// Full name of the definition a base reference points at
pub fn base_definition_name(base: &TypeRef) -> Option<&str> {
    match base {
        TypeRef::Named { full_name, .. } => Some(full_name),
        TypeRef::Generic { definition, .. } => base_definition_name(definition),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use typetree_metadata::AssemblyBuilder;

    fn two_assemblies() -> AssemblySet {
        let mut set = AssemblySet::new();
        set.insert(
            AssemblyBuilder::new("Core")
                .class("Shared", "Item", |t| t)
                .class("Shared", "Unit", |t| t.base(TypeRef::named("UnityEngine.MonoBehaviour")))
                .build(),
        )
        .unwrap();
        set.insert(
            AssemblyBuilder::new("Game")
                .class("Shared", "Item", |t| t)
                .class("Game", "Hero", |t| t.base(TypeRef::named("Shared.Unit")))
                .build(),
        )
        .unwrap();
        set
    }

    #[test]
    fn test_duplicate_assembly_rejected() {
        let mut set = two_assemblies();
        let result = set.insert(AssemblyBuilder::new("Core").build());
        assert!(matches!(
            result,
            Err(GeneratorError::DuplicateAssembly { ref name }) if name == "Core"
        ));
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["Core", "Game"]);
    }

    #[test]
    fn test_resolve_type_errors() {
        let set = two_assemblies();
        assert!(matches!(
            set.resolve_type("Missing", "Shared.Item"),
            Err(GeneratorError::AssemblyNotLoaded { .. })
        ));
        assert!(matches!(
            set.resolve_type("Core", "Game.Hero"),
            Err(GeneratorError::TypeNotFound { .. })
        ));
        assert_eq!(
            set.resolve_type("Game", "Game.Hero").unwrap(),
            TypeHandle {
                assembly: 1,
                index: 1
            }
        );
    }

    #[test]
    fn test_resolve_name_prefers_context_then_qualifier() {
        let set = two_assemblies();
        assert_eq!(set.resolve_name("Shared.Item", None, 1).unwrap().assembly, 1);
        assert_eq!(set.resolve_name("Shared.Item", None, 0).unwrap().assembly, 0);
        assert_eq!(
            set.resolve_name("Shared.Item", Some("Core"), 1)
                .unwrap()
                .assembly,
            0
        );
        assert_eq!(
            set.resolve_name("Shared.Unit", Some("NotLoaded"), 1)
                .unwrap()
                .assembly,
            0
        );
    }

    #[test]
    fn test_inherits_across_assemblies() {
        let set = two_assemblies();
        let hero = set.resolve_type("Game", "Game.Hero").unwrap();
        assert!(set.inherits_from(hero, |name| name == "UnityEngine.MonoBehaviour"));
        let item = set.resolve_type("Core", "Shared.Item").unwrap();
        assert!(!set.inherits_from(item, |name| name == "UnityEngine.MonoBehaviour"));
    }

    #[test]
    fn test_handles_in_load_order() {
        let set = two_assemblies();
        let names: Vec<_> = set.handles().map(|h| set.get(h).full_name()).collect();
        assert_eq!(
            names,
            vec!["Shared.Item", "Shared.Unit", "Shared.Item", "Game.Hero"]
        );
    }
}
