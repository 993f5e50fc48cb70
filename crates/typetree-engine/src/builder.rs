//! Tree builder
//!
//! Expands a resolved type into the pre-order node sequence the engine's
//! serializer would produce. Expansion order for every value:
//!
//! 1. alias table hit: one leaf
//! 2. enum: one leaf typed as the underlying integer
//! 3. native array or ``List`1``: `vector` wrapper plus a `data` element
//! 4. engine object reference: `PPtr<$Type>` with file and path IDs
//! 5. anything else: base members, then own fields, one level deeper
//!
//! Cycles and runaway generic growth fail the whole build with
//! [`GeneratorError::RecursionLimitExceeded`]; no partial tree escapes.

use crate::alias::{
    is_collection, is_engine_object_name, is_engine_root, is_script_base, meta_flags,
    simple_name, AliasDescriptor, AliasTable,
};
use crate::assembly_set::{AssemblySet, TypeHandle};
use crate::error::{GeneratorError, Result};
use crate::node::TypeTreeNode;
use crate::options::GeneratorOptions;
use crate::profile::EngineProfile;
use crate::resolver::ResolvedType;
use typetree_metadata::{field_flags, type_flags, FieldDef, TypeKind, TypeRef};

/// Byte size of a `PPtr` node
pub const PPTR_SIZE: i32 = 12;

/// Root node name
pub const ROOT_NAME: &str = "Base";

/// Array element node name
pub const ARRAY_DATA_NAME: &str = "data";

/// Array wrapper type name
pub const ARRAY_TYPE_NAME: &str = "vector";

/// Builds type trees for one generator
pub struct TreeBuilder<'a> {
    set: &'a AssemblySet,
    profile: &'a EngineProfile,
    options: &'a GeneratorOptions,
    aliases: &'static AliasTable,
    nodes: Vec<TypeTreeNode>,
    /// `(definition, arguments)` of every composite and flattened base
    /// currently being expanded
    in_progress: Vec<(TypeHandle, Vec<TypeRef>)>,
    max_depth: usize,
}

impl<'a> TreeBuilder<'a> {
    /// Create a builder
    pub fn new(
        set: &'a AssemblySet,
        profile: &'a EngineProfile,
        options: &'a GeneratorOptions,
    ) -> Self {
        Self {
            set,
            profile,
            options,
            aliases: AliasTable::global(),
            nodes: Vec::new(),
            in_progress: Vec::new(),
            max_depth: options.depth_limit(),
        }
    }

    /// Build the flat node sequence for a resolved type
    pub fn build(mut self, resolved: &ResolvedType) -> Result<Vec<TypeTreeNode>> {
        self.expand(ROOT_NAME, &resolved.ty, 0, resolved.assembly, true)?;
        Ok(self.nodes)
    }

    fn push(&mut self, node: TypeTreeNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn recursion_error(&self, ty: &TypeRef, level: i32) -> GeneratorError {
        GeneratorError::RecursionLimitExceeded {
            type_name: ty.to_string(),
            depth: level as usize,
        }
    }

    /// Expand one value of type `ty` at `level`
    fn expand(
        &mut self,
        name: &str,
        ty: &TypeRef,
        level: i32,
        context: usize,
        is_root: bool,
    ) -> Result<()> {
        if level as usize > self.max_depth {
            return Err(self.recursion_error(ty, level));
        }

        match ty {
            TypeRef::GenericParam(index) => Err(GeneratorError::UnboundGenericParameter {
                type_name: name.to_string(),
                index: *index,
            }),
            TypeRef::Array(element) => self.emit_array(name, element, level, context),
            TypeRef::Generic { definition, args } => {
                let definition_name = definition.full_name().unwrap_or_default();
                if is_collection(definition_name, args.len()) {
                    return self.emit_array(name, &args[0], level, context);
                }
                let handle = self.set.resolve_ref(definition, context).ok_or_else(|| {
                    GeneratorError::type_not_found(self.set.assembly(context).name.as_str(), definition_name)
                })?;
                self.emit_definition(name, handle, args.clone(), level, is_root)
            }
            TypeRef::Named {
                full_name,
                assembly,
            } => {
                if let Some(alias) = self.aliases.lookup(full_name, self.profile) {
                    self.emit_leaf(name, &alias, level);
                    return Ok(());
                }
                match self.set.resolve_name(full_name, assembly.as_deref(), context) {
                    Some(handle) => self.emit_definition(name, handle, Vec::new(), level, is_root),
                    None if !is_root && is_engine_object_name(full_name) => {
                        self.emit_pptr(name, simple_name(full_name), level);
                        Ok(())
                    }
                    None => Err(GeneratorError::type_not_found(
                        assembly
                            .as_deref()
                            .unwrap_or(self.set.assembly(context).name.as_str()),
                        full_name.as_str(),
                    )),
                }
            }
        }
    }

    fn emit_definition(
        &mut self,
        name: &str,
        handle: TypeHandle,
        args: Vec<TypeRef>,
        level: i32,
        is_root: bool,
    ) -> Result<()> {
        let set = self.set;
        let def = set.get(handle);
        if def.generic_params.len() != args.len() {
            return Err(GeneratorError::invalid_type_name(
                def.full_name(),
                format!(
                    "expects {} type arguments, got {}",
                    def.generic_params.len(),
                    args.len()
                ),
            ));
        }

        if def.kind == TypeKind::Enum {
            let alias = def
                .enum_underlying
                .as_deref()
                .and_then(|underlying| self.aliases.lookup(underlying, self.profile))
                .unwrap_or(AliasDescriptor {
                    type_name: "int",
                    byte_size: 4,
                    is_array: false,
                    align: false,
                });
            self.emit_leaf(name, &alias, level);
            return Ok(());
        }

        if !is_root && set.inherits_from(handle, is_engine_object_name) {
            self.emit_pptr(name, &def.name, level);
            return Ok(());
        }

        self.emit_composite(name, handle, args, level, is_root)
    }

    fn emit_leaf(&mut self, name: &str, alias: &AliasDescriptor, level: i32) {
        self.push(TypeTreeNode::new(
            alias.type_name,
            name,
            level,
            alias.meta_flag(),
            alias.byte_size,
        ));
    }

    fn emit_array(&mut self, name: &str, element: &TypeRef, level: i32, context: usize) -> Result<()> {
        let index = self.push(TypeTreeNode::new(
            ARRAY_TYPE_NAME,
            name,
            level,
            meta_flags::IS_ARRAY | meta_flags::ALIGN_BYTES,
            -1,
        ));
        self.expand(ARRAY_DATA_NAME, element, level + 1, context, false)?;
        self.close(index, false);
        Ok(())
    }

    fn emit_pptr(&mut self, name: &str, target: &str, level: i32) {
        self.push(TypeTreeNode::new(
            format!("PPtr<${}>", target),
            name,
            level,
            0,
            PPTR_SIZE,
        ));
        self.push(TypeTreeNode::new("int", "m_FileID", level + 1, 0, 4));
        self.push(TypeTreeNode::new("SInt64", "m_PathID", level + 1, 0, 8));
    }

    fn emit_composite(
        &mut self,
        name: &str,
        handle: TypeHandle,
        args: Vec<TypeRef>,
        level: i32,
        is_root: bool,
    ) -> Result<()> {
        let set = self.set;
        let def = set.get(handle);
        let type_name = if is_root && set.inherits_from(handle, is_script_base) {
            "MonoBehaviour".to_string()
        } else {
            def.name.clone()
        };

        let index = self.push(TypeTreeNode::new(type_name, name, level, 0, -1));
        self.enter(handle, args.clone(), level)?;
        let result = self.emit_members(handle, &args, level + 1);
        self.in_progress.pop();
        result?;
        self.close(index, true);
        Ok(())
    }

    /// Push a definition onto the expansion stack
    ///
    /// Fails on an exact repeat, or once nested composites and flattened
    /// bases together reach the depth bound. Base flattening does not
    /// advance `level`, so a base chain that keeps growing its generic
    /// arguments is only caught by the second check.
    fn enter(&mut self, handle: TypeHandle, args: Vec<TypeRef>, level: i32) -> Result<()> {
        let key = (handle, args);
        if self.in_progress.len() >= self.max_depth || self.in_progress.contains(&key) {
            let definition =
                TypeRef::qualified(self.set.get(handle).full_name(), self.set.assembly_name(handle));
            let ty = if key.1.is_empty() {
                definition
            } else {
                TypeRef::generic(definition, key.1)
            };
            return Err(self.recursion_error(&ty, level));
        }
        self.in_progress.push(key);
        Ok(())
    }

    /// Emit inherited members followed by the type's own fields
    fn emit_members(&mut self, handle: TypeHandle, args: &[TypeRef], level: i32) -> Result<()> {
        let set = self.set;
        let def = set.get(handle);

        if let Some(base) = &def.base {
            let base = self.bind(base, args, handle)?;
            if let Some((base_handle, base_args)) = self.base_definition(&base, handle)? {
                self.enter(base_handle, base_args.clone(), level)?;
                let result = self.emit_members(base_handle, &base_args, level);
                self.in_progress.pop();
                result?;
            }
        }

        for field in def.instance_fields() {
            if !self.is_serialized_field(field) {
                continue;
            }
            let ty = self.bind(&field.ty, args, handle)?;
            if self.options.respect_serialization_attributes
                && !self.is_serializable_type(&ty, handle.assembly)
            {
                tracing::trace!(field = %field.name, ty = %ty, "skipping unserializable field");
                continue;
            }
            self.expand(&field.name, &ty, level, handle.assembly, false)?;
        }

        Ok(())
    }

    /// Resolve a base reference, or `None` when flattening stops there
    fn base_definition(
        &self,
        base: &TypeRef,
        derived: TypeHandle,
    ) -> Result<Option<(TypeHandle, Vec<TypeRef>)>> {
        let (definition, args) = match base {
            TypeRef::Generic { definition, args } => (definition.as_ref(), args.clone()),
            other => (other, Vec::new()),
        };
        let Some(name) = definition.full_name() else {
            return Ok(None);
        };
        if is_engine_root(name) {
            return Ok(None);
        }
        let handle = self
            .set
            .resolve_ref(definition, derived.assembly)
            .ok_or_else(|| GeneratorError::type_not_found(self.set.assembly_name(derived), name))?;
        Ok(Some((handle, args)))
    }

    /// Substitute generic parameters and qualify names as seen from `owner`
    fn bind(&self, ty: &TypeRef, args: &[TypeRef], owner: TypeHandle) -> Result<TypeRef> {
        let bound = ty
            .substitute(args)
            .map_err(|index| GeneratorError::UnboundGenericParameter {
                type_name: self.set.get(owner).full_name(),
                index,
            })?;
        Ok(self.qualify(bound, owner.assembly))
    }

    /// Pin every resolvable name to its assembly so the reference means the
    /// same thing when carried into another assembly's generic type
    fn qualify(&self, ty: TypeRef, context: usize) -> TypeRef {
        match ty {
            TypeRef::Named {
                full_name,
                assembly,
            } => {
                if self.aliases.contains(&full_name) {
                    return TypeRef::Named {
                        full_name,
                        assembly,
                    };
                }
                match self.set.resolve_name(&full_name, assembly.as_deref(), context) {
                    Some(handle) => TypeRef::Named {
                        full_name,
                        assembly: Some(self.set.assembly_name(handle).to_string()),
                    },
                    None => TypeRef::Named {
                        full_name,
                        assembly,
                    },
                }
            }
            TypeRef::Generic { definition, args } => TypeRef::Generic {
                definition: Box::new(self.qualify(*definition, context)),
                args: args
                    .into_iter()
                    .map(|arg| self.qualify(arg, context))
                    .collect(),
            },
            TypeRef::Array(element) => TypeRef::Array(Box::new(self.qualify(*element, context))),
            param @ TypeRef::GenericParam(_) => param,
        }
    }

    fn is_serialized_field(&self, field: &FieldDef) -> bool {
        if field.is_static() {
            return false;
        }
        if !self.options.respect_serialization_attributes {
            return true;
        }
        if field.has_flag(field_flags::LITERAL)
            || field.has_flag(field_flags::INIT_ONLY)
            || field.has_flag(field_flags::NOT_SERIALIZED)
        {
            return false;
        }
        field.has_flag(field_flags::PUBLIC)
            || field.has_flag(field_flags::SERIALIZE_FIELD)
            || field.has_flag(field_flags::SERIALIZE_REFERENCE)
    }

    /// Whether the engine would serialize a field of this type at all
    fn is_serializable_type(&self, ty: &TypeRef, context: usize) -> bool {
        match ty {
            TypeRef::GenericParam(_) => true,
            TypeRef::Array(element) => self.is_serializable_type(element, context),
            TypeRef::Generic { definition, args }
                if is_collection(definition.full_name().unwrap_or_default(), args.len()) =>
            {
                self.is_serializable_type(&args[0], context)
            }
            TypeRef::Generic { definition, .. } => self.is_serializable_type(definition, context),
            TypeRef::Named {
                full_name,
                assembly,
            } => {
                if self.aliases.contains(full_name) || is_engine_object_name(full_name) {
                    return true;
                }
                let Some(handle) = self.set.resolve_name(full_name, assembly.as_deref(), context)
                else {
                    // Other runtime types (dictionaries, delegates, object)
                    // are never serialized; anything else fails resolution later
                    return !full_name.starts_with("System.");
                };
                let def = self.set.get(handle);
                match def.kind {
                    TypeKind::Interface => false,
                    TypeKind::Enum | TypeKind::Struct => true,
                    TypeKind::Class => {
                        def.has_flag(type_flags::SERIALIZABLE)
                            || self.set.inherits_from(handle, is_engine_object_name)
                    }
                }
            }
        }
    }

    /// Fill in size and child-alignment flags once a subtree is complete
    fn close(&mut self, index: usize, sum_sizes: bool) {
        let level = self.nodes[index].level;
        let mut any_aligned = false;
        let mut total: Option<i32> = Some(0);

        for child in self.nodes[index + 1..]
            .iter()
            .take_while(|node| node.level > level)
        {
            if child.meta_flag & (meta_flags::ALIGN_BYTES | meta_flags::ANY_CHILD_USES_ALIGN_BYTES)
                != 0
            {
                any_aligned = true;
            }
            if child.level == level + 1 {
                total = match (total, child.byte_size) {
                    (Some(sum), size) if size >= 0 => sum.checked_add(size),
                    _ => None,
                };
            }
        }

        let node = &mut self.nodes[index];
        if any_aligned {
            node.meta_flag |= meta_flags::ANY_CHILD_USES_ALIGN_BYTES;
        }
        if sum_sizes {
            node.byte_size = total.unwrap_or(-1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{GeneratorBackend, UnityVersion};
    use crate::resolver::Resolver;
    use typetree_metadata::AssemblyBuilder;

    fn profile() -> EngineProfile {
        EngineProfile::new(
            "2021.3.5f1".parse::<UnityVersion>().unwrap(),
            GeneratorBackend::AssetStudio,
        )
    }

    fn build(set: &AssemblySet, name: &str) -> Result<Vec<TypeTreeNode>> {
        let options = GeneratorOptions::default();
        let profile = profile();
        let resolved = Resolver::new(set).resolve("Game", name)?;
        TreeBuilder::new(set, &profile, &options).build(&resolved)
    }

    fn shape(nodes: &[TypeTreeNode]) -> Vec<(String, String, i32)> {
        nodes
            .iter()
            .map(|n| (n.type_name.clone(), n.name.clone(), n.level))
            .collect()
    }

    fn owned(rows: &[(&str, &str, i32)]) -> Vec<(String, String, i32)> {
        rows.iter()
            .map(|(t, n, l)| (t.to_string(), n.to_string(), *l))
            .collect()
    }

    #[test]
    fn test_struct_sizes_and_alignment() {
        let mut set = AssemblySet::new();
        set.insert(
            AssemblyBuilder::new("Game")
                .structure("Game", "Packed", |t| {
                    t.field("a", TypeRef::named("System.Int32"))
                        .field("b", TypeRef::named("System.Single"))
                })
                .structure("Game", "Flagged", |t| {
                    t.field("on", TypeRef::named("System.Boolean"))
                        .field("count", TypeRef::named("System.Int64"))
                })
                .build(),
        )
        .unwrap();

        let packed = build(&set, "Game.Packed").unwrap();
        assert_eq!(packed[0].byte_size, 8);
        assert_eq!(packed[0].meta_flag, 0);

        let flagged = build(&set, "Game.Flagged").unwrap();
        assert_eq!(flagged[0].byte_size, 9);
        assert_eq!(
            flagged[0].meta_flag,
            meta_flags::ANY_CHILD_USES_ALIGN_BYTES
        );
        assert_eq!(flagged[1].meta_flag, meta_flags::ALIGN_BYTES);
    }

    #[test]
    fn test_enum_fields_use_underlying_alias() {
        let mut set = AssemblySet::new();
        set.insert(
            AssemblyBuilder::new("Game")
                .enumeration("Game", "Team", "System.Byte")
                .type_def({
                    let mut ty = typetree_metadata::TypeDef::new("Game", "Mode", TypeKind::Enum);
                    ty.enum_underlying = None;
                    ty
                })
                .class("Game", "Unit", |t| {
                    t.field("team", TypeRef::named("Game.Team"))
                        .field("mode", TypeRef::named("Game.Mode"))
                })
                .build(),
        )
        .unwrap();

        let nodes = build(&set, "Game.Unit").unwrap();
        assert_eq!(
            shape(&nodes),
            owned(&[("Unit", "Base", 0), ("UInt8", "team", 1), ("int", "mode", 1)])
        );

        let root_enum = build(&set, "Game.Team").unwrap();
        assert_eq!(shape(&root_enum), owned(&[("UInt8", "Base", 0)]));
    }

    #[test]
    fn test_engine_object_fields_become_pptr() {
        let mut set = AssemblySet::new();
        set.insert(
            AssemblyBuilder::new("Game")
                .class("Game", "Spawner", |t| {
                    t.base(TypeRef::named("UnityEngine.MonoBehaviour"))
                        .field("target", TypeRef::named("UnityEngine.Transform"))
                        .field("ally", TypeRef::named("Game.Spawner"))
                })
                .build(),
        )
        .unwrap();

        let nodes = build(&set, "Game.Spawner").unwrap();
        assert_eq!(
            shape(&nodes),
            owned(&[
                ("MonoBehaviour", "Base", 0),
                ("PPtr<$Transform>", "target", 1),
                ("int", "m_FileID", 2),
                ("SInt64", "m_PathID", 2),
                ("PPtr<$Spawner>", "ally", 1),
                ("int", "m_FileID", 2),
                ("SInt64", "m_PathID", 2),
            ])
        );
        assert_eq!(nodes[1].byte_size, PPTR_SIZE);
        assert_eq!(nodes[0].byte_size, 2 * PPTR_SIZE);
    }

    #[test]
    fn test_serialization_filter() {
        let mut set = AssemblySet::new();
        set.insert(
            AssemblyBuilder::new("Game")
                .interface("Game", "IDamageable")
                .class("Game", "Plain", |t| t.clear_flags(type_flags::SERIALIZABLE))
                .class("Game", "Unit", |t| {
                    t.field("shown", TypeRef::named("System.Int32"))
                        .field_with("hidden", TypeRef::named("System.Int32"), 0)
                        .serialized_private("kept", TypeRef::named("System.Int32"))
                        .field_with(
                            "skipped",
                            TypeRef::named("System.Int32"),
                            field_flags::PUBLIC | field_flags::NOT_SERIALIZED,
                        )
                        .field_with(
                            "constant",
                            TypeRef::named("System.Int32"),
                            field_flags::PUBLIC | field_flags::LITERAL,
                        )
                        .static_field("shared", TypeRef::named("System.Int32"))
                        .field("target", TypeRef::named("Game.IDamageable"))
                        .field("plain", TypeRef::named("Game.Plain"))
                        .field(
                            "lookup",
                            TypeRef::generic(
                                TypeRef::named("System.Collections.Generic.Dictionary`2"),
                                vec![TypeRef::named("System.Int32"), TypeRef::named("System.Int32")],
                            ),
                        )
                })
                .build(),
        )
        .unwrap();

        let nodes = build(&set, "Game.Unit").unwrap();
        let names: Vec<_> = nodes.iter().skip(1).map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["shown", "kept"]);

        let options = GeneratorOptions {
            respect_serialization_attributes: false,
            ..GeneratorOptions::default()
        };
        let profile = profile();
        let resolved = Resolver::new(&set).resolve("Game", "Game.Unit").unwrap();
        let result = TreeBuilder::new(&set, &profile, &options).build(&resolved);
        // Without the filter the dictionary has to be expanded and cannot be
        assert!(matches!(result, Err(GeneratorError::TypeNotFound { .. })));
    }

    #[test]
    fn test_direct_self_reference_is_rejected() {
        let mut set = AssemblySet::new();
        set.insert(
            AssemblyBuilder::new("Game")
                .class("Game", "Link", |t| t.field("next", TypeRef::named("Game.Link")))
                .build(),
        )
        .unwrap();

        assert!(matches!(
            build(&set, "Game.Link"),
            Err(GeneratorError::RecursionLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_cyclic_inheritance_is_rejected() {
        let mut set = AssemblySet::new();
        set.insert(
            AssemblyBuilder::new("Game")
                .class("Game", "A", |t| t.base(TypeRef::named("Game.B")))
                .class("Game", "B", |t| t.base(TypeRef::named("Game.A")))
                .build(),
        )
        .unwrap();

        assert!(matches!(
            build(&set, "Game.A"),
            Err(GeneratorError::RecursionLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_missing_base_aborts_build() {
        let mut set = AssemblySet::new();
        set.insert(
            AssemblyBuilder::new("Game")
                .class("Game", "Orphan", |t| {
                    t.base(TypeRef::named("ThirdParty.Missing"))
                        .field("x", TypeRef::named("System.Int32"))
                })
                .build(),
        )
        .unwrap();

        assert!(matches!(
            build(&set, "Game.Orphan"),
            Err(GeneratorError::TypeNotFound { .. })
        ));
    }
}
