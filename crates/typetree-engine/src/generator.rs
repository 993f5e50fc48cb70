//! Type tree generator
//!
//! A [`Generator`] owns one set of loaded assemblies, the engine profile
//! it was created for and a cache of finished trees.

use crate::alias::is_script_base;
use crate::assembly_set::AssemblySet;
use crate::builder::TreeBuilder;
use crate::error::Result;
use crate::node::TypeTreeNode;
use crate::options::GeneratorOptions;
use crate::profile::EngineProfile;
use crate::resolver::{ResolvedType, Resolver};
use crate::serialize::{self, NodeRecord};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use typetree_metadata::{type_flags, ImageProvider, MetadataProvider, TypeKind};

/// Generator for one set of assemblies
pub struct Generator {
    profile: EngineProfile,
    options: GeneratorOptions,
    provider: Arc<dyn MetadataProvider>,
    assemblies: AssemblySet,
    cache: FxHashMap<(String, String), Vec<TypeTreeNode>>,
}

impl Generator {
    /// Create a generator using the metadata image provider
    pub fn new(profile: EngineProfile, options: GeneratorOptions) -> Self {
        Self::with_provider(profile, options, Arc::new(ImageProvider::new()))
    }

    /// Create a generator with a custom metadata provider
    pub fn with_provider(
        profile: EngineProfile,
        options: GeneratorOptions,
        provider: Arc<dyn MetadataProvider>,
    ) -> Self {
        tracing::debug!(
            version = %profile.version,
            backend = %profile.backend,
            provider = provider.name(),
            "created generator"
        );
        Self {
            profile,
            options,
            provider,
            assemblies: AssemblySet::new(),
            cache: FxHashMap::default(),
        }
    }

    /// Engine profile
    pub fn profile(&self) -> &EngineProfile {
        &self.profile
    }

    /// Generation options
    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Loaded assemblies
    pub fn assemblies(&self) -> &AssemblySet {
        &self.assemblies
    }

    /// Load an assembly from bytes, returning its name
    pub fn load_assembly(&mut self, bytes: &[u8]) -> Result<String> {
        let assembly = self.provider.load_assembly(bytes)?;
        let name = assembly.name.clone();
        let types = assembly.types.len();
        self.assemblies.insert(assembly)?;
        self.cache.clear();
        tracing::debug!(assembly = %name, types, "loaded assembly");
        Ok(name)
    }

    /// Load an assembly file
    pub fn load_path(&mut self, path: impl AsRef<Path>) -> Result<String> {
        let bytes = std::fs::read(path.as_ref())?;
        self.load_assembly(&bytes)
    }

    /// Load every assembly file in a directory, in sorted path order
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<Vec<String>> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_file() && self.options.matches_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut names = Vec::with_capacity(paths.len());
        for path in paths {
            names.push(self.load_path(&path)?);
        }
        Ok(names)
    }

    /// Loaded assembly names in load order
    pub fn loaded_names(&self) -> Vec<&str> {
        self.assemblies.names().collect()
    }

    /// Loaded assembly names joined with commas
    pub fn loaded_names_joined(&self) -> String {
        self.loaded_names().join(",")
    }

    /// Resolve a type name without building its tree
    pub fn resolve(&self, assembly_name: &str, full_type_name: &str) -> Result<ResolvedType> {
        Resolver::new(&self.assemblies).resolve(assembly_name, full_type_name)
    }

    /// Generate the flat node sequence for a type
    pub fn generate(&mut self, assembly_name: &str, full_type_name: &str) -> Result<Vec<TypeTreeNode>> {
        let key = (assembly_name.to_string(), full_type_name.to_string());
        if let Some(nodes) = self.cache.get(&key) {
            tracing::debug!(assembly = assembly_name, ty = full_type_name, "tree cache hit");
            return Ok(nodes.clone());
        }

        let resolved = self.resolve(assembly_name, full_type_name)?;
        let nodes = TreeBuilder::new(&self.assemblies, &self.profile, &self.options).build(&resolved)?;
        tracing::debug!(
            assembly = assembly_name,
            ty = full_type_name,
            nodes = nodes.len(),
            "generated type tree"
        );

        if self.options.cache_trees {
            self.cache.insert(key, nodes.clone());
        }
        Ok(nodes)
    }

    /// Generate a type tree as JSON
    pub fn generate_json(&mut self, assembly_name: &str, full_type_name: &str) -> Result<String> {
        let nodes = self.generate(assembly_name, full_type_name)?;
        serialize::to_json(&nodes)
    }

    /// Generate a type tree as records
    pub fn generate_records(
        &mut self,
        assembly_name: &str,
        full_type_name: &str,
    ) -> Result<Vec<NodeRecord>> {
        let nodes = self.generate(assembly_name, full_type_name)?;
        Ok(serialize::to_records(&nodes))
    }

    /// Number of cached trees
    pub fn cached_trees(&self) -> usize {
        self.cache.len()
    }

    /// `(assembly, full name)` of every concrete script class
    ///
    /// A script class is a non-abstract, non-generic class whose base chain
    /// reaches `MonoBehaviour` or `ScriptableObject`.
    pub fn mono_behaviour_definitions(&self) -> Vec<(String, String)> {
        self.assemblies
            .handles()
            .filter(|&handle| {
                let def = self.assemblies.get(handle);
                def.kind == TypeKind::Class
                    && !def.has_flag(type_flags::ABSTRACT)
                    && !def.is_generic()
                    && self.assemblies.inherits_from(handle, is_script_base)
            })
            .map(|handle| {
                (
                    self.assemblies.assembly_name(handle).to_string(),
                    self.assemblies.get(handle).full_name(),
                )
            })
            .collect()
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("profile", &self.profile)
            .field("provider", &self.provider.name())
            .field("assemblies", &self.loaded_names())
            .field("cached_trees", &self.cache.len())
            .finish()
    }
}
