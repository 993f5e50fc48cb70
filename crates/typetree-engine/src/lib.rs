//! Type tree generation engine
//!
//! Given loaded managed assemblies, resolves a type by name and lays out
//! its serialized fields as a leveled node sequence:
//!
//! - [`alias`]: built-in primitive and engine value type descriptors
//! - [`type_name`] and [`resolver`]: generic type name parsing and resolution
//! - [`builder`]: the recursive tree expansion
//! - [`serialize`]: JSON and record output
//! - [`generator`] and [`registry`]: per-handle state and the handle table
//! - [`export`]: compressed dumps of every script class tree

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod alias;
pub mod assembly_set;
pub mod builder;
pub mod error;
pub mod export;
pub mod generator;
pub mod node;
pub mod options;
pub mod profile;
pub mod registry;
pub mod resolver;
pub mod serialize;
pub mod type_name;

pub use alias::{meta_flags, AliasDescriptor, AliasTable};
pub use assembly_set::{AssemblySet, TypeHandle};
pub use builder::TreeBuilder;
pub use error::{GeneratorError, Result, StatusCode};
pub use export::{read_export, write_export, ExportedAssembly, ExportedTrees};
pub use generator::Generator;
pub use node::{validate_levels, TypeTree, TypeTreeNode};
pub use options::GeneratorOptions;
pub use profile::{EngineProfile, GeneratorBackend, UnityVersion};
pub use registry::{GeneratorRegistry, HandleId, HandleTable};
pub use resolver::{ResolvedType, Resolver};
pub use serialize::{from_json, to_json, to_records, NodeRecord};
pub use type_name::TypeName;
