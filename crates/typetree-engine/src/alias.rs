//! Built-in alias table
//!
//! Maps well-known primitive and engine value types to fixed serialization
//! descriptors. The table is built once and never mutated; entries that only
//! exist from a given engine version on are filtered per lookup.

use crate::profile::EngineProfile;
use rustc_hash::FxHashMap;
use std::sync::LazyLock;

/// Node meta flags
pub mod meta_flags {
    /// Stream is realigned to 4 bytes after this node
    pub const ALIGN_BYTES: i32 = 0x4000;
    /// Some descendant carries [`ALIGN_BYTES`]
    pub const ANY_CHILD_USES_ALIGN_BYTES: i32 = 0x8000;
    /// Node is an array wrapper (or a string)
    pub const IS_ARRAY: i32 = 0x4000_0000;
}

/// Fixed serialization layout of a built-in type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasDescriptor {
    /// Display type written to the node
    pub type_name: &'static str,
    /// Byte size, `-1` when variable
    pub byte_size: i32,
    /// Serialized as an array
    pub is_array: bool,
    /// Realigns the stream after the value
    pub align: bool,
}

impl AliasDescriptor {
    const fn fixed(type_name: &'static str, byte_size: i32) -> Self {
        Self {
            type_name,
            byte_size,
            is_array: false,
            align: false,
        }
    }

    const fn aligned(type_name: &'static str, byte_size: i32) -> Self {
        Self {
            type_name,
            byte_size,
            is_array: false,
            align: true,
        }
    }

    /// Meta flag bits for a node of this type
    pub fn meta_flag(&self) -> i32 {
        let mut flags = 0;
        if self.is_array {
            flags |= meta_flags::IS_ARRAY;
        }
        if self.align {
            flags |= meta_flags::ALIGN_BYTES;
        }
        flags
    }
}

#[derive(Debug, Clone, Copy)]
struct AliasEntry {
    descriptor: AliasDescriptor,
    /// First engine version (major, minor) that serializes the type natively
    since: Option<(u16, u16)>,
}

/// Immutable lookup from full type name to [`AliasDescriptor`]
#[derive(Debug)]
pub struct AliasTable {
    entries: FxHashMap<&'static str, AliasEntry>,
}

static ALIAS_TABLE: LazyLock<AliasTable> = LazyLock::new(AliasTable::builtin);

impl AliasTable {
    /// The process-wide built-in table
    pub fn global() -> &'static AliasTable {
        &ALIAS_TABLE
    }

    fn builtin() -> Self {
        let mut table = Self {
            entries: FxHashMap::default(),
        };

        // System primitives
        table.add("System.Boolean", AliasDescriptor::aligned("bool", 1));
        table.add("System.Byte", AliasDescriptor::aligned("UInt8", 1));
        table.add("System.SByte", AliasDescriptor::aligned("SInt8", 1));
        table.add("System.Char", AliasDescriptor::aligned("char", 2));
        table.add("System.Int16", AliasDescriptor::aligned("SInt16", 2));
        table.add("System.UInt16", AliasDescriptor::aligned("UInt16", 2));
        table.add("System.Int32", AliasDescriptor::fixed("int", 4));
        table.add("System.UInt32", AliasDescriptor::fixed("unsigned int", 4));
        table.add("System.Int64", AliasDescriptor::fixed("SInt64", 8));
        table.add("System.UInt64", AliasDescriptor::fixed("UInt64", 8));
        table.add("System.Single", AliasDescriptor::fixed("float", 4));
        table.add("System.Double", AliasDescriptor::fixed("double", 8));
        table.add(
            "System.String",
            AliasDescriptor {
                type_name: "string",
                byte_size: -1,
                is_array: true,
                align: true,
            },
        );

        // Engine value types
        table.add("UnityEngine.Vector2", AliasDescriptor::fixed("Vector2f", 8));
        table.add("UnityEngine.Vector3", AliasDescriptor::fixed("Vector3f", 12));
        table.add("UnityEngine.Vector4", AliasDescriptor::fixed("Vector4f", 16));
        table.add("UnityEngine.Quaternion", AliasDescriptor::fixed("Quaternionf", 16));
        table.add("UnityEngine.Color", AliasDescriptor::fixed("ColorRGBA", 16));
        table.add("UnityEngine.Color32", AliasDescriptor::fixed("ColorRGBA", 4));
        table.add("UnityEngine.Rect", AliasDescriptor::fixed("Rectf", 16));
        table.add("UnityEngine.Matrix4x4", AliasDescriptor::fixed("Matrix4x4f", 64));
        table.add("UnityEngine.Bounds", AliasDescriptor::fixed("AABB", 24));
        table.add("UnityEngine.LayerMask", AliasDescriptor::fixed("BitField", 4));
        table.add("UnityEngine.AnimationCurve", AliasDescriptor::fixed("AnimationCurve", -1));
        table.add("UnityEngine.Gradient", AliasDescriptor::fixed("Gradient", -1));

        // Integer vector types are serialized natively from 2017.2 on
        table.add_since("UnityEngine.Vector2Int", AliasDescriptor::fixed("int2_storage", 8), (2017, 2));
        table.add_since("UnityEngine.Vector3Int", AliasDescriptor::fixed("int3_storage", 12), (2017, 2));
        table.add_since("UnityEngine.RectInt", AliasDescriptor::fixed("RectInt", 16), (2017, 2));
        table.add_since("UnityEngine.BoundsInt", AliasDescriptor::fixed("BoundsInt", 24), (2017, 2));

        table
    }

    fn add(&mut self, full_name: &'static str, descriptor: AliasDescriptor) {
        self.entries.insert(
            full_name,
            AliasEntry {
                descriptor,
                since: None,
            },
        );
    }

    fn add_since(&mut self, full_name: &'static str, descriptor: AliasDescriptor, since: (u16, u16)) {
        self.entries.insert(
            full_name,
            AliasEntry {
                descriptor,
                since: Some(since),
            },
        );
    }

    /// Look up a full type name for the given profile
    pub fn lookup(&self, full_name: &str, profile: &EngineProfile) -> Option<AliasDescriptor> {
        let entry = self.entries.get(full_name)?;
        match entry.since {
            Some((major, minor)) if !profile.version.at_least(major, minor) => None,
            _ => Some(entry.descriptor),
        }
    }

    /// Whether the name is an alias under any profile
    pub fn contains(&self, full_name: &str) -> bool {
        self.entries.contains_key(full_name)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Final segment of a full type name (namespace and declaring type stripped)
pub fn simple_name(full_name: &str) -> &str {
    full_name
        .rsplit(['.', '+', '/'])
        .next()
        .unwrap_or(full_name)
}

/// Whether a generic instantiation or native array is a serialized collection
///
/// Collections are matched by shape rather than exact name: any definition
/// whose simple name is ``List`1`` taking exactly one argument.
pub fn is_collection(definition_full_name: &str, arg_count: usize) -> bool {
    arg_count == 1 && simple_name(definition_full_name) == "List`1"
}

const ENGINE_ROOTS: &[&str] = &[
    "System.Object",
    "System.ValueType",
    "System.Enum",
    "UnityEngine.Object",
    "UnityEngine.Component",
    "UnityEngine.Behaviour",
    "UnityEngine.MonoBehaviour",
    "UnityEngine.ScriptableObject",
];

/// Whether inheritance flattening stops at this base type
pub fn is_engine_root(full_name: &str) -> bool {
    ENGINE_ROOTS.contains(&full_name)
}

const ENGINE_OBJECTS: &[&str] = &[
    "UnityEngine.Object",
    "UnityEngine.GameObject",
    "UnityEngine.Component",
    "UnityEngine.Transform",
    "UnityEngine.RectTransform",
    "UnityEngine.Behaviour",
    "UnityEngine.MonoBehaviour",
    "UnityEngine.ScriptableObject",
    "UnityEngine.Camera",
    "UnityEngine.Light",
    "UnityEngine.Animator",
    "UnityEngine.Renderer",
    "UnityEngine.SpriteRenderer",
    "UnityEngine.MeshRenderer",
    "UnityEngine.Collider",
    "UnityEngine.Collider2D",
    "UnityEngine.Rigidbody",
    "UnityEngine.Rigidbody2D",
    "UnityEngine.AudioSource",
    "UnityEngine.AudioClip",
    "UnityEngine.AnimationClip",
    "UnityEngine.RuntimeAnimatorController",
    "UnityEngine.Texture",
    "UnityEngine.Texture2D",
    "UnityEngine.Sprite",
    "UnityEngine.Material",
    "UnityEngine.Shader",
    "UnityEngine.Mesh",
    "UnityEngine.Font",
    "UnityEngine.TextAsset",
    "UnityEngine.ParticleSystem",
];

/// Whether the name is a well-known engine object type
pub fn is_engine_object_name(full_name: &str) -> bool {
    ENGINE_OBJECTS.contains(&full_name)
}

/// Whether the name is one of the script base classes
pub fn is_script_base(full_name: &str) -> bool {
    matches!(
        full_name,
        "UnityEngine.MonoBehaviour" | "UnityEngine.ScriptableObject"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{GeneratorBackend, UnityVersion};

    fn profile(version: &str) -> EngineProfile {
        EngineProfile::new(
            version.parse::<UnityVersion>().unwrap(),
            GeneratorBackend::AssetStudio,
        )
    }

    #[test]
    fn test_primitive_lookup() {
        let table = AliasTable::global();
        let p = profile("2021.3.5f1");

        let int = table.lookup("System.Int32", &p).unwrap();
        assert_eq!(int.type_name, "int");
        assert_eq!(int.byte_size, 4);
        assert_eq!(int.meta_flag(), 0);

        let boolean = table.lookup("System.Boolean", &p).unwrap();
        assert_eq!(boolean.meta_flag(), meta_flags::ALIGN_BYTES);

        let string = table.lookup("System.String", &p).unwrap();
        assert_eq!(string.byte_size, -1);
        assert_eq!(
            string.meta_flag(),
            meta_flags::IS_ARRAY | meta_flags::ALIGN_BYTES
        );

        assert!(table.lookup("Game.Player", &p).is_none());
    }

    #[test]
    fn test_version_gated_entries() {
        let table = AliasTable::global();
        assert!(table.contains("UnityEngine.Vector2Int"));
        assert!(table
            .lookup("UnityEngine.Vector2Int", &profile("2017.1.5f1"))
            .is_none());
        assert_eq!(
            table
                .lookup("UnityEngine.Vector2Int", &profile("2017.2.0f3"))
                .unwrap()
                .type_name,
            "int2_storage"
        );
        assert!(table
            .lookup("UnityEngine.Vector3", &profile("5.6.7f1"))
            .is_some());
    }

    #[test]
    fn test_collection_shape() {
        assert!(is_collection("System.Collections.Generic.List`1", 1));
        assert!(!is_collection("System.Collections.Generic.List`1", 2));
        assert!(!is_collection("System.Collections.Generic.Dictionary`2", 2));
        assert!(!is_collection("Game.Listing`1", 1));
    }

    #[test]
    fn test_simple_name() {
        assert_eq!(simple_name("Game.Items.Sword"), "Sword");
        assert_eq!(simple_name("Outer+Inner"), "Inner");
        assert_eq!(simple_name("Global"), "Global");
    }

    #[test]
    fn test_engine_roots_and_objects() {
        assert!(is_engine_root("UnityEngine.MonoBehaviour"));
        assert!(is_engine_root("System.Object"));
        assert!(!is_engine_root("Game.BaseUnit"));
        assert!(is_engine_object_name("UnityEngine.Transform"));
        assert!(!is_engine_object_name("UnityEngine.Vector3"));
        assert!(is_script_base("UnityEngine.ScriptableObject"));
    }
}
