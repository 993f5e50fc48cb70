//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use typetree_engine::{EngineProfile, Generator, GeneratorOptions, TypeTreeNode};
use typetree_metadata::{field_flags, AssemblyBuilder, AssemblyDef, TypeRef};

pub const GAME: &str = "Assembly-CSharp";

pub fn int() -> TypeRef {
    TypeRef::named("System.Int32")
}

pub fn list_of(element: TypeRef) -> TypeRef {
    TypeRef::generic(
        TypeRef::named("System.Collections.Generic.List`1"),
        vec![element],
    )
}

/// Script classes, inheritance chains and generics used across tests
pub fn game_assembly() -> AssemblyDef {
    AssemblyBuilder::new(GAME)
        // Plain data
        .class("Game", "Stats", |t| {
            t.field("health", int())
                .field("speed", TypeRef::named("System.Single"))
                .field("name", TypeRef::named("System.String"))
                .field("alive", TypeRef::named("System.Boolean"))
        })
        // Inheritance chain: Entity <- Actor <- Hero
        .class("Game", "Entity", |t| {
            t.base(TypeRef::named("UnityEngine.MonoBehaviour"))
                .field("id", int())
        })
        .class("Game", "Actor", |t| {
            t.base(TypeRef::named("Game.Entity"))
                .field("position", TypeRef::named("UnityEngine.Vector3"))
        })
        .class("Game", "Hero", |t| {
            t.base(TypeRef::named("Game.Actor"))
                .field("level", int())
                .field("stats", TypeRef::named("Game.Stats"))
        })
        // Collections
        .class("Game", "Inventory", |t| {
            t.field("counts", list_of(int()))
                .field("tags", TypeRef::array(TypeRef::named("System.String")))
                .field("stats", list_of(TypeRef::named("Game.Stats")))
        })
        // Generics
        .class("Game", "Slot`1", |t| {
            t.generic_param("T")
                .field("item", TypeRef::param(0))
                .field("history", list_of(TypeRef::param(0)))
        })
        .class("Game", "Pair`2", |t| {
            t.generic_param("K")
                .generic_param("V")
                .field("key", TypeRef::param(0))
                .field("value", TypeRef::param(1))
        })
        .class("Game", "IntSlotBase", |t| {
            t.base(TypeRef::generic(TypeRef::named("Game.Slot`1"), vec![int()]))
                .field("extra", int())
        })
        // Self-referential generic: Nest<T> holds Nest<List<T>>
        .class("Game", "Nest`1", |t| {
            t.generic_param("T").field(
                "inner",
                TypeRef::generic(TypeRef::named("Game.Nest`1"), vec![list_of(TypeRef::param(0))]),
            )
        })
        .class("Game", "Settings", |t| {
            t.base(TypeRef::named("UnityEngine.ScriptableObject"))
                .field("volume", TypeRef::named("System.Single"))
                .field_with("cache", int(), field_flags::PUBLIC | field_flags::NOT_SERIALIZED)
        })
        .build()
}

pub fn profile() -> EngineProfile {
    EngineProfile::parse("2021.3.5f1", "AssetStudio").unwrap()
}

pub fn loaded_generator() -> Generator {
    let mut generator = Generator::new(profile(), GeneratorOptions::default());
    generator
        .load_assembly(&game_assembly().encode_image())
        .expect("fixture assembly loads");
    generator
}

/// `(type, name, level)` triples
pub fn shape(nodes: &[TypeTreeNode]) -> Vec<(&str, &str, i32)> {
    nodes
        .iter()
        .map(|n| (n.type_name.as_str(), n.name.as_str(), n.level))
        .collect()
}
