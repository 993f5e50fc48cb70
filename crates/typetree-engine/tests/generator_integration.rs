//! Generator lifecycle, loading, registry and export tests

mod common;

use common::{game_assembly, loaded_generator, profile, shape, GAME};
use std::fs;
use std::sync::Arc;
use typetree_engine::{
    read_export, write_export, Generator, GeneratorError, GeneratorOptions, GeneratorRegistry,
    HandleId, StatusCode,
};
use typetree_metadata::{AssemblyBuilder, TypeRef};

fn plugin_image(name: &str) -> Vec<u8> {
    AssemblyBuilder::new(name)
        .class("Plugin", "Door", |t| {
            t.base(TypeRef::named("UnityEngine.MonoBehaviour"))
                .field("target", TypeRef::qualified("Game.Hero", GAME))
                .field("owner", TypeRef::named("UnityEngine.GameObject"))
        })
        .build_image()
}

#[test]
fn test_script_references_become_pptrs() {
    let mut generator = loaded_generator();
    generator.load_assembly(&plugin_image("Plugin")).unwrap();

    let nodes = generator.generate("Plugin", "Plugin.Door").unwrap();
    assert_eq!(
        shape(&nodes),
        vec![
            ("MonoBehaviour", "Base", 0),
            ("PPtr<$Hero>", "target", 1),
            ("int", "m_FileID", 2),
            ("SInt64", "m_PathID", 2),
            ("PPtr<$GameObject>", "owner", 1),
            ("int", "m_FileID", 2),
            ("SInt64", "m_PathID", 2),
        ]
    );
    assert_eq!(nodes[1].byte_size, 12);
}

#[test]
fn test_cross_assembly_generic_argument() {
    let mut generator = loaded_generator();
    generator.load_assembly(&plugin_image("Plugin")).unwrap();

    let nodes = generator
        .generate(GAME, "Game.Slot`1[[Game.Stats, Assembly-CSharp]]")
        .unwrap();
    assert_eq!(nodes[1].type_name, "Stats");

    // Root must come from the requested assembly
    assert!(matches!(
        generator.generate("Plugin", "Game.Stats"),
        Err(GeneratorError::TypeNotFound { .. })
    ));
}

#[test]
fn test_loaded_names_keep_load_order() {
    let mut generator = loaded_generator();
    generator.load_assembly(&plugin_image("Zeta")).unwrap();
    generator.load_assembly(&plugin_image("Alpha")).unwrap();
    assert_eq!(generator.loaded_names(), vec![GAME, "Zeta", "Alpha"]);
    assert_eq!(generator.loaded_names_joined(), "Assembly-CSharp,Zeta,Alpha");
}

#[test]
fn test_load_dir_sorted_and_filtered() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b_game.dll"), game_assembly().encode_image()).unwrap();
    fs::write(dir.path().join("a_plugin.DLL"), plugin_image("Plugin")).unwrap();
    fs::write(dir.path().join("readme.txt"), b"not an assembly").unwrap();
    fs::create_dir(dir.path().join("nested.dll")).unwrap();

    let mut generator = Generator::new(profile(), GeneratorOptions::default());
    let names = generator.load_dir(dir.path()).unwrap();
    assert_eq!(names, vec!["Plugin".to_string(), GAME.to_string()]);
    assert_eq!(generator.assemblies().len(), 2);
}

#[test]
fn test_load_path_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut generator = Generator::new(profile(), GeneratorOptions::default());
    let err = generator.load_path(dir.path().join("missing.dll")).unwrap_err();
    assert_eq!(err.status(), StatusCode::Io);
}

#[test]
fn test_failed_load_leaves_state_untouched() {
    let mut generator = loaded_generator();
    let mut image = plugin_image("Plugin");
    let last = image.len() - 1;
    image[last] ^= 0xff;

    let err = generator.load_assembly(&image).unwrap_err();
    assert_eq!(err.status(), StatusCode::MalformedInput);
    assert_eq!(generator.loaded_names(), vec![GAME]);

    let err = generator
        .load_assembly(&game_assembly().encode_image())
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::DuplicateAssembly);
}

#[test]
fn test_mono_behaviour_definitions_in_load_order() {
    let mut generator = loaded_generator();
    generator.load_assembly(&plugin_image("Plugin")).unwrap();

    let definitions = generator.mono_behaviour_definitions();
    let expected: Vec<(String, String)> = [
        (GAME, "Game.Entity"),
        (GAME, "Game.Actor"),
        (GAME, "Game.Hero"),
        (GAME, "Game.Settings"),
        ("Plugin", "Plugin.Door"),
    ]
    .iter()
    .map(|(a, t)| (a.to_string(), t.to_string()))
    .collect();
    assert_eq!(definitions, expected);
}

#[test]
fn test_export_round_trip() {
    let mut generator = loaded_generator();
    generator.load_assembly(&plugin_image("Plugin")).unwrap();

    let bytes = write_export(&mut generator).unwrap();
    let trees = read_export(&bytes).unwrap();
    assert_eq!(trees.len(), 5);
    assert_eq!(trees.assemblies().len(), 2);

    let hero = trees.get(GAME, "Game.Hero").unwrap();
    assert_eq!(hero.node.type_name, "MonoBehaviour");
    let stats = hero.child("stats").unwrap();
    assert_eq!(stats.children.len(), 4);

    let expected = generator.generate(GAME, "Game.Hero").unwrap();
    assert_eq!(shape(&hero.flatten()), shape(&expected));
}

#[test]
fn test_registry_lifecycle_with_loads() {
    let registry = GeneratorRegistry::new();
    let id = registry.create("2021.3.5f1", "AssetStudio").unwrap();
    let raw = id.to_raw();

    let image = game_assembly().encode_image();
    let id = HandleId::from_raw(raw).unwrap();
    registry.with(id, |g| g.load_assembly(&image)).unwrap();
    let json = registry
        .with(id, |g| g.generate_json(GAME, "Game.Stats"))
        .unwrap();
    assert!(json.starts_with(r#"[{"m_Type":"Stats","m_Name":"Base","m_Level":0"#));

    registry.destroy(id).unwrap();
    let err = registry
        .with(id, |g| g.generate_json(GAME, "Game.Stats"))
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::InvalidHandle);

    // A new generator reusing the slot does not answer to the old ID
    let fresh = registry.create("2021.3.5f1", "AssetStudio").unwrap();
    assert_ne!(fresh.to_raw(), raw);
    assert!(!registry.is_alive(id));
    assert!(registry.is_alive(fresh));
}

#[test]
fn test_registry_parallel_generation() {
    let registry = Arc::new(GeneratorRegistry::new());
    let image = Arc::new(game_assembly().encode_image());

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let image = Arc::clone(&image);
            std::thread::spawn(move || {
                let id = registry.create("2021.3.5f1", "AssetStudio").unwrap();
                registry.with(id, |g| g.load_assembly(&image)).unwrap();
                let json = registry
                    .with(id, |g| g.generate_json(GAME, "Game.Hero"))
                    .unwrap();
                registry.destroy(id).unwrap();
                json
            })
        })
        .collect();

    let outputs: Vec<String> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
    assert!(registry.is_empty());
}
