//! Integration tests for the metadata image format

use typetree_metadata::{
    field_flags, verify_assembly, AssemblyBuilder, AssemblyDef, ImageError, ImageProvider,
    MetadataError, MetadataProvider, TypeKind, TypeRef,
};

fn game_assembly() -> AssemblyDef {
    AssemblyBuilder::new("Assembly-CSharp")
        .class("Game", "Wrapper`1", |t| {
            t.generic_param("T")
                .field("value", TypeRef::param(0))
                .field(
                    "history",
                    TypeRef::generic(
                        TypeRef::named("System.Collections.Generic.List`1"),
                        vec![TypeRef::param(0)],
                    ),
                )
        })
        .class("Game", "Player", |t| {
            t.base(TypeRef::qualified(
                "UnityEngine.MonoBehaviour",
                "UnityEngine.CoreModule",
            ))
            .field("speed", TypeRef::named("System.Single"))
            .field(
                "scores",
                TypeRef::generic(
                    TypeRef::named("Game.Wrapper`1"),
                    vec![TypeRef::named("System.Int32")],
                ),
            )
            .field_with(
                "cached",
                TypeRef::array(TypeRef::named("System.Byte")),
                field_flags::NOT_SERIALIZED | field_flags::PUBLIC,
            )
        })
        .enumeration("Game", "Faction", "System.UInt16")
        .build()
}

#[test]
fn test_encode_and_load_through_provider() {
    let assembly = game_assembly();
    let bytes = assembly.encode_image();
    assert!(bytes.len() > 16);

    let loaded = ImageProvider::new()
        .load_assembly(&bytes)
        .expect("Failed to load image");
    assert_eq!(loaded.name, "Assembly-CSharp");
    assert_eq!(loaded.types.len(), 3);

    let player = loaded.find_type("Game.Player").unwrap();
    assert_eq!(player.kind, TypeKind::Class);
    assert_eq!(player.fields.len(), 3);
    assert_eq!(player.fields[1].ty.to_string(), "Game.Wrapper`1[[System.Int32]]");
    assert!(player.fields[2].has_flag(field_flags::NOT_SERIALIZED));
}

#[test]
fn test_encoding_is_deterministic() {
    let first = game_assembly().encode_image();
    let second = game_assembly().encode_image();
    assert_eq!(first, second);
}

#[test]
fn test_truncated_images_fail_cleanly() {
    let bytes = game_assembly().encode_image();
    for len in [0, 3, 15, 16, 20, bytes.len() / 2, bytes.len() - 1] {
        let result = AssemblyDef::decode_image(&bytes[..len]);
        assert!(result.is_err(), "prefix of {} bytes decoded", len);
    }
}

#[test]
fn test_corrupted_payload_detected() {
    let mut bytes = game_assembly().encode_image();
    let last = bytes.len() - 1;
    bytes[last] = bytes[last].wrapping_add(1);

    let result = ImageProvider::new().load_assembly(&bytes);
    assert!(matches!(
        result,
        Err(MetadataError::Image(ImageError::ChecksumMismatch { .. }))
    ));
}

#[test]
fn test_verifier_accepts_builder_output() {
    assert!(verify_assembly(&game_assembly()).is_ok());
}
