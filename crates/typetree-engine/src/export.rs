//! Type tree export dump
//!
//! Generates the tree of every script class a generator knows about and
//! writes them into one compressed file, so a consumer can look trees up
//! without loading any assemblies.
//!
//! Layout: magic `"TTEX"`, `u32` version, then a zlib stream holding
//! `u32` assembly count; per assembly its name and `u32` type count; per
//! type its full name and `u32` node count; per node name, type, `u8`
//! level and `i32` flags.

use crate::error::{GeneratorError, Result};
use crate::generator::Generator;
use crate::node::{TypeTree, TypeTreeNode};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rustc_hash::FxHashMap;
use std::io::{Read, Write};
use typetree_metadata::{DecodeError, ImageReader, ImageWriter};

/// Magic number for export dumps: "TTEX"
pub const EXPORT_MAGIC: [u8; 4] = *b"TTEX";

/// Current export version
pub const EXPORT_VERSION: u32 = 1;

/// Largest decompressed payload [`read_export`] accepts
pub const MAX_EXPORT_PAYLOAD: u64 = 256 * 1024 * 1024;

/// Trees of one assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedAssembly {
    /// Assembly name
    pub name: String,
    /// `(full type name, tree)` in export order
    pub types: Vec<(String, TypeTree)>,
}

/// Decoded export dump
#[derive(Debug, Clone, Default)]
pub struct ExportedTrees {
    assemblies: Vec<ExportedAssembly>,
    index: FxHashMap<(String, String), (usize, usize)>,
}

impl ExportedTrees {
    fn push(&mut self, assembly: ExportedAssembly) {
        let a = self.assemblies.len();
        for (t, (full_name, _)) in assembly.types.iter().enumerate() {
            self.index
                .insert((assembly.name.clone(), full_name.clone()), (a, t));
        }
        self.assemblies.push(assembly);
    }

    /// Look up a tree by assembly and full type name
    pub fn get(&self, assembly: &str, full_name: &str) -> Option<&TypeTree> {
        let &(a, t) = self
            .index
            .get(&(assembly.to_string(), full_name.to_string()))?;
        Some(&self.assemblies[a].types[t].1)
    }

    /// Exported assemblies in order
    pub fn assemblies(&self) -> &[ExportedAssembly] {
        &self.assemblies
    }

    /// Total number of exported trees
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether nothing was exported
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Generate and encode the trees of every script class
///
/// Types that fail to generate are skipped with a warning.
pub fn write_export(generator: &mut Generator) -> Result<Vec<u8>> {
    let mut grouped: Vec<(String, Vec<(String, Vec<TypeTreeNode>)>)> = Vec::new();
    for (assembly, full_name) in generator.mono_behaviour_definitions() {
        let nodes = match generator.generate(&assembly, &full_name) {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::warn!(%assembly, ty = %full_name, error = %e, "skipping type in export");
                continue;
            }
        };
        match grouped.last_mut() {
            Some((name, types)) if *name == assembly => types.push((full_name, nodes)),
            _ => grouped.push((assembly, vec![(full_name, nodes)])),
        }
    }

    let mut writer = ImageWriter::new();
    writer.emit_u32(grouped.len() as u32);
    for (assembly, types) in &grouped {
        writer.emit_string(assembly);
        writer.emit_u32(types.len() as u32);
        for (full_name, nodes) in types {
            writer.emit_string(full_name);
            writer.emit_u32(nodes.len() as u32);
            for node in nodes {
                let level = u8::try_from(node.level).map_err(|_| {
                    GeneratorError::Export(format!(
                        "node {} of {} is nested too deeply ({})",
                        node.name, full_name, node.level
                    ))
                })?;
                writer.emit_string(&node.name);
                writer.emit_string(&node.type_name);
                writer.emit_u8(level);
                writer.emit_i32(node.meta_flag);
            }
        }
    }

    let mut out = Vec::new();
    out.extend_from_slice(&EXPORT_MAGIC);
    out.extend_from_slice(&EXPORT_VERSION.to_le_bytes());
    let mut encoder = ZlibEncoder::new(out, Compression::default());
    encoder.write_all(writer.buffer())?;
    let out = encoder.finish()?;

    tracing::debug!(
        assemblies = grouped.len(),
        bytes = out.len(),
        "wrote type tree export"
    );
    Ok(out)
}

/// Inflate a zlib stream, failing once it grows past `limit` bytes
fn inflate(stream: &[u8], limit: u64) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    ZlibDecoder::new(stream)
        .take(limit + 1)
        .read_to_end(&mut payload)
        .map_err(|e| GeneratorError::Export(format!("corrupt export stream: {}", e)))?;
    if payload.len() as u64 > limit {
        return Err(GeneratorError::Export(format!(
            "export payload exceeds {} bytes",
            limit
        )));
    }
    Ok(payload)
}

fn export_error(e: DecodeError) -> GeneratorError {
    GeneratorError::Export(e.to_string())
}

/// Decode an export dump
///
/// Byte sizes are not part of the dump and come back as `-1`.
pub fn read_export(data: &[u8]) -> Result<ExportedTrees> {
    if data.len() < 8 || data[..4] != EXPORT_MAGIC {
        return Err(GeneratorError::Export("not a type tree export".to_string()));
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != EXPORT_VERSION {
        return Err(GeneratorError::Export(format!(
            "unsupported export version {}",
            version
        )));
    }

    let payload = inflate(&data[8..], MAX_EXPORT_PAYLOAD)?;
    let mut reader = ImageReader::new(&payload);
    let mut trees = ExportedTrees::default();

    let assembly_count = reader.read_count(8).map_err(export_error)?;
    for _ in 0..assembly_count {
        let name = reader.read_string().map_err(export_error)?;
        let type_count = reader.read_count(8).map_err(export_error)?;
        let mut types = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            let full_name = reader.read_string().map_err(export_error)?;
            // name + type lengths, level, flags
            let node_count = reader.read_count(13).map_err(export_error)?;
            let mut nodes = Vec::with_capacity(node_count);
            for _ in 0..node_count {
                let node_name = reader.read_string().map_err(export_error)?;
                let type_name = reader.read_string().map_err(export_error)?;
                let level = reader.read_u8().map_err(export_error)?;
                let meta_flag = reader.read_i32().map_err(export_error)?;
                nodes.push(TypeTreeNode::new(type_name, node_name, level as i32, meta_flag, -1));
            }
            let tree = TypeTree::from_flat(&nodes).ok_or_else(|| {
                GeneratorError::Export(format!("invalid node levels for {}", full_name))
            })?;
            types.push((full_name, tree));
        }
        trees.push(ExportedAssembly { name, types });
    }

    if reader.has_more() {
        return Err(GeneratorError::Export(format!(
            "{} trailing bytes",
            reader.remaining()
        )));
    }
    Ok(trees)
}
