//! Metadata image format
//!
//! A compact binary container for an [`AssemblyDef`]. Layout:
//! - Header: magic (4 bytes) + version (u32) + flags (u32) + checksum (u32)
//! - Assembly name
//! - Type table (namespace, name, kind, flags, base, generic params,
//!   enum underlying type, fields)
//!
//! The checksum is the CRC32 of everything after the header.

use crate::encoder::{DecodeError, ImageReader, ImageWriter};
use crate::model::{AssemblyDef, FieldDef, TypeDef, TypeKind, TypeRef};
use thiserror::Error;

/// Magic number for metadata images: "TTMD"
pub const MAGIC: [u8; 4] = *b"TTMD";

/// Current image version
pub const VERSION: u32 = 1;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 16;

/// Maximum nesting of type references accepted by the decoder
pub const MAX_TYPE_REF_DEPTH: usize = 64;

/// Image flags
pub mod flags {
    /// Image was produced from a real assembly rather than hand-built
    pub const FROM_ASSEMBLY: u32 = 1 << 0;
}

const TAG_NAMED: u8 = 0;
const TAG_GENERIC_PARAM: u8 = 1;
const TAG_GENERIC: u8 = 2;
const TAG_ARRAY: u8 = 3;

/// Image encoding/decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    /// Decode error
    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected TTMD, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Checksum stored in the header
        expected: u32,
        /// Checksum computed over the payload
        actual: u32,
    },

    /// Unconsumed bytes after the type table
    #[error("{0} trailing bytes after metadata")]
    TrailingBytes(usize),
}

fn encode_type_ref(ty: &TypeRef, writer: &mut ImageWriter) {
    match ty {
        TypeRef::Named {
            full_name,
            assembly,
        } => {
            writer.emit_u8(TAG_NAMED);
            writer.emit_string(full_name);
            writer.emit_opt_string(assembly.as_deref());
        }
        TypeRef::GenericParam(index) => {
            writer.emit_u8(TAG_GENERIC_PARAM);
            writer.emit_u32(*index);
        }
        TypeRef::Generic { definition, args } => {
            writer.emit_u8(TAG_GENERIC);
            encode_type_ref(definition, writer);
            writer.emit_u32(args.len() as u32);
            for arg in args {
                encode_type_ref(arg, writer);
            }
        }
        TypeRef::Array(element) => {
            writer.emit_u8(TAG_ARRAY);
            encode_type_ref(element, writer);
        }
    }
}

fn decode_type_ref(reader: &mut ImageReader<'_>, depth: usize) -> Result<TypeRef, DecodeError> {
    let offset = reader.position();
    if depth >= MAX_TYPE_REF_DEPTH {
        return Err(DecodeError::NestingTooDeep(MAX_TYPE_REF_DEPTH, offset));
    }
    match reader.read_u8()? {
        TAG_NAMED => {
            let full_name = reader.read_string()?;
            let assembly = reader.read_opt_string()?;
            Ok(TypeRef::Named {
                full_name,
                assembly,
            })
        }
        TAG_GENERIC_PARAM => Ok(TypeRef::GenericParam(reader.read_u32()?)),
        TAG_GENERIC => {
            let definition = decode_type_ref(reader, depth + 1)?;
            // Every encoded type ref is at least 2 bytes (tag + payload)
            let count = reader.read_count(2)?;
            let mut args = Vec::with_capacity(count);
            for _ in 0..count {
                args.push(decode_type_ref(reader, depth + 1)?);
            }
            Ok(TypeRef::Generic {
                definition: Box::new(definition),
                args,
            })
        }
        TAG_ARRAY => Ok(TypeRef::Array(Box::new(decode_type_ref(reader, depth + 1)?))),
        tag => Err(DecodeError::InvalidTag {
            what: "type reference",
            tag,
            offset,
        }),
    }
}

impl FieldDef {
    /// Encode field to binary
    fn encode(&self, writer: &mut ImageWriter) {
        writer.emit_string(&self.name);
        encode_type_ref(&self.ty, writer);
        writer.emit_u32(self.flags);
    }

    /// Decode field from binary
    fn decode(reader: &mut ImageReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let ty = decode_type_ref(reader, 0)?;
        let flags = reader.read_u32()?;
        Ok(Self { name, ty, flags })
    }
}

impl TypeDef {
    /// Encode type definition to binary
    fn encode(&self, writer: &mut ImageWriter) {
        writer.emit_string(&self.namespace);
        writer.emit_string(&self.name);
        writer.emit_u8(self.kind.to_u8());
        writer.emit_u32(self.flags);

        // Base type (optional)
        match &self.base {
            Some(base) => {
                writer.emit_u8(1);
                encode_type_ref(base, writer);
            }
            None => writer.emit_u8(0),
        }

        writer.emit_u32(self.generic_params.len() as u32);
        for param in &self.generic_params {
            writer.emit_string(param);
        }

        writer.emit_opt_string(self.enum_underlying.as_deref());

        writer.emit_u32(self.fields.len() as u32);
        for field in &self.fields {
            field.encode(writer);
        }
    }

    /// Decode type definition from binary
    fn decode(reader: &mut ImageReader<'_>) -> Result<Self, DecodeError> {
        let namespace = reader.read_string()?;
        let name = reader.read_string()?;

        let kind_offset = reader.position();
        let kind_tag = reader.read_u8()?;
        let kind = TypeKind::from_u8(kind_tag).ok_or(DecodeError::InvalidTag {
            what: "type kind",
            tag: kind_tag,
            offset: kind_offset,
        })?;
        let flags = reader.read_u32()?;

        let base_offset = reader.position();
        let base = match reader.read_u8()? {
            0 => None,
            1 => Some(decode_type_ref(reader, 0)?),
            tag => {
                return Err(DecodeError::InvalidTag {
                    what: "base type",
                    tag,
                    offset: base_offset,
                })
            }
        };

        let param_count = reader.read_count(4)?;
        let mut generic_params = Vec::with_capacity(param_count);
        for _ in 0..param_count {
            generic_params.push(reader.read_string()?);
        }

        let enum_underlying = reader.read_opt_string()?;

        // name length + type tag + flags
        let field_count = reader.read_count(9)?;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            fields.push(FieldDef::decode(reader)?);
        }

        Ok(Self {
            namespace,
            name,
            kind,
            flags,
            base,
            generic_params,
            fields,
            enum_underlying,
        })
    }
}

impl AssemblyDef {
    /// Encode the assembly to the metadata image format
    pub fn encode_image(&self) -> Vec<u8> {
        self.encode_image_with_flags(0)
    }

    /// Encode the assembly with explicit image flags
    pub fn encode_image_with_flags(&self, image_flags: u32) -> Vec<u8> {
        let mut writer = ImageWriter::new();

        // Header, checksum filled in at the end
        let header_start = writer.offset();
        writer.emit_bytes(&MAGIC);
        writer.emit_u32(VERSION);
        writer.emit_u32(image_flags);
        let checksum_offset = writer.reserve_u32();

        writer.emit_string(&self.name);
        writer.emit_u32(self.types.len() as u32);
        for ty in &self.types {
            ty.encode(&mut writer);
        }

        let payload = &writer.buffer()[header_start + HEADER_SIZE..];
        let checksum = crc32fast::hash(payload);
        writer.patch_u32(checksum_offset, checksum);

        writer.into_bytes()
    }

    /// Decode an assembly from the metadata image format
    pub fn decode_image(data: &[u8]) -> Result<Self, ImageError> {
        let mut reader = ImageReader::new(data);

        let magic_bytes = reader.read_bytes(4)?;
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&magic_bytes);
        if magic != MAGIC {
            return Err(ImageError::InvalidMagic(magic));
        }

        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(ImageError::UnsupportedVersion(version));
        }

        let _flags = reader.read_u32()?;
        let stored_checksum = reader.read_u32()?;

        let payload = &data[HEADER_SIZE..];
        let calculated_checksum = crc32fast::hash(payload);
        if stored_checksum != calculated_checksum {
            return Err(ImageError::ChecksumMismatch {
                expected: stored_checksum,
                actual: calculated_checksum,
            });
        }

        let name = reader.read_string()?;
        // namespace + name lengths, kind, flags, base tag, counts
        let type_count = reader.read_count(22)?;
        let mut types = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            types.push(TypeDef::decode(&mut reader)?);
        }

        if reader.has_more() {
            return Err(ImageError::TrailingBytes(reader.remaining()));
        }

        Ok(Self { name, types })
    }
}

/// Read the flags word of an image header without decoding the payload
pub fn image_flags(data: &[u8]) -> Option<u32> {
    if data.len() < HEADER_SIZE || data[..4] != MAGIC {
        return None;
    }
    Some(u32::from_le_bytes([data[8], data[9], data[10], data[11]]))
}
