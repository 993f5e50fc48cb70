//! Managed assembly metadata
//!
//! This crate provides the neutral metadata model the type tree engine
//! reflects over, the binary metadata image format, its verifier and the
//! [`MetadataProvider`] seam for plugging in assembly readers.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod builder;
pub mod encoder;
pub mod image;
pub mod model;
pub mod provider;
pub mod verify;

pub use builder::{AssemblyBuilder, TypeBuilder};
pub use encoder::{DecodeError, ImageReader, ImageWriter};
pub use image::ImageError;
pub use model::{field_flags, type_flags, AssemblyDef, FieldDef, TypeDef, TypeKind, TypeRef};
pub use provider::{ImageProvider, MetadataError, MetadataProvider};
pub use verify::{verify_assembly, VerifyError};
