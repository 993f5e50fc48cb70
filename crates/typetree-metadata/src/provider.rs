//! Metadata providers
//!
//! A provider turns raw assembly bytes into the neutral [`AssemblyDef`]
//! model. The engine only ever talks to this trait, so a PE/CLI reader can
//! be plugged in alongside the built-in image provider.

use crate::image::ImageError;
use crate::model::AssemblyDef;
use crate::verify::{verify_assembly, VerifyError};
use thiserror::Error;

/// Errors reported by a metadata provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// The bytes are not a readable assembly
    #[error("Malformed image: {0}")]
    Image(#[from] ImageError),

    /// The assembly decoded but its metadata is inconsistent
    #[error("Invalid metadata: {0}")]
    Verify(#[from] VerifyError),

    /// The provider does not understand this input at all
    #[error("Unsupported input: {0}")]
    Unsupported(String),
}

/// Source of assembly metadata
pub trait MetadataProvider: Send + Sync {
    /// Parse an assembly from its raw bytes
    fn load_assembly(&self, bytes: &[u8]) -> Result<AssemblyDef, MetadataError>;

    /// Short provider name for diagnostics
    fn name(&self) -> &str;
}

/// Provider for the metadata image format
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageProvider;

impl ImageProvider {
    /// Create a new image provider
    pub fn new() -> Self {
        Self
    }
}

impl MetadataProvider for ImageProvider {
    fn load_assembly(&self, bytes: &[u8]) -> Result<AssemblyDef, MetadataError> {
        if bytes.is_empty() {
            return Err(MetadataError::Unsupported("empty input".to_string()));
        }
        let assembly = AssemblyDef::decode_image(bytes)?;
        verify_assembly(&assembly)?;
        tracing::debug!(
            assembly = %assembly.name,
            types = assembly.types.len(),
            "decoded metadata image"
        );
        Ok(assembly)
    }

    fn name(&self) -> &str {
        "metadata-image"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TypeDef, TypeKind};

    #[test]
    fn test_image_provider_loads_valid_image() {
        let mut assembly = AssemblyDef::new("Assembly-CSharp");
        assembly
            .types
            .push(TypeDef::new("", "Player", TypeKind::Class));

        let loaded = ImageProvider::new()
            .load_assembly(&assembly.encode_image())
            .unwrap();
        assert_eq!(loaded, assembly);
    }

    #[test]
    fn test_image_provider_rejects_garbage() {
        let provider = ImageProvider::new();
        assert!(matches!(
            provider.load_assembly(&[]),
            Err(MetadataError::Unsupported(_))
        ));
        assert!(matches!(
            provider.load_assembly(b"MZ\x90\x00not an image at all"),
            Err(MetadataError::Image(ImageError::InvalidMagic(_)))
        ));
    }

    #[test]
    fn test_image_provider_runs_verifier() {
        let assembly = AssemblyDef::new("");
        let result = ImageProvider::new().load_assembly(&assembly.encode_image());
        assert_eq!(
            result,
            Err(MetadataError::Verify(VerifyError::EmptyAssemblyName))
        );
    }
}
