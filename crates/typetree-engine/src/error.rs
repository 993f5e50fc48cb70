//! Generator errors and stable status codes

use thiserror::Error;
use typetree_metadata::MetadataError;

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, GeneratorError>;

/// Errors that can occur while loading assemblies or generating type trees
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Handle was never created or has been destroyed
    #[error("Invalid generator handle")]
    InvalidHandle,

    /// The metadata provider rejected the assembly bytes
    #[error("Malformed assembly: {0}")]
    MalformedAssembly(#[from] MetadataError),

    /// An assembly with the same name is already loaded
    #[error("Assembly already loaded: {name}")]
    DuplicateAssembly {
        /// Assembly name
        name: String,
    },

    /// Assembly referenced by name was never loaded
    #[error("Assembly not loaded: {name}")]
    AssemblyNotLoaded {
        /// Assembly name
        name: String,
    },

    /// Type name does not resolve
    #[error("Type not found: {name} in {assembly}")]
    TypeNotFound {
        /// Assembly that was searched first
        assembly: String,
        /// Full type name that failed to resolve
        name: String,
    },

    /// Type name is syntactically invalid or has the wrong generic arity
    #[error("Invalid type name {name:?}: {reason}")]
    InvalidTypeName {
        /// The offending name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// A field refers to a generic parameter that has no binding
    #[error("Generic parameter !{index} has no binding in {type_name}")]
    UnboundGenericParameter {
        /// Type being expanded
        type_name: String,
        /// Parameter index
        index: u32,
    },

    /// Expansion hit a cycle or the depth bound
    #[error("Recursion limit exceeded expanding {type_name} at depth {depth}")]
    RecursionLimitExceeded {
        /// Type whose expansion was rejected
        type_name: String,
        /// Depth at which expansion stopped
        depth: usize,
    },

    /// Engine version string is not recognized
    #[error("Unknown engine version: {0}")]
    UnknownEngineVersion(String),

    /// Generator backend name is not recognized
    #[error("Unknown generator backend: {0}")]
    UnknownBackend(String),

    /// Marshaling output across the boundary failed
    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    /// Caller passed an argument that cannot be used
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Export dump could not be written or read
    #[error("Export error: {0}")]
    Export(String),
}

/// Status codes returned across the C boundary
///
/// Values are stable; new codes are only ever appended.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Success
    Ok = 0,
    /// Handle was never created or has been destroyed
    InvalidHandle = 1,
    /// Input bytes or text could not be parsed
    MalformedInput = 2,
    /// Assembly name already loaded
    DuplicateAssembly = 3,
    /// Assembly name never loaded
    AssemblyNotLoaded = 4,
    /// Type name does not resolve
    TypeNotFound = 5,
    /// Cycle or depth bound hit during expansion
    RecursionLimitExceeded = 6,
    /// Output could not be marshaled
    AllocationFailure = 7,
    /// Null or otherwise unusable argument
    InvalidArgument = 8,
    /// I/O failure
    Io = 9,
}

impl StatusCode {
    /// Numeric value of the code
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Decode a numeric status code
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(StatusCode::Ok),
            1 => Some(StatusCode::InvalidHandle),
            2 => Some(StatusCode::MalformedInput),
            3 => Some(StatusCode::DuplicateAssembly),
            4 => Some(StatusCode::AssemblyNotLoaded),
            5 => Some(StatusCode::TypeNotFound),
            6 => Some(StatusCode::RecursionLimitExceeded),
            7 => Some(StatusCode::AllocationFailure),
            8 => Some(StatusCode::InvalidArgument),
            9 => Some(StatusCode::Io),
            _ => None,
        }
    }
}

impl GeneratorError {
    /// Status code reported to C callers for this error
    pub fn status(&self) -> StatusCode {
        match self {
            GeneratorError::InvalidHandle => StatusCode::InvalidHandle,
            GeneratorError::MalformedAssembly(_) | GeneratorError::Export(_) => {
                StatusCode::MalformedInput
            }
            GeneratorError::DuplicateAssembly { .. } => StatusCode::DuplicateAssembly,
            GeneratorError::AssemblyNotLoaded { .. } => StatusCode::AssemblyNotLoaded,
            GeneratorError::TypeNotFound { .. } | GeneratorError::UnboundGenericParameter { .. } => {
                StatusCode::TypeNotFound
            }
            GeneratorError::RecursionLimitExceeded { .. } => StatusCode::RecursionLimitExceeded,
            GeneratorError::AllocationFailure(_) => StatusCode::AllocationFailure,
            GeneratorError::InvalidTypeName { .. }
            | GeneratorError::UnknownEngineVersion(_)
            | GeneratorError::UnknownBackend(_)
            | GeneratorError::InvalidArgument(_) => StatusCode::InvalidArgument,
            GeneratorError::Io(_) => StatusCode::Io,
        }
    }

    /// Convenience constructor for [`GeneratorError::InvalidTypeName`]
    pub fn invalid_type_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        GeneratorError::InvalidTypeName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`GeneratorError::TypeNotFound`]
    pub fn type_not_found(assembly: impl Into<String>, name: impl Into<String>) -> Self {
        GeneratorError::TypeNotFound {
            assembly: assembly.into(),
            name: name.into(),
        }
    }
}
