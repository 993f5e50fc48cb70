//! C FFI bindings for the type tree generator
//!
//! This module provides a C-compatible API for hosts that load game
//! assemblies and need serialized type layouts. The API follows these
//! principles:
//! - ABI-stable (uses only C-compatible types)
//! - Thread-safe (distinct handles never contend; one handle serializes its calls)
//! - Status codes as return values, results via out-parameters
//! - Handles are generation-tagged IDs, never raw object addresses
//! - Every returned string or array is released by a matching free call

#![warn(rust_2018_idioms)]
#![allow(non_snake_case)]

pub mod alloc;
pub mod logging;
pub mod records;

use records::{DefinitionPair, TypeTreeNodeNative};
use std::cell::RefCell;
use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::sync::LazyLock;
use typetree_engine::{
    GeneratorError, GeneratorOptions, GeneratorRegistry, HandleId, Result, StatusCode,
};

// ============================================================================
// Opaque Types
// ============================================================================

/// Opaque handle to a generator instance
#[repr(C)]
pub struct TypeTreeGenerator {
    _private: [u8; 0],
}

static REGISTRY: LazyLock<GeneratorRegistry> = LazyLock::new(GeneratorRegistry::new);

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

// ============================================================================
// Helper Functions
// ============================================================================

fn handle_to_id(handle: *mut TypeTreeGenerator) -> Result<HandleId> {
    HandleId::from_raw(handle.addr()).ok_or(GeneratorError::InvalidHandle)
}

fn id_to_handle(id: HandleId) -> *mut TypeTreeGenerator {
    ptr::without_provenance_mut(id.to_raw())
}

fn set_last_error(error: &GeneratorError) {
    tracing::debug!(status = error.status().code(), %error, "call failed");
    LAST_ERROR.with(|last| *last.borrow_mut() = Some(error.to_string()));
}

/// Record a failure and turn the result into a status code
fn status(result: Result<()>) -> c_int {
    match result {
        Ok(()) => StatusCode::Ok.code(),
        Err(e) => {
            set_last_error(&e);
            e.status().code()
        }
    }
}

/// Borrow a NUL-terminated UTF-8 argument
///
/// # Safety
/// `s` must be null or point to a NUL-terminated string that outlives `'a`.
unsafe fn c_str_arg<'a>(s: *const c_char, what: &str) -> Result<&'a str> {
    if s.is_null() {
        return Err(GeneratorError::InvalidArgument(format!("{} is null", what)));
    }
    CStr::from_ptr(s)
        .to_str()
        .map_err(|_| GeneratorError::InvalidArgument(format!("{} is not valid UTF-8", what)))
}

fn length_arg(len: usize) -> Result<c_int> {
    c_int::try_from(len)
        .map_err(|_| GeneratorError::AllocationFailure(format!("{} elements do not fit in int", len)))
}

fn length_in(len: c_int) -> Result<usize> {
    usize::try_from(len)
        .map_err(|_| GeneratorError::InvalidArgument(format!("negative length {}", len)))
}

// ============================================================================
// Generator Lifecycle
// ============================================================================

/// Create a generator for an engine version and backend
///
/// # Arguments
/// * `unity_version` - Engine version such as `"2021.3.5f1"`
/// * `generator_name` - One of `AssetStudio`, `AssetsTools`, `AssetRipper`
///
/// # Returns
/// * Non-null handle on success
/// * NULL on an unknown version or backend (see `TypeTreeGenerator_getLastError`)
///
/// # Safety
/// Both arguments must be valid NUL-terminated strings. The handle must be
/// released with `TypeTreeGenerator_del()`.
///
/// # Example (C)
/// ```c
/// TypeTreeGenerator* gen = TypeTreeGenerator_init("2021.3.5f1", "AssetStudio");
/// if (gen == NULL) {
///     char* msg = TypeTreeGenerator_getLastError();
///     fprintf(stderr, "init failed: %s\n", msg);
///     FreeCoTaskMem(msg);
///     return 1;
/// }
/// ```
#[no_mangle]
pub unsafe extern "C" fn TypeTreeGenerator_init(
    unity_version: *const c_char,
    generator_name: *const c_char,
) -> *mut TypeTreeGenerator {
    logging::init();

    let result = (|| {
        let version = c_str_arg(unity_version, "unity version")?;
        let backend = c_str_arg(generator_name, "generator name")?;
        REGISTRY.create_with_options(version, backend, GeneratorOptions::from_env())
    })();

    match result {
        Ok(id) => id_to_handle(id),
        Err(e) => {
            set_last_error(&e);
            ptr::null_mut()
        }
    }
}

/// Destroy a generator
///
/// Waits for any call running on the same handle.
///
/// # Returns
/// * 0 on success
/// * `InvalidHandle` for NULL, unknown or already destroyed handles
///
/// # Safety
/// The handle must not be used after this call; doing so is detected and
/// rejected.
#[no_mangle]
pub unsafe extern "C" fn TypeTreeGenerator_del(handle: *mut TypeTreeGenerator) -> c_int {
    status(handle_to_id(handle).and_then(|id| REGISTRY.destroy(id)))
}

// ============================================================================
// Assembly Loading
// ============================================================================

/// Load an assembly image
///
/// # Arguments
/// * `handle` - Generator handle
/// * `data` - Image bytes
/// * `len` - Number of bytes at `data`
///
/// # Returns
/// * 0 on success
/// * `MalformedInput`, `DuplicateAssembly`, `InvalidHandle` or
///   `InvalidArgument` on failure; the generator is unchanged
///
/// # Safety
/// `data` must point to `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn TypeTreeGenerator_loadDLL(
    handle: *mut TypeTreeGenerator,
    data: *const u8,
    len: c_int,
) -> c_int {
    status((|| {
        let id = handle_to_id(handle)?;
        let len = length_in(len)?;
        let bytes = if len == 0 {
            &[][..]
        } else if data.is_null() {
            return Err(GeneratorError::InvalidArgument("data is null".to_string()));
        } else {
            std::slice::from_raw_parts(data, len)
        };
        REGISTRY.with(id, |generator| generator.load_assembly(bytes).map(drop))
    })())
}

/// Names of every loaded assembly, comma-separated in load order
///
/// # Returns
/// * Caller-owned string, released with `FreeCoTaskMem()`
/// * NULL on an invalid handle
///
/// # Safety
/// `handle` must be a value returned by `TypeTreeGenerator_init()` or NULL.
#[no_mangle]
pub unsafe extern "C" fn TypeTreeGenerator_getLoadedDLLNames(
    handle: *mut TypeTreeGenerator,
) -> *mut c_char {
    let result = handle_to_id(handle)
        .and_then(|id| REGISTRY.with(id, |generator| Ok(generator.loaded_names_joined())))
        .and_then(|names| alloc::give_string(&names));

    match result {
        Ok(names) => names,
        Err(e) => {
            set_last_error(&e);
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Tree Generation
// ============================================================================

/// Generate a type tree as a JSON array of node records
///
/// # Arguments
/// * `assembly_name` - Simple name of a loaded assembly
/// * `full_name` - Full type name, generic arguments in `[[...]]` form
/// * `json_out` - Receives a caller-owned string (NULL on failure)
///
/// # Returns
/// * 0 on success, a status code otherwise
///
/// # Safety
/// String arguments must be NUL-terminated; `json_out` must be writable.
/// Release the result with `FreeCoTaskMem()`.
#[no_mangle]
pub unsafe extern "C" fn TypeTreeGenerator_generateTreeNodesJson(
    handle: *mut TypeTreeGenerator,
    assembly_name: *const c_char,
    full_name: *const c_char,
    json_out: *mut *mut c_char,
) -> c_int {
    if json_out.is_null() {
        return status(Err(GeneratorError::InvalidArgument(
            "json_out is null".to_string(),
        )));
    }
    *json_out = ptr::null_mut();

    status((|| {
        let id = handle_to_id(handle)?;
        let assembly = c_str_arg(assembly_name, "assembly name")?;
        let full_name = c_str_arg(full_name, "type name")?;
        let json = REGISTRY.with(id, |generator| generator.generate_json(assembly, full_name))?;
        *json_out = alloc::give_string(&json)?;
        Ok(())
    })())
}

/// Generate a type tree as an array of native node records
///
/// # Arguments
/// * `nodes_out` - Receives the array (NULL on failure)
/// * `len_out` - Receives the element count (0 on failure)
///
/// # Returns
/// * 0 on success, a status code otherwise
///
/// # Safety
/// String arguments must be NUL-terminated; out-parameters must be
/// writable. Release the array with `TypeTreeGenerator_freeTreeNodesRaw()`
/// passing the same length.
#[no_mangle]
pub unsafe extern "C" fn TypeTreeGenerator_generateTreeNodesRaw(
    handle: *mut TypeTreeGenerator,
    assembly_name: *const c_char,
    full_name: *const c_char,
    nodes_out: *mut *mut TypeTreeNodeNative,
    len_out: *mut c_int,
) -> c_int {
    if nodes_out.is_null() || len_out.is_null() {
        return status(Err(GeneratorError::InvalidArgument(
            "output pointer is null".to_string(),
        )));
    }
    *nodes_out = ptr::null_mut();
    *len_out = 0;

    status((|| {
        let id = handle_to_id(handle)?;
        let assembly = c_str_arg(assembly_name, "assembly name")?;
        let full_name = c_str_arg(full_name, "type name")?;
        let records =
            REGISTRY.with(id, |generator| generator.generate_records(assembly, full_name))?;
        let len = length_arg(records.len())?;
        let (nodes, _) = alloc::give_nodes(&records)?;
        *nodes_out = nodes;
        *len_out = len;
        Ok(())
    })())
}

/// Release a node array
///
/// NULL is a no-op. Pointers or lengths that were not handed out by
/// `TypeTreeGenerator_generateTreeNodesRaw()` are rejected with
/// `InvalidArgument` and nothing is freed.
///
/// # Safety
/// The array must not be read after a successful call.
#[no_mangle]
pub unsafe extern "C" fn TypeTreeGenerator_freeTreeNodesRaw(
    nodes: *mut TypeTreeNodeNative,
    len: c_int,
) -> c_int {
    status(length_in(len).and_then(|len| alloc::release_nodes(nodes, len)))
}

// ============================================================================
// Script Class Discovery
// ============================================================================

/// List every concrete script class as `[assembly name, full type name]`
///
/// # Returns
/// * 0 on success; an empty result is NULL with length 0
///
/// # Safety
/// Out-parameters must be writable. Release the array with
/// `TypeTreeGenerator_freeMonoBehaviorDefinitions()`.
#[no_mangle]
pub unsafe extern "C" fn TypeTreeGenerator_getMonoBehaviorDefinitions(
    handle: *mut TypeTreeGenerator,
    definitions_out: *mut *mut DefinitionPair,
    len_out: *mut c_int,
) -> c_int {
    if definitions_out.is_null() || len_out.is_null() {
        return status(Err(GeneratorError::InvalidArgument(
            "output pointer is null".to_string(),
        )));
    }
    *definitions_out = ptr::null_mut();
    *len_out = 0;

    status((|| {
        let id = handle_to_id(handle)?;
        let definitions =
            REGISTRY.with(id, |generator| Ok(generator.mono_behaviour_definitions()))?;
        let len = length_arg(definitions.len())?;
        let (pairs, _) = alloc::give_definitions(&definitions)?;
        *definitions_out = pairs;
        *len_out = len;
        Ok(())
    })())
}

/// Release a definition array
///
/// Same contract as `TypeTreeGenerator_freeTreeNodesRaw()`.
///
/// # Safety
/// The array must not be read after a successful call.
#[no_mangle]
pub unsafe extern "C" fn TypeTreeGenerator_freeMonoBehaviorDefinitions(
    definitions: *mut DefinitionPair,
    len: c_int,
) -> c_int {
    status(length_in(len).and_then(|len| alloc::release_definitions(definitions, len)))
}

// ============================================================================
// Diagnostics and Memory
// ============================================================================

/// Message of the calling thread's most recent failure
///
/// # Returns
/// * Caller-owned string, released with `FreeCoTaskMem()`
/// * NULL if nothing has failed on this thread
///
/// # Safety
/// Always safe to call.
#[no_mangle]
pub unsafe extern "C" fn TypeTreeGenerator_getLastError() -> *mut c_char {
    let message = LAST_ERROR.with(|last| last.borrow().clone());
    match message {
        Some(message) => alloc::give_string(&message).unwrap_or(ptr::null_mut()),
        None => ptr::null_mut(),
    }
}

/// Number of strings and arrays handed out and not yet released
///
/// # Safety
/// Always safe to call.
#[no_mangle]
pub unsafe extern "C" fn TypeTreeGenerator_outstandingAllocations() -> c_int {
    c_int::try_from(alloc::outstanding()).unwrap_or(c_int::MAX)
}

/// Release any string or array returned by this library
///
/// NULL and pointers this library did not hand out are ignored.
///
/// # Safety
/// The memory must not be read after this call.
#[no_mangle]
pub unsafe extern "C" fn FreeCoTaskMem(ptr: *mut c_void) {
    if let Err(e) = alloc::release_any(ptr) {
        set_last_error(&e);
    }
}
