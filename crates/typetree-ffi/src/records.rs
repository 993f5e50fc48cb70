//! Native record layouts
//!
//! Every string inside an array is its own `CString` allocation and the
//! array itself is a boxed slice. The `free_*` functions take exactly the
//! pointer and length the matching constructor produced.

use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::ptr;
use typetree_engine::{GeneratorError, NodeRecord, Result};

/// One type tree node as seen from C
#[repr(C)]
#[allow(non_snake_case)]
#[derive(Debug)]
pub struct TypeTreeNodeNative {
    /// Display type, NUL-terminated
    pub m_Type: *mut c_char,
    /// Field name, NUL-terminated
    pub m_Name: *mut c_char,
    /// Depth from the root
    pub m_Level: c_int,
    /// Meta flag bits
    pub m_MetaFlag: c_int,
}

/// `[assembly name, full type name]`
pub type DefinitionPair = [*mut c_char; 2];

/// Copy a string into an owned C string
pub fn c_string(s: &str) -> Result<CString> {
    CString::new(s).map_err(|_| {
        GeneratorError::AllocationFailure(format!("string contains a NUL byte: {:?}", s))
    })
}

/// Release a string produced by [`CString::into_raw`]
///
/// # Safety
/// `s` must be null or come from `CString::into_raw` and not be freed yet.
pub unsafe fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Move a boxed slice out as a raw pointer, using null for empty slices
fn into_raw_slice<T>(items: Vec<T>) -> (*mut T, usize) {
    if items.is_empty() {
        return (ptr::null_mut(), 0);
    }
    let len = items.len();
    let raw = Box::into_raw(items.into_boxed_slice());
    (raw as *mut T, len)
}

/// Build a node array
///
/// All strings are converted before anything is leaked, so a failure
/// allocates nothing.
pub fn node_array(records: &[NodeRecord]) -> Result<(*mut TypeTreeNodeNative, usize)> {
    let mut owned = Vec::with_capacity(records.len());
    for record in records {
        owned.push((
            c_string(&record.m_Type)?,
            c_string(&record.m_Name)?,
            record.m_Level,
            record.m_MetaFlag,
        ));
    }

    let nodes = owned
        .into_iter()
        .map(|(ty, name, level, flags)| TypeTreeNodeNative {
            m_Type: ty.into_raw(),
            m_Name: name.into_raw(),
            m_Level: level,
            m_MetaFlag: flags,
        })
        .collect();
    Ok(into_raw_slice(nodes))
}

/// Release a node array and every string in it
///
/// # Safety
/// `nodes` and `len` must be exactly what [`node_array`] returned, and the
/// array must not have been freed already.
pub unsafe fn free_node_array(nodes: *mut TypeTreeNodeNative, len: usize) {
    if nodes.is_null() {
        return;
    }
    let nodes = Box::from_raw(ptr::slice_from_raw_parts_mut(nodes, len));
    for node in nodes.iter() {
        free_c_string(node.m_Type);
        free_c_string(node.m_Name);
    }
}

/// Build a definition tuple array
pub fn definition_array(definitions: &[(String, String)]) -> Result<(*mut DefinitionPair, usize)> {
    let mut owned = Vec::with_capacity(definitions.len());
    for (assembly, full_name) in definitions {
        owned.push((c_string(assembly)?, c_string(full_name)?));
    }

    let pairs = owned
        .into_iter()
        .map(|(assembly, full_name)| [assembly.into_raw(), full_name.into_raw()])
        .collect();
    Ok(into_raw_slice(pairs))
}

/// Release a definition tuple array and every string in it
///
/// # Safety
/// `pairs` and `len` must be exactly what [`definition_array`] returned,
/// and the array must not have been freed already.
pub unsafe fn free_definition_array(pairs: *mut DefinitionPair, len: usize) {
    if pairs.is_null() {
        return;
    }
    let pairs = Box::from_raw(ptr::slice_from_raw_parts_mut(pairs, len));
    for pair in pairs.iter() {
        free_c_string(pair[0]);
        free_c_string(pair[1]);
    }
}
