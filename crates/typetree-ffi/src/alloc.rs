//! Allocation ledger
//!
//! Every string or array handed across the boundary is recorded by
//! address together with its shape. Free calls look the address up and
//! only release what the ledger says was handed out, with the same length.

use crate::records::{self, DefinitionPair, TypeTreeNodeNative};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::os::raw::c_char;
use std::sync::LazyLock;
use typetree_engine::{GeneratorError, NodeRecord, Result};

/// Shape of a live allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// A single C string
    String,
    /// A node array and its strings
    Nodes {
        /// Element count
        len: usize,
    },
    /// A definition tuple array and its strings
    Definitions {
        /// Element count
        len: usize,
    },
}

static LEDGER: LazyLock<Mutex<FxHashMap<usize, Allocation>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

fn record(addr: usize, allocation: Allocation) {
    if addr != 0 {
        LEDGER.lock().insert(addr, allocation);
    }
}

/// Number of live allocations
pub fn outstanding() -> usize {
    LEDGER.lock().len()
}

/// Whether `addr` is a live allocation
pub fn is_live(addr: usize) -> bool {
    LEDGER.lock().contains_key(&addr)
}

/// Hand out a C string copy of `s`
pub fn give_string(s: &str) -> Result<*mut c_char> {
    let raw = records::c_string(s)?.into_raw();
    record(raw as usize, Allocation::String);
    Ok(raw)
}

/// Hand out a node array
pub fn give_nodes(nodes: &[NodeRecord]) -> Result<(*mut TypeTreeNodeNative, usize)> {
    let (raw, len) = records::node_array(nodes)?;
    record(raw as usize, Allocation::Nodes { len });
    Ok((raw, len))
}

/// Hand out a definition tuple array
pub fn give_definitions(definitions: &[(String, String)]) -> Result<(*mut DefinitionPair, usize)> {
    let (raw, len) = records::definition_array(definitions)?;
    record(raw as usize, Allocation::Definitions { len });
    Ok((raw, len))
}

/// Remove `addr` from the ledger if its entry satisfies `expected`
fn take(addr: usize, expected: impl FnOnce(Allocation) -> bool) -> Result<Allocation> {
    let mut ledger = LEDGER.lock();
    match ledger.get(&addr).copied() {
        Some(allocation) if expected(allocation) => {
            ledger.remove(&addr);
            Ok(allocation)
        }
        Some(allocation) => Err(GeneratorError::InvalidArgument(format!(
            "pointer {:#x} was handed out as {:?}",
            addr, allocation
        ))),
        None => Err(GeneratorError::InvalidArgument(format!(
            "pointer {:#x} is not a live allocation",
            addr
        ))),
    }
}

/// Release a node array handed out by [`give_nodes`]
///
/// # Safety
/// Nothing may read the array once this returns `Ok`.
pub unsafe fn release_nodes(nodes: *mut TypeTreeNodeNative, len: usize) -> Result<()> {
    if nodes.is_null() {
        return Ok(());
    }
    take(nodes as usize, |a| a == Allocation::Nodes { len })?;
    records::free_node_array(nodes, len);
    Ok(())
}

/// Release a definition array handed out by [`give_definitions`]
///
/// # Safety
/// Nothing may read the array once this returns `Ok`.
pub unsafe fn release_definitions(pairs: *mut DefinitionPair, len: usize) -> Result<()> {
    if pairs.is_null() {
        return Ok(());
    }
    take(pairs as usize, |a| a == Allocation::Definitions { len })?;
    records::free_definition_array(pairs, len);
    Ok(())
}

/// Release any live allocation by address
///
/// # Safety
/// Nothing may read the allocation once this returns `Ok`.
pub unsafe fn release_any(addr: *mut std::ffi::c_void) -> Result<()> {
    if addr.is_null() {
        return Ok(());
    }
    match take(addr as usize, |_| true)? {
        Allocation::String => records::free_c_string(addr as *mut c_char),
        Allocation::Nodes { len } => records::free_node_array(addr as *mut TypeTreeNodeNative, len),
        Allocation::Definitions { len } => {
            records::free_definition_array(addr as *mut DefinitionPair, len)
        }
    }
    Ok(())
}
