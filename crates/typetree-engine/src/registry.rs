//! Handle registry
//!
//! Generators are handed out as generation-tagged IDs rather than raw
//! pointers. Removing an entry bumps its slot's generation, so a stale ID
//! never reaches a newer generator that reuses the slot.

use crate::error::{GeneratorError, Result};
use crate::generator::Generator;
use crate::options::GeneratorOptions;
use crate::profile::EngineProfile;
use parking_lot::Mutex;
use std::sync::Arc;

/// Bits of the raw value holding the slot index
const INDEX_BITS: u32 = 16;
const INDEX_MASK: usize = (1 << INDEX_BITS) - 1;

/// Largest number of simultaneously live handles
pub const MAX_HANDLES: usize = INDEX_MASK;

/// Generation-tagged handle identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId {
    index: u16,
    generation: u32,
}

impl HandleId {
    /// Slot index
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Slot generation
    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Pack into a non-zero pointer-sized value
    ///
    /// The low bits hold `index + 1`, so zero (null) never decodes.
    pub fn to_raw(self) -> usize {
        ((self.generation as usize) << INDEX_BITS) | (self.index as usize + 1)
    }

    /// Unpack a value produced by [`HandleId::to_raw`]
    pub fn from_raw(raw: usize) -> Option<Self> {
        let slot = raw & INDEX_MASK;
        if slot == 0 {
            return None;
        }
        Some(Self {
            index: (slot - 1) as u16,
            generation: u32::try_from(raw >> INDEX_BITS).ok()?,
        })
    }
}

/// Wrap generations so they always fit beside the index in a `usize`
fn next_generation(generation: u32) -> u32 {
    let limit = (usize::MAX >> INDEX_BITS).min(u32::MAX as usize);
    if generation as usize >= limit {
        0
    } else {
        generation + 1
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot table with generation counters and a free list
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u16>,
    len: usize,
}

impl<T> HandleTable<T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the table has no live entries
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a value, reusing a free slot when one exists
    pub fn insert(&mut self, value: T) -> Result<HandleId> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                if self.slots.len() >= MAX_HANDLES {
                    return Err(GeneratorError::AllocationFailure(format!(
                        "handle table full ({} live handles)",
                        self.len
                    )));
                }
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                (self.slots.len() - 1) as u16
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);
        self.len += 1;
        Ok(HandleId {
            index,
            generation: slot.generation,
        })
    }

    /// Look up a live entry
    pub fn get(&self, id: HandleId) -> Option<&T> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Look up a live entry mutably
    pub fn get_mut(&mut self, id: HandleId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Whether `id` refers to a live entry
    pub fn contains(&self, id: HandleId) -> bool {
        self.get(id).is_some()
    }

    /// Remove an entry, invalidating `id` and every copy of it
    pub fn remove(&mut self, id: HandleId) -> Option<T> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)?;
        let value = slot.value.take()?;
        slot.generation = next_generation(slot.generation);
        self.free.push(id.index);
        self.len -= 1;
        Some(value)
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered generator and its liveness flag
struct Instance {
    is_alive: bool,
    generator: Option<Generator>,
}

/// Thread-safe registry of generators
///
/// The table lock is only held to look up or remove an entry. Work on a
/// generator runs under that instance's own lock, so distinct handles never
/// contend and destruction waits for in-flight work on the same handle.
#[derive(Default)]
pub struct GeneratorRegistry {
    table: Mutex<HandleTable<Arc<Mutex<Instance>>>>,
}

impl GeneratorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator with default options
    pub fn create(&self, version: &str, backend: &str) -> Result<HandleId> {
        self.create_with_options(version, backend, GeneratorOptions::default())
    }

    /// Create a generator with explicit options
    pub fn create_with_options(
        &self,
        version: &str,
        backend: &str,
        options: GeneratorOptions,
    ) -> Result<HandleId> {
        let profile = EngineProfile::parse(version, backend)?;
        self.insert(Generator::new(profile, options))
    }

    /// Register an already constructed generator
    pub fn insert(&self, generator: Generator) -> Result<HandleId> {
        let instance = Arc::new(Mutex::new(Instance {
            is_alive: true,
            generator: Some(generator),
        }));
        let id = self.table.lock().insert(instance)?;
        tracing::debug!(handle = id.to_raw(), "registered generator");
        Ok(id)
    }

    /// Run `f` with exclusive access to a live generator
    pub fn with<R>(&self, id: HandleId, f: impl FnOnce(&mut Generator) -> Result<R>) -> Result<R> {
        let instance = self
            .table
            .lock()
            .get(id)
            .cloned()
            .ok_or(GeneratorError::InvalidHandle)?;

        let mut guard = instance.lock();
        let entry = &mut *guard;
        if !entry.is_alive {
            return Err(GeneratorError::InvalidHandle);
        }
        let generator = entry
            .generator
            .as_mut()
            .ok_or(GeneratorError::InvalidHandle)?;
        f(generator)
    }

    /// Destroy a generator
    ///
    /// Waits for any operation running on the same handle; later calls with
    /// this ID fail with [`GeneratorError::InvalidHandle`].
    pub fn destroy(&self, id: HandleId) -> Result<()> {
        let instance = self
            .table
            .lock()
            .remove(id)
            .ok_or(GeneratorError::InvalidHandle)?;

        let mut guard = instance.lock();
        guard.is_alive = false;
        guard.generator = None;
        tracing::debug!(handle = id.to_raw(), "destroyed generator");
        Ok(())
    }

    /// Whether `id` refers to a live generator
    pub fn is_alive(&self, id: HandleId) -> bool {
        self.table.lock().contains(id)
    }

    /// Number of live generators
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    /// Whether no generators are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
