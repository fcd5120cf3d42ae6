//! Type registry mapping payload types to compact wire ids.
//!
//! IDs are assigned sequentially starting from 1 and are never reused.
//! Register every payload type before the first frame of that type is
//! encoded or decoded.
//!
//! # Example
//!
//! ```
//! use bytewire::protocol::TypeRegistry;
//!
//! let registry = TypeRegistry::new();
//! let id = registry.register::<String>().unwrap();
//! assert_eq!(id, 1);
//!
//! let fresh = registry.new_message(id).unwrap();
//! assert!(fresh.is::<String>());
//! ```

use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::codec::Payload;
use crate::error::{Result, WireError};

/// Builds a zero-valued instance for decoding.
type Factory = fn() -> Box<dyn Payload>;

fn make<T: Payload + Default>() -> Box<dyn Payload> {
    Box::new(T::default())
}

struct Entry {
    name: &'static str,
    factory: Factory,
}

struct Inner {
    next_id: u32,
    ids: HashMap<&'static str, u32>,
    entries: HashMap<u32, Entry>,
}

/// Registry of payload types, keyed by canonical type name and by id.
///
/// The lock is only held across map access, never across serialization.
pub struct TypeRegistry {
    inner: Mutex<Inner>,
}

impl TypeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1, // 0 is never assigned
                ids: HashMap::new(),
                entries: HashMap::new(),
            }),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static TypeRegistry {
        static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();
        GLOBAL.get_or_init(TypeRegistry::new)
    }

    /// Register `T` and return its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRegistration` if `T` is already registered.
    pub fn register<T: Payload + Default>(&self) -> Result<u32> {
        let name = T::default().type_name();
        let mut inner = self.inner.lock();

        if inner.ids.contains_key(name) {
            return Err(WireError::DuplicateRegistration(name.to_string()));
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.ids.insert(name, id);
        inner.entries.insert(
            id,
            Entry {
                name,
                factory: make::<T>,
            },
        );
        tracing::debug!(type_name = name, id, "registered payload type");
        Ok(id)
    }

    /// Get the id registered for a type name.
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.inner.lock().ids.get(name).copied()
    }

    /// Get the type name registered under an id.
    pub fn name_of(&self, id: u32) -> Option<&'static str> {
        self.inner.lock().entries.get(&id).map(|e| e.name)
    }

    /// Build a fresh zero-valued instance of the type registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` if no type has that id.
    pub fn new_message(&self, id: u32) -> Result<Box<dyn Payload>> {
        let factory = self
            .inner
            .lock()
            .entries
            .get(&id)
            .map(|e| e.factory)
            .ok_or(WireError::UnknownType(id))?;
        Ok(factory())
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
