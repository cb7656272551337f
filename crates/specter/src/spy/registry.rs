//! The process-wide table of active spies.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

use crate::spy::method::{Method, MethodId};
use crate::spy::{InstanceKey, Spy};

static REGISTRY: Lazy<SpyRegistry> = Lazy::new(SpyRegistry::new);

/// The shared registry consulted by the dispatcher and cleared by the
/// executor between tests.
pub fn registry() -> &'static SpyRegistry {
    &REGISTRY
}

/// Active spies keyed by `(root method id, instance)`.
///
/// The map lock is held only around lookups and mutations of the table
/// itself, never while a behaviour body runs, so dispatches may nest freely.
#[derive(Default)]
pub struct SpyRegistry {
    spies: Mutex<HashMap<(MethodId, InstanceKey), Arc<Spy>>>,
}

impl SpyRegistry {
    pub fn new() -> Self {
        SpyRegistry::default()
    }

    /// Installs a spy over `(method, instance)`, canonicalising the method to
    /// its root definition. An existing spy for the same pair is disposed;
    /// the new spy starts with the infinite `Default` behaviour.
    pub fn install(&self, method: &Arc<Method>, instance: InstanceKey) -> Arc<Spy> {
        let root = method.root_method();
        let key = (root.id(), instance);
        let spy = Spy::new(root, instance);
        let previous = self.spies.lock().insert(key, spy.clone());
        trace!(
            method = spy.method_name(),
            replaced = previous.is_some(),
            "installed spy"
        );
        spy
    }

    /// The active spy for `(method, instance)`, after canonicalisation.
    pub fn get(&self, method: &Arc<Method>, instance: InstanceKey) -> Option<Arc<Spy>> {
        let key = (method.root_id(), instance);
        self.spies.lock().get(&key).cloned()
    }

    /// Removes the spy, reverting the target to call-through. A no-op when
    /// the spy was already displaced by a newer one.
    pub fn dispose(&self, spy: &Arc<Spy>) -> bool {
        let key = (spy.method().id(), spy.instance());
        let mut spies = self.spies.lock();
        match spies.get(&key) {
            Some(active) if Arc::ptr_eq(active, spy) => {
                spies.remove(&key);
                trace!(method = spy.method_name(), "disposed spy");
                true
            }
            _ => false,
        }
    }

    /// Removes every spy. Idempotent.
    pub fn clear_all(&self) {
        let mut spies = self.spies.lock();
        if !spies.is_empty() {
            trace!(count = spies.len(), "clearing spy registry");
        }
        spies.clear();
    }

    pub fn active_count(&self) -> usize {
        self.spies.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.spies.lock().is_empty()
    }
}
