//! Collection gate
//!
//! Shared between a heap and whatever collects it. Snapshot passes hold the
//! gate open (a non-zero depth) while objects are partially initialized; a
//! collector must obtain a [`CollectionPermit`], which is only granted at
//! depth zero. While a permit is alive, new scopes wait for it to drop.

use parking_lot::{Condvar, Mutex};
use tracing::warn;

#[derive(Debug, Default)]
struct GateState {
    depth: usize,
    collecting: bool,
}

/// Coordination point between no-collection scopes and a collector
#[derive(Debug, Default)]
pub struct CollectionGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

/// Proof that no no-collection scope is open; collection may run
#[derive(Debug)]
pub struct CollectionPermit<'g> {
    gate: &'g CollectionGate,
}

impl CollectionGate {
    /// Create an open gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a no-collection scope, waiting out a running collection
    pub fn enter(&self) {
        let mut state = self.state.lock();
        while state.collecting {
            self.changed.wait(&mut state);
        }
        state.depth += 1;
    }

    /// Close a no-collection scope
    pub fn exit(&self) {
        let mut state = self.state.lock();
        if state.depth == 0 {
            warn!("no-collection scope exited more often than entered");
            return;
        }
        state.depth -= 1;
        if state.depth == 0 {
            self.changed.notify_all();
        }
    }

    /// Number of open scopes
    pub fn depth(&self) -> usize {
        self.state.lock().depth
    }

    /// Start a collection if no scope is open
    pub fn try_begin_collection(&self) -> Option<CollectionPermit<'_>> {
        let mut state = self.state.lock();
        if state.depth > 0 || state.collecting {
            return None;
        }
        state.collecting = true;
        Some(CollectionPermit { gate: self })
    }

    /// Block until every scope has closed, then start a collection
    pub fn wait_for_collection_window(&self) -> CollectionPermit<'_> {
        let mut state = self.state.lock();
        while state.depth > 0 || state.collecting {
            self.changed.wait(&mut state);
        }
        state.collecting = true;
        CollectionPermit { gate: self }
    }
}

impl Drop for CollectionPermit<'_> {
    fn drop(&mut self) {
        let mut state = self.gate.state.lock();
        state.collecting = false;
        self.gate.changed.notify_all();
    }
}
