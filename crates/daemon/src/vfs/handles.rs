//! Open file handle table
//!
//! Handles are opaque integers mapped to the remote path they were opened
//! against. Numbers increase monotonically from 1 and are never reused.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

pub struct HandleTable {
    open: RwLock<HashMap<u64, String>>,
    next_fh: AtomicU64,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            open: RwLock::new(HashMap::new()),
            next_fh: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh handle for `path`
    pub fn allocate(&self, path: &str) -> u64 {
        let fh = self.next_fh.fetch_add(1, Ordering::SeqCst);
        self.open.write().insert(fh, path.to_string());
        fh
    }

    pub fn get(&self, fh: u64) -> Option<String> {
        self.open.read().get(&fh).cloned()
    }

    /// Free a handle, returning the path it pointed at
    pub fn release(&self, fh: u64) -> Option<String> {
        self.open.write().remove(&fh)
    }

    pub fn len(&self) -> usize {
        self.open.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
