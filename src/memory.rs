//! A small free-list pool for residue scratch buffers.
//!
//! Decryption, plaintext lifting, and polynomial array conversion all need
//! short-lived `u64` buffers sized by degree and chain length. The pool hands
//! those out without reallocating per call.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct MemoryPool {
    free: Arc<Mutex<Vec<Vec<u64>>>>,
}

impl MemoryPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// A zeroed buffer of `len` words, reused from the free list when one of
    /// sufficient capacity is available.
    pub fn acquire(&self, len: usize) -> PoolBuffer {
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        let mut data = free
            .iter()
            .position(|buf| buf.capacity() >= len)
            .map(|i| free.swap_remove(i))
            .unwrap_or_default();
        drop(free);
        data.clear();
        data.resize(len, 0);
        PoolBuffer {
            data,
            free: Arc::clone(&self.free),
        }
    }

    #[cfg(test)]
    fn free_count(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}

/// A pooled buffer; returns its allocation to the pool on drop.
#[derive(Debug)]
pub struct PoolBuffer {
    data: Vec<u64>,
    free: Arc<Mutex<Vec<Vec<u64>>>>,
}

impl Deref for PoolBuffer {
    type Target = Vec<u64>;

    fn deref(&self) -> &Vec<u64> {
        &self.data
    }
}

impl DerefMut for PoolBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u64> {
        &mut self.data
    }
}

impl Drop for PoolBuffer {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        if data.capacity() == 0 {
            return;
        }
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        if free.len() < 64 {
            free.push(data);
        }
    }
}
