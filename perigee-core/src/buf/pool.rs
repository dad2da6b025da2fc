// Perigee
// Copyright (c) 2025 The Project Perigee Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use super::shared::SharedBufferPtr;

pub(super) struct PoolState {
    /// One entry per region. `Some` while the region is checked in (free).
    pub(super) slots: Vec<Option<Box<[u32]>>>,
    pub(super) last_index: usize,
    pub(super) n_free: usize,
}

pub(super) struct PoolInner {
    pub(super) state: Mutex<PoolState>,
}

impl PoolInner {
    pub(super) fn release(&self, slot: usize, data: Box<[u32]>) {
        let mut state = self.state.lock();

        debug_assert!(state.slots[slot].is_none());

        state.slots[slot] = Some(data);
        state.n_free += 1;
    }
}

/// A fixed pool of equally-sized byte regions.
///
/// All regions are allocated once at construction and live for the lifetime of the pool. The
/// pool is cheaply cloneable; clones share the same regions.
#[derive(Clone)]
pub struct SharedBufferPool {
    inner: Arc<PoolInner>,
    element_len: usize,
    count: usize,
}

impl SharedBufferPool {
    /// Instantiate a pool of `count` regions of `element_len` bytes each.
    ///
    /// The region length is rounded up to a multiple of 4 so that 4-byte typed views over
    /// region payloads are always properly aligned.
    pub fn new(element_len: usize, count: usize) -> SharedBufferPool {
        assert!(element_len > 0, "pool element length must be non-zero");
        assert!(count > 0, "pool must hold at least one buffer");

        let n_words = (element_len + 3) / 4;

        let slots = (0..count)
            .map(|_| Some(vec![0u32; n_words].into_boxed_slice()))
            .collect::<Vec<_>>();

        SharedBufferPool {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState { slots, last_index: count - 1, n_free: count }),
            }),
            element_len: n_words * 4,
            count,
        }
    }

    /// The total number of regions in the pool.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Always false; a pool holds at least one region.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The byte capacity of each region.
    pub fn element_len(&self) -> usize {
        self.element_len
    }

    /// The number of regions currently free.
    pub fn free(&self) -> usize {
        self.inner.state.lock().n_free
    }

    /// Check a free region out of the pool, or return `None` if all regions are in use.
    ///
    /// The search is next-fit: it starts at the region after the most recently allocated one,
    /// so buffers are cycled through evenly. This call never blocks on anything but the pool
    /// mutex itself.
    pub fn allocate(&self) -> Option<SharedBufferPtr> {
        let mut state = self.inner.state.lock();

        for step in 1..=self.count {
            let idx = (state.last_index + step) % self.count;

            if state.slots[idx].is_some() {
                let data = state.slots[idx].take();
                state.last_index = idx;
                state.n_free -= 1;

                return data.map(|data| SharedBufferPtr::new(data, idx, Arc::clone(&self.inner)));
            }
        }

        debug!("pool exhausted: all {} buffers in use", self.count);

        None
    }
}

#[cfg(test)]
mod tests {
    use super::SharedBufferPool;

    #[test]
    fn verify_allocate_exhaustion() {
        let pool = SharedBufferPool::new(64, 2);

        assert_eq!(pool.free(), 2);

        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();

        assert_eq!(pool.free(), 0);
        assert!(pool.allocate().is_none());

        drop(a);
        assert_eq!(pool.free(), 1);
        assert!(pool.allocate().is_some());

        drop(b);
    }

    #[test]
    fn verify_next_fit_order() {
        let pool = SharedBufferPool::new(16, 3);

        let mut a = pool.allocate().unwrap();
        let _b = pool.allocate().unwrap();

        // Mark the first region, then free it. Next-fit must hand out the third (untouched)
        // region before cycling back to the marked one.
        a.bytes_mut()[0] = 0xaa;
        drop(a);

        let c = pool.allocate().unwrap();
        assert_eq!(c.bytes()[0], 0);

        let d = pool.allocate().unwrap();
        assert_eq!(d.bytes()[0], 0xaa);
    }

    #[test]
    fn verify_element_len_rounding() {
        let pool = SharedBufferPool::new(11, 1);
        assert_eq!(pool.element_len(), 12);

        let p = pool.allocate().unwrap();
        assert_eq!(p.capacity(), 12);
    }
}
