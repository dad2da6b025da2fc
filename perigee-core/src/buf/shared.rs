// Perigee
// Copyright (c) 2025 The Project Perigee Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::mem;
use std::sync::Arc;

use super::pool::PoolInner;

/// An exclusive handle to one pooled byte region.
///
/// The handle checks the region out of its pool on allocation and checks it back in when
/// dropped. While the handle is live no other handle to the region can exist, so mutation
/// needs no locking: single-writer access is a property of the type.
pub struct SharedBufferPtr {
    /// The region storage. Backed by `u32` words so that 4-byte typed views at 4-aligned byte
    /// offsets are always valid. Swapped for an empty box on drop.
    data: Box<[u32]>,
    type_id: u16,
    slot: usize,
    pool: Arc<PoolInner>,
}

impl std::fmt::Debug for SharedBufferPtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBufferPtr")
            .field("len", &self.data.len())
            .field("type_id", &self.type_id)
            .field("slot", &self.slot)
            .finish()
    }
}

impl SharedBufferPtr {
    pub(super) fn new(data: Box<[u32]>, slot: usize, pool: Arc<PoolInner>) -> SharedBufferPtr {
        SharedBufferPtr { data, type_id: 0, slot, pool }
    }

    /// The byte capacity of the region.
    pub fn capacity(&self) -> usize {
        self.data.len() * 4
    }

    /// The length of the view in bytes. For a pool handle this is the whole region.
    pub fn len(&self) -> usize {
        self.capacity()
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An opaque consumer-assigned tag describing the contents of the region.
    pub fn type_id(&self) -> u16 {
        self.type_id
    }

    pub fn set_type_id(&mut self, type_id: u16) {
        self.type_id = type_id;
    }

    /// The region contents.
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// The region contents, mutably.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.data)
    }

    /// Narrow the handle to a sub-range view. The handle itself is consumed and kept alive by
    /// the child, so the region stays checked out until the child is dropped. When the range
    /// exceeds the region the handle is returned unchanged in the error.
    pub fn sub(self, offset: usize, len: usize) -> Result<SharedChildPtr, SharedBufferPtr> {
        if offset + len > self.capacity() {
            return Err(self);
        }

        Ok(SharedChildPtr { parent: self, offset, len, type_id: 0 })
    }
}

impl Drop for SharedBufferPtr {
    fn drop(&mut self) {
        let data = mem::take(&mut self.data);

        // The empty box is left behind by a previous drop of a moved-out handle; never check
        // it back in.
        if !data.is_empty() {
            self.pool.release(self.slot, data);
        }
    }
}

/// A sub-range view over a pooled region.
///
/// A child owns its parent handle, so the region cannot return to the pool while any child is
/// live. Children are always rooted directly in the pool handle: narrowing a child re-roots the
/// new child on the same parent rather than chaining views.
pub struct SharedChildPtr {
    parent: SharedBufferPtr,
    offset: usize,
    len: usize,
    type_id: u16,
}

impl std::fmt::Debug for SharedChildPtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedChildPtr")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("type_id", &self.type_id)
            .finish()
    }
}

impl SharedChildPtr {
    /// The byte offset of the view within the parent region.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The length of the view in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// An opaque consumer-assigned tag describing the contents of the view.
    pub fn type_id(&self) -> u16 {
        self.type_id
    }

    pub fn set_type_id(&mut self, type_id: u16) {
        self.type_id = type_id;
    }

    /// The bytes of the view.
    pub fn bytes(&self) -> &[u8] {
        &self.parent.bytes()[self.offset..self.offset + self.len]
    }

    /// The bytes of the view, mutably.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        let (offset, len) = (self.offset, self.len);
        &mut self.parent.bytes_mut()[offset..offset + len]
    }

    /// Narrow further. The new child is re-rooted on the original pool handle; offsets are
    /// relative to this view. Returns the child unchanged when the range does not fit.
    pub fn sub(self, offset: usize, len: usize) -> Result<SharedChildPtr, SharedChildPtr> {
        if offset + len > self.len {
            return Err(self);
        }

        let abs = self.offset + offset;
        Ok(SharedChildPtr { parent: self.parent, offset: abs, len, type_id: 0 })
    }

    /// Release the view and recover the pool handle.
    pub fn into_parent(self) -> SharedBufferPtr {
        self.parent
    }
}

#[cfg(test)]
mod tests {
    use crate::buf::SharedBufferPool;

    #[test]
    fn verify_child_keeps_region_checked_out() {
        let pool = SharedBufferPool::new(32, 1);

        let p = pool.allocate().unwrap();
        let child = p.sub(4, 8).unwrap();

        // The region must not return to the pool while the child is live.
        assert_eq!(pool.free(), 0);
        assert!(pool.allocate().is_none());

        let p = child.into_parent();
        assert_eq!(pool.free(), 0);

        drop(p);
        assert_eq!(pool.free(), 1);
    }

    #[test]
    fn verify_child_view_window() {
        let pool = SharedBufferPool::new(16, 1);

        let mut p = pool.allocate().unwrap();
        for (i, b) in p.bytes_mut().iter_mut().enumerate() {
            *b = i as u8;
        }

        let mut child = p.sub(4, 8).unwrap();
        assert_eq!(child.len(), 8);
        assert_eq!(child.bytes(), &[4, 5, 6, 7, 8, 9, 10, 11]);

        child.bytes_mut()[0] = 0xff;

        // Narrowing re-roots on the pool handle with an absolute offset.
        let grandchild = child.sub(2, 4).unwrap();
        assert_eq!(grandchild.offset(), 6);
        assert_eq!(grandchild.bytes(), &[6, 7, 8, 9]);

        let p = grandchild.into_parent();
        assert_eq!(p.bytes()[4], 0xff);
    }

    #[test]
    fn verify_sub_bounds() {
        let pool = SharedBufferPool::new(16, 1);

        let p = pool.allocate().unwrap();
        let p = p.sub(8, 16).unwrap_err();
        assert!(p.sub(0, 16).is_ok());
    }

    #[test]
    fn verify_type_id() {
        let pool = SharedBufferPool::new(16, 1);

        let mut p = pool.allocate().unwrap();
        assert_eq!(p.type_id(), 0);

        p.set_type_id(7);
        assert_eq!(p.type_id(), 7);
    }
}
