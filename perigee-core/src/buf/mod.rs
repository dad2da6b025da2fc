// Perigee
// Copyright (c) 2025 The Project Perigee Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `buf` module implements pooled shared byte buffers.
//!
//! A [`SharedBufferPool`] owns a fixed set of equally-sized byte regions allocated once at
//! construction. [`SharedBufferPool::allocate`] checks a free region out of the pool as a
//! [`SharedBufferPtr`]; dropping the handle checks it back in. Ownership of the handle is the
//! reference count: a region is reusable exactly when no handle to it is live, and a live handle
//! is always exclusive, so hand-off between threads is a move with no copies and no locks beyond
//! the pool's own allocation mutex.

mod pool;
mod ring;
mod shared;

pub use pool::SharedBufferPool;
pub use ring::SharedRingBuffer;
pub use shared::{SharedBufferPtr, SharedChildPtr};
