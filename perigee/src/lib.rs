// Perigee
// Copyright (c) 2025 The Project Perigee Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! # Project Perigee
//!
//! Perigee is a pure Rust compression core for spacecraft time-series telemetry. It reduces the
//! bandwidth needed to downlink sensor samples by combining a fixed-point Le Gall 5/3 integer
//! wavelet with a No-List SPIHT bit-plane coder, and carries sample blocks from producer to
//! downlink queue through pooled, zero-copy buffers.
//!
//! # Crates
//!
//! The project is split into one crate per concern, all re-exported here:
//!
//! * [`core`]: fixed-point arithmetic, bit-level I/O, the wavelet, and the buffer pool.
//! * [`nls`]: the NLS-SPIHT encoder and decoder.
//! * [`pipeline`]: the data block, the cooperative checkpoint, and the worker thread.
//!
//! # Usage
//!
//! A producer allocates a block from a pool, fills it with Q16.16 samples and sends it to the
//! worker; the worker transforms, encodes and forwards it:
//!
//! ```no_run
//! use crossbeam::channel::bounded;
//! use perigee::core::buf::SharedBufferPool;
//! use perigee::core::fixed::Fixed;
//! use perigee::pipeline::block::{Blocksize, DataBlock, SamplingRate};
//! use perigee::pipeline::processor::{DataProcessor, ProcessorConfig, ENCODING_BUFFER_LENGTH};
//!
//! let pool = SharedBufferPool::new(ENCODING_BUFFER_LENGTH, 8);
//!
//! let (block_tx, block_rx) = bounded(4);
//! let (downlink_tx, _downlink_rx) = bounded(4);
//!
//! let processor =
//!     DataProcessor::new(pool.clone(), block_rx, downlink_tx, ProcessorConfig::default());
//! let handle = processor.spawn();
//! handle.enable();
//!
//! let mut block =
//!     DataBlock::new(pool.allocate().unwrap(), 42, 0, SamplingRate::Hz1, Blocksize::Bs16);
//! for s in 0..16 {
//!     block.push(Fixed::from_num(s));
//! }
//! block_tx.send(block).unwrap();
//! ```

pub use perigee_codec_nls as nls;
pub use perigee_core as core;
pub use perigee_pipeline as pipeline;
