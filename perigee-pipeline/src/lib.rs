// Perigee
// Copyright (c) 2025 The Project Perigee Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Perigee crates. Please see the
// workspace manifest for their justification.
#![allow(clippy::manual_range_contains)]
#![allow(clippy::identity_op)]

//! The telemetry block compression pipeline.
//!
//! A producer fills a [`DataBlock`][block::DataBlock] with fixed-point samples and hands it to
//! the [`DataProcessor`][processor::DataProcessor] over a bounded queue. The worker applies the
//! wavelet transform in place, encodes the coefficients into a freshly allocated block, and
//! forwards the result on the output queue. Buffers move by ownership end to end: no payload
//! byte is copied between the producer, the worker, and the consumer.

pub mod block;
pub mod checkpoint;
pub mod processor;
