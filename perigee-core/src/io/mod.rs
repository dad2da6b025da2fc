// Perigee
// Copyright (c) 2025 The Project Perigee Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module implements bit-level I/O over byte slices.
//!
//! Both the reader and the writer consume bits from most-significant to least-significant within
//! each byte: if N bits are written then bit 0, the first bit written, is the most-significant
//! bit of the first byte. This is the bit order of the encoded telemetry stream.

mod bit;

pub use bit::{BitReaderLtr, BitWriterLtr};
