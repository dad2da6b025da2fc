// Perigee
// Copyright (c) 2025 The Project Perigee Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Perigee.
///
/// The transform and the encoder are total over valid inputs and report nothing; transient
/// pipeline conditions are recovered locally and surfaced as counters. What remains is the
/// decode path, which must stay defensive against malformed downlinked data. Bit-level reads
/// and writes use `std::io::Result` internally, and running out of bits is converted into
/// normal truncation handling before it could ever surface here.
#[derive(Debug)]
pub enum Error {
    /// The stream contained malformed data and could not be decoded.
    DecodeError(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::DecodeError(msg) => {
                write!(f, "malformed stream: {}", msg)
            }
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a decode error.
pub fn decode_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::DecodeError(desc))
}
