// Perigee
// Copyright (c) 2025 The Project Perigee Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;

use perigee_core::io::BitWriterLtr;

use crate::marker::{push, Marker};
use crate::MAX_LENGTH;

/// Encoder configuration.
#[derive(Clone, Copy, Debug)]
pub struct NlsOptions {
    /// Number of leading coefficients treated as DC components, outside the hierarchical trees.
    /// Clamped to the 4-bit header range.
    pub dc_components: u8,
    /// Maximum number of output bytes. `0` means as much as fits in the output buffer. The
    /// effective budget is the smaller of this bound and the writer capacity.
    pub max_bytes: usize,
}

impl Default for NlsOptions {
    fn default() -> Self {
        NlsOptions { dc_components: 2, max_bytes: 0 }
    }
}

/// The magnitude of a coefficient, saturated to the positive `i16` range.
#[inline(always)]
fn mag(coeff: i16) -> u16 {
    coeff.unsigned_abs().min(i16::MAX as u16)
}

/// No-List SPIHT bit-plane encoder.
///
/// All working state is owned by the instance and overwritten on every call, so a single
/// long-lived encoder serves any number of blocks without allocating.
pub struct NlsEncoder {
    marker: [Marker; MAX_LENGTH],
    /// `dmax[i]` is the maximum magnitude among all descendants of the tree rooted at `i`
    /// (children at `2i` and `2i + 1`), including the root pair itself.
    dmax: [u16; MAX_LENGTH / 2],
    /// `gmax[i]` is the maximum magnitude among the granddescendants of `i` and deeper.
    gmax: [u16; MAX_LENGTH / 4],
}

impl Default for NlsEncoder {
    fn default() -> Self {
        NlsEncoder::new()
    }
}

impl NlsEncoder {
    pub fn new() -> NlsEncoder {
        NlsEncoder {
            marker: [Marker::Nm; MAX_LENGTH],
            dmax: [0; MAX_LENGTH / 2],
            gmax: [0; MAX_LENGTH / 4],
        }
    }

    /// Encode a coefficient block into `writer` as an embedded bitstream.
    ///
    /// The stream opens with a 12-bit header (initial bitplane, DC component count, block size
    /// exponent) followed by the insignificant-pixel, insignificant-set and refinement passes of
    /// each bitplane, from the most significant plane down.
    ///
    /// Once a coefficient's sign bit has been emitted the coefficient is replaced by its
    /// absolute value, so `input` is consumed by the call.
    ///
    /// A full writer or an exhausted byte budget terminates the encode; the bits emitted up to
    /// that point form a valid truncated stream. Call [`BitWriterLtr::flush`] afterwards to
    /// commit the final partial byte.
    pub fn encode(&mut self, input: &mut [i16], writer: &mut BitWriterLtr<'_>, opts: &NlsOptions) {
        let len = input.len();

        assert!(len.is_power_of_two(), "block length must be a power-of-two");
        assert!(len >= crate::MIN_LENGTH && len <= MAX_LENGTH, "block length out of range");

        // A full writer is the normal end of a truncated encode, not a failure.
        let _ = self.encode_inner(input, writer, opts);
    }

    fn encode_inner(
        &mut self,
        input: &mut [i16],
        writer: &mut BitWriterLtr<'_>,
        opts: &NlsOptions,
    ) -> io::Result<()> {
        let len = input.len();

        let dc = (usize::from(opts.dc_components)).min(15).min(len / 2);

        let max_bytes = match opts.max_bytes {
            0 => writer.capacity(),
            m => m.min(writer.capacity()),
        };

        // Overall maximum magnitude decides the initial bitplane.
        let mut max = 0u16;
        for &c in input.iter() {
            max = max.max(mag(c));
        }

        // Set maxima, computed leaves-first so each entry can fold in the maxima of the level
        // below it.
        self.dmax[0] = 0;
        self.gmax[0] = 0;

        let mut i = len - 1;
        while i >= 2 {
            let pair = mag(input[i - 1]).max(mag(input[i]));

            self.dmax[i >> 1] = if i < len >> 1 {
                pair.max(self.dmax[i]).max(self.dmax[i - 1])
            }
            else {
                pair
            };

            i -= 2;
        }

        for i in 1..len >> 2 {
            self.gmax[i] = self.dmax[i << 1].max(self.dmax[(i << 1) + 1]);
        }

        // Number of bitplanes.
        let mut n: i32 = if max > 0 { 15 - max.leading_zeros() as i32 } else { 0 };
        let mut s = 1u16 << n;

        // Stream header: initial bitplane, DC component count, block size exponent.
        writer.write_bits_leq32(n as u32, 4)?;
        writer.write_bits_leq32(dc as u32, 4)?;
        writer.write_bits_leq32(len.trailing_zeros(), 4)?;

        // Initialize the state marker table: DC components ahead of the trees, a set root pair
        // per DC component, sentinels down each tree, nothing else marked.
        for m in self.marker.iter_mut().take(dc) {
            *m = Marker::Mip;
        }
        for i in dc..dc << 1 {
            self.marker[i] = Marker::Md;
            push(&mut self.marker, i, len);
        }
        for m in self.marker.iter_mut().take(len).skip(dc << 1) {
            *m = Marker::Nm;
        }

        // Iterate over all bitplanes.
        while n >= 0 {
            // Insignificant Pixel Pass.
            let mut j = 0;
            while j < len {
                if self.marker[j] == Marker::Mip {
                    let sig = mag(input[j]) >= s;
                    writer.write_bit(sig)?;
                    if sig {
                        writer.write_bit(input[j] < 0)?;
                        self.marker[j] = Marker::Mnp;
                        input[j] = mag(input[j]) as i16;
                    }
                    j += 1;
                }
                else {
                    j += self.marker[j].skip();
                }
            }

            if writer.bytes_written() > max_bytes {
                break;
            }

            // Insignificant Set Pass: walk the sets and inspect indices marked Md, Mg and Mcp.
            j = 0;
            while j < len {
                match self.marker[j] {
                    Marker::Md => {
                        let sig = self.dmax[j >> 1] >= s;
                        writer.write_bit(sig)?;
                        if sig {
                            // The root pair is tested immediately; the set of their children
                            // and deeper becomes a granddescendant set.
                            self.marker[j] = Marker::Mcp;
                            self.marker[j + 1] = Marker::Mcp;
                            if (j << 1) < len {
                                self.marker[j << 1] = Marker::Mg;
                            }
                        }
                        else {
                            j += 2;
                        }
                    }
                    Marker::Mg => {
                        let sig = self.gmax[j >> 2] >= s;
                        writer.write_bit(sig)?;
                        if sig {
                            // Partition into two descendant sets, one per child pair.
                            self.marker[j] = Marker::Md;
                            self.marker[j + 2] = Marker::Md;
                            push(&mut self.marker, j, len);
                            push(&mut self.marker, j + 2, len);
                        }
                        else {
                            j += 4;
                        }
                    }
                    Marker::Mcp => {
                        let sig = mag(input[j]) >= s;
                        writer.write_bit(sig)?;
                        if sig {
                            writer.write_bit(input[j] < 0)?;
                            self.marker[j] = Marker::Mnp;
                            input[j] = mag(input[j]) as i16;
                        }
                        else {
                            self.marker[j] = Marker::Mip;
                        }
                        j += 1;
                    }
                    m => {
                        j += m.is_skip();
                    }
                }
            }

            if writer.bytes_written() > max_bytes {
                break;
            }

            // Refinement Pass.
            j = 0;
            while j < len {
                match self.marker[j] {
                    Marker::Msp => {
                        writer.write_bit(input[j] as u16 & s != 0)?;
                        j += 1;
                    }
                    Marker::Mnp => {
                        // Newly significant coefficients are refined from the next plane on.
                        self.marker[j] = Marker::Msp;
                        j += 1;
                    }
                    m => {
                        j += m.skip();
                    }
                }
            }

            if writer.bytes_written() > max_bytes {
                break;
            }

            n -= 1;
            s >>= 1;
        }

        Ok(())
    }
}
