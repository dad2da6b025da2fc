// Perigee
// Copyright (c) 2025 The Project Perigee Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;

use log::debug;

use perigee_core::errors::{decode_error, Result};
use perigee_core::io::BitReaderLtr;

use crate::marker::{push, Marker};
use crate::{MAX_LENGTH, MIN_LENGTH};

/// Saturating accumulation into a reconstructed coefficient.
///
/// A well-formed stream never overflows, but the decoder must stay total over arbitrary input.
#[inline(always)]
fn accumulate(coeff: &mut i16, delta: i32) {
    *coeff = (i32::from(*coeff) + delta).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
}

/// No-List SPIHT bit-plane decoder.
///
/// The decoder replays the encoder's passes, consuming one bit wherever the encoder emitted
/// one, and integrates the reconstruction as it goes: `±(s + s/2)` when a coefficient first
/// turns significant at threshold `s`, and a `±s/2` correction per refinement bit.
pub struct NlsDecoder {
    marker: [Marker; MAX_LENGTH],
    signs: [bool; MAX_LENGTH],
}

impl Default for NlsDecoder {
    fn default() -> Self {
        NlsDecoder::new()
    }
}

impl NlsDecoder {
    pub fn new() -> NlsDecoder {
        NlsDecoder { marker: [Marker::Nm; MAX_LENGTH], signs: [false; MAX_LENGTH] }
    }

    /// Decode an embedded bitstream into `out` and return the decoded block length.
    ///
    /// The stream may be truncated at any point past its 12-bit header: decoding integrates
    /// every complete symbol and stops at the end of the input, so a shorter prefix simply
    /// yields a coarser reconstruction.
    ///
    /// Errors with a decode error when `input` cannot hold the stream header. Returns a length
    /// of zero, without touching `out`, when the header's block length is absurd or exceeds
    /// `out`.
    pub fn decode(&mut self, input: &[u8], out: &mut [i16]) -> Result<usize> {
        let mut reader = BitReaderLtr::new(input);

        let Ok(header) = reader.read_bits_leq32(12)
        else {
            return decode_error("nls: stream shorter than the stream header");
        };

        let n = (header >> 8) as i32;
        let dc = ((header >> 4) & 0xf) as usize;
        let exponent = header & 0xf;

        let len = 1usize << exponent;
        if len < MIN_LENGTH || len > MAX_LENGTH || len > out.len() {
            debug!("rejecting stream: block length {} unsupported or beyond the output", len);
            return Ok(0);
        }

        for c in out.iter_mut().take(len) {
            *c = 0;
        }
        for i in 0..len {
            self.marker[i] = Marker::Nm;
            self.signs[i] = false;
        }

        for m in self.marker.iter_mut().take(dc.min(len)) {
            *m = Marker::Mip;
        }
        for i in dc..(dc << 1).min(MAX_LENGTH) {
            self.marker[i] = Marker::Md;
            push(&mut self.marker, i, len);
        }

        // The passes stop mid-plane when the stream runs dry; everything integrated so far is
        // the reconstruction.
        let _ = self.run_passes(&mut reader, out, n, len);

        Ok(len)
    }

    fn run_passes(
        &mut self,
        reader: &mut BitReaderLtr<'_>,
        out: &mut [i16],
        mut n: i32,
        len: usize,
    ) -> io::Result<()> {
        let mut s = 1u32 << n;

        while n >= 0 {
            // Insignificant Pixel Pass.
            let mut j = 0;
            while j < len {
                if self.marker[j] == Marker::Mip {
                    if reader.read_bit()? {
                        let sign = reader.read_bit()?;
                        self.signs[j] = sign;
                        self.marker[j] = Marker::Mnp;
                        accumulate(&mut out[j], sign_factor(sign) * (s + (s >> 1)) as i32);
                    }
                    j += 1;
                }
                else {
                    j += self.marker[j].skip();
                }
            }

            // Insignificant Set Pass.
            j = 0;
            while j < len {
                match self.marker[j] {
                    Marker::Md => {
                        if reader.read_bit()? {
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
                        if reader.read_bit()? {
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
                        if reader.read_bit()? {
                            let sign = reader.read_bit()?;
                            self.signs[j] = sign;
                            self.marker[j] = Marker::Mnp;
                            accumulate(&mut out[j], sign_factor(sign) * (s + (s >> 1)) as i32);
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

            // Refinement Pass.
            j = 0;
            while j < len {
                match self.marker[j] {
                    Marker::Msp => {
                        let delta = if reader.read_bit()? {
                            (s >> 1) as i32
                        }
                        else {
                            (s >> 1) as i32 - s as i32
                        };
                        accumulate(&mut out[j], sign_factor(self.signs[j]) * delta);
                        j += 1;
                    }
                    Marker::Mnp => {
                        self.marker[j] = Marker::Msp;
                        j += 1;
                    }
                    m => {
                        j += m.skip();
                    }
                }
            }

            n -= 1;
            s >>= 1;
        }

        Ok(())
    }
}

/// `+1` for a positive coefficient, `-1` for a negative one.
#[inline(always)]
fn sign_factor(negative: bool) -> i32 {
    1 - 2 * i32::from(negative)
}

#[cfg(test)]
mod tests {
    use super::NlsDecoder;
    use crate::encoder::{NlsEncoder, NlsOptions};

    use perigee_core::io::BitWriterLtr;

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn encode_to_vec(coeffs: &mut [i16], capacity: usize, opts: &NlsOptions) -> Vec<u8> {
        let mut buf = vec![0u8; capacity];
        let mut writer = BitWriterLtr::new(&mut buf);

        let mut encoder = NlsEncoder::new();
        encoder.encode(coeffs, &mut writer, opts);

        let n_bytes = writer.flush();
        buf.truncate(n_bytes);
        buf
    }

    #[test]
    fn verify_roundtrip_exact() {
        let mut rng = SmallRng::seed_from_u64(0xa5a5);

        for &len in &[16usize, 128, 256, 4096] {
            let original: Vec<i16> =
                (0..len).map(|_| rng.random_range(-i16::MAX..=i16::MAX)).collect();

            let mut coeffs = original.clone();
            let stream = encode_to_vec(&mut coeffs, 4 * len + 16, &NlsOptions::default());

            let mut decoded = vec![0i16; len];
            let mut decoder = NlsDecoder::new();
            let n = decoder.decode(&stream, &mut decoded).unwrap();

            assert_eq!(n, len);
            assert_eq!(decoded, original, "len={}", len);
        }
    }

    #[test]
    fn verify_roundtrip_exact_sparse() {
        // Mostly-zero blocks exercise the set partitioning rather than the pixel passes.
        let mut rng = SmallRng::seed_from_u64(0x0b0e);

        for &len in &[64usize, 512] {
            let mut original = vec![0i16; len];
            for _ in 0..len / 16 {
                let idx = rng.random_range(0..len);
                original[idx] = rng.random_range(-3000..=3000);
            }

            let mut coeffs = original.clone();
            let stream = encode_to_vec(&mut coeffs, 4 * len + 16, &NlsOptions::default());

            let mut decoded = vec![0i16; len];
            let mut decoder = NlsDecoder::new();
            decoder.decode(&stream, &mut decoded).unwrap();

            assert_eq!(decoded, original, "len={}", len);
        }
    }

    #[test]
    fn verify_all_zero_block() {
        let len = 256;

        let mut coeffs = vec![0i16; len];
        let stream = encode_to_vec(&mut coeffs, 2 * len, &NlsOptions::default());

        // Header (12 bits) plus one insignificance bit per DC component and one per set test:
        // two bytes in total, all information bits zero.
        assert_eq!(stream.len(), 2);
        assert_eq!(stream[0] & 0x0f, 0x02);
        assert_eq!(stream[1] >> 4, 0x08);
        assert_eq!(stream[1] & 0x0f, 0);

        let mut decoded = vec![1i16; len];
        let mut decoder = NlsDecoder::new();
        let n = decoder.decode(&stream, &mut decoded).unwrap();

        assert_eq!(n, len);
        assert!(decoded.iter().all(|&c| c == 0));
    }

    #[test]
    fn verify_single_max_sample() {
        let len = 16;

        let mut coeffs = vec![0i16; len];
        coeffs[0] = i16::MAX;

        let original = coeffs.clone();
        let stream = encode_to_vec(&mut coeffs, 4 * len, &NlsOptions::default());

        // The initial bitplane must be 14 with the default two DC components.
        assert_eq!(stream[0], 0xe2);
        assert_eq!(stream[1] >> 4, 4);

        let mut decoded = vec![0i16; len];
        let mut decoder = NlsDecoder::new();
        decoder.decode(&stream, &mut decoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn verify_truncated_stream_degrades() {
        let len = 128;
        let original: Vec<i16> = (0..len)
            .map(|i| ((f64::from(i as i32) * std::f64::consts::TAU / 32.0).sin() * 1000.0) as i16)
            .collect();

        let full = {
            let mut coeffs = original.clone();
            encode_to_vec(&mut coeffs, 4 * len, &NlsOptions::default())
        };

        let errs: Vec<i32> = [32usize, 64, 128]
            .iter()
            .map(|&budget| {
                let mut coeffs = original.clone();
                let stream = encode_to_vec(
                    &mut coeffs,
                    4 * len,
                    &NlsOptions { dc_components: 2, max_bytes: budget },
                );

                assert!(stream.len() <= full.len());

                let mut decoded = vec![0i16; len];
                let mut decoder = NlsDecoder::new();
                decoder.decode(&stream, &mut decoded).unwrap();

                original
                    .iter()
                    .zip(decoded.iter())
                    .map(|(&a, &b)| (i32::from(a) - i32::from(b)).abs())
                    .max()
                    .unwrap()
            })
            .collect();

        // The tightest budget truncates several bitplanes short, so its reconstruction is
        // coarse; quadrupling the budget reaches deeper planes and shrinks the error.
        assert!(errs[0] > 0);
        assert!(errs[2] <= errs[0], "errs={:?}", errs);
    }

    #[test]
    fn verify_decode_rejects_short_header() {
        let mut decoder = NlsDecoder::new();
        let mut out = [0i16; 16];

        assert!(decoder.decode(&[0xe2], &mut out).is_err());
        assert!(decoder.decode(&[], &mut out).is_err());
    }

    #[test]
    fn verify_decode_absurd_length() {
        let mut decoder = NlsDecoder::new();
        let mut out = [0i16; 16];

        // Exponent 2 -> block length 4: below the supported minimum.
        let short = [0xe2, 0x20];
        assert_eq!(decoder.decode(&short, &mut out).unwrap(), 0);

        // Exponent 5 -> block length 32: exceeds the output buffer.
        let wide = [0xe2, 0x50];
        assert_eq!(decoder.decode(&wide, &mut out).unwrap(), 0);
    }

    #[test]
    fn verify_decode_is_bit_exact_with_headroom() {
        // A large block together with a 16 kB output buffer reproduces the coefficients
        // bit-for-bit.
        let mut rng = SmallRng::seed_from_u64(0x4096);

        let len = 4096;
        let original: Vec<i16> = (0..len).map(|_| rng.random_range(-512..=512)).collect();

        let mut coeffs = original.clone();
        let stream = encode_to_vec(&mut coeffs, 16384, &NlsOptions::default());

        let mut decoded = vec![0i16; len];
        let mut decoder = NlsDecoder::new();
        decoder.decode(&stream, &mut decoded).unwrap();

        assert_eq!(decoded, original);
    }
}
