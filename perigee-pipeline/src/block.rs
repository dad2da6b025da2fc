// Perigee
// Copyright (c) 2025 The Project Perigee Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `block` module defines the telemetry data block and its wire header.

use perigee_codec_nls::{NlsEncoder, NlsOptions};
use perigee_core::buf::SharedBufferPtr;
use perigee_core::dsp::legall;
use perigee_core::fixed::Fixed;
use perigee_core::io::BitWriterLtr;

/// The size of the wire header in bytes: scheme, parameter id and start time.
pub const HEADER_SIZE: usize = 11;

/// The byte offset of the block payload.
///
/// The byte between the header and the payload is the stream prelude: the sampling rate and
/// block size nibbles. It also pads the payload to a 4-byte boundary so fixed-point sample
/// views are always aligned.
pub const DATA_OFFSET: usize = HEADER_SIZE + 1;

/// The sampling rate of a telemetry parameter, as a 4-bit wire code.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum SamplingRate {
    Disabled = 0,
    /// One sample every 30 seconds.
    Hz0033 = 1,
    Hz01 = 2,
    Hz05 = 3,
    Hz1 = 4,
    Hz2 = 5,
    Hz5 = 6,
    Hz10 = 7,
}

impl SamplingRate {
    /// Decode a 4-bit wire code. Codes 8 through 15 are reserved.
    pub fn from_bits(bits: u8) -> Option<SamplingRate> {
        match bits {
            0 => Some(SamplingRate::Disabled),
            1 => Some(SamplingRate::Hz0033),
            2 => Some(SamplingRate::Hz01),
            3 => Some(SamplingRate::Hz05),
            4 => Some(SamplingRate::Hz1),
            5 => Some(SamplingRate::Hz2),
            6 => Some(SamplingRate::Hz5),
            7 => Some(SamplingRate::Hz10),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// The nominal sample count of a block, as a 4-bit wire code.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Blocksize {
    Disabled = 0,
    Bs16 = 1,
    Bs128 = 2,
    Bs256 = 3,
    Bs512 = 4,
    Bs1024 = 5,
    Bs2048 = 6,
    Bs4096 = 7,
}

impl Blocksize {
    /// Decode a 4-bit wire code. Codes 8 through 15 are reserved.
    pub fn from_bits(bits: u8) -> Option<Blocksize> {
        match bits {
            0 => Some(Blocksize::Disabled),
            1 => Some(Blocksize::Bs16),
            2 => Some(Blocksize::Bs128),
            3 => Some(Blocksize::Bs256),
            4 => Some(Blocksize::Bs512),
            5 => Some(Blocksize::Bs1024),
            6 => Some(Blocksize::Bs2048),
            7 => Some(Blocksize::Bs4096),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// The number of samples in a complete block, or 0 when disabled.
    pub fn sample_count(self) -> u16 {
        match self {
            Blocksize::Disabled => 0,
            Blocksize::Bs16 => 16,
            Blocksize::Bs128 => 128,
            Blocksize::Bs256 => 256,
            Blocksize::Bs512 => 512,
            Blocksize::Bs1024 => 1024,
            Blocksize::Bs2048 => 2048,
            Blocksize::Bs4096 => 4096,
        }
    }
}

/// The compression scheme recorded in the wire header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum CompressionScheme {
    Raw = 0,
    WaveletNls = 1,
}

impl CompressionScheme {
    pub fn from_bits(bits: u8) -> Option<CompressionScheme> {
        match bits {
            0 => Some(CompressionScheme::Raw),
            1 => Some(CompressionScheme::WaveletNls),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// A telemetry data block: one pooled buffer plus the metadata describing its contents.
///
/// A block advances through three states, never backwards: raw samples are pushed by the
/// producer, the wavelet transform rewrites them as coefficients in place, and encoding fills a
/// second block with the embedded bitstream. The payload accessors are state-indexed; outside
/// the matching state they return an empty slice.
pub struct DataBlock {
    ptr: SharedBufferPtr,
    sample_count: u16,
    parameter_id: u16,
    /// Milliseconds since the GPS epoch of the first sample.
    start_time: i64,
    sampling_rate: SamplingRate,
    blocksize: Blocksize,
    scheme: CompressionScheme,
    is_transformed: bool,
    is_encoded: bool,
}

impl DataBlock {
    pub fn new(
        ptr: SharedBufferPtr,
        parameter_id: u16,
        start_time: i64,
        sampling_rate: SamplingRate,
        blocksize: Blocksize,
    ) -> DataBlock {
        DataBlock {
            ptr,
            sample_count: 0,
            parameter_id,
            start_time,
            sampling_rate,
            blocksize,
            scheme: CompressionScheme::Raw,
            is_transformed: false,
            is_encoded: false,
        }
    }

    pub fn sample_count(&self) -> u16 {
        self.sample_count
    }

    pub fn parameter_id(&self) -> u16 {
        self.parameter_id
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn sampling_rate(&self) -> SamplingRate {
        self.sampling_rate
    }

    pub fn blocksize(&self) -> Blocksize {
        self.blocksize
    }

    pub fn scheme(&self) -> CompressionScheme {
        self.scheme
    }

    pub fn is_transformed(&self) -> bool {
        self.is_transformed
    }

    pub fn is_encoded(&self) -> bool {
        self.is_encoded
    }

    /// The capacity of the underlying buffer in bytes.
    pub fn max_size(&self) -> usize {
        self.ptr.capacity()
    }

    /// Whether the block holds its nominal number of samples.
    pub fn is_complete(&self) -> bool {
        self.sample_count > 0 && self.sample_count == self.blocksize.sample_count()
    }

    /// Whether the underlying buffer can hold a complete block of this block size.
    pub fn is_valid(&self) -> bool {
        self.blocksize != Blocksize::Disabled
            && self.ptr.capacity()
                >= DATA_OFFSET + usize::from(self.blocksize.sample_count()) * 4
    }

    /// Append one sample. Valid only while the block is raw and not yet complete.
    pub fn push(&mut self, sample: Fixed) -> bool {
        if self.is_transformed || self.is_encoded || self.is_complete() || !self.is_valid() {
            return false;
        }

        let idx = usize::from(self.sample_count);
        let n = usize::from(self.blocksize.sample_count());

        let payload = &mut self.ptr.bytes_mut()[DATA_OFFSET..DATA_OFFSET + 4 * n];

        let Ok(samples) = bytemuck::try_cast_slice_mut::<u8, Fixed>(payload)
        else {
            return false;
        };

        samples[idx] = sample;
        self.sample_count += 1;
        true
    }

    /// The raw samples. Empty unless the block is in the raw state.
    pub fn samples(&self) -> &[Fixed] {
        if self.is_transformed || self.is_encoded {
            return &[];
        }

        let n = usize::from(self.sample_count);
        bytemuck::try_cast_slice(&self.ptr.bytes()[DATA_OFFSET..DATA_OFFSET + 4 * n])
            .unwrap_or_default()
    }

    /// The wavelet coefficients. Empty unless the block is transformed and not yet encoded.
    pub fn coefficients(&self) -> &[i16] {
        if !self.is_transformed || self.is_encoded {
            return &[];
        }

        let n = usize::from(self.sample_count);
        bytemuck::try_cast_slice(&self.ptr.bytes()[DATA_OFFSET..DATA_OFFSET + 2 * n])
            .unwrap_or_default()
    }

    /// The encoded block: wire header, prelude byte and bitstream. Empty unless encoded.
    pub fn encoded_bytes(&self) -> &[u8] {
        if !self.is_encoded {
            return &[];
        }

        &self.ptr.bytes()[..HEADER_SIZE + usize::from(self.sample_count)]
    }

    /// Transform the samples into wavelet coefficients in place.
    ///
    /// The lifting steps run over the Q16.16 samples, the interleaved output is permuted into
    /// subband order, and each coefficient is truncated to its 16-bit integer part. Afterwards
    /// the payload holds `sample_count` packed `i16` coefficients.
    ///
    /// A no-op returning false unless the block is raw and complete.
    pub fn apply_wavelet_transform(&mut self) -> bool {
        if self.is_transformed || self.is_encoded || !self.is_complete() {
            return false;
        }

        let n = usize::from(self.sample_count);

        let payload = &mut self.ptr.bytes_mut()[DATA_OFFSET..DATA_OFFSET + 4 * n];

        let Ok(samples) = bytemuck::try_cast_slice_mut::<u8, Fixed>(payload)
        else {
            return false;
        };

        legall::forward(samples);
        legall::reorder(samples);

        // Truncate each coefficient to i16 and pack the results to the front of the payload.
        // Slot k is rewritten from slots 2k and 2k + 1, so reads always run ahead of writes.
        for k in 0..n / 2 {
            let a = samples[2 * k].to_num().to_ne_bytes();
            let b = samples[2 * k + 1].to_num().to_ne_bytes();
            samples[k] = Fixed::from_raw(i32::from_ne_bytes([a[0], a[1], b[0], b[1]]));
        }

        self.is_transformed = true;
        true
    }

    /// Encode the coefficients of this block into `out` as an embedded bitstream.
    ///
    /// The bit payload is written first, from the data offset; the wire header and the prelude
    /// byte then overwrite the leading bytes. On success `out` is in the encoded state, its
    /// `sample_count` holding the encoded length (prelude plus bitstream) in bytes.
    ///
    /// Returns false, changing nothing, unless this block is transformed and not yet encoded,
    /// and `out` can hold at least `HEADER_SIZE + 2 * sample_count` bytes.
    pub fn encode(
        &mut self,
        out: &mut DataBlock,
        encoder: &mut NlsEncoder,
        opts: &NlsOptions,
    ) -> bool {
        let n = usize::from(self.sample_count);

        if !self.is_transformed || self.is_encoded || out.is_encoded {
            return false;
        }
        if out.max_size() < HEADER_SIZE + 2 * n {
            return false;
        }

        // Payload first.
        let n_payload_bytes = {
            let coeffs_region = &mut self.ptr.bytes_mut()[DATA_OFFSET..DATA_OFFSET + 2 * n];

            let Ok(coeffs) = bytemuck::try_cast_slice_mut::<u8, i16>(coeffs_region)
            else {
                return false;
            };

            let (_, out_payload) = out.ptr.bytes_mut().split_at_mut(DATA_OFFSET);

            let mut writer = BitWriterLtr::new(out_payload);
            encoder.encode(coeffs, &mut writer, opts);
            writer.flush()
        };

        // Then the header overwrites the leading bytes.
        let out_bytes = out.ptr.bytes_mut();
        out_bytes[0] = CompressionScheme::WaveletNls.bits();
        out_bytes[1..3].copy_from_slice(&self.parameter_id.to_be_bytes());
        out_bytes[3..11].copy_from_slice(&(self.start_time as u64).to_be_bytes());
        out_bytes[11] = self.sampling_rate.bits() | (self.blocksize.bits() << 4);

        out.sample_count = (1 + n_payload_bytes) as u16;
        out.scheme = CompressionScheme::WaveletNls;
        out.is_encoded = true;

        true
    }
}
