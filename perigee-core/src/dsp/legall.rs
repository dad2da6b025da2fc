// Perigee
// Copyright (c) 2025 The Project Perigee Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `legall` module implements the Le Gall 5/3 integer wavelet in lifting form.
//!
//! The forward transform runs on-board in Q16.16 fixed point and is fully in-place: after
//! [`forward`], even positions hold low-pass and odd positions hold high-pass coefficients, and
//! [`reorder`] permutes them into subband order (low-pass first). The floating-point [`inverse`]
//! exists for the ground segment and for verification; it is never run on-board.
//!
//! \[1\] D. Le Gall, A. Tabatabai, "Sub-band coding of digital images using symmetric short
//!       kernel filters and arithmetic coding techniques", ICASSP-88, 1988.
//!
//! <https://ieeexplore.ieee.org/document/157221>

use crate::fixed::Fixed;

/// Forward in-place lifting transform.
///
/// The length of `x` must be even and at least 4. Boundaries are handled by reflection without
/// repeating the edge sample.
pub fn forward(x: &mut [Fixed]) {
    let n = x.len();

    assert!(n >= 4, "transform length must be at least 4");
    assert!(n % 2 == 0, "transform length must be even");

    let one = Fixed::from_num(1);
    let two = Fixed::from_num(2);

    // Predict step: each odd sample becomes a high-pass coefficient, the difference from the
    // mean of its even neighbours.
    for i in (1..n - 1).step_by(2) {
        x[i] = x[i] - ((x[i - 1] + x[i + 1]) >> 1);
    }
    x[n - 1] = x[n - 1] - x[n - 2];

    // Update step: each even sample becomes a low-pass coefficient, lifted by the rounded mean
    // of the surrounding high-pass values.
    x[0] = x[0] + ((x[1] + one) >> 1);
    for i in (2..n - 1).step_by(2) {
        x[i] = x[i] + ((x[i - 1] + x[i + 1] + two) >> 2);
    }
}

/// Permute interleaved lifting output into subband order: the low-pass coefficients (even
/// positions) move to the front half, the high-pass coefficients (odd positions) to the back
/// half, each in ascending order.
///
/// The permutation is a perfect unshuffle, performed in place by half-rotations. The length of
/// `x` must be a power of two.
pub fn reorder<T>(x: &mut [T]) {
    let n = x.len();

    assert!(n.is_power_of_two(), "reorder length must be a power-of-two");

    unshuffle(x);
}

fn unshuffle<T>(x: &mut [T]) {
    let n = x.len();

    if n <= 2 {
        return;
    }

    {
        let (lo, hi) = x.split_at_mut(n / 2);
        unshuffle(lo);
        unshuffle(hi);
    }

    // Each half now holds its evens followed by its odds. Rotating the middle half joins the
    // two even runs and the two odd runs.
    let q = n / 4;
    x[q..n - q].rotate_left(q);
}

fn shuffle<T>(x: &mut [T]) {
    let n = x.len();

    if n <= 2 {
        return;
    }

    let q = n / 4;
    x[q..n - q].rotate_right(q);

    let (lo, hi) = x.split_at_mut(n / 2);
    shuffle(lo);
    shuffle(hi);
}

/// Inverse transform over subband-ordered coefficients, in double precision.
///
/// This is the ground-side reconstruction: un-reorder to the interleaved lifting layout, then
/// undo the update and predict steps in reverse order. The length of `x` must be a power of two
/// and at least 4.
pub fn inverse(x: &mut [f64]) {
    let n = x.len();

    assert!(n >= 4, "transform length must be at least 4");
    assert!(n.is_power_of_two(), "transform length must be a power-of-two");

    shuffle(x);

    // Undo the update step.
    x[0] -= (x[1] + 1.0) / 2.0;
    for i in (2..n - 1).step_by(2) {
        x[i] -= (x[i - 1] + x[i + 1] + 2.0) / 4.0;
    }

    // Undo the predict step.
    for i in (1..n - 1).step_by(2) {
        x[i] += (x[i - 1] + x[i + 1]) / 2.0;
    }
    x[n - 1] += x[n - 2];
}
