// Perigee
// Copyright (c) 2025 The Project Perigee Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// State markers of the no-list coder.
///
/// The marker table is a flat array parallel to the coefficient block. Most markers annotate a
/// single coefficient; the `Mn*` markers are stride sentinels placed on the leading index of
/// each lower level of an insignificance tree, letting the scan passes jump whole subtrees in
/// one step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Marker {
    /// Not marked.
    Nm,
    /// The coefficient is insignificant or untested for this bitplane.
    Mip,
    /// The coefficient is newly significant, so it will not be refined for this bitplane.
    Mnp,
    /// The coefficient is significant and will be refined in this bitplane.
    Msp,
    /// Like `Mip`, but applied during partitioning in the IS pass, leading to an immediate test
    /// for significance.
    Mcp,
    /// The coefficient is the first (lowest index) child in a set consisting of all descendants
    /// of its parent.
    Md,
    /// The coefficient is the first (lowest index) grandchild in a set consisting of all
    /// granddescendants of its grandparent coefficient, not including the grandparent itself or
    /// its children.
    Mg,
    Mn2,
    Mn3,
    Mn4,
    Mn5,
    Mn6,
    Mn7,
    Mn8,
    Mn9,
    Mn10,
    Mn11,
    Mn12,
    Mn13,
    Mn14,
}

/// Tree-level sentinels in push order: `TREE_LEVELS[d]` marks the leading node `d + 1`
/// doublings below a set root.
const TREE_LEVELS: [Marker; 13] = [
    Marker::Mn2,
    Marker::Mn3,
    Marker::Mn4,
    Marker::Mn5,
    Marker::Mn6,
    Marker::Mn7,
    Marker::Mn8,
    Marker::Mn9,
    Marker::Mn10,
    Marker::Mn11,
    Marker::Mn12,
    Marker::Mn13,
    Marker::Mn14,
];

impl Marker {
    /// Number of coefficients to jump during the IP and REF passes.
    pub fn skip(self) -> usize {
        match self {
            Marker::Nm | Marker::Mip | Marker::Mnp | Marker::Mcp | Marker::Msp => 1,
            Marker::Md | Marker::Mn2 => 2,
            Marker::Mg | Marker::Mn3 => 4,
            Marker::Mn4 => 8,
            Marker::Mn5 => 16,
            Marker::Mn6 => 32,
            Marker::Mn7 => 64,
            Marker::Mn8 => 128,
            Marker::Mn9 => 256,
            Marker::Mn10 => 512,
            Marker::Mn11 => 1024,
            Marker::Mn12 => 2048,
            Marker::Mn13 => 4096,
            Marker::Mn14 => 8192,
        }
    }

    /// Number of coefficients to jump during the IS pass.
    ///
    /// Pixel markers stride by 2 here: set roots come in pairs, and one set test at the leading
    /// index covers both trees.
    pub fn is_skip(self) -> usize {
        match self {
            Marker::Nm | Marker::Mcp => 1,
            Marker::Md | Marker::Mn2 | Marker::Mip | Marker::Mnp | Marker::Msp => 2,
            Marker::Mg | Marker::Mn3 => 4,
            Marker::Mn4 => 8,
            Marker::Mn5 => 16,
            Marker::Mn6 => 32,
            Marker::Mn7 => 64,
            Marker::Mn8 => 128,
            Marker::Mn9 => 256,
            Marker::Mn10 => 512,
            Marker::Mn11 => 1024,
            Marker::Mn12 => 2048,
            Marker::Mn13 => 4096,
            Marker::Mn14 => 8192,
        }
    }
}

/// Walk down the tree rooted at `start`, marking the leading node of each successive level with
/// an increasing `Mn*` sentinel, until the level starts beyond `len`.
pub fn push(marker: &mut [Marker], start: usize, len: usize) {
    let mut idx = start << 1;
    let mut depth = 0;

    while idx < len {
        marker[idx] = TREE_LEVELS[depth];
        depth += 1;
        idx <<= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{push, Marker};

    #[test]
    fn verify_skip_strides() {
        // Sentinel strides double per tree level.
        let sentinels = [
            Marker::Mn2,
            Marker::Mn3,
            Marker::Mn4,
            Marker::Mn5,
            Marker::Mn6,
            Marker::Mn7,
            Marker::Mn8,
            Marker::Mn9,
            Marker::Mn10,
            Marker::Mn11,
            Marker::Mn12,
            Marker::Mn13,
            Marker::Mn14,
        ];

        for (d, &m) in sentinels.iter().enumerate() {
            assert_eq!(m.skip(), 2 << d);
            assert_eq!(m.is_skip(), 2 << d);
        }

        assert_eq!(Marker::Mip.skip(), 1);
        assert_eq!(Marker::Mip.is_skip(), 2);
        assert_eq!(Marker::Mcp.skip(), 1);
        assert_eq!(Marker::Mcp.is_skip(), 1);
        assert_eq!(Marker::Md.skip(), 2);
        assert_eq!(Marker::Mg.skip(), 4);
    }

    #[test]
    fn verify_push_levels() {
        let mut marker = [Marker::Nm; 64];

        push(&mut marker, 2, 64);

        assert_eq!(marker[4], Marker::Mn2);
        assert_eq!(marker[8], Marker::Mn3);
        assert_eq!(marker[16], Marker::Mn4);
        assert_eq!(marker[32], Marker::Mn5);
        // 64 is out of range; nothing else is touched.
        assert_eq!(marker.iter().filter(|&&m| m != Marker::Nm).count(), 4);
    }

    #[test]
    fn verify_stride_partition() {
        // After seeding the marker table the way an encode does, striding the IP pass visits
        // every pixel marker exactly once and lands exactly at the end of the block.
        let len = 256;
        let dc = 2;

        let mut marker = vec![Marker::Nm; len];
        for m in marker.iter_mut().take(dc) {
            *m = Marker::Mip;
        }
        for i in dc..2 * dc {
            marker[i] = Marker::Md;
            push(&mut marker, i, len);
        }

        let mut visited = 0;
        let mut i = 0;
        while i < len {
            if marker[i] == Marker::Mip {
                visited += 1;
                i += 1;
            }
            else {
                i += marker[i].skip();
            }
        }

        assert_eq!(i, len);
        assert_eq!(visited, dc);
    }
}
