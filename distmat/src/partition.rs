/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Balanced contiguous partitioning of query rows.

use std::ops::Range;

/// A contiguous range of query rows assigned to one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowChunk {
    /// First row of the chunk.
    pub offset: usize,
    /// Number of rows in the chunk. May be zero when there are more
    /// participants than rows.
    pub len: usize,
}

impl RowChunk {
    /// The chunk as a row range.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Split `rows` rows into exactly `parts` contiguous chunks.
///
/// Every chunk has `rows / parts` rows; the first `rows % parts` chunks
/// carry one extra row. Offsets are strictly increasing and the chunks
/// cover `0..rows` without gaps.
///
/// # Panics
///
/// Panics if `parts == 0`.
pub fn partition(rows: usize, parts: usize) -> Vec<RowChunk> {
    assert!(parts != 0, "cannot partition into zero chunks");

    let base = rows / parts;
    let remainder = rows % parts;

    let mut offset = 0;
    (0..parts)
        .map(|part| {
            let len = base + usize::from(part < remainder);
            let chunk = RowChunk { offset, len };
            offset += len;
            chunk
        })
        .collect()
}

///////////
// Tests //
///////////
