/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Framing for tables crossing process boundaries.
//!
//! Every transfer is one frame:
//! - `tag` (u8): which transfer this is
//! - `source` (u64 LE): the sending rank
//! - `rows` (u64 LE), `cols` (u64 LE)
//! - payload: `rows x cols` scalars, tightly packed in row-major order
//!
//! Any framing mismatch is fatal; the layer never redelivers.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use distmat_utils::Matrix;
use distmat_vector::Scalar;

use crate::error::{Error, Result};

use super::Rank;

/// Distinguishes the three transfers of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    /// Coordinator to worker: the worker's query chunk.
    Query = 1,
    /// Coordinator to worker: the full dataset.
    Dataset = 2,
    /// Worker to coordinator: the computed result block.
    Result = 3,
}

impl Tag {
    /// Returns the string representation of the tag.
    pub const fn as_str(self) -> &'static str {
        match self {
            Tag::Query => "query",
            Tag::Dataset => "dataset",
            Tag::Result => "result",
        }
    }

    fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Tag::Query),
            2 => Some(Tag::Dataset),
            3 => Some(Tag::Result),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One table in flight between two ranks.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<T> {
    /// Which transfer this frame carries.
    pub tag: Tag,
    /// The sending rank.
    pub source: Rank,
    /// The table payload.
    pub table: Matrix<T>,
}

impl<T> Frame<T> {
    /// Construct a frame.
    pub fn new(tag: Tag, source: Rank, table: Matrix<T>) -> Self {
        Self { tag, source, table }
    }
}

/// Serialize a frame to `writer`.
pub fn write_frame<T: Scalar, W: Write>(writer: &mut W, frame: &Frame<T>) -> Result<()> {
    let io = |err| Error::with_source(crate::ErrorKind::Transport, "failed to write frame", err);

    writer.write_u8(frame.tag as u8).map_err(io)?;
    writer.write_u64::<LittleEndian>(frame.source).map_err(io)?;
    writer
        .write_u64::<LittleEndian>(frame.table.nrows() as u64)
        .map_err(io)?;
    writer
        .write_u64::<LittleEndian>(frame.table.ncols() as u64)
        .map_err(io)?;
    writer
        .write_all(bytemuck::cast_slice::<T, u8>(frame.table.as_slice()))
        .map_err(io)?;
    writer.flush().map_err(io)
}

/// Deserialize one frame from `reader`.
///
/// The declared shape is validated before the payload is allocated; a
/// truncated or oversized payload is a fatal transport error.
pub fn read_frame<T: Scalar, R: Read>(reader: &mut R) -> Result<Frame<T>> {
    let io = |err| Error::with_source(crate::ErrorKind::Transport, "failed to read frame", err);

    let tag = reader.read_u8().map_err(io)?;
    let tag =
        Tag::from_u8(tag).ok_or_else(|| Error::transport(format!("unknown frame tag {tag}")))?;
    let source = reader.read_u64::<LittleEndian>().map_err(io)?;
    let rows = reader.read_u64::<LittleEndian>().map_err(io)?;
    let cols = reader.read_u64::<LittleEndian>().map_err(io)?;

    let (rows, cols) = usize::try_from(rows)
        .ok()
        .zip(usize::try_from(cols).ok())
        .ok_or_else(|| {
            Error::transport(format!("frame shape {rows}x{cols} does not fit this host"))
        })?;
    rows.checked_mul(cols)
        .and_then(|n| n.checked_mul(std::mem::size_of::<T>()))
        .ok_or_else(|| Error::transport(format!("frame shape {rows}x{cols} overflows")))?;

    let mut table = Matrix::new(T::ZERO, rows, cols);
    reader
        .read_exact(bytemuck::cast_slice_mut::<T, u8>(table.as_mut_slice()))
        .map_err(io)?;

    Ok(Frame { tag, source, table })
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn frame_round_trip() {
        let table = Matrix::try_from(vec![1i32, 2, 3, 4, 5, 6].into(), 2, 3).unwrap();
        let frame = Frame::new(Tag::Result, 2, table);

        let mut buffer = Vec::new();
        write_frame(&mut buffer, &frame).unwrap();
        // tag + source + rows + cols + payload
        assert_eq!(buffer.len(), 1 + 8 + 8 + 8 + 6 * 4);

        let mut cursor = Cursor::new(&buffer);
        let loaded: Frame<i32> = read_frame(&mut cursor).unwrap();
        assert_eq!(loaded, frame);
    }

    #[test]
    fn zero_row_frame_round_trip() {
        let table = Matrix::<u16>::try_from(vec![].into(), 0, 4).unwrap();
        let frame = Frame::new(Tag::Query, 0, table);

        let mut buffer = Vec::new();
        write_frame(&mut buffer, &frame).unwrap();

        let loaded: Frame<u16> = read_frame(&mut Cursor::new(&buffer)).unwrap();
        assert_eq!(loaded.table.nrows(), 0);
        assert_eq!(loaded.table.ncols(), 4);
    }

    #[test]
    fn float_frame_round_trip() {
        let table = Matrix::try_from(vec![0.5f64, -1.25, 3.5, 0.0].into(), 2, 2).unwrap();
        let frame = Frame::new(Tag::Dataset, 0, table);

        let mut buffer = Vec::new();
        write_frame(&mut buffer, &frame).unwrap();
        let loaded: Frame<f64> = read_frame(&mut Cursor::new(&buffer)).unwrap();
        assert_eq!(loaded, frame);
    }

    #[test]
    fn truncated_payload_is_a_transport_error() {
        let table = Matrix::try_from(vec![1i64, 2, 3, 4].into(), 2, 2).unwrap();
        let frame = Frame::new(Tag::Result, 1, table);

        let mut buffer = Vec::new();
        write_frame(&mut buffer, &frame).unwrap();
        buffer.truncate(buffer.len() - 4);

        let err = read_frame::<i64, _>(&mut Cursor::new(&buffer)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let buffer = vec![9u8; 64];
        let err = read_frame::<i32, _>(&mut Cursor::new(&buffer)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
        assert!(err.to_string().contains("unknown frame tag"));
    }

    #[test]
    fn absurd_shape_is_rejected_before_allocation() {
        let mut buffer = Vec::new();
        buffer.push(Tag::Query as u8);
        buffer.extend_from_slice(&0u64.to_le_bytes());
        buffer.extend_from_slice(&u64::MAX.to_le_bytes());
        buffer.extend_from_slice(&u64::MAX.to_le_bytes());

        let err = read_frame::<i32, _>(&mut Cursor::new(&buffer)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
    }
}
