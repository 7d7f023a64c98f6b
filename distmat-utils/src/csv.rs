/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! CSV ingestion and emission for dense scalar tables.
//!
//! The on-disk format is one vector per line, numeric cells separated by a
//! comma. Trailing separators are tolerated on input and produced on output
//! (every emitted cell is followed by `", "`), so emit → ingest round-trips.
//!
//! Lexing is delegated to the `csv` crate; this module owns the table
//! contract: every row must have the same non-zero number of cells, and
//! every cell must parse as the table's scalar type.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use rayon::prelude::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use thiserror::Error;

use distmat_vector::Scalar;

use crate::views::{Matrix, MatrixBase, TryFromError};

/// Row decoding strategy.
///
/// Parallel decoding is a latency optimization only: rows are indexed by
/// input line, never by completion order, so the output is identical to the
/// sequential result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// Decode rows on the calling thread.
    Seq,
    /// Decode rows on the rayon pool.
    Par,
}

/// Error type for [`read_csv`].
#[derive(Debug, Error)]
pub enum ReadError {
    /// A row's cell count disagrees with the first row's.
    #[error("row {row} has {found} columns, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },

    /// A row has no cells at all.
    #[error("row {row} has no columns")]
    EmptyRow { row: usize },

    /// A cell does not parse as the table's scalar type.
    #[error("cell ({row}, {col}) is not a valid scalar: {cell:?}")]
    BadCell {
        row: usize,
        col: usize,
        cell: String,
    },

    /// Lexical or IO failure in the underlying reader.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Underlying IO failure.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Internal shape disagreement while assembling the table.
    #[error(transparent)]
    Shape(#[from] TryFromError),
}

/// Read a table of `T` from CSV text.
///
/// Enforces the uniform-width invariant: all rows must have the same
/// non-zero number of cells. Empty cells produced by trailing separators
/// are discarded before the width check.
pub fn read_csv<T: Scalar>(reader: impl Read, exec: Execution) -> Result<Matrix<T>, ReadError> {
    let mut lexer = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    // Materialize the records first: the width check needs the first row,
    // and parallel decoding needs owned cells.
    let mut ncols = None;
    let mut records = Vec::new();
    for record in lexer.records() {
        let record = record?;
        let row = records.len();

        let mut width = record.len();
        while width > 0 && record[width - 1].is_empty() {
            width -= 1;
        }
        if width == 0 {
            return Err(ReadError::EmptyRow { row });
        }
        match ncols {
            None => ncols = Some(width),
            Some(expected) if width != expected => {
                return Err(ReadError::RaggedRow {
                    row,
                    found: width,
                    expected,
                });
            }
            Some(_) => {}
        }

        records.push(record);
    }

    let ncols = ncols.unwrap_or(0);
    let nrows = records.len();

    let decode_row = |(row, record): (usize, &csv::StringRecord)| -> Result<Vec<T>, ReadError> {
        (0..ncols)
            .map(|col| {
                T::parse_text(&record[col]).ok_or_else(|| ReadError::BadCell {
                    row,
                    col,
                    cell: record[col].to_string(),
                })
            })
            .collect()
    };

    let rows: Vec<Vec<T>> = match exec {
        Execution::Seq => records
            .iter()
            .enumerate()
            .map(decode_row)
            .collect::<Result<_, _>>()?,
        Execution::Par => records
            .par_iter()
            .enumerate()
            .map(decode_row)
            .collect::<Result<_, _>>()?,
    };

    let data: Vec<T> = rows.into_iter().flatten().collect();
    Ok(Matrix::try_from(data.into(), nrows, ncols)?)
}

/// Read a table of `T` from a CSV file.
pub fn read_csv_path<T: Scalar>(path: &Path, exec: Execution) -> Result<Matrix<T>, ReadError> {
    let file = File::open(path)?;
    read_csv(BufReader::new(file), exec)
}

/// Write a table as CSV: one row per line, every cell followed by `", "`.
pub fn write_csv<T, D, W>(table: &MatrixBase<T, D>, writer: &mut W) -> io::Result<()>
where
    T: Scalar,
    D: AsRef<[T]>,
    W: Write,
{
    for row in table.row_iter() {
        for cell in row {
            write!(writer, "{cell}, ")?;
        }
        writeln!(writer)?;
    }
    writer.flush()
}

/// Write a table to a freshly created CSV file.
///
/// Fails if `path` already exists.
pub fn write_csv_path<T, D>(table: &MatrixBase<T, D>, path: &Path) -> io::Result<()>
where
    T: Scalar,
    D: AsRef<[T]>,
{
    let file = File::create_new(path)?;
    write_csv(table, &mut BufWriter::new(file))
}

///////////
// Tests //
///////////
