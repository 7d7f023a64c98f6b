/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Dense, row-major table views.
//!
//! A table of vectors is a contiguous block of scalars interpreted as a
//! 2-dimensional matrix: query sets, datasets and distance matrices are all
//! [`Matrix`] values, and functions that only read data accept a borrowing
//! [`MatrixView`].

use std::marker::PhantomData;
use std::ops::{Index, IndexMut, Range};

use rayon::prelude::{IndexedParallelIterator, ParallelSlice};
use thiserror::Error;

/// A 2-dimensional, row-major view over a dense block of memory.
///
/// `D` is the storage representation: `Box<[T]>` for the owning [`Matrix`]
/// and `&[T]` for the borrowing [`MatrixView`].
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixBase<T, D> {
    data: D,
    nrows: usize,
    ncols: usize,
    marker: PhantomData<T>,
}

/// An owning, row-major matrix.
pub type Matrix<T> = MatrixBase<T, Box<[T]>>;

/// A non-owning, row-major matrix view.
///
/// Functions that need to read table data without taking ownership accept
/// this type; it is `Copy`, so passing it around is free.
pub type MatrixView<'a, T> = MatrixBase<T, &'a [T]>;

impl<'a, T: Copy> Copy for MatrixBase<T, &'a [T]> {}

/// Error returned when a buffer's length does not match the requested shape.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("tried to construct a matrix with {nrows} rows and {ncols} columns over a buffer of length {len}")]
pub struct TryFromError {
    len: usize,
    nrows: usize,
    ncols: usize,
}

impl<T> Matrix<T> {
    /// Construct a matrix whose entries are produced by `f` in memory order.
    pub fn from_fn<F>(nrows: usize, ncols: usize, mut f: F) -> Self
    where
        F: FnMut() -> T,
    {
        let data: Box<[T]> = (0..nrows * ncols).map(|_| f()).collect();
        debug_assert_eq!(data.len(), nrows * ncols);
        Self {
            data,
            nrows,
            ncols,
            marker: PhantomData,
        }
    }

    /// Construct a matrix filled with copies of `value`.
    pub fn new(value: T, nrows: usize, ncols: usize) -> Self
    where
        T: Clone,
    {
        Self::from_fn(nrows, ncols, || value.clone())
    }
}

impl<T, D> MatrixBase<T, D>
where
    D: AsRef<[T]>,
{
    /// Try to construct a matrix over `data`. The buffer length must equal
    /// `nrows * ncols`.
    pub fn try_from(data: D, nrows: usize, ncols: usize) -> Result<Self, TryFromError> {
        let len = data.as_ref().len();
        if len != nrows * ncols {
            Err(TryFromError { len, nrows, ncols })
        } else {
            Ok(Self {
                data,
                nrows,
                ncols,
                marker: PhantomData,
            })
        }
    }

    /// Return the number of rows in the matrix.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Return the number of columns in the matrix.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Return the underlying data as a flat slice.
    pub fn as_slice(&self) -> &[T] {
        self.data.as_ref()
    }

    /// Return row `row` as a slice.
    ///
    /// # Panics
    ///
    /// Panics if `row >= self.nrows()`.
    pub fn row(&self, row: usize) -> &[T] {
        assert!(
            row < self.nrows,
            "tried to access row {row} of a matrix with {} rows",
            self.nrows
        );
        let start = row * self.ncols;
        &self.as_slice()[start..start + self.ncols]
    }

    /// Return row `row` if it is in bounds.
    pub fn get_row(&self, row: usize) -> Option<&[T]> {
        (row < self.nrows).then(|| self.row(row))
    }

    /// Return a view over the contiguous row range `range`.
    ///
    /// # Panics
    ///
    /// Panics if the range extends past `self.nrows()`.
    pub fn rows(&self, range: Range<usize>) -> MatrixView<'_, T> {
        assert!(
            range.start <= range.end && range.end <= self.nrows,
            "row range {}..{} is out of bounds for a matrix with {} rows",
            range.start,
            range.end,
            self.nrows
        );
        MatrixBase {
            data: &self.as_slice()[range.start * self.ncols..range.end * self.ncols],
            nrows: range.end - range.start,
            ncols: self.ncols,
            marker: PhantomData,
        }
    }

    /// Return an iterator over all rows, beginning with row 0.
    pub fn row_iter(&self) -> impl ExactSizeIterator<Item = &[T]> + '_ {
        (0..self.nrows).map(move |row| self.row(row))
    }

    /// Return a parallel iterator over all rows.
    ///
    /// # Panics
    ///
    /// Panics if `self.ncols() == 0`.
    pub fn par_row_iter(&self) -> impl IndexedParallelIterator<Item = &[T]>
    where
        T: Sync,
    {
        assert!(self.ncols != 0, "cannot iterate rows of width zero");
        self.as_slice().par_chunks_exact(self.ncols)
    }

    /// Return a borrowing view over the matrix.
    pub fn as_view(&self) -> MatrixView<'_, T> {
        MatrixBase {
            data: self.as_slice(),
            nrows: self.nrows,
            ncols: self.ncols,
            marker: PhantomData,
        }
    }

    /// Copy the viewed data into an owning matrix.
    pub fn to_owned(&self) -> Matrix<T>
    where
        T: Clone,
    {
        MatrixBase {
            data: self.as_slice().into(),
            nrows: self.nrows,
            ncols: self.ncols,
            marker: PhantomData,
        }
    }
}

impl<T, D> MatrixBase<T, D>
where
    D: AsRef<[T]> + AsMut<[T]>,
{
    /// Return the underlying data as a mutable flat slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.data.as_mut()
    }

    /// Return row `row` as a mutable slice.
    ///
    /// # Panics
    ///
    /// Panics if `row >= self.nrows()`.
    pub fn row_mut(&mut self, row: usize) -> &mut [T] {
        assert!(
            row < self.nrows,
            "tried to access row {row} of a matrix with {} rows",
            self.nrows
        );
        let start = row * self.ncols;
        let ncols = self.ncols;
        &mut self.as_mut_slice()[start..start + ncols]
    }

    /// Overwrite the row range starting at `offset` with the contents of
    /// `block`, which must have the same column count.
    ///
    /// # Panics
    ///
    /// Panics if the widths differ or the block extends past the last row.
    pub fn copy_rows_from(&mut self, offset: usize, block: MatrixView<'_, T>)
    where
        T: Copy,
    {
        assert_eq!(
            self.ncols,
            block.ncols(),
            "tried to copy a block of width {} into a matrix of width {}",
            block.ncols(),
            self.ncols
        );
        assert!(
            offset + block.nrows() <= self.nrows,
            "tried to copy {} rows at offset {offset} into a matrix with {} rows",
            block.nrows(),
            self.nrows
        );
        let start = offset * self.ncols;
        let end = start + block.as_slice().len();
        self.as_mut_slice()[start..end].copy_from_slice(block.as_slice());
    }
}

/// Return a reference to the entry at `(row, col)`.
///
/// # Panics
///
/// Panics if `row >= self.nrows()` or `col >= self.ncols()`.
impl<T, D> Index<(usize, usize)> for MatrixBase<T, D>
where
    D: AsRef<[T]>,
{
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        assert!(
            col < self.ncols,
            "col {col} is out of bounds (max: {})",
            self.ncols
        );
        &self.row(row)[col]
    }
}

/// Return a mutable reference to the entry at `(row, col)`.
///
/// # Panics
///
/// Panics if `row >= self.nrows()` or `col >= self.ncols()`.
impl<T, D> IndexMut<(usize, usize)> for MatrixBase<T, D>
where
    D: AsRef<[T]> + AsMut<[T]>,
{
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        assert!(
            col < self.ncols,
            "col {col} is out of bounds (max: {})",
            self.ncols
        );
        &mut self.row_mut(row)[col]
    }
}

///////////
// Tests //
///////////
