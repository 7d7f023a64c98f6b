/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Interchangeable compute kernels.
//!
//! A kernel computes a block of the distance matrix: the rows of the query
//! table named by `rows`, each against every dataset row. The sequential
//! and threaded variants are contract-identical; the calculator picks one
//! at construction and keeps it for its lifetime.

use std::num::NonZeroUsize;
use std::ops::Range;

use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

use distmat_utils::{Matrix, MatrixView};
use distmat_vector::{evaluate, Metric, Scalar};

use crate::error::{Error, Result};
use crate::partition::partition;

/// The per-block compute primitive.
pub trait Kernel<T: Scalar>: Send + Sync {
    /// Compute the `rows.len() x dataset.nrows()` block of the distance
    /// matrix covering query rows `rows`, in query order.
    fn compute(
        &self,
        queries: MatrixView<'_, T>,
        dataset: MatrixView<'_, T>,
        metric: Metric,
        rows: Range<usize>,
    ) -> Result<Matrix<T>>;
}

fn check_range<T: Scalar>(queries: &MatrixView<'_, T>, rows: &Range<usize>) -> Result<()> {
    if rows.start > rows.end || rows.end > queries.nrows() {
        return Err(Error::internal(format!(
            "query row range {}..{} is out of bounds for {} rows",
            rows.start,
            rows.end,
            queries.nrows()
        )));
    }
    Ok(())
}

/// Computes its block with a plain nested loop on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialKernel;

impl<T: Scalar> Kernel<T> for SequentialKernel {
    fn compute(
        &self,
        queries: MatrixView<'_, T>,
        dataset: MatrixView<'_, T>,
        metric: Metric,
        rows: Range<usize>,
    ) -> Result<Matrix<T>> {
        check_range(&queries, &rows)?;
        if queries.ncols() != dataset.ncols() {
            return Err(Error::dimension(format!(
                "query width {} does not match dataset width {}",
                queries.ncols(),
                dataset.ncols()
            )));
        }

        let nrows = rows.end - rows.start;
        let mut data = Vec::with_capacity(nrows * dataset.nrows());
        for i in rows {
            let query = queries.row(i);
            for j in 0..dataset.nrows() {
                data.push(evaluate(metric, query, dataset.row(j)));
            }
        }

        Matrix::try_from(data.into(), nrows, dataset.nrows())
            .map_err(|e| Error::internal(e.to_string()))
    }
}

/// Fans its block out over the rayon pool.
///
/// The row range is split into one contiguous sub-range per worker with the
/// same balanced rule used for inter-process partitioning; each sub-range
/// runs through [`SequentialKernel`] and the partial tables are stitched
/// back together in sub-range order, so the output is bit-identical to the
/// sequential result.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParallelKernel {
    threads: Option<NonZeroUsize>,
}

impl ParallelKernel {
    /// A kernel sized to the rayon pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// A kernel with a fixed worker count, independent of the pool size.
    pub fn with_threads(threads: NonZeroUsize) -> Self {
        Self {
            threads: Some(threads),
        }
    }

    fn workers(&self) -> usize {
        self.threads
            .map(NonZeroUsize::get)
            .unwrap_or_else(rayon::current_num_threads)
            .max(1)
    }
}

impl<T: Scalar> Kernel<T> for ParallelKernel {
    fn compute(
        &self,
        queries: MatrixView<'_, T>,
        dataset: MatrixView<'_, T>,
        metric: Metric,
        rows: Range<usize>,
    ) -> Result<Matrix<T>> {
        check_range(&queries, &rows)?;

        let span = rows.end - rows.start;
        let chunks: Vec<_> = partition(span, self.workers())
            .into_iter()
            .filter(|chunk| chunk.len > 0)
            .collect();

        let outcomes: Vec<Result<Matrix<T>>> = chunks
            .par_iter()
            .map(|chunk| {
                let begin = rows.start + chunk.offset;
                SequentialKernel.compute(queries, dataset, metric, begin..begin + chunk.len)
            })
            .collect();

        // Join every sub-task before surfacing: a combined error must carry
        // all failure messages, not just the first.
        let mut parts = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(part) => parts.push(part),
                Err(err) => failures.push(err.to_string()),
            }
        }
        if !failures.is_empty() {
            return Err(Error::internal(failures.join(" | ")));
        }

        let mut data = Vec::with_capacity(span * dataset.nrows());
        for part in &parts {
            data.extend_from_slice(part.as_slice());
        }
        Matrix::try_from(data.into(), span, dataset.nrows())
            .map_err(|e| Error::internal(e.to_string()))
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::error::ErrorKind;

    use super::*;

    fn table(data: Vec<i32>, nrows: usize, ncols: usize) -> Matrix<i32> {
        Matrix::try_from(data.into(), nrows, ncols).unwrap()
    }

    fn compute<K: Kernel<i32>>(
        kernel: &K,
        queries: &Matrix<i32>,
        dataset: &Matrix<i32>,
        metric: Metric,
    ) -> Result<Matrix<i32>> {
        kernel.compute(
            queries.as_view(),
            dataset.as_view(),
            metric,
            0..queries.nrows(),
        )
    }

    #[test]
    fn sequential_l1_block() {
        let queries = table(vec![0, 0, 1, 1], 2, 2);
        let dataset = table(vec![0, 0, 3, 4], 2, 2);
        let matrix = compute(&SequentialKernel, &queries, &dataset, Metric::L1).unwrap();
        assert_eq!(matrix.as_slice(), &[0, 7, 2, 5]);
    }

    #[test]
    fn sequential_l2_block() {
        let queries = table(vec![0, 0, 1, 1], 2, 2);
        let dataset = table(vec![0, 0, 3, 4], 2, 2);
        let matrix = compute(&SequentialKernel, &queries, &dataset, Metric::L2).unwrap();
        assert_eq!(matrix.as_slice(), &[0, 25, 2, 13]);
    }

    #[test]
    fn sequential_hamming_block() {
        let queries = table(vec![1, 2, 3, 4, 5, 6], 2, 3);
        let dataset = table(vec![1, 0, 3, 4, 5, 0], 2, 3);
        let matrix = compute(&SequentialKernel, &queries, &dataset, Metric::Hamming).unwrap();
        assert_eq!(matrix.as_slice(), &[1, 3, 2, 1]);
    }

    #[rstest]
    #[case(Metric::L1)]
    #[case(Metric::L2)]
    #[case(Metric::Hamming)]
    fn self_distance_diagonal_is_zero(#[case] metric: Metric) {
        let queries = table(vec![1, 0, 0, 1], 2, 2);
        let matrix = compute(&SequentialKernel, &queries, &queries, metric).unwrap();
        assert_eq!(matrix[(0, 0)], 0);
        assert_eq!(matrix[(1, 1)], 0);
        // Off-diagonals agree by symmetry.
        assert_eq!(matrix[(0, 1)], matrix[(1, 0)]);
    }

    #[rstest]
    #[case(Metric::L1)]
    #[case(Metric::L2)]
    #[case(Metric::Hamming)]
    fn distance_is_symmetric(#[case] metric: Metric) {
        let queries = table(vec![3, -1, 0, 2, 7, 7], 3, 2);
        let dataset = table(vec![0, 0, 5, -2], 2, 2);

        let forward = compute(&SequentialKernel, &queries, &dataset, metric).unwrap();
        let backward = compute(&SequentialKernel, &dataset, &queries, metric).unwrap();
        for i in 0..queries.nrows() {
            for j in 0..dataset.nrows() {
                assert_eq!(forward[(i, j)], backward[(j, i)]);
            }
        }
    }

    #[test]
    fn output_shape_is_m_by_n() {
        let queries = table((0..15).collect(), 5, 3);
        let dataset = table((0..21).collect(), 7, 3);
        let matrix = compute(&SequentialKernel, &queries, &dataset, Metric::L1).unwrap();
        assert_eq!(matrix.nrows(), 5);
        assert_eq!(matrix.ncols(), 7);
    }

    #[test]
    fn sequential_partial_row_range() {
        let queries = table((0..12).collect(), 4, 3);
        let dataset = table((0..6).collect(), 2, 3);
        let block = SequentialKernel
            .compute(queries.as_view(), dataset.as_view(), Metric::L1, 1..3)
            .unwrap();
        assert_eq!(block.nrows(), 2);

        let full = compute(&SequentialKernel, &queries, &dataset, Metric::L1).unwrap();
        assert_eq!(block.row(0), full.row(1));
        assert_eq!(block.row(1), full.row(2));
    }

    #[rstest]
    #[case(Metric::L1)]
    #[case(Metric::L2)]
    #[case(Metric::Hamming)]
    fn parallel_matches_sequential_bit_for_bit(#[case] metric: Metric) {
        let queries = table((0..60).map(|v| v % 13).collect(), 20, 3);
        let dataset = table((0..21).map(|v| v % 7).collect(), 7, 3);

        let sequential = compute(&SequentialKernel, &queries, &dataset, metric).unwrap();
        for threads in [1, 2, 3, 7, 32] {
            let kernel = ParallelKernel::with_threads(NonZeroUsize::new(threads).unwrap());
            let parallel = compute(&kernel, &queries, &dataset, metric).unwrap();
            assert_eq!(parallel, sequential, "threads = {threads}");
        }
    }

    #[test]
    fn parallel_matches_sequential_for_floats() {
        let queries = Matrix::<f64>::try_from(
            (0..40).map(|v| v as f64 * 0.37).collect::<Vec<_>>().into(),
            10,
            4,
        )
        .unwrap();
        let dataset = Matrix::<f64>::try_from(
            (0..20).map(|v| v as f64 * 1.11).collect::<Vec<_>>().into(),
            5,
            4,
        )
        .unwrap();

        let sequential = SequentialKernel
            .compute(queries.as_view(), dataset.as_view(), Metric::L2, 0..10)
            .unwrap();
        let kernel = ParallelKernel::with_threads(NonZeroUsize::new(3).unwrap());
        let parallel = kernel
            .compute(queries.as_view(), dataset.as_view(), Metric::L2, 0..10)
            .unwrap();

        // Partial sums within a row accumulate in order, so even float
        // results are bit-identical across kernels.
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn parallel_with_more_threads_than_rows() {
        let queries = table(vec![0, 0, 1, 1], 2, 2);
        let dataset = table(vec![0, 0, 3, 4], 2, 2);
        let kernel = ParallelKernel::with_threads(NonZeroUsize::new(16).unwrap());
        let matrix = compute(&kernel, &queries, &dataset, Metric::L1).unwrap();
        assert_eq!(matrix.as_slice(), &[0, 7, 2, 5]);
    }

    #[test]
    fn empty_query_range_yields_zero_rows() {
        let queries = table(vec![], 0, 3);
        let dataset = table((0..6).collect(), 2, 3);
        for kernel in [
            &SequentialKernel as &dyn Kernel<i32>,
            &ParallelKernel::new(),
        ] {
            let matrix = kernel
                .compute(queries.as_view(), dataset.as_view(), Metric::L1, 0..0)
                .unwrap();
            assert_eq!(matrix.nrows(), 0);
            assert_eq!(matrix.ncols(), 2);
        }
    }

    #[test]
    fn sequential_rejects_width_mismatch() {
        let queries = table(vec![1, 2, 3], 1, 3);
        let dataset = table(vec![1, 2], 1, 2);
        let err = compute(&SequentialKernel, &queries, &dataset, Metric::L1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Dimension);
    }

    #[test]
    fn parallel_combines_all_subtask_failures() {
        // Every sub-task sees the same width mismatch; the surfaced error
        // must carry one message per failed sub-task, joined with " | ".
        let queries = table((0..12).collect(), 4, 3);
        let dataset = table(vec![1, 2], 1, 2);
        let kernel = ParallelKernel::with_threads(NonZeroUsize::new(3).unwrap());
        let err = compute(&kernel, &queries, &dataset, Metric::L1).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
        let message = err.to_string();
        assert_eq!(message.matches(" | ").count(), 2);
        assert_eq!(message.matches("does not match dataset width").count(), 3);
    }

    #[test]
    fn kernels_reject_out_of_bounds_ranges() {
        let queries = table(vec![1, 2], 1, 2);
        let dataset = table(vec![1, 2], 1, 2);
        for kernel in [
            &SequentialKernel as &dyn Kernel<i32>,
            &ParallelKernel::new(),
        ] {
            let err = kernel
                .compute(queries.as_view(), dataset.as_view(), Metric::L1, 0..2)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Internal);
        }
    }
}
