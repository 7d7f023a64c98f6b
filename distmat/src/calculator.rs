/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The distance calculator: the crate's compute entry point.

use distmat_utils::{Matrix, MatrixView};
use distmat_vector::{Metric, Scalar};

use crate::error::{Error, Result};
use crate::kernel::{Kernel, ParallelKernel, SequentialKernel};

/// Computes full distance matrices through an injected [`Kernel`].
///
/// The calculator holds one kernel for its lifetime. Textual metric names
/// are translated to [`Metric`] here and nowhere else.
pub struct DistanceCalculator<T: Scalar> {
    kernel: Box<dyn Kernel<T>>,
}

impl<T: Scalar> DistanceCalculator<T> {
    /// Construct a calculator around `kernel`.
    pub fn new(kernel: Box<dyn Kernel<T>>) -> Self {
        Self { kernel }
    }

    /// A calculator backed by the single-threaded kernel.
    pub fn sequential() -> Self {
        Self::new(Box::new(SequentialKernel))
    }

    /// A calculator backed by the threaded kernel.
    pub fn parallel() -> Self {
        Self::new(Box::new(ParallelKernel::new()))
    }

    /// Compute the full `m x n` distance matrix between `queries` and
    /// `dataset` under the named metric.
    ///
    /// `metric` must be one of `"L1"`, `"L2"`, `"Hamming"`, compared
    /// exactly; anything else is a fatal configuration error reported
    /// before any compute begins.
    pub fn compute_distance(
        &self,
        queries: MatrixView<'_, T>,
        dataset: MatrixView<'_, T>,
        metric: &str,
    ) -> Result<Matrix<T>> {
        let metric: Metric = metric
            .parse()
            .map_err(|err| Error::configuration(format!("{err}")))?;

        if queries.ncols() != dataset.ncols() {
            return Err(Error::dimension(format!(
                "query width {} does not match dataset width {}",
                queries.ncols(),
                dataset.ncols()
            )));
        }

        self.kernel
            .compute(queries, dataset, metric, 0..queries.nrows())
    }
}

impl<T: Scalar> std::fmt::Debug for DistanceCalculator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistanceCalculator").finish_non_exhaustive()
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;

    use super::*;

    fn table(data: Vec<i32>, nrows: usize, ncols: usize) -> Matrix<i32> {
        Matrix::try_from(data.into(), nrows, ncols).unwrap()
    }

    #[test]
    fn computes_the_full_matrix() {
        let queries = table(vec![0, 0, 1, 1], 2, 2);
        let dataset = table(vec![0, 0, 3, 4], 2, 2);

        let calculator = DistanceCalculator::sequential();
        let matrix = calculator
            .compute_distance(queries.as_view(), dataset.as_view(), "L1")
            .unwrap();
        assert_eq!(matrix.as_slice(), &[0, 7, 2, 5]);

        let matrix = calculator
            .compute_distance(queries.as_view(), dataset.as_view(), "L2")
            .unwrap();
        assert_eq!(matrix.as_slice(), &[0, 25, 2, 13]);
    }

    #[test]
    fn parallel_calculator_agrees_with_sequential() {
        let queries = table((0..24).map(|v| v % 5).collect(), 8, 3);
        let dataset = table((0..12).map(|v| v % 3).collect(), 4, 3);

        let sequential = DistanceCalculator::sequential()
            .compute_distance(queries.as_view(), dataset.as_view(), "Hamming")
            .unwrap();
        let parallel = DistanceCalculator::parallel()
            .compute_distance(queries.as_view(), dataset.as_view(), "Hamming")
            .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn unknown_metric_fails_before_compute() {
        let queries = table(vec![1, 2], 1, 2);
        let calculator = DistanceCalculator::<i32>::sequential();
        let err = calculator
            .compute_distance(queries.as_view(), queries.as_view(), "L3")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("L3"));
    }

    #[test]
    fn metric_names_are_case_sensitive() {
        let queries = table(vec![1, 2], 1, 2);
        let calculator = DistanceCalculator::<i32>::sequential();
        let err = calculator
            .compute_distance(queries.as_view(), queries.as_view(), "l2")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn width_mismatch_is_a_dimension_error() {
        let queries = table(vec![1, 2, 3], 1, 3);
        let dataset = table(vec![1, 2], 1, 2);
        let err = DistanceCalculator::sequential()
            .compute_distance(queries.as_view(), dataset.as_view(), "L1")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Dimension);
    }
}
