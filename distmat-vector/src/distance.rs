/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Distance metric selection and the pure per-pair kernels.

use std::str::FromStr;

use thiserror::Error;

use crate::scalar::Scalar;

/// Distance metric.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Metric {
    /// Manhattan distance: sum of absolute coordinate differences.
    L1,
    /// Squared Euclidean distance. The square root is deliberately omitted:
    /// it is monotonic, so orderings are unaffected, and skipping it keeps
    /// integer results exact.
    L2,
    /// Count of positions where the two vectors differ.
    Hamming,
}

impl Metric {
    /// Returns the string representation of the metric.
    pub const fn as_str(self) -> &'static str {
        match self {
            Metric::L1 => "L1",
            Metric::L2 => "L2",
            Metric::Hamming => "Hamming",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid distance metric name: {0:?}")]
pub struct ParseMetricError(pub String);

impl FromStr for Metric {
    type Err = ParseMetricError;

    /// The comparison is exact and case-sensitive: `"L1"`, `"L2"`,
    /// `"Hamming"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "L1" => Ok(Metric::L1),
            "L2" => Ok(Metric::L2),
            "Hamming" => Ok(Metric::Hamming),
            _ => Err(ParseMetricError(String::from(s))),
        }
    }
}

/// Compute the L1 distance between `x` and `y`.
///
/// Partial sums accumulate left to right, so results are deterministic for
/// floating point types as well.
pub fn l1<T: Scalar>(x: &[T], y: &[T]) -> T {
    assert_eq!(x.len(), y.len(), "vector lengths must match");
    std::iter::zip(x.iter(), y.iter()).fold(T::ZERO, |acc, (&a, &b)| acc + a.abs_diff(b))
}

/// Compute the squared L2 distance between `x` and `y`.
///
/// The accumulator stays in `T`: the result is exact whenever it is
/// representable in the element type.
pub fn squared_l2<T: Scalar>(x: &[T], y: &[T]) -> T {
    assert_eq!(x.len(), y.len(), "vector lengths must match");
    std::iter::zip(x.iter(), y.iter()).fold(T::ZERO, |acc, (&a, &b)| {
        let diff = a.abs_diff(b);
        acc + diff * diff
    })
}

/// Compute the Hamming distance between `x` and `y`: the number of
/// positions holding unequal scalars.
pub fn hamming<T: Scalar>(x: &[T], y: &[T]) -> T {
    assert_eq!(x.len(), y.len(), "vector lengths must match");
    T::from_count(std::iter::zip(x.iter(), y.iter()).filter(|(a, b)| a != b).count())
}

/// Evaluate `metric` over one pair of equal-length vectors.
#[inline]
pub fn evaluate<T: Scalar>(metric: Metric, x: &[T], y: &[T]) -> T {
    match metric {
        Metric::L1 => l1(x, y),
        Metric::L2 => squared_l2(x, y),
        Metric::Hamming => hamming(x, y),
    }
}

///////////
// Tests //
///////////
