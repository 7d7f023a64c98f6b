/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Scalar element types and distance metric kernels.
//!
//! The crate exposes two building blocks:
//! - [`Scalar`]: the numeric element types a distance table may hold.
//! - [`distance`]: the [`Metric`](distance::Metric) selector and the pure
//!   vector-to-scalar kernels for L1, squared L2 and Hamming.

pub mod distance;
pub mod scalar;

pub use distance::{evaluate, Metric, ParseMetricError};
pub use scalar::Scalar;
