/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Exact pairwise distance matrix computation.
//!
//! Given a query table Q (m rows) and a dataset table S (n rows) of equal
//! width, the crate produces the m x n matrix `D[i][j] = dist(Q[i], S[j])`
//! for the metrics in [`distmat_vector::Metric`]. Computation runs through
//! an interchangeable [`Kernel`]: single-threaded, threaded over the rayon
//! pool, or scattered across a pool of worker processes via the
//! [`cluster`] layer.

pub mod calculator;
pub mod cluster;
pub mod error;
pub mod kernel;
pub mod partition;

pub use calculator::DistanceCalculator;
pub use error::{Error, ErrorKind, Result};
pub use kernel::{Kernel, ParallelKernel, SequentialKernel};
pub use partition::{partition, RowChunk};
