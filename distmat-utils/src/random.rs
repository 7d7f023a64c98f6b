/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Random table generation.

use rand::rngs::StdRng;

use distmat_vector::Scalar;

use crate::views::Matrix;

/// Generate a `nrows x ncols` table of uniform samples.
///
/// The value range is the scalar type's generation range (small non-negative
/// integers, unit-interval floats); only the shape is part of the contract.
pub fn random_table<T: Scalar>(nrows: usize, ncols: usize, rng: &mut StdRng) -> Matrix<T> {
    Matrix::from_fn(nrows, ncols, || T::sample(rng))
}

///////////
// Tests //
///////////
