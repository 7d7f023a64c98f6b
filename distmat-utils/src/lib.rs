/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

pub mod csv;
pub mod random;
pub mod views;

pub use views::{Matrix, MatrixView};
