/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The element types supported by distance tables.
//!
//! A table is mono-typed: the scalar type is selected once at build time by
//! the embedding application and everything downstream (kernels, wire
//! framing, CSV ingestion) is generic over it.

use std::fmt;
use std::ops::{Add, Mul};

use rand::Rng;

/// A numeric element type usable in distance tables.
///
/// The `bytemuck::Pod` bound is what allows a table to cross process
/// boundaries as a raw byte payload without a per-element encode step.
pub trait Scalar:
    bytemuck::Pod
    + PartialEq
    + Add<Output = Self>
    + Mul<Output = Self>
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
{
    /// Additive identity.
    const ZERO: Self;

    /// `|self - other|`, computed larger-minus-smaller so unsigned types
    /// cannot underflow.
    fn abs_diff(self, other: Self) -> Self;

    /// Parse a CSV cell in the type's natural textual form.
    fn parse_text(text: &str) -> Option<Self>;

    /// Convert a position count into the scalar domain (Hamming results).
    fn from_count(count: usize) -> Self;

    /// Draw one sample from the type's generation range.
    fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self;
}

macro_rules! impl_scalar_int {
    ($($t:ty),* $(,)?) => {$(
        impl Scalar for $t {
            const ZERO: Self = 0;

            #[inline]
            fn abs_diff(self, other: Self) -> Self {
                if self >= other {
                    self - other
                } else {
                    other - self
                }
            }

            fn parse_text(text: &str) -> Option<Self> {
                text.parse::<$t>().ok()
            }

            #[inline]
            fn from_count(count: usize) -> Self {
                count as $t
            }

            fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
                rng.random_range(0i64..10) as $t
            }
        }
    )*};
}

macro_rules! impl_scalar_float {
    ($($t:ty),* $(,)?) => {$(
        impl Scalar for $t {
            const ZERO: Self = 0.0;

            #[inline]
            fn abs_diff(self, other: Self) -> Self {
                (self - other).abs()
            }

            fn parse_text(text: &str) -> Option<Self> {
                text.parse::<$t>().ok()
            }

            #[inline]
            fn from_count(count: usize) -> Self {
                count as $t
            }

            fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
                rng.random_range(0.0..1.0) as $t
            }
        }
    )*};
}

impl_scalar_int!(i16, u16, i32, u32, i64, u64);
impl_scalar_float!(f32, f64);

///////////
// Tests //
///////////
