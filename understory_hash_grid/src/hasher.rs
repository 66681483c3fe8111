// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Key-hash policies: discretization of spatial keys and cell hashing.
//!
//! A policy turns a continuous [`Point3`] into a [`DiscreteKey`] by multiplying
//! each axis by the reciprocal of its cell size and truncating toward zero, then
//! folds the discrete key into a single hash value. The grid reduces that hash
//! modulo its bucket count.
//!
//! Truncation toward zero means the cells touching the origin are twice as wide
//! as the others along each axis (`(-size, size)` maps to `0`). This matches the
//! bucket layout existing grids were built against, so it is kept.

use crate::error::{Axis, ConfigError};
use crate::types::{DiscreteKey, Point3, Scalar};

const MIX_X: u32 = 920_129_341;
const MIX_Y: u32 = 1_926_129_311;
const MIX_Z: u32 = 3_926_129_401;

/// Discretize-and-hash capability used by [`HashGrid`][crate::HashGrid].
pub trait CellHasher {
    /// Coordinate scalar of the spatial keys this policy accepts.
    type Scalar: Scalar;

    /// Whether the z axis is ignored (discretized to `0`).
    const PLANAR: bool;

    /// Build a policy from per-axis cell sizes.
    ///
    /// Sizes are not validated; a zero size yields an infinite scale factor.
    /// Planar policies ignore `z`.
    fn from_cell_sizes(x: Self::Scalar, y: Self::Scalar, z: Self::Scalar) -> Self;

    /// Map a spatial key to its integer cell coordinate.
    fn discrete(&self, key: Point3<Self::Scalar>) -> DiscreteKey;

    /// Combine a cell coordinate into a single hash value.
    fn hash_discrete(&self, key: DiscreteKey) -> usize;

    /// Build a policy from per-axis cell sizes, rejecting sizes that are not
    /// finite and strictly positive.
    fn try_from_cell_sizes(
        x: Self::Scalar,
        y: Self::Scalar,
        z: Self::Scalar,
    ) -> Result<Self, ConfigError>
    where
        Self: Sized,
    {
        check_cell_size(x, Axis::X)?;
        check_cell_size(y, Axis::Y)?;
        if !Self::PLANAR {
            check_cell_size(z, Axis::Z)?;
        }
        Ok(Self::from_cell_sizes(x, y, z))
    }

    /// Hash a spatial key; same as `hash_discrete(discrete(key))`.
    #[inline]
    fn hash(&self, key: Point3<Self::Scalar>) -> usize {
        self.hash_discrete(self.discrete(key))
    }

    /// Exchange scale factors with another policy.
    #[inline]
    fn swap(&mut self, other: &mut Self)
    where
        Self: Sized,
    {
        core::mem::swap(self, other);
    }
}

fn check_cell_size<T: Scalar>(size: T, axis: Axis) -> Result<(), ConfigError> {
    if size.is_finite() && size > T::zero() {
        Ok(())
    } else {
        Err(ConfigError::InvalidCellSize { axis })
    }
}

#[allow(
    clippy::cast_sign_loss,
    reason = "Cell coordinates are reinterpreted as raw bits for mixing."
)]
#[inline(always)]
const fn mix(coord: i32, constant: u32) -> u32 {
    (coord as u32) ^ constant
}

/// Planar policy: x and y are discretized, z is always `0`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Hash2D<T> {
    scale_x: T,
    scale_y: T,
}

impl<T: Scalar> Default for Hash2D<T> {
    fn default() -> Self {
        let size = T::default_cell_size();
        Self::from_cell_sizes(size, size, size)
    }
}

impl<T: Scalar> CellHasher for Hash2D<T> {
    type Scalar = T;

    const PLANAR: bool = true;

    #[inline]
    fn from_cell_sizes(x: T, y: T, _z: T) -> Self {
        Self {
            scale_x: x.recip(),
            scale_y: y.recip(),
        }
    }

    #[inline]
    fn discrete(&self, key: Point3<T>) -> DiscreteKey {
        DiscreteKey::new(
            (key.x * self.scale_x).truncate(),
            (key.y * self.scale_y).truncate(),
            0,
        )
    }

    #[inline]
    fn hash_discrete(&self, key: DiscreteKey) -> usize {
        mix(key.x, MIX_X).wrapping_add(mix(key.y, MIX_Y)) as usize
    }
}

/// Volumetric policy: all three axes are discretized independently.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Hash3D<T> {
    scale_x: T,
    scale_y: T,
    scale_z: T,
}

impl<T: Scalar> Default for Hash3D<T> {
    fn default() -> Self {
        let size = T::default_cell_size();
        Self::from_cell_sizes(size, size, size)
    }
}

impl<T: Scalar> CellHasher for Hash3D<T> {
    type Scalar = T;

    const PLANAR: bool = false;

    #[inline]
    fn from_cell_sizes(x: T, y: T, z: T) -> Self {
        Self {
            scale_x: x.recip(),
            scale_y: y.recip(),
            scale_z: z.recip(),
        }
    }

    #[inline]
    fn discrete(&self, key: Point3<T>) -> DiscreteKey {
        DiscreteKey::new(
            (key.x * self.scale_x).truncate(),
            (key.y * self.scale_y).truncate(),
            (key.z * self.scale_z).truncate(),
        )
    }

    #[inline]
    fn hash_discrete(&self, key: DiscreteKey) -> usize {
        mix(key.x, MIX_X)
            .wrapping_add(mix(key.y, MIX_Y))
            .wrapping_add(mix(key.z, MIX_Z)) as usize
    }
}

/// Planar policy over `f32` keys.
pub type Hash2DF32 = Hash2D<f32>;
/// Planar policy over `f64` keys.
pub type Hash2DF64 = Hash2D<f64>;
/// Volumetric policy over `f32` keys.
pub type Hash3DF32 = Hash3D<f32>;
/// Volumetric policy over `f64` keys.
pub type Hash3DF64 = Hash3D<f64>;
