// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry types and helpers.

use core::fmt::Debug;
use core::ops::{Add, Mul, Sub};

/// Floating-point scalar abstraction for spatial keys.
///
/// The grid only needs a handful of operations: arithmetic for distance and
/// bounding-box computations, a reciprocal for per-axis scale factors, and a
/// truncating conversion to integer cell coordinates.
pub trait Scalar:
    Copy + PartialOrd + Debug + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self>
{
    /// Zero value for the scalar type.
    fn zero() -> Self;

    /// Cell size used along every axis when none is given (`20`).
    fn default_cell_size() -> Self;

    /// `1 / self`.
    fn recip(self) -> Self;

    /// Truncate toward zero into an integer cell coordinate.
    ///
    /// Values outside the `i32` range saturate; NaN maps to `0`.
    fn truncate(self) -> i32;

    /// Whether the value is neither infinite nor NaN.
    fn is_finite(self) -> bool;
}

impl Scalar for f32 {
    #[inline(always)]
    fn zero() -> Self {
        0.0
    }

    #[inline(always)]
    fn default_cell_size() -> Self {
        20.0
    }

    #[inline]
    fn recip(self) -> Self {
        1.0 / self
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "Cell coordinates are intentionally i32; out-of-range values are saturated."
    )]
    #[inline]
    fn truncate(self) -> i32 {
        self as i32
    }

    #[inline]
    fn is_finite(self) -> bool {
        Self::is_finite(self)
    }
}

impl Scalar for f64 {
    #[inline(always)]
    fn zero() -> Self {
        0.0
    }

    #[inline(always)]
    fn default_cell_size() -> Self {
        20.0
    }

    #[inline]
    fn recip(self) -> Self {
        1.0 / self
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "Cell coordinates are intentionally i32; out-of-range values are saturated."
    )]
    #[inline]
    fn truncate(self) -> i32 {
        self as i32
    }

    #[inline]
    fn is_finite(self) -> bool {
        Self::is_finite(self)
    }
}

/// A continuous spatial key.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Point3<T> {
    /// X coordinate.
    pub x: T,
    /// Y coordinate.
    pub y: T,
    /// Z coordinate.
    pub z: T,
}

impl<T> Point3<T> {
    /// Create a point from its three coordinates.
    #[inline(always)]
    pub const fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
}

impl<T: Scalar> Point3<T> {
    /// Create a point on the `z = 0` plane, for use with planar grids.
    #[inline]
    pub fn from_xy(x: T, y: T) -> Self {
        Self { x, y, z: T::zero() }
    }

    /// Squared Euclidean distance to `other`.
    #[inline]
    pub fn distance_squared(&self, other: &Self) -> T {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

/// Axis-aligned bounding box in 3D, inclusive on all faces.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb3D<T> {
    /// Minimum corner.
    pub min: Point3<T>,
    /// Maximum corner.
    pub max: Point3<T>,
}

impl<T> Aabb3D<T> {
    /// Create a new AABB from min/max corners.
    #[inline(always)]
    pub const fn new(min: Point3<T>, max: Point3<T>) -> Self {
        Self { min, max }
    }
}

impl<T: Scalar> Aabb3D<T> {
    /// The cube `center ± radius` on every axis.
    #[inline]
    pub fn around(center: Point3<T>, radius: T) -> Self {
        Self {
            min: Point3::new(center.x - radius, center.y - radius, center.z - radius),
            max: Point3::new(center.x + radius, center.y + radius, center.z + radius),
        }
    }

    /// Whether this AABB contains the point.
    ///
    /// Points lying exactly on a face are contained.
    ///
    /// # Examples
    ///
    /// ```
    /// use understory_hash_grid::{Aabb3D, Point3};
    ///
    /// let aabb = Aabb3D::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
    /// assert!(aabb.contains_point(&Point3::new(1.0, 0.0, 0.5)));
    /// assert!(!aabb.contains_point(&Point3::new(1.5, 0.0, 0.5)));
    /// ```
    #[inline]
    pub fn contains_point(&self, p: &Point3<T>) -> bool {
        self.min.x <= p.x
            && self.min.y <= p.y
            && self.min.z <= p.z
            && p.x <= self.max.x
            && p.y <= self.max.y
            && p.z <= self.max.z
    }
}

/// Integer cell coordinate obtained by scaling and truncating a [`Point3`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DiscreteKey {
    /// Cell column.
    pub x: i32,
    /// Cell row.
    pub y: i32,
    /// Cell layer; always `0` for planar policies.
    pub z: i32,
}

impl DiscreteKey {
    /// Create a cell coordinate.
    #[inline(always)]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}
