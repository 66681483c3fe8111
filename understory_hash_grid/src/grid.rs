// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-bucket spatial hash grid.
//!
//! Values are stored in exactly `N` buckets. A value's bucket is
//! `hash(discrete(key)) % N`, so distinct cells may share a bucket; the grid
//! does not tell them apart. Range queries walk every cell coordinate covered
//! by the query's bounding box and stamp each bucket with the current query
//! epoch, so an aliased bucket is scanned at most once per query.

use alloc::boxed::Box;
use core::cell::Cell;
use core::fmt::Debug;
use core::iter;

use smallvec::SmallVec;

use crate::error::ConfigError;
use crate::hasher::{CellHasher, Hash2DF32, Hash3DF32};
use crate::iter::Iter;
use crate::retriever::{NoRetriever, PositionRetriever};
use crate::types::{Aabb3D, DiscreteKey, Point3, Scalar};

/// Position of a stored value: bucket number and index within the bucket.
///
/// Slots are invalidated by any mutation of the bucket they point into.
/// The canonical past-the-end slot is `(N, 0)`, see [`HashGrid::end`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Slot {
    pub(crate) bucket: usize,
    pub(crate) index: usize,
}

impl Slot {
    #[inline(always)]
    pub(crate) const fn new(bucket: usize, index: usize) -> Self {
        Self { bucket, index }
    }

    /// Bucket number.
    #[inline(always)]
    pub const fn bucket(self) -> usize {
        self.bucket
    }

    /// Index within the bucket.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.index
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Bucket<V> {
    pub(crate) values: SmallVec<[V; 4]>,
    // Epoch of the last range query that scanned this bucket.
    stamp: Cell<u32>,
}

impl<V> Default for Bucket<V> {
    fn default() -> Self {
        Self {
            values: SmallVec::new(),
            stamp: Cell::new(0),
        }
    }
}

pub(crate) fn first_occupied<V>(buckets: &[Bucket<V>], from: usize) -> Option<Slot> {
    let from = from.min(buckets.len());
    buckets[from..]
        .iter()
        .position(|b| !b.values.is_empty())
        .map(|i| Slot::new(from + i, 0))
}

pub(crate) fn last_occupied<V>(buckets: &[Bucket<V>], before: usize) -> Option<Slot> {
    let before = before.min(buckets.len());
    buckets[..before]
        .iter()
        .rposition(|b| !b.values.is_empty())
        .map(|i| Slot::new(i, buckets[i].values.len() - 1))
}

pub(crate) fn step_forward<V>(buckets: &[Bucket<V>], slot: Slot) -> Option<Slot> {
    let current = buckets.get(slot.bucket)?;
    if slot.index + 1 < current.values.len() {
        return Some(Slot::new(slot.bucket, slot.index + 1));
    }
    first_occupied(buckets, slot.bucket + 1)
}

pub(crate) fn step_backward<V>(buckets: &[Bucket<V>], slot: Slot) -> Option<Slot> {
    if slot.bucket < buckets.len() && slot.index > 0 {
        return Some(Slot::new(slot.bucket, slot.index - 1));
    }
    last_occupied(buckets, slot.bucket)
}

/// Uniform spatial hash grid with `N` buckets.
///
/// - `V`: stored value, typically a small handle. Equality drives
///   [`erase`][Self::erase] and [`find`][Self::find].
/// - `H`: key-hash policy, e.g. [`Hash3D`][crate::Hash3D].
/// - `R`: position retriever used by the range queries. Grids built with
///   [`HashGrid::new`] use [`NoRetriever`] and cannot be range-queried.
///
/// # Example
///
/// ```rust
/// use understory_hash_grid::{Hash3DF32, HashGrid, Point3};
///
/// #[derive(Clone, Copy, Debug, PartialEq)]
/// struct Mote {
///     id: u32,
///     at: Point3<f32>,
/// }
///
/// let mut grid: HashGrid<Mote, Hash3DF32, 256, _> =
///     HashGrid::with_retriever(4.0, 4.0, 4.0, |m: &Mote| m.at);
///
/// let a = Mote { id: 1, at: Point3::new(1.0, 1.0, 1.0) };
/// let b = Mote { id: 2, at: Point3::new(30.0, 0.0, 0.0) };
/// grid.insert(a.at, a);
/// grid.insert(b.at, b);
///
/// let mut near = Vec::new();
/// let n = grid.query_sphere(Point3::new(0.0, 0.0, 0.0), 5.0, &mut near);
/// assert_eq!(n, 1);
/// assert_eq!(near[0].id, 1);
/// ```
#[derive(Clone)]
pub struct HashGrid<V, H: CellHasher, const N: usize, R = NoRetriever> {
    hasher: H,
    cell_sizes: Point3<H::Scalar>,
    retriever: R,
    buckets: Box<[Bucket<V>]>,
    len: usize,
    // Scratch state for range queries, not part of the grid's contents.
    epoch: Cell<u32>,
}

impl<V, H: CellHasher, const N: usize, R> Debug for HashGrid<V, H, N, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let occupied = self
            .buckets
            .iter()
            .filter(|b| !b.values.is_empty())
            .count();
        f.debug_struct("HashGrid")
            .field("cell_sizes", &self.cell_sizes)
            .field("buckets", &N)
            .field("occupied_buckets", &occupied)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl<V, H: CellHasher, const N: usize> HashGrid<V, H, N, NoRetriever> {
    /// Create an empty grid without a position retriever.
    ///
    /// Such a grid supports insertion, removal, lookup, relocation and
    /// iteration, but no range queries.
    pub fn new(cell_x: H::Scalar, cell_y: H::Scalar, cell_z: H::Scalar) -> Self {
        Self::with_retriever(cell_x, cell_y, cell_z, NoRetriever)
    }
}

impl<V, H: CellHasher, const N: usize, R: Default> Default for HashGrid<V, H, N, R> {
    /// A grid with the default cell size (20) on every axis.
    fn default() -> Self {
        let size = H::Scalar::default_cell_size();
        Self::with_retriever(size, size, size, R::default())
    }
}

impl<V, H: CellHasher, const N: usize, R> HashGrid<V, H, N, R> {
    /// Create an empty grid with per-axis cell sizes and a position retriever.
    ///
    /// Cell sizes must be finite and strictly positive; this is only checked in
    /// debug builds. Use [`try_with_retriever`][Self::try_with_retriever] to
    /// validate untrusted configuration.
    pub fn with_retriever(
        cell_x: H::Scalar,
        cell_y: H::Scalar,
        cell_z: H::Scalar,
        retriever: R,
    ) -> Self {
        debug_assert!(
            H::try_from_cell_sizes(cell_x, cell_y, cell_z).is_ok(),
            "hash grid cell sizes must be finite and strictly positive"
        );
        Self::from_parts(
            H::from_cell_sizes(cell_x, cell_y, cell_z),
            Point3::new(cell_x, cell_y, cell_z),
            retriever,
        )
    }

    /// Like [`with_retriever`][Self::with_retriever], but reports invalid cell
    /// sizes instead of accepting them.
    pub fn try_with_retriever(
        cell_x: H::Scalar,
        cell_y: H::Scalar,
        cell_z: H::Scalar,
        retriever: R,
    ) -> Result<Self, ConfigError> {
        let hasher = H::try_from_cell_sizes(cell_x, cell_y, cell_z)?;
        Ok(Self::from_parts(
            hasher,
            Point3::new(cell_x, cell_y, cell_z),
            retriever,
        ))
    }

    fn from_parts(hasher: H, cell_sizes: Point3<H::Scalar>, retriever: R) -> Self {
        const { assert!(N > 0, "a hash grid needs at least one bucket") };
        Self {
            hasher,
            cell_sizes,
            retriever,
            buckets: iter::repeat_with(Bucket::default).take(N).collect(),
            len: 0,
            epoch: Cell::new(0),
        }
    }

    /// Number of stored values.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no values are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets, fixed at `N`.
    #[inline(always)]
    pub const fn cell_count(&self) -> usize {
        N
    }

    /// Cell sizes the grid was built with.
    #[inline]
    pub fn cell_sizes(&self) -> Point3<H::Scalar> {
        self.cell_sizes
    }

    /// The key-hash policy.
    #[inline]
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// The position retriever.
    #[inline]
    pub fn retriever(&self) -> &R {
        &self.retriever
    }

    /// Bucket that values inserted at `key` land in.
    #[inline]
    pub fn bucket_of(&self, key: Point3<H::Scalar>) -> usize {
        self.hasher.hash(key) % N
    }

    /// Values currently stored in bucket `bucket`, in bucket order.
    ///
    /// Returns an empty slice for out-of-range bucket numbers.
    pub fn bucket_values(&self, bucket: usize) -> &[V] {
        self.buckets
            .get(bucket)
            .map(|b| b.values.as_slice())
            .unwrap_or_default()
    }

    /// Remove every value and reset the query epoch.
    ///
    /// Cell sizes, bucket count and retriever are kept.
    pub fn clear(&mut self) {
        for bucket in self.buckets.iter_mut() {
            bucket.values.clear();
            bucket.stamp.set(0);
        }
        self.len = 0;
        self.epoch.set(0);
    }

    /// Exchange contents, cell sizes and key-hash policy with `other`.
    ///
    /// Retrievers stay where they are.
    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(&mut self.buckets, &mut other.buckets);
        core::mem::swap(&mut self.len, &mut other.len);
        core::mem::swap(&mut self.cell_sizes, &mut other.cell_sizes);
        self.hasher.swap(&mut other.hasher);
        // Bucket stamps are only meaningful against the epoch that wrote them.
        self.epoch.swap(&other.epoch);
    }

    /// Store `value` at `key`.
    ///
    /// The value is appended to its bucket, so values in a bucket keep their
    /// insertion order until something is erased from it.
    pub fn insert(&mut self, key: Point3<H::Scalar>, value: V) -> Slot {
        let bucket = self.bucket_of(key);
        let values = &mut self.buckets[bucket].values;
        values.push(value);
        self.len += 1;
        Slot::new(bucket, values.len() - 1)
    }

    /// Remove the first value equal to `value` from the bucket of `key`.
    ///
    /// The last value of the bucket takes the removed value's place. Returns
    /// `None` and leaves the grid untouched if there is no such value.
    pub fn erase(&mut self, key: Point3<H::Scalar>, value: &V) -> Option<V>
    where
        V: PartialEq,
    {
        let bucket = self.bucket_of(key);
        let values = &mut self.buckets[bucket].values;
        let index = values.iter().position(|v| v == value)?;
        self.len -= 1;
        Some(values.swap_remove(index))
    }

    /// Remove the value at `slot` and return the slot of the next value.
    ///
    /// The last value of the bucket takes the removed value's place, so the
    /// returned slot is `slot` itself unless the removed value was the last in
    /// its bucket, in which case it is the first value of the next occupied
    /// bucket or [`end`][Self::end]. A slot that does not address a value
    /// yields `end()` and removes nothing.
    pub fn erase_at(&mut self, slot: Slot) -> Slot {
        let Some(bucket) = self.buckets.get_mut(slot.bucket) else {
            return self.end();
        };
        if slot.index >= bucket.values.len() {
            return self.end();
        }
        bucket.values.swap_remove(slot.index);
        let remaining = bucket.values.len();
        self.len -= 1;
        if slot.index < remaining {
            slot
        } else {
            first_occupied(&self.buckets, slot.bucket + 1).unwrap_or(self.end())
        }
    }

    /// Slot of the first value equal to `value` in the bucket of `key`.
    pub fn find(&self, key: Point3<H::Scalar>, value: &V) -> Option<Slot>
    where
        V: PartialEq,
    {
        let bucket = self.bucket_of(key);
        self.buckets[bucket]
            .values
            .iter()
            .position(|v| v == value)
            .map(|index| Slot::new(bucket, index))
    }

    /// Relocate the value at `slot` to the bucket of `new_key`.
    ///
    /// If the bucket does not change, `slot` is returned untouched. Otherwise the
    /// value is appended to the new bucket, removed from the old one the same
    /// way [`erase_at`][Self::erase_at] does, and its new slot is returned. A
    /// slot that does not address a value yields [`end`][Self::end].
    pub fn move_to(&mut self, slot: Slot, new_key: Point3<H::Scalar>) -> Slot {
        if self.get(slot).is_none() {
            return self.end();
        }
        let target = self.bucket_of(new_key);
        if target == slot.bucket {
            return slot;
        }
        let value = self.buckets[slot.bucket].values.swap_remove(slot.index);
        let values = &mut self.buckets[target].values;
        values.push(value);
        Slot::new(target, values.len() - 1)
    }

    /// Value at `slot`, if it addresses one.
    #[inline]
    pub fn get(&self, slot: Slot) -> Option<&V> {
        self.buckets.get(slot.bucket)?.values.get(slot.index)
    }

    /// Mutable value at `slot`, if it addresses one.
    ///
    /// Changing the value's position through this reference does not relocate
    /// it; call [`move_to`][Self::move_to] for that.
    #[inline]
    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut V> {
        self.buckets.get_mut(slot.bucket)?.values.get_mut(slot.index)
    }

    /// Slot of the first stored value, or [`end`][Self::end] if empty.
    pub fn begin(&self) -> Slot {
        first_occupied(&self.buckets, 0).unwrap_or(self.end())
    }

    /// The past-the-end slot, `(N, 0)`.
    #[inline(always)]
    pub const fn end(&self) -> Slot {
        Slot::new(N, 0)
    }

    /// Slot following `slot`, skipping empty buckets; [`end`][Self::end] after
    /// the last value.
    pub fn next_slot(&self, slot: Slot) -> Slot {
        step_forward(&self.buckets, slot).unwrap_or(self.end())
    }

    /// Slot preceding `slot`, skipping empty buckets; `None` before the first
    /// value. Stepping back from [`end`][Self::end] yields the last value.
    pub fn prev_slot(&self, slot: Slot) -> Option<Slot> {
        step_backward(&self.buckets, slot)
    }

    /// Iterate all stored values in bucket order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter::new(&self.buckets, self.len)
    }

    /// Call `f` for every value in every bucket that a cell inside `bounds`
    /// hashes to. Each bucket is scanned at most once.
    fn visit_candidates<F: FnMut(&V)>(&self, bounds: &Aabb3D<H::Scalar>, mut f: F) {
        if self.is_empty() {
            return;
        }
        let epoch = self.next_epoch();
        let lo = self.hasher.discrete(bounds.min);
        let hi = self.hasher.discrete(bounds.max);
        let mut scanned = 0;
        for x in lo.x..=hi.x {
            for y in lo.y..=hi.y {
                for z in lo.z..=hi.z {
                    let index = self.hasher.hash_discrete(DiscreteKey::new(x, y, z)) % N;
                    let bucket = &self.buckets[index];
                    if bucket.stamp.get() == epoch {
                        continue;
                    }
                    bucket.stamp.set(epoch);
                    bucket.values.iter().for_each(&mut f);
                    scanned += 1;
                    if scanned == N {
                        // Every bucket has been seen; the rest of the box can only alias.
                        return;
                    }
                }
            }
        }
    }

    fn next_epoch(&self) -> u32 {
        let next = self.epoch.get().wrapping_add(1);
        if next == 0 {
            // Stale stamps would collide with reused epochs after wrap-around.
            for bucket in self.buckets.iter() {
                bucket.stamp.set(0);
            }
            self.epoch.set(1);
            return 1;
        }
        self.epoch.set(next);
        next
    }
}

impl<V, H, const N: usize, R> HashGrid<V, H, N, R>
where
    H: CellHasher,
    R: PositionRetriever<V, H::Scalar>,
{
    /// Call `f` for every value whose position lies within `radius` of
    /// `center`, boundary included. The order is unspecified.
    pub fn visit_sphere<F: FnMut(&V)>(
        &self,
        center: Point3<H::Scalar>,
        radius: H::Scalar,
        mut f: F,
    ) {
        self.visit_sphere_distance(center, radius, |_, value| f(value));
    }

    /// Like [`visit_sphere`][Self::visit_sphere], also passing each value's
    /// squared distance to `center`.
    pub fn visit_sphere_distance<F: FnMut(H::Scalar, &V)>(
        &self,
        center: Point3<H::Scalar>,
        radius: H::Scalar,
        mut f: F,
    ) {
        let radius_sq = radius * radius;
        self.visit_candidates(&Aabb3D::around(center, radius), |value| {
            let distance_sq = self.retriever.position(value).distance_squared(&center);
            if distance_sq <= radius_sq {
                f(distance_sq, value);
            }
        });
    }

    /// Call `f` for every value whose position lies inside `aabb`, faces
    /// included. The order is unspecified.
    pub fn visit_box<F: FnMut(&V)>(&self, aabb: Aabb3D<H::Scalar>, mut f: F) {
        self.visit_candidates(&aabb, |value| {
            if aabb.contains_point(&self.retriever.position(value)) {
                f(value);
            }
        });
    }

    /// Append every value within `radius` of `center` to `out`.
    ///
    /// Returns the number of values appended.
    pub fn query_sphere<E>(
        &self,
        center: Point3<H::Scalar>,
        radius: H::Scalar,
        out: &mut E,
    ) -> usize
    where
        V: Clone,
        E: Extend<V>,
    {
        let mut count = 0;
        self.visit_sphere(center, radius, |value| {
            out.extend(iter::once(value.clone()));
            count += 1;
        });
        count
    }

    /// Append `(squared distance, value)` for every value within `radius` of
    /// `center` to `out`.
    ///
    /// Returns the number of pairs appended.
    pub fn query_sphere_distance<E>(
        &self,
        center: Point3<H::Scalar>,
        radius: H::Scalar,
        out: &mut E,
    ) -> usize
    where
        V: Clone,
        E: Extend<(H::Scalar, V)>,
    {
        let mut count = 0;
        self.visit_sphere_distance(center, radius, |distance_sq, value| {
            out.extend(iter::once((distance_sq, value.clone())));
            count += 1;
        });
        count
    }

    /// Append every value inside `aabb` to `out`.
    ///
    /// Returns the number of values appended.
    pub fn query_box<E>(&self, aabb: Aabb3D<H::Scalar>, out: &mut E) -> usize
    where
        V: Clone,
        E: Extend<V>,
    {
        let mut count = 0;
        self.visit_box(aabb, |value| {
            out.extend(iter::once(value.clone()));
            count += 1;
        });
        count
    }
}

impl<'a, V, H: CellHasher, const N: usize, R> IntoIterator for &'a HashGrid<V, H, N, R> {
    type Item = &'a V;
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Planar grid over `f32` keys.
pub type HashGrid2D<V, const N: usize, R = NoRetriever> =
    HashGrid<V, Hash2DF32, N, R>;
/// Volumetric grid over `f32` keys.
pub type HashGrid3D<V, const N: usize, R = NoRetriever> =
    HashGrid<V, Hash3DF32, N, R>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Axis;
    use alloc::vec;
    use alloc::vec::Vec;
    use hashbrown::HashSet;

    #[derive(Copy, Clone, Debug, PartialEq)]
    struct Item {
        id: u32,
        at: Point3<f32>,
    }

    fn item(id: u32, x: f32, y: f32, z: f32) -> Item {
        Item {
            id,
            at: Point3::new(x, y, z),
        }
    }

    fn position(item: &Item) -> Point3<f32> {
        item.at
    }

    type Locate = fn(&Item) -> Point3<f32>;

    fn grid<const N: usize>(cell: f32) -> HashGrid<Item, Hash3DF32, N, Locate> {
        HashGrid::with_retriever(cell, cell, cell, position as Locate)
    }

    fn ids(items: &[Item]) -> Vec<u32> {
        let mut ids: Vec<u32> = items.iter().map(|i| i.id).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn sphere_query_finds_nearby_value() {
        let mut g = grid::<1024>(1.0);
        let a = item(1, 0.5, 0.5, 0.5);
        g.insert(a.at, a);

        let mut out = Vec::new();
        assert_eq!(g.query_sphere(Point3::new(0.0, 0.0, 0.0), 1.0, &mut out), 1);
        assert_eq!(out, vec![a]);

        out.clear();
        assert_eq!(g.query_sphere(Point3::new(5.0, 5.0, 5.0), 1.0, &mut out), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn sphere_boundary_is_inclusive() {
        let mut g = grid::<64>(1.0);
        let on = item(1, 3.0, 0.0, 0.0);
        let off = item(2, 0.0, -3.1, 0.0);
        g.insert(on.at, on);
        g.insert(off.at, off);

        let mut out = Vec::new();
        assert_eq!(g.query_sphere(Point3::new(0.0, 0.0, 0.0), 3.0, &mut out), 1);
        assert_eq!(out, vec![on]);
    }

    #[test]
    fn sphere_distance_reports_squared_distance() {
        let mut g = grid::<64>(2.0);
        let a = item(1, 1.0, 2.0, 2.0);
        let b = item(2, 0.0, 0.0, 1.0);
        g.insert(a.at, a);
        g.insert(b.at, b);

        let mut out = Vec::new();
        let n = g.query_sphere_distance(Point3::new(0.0, 0.0, 0.0), 3.0, &mut out);
        assert_eq!(n, 2);
        out.sort_by(|l, r| l.0.total_cmp(&r.0));
        assert_eq!(out, vec![(1.0, b), (9.0, a)]);
    }

    #[test]
    fn box_query_is_inclusive_on_faces() {
        let mut g = grid::<128>(1.0);
        let lo = item(1, 0.0, 0.0, 0.0);
        let hi = item(2, 2.0, 2.0, 2.0);
        let inside = item(3, 1.0, 0.5, 1.5);
        let outside = item(4, 2.5, 1.0, 1.0);
        for i in [lo, hi, inside, outside] {
            g.insert(i.at, i);
        }

        let mut out = Vec::new();
        let aabb = Aabb3D::new(lo.at, hi.at);
        assert_eq!(g.query_box(aabb, &mut out), 3);
        assert_eq!(ids(&out), vec![1, 2, 3]);
    }

    #[test]
    fn aliased_buckets_are_scanned_once() {
        // With a single bucket every cell of the query box aliases.
        let mut g = grid::<1>(1.0);
        let a = item(1, 0.5, 0.5, 0.5);
        let b = item(2, 1.5, 0.5, 0.5);
        let far = item(3, 9.0, 9.0, 9.0);
        for i in [a, b, far] {
            g.insert(i.at, i);
        }

        let mut out = Vec::new();
        let n = g.query_sphere(Point3::new(1.0, 0.5, 0.5), 1.0, &mut out);
        assert_eq!(n, 2);
        assert_eq!(ids(&out), vec![1, 2]);

        out.clear();
        let aabb = Aabb3D::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        assert_eq!(g.query_box(aabb, &mut out), 2);
    }

    #[test]
    fn aliased_buckets_with_colliding_cells() {
        let mut g = grid::<3>(1.0);
        // Find two distinct cells in a small neighbourhood that share a bucket.
        let mut seen: Vec<(usize, Point3<f32>)> = Vec::new();
        let mut pair = None;
        'search: for x in 0..4 {
            for y in 0..4 {
                let key = Point3::new(x as f32 + 0.5, y as f32 + 0.5, 0.5);
                let bucket = g.bucket_of(key);
                if let Some(&(_, other)) = seen.iter().find(|(b, _)| *b == bucket) {
                    pair = Some((other, key));
                    break 'search;
                }
                seen.push((bucket, key));
            }
        }
        let (k1, k2) = pair.expect("three buckets cannot hold sixteen cells without aliasing");

        let a = Item { id: 1, at: k1 };
        let b = Item { id: 2, at: k2 };
        g.insert(a.at, a);
        g.insert(b.at, b);

        let mut out = Vec::new();
        g.query_sphere(Point3::new(2.0, 2.0, 0.5), 4.0, &mut out);
        let unique: HashSet<u32> = out.iter().map(|i| i.id).collect();
        assert_eq!(unique.len(), out.len());
        assert_eq!(ids(&out), vec![1, 2]);
    }

    #[test]
    fn insert_then_find_round_trips() {
        let mut g: HashGrid3D<u32, 64> = HashGrid::new(1.0, 1.0, 1.0);
        let key = Point3::new(3.2, -1.0, 8.0);
        let slot = g.insert(key, 7);
        let found = g.find(key, &7).expect("inserted value must be found");
        assert_eq!(found, slot);
        assert_eq!(g.get(found), Some(&7));
        assert_eq!(g.find(key, &8), None);
    }

    #[test]
    fn erase_by_value_keeps_equal_key_neighbours() {
        let mut g: HashGrid3D<char, 1024> = HashGrid::new(1.0, 1.0, 1.0);
        let origin = Point3::new(0.0, 0.0, 0.0);
        g.insert(origin, 'A');
        g.insert(origin, 'B');

        assert_eq!(g.erase(origin, &'A'), Some('A'));
        assert_eq!(g.len(), 1);
        let slot = g.find(origin, &'B').expect("B stays findable");
        assert_eq!(g.get(slot), Some(&'B'));
        assert_eq!(g.find(origin, &'A'), None);
    }

    #[test]
    fn erase_miss_is_a_no_op() {
        let mut g: HashGrid3D<u32, 16> = HashGrid::new(1.0, 1.0, 1.0);
        g.insert(Point3::new(0.0, 0.0, 0.0), 1);
        assert_eq!(g.erase(Point3::new(0.0, 0.0, 0.0), &2), None);
        assert_eq!(g.len(), 1);
        assert_eq!(g.erase_at(g.end()), g.end());
        assert_eq!(g.erase_at(Slot::new(0, 99)), g.end());
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn size_tracks_successful_inserts_and_erases() {
        let mut g: HashGrid2D<u32, 32> = HashGrid::new(2.0, 2.0, 2.0);
        let mut expected = 0_usize;
        for i in 0..50_u32 {
            let key = Point3::from_xy(i as f32 * 1.7, -(i as f32));
            g.insert(key, i);
            expected += 1;
            if i % 3 == 0 {
                assert!(g.erase(key, &i).is_some());
                expected -= 1;
            }
            if i % 5 == 0 {
                // Wrong value at the same key: a miss.
                assert!(g.erase(key, &(i + 1000)).is_none());
            }
            assert_eq!(g.len(), expected);
        }
        assert_eq!(g.iter().count(), expected);
    }

    #[test]
    fn erase_at_swaps_last_into_place() {
        let mut g: HashGrid3D<u32, 8> = HashGrid::new(1.0, 1.0, 1.0);
        let key = Point3::new(0.0, 0.0, 0.0);
        let first = g.insert(key, 1);
        g.insert(key, 2);
        g.insert(key, 3);

        let next = g.erase_at(first);
        assert_eq!(next, first);
        assert_eq!(g.get(next), Some(&3));
        assert_eq!(g.bucket_values(first.bucket()), &[3, 2]);
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn erase_at_advances_past_emptied_bucket() {
        let mut g: HashGrid3D<u32, 1024> = HashGrid::new(1.0, 1.0, 1.0);
        let k1 = Point3::new(0.0, 0.0, 0.0);
        let k2 = Point3::new(40.0, 0.0, 0.0);
        assert_ne!(g.bucket_of(k1), g.bucket_of(k2));
        g.insert(k1, 1);
        g.insert(k2, 2);

        let first = g.begin();
        let after = g.erase_at(first);
        assert_eq!(g.len(), 1);
        assert_eq!(after, g.begin());
        assert_ne!(after, g.end());
        assert_eq!(g.erase_at(after), g.end());
        assert!(g.is_empty());
    }

    #[test]
    fn move_changes_findability() {
        let mut g: HashGrid3D<u32, 1024> = HashGrid::new(1.0, 1.0, 1.0);
        let k1 = Point3::new(0.5, 0.5, 0.5);
        let k2 = Point3::new(10.5, 0.5, 0.5);
        assert_ne!(g.bucket_of(k1), g.bucket_of(k2));

        let slot = g.insert(k1, 5);
        let moved = g.move_to(slot, k2);
        assert_eq!(moved.bucket(), g.bucket_of(k2));
        assert_eq!(g.get(moved), Some(&5));
        assert_eq!(g.find(k1, &5), None);
        assert_eq!(g.find(k2, &5), Some(moved));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn move_within_bucket_is_a_no_op() {
        let mut g: HashGrid3D<u32, 64> = HashGrid::new(10.0, 10.0, 10.0);
        g.insert(Point3::new(1.0, 1.0, 1.0), 4);
        let slot = g.insert(Point3::new(2.0, 2.0, 2.0), 5);
        assert_eq!(g.move_to(slot, Point3::new(3.0, 3.0, 3.0)), slot);
        assert_eq!(g.bucket_values(slot.bucket()), &[4, 5]);
        assert_eq!(g.move_to(g.end(), Point3::new(0.0, 0.0, 0.0)), g.end());
    }

    #[test]
    fn move_keeps_sphere_queries_current() {
        let mut g = grid::<256>(1.0);
        let mut a = item(1, 0.5, 0.5, 0.5);
        let slot = g.insert(a.at, a);

        a.at = Point3::new(20.5, 0.5, 0.5);
        *g.get_mut(slot).expect("slot is live") = a;
        g.move_to(slot, a.at);

        let mut out = Vec::new();
        assert_eq!(g.query_sphere(Point3::new(0.0, 0.0, 0.0), 2.0, &mut out), 0);
        assert_eq!(g.query_sphere(Point3::new(20.0, 0.0, 0.0), 2.0, &mut out), 1);
        assert_eq!(out, vec![a]);
    }

    #[test]
    fn cursor_walk_matches_iterator_in_both_directions() {
        let mut g: HashGrid3D<u32, 64> = HashGrid::new(1.0, 1.0, 1.0);
        assert_eq!(g.begin(), g.end());
        assert_eq!(g.prev_slot(g.end()), None);

        for i in 0..20_u32 {
            g.insert(Point3::new((i % 7) as f32, (i / 7) as f32, 0.0), i);
        }

        let mut forward = Vec::new();
        let mut slot = g.begin();
        while slot != g.end() {
            forward.push(*g.get(slot).expect("cursor addresses a value"));
            slot = g.next_slot(slot);
        }
        assert_eq!(forward, g.iter().copied().collect::<Vec<_>>());
        assert_eq!(forward.len(), g.len());

        let mut backward = Vec::new();
        let mut cursor = g.prev_slot(g.end());
        while let Some(slot) = cursor {
            backward.push(*g.get(slot).expect("cursor addresses a value"));
            cursor = g.prev_slot(slot);
        }
        backward.reverse();
        assert_eq!(backward, forward);
        assert_eq!(g.next_slot(g.end()), g.end());
    }

    #[test]
    fn clear_resets_everything_but_configuration() {
        let mut g = grid::<32>(2.0);
        for i in 0..10 {
            let it = item(i, i as f32, 0.0, 0.0);
            g.insert(it.at, it);
        }
        let mut out = Vec::new();
        g.query_sphere(Point3::new(0.0, 0.0, 0.0), 1.0, &mut out);
        assert!(g.epoch.get() > 0);

        g.clear();
        assert_eq!(g.len(), 0);
        assert!(g.is_empty());
        assert_eq!(g.epoch.get(), 0);
        assert_eq!(g.cell_count(), 32);
        assert_eq!(g.cell_sizes(), Point3::new(2.0, 2.0, 2.0));

        out.clear();
        assert_eq!(g.query_sphere(Point3::new(5.0, 0.0, 0.0), 10.0, &mut out), 0);
        assert_eq!(g.begin(), g.end());
    }

    #[test]
    fn empty_grid_does_not_advance_epoch() {
        let g = grid::<16>(1.0);
        let mut out = Vec::new();
        g.query_sphere(Point3::new(0.0, 0.0, 0.0), 5.0, &mut out);
        g.query_box(Aabb3D::around(Point3::new(0.0, 0.0, 0.0), 5.0), &mut out);
        assert_eq!(g.epoch.get(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn epoch_wrap_around_resets_stamps() {
        let mut g = grid::<4>(1.0);
        let a = item(1, 0.5, 0.5, 0.5);
        g.insert(a.at, a);
        for bucket in g.buckets.iter() {
            bucket.stamp.set(1);
        }
        g.epoch.set(u32::MAX);

        let mut out = Vec::new();
        assert_eq!(g.query_sphere(Point3::new(0.0, 0.0, 0.0), 1.0, &mut out), 1);
        assert_eq!(g.epoch.get(), 1);
        assert_eq!(out, vec![a]);
    }

    #[test]
    fn swap_exchanges_full_contents() {
        let mut a: HashGrid3D<u32, 128> = HashGrid::new(1.0, 1.0, 1.0);
        let mut b: HashGrid3D<u32, 128> = HashGrid::new(8.0, 8.0, 8.0);
        let ka = Point3::new(3.0, 0.0, 0.0);
        let kb = Point3::new(-20.0, 5.0, 1.0);
        a.insert(ka, 1);
        b.insert(kb, 2);
        b.insert(kb, 3);

        a.swap(&mut b);
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 1);
        assert_eq!(a.cell_sizes(), Point3::new(8.0, 8.0, 8.0));
        assert_eq!(b.cell_sizes(), Point3::new(1.0, 1.0, 1.0));
        assert!(a.find(kb, &2).is_some());
        assert!(a.find(kb, &3).is_some());
        assert!(b.find(ka, &1).is_some());
        assert_eq!(a.find(ka, &1), None);
    }

    #[test]
    fn swap_carries_query_epoch_with_stamps() {
        let mut busy = grid::<8>(1.0);
        let mut idle = grid::<8>(1.0);
        let a = item(1, 0.5, 0.5, 0.5);
        busy.insert(a.at, a);
        let mut out = Vec::new();
        for _ in 0..5 {
            busy.query_sphere(Point3::new(0.0, 0.0, 0.0), 1.0, &mut out);
        }

        busy.swap(&mut idle);
        out.clear();
        assert_eq!(idle.query_sphere(Point3::new(0.0, 0.0, 0.0), 1.0, &mut out), 1);
        assert_eq!(out, vec![a]);
    }

    #[test]
    fn planar_grid_queries() {
        let mut g: HashGrid<Item, Hash2DF32, 64, Locate> =
            HashGrid::with_retriever(5.0, 5.0, 0.0, position as Locate);
        let a = item(1, 1.0, 1.0, 0.0);
        let b = item(2, 12.0, -3.0, 0.0);
        g.insert(a.at, a);
        g.insert(b.at, b);

        let mut out = Vec::new();
        let aabb = Aabb3D::new(Point3::new(10.0, -5.0, 0.0), Point3::new(15.0, 0.0, 0.0));
        assert_eq!(g.query_box(aabb, &mut out), 1);
        assert_eq!(out, vec![b]);

        out.clear();
        assert_eq!(g.query_sphere(Point3::from_xy(0.0, 0.0), 20.0, &mut out), 2);
    }

    #[test]
    fn default_and_validating_constructors() {
        let g: HashGrid3D<u32, 16> = HashGrid::default();
        assert_eq!(g.cell_sizes(), Point3::new(20.0, 20.0, 20.0));
        assert_eq!(g.cell_count(), 16);
        assert!(g.is_empty());

        let bad = HashGrid::<Item, Hash3DF32, 16, Locate>::try_with_retriever(
            1.0,
            -1.0,
            1.0,
            position as Locate,
        );
        assert_eq!(
            bad.map(|g| g.len()),
            Err(ConfigError::InvalidCellSize { axis: Axis::Y })
        );
        let ok = HashGrid::<Item, Hash3DF32, 16, Locate>::try_with_retriever(
            1.0,
            1.0,
            1.0,
            position as Locate,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn visitors_agree_with_collecting_queries() {
        let mut g = grid::<64>(3.0);
        for i in 0..30_u32 {
            let it = item(i, (i % 6) as f32 * 2.0, (i / 6) as f32 * 2.0, 1.0);
            g.insert(it.at, it);
        }
        let center = Point3::new(4.0, 4.0, 1.0);

        let mut collected = Vec::new();
        let n = g.query_sphere(center, 3.5, &mut collected);
        let mut visited = Vec::new();
        g.visit_sphere(center, 3.5, |v| visited.push(*v));
        assert_eq!(n, visited.len());
        assert_eq!(ids(&collected), ids(&visited));

        let aabb = Aabb3D::around(center, 3.5);
        let mut boxed = 0;
        g.visit_box(aabb, |_| boxed += 1);
        // The box circumscribes the sphere.
        assert!(boxed >= n);
        assert_eq!(g.iter().count(), 30);
    }

    #[test]
    fn debug_is_summarised() {
        let mut g: HashGrid3D<u32, 4> = HashGrid::new(1.0, 1.0, 1.0);
        g.insert(Point3::new(0.0, 0.0, 0.0), 1);
        let text = alloc::format!("{g:?}");
        assert!(text.contains("len: 1"));
        assert!(text.contains("buckets: 4"));
    }
}
