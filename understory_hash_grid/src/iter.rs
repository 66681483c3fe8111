// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Iteration over all stored values.

use core::iter::FusedIterator;

use crate::grid::{Bucket, Slot, first_occupied, last_occupied, step_backward, step_forward};

/// Iterator over every value of a [`HashGrid`][crate::HashGrid], in bucket
/// order. Empty buckets are skipped in both directions.
#[derive(Debug)]
pub struct Iter<'a, V> {
    buckets: &'a [Bucket<V>],
    // Next value from the front and from the back; only meaningful while
    // `remaining > 0`.
    front: Slot,
    back: Slot,
    remaining: usize,
}

impl<V> Clone for Iter<'_, V> {
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets,
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}

impl<'a, V> Iter<'a, V> {
    pub(crate) fn new(buckets: &'a [Bucket<V>], len: usize) -> Self {
        let end = Slot::new(buckets.len(), 0);
        Self {
            buckets,
            front: first_occupied(buckets, 0).unwrap_or(end),
            back: last_occupied(buckets, buckets.len()).unwrap_or(end),
            remaining: len,
        }
    }

    fn value(&self, slot: Slot) -> &'a V {
        let buckets = self.buckets;
        &buckets[slot.bucket].values[slot.index]
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.value(self.front);
        self.remaining -= 1;
        if self.remaining > 0 {
            self.front = step_forward(self.buckets, self.front)
                .expect("hash grid iterator invariant violated: ran out of values early");
        }
        Some(value)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> DoubleEndedIterator for Iter<'_, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.value(self.back);
        self.remaining -= 1;
        if self.remaining > 0 {
            self.back = step_backward(self.buckets, self.back)
                .expect("hash grid iterator invariant violated: ran out of values early");
        }
        Some(value)
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

impl<V> FusedIterator for Iter<'_, V> {}
