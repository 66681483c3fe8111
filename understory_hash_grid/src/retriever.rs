// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mapping stored values back to their spatial position.

use crate::types::Point3;

/// Capability to recover the current spatial key of a stored value.
///
/// Range queries call this once per candidate in every scanned bucket. Any
/// `Fn(&V) -> Point3<T>` closure implements it.
pub trait PositionRetriever<V, T> {
    /// Position of `value`.
    fn position(&self, value: &V) -> Point3<T>;
}

impl<V, T, F> PositionRetriever<V, T> for F
where
    F: Fn(&V) -> Point3<T>,
{
    #[inline]
    fn position(&self, value: &V) -> Point3<T> {
        self(value)
    }
}

/// Placeholder retriever for grids that are never range-queried.
///
/// It does not implement [`PositionRetriever`], so calling a range query on a
/// grid built with it is a compile error rather than a silently wrong answer.
///
/// ```compile_fail
/// use understory_hash_grid::{Hash3DF32, HashGrid, Point3};
///
/// let grid: HashGrid<u32, Hash3DF32, 64> = HashGrid::new(1.0, 1.0, 1.0);
/// let mut out = Vec::new();
/// grid.query_sphere(Point3::new(0.0, 0.0, 0.0), 1.0, &mut out);
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NoRetriever;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Body {
        at: Point3<f32>,
    }

    struct BodyPosition;

    impl PositionRetriever<Body, f32> for BodyPosition {
        fn position(&self, value: &Body) -> Point3<f32> {
            value.at
        }
    }

    fn lookup<R: PositionRetriever<Body, f32>>(r: &R, body: &Body) -> Point3<f32> {
        r.position(body)
    }

    #[test]
    fn closures_and_named_types_are_retrievers() {
        let body = Body {
            at: Point3::new(1.0, 2.0, 3.0),
        };
        assert_eq!(lookup(&BodyPosition, &body), body.at);
        assert_eq!(lookup(&|b: &Body| b.at, &body), body.at);
    }
}
