// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_hash_grid --heading-base-level=0

//! Understory Hash Grid: a fixed-bucket uniform spatial hash grid.
//!
//! Understory Hash Grid answers "what is near this point or region" for large
//! numbers of small, frequently moving objects (particles, agents, proximity
//! triggers) in expected constant time per touched cell.
//!
//! - Insert, erase, find and relocate values by spatial key.
//! - Query by sphere (optionally with squared distances) or by axis-aligned box.
//! - Walk all values with a cursor ([`Slot`]) or a regular Rust iterator.
//!
//! Space is cut into cells of a configurable size per axis. A key-hash policy
//! ([`Hash2D`] or [`Hash3D`]) maps each spatial key to an integer cell
//! coordinate and then to one of `N` buckets, where `N` is a compile-time
//! constant. Distinct cells may share a bucket; range queries re-check every
//! candidate against its actual position and scan each bucket at most once per
//! query.
//!
//! Range queries need to know where a stored value is. That capability, a
//! [`PositionRetriever`], is a type parameter of the grid: any
//! `Fn(&V) -> Point3<T>` works. Grids built without one can still store,
//! look up and move values, but calling a range query on them does not compile.
//!
//! # Example
//!
//! ```rust
//! use understory_hash_grid::{Aabb3D, Hash3DF32, HashGrid, Point3};
//!
//! #[derive(Clone, Copy, Debug, PartialEq)]
//! struct Agent {
//!     id: u32,
//!     at: Point3<f32>,
//! }
//!
//! let mut grid: HashGrid<Agent, Hash3DF32, 1024, _> =
//!     HashGrid::with_retriever(1.0, 1.0, 1.0, |a: &Agent| a.at);
//!
//! let mut a = Agent { id: 1, at: Point3::new(0.5, 0.5, 0.5) };
//! let slot = grid.insert(a.at, a);
//!
//! // Sphere queries include values exactly on the boundary.
//! let mut near = Vec::new();
//! assert_eq!(grid.query_sphere(Point3::new(0.0, 0.0, 0.0), 1.0, &mut near), 1);
//!
//! // When a value moves, update it and relocate its bucket.
//! a.at = Point3::new(12.0, 3.0, 0.5);
//! *grid.get_mut(slot).unwrap() = a;
//! let slot = grid.move_to(slot, a.at);
//!
//! let mut boxed = Vec::new();
//! let region = Aabb3D::new(Point3::new(10.0, 0.0, 0.0), Point3::new(15.0, 5.0, 1.0));
//! assert_eq!(grid.query_box(region, &mut boxed), 1);
//!
//! assert_eq!(grid.erase_at(slot), grid.end());
//! assert!(grid.is_empty());
//! ```
//!
//! ## Choosing a policy
//!
//! - `Hash2DF32`/`Hash2DF64`: planar workloads. The z coordinate still takes part
//!   in distance and box tests, but never in bucketing.
//! - `Hash3DF32`/`Hash3DF64`: volumetric workloads with independent cell sizes
//!   per axis.
//!
//! ### Sizing
//!
//! Pick cell sizes close to the typical query radius and a bucket count around
//! the number of occupied cells you expect. Queries visit every cell of the
//! query's bounding box, so a radius much larger than the cell size makes
//! queries expensive.
//!
//! ### Float semantics
//!
//! Cell coordinates are computed by truncation toward zero, so the cells
//! adjacent to the origin are twice as wide as the others. Cell sizes must be
//! finite and strictly positive; [`HashGrid::try_with_retriever`] checks this.
//! Keys are assumed not to be NaN.

#![no_std]

extern crate alloc;

mod error;
mod grid;
mod hasher;
mod iter;
mod retriever;
mod types;

pub use error::{Axis, ConfigError};
pub use grid::{HashGrid, HashGrid2D, HashGrid3D, Slot};
pub use hasher::{CellHasher, Hash2D, Hash2DF32, Hash2DF64, Hash3D, Hash3DF32, Hash3DF64};
pub use iter::Iter;
pub use retriever::{NoRetriever, PositionRetriever};
pub use types::{Aabb3D, DiscreteKey, Point3, Scalar};
