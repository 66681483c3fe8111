// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Configuration errors.

use core::fmt;

use thiserror::Error;

/// One of the three spatial axes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// The x axis.
    X,
    /// The y axis.
    Y,
    /// The z axis.
    Z,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        })
    }
}

/// Errors reported by the validating grid constructor.
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A cell size was zero, negative, infinite or NaN.
    #[error("cell size along the {axis} axis must be finite and strictly positive")]
    InvalidCellSize {
        /// The offending axis.
        axis: Axis,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn message_names_the_axis() {
        let err = ConfigError::InvalidCellSize { axis: Axis::Y };
        assert_eq!(
            err.to_string(),
            "cell size along the y axis must be finite and strictly positive"
        );
    }
}
