// SPDX-License-Identifier: MIT

//! Route labels returned by conditional-edge routing functions

use std::fmt;

/// A label a routing function can return
///
/// Label enums list their variants so the graph can verify at compile time
/// that every label has a destination. Open label types (plain strings)
/// return `None` and are only checked while executing.
pub trait RouteLabel: fmt::Display + Send + Sync + 'static {
    /// The closed set of labels, if there is one
    fn variants() -> Option<Vec<Self>>
    where
        Self: Sized,
    {
        None
    }
}

impl RouteLabel for String {}

impl RouteLabel for &'static str {}
