//! Stored Value Module
//!
//! The two mutually exclusive shapes a key's value may take.

use std::fmt;

use serde::{Deserialize, Serialize};

// == Shape ==
/// Shape of a stored value, used to report mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Scalar,
    List,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Scalar => f.write_str("scalar"),
            Shape::List => f.write_str("list"),
        }
    }
}

// == Stored Value ==
/// A value held under a key: exactly one item, or an ordered sequence of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "value", rename_all = "lowercase")]
pub enum StoredValue<T> {
    Scalar(T),
    List(Vec<T>),
}

impl<T> StoredValue<T> {
    /// Returns which shape this value has.
    pub fn shape(&self) -> Shape {
        match self {
            StoredValue::Scalar(_) => Shape::Scalar,
            StoredValue::List(_) => Shape::List,
        }
    }

    /// Returns the scalar, or `None` for a list.
    pub fn into_scalar(self) -> Option<T> {
        match self {
            StoredValue::Scalar(value) => Some(value),
            StoredValue::List(_) => None,
        }
    }

    /// Returns the list, or `None` for a scalar.
    pub fn into_list(self) -> Option<Vec<T>> {
        match self {
            StoredValue::Scalar(_) => None,
            StoredValue::List(items) => Some(items),
        }
    }

    /// Borrows the list, or `None` for a scalar.
    pub fn as_list(&self) -> Option<&[T]> {
        match self {
            StoredValue::Scalar(_) => None,
            StoredValue::List(items) => Some(items),
        }
    }
}

// == Position ==
/// Where `list_append` inserts its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    /// Before existing elements (most-recent-first feeds)
    #[default]
    Front,
    /// After existing elements
    Back,
    /// Before the element currently at this index, clamped to the list length
    At(usize),
}

impl Position {
    /// Resolves the insertion index for a list of `len` elements.
    pub fn index(self, len: usize) -> usize {
        match self {
            Position::Front => 0,
            Position::Back => len,
            Position::At(index) => index.min(len),
        }
    }
}

/// Inserts `values` as one block at `position`, keeping their order.
pub(crate) fn insert_block<T>(list: &mut Vec<T>, position: Position, values: Vec<T>) {
    let at = position.index(list.len());
    list.splice(at..at, values);
}
