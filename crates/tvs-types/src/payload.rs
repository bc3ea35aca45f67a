//! Content-type tags carried alongside stored ids.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::Id;

/// One-byte tag classifying the logical type of a stored value.
///
/// The storage layer never interprets the tag; it is carried verbatim so
/// callers can route a retrieved id to the right decoder without fetching
/// the content itself.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Payload(pub u8);

impl Payload {
    /// Tag for content whose logical type the caller does not track.
    pub const UNKNOWN: Self = Self(0);

    pub const fn new(tag: u8) -> Self {
        Self(tag)
    }

    pub const fn tag(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A value paired with its payload tag.
///
/// Fragments store `WithPayload<Id>` per key; the generic parameter keeps
/// the pairing usable for decoded values as well.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WithPayload<T> {
    pub payload: Payload,
    pub value: T,
}

impl<T> WithPayload<T> {
    pub fn new(payload: Payload, value: T) -> Self {
        Self { payload, value }
    }

    /// Pair a value with [`Payload::UNKNOWN`].
    pub fn untagged(value: T) -> Self {
        Self::new(Payload::UNKNOWN, value)
    }
}

impl WithPayload<Id> {
    pub fn id(&self) -> Id {
        self.value
    }
}
