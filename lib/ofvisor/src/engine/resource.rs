// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use core::fmt;
use core::fmt::Display;

/// A marker trait indicating a type is an entry acquired from a
/// [`Resource`].
pub trait ResourceEntry {}

/// A marker trait indicating a type is a resource.
pub trait Resource {}

/// A finite resource represents a bounded pool of entries, each bound
/// to a key while it is held.
///
/// Obtaining an entry for a key which already holds one returns that
/// same entry; the binding lasts until it is released. Since the pool
/// is finite it may be exhausted at any given moment.
pub trait FiniteResource: Resource {
    type Key: Clone;
    type Entry: ResourceEntry;

    /// Obtain the entry bound to `key`, binding a new one if needed.
    ///
    /// # Errors
    ///
    /// Return an error if the resource is exhausted.
    fn obtain(&self, key: &Self::Key) -> Result<Self::Entry, ResourceError>;

    /// Release the entry back to the available resources.
    fn release(&self, key: &Self::Key, entry: Self::Entry);
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResourceError {
    Exhausted,
}

impl Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "resource exhausted"),
        }
    }
}
