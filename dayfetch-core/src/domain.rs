//! Domain types shared by the resolver, the downloader and the scheduler.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier the archive assigns to one business day's dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

impl ResourceId {
    /// Shift by a signed number of identifiers. `None` below zero or on overflow.
    pub fn offset(self, delta: i64) -> Option<ResourceId> {
        self.0.checked_add_signed(delta).map(ResourceId)
    }

    pub fn next(self) -> Option<ResourceId> {
        self.offset(1)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed point relating the archive's identifiers to the calendar.
///
/// Loaded once at startup and passed by reference to everything that
/// estimates or resolves identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceAnchor {
    pub anchor_id: ResourceId,
    pub anchor_date: NaiveDate,
    /// Inclusive lower bound on resolvable dates.
    pub earliest_date: NaiveDate,
}

/// An identifier together with the date the archive reported for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub id: ResourceId,
    pub date: NaiveDate,
}

/// Result of turning a calendar date into an archive identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Resolved(Resolution),
    /// No identifier maps to the date.
    NotFound,
    /// The date precedes the anchor's earliest date.
    OutOfRange,
    /// The correction loop did not converge; the anchor and the archive disagree.
    Divergent,
}

impl ResolutionOutcome {
    pub fn resolved(&self) -> Option<Resolution> {
        match self {
            ResolutionOutcome::Resolved(r) => Some(*r),
            _ => None,
        }
    }
}

/// What happened to a single artifact of a single day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    Downloaded { bytes: u64 },
    /// The destination already held the file; nothing was written.
    AlreadyExists,
    TransportError(String),
}
