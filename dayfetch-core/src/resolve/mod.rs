//! Date -> identifier resolution.
//!
//! The archive only answers "which date is identifier N". Resolution starts
//! from the anchor-based estimate and corrects it by probing:
//!
//! 1. probe the estimate, read back the reported date
//! 2. shift the identifier by the business-day difference to the target
//! 3. repeat until the reported date matches
//!
//! When two consecutive corrections cancel out the probe is flip-flopping
//! around the target, and the identifier is advanced by one instead.
//!
//! Every probe also narrows a bracket of identifiers known to lie before and
//! after the target. Corrections are clamped into the bracket, and once the
//! bracket closes on two adjacent identifiers the target has no dataset
//! (weekend, holiday, not yet published). An unpublished identifier above the
//! anchor counts as "after the target": estimates overshoot the newest
//! dataset by one identifier per holiday, so the search walks down in
//! doubling steps and then bisects. The iteration cap guarantees termination
//! when the archive or the anchor is inconsistent.

pub mod estimate;
pub mod relative;

pub use estimate::estimate;

use crate::archive::{FetchError, ResourceFetcher};
use crate::calendar::business_days_between;
use crate::domain::{ReferenceAnchor, Resolution, ResolutionOutcome, ResourceId};
use chrono::NaiveDate;
use tracing::{debug, warn};

/// Resolves calendar dates to archive identifiers for one anchor.
///
/// Holds no cache: resolving the same date twice probes the archive twice.
pub struct Resolver<'a> {
    anchor: &'a ReferenceAnchor,
    fetcher: &'a dyn ResourceFetcher,
    probe_artifact: &'a str,
    max_iterations: u32,
}

/// Identifiers known to report a date before / after the target.
#[derive(Debug, Default)]
struct Bracket {
    below: Option<ResourceId>,
    above: Option<ResourceId>,
}

#[derive(Debug, PartialEq, Eq)]
enum BracketState {
    Open,
    /// Adjacent identifiers straddle the target.
    Closed,
    /// An identifier after the target sits below one before it.
    Crossed,
}

impl Bracket {
    fn record(&mut self, id: ResourceId, before_target: bool) -> BracketState {
        if before_target {
            self.below = Some(self.below.map_or(id, |b| b.max(id)));
        } else {
            self.above = Some(self.above.map_or(id, |a| a.min(id)));
        }

        match (self.below, self.above) {
            (Some(b), Some(a)) if a <= b => BracketState::Crossed,
            (Some(b), Some(a)) if a.0 == b.0 + 1 => BracketState::Closed,
            // nothing below identifier zero
            (None, Some(ResourceId(0))) => BracketState::Closed,
            _ => BracketState::Open,
        }
    }

    /// Pull `id` strictly inside the bracket. Only called while it is open.
    ///
    /// With both ends known a correction that overshoots falls back to
    /// bisection, so convergence never degrades to one identifier per probe.
    fn clamp(&self, id: ResourceId) -> ResourceId {
        match (self.below, self.above) {
            (Some(b), Some(a)) if id <= b || id >= a => Self::midpoint(b, a),
            (Some(b), _) if id <= b => ResourceId(b.0 + 1),
            (_, Some(a)) if id >= a => ResourceId(a.0 - 1),
            _ => id,
        }
    }

    fn midpoint(below: ResourceId, above: ResourceId) -> ResourceId {
        ResourceId(below.0 + (above.0 - below.0) / 2)
    }
}

impl<'a> Resolver<'a> {
    pub fn new(
        anchor: &'a ReferenceAnchor,
        fetcher: &'a dyn ResourceFetcher,
        probe_artifact: &'a str,
        max_iterations: u32,
    ) -> Self {
        Self {
            anchor,
            fetcher,
            probe_artifact,
            max_iterations,
        }
    }

    pub fn anchor(&self) -> &ReferenceAnchor {
        self.anchor
    }

    pub fn fetcher(&self) -> &dyn ResourceFetcher {
        self.fetcher
    }

    /// The date the archive reports for `id`, `None` if unpublished.
    pub fn probe(&self, id: ResourceId) -> Result<Option<NaiveDate>, FetchError> {
        let reported = self.fetcher.reported_date(id, self.probe_artifact)?;
        debug!(%id, ?reported, "probed archive");
        Ok(reported)
    }

    /// Resolve `date` to the identifier whose dataset the archive dates `date`.
    pub fn resolve(&self, date: NaiveDate) -> Result<ResolutionOutcome, FetchError> {
        if date < self.anchor.earliest_date {
            return Ok(ResolutionOutcome::OutOfRange);
        }

        let Some(mut id) = estimate(self.anchor, date) else {
            warn!(%date, "estimate falls below identifier zero");
            return Ok(ResolutionOutcome::Divergent);
        };

        let mut bracket = Bracket::default();
        let mut prev_diff = 0i64;
        let mut corrections = 0u32;
        // doubles while probes keep landing past the newest dataset
        let mut tail_step = 1u64;

        loop {
            let next = match self.probe(id)? {
                Some(actual) if actual == date => {
                    debug!(%date, %id, corrections, "resolved");
                    return Ok(ResolutionOutcome::Resolved(Resolution { id, date: actual }));
                }
                Some(actual) => {
                    tail_step = 1;
                    match bracket.record(id, actual < date) {
                        BracketState::Open => {}
                        BracketState::Closed => return Ok(ResolutionOutcome::NotFound),
                        BracketState::Crossed => {
                            warn!(%date, %id, %actual, "archive dates are not monotonic");
                            return Ok(ResolutionOutcome::Divergent);
                        }
                    }

                    // positive: the probed dataset is later than the target
                    let diff = business_days_between(date, actual);
                    let next = if prev_diff != 0 && prev_diff + diff == 0 {
                        id.next()
                    } else if diff == 0 {
                        // target sits in a weekend gap next to `actual`
                        id.offset(if actual > date { -1 } else { 1 })
                    } else {
                        id.offset(-diff)
                    };
                    prev_diff = diff;
                    next
                }
                // past the newest published identifier: the dataset, if
                // any, is further down. Search down in growing steps, never
                // below the anchor, then bisect once a lower bound is known.
                None if id > self.anchor.anchor_id => {
                    if bracket.record(id, false) != BracketState::Open {
                        return Ok(ResolutionOutcome::NotFound);
                    }
                    prev_diff = 0;
                    let next = match bracket.below {
                        Some(below) => Bracket::midpoint(below, id),
                        None => ResourceId(
                            id.0.saturating_sub(tail_step).max(self.anchor.anchor_id.0),
                        ),
                    };
                    tail_step = tail_step.saturating_mul(2);
                    Some(next)
                }
                None => return Ok(ResolutionOutcome::NotFound),
            };

            if corrections >= self.max_iterations {
                warn!(%date, corrections, "resolution did not converge");
                return Ok(ResolutionOutcome::Divergent);
            }
            corrections += 1;

            let Some(next) = next else {
                return Ok(ResolutionOutcome::Divergent);
            };
            id = bracket.clamp(next);
        }
    }
}
