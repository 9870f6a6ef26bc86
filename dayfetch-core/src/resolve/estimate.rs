//! Anchor-based identifier estimate.

use crate::calendar::business_days_between;
use crate::domain::{ReferenceAnchor, ResourceId};
use chrono::NaiveDate;

/// `anchor_id + business_days_between(anchor_date, date)`.
///
/// Only approximate: the archive skips holidays that the business-day count
/// does not know about. `None` when the estimate would be negative.
pub fn estimate(anchor: &ReferenceAnchor, date: NaiveDate) -> Option<ResourceId> {
    anchor
        .anchor_id
        .offset(business_days_between(anchor.anchor_date, date))
}
