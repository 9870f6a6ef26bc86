//! Walk-back resolution: the most recent dataset on or before a date.

use super::Resolver;
use crate::archive::FetchError;
use crate::calendar::previous_day;
use crate::domain::ResolutionOutcome;
use chrono::NaiveDate;
use tracing::debug;

impl Resolver<'_> {
    /// Resolve `date`, stepping back one calendar day at a time while no
    /// dataset exists for it. Stops with `OutOfRange` below the earliest date.
    ///
    /// `Divergent` and transport errors end the search immediately.
    pub fn resolve_relative(&self, date: NaiveDate) -> Result<ResolutionOutcome, FetchError> {
        let mut current = date;
        loop {
            match self.resolve(current)? {
                ResolutionOutcome::NotFound => {
                    debug!(%current, "no dataset, stepping back a day");
                    current = match previous_day(current) {
                        Some(prev) => prev,
                        None => return Ok(ResolutionOutcome::OutOfRange),
                    };
                }
                outcome => return Ok(outcome),
            }
        }
    }

    /// Whether the archive has published the dataset for exactly `date`.
    pub fn is_data_available(&self, date: NaiveDate) -> Result<bool, FetchError> {
        Ok(self
            .resolve_relative(date)?
            .resolved()
            .is_some_and(|resolution| resolution.date == date))
    }
}
