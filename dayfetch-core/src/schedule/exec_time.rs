//! Daily execution time (`HH:MM`, 24-hour).

use chrono::NaiveTime;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid execution time '{0}': expected a 24-hour time in HH:MM format")]
pub struct ExecTimeError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecTime(NaiveTime);

impl ExecTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(ExecTime)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl FromStr for ExecTime {
    type Err = ExecTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ExecTimeError(s.to_string());
        let (hours, minutes) = s.trim().split_once(':').ok_or_else(err)?;
        let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 || !digits(hours) || !digits(minutes) {
            return Err(err());
        }
        let hour: u32 = hours.parse().map_err(|_| err())?;
        let minute: u32 = minutes.parse().map_err(|_| err())?;
        ExecTime::new(hour, minute).ok_or_else(err)
    }
}

impl fmt::Display for ExecTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}
