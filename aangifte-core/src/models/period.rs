use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn new(
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self { start, end }
    }

    /// The whole calendar year, or `None` when the year is outside chrono's range.
    pub fn calendar_year(year: i32) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year, 12, 31)?,
        })
    }

    pub fn is_reversed(&self) -> bool {
        self.end < self.start
    }

    /// Number of days covered, counting both ends. Zero for a reversed period.
    pub fn days(&self) -> i64 {
        if self.is_reversed() {
            0
        } else {
            (self.end - self.start).num_days() + 1
        }
    }

    pub fn contains(
        &self,
        other: &Period,
    ) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(
        &self,
        other: &Period,
    ) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}
