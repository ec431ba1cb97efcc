use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime, Offset as _, Utc};
use snafu::{Location, OptionExt as _, Snafu};

use crate::model::Timestamp;

#[derive(Debug, Snafu)]
pub enum CalendarError {
    #[snafu(display("utc offset of {minutes} minutes is out of range (at {location})"))]
    OffsetOutOfRange {
        minutes: i32,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Truncates instants to calendar days in a fixed reference time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Calendar {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    pub fn with_offset_minutes(minutes: i32) -> Result<Self, CalendarError> {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .context(OffsetOutOfRangeSnafu { minutes })?;

        Ok(Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn day_of(&self, timestamp: Timestamp) -> NaiveDate {
        timestamp.with_timezone(&self.offset).date_naive()
    }

    /// The first instant of the calendar day containing `timestamp`.
    pub fn start_of_day(&self, timestamp: Timestamp) -> Timestamp {
        let midnight = self.day_of(timestamp).and_time(NaiveTime::MIN);
        let utc = midnight - Duration::seconds(self.offset.local_minus_utc().into());
        utc.and_utc().into()
    }

    /// Whole calendar days from the day of `from` to the day of `to`; negative when `to` is on an
    /// earlier day.
    pub fn day_delta(&self, from: Timestamp, to: Timestamp) -> i64 {
        (self.day_of(to) - self.day_of(from)).num_days()
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}
