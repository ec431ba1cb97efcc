//! Pure streak ("offensive") logic: calendar-day arithmetic, tier classification and the
//! continue / same-day / reset decision. Nothing in here performs I/O.

pub use calendar::{Calendar, CalendarError};
pub use evaluator::{evaluate, Evaluation, Outcome, Streak, StreakError};
pub use tier::{Tier, TierTable, TierTableError};

mod calendar;
mod evaluator;
mod tier;
