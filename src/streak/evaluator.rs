use serde::{Deserialize, Serialize};
use snafu::{Location, Snafu};

use super::{Calendar, Tier, TierTable};
use crate::model::Timestamp;

/// The streak part of a user's offensive, independent of how it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub tier: Tier,
    pub consecutive_days: u32,
    /// Anchor of the most recent counted day.
    pub last_video_completed_at: Timestamp,
    /// Start of the calendar day the current run began on.
    pub streak_start_date: Timestamp,
    pub total_offensives: u32,
}

/// What a completion did to the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// First run ever for this user.
    Started,
    /// Another completion on a day that is already counted.
    SameDay,
    /// First completion on the day after the last counted day.
    Continued,
    /// At least one whole day was skipped; a new run started.
    Broken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub next: Streak,
    pub outcome: Outcome,
    /// Tier before this completion, `None` for a brand-new offensive.
    pub previous_tier: Option<Tier>,
}

impl Evaluation {
    pub fn is_new_offensive(&self) -> bool {
        self.outcome == Outcome::Started
    }

    pub fn is_streak_broken(&self) -> bool {
        self.outcome == Outcome::Broken
    }

    pub fn tier_changed(&self) -> bool {
        self.previous_tier
            .is_some_and(|previous| previous != self.next.tier)
    }

    /// A short human readable summary for the caller to display.
    pub fn message(&self) -> String {
        let days = self.next.consecutive_days;
        let mut message = match self.outcome {
            Outcome::Started => "Offensive started! Day 1.".to_string(),
            Outcome::SameDay => {
                format!("Today already counts, your offensive stays at {days} day(s).")
            }
            Outcome::Continued => format!("Offensive continued: {days} days in a row."),
            Outcome::Broken => {
                "Offensive broken after a missed day, starting again at day 1.".to_string()
            }
        };

        if self.tier_changed() {
            message.push_str(&format!(" You reached the {} tier!", self.next.tier));
        }

        message
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StreakError {
    #[snafu(display(
        "completion at {event} falls on a calendar day before the streak anchor {anchor} (at {location})"
    ))]
    InvalidTimestamp {
        event: Timestamp,
        anchor: Timestamp,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Decides the next streak state for a completion at `event`.
///
/// | day delta | consecutive days | start date | total offensives |
/// |-----------|------------------|------------|------------------|
/// | no prior  | 1                | event day  | 1                |
/// | 0         | unchanged        | unchanged  | unchanged        |
/// | 1         | +1               | unchanged  | unchanged        |
/// | >= 2      | 1                | event day  | +1               |
/// | < 0       | rejected         |            |                  |
///
/// The anchor only moves forward: a same-day completion earlier than the stored anchor keeps it.
pub fn evaluate(
    previous: Option<&Streak>,
    event: Timestamp,
    calendar: &Calendar,
    tiers: &TierTable,
) -> Result<Evaluation, StreakError> {
    let Some(previous) = previous else {
        let next = Streak {
            tier: tiers.classify(1),
            consecutive_days: 1,
            last_video_completed_at: event,
            streak_start_date: calendar.start_of_day(event),
            total_offensives: 1,
        };

        return Ok(Evaluation {
            next,
            outcome: Outcome::Started,
            previous_tier: None,
        });
    };

    let anchor = previous.last_video_completed_at;
    let delta = calendar.day_delta(anchor, event);

    let (next, outcome) = match delta {
        delta if delta < 0 => return InvalidTimestampSnafu { event, anchor }.fail(),
        0 => {
            let next = Streak {
                last_video_completed_at: anchor.max(event),
                ..previous.clone()
            };
            (next, Outcome::SameDay)
        }
        1 => {
            let consecutive_days = previous.consecutive_days.saturating_add(1);
            let next = Streak {
                tier: tiers.classify(consecutive_days),
                consecutive_days,
                last_video_completed_at: event,
                ..previous.clone()
            };
            (next, Outcome::Continued)
        }
        _ => {
            let next = Streak {
                tier: tiers.classify(1),
                consecutive_days: 1,
                last_video_completed_at: event,
                streak_start_date: calendar.start_of_day(event),
                total_offensives: previous.total_offensives.saturating_add(1),
            };
            (next, Outcome::Broken)
        }
    };

    Ok(Evaluation {
        next,
        outcome,
        previous_tier: Some(previous.tier),
    })
}
