use serde::{Deserialize, Serialize};
use snafu::{ensure, Location, Snafu};

/// Streak strength, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Normal,
    Super,
    Ultra,
    King,
    Infinity,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Normal,
        Tier::Super,
        Tier::Ultra,
        Tier::King,
        Tier::Infinity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Normal => "NORMAL",
            Tier::Super => "SUPER",
            Tier::Ultra => "ULTRA",
            Tier::King => "KING",
            Tier::Infinity => "INFINITY",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Snafu)]
pub enum TierTableError {
    #[snafu(display("expected {expected} tier thresholds but got {actual} (at {location})"))]
    ThresholdCount {
        expected: usize,
        actual: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "tier {tier} starts at day {from}, which must be after day {previous} (at {location})"
    ))]
    NotIncreasing {
        tier: Tier,
        from: u32,
        previous: u32,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Ordered day-count thresholds. Every tier owns the half-open interval from its own first day
/// up to the first day of the next tier; [Tier::Normal] always starts at day 1 and
/// [Tier::Infinity] is unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierTable {
    starts: [(Tier, u32); 5],
}

impl TierTable {
    pub const DEFAULT_THRESHOLDS: [u32; 4] = [7, 30, 90, 365];

    /// Builds the table from the first day of SUPER, ULTRA, KING and INFINITY, in that order.
    pub fn new(thresholds: &[u32]) -> Result<Self, TierTableError> {
        ensure!(
            thresholds.len() == 4,
            ThresholdCountSnafu {
                expected: 4usize,
                actual: thresholds.len()
            }
        );

        let mut starts = [(Tier::Normal, 1); 5];
        for (index, (&tier, &from)) in Tier::ALL[1..].iter().zip(thresholds).enumerate() {
            let previous = starts[index].1;
            ensure!(
                from > previous,
                NotIncreasingSnafu {
                    tier,
                    from,
                    previous
                }
            );
            starts[index + 1] = (tier, from);
        }

        Ok(Self { starts })
    }

    /// Maps a consecutive-day count to its tier. Counts below the first threshold, including 0,
    /// are [Tier::Normal].
    pub fn classify(&self, consecutive_days: u32) -> Tier {
        self.starts
            .iter()
            .rev()
            .find(|(_, from)| consecutive_days >= *from)
            .map_or(Tier::Normal, |(tier, _)| *tier)
    }

    /// The next tier above the one `consecutive_days` falls into and the day it starts on.
    pub fn next_tier(&self, consecutive_days: u32) -> Option<(Tier, u32)> {
        self.starts
            .iter()
            .find(|(_, from)| *from > consecutive_days)
            .copied()
    }

    /// The first day of `tier`.
    pub fn starts_at(&self, tier: Tier) -> u32 {
        self.starts
            .iter()
            .find(|(candidate, _)| *candidate == tier)
            .map_or(1, |(_, from)| *from)
    }
}

impl Default for TierTable {
    fn default() -> Self {
        let starts = [
            (Tier::Normal, 1),
            (Tier::Super, Self::DEFAULT_THRESHOLDS[0]),
            (Tier::Ultra, Self::DEFAULT_THRESHOLDS[1]),
            (Tier::King, Self::DEFAULT_THRESHOLDS[2]),
            (Tier::Infinity, Self::DEFAULT_THRESHOLDS[3]),
        ];

        Self { starts }
    }
}
