use serde::{Deserialize, Serialize};

use super::{now, Timestamp};
use crate::catalog::User;
use crate::database::Record;
use crate::streak::{Streak, Tier};
use crate::{define_relation, define_table};

/// A user's persisted streak. Exactly one row per user, keyed `offensives:<user key>`.
///
/// `version` increases by one on every write and is what concurrent writers compare against
/// before committing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Offensive {
    pub id: Record<Offensive>,
    pub user: Record<User>,
    pub tier: Tier,
    pub consecutive_days: u32,
    pub last_video_completed_at: Timestamp,
    pub streak_start_date: Timestamp,
    pub total_offensives: u32,
    pub version: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

define_table!("offensives" : Offensive = id);

define_relation! {
    Offensive > get(id: &Record<Offensive>) > Option<Offensive>
        where "SELECT * FROM $id"
}

impl Offensive {
    pub fn record_id(user: &Record<User>) -> Record<Offensive> {
        Record::new(user.key())
    }

    pub fn streak(&self) -> Streak {
        Streak {
            tier: self.tier,
            consecutive_days: self.consecutive_days,
            last_video_completed_at: self.last_video_completed_at,
            streak_start_date: self.streak_start_date,
            total_offensives: self.total_offensives,
        }
    }

    /// The row that stores `streak` for `user`, following `previous` if there is one.
    pub fn next(user: &Record<User>, previous: Option<&Offensive>, streak: Streak) -> Offensive {
        let updated_at = now();
        let (version, created_at) = match previous {
            Some(previous) => (previous.version + 1, previous.created_at),
            None => (1, updated_at),
        };

        Offensive {
            id: Self::record_id(user),
            user: user.clone(),
            tier: streak.tier,
            consecutive_days: streak.consecutive_days,
            last_video_completed_at: streak.last_video_completed_at,
            streak_start_date: streak.streak_start_date,
            total_offensives: streak.total_offensives,
            version,
            created_at,
            updated_at,
        }
    }
}
