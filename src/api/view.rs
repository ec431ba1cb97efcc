use serde::{Deserialize, Serialize};

use crate::completion::CompletionResult;
use crate::model::{Offensive, Timestamp, VideoProgress};
use crate::streak::{Outcome, Tier, TierTable};

/// JSON shape of a progress row. Ids are plain keys, without the table name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressView {
    pub user_id: String,
    pub video_id: String,
    pub sub_course_id: String,
    pub completed: bool,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&VideoProgress> for ProgressView {
    fn from(progress: &VideoProgress) -> Self {
        Self {
            user_id: progress.user.key(),
            video_id: progress.video.key(),
            sub_course_id: progress.sub_course_id.clone(),
            completed: progress.completed,
            completed_at: progress.completed_at,
            created_at: progress.created_at,
            updated_at: progress.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffensiveView {
    pub user_id: String,
    pub tier: Tier,
    pub consecutive_days: u32,
    pub last_video_completed_at: Timestamp,
    pub streak_start_date: Timestamp,
    pub total_offensives: u32,
    /// The next tier up and the streak length it starts at, absent at INFINITY.
    pub next_tier: Option<Tier>,
    pub next_tier_at: Option<u32>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl OffensiveView {
    pub fn new(offensive: &Offensive, tiers: &TierTable) -> Self {
        let next = tiers.next_tier(offensive.consecutive_days);

        Self {
            user_id: offensive.user.key(),
            tier: offensive.tier,
            consecutive_days: offensive.consecutive_days,
            last_video_completed_at: offensive.last_video_completed_at,
            streak_start_date: offensive.streak_start_date,
            total_offensives: offensive.total_offensives,
            next_tier: next.map(|(tier, _)| tier),
            next_tier_at: next.map(|(_, from)| from),
            created_at: offensive.created_at,
            updated_at: offensive.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffensiveResult {
    pub offensive: OffensiveView,
    pub outcome: Outcome,
    pub is_new_offensive: bool,
    pub is_streak_broken: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteVideoResponse {
    pub progress: ProgressView,
    pub offensive_result: OffensiveResult,
}

impl CompleteVideoResponse {
    pub fn new(result: &CompletionResult, tiers: &TierTable) -> Self {
        Self {
            progress: ProgressView::from(&result.progress),
            offensive_result: OffensiveResult {
                offensive: OffensiveView::new(&result.offensive, tiers),
                outcome: result.evaluation.outcome,
                is_new_offensive: result.is_new_offensive(),
                is_streak_broken: result.is_streak_broken(),
                message: result.message(),
            },
        }
    }
}
