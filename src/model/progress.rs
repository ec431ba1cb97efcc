use serde::{Deserialize, Deserializer, Serialize};

use super::{now, Timestamp};
use crate::catalog::{User, Video};
use crate::database::Record;
use crate::{define_relation, define_table};

/// One user's progress on one video. The record id is the `(user, video)` pair, so there is
/// never more than one row per pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VideoProgress {
    pub id: Record<VideoProgress>,
    pub user: Record<User>,
    pub video: Record<Video>,
    pub sub_course_id: String,
    #[serde(deserialize_with = "legacy_bool")]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

define_table!("progress" : VideoProgress = id);

define_relation! {
    VideoProgress > get(id: &Record<VideoProgress>) > Option<VideoProgress>
        where "SELECT * FROM $id"
}

define_relation! {
    VideoProgress > of_user(user: &Record<User>) > Vec<VideoProgress>
        where "SELECT * FROM progress WHERE user = $user ORDER BY created_at ASC"
}

define_relation! {
    VideoProgress > touch(id: &Record<VideoProgress>, user: &Record<User>, video: &Record<Video>, sub_course_id: &str, now: Timestamp) > Option<VideoProgress>
        where "UPDATE $id SET user = $user, video = $video, sub_course_id = $sub_course_id, completed = completed OR false, created_at = created_at OR $now, updated_at = updated_at OR $now"
}

impl VideoProgress {
    pub fn record_id(user: &Record<User>, video: &Record<Video>) -> Record<VideoProgress> {
        Record::pair(user, video)
    }

    /// A fresh, not yet completed row.
    pub fn pending(user: &Record<User>, video: &Video) -> Self {
        let created_at = now();

        Self {
            id: Self::record_id(user, &video.id),
            user: user.clone(),
            video: video.id.clone(),
            sub_course_id: video.sub_course_id.clone(),
            completed: false,
            completed_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// The row after marking it completed at `at`. `completed_at` is only ever set once.
    pub fn complete(self, at: Timestamp) -> Self {
        Self {
            completed: true,
            completed_at: self.completed_at.or(Some(at)),
            updated_at: now(),
            ..self
        }
    }
}

/// Older rows store flags as `"true"`/`"false"` text; accept both encodings on read.
fn legacy_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean flag, got '{other}'"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Row {
        #[serde(deserialize_with = "legacy_bool")]
        completed: bool,
    }

    fn read(value: serde_json::Value) -> Result<bool, serde_json::Error> {
        serde_json::from_value::<Row>(serde_json::json!({ "completed": value }))
            .map(|row| row.completed)
    }

    #[test]
    fn native_booleans() {
        assert!(read(serde_json::json!(true)).unwrap());
        assert!(!read(serde_json::json!(false)).unwrap());
    }

    #[test]
    fn legacy_text_flags() {
        assert!(read(serde_json::json!("true")).unwrap());
        assert!(read(serde_json::json!("TRUE")).unwrap());
        assert!(!read(serde_json::json!("false")).unwrap());
    }

    #[test]
    fn unknown_text_is_rejected() {
        assert!(read(serde_json::json!("maybe")).is_err());
    }
}
