//! Read-only views of the platform catalog that completions refer to.
//!
//! Users and videos are owned by other parts of the platform; the engine only checks that they
//! exist and reads the sub-course a video belongs to. [User::register] and [Video::register]
//! exist for seeding local databases and tests.

use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::database::query::DatabaseQueryError;
use crate::database::{Database, Record, Sql as _};
use crate::model::{now, Timestamp};
use crate::{define_relation, define_table};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct User {
    pub id: Record<User>,
    pub name: String,
    #[new(value = "now()")]
    pub created_at: Timestamp,
}

define_table!("users" : User = id);

define_relation! {
    User > get(id: &Record<User>) > Option<User>
        where "SELECT * FROM $id"
}

impl User {
    pub async fn register(&self, db: &Database) -> Result<User, DatabaseQueryError> {
        db.sql("CREATE $id CONTENT $user")
            .bind(("id", &self.id))
            .bind(("user", self))
            .fetch_one()
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct Video {
    pub id: Record<Video>,
    pub title: String,
    pub sub_course_id: String,
    #[new(value = "now()")]
    pub created_at: Timestamp,
}

define_table!("videos" : Video = id);

define_relation! {
    Video > get(id: &Record<Video>) > Option<Video>
        where "SELECT * FROM $id"
}

impl Video {
    pub async fn register(&self, db: &Database) -> Result<Video, DatabaseQueryError> {
        db.sql("CREATE $id CONTENT $video")
            .bind(("id", &self.id))
            .bind(("video", self))
            .fetch_one()
            .await
    }
}
