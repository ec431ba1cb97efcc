#![allow(dead_code)]

use offensive::catalog::{User, Video};
use offensive::completion::{Engine, Settings};
use offensive::database::{Database, Record};
use offensive::model::Timestamp;

pub const SUB_COURSE: &str = "rust-basics";

pub fn at(input: &str) -> Timestamp {
    Timestamp::parse(input).unwrap()
}

pub fn user(key: &str) -> Record<User> {
    Record::new(key)
}

pub fn video(key: &str) -> Record<Video> {
    Record::new(key)
}

/// An engine over a fresh in-memory database seeded with the given users and videos.
pub async fn engine(users: &[&str], videos: &[&str]) -> Engine {
    engine_with(Settings::default(), users, videos).await
}

pub async fn engine_with(settings: Settings, users: &[&str], videos: &[&str]) -> Engine {
    let database = Database::memory().await.unwrap();

    for key in users {
        User::new(user(key), key.to_string())
            .register(&database)
            .await
            .unwrap();
    }

    for key in videos {
        Video::new(video(key), format!("Lesson {key}"), SUB_COURSE.to_string())
            .register(&database)
            .await
            .unwrap();
    }

    Engine::new(database, settings)
}
