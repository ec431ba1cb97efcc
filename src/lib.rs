pub mod api;
pub mod catalog;
pub mod completion;
pub mod config;
pub mod database;
pub mod error;
pub mod logger;
pub mod model;
pub mod policy;
pub mod streak;

pub trait Located {
    fn location(&self) -> snafu::Location;
}
