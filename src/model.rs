pub use offensive::*;
pub use progress::*;
pub use timestamp::*;

mod offensive;
mod progress;
mod timestamp;
