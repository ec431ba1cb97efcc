use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use snafu::{Location, Snafu};

use super::view::{OffensiveView, ProgressView};
use crate::completion::CompletionError;
use crate::model::Timestamp;
use crate::policy::Action;
use crate::streak::{StreakError, TierTable};
use crate::Located;

#[derive(Debug, Snafu, Serialize)]
#[snafu(visibility(pub(crate)))]
#[serde(tag = "error", content = "data", rename_all = "snake_case")]
pub enum ApiError {
    #[snafu(display("not allowed to {action:?} for user `{user_id}`"))]
    Forbidden {
        user_id: String,
        #[serde(skip)]
        action: Action,
        #[serde(skip)]
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("malformed request body: {source}"))]
    MalformedBody {
        #[serde(skip)]
        source: serde_json::Error,
        #[serde(skip)]
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("user `{user_id}` does not exist"))]
    UserNotFound { user_id: String },

    #[snafu(display("video `{video_id}` does not exist"))]
    VideoNotFound { video_id: String },

    #[snafu(display("user `{user_id}` has no offensive yet"))]
    NoOffensive { user_id: String },

    #[snafu(display("this video was already completed"))]
    AlreadyCompleted {
        progress: ProgressView,
        offensive: Option<OffensiveView>,
    },

    #[snafu(display(
        "completion at {completed_at} is on a day before the last counted one ({last_counted_at})"
    ))]
    InvalidTimestamp {
        completed_at: Timestamp,
        last_counted_at: Timestamp,
    },

    #[snafu(display("something went wrong on our side, please try again"))]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::MalformedBody { .. } => StatusCode::BAD_REQUEST,
            ApiError::UserNotFound { .. }
            | ApiError::VideoNotFound { .. }
            | ApiError::NoOffensive { .. } => StatusCode::NOT_FOUND,
            ApiError::AlreadyCompleted { .. } => StatusCode::CONFLICT,
            ApiError::InvalidTimestamp { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Translates an engine failure into what the caller gets to see. Internal details are only
    /// logged.
    pub fn from_completion(error: CompletionError, tiers: &TierTable) -> Self {
        match error {
            CompletionError::UserNotFound { user_id, .. } => ApiError::UserNotFound {
                user_id: user_id.key(),
            },
            CompletionError::VideoNotFound { video_id, .. } => ApiError::VideoNotFound {
                video_id: video_id.key(),
            },
            CompletionError::AlreadyCompleted {
                progress,
                offensive,
                ..
            } => ApiError::AlreadyCompleted {
                progress: ProgressView::from(progress.as_ref()),
                offensive: offensive.map(|offensive| OffensiveView::new(&offensive, tiers)),
            },
            CompletionError::InvalidTimestamp {
                source: StreakError::InvalidTimestamp { event, anchor, .. },
                ..
            } => ApiError::InvalidTimestamp {
                completed_at: event,
                last_counted_at: anchor,
            },
            error => {
                tracing::error!(%error, location = %error.location(), "request failed");
                ApiError::Internal
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiResponse {
    message: String,
    #[serde(flatten)]
    data: ApiError,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let content = ApiResponse {
            message: self.to_string(),
            data: self,
        };

        (status, Json(content)).into_response()
    }
}
