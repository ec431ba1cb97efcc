//! HTTP surface of the engine.
//!
//! Every route is scoped to a user. The caller, when known, is taken from the [ACTOR_HEADER]
//! header and handed to the configured [crate::policy::Policy] before the engine is touched.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use snafu::{ensure, OptionExt as _, ResultExt as _};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::catalog::{User, Video};
use crate::completion::Completion;
use crate::database::Record;
use crate::model::Timestamp;
use crate::policy::{AccessRequest, Action, Decision};

mod error;
mod state;
mod view;

pub use error::ApiError;
use error::{ForbiddenSnafu, MalformedBodySnafu, NoOffensiveSnafu};
pub use state::AppState;
pub use view::{CompleteVideoResponse, OffensiveResult, OffensiveView, ProgressView};

pub const ACTOR_HEADER: &str = "x-user-id";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/users/:user_id/videos/:video_id/complete",
            post(complete_video),
        )
        .route("/users/:user_id/videos/:video_id/start", post(start_video))
        .route("/users/:user_id/offensive", get(offensive))
        .route("/users/:user_id/progress", get(progress))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteVideo {
    /// Simulated completion time, defaults to now.
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
}

fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    action: Action,
    user: &Record<User>,
) -> Result<(), ApiError> {
    let actor = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok());
    let request = AccessRequest {
        action,
        subject: user,
        actor,
    };

    ensure!(
        state.policy.check(&request) == Decision::Allow,
        ForbiddenSnafu {
            user_id: user.key(),
            action,
        }
    );

    Ok(())
}

#[instrument(skip(state, headers, body))]
async fn complete_video(
    State(state): State<AppState>,
    Path((user_id, video_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CompleteVideoResponse>, ApiError> {
    let user = Record::<User>::new(user_id);
    authorize(&state, &headers, Action::CompleteVideo, &user)?;

    // an empty body completes the video right now
    let request: CompleteVideo = if body.is_empty() {
        CompleteVideo::default()
    } else {
        serde_json::from_slice(&body).context(MalformedBodySnafu)?
    };

    let mut completion = Completion::new(user, Record::<Video>::new(video_id));
    if let Some(completed_at) = request.completed_at {
        completion = completion.at(completed_at);
    }

    let result = state
        .engine
        .record_completion(completion)
        .await
        .map_err(|error| ApiError::from_completion(error, state.tiers()))?;

    Ok(Json(CompleteVideoResponse::new(&result, state.tiers())))
}

#[instrument(skip(state, headers))]
async fn start_video(
    State(state): State<AppState>,
    Path((user_id, video_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<ProgressView>, ApiError> {
    let user = Record::<User>::new(user_id);
    authorize(&state, &headers, Action::StartVideo, &user)?;

    let progress = state
        .engine
        .record_interaction(&user, &Record::new(video_id))
        .await
        .map_err(|error| ApiError::from_completion(error, state.tiers()))?;

    Ok(Json(ProgressView::from(&progress)))
}

#[instrument(skip(state, headers))]
async fn offensive(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<OffensiveView>, ApiError> {
    let user = Record::<User>::new(user_id);
    authorize(&state, &headers, Action::ViewOffensive, &user)?;

    let offensive = state
        .engine
        .offensive(&user)
        .await
        .map_err(|error| ApiError::from_completion(error, state.tiers()))?
        .context(NoOffensiveSnafu {
            user_id: user.key(),
        })?;

    Ok(Json(OffensiveView::new(&offensive, state.tiers())))
}

#[instrument(skip(state, headers))]
async fn progress(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProgressView>>, ApiError> {
    let user = Record::<User>::new(user_id);
    authorize(&state, &headers, Action::ViewProgress, &user)?;

    let progress = state
        .engine
        .progress(&user)
        .await
        .map_err(|error| ApiError::from_completion(error, state.tiers()))?;

    Ok(Json(progress.iter().map(ProgressView::from).collect()))
}
