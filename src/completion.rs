//! Video completion intake: validates a completion, records it in the progress ledger and moves
//! the user's offensive forward, all in one database transaction.

use std::sync::Arc;
use std::time::Duration;

use derive_new::new;
use serde::Serialize;
use snafu::{IntoError as _, Location, OptionExt as _, ResultExt as _, Snafu};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::instrument;

use crate::catalog::{User, Video};
use crate::database::query::{DatabaseQueryError, NoResultsSnafu};
use crate::database::{Database, Record, Sql as _};
use crate::model::{now, Offensive, Timestamp, VideoProgress};
use crate::streak::{evaluate, Calendar, Evaluation, StreakError, TierTable};
use crate::Located;

const ALREADY_COMPLETED: &str = "progress_already_completed";
const VERSION_CONFLICT: &str = "offensive_version_conflict";

/// Writes the completed progress row and the next offensive state, provided nobody completed
/// the same video or moved the offensive since they were read.
const COMMIT_COMPLETION: &str = "
BEGIN TRANSACTION;
IF (SELECT VALUE completed FROM $progress_id) CONTAINSANY [true, 'true'] { THROW 'progress_already_completed' };
IF (SELECT VALUE version FROM $offensive_id) != $expected { THROW 'offensive_version_conflict' };
UPDATE $progress_id CONTENT $progress;
UPDATE $offensive_id CONTENT $offensive;
COMMIT TRANSACTION;
";

/// Same as [COMMIT_COMPLETION] for completions that leave the offensive untouched. The version
/// is still checked so the evaluation was made against the current row.
const COMMIT_PROGRESS: &str = "
BEGIN TRANSACTION;
IF (SELECT VALUE completed FROM $progress_id) CONTAINSANY [true, 'true'] { THROW 'progress_already_completed' };
IF (SELECT VALUE version FROM $offensive_id) != $expected { THROW 'offensive_version_conflict' };
UPDATE $progress_id CONTENT $progress;
COMMIT TRANSACTION;
";

/// Tunables of the engine, see [crate::config::Config].
#[derive(Debug, Clone)]
pub struct Settings {
    pub calendar: Calendar,
    pub tiers: TierTable,
    /// Attempts after the first one when the user's offensive changed underneath us.
    pub max_retries: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            calendar: Calendar::utc(),
            tiers: TierTable::default(),
            max_retries: 5,
        }
    }
}

/// A request to mark `video_id` completed for `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Completion {
    pub user_id: Record<User>,
    pub video_id: Record<Video>,
    /// Overrides the wall clock; only meant for simulating completions in tests.
    #[new(default)]
    pub completed_at: Option<Timestamp>,
}

impl Completion {
    pub fn at(self, completed_at: Timestamp) -> Self {
        Self {
            completed_at: Some(completed_at),
            ..self
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub progress: VideoProgress,
    pub offensive: Offensive,
    pub evaluation: Evaluation,
}

impl CompletionResult {
    pub fn is_new_offensive(&self) -> bool {
        self.evaluation.is_new_offensive()
    }

    pub fn is_streak_broken(&self) -> bool {
        self.evaluation.is_streak_broken()
    }

    pub fn message(&self) -> String {
        self.evaluation.message()
    }
}

/// Coarse classification of [CompletionError] for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyCompleted,
    InvalidTimestamp,
    Internal,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompletionError {
    #[snafu(display("user `{user_id}` does not exist"))]
    UserNotFound {
        user_id: Record<User>,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("video `{video_id}` does not exist"))]
    VideoNotFound {
        video_id: Record<Video>,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("video `{}` was already completed by `{}`", progress.video, progress.user))]
    AlreadyCompleted {
        progress: Box<VideoProgress>,
        offensive: Option<Box<Offensive>>,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{source}"))]
    InvalidTimestamp {
        source: StreakError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("offensive of `{user_id}` kept changing, gave up after {attempts} attempts"))]
    Contention {
        user_id: Record<User>,
        attempts: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not access the progress store: {source}"))]
    Storage {
        source: DatabaseQueryError,
        #[snafu(implicit)]
        location: Location,
    },
}

impl CompletionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompletionError::UserNotFound { .. } | CompletionError::VideoNotFound { .. } => {
                ErrorKind::NotFound
            }
            CompletionError::AlreadyCompleted { .. } => ErrorKind::AlreadyCompleted,
            CompletionError::InvalidTimestamp { .. } => ErrorKind::InvalidTimestamp,
            CompletionError::Contention { .. } | CompletionError::Storage { .. } => {
                ErrorKind::Internal
            }
        }
    }
}

impl Located for CompletionError {
    fn location(&self) -> Location {
        match self {
            CompletionError::UserNotFound { location, .. }
            | CompletionError::VideoNotFound { location, .. }
            | CompletionError::AlreadyCompleted { location, .. }
            | CompletionError::InvalidTimestamp { location, .. }
            | CompletionError::Contention { location, .. }
            | CompletionError::Storage { location, .. } => *location,
        }
    }
}

/// Why a single attempt did not go through.
#[derive(Debug)]
enum AttemptError {
    /// The offensive moved since it was read; safe to retry from scratch.
    Conflict,
    Failed(CompletionError),
}

impl From<CompletionError> for AttemptError {
    fn from(error: CompletionError) -> Self {
        AttemptError::Failed(error)
    }
}

/// The learning streak engine. Cheap to clone; all state lives in the database, so any number of
/// handlers and service instances may use it concurrently.
#[derive(Debug, Clone)]
pub struct Engine {
    database: Database,
    settings: Arc<Settings>,
}

impl Engine {
    pub fn new(database: Database, settings: Settings) -> Self {
        Self {
            database,
            settings: Arc::new(settings),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Marks a video completed and advances the user's offensive.
    ///
    /// Either both the progress row and the offensive are written, or neither is.
    #[instrument(skip(self, completion), fields(user = %completion.user_id, video = %completion.video_id, simulated = completion.is_simulated()))]
    pub async fn record_completion(
        &self,
        completion: Completion,
    ) -> Result<CompletionResult, CompletionError> {
        let user = self.user(&completion.user_id).await?;
        let video = self.video(&completion.video_id).await?;
        let completed_at = completion.completed_at.unwrap_or_else(now);

        let attempts = self.settings.max_retries + 1;
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(5)
            .max_delay(Duration::from_millis(200))
            .map(jitter)
            .take(self.settings.max_retries);

        let engine = self;
        let (user, video) = (&user, &video);
        let result = RetryIf::spawn(
            strategy,
            move || engine.attempt(user, video, completed_at),
            |error: &AttemptError| matches!(error, AttemptError::Conflict),
        )
        .await;

        match result {
            Ok(result) => {
                tracing::info!(
                    outcome = ?result.evaluation.outcome,
                    consecutive_days = result.offensive.consecutive_days,
                    tier = %result.offensive.tier,
                    total_offensives = result.offensive.total_offensives,
                    "recorded video completion"
                );
                Ok(result)
            }
            Err(AttemptError::Conflict) => {
                tracing::error!(attempts, "offensive stayed contended, giving up");
                ContentionSnafu {
                    user_id: user.id.clone(),
                    attempts,
                }
                .fail()
            }
            Err(AttemptError::Failed(error)) => Err(error),
        }
    }

    async fn attempt(
        &self,
        user: &User,
        video: &Video,
        completed_at: Timestamp,
    ) -> Result<CompletionResult, AttemptError> {
        let db = &self.database;
        let progress_id = VideoProgress::record_id(&user.id, &video.id);
        let offensive_id = Offensive::record_id(&user.id);

        let progress = VideoProgress::get(&progress_id, db)
            .await
            .context(StorageSnafu)?;
        let previous = Offensive::get(&offensive_id, db)
            .await
            .context(StorageSnafu)?;

        if let Some(progress) = progress.as_ref().filter(|progress| progress.completed) {
            return Err(already_completed(progress.clone(), previous).into());
        }

        let evaluation = evaluate(
            previous.as_ref().map(Offensive::streak).as_ref(),
            completed_at,
            &self.settings.calendar,
            &self.settings.tiers,
        )
        .context(InvalidTimestampSnafu)?;

        let progress = progress
            .unwrap_or_else(|| VideoProgress::pending(&user.id, video))
            .complete(completed_at);

        let expected: Vec<u64> = previous.iter().map(|offensive| offensive.version).collect();
        let (offensive, query) = match previous {
            Some(previous) if previous.streak() == evaluation.next => (previous, COMMIT_PROGRESS),
            previous => (
                Offensive::next(&user.id, previous.as_ref(), evaluation.next.clone()),
                COMMIT_COMPLETION,
            ),
        };

        let committed = db
            .sql(query)
            .bind(("progress_id", &progress_id))
            .bind(("progress", &progress))
            .bind(("offensive_id", &offensive_id))
            .bind(("offensive", &offensive))
            .bind(("expected", expected))
            .run()
            .await;

        match committed {
            Ok(()) => Ok(CompletionResult {
                progress,
                offensive,
                evaluation,
            }),
            Err(error) if error.mentions(ALREADY_COMPLETED) => {
                tracing::info!("video was completed concurrently");
                let progress = VideoProgress::get(&progress_id, db)
                    .await
                    .context(StorageSnafu)?
                    .unwrap_or(progress);
                let offensive = Offensive::get(&offensive_id, db)
                    .await
                    .context(StorageSnafu)?;

                Err(already_completed(progress, offensive).into())
            }
            Err(error) if is_conflict(&error) => {
                tracing::warn!(%error, "offensive changed while evaluating, retrying");
                Err(AttemptError::Conflict)
            }
            Err(error) => {
                tracing::error!(%error, location = %error.location(), "failed to commit completion");
                Err(StorageSnafu.into_error(error).into())
            }
        }
    }

    /// Records the first interaction of a user with a video: creates a not yet completed
    /// progress row if there is none, and never touches an existing one.
    #[instrument(skip(self))]
    pub async fn record_interaction(
        &self,
        user_id: &Record<User>,
        video_id: &Record<Video>,
    ) -> Result<VideoProgress, CompletionError> {
        let user = self.user(user_id).await?;
        let video = self.video(video_id).await?;
        let id = VideoProgress::record_id(&user.id, &video.id);

        VideoProgress::touch(
            &id,
            &user.id,
            &video.id,
            &video.sub_course_id,
            now(),
            &self.database,
        )
        .await
        .context(StorageSnafu)?
        .context(NoResultsSnafu)
        .context(StorageSnafu)
    }

    /// The user's current offensive, `None` until their first completion.
    #[instrument(skip(self))]
    pub async fn offensive(&self, user_id: &Record<User>) -> Result<Option<Offensive>, CompletionError> {
        let user = self.user(user_id).await?;

        Offensive::get(&Offensive::record_id(&user.id), &self.database)
            .await
            .context(StorageSnafu)
    }

    /// Every progress row of the user, oldest first.
    #[instrument(skip(self))]
    pub async fn progress(&self, user_id: &Record<User>) -> Result<Vec<VideoProgress>, CompletionError> {
        let user = self.user(user_id).await?;

        VideoProgress::of_user(&user.id, &self.database)
            .await
            .context(StorageSnafu)
    }

    async fn user(&self, user_id: &Record<User>) -> Result<User, CompletionError> {
        User::get(user_id, &self.database)
            .await
            .context(StorageSnafu)?
            .context(UserNotFoundSnafu {
                user_id: user_id.clone(),
            })
    }

    async fn video(&self, video_id: &Record<Video>) -> Result<Video, CompletionError> {
        Video::get(video_id, &self.database)
            .await
            .context(StorageSnafu)?
            .context(VideoNotFoundSnafu {
                video_id: video_id.clone(),
            })
    }
}

fn already_completed(progress: VideoProgress, offensive: Option<Offensive>) -> CompletionError {
    AlreadyCompletedSnafu {
        progress: Box::new(progress),
        offensive: offensive.map(Box::new),
    }
    .build()
}

/// A racing writer got there first: the offensive version moved, a concurrent first completion
/// created the user's offensive row, or the storage engine refused to commit.
fn is_conflict(error: &DatabaseQueryError) -> bool {
    error.mentions(VERSION_CONFLICT)
        || error.mentions("already exists")
        || error.mentions("already contains")
        || error.mentions("read or write conflict")
}
