use serde::de::DeserializeOwned;
use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};
use surrealdb::opt::QueryResult;

use super::Database;
use crate::Located;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DatabaseQueryError {
    #[snafu(display("malformed query at {location}: {source}"))]
    MalformedQuery {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to deserialize the database response at {location}: {source}"))]
    Deserialize {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("expected a result from the database at {location}, but got none"))]
    NoResults {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("statement {statement} failed at {location}: {source}"))]
    Statement {
        statement: usize,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

impl DatabaseQueryError {
    /// Whether the error message produced by the database mentions `marker`.
    ///
    /// Errors raised with `THROW` inside a transaction only keep their message, so this is how
    /// the caller recognises its own failure markers.
    pub fn mentions(&self, marker: &str) -> bool {
        match self {
            DatabaseQueryError::MalformedQuery { source, .. }
            | DatabaseQueryError::Deserialize { source, .. }
            | DatabaseQueryError::Statement { source, .. } => source.to_string().contains(marker),
            DatabaseQueryError::NoResults { .. } => false,
        }
    }
}

impl Located for DatabaseQueryError {
    fn location(&self) -> Location {
        match self {
            DatabaseQueryError::MalformedQuery { location, .. }
            | DatabaseQueryError::Deserialize { location, .. }
            | DatabaseQueryError::NoResults { location, .. }
            | DatabaseQueryError::Statement { location, .. } => *location,
        }
    }
}

/// An extension trait that allows you to execute raw SQL queries. Parameters can be bound using the [Bindings::bind] method which takes any serializable data structure.
///
/// # Example
/// ```ignore
/// let completed: Vec<VideoProgress> = database.sql("SELECT * FROM progress WHERE user = $user AND completed = true")
///     .bind(("user", user_id))
///     .fetch_first()
///     .await?;
/// ```
pub trait Sql {
    fn sql(&self, query: &str) -> Bindings<'_>;
}

impl Sql for Database {
    fn sql(&self, query: &str) -> Bindings<'_> {
        Bindings {
            query: self.query(query),
        }
    }
}

#[derive(Debug)]
pub struct Bindings<'a> {
    query: surrealdb::method::Query<'a, surrealdb::engine::any::Any>,
}

impl Bindings<'_> {
    pub fn bind(mut self, params: impl serde::Serialize) -> Self {
        let query = self.query;
        self.query = query.bind(params);
        self
    }

    /// Execute the query and return a [surrealdb::Response] which is SurrealDB's way to represent a list of statements returned from the database.
    ///
    /// This means that you can execute multiple queries in a single call and get all the results back.
    pub async fn execute(self) -> Result<surrealdb::Response, DatabaseQueryError> {
        let response = self.query.await.context(MalformedQuerySnafu)?;
        tracing::trace!(?response, "executed query");
        Ok(response)
    }

    /// Execute the queries and fail with the first statement error, if any.
    ///
    /// Transactions report every statement of a cancelled block as failed; the statement that
    /// actually failed keeps its own error, so all of them are inspected.
    pub async fn run(self) -> Result<(), DatabaseQueryError> {
        let mut response = self.execute().await?;
        let mut errors: Vec<(usize, surrealdb::Error)> = response.take_errors().into_iter().collect();
        errors.sort_by_key(|(statement, _)| *statement);

        if errors.is_empty() {
            return Ok(());
        }

        let index = errors
            .iter()
            .position(|(_, error)| !is_cancellation(error))
            .unwrap_or(0);
        let (statement, source) = errors.swap_remove(index);

        Err(source).context(StatementSnafu { statement })
    }

    /// Execute the query and return the first result as a deserialized value.
    pub async fn fetch_first<T: DeserializeOwned>(self) -> Result<T, DatabaseQueryError>
    where
        usize: QueryResult<T>,
    {
        let mut statements = self.execute().await?;
        let result = statements.take::<T>(0).context(DeserializeSnafu)?;
        Ok(result)
    }

    /// Execute the query and return the first result, failing when there is none.
    pub async fn fetch_one<T: DeserializeOwned>(self) -> Result<T, DatabaseQueryError>
    where
        usize: QueryResult<Option<T>>,
    {
        self.fetch_first::<Option<T>>()
            .await?
            .context(NoResultsSnafu)
    }
}

fn is_cancellation(error: &surrealdb::Error) -> bool {
    let message = error.to_string();
    message.contains("was not executed") || message.contains("cancelled transaction")
}
