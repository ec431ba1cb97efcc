use std::collections::HashMap;

use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth;
use surrealdb::Surreal;
use url::Url;

pub use surrealdb::sql::Thing;

/// Helper trait for executing arbitrary SurrealQL queries.
pub mod query;

/// Typed record identifiers.
pub mod record;

/// Macros for defining table methods.
pub mod macros;

pub use query::{Bindings, Sql};
pub use record::Record;

use crate::Located;

pub type Result<T, E = DatabaseError> = std::result::Result<T, E>;

const SETUP: &str = include_str!("../schema.surrealql");

/// Represents an identifier for a database record.
pub trait Table {
    /// Returns the ID of the record.
    fn id(&self) -> &Thing;

    /// Returns the name of the table associated with the record.
    fn table() -> &'static str;
}

impl<T: Table> Table for &T {
    fn id(&self) -> &Thing {
        (*self).id()
    }

    fn table() -> &'static str {
        T::table()
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DatabaseError {
    #[snafu(display("cannot connect to the database `{endpoint}` at {location}: {source}"))]
    DatabaseConnection {
        endpoint: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("url `{url}` is missing a namespace parameter (ns) at {location}"))]
    NoNamespace {
        url: Url,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("url `{url}` is missing a database parameter (db) at {location}"))]
    NoDatabase {
        url: Url,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("could not apply the database schema at {location}: {source}"))]
    ApplySchema {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

impl Located for DatabaseError {
    fn location(&self) -> Location {
        match self {
            DatabaseError::DatabaseConnection { location, .. }
            | DatabaseError::NoNamespace { location, .. }
            | DatabaseError::NoDatabase { location, .. }
            | DatabaseError::ApplySchema { location, .. } => *location,
        }
    }
}

/// Connection information extracted from a database url.
///
/// The url carries the credentials in its userinfo part and selects the namespace and database
/// through the `ns` and `db` query parameters, e.g. `ws://root:root@localhost:8000?ns=edu&db=edu`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub address: String,
    pub credentials: Option<Credentials>,
    pub namespace: String,
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Endpoint {
    pub fn parse(url: &Url) -> Result<Self> {
        let mut query: HashMap<String, String> = url
            .query_pairs()
            .map(|(key, val)| (key.to_string(), val.to_string()))
            .collect();

        let namespace = query
            .remove("ns")
            .context(NoNamespaceSnafu { url: url.clone() })?;

        let database = query
            .remove("db")
            .context(NoDatabaseSnafu { url: url.clone() })?;

        let credentials = match url.username() {
            "" => None,
            username => Some(Credentials {
                username: username.to_owned(),
                password: url.password().unwrap_or("").to_owned(),
            }),
        };

        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_owned(),
            (None, _) => String::new(),
        };

        Ok(Endpoint {
            address: format!(
                "{}://{}{}",
                url.scheme(),
                host,
                url.path().trim_end_matches('/')
            ),
            credentials,
            namespace,
            database,
        })
    }
}

/// Represents a database wrapper.
///
/// All engine state lives in the database; the wrapper is cheap to clone and shared by every
/// request handler.
#[derive(Debug, Clone)]
pub struct Database {
    database: Surreal<Any>,
}

impl Database {
    /// Connects to the database described by the url and applies the schema.
    #[tracing::instrument(skip(url), fields(url = %url.as_str()))]
    pub async fn connect(url: &Url) -> Result<Self> {
        let endpoint = Endpoint::parse(url)?;
        Self::connect_endpoint(&endpoint).await
    }

    /// Starts a fresh embedded in-memory database, mostly useful for tests.
    pub async fn memory() -> Result<Self> {
        let endpoint = Endpoint {
            address: "mem://".to_owned(),
            credentials: None,
            namespace: "offensive".to_owned(),
            database: "offensive".to_owned(),
        };

        Self::connect_endpoint(&endpoint).await
    }

    async fn connect_endpoint(endpoint: &Endpoint) -> Result<Self> {
        let context = || DatabaseConnectionSnafu {
            endpoint: endpoint.address.clone(),
        };

        let db = surrealdb::engine::any::connect(endpoint.address.as_str())
            .await
            .with_context(|_| context())?;

        if let Some(credentials) = &endpoint.credentials {
            db.signin(auth::Root {
                username: &credentials.username,
                password: &credentials.password,
            })
            .await
            .with_context(|_| context())?;
        }

        db.use_ns(&endpoint.namespace)
            .use_db(&endpoint.database)
            .await
            .with_context(|_| context())?;

        db.query(SETUP)
            .await
            .and_then(|response| response.check())
            .context(ApplySchemaSnafu)?;

        tracing::info!(
            address = %endpoint.address,
            namespace = %endpoint.namespace,
            database = %endpoint.database,
            "connected to the database"
        );

        Ok(Database { database: db })
    }
}

impl std::ops::Deref for Database {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.database
    }
}
