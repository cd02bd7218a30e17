use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::Key;
use diesel::{
    SqliteConnection,
    connection::SimpleConnection,
    r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection},
};
use tokio::{sync::broadcast::Sender, task::spawn_blocking};

use crate::{config::Settings, msg::Msg, util_resp::FailureResponse};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

pub type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Debug)]
struct SqliteCustomizer {
    shared_memory: bool,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error>
    for SqliteCustomizer
{
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;",
        )
        .map_err(diesel::r2d2::Error::QueryError)?;
        if self.shared_memory {
            conn.batch_execute("PRAGMA read_uncommitted = true;")
                .map_err(diesel::r2d2::Error::QueryError)?;
        }
        Ok(())
    }
}

/// Opens a connection pool for `database_url`.
///
/// `:memory:` opens a fresh in-memory database which is shared by all the
/// connections of the pool. It lives exactly as long as the pool does.
pub fn build_pool(
    database_url: &str,
) -> Result<DbPool, diesel::r2d2::PoolError> {
    if database_url == ":memory:" {
        let url = format!(
            "file:expotab-{}?mode=memory&cache=shared",
            uuid::Uuid::now_v7().simple()
        );
        // the database is dropped when its last connection closes, so the
        // pool must never let its connections expire
        Pool::builder()
            .max_size(8)
            .min_idle(Some(8))
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_customizer(Box::new(SqliteCustomizer {
                shared_memory: true,
            }))
            .build(ConnectionManager::<SqliteConnection>::new(url))
    } else {
        Pool::builder()
            .max_size(10)
            .connection_customizer(Box::new(SqliteCustomizer {
                shared_memory: false,
            }))
            .build(ConnectionManager::<SqliteConnection>::new(database_url))
    }
}

/// Everything a handler may need, shared between all requests.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub pool: DbPool,
    pub key: Key,
    pub tx: Sender<Msg>,
    pub settings: Arc<Settings>,
}

/// A connection which is shared between all the extractors of a single
/// request (e.g. the session extractors and the handler itself), so that a
/// request never holds more than one pooled connection at a time.
#[derive(Clone)]
pub struct ThreadSafeConn {
    pub inner: Arc<tokio::sync::Mutex<DbConn>>,
}

#[async_trait]
impl<S> FromRequestParts<S> for ThreadSafeConn
where
    S: Send + Sync,
    DbPool: FromRef<S>,
{
    type Rejection = FailureResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        if let Some(conn) = parts.extensions.get::<ThreadSafeConn>() {
            return Ok(conn.clone());
        }

        let pool = DbPool::from_ref(state);
        let conn = spawn_blocking(move || pool.get()).await?.map_err(|e| {
            tracing::error!("could not obtain a database connection: {e}");
            FailureResponse::ServerError(())
        })?;

        let conn = ThreadSafeConn {
            inner: Arc::new(tokio::sync::Mutex::new(conn)),
        };
        parts.extensions.insert(conn.clone());

        Ok(conn)
    }
}

pub struct Conn {
    inner: tokio::sync::OwnedMutexGuard<DbConn>,
}

impl Deref for Conn {
    type Target = DbConn;

    fn deref(&self) -> &Self::Target {
        self.inner.deref()
    }
}

impl DerefMut for Conn {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.deref_mut()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Conn
where
    S: Send + Sync,
    DbPool: FromRef<S>,
{
    type Rejection = FailureResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let conn = ThreadSafeConn::from_request_parts(parts, state).await?;

        Ok(Conn {
            inner: conn.inner.clone().lock_owned().await,
        })
    }
}

/// Runs a blocking closure against a fresh pooled connection. Used by the
/// read paths which do not hold a request connection (leaderboards, sockets).
pub async fn with_pooled_conn<T, F>(
    pool: &DbPool,
    f: F,
) -> Result<T, FailureResponse>
where
    T: Send + 'static,
    F: FnOnce(&mut DbConn) -> Result<T, FailureResponse> + Send + 'static,
{
    let pool = pool.clone();
    spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| {
            tracing::error!("could not obtain a database connection: {e}");
            FailureResponse::ServerError(())
        })?;
        f(&mut conn)
    })
    .await?
}
