use async_trait::async_trait;
use deadpool_diesel::sqlite::Pool;
use diesel::prelude::*;
use diesel::{
    deserialize::QueryableByName,
    result::DatabaseErrorKind,
    sql_query,
    sql_types::{BigInt, Binary, Text},
    table, RunQueryDsl, SqliteConnection,
};
use tower_sessions::{
    session::{Id, Record},
    session_store, SessionStore,
};
use tower_sessions_core::ExpiredDeletion;

/// Errors raised while talking to the session table.
#[derive(thiserror::Error, Debug)]
pub enum SessionStoreError {
    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),

    #[error(transparent)]
    Pool(#[from] deadpool_diesel::PoolError),

    #[error("session task failed: {0}")]
    Interact(String),

    #[error(transparent)]
    Encode(#[from] rmp_serde::encode::Error),

    #[error(transparent)]
    Decode(#[from] rmp_serde::decode::Error),
}

impl From<SessionStoreError> for session_store::Error {
    fn from(err: SessionStoreError) -> Self {
        match err {
            SessionStoreError::Diesel(inner) => session_store::Error::Backend(inner.to_string()),
            SessionStoreError::Pool(inner) => session_store::Error::Backend(inner.to_string()),
            SessionStoreError::Interact(inner) => session_store::Error::Backend(inner),
            SessionStoreError::Decode(inner) => session_store::Error::Decode(inner.to_string()),
            SessionStoreError::Encode(inner) => session_store::Error::Encode(inner.to_string()),
        }
    }
}

table! {
    _session {
        id -> Text,
        data -> Binary,
        expiry_date -> BigInt,
    }
}

#[derive(QueryableByName, PartialEq, Debug)]
#[diesel(table_name = _session)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct SessionRow {
    data: Vec<u8>,
}

/// Session records kept in the application database, encoded with MessagePack.
#[derive(Clone, derive_more::Debug)]
pub struct SqliteSessionStore {
    #[debug(skip)]
    database: Pool,
}

impl SqliteSessionStore {
    pub fn new(database: Pool) -> Self {
        Self { database }
    }

    async fn interact<F, R>(&self, f: F) -> Result<R, SessionStoreError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<R, SessionStoreError> + Send + 'static,
        R: Send + 'static,
    {
        self.database
            .get()
            .await?
            .interact(f)
            .await
            .map_err(|e| SessionStoreError::Interact(e.to_string()))?
    }

    /// Create the session table if it is missing.
    pub async fn migrate(&self) -> Result<(), SessionStoreError> {
        self.interact(|conn| {
            sql_query(
                r#"
                create table if not exists _session
                (
                    id text primary key not null,
                    data blob not null,
                    expiry_date integer not null
                )
                "#,
            )
            .execute(conn)?;
            Ok(())
        })
        .await
    }
}

fn insert_record(conn: &mut SqliteConnection, record: &Record) -> Result<bool, SessionStoreError> {
    let res = sql_query(
        r#"
        insert or abort into _session
        (id, data, expiry_date) values (?, ?, ?)
        "#,
    )
    .bind::<Text, _>(record.id.to_string())
    .bind::<Binary, _>(rmp_serde::to_vec(record)?)
    .bind::<BigInt, _>(record.expiry_date.unix_timestamp())
    .execute(conn);

    match res {
        Ok(_) => Ok(true),
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ExpiredDeletion for SqliteSessionStore {
    async fn delete_expired(&self) -> session_store::Result<()> {
        let now = chrono::Utc::now().timestamp();
        self.interact(move |conn| {
            sql_query("delete from _session where expiry_date < ?")
                .bind::<BigInt, _>(now)
                .execute(conn)?;
            Ok(())
        })
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        let candidate = record.clone();
        let created = self
            .interact(move |conn| {
                conn.transaction::<_, SessionStoreError, _>(|conn| {
                    let mut candidate = candidate;
                    while !insert_record(conn, &candidate)? {
                        // Collision, pick another id.
                        candidate.id = Id::default();
                    }
                    Ok(candidate)
                })
            })
            .await?;

        record.id = created.id;

        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let record = record.clone();
        self.interact(move |conn| {
            sql_query(
                r#"
                insert into _session
                (id, data, expiry_date) values (?, ?, ?)
                on conflict(id) do update set
                data = excluded.data,
                expiry_date = excluded.expiry_date
                "#,
            )
            .bind::<Text, _>(record.id.to_string())
            .bind::<Binary, _>(rmp_serde::to_vec(&record)?)
            .bind::<BigInt, _>(record.expiry_date.unix_timestamp())
            .execute(conn)?;

            Ok(())
        })
        .await?;

        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let session_id = session_id.to_string();
        let now = chrono::Utc::now().timestamp();
        let rows = self
            .interact(move |conn| {
                Ok(sql_query(
                    r#"
                    select * from _session
                    where id = ? and expiry_date > ?
                    limit 1
                    "#,
                )
                .bind::<Text, _>(session_id)
                .bind::<BigInt, _>(now)
                .load::<SessionRow>(conn)?)
            })
            .await?;

        match rows.first() {
            Some(row) => Ok(Some(
                rmp_serde::from_slice(&row.data).map_err(SessionStoreError::Decode)?,
            )),
            None => Ok(None),
        }
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        let session_id = session_id.to_string();
        self.interact(move |conn| {
            sql_query("delete from _session where id = ?")
                .bind::<Text, _>(session_id)
                .execute(conn)?;
            Ok(())
        })
        .await?;

        Ok(())
    }
}
