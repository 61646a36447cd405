use deadpool_diesel::{
    sqlite::{Manager, Pool},
    Runtime,
};
use diesel::{connection::SimpleConnection as _, Connection as _, QueryResult, SqliteConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness as _};
use tracing::info;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const CONNECTION_PRAGMAS: &str = "
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 30000;
";

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Pool(#[from] deadpool_diesel::PoolError),

    #[error(transparent)]
    Build(#[from] deadpool_diesel::sqlite::BuildError),

    #[error(transparent)]
    Connection(#[from] diesel::ConnectionError),

    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),

    #[error("database task failed: {0}")]
    Interact(String),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error(transparent)]
    Xdg(#[from] xdg::BaseDirectoriesError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Resolve the configured database url, falling back to the XDG data dir.
pub fn database_url(configured: Option<&str>) -> Result<String> {
    if let Some(url) = configured {
        return Ok(url.to_string());
    }

    let path =
        xdg::BaseDirectories::with_prefix("pixelclutch/db")?.place_data_file("database.sqlite3")?;

    Ok(path.to_string_lossy().into_owned())
}

pub fn create_pool(url: &str, max_size: usize) -> Result<Pool> {
    let manager = Manager::new(url, Runtime::Tokio1);
    Ok(Pool::builder(manager).max_size(max_size).build()?)
}

/// Apply pending migrations on a dedicated connection.
pub async fn migrate(url: &str) -> Result<()> {
    let url = url.to_string();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = SqliteConnection::establish(&url)?;
        conn.batch_execute("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;

        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| Error::Migration(e.to_string()))?;
        for version in applied {
            info!("applied migration {version}");
        }

        Ok(())
    })
    .await
    .map_err(|e| Error::Interact(e.to_string()))?
}

/// Run `f` on a pooled connection.
pub async fn interact<F, R>(pool: &Pool, f: F) -> Result<R>
where
    F: FnOnce(&mut SqliteConnection) -> QueryResult<R> + Send + 'static,
    R: Send + 'static,
{
    let conn = pool.get().await?;

    conn.interact(move |conn| {
        conn.batch_execute(CONNECTION_PRAGMAS)?;
        f(conn)
    })
    .await
    .map_err(|e| Error::Interact(e.to_string()))?
    .map_err(Error::from)
}
