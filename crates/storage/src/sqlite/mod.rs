use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use snafu::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Connection, FromRow, SqliteConnection};

use super::error::{
    CreateSqliteDirectorySnafu, InvariantViolationSnafu, SqliteConnectOptionsSnafu,
    SqliteConnectSnafu, SqliteMigrateSnafu, SqlitePragmaSnafu, SqliteQuerySnafu,
    SqliteRuntimeInitSnafu, SqliteThreadSpawnSnafu, StorageError, StorageResult,
};
use super::ids::MessageId;
use super::types::{MessageRecord, NewMessage};
use super::{MessageStore, unix_timestamp_millis};

pub const IN_MEMORY_LOCATION: &str = ":memory:";
const BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Durable message store backed by a single sqlite database file.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    database_url: String,
}

impl SqliteStorage {
    /// Opens (creating if needed) the database and applies pending migrations.
    ///
    /// Accepts a filesystem path or a `sqlite:` URL. In-memory databases are
    /// rejected because every store call uses its own connection.
    pub fn open(database_location: &str) -> StorageResult<Self> {
        if is_in_memory_location(database_location) {
            return InvariantViolationSnafu {
                stage: "sqlite-open-reject-memory",
                details: "in-memory sqlite cannot be shared across store calls; use MemoryStorage"
                    .to_string(),
            }
            .fail();
        }

        ensure_database_directory(database_location)?;

        let database_url = normalize_database_url(database_location);
        let connect_options = SqliteConnectOptions::from_str(&database_url)
            .context(SqliteConnectOptionsSnafu {
                stage: "sqlite-open-parse-url",
                database_url: database_url.clone(),
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let open_url = database_url.clone();
        run_db_call("sqlite-open", async move {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(connect_options)
                .await
                .context(SqliteConnectSnafu {
                    stage: "sqlite-open-connect",
                    database_url: open_url,
                })?;

            // Journal mode is persistent in the file, so later plain connections inherit WAL.
            let _: String = sqlx::query_scalar("PRAGMA journal_mode = WAL;")
                .fetch_one(&pool)
                .await
                .context(SqlitePragmaSnafu {
                    stage: "sqlite-open-pragma-journal-mode",
                    pragma: "journal_mode",
                })?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context(SqliteMigrateSnafu {
                    stage: "sqlite-open-migrate",
                })?;

            pool.close().await;
            Ok(())
        })?;

        tracing::info!(%database_url, "opened sqlite message store");
        Ok(Self { database_url })
    }
}

impl MessageStore for SqliteStorage {
    fn create(&self, input: NewMessage) -> StorageResult<MessageRecord> {
        let database_url = self.database_url.clone();
        run_db_call("message-create", async move {
            let mut connection =
                connect_store_connection(&database_url, "message-create-connect").await?;
            let mut tx = connection.begin().await.context(SqliteQuerySnafu {
                stage: "message-create-begin",
            })?;

            let next_seq =
                sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(seq), 0) + 1 FROM messages")
                    .fetch_one(&mut *tx)
                    .await
                    .context(SqliteQuerySnafu {
                        stage: "message-create-next-seq",
                    })?;

            let message_id = MessageId::new_v7();
            let created_at = unix_timestamp_millis();

            sqlx::query("INSERT INTO messages (id, seq, text, created_at) VALUES (?, ?, ?, ?)")
                .bind(message_id.to_string())
                .bind(next_seq)
                .bind(input.text.clone())
                .bind(u64_to_i64(created_at, "message-create-created-at")?)
                .execute(&mut *tx)
                .await
                .context(SqliteQuerySnafu {
                    stage: "message-create-insert",
                })?;

            tx.commit().await.context(SqliteQuerySnafu {
                stage: "message-create-commit",
            })?;

            Ok(MessageRecord {
                id: message_id,
                seq: i64_to_u64(next_seq, "message-create-seq")?,
                created_at_unix_millis: created_at,
                text: input.text,
            })
        })
    }

    fn list(&self) -> StorageResult<Vec<MessageRecord>> {
        let database_url = self.database_url.clone();
        run_db_call("message-list", async move {
            let mut connection =
                connect_store_connection(&database_url, "message-list-connect").await?;
            let rows = sqlx::query_as::<_, MessageRow>(
                "SELECT id, seq, text, created_at FROM messages ORDER BY seq ASC",
            )
            .fetch_all(&mut connection)
            .await
            .context(SqliteQuerySnafu {
                stage: "message-list-query",
            })?;

            rows.into_iter().map(message_row_to_record).collect()
        })
    }

    fn get(&self, message_id: MessageId) -> StorageResult<Option<MessageRecord>> {
        let database_url = self.database_url.clone();
        run_db_call("message-get", async move {
            let mut connection =
                connect_store_connection(&database_url, "message-get-connect").await?;
            let row = sqlx::query_as::<_, MessageRow>(
                "SELECT id, seq, text, created_at FROM messages WHERE id = ?",
            )
            .bind(message_id.to_string())
            .fetch_optional(&mut connection)
            .await
            .context(SqliteQuerySnafu {
                stage: "message-get-query",
            })?;

            row.map(message_row_to_record).transpose()
        })
    }

    fn delete(&self, message_id: MessageId) -> StorageResult<bool> {
        let database_url = self.database_url.clone();
        run_db_call("message-delete", async move {
            let mut connection =
                connect_store_connection(&database_url, "message-delete-connect").await?;
            let result = sqlx::query("DELETE FROM messages WHERE id = ?")
                .bind(message_id.to_string())
                .execute(&mut connection)
                .await
                .context(SqliteQuerySnafu {
                    stage: "message-delete-execute",
                })?;

            Ok(result.rows_affected() > 0)
        })
    }

    fn delete_all(&self) -> StorageResult<usize> {
        let database_url = self.database_url.clone();
        run_db_call("message-delete-all", async move {
            let mut connection =
                connect_store_connection(&database_url, "message-delete-all-connect").await?;
            // Single statement: readers see either every row or none.
            let result = sqlx::query("DELETE FROM messages")
                .execute(&mut connection)
                .await
                .context(SqliteQuerySnafu {
                    stage: "message-delete-all-execute",
                })?;

            u64_to_usize(result.rows_affected(), "message-delete-all-rows")
        })
    }

    fn count(&self) -> StorageResult<usize> {
        let database_url = self.database_url.clone();
        run_db_call("message-count", async move {
            let mut connection =
                connect_store_connection(&database_url, "message-count-connect").await?;
            let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages")
                .fetch_one(&mut connection)
                .await
                .context(SqliteQuerySnafu {
                    stage: "message-count-query",
                })?;

            u64_to_usize(i64_to_u64(count, "message-count-value")?, "message-count")
        })
    }
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: String,
    seq: i64,
    text: String,
    created_at: i64,
}

fn message_row_to_record(row: MessageRow) -> StorageResult<MessageRecord> {
    Ok(MessageRecord {
        id: MessageId::parse(&row.id)?,
        seq: i64_to_u64(row.seq, "message-row-seq")?,
        created_at_unix_millis: i64_to_u64(row.created_at, "message-row-created-at")?,
        text: row.text,
    })
}

fn run_db_call<T, F>(stage: &'static str, op: F) -> StorageResult<T>
where
    T: Send + 'static,
    F: Future<Output = StorageResult<T>> + Send + 'static,
{
    // Store traits are sync, so each call executes on a dedicated worker thread
    // with its own current-thread runtime to avoid nested-runtime blocking panics.
    let worker = std::thread::Builder::new()
        .name(format!("sqlite-store-{stage}"))
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context(SqliteRuntimeInitSnafu {
                    stage: "sqlite-store-runtime-build",
                })?;
            runtime.block_on(op)
        })
        .context(SqliteThreadSpawnSnafu {
            stage: "sqlite-store-spawn-worker",
        })?;

    match worker.join() {
        Ok(result) => result,
        Err(_) => InvariantViolationSnafu {
            stage,
            details: "sqlite storage worker thread panicked".to_string(),
        }
        .fail(),
    }
}

async fn connect_store_connection(
    database_url: &str,
    stage: &'static str,
) -> StorageResult<SqliteConnection> {
    let mut connection =
        SqliteConnection::connect(database_url)
            .await
            .context(SqliteConnectSnafu {
                stage,
                database_url: database_url.to_string(),
            })?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(&mut connection)
        .await
        .context(SqlitePragmaSnafu {
            stage: "sqlite-store-pragma-busy-timeout",
            pragma: "busy_timeout",
        })?;

    Ok(connection)
}

fn i64_to_u64(value: i64, stage: &'static str) -> StorageResult<u64> {
    value
        .try_into()
        .map_err(|_| StorageError::InvariantViolation {
            stage,
            details: format!("negative sqlite integer '{value}' cannot map to u64"),
        })
}

fn u64_to_i64(value: u64, stage: &'static str) -> StorageResult<i64> {
    value
        .try_into()
        .map_err(|_| StorageError::InvariantViolation {
            stage,
            details: format!("u64 '{value}' cannot map to sqlite i64"),
        })
}

fn u64_to_usize(value: u64, stage: &'static str) -> StorageResult<usize> {
    value
        .try_into()
        .map_err(|_| StorageError::InvariantViolation {
            stage,
            details: format!("u64 '{value}' cannot map to usize"),
        })
}

fn is_in_memory_location(database_location: &str) -> bool {
    if database_location == IN_MEMORY_LOCATION || database_location == "sqlite::memory:" {
        return true;
    }

    database_location.starts_with("sqlite:")
        && database_location
            .split_once('?')
            .is_some_and(|(_, query)| query.split('&').any(|pair| pair == "mode=memory"))
}

fn ensure_database_directory(database_location: &str) -> StorageResult<()> {
    if database_location.starts_with("sqlite:") {
        return Ok(());
    }

    let path = Path::new(database_location);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context(CreateSqliteDirectorySnafu {
            stage: "sqlite-open-create-directory",
            path: parent.display().to_string(),
        })?;
    }

    Ok(())
}

fn normalize_database_url(database_location: &str) -> String {
    if database_location.starts_with("sqlite:") {
        return database_location.to_string();
    }

    format!("sqlite://{database_location}")
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn open_temp_store() -> (tempfile::TempDir, SqliteStorage) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("messages.db");
        let store = SqliteStorage::open(path.to_str().expect("utf-8 temp path"))
            .expect("open sqlite store");
        (dir, store)
    }

    #[test]
    fn open_creates_parent_directories_and_empty_schema() {
        let (dir, store) = open_temp_store();

        assert!(dir.path().join("nested").join("messages.db").exists());
        assert_eq!(store.count().expect("count"), 0);
        assert!(store.list().expect("list").is_empty());
    }

    #[test]
    fn open_rejects_in_memory_locations() {
        let error = SqliteStorage::open(IN_MEMORY_LOCATION).expect_err("memory is rejected");
        assert!(matches!(
            error,
            StorageError::InvariantViolation {
                stage: "sqlite-open-reject-memory",
                ..
            }
        ));
    }

    #[test]
    fn in_memory_detection_matches_only_exact_forms() {
        assert!(is_in_memory_location(":memory:"));
        assert!(is_in_memory_location("sqlite::memory:"));
        assert!(is_in_memory_location("sqlite://chat.db?mode=memory&cache=shared"));
        assert!(!is_in_memory_location("notes:memory:archive.db"));
        assert!(!is_in_memory_location("sqlite://chat.db?mode=rwc"));
    }

    #[test]
    fn open_accepts_paths_containing_memory_marker() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("backup:memory:.db");

        let store = SqliteStorage::open(path.to_str().expect("utf-8 temp path"))
            .expect("open sqlite store");
        let created = store.create(NewMessage::new("kept")).expect("create");

        assert_eq!(store.list().expect("list"), vec![created]);
        assert!(path.exists());
    }

    #[test]
    fn create_then_list_preserves_insertion_order() {
        let (_dir, store) = open_temp_store();
        let hello = store.create(NewMessage::new("hello")).expect("create");
        let world = store.create(NewMessage::new("world")).expect("create");

        let listed = store.list().expect("list");
        assert_eq!(listed, vec![hello.clone(), world.clone()]);
        assert!(hello.seq < world.seq);
        assert_ne!(hello.id, world.id);
    }

    #[test]
    fn messages_survive_reopening_the_database() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("messages.db");
        let location = path.to_str().expect("utf-8 temp path");

        let created = {
            let store = SqliteStorage::open(location).expect("open");
            store.create(NewMessage::new("  keep my spaces  ")).expect("create")
        };

        let reopened = SqliteStorage::open(location).expect("reopen");
        assert_eq!(reopened.list().expect("list"), vec![created.clone()]);
        assert_eq!(reopened.get(created.id).expect("get"), Some(created));
    }

    #[test]
    fn delete_removes_one_record_and_ignores_unknown_ids() {
        let (_dir, store) = open_temp_store();
        let first = store.create(NewMessage::new("a")).expect("create");
        let middle = store.create(NewMessage::new("b")).expect("create");
        let last = store.create(NewMessage::new("c")).expect("create");

        assert!(store.delete(middle.id).expect("delete"));
        assert!(!store.delete(MessageId::new_v7()).expect("unknown delete"));

        assert_eq!(store.list().expect("list"), vec![first, last]);
    }

    #[test]
    fn delete_all_empties_store_and_creation_resumes() {
        let (_dir, store) = open_temp_store();
        for text in ["hello", "world"] {
            store.create(NewMessage::new(text)).expect("create");
        }

        assert_eq!(store.delete_all().expect("delete all"), 2);
        assert!(store.list().expect("list").is_empty());

        let hi = store.create(NewMessage::new("hi")).expect("create");
        assert_eq!(store.list().expect("list"), vec![hi]);
    }

    #[test]
    fn many_creates_keep_distinct_ids() {
        let (_dir, store) = open_temp_store();
        for index in 0..20 {
            store
                .create(NewMessage::new(format!("message {index}")))
                .expect("create");
        }

        let listed = store.list().expect("list");
        let ids = listed.iter().map(|message| message.id).collect::<HashSet<_>>();
        assert_eq!(ids.len(), 20);
        assert!(listed.windows(2).all(|pair| pair[0].seq < pair[1].seq));
        assert_eq!(listed[0].text, "message 0");
        assert_eq!(listed[19].text, "message 19");
    }

    #[test]
    fn normalize_database_url_keeps_explicit_urls() {
        assert_eq!(
            normalize_database_url("sqlite://already.db"),
            "sqlite://already.db"
        );
        assert_eq!(normalize_database_url("data/chat.db"), "sqlite://data/chat.db");
    }
}
