// src/db.rs

use std::{str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use sqlx::{
    Executor, Sqlite, SqlitePool, Transaction,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

use crate::{
    config::{Config, SEMESTER_COMPLETION_KEY},
    error::{AppError, is_unique_violation},
    models::{
        setting::parse_completion_date,
        user::{Role, USER_COLUMNS, User, format_username},
    },
    utils::hash::hash_password,
};

const CONNECT_RETRIES: u32 = 5;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the connection pool, retrying while the database is unavailable.
pub async fn connect(config: &Config) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let mut retry_count = 0;
    loop {
        match SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options.clone())
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) if retry_count < CONNECT_RETRIES => {
                retry_count += 1;
                tracing::warn!(
                    "Database not ready ({}), retrying in 2s... (Attempt {})",
                    e,
                    retry_count
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Starts a transaction that takes the write lock up front.
///
/// A deferred transaction that reads and then writes fails with SQLITE_BUSY
/// when another writer got there first; `BEGIN IMMEDIATE` queues behind it
/// for up to the busy timeout instead.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    pool.begin_with("BEGIN IMMEDIATE").await
}

/// Applies the embedded migrations.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Creates the configured admin account if it does not exist yet.
pub async fn seed_admin(pool: &SqlitePool, name: &str, password: &str) -> Result<(), AppError> {
    if fetch_user_by_identity(pool, name, Role::Admin).await?.is_some() {
        tracing::info!("Admin account {} already exists.", format_username(name, Role::Admin));
        return Ok(());
    }

    let password_hash = hash_password(password)?;
    let admin = insert_user(pool, name, Role::Admin, &password_hash).await?;
    tracing::info!("Seeded admin account {}", admin.username());
    Ok(())
}

pub async fn fetch_user<'e, E>(executor: E, id: i64) -> Result<Option<User>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(user)
}

pub async fn fetch_user_by_identity<'e, E>(
    executor: E,
    name: &str,
    role: Role,
) -> Result<Option<User>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM users WHERE name = ? AND role = ?", USER_COLUMNS);
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(name)
        .bind(role)
        .fetch_optional(executor)
        .await?;
    Ok(user)
}

/// Inserts a user. A taken (name, role) pair is a 409.
pub async fn insert_user<'e, E>(
    executor: E,
    name: &str,
    role: Role,
    password_hash: &str,
) -> Result<User, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "INSERT INTO users (name, role, password_hash, unfrozen_by_admin, created_at) \
         VALUES (?, ?, ?, FALSE, ?) RETURNING {}",
        USER_COLUMNS
    );

    sqlx::query_as::<_, User>(&sql)
        .bind(name)
        .bind(role)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!(
                    "Username '{}' already taken.",
                    format_username(name, role)
                ))
            } else {
                tracing::error!("Failed to insert user: {:?}", e);
                AppError::from(e)
            }
        })
}

/// Ids of the courses a user is enrolled in.
pub async fn enrolled_course_ids(pool: &SqlitePool, user_id: i64) -> Result<Vec<i64>, AppError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT course_id FROM enrollments WHERE user_id = ? ORDER BY enrolled_at, course_id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>, AppError> {
    let value = sqlx::query_scalar::<_, Option<String>>("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?
        .flatten();
    Ok(value)
}

pub async fn set_setting(pool: &SqlitePool, key: &str, value: Option<&str>) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// The configured semester completion instant, if any.
///
/// Values are validated on write. An unparsable stored value is logged and
/// treated as unset.
pub async fn semester_completion(pool: &SqlitePool) -> Result<Option<DateTime<Utc>>, AppError> {
    let Some(raw) = get_setting(pool, SEMESTER_COMPLETION_KEY).await? else {
        return Ok(None);
    };

    match parse_completion_date(&raw) {
        Ok(deadline) => Ok(Some(deadline)),
        Err(e) => {
            tracing::warn!("Ignoring stored {}: {}", SEMESTER_COMPLETION_KEY, e);
            Ok(None)
        }
    }
}
