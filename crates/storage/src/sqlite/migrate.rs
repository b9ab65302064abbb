use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the schema migrations for the local response store.
///
/// Version 1 creates `sheets` (one row per named sheet, with its header) and
/// `sheet_rows` (appended responses, typed per column).
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sheets (
                    id INTEGER PRIMARY KEY,
                    title TEXT NOT NULL UNIQUE,
                    header TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sheet_rows (
                    id INTEGER PRIMARY KEY,
                    sheet_id INTEGER NOT NULL,
                    ts_iso TEXT NOT NULL,
                    participant TEXT NOT NULL,
                    q_index INTEGER NOT NULL,
                    qid TEXT NOT NULL,
                    question TEXT NOT NULL,
                    model_answer TEXT NOT NULL,
                    accuracy INTEGER NOT NULL,
                    completeness INTEGER NOT NULL,
                    usefulness INTEGER NOT NULL,
                    style_tone INTEGER NOT NULL,
                    comment TEXT NOT NULL DEFAULT '',
                    FOREIGN KEY (sheet_id) REFERENCES sheets(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_sheet_rows_sheet_participant
                    ON sheet_rows (sheet_id, participant);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
