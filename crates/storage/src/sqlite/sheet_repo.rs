use chrono::Utc;
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{
        cell_as_i64, cell_as_text, db_err, header_from_text, header_to_text, map_answer_key_row,
        map_table_row, ser,
    },
};
use crate::repository::{
    AnswerKeyRow, ResponseRow, ResponseSheet, SheetHandle, SheetTable, StorageError,
};

const TABLE_COLUMNS: usize = 11;

#[async_trait::async_trait]
impl ResponseSheet for SqliteRepository {
    async fn open_or_create(
        &self,
        title: &str,
        header: &[&str],
    ) -> Result<SheetHandle, StorageError> {
        let created = sqlx::query(
            r"
                INSERT INTO sheets (title, header, created_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(title) DO NOTHING
            ",
        )
        .bind(title)
        .bind(header_to_text(header)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if created.rows_affected() > 0 {
            tracing::info!(title, "created results sheet");
        }

        let row = sqlx::query("SELECT id, title FROM sheets WHERE title = ?1")
            .bind(title)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(SheetHandle {
            title: row.try_get("title").map_err(ser)?,
            sheet_id: row.try_get("id").map_err(ser)?,
        })
    }

    async fn read_answer_keys(
        &self,
        sheet: &SheetHandle,
    ) -> Result<Vec<AnswerKeyRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT participant, CAST(q_index AS TEXT) AS q_index
                FROM sheet_rows
                WHERE sheet_id = ?1
                ORDER BY id ASC
            ",
        )
        .bind(sheet.sheet_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_answer_key_row).collect()
    }

    async fn append_row(
        &self,
        sheet: &SheetHandle,
        row: &ResponseRow,
    ) -> Result<(), StorageError> {
        let [ts, participant, q_index, qid, question, model_answer, accuracy, completeness, usefulness, style_tone, comment] =
            &row.cells;

        sqlx::query(
            r"
                INSERT INTO sheet_rows (
                    sheet_id, ts_iso, participant, q_index, qid, question, model_answer,
                    accuracy, completeness, usefulness, style_tone, comment
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ",
        )
        .bind(sheet.sheet_id)
        .bind(cell_as_text(ts))
        .bind(cell_as_text(participant))
        .bind(cell_as_i64("q_index", q_index)?)
        .bind(cell_as_text(qid))
        .bind(cell_as_text(question))
        .bind(cell_as_text(model_answer))
        .bind(cell_as_i64("accuracy", accuracy)?)
        .bind(cell_as_i64("completeness", completeness)?)
        .bind(cell_as_i64("usefulness", usefulness)?)
        .bind(cell_as_i64("style_tone", style_tone)?)
        .bind(cell_as_text(comment))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn read_table(&self, sheet: &SheetHandle) -> Result<SheetTable, StorageError> {
        let header_raw: String = sqlx::query("SELECT header FROM sheets WHERE id = ?1")
            .bind(sheet.sheet_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .try_get("header")
            .map_err(ser)?;

        let rows = sqlx::query(
            r"
                SELECT
                    ts_iso, participant, CAST(q_index AS TEXT), qid, question, model_answer,
                    CAST(accuracy AS TEXT), CAST(completeness AS TEXT),
                    CAST(usefulness AS TEXT), CAST(style_tone AS TEXT), comment
                FROM sheet_rows
                WHERE sheet_id = ?1
                ORDER BY id ASC
            ",
        )
        .bind(sheet.sheet_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(map_table_row(row, TABLE_COLUMNS)?);
        }

        Ok(SheetTable {
            header: header_from_text(&header_raw)?,
            rows: out,
        })
    }
}
