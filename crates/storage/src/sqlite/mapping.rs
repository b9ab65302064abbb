use sqlx::Row;

use crate::repository::{AnswerKeyRow, CellValue, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// `sqlx` failures on a local file are connection problems, except decode errors.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => ser(e),
        other => StorageError::Connection(other.to_string()),
    }
}

pub(crate) fn header_to_text(header: &[&str]) -> Result<String, StorageError> {
    serde_json::to_string(header).map_err(ser)
}

pub(crate) fn header_from_text(raw: &str) -> Result<Vec<String>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

/// Integer columns are read back through `CAST(.. AS TEXT)`, so every column is a string here.
pub(crate) fn map_table_row(
    row: &sqlx::sqlite::SqliteRow,
    columns: usize,
) -> Result<Vec<String>, StorageError> {
    (0..columns)
        .map(|idx| row.try_get::<String, _>(idx).map_err(ser))
        .collect()
}

pub(crate) fn map_answer_key_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<AnswerKeyRow, StorageError> {
    Ok(AnswerKeyRow {
        participant: row.try_get("participant").map_err(ser)?,
        q_index: row.try_get("q_index").map_err(ser)?,
    })
}

/// Integer columns must receive integers; text that does not parse is rejected.
pub(crate) fn cell_as_i64(field: &'static str, cell: &CellValue) -> Result<i64, StorageError> {
    match cell {
        CellValue::Number(n) => Ok(*n),
        CellValue::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| StorageError::Serialization(format!("{field} is not an integer: {s:?}"))),
    }
}

pub(crate) fn cell_as_text(cell: &CellValue) -> String {
    cell.to_cell_string()
}
