//! Google Sheets (v4 REST) adapter for the response sheet.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::repository::{
    AnswerKeyRow, CellValue, ResponseRow, ResponseSheet, SheetHandle, SheetTable, Storage,
    StorageError,
};

mod auth;

pub use auth::{Credentials, ServiceAccountKey};

use auth::Authenticator;

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

/// Size of a freshly created sheet; rows grow on append.
const NEW_SHEET_ROWS: u32 = 1;
const NEW_SHEET_COLUMNS: u32 = 20;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for one spreadsheet.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub credentials: Credentials,
    pub api_base: String,
}

impl SheetsConfig {
    #[must_use]
    pub fn new(spreadsheet_id: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            credentials,
            api_base: DEFAULT_API_BASE.into(),
        }
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

/// Authorized client for a single spreadsheet.
///
/// Build once at startup and share; it caches its access token.
pub struct GoogleSheetsRepository {
    http: Client,
    auth: Authenticator,
    spreadsheet_id: String,
    api_base: Url,
}

impl GoogleSheetsRepository {
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the HTTP client cannot be built or
    /// the API base URL is invalid.
    pub fn connect(config: SheetsConfig) -> Result<Self, StorageError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let api_base = Url::parse(&config.api_base)
            .map_err(|e| StorageError::Connection(format!("invalid api base: {e}")))?;
        Ok(Self {
            auth: Authenticator::new(http.clone(), config.credentials),
            http,
            spreadsheet_id: config.spreadsheet_id,
            api_base,
        })
    }

    fn url(&self, tail: &[&str]) -> Result<Url, StorageError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| StorageError::Connection("api base cannot be a base url".into()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(tail);
        Ok(url)
    }

    fn values_url(&self, range: &str) -> Result<Url, StorageError> {
        self.url(&[self.spreadsheet_id.as_str(), "values", range])
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, StorageError> {
        let token = self.auth.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        check_status(response).await
    }

    async fn find_sheet(&self, title: &str) -> Result<Option<SheetHandle>, StorageError> {
        let mut url = self.url(&[self.spreadsheet_id.as_str()])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");
        let body: SpreadsheetMeta = decode(self.send(self.http.get(url)).await?).await?;
        Ok(body
            .sheets
            .into_iter()
            .map(|s| s.properties)
            .find(|p| p.title == title)
            .map(SheetProperties::into_handle))
    }

    async fn add_sheet(&self, title: &str) -> Result<SheetHandle, StorageError> {
        let batch = format!("{}:batchUpdate", self.spreadsheet_id);
        let url = self.url(&[batch.as_str()])?;
        let payload = BatchUpdateRequest {
            requests: vec![BatchRequest {
                add_sheet: AddSheetRequest {
                    properties: NewSheetProperties {
                        title,
                        grid_properties: GridProperties {
                            row_count: NEW_SHEET_ROWS,
                            column_count: NEW_SHEET_COLUMNS,
                        },
                    },
                },
            }],
        };
        let body: BatchUpdateResponse =
            decode(self.send(self.http.post(url).json(&payload)).await?).await?;
        body.replies
            .into_iter()
            .find_map(|r| r.add_sheet)
            .map(|added| added.properties.into_handle())
            .ok_or_else(|| StorageError::Serialization("addSheet reply missing".into()))
    }

    async fn write_header(&self, sheet: &SheetHandle, header: &[&str]) -> Result<(), StorageError> {
        let last = column_letter(header.len());
        let range = a1(&sheet.title, &format!("A1:{last}1"));
        let mut url = self.values_url(&range)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let payload = ValueRangeRequest {
            major_dimension: "ROWS",
            values: vec![header.iter().map(|h| CellValue::Text((*h).to_owned())).collect()],
        };
        self.send(self.http.put(url).json(&payload)).await?;
        Ok(())
    }

    /// A sheet created by an attempt that failed before its header write has an empty row 1.
    async fn seed_header_if_missing(
        &self,
        sheet: SheetHandle,
        header: &[&str],
    ) -> Result<SheetHandle, StorageError> {
        let range = a1(&sheet.title, &format!("A1:{}1", column_letter(header.len())));
        let first_row = self.get_values(&range).await?;
        let has_header = first_row
            .first()
            .is_some_and(|row| row.iter().any(|cell| !cell.trim().is_empty()));
        if !has_header {
            self.write_header(&sheet, header).await?;
            tracing::info!(title = %sheet.title, "seeded missing header row");
        }
        Ok(sheet)
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, StorageError> {
        let mut url = self.values_url(range)?;
        url.query_pairs_mut().append_pair("majorDimension", "ROWS");
        let body: ValueRangeResponse = decode(self.send(self.http.get(url)).await?).await?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.iter().map(value_to_string).collect())
            .collect())
    }
}

#[async_trait::async_trait]
impl ResponseSheet for GoogleSheetsRepository {
    async fn open_or_create(
        &self,
        title: &str,
        header: &[&str],
    ) -> Result<SheetHandle, StorageError> {
        if let Some(existing) = self.find_sheet(title).await? {
            tracing::debug!(title, sheet_id = existing.sheet_id, "using existing sheet");
            return self.seed_header_if_missing(existing, header).await;
        }

        let sheet = match self.add_sheet(title).await {
            Ok(sheet) => sheet,
            // Another writer created it between our lookup and the add.
            Err(StorageError::Rejected { status: 400, .. }) => {
                let existing = self.find_sheet(title).await?.ok_or(StorageError::Conflict)?;
                return self.seed_header_if_missing(existing, header).await;
            }
            Err(e) => return Err(e),
        };
        self.write_header(&sheet, header).await?;
        tracing::info!(title, sheet_id = sheet.sheet_id, "created results sheet");
        Ok(sheet)
    }

    async fn read_answer_keys(
        &self,
        sheet: &SheetHandle,
    ) -> Result<Vec<AnswerKeyRow>, StorageError> {
        let rows = self.get_values(&a1(&sheet.title, "B2:C")).await?;
        Ok(rows.iter().map(|r| AnswerKeyRow::from_cells(r)).collect())
    }

    async fn append_row(
        &self,
        sheet: &SheetHandle,
        row: &ResponseRow,
    ) -> Result<(), StorageError> {
        let target = format!("{}:append", a1(&sheet.title, "A1"));
        let mut url = self.values_url(&target)?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let payload = ValueRangeRequest {
            major_dimension: "ROWS",
            values: vec![row.cells.to_vec()],
        };
        self.send(self.http.post(url).json(&payload)).await?;
        Ok(())
    }

    async fn read_table(&self, sheet: &SheetHandle) -> Result<SheetTable, StorageError> {
        let values = self.get_values(&a1(&sheet.title, "A:K")).await?;
        Ok(SheetTable::from_values(values))
    }
}

impl Storage {
    /// Build a `Storage` backed by a Google spreadsheet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the client cannot be constructed.
    pub fn google_sheets(config: SheetsConfig) -> Result<Self, StorageError> {
        Ok(Self::from_repository(GoogleSheetsRepository::connect(config)?))
    }
}

//
// ─── HELPERS ───────────────────────────────────────────────────────────────────
//

async fn check_status(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => StorageError::RateLimited,
        StatusCode::NOT_FOUND => StorageError::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StorageError::Auth(format!("{status}: {message}"))
        }
        s if s.is_server_error() => StorageError::Unavailable(format!("{s}: {message}")),
        s => StorageError::Rejected {
            status: s.as_u16(),
            message,
        },
    })
}

async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, StorageError> {
    response
        .json()
        .await
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Formatted cells arrive as strings; anything else is stringified.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A1 notation with the sheet title quoted when it is not a plain identifier.
fn a1(title: &str, range: &str) -> String {
    if title.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        format!("{title}!{range}")
    } else {
        format!("'{}'!{range}", title.replace('\'', "''"))
    }
}

/// 1-based column number to its letter(s): 1 → A, 11 → K, 27 → AA.
fn column_letter(mut column: usize) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        // rem < 26
        #[allow(clippy::cast_possible_truncation)]
        letters.push(char::from(b'A' + rem as u8));
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

//
// ─── WIRE TYPES ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
}

impl SheetProperties {
    fn into_handle(self) -> SheetHandle {
        SheetHandle {
            title: self.title,
            sheet_id: self.sheet_id,
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchUpdateRequest<'a> {
    requests: Vec<BatchRequest<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest<'a> {
    add_sheet: AddSheetRequest<'a>,
}

#[derive(Debug, Serialize)]
struct AddSheetRequest<'a> {
    properties: NewSheetProperties<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewSheetProperties<'a> {
    title: &'a str,
    grid_properties: GridProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    row_count: u32,
    column_count: u32,
}

#[derive(Debug, Deserialize)]
struct BatchUpdateResponse {
    #[serde(default)]
    replies: Vec<BatchReply>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchReply {
    #[serde(default)]
    add_sheet: Option<AddSheetReply>,
}

#[derive(Debug, Deserialize)]
struct AddSheetReply {
    properties: SheetProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeRequest {
    major_dimension: &'static str,
    values: Vec<Vec<CellValue>>,
}

#[derive(Debug, Deserialize)]
struct ValueRangeResponse {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}
