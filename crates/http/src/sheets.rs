//! Google Sheets v4 REST implementation of [`TabularBackend`].

use crate::auth::CredentialProvider;
use gridkv_core::a1_notation::column_index;
use gridkv_core::{Grid, KvError, KvResult, SheetHandle, TabularBackend};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Public endpoint of the Sheets API.
pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// Connection settings for [`SheetsBackend`].
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    /// Scheme and host of the API, without the `/v4` prefix.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl SheetsConfig {
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
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
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<JsonValue>>,
}

#[derive(Debug, Deserialize)]
struct BatchUpdateResponse {
    #[serde(default)]
    replies: Vec<JsonValue>,
}

#[derive(Debug, Clone, Copy)]
enum Dimension {
    Rows,
    Columns,
}

impl Dimension {
    fn as_str(self) -> &'static str {
        match self {
            Self::Rows => "ROWS",
            Self::Columns => "COLUMNS",
        }
    }
}

/// One spreadsheet document accessed over HTTPS.
pub struct SheetsBackend {
    client: Client,
    spreadsheet_id: String,
    credentials: Arc<dyn CredentialProvider>,
    config: SheetsConfig,
}

impl std::fmt::Debug for SheetsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsBackend")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SheetsBackend {
    /// Construct a backend for the spreadsheet `spreadsheet_id`.
    ///
    /// # Errors
    ///
    /// Returns `KvError::Backend` if the HTTP client cannot be built or the
    /// base URL is not a valid absolute URL.
    pub fn new(
        spreadsheet_id: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        config: SheetsConfig,
    ) -> KvResult<Self> {
        Url::parse(&config.base_url)
            .map_err(|e| KvError::backend(format!("Invalid base URL {}: {e}", config.base_url)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KvError::backend(e.to_string()))?;

        Ok(Self {
            client,
            spreadsheet_id: spreadsheet_id.into(),
            credentials,
            config,
        })
    }

    /// Identifier of the spreadsheet document.
    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    fn url(&self, tail: &[&str]) -> KvResult<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| KvError::backend(format!("Invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| KvError::backend("Base URL cannot be a base"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(tail);
        Ok(url)
    }

    fn values_url(&self, sheet: &str, range: &str, suffix: &str) -> KvResult<Url> {
        let qualified = format!("{}{suffix}", qualify(sheet, range));
        self.url(&[self.spreadsheet_id.as_str(), "values", qualified.as_str()])
    }

    fn request(&self, method: Method, url: Url) -> KvResult<RequestBuilder> {
        let credential = self.credentials.credential()?;
        debug!(%method, %url, "sheets request");
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(credential.token()))
    }

    fn send(request: RequestBuilder) -> KvResult<Response> {
        let response = request
            .send()
            .map_err(|e| KvError::backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(KvError::backend(format!(
                "HTTP {} - {}: {body}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }
        Ok(response)
    }

    fn parse<T: DeserializeOwned>(response: Response) -> KvResult<T> {
        response
            .json()
            .map_err(|e| KvError::backend(format!("Failed to parse JSON: {e}")))
    }

    fn batch_update(&self, requests: JsonValue) -> KvResult<BatchUpdateResponse> {
        let endpoint = format!("{}:batchUpdate", self.spreadsheet_id);
        let url = self.url(&[endpoint.as_str()])?;
        let request = self
            .request(Method::POST, url)?
            .json(&json!({ "requests": requests }));
        Self::parse(Self::send(request)?)
    }

    fn require_handle(&self, sheet: &str) -> KvResult<SheetHandle> {
        self.sheet_handle(sheet)?
            .ok_or_else(|| KvError::backend(format!("Sheet not found: {sheet}")))
    }

    fn delete_dimension(
        &self,
        sheet: &str,
        dimension: Dimension,
        start: usize,
        end_exclusive: usize,
    ) -> KvResult<()> {
        let handle = self.require_handle(sheet)?;
        self.batch_update(json!([{
            "deleteDimension": {
                "range": {
                    "sheetId": handle.0,
                    "dimension": dimension.as_str(),
                    "startIndex": start,
                    "endIndex": end_exclusive,
                }
            }
        }]))?;
        Ok(())
    }
}

impl TabularBackend for SheetsBackend {
    fn sheet_handle(&self, sheet: &str) -> KvResult<Option<SheetHandle>> {
        let mut url = self.url(&[self.spreadsheet_id.as_str()])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");
        let spreadsheet: Spreadsheet = Self::parse(Self::send(self.request(Method::GET, url)?)?)?;

        let matches: Vec<i64> = spreadsheet
            .sheets
            .iter()
            .filter(|entry| entry.properties.title == sheet)
            .map(|entry| entry.properties.sheet_id)
            .collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(SheetHandle(matches[0]))),
            _ => Err(KvError::backend(format!(
                "Multiple sheets named {sheet}: {matches:?}"
            ))),
        }
    }

    fn create_sheet(&self, sheet: &str) -> KvResult<SheetHandle> {
        let response = self.batch_update(json!([{
            "addSheet": { "properties": { "title": sheet } }
        }]))?;
        let sheet_id = response
            .replies
            .first()
            .and_then(|reply| reply["addSheet"]["properties"]["sheetId"].as_i64())
            .ok_or_else(|| KvError::backend("addSheet reply is missing the sheet id"))?;
        info!(sheet, sheet_id, "created sheet");
        Ok(SheetHandle(sheet_id))
    }

    fn delete_sheet(&self, handle: SheetHandle) -> KvResult<()> {
        self.batch_update(json!([{ "deleteSheet": { "sheetId": handle.0 } }]))?;
        info!(sheet_id = handle.0, "deleted sheet");
        Ok(())
    }

    fn get_range(&self, sheet: &str, range: &str) -> KvResult<Grid> {
        let url = self.values_url(sheet, range, "")?;
        let value_range: ValueRange = Self::parse(Self::send(self.request(Method::GET, url)?)?)?;
        Ok(value_range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    fn set_range(&self, sheet: &str, range: &str, values: Grid) -> KvResult<()> {
        let mut url = self.values_url(sheet, range, "")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let request = self
            .request(Method::PUT, url)?
            .json(&json!({ "values": values }));
        Self::send(request)?;
        Ok(())
    }

    fn append_row(&self, sheet: &str, values: Vec<String>) -> KvResult<()> {
        let mut url = self.values_url(sheet, "A:A", ":append")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let request = self
            .request(Method::POST, url)?
            .json(&json!({ "values": [values] }));
        Self::send(request)?;
        Ok(())
    }

    fn delete_columns(&self, sheet: &str, start: &str, end: &str) -> KvResult<()> {
        let start = column_index(start)?;
        let end = column_index(end)?;
        if start > end {
            return Err(KvError::invalid(format!(
                "column range is reversed: {start}..{end}"
            )));
        }
        self.delete_dimension(sheet, Dimension::Columns, start, end + 1)
    }

    fn delete_row(&self, sheet: &str, row: usize) -> KvResult<()> {
        if row == 0 {
            return Err(KvError::invalid("row numbers start at 1"));
        }
        self.delete_dimension(sheet, Dimension::Rows, row - 1, row)
    }
}

/// Sheet-qualified A1 range. Names are always quoted, embedded quotes doubled.
fn qualify(sheet: &str, range: &str) -> String {
    format!("'{}'!{range}", sheet.replace('\'', "''"))
}

fn cell_text(value: JsonValue) -> String {
    match value {
        JsonValue::String(text) => text,
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("kv", "A2:A"), "'kv'!A2:A");
        assert_eq!(qualify("Bob's table", "B3"), "'Bob''s table'!B3");
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(json!("x")), "x");
        assert_eq!(cell_text(json!(null)), "");
        assert_eq!(cell_text(json!(12)), "12");
        assert_eq!(cell_text(json!(true)), "true");
    }

    #[test]
    fn test_config_builders() {
        let config = SheetsConfig::default()
            .with_base_url("http://localhost:9000")
            .with_timeout(5);
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.timeout_secs, 5);

        let default = SheetsConfig::default();
        assert_eq!(default.base_url, DEFAULT_BASE_URL);
        assert_eq!(default.timeout_secs, 30);
    }

    #[test]
    fn test_dimension_names() {
        assert_eq!(Dimension::Rows.as_str(), "ROWS");
        assert_eq!(Dimension::Columns.as_str(), "COLUMNS");
    }
}
