//! The `SheetsBackend` trait and its HTTP implementation.
//!
//! Generic over backend so the gateway (column-map cache, rate monitor,
//! batching discipline) is identical whether requests land on the real
//! spreadsheet-like store or `spool-testkit`'s in-memory fake.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// One row of a worksheet, cells in physical column order.
pub type Row = Vec<Value>;

/// A single-cell write target, addressed by 0-based row/column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Clone)]
pub struct CellUpdate {
    pub cell: CellRef,
    pub value: Value,
}

#[async_trait]
pub trait SheetsBackend: Send + Sync {
    /// Header row (logical column names, physical order) for `worksheet`.
    async fn header_row(&self, worksheet: &str) -> Result<Vec<String>, StoreError>;

    /// All data rows (excluding the header) for `worksheet`.
    async fn read_worksheet(&self, worksheet: &str) -> Result<Vec<Row>, StoreError>;

    /// Apply every cell update in a single batched round-trip.
    async fn batch_update(&self, worksheet: &str, updates: &[CellUpdate]) -> Result<(), StoreError>;

    /// Append rows to the end of `worksheet`, in a single call.
    async fn append_rows(&self, worksheet: &str, rows: &[Row]) -> Result<(), StoreError>;
}

/// HTTP implementation over a spreadsheet-like store's REST API.
///
/// Values are sent with `valueInputOption=USER_ENTERED` (the store's
/// user-entered interpretation) so dates/numbers stay typed on write, per
/// spec.md §4.1.
pub struct GoogleSheetsBackend {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    credential: Option<String>,
}

impl GoogleSheetsBackend {
    pub fn new(base_url: impl Into<String>, spreadsheet_id: impl Into<String>, credential: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("reqwest client build must not fail");
        Self {
            client,
            base_url: base_url.into(),
            spreadsheet_id: spreadsheet_id.into(),
            credential,
        }
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credential {
            Some(tok) => req.bearer_auth(tok),
            None => req,
        }
    }

    fn values_url(&self, worksheet: &str, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}!{}",
            self.base_url, self.spreadsheet_id, worksheet, range
        )
    }
}

#[async_trait]
impl SheetsBackend for GoogleSheetsBackend {
    #[tracing::instrument(skip(self), fields(worksheet, op = "header_row"))]
    async fn header_row(&self, worksheet: &str) -> Result<Vec<String>, StoreError> {
        let url = self.values_url(worksheet, "1:1");
        let resp = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(StoreError::RateLimited);
        }
        let body: ValueRangeResponse = resp
            .error_for_status()
            .map_err(|e| StoreError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let header = body.values.into_iter().next().unwrap_or_default();
        Ok(header
            .into_iter()
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .collect())
    }

    #[tracing::instrument(skip(self), fields(worksheet, op = "read_worksheet"))]
    async fn read_worksheet(&self, worksheet: &str) -> Result<Vec<Row>, StoreError> {
        let url = self.values_url(worksheet, "2:100000");
        let resp = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(StoreError::RateLimited);
        }
        let body: ValueRangeResponse = resp
            .error_for_status()
            .map_err(|e| StoreError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(body.values)
    }

    #[tracing::instrument(skip(self, updates), fields(worksheet, op = "batch_update", n = updates.len()))]
    async fn batch_update(&self, worksheet: &str, updates: &[CellUpdate]) -> Result<(), StoreError> {
        let data: Vec<_> = updates
            .iter()
            .map(|u| {
                serde_json::json!({
                    "range": format!("{}!R{}C{}", worksheet, u.cell.row + 1, u.cell.col + 1),
                    "values": [[u.value]],
                })
            })
            .collect();
        let url = format!(
            "{}/v4/spreadsheets/{}/values:batchUpdate",
            self.base_url, self.spreadsheet_id
        );
        let resp = self
            .authed(self.client.post(&url))
            .json(&serde_json::json!({"valueInputOption": "USER_ENTERED", "data": data}))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(StoreError::RateLimited);
        }
        resp.error_for_status()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, rows), fields(worksheet, op = "append_rows", n = rows.len()))]
    async fn append_rows(&self, worksheet: &str, rows: &[Row]) -> Result<(), StoreError> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}:append",
            self.base_url, self.spreadsheet_id, worksheet
        );
        let resp = self
            .authed(self.client.post(&url))
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&serde_json::json!({"values": rows}))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(StoreError::RateLimited);
        }
        resp.error_for_status()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(())
    }
}

#[derive(serde::Deserialize)]
struct ValueRangeResponse {
    #[serde(default)]
    values: Vec<Row>,
}
