//! Table-store seam and the process-local backend.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Remote table operations: select everything, insert one record, and update
/// the rows whose `column` equals `value`.
#[async_trait]
pub trait TableGateway: Send + Sync {
    async fn select_all(&self, table: &str) -> Result<Vec<Row>, GatewayError>;

    async fn insert(&self, table: &str, record: Row) -> Result<Row, GatewayError>;

    /// Returns the updated rows; an empty vector means nothing matched.
    async fn update_eq(
        &self,
        table: &str,
        patch: Row,
        column: &str,
        value: &Value,
    ) -> Result<Vec<Row>, GatewayError>;
}

/// Keeps tables in memory and assigns `id`/`created_at` the way the remote
/// store does. Columns registered with [`InMemoryGateway::with_columns`] are
/// filled with null on insert when the record omits them.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    columns: Vec<String>,
    next_id: AtomicI64,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl TableGateway for InMemoryGateway {
    async fn select_all(&self, table: &str) -> Result<Vec<Row>, GatewayError> {
        let tables = self.tables.read().await;
        Ok(tables.get(table).cloned().unwrap_or_default())
    }

    async fn insert(&self, table: &str, record: Row) -> Result<Row, GatewayError> {
        let mut row = record;
        for column in &self.columns {
            row.entry(column.clone()).or_insert(Value::Null);
        }
        if row.get("id").map_or(true, Value::is_null) {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            row.insert("id".to_string(), Value::from(id));
        }
        if row.get("created_at").map_or(true, Value::is_null) {
            row.insert(
                "created_at".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }

        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    async fn update_eq(
        &self,
        table: &str,
        patch: Row,
        column: &str,
        value: &Value,
    ) -> Result<Vec<Row>, GatewayError> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|r| r.get(column) == Some(value)) {
            for (key, new_value) in &patch {
                row.insert(key.clone(), new_value.clone());
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }
}
