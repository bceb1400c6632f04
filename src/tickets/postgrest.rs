use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

use super::gateway::{GatewayError, Row, TableGateway};

/// Client for a PostgREST-compatible table store (`/rest/v1/<table>`).
#[derive(Debug, Clone)]
pub struct PostgrestGateway {
    base_url: String,
    api_key: String,
    client: Client,
}

impl PostgrestGateway {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

/// PostgREST filters take bare values: `id=eq.7`, `policy_id=eq.P-100`.
fn filter_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

async fn read_rows(response: Response) -> Result<Vec<Row>, GatewayError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let values: Vec<Value> =
        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))?;
    values
        .into_iter()
        .map(|value| match value {
            Value::Object(row) => Ok(row),
            other => Err(GatewayError::Decode(format!(
                "expected an object row, got {other}"
            ))),
        })
        .collect()
}

#[async_trait]
impl TableGateway for PostgrestGateway {
    async fn select_all(&self, table: &str) -> Result<Vec<Row>, GatewayError> {
        let response = self
            .request(Method::GET, table)
            .query(&[("select", "*")])
            .send()
            .await?;
        let rows = read_rows(response).await?;
        debug!("Selected {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    async fn insert(&self, table: &str, record: Row) -> Result<Row, GatewayError> {
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&record)
            .send()
            .await?;
        read_rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Decode("insert returned no rows".to_string()))
    }

    async fn update_eq(
        &self,
        table: &str,
        patch: Row,
        column: &str,
        value: &Value,
    ) -> Result<Vec<Row>, GatewayError> {
        let filter = format!("eq.{}", filter_value(value));
        let response = self
            .request(Method::PATCH, table)
            .query(&[(column, filter.as_str())])
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        read_rows(response).await
    }
}
