use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::sync::Arc;

use super::gateway::{Row, TableGateway};
use super::view::{compute_patches, reconcile};
use super::{EditedRow, NewTicket, Ticket, TicketEdit, TicketPatch, TicketsError};

pub const TICKETS_TABLE: &str = "tickets";

/// Column order used for every row handed out by the store.
pub const TICKET_COLUMNS: [&str; 11] = [
    "id",
    "created_at",
    "created_by",
    "policy_id",
    "issue",
    "priority",
    "status",
    "sales_agent",
    "insurance_company",
    "notes",
    "closed_at",
];

/// Typed access to the `tickets` table. Cheap to clone; all clones share the
/// same gateway handle.
#[derive(Clone)]
pub struct TicketStore {
    gateway: Arc<dyn TableGateway>,
    table: String,
}

impl TicketStore {
    pub fn new(gateway: Arc<dyn TableGateway>, table: impl Into<String>) -> Self {
        Self {
            gateway,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Raw rows in [`TICKET_COLUMNS`] order. Columns the table lacks are
    /// skipped rather than invented.
    pub async fn list_rows(&self) -> Result<Vec<Row>, TicketsError> {
        let rows = self.gateway.select_all(&self.table).await?;
        debug!("Loaded {} rows from {}", rows.len(), self.table);
        Ok(rows.into_iter().map(order_columns).collect())
    }

    /// Typed tickets. A row that fails to decode is logged and left out so
    /// one bad record does not hide the rest of the table.
    pub async fn list_all(&self) -> Result<Vec<Ticket>, TicketsError> {
        let tickets = self
            .list_rows()
            .await?
            .into_iter()
            .filter_map(|row| {
                let id = row.get("id").cloned().unwrap_or(Value::Null);
                match decode_ticket(row) {
                    Ok(ticket) => Some(ticket),
                    Err(e) => {
                        warn!("Skipping ticket {id} in {}: {e}", self.table);
                        None
                    }
                }
            })
            .collect();
        Ok(tickets)
    }

    /// Applies a single-ticket edit on top of the stored row, so fields the
    /// edit leaves out keep their current values.
    pub async fn edit(
        &self,
        id: i64,
        edit: TicketEdit,
        now: DateTime<Utc>,
    ) -> Result<Ticket, TicketsError> {
        let target = Value::from(id);
        let row = self
            .list_rows()
            .await?
            .into_iter()
            .find(|row| row.get("id") == Some(&target))
            .ok_or_else(|| TicketsError::NotFound(format!("Ticket {id} not found")))?;
        let current = decode_ticket(row)?;

        let merged = edit.merge_into(EditedRow::from(&current));
        self.update_by_id(id, &reconcile(&merged, now)).await
    }

    pub async fn add(&self, ticket: NewTicket) -> Result<Ticket, TicketsError> {
        ticket.validate()?;
        let row = self
            .gateway
            .insert(&self.table, ticket.into_record())
            .await?;
        let ticket = decode_ticket(order_columns(row))?;
        info!(
            "Logged ticket {} for policy {}",
            ticket.id,
            ticket.policy_id.as_deref().unwrap_or("-")
        );
        Ok(ticket)
    }

    pub async fn update_by_id(&self, id: i64, patch: &TicketPatch) -> Result<Ticket, TicketsError> {
        let rows = self
            .gateway
            .update_eq(&self.table, patch.to_row()?, "id", &Value::from(id))
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| TicketsError::NotFound(format!("Ticket {id} not found")))?;
        decode_ticket(order_columns(row))
    }

    /// Persists edited rows one at a time. The first failure stops the loop;
    /// rows written before it stay written.
    pub async fn sync(&self, rows: &[EditedRow], now: DateTime<Utc>) -> Result<usize, TicketsError> {
        let patches = compute_patches(rows, now);
        let total = patches.len();

        for (done, (id, patch)) in patches.iter().enumerate() {
            if let Err(e) = self.update_by_id(*id, patch).await {
                error!("Sync stopped at ticket {id} after {done} of {total} rows: {e}");
                return Err(e);
            }
        }

        info!("Synced {total} tickets");
        Ok(total)
    }
}

pub fn order_columns(mut row: Row) -> Row {
    let mut ordered = Row::new();
    for column in TICKET_COLUMNS {
        if let Some(value) = row.remove(column) {
            ordered.insert(column.to_string(), value);
        }
    }
    ordered
}

fn decode_ticket(row: Row) -> Result<Ticket, TicketsError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| TicketsError::Decode(e.to_string()))
}
