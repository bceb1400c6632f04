pub mod error;
pub mod gateway;
pub mod postgrest;
pub mod store;
pub mod ui;
pub mod view;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, put},
    Json, Router,
};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::shared::state::AppState;

pub use error::TicketsError;
pub use gateway::{GatewayError, InMemoryGateway, Row, TableGateway};
pub use postgrest::PostgrestGateway;
pub use store::{TicketStore, TICKETS_TABLE, TICKET_COLUMNS};
pub use view::{
    compute_display_list, compute_patches, reconcile, summarize, SortOption, StatusFilter,
};

pub const REPORTERS: &[&str] = &["Ops Intake", "Agent Sarah", "Carrier Portal", "IT Monitor"];
pub const SALES_AGENTS: &[&str] = &["Agent Alice", "Agent Bob", "Agent Charlie"];
pub const CARRIERS: &[&str] = &["N/A", "Progressive", "GEICO", "State Farm", "Liberty Mutual"];

pub const MISSING_REQUIRED_FIELDS: &str = "Policy ID and Description are required.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == label)
    }

    /// Sort rank, most urgent first.
    pub fn rank(self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketStatus {
    New,
    InProgress,
    AwaitingAgent,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        Self::New,
        Self::InProgress,
        Self::AwaitingAgent,
        Self::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::InProgress => "In Progress",
            Self::AwaitingAgent => "Awaiting Agent",
            Self::Closed => "Closed",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == label)
    }
}

/// One incident record as stored in the `tickets` table.
///
/// Enum-valued columns stay plain strings so values outside the known
/// choice lists survive a load/sync cycle untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(default)]
    pub id: i64,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub policy_id: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub sales_agent: Option<String>,
    #[serde(default)]
    pub insurance_company: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTicket {
    pub created_by: Option<String>,
    #[serde(default)]
    pub policy_id: String,
    #[serde(default)]
    pub issue: String,
    pub priority: Option<String>,
    pub sales_agent: Option<String>,
    pub insurance_company: Option<String>,
}

impl NewTicket {
    pub fn validate(&self) -> Result<(), TicketsError> {
        if self.policy_id.trim().is_empty() || self.issue.trim().is_empty() {
            return Err(TicketsError::Validation(MISSING_REQUIRED_FIELDS.to_string()));
        }
        Ok(())
    }

    /// Builds the insert record. Unset choices fall back to the first entry
    /// of each intake list and the status is always `New`.
    pub fn into_record(self) -> Row {
        let mut record = Row::new();
        record.insert(
            "created_by".to_string(),
            Value::String(self.created_by.unwrap_or_else(|| REPORTERS[0].to_string())),
        );
        record.insert("policy_id".to_string(), Value::String(self.policy_id));
        record.insert("issue".to_string(), Value::String(self.issue));
        record.insert(
            "priority".to_string(),
            Value::String(
                self.priority
                    .unwrap_or_else(|| Priority::Low.as_str().to_string()),
            ),
        );
        record.insert(
            "sales_agent".to_string(),
            Value::String(self.sales_agent.unwrap_or_else(|| SALES_AGENTS[0].to_string())),
        );
        record.insert(
            "insurance_company".to_string(),
            Value::String(
                self.insurance_company
                    .unwrap_or_else(|| CARRIERS[0].to_string()),
            ),
        );
        record.insert(
            "status".to_string(),
            Value::String(TicketStatus::New.as_str().to_string()),
        );
        record
    }
}

/// A table row as submitted back by the editor. Columns the editor does not
/// own (`created_at`, `issue`, ...) are ignored on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditedRow {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub sales_agent: Option<String>,
    #[serde(default)]
    pub insurance_company: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub policy_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<&Ticket> for EditedRow {
    fn from(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id,
            status: ticket.status.clone(),
            priority: ticket.priority.clone(),
            sales_agent: ticket.sales_agent.clone(),
            insurance_company: ticket.insurance_company.clone(),
            notes: ticket.notes.clone(),
            policy_id: ticket.policy_id.clone(),
            closed_at: ticket.closed_at,
        }
    }
}

/// Body of a single-ticket edit. An absent field keeps the stored value; an
/// explicit `null` (or `""` for `closed_at`) clears it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TicketEdit {
    #[serde(default, deserialize_with = "deserialize_present")]
    pub status: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub priority: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub sales_agent: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub insurance_company: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub policy_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present_timestamp")]
    pub closed_at: Option<Option<DateTime<Utc>>>,
}

impl TicketEdit {
    /// Overlays the fields present in the edit on top of the stored row.
    pub fn merge_into(self, mut row: EditedRow) -> EditedRow {
        if let Some(status) = self.status {
            row.status = status;
        }
        if let Some(priority) = self.priority {
            row.priority = priority;
        }
        if let Some(sales_agent) = self.sales_agent {
            row.sales_agent = sales_agent;
        }
        if let Some(insurance_company) = self.insurance_company {
            row.insurance_company = insurance_company;
        }
        if let Some(notes) = self.notes {
            row.notes = notes;
        }
        if let Some(policy_id) = self.policy_id {
            row.policy_id = policy_id;
        }
        if let Some(closed_at) = self.closed_at {
            row.closed_at = closed_at;
        }
        row
    }
}

/// Partial update for one ticket. Every field is written, `None` as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketPatch {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub sales_agent: Option<String>,
    pub insurance_company: Option<String>,
    pub notes: Option<String>,
    pub policy_id: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl TicketPatch {
    pub fn to_row(&self) -> Result<Row, TicketsError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(row)) => Ok(row),
            Ok(other) => Err(TicketsError::Decode(format!(
                "patch serialized to non-object: {other}"
            ))),
            Err(e) => Err(TicketsError::Decode(e.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStats {
    pub total: usize,
    pub open: usize,
    pub critical: usize,
    pub pending_agent: usize,
}

#[derive(Debug, Serialize)]
pub struct TicketOptions {
    pub reporters: Vec<&'static str>,
    pub priorities: Vec<&'static str>,
    pub statuses: Vec<&'static str>,
    pub sales_agents: Vec<&'static str>,
    pub carriers: Vec<&'static str>,
    pub sort_options: Vec<&'static str>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncReport {
    pub synced: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

impl ListQuery {
    pub fn status_filter(&self) -> StatusFilter {
        match &self.status {
            Some(raw) => StatusFilter::from_csv(raw),
            None => StatusFilter::all(),
        }
    }

    pub fn sort_option(&self) -> Result<SortOption, TicketsError> {
        match self.sort.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw.parse(),
            _ => Ok(SortOption::default()),
        }
    }

    pub fn search_term(&self) -> &str {
        self.search.as_deref().unwrap_or("")
    }

    pub fn apply(&self, tickets: &[Ticket]) -> Result<Vec<Ticket>, TicketsError> {
        let sort = self.sort_option()?;
        Ok(compute_display_list(
            tickets,
            &self.status_filter(),
            self.search_term(),
            sort,
        ))
    }
}

/// Accepts RFC 3339, naive ISO-8601 (read as UTC), null or an empty string.
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_timestamp(value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {value}"))),
    }
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::deserialize(deserializer).map(Some)
}

fn deserialize_present_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_timestamp(deserializer).map(Some)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Ticket>>, TicketsError> {
    let tickets = state.store.list_all().await?;
    Ok(Json(query.apply(&tickets)?))
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewTicket>,
) -> Result<(StatusCode, Json<Ticket>), TicketsError> {
    let ticket = state.store.add(req).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(edit): Json<TicketEdit>,
) -> Result<Json<Ticket>, TicketsError> {
    let ticket = state.store.edit(id, edit, Utc::now()).await?;
    Ok(Json(ticket))
}

pub async fn sync_tickets(
    State(state): State<Arc<AppState>>,
    Json(rows): Json<Vec<EditedRow>>,
) -> Result<Json<SyncReport>, TicketsError> {
    let synced = state.store.sync(&rows, Utc::now()).await?;
    Ok(Json(SyncReport { synced }))
}

pub async fn get_ticket_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TicketStats>, TicketsError> {
    let tickets = state.store.list_all().await?;
    Ok(Json(summarize(&tickets)))
}

pub async fn get_ticket_options() -> Json<TicketOptions> {
    Json(TicketOptions {
        reporters: REPORTERS.to_vec(),
        priorities: Priority::ALL.iter().map(|p| p.as_str()).collect(),
        statuses: TicketStatus::ALL.iter().map(|s| s.as_str()).collect(),
        sales_agents: SALES_AGENTS.to_vec(),
        carriers: CARRIERS.to_vec(),
        sort_options: SortOption::ALL.iter().map(|s| s.label()).collect(),
    })
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/stats", get(get_ticket_stats))
        .route("/api/tickets/options", get(get_ticket_options))
        .route("/api/tickets/sync", put(sync_tickets))
        .route("/api/tickets/:id", patch(update_ticket))
}
