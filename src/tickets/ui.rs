use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use log::warn;
use std::sync::Arc;

use crate::shared::state::AppState;
use crate::tickets::view::summarize;
use crate::tickets::{ListQuery, Ticket, TicketStats, TicketsError};

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn priority_badge(priority: Option<&str>) -> String {
    let class = match priority {
        Some("Critical") => "badge badge-danger",
        Some("High") => "badge badge-warning",
        Some("Medium") => "badge badge-info",
        Some("Low") => "badge badge-secondary",
        _ => "badge",
    };
    format!(
        "<span class=\"{class}\">{}</span>",
        html_escape(priority.unwrap_or("-"))
    )
}

fn status_badge(status: Option<&str>) -> String {
    let class = match status {
        Some("New") => "badge badge-primary",
        Some("In Progress") => "badge badge-info",
        Some("Awaiting Agent") => "badge badge-warning",
        Some("Closed") => "badge badge-secondary",
        _ => "badge",
    };
    format!(
        "<span class=\"{class}\">{}</span>",
        html_escape(status.unwrap_or("-"))
    )
}

fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%m/%d/%y %I:%M %p").to_string())
        .unwrap_or_default()
}

fn text(value: Option<&str>) -> String {
    html_escape(value.unwrap_or(""))
}

fn render_empty_state(icon: &str, title: &str, description: &str) -> String {
    format!(
        "<div class=\"empty-state\">\
            <div class=\"empty-icon\">{}</div>\
            <h3>{}</h3>\
            <p>{}</p>\
        </div>",
        icon, title, description
    )
}

fn render_ticket_row(ticket: &Ticket) -> String {
    format!(
        "<tr class=\"ticket-row\" data-id=\"{id}\">\
            <td class=\"ticket-id\">{id}</td>\
            <td class=\"ticket-created\">{created}</td>\
            <td class=\"ticket-from\">{from}</td>\
            <td class=\"ticket-policy\">{policy}</td>\
            <td class=\"ticket-issue\">{issue}</td>\
            <td class=\"ticket-priority\">{priority}</td>\
            <td class=\"ticket-status\">{status}</td>\
            <td class=\"ticket-agent\">{agent}</td>\
            <td class=\"ticket-carrier\">{carrier}</td>\
            <td class=\"ticket-notes\">{notes}</td>\
            <td class=\"ticket-closed\">{closed}</td>\
        </tr>",
        id = ticket.id,
        created = format_timestamp(ticket.created_at),
        from = text(ticket.created_by.as_deref()),
        policy = text(ticket.policy_id.as_deref()),
        issue = text(ticket.issue.as_deref()),
        priority = priority_badge(ticket.priority.as_deref()),
        status = status_badge(ticket.status.as_deref()),
        agent = text(ticket.sales_agent.as_deref()),
        carrier = text(ticket.insurance_company.as_deref()),
        notes = text(ticket.notes.as_deref()),
        closed = format_timestamp(ticket.closed_at),
    )
}

fn render_tickets_table(tickets: &[Ticket]) -> String {
    let mut html = String::from(
        "<table class=\"tickets-table\">\
            <thead>\
                <tr>\
                    <th>Ticket ID</th>\
                    <th>Date Created</th>\
                    <th>From</th>\
                    <th>Policy/Case ID</th>\
                    <th>Description</th>\
                    <th>Priority</th>\
                    <th>Status</th>\
                    <th>Sales Agent</th>\
                    <th>Carrier</th>\
                    <th>Internal Notes</th>\
                    <th>Date Closed</th>\
                </tr>\
            </thead>\
            <tbody>",
    );

    for ticket in tickets {
        html.push_str(&render_ticket_row(ticket));
    }

    html.push_str("</tbody></table>");
    html
}

fn render_stats(stats: &TicketStats) -> String {
    let metric = |label: &str, value: usize| {
        format!(
            "<div class=\"metric\">\
                <span class=\"metric-label\">{label}</span>\
                <span class=\"metric-value\">{value}</span>\
            </div>"
        )
    };
    format!(
        "<div class=\"metrics\">{}{}{}{}</div>",
        metric("Total Tickets", stats.total),
        metric("Open", stats.open),
        metric("Critical", stats.critical),
        metric("Awaiting Agent", stats.pending_agent),
    )
}

fn render_load_error(e: &TicketsError) -> String {
    warn!("Unable to render incidents: {e}");
    match e {
        TicketsError::Validation(msg) => render_empty_state("⚠️", "Invalid filter", &html_escape(msg)),
        TicketsError::Decode(_) => render_empty_state(
            "⚠️",
            "Unable to load incidents",
            "A ticket record could not be read",
        ),
        _ => render_empty_state("⚠️", "Unable to load incidents", "The ticket store did not respond"),
    }
}

pub fn configure_tickets_ui_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/ui/tickets", get(handle_tickets_table))
        .route("/api/ui/tickets/stats", get(handle_tickets_stats))
}

async fn handle_tickets_table(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let tickets = match state.store.list_all().await {
        Ok(tickets) => tickets,
        Err(e) => return Html(render_load_error(&e)),
    };

    if tickets.is_empty() {
        return Html(render_empty_state(
            "🛡️",
            "No incidents reported yet",
            "Log the first issue to get started",
        ));
    }

    match query.apply(&tickets) {
        Ok(list) if list.is_empty() => Html(render_empty_state(
            "🔍",
            "No matching incidents",
            "Adjust the status filter or search term",
        )),
        Ok(list) => Html(render_tickets_table(&list)),
        Err(e) => Html(render_load_error(&e)),
    }
}

async fn handle_tickets_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.list_all().await {
        Ok(tickets) => Html(render_stats(&summarize(&tickets))),
        Err(e) => Html(render_load_error(&e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tickets::GatewayError;
    use chrono::TimeZone;

    fn ticket() -> Ticket {
        Ticket {
            id: 12,
            created_at: Some(Utc.with_ymd_and_hms(2024, 2, 3, 15, 4, 0).unwrap()),
            created_by: Some("Carrier Portal".to_string()),
            policy_id: Some("P-<12>".to_string()),
            issue: Some("Claim \"stuck\" & unpaid".to_string()),
            priority: Some("Critical".to_string()),
            status: Some("Escalated".to_string()),
            sales_agent: None,
            insurance_company: Some("GEICO".to_string()),
            notes: None,
            closed_at: None,
        }
    }

    #[test]
    fn test_row_escapes_user_text() {
        let html = render_ticket_row(&ticket());
        assert!(html.contains("P-&lt;12&gt;"));
        assert!(html.contains("Claim &quot;stuck&quot; &amp; unpaid"));
        assert!(html.contains("02/03/24 03:04 PM"));
    }

    #[test]
    fn test_badges_pass_unknown_values_through() {
        let html = render_ticket_row(&ticket());
        assert!(html.contains("<span class=\"badge badge-danger\">Critical</span>"));
        assert!(html.contains("<span class=\"badge\">Escalated</span>"));
    }

    #[test]
    fn test_table_has_one_row_per_ticket() {
        let html = render_tickets_table(&[ticket(), ticket()]);
        assert_eq!(html.matches("<tr class=\"ticket-row\"").count(), 2);
        assert!(html.starts_with("<table class=\"tickets-table\">"));
    }

    #[test]
    fn test_load_error_messages() {
        let html = render_load_error(&TicketsError::Decode("bad closed_at".to_string()));
        assert!(html.contains("A ticket record could not be read"));
        assert!(!html.contains("did not respond"));

        let html = render_load_error(&TicketsError::Gateway(GatewayError::Status {
            status: 503,
            body: "down".to_string(),
        }));
        assert!(html.contains("The ticket store did not respond"));

        let html = render_load_error(&TicketsError::Validation("Unknown sort option: <x>".to_string()));
        assert!(html.contains("Unknown sort option: &lt;x&gt;"));
    }

    #[test]
    fn test_stats_fragment() {
        let html = render_stats(&TicketStats {
            total: 7,
            open: 5,
            critical: 1,
            pending_agent: 2,
        });
        assert!(html.contains("<span class=\"metric-label\">Open</span><span class=\"metric-value\">5</span>"));
        assert!(html.contains("Awaiting Agent"));
    }
}
