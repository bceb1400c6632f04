//! Display list computation and edit reconciliation.
//!
//! Everything here is pure: the handlers fetch tickets, run them through
//! [`compute_display_list`], and turn edited rows into patches with
//! [`compute_patches`] before handing them to the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::{EditedRow, Priority, Ticket, TicketPatch, TicketStats, TicketStatus, TicketsError};

/// Rank given to priorities outside the known list; they sort last.
const UNKNOWN_PRIORITY_RANK: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOption {
    #[default]
    #[serde(rename = "Newest first")]
    NewestFirst,
    #[serde(rename = "Oldest first")]
    OldestFirst,
    #[serde(rename = "Priority high to low")]
    PriorityHighToLow,
    #[serde(rename = "Status")]
    Status,
}

impl SortOption {
    pub const ALL: [SortOption; 4] = [
        Self::NewestFirst,
        Self::OldestFirst,
        Self::PriorityHighToLow,
        Self::Status,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::NewestFirst => "Newest first",
            Self::OldestFirst => "Oldest first",
            Self::PriorityHighToLow => "Priority high to low",
            Self::Status => "Status",
        }
    }

    fn short_name(self) -> &'static str {
        match self {
            Self::NewestFirst => "newest",
            Self::OldestFirst => "oldest",
            Self::PriorityHighToLow => "priority",
            Self::Status => "status",
        }
    }
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SortOption {
    type Err = TicketsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|opt| {
                opt.label().eq_ignore_ascii_case(wanted)
                    || opt.short_name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| TicketsError::Validation(format!("Unknown sort option: {wanted}")))
    }
}

/// The set of status values a user has selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusFilter(BTreeSet<String>);

impl StatusFilter {
    pub fn all() -> Self {
        TicketStatus::ALL.iter().map(|s| s.as_str()).collect()
    }

    /// Parses `New,In Progress`. An empty string selects nothing.
    pub fn from_csv(raw: &str) -> Self {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn contains(&self, status: Option<&str>) -> bool {
        status.is_some_and(|s| self.0.contains(s))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for StatusFilter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

pub fn compute_display_list(
    tickets: &[Ticket],
    status_filter: &StatusFilter,
    search_term: &str,
    sort: SortOption,
) -> Vec<Ticket> {
    let needle = search_term.to_lowercase();
    let mut list: Vec<Ticket> = tickets
        .iter()
        .filter(|t| status_filter.contains(t.status.as_deref()))
        .filter(|t| needle.is_empty() || matches_search(t, &needle))
        .cloned()
        .collect();
    sort_tickets(&mut list, sort);
    list
}

fn matches_search(ticket: &Ticket, needle: &str) -> bool {
    [
        ticket.issue.as_deref(),
        ticket.policy_id.as_deref(),
        ticket.sales_agent.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(needle))
        || ticket.id.to_string().contains(needle)
}

// `sort_by` is stable, so equal keys keep their input order.
fn sort_tickets(list: &mut [Ticket], sort: SortOption) {
    match sort {
        SortOption::NewestFirst => {
            list.sort_by(|a, b| nulls_last(a.created_at, b.created_at, |x, y| y.cmp(x)))
        }
        SortOption::OldestFirst => {
            list.sort_by(|a, b| nulls_last(a.created_at, b.created_at, |x, y| x.cmp(y)))
        }
        SortOption::PriorityHighToLow => {
            list.sort_by_key(|t| priority_rank(t.priority.as_deref()))
        }
        SortOption::Status => list.sort_by(|a, b| {
            nulls_last(a.status.as_deref(), b.status.as_deref(), |x, y| x.cmp(y))
        }),
    }
}

fn nulls_last<T>(a: Option<T>, b: Option<T>, cmp: impl FnOnce(&T, &T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp(&a, &b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn priority_rank(priority: Option<&str>) -> u8 {
    priority
        .and_then(Priority::parse)
        .map_or(UNKNOWN_PRIORITY_RANK, Priority::rank)
}

/// One patch per edited row, in input order. A row marked `Closed` without a
/// close date gets `now`; any other `closed_at` is written as given.
pub fn compute_patches(rows: &[EditedRow], now: DateTime<Utc>) -> Vec<(i64, TicketPatch)> {
    rows.iter().map(|row| (row.id, reconcile(row, now))).collect()
}

/// Patch for a single edited row.
pub fn reconcile(row: &EditedRow, now: DateTime<Utc>) -> TicketPatch {
    let closing = row.status.as_deref() == Some(TicketStatus::Closed.as_str());
    let closed_at = match row.closed_at {
        None if closing => Some(now),
        other => other,
    };
    TicketPatch {
        status: row.status.clone(),
        priority: row.priority.clone(),
        sales_agent: row.sales_agent.clone(),
        insurance_company: row.insurance_company.clone(),
        notes: row.notes.clone(),
        policy_id: row.policy_id.clone(),
        closed_at,
    }
}

pub fn summarize(tickets: &[Ticket]) -> TicketStats {
    let closed = TicketStatus::Closed.as_str();
    let awaiting = TicketStatus::AwaitingAgent.as_str();
    let critical = Priority::Critical.as_str();

    tickets.iter().fold(
        TicketStats {
            total: tickets.len(),
            ..TicketStats::default()
        },
        |mut stats, t| {
            let status = t.status.as_deref();
            if status != Some(closed) {
                stats.open += 1;
            }
            if status == Some(awaiting) {
                stats.pending_agent += 1;
            }
            if t.priority.as_deref() == Some(critical) {
                stats.critical += 1;
            }
            stats
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn ticket(id: i64, status: &str, priority: &str, issue: &str) -> Ticket {
        Ticket {
            id,
            created_at: Some(base_time() + Duration::hours(id)),
            created_by: Some("Ops Intake".to_string()),
            policy_id: Some(format!("P-{id:03}")),
            issue: Some(issue.to_string()),
            priority: Some(priority.to_string()),
            status: Some(status.to_string()),
            sales_agent: Some("Agent Bob".to_string()),
            insurance_company: Some("N/A".to_string()),
            notes: None,
            closed_at: None,
        }
    }

    fn sample() -> Vec<Ticket> {
        vec![
            ticket(1, "New", "Low", "Windshield claim stuck"),
            ticket(2, "Closed", "High", "Progressive portal rejects upload"),
            ticket(3, "Awaiting Agent", "Critical", "Duplicate payout"),
            ticket(4, "In Progress", "Medium", "Address change"),
        ]
    }

    fn ids(list: &[Ticket]) -> Vec<i64> {
        list.iter().map(|t| t.id).collect()
    }

    #[test]
    fn test_full_status_set_keeps_everything() {
        let tickets = sample();
        let list = compute_display_list(&tickets, &StatusFilter::all(), "", SortOption::OldestFirst);
        assert_eq!(ids(&list), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_empty_status_set_yields_nothing() {
        let tickets = sample();
        let list =
            compute_display_list(&tickets, &StatusFilter::default(), "", SortOption::NewestFirst);
        assert!(list.is_empty());
    }

    #[test]
    fn test_status_filter_subset() {
        let tickets = sample();
        let filter = StatusFilter::from_csv("New, Closed");
        let list = compute_display_list(&tickets, &filter, "", SortOption::OldestFirst);
        assert_eq!(ids(&list), vec![1, 2]);
        assert!(list.len() <= tickets.len());
        assert!(list.iter().all(|t| tickets.contains(t)));
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let tickets = sample();
        let list =
            compute_display_list(&tickets, &StatusFilter::all(), "progressive", SortOption::NewestFirst);
        assert_eq!(ids(&list), vec![2]);
    }

    #[test]
    fn test_search_does_not_look_at_carrier() {
        let mut tickets = sample();
        tickets[0].insurance_company = Some("GEICO".to_string());
        let list =
            compute_display_list(&tickets, &StatusFilter::all(), "geico", SortOption::NewestFirst);
        assert!(list.is_empty());
    }

    #[test]
    fn test_search_matches_policy_agent_and_id() {
        let mut tickets = sample();
        tickets[3].sales_agent = Some("Agent Charlie".to_string());

        let by_policy =
            compute_display_list(&tickets, &StatusFilter::all(), "p-003", SortOption::OldestFirst);
        assert_eq!(ids(&by_policy), vec![3]);

        let by_agent =
            compute_display_list(&tickets, &StatusFilter::all(), "charlie", SortOption::OldestFirst);
        assert_eq!(ids(&by_agent), vec![4]);

        tickets[0].id = 42;
        let by_id = compute_display_list(&tickets, &StatusFilter::all(), "42", SortOption::OldestFirst);
        assert_eq!(ids(&by_id), vec![42]);
    }

    #[test]
    fn test_search_skips_null_fields() {
        let mut tickets = sample();
        tickets[0].issue = None;
        tickets[0].policy_id = None;
        tickets[0].sales_agent = None;
        let list =
            compute_display_list(&tickets, &StatusFilter::all(), "windshield", SortOption::NewestFirst);
        assert!(list.is_empty());
    }

    #[test]
    fn test_sort_by_created_at() {
        let tickets = sample();
        let newest = compute_display_list(&tickets, &StatusFilter::all(), "", SortOption::NewestFirst);
        assert_eq!(ids(&newest), vec![4, 3, 2, 1]);

        let oldest = compute_display_list(&tickets, &StatusFilter::all(), "", SortOption::OldestFirst);
        assert_eq!(ids(&oldest), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_sort_by_priority_reverse_input() {
        let tickets = vec![
            ticket(1, "New", "Low", "a"),
            ticket(2, "New", "Medium", "b"),
            ticket(3, "New", "High", "c"),
            ticket(4, "New", "Critical", "d"),
        ];
        let list =
            compute_display_list(&tickets, &StatusFilter::all(), "", SortOption::PriorityHighToLow);
        let priorities: Vec<_> = list.iter().filter_map(|t| t.priority.as_deref()).collect();
        assert_eq!(priorities, vec!["Critical", "High", "Medium", "Low"]);
    }

    #[test]
    fn test_sort_by_priority_is_stable() {
        let tickets = vec![
            ticket(1, "New", "High", "a"),
            ticket(2, "New", "Urgent", "b"),
            ticket(3, "New", "High", "c"),
            ticket(4, "New", "Critical", "d"),
            ticket(5, "New", "High", "e"),
        ];
        let list =
            compute_display_list(&tickets, &StatusFilter::all(), "", SortOption::PriorityHighToLow);
        assert_eq!(ids(&list), vec![4, 1, 3, 5, 2]);
    }

    #[test]
    fn test_sort_by_status_lexicographic() {
        let tickets = sample();
        let list = compute_display_list(&tickets, &StatusFilter::all(), "", SortOption::Status);
        let statuses: Vec<_> = list.iter().filter_map(|t| t.status.as_deref()).collect();
        assert_eq!(statuses, vec!["Awaiting Agent", "Closed", "In Progress", "New"]);
    }

    #[test]
    fn test_missing_created_at_sorts_last() {
        let mut tickets = sample();
        tickets[3].created_at = None;
        let list = compute_display_list(&tickets, &StatusFilter::all(), "", SortOption::NewestFirst);
        assert_eq!(ids(&list), vec![3, 2, 1, 4]);
    }

    #[test]
    fn test_sort_option_parsing() {
        assert_eq!("Newest first".parse::<SortOption>().unwrap(), SortOption::NewestFirst);
        assert_eq!("priority".parse::<SortOption>().unwrap(), SortOption::PriorityHighToLow);
        assert_eq!(" STATUS ".parse::<SortOption>().unwrap(), SortOption::Status);
        assert!("alphabetical".parse::<SortOption>().is_err());
        assert_eq!(SortOption::OldestFirst.to_string(), "Oldest first");
    }

    #[test]
    fn test_closing_fills_closed_at() {
        let now = base_time();
        let mut row = EditedRow::from(&ticket(3, "Closed", "High", "x"));
        row.closed_at = None;

        let patches = compute_patches(&[row], now);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].0, 3);
        assert_eq!(patches[0].1.closed_at, Some(now));
    }

    #[test]
    fn test_closing_keeps_existing_closed_at() {
        let earlier = base_time() - Duration::days(2);
        let mut row = EditedRow::from(&ticket(3, "Closed", "High", "x"));
        row.closed_at = Some(earlier);

        let patches = compute_patches(&[row], base_time());
        assert_eq!(patches[0].1.closed_at, Some(earlier));
    }

    #[test]
    fn test_reopened_ticket_keeps_closed_at() {
        let earlier = base_time() - Duration::days(2);
        let mut row = EditedRow::from(&ticket(3, "In Progress", "High", "x"));
        row.closed_at = Some(earlier);

        let patches = compute_patches(&[row], base_time());
        assert_eq!(patches[0].1.status.as_deref(), Some("In Progress"));
        assert_eq!(patches[0].1.closed_at, Some(earlier));
    }

    #[test]
    fn test_open_ticket_without_close_date_stays_null() {
        let row = EditedRow::from(&ticket(1, "New", "Low", "x"));
        let patches = compute_patches(&[row], base_time());
        assert!(patches[0].1.closed_at.is_none());
    }

    #[test]
    fn test_unknown_values_pass_through() {
        let mut row = EditedRow::from(&ticket(1, "Escalated", "Urgent", "x"));
        row.notes = Some("called carrier".to_string());
        let patch = &compute_patches(&[row], base_time())[0].1;
        assert_eq!(patch.status.as_deref(), Some("Escalated"));
        assert_eq!(patch.priority.as_deref(), Some("Urgent"));
        assert_eq!(patch.notes.as_deref(), Some("called carrier"));
        assert!(patch.closed_at.is_none());
    }

    #[test]
    fn test_summarize_counts() {
        let mut tickets = sample();
        tickets.push(ticket(5, "Awaiting Agent", "Critical", "y"));
        let stats = summarize(&tickets);
        assert_eq!(
            stats,
            TicketStats {
                total: 5,
                open: 4,
                critical: 2,
                pending_agent: 2,
            }
        );
    }
}
