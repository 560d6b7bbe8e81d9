//! Ticket SLA and pending-flag computations

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::enums::TicketStatus;

/// Hours of comment silence after which a ticket counts as pending
pub const DEFAULT_PENDING_AFTER_HOURS: i64 = 36;

/// Age of a ticket in hours (fractional, never negative)
pub fn ticket_age_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let secs = (now - created_at).num_seconds().max(0);
    secs as f64 / 3600.0
}

/// A ticket is overdue when it is older than its priority's SLA and still open
pub fn is_ticket_overdue(
    created_at: DateTime<Utc>,
    status: TicketStatus,
    sla_hours: i32,
    now: DateTime<Utc>,
) -> bool {
    !status.is_terminal() && ticket_age_hours(created_at, now) > f64::from(sla_hours)
}

/// SLA summary attached to ticket responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SlaSnapshot {
    pub age_hours: f64,
    pub sla_hours: i32,
    /// Negative once the SLA is exceeded
    pub hours_remaining: f64,
    pub is_overdue: bool,
}

impl SlaSnapshot {
    pub fn compute(
        created_at: DateTime<Utc>,
        status: TicketStatus,
        sla_hours: i32,
        now: DateTime<Utc>,
    ) -> Self {
        let age_hours = ticket_age_hours(created_at, now);
        Self {
            age_hours,
            sla_hours,
            hours_remaining: f64::from(sla_hours) - age_hours,
            is_overdue: is_ticket_overdue(created_at, status, sla_hours, now),
        }
    }
}

/// Waiting-on flags derived from the latest comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct PendingFlags {
    pub is_pending_vendor: bool,
    pub is_pending_user: bool,
}

/// Both flags flip on once the most recent comment is older than
/// `threshold_hours`. Tickets without comments are never pending.
pub fn pending_flags(
    last_comment_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold_hours: i64,
) -> PendingFlags {
    let stale = last_comment_at
        .map(|at| now - at > Duration::hours(threshold_hours))
        .unwrap_or(false);
    PendingFlags {
        is_pending_vendor: stale,
        is_pending_user: stale,
    }
}
