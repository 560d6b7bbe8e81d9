//! Support ticket models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::enums::TicketStatus;
use crate::{
    error::AppError,
    rules::{ticket_sla, PendingFlags, SlaSnapshot},
};

impl TryFrom<String> for TicketStatus {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Ticket record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Ticket {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: TicketStatus,
    pub priority_id: i32,
    /// Employee who opened the ticket
    pub requester_id: i32,
    /// IT staff member working on it
    pub assignee_id: Option<i32>,
    /// Related asset, if the ticket is about hardware
    pub asset_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Ticket priority with its resolution target
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TicketPriority {
    pub id: i32,
    pub name: String,
    pub sla_hours: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TicketComment {
    pub id: i32,
    pub ticket_id: i32,
    pub author_id: i32,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Ticket joined with its priority and latest comment time
#[derive(Debug, Clone, FromRow)]
pub struct TicketRow {
    #[sqlx(flatten)]
    pub ticket: Ticket,
    pub priority_name: String,
    pub sla_hours: i32,
    pub last_comment_at: Option<DateTime<Utc>>,
}

/// Ticket with SLA and pending information
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketDetails {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub priority_name: String,
    pub sla: SlaSnapshot,
    pub last_comment_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub pending: PendingFlags,
}

impl TicketDetails {
    pub fn from_row(row: TicketRow, now: DateTime<Utc>, pending_after_hours: i64) -> Self {
        let sla = SlaSnapshot::compute(row.ticket.created_at, row.ticket.status, row.sla_hours, now);
        let pending = ticket_sla::pending_flags(row.last_comment_at, now, pending_after_hours);
        Self {
            ticket: row.ticket,
            priority_name: row.priority_name,
            sla,
            last_comment_at: row.last_comment_at,
            pending,
        }
    }
}

/// Create ticket request
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTicket {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    pub description: Option<String>,
    pub priority_id: i32,
    pub asset_id: Option<i32>,
}

/// Update ticket request (IT staff)
#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateTicket {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority_id: Option<i32>,
    pub assignee_id: Option<i32>,
}

/// Add comment request
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateComment {
    #[validate(length(min = 1, message = "Comment cannot be empty"))]
    pub body: String,
}

/// Ticket list filters
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TicketQuery {
    pub status: Option<TicketStatus>,
    pub priority_id: Option<i32>,
    pub requester_id: Option<i32>,
    /// Only tickets past their SLA
    pub overdue: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Paginated ticket list
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketPage {
    pub items: Vec<TicketDetails>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}
