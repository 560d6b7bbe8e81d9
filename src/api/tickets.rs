//! Support ticket endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::ticket::{
        CreateComment, CreateTicket, TicketComment, TicketDetails, TicketPage, TicketPriority,
        TicketQuery, UpdateTicket,
    },
};

use super::AuthenticatedUser;

/// List tickets with SLA information
#[utoipa::path(
    get,
    path = "/tickets",
    tag = "tickets",
    security(("bearer_auth" = [])),
    params(
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("priority_id" = Option<i32>, Query, description = "Filter by priority"),
        ("requester_id" = Option<i32>, Query, description = "Filter by requester (staff only)"),
        ("overdue" = Option<bool>, Query, description = "Only tickets past their SLA"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (default: 20)")
    ),
    responses(
        (status = 200, description = "List of tickets", body = TicketPage),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_tickets(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<TicketQuery>,
) -> AppResult<Json<TicketPage>> {
    let page = state.services.tickets.list(&claims, query).await?;
    Ok(Json(page))
}

/// Get ticket details
#[utoipa::path(
    get,
    path = "/tickets/{id}",
    tag = "tickets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Ticket ID")),
    responses(
        (status = 200, description = "Ticket details", body = TicketDetails),
        (status = 404, description = "Ticket not found")
    )
)]
pub async fn get_ticket(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<TicketDetails>> {
    let ticket = state.services.tickets.get(&claims, id).await?;
    Ok(Json(ticket))
}

/// Open a ticket
#[utoipa::path(
    post,
    path = "/tickets",
    tag = "tickets",
    security(("bearer_auth" = [])),
    request_body = CreateTicket,
    responses(
        (status = 201, description = "Ticket created", body = TicketDetails),
        (status = 400, description = "Invalid request")
    )
)]
pub async fn create_ticket(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateTicket>,
) -> AppResult<(StatusCode, Json<TicketDetails>)> {
    data.validate()?;
    let ticket = state.services.tickets.create(&claims, &data).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Update status, priority or assignee of a ticket
#[utoipa::path(
    put,
    path = "/tickets/{id}",
    tag = "tickets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Ticket ID")),
    request_body = UpdateTicket,
    responses(
        (status = 200, description = "Ticket updated", body = TicketDetails),
        (status = 403, description = "Not IT staff"),
        (status = 404, description = "Ticket not found")
    )
)]
pub async fn update_ticket(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateTicket>,
) -> AppResult<Json<TicketDetails>> {
    claims.require_manage_tickets()?;
    data.validate()?;
    let ticket = state.services.tickets.update(id, &data).await?;
    Ok(Json(ticket))
}

/// List comments of a ticket
#[utoipa::path(
    get,
    path = "/tickets/{id}/comments",
    tag = "tickets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Ticket ID")),
    responses(
        (status = 200, description = "Comments in chronological order", body = Vec<TicketComment>),
        (status = 404, description = "Ticket not found")
    )
)]
pub async fn list_comments(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<TicketComment>>> {
    let comments = state.services.tickets.comments(&claims, id).await?;
    Ok(Json(comments))
}

/// Add a comment to a ticket
#[utoipa::path(
    post,
    path = "/tickets/{id}/comments",
    tag = "tickets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Ticket ID")),
    request_body = CreateComment,
    responses(
        (status = 201, description = "Comment added", body = TicketComment),
        (status = 404, description = "Ticket not found"),
        (status = 422, description = "Ticket is closed")
    )
)]
pub async fn add_comment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<CreateComment>,
) -> AppResult<(StatusCode, Json<TicketComment>)> {
    data.validate()?;
    let comment = state.services.tickets.add_comment(&claims, id, &data).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// List ticket priorities and their SLA hours
#[utoipa::path(
    get,
    path = "/tickets/priorities",
    tag = "tickets",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Priorities", body = Vec<TicketPriority>)
    )
)]
pub async fn list_priorities(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<TicketPriority>>> {
    let priorities = state.services.tickets.priorities().await?;
    Ok(Json(priorities))
}
