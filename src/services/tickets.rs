//! Support ticket service

use std::{sync::Arc, time::Duration};

use chrono::Utc;

use crate::{
    cache::RequestCache,
    error::{AppError, AppResult},
    models::{
        ticket::{
            CreateComment, CreateTicket, TicketComment, TicketDetails, TicketPage, TicketPriority,
            TicketQuery, UpdateTicket,
        },
        user::UserClaims,
        Pagination,
    },
    repository::Repository,
};

const PRIORITIES_KEY: &str = "ticket_priorities";

#[derive(Clone)]
pub struct TicketsService {
    repository: Repository,
    pending_after_hours: i64,
    priorities: Arc<RequestCache<Vec<TicketPriority>>>,
}

impl TicketsService {
    pub fn new(repository: Repository, pending_after_hours: i64, cache_max_age: Duration) -> Self {
        Self {
            repository,
            pending_after_hours,
            priorities: Arc::new(RequestCache::new(cache_max_age)),
        }
    }

    pub async fn priorities(&self) -> AppResult<Vec<TicketPriority>> {
        self.priorities
            .get_or_fetch(PRIORITIES_KEY, || self.repository.tickets.list_priorities())
            .await
    }

    /// List tickets visible to the caller with SLA data computed now
    pub async fn list(&self, claims: &UserClaims, mut query: TicketQuery) -> AppResult<TicketPage> {
        if !claims.role.is_it_staff() {
            query.requester_id = Some(claims.user_id);
        }

        let pagination = Pagination::new(query.page, query.per_page)?;
        let (rows, total) = self.repository.tickets.list(&query, pagination).await?;
        let now = Utc::now();
        let items = rows
            .into_iter()
            .map(|row| TicketDetails::from_row(row, now, self.pending_after_hours))
            .collect();

        Ok(TicketPage {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
        })
    }

    pub async fn get(&self, claims: &UserClaims, id: i32) -> AppResult<TicketDetails> {
        let row = self.repository.tickets.get_by_id(id).await?;
        if !claims.can_read_ticket(row.ticket.requester_id) {
            // Hide existence of other employees' tickets
            return Err(AppError::NotFound(format!("Ticket with id {} not found", id)));
        }
        Ok(TicketDetails::from_row(row, Utc::now(), self.pending_after_hours))
    }

    pub async fn create(&self, claims: &UserClaims, data: &CreateTicket) -> AppResult<TicketDetails> {
        self.check_priority(data.priority_id).await?;
        if let Some(asset_id) = data.asset_id {
            self.check_asset(asset_id).await?;
        }
        let ticket = self.repository.tickets.create(data, claims.user_id).await?;
        tracing::info!("Ticket {} opened by employee {}", ticket.id, claims.user_id);
        let row = self.repository.tickets.get_by_id(ticket.id).await?;
        Ok(TicketDetails::from_row(row, Utc::now(), self.pending_after_hours))
    }

    pub async fn update(&self, id: i32, data: &UpdateTicket) -> AppResult<TicketDetails> {
        if let Some(priority_id) = data.priority_id {
            self.check_priority(priority_id).await?;
        }
        let ticket = self.repository.tickets.update(id, data).await?;
        if let Some(status) = data.status {
            tracing::info!("Ticket {} moved to {}", ticket.id, status);
        }
        let row = self.repository.tickets.get_by_id(ticket.id).await?;
        Ok(TicketDetails::from_row(row, Utc::now(), self.pending_after_hours))
    }

    pub async fn comments(&self, claims: &UserClaims, ticket_id: i32) -> AppResult<Vec<TicketComment>> {
        self.get(claims, ticket_id).await?;
        self.repository.tickets.list_comments(ticket_id).await
    }

    pub async fn add_comment(
        &self,
        claims: &UserClaims,
        ticket_id: i32,
        data: &CreateComment,
    ) -> AppResult<TicketComment> {
        let ticket = self.get(claims, ticket_id).await?;
        if ticket.ticket.status.is_terminal() {
            return Err(AppError::BusinessRule(format!(
                "Ticket {} is {} and no longer accepts comments",
                ticket_id, ticket.ticket.status
            )));
        }
        self.repository.tickets.add_comment(ticket_id, claims.user_id, data).await
    }

    async fn check_asset(&self, asset_id: i32) -> AppResult<()> {
        match self.repository.assets.get_by_id(asset_id).await {
            Ok(_) => Ok(()),
            Err(AppError::NotFound(_)) => {
                Err(AppError::Validation(format!("Asset {} does not exist", asset_id)))
            }
            Err(e) => Err(e),
        }
    }

    async fn check_priority(&self, priority_id: i32) -> AppResult<()> {
        let known = self.priorities().await?.iter().any(|p| p.id == priority_id);
        if known || self.repository.tickets.priority_exists(priority_id).await? {
            Ok(())
        } else {
            Err(AppError::Validation(format!("Unknown priority {}", priority_id)))
        }
    }
}
