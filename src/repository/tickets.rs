//! Tickets repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::TicketStatus,
        ticket::{CreateComment, CreateTicket, Ticket, TicketComment, TicketPriority, TicketQuery, TicketRow, UpdateTicket},
        Pagination,
    },
};

/// Map a foreign-key violation (unknown asset or priority) to a validation
/// error with `message`
fn invalid_reference(e: sqlx::Error, message: String) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => AppError::Validation(message),
        _ => AppError::Database(e),
    }
}

const TICKET_ROW_SELECT: &str = r#"
    SELECT t.*, p.name AS priority_name, p.sla_hours,
           (SELECT MAX(c.created_at) FROM ticket_comments c WHERE c.ticket_id = t.id) AS last_comment_at
    FROM tickets t
    JOIN ticket_priorities p ON p.id = t.priority_id
"#;

#[derive(Clone)]
pub struct TicketsRepository {
    pool: Pool<Postgres>,
}

impl TicketsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List priorities ordered by urgency
    pub async fn list_priorities(&self) -> AppResult<Vec<TicketPriority>> {
        let rows = sqlx::query_as::<_, TicketPriority>(
            "SELECT id, name, sla_hours FROM ticket_priorities ORDER BY sla_hours, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn priority_exists(&self, id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM ticket_priorities WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Search tickets. The overdue filter uses the database clock.
    pub async fn list(&self, query: &TicketQuery, pagination: Pagination) -> AppResult<(Vec<TicketRow>, i64)> {

        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(status) = query.status {
            params.push(status.as_str().to_string());
            conditions.push(format!("t.status = ${}", params.len()));
        }

        if let Some(priority_id) = query.priority_id {
            params.push(priority_id.to_string());
            conditions.push(format!("t.priority_id = ${}::integer", params.len()));
        }

        if let Some(requester_id) = query.requester_id {
            params.push(requester_id.to_string());
            conditions.push(format!("t.requester_id = ${}::integer", params.len()));
        }

        if query.overdue == Some(true) {
            conditions.push(
                "t.status NOT IN ('Resolved', 'Closed', 'Cancelled') AND t.created_at + make_interval(hours => p.sla_hours) < NOW()"
                    .to_string(),
            );
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!(
            "SELECT COUNT(*) FROM tickets t JOIN ticket_priorities p ON p.id = t.priority_id {}",
            where_clause
        );
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "{} {} ORDER BY t.created_at DESC, t.id DESC LIMIT {} OFFSET {}",
            TICKET_ROW_SELECT, where_clause, pagination.per_page, pagination.offset
        );
        let mut select_builder = sqlx::query_as::<_, TicketRow>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let rows = select_builder.fetch_all(&self.pool).await?;

        Ok((rows, total))
    }

    /// Get ticket with priority and latest comment time
    pub async fn get_by_id(&self, id: i32) -> AppResult<TicketRow> {
        let query = format!("{} WHERE t.id = $1", TICKET_ROW_SELECT);
        sqlx::query_as::<_, TicketRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket with id {} not found", id)))
    }

    /// Create a ticket in Open status
    pub async fn create(&self, data: &CreateTicket, requester_id: i32) -> AppResult<Ticket> {
        let now = Utc::now();
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (title, description, status, priority_id, requester_id, asset_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(TicketStatus::Open.as_str())
        .bind(data.priority_id)
        .bind(requester_id)
        .bind(data.asset_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            invalid_reference(
                e,
                match data.asset_id {
                    Some(asset_id) => format!("Asset {} does not exist", asset_id),
                    None => format!("Unknown priority {}", data.priority_id),
                },
            )
        })?;
        Ok(ticket)
    }

    /// Update ticket fields. Entering a terminal status stamps `resolved_at`,
    /// leaving one clears it.
    pub async fn update(&self, id: i32, data: &UpdateTicket) -> AppResult<Ticket> {
        let now = Utc::now();
        let mut sets = vec!["updated_at = $1".to_string()];
        let mut idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        add_field!(data.title, "title");
        add_field!(data.description, "description");
        add_field!(data.status, "status");
        add_field!(data.priority_id, "priority_id");
        add_field!(data.assignee_id, "assignee_id");

        if let Some(status) = data.status {
            if status.is_terminal() {
                sets.push("resolved_at = COALESCE(resolved_at, $1)".to_string());
            } else {
                sets.push("resolved_at = NULL".to_string());
            }
        }

        let query = format!(
            "UPDATE tickets SET {} WHERE id = ${} RETURNING *",
            sets.join(", "),
            idx
        );

        let mut builder = sqlx::query_as::<_, Ticket>(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.title);
        bind_field!(data.description);
        if let Some(status) = data.status {
            builder = builder.bind(status.as_str());
        }
        bind_field!(data.priority_id);
        bind_field!(data.assignee_id);

        builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket with id {} not found", id)))
    }

    /// Comments of a ticket in chronological order
    pub async fn list_comments(&self, ticket_id: i32) -> AppResult<Vec<TicketComment>> {
        let rows = sqlx::query_as::<_, TicketComment>(
            "SELECT * FROM ticket_comments WHERE ticket_id = $1 ORDER BY created_at, id",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Add a comment and touch the ticket
    pub async fn add_comment(&self, ticket_id: i32, author_id: i32, data: &CreateComment) -> AppResult<TicketComment> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let comment = sqlx::query_as::<_, TicketComment>(
            r#"
            INSERT INTO ticket_comments (ticket_id, author_id, body, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(ticket_id)
        .bind(author_id)
        .bind(&data.body)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE tickets SET updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(comment)
    }
}
