//! Assets repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        asset::{Asset, AssetAssignment, AssetQuery, CreateAsset, CreateAssignment, UpdateAsset},
        enums::AssetStatus,
        Pagination,
    },
};

/// Status and assignment state a write was validated against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetState {
    pub status: AssetStatus,
    pub has_open_assignment: bool,
}

/// Fail with a conflict when the locked row no longer matches what the
/// caller checked the lifecycle rules against.
pub fn ensure_unchanged(id: i32, expected: AssetState, locked: AssetState) -> AppResult<()> {
    if expected == locked {
        return Ok(());
    }
    tracing::warn!(
        "Asset {} changed concurrently: expected {:?}, found {:?}",
        id,
        expected,
        locked
    );
    Err(AppError::Conflict(format!(
        "Asset {} was modified by another request (now {}); reload and retry",
        id, locked.status
    )))
}

/// Lock the asset row for the rest of the transaction and read its state
async fn lock_state(tx: &mut Transaction<'_, Postgres>, id: i32) -> AppResult<AssetState> {
    let status: String = sqlx::query_scalar("SELECT status FROM assets WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Asset with id {} not found", id)))?;

    let has_open_assignment: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM asset_assignments WHERE asset_id = $1 AND returned_at IS NULL)",
    )
    .bind(id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(AssetState {
        status: status.parse()?,
        has_open_assignment,
    })
}

/// Map a unique-index violation to a conflict with `message`
fn conflict_on_unique(e: sqlx::Error, message: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(e),
    }
}

#[derive(Clone)]
pub struct AssetsRepository {
    pool: Pool<Postgres>,
}

impl AssetsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Search assets with filters and pagination
    pub async fn list(&self, query: &AssetQuery, pagination: Pagination) -> AppResult<(Vec<Asset>, i64)> {

        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(status) = query.status {
            params.push(status.as_str().to_string());
            conditions.push(format!("status = ${}", params.len()));
        }

        if let Some(asset_type) = query.asset_type {
            params.push(asset_type.as_str().to_string());
            conditions.push(format!("asset_type = ${}", params.len()));
        }

        if let Some(is_active) = query.is_active {
            params.push(is_active.to_string());
            conditions.push(format!("is_active = ${}::boolean", params.len()));
        }

        if let Some(ref search) = query.search {
            params.push(format!("%{}%", search.to_lowercase()));
            let n = params.len();
            conditions.push(format!(
                "(LOWER(asset_tag) LIKE ${n} OR LOWER(COALESCE(serial_number, '')) LIKE ${n} OR LOWER(COALESCE(model, '')) LIKE ${n})"
            ));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM assets {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT * FROM assets {} ORDER BY asset_tag LIMIT {} OFFSET {}",
            where_clause, pagination.per_page, pagination.offset
        );
        let mut select_builder = sqlx::query_as::<_, Asset>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let assets = select_builder.fetch_all(&self.pool).await?;

        Ok((assets, total))
    }

    /// Get asset by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Asset> {
        sqlx::query_as::<_, Asset>("SELECT * FROM assets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Asset with id {} not found", id)))
    }

    /// Create an asset in stock
    pub async fn create(&self, data: &CreateAsset) -> AppResult<Asset> {
        sqlx::query_as::<_, Asset>(
            r#"
            INSERT INTO assets (
                asset_tag, asset_type, status, serial_number, model,
                purchase_date, warranty_end_date, contract_end_date, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&data.asset_tag)
        .bind(data.asset_type.as_str())
        .bind(AssetStatus::InStock.as_str())
        .bind(&data.serial_number)
        .bind(&data.model)
        .bind(data.purchase_date)
        .bind(data.warranty_end_date)
        .bind(data.contract_end_date)
        .bind(&data.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, &format!("Asset tag {} already exists", data.asset_tag)))
    }

    /// Update asset fields. A status change carries the state it was
    /// validated against, which must still hold under the row lock. When
    /// `close_assignment` is set, the open assignment (if any) is closed in
    /// the same transaction.
    pub async fn update(
        &self,
        id: i32,
        data: &UpdateAsset,
        validated: Option<AssetState>,
        close_assignment: bool,
    ) -> AppResult<Asset> {
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

        add_field!(data.asset_tag, "asset_tag");
        add_field!(data.asset_type, "asset_type");
        add_field!(data.status, "status");
        add_field!(data.is_active, "is_active");
        add_field!(data.serial_number, "serial_number");
        add_field!(data.model, "model");
        add_field!(data.purchase_date, "purchase_date");
        add_field!(data.warranty_end_date, "warranty_end_date");
        add_field!(data.contract_end_date, "contract_end_date");
        add_field!(data.notes, "notes");

        let query = format!(
            "UPDATE assets SET {} WHERE id = ${} RETURNING *",
            sets.join(", "),
            idx
        );

        let mut builder = sqlx::query_as::<_, Asset>(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.asset_tag);
        if let Some(asset_type) = data.asset_type {
            builder = builder.bind(asset_type.as_str());
        }
        if let Some(status) = data.status {
            builder = builder.bind(status.as_str());
        }
        bind_field!(data.is_active);
        bind_field!(data.serial_number);
        bind_field!(data.model);
        bind_field!(data.purchase_date);
        bind_field!(data.warranty_end_date);
        bind_field!(data.contract_end_date);
        bind_field!(data.notes);
        builder = builder.bind(id);

        let mut tx = self.pool.begin().await?;

        if let Some(expected) = validated {
            let locked = lock_state(&mut tx, id).await?;
            ensure_unchanged(id, expected, locked)?;
        }

        let asset = builder
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| conflict_on_unique(e, "Asset tag already exists"))?
            .ok_or_else(|| AppError::NotFound(format!("Asset with id {} not found", id)))?;

        if close_assignment {
            sqlx::query(
                "UPDATE asset_assignments SET returned_at = $1 WHERE asset_id = $2 AND returned_at IS NULL",
            )
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(asset)
    }

    /// Get the unreturned assignment of an asset
    pub async fn get_open_assignment(&self, asset_id: i32) -> AppResult<Option<AssetAssignment>> {
        let assignment = sqlx::query_as::<_, AssetAssignment>(
            "SELECT * FROM asset_assignments WHERE asset_id = $1 AND returned_at IS NULL",
        )
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(assignment)
    }

    /// Assignment history of an asset, most recent first
    pub async fn list_assignments(&self, asset_id: i32) -> AppResult<Vec<AssetAssignment>> {
        let rows = sqlx::query_as::<_, AssetAssignment>(
            "SELECT * FROM asset_assignments WHERE asset_id = $1 ORDER BY assigned_at DESC, id DESC",
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Open an assignment and move the asset to `new_status`, provided the
    /// asset is still in the `validated` state
    pub async fn assign(
        &self,
        data: &CreateAssignment,
        assigned_by: i32,
        validated: AssetState,
        new_status: AssetStatus,
    ) -> AppResult<AssetAssignment> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let locked = lock_state(&mut tx, data.asset_id).await?;
        ensure_unchanged(data.asset_id, validated, locked)?;

        let assignment = sqlx::query_as::<_, AssetAssignment>(
            r#"
            INSERT INTO asset_assignments (asset_id, employee_id, assigned_by, assigned_at, expected_return_date, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(data.asset_id)
        .bind(data.employee_id)
        .bind(assigned_by)
        .bind(now)
        .bind(data.expected_return_date)
        .bind(&data.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "Asset already has an open assignment"))?;

        sqlx::query("UPDATE assets SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(new_status.as_str())
            .bind(now)
            .bind(data.asset_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(assignment)
    }

    /// Close the open assignment and move the asset to `new_status`,
    /// provided the asset is still in the `validated` state
    pub async fn return_asset(
        &self,
        asset_id: i32,
        return_notes: Option<&str>,
        validated: AssetState,
        new_status: AssetStatus,
    ) -> AppResult<AssetAssignment> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let locked = lock_state(&mut tx, asset_id).await?;
        ensure_unchanged(asset_id, validated, locked)?;

        let assignment = sqlx::query_as::<_, AssetAssignment>(
            r#"
            UPDATE asset_assignments
            SET returned_at = $1, return_notes = $2
            WHERE asset_id = $3 AND returned_at IS NULL
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(return_notes)
        .bind(asset_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::BusinessRule("Asset has no open assignment".to_string()))?;

        sqlx::query("UPDATE assets SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(new_status.as_str())
            .bind(now)
            .bind(asset_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(assignment)
    }
}
