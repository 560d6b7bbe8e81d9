//! Asset and assignment endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::asset::{
        Asset, AssetAssignment, AssetDetails, AssetPage, AssetQuery, AssetTransitions,
        CreateAsset, CreateAssignment, ReturnAsset, UpdateAsset,
    },
};

use super::AuthenticatedUser;

/// List assets with filters and pagination
#[utoipa::path(
    get,
    path = "/assets",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(
        ("status" = Option<String>, Query, description = "Filter by status (In-Stock, Available, ...)"),
        ("asset_type" = Option<String>, Query, description = "Filter by asset type"),
        ("is_active" = Option<bool>, Query, description = "Filter by active flag"),
        ("search" = Option<String>, Query, description = "Search tag, serial number or model"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (default: 20)")
    ),
    responses(
        (status = 200, description = "List of assets", body = AssetPage),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_assets(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<AssetQuery>,
) -> AppResult<Json<AssetPage>> {
    let page = state.services.assets.list(&query).await?;
    Ok(Json(page))
}

/// Get asset details with current assignment and available actions
#[utoipa::path(
    get,
    path = "/assets/{id}",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset details", body = AssetDetails),
        (status = 404, description = "Asset not found")
    )
)]
pub async fn get_asset(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<AssetDetails>> {
    let details = state.services.assets.get_details(id).await?;
    Ok(Json(details))
}

/// Create an asset (starts In-Stock)
#[utoipa::path(
    post,
    path = "/assets",
    tag = "assets",
    security(("bearer_auth" = [])),
    request_body = CreateAsset,
    responses(
        (status = 201, description = "Asset created", body = Asset),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Asset tag already exists")
    )
)]
pub async fn create_asset(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateAsset>,
) -> AppResult<(StatusCode, Json<Asset>)> {
    claims.require_write_assets()?;
    data.validate()?;
    let asset = state.services.assets.create(&data).await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

/// Update an asset; status changes must follow the lifecycle graph
#[utoipa::path(
    put,
    path = "/assets/{id}",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Asset ID")),
    request_body = UpdateAsset,
    responses(
        (status = 200, description = "Asset updated", body = AssetDetails),
        (status = 404, description = "Asset not found"),
        (status = 422, description = "Status transition not allowed")
    )
)]
pub async fn update_asset(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateAsset>,
) -> AppResult<Json<AssetDetails>> {
    claims.require_write_assets()?;
    data.validate()?;
    let details = state.services.assets.update(id, &data).await?;
    Ok(Json(details))
}

/// Allowed status transitions and action availability
#[utoipa::path(
    get,
    path = "/assets/{id}/transitions",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Allowed transitions", body = AssetTransitions),
        (status = 404, description = "Asset not found")
    )
)]
pub async fn get_transitions(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<AssetTransitions>> {
    let transitions = state.services.assets.transitions(id).await?;
    Ok(Json(transitions))
}

/// Assign an asset to an employee
#[utoipa::path(
    post,
    path = "/assets/assignments",
    tag = "assets",
    security(("bearer_auth" = [])),
    request_body = CreateAssignment,
    responses(
        (status = 201, description = "Asset assigned", body = AssetAssignment),
        (status = 404, description = "Asset not found"),
        (status = 409, description = "Asset already assigned"),
        (status = 422, description = "Asset cannot be assigned in its current status")
    )
)]
pub async fn create_assignment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateAssignment>,
) -> AppResult<(StatusCode, Json<AssetAssignment>)> {
    claims.require_write_assets()?;
    data.validate()?;
    let assignment = state.services.assets.assign(&data, claims.user_id).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// Return an assigned asset
#[utoipa::path(
    post,
    path = "/assets/{id}/return",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Asset ID")),
    request_body(content = ReturnAsset, description = "Optional return notes"),
    responses(
        (status = 200, description = "Asset returned", body = AssetAssignment),
        (status = 404, description = "Asset not found"),
        (status = 422, description = "Asset is not assigned")
    )
)]
pub async fn return_asset(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<ReturnAsset>>,
) -> AppResult<Json<AssetAssignment>> {
    claims.require_write_assets()?;
    let notes = body.and_then(|Json(b)| b.notes);
    let assignment = state.services.assets.return_asset(id, notes.as_deref()).await?;
    Ok(Json(assignment))
}

/// Assignment history of an asset
#[utoipa::path(
    get,
    path = "/assets/{id}/assignments",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Assignments, most recent first", body = Vec<AssetAssignment>),
        (status = 404, description = "Asset not found")
    )
)]
pub async fn list_assignments(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<AssetAssignment>>> {
    let assignments = state.services.assets.assignments(id).await?;
    Ok(Json(assignments))
}
