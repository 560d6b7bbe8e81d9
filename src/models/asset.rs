//! Asset and assignment models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::enums::{AssetStatus, AssetType};
use crate::{
    error::AppError,
    rules::{asset_lifecycle, AssetActions},
};

impl TryFrom<String> for AssetStatus {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<String> for AssetType {
    fn from(value: String) -> Self {
        AssetType::from(value.as_str())
    }
}

/// Asset record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Asset {
    pub id: i32,
    /// Inventory tag printed on the device
    pub asset_tag: String,
    #[sqlx(try_from = "String")]
    pub asset_type: AssetType,
    #[sqlx(try_from = "String")]
    pub status: AssetStatus,
    pub is_active: bool,
    pub serial_number: Option<String>,
    pub model: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_end_date: Option<NaiveDate>,
    pub contract_end_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Link between an asset and the employee holding it
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AssetAssignment {
    pub id: i32,
    pub asset_id: i32,
    pub employee_id: i32,
    /// User who performed the assignment
    pub assigned_by: Option<i32>,
    pub assigned_at: DateTime<Utc>,
    pub expected_return_date: Option<NaiveDate>,
    /// Set when the asset comes back; NULL means the assignment is open
    pub returned_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub return_notes: Option<String>,
}

impl AssetAssignment {
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }
}

/// Asset with its open assignment and what can be done with it next
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssetDetails {
    #[serde(flatten)]
    pub asset: Asset,
    pub current_assignment: Option<AssetAssignment>,
    pub allowed_transitions: Vec<AssetStatus>,
    pub actions: AssetActions,
}

impl AssetDetails {
    pub fn new(asset: Asset, current_assignment: Option<AssetAssignment>) -> Self {
        let has_open = current_assignment.as_ref().map(|a| a.is_open()).unwrap_or(false);
        Self {
            allowed_transitions: asset_lifecycle::get_allowed_transitions(asset.status),
            actions: AssetActions::for_state(asset.status, has_open),
            asset,
            current_assignment,
        }
    }
}

/// Allowed next steps for an asset
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssetTransitions {
    pub asset_id: i32,
    pub status: AssetStatus,
    pub allowed_transitions: Vec<AssetStatus>,
    pub actions: AssetActions,
}

/// Create asset request (new assets start In-Stock)
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateAsset {
    #[validate(length(min = 1, max = 64, message = "Asset tag must be 1-64 characters"))]
    pub asset_tag: String,
    pub asset_type: AssetType,
    pub serial_number: Option<String>,
    pub model: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_end_date: Option<NaiveDate>,
    pub contract_end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Update asset request
#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateAsset {
    #[validate(length(min = 1, max = 64, message = "Asset tag must be 1-64 characters"))]
    pub asset_tag: Option<String>,
    pub asset_type: Option<AssetType>,
    /// Target status; must be reachable from the current one
    pub status: Option<AssetStatus>,
    pub is_active: Option<bool>,
    pub serial_number: Option<String>,
    pub model: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_end_date: Option<NaiveDate>,
    pub contract_end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Assign an asset to an employee
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateAssignment {
    pub asset_id: i32,
    #[validate(range(min = 1, message = "Invalid employee id"))]
    pub employee_id: i32,
    pub expected_return_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Return request body
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ReturnAsset {
    pub notes: Option<String>,
}

/// Asset list filters
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AssetQuery {
    pub status: Option<AssetStatus>,
    pub asset_type: Option<AssetType>,
    pub is_active: Option<bool>,
    /// Substring match on tag, serial number or model
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl AssetQuery {
    /// Stable key for request deduplication
    pub fn cache_key(&self) -> String {
        format!(
            "assets?status={}&type={}&active={}&search={}&page={}&per_page={}",
            self.status.map(|s| s.as_str()).unwrap_or(""),
            self.asset_type.map(|t| t.as_str()).unwrap_or(""),
            self.is_active.map(|b| b.to_string()).unwrap_or_default(),
            self.search.as_deref().unwrap_or(""),
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(20),
        )
    }
}

/// Paginated asset list
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssetPage {
    pub items: Vec<Asset>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}
