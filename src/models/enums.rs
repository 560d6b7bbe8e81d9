//! Shared domain enums (stored as their text labels)

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::AppError;

// ---------------------------------------------------------------------------
// AssetStatus
// ---------------------------------------------------------------------------

/// Asset status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum AssetStatus {
    #[serde(rename = "In-Stock")]
    InStock,
    Available,
    Assigned,
    Maintenance,
    Decommissioning,
    Retired,
}

impl AssetStatus {
    pub const ALL: [AssetStatus; 6] = [
        AssetStatus::InStock,
        AssetStatus::Available,
        AssetStatus::Assigned,
        AssetStatus::Maintenance,
        AssetStatus::Decommissioning,
        AssetStatus::Retired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::InStock => "In-Stock",
            AssetStatus::Available => "Available",
            AssetStatus::Assigned => "Assigned",
            AssetStatus::Maintenance => "Maintenance",
            AssetStatus::Decommissioning => "Decommissioning",
            AssetStatus::Retired => "Retired",
        }
    }
}

impl FromStr for AssetStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::Validation(format!("Unknown asset status: {}", s)))
    }
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AssetType
// ---------------------------------------------------------------------------

/// Hardware category of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Laptop,
    Desktop,
    Monitor,
    Phone,
    Tablet,
    Peripheral,
    Other,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Laptop => "laptop",
            AssetType::Desktop => "desktop",
            AssetType::Monitor => "monitor",
            AssetType::Phone => "phone",
            AssetType::Tablet => "tablet",
            AssetType::Peripheral => "peripheral",
            AssetType::Other => "other",
        }
    }
}

impl From<&str> for AssetType {
    fn from(s: &str) -> Self {
        match s {
            "laptop" => AssetType::Laptop,
            "desktop" => AssetType::Desktop,
            "monitor" => AssetType::Monitor,
            "phone" => AssetType::Phone,
            "tablet" => AssetType::Tablet,
            "peripheral" => AssetType::Peripheral,
            _ => AssetType::Other,
        }
    }
}

// ---------------------------------------------------------------------------
// TicketStatus
// ---------------------------------------------------------------------------

/// Support ticket status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TicketStatus {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "On Hold")]
    OnHold,
    Resolved,
    Closed,
    Cancelled,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 6] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::OnHold,
        TicketStatus::Resolved,
        TicketStatus::Closed,
        TicketStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::OnHold => "On Hold",
            TicketStatus::Resolved => "Resolved",
            TicketStatus::Closed => "Closed",
            TicketStatus::Cancelled => "Cancelled",
        }
    }

    /// Terminal statuses stop the SLA clock
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TicketStatus::Resolved | TicketStatus::Closed | TicketStatus::Cancelled
        )
    }
}

impl FromStr for TicketStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::Validation(format!("Unknown ticket status: {}", s)))
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Role carried in the access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Manager,
    Hr,
    It,
    Admin,
}

impl Role {
    /// IT staff and administrators manage assets and tickets
    pub fn is_it_staff(&self) -> bool {
        matches!(self, Role::It | Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_status_labels() {
        for status in AssetStatus::ALL {
            assert_eq!(status.as_str().parse::<AssetStatus>().unwrap(), status);
        }
        assert!("InStock".parse::<AssetStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&AssetStatus::InStock).unwrap(),
            "\"In-Stock\""
        );
    }

    #[test]
    fn test_ticket_status_terminal() {
        assert!(TicketStatus::Resolved.is_terminal());
        assert!(TicketStatus::Closed.is_terminal());
        assert!(TicketStatus::Cancelled.is_terminal());
        assert!(!TicketStatus::Open.is_terminal());
        assert!(!TicketStatus::InProgress.is_terminal());
        assert!(!TicketStatus::OnHold.is_terminal());
        assert_eq!(
            serde_json::from_str::<TicketStatus>("\"In Progress\"").unwrap(),
            TicketStatus::InProgress
        );
    }
}
