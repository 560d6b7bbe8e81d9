//! Business rules shared by the services and the API

pub mod asset_lifecycle;
pub mod ticket_sla;

pub use asset_lifecycle::{AssetAction, AssetActions};
pub use ticket_sla::{PendingFlags, SlaSnapshot};
