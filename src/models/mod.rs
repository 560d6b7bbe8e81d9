//! Data models for OpsDesk

pub mod asset;
pub mod enums;
pub mod pagination;
pub mod ticket;
pub mod user;

// Re-export commonly used types
pub use asset::{Asset, AssetAssignment, AssetDetails};
pub use enums::{AssetStatus, AssetType, Role, TicketStatus};
pub use pagination::Pagination;
pub use ticket::{Ticket, TicketComment, TicketDetails, TicketPriority};
pub use user::UserClaims;
