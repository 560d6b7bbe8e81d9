//! OpsDesk HR and IT operations server
//!
//! REST JSON API for tracking company assets through their lifecycle,
//! assigning them to employees, and handling support tickets against
//! priority SLAs.

use std::sync::Arc;

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod rules;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
