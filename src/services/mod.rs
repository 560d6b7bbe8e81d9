//! Business logic services

pub mod assets;
pub mod tickets;

use std::time::Duration;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub assets: assets::AssetsService,
    pub tickets: tickets::TicketsService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let cache_max_age = Duration::from_secs(config.cache.max_age_secs);
        Self {
            assets: assets::AssetsService::new(repository.clone(), cache_max_age),
            tickets: tickets::TicketsService::new(
                repository.clone(),
                config.sla.pending_after_hours,
                cache_max_age,
            ),
            repository,
        }
    }
}
