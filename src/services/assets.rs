//! Asset management service
//!
//! Every status change goes through the lifecycle rules before it reaches
//! the database, so clients cannot bypass the graph.

use std::{sync::Arc, time::Duration};

use crate::{
    cache::RequestCache,
    error::{AppError, AppResult},
    models::{
        asset::{
            Asset, AssetAssignment, AssetDetails, AssetPage, AssetQuery, AssetTransitions,
            CreateAsset, CreateAssignment, UpdateAsset,
        },
        enums::AssetStatus,
        Pagination,
    },
    repository::{assets::AssetState, Repository},
    rules::asset_lifecycle::{self, AssetAction, AssetActions},
};

const LIST_KEY_PREFIX: &str = "assets?";

/// Decide whether a manual status change is allowed and whether it closes
/// the open assignment. Returns `true` when the assignment must be closed.
///
/// Edge preconditions come from the lifecycle table. Leaving the holder's
/// hands for anything other than maintenance ends the assignment.
pub fn plan_status_change(from: AssetStatus, to: AssetStatus, has_open_assignment: bool) -> AppResult<bool> {
    if from == to {
        return Ok(false);
    }
    asset_lifecycle::validate_transition(from, to, has_open_assignment)?;
    Ok(has_open_assignment && !matches!(to, AssetStatus::Assigned | AssetStatus::Maintenance))
}

/// Status an asset moves to when assigned. A status that does not allow
/// assignment is a rule violation; an existing holder is a conflict.
pub fn plan_assignment(asset_tag: &str, state: AssetState) -> AppResult<AssetStatus> {
    if !asset_lifecycle::can_assign_asset(state.status) {
        return Err(AppError::BusinessRule(format!(
            "Asset {} cannot be assigned while {}",
            asset_tag, state.status
        )));
    }
    if state.has_open_assignment {
        return Err(AppError::Conflict(format!(
            "Asset {} already has an open assignment",
            asset_tag
        )));
    }
    asset_lifecycle::action_target(AssetAction::Assign, state.status)
        .ok_or_else(|| AppError::Internal("Assign edge missing from lifecycle table".to_string()))
}

/// Status an asset moves to when returned
pub fn plan_return(asset_tag: &str, state: AssetState) -> AppResult<AssetStatus> {
    if !asset_lifecycle::can_return_asset(state.status, state.has_open_assignment) {
        return Err(AppError::BusinessRule(format!(
            "Asset {} cannot be returned while {}{}",
            asset_tag,
            state.status,
            if state.has_open_assignment { "" } else { " without an open assignment" }
        )));
    }
    asset_lifecycle::action_target(AssetAction::Return, state.status)
        .ok_or_else(|| AppError::Internal("Return edge missing from lifecycle table".to_string()))
}

#[derive(Clone)]
pub struct AssetsService {
    repository: Repository,
    list_cache: Arc<RequestCache<AssetPage>>,
}

impl AssetsService {
    pub fn new(repository: Repository, cache_max_age: Duration) -> Self {
        Self {
            repository,
            list_cache: Arc::new(RequestCache::new(cache_max_age)),
        }
    }

    /// List assets; identical concurrent queries share one database round trip
    pub async fn list(&self, query: &AssetQuery) -> AppResult<AssetPage> {
        let pagination = Pagination::new(query.page, query.per_page)?;
        let key = query.cache_key();
        self.list_cache
            .get_or_fetch(&key, || async {
                let (items, total) = self.repository.assets.list(query, pagination).await?;
                Ok::<_, AppError>(AssetPage {
                    items,
                    total,
                    page: pagination.page,
                    per_page: pagination.per_page,
                })
            })
            .await
    }

    pub async fn get_details(&self, id: i32) -> AppResult<AssetDetails> {
        let asset = self.repository.assets.get_by_id(id).await?;
        let assignment = self.repository.assets.get_open_assignment(id).await?;
        Ok(AssetDetails::new(asset, assignment))
    }

    pub async fn transitions(&self, id: i32) -> AppResult<AssetTransitions> {
        let asset = self.repository.assets.get_by_id(id).await?;
        let has_open = self.repository.assets.get_open_assignment(id).await?.is_some();
        Ok(AssetTransitions {
            asset_id: asset.id,
            status: asset.status,
            allowed_transitions: asset_lifecycle::get_allowed_transitions(asset.status),
            actions: AssetActions::for_state(asset.status, has_open),
        })
    }

    pub async fn create(&self, data: &CreateAsset) -> AppResult<Asset> {
        let asset = self.repository.assets.create(data).await?;
        tracing::info!("Created asset {} ({})", asset.asset_tag, asset.id);
        self.list_cache.invalidate_prefix(LIST_KEY_PREFIX).await;
        Ok(asset)
    }

    /// Update an asset, enforcing the status graph
    pub async fn update(&self, id: i32, data: &UpdateAsset) -> AppResult<AssetDetails> {
        let current = self.repository.assets.get_by_id(id).await?;
        let open = self.repository.assets.get_open_assignment(id).await?;

        let state = AssetState {
            status: current.status,
            has_open_assignment: open.is_some(),
        };

        let (validated, close_assignment) = match data.status {
            Some(to) => {
                let close = plan_status_change(current.status, to, state.has_open_assignment).map_err(|e| {
                    tracing::warn!("Rejected status change on asset {}: {}", id, e);
                    e
                })?;
                if to != current.status {
                    tracing::info!("Asset {} status {} -> {}", id, current.status, to);
                }
                (Some(state), close)
            }
            None => (None, false),
        };

        let asset = self
            .repository
            .assets
            .update(id, data, validated, close_assignment)
            .await?;
        self.list_cache.invalidate_prefix(LIST_KEY_PREFIX).await;

        let assignment = if close_assignment { None } else { open };
        Ok(AssetDetails::new(asset, assignment))
    }

    /// Assign an asset to an employee
    pub async fn assign(&self, data: &CreateAssignment, assigned_by: i32) -> AppResult<AssetAssignment> {
        let asset = self.repository.assets.get_by_id(data.asset_id).await?;
        let state = AssetState {
            status: asset.status,
            has_open_assignment: self.repository.assets.get_open_assignment(asset.id).await?.is_some(),
        };

        let target = plan_assignment(&asset.asset_tag, state)?;
        let assignment = self
            .repository
            .assets
            .assign(data, assigned_by, state, target)
            .await?;
        tracing::info!(
            "Assigned asset {} to employee {} (assignment {})",
            asset.asset_tag,
            data.employee_id,
            assignment.id
        );
        self.list_cache.invalidate_prefix(LIST_KEY_PREFIX).await;
        Ok(assignment)
    }

    /// Return an assigned asset
    pub async fn return_asset(&self, asset_id: i32, notes: Option<&str>) -> AppResult<AssetAssignment> {
        let asset = self.repository.assets.get_by_id(asset_id).await?;
        let state = AssetState {
            status: asset.status,
            has_open_assignment: self.repository.assets.get_open_assignment(asset_id).await?.is_some(),
        };

        let target = plan_return(&asset.asset_tag, state)?;
        let assignment = self
            .repository
            .assets
            .return_asset(asset_id, notes, state, target)
            .await?;
        tracing::info!("Asset {} returned by employee {}", asset.asset_tag, assignment.employee_id);
        self.list_cache.invalidate_prefix(LIST_KEY_PREFIX).await;
        Ok(assignment)
    }

    pub async fn assignments(&self, asset_id: i32) -> AppResult<Vec<AssetAssignment>> {
        // 404 for unknown assets rather than an empty history
        self.repository.assets.get_by_id(asset_id).await?;
        self.repository.assets.list_assignments(asset_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AssetStatus::*;

    #[test]
    fn test_same_status_is_noop() {
        assert_eq!(plan_status_change(Retired, Retired, false).unwrap(), false);
    }

    #[test]
    fn test_off_graph_change_rejected_with_message() {
        match plan_status_change(InStock, Retired, false) {
            Err(AppError::BusinessRule(msg)) => assert_eq!(
                msg,
                "Cannot transition from In-Stock to Retired. Allowed transitions: Available, Maintenance, Decommissioning"
            ),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_assigned_requires_open_assignment() {
        assert!(matches!(
            plan_status_change(Available, Assigned, false),
            Err(AppError::BusinessRule(_))
        ));
        assert!(matches!(
            plan_status_change(Maintenance, Assigned, false),
            Err(AppError::BusinessRule(_))
        ));
        assert_eq!(plan_status_change(Maintenance, Assigned, true).unwrap(), false);
    }

    fn state(status: AssetStatus, has_open_assignment: bool) -> AssetState {
        AssetState { status, has_open_assignment }
    }

    #[test]
    fn test_plan_assignment_targets_assigned() {
        assert_eq!(plan_assignment("LT-1", state(Available, false)).unwrap(), Assigned);
        assert_eq!(plan_assignment("LT-1", state(InStock, false)).unwrap(), Assigned);
    }

    #[test]
    fn test_plan_assignment_rejects_unassignable_status() {
        for status in [Assigned, Maintenance, Decommissioning, Retired] {
            match plan_assignment("LT-1", state(status, false)) {
                Err(AppError::BusinessRule(msg)) => {
                    assert_eq!(msg, format!("Asset LT-1 cannot be assigned while {}", status))
                }
                other => panic!("{}: unexpected {:?}", status, other),
            }
        }
    }

    #[test]
    fn test_plan_assignment_existing_holder_is_conflict() {
        assert!(matches!(
            plan_assignment("LT-1", state(Available, true)),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_plan_return() {
        assert_eq!(plan_return("LT-1", state(Assigned, true)).unwrap(), Available);
        match plan_return("LT-1", state(Assigned, false)) {
            Err(AppError::BusinessRule(msg)) => assert_eq!(
                msg,
                "Asset LT-1 cannot be returned while Assigned without an open assignment"
            ),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            plan_return("LT-1", state(Available, false)),
            Err(AppError::BusinessRule(_))
        ));
    }

    #[test]
    fn test_assignment_closed_when_leaving_holder() {
        assert_eq!(plan_status_change(Assigned, Available, true).unwrap(), true);
        assert_eq!(plan_status_change(Assigned, Decommissioning, true).unwrap(), true);
        assert_eq!(plan_status_change(Assigned, Maintenance, true).unwrap(), false);
        assert_eq!(plan_status_change(Maintenance, Available, true).unwrap(), true);
        assert_eq!(plan_status_change(Available, Maintenance, false).unwrap(), false);
    }
}
