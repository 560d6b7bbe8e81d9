//! Asset lifecycle rules
//!
//! A single table of named edges drives both the status-selection graph and
//! the action guards (assign, return, maintenance, ...). Nothing in here
//! touches storage; the asset service calls these to enforce changes and the
//! API exposes them so clients can enable or disable actions.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::enums::AssetStatus,
};

/// Named operation that moves an asset along an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetAction {
    Assign,
    Return,
    PutInMaintenance,
    MakeAvailable,
    Decommission,
    Retire,
}

impl AssetAction {
    /// Precondition the action satisfies by itself
    pub fn establishes(self) -> Option<Precondition> {
        match self {
            AssetAction::Assign => Some(Precondition::OpenAssignment),
            _ => None,
        }
    }
}

/// Extra condition an edge needs besides the current status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// The asset must have an unreturned assignment
    OpenAssignment,
}

/// One edge of the lifecycle graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: AssetStatus,
    pub to: AssetStatus,
    /// Action that drives this edge, if any
    pub action: Option<AssetAction>,
    /// Offered as a target in the status-selection control
    pub selectable: bool,
    pub requires: Option<Precondition>,
}

const fn edge(
    from: AssetStatus,
    to: AssetStatus,
    action: Option<AssetAction>,
    selectable: bool,
    requires: Option<Precondition>,
) -> Edge {
    Edge { from, to, action, selectable, requires }
}

use AssetAction::*;
use AssetStatus::*;

use Precondition::OpenAssignment;

/// The lifecycle table. Row order is the order targets are offered in.
///
/// `In-Stock -> Assigned` is action-only: the assign action accepts stock
/// items directly, but the status control does not offer that move.
/// Every move into `Assigned` needs an open assignment; the assign action
/// creates one, a plain status change must find one.
pub const EDGES: &[Edge] = &[
    edge(InStock, Available, Some(MakeAvailable), true, None),
    edge(InStock, Maintenance, Some(PutInMaintenance), true, None),
    edge(InStock, Decommissioning, Some(Decommission), true, None),
    edge(InStock, Assigned, Some(Assign), false, Some(OpenAssignment)),
    edge(Available, Assigned, Some(Assign), true, Some(OpenAssignment)),
    edge(Available, Maintenance, Some(PutInMaintenance), true, None),
    edge(Available, Decommissioning, Some(Decommission), true, None),
    edge(Assigned, Available, Some(Return), true, Some(OpenAssignment)),
    edge(Assigned, Maintenance, Some(PutInMaintenance), true, None),
    edge(Assigned, Decommissioning, Some(Decommission), true, None),
    edge(Maintenance, Available, Some(MakeAvailable), true, None),
    edge(Maintenance, Assigned, None, true, Some(OpenAssignment)),
    edge(Maintenance, Decommissioning, Some(Decommission), true, None),
    edge(Decommissioning, Retired, Some(Retire), true, None),
];

fn precondition_met(requires: Option<Precondition>, has_open_assignment: bool) -> bool {
    match requires {
        Some(OpenAssignment) => has_open_assignment,
        None => true,
    }
}

/// Statuses a user may pick next for an asset currently in `current`.
/// Empty for `Retired`.
pub fn get_allowed_transitions(current: AssetStatus) -> Vec<AssetStatus> {
    EDGES
        .iter()
        .filter(|e| e.selectable && e.from == current)
        .map(|e| e.to)
        .collect()
}

/// Same as [`get_allowed_transitions`] for a raw status code; unknown codes
/// have no transitions.
pub fn get_allowed_transitions_for_code(code: &str) -> Vec<AssetStatus> {
    code.parse::<AssetStatus>()
        .map(get_allowed_transitions)
        .unwrap_or_default()
}

pub fn is_status_transition_allowed(from: AssetStatus, to: AssetStatus) -> bool {
    EDGES
        .iter()
        .any(|e| e.selectable && e.from == from && e.to == to)
}

/// Raw-code variant; false whenever either code is unknown.
pub fn is_status_transition_allowed_code(from: &str, to: &str) -> bool {
    match (from.parse::<AssetStatus>(), to.parse::<AssetStatus>()) {
        (Ok(from), Ok(to)) => is_status_transition_allowed(from, to),
        _ => false,
    }
}

/// Edge an action would take from `status`, ignoring preconditions
fn action_edge(action: AssetAction, status: AssetStatus) -> Option<&'static Edge> {
    EDGES
        .iter()
        .find(|e| e.action == Some(action) && e.from == status)
}

/// Whether `action` is permitted for an asset in `status`
pub fn can_perform(action: AssetAction, status: AssetStatus, has_open_assignment: bool) -> bool {
    match action_edge(action, status) {
        Some(edge) => {
            edge.requires.is_none()
                || edge.requires == action.establishes()
                || precondition_met(edge.requires, has_open_assignment)
        }
        None => false,
    }
}

/// Status the asset ends in after `action`, when the action applies
pub fn action_target(action: AssetAction, status: AssetStatus) -> Option<AssetStatus> {
    action_edge(action, status).map(|e| e.to)
}

pub fn can_assign_asset(status: AssetStatus) -> bool {
    can_perform(AssetAction::Assign, status, false)
}

/// Only an `Assigned` asset with an open assignment can be returned.
pub fn can_return_asset(status: AssetStatus, has_open_assignment: bool) -> bool {
    can_perform(AssetAction::Return, status, has_open_assignment)
}

pub fn can_put_in_maintenance(status: AssetStatus) -> bool {
    can_perform(AssetAction::PutInMaintenance, status, false)
}

pub fn can_make_available(status: AssetStatus) -> bool {
    can_perform(AssetAction::MakeAvailable, status, false)
}

pub fn can_decommission_asset(status: AssetStatus) -> bool {
    can_perform(AssetAction::Decommission, status, false)
}

/// Retirement only follows decommissioning.
pub fn can_retire_asset(status: AssetStatus) -> bool {
    can_perform(AssetAction::Retire, status, false)
}

/// Human-readable rejection for a disallowed status change
pub fn transition_error_message(from: AssetStatus, to: AssetStatus) -> String {
    let allowed = get_allowed_transitions(from);
    let list = if allowed.is_empty() {
        "none".to_string()
    } else {
        allowed
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "Cannot transition from {} to {}. Allowed transitions: {}",
        from, to, list
    )
}

/// Reject a status change that is not on the graph or whose edge
/// precondition does not hold
pub fn validate_transition(from: AssetStatus, to: AssetStatus, has_open_assignment: bool) -> AppResult<()> {
    let edge = EDGES
        .iter()
        .find(|e| e.selectable && e.from == from && e.to == to)
        .ok_or_else(|| AppError::BusinessRule(transition_error_message(from, to)))?;

    if precondition_met(edge.requires, has_open_assignment) {
        Ok(())
    } else {
        Err(AppError::BusinessRule(format!(
            "Cannot transition from {} to {} without an open assignment",
            from, to
        )))
    }
}

/// Action availability for one asset, as shown to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AssetActions {
    pub assign: bool,
    #[serde(rename = "return")]
    pub return_asset: bool,
    pub put_in_maintenance: bool,
    pub make_available: bool,
    pub decommission: bool,
    pub retire: bool,
}

impl AssetActions {
    pub fn for_state(status: AssetStatus, has_open_assignment: bool) -> Self {
        Self {
            assign: can_assign_asset(status),
            return_asset: can_return_asset(status, has_open_assignment),
            put_in_maintenance: can_put_in_maintenance(status),
            make_available: can_make_available(status),
            decommission: can_decommission_asset(status),
            retire: can_retire_asset(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected(status: AssetStatus) -> Vec<AssetStatus> {
        match status {
            InStock => vec![Available, Maintenance, Decommissioning],
            Available => vec![Assigned, Maintenance, Decommissioning],
            Assigned => vec![Available, Maintenance, Decommissioning],
            Maintenance => vec![Available, Assigned, Decommissioning],
            Decommissioning => vec![Retired],
            Retired => vec![],
        }
    }

    #[test]
    fn test_allowed_transitions_match_table() {
        for status in AssetStatus::ALL {
            assert_eq!(get_allowed_transitions(status), expected(status), "{}", status);
        }
    }

    #[test]
    fn test_transition_allowed_iff_listed() {
        for from in AssetStatus::ALL {
            let allowed = get_allowed_transitions(from);
            for to in AssetStatus::ALL {
                assert_eq!(
                    is_status_transition_allowed(from, to),
                    allowed.contains(&to),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_unknown_code_has_no_transitions() {
        assert!(get_allowed_transitions_for_code("Lost").is_empty());
        assert!(get_allowed_transitions_for_code("").is_empty());
        assert_eq!(
            get_allowed_transitions_for_code("In-Stock"),
            vec![Available, Maintenance, Decommissioning]
        );
        assert!(!is_status_transition_allowed_code("Lost", "Available"));
        assert!(is_status_transition_allowed_code("Decommissioning", "Retired"));
    }

    #[test]
    fn test_retired_is_terminal() {
        assert!(!is_status_transition_allowed(Retired, Available));
        assert!(is_status_transition_allowed(Decommissioning, Retired));
        for from in AssetStatus::ALL {
            if from != Decommissioning {
                assert!(!is_status_transition_allowed(from, Retired), "{}", from);
            }
        }
    }

    #[test]
    fn test_can_retire_only_when_decommissioning() {
        for status in AssetStatus::ALL {
            assert_eq!(can_retire_asset(status), status == Decommissioning, "{}", status);
        }
    }

    #[test]
    fn test_can_assign_literal_allow_list() {
        for status in AssetStatus::ALL {
            assert_eq!(
                can_assign_asset(status),
                matches!(status, Available | InStock),
                "{}",
                status
            );
        }
        // Stock items are assignable even though the status control
        // does not offer In-Stock -> Assigned
        assert!(can_assign_asset(InStock));
        assert!(!is_status_transition_allowed(InStock, Assigned));
        assert_eq!(action_target(AssetAction::Assign, InStock), Some(Assigned));
    }

    #[test]
    fn test_can_return_requires_open_assignment() {
        assert!(can_return_asset(Assigned, true));
        assert!(!can_return_asset(Assigned, false));
        for status in AssetStatus::ALL {
            if status != Assigned {
                assert!(!can_return_asset(status, true), "{}", status);
            }
        }
        assert_eq!(action_target(AssetAction::Return, Assigned), Some(Available));
    }

    #[test]
    fn test_remaining_guards() {
        for status in AssetStatus::ALL {
            assert_eq!(
                can_put_in_maintenance(status),
                matches!(status, InStock | Available | Assigned),
                "maintenance {}",
                status
            );
            assert_eq!(
                can_make_available(status),
                matches!(status, InStock | Maintenance),
                "available {}",
                status
            );
            assert_eq!(
                can_decommission_asset(status),
                matches!(status, InStock | Available | Assigned | Maintenance),
                "decommission {}",
                status
            );
        }
    }

    #[test]
    fn test_action_edges_are_unique_per_status() {
        for (i, a) in EDGES.iter().enumerate() {
            for b in &EDGES[i + 1..] {
                assert!(!(a.from == b.from && a.to == b.to), "duplicate edge {:?}", a);
                if a.action.is_some() {
                    assert!(
                        !(a.from == b.from && a.action == b.action),
                        "ambiguous action {:?}",
                        a
                    );
                }
            }
        }
    }

    #[test]
    fn test_transition_error_message() {
        assert_eq!(
            transition_error_message(InStock, Retired),
            "Cannot transition from In-Stock to Retired. Allowed transitions: Available, Maintenance, Decommissioning"
        );
        assert_eq!(
            transition_error_message(Retired, Available),
            "Cannot transition from Retired to Available. Allowed transitions: none"
        );
        assert!(validate_transition(Decommissioning, Retired, false).is_ok());
        assert!(matches!(
            validate_transition(Retired, Available, true),
            Err(AppError::BusinessRule(_))
        ));
    }

    #[test]
    fn test_moves_into_assigned_need_open_assignment() {
        for from in [Available, Maintenance] {
            match validate_transition(from, Assigned, false) {
                Err(AppError::BusinessRule(msg)) => assert_eq!(
                    msg,
                    format!("Cannot transition from {} to Assigned without an open assignment", from)
                ),
                other => panic!("unexpected: {:?}", other),
            }
            assert!(validate_transition(from, Assigned, true).is_ok());
        }
        // Every edge into Assigned carries the precondition
        for e in EDGES.iter().filter(|e| e.to == Assigned) {
            assert_eq!(e.requires, Some(OpenAssignment), "{:?}", e);
        }
    }

    #[test]
    fn test_assign_action_establishes_its_precondition() {
        assert_eq!(AssetAction::Assign.establishes(), Some(OpenAssignment));
        assert_eq!(AssetAction::Return.establishes(), None);
        assert!(can_perform(AssetAction::Assign, Available, false));
        assert!(can_perform(AssetAction::Assign, InStock, false));
        // Return needs the assignment to already exist
        assert!(!can_perform(AssetAction::Return, Assigned, false));
    }

    #[test]
    fn test_asset_actions_for_state() {
        let actions = AssetActions::for_state(Assigned, false);
        assert!(!actions.return_asset);
        assert!(actions.put_in_maintenance);
        assert!(actions.decommission);
        assert!(!actions.assign);

        let actions = AssetActions::for_state(Decommissioning, false);
        assert_eq!(
            actions,
            AssetActions {
                assign: false,
                return_asset: false,
                put_in_maintenance: false,
                make_available: false,
                decommission: false,
                retire: true,
            }
        );
    }
}
