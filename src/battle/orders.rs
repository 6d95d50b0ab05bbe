//! Plan output handed to the host executor
//!
//! A `TacticalPlan` is regenerated wholesale every planning cycle; the host
//! consumes each `Action` once and translates it into its own movement and
//! stance primitives.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::battle::units::{Arrangement, UnitClass};
use crate::core::types::{GroupId, SimTime};

/// Side-wide intent for one planning cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Strategy {
    Aggressive,
    Defensive,
    Flanking,
    Skirmish,
    Retreat,
    #[default]
    Balanced,
}

/// Job given to one group under a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Assault,
    HoldPosition,
    HoldCenter,
    ScreenAdvance,
    FireSupport,
    FireAtWill,
    FireFromElevation,
    Flank,
    Charge,
    HarassAndRetreat,
    CoveringFire,
    ProtectFlank,
    RearGuard,
    Reserve,
    DelayingAction,
}

/// What the executor should make the group do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    Hold,
    Advance,
    Charge,
    Retreat,
    FireAt,
    Flank,
    Harass,
    Guard,
}

impl ActionType {
    /// Moves the group toward the enemy
    pub fn is_offensive_move(&self) -> bool {
        matches!(self, ActionType::Advance | ActionType::Charge)
    }
}

/// Highest priority
pub const PRIORITY_CRITICAL: u8 = 1;
/// Lowest priority
pub const PRIORITY_FALLBACK: u8 = 5;

/// One order for one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub group_id: GroupId,
    pub class: UnitClass,
    pub action_type: ActionType,
    pub target: Vec2,
    pub arrangement: Arrangement,
    /// 1 = highest .. 5 = lowest
    pub priority: u8,
}

impl Action {
    pub fn new(
        group_id: GroupId,
        class: UnitClass,
        action_type: ActionType,
        target: Vec2,
        priority: u8,
    ) -> Self {
        Self {
            group_id,
            class,
            action_type,
            target,
            arrangement: Arrangement::default(),
            priority: priority.clamp(PRIORITY_CRITICAL, PRIORITY_FALLBACK),
        }
    }

    pub fn with_arrangement(mut self, arrangement: Arrangement) -> Self {
        self.arrangement = arrangement;
        self
    }
}

/// Role given to one group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub group_id: GroupId,
    pub class: UnitClass,
    pub role: Role,
}

/// Strategy, roles and orders for one side for one planning cycle
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TacticalPlan {
    pub strategy: Strategy,
    pub roles: Vec<RoleAssignment>,
    pub actions: Vec<Action>,
    pub created_at: SimTime,
}

impl TacticalPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn action_for(&self, group_id: GroupId) -> Option<&Action> {
        self.actions.iter().find(|a| a.group_id == group_id)
    }

    pub fn role_of(&self, group_id: GroupId) -> Option<Role> {
        self.roles
            .iter()
            .find(|r| r.group_id == group_id)
            .map(|r| r.role)
    }

    /// Actions ordered for execution, most urgent first
    pub fn by_priority(&self) -> Vec<&Action> {
        let mut actions: Vec<&Action> = self.actions.iter().collect();
        actions.sort_by_key(|a| a.priority);
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_clamped() {
        let action = Action::new(GroupId::new(), UnitClass::Ranged, ActionType::FireAt, Vec2::ZERO, 9);
        assert_eq!(action.priority, PRIORITY_FALLBACK);
        let action = Action::new(GroupId::new(), UnitClass::Ranged, ActionType::FireAt, Vec2::ZERO, 0);
        assert_eq!(action.priority, PRIORITY_CRITICAL);
    }

    #[test]
    fn test_by_priority_orders_actions() {
        let low = Action::new(GroupId::new(), UnitClass::Ranged, ActionType::Hold, Vec2::ZERO, 4);
        let high = Action::new(GroupId::new(), UnitClass::MeleeInfantry, ActionType::Advance, Vec2::ZERO, 1);
        let plan = TacticalPlan {
            actions: vec![low.clone(), high.clone()],
            ..Default::default()
        };
        let ordered = plan.by_priority();
        assert_eq!(ordered[0], &high);
        assert_eq!(plan.action_for(low.group_id), Some(&low));
    }

    #[test]
    fn test_offensive_moves() {
        assert!(ActionType::Advance.is_offensive_move());
        assert!(ActionType::Charge.is_offensive_move());
        assert!(!ActionType::FireAt.is_offensive_move());
    }
}
