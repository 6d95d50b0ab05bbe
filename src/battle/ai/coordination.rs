//! Combined-arms pass over a freshly generated action list

use std::collections::BTreeSet;

use crate::battle::ai::decision_context::DecisionContext;
use crate::battle::orders::{Action, ActionType, PRIORITY_CRITICAL};
use crate::battle::units::UnitClass;

/// Align ranged fire and cavalry with an infantry push
///
/// Only runs with at least two classes in the plan. Returns the number of
/// actions changed.
pub fn coordinate(actions: &mut [Action], context: &DecisionContext) -> usize {
    let classes: BTreeSet<UnitClass> = actions.iter().map(|a| a.class).collect();
    if classes.len() < 2 {
        return 0;
    }

    let mut changed = 0;

    let infantry_target = actions
        .iter()
        .find(|a| a.class == UnitClass::MeleeInfantry && a.action_type == ActionType::Advance)
        .map(|a| a.target);
    if let Some(target) = infantry_target {
        for action in actions
            .iter_mut()
            .filter(|a| a.class == UnitClass::Ranged && a.action_type == ActionType::FireAt)
        {
            action.target = target;
            action.priority = PRIORITY_CRITICAL;
            changed += 1;
        }
    }

    let infantry_engaging = actions
        .iter()
        .any(|a| a.class == UnitClass::MeleeInfantry && a.action_type.is_offensive_move());
    if infantry_engaging {
        for action in actions.iter_mut().filter(|a| {
            a.class == UnitClass::MountedMelee
                && !matches!(a.action_type, ActionType::Charge | ActionType::Flank)
        }) {
            action.action_type = ActionType::Flank;
            action.priority = PRIORITY_CRITICAL;
            if let Some(group) = context.side.group(action.group_id) {
                action.target = context.flank_position(group);
            }
            changed += 1;
        }
    }

    if changed > 0 {
        tracing::debug!("Combined arms adjusted {} actions", changed);
    }
    changed
}
