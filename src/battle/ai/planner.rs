//! Tactical planner: assessment → strategy → roles → actions
//!
//! A full plan is rebuilt at most once per re-plan interval; in between the
//! cached plan is returned unchanged.

use crate::battle::ai::assessment::{BattlefieldAssessment, CommanderStance};
use crate::battle::ai::coordination::coordinate;
use crate::battle::ai::decision_context::DecisionContext;
use crate::battle::ai::strategy::{assign_role, select_strategy};
use crate::battle::arrangement::{ArrangementContext, ArrangementSelector};
use crate::battle::orders::{Role, RoleAssignment, TacticalPlan};
use crate::battle::scheduler::IntervalGate;
use crate::battle::terrain::{FeatureKind, TerrainFeatureMap};
use crate::battle::units::Side;
use crate::core::config::PlanningConfig;
use crate::core::types::SimTime;

/// Plans for one side of one engagement
#[derive(Debug, Clone)]
pub struct TacticalPlanner {
    config: PlanningConfig,
    gate: IntervalGate,
    cached: Option<TacticalPlan>,
    last_assessment: Option<BattlefieldAssessment>,
}

impl TacticalPlanner {
    pub fn new(config: PlanningConfig) -> Self {
        let gate = IntervalGate::new(config.replan_interval);
        Self {
            config,
            gate,
            cached: None,
            last_assessment: None,
        }
    }

    /// Plan for `side` against `opposing` at simulated time `now`
    ///
    /// Returns the cached plan while the re-plan interval has not elapsed.
    /// An empty side yields an empty plan, which is not cached.
    pub fn plan(
        &mut self,
        side: &Side,
        opposing: &Side,
        terrain: &TerrainFeatureMap,
        selector: &mut ArrangementSelector,
        stance: &CommanderStance,
        now: SimTime,
    ) -> TacticalPlan {
        if let Some(plan) = &self.cached {
            if !self.gate.is_due(now) {
                return plan.clone();
            }
        }

        if side.is_empty() {
            tracing::debug!("No active groups to plan for");
            return TacticalPlan {
                created_at: now,
                ..Default::default()
            };
        }

        let assessment =
            BattlefieldAssessment::assess(side, opposing, terrain, stance, &self.config);
        let strategy = select_strategy(&assessment);
        let context = DecisionContext::new(side, opposing, terrain, &self.config);

        let mut roles = Vec::new();
        let mut actions = Vec::new();
        for group in side.active_groups() {
            if !group.position.is_finite() {
                tracing::warn!("Group {} has no usable position, holding", group.id);
                roles.push(RoleAssignment {
                    group_id: group.id,
                    class: group.class,
                    role: Role::HoldPosition,
                });
                actions.push(context.fallback_action(group));
                continue;
            }

            let role = assign_role(group.class, strategy, &assessment);
            let arrangement_context = ArrangementContext {
                aggression: assessment.aggression,
                on_high_ground: terrain.is_within(group.position, FeatureKind::HighGround),
                in_forest: terrain.is_within(group.position, FeatureKind::Forest),
                moving: group.moving,
            };
            let arrangement = selector.select(group, opposing, &arrangement_context, now);

            roles.push(RoleAssignment {
                group_id: group.id,
                class: group.class,
                role,
            });
            actions.push(context.action_for(group, role).with_arrangement(arrangement));
        }

        coordinate(&mut actions, &context);

        tracing::info!(
            "Strategy {:?} (ratio {:.2}, aggression {:.2}) with {} actions",
            strategy,
            assessment.strength_ratio,
            assessment.aggression,
            actions.len()
        );

        let plan = TacticalPlan {
            strategy,
            roles,
            actions,
            created_at: now,
        };
        self.cached = Some(plan.clone());
        self.last_assessment = Some(assessment);
        self.gate.fire(now);
        plan
    }

    pub fn current_plan(&self) -> Option<&TacticalPlan> {
        self.cached.as_ref()
    }

    pub fn last_assessment(&self) -> Option<&BattlefieldAssessment> {
        self.last_assessment.as_ref()
    }

    /// Earliest time a new plan will be built
    pub fn next_eligible(&self) -> Option<SimTime> {
        self.gate.next_eligible()
    }

    /// Forget the cached plan so the next call re-plans
    pub fn reset(&mut self) {
        self.cached = None;
        self.last_assessment = None;
        self.gate.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::orders::{ActionType, Strategy};
    use crate::battle::units::{UnitClass, UnitGroup};
    use crate::core::config::{ArrangementConfig, TerrainConfig};
    use glam::Vec2;

    fn armies() -> (Side, Side) {
        let own = Side::new(vec![
            UnitGroup::new(UnitClass::MeleeInfantry, 60, Vec2::new(0.0, 0.0)).with_facing(Vec2::X),
            UnitGroup::new(UnitClass::Ranged, 30, Vec2::new(-30.0, 0.0)).with_facing(Vec2::X),
            UnitGroup::new(UnitClass::MountedMelee, 20, Vec2::new(0.0, 60.0)).with_facing(Vec2::X),
        ]);
        let enemy = Side::new(vec![
            UnitGroup::new(UnitClass::MeleeInfantry, 40, Vec2::new(200.0, 0.0)).with_facing(-Vec2::X),
            UnitGroup::new(UnitClass::Ranged, 20, Vec2::new(230.0, 0.0)).with_facing(-Vec2::X),
        ])
        .human();
        (own, enemy)
    }

    fn fixtures() -> (TacticalPlanner, TerrainFeatureMap, ArrangementSelector) {
        (
            TacticalPlanner::new(PlanningConfig::default()),
            TerrainFeatureMap::new(TerrainConfig::default()),
            ArrangementSelector::new(ArrangementConfig::default()),
        )
    }

    #[test]
    fn test_plan_cached_within_interval() {
        let (mut planner, terrain, mut selector) = fixtures();
        let (own, enemy) = armies();
        let stance = CommanderStance::default();

        let first = planner.plan(&own, &enemy, &terrain, &mut selector, &stance, 0.0);
        let second = planner.plan(&own, &enemy, &terrain, &mut selector, &stance, 4.9);
        assert_eq!(first, second);
        assert_eq!(planner.next_eligible(), Some(5.0));

        let third = planner.plan(&own, &enemy, &terrain, &mut selector, &stance, 5.0);
        assert_eq!(third.created_at, 5.0);
    }

    #[test]
    fn test_superior_force_attacks() {
        let (mut planner, terrain, mut selector) = fixtures();
        let (own, enemy) = armies();
        let stance = CommanderStance {
            aggression: 0.6,
            vendetta: false,
        };
        let plan = planner.plan(&own, &enemy, &terrain, &mut selector, &stance, 0.0);
        // 110 vs 60
        assert_eq!(plan.strategy, Strategy::Aggressive);
        assert_eq!(plan.actions.len(), 3);
        assert_eq!(plan.role_of(own.groups[0].id), Some(Role::Assault));

        let infantry = plan.action_for(own.groups[0].id).unwrap();
        assert_eq!(infantry.action_type, ActionType::Advance);
        let archers = plan.action_for(own.groups[1].id).unwrap();
        assert_eq!(archers.action_type, ActionType::FireAt);
        assert_eq!(archers.target, infantry.target);
        assert_eq!(archers.priority, 1);
        let cavalry = plan.action_for(own.groups[2].id).unwrap();
        assert_eq!(cavalry.action_type, ActionType::Charge);
    }

    #[test]
    fn test_outnumbered_retreats() {
        let (mut planner, terrain, mut selector) = fixtures();
        let (enemy, own) = armies();
        let plan = planner.plan(
            &own,
            &enemy,
            &terrain,
            &mut selector,
            &CommanderStance::default(),
            0.0,
        );
        assert_eq!(plan.strategy, Strategy::Retreat);
        let infantry = plan.action_for(own.groups[0].id).unwrap();
        assert_eq!(infantry.action_type, ActionType::Retreat);
    }

    #[test]
    fn test_vendetta_forces_attack() {
        let (mut planner, terrain, mut selector) = fixtures();
        let (enemy, own) = armies();
        // weaker side with a grudge against the human player
        let mut human = enemy.clone();
        human.is_human = true;
        let stance = CommanderStance {
            aggression: 0.2,
            vendetta: true,
        };
        let plan = planner.plan(&own, &human, &terrain, &mut selector, &stance, 0.0);
        assert_eq!(plan.strategy, Strategy::Aggressive);
    }

    #[test]
    fn test_empty_side_gives_empty_plan() {
        let (mut planner, terrain, mut selector) = fixtures();
        let (_, enemy) = armies();
        let dead = Side::new(vec![UnitGroup::new(UnitClass::MeleeInfantry, 0, Vec2::ZERO)]);
        let plan = planner.plan(
            &dead,
            &enemy,
            &terrain,
            &mut selector,
            &CommanderStance::default(),
            0.0,
        );
        assert!(plan.is_empty());
        assert!(planner.current_plan().is_none());
    }

    #[test]
    fn test_bad_position_gets_fallback_hold() {
        let (mut planner, terrain, mut selector) = fixtures();
        let (mut own, enemy) = armies();
        own.groups[1].position = Vec2::new(f32::NAN, 0.0);
        let plan = planner.plan(
            &own,
            &enemy,
            &terrain,
            &mut selector,
            &CommanderStance::default(),
            0.0,
        );
        assert_eq!(plan.actions.len(), 3);
        let held = plan.action_for(own.groups[1].id).unwrap();
        assert_eq!(held.action_type, ActionType::Hold);
        assert_eq!(held.priority, 5);
        assert_eq!(plan.roles.len(), plan.actions.len());
        assert_eq!(plan.role_of(own.groups[1].id), Some(Role::HoldPosition));
    }

    #[test]
    fn test_reset_forces_replan() {
        let (mut planner, terrain, mut selector) = fixtures();
        let (own, enemy) = armies();
        let stance = CommanderStance::default();
        planner.plan(&own, &enemy, &terrain, &mut selector, &stance, 0.0);
        planner.reset();
        assert!(planner.current_plan().is_none());
        let plan = planner.plan(&own, &enemy, &terrain, &mut selector, &stance, 1.0);
        assert_eq!(plan.created_at, 1.0);
    }
}
