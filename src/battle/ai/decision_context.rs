//! Borrowed view of the battle used while generating actions
//!
//! Resolves every target-position function the roles need. Missing
//! geometry never aborts planning: each lookup falls back to a default
//! position and carries on.

use glam::Vec2;
use ordered_float::OrderedFloat;

use crate::battle::orders::{Action, ActionType, Role, PRIORITY_FALLBACK};
use crate::battle::terrain::{FeatureKind, TerrainFeatureMap};
use crate::battle::units::{Side, UnitClass, UnitGroup};
use crate::core::config::PlanningConfig;
use crate::core::types::{direction_or, right_of};

/// Charge preference by target class; braced infantry and horse rank last
const CHARGE_RANGED: f32 = 100.0;
const CHARGE_MOUNTED_RANGED: f32 = 80.0;
const CHARGE_LOOSE_INFANTRY: f32 = 50.0;
const CHARGE_OTHER: f32 = 20.0;

/// Planner's view of both sides for one cycle
pub struct DecisionContext<'a> {
    pub side: &'a Side,
    pub opposing: &'a Side,
    pub terrain: &'a TerrainFeatureMap,
    pub config: &'a PlanningConfig,
    own_centroid: Option<Vec2>,
    enemy_centroid: Vec2,
    facing: Vec2,
}

impl<'a> DecisionContext<'a> {
    pub fn new(
        side: &'a Side,
        opposing: &'a Side,
        terrain: &'a TerrainFeatureMap,
        config: &'a PlanningConfig,
    ) -> Self {
        let own_centroid = side.centroid();
        // No visible enemy: aim at where they deployed, else the origin
        let enemy_centroid = opposing
            .centroid()
            .or_else(|| terrain.geometry().map(|g| g.enemy_deployment))
            .unwrap_or(Vec2::ZERO);
        let facing = side.mean_facing().unwrap_or_else(|| {
            direction_or(enemy_centroid - own_centroid.unwrap_or(Vec2::ZERO), Vec2::Y)
        });

        Self {
            side,
            opposing,
            terrain,
            config,
            own_centroid,
            enemy_centroid,
            facing,
        }
    }

    /// Own centroid, or the group's own position when the side has none
    pub fn own_centroid(&self, group: &UnitGroup) -> Vec2 {
        self.own_centroid.unwrap_or(group.position)
    }

    pub fn enemy_centroid(&self) -> Vec2 {
        self.enemy_centroid
    }

    /// Mean facing of the side
    pub fn facing(&self) -> Vec2 {
        self.facing
    }

    /// Point between the two centroids (0.0 = ours, 1.0 = theirs)
    pub fn between(&self, group: &UnitGroup, weight: f32) -> Vec2 {
        self.own_centroid(group).lerp(self.enemy_centroid, weight)
    }

    /// Order for a group playing a role (arrangement left at default)
    pub fn action_for(&self, group: &UnitGroup, role: Role) -> Action {
        let cfg = self.config;
        let own = self.own_centroid(group);
        let right = right_of(self.facing);

        let (action_type, target, priority) = match role {
            Role::Assault => (ActionType::Advance, self.enemy_centroid, 1),
            Role::HoldPosition => (ActionType::Hold, group.position, 1),
            Role::HoldCenter => (ActionType::Hold, own, 2),
            Role::ScreenAdvance => (
                ActionType::Advance,
                own + self.facing * cfg.screen_distance,
                2,
            ),
            Role::FireSupport => (ActionType::FireAt, self.enemy_centroid, 2),
            Role::FireAtWill => (
                ActionType::FireAt,
                self.opposing
                    .closest_to(group.position)
                    .map_or(self.enemy_centroid, |enemy| enemy.position),
                3,
            ),
            Role::FireFromElevation => (
                ActionType::FireAt,
                self.terrain
                    .nearest(FeatureKind::HighGround, group.position)
                    .map_or(group.position, |hill| hill.ground_position()),
                1,
            ),
            Role::Flank => (ActionType::Flank, self.flank_position(group), 1),
            Role::Charge => (ActionType::Charge, self.charge_target(), 1),
            Role::HarassAndRetreat => (ActionType::Harass, self.harass_position(group), 2),
            Role::CoveringFire => (
                ActionType::FireAt,
                self.between(group, cfg.between_weight),
                3,
            ),
            Role::ProtectFlank => (ActionType::Guard, self.guarded_flank(group), 2),
            Role::RearGuard => (
                ActionType::Retreat,
                own - self.facing * cfg.guard_offset,
                3,
            ),
            Role::Reserve => (
                ActionType::Hold,
                own - self.facing * cfg.reserve_offset + right * cfg.reserve_offset,
                4,
            ),
            Role::DelayingAction => (
                ActionType::Harass,
                self.between(group, cfg.between_weight),
                3,
            ),
        };

        Action::new(group.id, group.class, action_type, target, priority)
    }

    /// Holding order used when nothing better can be resolved
    pub fn fallback_action(&self, group: &UnitGroup) -> Action {
        Action::new(
            group.id,
            group.class,
            ActionType::Hold,
            group.position,
            PRIORITY_FALLBACK,
        )
    }

    /// Point beside the enemy centroid on the less-occupied side
    ///
    /// Both lanes sit `flank_lane_offset` either side of the enemy centroid,
    /// perpendicular to the side's facing. A lane with an enemy group closer
    /// than `flank_clearance` is blocked. With both or neither lane clear,
    /// the group takes the side it is already on.
    pub fn flank_position(&self, group: &UnitGroup) -> Vec2 {
        let cfg = self.config;
        let right = right_of(self.facing);

        let lane_clear = |sign: f32| {
            let lane = self.enemy_centroid + right * sign * cfg.flank_lane_offset;
            !self
                .opposing
                .active_groups()
                .any(|enemy| enemy.position.distance(lane) < cfg.flank_clearance)
        };

        let sign = match (lane_clear(1.0), lane_clear(-1.0)) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => {
                if (group.position - self.enemy_centroid).dot(right) >= 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
        };
        self.enemy_centroid + right * sign * cfg.flank_distance
    }

    /// Most attractive enemy group to ride down
    fn charge_target(&self) -> Vec2 {
        self.opposing
            .active_groups()
            .max_by_key(|enemy| {
                let base = match enemy.class {
                    UnitClass::Ranged => CHARGE_RANGED,
                    UnitClass::MountedRanged => CHARGE_MOUNTED_RANGED,
                    UnitClass::MeleeInfantry if !enemy.arrangement.is_braced() => {
                        CHARGE_LOOSE_INFANTRY
                    }
                    _ => CHARGE_OTHER,
                };
                OrderedFloat(base + enemy.unit_count as f32)
            })
            .map_or(self.enemy_centroid, |enemy| enemy.position)
    }

    /// Standoff point on the group's side of the enemy
    fn harass_position(&self, group: &UnitGroup) -> Vec2 {
        let standoff = if group.class == UnitClass::Ranged {
            self.config.harass_standoff_ranged
        } else {
            self.config.harass_standoff_mounted
        };
        let away = direction_or(group.position - self.enemy_centroid, -self.facing);
        self.enemy_centroid + away * standoff
    }

    /// Guard point on whichever flank enemy horse is closer to
    fn guarded_flank(&self, group: &UnitGroup) -> Vec2 {
        let own = self.own_centroid(group);
        let offset = right_of(self.facing) * self.config.guard_offset;
        let (right_post, left_post) = (own + offset, own - offset);

        let nearest_horse = |post: Vec2| {
            self.opposing
                .active_groups()
                .filter(|enemy| enemy.class.is_mounted())
                .map(|enemy| enemy.position.distance(post))
                .min_by_key(|d| OrderedFloat(*d))
        };

        match (nearest_horse(right_post), nearest_horse(left_post)) {
            (Some(r), Some(l)) if l < r => left_post,
            _ => right_post,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::units::Arrangement;
    use crate::core::config::TerrainConfig;

    fn group(class: UnitClass, x: f32, y: f32) -> UnitGroup {
        UnitGroup::new(class, 20, Vec2::new(x, y)).with_facing(Vec2::X)
    }

    #[test]
    fn test_flank_picks_clear_lane() {
        // facing +x, so "right" is -y
        let own = Side::new(vec![group(UnitClass::MountedMelee, 0.0, 0.0)]);
        let enemy = Side::new(vec![
            group(UnitClass::MeleeInfantry, 90.0, 0.0),
            group(UnitClass::MeleeInfantry, 170.0, 0.0),
            group(UnitClass::Ranged, 130.0, -45.0),
        ]);
        let terrain = TerrainFeatureMap::new(TerrainConfig::default());
        let config = PlanningConfig::default();
        let ctx = DecisionContext::new(&own, &enemy, &terrain, &config);
        let c = ctx.enemy_centroid();
        let target = ctx.flank_position(&own.groups[0]);
        // the -y lane has the archers nearby, so go +y
        assert!(target.y > c.y);
        assert!((target.distance(c) - config.flank_distance).abs() < 1e-3);
    }

    #[test]
    fn test_flank_defaults_to_own_side() {
        let own = Side::new(vec![group(UnitClass::MountedMelee, 0.0, 50.0)]);
        let enemy = Side::new(vec![group(UnitClass::MeleeInfantry, 100.0, 0.0)]);
        let terrain = TerrainFeatureMap::new(TerrainConfig::default());
        let config = PlanningConfig::default();
        let ctx = DecisionContext::new(&own, &enemy, &terrain, &config);
        let target = ctx.flank_position(&own.groups[0]);
        assert!(target.y > 0.0);
    }

    #[test]
    fn test_charge_prefers_archers_over_wall() {
        let own = Side::new(vec![group(UnitClass::MountedMelee, 0.0, 0.0)]);
        let enemy = Side::new(vec![
            group(UnitClass::MeleeInfantry, 50.0, 0.0).with_arrangement(Arrangement::Square),
            group(UnitClass::Ranged, 90.0, 30.0),
        ]);
        let terrain = TerrainFeatureMap::new(TerrainConfig::default());
        let config = PlanningConfig::default();
        let ctx = DecisionContext::new(&own, &enemy, &terrain, &config);
        let action = ctx.action_for(&own.groups[0], Role::Charge);
        assert_eq!(action.action_type, ActionType::Charge);
        assert_eq!(action.target, Vec2::new(90.0, 30.0));
        assert_eq!(action.priority, 1);
    }

    #[test]
    fn test_harass_keeps_standoff() {
        let own = Side::new(vec![group(UnitClass::Ranged, 0.0, 0.0)]);
        let enemy = Side::new(vec![group(UnitClass::MeleeInfantry, 200.0, 0.0)]);
        let terrain = TerrainFeatureMap::new(TerrainConfig::default());
        let config = PlanningConfig::default();
        let ctx = DecisionContext::new(&own, &enemy, &terrain, &config);
        let action = ctx.action_for(&own.groups[0], Role::HarassAndRetreat);
        assert_eq!(action.action_type, ActionType::Harass);
        assert!((action.target - Vec2::new(130.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn test_empty_enemy_falls_back_to_default() {
        let own = Side::new(vec![group(UnitClass::MeleeInfantry, 10.0, 10.0)]);
        let terrain = TerrainFeatureMap::new(TerrainConfig::default());
        let config = PlanningConfig::default();
        let enemy = Side::default();
        let ctx = DecisionContext::new(&own, &enemy, &terrain, &config);
        assert_eq!(ctx.enemy_centroid(), Vec2::ZERO);
        let action = ctx.action_for(&own.groups[0], Role::FireAtWill);
        assert_eq!(action.target, Vec2::ZERO);
    }

    #[test]
    fn test_elevation_without_hills_stays_put() {
        let own = Side::new(vec![group(UnitClass::Ranged, 10.0, 10.0)]);
        let enemy = Side::new(vec![group(UnitClass::MeleeInfantry, 100.0, 0.0)]);
        let terrain = TerrainFeatureMap::new(TerrainConfig::default());
        let config = PlanningConfig::default();
        let ctx = DecisionContext::new(&own, &enemy, &terrain, &config);
        let action = ctx.action_for(&own.groups[0], Role::FireFromElevation);
        assert_eq!(action.target, Vec2::new(10.0, 10.0));
    }

    #[test]
    fn test_reserve_sits_behind_and_right() {
        let own = Side::new(vec![group(UnitClass::MountedMelee, 0.0, 0.0)]);
        let enemy = Side::new(vec![group(UnitClass::MeleeInfantry, 100.0, 0.0)]);
        let terrain = TerrainFeatureMap::new(TerrainConfig::default());
        let config = PlanningConfig::default();
        let ctx = DecisionContext::new(&own, &enemy, &terrain, &config);
        let action = ctx.action_for(&own.groups[0], Role::Reserve);
        assert_eq!(action.action_type, ActionType::Hold);
        assert_eq!(action.priority, 4);
        assert!((action.target - Vec2::new(-20.0, -20.0)).length() < 1e-3);
    }
}
