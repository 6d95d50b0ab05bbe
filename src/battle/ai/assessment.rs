//! Snapshot of the balance of forces for one planning cycle
//!
//! Recomputed at most once per cycle and never persisted.

use serde::{Deserialize, Serialize};

use crate::battle::terrain::{FeatureKind, TerrainFeatureMap, TerrainProfile};
use crate::battle::units::{Side, UnitClass};
use crate::core::config::PlanningConfig;

/// Margin by which one class count must exceed the enemy's
const CLASS_MARGIN: f32 = 1.2;

/// Unit counts by class for one side (empty groups excluded)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceComposition {
    pub melee_infantry: u32,
    pub ranged: u32,
    pub mounted_melee: u32,
    pub mounted_ranged: u32,
}

impl ForceComposition {
    pub fn of(side: &Side) -> Self {
        Self {
            melee_infantry: side.units_of(UnitClass::MeleeInfantry),
            ranged: side.units_of(UnitClass::Ranged),
            mounted_melee: side.units_of(UnitClass::MountedMelee),
            mounted_ranged: side.units_of(UnitClass::MountedRanged),
        }
    }

    pub fn count(&self, class: UnitClass) -> u32 {
        match class {
            UnitClass::MeleeInfantry => self.melee_infantry,
            UnitClass::Ranged => self.ranged,
            UnitClass::MountedMelee => self.mounted_melee,
            UnitClass::MountedRanged => self.mounted_ranged,
        }
    }

    pub fn total(&self) -> u32 {
        self.melee_infantry + self.ranged + self.mounted_melee + self.mounted_ranged
    }

    /// Share of the side's units in a class (0.0 for an empty side)
    pub fn ratio(&self, class: UnitClass) -> f32 {
        match self.total() {
            0 => 0.0,
            total => self.count(class) as f32 / total as f32,
        }
    }
}

/// The acting commander's current temper, as supplied by memory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommanderStance {
    /// 0.0 (timid) to 1.0 (reckless)
    pub aggression: f32,
    /// Vendetta against the human-controlled side
    pub vendetta: bool,
}

impl Default for CommanderStance {
    fn default() -> Self {
        Self {
            aggression: 0.5,
            vendetta: false,
        }
    }
}

/// Derived picture of the battle for strategy selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattlefieldAssessment {
    pub own: ForceComposition,
    pub enemy: ForceComposition,
    /// Own units over enemy units (enemy floored at 1)
    pub strength_ratio: f32,
    pub has_advantage: bool,
    pub has_disadvantage: bool,
    pub infantry_advantage: bool,
    pub ranged_advantage: bool,
    pub mounted_advantage: bool,
    pub mounted_ranged_advantage: bool,
    /// A hill lies closer to us than to the enemy
    pub has_high_ground: bool,
    pub has_chokepoint: bool,
    pub terrain: TerrainProfile,
    pub aggression: f32,
    pub vendetta: bool,
    pub against_human: bool,
}

impl BattlefieldAssessment {
    pub fn assess(
        side: &Side,
        opposing: &Side,
        terrain: &TerrainFeatureMap,
        stance: &CommanderStance,
        config: &PlanningConfig,
    ) -> Self {
        let own = ForceComposition::of(side);
        let enemy = ForceComposition::of(opposing);
        let strength_ratio = own.total() as f32 / enemy.total().max(1) as f32;

        let has_high_ground = match (side.centroid(), opposing.centroid()) {
            (Some(ours), Some(theirs)) => terrain
                .features_of(FeatureKind::HighGround)
                .any(|f| {
                    let p = f.ground_position();
                    p.distance(ours) < p.distance(theirs)
                }),
            (Some(_), None) => terrain.has_feature(FeatureKind::HighGround),
            _ => false,
        };

        let against_human = opposing.is_human;
        let mut assessment = Self {
            own,
            enemy,
            strength_ratio,
            has_advantage: strength_ratio > config.advantage_ratio,
            has_disadvantage: strength_ratio < config.disadvantage_ratio,
            has_high_ground,
            has_chokepoint: terrain.has_feature(FeatureKind::Chokepoint),
            terrain: terrain.dominant_terrain(),
            aggression: stance.aggression.clamp(0.0, 1.0),
            vendetta: stance.vendetta && against_human,
            against_human,
            ..Default::default()
        };
        assessment.compute_composition_advantages();

        tracing::debug!(
            "Assessment: ratio {:.2}, own {:?}, enemy {:?}, high ground {}, chokepoint {}",
            assessment.strength_ratio,
            assessment.own,
            assessment.enemy,
            assessment.has_high_ground,
            assessment.has_chokepoint
        );
        assessment
    }

    /// Derive the per-class advantage flags from the two compositions
    pub fn compute_composition_advantages(&mut self) {
        use UnitClass::*;
        let (own, enemy) = (self.own, self.enemy);
        let ours = |class| own.ratio(class);
        let theirs = |class| enemy.ratio(class);

        self.infantry_advantage = ours(MeleeInfantry) > theirs(MeleeInfantry) * CLASS_MARGIN
            || (theirs(Ranged) > 0.4 && ours(MeleeInfantry) > 0.3);
        self.ranged_advantage =
            ours(Ranged) > theirs(Ranged) * CLASS_MARGIN && theirs(MountedMelee) < 0.3;
        self.mounted_advantage = ours(MountedMelee) > theirs(MountedMelee) * CLASS_MARGIN
            && (theirs(Ranged) > 0.3 || theirs(MeleeInfantry) < 0.3);
        self.mounted_ranged_advantage = ours(MountedRanged) > 0.2 && theirs(MountedMelee) < 0.2;
    }

    pub fn has_composition_advantage(&self) -> bool {
        self.infantry_advantage
            || self.ranged_advantage
            || self.mounted_advantage
            || self.mounted_ranged_advantage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::units::UnitGroup;
    use crate::core::config::TerrainConfig;
    use glam::Vec2;

    fn side(groups: &[(UnitClass, u32, f32)]) -> Side {
        Side::new(
            groups.iter()
                .map(|&(class, count, x)| UnitGroup::new(class, count, Vec2::new(x, 0.0)))
                .collect(),
        )
    }

    fn assess(own: &Side, enemy: &Side) -> BattlefieldAssessment {
        BattlefieldAssessment::assess(
            own,
            enemy,
            &TerrainFeatureMap::new(TerrainConfig::default()),
            &CommanderStance::default(),
            &PlanningConfig::default(),
        )
    }

    #[test]
    fn test_strength_ratio_floors_enemy() {
        let own = side(&[(UnitClass::MeleeInfantry, 50, 0.0)]);
        let a = assess(&own, &Side::default());
        assert_eq!(a.strength_ratio, 50.0);
        assert!(a.has_advantage);
    }

    #[test]
    fn test_zero_unit_groups_ignored() {
        let own = side(&[(UnitClass::MeleeInfantry, 50, 0.0), (UnitClass::MountedMelee, 0, 0.0)]);
        let enemy = side(&[(UnitClass::MeleeInfantry, 50, 100.0)]);
        let a = assess(&own, &enemy);
        assert_eq!(a.own.total(), 50);
        assert_eq!(a.strength_ratio, 1.0);
        assert!(!a.mounted_advantage);
        assert!(!a.has_advantage && !a.has_disadvantage);
    }

    #[test]
    fn test_cavalry_advantage_against_archers() {
        let own = side(&[(UnitClass::MeleeInfantry, 40, 0.0), (UnitClass::MountedMelee, 30, 0.0)]);
        let enemy = side(&[(UnitClass::Ranged, 40, 100.0), (UnitClass::MeleeInfantry, 30, 100.0)]);
        let a = assess(&own, &enemy);
        assert!(a.mounted_advantage);
        assert!(a.infantry_advantage);
        assert!(!a.ranged_advantage);
    }

    #[test]
    fn test_horse_archer_advantage() {
        let own = side(&[(UnitClass::MountedRanged, 30, 0.0), (UnitClass::MeleeInfantry, 70, 0.0)]);
        let enemy = side(&[(UnitClass::MeleeInfantry, 100, 100.0)]);
        let a = assess(&own, &enemy);
        assert!(a.mounted_ranged_advantage);
        assert!(a.has_composition_advantage());
    }

    #[test]
    fn test_vendetta_only_against_human() {
        let own = side(&[(UnitClass::MeleeInfantry, 10, 0.0)]);
        let enemy = side(&[(UnitClass::MeleeInfantry, 10, 100.0)]);
        let stance = CommanderStance {
            aggression: 0.8,
            vendetta: true,
        };
        let terrain = TerrainFeatureMap::new(TerrainConfig::default());
        let config = PlanningConfig::default();
        let a = BattlefieldAssessment::assess(&own, &enemy, &terrain, &stance, &config);
        assert!(!a.vendetta);
        let human = enemy.clone().human();
        let a = BattlefieldAssessment::assess(&own, &human, &terrain, &stance, &config);
        assert!(a.vendetta && a.against_human);
    }
}
