//! Strategy selection and role lookup
//!
//! Both are pure functions of the assessment so the planner's choices can
//! be checked without a battlefield.

use crate::battle::ai::assessment::BattlefieldAssessment;
use crate::battle::orders::{Role, Strategy};
use crate::battle::units::UnitClass;

/// Aggression above which an outnumbering side attacks
const PRESS_ADVANTAGE_AGGRESSION: f32 = 0.4;
/// Aggression splitting infantry advantage into attack or balance
const INFANTRY_PUSH_AGGRESSION: f32 = 0.5;
const HIGH_AGGRESSION: f32 = 0.7;
const LOW_AGGRESSION: f32 = 0.3;
/// Share of ranged troops worth holding a hill for
const HILL_ARCHER_SHARE: f32 = 0.2;
/// Share of infantry needed to plug a chokepoint
const CHOKEPOINT_INFANTRY_SHARE: f32 = 0.4;
/// Enemy archer share that draws our cavalry onto their flank
const FLANK_ARCHERS_SHARE: f32 = 0.3;
/// Enemy cavalry share that keeps our cavalry guarding
const GUARD_AGAINST_CAVALRY_SHARE: f32 = 0.3;

/// Pick the side-wide strategy; first matching rule wins
pub fn select_strategy(a: &BattlefieldAssessment) -> Strategy {
    if a.vendetta {
        return Strategy::Aggressive;
    }

    if a.has_disadvantage {
        return if a.has_high_ground {
            Strategy::Defensive
        } else {
            Strategy::Retreat
        };
    }

    if a.has_advantage && a.aggression > PRESS_ADVANTAGE_AGGRESSION {
        return Strategy::Aggressive;
    }

    if a.mounted_advantage || a.mounted_ranged_advantage {
        return Strategy::Flanking;
    }
    if a.ranged_advantage {
        return Strategy::Skirmish;
    }
    if a.infantry_advantage {
        return if a.aggression > INFANTRY_PUSH_AGGRESSION {
            Strategy::Aggressive
        } else {
            Strategy::Balanced
        };
    }

    if a.has_high_ground && a.own.ratio(UnitClass::Ranged) > HILL_ARCHER_SHARE {
        return Strategy::Defensive;
    }
    if a.has_chokepoint && a.own.ratio(UnitClass::MeleeInfantry) > CHOKEPOINT_INFANTRY_SHARE {
        return Strategy::Defensive;
    }

    if a.aggression > HIGH_AGGRESSION {
        Strategy::Aggressive
    } else if a.aggression < LOW_AGGRESSION {
        Strategy::Defensive
    } else {
        Strategy::Balanced
    }
}

/// Role for a class under a strategy
pub fn assign_role(class: UnitClass, strategy: Strategy, a: &BattlefieldAssessment) -> Role {
    use Strategy::*;
    match class {
        UnitClass::MeleeInfantry => match strategy {
            Aggressive => Role::Assault,
            Defensive => Role::HoldPosition,
            Flanking => Role::HoldCenter,
            Skirmish => Role::ScreenAdvance,
            Retreat => Role::RearGuard,
            Balanced => {
                if a.has_high_ground {
                    Role::HoldPosition
                } else if a.infantry_advantage {
                    Role::Assault
                } else {
                    Role::HoldCenter
                }
            }
        },
        UnitClass::Ranged => match strategy {
            Aggressive | Flanking => Role::FireSupport,
            Defensive => Role::FireAtWill,
            Skirmish => Role::HarassAndRetreat,
            Retreat => Role::CoveringFire,
            Balanced => {
                if a.has_high_ground {
                    Role::FireFromElevation
                } else {
                    Role::FireAtWill
                }
            }
        },
        UnitClass::MountedMelee => match strategy {
            Aggressive => Role::Charge,
            Defensive => Role::ProtectFlank,
            Flanking => Role::Flank,
            Skirmish => Role::HarassAndRetreat,
            Retreat => Role::DelayingAction,
            Balanced => {
                if a.enemy.ratio(UnitClass::Ranged) > FLANK_ARCHERS_SHARE {
                    Role::Flank
                } else if a.enemy.ratio(UnitClass::MountedMelee) > GUARD_AGAINST_CAVALRY_SHARE {
                    Role::ProtectFlank
                } else {
                    Role::Reserve
                }
            }
        },
        UnitClass::MountedRanged => match strategy {
            Aggressive | Skirmish | Balanced => Role::HarassAndRetreat,
            Defensive => Role::FireAtWill,
            Flanking => Role::Flank,
            Retreat => Role::CoveringFire,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::ai::assessment::ForceComposition;

    fn assessment(ratio: f32, aggression: f32) -> BattlefieldAssessment {
        BattlefieldAssessment {
            strength_ratio: ratio,
            has_advantage: ratio > 1.2,
            has_disadvantage: ratio < 0.8,
            aggression,
            ..Default::default()
        }
    }

    #[test]
    fn test_outnumbered_without_hill_retreats() {
        assert_eq!(select_strategy(&assessment(0.5, 0.5)), Strategy::Retreat);
    }

    #[test]
    fn test_outnumbered_on_hill_defends() {
        let a = BattlefieldAssessment {
            has_high_ground: true,
            ..assessment(0.5, 0.9)
        };
        assert_eq!(select_strategy(&a), Strategy::Defensive);
    }

    #[test]
    fn test_superior_and_willing_attacks() {
        assert_eq!(select_strategy(&assessment(1.5, 0.6)), Strategy::Aggressive);
    }

    #[test]
    fn test_vendetta_overrides_everything() {
        let a = BattlefieldAssessment {
            vendetta: true,
            has_high_ground: true,
            ranged_advantage: true,
            ..assessment(0.2, 0.1)
        };
        assert_eq!(select_strategy(&a), Strategy::Aggressive);
    }

    #[test]
    fn test_composition_advantages() {
        let horse = BattlefieldAssessment {
            mounted_advantage: true,
            ..assessment(1.0, 0.5)
        };
        assert_eq!(select_strategy(&horse), Strategy::Flanking);

        let bows = BattlefieldAssessment {
            ranged_advantage: true,
            ..assessment(1.0, 0.5)
        };
        assert_eq!(select_strategy(&bows), Strategy::Skirmish);

        let foot = BattlefieldAssessment {
            infantry_advantage: true,
            ..assessment(1.0, 0.6)
        };
        assert_eq!(select_strategy(&foot), Strategy::Aggressive);
        let cautious_foot = BattlefieldAssessment {
            infantry_advantage: true,
            ..assessment(1.0, 0.4)
        };
        assert_eq!(select_strategy(&cautious_foot), Strategy::Balanced);
    }

    #[test]
    fn test_terrain_rules() {
        let own = ForceComposition {
            melee_infantry: 50,
            ranged: 50,
            ..Default::default()
        };
        let hill = BattlefieldAssessment {
            own,
            has_high_ground: true,
            ..assessment(1.0, 0.5)
        };
        assert_eq!(select_strategy(&hill), Strategy::Defensive);

        let pass = BattlefieldAssessment {
            own,
            has_chokepoint: true,
            ..assessment(1.0, 0.5)
        };
        assert_eq!(select_strategy(&pass), Strategy::Defensive);
    }

    #[test]
    fn test_temperament_fallbacks() {
        assert_eq!(select_strategy(&assessment(1.0, 0.8)), Strategy::Aggressive);
        assert_eq!(select_strategy(&assessment(1.0, 0.2)), Strategy::Defensive);
        assert_eq!(select_strategy(&assessment(1.0, 0.5)), Strategy::Balanced);
    }

    #[test]
    fn test_role_table() {
        let a = assessment(1.0, 0.5);
        assert_eq!(assign_role(UnitClass::MeleeInfantry, Strategy::Aggressive, &a), Role::Assault);
        assert_eq!(assign_role(UnitClass::Ranged, Strategy::Retreat, &a), Role::CoveringFire);
        assert_eq!(assign_role(UnitClass::MountedMelee, Strategy::Flanking, &a), Role::Flank);
        assert_eq!(
            assign_role(UnitClass::MountedRanged, Strategy::Skirmish, &a),
            Role::HarassAndRetreat
        );
        assert_eq!(assign_role(UnitClass::MeleeInfantry, Strategy::Retreat, &a), Role::RearGuard);
    }

    #[test]
    fn test_balanced_fallbacks_read_flags() {
        let hill = BattlefieldAssessment {
            has_high_ground: true,
            ..assessment(1.0, 0.5)
        };
        assert_eq!(
            assign_role(UnitClass::Ranged, Strategy::Balanced, &hill),
            Role::FireFromElevation
        );
        assert_eq!(
            assign_role(UnitClass::MeleeInfantry, Strategy::Balanced, &hill),
            Role::HoldPosition
        );

        let archers = BattlefieldAssessment {
            enemy: ForceComposition {
                ranged: 40,
                melee_infantry: 60,
                ..Default::default()
            },
            ..assessment(1.0, 0.5)
        };
        assert_eq!(assign_role(UnitClass::MountedMelee, Strategy::Balanced, &archers), Role::Flank);
        assert_eq!(
            assign_role(UnitClass::MountedMelee, Strategy::Balanced, &assessment(1.0, 0.5)),
            Role::Reserve
        );
    }
}
