//! Formation arrangement selection
//!
//! Threat predicates are computed from centroid distances, then a per-class
//! priority table picks a shape. A per-group cooldown stops groups from
//! flickering between shapes as threats come and go.

use ahash::AHashMap;

use crate::battle::scheduler::IntervalGate;
use crate::battle::units::{Arrangement, Side, UnitClass, UnitGroup};
use crate::core::config::{ArrangementConfig, GeneralConfig};
use crate::core::types::{right_of, GroupId, SimTime};

/// Aggression gate for wedges when the commander favors aggressive cavalry
const AGGRESSIVE_CAVALRY_WEDGE: f32 = 0.5;

/// Local threat picture around one group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreatSignals {
    /// Enemy horse close by in numbers
    pub mounted_threat: bool,
    /// Enemy missile troops in range
    pub under_fire: bool,
    /// Enemies in at least three of the four quadrants around the group
    pub surrounded: bool,
    /// Low health or heavy losses
    pub weak: bool,
    /// Any enemy within the proximity radius
    pub enemies_near: bool,
    /// Any enemy within half the proximity radius
    pub enemies_close: bool,
    /// Any enemy within a third of the proximity radius
    pub enemies_very_close: bool,
    /// Enemy infantry is standing in a braced shape
    pub enemy_wall: bool,
    /// An enemy lies ahead at charging distance
    pub clear_charge_lane: bool,
}

impl ThreatSignals {
    pub fn compute(group: &UnitGroup, opposing: &Side, config: &ArrangementConfig) -> Self {
        let position = group.position;
        let facing = group.facing_dir();
        let right = right_of(facing);
        let enemy_total = opposing.total_units().max(1) as f32;

        let mut signals = ThreatSignals {
            weak: group.average_health < config.weak_health
                || group.strength_fraction() < config.weak_strength,
            ..Default::default()
        };

        let mounted_range = config.proximity * config.mounted_threat_factor;
        let mut mounted_nearby = 0u32;
        let mut missile_units = 0u32;
        let mut missile_distance_sum = 0.0f32;
        let mut missile_groups = 0u32;
        let mut quadrants = [false; 4];

        for enemy in opposing.active_groups() {
            let offset = enemy.position - position;
            let distance = offset.length();

            if distance <= config.proximity {
                signals.enemies_near = true;
                let ahead = offset.dot(facing) >= 0.0;
                let to_right = offset.dot(right) >= 0.0;
                quadrants[(ahead as usize) * 2 + to_right as usize] = true;
            }
            if distance <= config.proximity * 0.5 {
                signals.enemies_close = true;
            }
            if distance <= config.proximity / 3.0 {
                signals.enemies_very_close = true;
            }

            if enemy.class.is_missile() {
                if distance <= config.ranged_threat_range {
                    signals.under_fire = true;
                }
                missile_units += enemy.unit_count;
                missile_distance_sum += distance;
                missile_groups += 1;
            }

            if enemy.class == UnitClass::MountedMelee && distance <= mounted_range {
                mounted_nearby += enemy.unit_count;
            }

            if enemy.class == UnitClass::MeleeInfantry && enemy.arrangement.is_braced() {
                signals.enemy_wall = true;
            }

            if let Some(direction) = offset.try_normalize() {
                if facing.dot(direction) > config.charge_alignment
                    && distance > config.charge_min_distance
                    && distance < config.charge_max_distance
                {
                    signals.clear_charge_lane = true;
                }
            }
        }

        if missile_groups > 0
            && missile_units > config.threat_unit_count
            && missile_distance_sum / (missile_groups as f32) < config.mass_fire_distance
        {
            signals.under_fire = true;
        }

        signals.mounted_threat = mounted_nearby > config.threat_unit_count
            || mounted_nearby as f32 / enemy_total > config.threat_proportion;
        signals.surrounded = quadrants.iter().filter(|&&q| q).count() >= 3;
        signals
    }
}

/// Situation of a group beyond enemy threats
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArrangementContext {
    /// Commander aggression (0.0 to 1.0)
    pub aggression: f32,
    pub on_high_ground: bool,
    pub in_forest: bool,
    pub moving: bool,
}

/// Commander habits that shift the decision table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrangementHabits {
    /// Aggression above which mounted melee forms a wedge
    pub wedge_aggression: f32,
    /// Infantry in contact braces into a shield wall instead of a line
    pub defensive_infantry: bool,
}

impl Default for ArrangementHabits {
    fn default() -> Self {
        Self {
            wedge_aggression: ArrangementConfig::default().wedge_aggression,
            defensive_infantry: false,
        }
    }
}

/// Pick an arrangement; first matching rule wins
pub fn decide_arrangement(
    class: UnitClass,
    signals: &ThreatSignals,
    context: &ArrangementContext,
    habits: &ArrangementHabits,
) -> Arrangement {
    match class {
        UnitClass::MeleeInfantry => {
            if signals.weak && signals.mounted_threat {
                Arrangement::Square
            } else if signals.weak && signals.under_fire {
                Arrangement::ShieldWall
            } else if signals.mounted_threat {
                Arrangement::Square
            } else if signals.under_fire {
                Arrangement::ShieldWall
            } else if signals.surrounded {
                Arrangement::Circle
            } else if context.in_forest {
                Arrangement::Loose
            } else if signals.enemies_near && habits.defensive_infantry {
                Arrangement::ShieldWall
            } else if context.on_high_ground || signals.enemies_near {
                Arrangement::Line
            } else if context.moving {
                Arrangement::Column
            } else {
                Arrangement::Line
            }
        }
        UnitClass::Ranged => {
            if signals.mounted_threat && signals.enemies_close {
                Arrangement::Square
            } else if signals.enemies_close {
                Arrangement::Circle
            } else if signals.weak {
                Arrangement::Loose
            } else if context.on_high_ground {
                Arrangement::Line
            } else {
                // forest and open ground alike
                Arrangement::Loose
            }
        }
        UnitClass::MountedMelee => {
            if signals.enemy_wall && signals.enemies_near {
                Arrangement::Column
            } else if signals.weak || context.in_forest {
                Arrangement::Column
            } else if signals.clear_charge_lane && context.aggression > habits.wedge_aggression {
                Arrangement::Wedge
            } else {
                Arrangement::Column
            }
        }
        UnitClass::MountedRanged => {
            if signals.enemies_very_close || signals.weak {
                Arrangement::Column
            } else {
                Arrangement::Loose
            }
        }
    }
}

#[derive(Debug, Clone)]
struct ArrangementRecord {
    current: Arrangement,
    gate: IntervalGate,
    changes: u32,
}

/// Per-group arrangement choice with a change cooldown
#[derive(Debug, Clone)]
pub struct ArrangementSelector {
    config: ArrangementConfig,
    habits: ArrangementHabits,
    records: AHashMap<GroupId, ArrangementRecord>,
}

impl ArrangementSelector {
    pub fn new(config: ArrangementConfig) -> Self {
        let habits = ArrangementHabits {
            wedge_aggression: config.wedge_aggression,
            defensive_infantry: false,
        };
        Self {
            config,
            habits,
            records: AHashMap::new(),
        }
    }

    /// Apply the commander-level switches from the general config
    pub fn with_general(mut self, general: &GeneralConfig) -> Self {
        if general.aggressive_cavalry {
            self.habits.wedge_aggression = self.habits.wedge_aggression.min(AGGRESSIVE_CAVALRY_WEDGE);
        }
        self.habits.defensive_infantry = general.defensive_infantry;
        self
    }

    pub fn habits(&self) -> &ArrangementHabits {
        &self.habits
    }

    /// Choose an arrangement for a group
    ///
    /// Within the cooldown after a change the previous choice is returned
    /// unchanged, whatever the threats are doing.
    pub fn select(
        &mut self,
        group: &UnitGroup,
        opposing: &Side,
        context: &ArrangementContext,
        now: SimTime,
    ) -> Arrangement {
        if let Some(record) = self.records.get(&group.id) {
            if !record.gate.is_due(now) {
                tracing::trace!("Arrangement for {} held by cooldown", group.id);
                return record.current;
            }
        }

        if !group.is_active() {
            return group.arrangement;
        }

        let signals = ThreatSignals::compute(group, opposing, &self.config);
        let choice = decide_arrangement(group.class, &signals, context, &self.habits);

        let cooldown = self.config.cooldown;
        let record = self.records.entry(group.id).or_insert_with(|| {
            let mut gate = IntervalGate::new(cooldown);
            gate.fire(now);
            ArrangementRecord {
                current: choice,
                gate,
                changes: 0,
            }
        });
        if record.current != choice {
            tracing::debug!(
                "Group {} ({}) {:?} -> {:?}",
                group.id,
                group.class.name(),
                record.current,
                choice
            );
            record.current = choice;
            record.gate.fire(now);
            record.changes += 1;
        }
        choice
    }

    /// Last arrangement chosen for a group
    pub fn current(&self, id: GroupId) -> Option<Arrangement> {
        self.records.get(&id).map(|r| r.current)
    }

    /// How often a group has changed arrangement this engagement
    pub fn change_count(&self, id: GroupId) -> u32 {
        self.records.get(&id).map_or(0, |r| r.changes)
    }

    pub fn reset(&mut self) {
        self.records.clear();
    }
}
