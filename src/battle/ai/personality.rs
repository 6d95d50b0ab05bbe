//! Commander personality: trait vector, learned effectiveness and label
//!
//! A model only changes through [`PersonalityModel::apply_outcome`] and
//! [`PersonalityModel::apply_tactical_decision`], both of which return a new
//! model and leave the input untouched.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::orders::Strategy;
use crate::battle::units::{Arrangement, UnitClass};
use crate::core::config::MemoryConfig;

pub const TRAIT_MIN: f32 = 0.1;
pub const TRAIT_MAX: f32 = 1.0;
/// Neutral starting effectiveness for tactics and classes
pub const NEUTRAL_EFFECTIVENESS: f32 = 0.5;
/// Aggressiveness floor while a vendetta is active
pub const VENDETTA_AGGRESSION: f32 = 0.7;

const VICTORY_STUBBORNNESS: f32 = 0.05;
const VICTORY_CAUTION: f32 = -0.03;
const DEFEAT_ADAPTABILITY: f32 = 0.05;
const DEFEAT_CAUTION: f32 = 0.05;
const DEFEAT_STUBBORNNESS: f32 = -0.03;
/// Effectiveness step for one tactical decision
const DECISION_STEP: f32 = 0.05;
/// Adaptability below which single decisions teach less
const SLOW_LEARNER: f32 = 0.5;
/// Learned effectiveness that outranks temperament when picking a tactic
const PROVEN_TACTIC: f32 = 0.6;
/// A trait counts as "strong" above this
const STRONG_TRAIT: f32 = 0.7;
const PREFERRED_CLASS_BOOST: f32 = 1.2;

fn clamp_trait(value: f32) -> f32 {
    value.clamp(TRAIT_MIN, TRAIT_MAX)
}

/// Tactics a commander can be credited with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TacticType {
    Defensive,
    Aggressive,
    Flanking,
    Ambush,
    Skirmish,
    Charge,
    HoldPosition,
    Retreat,
    DoubleEnvelopment,
}

impl TacticType {
    pub const ALL: [TacticType; 9] = [
        TacticType::Defensive,
        TacticType::Aggressive,
        TacticType::Flanking,
        TacticType::Ambush,
        TacticType::Skirmish,
        TacticType::Charge,
        TacticType::HoldPosition,
        TacticType::Retreat,
        TacticType::DoubleEnvelopment,
    ];
}

impl From<Strategy> for TacticType {
    /// Tactic a side-wide strategy is credited as
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Aggressive => TacticType::Aggressive,
            Strategy::Defensive => TacticType::Defensive,
            Strategy::Flanking => TacticType::Flanking,
            Strategy::Skirmish => TacticType::Skirmish,
            Strategy::Retreat => TacticType::Retreat,
            Strategy::Balanced => TacticType::HoldPosition,
        }
    }
}

/// Terrain a commander likes to fight on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerrainPreference {
    Elevated,
    Forested,
    Open,
    Balanced,
}

/// Continuous traits, each kept within [0.1, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalityTraits {
    pub aggressiveness: f32,
    pub caution: f32,
    pub creativity: f32,
    pub adaptability: f32,
    pub stubbornness: f32,

    pub flanking_preference: f32,
    pub defense_preference: f32,
    pub ranged_preference: f32,
    pub mounted_preference: f32,

    pub high_ground_preference: f32,
    pub forest_preference: f32,
    pub open_field_preference: f32,
}

impl Default for PersonalityTraits {
    fn default() -> Self {
        Self {
            aggressiveness: 0.5,
            caution: 0.5,
            creativity: 0.5,
            adaptability: 0.5,
            stubbornness: 0.5,
            flanking_preference: 0.5,
            defense_preference: 0.5,
            ranged_preference: 0.5,
            mounted_preference: 0.5,
            high_ground_preference: 0.7,
            forest_preference: 0.5,
            open_field_preference: 0.5,
        }
    }
}

impl PersonalityTraits {
    /// Fresh random traits; everyone likes a hill at least a little
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut roll = || rng.gen_range(TRAIT_MIN..=TRAIT_MAX);
        let mut traits = Self {
            aggressiveness: roll(),
            caution: roll(),
            creativity: roll(),
            adaptability: roll(),
            stubbornness: roll(),
            flanking_preference: roll(),
            defense_preference: roll(),
            ranged_preference: roll(),
            mounted_preference: roll(),
            high_ground_preference: 0.0,
            forest_preference: roll(),
            open_field_preference: roll(),
        };
        traits.high_ground_preference = rng.gen_range(0.5..=TRAIT_MAX);
        traits
    }

    pub fn values(&self) -> [f32; 12] {
        [
            self.aggressiveness,
            self.caution,
            self.creativity,
            self.adaptability,
            self.stubbornness,
            self.flanking_preference,
            self.defense_preference,
            self.ranged_preference,
            self.mounted_preference,
            self.high_ground_preference,
            self.forest_preference,
            self.open_field_preference,
        ]
    }

    pub fn in_bounds(&self) -> bool {
        self.values()
            .iter()
            .all(|v| (TRAIT_MIN..=TRAIT_MAX).contains(v))
    }

    pub fn clamp(&mut self) {
        for value in [
            &mut self.aggressiveness,
            &mut self.caution,
            &mut self.creativity,
            &mut self.adaptability,
            &mut self.stubbornness,
            &mut self.flanking_preference,
            &mut self.defense_preference,
            &mut self.ranged_preference,
            &mut self.mounted_preference,
            &mut self.high_ground_preference,
            &mut self.forest_preference,
            &mut self.open_field_preference,
        ] {
            *value = clamp_trait(*value);
        }
    }

    /// Shift the traits a tactic exercises by `amount`, then clamp
    pub fn nudge(&mut self, tactic: TacticType, amount: f32) {
        if !amount.is_finite() {
            return;
        }
        match tactic {
            TacticType::Aggressive => self.aggressiveness += amount,
            TacticType::Defensive => {
                self.defense_preference += amount;
                self.caution += amount;
            }
            TacticType::Flanking | TacticType::DoubleEnvelopment => {
                self.flanking_preference += amount;
                self.creativity += amount;
            }
            TacticType::Ambush => {
                self.forest_preference += amount;
                self.creativity += amount;
            }
            TacticType::Skirmish => self.ranged_preference += amount,
            TacticType::Charge => {
                self.mounted_preference += amount;
                self.aggressiveness += amount;
            }
            TacticType::HoldPosition => {
                self.defense_preference += amount;
                self.stubbornness += amount;
            }
            TacticType::Retreat => {}
        }
        self.clamp();
    }

    /// Descriptive label from the dominant trait combination
    pub fn label(&self) -> &'static str {
        if self.aggressiveness > 0.7 && self.mounted_preference > 0.6 {
            "Aggressive Cavalry Commander"
        } else if self.aggressiveness > 0.7 && self.ranged_preference > 0.6 {
            "Aggressive Archer Commander"
        } else if self.caution > 0.7 && self.defense_preference > 0.6 {
            "Defensive Tactician"
        } else if self.creativity > 0.7 && self.adaptability > 0.6 {
            "Adaptive Strategist"
        } else if self.flanking_preference > 0.7 {
            "Flanking Specialist"
        } else if self.stubbornness > 0.7 {
            "Stubborn Commander"
        } else if self.aggressiveness > 0.6 {
            "Aggressive Commander"
        } else if self.caution > 0.6 {
            "Cautious Commander"
        } else {
            "Balanced Commander"
        }
    }
}

/// What happened in one battle, from the tracked commander's side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattleOutcome {
    pub victory: bool,
    /// The other side was human-controlled
    pub against_human: bool,
    /// Observed success rate per tactic used (0.0..=1.0)
    pub tactic_rates: BTreeMap<TacticType, f32>,
    /// Observed performance per unit class (0.0..=1.0)
    pub group_performance: BTreeMap<UnitClass, f32>,
}

impl BattleOutcome {
    pub fn victory() -> Self {
        Self {
            victory: true,
            ..Default::default()
        }
    }

    pub fn defeat() -> Self {
        Self::default()
    }

    pub fn against_human(mut self) -> Self {
        self.against_human = true;
        self
    }

    pub fn with_tactic(mut self, tactic: TacticType, rate: f32) -> Self {
        self.tactic_rates.insert(tactic, rate);
        self
    }

    pub fn with_group(mut self, class: UnitClass, rate: f32) -> Self {
        self.group_performance.insert(class, rate);
        self
    }

    /// Copy with non-finite rates dropped and the rest clamped to 0.0..=1.0
    pub fn sanitized(&self) -> Self {
        Self {
            victory: self.victory,
            against_human: self.against_human,
            tactic_rates: usable_rates(&self.tactic_rates),
            group_performance: usable_rates(&self.group_performance),
        }
    }

    /// Whether every rate is already usable as reported
    pub fn is_clean(&self) -> bool {
        self.tactic_rates
            .values()
            .chain(self.group_performance.values())
            .all(|rate| (0.0..=1.0).contains(rate))
    }
}

fn usable_rates<K: Ord + Copy>(rates: &BTreeMap<K, f32>) -> BTreeMap<K, f32> {
    rates
        .iter()
        .filter(|(_, rate)| rate.is_finite())
        .map(|(&key, &rate)| (key, rate.clamp(0.0, 1.0)))
        .collect()
}

/// A commander's evolving personality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityModel {
    pub traits: PersonalityTraits,
    pub battles: u32,
    pub victories: u32,
    pub defeats: u32,
    pub consecutive_losses: u32,
    pub vendetta: bool,
    pub tactic_effectiveness: BTreeMap<TacticType, f32>,
    pub group_effectiveness: BTreeMap<UnitClass, f32>,
    pub label: String,
}

impl Default for PersonalityModel {
    fn default() -> Self {
        Self::with_traits(PersonalityTraits::default())
    }
}

impl PersonalityModel {
    pub fn with_traits(mut traits: PersonalityTraits) -> Self {
        traits.clamp();
        Self {
            traits,
            battles: 0,
            victories: 0,
            defeats: 0,
            consecutive_losses: 0,
            vendetta: false,
            tactic_effectiveness: TacticType::ALL
                .iter()
                .map(|&t| (t, NEUTRAL_EFFECTIVENESS))
                .collect(),
            group_effectiveness: UnitClass::ALL
                .iter()
                .map(|&c| (c, NEUTRAL_EFFECTIVENESS))
                .collect(),
            label: traits.label().to_string(),
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::with_traits(PersonalityTraits::random(rng))
    }

    pub fn effectiveness_of(&self, tactic: TacticType) -> f32 {
        self.tactic_effectiveness
            .get(&tactic)
            .copied()
            .unwrap_or(NEUTRAL_EFFECTIVENESS)
    }

    pub fn class_effectiveness_of(&self, class: UnitClass) -> f32 {
        self.group_effectiveness
            .get(&class)
            .copied()
            .unwrap_or(NEUTRAL_EFFECTIVENESS)
    }

    /// Model after one battle
    pub fn apply_outcome(&self, outcome: &BattleOutcome, config: &MemoryConfig) -> Self {
        let outcome = outcome.sanitized();
        let mut next = self.clone();
        let t = &mut next.traits;
        next.battles += 1;

        if outcome.victory {
            next.victories += 1;
            t.stubbornness += VICTORY_STUBBORNNESS;
            t.caution += VICTORY_CAUTION;
            next.consecutive_losses = 0;
            next.vendetta = false;
        } else {
            next.defeats += 1;
            t.adaptability += DEFEAT_ADAPTABILITY;
            t.caution += DEFEAT_CAUTION;
            t.stubbornness += DEFEAT_STUBBORNNESS;
            next.consecutive_losses += 1;
            if next.consecutive_losses >= config.vendetta_threshold {
                next.vendetta = true;
            }
        }
        if next.vendetta {
            t.aggressiveness = t.aggressiveness.max(VENDETTA_AGGRESSION);
        }
        t.clamp();

        let blend = config.effectiveness_blend;
        for (&tactic, &rate) in &outcome.tactic_rates {
            let old = next.effectiveness_of(tactic);
            next.tactic_effectiveness
                .insert(tactic, clamp_trait(old * (1.0 - blend) + rate * blend));
        }
        for (&class, &rate) in &outcome.group_performance {
            let old = next.class_effectiveness_of(class);
            next.group_effectiveness
                .insert(class, clamp_trait(old * (1.0 - blend) + rate * blend));
        }

        next.relabel();
        if next.vendetta && !self.vendetta {
            tracing::info!(
                "Vendetta after {} consecutive defeats ({})",
                next.consecutive_losses,
                next.label
            );
        }
        next
    }

    /// Model after crediting a single tactical decision
    ///
    /// Low adaptability shrinks the step proportionally.
    pub fn apply_tactical_decision(&self, tactic: TacticType, success: bool) -> Self {
        let mut next = self.clone();
        let mut step = if success { DECISION_STEP } else { -DECISION_STEP };
        if next.traits.adaptability < SLOW_LEARNER {
            step *= next.traits.adaptability / SLOW_LEARNER;
        }
        let value = clamp_trait(next.effectiveness_of(tactic) + step);
        next.tactic_effectiveness.insert(tactic, value);
        next
    }

    pub fn relabel(&mut self) {
        self.label = self.traits.label().to_string();
    }

    /// Best learned tactic, or one matching temperament if nothing is proven
    pub fn recommended_tactic(&self) -> TacticType {
        let best = self
            .tactic_effectiveness
            .iter()
            .fold(None, |best: Option<(TacticType, f32)>, (&t, &v)| match best {
                Some((_, b)) if b >= v => best,
                _ => Some((t, v)),
            });
        if let Some((tactic, value)) = best {
            if value >= PROVEN_TACTIC {
                return tactic;
            }
        }

        let t = &self.traits;
        if t.aggressiveness > STRONG_TRAIT {
            TacticType::Aggressive
        } else if t.flanking_preference > STRONG_TRAIT {
            TacticType::Flanking
        } else if t.caution > STRONG_TRAIT {
            TacticType::Defensive
        } else if t.creativity > STRONG_TRAIT {
            TacticType::Ambush
        } else if self.vendetta {
            TacticType::Aggressive
        } else {
            best.map_or(TacticType::Defensive, |(tactic, _)| tactic)
        }
    }

    pub fn preferred_terrain(&self) -> TerrainPreference {
        let t = &self.traits;
        if t.high_ground_preference > STRONG_TRAIT {
            TerrainPreference::Elevated
        } else if t.forest_preference > STRONG_TRAIT {
            TerrainPreference::Forested
        } else if t.open_field_preference > STRONG_TRAIT || t.mounted_preference > STRONG_TRAIT {
            TerrainPreference::Open
        } else {
            TerrainPreference::Balanced
        }
    }

    /// Per-class effectiveness, boosted for classes the commander favours
    pub fn class_effectiveness(&self) -> BTreeMap<UnitClass, f32> {
        UnitClass::ALL
            .iter()
            .map(|&class| {
                let mut value = self.class_effectiveness_of(class);
                let favoured = match class {
                    UnitClass::MountedMelee => self.traits.mounted_preference > STRONG_TRAIT,
                    UnitClass::Ranged => self.traits.ranged_preference > STRONG_TRAIT,
                    _ => false,
                };
                if favoured {
                    value = (value * PREFERRED_CLASS_BOOST).min(TRAIT_MAX);
                }
                (class, value)
            })
            .collect()
    }

    /// Arrangement this commander would put a class in by default
    pub fn recommended_arrangement(&self, class: UnitClass) -> Arrangement {
        match class {
            UnitClass::MeleeInfantry if self.traits.defense_preference > 0.6 => {
                Arrangement::ShieldWall
            }
            UnitClass::MeleeInfantry => Arrangement::Line,
            UnitClass::MountedMelee if self.traits.aggressiveness > 0.6 => Arrangement::Wedge,
            UnitClass::MountedMelee => Arrangement::Column,
            UnitClass::Ranged | UnitClass::MountedRanged => Arrangement::Loose,
        }
    }
}
