//! One engagement from the AI side's point of view
//!
//! Owns the per-engagement services (terrain map, arrangement selector,
//! planner) and a handle to the process-wide commander memory. Ending or
//! cancelling an engagement drops every per-engagement cache; memory is
//! only touched by [`Engagement::end`].

use crate::battle::ai::assessment::CommanderStance;
use crate::battle::ai::memory::CommanderMemoryStore;
use crate::battle::ai::nemesis::NemesisRecord;
use crate::battle::ai::personality::BattleOutcome;
use crate::battle::ai::planner::TacticalPlanner;
use crate::battle::ai::BattleAI;
use crate::battle::arrangement::ArrangementSelector;
use crate::battle::orders::TacticalPlan;
use crate::battle::terrain::{BattlefieldGeometry, TerrainFeatureMap, TerrainSampler};
use crate::battle::units::Side;
use crate::core::config::TacticsConfig;
use crate::core::types::{CommanderId, SimTime};

/// The acting commander as the host knows them at battle start
#[derive(Debug, Clone, PartialEq)]
pub struct CommanderSighting {
    pub id: CommanderId,
    pub name: String,
    pub party_strength: u32,
}

impl CommanderSighting {
    pub fn new(id: impl Into<CommanderId>, name: impl Into<String>, party_strength: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            party_strength,
        }
    }
}

pub struct Engagement {
    config: TacticsConfig,
    terrain: TerrainFeatureMap,
    selector: ArrangementSelector,
    planner: TacticalPlanner,
    memory: CommanderMemoryStore,
    commander: Option<CommanderId>,
    composition_recorded: bool,
}

impl Engagement {
    pub fn new(config: TacticsConfig, memory: CommanderMemoryStore) -> Self {
        Self {
            terrain: Self::fresh_terrain(&config),
            selector: ArrangementSelector::new(config.arrangement.clone())
                .with_general(&config.general),
            planner: TacticalPlanner::new(config.planning.clone()),
            memory,
            commander: None,
            composition_recorded: false,
            config,
        }
    }

    fn fresh_terrain(config: &TacticsConfig) -> TerrainFeatureMap {
        TerrainFeatureMap::new(config.terrain.clone())
            .with_high_ground_preference(config.general.prefer_high_ground)
    }

    fn memory_enabled(&self) -> bool {
        self.config.general.enabled && self.config.general.use_commander_memory
    }

    /// Analyze the field and identify who is in command
    pub fn begin(
        &mut self,
        geometry: BattlefieldGeometry,
        sampler: &dyn TerrainSampler,
        commander: Option<CommanderSighting>,
    ) {
        if !self.config.general.enabled {
            tracing::debug!("Tactical AI disabled, engagement not analyzed");
            return;
        }
        self.terrain.analyze(geometry, sampler);

        self.commander = commander.map(|sighting| {
            if self.memory_enabled() {
                self.memory
                    .identify(&sighting.id, &sighting.name, sighting.party_strength);
            }
            sighting.id
        });
    }

    /// Stance the planner uses this tick
    pub fn stance(&self) -> CommanderStance {
        let base = self.config.general.base_aggression();
        match (&self.commander, self.memory_enabled()) {
            (Some(id), true) => self.memory.stance_for(id, base),
            _ => CommanderStance {
                aggression: base,
                vendetta: false,
            },
        }
    }

    /// Current plan for `side`; cheap between re-plans
    pub fn tick(&mut self, side: &Side, opposing: &Side, now: SimTime) -> TacticalPlan {
        if !self.config.general.enabled {
            return TacticalPlan {
                created_at: now,
                ..Default::default()
            };
        }

        if opposing.is_human && !self.composition_recorded && self.memory_enabled() {
            self.memory.record_opponent_composition(opposing);
            self.composition_recorded = true;
        }

        let stance = self.stance();
        self.planner.plan(
            side,
            opposing,
            &self.terrain,
            &mut self.selector,
            &stance,
            now,
        )
    }

    /// Record the result, persist memory and clear per-engagement state
    pub fn end(&mut self, outcome: &BattleOutcome) -> Option<NemesisRecord> {
        let updated = match (&self.commander, self.memory_enabled()) {
            (Some(id), true) => self.memory.record_outcome(id, outcome),
            _ => None,
        };
        if updated.is_some() {
            if let Err(e) = self.memory.save() {
                tracing::warn!("Failed to save commander memory: {}", e);
            }
        }
        self.reset();
        updated
    }

    /// Drop per-engagement caches; the shared memory is left alone
    pub fn reset(&mut self) {
        self.terrain = Self::fresh_terrain(&self.config);
        self.selector.reset();
        self.planner.reset();
        self.commander = None;
        self.composition_recorded = false;
    }

    pub fn terrain(&self) -> &TerrainFeatureMap {
        &self.terrain
    }

    pub fn planner(&self) -> &TacticalPlanner {
        &self.planner
    }

    pub fn selector(&self) -> &ArrangementSelector {
        &self.selector
    }

    pub fn memory(&self) -> &CommanderMemoryStore {
        &self.memory
    }

    pub fn commander(&self) -> Option<&CommanderId> {
        self.commander.as_ref()
    }

    pub fn config(&self) -> &TacticsConfig {
        &self.config
    }
}

impl BattleAI for Engagement {
    fn process_tick(&mut self, side: &Side, opposing: &Side, now: SimTime) -> TacticalPlan {
        self.tick(side, opposing, now)
    }

    fn stance(&self) -> CommanderStance {
        Engagement::stance(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::units::{Arrangement, UnitClass, UnitGroup};
    use crate::core::config::{GeneralConfig, MemoryConfig};
    use glam::Vec2;

    struct Flat;

    impl TerrainSampler for Flat {
        fn height_at(&self, _: Vec2) -> Option<f32> {
            Some(0.0)
        }
        fn forest_density_at(&self, _: Vec2) -> Option<f32> {
            Some(0.0)
        }
        fn is_water_at(&self, _: Vec2) -> Option<bool> {
            Some(false)
        }
    }

    fn engagement(config: TacticsConfig) -> Engagement {
        let memory = CommanderMemoryStore::new(MemoryConfig {
            seed: Some(3),
            ..Default::default()
        });
        Engagement::new(config, memory)
    }

    fn geometry() -> BattlefieldGeometry {
        BattlefieldGeometry::new(Vec2::ZERO, Vec2::new(400.0, 200.0))
    }

    fn sides() -> (Side, Side) {
        let own = Side::new(vec![
            UnitGroup::new(UnitClass::MeleeInfantry, 40, Vec2::new(100.0, 100.0)).with_facing(Vec2::X),
            UnitGroup::new(UnitClass::Ranged, 20, Vec2::new(80.0, 100.0)).with_facing(Vec2::X),
        ])
        .with_commander("lord");
        let enemy = Side::new(vec![UnitGroup::new(
            UnitClass::MeleeInfantry,
            50,
            Vec2::new(300.0, 100.0),
        )
        .with_facing(-Vec2::X)])
        .human();
        (own, enemy)
    }

    #[test]
    fn test_begin_identifies_commander() {
        let mut e = engagement(TacticsConfig::default());
        e.begin(geometry(), &Flat, Some(CommanderSighting::new("lord", "Lord", 60)));
        assert!(e.terrain().is_analyzed());
        assert_eq!(e.memory().len(), 1);
        assert_eq!(e.commander(), Some(&CommanderId::from("lord")));
    }

    #[test]
    fn test_tick_plans_every_group() {
        let mut e = engagement(TacticsConfig::default());
        e.begin(geometry(), &Flat, Some(CommanderSighting::new("lord", "Lord", 60)));
        let (own, enemy) = sides();
        let plan = e.tick(&own, &enemy, 0.0);
        assert_eq!(plan.actions.len(), 2);
        assert_eq!(e.memory().opponent_analysis().fielded.get(&UnitClass::MeleeInfantry), Some(&50));
    }

    fn contact_arrangements(general: GeneralConfig) -> (Arrangement, Arrangement) {
        let mut config = TacticsConfig::default();
        config.general = general;
        let mut e = engagement(config);
        e.begin(geometry(), &Flat, None);

        let own = Side::new(vec![
            UnitGroup::new(UnitClass::MeleeInfantry, 40, Vec2::new(100.0, 100.0)).with_facing(Vec2::X),
            UnitGroup::new(UnitClass::MountedMelee, 20, Vec2::new(100.0, 160.0)).with_facing(Vec2::X),
        ]);
        // one block in contact with the infantry, one straight down the cavalry's lane
        let enemy = Side::new(vec![
            UnitGroup::new(UnitClass::MeleeInfantry, 30, Vec2::new(140.0, 100.0)).with_facing(-Vec2::X),
            UnitGroup::new(UnitClass::MeleeInfantry, 30, Vec2::new(170.0, 160.0)).with_facing(-Vec2::X),
        ])
        .human();

        let plan = e.tick(&own, &enemy, 0.0);
        let infantry = plan.action_for(own.groups[0].id).unwrap().arrangement;
        let cavalry = plan.action_for(own.groups[1].id).unwrap().arrangement;
        (infantry, cavalry)
    }

    #[test]
    fn test_default_config_follows_arrangement_table() {
        let general = GeneralConfig {
            aggressiveness: 55,
            ..Default::default()
        };
        let (infantry, cavalry) = contact_arrangements(general);
        assert_eq!(infantry, Arrangement::Line);
        // 0.55 is below the 0.6 wedge gate
        assert_eq!(cavalry, Arrangement::Column);
    }

    #[test]
    fn test_opt_in_habits_change_arrangements() {
        let general = GeneralConfig {
            aggressiveness: 55,
            aggressive_cavalry: true,
            defensive_infantry: true,
            ..Default::default()
        };
        let (infantry, cavalry) = contact_arrangements(general);
        assert_eq!(infantry, Arrangement::ShieldWall);
        assert_eq!(cavalry, Arrangement::Wedge);
    }

    #[test]
    fn test_disabled_engine_plans_nothing() {
        let mut config = TacticsConfig::default();
        config.general.enabled = false;
        let mut e = engagement(config);
        e.begin(geometry(), &Flat, Some(CommanderSighting::new("lord", "Lord", 60)));
        let (own, enemy) = sides();
        assert!(e.tick(&own, &enemy, 0.0).is_empty());
        assert!(e.memory().is_empty());
    }

    #[test]
    fn test_memory_off_uses_base_aggression() {
        let mut config = TacticsConfig::default();
        config.general.use_commander_memory = false;
        config.general.aggressiveness = 80;
        let mut e = engagement(config);
        e.begin(geometry(), &Flat, Some(CommanderSighting::new("lord", "Lord", 60)));
        assert!(e.memory().is_empty());
        assert_eq!(e.stance().aggression, 0.8);
        assert!(e.end(&BattleOutcome::defeat()).is_none());
    }

    #[test]
    fn test_end_records_and_resets() {
        let mut e = engagement(TacticsConfig::default());
        e.begin(geometry(), &Flat, Some(CommanderSighting::new("lord", "Lord", 60)));
        let (own, enemy) = sides();
        e.tick(&own, &enemy, 0.0);

        let record = e.end(&BattleOutcome::defeat().against_human()).unwrap();
        assert_eq!(record.defeats, 1);
        assert!(!e.terrain().is_analyzed());
        assert!(e.planner().current_plan().is_none());
        assert!(e.commander().is_none());
        assert_eq!(e.memory().history().len(), 1);
    }

    #[test]
    fn test_reset_leaves_other_engagements_alone() {
        let memory = CommanderMemoryStore::new(MemoryConfig {
            seed: Some(3),
            ..Default::default()
        });
        let mut first = Engagement::new(TacticsConfig::default(), memory.clone());
        let mut second = Engagement::new(TacticsConfig::default(), memory.clone());

        first.begin(geometry(), &Flat, Some(CommanderSighting::new("lord", "Lord", 60)));
        second.reset();

        assert_eq!(first.commander(), Some(&CommanderId::from("lord")));
        assert_eq!(memory.current().map(|r| r.id), Some(CommanderId::from("lord")));
    }

    #[test]
    fn test_reset_keeps_memory() {
        let mut e = engagement(TacticsConfig::default());
        e.begin(geometry(), &Flat, Some(CommanderSighting::new("lord", "Lord", 60)));
        e.reset();
        assert_eq!(e.memory().len(), 1);
        assert!(e.memory().history().is_empty());
    }
}
