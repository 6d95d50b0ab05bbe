//! Engagement integration tests

use battle_commander::battle::ai::*;
use battle_commander::battle::*;
use battle_commander::core::config::MemoryConfig;
use battle_commander::core::types::CommanderId;
use battle_commander::core::TacticsConfig;
use glam::Vec2;
use uuid::Uuid;

/// One round hill on otherwise flat, clear ground
struct Hill {
    center: Vec2,
    height: f32,
    spread: f32,
}

impl TerrainSampler for Hill {
    fn height_at(&self, point: Vec2) -> Option<f32> {
        let d2 = point.distance_squared(self.center);
        Some(self.height * (-d2 / (self.spread * self.spread)).exp())
    }
    fn forest_density_at(&self, _: Vec2) -> Option<f32> {
        Some(0.0)
    }
    fn is_water_at(&self, _: Vec2) -> Option<bool> {
        Some(false)
    }
}

fn hill() -> Hill {
    // on a sample point so the peak lands on one cell
    Hill {
        center: Vec2::new(150.0, 110.0),
        height: 20.0,
        spread: 50.0,
    }
}

fn geometry() -> BattlefieldGeometry {
    BattlefieldGeometry::new(Vec2::ZERO, Vec2::new(600.0, 200.0))
}

fn seeded_memory(path: Option<std::path::PathBuf>) -> CommanderMemoryStore {
    CommanderMemoryStore::new(MemoryConfig {
        seed: Some(11),
        path,
        ..Default::default()
    })
}

fn weak_side() -> Side {
    Side::new(vec![
        UnitGroup::new(UnitClass::MeleeInfantry, 20, Vec2::new(150.0, 100.0)).with_facing(Vec2::X),
        UnitGroup::new(UnitClass::Ranged, 10, Vec2::new(130.0, 100.0)).with_facing(Vec2::X),
    ])
    .with_commander("warlord")
}

fn strong_human() -> Side {
    Side::new(vec![
        UnitGroup::new(UnitClass::MeleeInfantry, 40, Vec2::new(450.0, 100.0)).with_facing(-Vec2::X),
        UnitGroup::new(UnitClass::Ranged, 20, Vec2::new(470.0, 100.0)).with_facing(-Vec2::X),
    ])
    .human()
}

fn temp_memory_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("commander-memory-{}.json", Uuid::new_v4()))
}

#[test]
fn test_hill_is_found_and_used() {
    let mut e = Engagement::new(TacticsConfig::default(), seeded_memory(None));
    e.begin(geometry(), &hill(), None);

    assert!(e.terrain().has_feature(FeatureKind::HighGround));
    assert!(e.terrain().is_within(Vec2::new(150.0, 110.0), FeatureKind::HighGround));

    let positions = e.terrain().optimal_positions_for(UnitClass::Ranged);
    assert!(!positions.is_empty());
    assert!(positions.len() <= 3);
}

#[test]
fn test_outnumbered_on_hill_defends() {
    let mut e = Engagement::new(TacticsConfig::default(), seeded_memory(None));
    e.begin(geometry(), &hill(), None);

    // no grudge: a hill closer to us turns retreat into a stand
    let plan = e.tick(&weak_side(), &strong_human(), 0.0);
    assert_eq!(plan.strategy, Strategy::Defensive);
    assert_eq!(plan.actions.len(), 2);
}

#[test]
fn test_plan_is_cached_between_cycles() {
    let mut e = Engagement::new(TacticsConfig::default(), seeded_memory(None));
    e.begin(geometry(), &hill(), None);
    let (own, enemy) = (weak_side(), strong_human());

    let first = e.tick(&own, &enemy, 0.0);
    let again = e.tick(&own, &enemy, 2.0);
    assert_eq!(first.created_at, again.created_at);

    let later = e.tick(&own, &enemy, 6.0);
    assert_eq!(later.created_at, 6.0);
}

#[test]
fn test_driven_through_trait_object() {
    let mut e = Engagement::new(TacticsConfig::default(), seeded_memory(None));
    e.begin(
        geometry(),
        &hill(),
        Some(CommanderSighting::new("warlord", "The Warlord", 80)),
    );

    let ai: &mut dyn BattleAI = &mut e;
    let plan = ai.process_tick(&weak_side(), &strong_human(), 0.0);
    assert!(!plan.is_empty());
    assert!(!ai.stance().vendetta);
}

#[test]
fn test_repeated_defeats_start_a_vendetta() {
    let mut e = Engagement::new(TacticsConfig::default(), seeded_memory(None));
    let (own, enemy) = (weak_side(), strong_human());
    let flat = Hill {
        center: Vec2::ZERO,
        height: 0.0,
        spread: 1.0,
    };
    let sighting = || Some(CommanderSighting::new("warlord", "The Warlord", 80));

    e.begin(geometry(), &flat, sighting());
    assert_eq!(e.tick(&own, &enemy, 0.0).strategy, Strategy::Retreat);
    e.end(&BattleOutcome::defeat().against_human());

    e.begin(geometry(), &flat, sighting());
    e.end(&BattleOutcome::defeat().against_human());
    e.begin(geometry(), &flat, sighting());
    let record = e.end(&BattleOutcome::defeat().against_human()).unwrap();
    assert!(record.vendetta);
    assert_eq!(record.defeats, 3);

    e.begin(geometry(), &flat, sighting());
    let stance = e.stance();
    assert!(stance.vendetta);
    assert!(stance.aggression >= 0.7);

    // the grudge overrides the numbers
    assert_eq!(e.tick(&own, &enemy, 0.0).strategy, Strategy::Aggressive);

    // a grudge is only held against the human player
    let ai_enemy = Side::new(enemy.groups.clone());
    e.reset();
    e.begin(geometry(), &flat, sighting());
    assert_eq!(e.tick(&own, &ai_enemy, 0.0).strategy, Strategy::Retreat);
}

#[test]
fn test_victory_ends_vendetta() {
    let mut e = Engagement::new(TacticsConfig::default(), seeded_memory(None));
    let flat = Hill {
        center: Vec2::ZERO,
        height: 0.0,
        spread: 1.0,
    };
    let sighting = || Some(CommanderSighting::new("warlord", "The Warlord", 80));

    for _ in 0..3 {
        e.begin(geometry(), &flat, sighting());
        e.end(&BattleOutcome::defeat().against_human());
    }
    e.begin(geometry(), &flat, sighting());
    let record = e.end(&BattleOutcome::victory().against_human()).unwrap();

    assert!(!record.vendetta);
    assert_eq!(record.personality.consecutive_losses, 0);
    assert_eq!(e.memory().with_vendetta().len(), 0);
}

#[test]
fn test_memory_survives_restart() {
    let path = temp_memory_path();
    {
        let mut e = Engagement::new(TacticsConfig::default(), seeded_memory(Some(path.clone())));
        e.begin(
            geometry(),
            &hill(),
            Some(CommanderSighting::new("warlord", "The Warlord", 80)),
        );
        e.tick(&weak_side(), &strong_human(), 0.0);
        e.end(
            &BattleOutcome::victory()
                .against_human()
                .with_tactic(TacticType::Defensive, 0.9),
        );
    }
    assert!(path.exists());

    let restored = CommanderMemoryStore::try_load(MemoryConfig {
        path: Some(path.clone()),
        ..Default::default()
    })
    .unwrap();
    let record = restored.record(&CommanderId::from("warlord")).unwrap();
    assert_eq!(record.name, "The Warlord");
    assert_eq!(record.victories, 1);
    assert!(record.personality.effectiveness_of(TacticType::Defensive) > 0.5);
    assert_eq!(restored.history().len(), 1);
    assert_eq!(
        restored
            .opponent_analysis()
            .fielded
            .get(&UnitClass::MeleeInfantry),
        Some(&40)
    );

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_corrupt_memory_starts_fresh() {
    let path = temp_memory_path();
    std::fs::write(&path, "{ not json").unwrap();
    let config = MemoryConfig {
        path: Some(path.clone()),
        ..Default::default()
    };

    assert!(CommanderMemoryStore::try_load(config.clone()).is_err());
    assert!(CommanderMemoryStore::load(config).is_empty());

    let _ = std::fs::remove_file(&path);
}
