//! Headless Battle Runner
//!
//! Runs a series of synthetic engagements against one AI commander on
//! procedural terrain and prints each plan summary plus the final memory
//! state as JSON. Movement and attrition here are a crude stand-in for a
//! real host simulation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use battle_commander::battle::ai::{
    BattleAI, BattleOutcome, CommanderMemoryStore, NemesisRecord, TacticType,
};
use battle_commander::battle::{
    ActionType, BattlefieldGeometry, CommanderSighting, Engagement, IntervalGate, Side, Strategy,
    TacticalPlan, TerrainSampler, UnitClass, UnitGroup,
};
use battle_commander::core::{load_config, TacticsConfig};
use clap::Parser;
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

const FIELD_WIDTH: f32 = 600.0;
const FIELD_HEIGHT: f32 = 400.0;
/// Seconds of simulated time per tick
const TICK_SECONDS: f32 = 1.0;
/// Distance inside which groups trade casualties
const CONTACT_RANGE: f32 = 25.0;
const MISSILE_RANGE: f32 = 90.0;

/// Headless Battle Runner - repeated engagements against one commander
#[derive(Parser, Debug)]
#[command(name = "battle_runner")]
#[command(about = "Run synthetic battles and print plans and commander memory")]
struct Args {
    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Number of engagements to fight
    #[arg(long, default_value_t = 5)]
    battles: u32,

    /// Ticks per engagement
    #[arg(long, default_value_t = 120)]
    ticks: u32,

    /// Commander memory file (kept in-process when omitted)
    #[arg(long)]
    memory: Option<PathBuf>,

    /// Identity of the AI commander
    #[arg(long, default_value = "lord_vex")]
    commander: String,

    /// Tactics config TOML
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// Rolling hills, a few groves and an optional river
struct ProceduralField {
    hills: Vec<(Vec2, f32, f32)>,
    groves: Vec<(Vec2, f32)>,
    river_x: Option<f32>,
}

impl ProceduralField {
    fn generate(rng: &mut ChaCha8Rng) -> Self {
        let point = |rng: &mut ChaCha8Rng| {
            Vec2::new(
                rng.gen_range(0.0..FIELD_WIDTH),
                rng.gen_range(0.0..FIELD_HEIGHT),
            )
        };
        let hills = (0..rng.gen_range(1..4))
            .map(|_| (point(rng), rng.gen_range(6.0..15.0), rng.gen_range(40.0..90.0)))
            .collect();
        let groves = (0..rng.gen_range(0..3))
            .map(|_| (point(rng), rng.gen_range(30.0..70.0)))
            .collect();
        let river_x = rng
            .gen_bool(0.3)
            .then(|| rng.gen_range(FIELD_WIDTH * 0.4..FIELD_WIDTH * 0.6));
        Self {
            hills,
            groves,
            river_x,
        }
    }
}

impl TerrainSampler for ProceduralField {
    fn height_at(&self, point: Vec2) -> Option<f32> {
        Some(
            self.hills
                .iter()
                .map(|&(center, height, spread)| {
                    height * (-(point.distance_squared(center)) / (spread * spread)).exp()
                })
                .sum(),
        )
    }

    fn forest_density_at(&self, point: Vec2) -> Option<f32> {
        Some(
            self.groves
                .iter()
                .map(|&(center, radius)| (1.0 - point.distance(center) / radius).max(0.0))
                .fold(0.0, f32::max),
        )
    }

    fn is_water_at(&self, point: Vec2) -> Option<bool> {
        Some(self.river_x.map_or(false, |x| (point.x - x).abs() < 8.0))
    }
}

#[derive(Serialize)]
struct PlanSummary {
    tick: u32,
    strategy: Strategy,
    actions: usize,
    offensive: usize,
}

#[derive(Serialize)]
struct BattleSummary {
    battle: u32,
    victory: bool,
    ai_survivors: u32,
    human_survivors: u32,
    strategies: BTreeMap<String, u32>,
    plans: Vec<PlanSummary>,
    commander: Option<NemesisRecord>,
}

#[derive(Serialize)]
struct RunSummary {
    seed: u64,
    battles: Vec<BattleSummary>,
    nemeses: Vec<NemesisRecord>,
}

fn army(rng: &mut ChaCha8Rng, origin: Vec2, facing: Vec2) -> Vec<UnitGroup> {
    let right = Vec2::new(facing.y, -facing.x);
    let mut groups = vec![
        UnitGroup::new(UnitClass::MeleeInfantry, rng.gen_range(30..70), origin),
        UnitGroup::new(UnitClass::Ranged, rng.gen_range(15..40), origin - facing * 25.0),
    ];
    if rng.gen_bool(0.7) {
        groups.push(UnitGroup::new(
            UnitClass::MountedMelee,
            rng.gen_range(10..30),
            origin + right * 60.0,
        ));
    }
    if rng.gen_bool(0.3) {
        groups.push(UnitGroup::new(
            UnitClass::MountedRanged,
            rng.gen_range(10..20),
            origin - right * 60.0,
        ));
    }
    groups.into_iter().map(|g| g.with_facing(facing)).collect()
}

fn speed(class: UnitClass) -> f32 {
    if class.is_mounted() {
        4.0
    } else {
        1.5
    }
}

/// Move AI groups toward their targets
fn advance(side: &mut Side, plan: &TacticalPlan) {
    for group in side.groups.iter_mut().filter(|g| g.is_active()) {
        let Some(action) = plan.action_for(group.id) else {
            group.moving = false;
            continue;
        };
        group.arrangement = action.arrangement;
        let to_target = action.target - group.position;
        let step = speed(group.class) * TICK_SECONDS;
        let moves = !matches!(action.action_type, ActionType::Hold | ActionType::FireAt)
            && to_target.length() > step;
        group.moving = moves;
        if moves {
            let dir = to_target.normalize_or_zero();
            group.position += dir * step;
            group.facing = dir;
        }
    }
}

/// Human side walks straight at the nearest AI group
fn human_advance(side: &mut Side, opposing: &Side) {
    for group in side.groups.iter_mut().filter(|g| g.is_active()) {
        if let Some(target) = opposing.closest_to(group.position) {
            let dir = (target.position - group.position).normalize_or_zero();
            if group.position.distance(target.position) > CONTACT_RANGE * 0.8 {
                group.position += dir * speed(group.class) * TICK_SECONDS;
                group.moving = true;
            } else {
                group.moving = false;
            }
            group.facing = dir;
        }
    }
}

/// Casualties each side inflicts this tick
fn attrition(rng: &mut ChaCha8Rng, a: &mut Side, b: &mut Side) {
    let damage = |attacker: &Side, defender: &UnitGroup| -> f32 {
        attacker
            .active_groups()
            .map(|g| {
                let d = g.position.distance(defender.position);
                let reach = if g.class.is_missile() {
                    MISSILE_RANGE
                } else {
                    CONTACT_RANGE
                };
                if d <= reach {
                    g.unit_count as f32 * 0.02 / defender.arrangement.traits().defensive.max(0.5)
                } else {
                    0.0
                }
            })
            .sum()
    };
    let hits_on_a: Vec<f32> = a.groups.iter().map(|g| damage(&*b, g)).collect();
    let hits_on_b: Vec<f32> = b.groups.iter().map(|g| damage(&*a, g)).collect();

    for (group, hits) in a.groups.iter_mut().zip(hits_on_a) {
        apply_losses(rng, group, hits);
    }
    for (group, hits) in b.groups.iter_mut().zip(hits_on_b) {
        apply_losses(rng, group, hits);
    }
}

fn apply_losses(rng: &mut ChaCha8Rng, group: &mut UnitGroup, hits: f32) {
    if hits <= 0.0 {
        return;
    }
    let losses = (hits * rng.gen_range(0.5..1.5)).round() as u32;
    group.unit_count = group.unit_count.saturating_sub(losses);
    group.average_health = (group.average_health - hits * 0.01).max(0.1);
}

fn fight(
    engagement: &mut Engagement,
    rng: &mut ChaCha8Rng,
    args: &Args,
    battle: u32,
) -> BattleSummary {
    let geometry = BattlefieldGeometry::new(Vec2::ZERO, Vec2::new(FIELD_WIDTH, FIELD_HEIGHT));
    let field = ProceduralField::generate(rng);
    let sighting = CommanderSighting::new(args.commander.as_str(), "Lord Vex", 100);
    engagement.begin(geometry, &field, Some(sighting));

    let mut ai = Side::new(army(rng, geometry.own_deployment, Vec2::X))
        .with_commander(args.commander.as_str());
    let mut human = Side::new(army(rng, geometry.enemy_deployment, -Vec2::X)).human();

    let mut plans = Vec::new();
    let mut strategies: BTreeMap<String, u32> = BTreeMap::new();
    let mut used: Vec<Strategy> = Vec::new();
    let mut last_created = None;
    let mut cadence = IntervalGate::new(engagement.config().general.update_interval);
    let mut plan = TacticalPlan::default();

    for tick in 0..args.ticks {
        let now = tick as f32 * TICK_SECONDS;
        if cadence.try_fire(now) {
            plan = engagement.process_tick(&ai, &human, now);
        }
        if last_created != Some(plan.created_at) && !plan.is_empty() {
            last_created = Some(plan.created_at);
            *strategies.entry(format!("{:?}", plan.strategy)).or_insert(0) += 1;
            if !used.contains(&plan.strategy) {
                used.push(plan.strategy);
            }
            plans.push(PlanSummary {
                tick,
                strategy: plan.strategy,
                actions: plan.actions.len(),
                offensive: plan
                    .actions
                    .iter()
                    .filter(|a| a.action_type.is_offensive_move())
                    .count(),
            });
        }

        advance(&mut ai, &plan);
        human_advance(&mut human, &ai);
        attrition(rng, &mut ai, &mut human);

        if ai.is_empty() || human.is_empty() {
            break;
        }
    }

    let (ai_left, human_left) = (ai.total_units(), human.total_units());
    let victory = ai_left > human_left;
    let survival = ai_left as f32 / (ai_left + human_left).max(1) as f32;

    let mut outcome = if victory {
        BattleOutcome::victory()
    } else {
        BattleOutcome::defeat()
    }
    .against_human();
    for strategy in used {
        outcome = outcome.with_tactic(TacticType::from(strategy), survival);
    }
    for class in UnitClass::ALL {
        if ai.has_class(class) {
            outcome = outcome.with_group(class, survival);
        }
    }

    let commander = engagement.end(&outcome);
    tracing::info!(
        "Battle {}: {} ({} vs {} left)",
        battle,
        if victory { "victory" } else { "defeat" },
        ai_left,
        human_left
    );

    BattleSummary {
        battle,
        victory,
        ai_survivors: ai_left,
        human_survivors: human_left,
        strategies,
        plans,
        commander,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => TacticsConfig::default(),
    };
    if args.memory.is_some() {
        config.memory.path = args.memory.clone();
    }
    config.memory.seed = Some(seed);

    let memory = CommanderMemoryStore::load(config.memory.clone());
    let mut engagement = Engagement::new(config, memory.clone());

    let battles = (1..=args.battles)
        .map(|battle| fight(&mut engagement, &mut rng, &args, battle))
        .collect();

    let summary = RunSummary {
        seed,
        battles,
        nemeses: memory.nemeses(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
