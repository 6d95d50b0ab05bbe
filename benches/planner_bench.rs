use battle_commander::battle::ai::{CommanderStance, TacticalPlanner};
use battle_commander::battle::{
    ArrangementSelector, BattlefieldGeometry, Side, TerrainFeatureMap, TerrainSampler, UnitClass,
    UnitGroup,
};
use battle_commander::core::TacticsConfig;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec2;

struct Rolling;

impl TerrainSampler for Rolling {
    fn height_at(&self, p: Vec2) -> Option<f32> {
        Some((p.x * 0.02).sin() * 6.0 + (p.y * 0.03).cos() * 4.0)
    }
    fn forest_density_at(&self, p: Vec2) -> Option<f32> {
        Some(((p.x * 0.01 + p.y * 0.015).sin() * 0.8).max(0.0))
    }
    fn is_water_at(&self, p: Vec2) -> Option<bool> {
        Some((p.x - 500.0).abs() < 6.0 && p.y > 200.0)
    }
}

fn geometry() -> BattlefieldGeometry {
    BattlefieldGeometry::new(Vec2::ZERO, Vec2::new(1000.0, 600.0))
}

fn army(x: f32, facing: Vec2, human: bool) -> Side {
    let groups = (0..12)
        .map(|i| {
            let class = UnitClass::ALL[i % UnitClass::ALL.len()];
            UnitGroup::new(class, 40, Vec2::new(x, 60.0 + i as f32 * 40.0)).with_facing(facing)
        })
        .collect();
    let side = Side::new(groups);
    if human {
        side.human()
    } else {
        side
    }
}

fn bench_terrain_analysis(c: &mut Criterion) {
    let config = TacticsConfig::default();
    c.bench_function("terrain_analyze_1000x600", |b| {
        b.iter(|| {
            let mut map = TerrainFeatureMap::new(config.terrain.clone());
            map.analyze(black_box(geometry()), &Rolling);
            black_box(map.features().len())
        })
    });
}

fn bench_planning_cycle(c: &mut Criterion) {
    let config = TacticsConfig::default();
    let mut terrain = TerrainFeatureMap::new(config.terrain.clone());
    terrain.analyze(geometry(), &Rolling);
    let own = army(250.0, Vec2::X, false);
    let enemy = army(750.0, -Vec2::X, true);
    let stance = CommanderStance {
        aggression: 0.6,
        vendetta: false,
    };

    c.bench_function("plan_12_vs_12", |b| {
        b.iter(|| {
            let mut planner = TacticalPlanner::new(config.planning.clone());
            let mut selector = ArrangementSelector::new(config.arrangement.clone());
            let plan = planner.plan(&own, &enemy, &terrain, &mut selector, &stance, 0.0);
            black_box(plan.actions.len())
        })
    });
}

criterion_group!(benches, bench_terrain_analysis, bench_planning_cycle);
criterion_main!(benches);
