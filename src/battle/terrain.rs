//! Terrain analysis: raw battlefield geometry into tactical features
//!
//! The field is sampled once per engagement on a regular grid through the
//! host's `TerrainSampler`. Samples are clustered into typed features, and
//! each unit class gets a short ranked list of recommended positions.

use ahash::AHashMap;
use glam::{Vec2, Vec3};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::battle::units::UnitClass;
use crate::core::config::TerrainConfig;
use crate::core::types::{direction_or, right_of};

/// Hard cap on grid cells per axis; spacing widens to respect it
const MAX_GRID_DIM: usize = 256;

/// Ranged troops stand this far behind a chokepoint they cover
const CHOKEPOINT_SUPPORT_DEPTH: f32 = 15.0;

/// Flank-approach feature extent
const FLANK_APPROACH_RADIUS: f32 = 30.0;

/// High-ground value (meters above mean) that counts as full strength
const HIGH_GROUND_FULL_HEIGHT: f32 = 10.0;

/// Open-field radius that counts as full strength
const OPEN_FIELD_FULL_RADIUS: f32 = 50.0;

/// Score multiplier for high ground when the commander prefers it
const HIGH_GROUND_PREFERENCE: f32 = 1.2;

/// Host queries for the ground under a point
///
/// Every query may fail (`None`) when the host has no navigable surface
/// there; such samples are skipped.
pub trait TerrainSampler: Sync {
    /// Ground height at a point
    fn height_at(&self, point: Vec2) -> Option<f32>;
    /// Tree density at a point (0.0 = clear, 1.0 = impenetrable)
    fn forest_density_at(&self, point: Vec2) -> Option<f32>;
    /// Whether the point is under water
    fn is_water_at(&self, point: Vec2) -> Option<bool>;
}

/// Tactical feature categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    HighGround,
    Chokepoint,
    Forest,
    Water,
    OpenField,
    FlankApproach,
}

impl FeatureKind {
    /// Affinity range of a class for this feature; `None` is neutral
    ///
    /// The actual affinity interpolates across the range by feature strength.
    pub fn affinity_range(&self, class: UnitClass) -> Option<(f32, f32)> {
        use FeatureKind::*;
        use UnitClass::*;
        match (self, class) {
            (HighGround, MeleeInfantry) => Some((0.5, 1.0)),
            (HighGround, Ranged) => Some((0.7, 1.0)),
            (Chokepoint, MeleeInfantry) => Some((0.6, 1.0)),
            (Chokepoint, Ranged) => Some((0.4, 0.6)),
            (Forest, MeleeInfantry) => Some((0.4, 0.7)),
            (Forest, Ranged) => Some((-0.2, 0.0)),
            (Forest, MountedMelee) => Some((-0.9, -0.7)),
            (Forest, MountedRanged) => Some((-0.6, -0.4)),
            (OpenField, MeleeInfantry) => Some((-0.3, -0.1)),
            (OpenField, MountedMelee) => Some((0.6, 1.0)),
            (OpenField, MountedRanged) => Some((0.5, 0.8)),
            (FlankApproach, MountedMelee) => Some((0.7, 1.0)),
            (FlankApproach, MountedRanged) => Some((0.6, 0.8)),
            (Water, MeleeInfantry) => Some((-0.8, -0.5)),
            (Water, MountedMelee) => Some((-1.0, -0.8)),
            (Water, MountedRanged) => Some((-0.7, -0.5)),
            _ => None,
        }
    }

    pub fn affinity(&self, class: UnitClass, strength: f32) -> Option<f32> {
        self.affinity_range(class)
            .map(|(low, high)| low + (high - low) * strength.clamp(0.0, 1.0))
    }
}

/// One identified feature; immutable once analysis finishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainFeature {
    pub kind: FeatureKind,
    /// Ground-plane x/y with height in z
    pub anchor: Vec3,
    pub radius: f32,
    /// Height above mean, density, narrowness, or importance by kind
    pub value: f32,
    pub label: String,
}

impl TerrainFeature {
    pub fn ground_position(&self) -> Vec2 {
        self.anchor.truncate()
    }

    /// `value` mapped onto 0.0..=1.0
    pub fn strength(&self) -> f32 {
        match self.kind {
            FeatureKind::HighGround => (self.value / HIGH_GROUND_FULL_HEIGHT).min(1.0),
            FeatureKind::OpenField => (self.radius / OPEN_FIELD_FULL_RADIUS).min(1.0),
            _ => self.value.clamp(0.0, 1.0),
        }
    }

    pub fn covers(&self, point: Vec2) -> bool {
        self.ground_position().distance(point) <= self.radius
    }
}

/// Overall character of the field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TerrainProfile {
    #[default]
    Plains,
    Forest,
    Hills,
    River,
}

/// Bounds of the field plus where each side deployed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BattlefieldGeometry {
    pub min: Vec2,
    pub max: Vec2,
    /// Deployment center of the side this map advises
    pub own_deployment: Vec2,
    pub enemy_deployment: Vec2,
}

impl BattlefieldGeometry {
    /// Bounds with deployments at a quarter and three quarters of the width
    pub fn new(min: Vec2, max: Vec2) -> Self {
        let size = max - min;
        Self {
            min,
            max,
            own_deployment: min + Vec2::new(size.x * 0.25, size.y * 0.5),
            enemy_deployment: min + Vec2::new(size.x * 0.75, size.y * 0.5),
        }
    }

    pub fn with_deployments(mut self, own: Vec2, enemy: Vec2) -> Self {
        self.own_deployment = own;
        self.enemy_deployment = enemy;
        self
    }

    pub fn size(&self) -> Vec2 {
        (self.max - self.min).max(Vec2::ZERO)
    }

    /// Unit direction from own deployment toward the enemy
    pub fn axis(&self) -> Vec2 {
        direction_or(self.enemy_deployment - self.own_deployment, Vec2::X)
    }

    /// Unit direction to the right of the axis
    pub fn lateral(&self) -> Vec2 {
        right_of(self.axis())
    }

    /// Extent of the field along the battle axis
    pub fn length(&self) -> f32 {
        let size = self.size();
        let axis = self.axis();
        (size.x * axis.x.abs() + size.y * axis.y.abs()).max(1.0)
    }

    /// Extent of the field across the battle axis
    pub fn width(&self) -> f32 {
        let size = self.size();
        let lateral = self.lateral();
        (size.x * lateral.x.abs() + size.y * lateral.y.abs()).max(1.0)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn clamp(&self, point: Vec2) -> Vec2 {
        point.clamp(self.min, self.max.max(self.min))
    }

    pub fn front_line(&self) -> Vec2 {
        self.own_deployment + self.axis() * self.length() * 0.2
    }

    pub fn rear_line(&self) -> Vec2 {
        self.own_deployment - self.axis() * self.length() * 0.1
    }

    pub fn left_flank(&self) -> Vec2 {
        self.front_line() - self.lateral() * self.width() * 0.3
    }

    pub fn right_flank(&self) -> Vec2 {
        self.front_line() + self.lateral() * self.width() * 0.3
    }

    /// Station for mobile missile troops, behind the line on the left
    pub fn mobile_position(&self) -> Vec2 {
        self.rear_line() - self.lateral() * self.width() * 0.2
    }

    /// Geometric fallback position for a class
    pub fn default_position(&self, class: UnitClass) -> Vec2 {
        let position = match class {
            UnitClass::MeleeInfantry => self.front_line(),
            UnitClass::Ranged => self.rear_line(),
            UnitClass::MountedMelee => self.right_flank(),
            UnitClass::MountedRanged => self.mobile_position(),
        };
        self.clamp(position)
    }

    /// Linear falloff from 1.0 at the front line to 0.0 at half the length
    pub fn relevance(&self, point: Vec2) -> f32 {
        let distance = point.distance(self.front_line());
        1.0 - (distance / (self.length() * 0.5)).min(1.0)
    }
}

/// A recommended position and how strongly it is recommended
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredPosition {
    pub position: Vec2,
    pub score: f32,
    pub kind: FeatureKind,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    height: f32,
    forest: f32,
    water: bool,
}

/// Sampled field, row-major
struct SampleGrid {
    origin: Vec2,
    spacing: f32,
    cols: usize,
    rows: usize,
    cells: Vec<Option<Sample>>,
}

impl SampleGrid {
    fn build(geometry: &BattlefieldGeometry, spacing: f32, sampler: &dyn TerrainSampler) -> Self {
        let size = geometry.size();
        let spacing = spacing
            .max(size.x / MAX_GRID_DIM as f32)
            .max(size.y / MAX_GRID_DIM as f32)
            .max(f32::EPSILON);
        let cols = ((size.x / spacing).ceil() as usize).clamp(1, MAX_GRID_DIM);
        let rows = ((size.y / spacing).ceil() as usize).clamp(1, MAX_GRID_DIM);
        let origin = geometry.min;

        let cells = (0..cols * rows)
            .into_par_iter()
            .map(|index| {
                let point = cell_point(origin, spacing, index % cols, index / cols);
                let height = sampler.height_at(point)?;
                Some(Sample {
                    height,
                    forest: sampler.forest_density_at(point).unwrap_or(0.0),
                    water: sampler.is_water_at(point).unwrap_or(false),
                })
            })
            .collect();

        Self {
            origin,
            spacing,
            cols,
            rows,
            cells,
        }
    }

    fn point(&self, index: usize) -> Vec2 {
        cell_point(self.origin, self.spacing, index % self.cols, index / self.cols)
    }

    fn get(&self, col: usize, row: usize) -> Option<&Sample> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.cells[row * self.cols + col].as_ref()
    }

    fn cell_at(&self, point: Vec2) -> Option<&Sample> {
        let local = (point - self.origin) / self.spacing;
        if local.x < 0.0 || local.y < 0.0 {
            return None;
        }
        self.get(local.x as usize, local.y as usize)
    }

    /// Indices of in-bounds neighbours (4- or 8-connected)
    fn neighbours(&self, index: usize, diagonal: bool) -> Vec<usize> {
        let col = (index % self.cols) as isize;
        let row = (index / self.cols) as isize;
        let mut out = Vec::with_capacity(8);
        for dr in -1isize..=1 {
            for dc in -1isize..=1 {
                if (dr == 0 && dc == 0) || (!diagonal && dr != 0 && dc != 0) {
                    continue;
                }
                let (c, r) = (col + dc, row + dr);
                if c >= 0 && r >= 0 && (c as usize) < self.cols && (r as usize) < self.rows {
                    out.push(r as usize * self.cols + c as usize);
                }
            }
        }
        out
    }

    /// 4-connected clusters of resolved cells matching `pred`
    fn clusters(&self, pred: impl Fn(&Sample) -> bool) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.cells.len()];
        let mut clusters = Vec::new();

        for start in 0..self.cells.len() {
            if visited[start] || !self.cells[start].as_ref().is_some_and(&pred) {
                continue;
            }
            visited[start] = true;
            let mut stack = vec![start];
            let mut members = Vec::new();
            while let Some(index) = stack.pop() {
                members.push(index);
                for next in self.neighbours(index, false) {
                    if !visited[next] && self.cells[next].as_ref().is_some_and(&pred) {
                        visited[next] = true;
                        stack.push(next);
                    }
                }
            }
            clusters.push(members);
        }
        clusters
    }

    fn resolved(&self) -> impl Iterator<Item = &Sample> {
        self.cells.iter().flatten()
    }
}

fn cell_point(origin: Vec2, spacing: f32, col: usize, row: usize) -> Vec2 {
    origin + Vec2::new(col as f32 + 0.5, row as f32 + 0.5) * spacing
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Passage {
    Open,
    Blocked,
    Unknown,
}

/// Per-engagement terrain analysis with cached queries
#[derive(Debug, Clone)]
pub struct TerrainFeatureMap {
    config: TerrainConfig,
    prefer_high_ground: bool,
    geometry: Option<BattlefieldGeometry>,
    features: Option<Vec<TerrainFeature>>,
    positions: AHashMap<UnitClass, Vec<ScoredPosition>>,
    profile: TerrainProfile,
    skipped_samples: usize,
}

impl TerrainFeatureMap {
    pub fn new(config: TerrainConfig) -> Self {
        Self {
            config,
            prefer_high_ground: false,
            geometry: None,
            features: None,
            positions: AHashMap::new(),
            profile: TerrainProfile::default(),
            skipped_samples: 0,
        }
    }

    pub fn with_high_ground_preference(mut self, prefer: bool) -> Self {
        self.prefer_high_ground = prefer;
        self
    }

    pub fn is_analyzed(&self) -> bool {
        self.features.is_some()
    }

    pub fn geometry(&self) -> Option<&BattlefieldGeometry> {
        self.geometry.as_ref()
    }

    /// Samples the host could not resolve during analysis
    pub fn skipped_samples(&self) -> usize {
        self.skipped_samples
    }

    /// Scan the field once; later calls return the cached features
    pub fn analyze(
        &mut self,
        geometry: BattlefieldGeometry,
        sampler: &dyn TerrainSampler,
    ) -> &[TerrainFeature] {
        if self.features.is_none() {
            let features = self.scan(&geometry, sampler);
            self.geometry = Some(geometry);
            self.positions = UnitClass::ALL
                .iter()
                .map(|&class| (class, self.score_positions(&geometry, &features, class)))
                .collect();
            tracing::info!(
                "Terrain analyzed: {} features, profile {:?}, {} samples skipped",
                features.len(),
                self.profile,
                self.skipped_samples
            );
            self.features = Some(features);
        } else {
            tracing::trace!("Terrain already analyzed, using cached features");
        }
        self.features.as_deref().unwrap_or_default()
    }

    pub fn features(&self) -> &[TerrainFeature] {
        self.features.as_deref().unwrap_or_default()
    }

    pub fn features_of(&self, kind: FeatureKind) -> impl Iterator<Item = &TerrainFeature> {
        self.features().iter().filter(move |f| f.kind == kind)
    }

    pub fn has_feature(&self, kind: FeatureKind) -> bool {
        self.features_of(kind).next().is_some()
    }

    /// Strongest feature of a kind
    pub fn best_position(&self, kind: FeatureKind) -> Option<Vec3> {
        self.features_of(kind)
            .max_by_key(|f| OrderedFloat(f.strength()))
            .map(|f| f.anchor)
    }

    /// Closest feature of a kind to a point
    pub fn nearest(&self, kind: FeatureKind, point: Vec2) -> Option<&TerrainFeature> {
        self.features_of(kind)
            .min_by_key(|f| OrderedFloat(f.ground_position().distance_squared(point)))
    }

    /// Is the point inside a feature of this kind?
    pub fn is_within(&self, point: Vec2, kind: FeatureKind) -> bool {
        self.features_of(kind).any(|f| f.covers(point))
    }

    /// Kind of the first feature covering a point, high ground first
    pub fn terrain_at(&self, point: Vec2) -> Option<FeatureKind> {
        [
            FeatureKind::HighGround,
            FeatureKind::Forest,
            FeatureKind::Water,
            FeatureKind::Chokepoint,
            FeatureKind::OpenField,
        ]
        .into_iter()
        .find(|&kind| self.is_within(point, kind))
    }

    pub fn dominant_terrain(&self) -> TerrainProfile {
        self.profile
    }

    /// Up to `max_positions` recommended positions, best first
    ///
    /// Falls back to the class's geometric default when no feature scores
    /// above the threshold. Empty before analysis.
    pub fn optimal_positions_for(&self, class: UnitClass) -> Vec<Vec2> {
        let Some(geometry) = self.geometry.as_ref() else {
            return Vec::new();
        };
        match self.positions.get(&class) {
            Some(scored) if !scored.is_empty() => scored.iter().map(|s| s.position).collect(),
            _ => vec![geometry.default_position(class)],
        }
    }

    pub fn scored_positions_for(&self, class: UnitClass) -> &[ScoredPosition] {
        self.positions.get(&class).map(Vec::as_slice).unwrap_or_default()
    }

    /// Drop everything computed for the engagement
    pub fn reset(&mut self) {
        self.geometry = None;
        self.features = None;
        self.positions.clear();
        self.profile = TerrainProfile::default();
        self.skipped_samples = 0;
    }

    fn scan(
        &mut self,
        geometry: &BattlefieldGeometry,
        sampler: &dyn TerrainSampler,
    ) -> Vec<TerrainFeature> {
        let grid = SampleGrid::build(geometry, self.config.sample_spacing, sampler);
        let resolved = grid.resolved().count();
        self.skipped_samples = grid.cells.len() - resolved;

        let mut features = Vec::new();
        if resolved > 0 {
            let mean_height = grid.resolved().map(|s| s.height).sum::<f32>() / resolved as f32;
            features.extend(self.find_high_ground(&grid, mean_height));
            features.extend(self.find_forests(&grid));
            features.extend(self.find_water(&grid));
            features.extend(self.find_chokepoints(&grid, geometry));
            features.extend(self.find_open_fields(&grid));
            self.profile = self.classify(&grid, &features, resolved);
        } else {
            tracing::warn!("No terrain samples resolved; only flank approaches available");
        }
        features.extend(self.find_flank_approaches(&grid, geometry));
        features
    }

    fn find_high_ground(&self, grid: &SampleGrid, mean_height: f32) -> Vec<TerrainFeature> {
        let mut peaks: Vec<(usize, f32)> = grid
            .cells
            .iter()
            .enumerate()
            .filter_map(|(index, cell)| {
                let sample = cell.as_ref()?;
                let rise = sample.height - mean_height;
                if rise < self.config.high_ground_threshold {
                    return None;
                }
                let is_peak = grid
                    .neighbours(index, true)
                    .into_iter()
                    .filter_map(|n| grid.cells[n].as_ref())
                    .all(|n| n.height <= sample.height);
                is_peak.then_some((index, sample.height))
            })
            .collect();
        peaks.sort_by_key(|&(_, h)| std::cmp::Reverse(OrderedFloat(h)));

        let radius = grid.spacing * 2.0;
        let mut features: Vec<TerrainFeature> = Vec::new();
        for (index, height) in peaks {
            let point = grid.point(index);
            // plateaus produce runs of equal peaks; keep the first
            if features.iter().any(|f| f.ground_position().distance(point) < radius * 1.5) {
                continue;
            }
            let rise = height - mean_height;
            features.push(TerrainFeature {
                kind: FeatureKind::HighGround,
                anchor: point.extend(height),
                radius,
                value: rise,
                label: format!("High ground (+{:.1}m)", rise),
            });
        }
        features
    }

    fn find_forests(&self, grid: &SampleGrid) -> Vec<TerrainFeature> {
        let threshold = self.config.forest_density;
        grid.clusters(|s| !s.water && s.forest >= threshold)
            .into_iter()
            .map(|members| {
                let density = mean_of(grid, &members, |s| s.forest);
                TerrainFeature {
                    kind: FeatureKind::Forest,
                    anchor: cluster_anchor(grid, &members),
                    radius: cluster_radius(grid, members.len()),
                    value: density,
                    label: format!("Forest (density {:.2})", density),
                }
            })
            .collect()
    }

    fn find_water(&self, grid: &SampleGrid) -> Vec<TerrainFeature> {
        grid.clusters(|s| s.water)
            .into_iter()
            .map(|members| TerrainFeature {
                kind: FeatureKind::Water,
                anchor: cluster_anchor(grid, &members),
                radius: cluster_radius(grid, members.len()),
                value: 1.0,
                label: format!("Water ({} samples)", members.len()),
            })
            .collect()
    }

    fn find_open_fields(&self, grid: &SampleGrid) -> Vec<TerrainFeature> {
        let flat = self.config.flat_tolerance;
        let open: Vec<bool> = (0..grid.cells.len())
            .map(|index| {
                let Some(sample) = grid.cells[index].as_ref() else {
                    return false;
                };
                !sample.water
                    && sample.forest < self.config.forest_density
                    && grid
                        .neighbours(index, false)
                        .into_iter()
                        .filter_map(|n| grid.cells[n].as_ref())
                        .all(|n| (n.height - sample.height).abs() <= flat)
            })
            .collect();

        let mut visited = vec![false; open.len()];
        let mut features = Vec::new();
        for start in 0..open.len() {
            if visited[start] || !open[start] {
                continue;
            }
            visited[start] = true;
            let mut stack = vec![start];
            let mut members = Vec::new();
            while let Some(index) = stack.pop() {
                members.push(index);
                for next in grid.neighbours(index, false) {
                    if !visited[next] && open[next] {
                        visited[next] = true;
                        stack.push(next);
                    }
                }
            }
            if members.len() < self.config.min_open_cells {
                continue;
            }
            let radius = cluster_radius(grid, members.len());
            features.push(TerrainFeature {
                kind: FeatureKind::OpenField,
                anchor: cluster_anchor(grid, &members),
                radius,
                value: (radius / OPEN_FIELD_FULL_RADIUS).min(1.0),
                label: format!("Open field ({:.0}m across)", radius * 2.0),
            });
        }
        features
    }

    /// Passable gaps bounded by impassable ground on both sides
    fn find_chokepoints(
        &self,
        grid: &SampleGrid,
        geometry: &BattlefieldGeometry,
    ) -> Vec<TerrainFeature> {
        let passage = |col: usize, row: usize| match grid.get(col, row) {
            None => Passage::Unknown,
            Some(s) if s.water || s.forest >= self.config.dense_forest => Passage::Blocked,
            Some(_) => Passage::Open,
        };

        // Scan lines run across the battle axis
        let axis = geometry.axis();
        let along_x = axis.x.abs() >= axis.y.abs();
        let (lines, span) = if along_x {
            (grid.cols, grid.rows)
        } else {
            (grid.rows, grid.cols)
        };
        let cell = |line: usize, step: usize| {
            if along_x {
                (line, step)
            } else {
                (step, line)
            }
        };

        let state = |line: usize, step: usize| {
            let (c, r) = cell(line, step);
            passage(c, r)
        };

        let max_width = self.config.chokepoint_max_width;
        let mut candidates: Vec<(Vec2, f32, f32)> = Vec::new();
        for line in 0..lines {
            let mut step = 0;
            while step < span {
                if state(line, step) != Passage::Open {
                    step += 1;
                    continue;
                }
                let start = step;
                while step < span && state(line, step) == Passage::Open {
                    step += 1;
                }
                let end = step; // exclusive
                let bounded_before = start > 0 && state(line, start - 1) == Passage::Blocked;
                let bounded_after = end < span && state(line, end) == Passage::Blocked;
                let width = (end - start) as f32 * grid.spacing;
                if bounded_before && bounded_after && width <= max_width {
                    let (c0, r0) = cell(line, start);
                    let (c1, r1) = cell(line, end - 1);
                    let a = cell_point(grid.origin, grid.spacing, c0, r0);
                    let b = cell_point(grid.origin, grid.spacing, c1, r1);
                    let narrowness = (1.0 - width / (max_width + grid.spacing)).clamp(0.1, 1.0);
                    candidates.push(((a + b) * 0.5, width, narrowness));
                }
            }
        }

        candidates.sort_by_key(|&(_, _, narrowness)| std::cmp::Reverse(OrderedFloat(narrowness)));
        let separation = max_width.max(grid.spacing * 2.0);
        let mut features: Vec<TerrainFeature> = Vec::new();
        for (point, width, narrowness) in candidates {
            if features.iter().any(|f| f.ground_position().distance(point) < separation) {
                continue;
            }
            let height = grid.cell_at(point).map(|s| s.height).unwrap_or(0.0);
            features.push(TerrainFeature {
                kind: FeatureKind::Chokepoint,
                anchor: point.extend(height),
                radius: width * 0.5,
                value: narrowness,
                label: format!("Chokepoint ({:.0}m wide)", width),
            });
        }
        features
    }

    fn find_flank_approaches(
        &self,
        grid: &SampleGrid,
        geometry: &BattlefieldGeometry,
    ) -> Vec<TerrainFeature> {
        let axis = geometry.axis();
        let lateral = geometry.lateral();
        let separation = geometry.own_deployment.distance(geometry.enemy_deployment);
        let center = geometry.own_deployment + axis * separation * 0.7;
        let offset = lateral * geometry.width() * 0.3;

        let mut candidates = vec![
            (center - offset, 0.8, "Left flank approach"),
            (center + offset, 0.8, "Right flank approach"),
        ];
        if separation > geometry.length() * 0.4 {
            candidates.push((
                geometry.enemy_deployment + axis * geometry.length() * 0.15,
                1.0,
                "Rear approach",
            ));
        }

        candidates
            .into_iter()
            .filter(|(point, _, _)| geometry.contains(*point))
            .filter(|(point, _, _)| {
                grid.cell_at(*point)
                    .map_or(true, |s| !s.water && s.forest < self.config.dense_forest)
            })
            .map(|(point, value, label)| {
                let height = grid.cell_at(point).map(|s| s.height).unwrap_or(0.0);
                TerrainFeature {
                    kind: FeatureKind::FlankApproach,
                    anchor: point.extend(height),
                    radius: FLANK_APPROACH_RADIUS,
                    value,
                    label: label.to_string(),
                }
            })
            .collect()
    }

    fn classify(
        &self,
        grid: &SampleGrid,
        features: &[TerrainFeature],
        resolved: usize,
    ) -> TerrainProfile {
        let share = |count: usize| count as f32 / resolved as f32;
        let water = share(grid.resolved().filter(|s| s.water).count());
        let forest = share(
            grid.resolved()
                .filter(|s| s.forest >= self.config.forest_density)
                .count(),
        );
        let hills = features
            .iter()
            .filter(|f| f.kind == FeatureKind::HighGround)
            .count();

        if water > 0.1 {
            TerrainProfile::River
        } else if forest > 0.3 {
            TerrainProfile::Forest
        } else if hills >= 2 {
            TerrainProfile::Hills
        } else {
            TerrainProfile::Plains
        }
    }

    fn score_positions(
        &self,
        geometry: &BattlefieldGeometry,
        features: &[TerrainFeature],
        class: UnitClass,
    ) -> Vec<ScoredPosition> {
        let axis = geometry.axis();
        let feature_score = |feature: &TerrainFeature| -> Option<f32> {
            let relevance = geometry.relevance(feature.ground_position());
            if relevance < self.config.relevance_cutoff {
                return None;
            }
            let strength = feature.strength();
            let affinity = feature.kind.affinity(class, strength)?;
            let mut score = strength * affinity * relevance;
            if self.prefer_high_ground && feature.kind == FeatureKind::HighGround {
                score *= HIGH_GROUND_PREFERENCE;
            }
            Some(score)
        };

        let mut scored: Vec<ScoredPosition> = features
            .iter()
            .filter_map(|feature| {
                let score = feature_score(feature)?;
                if score <= 0.0 {
                    return None;
                }
                let position = if feature.kind == FeatureKind::Chokepoint
                    && class == UnitClass::Ranged
                {
                    feature.ground_position() - axis * CHOKEPOINT_SUPPORT_DEPTH
                } else {
                    feature.ground_position()
                };
                // ground the class dislikes drags down anything it overlaps
                let penalty: f32 = features
                    .iter()
                    .filter(|other| other.covers(position))
                    .filter_map(|other| feature_score(other))
                    .filter(|s| *s < 0.0)
                    .sum();
                Some(ScoredPosition {
                    position,
                    score: score + penalty,
                    kind: feature.kind,
                })
            })
            .filter(|s| s.score > self.config.score_threshold)
            .collect();

        scored.sort_by_key(|s| std::cmp::Reverse(OrderedFloat(s.score)));
        scored.truncate(self.config.max_positions);
        tracing::debug!(
            "{} positions for {}: {:?}",
            scored.len(),
            class.name(),
            scored.iter().map(|s| s.kind).collect::<Vec<_>>()
        );
        scored
    }
}

fn mean_of(grid: &SampleGrid, members: &[usize], f: impl Fn(&Sample) -> f32) -> f32 {
    let values: Vec<f32> = members
        .iter()
        .filter_map(|&i| grid.cells[i].as_ref())
        .map(f)
        .collect();
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

fn cluster_anchor(grid: &SampleGrid, members: &[usize]) -> Vec3 {
    let sum: Vec2 = members.iter().map(|&i| grid.point(i)).sum();
    let center = sum / members.len().max(1) as f32;
    center.extend(mean_of(grid, members, |s| s.height))
}

/// Radius of a disc with the cluster's area
fn cluster_radius(grid: &SampleGrid, cells: usize) -> f32 {
    ((cells as f32 / std::f32::consts::PI).sqrt() * grid.spacing).max(grid.spacing * 0.5)
}
