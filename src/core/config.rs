//! Engine configuration with documented constants
//!
//! All tuning numbers are collected here. Every section deserializes with
//! `#[serde(default)]`, so a TOML file only needs the keys it overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{Result, TacticsError};

/// Host-facing switches and side-wide biases
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Master switch; a disabled engine produces empty plans
    pub enabled: bool,
    /// Whether commander memory biases planning and is updated at battle end
    pub use_commander_memory: bool,
    /// Suggested host tick cadence in simulated seconds
    ///
    /// The engine gates its own work, so ticking faster only costs a
    /// cheap cache hit.
    pub update_interval: f32,
    /// Base aggressiveness on a 0-100 scale
    ///
    /// Used as the planner's aggression when memory is disabled or the
    /// acting commander has no record yet.
    pub aggressiveness: u8,
    /// Scale high-ground scores up when picking positions
    pub prefer_high_ground: bool,
    /// Lower the aggression needed before cavalry forms a wedge (opt-in)
    pub aggressive_cavalry: bool,
    /// Prefer shield walls over lines for infantry in contact (opt-in)
    pub defensive_infantry: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_commander_memory: true,
            update_interval: 3.0,
            aggressiveness: 50,
            prefer_high_ground: true,
            aggressive_cavalry: false,
            defensive_infantry: false,
        }
    }
}

impl GeneralConfig {
    /// Base aggressiveness mapped to 0.0..=1.0
    pub fn base_aggression(&self) -> f32 {
        (self.aggressiveness.min(100) as f32) / 100.0
    }
}

/// Tactical planner distances and cadence (world units / seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Minimum simulated seconds between full re-plans
    pub replan_interval: f32,
    /// How far past the enemy centroid a flanking group is sent
    pub flank_distance: f32,
    /// Offset of each candidate flank lane from the enemy centroid
    pub flank_lane_offset: f32,
    /// A lane is blocked if an enemy group sits within this radius of it
    pub flank_clearance: f32,
    /// How far ahead of the line screening infantry advances
    pub screen_distance: f32,
    /// Offset of flank guards and the rear guard from the own centroid
    pub guard_offset: f32,
    /// Offset of the reserve behind and beside the own centroid
    pub reserve_offset: f32,
    /// Standoff kept from the enemy centroid by harassing ranged groups
    pub harass_standoff_ranged: f32,
    /// Standoff kept from the enemy centroid by harassing mounted groups
    pub harass_standoff_mounted: f32,
    /// Interpolation weight between centroids for covering/delaying actions
    pub between_weight: f32,
    /// Strength ratio below which the side is at a disadvantage
    pub disadvantage_ratio: f32,
    /// Strength ratio above which the side is at an advantage
    pub advantage_ratio: f32,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            replan_interval: 5.0,
            flank_distance: 60.0,
            flank_lane_offset: 40.0,
            flank_clearance: 40.0,
            screen_distance: 30.0,
            guard_offset: 40.0,
            reserve_offset: 20.0,
            harass_standoff_ranged: 70.0,
            harass_standoff_mounted: 50.0,
            between_weight: 0.5,
            disadvantage_ratio: 0.8,
            advantage_ratio: 1.2,
        }
    }
}

/// Arrangement selector thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrangementConfig {
    /// Minimum simulated seconds between arrangement changes for one group
    pub cooldown: f32,
    /// General proximity radius ("enemies near")
    pub proximity: f32,
    /// Radius inside which enemy missile troops put a group under fire
    pub ranged_threat_range: f32,
    /// Proportion of nearby enemy strength that flags a threat
    pub threat_proportion: f32,
    /// Absolute nearby enemy unit count that flags a threat
    pub threat_unit_count: u32,
    /// Mounted threat radius as a multiple of `proximity`
    pub mounted_threat_factor: f32,
    /// Mean distance under which massed archers count as incoming fire
    pub mass_fire_distance: f32,
    /// Average health below which a group is weak
    pub weak_health: f32,
    /// Fraction of original strength below which a group is weak
    pub weak_strength: f32,
    /// Closest distance at which a charge lane is usable
    pub charge_min_distance: f32,
    /// Furthest distance at which a charge lane is usable
    pub charge_max_distance: f32,
    /// Minimum cosine between facing and target for a clear charge
    pub charge_alignment: f32,
    /// Aggression needed before mounted melee forms a wedge
    pub wedge_aggression: f32,
}

impl Default for ArrangementConfig {
    fn default() -> Self {
        Self {
            cooldown: 10.0,
            proximity: 50.0,
            ranged_threat_range: 80.0,
            threat_proportion: 0.4,
            threat_unit_count: 10,
            mounted_threat_factor: 1.5,
            mass_fire_distance: 100.0,
            weak_health: 0.4,
            weak_strength: 0.3,
            charge_min_distance: 30.0,
            charge_max_distance: 100.0,
            charge_alignment: 0.7,
            wedge_aggression: 0.6,
        }
    }
}

/// Terrain sampling and scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Distance between grid samples (world units)
    ///
    /// Halving it quadruples the number of host queries.
    pub sample_spacing: f32,
    /// Height above the field mean that counts as high ground (meters)
    pub high_ground_threshold: f32,
    /// Forest density at which a sample counts as forest
    pub forest_density: f32,
    /// Forest density at which a sample blocks movement
    pub dense_forest: f32,
    /// Widest passable gap still treated as a chokepoint
    pub chokepoint_max_width: f32,
    /// Smallest connected open area, in samples, reported as open field
    pub min_open_cells: usize,
    /// Height step between neighbours that still counts as flat
    pub flat_tolerance: f32,
    /// Features whose relevance falls below this are ignored
    pub relevance_cutoff: f32,
    /// Positions scoring at or below this are never recommended
    pub score_threshold: f32,
    /// Maximum recommended positions per unit class
    pub max_positions: usize,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            sample_spacing: 20.0,
            high_ground_threshold: 3.0,
            forest_density: 0.3,
            dense_forest: 0.7,
            chokepoint_max_width: 45.0,
            min_open_cells: 4,
            flat_tolerance: 1.5,
            relevance_cutoff: 0.2,
            score_threshold: 0.2,
            max_positions: 3,
        }
    }
}

/// Commander memory tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum number of tracked opposing commanders
    pub capacity: usize,
    /// Weight of a new observation when blending effectiveness values
    ///
    /// 0.3 means `new = old * 0.7 + observed * 0.3`.
    pub effectiveness_blend: f32,
    /// Consecutive defeats to the same opponent that start a vendetta
    pub vendetta_threshold: u32,
    /// Battle records kept in history (oldest dropped first)
    pub history_limit: usize,
    /// Seed for fresh personalities; `None` seeds from entropy
    pub seed: Option<u64>,
    /// Where memory is persisted; `None` keeps it in-process only
    pub path: Option<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            effectiveness_blend: 0.3,
            vendetta_threshold: 3,
            history_limit: 100,
            seed: None,
            path: None,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticsConfig {
    pub general: GeneralConfig,
    pub planning: PlanningConfig,
    pub arrangement: ArrangementConfig,
    pub terrain: TerrainConfig,
    pub memory: MemoryConfig,
}

impl TacticsConfig {
    /// Create config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text and validate
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: TacticsConfig = toml::from_str(contents)?;
        config.validate().map_err(TacticsError::InvalidConfig)?;
        Ok(config)
    }

    /// Validate that values are sensible
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.planning.replan_interval < 0.0 || self.arrangement.cooldown < 0.0 {
            return Err("Intervals must not be negative".into());
        }

        if self.planning.disadvantage_ratio >= self.planning.advantage_ratio {
            return Err(format!(
                "disadvantage_ratio ({}) should be < advantage_ratio ({})",
                self.planning.disadvantage_ratio, self.planning.advantage_ratio
            ));
        }

        if self.terrain.sample_spacing <= 0.0 {
            return Err("sample_spacing must be positive".into());
        }

        if self.terrain.forest_density >= self.terrain.dense_forest {
            return Err(format!(
                "forest_density ({}) should be < dense_forest ({})",
                self.terrain.forest_density, self.terrain.dense_forest
            ));
        }

        if self.arrangement.charge_min_distance >= self.arrangement.charge_max_distance {
            return Err("charge_min_distance must be < charge_max_distance".into());
        }

        if !(0.0..=1.0).contains(&self.memory.effectiveness_blend) {
            return Err(format!(
                "effectiveness_blend ({}) must be within 0..=1",
                self.memory.effectiveness_blend
            ));
        }

        if self.memory.capacity == 0 || self.memory.vendetta_threshold == 0 {
            return Err("capacity and vendetta_threshold must be at least 1".into());
        }

        Ok(())
    }
}

/// Load config from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<TacticsConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    TacticsConfig::from_toml_str(&contents)
}
