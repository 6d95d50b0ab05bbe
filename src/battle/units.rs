//! Unit groups and sides as read from the host each tick
//!
//! The host owns these; the engine only reads them and annotates
//! its decisions with group ids.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::types::{centroid, direction_or, CommanderId, GroupId};

/// Fighting class of a unit group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitClass {
    MeleeInfantry,
    Ranged,
    MountedMelee,
    MountedRanged,
}

impl UnitClass {
    pub const ALL: [UnitClass; 4] = [
        UnitClass::MeleeInfantry,
        UnitClass::Ranged,
        UnitClass::MountedMelee,
        UnitClass::MountedRanged,
    ];

    pub fn is_mounted(&self) -> bool {
        matches!(self, UnitClass::MountedMelee | UnitClass::MountedRanged)
    }

    /// Fights at range (foot archers and horse archers)
    pub fn is_missile(&self) -> bool {
        matches!(self, UnitClass::Ranged | UnitClass::MountedRanged)
    }

    pub fn name(&self) -> &'static str {
        match self {
            UnitClass::MeleeInfantry => "melee infantry",
            UnitClass::Ranged => "ranged",
            UnitClass::MountedMelee => "mounted melee",
            UnitClass::MountedRanged => "mounted ranged",
        }
    }
}

/// Internal shape of a unit group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Arrangement {
    #[default]
    Line,
    ShieldWall,
    Square,
    Loose,
    Circle,
    Wedge,
    Column,
}

/// Relative strengths of an arrangement (0.0 to 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrangementTraits {
    pub defensive: f32,
    pub offensive: f32,
    pub mobility: f32,
    pub ranged_defense: f32,
    pub mounted_defense: f32,
}

impl Arrangement {
    pub fn traits(&self) -> ArrangementTraits {
        let (defensive, offensive, mobility, ranged_defense, mounted_defense) = match self {
            Arrangement::Line => (0.5, 0.6, 0.6, 0.4, 0.4),
            Arrangement::ShieldWall => (0.9, 0.3, 0.2, 0.9, 0.6),
            Arrangement::Square => (0.8, 0.2, 0.1, 0.5, 1.0),
            Arrangement::Loose => (0.3, 0.5, 0.9, 0.8, 0.1),
            Arrangement::Circle => (0.7, 0.3, 0.3, 0.6, 0.7),
            Arrangement::Wedge => (0.4, 0.9, 0.7, 0.3, 0.3),
            Arrangement::Column => (0.3, 0.4, 1.0, 0.2, 0.2),
        };
        ArrangementTraits {
            defensive,
            offensive,
            mobility,
            ranged_defense,
            mounted_defense,
        }
    }

    /// Braced shapes that punish a frontal charge
    pub fn is_braced(&self) -> bool {
        matches!(self, Arrangement::Square | Arrangement::ShieldWall)
    }
}

/// A controllable cluster of units of one class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitGroup {
    pub id: GroupId,
    pub class: UnitClass,
    pub unit_count: u32,
    /// Units the group started the engagement with, if the host tracks it
    pub original_count: Option<u32>,
    pub position: Vec2,
    /// Facing direction; need not be normalized
    pub facing: Vec2,
    pub arrangement: Arrangement,
    /// Mean health of living units (0.0 to 1.0)
    pub average_health: f32,
    /// Whether the host is currently moving the group
    pub moving: bool,
}

impl UnitGroup {
    pub fn new(class: UnitClass, unit_count: u32, position: Vec2) -> Self {
        Self {
            id: GroupId::new(),
            class,
            unit_count,
            original_count: Some(unit_count),
            position,
            facing: Vec2::Y,
            arrangement: Arrangement::default(),
            average_health: 1.0,
            moving: false,
        }
    }

    pub fn with_facing(mut self, facing: Vec2) -> Self {
        self.facing = facing;
        self
    }

    pub fn with_arrangement(mut self, arrangement: Arrangement) -> Self {
        self.arrangement = arrangement;
        self
    }

    pub fn is_active(&self) -> bool {
        self.unit_count > 0
    }

    /// Unit facing, falling back to +Y when the host gives a zero vector
    pub fn facing_dir(&self) -> Vec2 {
        direction_or(self.facing, Vec2::Y)
    }

    /// Fraction of starting strength still standing
    ///
    /// Without a host-supplied original count the group is assumed to
    /// have lost a third of its men, which never reads as weak on its own.
    pub fn strength_fraction(&self) -> f32 {
        let original = self
            .original_count
            .filter(|&n| n > 0)
            .map(|n| n as f32)
            .unwrap_or(self.unit_count as f32 * 1.5);
        if original <= 0.0 {
            return 0.0;
        }
        (self.unit_count as f32 / original).min(1.0)
    }
}

/// One faction's groups in an engagement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Side {
    pub groups: Vec<UnitGroup>,
    pub commander: Option<CommanderId>,
    /// Controlled by the human player
    pub is_human: bool,
}

impl Side {
    pub fn new(groups: Vec<UnitGroup>) -> Self {
        Self {
            groups,
            commander: None,
            is_human: false,
        }
    }

    pub fn with_commander(mut self, commander: impl Into<CommanderId>) -> Self {
        self.commander = Some(commander.into());
        self
    }

    pub fn human(mut self) -> Self {
        self.is_human = true;
        self
    }

    /// Groups that still have units; empty groups never count for anything
    pub fn active_groups(&self) -> impl Iterator<Item = &UnitGroup> {
        self.groups.iter().filter(|g| g.is_active())
    }

    pub fn groups_of(&self, class: UnitClass) -> impl Iterator<Item = &UnitGroup> {
        self.active_groups().filter(move |g| g.class == class)
    }

    pub fn total_units(&self) -> u32 {
        self.active_groups().map(|g| g.unit_count).sum()
    }

    pub fn units_of(&self, class: UnitClass) -> u32 {
        self.groups_of(class).map(|g| g.unit_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.active_groups().next().is_none()
    }

    pub fn has_class(&self, class: UnitClass) -> bool {
        self.groups_of(class).next().is_some()
    }

    /// Mean position of the active groups
    pub fn centroid(&self) -> Option<Vec2> {
        centroid(self.active_groups().map(|g| g.position))
    }

    /// Mean facing of the active groups
    pub fn mean_facing(&self) -> Option<Vec2> {
        let sum: Vec2 = self.active_groups().map(|g| g.facing_dir()).sum();
        sum.try_normalize()
    }

    /// Position of the active group closest to `point`
    pub fn closest_to(&self, point: Vec2) -> Option<&UnitGroup> {
        self.active_groups().min_by(|a, b| {
            a.position
                .distance_squared(point)
                .total_cmp(&b.position.distance_squared(point))
        })
    }

    pub fn group(&self, id: GroupId) -> Option<&UnitGroup> {
        self.groups.iter().find(|g| g.id == id)
    }
}
