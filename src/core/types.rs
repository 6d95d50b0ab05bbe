//! Core type definitions used throughout the codebase

use derive_more::{Display, From};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a unit group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display(fmt = "{}", _0)]
pub struct GroupId(pub Uuid);

impl GroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of a commander as known to the host (stable across sessions)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From)]
#[display(fmt = "{}", _0)]
pub struct CommanderId(pub String);

impl CommanderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CommanderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Simulated seconds since the engagement started (host clock)
pub type SimTime = f32;

/// Normalize a direction, falling back when it is degenerate
pub fn direction_or(v: Vec2, fallback: Vec2) -> Vec2 {
    v.try_normalize().unwrap_or(fallback)
}

/// Right-hand perpendicular of a ground-plane direction
pub fn right_of(dir: Vec2) -> Vec2 {
    Vec2::new(dir.y, -dir.x)
}

/// Unweighted mean of a set of points
pub fn centroid<I>(points: I) -> Option<Vec2>
where
    I: IntoIterator<Item = Vec2>,
{
    let mut sum = Vec2::ZERO;
    let mut count = 0usize;
    for p in points {
        sum += p;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f32)
    }
}
