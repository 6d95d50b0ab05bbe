//! Battle system - tactical orders for a host-simulated battle
//!
//! The host owns unit state, movement and combat. This module reads the
//! field once per tick and answers with orders and arrangements.
//!
//! Key pieces:
//! - Terrain is scanned once per engagement and cached
//! - Plans are rebuilt on an interval, not every tick
//! - Arrangements change at most once per cooldown per group
//! - Commanders remember their opponents across engagements

pub mod ai;
pub mod arrangement;
pub mod engagement;
pub mod orders;
pub mod scheduler;
pub mod terrain;
pub mod units;

// Re-exports for convenient access
pub use arrangement::{
    decide_arrangement, ArrangementContext, ArrangementHabits, ArrangementSelector, ThreatSignals,
};
pub use engagement::{CommanderSighting, Engagement};
pub use orders::{Action, ActionType, Role, RoleAssignment, Strategy, TacticalPlan};
pub use scheduler::IntervalGate;
pub use terrain::{
    BattlefieldGeometry, FeatureKind, ScoredPosition, TerrainFeature, TerrainFeatureMap,
    TerrainProfile, TerrainSampler,
};
pub use units::{Arrangement, ArrangementTraits, Side, UnitClass, UnitGroup};
