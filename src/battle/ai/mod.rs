//! Tactical AI for one side of a battle
//!
//! Architecture: pure decision functions + stateful services
//! - `assessment` / `strategy` are pure functions of the battle picture
//! - `DecisionContext` resolves role targets against the current field
//! - `TacticalPlanner` caches plans behind an interval gate
//! - `personality` / `nemesis` / `memory` carry commanders across battles

pub mod assessment;
pub mod coordination;
pub mod decision_context;
pub mod memory;
pub mod nemesis;
pub mod personality;
pub mod planner;
pub mod strategy;

pub use assessment::{BattlefieldAssessment, CommanderStance, ForceComposition};
pub use coordination::coordinate;
pub use decision_context::DecisionContext;
pub use memory::{BattleRecord, CommanderMemoryStore, OpponentAnalysis, TacticalAdvice};
pub use nemesis::{NemesisRecord, NemesisRegistry};
pub use personality::{
    BattleOutcome, PersonalityModel, PersonalityTraits, TacticType, TerrainPreference,
};
pub use planner::TacticalPlanner;
pub use strategy::{assign_role, select_strategy};

use crate::battle::orders::TacticalPlan;
use crate::battle::units::Side;
use crate::core::types::SimTime;

/// Trait for battle AI implementations
pub trait BattleAI {
    /// Process a single host tick - returns the plan currently in force
    fn process_tick(&mut self, side: &Side, opposing: &Side, now: SimTime) -> TacticalPlan;

    /// Temper the AI is planning with
    fn stance(&self) -> CommanderStance;
}
