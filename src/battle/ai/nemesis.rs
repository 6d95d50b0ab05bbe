//! Tracked opposing commanders ("nemeses")
//!
//! Each record wraps a [`PersonalityModel`] with encounter bookkeeping. The
//! registry is bounded: once over capacity, the least-encountered record
//! is dropped.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::ai::personality::{
    BattleOutcome, PersonalityModel, TacticType, VENDETTA_AGGRESSION,
};
use crate::core::config::MemoryConfig;
use crate::core::types::CommanderId;

pub const UNKNOWN_COMMANDER: &str = "Unknown Commander";
/// Records flagged important after ranking
pub const IMPORTANT_COUNT: usize = 3;

const DEFEAT_ADAPTATION: f32 = 0.4;
const VICTORY_ADAPTATION: f32 = 0.2;
const ADAPTATION_PER_LEVEL: f32 = 0.1;
/// Victories after which a commander is flagged dangerous
const DANGEROUS_VICTORIES: u32 = 2;
/// Success rate in a won battle that makes a tactic a signature
const SIGNATURE_RATE: f32 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NemesisRecord {
    pub id: CommanderId,
    pub name: String,
    pub personality: PersonalityModel,
    pub encounters: u32,
    pub victories: u32,
    pub defeats: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub party_strength: u32,
    pub vendetta: bool,
    pub dangerous: bool,
    pub important: bool,
    /// Grows with every defeat, never shrinks
    pub adaptation_level: u32,
    pub signature_tactics: Vec<TacticType>,
}

impl NemesisRecord {
    pub fn new(
        id: CommanderId,
        name: &str,
        party_strength: u32,
        personality: PersonalityModel,
        now: DateTime<Utc>,
    ) -> Self {
        let name = if name.trim().is_empty() {
            UNKNOWN_COMMANDER.to_string()
        } else {
            name.to_string()
        };
        Self {
            id,
            name,
            personality,
            encounters: 1,
            victories: 0,
            defeats: 0,
            first_seen: now,
            last_seen: now,
            party_strength,
            vendetta: false,
            dangerous: false,
            important: false,
            adaptation_level: 0,
            signature_tactics: Vec::new(),
        }
    }

    /// Ranking score; higher is more threatening
    pub fn threat_score(&self) -> u32 {
        self.victories * 3
            + self.encounters
            + if self.vendetta { 5 } else { 0 }
            + if self.dangerous { 3 } else { 0 }
    }

    /// How hard one battle pushes this commander's traits
    pub fn adaptation_strength(&self, victory: bool) -> f32 {
        let base = if victory {
            VICTORY_ADAPTATION
        } else {
            DEFEAT_ADAPTATION
        };
        base * (1.0 + self.adaptation_level as f32 * ADAPTATION_PER_LEVEL)
    }

    /// Record after one battle; `outcome.victory` is this commander's
    pub fn apply_outcome(&self, outcome: &BattleOutcome, config: &MemoryConfig) -> Self {
        let outcome = &outcome.sanitized();
        let mut next = self.clone();
        next.personality = self.personality.apply_outcome(outcome, config);

        if outcome.victory {
            next.victories += 1;
            next.dangerous = next.victories >= DANGEROUS_VICTORIES;
            for (&tactic, &rate) in &outcome.tactic_rates {
                if rate > SIGNATURE_RATE && !next.signature_tactics.contains(&tactic) {
                    next.signature_tactics.push(tactic);
                }
            }
        } else {
            next.defeats += 1;
            next.adaptation_level += 1;
        }

        let strength = next.adaptation_strength(outcome.victory);
        for (&tactic, &rate) in &outcome.tactic_rates {
            next.personality
                .traits
                .nudge(tactic, (rate - 0.5) * strength);
        }

        next.vendetta = next.personality.vendetta;
        if next.vendetta {
            let traits = &mut next.personality.traits;
            traits.aggressiveness = traits.aggressiveness.max(VENDETTA_AGGRESSION);
        }
        next.personality.relabel();
        next
    }
}

/// Bounded set of tracked commanders, kept in threat order
#[derive(Debug, Clone)]
pub struct NemesisRegistry {
    records: Vec<NemesisRecord>,
    capacity: usize,
    current: Option<CommanderId>,
}

impl NemesisRegistry {
    pub fn new(capacity: usize) -> Self {
        Self::from_records(Vec::new(), capacity)
    }

    /// Rebuild from persisted records, trimming to capacity
    pub fn from_records(records: Vec<NemesisRecord>, capacity: usize) -> Self {
        let mut registry = Self {
            records,
            capacity: capacity.max(1),
            current: None,
        };
        while registry.records.len() > registry.capacity {
            registry.evict(None);
        }
        registry.update_ranking();
        registry
    }

    pub fn records(&self) -> &[NemesisRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<NemesisRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, id: &CommanderId) -> Option<&NemesisRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// Commander identified most recently this session
    pub fn current(&self) -> Option<&NemesisRecord> {
        self.current.as_ref().and_then(|id| self.get(id))
    }

    /// Register a sighting; creates the record on first sight
    ///
    /// Returns `None` only for an empty identity.
    pub fn identify<R: Rng + ?Sized>(
        &mut self,
        id: &CommanderId,
        name: &str,
        party_strength: u32,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Option<&NemesisRecord> {
        if id.as_str().trim().is_empty() {
            tracing::debug!("Ignoring sighting with empty commander id");
            return None;
        }

        if let Some(index) = self.records.iter().position(|r| &r.id == id) {
            let record = &mut self.records[index];
            record.encounters += 1;
            record.last_seen = now;
            record.party_strength = party_strength;
            tracing::info!(
                "Encountered {} again ({} encounters{})",
                record.name,
                record.encounters,
                if record.vendetta { ", vendetta" } else { "" }
            );
        } else {
            let record = NemesisRecord::new(
                id.clone(),
                name,
                party_strength,
                PersonalityModel::random(rng),
                now,
            );
            tracing::info!(
                "New commander tracked: {} ({}), {}",
                record.name,
                record.id,
                record.personality.label
            );
            self.records.push(record);
            if self.records.len() > self.capacity {
                self.evict(Some(id));
            }
        }

        self.update_ranking();
        self.current = Some(id.clone());
        self.get(id)
    }

    /// Drop the least-encountered record other than `keep`
    fn evict(&mut self, keep: Option<&CommanderId>) {
        let victim = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| Some(&r.id) != keep)
            .min_by_key(|(_, r)| r.encounters)
            .map(|(i, _)| i);
        if let Some(index) = victim {
            let removed = self.records.remove(index);
            tracing::info!(
                "Forgetting {} ({} encounters) to stay within {} records",
                removed.name,
                removed.encounters,
                self.capacity
            );
        }
    }

    /// Apply a battle outcome to a tracked commander
    pub fn apply_outcome(
        &mut self,
        id: &CommanderId,
        outcome: &BattleOutcome,
        config: &MemoryConfig,
    ) -> Option<&NemesisRecord> {
        let Some(index) = self.records.iter().position(|r| &r.id == id) else {
            tracing::warn!("Outcome for untracked commander {}", id);
            return None;
        };
        let next = self.records[index].apply_outcome(outcome, config);
        tracing::info!(
            "{} now {}/{} (W/L), adaptation {}, {}",
            next.name,
            next.victories,
            next.defeats,
            next.adaptation_level,
            next.personality.label
        );
        self.records[index] = next;
        self.update_ranking();
        self.get(id)
    }

    /// Credit a single tactical decision to a tracked commander
    pub fn apply_tactical_decision(
        &mut self,
        id: &CommanderId,
        tactic: TacticType,
        success: bool,
    ) -> Option<&NemesisRecord> {
        let record = self.records.iter_mut().find(|r| &r.id == id)?;
        record.personality = record.personality.apply_tactical_decision(tactic, success);
        tracing::debug!(
            "{} {:?} effectiveness now {:.2}",
            record.name,
            tactic,
            record.personality.effectiveness_of(tactic)
        );
        Some(&*record)
    }

    /// Re-sort by threat score and flag the top records important
    pub fn update_ranking(&mut self) {
        self.records
            .sort_by(|a, b| b.threat_score().cmp(&a.threat_score()));
        for (rank, record) in self.records.iter_mut().enumerate() {
            record.important = rank < IMPORTANT_COUNT;
        }
    }

    /// Records in threat order
    pub fn ranked(&self) -> &[NemesisRecord] {
        &self.records
    }

    /// The commander with the most wins over us
    pub fn most_dangerous(&self) -> Option<&NemesisRecord> {
        self.records
            .iter()
            .filter(|r| r.victories > 0)
            .max_by_key(|r| r.victories)
    }

    pub fn with_vendetta(&self) -> impl Iterator<Item = &NemesisRecord> {
        self.records.iter().filter(|r| r.vendetta)
    }

    /// Forget who was seen this session; records are kept
    pub fn reset_session(&mut self) {
        self.current = None;
    }
}
