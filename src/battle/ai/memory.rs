//! Process-wide commander memory
//!
//! One store is shared by every engagement in the process. Clones share the
//! same state; each operation holds the lock only for its own
//! read-modify-write, so a battle never waits on another for long.
//!
//! Persistence is a single JSON document written atomically. A missing or
//! unreadable file is never fatal: [`CommanderMemoryStore::load`] logs it
//! and starts fresh.

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::battle::ai::assessment::CommanderStance;
use crate::battle::ai::nemesis::{NemesisRecord, NemesisRegistry};
use crate::battle::ai::personality::{
    BattleOutcome, PersonalityModel, TacticType, TerrainPreference,
};
use crate::battle::units::{Arrangement, Side, UnitClass};
use crate::core::config::MemoryConfig;
use crate::core::error::Result;
use crate::core::types::CommanderId;

/// Observed rate above which a tactic exposes a weakness in the human side
const WEAKNESS_RATE: f32 = 0.7;
/// Observed rate below which a tactic ran into a strength of the human side
const STRENGTH_RATE: f32 = 0.3;
/// Weaknesses and strengths reported in advice
const REPORTED_TRAITS: usize = 3;

/// One finished battle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleRecord {
    pub id: Uuid,
    pub commander: CommanderId,
    pub timestamp: DateTime<Utc>,
    pub victory: bool,
    pub against_human: bool,
    pub tactic_rates: BTreeMap<TacticType, f32>,
    pub group_performance: BTreeMap<UnitClass, f32>,
}

impl BattleRecord {
    pub fn new(commander: CommanderId, outcome: &BattleOutcome, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            commander,
            timestamp,
            victory: outcome.victory,
            against_human: outcome.against_human,
            tactic_rates: outcome.tactic_rates.clone(),
            group_performance: outcome.group_performance.clone(),
        }
    }
}

/// What the AI has learned about the human-controlled side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpponentAnalysis {
    pub battles: u32,
    /// Battles the AI won against the human
    pub victories: u32,
    pub tactic_effectiveness: BTreeMap<TacticType, f32>,
    /// Units of each class the human has fielded, summed over sightings
    pub fielded: BTreeMap<UnitClass, u64>,
    pub weaknesses: Vec<TacticType>,
    pub strengths: Vec<TacticType>,
}

impl OpponentAnalysis {
    pub fn record_battle(&mut self, record: &BattleRecord, blend: f32) {
        if !record.against_human {
            return;
        }
        self.battles += 1;
        if record.victory {
            self.victories += 1;
        }
        for (&tactic, &rate) in &record.tactic_rates {
            let entry = self.tactic_effectiveness.entry(tactic).or_insert(0.5);
            *entry = *entry * (1.0 - blend) + rate * blend;
            if rate > WEAKNESS_RATE {
                self.add_weakness(tactic);
            } else if rate < STRENGTH_RATE {
                self.add_strength(tactic);
            }
        }
    }

    pub fn record_composition(&mut self, side: &Side) {
        for class in UnitClass::ALL {
            let count = side.units_of(class);
            if count > 0 {
                *self.fielded.entry(class).or_insert(0) += u64::from(count);
            }
        }
    }

    /// A tactic that works against them; no longer counted as a strength
    pub fn add_weakness(&mut self, tactic: TacticType) {
        self.strengths.retain(|&t| t != tactic);
        if !self.weaknesses.contains(&tactic) {
            self.weaknesses.push(tactic);
        }
    }

    /// A tactic that fails against them; no longer counted as a weakness
    pub fn add_strength(&mut self, tactic: TacticType) {
        self.weaknesses.retain(|&t| t != tactic);
        if !self.strengths.contains(&tactic) {
            self.strengths.push(tactic);
        }
    }

    pub fn top_weaknesses(&self) -> Vec<TacticType> {
        self.weaknesses.iter().take(REPORTED_TRAITS).copied().collect()
    }

    pub fn top_strengths(&self) -> Vec<TacticType> {
        self.strengths.iter().take(REPORTED_TRAITS).copied().collect()
    }

    /// Class the human fields most, if any sightings were recorded
    pub fn favourite_class(&self) -> Option<UnitClass> {
        self.fielded
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(&class, _)| class)
    }
}

/// Pre-battle guidance derived from a commander's memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TacticalAdvice {
    pub suggested_aggression: f32,
    pub recommended_tactic: TacticType,
    pub preferred_terrain: TerrainPreference,
    pub class_effectiveness: BTreeMap<UnitClass, f32>,
    pub arrangements: BTreeMap<UnitClass, Arrangement>,
    pub vendetta: bool,
    pub title: String,
    pub signature_tactics: Vec<TacticType>,
    pub has_learning_data: bool,
    pub encounters: u32,
    pub victories: u32,
    pub opponent_weaknesses: Vec<TacticType>,
    pub opponent_strengths: Vec<TacticType>,
}

impl TacticalAdvice {
    fn from_personality(personality: &PersonalityModel, analysis: &OpponentAnalysis) -> Self {
        Self {
            suggested_aggression: personality.traits.aggressiveness,
            recommended_tactic: personality.recommended_tactic(),
            preferred_terrain: personality.preferred_terrain(),
            class_effectiveness: personality.class_effectiveness(),
            arrangements: UnitClass::ALL
                .iter()
                .map(|&c| (c, personality.recommended_arrangement(c)))
                .collect(),
            vendetta: personality.vendetta,
            title: personality.label.clone(),
            signature_tactics: Vec::new(),
            has_learning_data: personality.battles > 0,
            encounters: 0,
            victories: 0,
            opponent_weaknesses: analysis.top_weaknesses(),
            opponent_strengths: analysis.top_strengths(),
        }
    }

    fn from_record(record: &NemesisRecord, analysis: &OpponentAnalysis) -> Self {
        Self {
            vendetta: record.vendetta,
            title: format!("{} ({})", record.name, record.personality.label),
            signature_tactics: record.signature_tactics.clone(),
            encounters: record.encounters,
            victories: record.victories,
            ..Self::from_personality(&record.personality, analysis)
        }
    }
}

/// On-disk layout
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct MemoryDocument {
    saved_at: Option<DateTime<Utc>>,
    nemeses: Vec<NemesisRecord>,
    history: VecDeque<BattleRecord>,
    opponent: OpponentAnalysis,
}

#[derive(Debug)]
struct MemoryState {
    registry: NemesisRegistry,
    history: VecDeque<BattleRecord>,
    opponent: OpponentAnalysis,
    rng: ChaCha8Rng,
}

impl MemoryState {
    fn from_document(document: MemoryDocument, config: &MemoryConfig) -> Self {
        let mut history = document.history;
        while history.len() > config.history_limit {
            history.pop_front();
        }
        Self {
            registry: NemesisRegistry::from_records(document.nemeses, config.capacity),
            history,
            opponent: document.opponent,
            rng: match config.seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            },
        }
    }

    fn to_document(&self) -> MemoryDocument {
        MemoryDocument {
            saved_at: Some(Utc::now()),
            nemeses: self.registry.records().to_vec(),
            history: self.history.clone(),
            opponent: self.opponent.clone(),
        }
    }
}

/// Shared handle to commander memory
#[derive(Debug, Clone)]
pub struct CommanderMemoryStore {
    config: MemoryConfig,
    state: Arc<Mutex<MemoryState>>,
}

impl CommanderMemoryStore {
    /// Empty in-process memory
    pub fn new(config: MemoryConfig) -> Self {
        let state = MemoryState::from_document(MemoryDocument::default(), &config);
        Self::from_state(config, state)
    }

    fn from_state(config: MemoryConfig, state: MemoryState) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Load from `config.path`, starting fresh on any failure
    pub fn load(config: MemoryConfig) -> Self {
        match Self::try_load(config.clone()) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!("Commander memory unreadable, starting fresh: {}", e);
                Self::new(config)
            }
        }
    }

    /// Load from `config.path`; a missing file is an empty memory
    pub fn try_load(config: MemoryConfig) -> Result<Self> {
        let Some(path) = config.path.clone() else {
            return Ok(Self::new(config));
        };
        if !path.exists() {
            tracing::info!("No commander memory at {:?}, starting fresh", path);
            return Ok(Self::new(config));
        }

        let contents = fs::read_to_string(&path)?;
        let document: MemoryDocument = serde_json::from_str(&contents)?;
        tracing::info!(
            "Loaded {} commanders and {} battles from {:?}",
            document.nemeses.len(),
            document.history.len(),
            path
        );
        let state = MemoryState::from_document(document, &config);
        Ok(Self::from_state(config, state))
    }

    /// Write to `config.path`; a no-op without one
    pub fn save(&self) -> Result<()> {
        match &self.config.path {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    /// Write atomically: a temp file beside the target, then rename
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = {
            let state = self.lock();
            serde_json::to_string_pretty(&state.to_document())?
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        tracing::debug!("Commander memory saved to {:?}", path);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Register a sighting of a commander (see [`NemesisRegistry::identify`])
    pub fn identify(
        &self,
        id: &CommanderId,
        name: &str,
        party_strength: u32,
    ) -> Option<NemesisRecord> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state
            .registry
            .identify(id, name, party_strength, &mut state.rng, Utc::now())
            .cloned()
    }

    pub fn record(&self, id: &CommanderId) -> Option<NemesisRecord> {
        self.lock().registry.get(id).cloned()
    }

    /// Apply a battle result to a tracked commander and log it in history
    pub fn record_outcome(&self, id: &CommanderId, outcome: &BattleOutcome) -> Option<NemesisRecord> {
        if !outcome.is_clean() {
            tracing::warn!("Outcome for {} carried out-of-range rates; dropping or clamping them", id);
        }
        let outcome = &outcome.sanitized();
        let mut state = self.lock();
        let updated = state.registry.apply_outcome(id, outcome, &self.config).cloned()?;

        let record = BattleRecord::new(id.clone(), outcome, Utc::now());
        state.opponent.record_battle(&record, self.config.effectiveness_blend);
        state.history.push_back(record);
        while state.history.len() > self.config.history_limit {
            state.history.pop_front();
        }
        Some(updated)
    }

    /// Planner stance for a commander; unknown commanders use the base
    pub fn stance_for(&self, id: &CommanderId, base_aggression: f32) -> CommanderStance {
        match self.lock().registry.get(id) {
            Some(record) => CommanderStance {
                aggression: record.personality.traits.aggressiveness,
                vendetta: record.vendetta,
            },
            None => CommanderStance {
                aggression: base_aggression,
                vendetta: false,
            },
        }
    }

    pub fn tactical_advice(&self, id: &CommanderId) -> TacticalAdvice {
        let state = self.lock();
        match state.registry.get(id) {
            Some(record) => TacticalAdvice::from_record(record, &state.opponent),
            None => {
                TacticalAdvice::from_personality(&PersonalityModel::default(), &state.opponent)
            }
        }
    }

    /// Credit a single decision; against the human it also feeds the analysis
    pub fn record_tactical_decision(
        &self,
        id: &CommanderId,
        tactic: TacticType,
        success: bool,
        against_human: bool,
    ) -> bool {
        let mut state = self.lock();
        if state
            .registry
            .apply_tactical_decision(id, tactic, success)
            .is_none()
        {
            return false;
        }
        if against_human {
            if success {
                state.opponent.add_weakness(tactic);
            } else {
                state.opponent.add_strength(tactic);
            }
        }
        true
    }

    pub fn record_opponent_composition(&self, side: &Side) {
        self.lock().opponent.record_composition(side);
    }

    pub fn opponent_analysis(&self) -> OpponentAnalysis {
        self.lock().opponent.clone()
    }

    pub fn history(&self) -> Vec<BattleRecord> {
        self.lock().history.iter().cloned().collect()
    }

    /// Tracked commanders in threat order
    pub fn nemeses(&self) -> Vec<NemesisRecord> {
        self.lock().registry.ranked().to_vec()
    }

    pub fn most_dangerous(&self) -> Option<NemesisRecord> {
        self.lock().registry.most_dangerous().cloned()
    }

    pub fn with_vendetta(&self) -> Vec<NemesisRecord> {
        self.lock().registry.with_vendetta().cloned().collect()
    }

    pub fn current(&self) -> Option<NemesisRecord> {
        self.lock().registry.current().cloned()
    }

    /// Forget session-scoped state; tracked commanders stay
    pub fn reset_session(&self) {
        self.lock().registry.reset_session();
    }

    pub fn len(&self) -> usize {
        self.lock().registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().registry.is_empty()
    }
}
