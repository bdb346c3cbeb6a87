// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bookkeeping registries: active/inactive agent sets, the population
//! status record with its op-tag state machine, and per-specie evaluation
//! counters. All support single-row updates under write concurrency.

use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;
use tracing::debug;

use bardo_structures::{AgentId, OpTag, PopulationStatus, SpecieId};

use crate::error::{Result, StateError};

/// Tracks which agents are currently being evaluated.
#[derive(Default)]
pub struct ActiveAgentRegistry {
    active: RwLock<AHashSet<AgentId>>,
    inactive: RwLock<AHashSet<AgentId>>,
}

impl ActiveAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&self, id: AgentId) {
        self.inactive.write().remove(&id);
        self.active.write().insert(id);
    }

    /// Move an agent from the active to the inactive set.
    pub fn deactivate(&self, id: &AgentId) -> Result<()> {
        if !self.active.write().remove(id) {
            return Err(StateError::NotFound(id.to_string()));
        }
        self.inactive.write().insert(*id);
        Ok(())
    }

    /// Drop an agent from both sets (culled by selection).
    pub fn remove(&self, id: &AgentId) {
        self.active.write().remove(id);
        self.inactive.write().remove(id);
    }

    pub fn is_active(&self, id: &AgentId) -> bool {
        self.active.read().contains(id)
    }

    pub fn active_count(&self) -> usize {
        self.active.read().len()
    }

    pub fn active_ids(&self) -> Vec<AgentId> {
        self.active.read().iter().copied().collect()
    }

    pub fn inactive_ids(&self) -> Vec<AgentId> {
        self.inactive.read().iter().copied().collect()
    }

    pub fn clear(&self) {
        self.active.write().clear();
        self.inactive.write().clear();
    }
}

/// The volatile run-control record, with validated op-tag transitions.
#[derive(Default)]
pub struct PopulationStatusCell {
    inner: RwLock<PopulationStatus>,
}

impl PopulationStatusCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> PopulationStatus {
        self.inner.read().clone()
    }

    /// Valid transitions: `Continue ↔ Pause`, `Continue|Pause → Done`.
    /// `Done` is terminal. Setting the current tag again is a no-op.
    pub fn set_op_tag(&self, tag: OpTag) -> Result<()> {
        let mut status = self.inner.write();
        let from = status.op_tag;
        let ok = matches!(
            (from, tag),
            (OpTag::Continue, OpTag::Pause)
                | (OpTag::Pause, OpTag::Continue)
                | (OpTag::Continue, OpTag::Done)
                | (OpTag::Pause, OpTag::Done)
        ) || from == tag;
        if !ok {
            return Err(StateError::InvalidTransition {
                from: format!("{:?}", from),
                to: format!("{:?}", tag),
            });
        }
        if from != tag {
            debug!(?from, to = ?tag, "op-tag transition");
        }
        status.op_tag = tag;
        Ok(())
    }

    pub fn op_tag(&self) -> OpTag {
        self.inner.read().op_tag
    }

    pub fn set_goal_reached(&self) {
        self.inner.write().goal_reached = true;
    }

    pub fn goal_reached(&self) -> bool {
        self.inner.read().goal_reached
    }

    pub fn bump_generation(&self) -> u64 {
        let mut status = self.inner.write();
        status.pop_gen += 1;
        status.pop_gen
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().pop_gen
    }

    /// Fold one finished evaluation into the accumulators. Returns the new
    /// accumulated evaluation count since the last stats snapshot.
    pub fn add_evaluation(&self, cycles: u64, time_ns: u128) -> u64 {
        let mut status = self.inner.write();
        status.eval_acc += 1;
        status.cycle_acc += cycles;
        status.time_acc_ns += time_ns;
        status.tot_evaluations += 1;
        status.eval_acc
    }

    /// Reset the snapshot-window accumulators, returning their final values
    /// as `(evals, cycles, time_ns)`.
    pub fn take_window(&self) -> (u64, u64, u128) {
        let mut status = self.inner.write();
        let window = (status.eval_acc, status.cycle_acc, status.time_acc_ns);
        status.eval_acc = 0;
        status.cycle_acc = 0;
        status.time_acc_ns = 0;
        window
    }

    pub fn tot_evaluations(&self) -> u64 {
        self.inner.read().tot_evaluations
    }
}

/// Per-specie usage accounting: evaluations, cycles, wall-clock.
#[derive(Default)]
pub struct EvaluationCounters {
    inner: RwLock<AHashMap<SpecieId, (u64, u64, u128)>>,
}

impl EvaluationCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, specie: SpecieId, evals: u64, cycles: u64, time_ns: u128) {
        let mut map = self.inner.write();
        let entry = map.entry(specie).or_insert((0, 0, 0));
        entry.0 += evals;
        entry.1 += cycles;
        entry.2 += time_ns;
    }

    pub fn get(&self, specie: &SpecieId) -> (u64, u64, u128) {
        self.inner.read().get(specie).copied().unwrap_or((0, 0, 0))
    }

    pub fn total_evaluations(&self) -> u64 {
        self.inner.read().values().map(|(e, _, _)| e).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activate_deactivate() {
        let reg = ActiveAgentRegistry::new();
        let id = AgentId::generate();
        reg.activate(id);
        assert!(reg.is_active(&id));
        reg.deactivate(&id).unwrap();
        assert!(!reg.is_active(&id));
        assert_eq!(reg.inactive_ids(), vec![id]);
    }

    #[test]
    fn test_deactivate_unknown_fails() {
        let reg = ActiveAgentRegistry::new();
        assert!(reg.deactivate(&AgentId::generate()).is_err());
    }

    #[test]
    fn test_op_tag_transitions() {
        let cell = PopulationStatusCell::new();
        cell.set_op_tag(OpTag::Pause).unwrap();
        cell.set_op_tag(OpTag::Continue).unwrap();
        cell.set_op_tag(OpTag::Done).unwrap();
        // Done is terminal.
        assert!(cell.set_op_tag(OpTag::Continue).is_err());
        assert!(cell.set_op_tag(OpTag::Pause).is_err());
        // Re-setting the same tag is fine.
        cell.set_op_tag(OpTag::Done).unwrap();
    }

    #[test]
    fn test_evaluation_accounting() {
        let cell = PopulationStatusCell::new();
        assert_eq!(cell.add_evaluation(10, 1_000), 1);
        assert_eq!(cell.add_evaluation(5, 500), 2);
        let (evals, cycles, time) = cell.take_window();
        assert_eq!((evals, cycles, time), (2, 15, 1_500));
        // Window resets, totals persist.
        assert_eq!(cell.add_evaluation(1, 1), 1);
        assert_eq!(cell.tot_evaluations(), 3);
    }

    #[test]
    fn test_per_specie_counters() {
        let counters = EvaluationCounters::new();
        let sp = SpecieId::generate();
        counters.add(sp, 2, 20, 100);
        counters.add(sp, 1, 10, 50);
        assert_eq!(counters.get(&sp), (3, 30, 150));
        assert_eq!(counters.total_evaluations(), 3);
    }
}
