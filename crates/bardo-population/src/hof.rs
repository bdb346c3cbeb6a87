// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Hall of fame maintenance.
//!
//! HOF slots are partitioned by `hof_fingerprint`: the tuple of
//! distinguisher outputs (total neuron count by default). Within one
//! partition, champions form a Pareto front over their fitness vectors: a
//! candidate that strictly dominates a champion replaces it, a dominated
//! candidate is rejected, and mixed comparisons keep both.

use tracing::debug;

use bardo_state::Store;
use bardo_structures::{Agent, AgentId, Champion, Distinguisher, Specie};

use crate::error::Result;

/// Component-wise comparison margin: a component only counts as an
/// improvement when it clears the incumbent by this factor of its
/// magnitude.
const DOMINATION_THRESHOLD: f64 = 1e-9;

/// Outcome of offering a candidate to the hall of fame.
#[derive(Debug, Clone, PartialEq)]
pub enum HofOutcome {
    /// First champion of its structural niche.
    Added,
    /// Strictly dominated one or more champions; their agent ids are
    /// returned so the caller can release the lost genotypes.
    Replaced(Vec<AgentId>),
    /// Dominated by an incumbent of the same niche.
    Rejected,
}

/// Evaluate the specie's distinguishers for an agent.
pub fn hof_fingerprint(store: &Store, specie: &Specie, agent: &Agent) -> Result<Vec<i64>> {
    let cortex = store.read_cortex(&agent.cortex_id)?;
    Ok(specie
        .distinguishers
        .iter()
        .map(|d| match d {
            Distinguisher::TotN => cortex.neuron_ids.len() as i64,
            Distinguisher::TotSensors => cortex.sensor_ids.len() as i64,
            Distinguisher::TotActuators => cortex.actuator_ids.len() as i64,
        })
        .collect())
}

/// Build a champion record for an evaluated agent.
pub fn champion_of(store: &Store, specie: &Specie, agent: &Agent) -> Result<Champion> {
    Ok(Champion {
        hof_fingerprint: hof_fingerprint(store, specie, agent)?,
        agent_id: agent.id,
        fitness: agent.fitness.clone(),
        validation_fitness: None,
        main_fitness: agent.main_fitness,
        tot_n: agent.neuron_count(),
        generation: agent.generation,
        fs: agent.fs,
    })
}

fn component(fitness: &[f64], i: usize) -> f64 {
    fitness.get(i).copied().unwrap_or(0.0)
}

/// True when `a` strictly dominates `b`: every component improves by more
/// than the threshold.
fn strictly_dominates(a: &[f64], b: &[f64]) -> bool {
    let width = a.len().max(b.len());
    if width == 0 {
        return false;
    }
    (0..width).all(|i| {
        let (x, y) = (component(a, i), component(b, i));
        x - y > DOMINATION_THRESHOLD * y.abs().max(1.0)
    })
}

/// Offer a candidate champion to the specie's hall of fame.
pub fn update_hof(specie: &mut Specie, candidate: Champion) -> HofOutcome {
    let mut displaced = Vec::new();
    for champ in specie
        .hall_of_fame
        .iter()
        .filter(|c| c.hof_fingerprint == candidate.hof_fingerprint)
    {
        if strictly_dominates(&champ.fitness, &candidate.fitness) {
            return HofOutcome::Rejected;
        }
        if strictly_dominates(&candidate.fitness, &champ.fitness) {
            displaced.push(champ.agent_id);
        }
    }

    specie
        .hall_of_fame
        .retain(|c| !displaced.contains(&c.agent_id));
    debug!(
        specie = %specie.id,
        agent = %candidate.agent_id,
        displaced = displaced.len(),
        "hall of fame updated"
    );
    specie.hall_of_fame.push(candidate);

    if displaced.is_empty() {
        // New niche, or a mixed comparison joining the Pareto front.
        HofOutcome::Added
    } else {
        HofOutcome::Replaced(displaced)
    }
}

/// Apply the fitness-stagnation update to an agent record:
/// accepted → `fs += 0.1·(1 − fs)`, rejected → `fs −= 0.1·fs`.
pub fn update_fs(store: &Store, agent_id: &AgentId, accepted: bool) -> Result<()> {
    let Ok(mut agent) = store.read_agent(agent_id) else {
        // The parent may already be culled; stagnation then has no target.
        return Ok(());
    };
    if accepted {
        agent.fs += 0.1 * (1.0 - agent.fs);
    } else {
        agent.fs -= 0.1 * agent.fs;
    }
    store.write_agent(agent);
    Ok(())
}
