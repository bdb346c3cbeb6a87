// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-specie statistics snapshots and the population trace.

use std::time::Instant;

use bardo_neural::utils::{avg, std_dev, vec_avg, vec_max, vec_min, vec_std_dev};
use bardo_state::Store;
use bardo_structures::{distinct_fingerprints, FitnessStats, Specie, SpecieStat};

use crate::error::Result;

/// Monotonic clock anchored at controller start; snapshots are stamped with
/// nanoseconds since the anchor.
pub struct MonotonicClock {
    anchor: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        MonotonicClock {
            anchor: Instant::now(),
        }
    }

    pub fn now_ns(&self) -> u128 {
        self.anchor.elapsed().as_nanos()
    }
}

/// Compute one snapshot of a specie from its current agents.
pub fn specie_snapshot(
    store: &Store,
    specie: &Specie,
    tot_evaluations: u64,
    time_ns: u128,
    validation_fitness: Option<f64>,
) -> Result<SpecieStat> {
    let mut neuron_counts = Vec::with_capacity(specie.agent_ids.len());
    let mut fitnesses: Vec<Vec<f64>> = Vec::with_capacity(specie.agent_ids.len());
    let mut fingerprints = Vec::with_capacity(specie.agent_ids.len());

    let mut agents = Vec::with_capacity(specie.agent_ids.len());
    for id in &specie.agent_ids {
        if let Ok(agent) = store.read_agent(id) {
            agents.push(agent);
        }
    }
    for agent in &agents {
        neuron_counts.push(agent.neuron_count() as f64);
        fitnesses.push(agent.fitness.clone());
        fingerprints.push(&agent.fingerprint);
    }

    Ok(SpecieStat {
        morphology: specie.constraint.morphology.clone(),
        specie_id: specie.id,
        avg_neurons: avg(&neuron_counts),
        std_neurons: std_dev(&neuron_counts),
        avg_fitness: vec_avg(&fitnesses),
        std_fitness: vec_std_dev(&fitnesses),
        max_fitness: vec_max(&fitnesses),
        min_fitness: vec_min(&fitnesses),
        diversity: distinct_fingerprints(&fingerprints),
        tot_evaluations,
        time_ns,
        validation_fitness,
    })
}

/// Refresh the specie's aggregate fitness tuple from its agents.
pub fn refresh_specie_fitness(store: &Store, specie: &mut Specie) -> Result<()> {
    let fitnesses: Vec<Vec<f64>> = specie
        .agent_ids
        .iter()
        .filter_map(|id| store.read_agent(id).ok().map(|a| a.fitness))
        .collect();
    specie.fitness = FitnessStats {
        avg: vec_avg(&fitnesses),
        std: vec_std_dev(&fitnesses),
        max: vec_max(&fitnesses),
        min: vec_min(&fitnesses),
    };

    // Innovation accounting: does the best fitness still improve?
    let best = specie
        .fitness
        .max
        .first()
        .copied()
        .unwrap_or(f64::NEG_INFINITY);
    if best > specie.innovation.best_fitness_seen {
        specie.innovation.best_fitness_seen = best;
        specie.innovation.stale_generations = 0;
    } else {
        specie.innovation.stale_generations += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = MonotonicClock::start();
        let a = clock.now_ns();
        let b = clock.now_ns();
        assert!(b >= a);
    }
}
