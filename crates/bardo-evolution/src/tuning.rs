// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tuning-phase selection and duration.
//!
//! When an agent enters its parametric-tuning phase, a selection function
//! picks which neurons get perturbed and with what spread, and a duration
//! function bounds how many perturbation attempts one evaluation may spend.
//!
//! `spread = perturbation_range · π · annealing^age`, where age is the
//! difference between the agent's generation and the neuron's. An annealing
//! parameter below 1 cools old neurons down exponentially.

use bardo_neural::random::{random_f64, random_index};
use bardo_structures::{NeuronId, TuningDuration, TuningSelection};

/// Neurons younger than this count as "recently added" for the
/// proportional duration functions and the `active` selection pool.
const ACTIVE_AGE_LIMIT: u64 = 3;

fn age(agent_generation: u64, neuron_generation: u64) -> u64 {
    agent_generation.saturating_sub(neuron_generation)
}

fn spread_for(age: u64, perturbation_range: f64, annealing: f64) -> f64 {
    perturbation_range * std::f64::consts::PI * annealing.powi(age as i32)
}

/// Select `(neuron, spread)` pairs for one perturbation attempt.
///
/// `neurons` carries `(id, generation)` for every neuron of the agent. The
/// pool variants that can come up empty (`current`, `active`, `dynamic`)
/// fall back to the full neuron set; `dynamic_random` additionally
/// force-includes the first id at maximum spread when sub-sampling leaves
/// nothing.
pub fn select_for_tuning(
    neurons: &[(NeuronId, u64)],
    agent_generation: u64,
    f: TuningSelection,
    perturbation_range: f64,
    annealing: f64,
) -> Vec<(NeuronId, f64)> {
    if neurons.is_empty() {
        return vec![];
    }

    let pool: Vec<(NeuronId, u64)> = match f {
        TuningSelection::All | TuningSelection::AllRandom => neurons.to_vec(),
        TuningSelection::Current | TuningSelection::CurrentRandom => {
            let current: Vec<_> = neurons
                .iter()
                .filter(|(_, g)| *g == agent_generation)
                .copied()
                .collect();
            if current.is_empty() {
                neurons.to_vec()
            } else {
                current
            }
        }
        TuningSelection::Active | TuningSelection::ActiveRandom => {
            let active: Vec<_> = neurons
                .iter()
                .filter(|(_, g)| age(agent_generation, *g) < ACTIVE_AGE_LIMIT)
                .copied()
                .collect();
            if active.is_empty() {
                neurons.to_vec()
            } else {
                active
            }
        }
        TuningSelection::Dynamic | TuningSelection::DynamicRandom => {
            // age_limit = sqrt(1/U), U ~ Uniform(0,1], resampled per call.
            let u = 1.0 - random_f64();
            let age_limit = (1.0 / u).sqrt();
            let young: Vec<_> = neurons
                .iter()
                .filter(|(_, g)| (age(agent_generation, *g) as f64) < age_limit)
                .copied()
                .collect();
            if young.is_empty() {
                neurons.to_vec()
            } else {
                young
            }
        }
    };

    let sub_sample = matches!(
        f,
        TuningSelection::AllRandom
            | TuningSelection::CurrentRandom
            | TuningSelection::ActiveRandom
            | TuningSelection::DynamicRandom
    );

    let mut selected: Vec<(NeuronId, f64)> = Vec::with_capacity(pool.len());
    let keep_p = 1.0 / (pool.len() as f64).sqrt();
    for (id, g) in &pool {
        if sub_sample && random_f64() >= keep_p {
            continue;
        }
        let spread = spread_for(age(agent_generation, *g), perturbation_range, annealing);
        selected.push((*id, spread));
    }

    if selected.is_empty() && f == TuningSelection::DynamicRandom {
        let (id, _) = pool[random_index(pool.len())];
        selected.push((id, perturbation_range * std::f64::consts::PI));
    }
    selected
}

/// Resolve the maximum attempt count for one tuning phase.
///
/// `neurons` carries `(generation, inbound weight count)` per neuron. The
/// proportional variants measure recently added neurons only, falling back
/// to the whole network when nothing is recent.
pub fn tuning_budget(
    f: TuningDuration,
    agent_generation: u64,
    neurons: &[(u64, usize)],
) -> u32 {
    match f {
        TuningDuration::Const(c) => c.max(1),
        TuningDuration::WsizeProportional(m) => {
            let recent: usize = measured(neurons, agent_generation, |(_, w)| *w);
            ((m * recent as f64).ceil() as u32).max(1)
        }
        TuningDuration::NsizeProportional(m) => {
            let recent: usize = measured(neurons, agent_generation, |_| 1);
            ((m * recent as f64).ceil() as u32).max(1)
        }
    }
}

fn measured(
    neurons: &[(u64, usize)],
    agent_generation: u64,
    weigh: fn(&(u64, usize)) -> usize,
) -> usize {
    let recent: usize = neurons
        .iter()
        .filter(|(g, _)| age(agent_generation, *g) < ACTIVE_AGE_LIMIT)
        .map(weigh)
        .sum();
    if recent > 0 {
        recent
    } else {
        neurons.iter().map(weigh).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bardo_structures::LayerIndex;

    fn ids(gens: &[u64]) -> Vec<(NeuronId, u64)> {
        gens.iter()
            .map(|g| (NeuronId::generate(LayerIndex::new(0.0)), *g))
            .collect()
    }

    #[test]
    fn test_all_selects_everything() {
        let neurons = ids(&[5, 5, 5]);
        let selected = select_for_tuning(&neurons, 5, TuningSelection::All, 1.0, 1.0);
        assert_eq!(selected.len(), 3);
        for (_, spread) in &selected {
            assert!((spread - std::f64::consts::PI).abs() < 1e-12);
        }
    }

    #[test]
    fn test_annealing_cools_old_neurons() {
        let neurons = ids(&[10, 8]);
        let selected = select_for_tuning(&neurons, 10, TuningSelection::All, 1.0, 0.5);
        let young = selected[0].1;
        let old = selected[1].1;
        assert!((young - std::f64::consts::PI).abs() < 1e-12);
        assert!((old - std::f64::consts::PI * 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_current_falls_back_to_all() {
        let neurons = ids(&[1, 2]);
        let selected = select_for_tuning(&neurons, 9, TuningSelection::Current, 1.0, 1.0);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_dynamic_random_is_never_empty() {
        let neurons = ids(&[0; 16]);
        for _ in 0..50 {
            let selected =
                select_for_tuning(&neurons, 100, TuningSelection::DynamicRandom, 1.0, 1.0);
            assert!(!selected.is_empty());
        }
    }

    #[test]
    fn test_tuning_budget_variants() {
        // Two recent neurons (ages 0 and 1) with 4 and 6 weights, one old.
        let neurons = [(10, 4), (9, 6), (0, 100)];
        assert_eq!(tuning_budget(TuningDuration::Const(7), 10, &neurons), 7);
        assert_eq!(
            tuning_budget(TuningDuration::WsizeProportional(0.5), 10, &neurons),
            5
        );
        assert_eq!(
            tuning_budget(TuningDuration::NsizeProportional(0.5), 10, &neurons),
            1
        );
        // Nothing recent: measures the whole network instead.
        assert_eq!(
            tuning_budget(TuningDuration::WsizeProportional(0.5), 50, &neurons),
            55
        );
    }
}
