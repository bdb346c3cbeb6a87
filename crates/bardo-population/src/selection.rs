// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Selection algorithms: how the next generation is assembled.
//!
//! `shof_ratio` splits the `specie_size_limit` slots between the hall of
//! fame and the still-active non-champion agents ("losers"). HOF slots are
//! allotted proportionally to the algorithm's score; each slot either
//! re-enters the champion itself (probability `re_entry_probability`, which
//! removes it from the HOF) or spawns a mutated clone. The active share
//! first carries forward the best losers per `survival_percentage`, then
//! fills the rest with their offspring.

use tracing::debug;

use bardo_evolution::{clone_agent, mutate_agent, MorphologyRegistry};
use bardo_neural::random::{random_f64, random_index};
use bardo_state::Store;
use bardo_structures::{
    AgentId, Champion, ExperimentConfig, SelectionAlgorithm, Specie,
};

use crate::error::Result;

/// Score one champion under the given algorithm. `eff` is the configured
/// exponent on the neuron count.
fn champion_score(algorithm: SelectionAlgorithm, c: &Champion, eff: f64) -> f64 {
    let tot_n = c.tot_n.max(1) as f64;
    match algorithm {
        SelectionAlgorithm::HofCompetition => c.fs * c.main_fitness / tot_n.powf(eff),
        SelectionAlgorithm::HofEfficiency => c.fs * c.main_fitness / tot_n,
        SelectionAlgorithm::HofRandom => c.fs,
        // Rank-family scores are assigned by the caller from sorted order.
        SelectionAlgorithm::HofRank | SelectionAlgorithm::HofTop3 => c.fs * c.main_fitness,
    }
}

/// `(champion index, score)` pairs with rank-family post-processing applied.
fn scored_champions(
    algorithm: SelectionAlgorithm,
    hof: &[Champion],
    eff: f64,
) -> Vec<(usize, f64)> {
    let mut scored: Vec<(usize, f64)> = hof
        .iter()
        .enumerate()
        .map(|(i, c)| (i, champion_score(algorithm, c, eff).max(0.0)))
        .collect();
    match algorithm {
        SelectionAlgorithm::HofRank => {
            // Integer rank by score, 1 = worst. Ties rank by insertion
            // order, oldest first.
            scored.sort_by(|(ia, a), (ib, b)| a.total_cmp(b).then(ia.cmp(ib)));
            for (rank, entry) in scored.iter_mut().enumerate() {
                entry.1 = (rank + 1) as f64;
            }
        }
        SelectionAlgorithm::HofTop3 => {
            scored.sort_by(|(ia, a), (ib, b)| a.total_cmp(b).then(ia.cmp(ib)));
            let len = scored.len();
            for (rank, entry) in scored.iter_mut().enumerate() {
                entry.1 = if rank + 3 >= len { (rank + 1) as f64 } else { 0.0 };
            }
        }
        _ => {}
    }
    scored
}

/// Allot `slots` proportionally to the scores (largest-remainder rounding).
fn allot(scored: &[(usize, f64)], slots: usize) -> Vec<(usize, usize)> {
    let total: f64 = scored.iter().map(|(_, s)| s).sum();
    if slots == 0 || scored.is_empty() {
        return vec![];
    }
    if total <= 0.0 {
        // Degenerate scores: uniform allotment.
        let mut out: Vec<(usize, usize)> = scored.iter().map(|(i, _)| (*i, 0)).collect();
        let out_len = out.len();
        for k in 0..slots {
            out[k % out_len].1 += 1;
        }
        return out;
    }
    let mut out: Vec<(usize, usize, f64)> = scored
        .iter()
        .map(|(i, s)| {
            let exact = s / total * slots as f64;
            (*i, exact.floor() as usize, exact.fract())
        })
        .collect();
    let mut assigned: usize = out.iter().map(|(_, n, _)| n).sum();
    out.sort_by(|a, b| b.2.total_cmp(&a.2));
    let mut k = 0;
    let out_len = out.len();
    while assigned < slots {
        out[k % out_len].1 += 1;
        assigned += 1;
        k += 1;
    }
    out.into_iter().map(|(i, n, _)| (i, n)).collect()
}

/// Clone-and-mutate a parent into a registered offspring.
pub fn create_offspring(
    store: &Store,
    registry: &MorphologyRegistry,
    parent_id: &AgentId,
) -> Result<AgentId> {
    let child_id = clone_agent(store, parent_id)?;
    let mut child = store.read_agent(&child_id)?;
    child.parent_ids = vec![*parent_id];
    child.champion = false;
    child.fs = 1.0;
    child.fitness = vec![];
    child.main_fitness = 0.0;
    store.write_agent(child);

    mutate_agent(store, registry, &child_id)?;

    let mut parent = store.read_agent(parent_id)?;
    parent.offspring_ids.push(child_id);
    store.write_agent(parent);
    Ok(child_id)
}

/// Assemble the specie's next generation, returning the new `agent_ids`.
///
/// `losers` are the current-generation agents that were not champions. Any
/// loser not carried forward is deleted unless the hall of fame still
/// references it.
pub fn assemble_next_generation(
    store: &Store,
    registry: &MorphologyRegistry,
    specie: &mut Specie,
    losers: &[AgentId],
    config: &ExperimentConfig,
) -> Result<Vec<AgentId>> {
    let limit = config.specie_size_limit.max(1);
    let hof_slots = (config.shof_ratio * limit as f64).round() as usize;
    let hof_slots = hof_slots.min(limit);
    let active_slots = limit - hof_slots;

    let mut next: Vec<AgentId> = Vec::with_capacity(limit);

    // --- Hall-of-fame share -------------------------------------------------
    let scored = scored_champions(
        config.selection_algorithm,
        &specie.hall_of_fame,
        config.selection_algorithm_efficiency,
    );
    let mut re_entered: Vec<AgentId> = vec![];
    for (champ_idx, n_slots) in allot(&scored, hof_slots) {
        let champ_agent = specie.hall_of_fame[champ_idx].agent_id;
        for _ in 0..n_slots {
            if next.len() >= limit {
                break;
            }
            if random_f64() < config.re_entry_probability && !re_entered.contains(&champ_agent) {
                // The champion re-enters the arena as itself and gives up
                // its hall-of-fame slot.
                re_entered.push(champ_agent);
                next.push(champ_agent);
            } else {
                next.push(create_offspring(store, registry, &champ_agent)?);
            }
        }
    }
    specie
        .hall_of_fame
        .retain(|c| !re_entered.contains(&c.agent_id));

    // --- Active (non-champion) share ---------------------------------------
    if active_slots > 0 && !losers.is_empty() {
        let mut ranked: Vec<(AgentId, f64)> = losers
            .iter()
            .filter_map(|id| {
                store
                    .read_agent(id)
                    .ok()
                    .map(|a| (*id, (a.fs * a.main_fitness).max(0.0)))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let carried = ((config.survival_percentage * active_slots as f64).round() as usize)
            .min(ranked.len())
            .min(active_slots);
        for (id, _) in ranked.iter().take(carried) {
            next.push(*id);
        }
        let scored_losers: Vec<(usize, f64)> =
            ranked.iter().enumerate().map(|(i, (_, s))| (i, *s)).collect();
        for (idx, n_slots) in allot(&scored_losers, active_slots - carried) {
            for _ in 0..n_slots {
                if next.len() >= limit {
                    break;
                }
                next.push(create_offspring(store, registry, &ranked[idx].0)?);
            }
        }
    } else if active_slots > 0 && !specie.hall_of_fame.is_empty() {
        // No losers to draw from: the HOF fills the remainder.
        let scored = scored_champions(
            config.selection_algorithm,
            &specie.hall_of_fame,
            config.selection_algorithm_efficiency,
        );
        for (champ_idx, n_slots) in allot(&scored, active_slots) {
            let champ_agent = specie.hall_of_fame[champ_idx].agent_id;
            for _ in 0..n_slots {
                next.push(create_offspring(store, registry, &champ_agent)?);
            }
        }
    }

    // A degenerate configuration can leave the generation empty; keep the
    // specie alive by respawning from a random champion or loser.
    if next.is_empty() {
        let parent = specie
            .hall_of_fame
            .first()
            .map(|c| c.agent_id)
            .or_else(|| losers.first().copied());
        if let Some(parent) = parent {
            next.push(create_offspring(store, registry, &parent)?);
        }
    }

    // --- Cull ---------------------------------------------------------------
    let protected: Vec<AgentId> = specie
        .hall_of_fame
        .iter()
        .map(|c| c.agent_id)
        .chain(next.iter().copied())
        .collect();
    for id in losers {
        if !protected.contains(id) {
            let _ = store.delete_agent_cascade(id);
        }
    }

    debug!(
        specie = %specie.id,
        next = next.len(),
        hof = specie.hall_of_fame.len(),
        "assembled next generation"
    );
    Ok(next)
}

/// Steady-state parent pick: champions weighted by
/// `main_fitness · fs / tot_n^efficiency`.
pub fn pick_steady_state_parent(specie: &Specie, efficiency: f64) -> Option<AgentId> {
    if specie.hall_of_fame.is_empty() {
        return None;
    }
    let weights: Vec<f64> = specie
        .hall_of_fame
        .iter()
        .map(|c| (c.main_fitness * c.fs / (c.tot_n.max(1) as f64).powf(efficiency)).max(0.0))
        .collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        let i = random_index(specie.hall_of_fame.len());
        return Some(specie.hall_of_fame[i].agent_id);
    }
    let mut draw = random_f64() * total;
    for (c, w) in specie.hall_of_fame.iter().zip(weights.iter()) {
        draw -= w;
        if draw <= 0.0 {
            return Some(c.agent_id);
        }
    }
    specie.hall_of_fame.last().map(|c| c.agent_id)
}
