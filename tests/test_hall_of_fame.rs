// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Hall-of-fame domination scenarios over the public API.

use bardo::population::{update_hof, HofOutcome};
use bardo::structures::{AgentId, Champion, Constraint, PopulationId, Specie, SpecieId};

fn champion(fitness: Vec<f64>) -> Champion {
    Champion {
        hof_fingerprint: vec![3],
        agent_id: AgentId::generate(),
        fitness: fitness.clone(),
        validation_fitness: None,
        main_fitness: fitness[0],
        tot_n: 3,
        generation: 0,
        fs: 1.0,
    }
}

#[test]
fn test_insert_replace_reject_sequence() {
    let mut specie = Specie::new(
        SpecieId::generate(),
        PopulationId::generate(),
        Constraint::default(),
    );

    // A with [1.0, 2.0] occupies the niche.
    let a = champion(vec![1.0, 2.0]);
    let a_id = a.agent_id;
    assert_eq!(update_hof(&mut specie, a), HofOutcome::Added);

    // B with [2.0, 3.0] strictly dominates A and must replace it.
    let b = champion(vec![2.0, 3.0]);
    let b_id = b.agent_id;
    match update_hof(&mut specie, b) {
        HofOutcome::Replaced(lost) => assert_eq!(lost, vec![a_id]),
        other => panic!("expected B to replace A, got {:?}", other),
    }

    // C with [1.5, 2.5] is dominated by B and must be rejected.
    let c = champion(vec![1.5, 2.5]);
    assert_eq!(update_hof(&mut specie, c), HofOutcome::Rejected);

    assert_eq!(specie.hall_of_fame.len(), 1);
    assert_eq!(specie.hall_of_fame[0].agent_id, b_id);
}

#[test]
fn test_hof_stays_pareto_consistent_under_random_inserts() {
    let mut specie = Specie::new(
        SpecieId::generate(),
        PopulationId::generate(),
        Constraint::default(),
    );
    for _ in 0..200 {
        let fitness = vec![
            bardo::neural::random::random_f64() * 10.0,
            bardo::neural::random::random_f64() * 10.0,
        ];
        update_hof(&mut specie, champion(fitness));
    }
    // No same-niche champion may strictly dominate another.
    let front = &specie.hall_of_fame;
    for (i, a) in front.iter().enumerate() {
        for b in front.iter().skip(i + 1) {
            let a_dominates = a.fitness[0] > b.fitness[0] && a.fitness[1] > b.fitness[1];
            let b_dominates = b.fitness[0] > a.fitness[0] && b.fitness[1] > a.fitness[1];
            assert!(
                !(a_dominates || b_dominates),
                "dominated champion retained: {:?} vs {:?}",
                a.fitness,
                b.fitness
            );
        }
    }
}
