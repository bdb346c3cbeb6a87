// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Mesh cycle-protocol integration: reference output of a hand-built
//! network, and deadlock freedom with recurrent links.

mod common;

use std::sync::Arc;

use parking_lot::Mutex;

use bardo::mesh::{evaluate_agent, EvaluationOptions, Scape, ScapeRegistry, ScapeResponse};
use bardo::neural::ActivationFunction;
use bardo::state::Store;
use bardo::structures::{Heredity, InputLink, SignalSource, SignalTarget, SynapticWeight, TuningDuration};

use common::{build_single_neuron_agent, ProbeScape};

#[test]
fn test_single_neuron_smoke() {
    let store = Store::new();
    let outputs: Arc<Mutex<Vec<Vec<f64>>>> = Arc::new(Mutex::new(vec![]));
    let scapes = ScapeRegistry::new();
    let recorded = outputs.clone();
    scapes.register_public(
        "probe",
        Box::new(ProbeScape {
            input: vec![0.8, 0.4],
            outputs: recorded,
        }),
    );

    let agent_id = build_single_neuron_agent(
        &store,
        "probe",
        &[0.5, 0.3],
        Some(0.1),
        ActivationFunction::Tanh,
        TuningDuration::Const(1),
        Heredity::Darwinian,
    );

    let options = EvaluationOptions {
        tune: false,
        ..Default::default()
    };
    let result = evaluate_agent(&store, &scapes, &agent_id, &options).unwrap();

    // tanh(0.8*0.5 + 0.4*0.3 + 0.1) = tanh(0.62)
    let expected = 0.62_f64.tanh();
    let observed = outputs.lock()[0][0];
    assert!(
        (observed - expected).abs() < 1e-9,
        "expected {}, observed {}",
        expected,
        observed
    );
    assert!((result.fitness[0] - expected).abs() < 1e-9);
    assert_eq!(result.cycles, 1);

    // The achieved fitness lands on the agent record.
    let agent = store.read_agent(&agent_id).unwrap();
    assert_eq!(agent.fitness, result.fitness);
}

/// Runs the agent for a fixed number of cycles, echoing a constant input.
struct CyclesScape {
    cycles_left: u32,
    outputs: Arc<Mutex<Vec<Vec<f64>>>>,
}

impl Scape for CyclesScape {
    fn sense(&mut self, _sensor: &bardo::structures::Sensor) -> Vec<f64> {
        vec![1.0]
    }

    fn actuate(
        &mut self,
        _actuator: &bardo::structures::Actuator,
        output: &[f64],
    ) -> ScapeResponse {
        self.outputs.lock().push(output.to_vec());
        self.cycles_left -= 1;
        if self.cycles_left == 0 {
            ScapeResponse::halt(vec![output[0]])
        } else {
            ScapeResponse::cont(vec![])
        }
    }
}

#[test]
fn test_recurrent_neuron_is_deadlock_free_across_cycles() {
    let store = Store::new();
    let agent_id = build_single_neuron_agent(
        &store,
        "cycles",
        &[1.0],
        None,
        ActivationFunction::Tanh,
        TuningDuration::Const(1),
        Heredity::Darwinian,
    );

    // Make the neuron self-recurrent: output to itself with weight 0.5.
    let graph = store.agent_graph(&agent_id).unwrap();
    let neuron_id = *graph.neurons.keys().next().unwrap();
    let mut neuron = store.read_neuron(&neuron_id).unwrap();
    neuron.input_idps.push(InputLink::new(
        SignalSource::Neuron(neuron_id),
        vec![SynapticWeight::new(0.5, vec![])],
    ));
    neuron.output_ids.push(SignalTarget::Neuron(neuron_id));
    neuron.refresh_ro_ids();
    assert_eq!(neuron.ro_ids, vec![neuron_id]);
    store.write_neuron(neuron);

    let outputs: Arc<Mutex<Vec<Vec<f64>>>> = Arc::new(Mutex::new(vec![]));
    let scapes = ScapeRegistry::new();
    let recorded = outputs.clone();
    scapes.register_public(
        "cycles",
        Box::new(CyclesScape {
            cycles_left: 3,
            outputs: recorded,
        }),
    );

    let options = EvaluationOptions {
        tune: false,
        ..Default::default()
    };
    let result = evaluate_agent(&store, &scapes, &agent_id, &options).unwrap();
    assert_eq!(result.cycles, 3);

    let outputs = outputs.lock();
    // Cycle 1 sees the priming zero on the recurrent input; cycle 2 sees
    // cycle 1's real output arrive before aggregation.
    let first = outputs[0][0];
    let second = outputs[1][0];
    assert!((first - 1.0_f64.tanh()).abs() < 1e-9);
    let expected_second = (1.0 + 0.5 * first).tanh();
    assert!(
        (second - expected_second).abs() < 1e-9,
        "expected {}, observed {}",
        expected_second,
        second
    );
}
