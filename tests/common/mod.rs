// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures: the XOR morphology/scape pair and a manual
//! single-neuron genotype builder.

use std::sync::Arc;

use parking_lot::Mutex;

use bardo::evolution::{ActuatorSpec, Morphology, SensorSpec};
use bardo::mesh::{Scape, ScapeResponse};
use bardo::neural::{ActivationFunction, AggregationFunction, PlasticityFunction};
use bardo::state::Store;
use bardo::structures::{
    Actuator, ActuatorId, Agent, AgentId, Constraint, Cortex, CortexId, EncodingType, Heredity,
    InputLink, LayerIndex, MutationOperator, Neuron, NeuronId, PerturbationQty, ScapeRef, Sensor,
    SensorId, SignalFormat, SignalSource, SignalTarget, SpecieId, SynapticWeight,
    TotTopologicalMutations, TuningDuration, TuningSelection,
};

pub const XOR_PATTERNS: [([f64; 2], f64); 4] = [
    ([-1.0, -1.0], -1.0),
    ([-1.0, 1.0], 1.0),
    ([1.0, -1.0], 1.0),
    ([1.0, 1.0], -1.0),
];

/// The classic XOR mimic: fitness is `4 − Σ|target − output|` over the four
/// patterns, so a perfect network scores 4.
pub struct XorScape {
    index: usize,
    error: f64,
}

impl XorScape {
    pub fn new() -> Self {
        XorScape { index: 0, error: 0.0 }
    }
}

impl Scape for XorScape {
    fn sense(&mut self, _sensor: &Sensor) -> Vec<f64> {
        XOR_PATTERNS[self.index].0.to_vec()
    }

    fn actuate(&mut self, _actuator: &Actuator, output: &[f64]) -> ScapeResponse {
        let target = XOR_PATTERNS[self.index].1;
        self.error += (target - output.first().copied().unwrap_or(0.0)).abs();
        self.index += 1;
        if self.index == XOR_PATTERNS.len() {
            ScapeResponse::halt(vec![4.0 - self.error])
        } else {
            ScapeResponse::cont(vec![])
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.error = 0.0;
    }
}

pub struct XorMorphology;

impl Morphology for XorMorphology {
    fn sensors(&self) -> Vec<SensorSpec> {
        vec![SensorSpec::new("xor_inputs", 2, ScapeRef::Private("xor".into()))]
    }

    fn actuators(&self) -> Vec<ActuatorSpec> {
        vec![ActuatorSpec::new("xor_output", 1, ScapeRef::Private("xor".into()))]
    }
}

/// XOR constraint: tanh-heavy palette, modest tuning budget.
pub fn xor_constraint() -> Constraint {
    let mut constraint = Constraint::for_morphology("xor");
    constraint.neural_afs = vec![
        ActivationFunction::Tanh,
        ActivationFunction::Sin,
        ActivationFunction::Gaussian,
    ];
    constraint
}

/// Hand-build a one-neuron agent: `sensor(vl) → neuron → actuator`, with
/// the given synaptic weights and optional bias, bound to `scape_name`.
#[allow(clippy::too_many_arguments)]
pub fn build_single_neuron_agent(
    store: &Store,
    scape_name: &str,
    weights: &[f64],
    bias: Option<f64>,
    activation: ActivationFunction,
    tuning_duration: TuningDuration,
    heredity: Heredity,
) -> AgentId {
    let agent_id = AgentId::generate();
    let cortex_id = CortexId::generate();
    let sensor_id = SensorId::generate();
    let actuator_id = ActuatorId::generate();
    let neuron_id = NeuronId::generate(LayerIndex::new(0.0));

    let mut input_idps = vec![InputLink::new(
        SignalSource::Sensor(sensor_id),
        weights
            .iter()
            .map(|w| SynapticWeight::new(*w, vec![]))
            .collect(),
    )];
    if let Some(b) = bias {
        input_idps.push(InputLink::new(
            SignalSource::Bias,
            vec![SynapticWeight::new(b, vec![])],
        ));
    }

    store.write_sensor(Sensor {
        id: sensor_id,
        name: "probe_inputs".into(),
        cortex_id: Some(cortex_id),
        scape: ScapeRef::Private(scape_name.into()),
        vl: weights.len(),
        fanout_ids: vec![neuron_id],
        generation: 0,
        format: SignalFormat::NoGeo,
        parameters: serde_json::Value::Null,
    });
    store.write_actuator(Actuator {
        id: actuator_id,
        name: "probe_output".into(),
        cortex_id: Some(cortex_id),
        scape: ScapeRef::Private(scape_name.into()),
        vl: 1,
        fanin_ids: vec![neuron_id],
        generation: 0,
        format: SignalFormat::NoGeo,
        parameters: serde_json::Value::Null,
    });
    store.write_neuron(Neuron {
        id: neuron_id,
        cortex_id,
        generation: 0,
        activation,
        plasticity: PlasticityFunction::None,
        neural_params: vec![],
        aggregation: AggregationFunction::DotProduct,
        input_idps,
        input_idps_modulation: vec![],
        output_ids: vec![SignalTarget::Actuator(actuator_id)],
        ro_ids: vec![],
    });
    store.write_cortex(Cortex {
        id: cortex_id,
        agent_id,
        sensor_ids: vec![sensor_id],
        actuator_ids: vec![actuator_id],
        neuron_ids: vec![neuron_id],
    });
    store.write_agent(Agent {
        id: agent_id,
        specie_id: SpecieId::generate(),
        cortex_id,
        substrate_id: None,
        generation: 0,
        encoding: EncodingType::Neural,
        fingerprint: Default::default(),
        constraint: Constraint::default(),
        evo_hist: vec![],
        fitness: vec![],
        main_fitness: 0.0,
        pattern: vec![(LayerIndex::new(0.0), vec![neuron_id])],
        tuning_selection_f: TuningSelection::All,
        annealing_parameter: 1.0,
        tuning_duration_f: tuning_duration,
        perturbation_range: 1.0,
        perturbation_qty: PerturbationQty::Multiple,
        mutation_operators: MutationOperator::standard_set(),
        tot_topological_mutations_f: TotTopologicalMutations::NCountLinear(1.0),
        heredity_type: heredity,
        parent_ids: vec![],
        offspring_ids: vec![],
        champion: false,
        fs: 1.0,
    });
    agent_id
}

/// A scape that feeds a fixed vector and records every actuation.
pub struct ProbeScape {
    pub input: Vec<f64>,
    pub outputs: Arc<Mutex<Vec<Vec<f64>>>>,
}

impl Scape for ProbeScape {
    fn sense(&mut self, _sensor: &Sensor) -> Vec<f64> {
        self.input.clone()
    }

    fn actuate(&mut self, _actuator: &Actuator, output: &[f64]) -> ScapeResponse {
        self.outputs.lock().push(output.to_vec());
        ScapeResponse::halt(vec![output.first().copied().unwrap_or(0.0)])
    }
}
