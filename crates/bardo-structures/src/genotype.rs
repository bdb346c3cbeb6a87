// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Genotype entity records: the evolvable description of one agent.
//!
//! Layer coordinates define a feed-forward partial order; any link whose
//! target coordinate is less than or equal to its source's is recurrent and
//! is tracked separately in the source neuron's `ro_ids` so the runtime can
//! prime it.

use serde::{Deserialize, Serialize};

use bardo_neural::{ActivationFunction, AggregationFunction, PlasticityFunction};

use crate::constraint::{
    Constraint, EncodingType, Heredity, Linkform, MutationOperator, PerturbationQty,
    SubstratePlasticity, TotTopologicalMutations, TuningDuration, TuningSelection,
};
use crate::fingerprint::Fingerprint;
use crate::ids::{
    ActuatorId, AgentId, CortexId, LayerIndex, NeuronId, SensorId, SpecieId, SubstrateId,
};

/// One synaptic weight plus the plasticity parameters attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapticWeight {
    pub value: f64,
    pub params: Vec<f64>,
}

impl SynapticWeight {
    pub fn new(value: f64, params: Vec<f64>) -> Self {
        SynapticWeight { value, params }
    }
}

/// Where a neuron input comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// Synthetic constant-1 source; at most one per input list.
    Bias,
    Sensor(SensorId),
    Neuron(NeuronId),
}

impl SignalSource {
    /// Output vector length of the source (`1` for neurons and bias).
    pub fn vl_of_neuron_or_bias(&self) -> Option<usize> {
        match self {
            SignalSource::Bias | SignalSource::Neuron(_) => Some(1),
            SignalSource::Sensor(_) => None,
        }
    }

    /// Layer coordinate; bias has none.
    pub fn layer(&self) -> Option<LayerIndex> {
        match self {
            SignalSource::Bias => None,
            SignalSource::Sensor(id) => Some(id.layer()),
            SignalSource::Neuron(id) => Some(id.layer()),
        }
    }
}

/// Where a neuron output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalTarget {
    Neuron(NeuronId),
    Actuator(ActuatorId),
}

impl SignalTarget {
    pub fn layer(&self) -> LayerIndex {
        match self {
            SignalTarget::Neuron(id) => id.layer(),
            SignalTarget::Actuator(id) => id.layer(),
        }
    }
}

/// One entry of a neuron's ordered input list. The list order is the
/// canonical ordering of the neuron's concatenated input vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputLink {
    pub source: SignalSource,
    pub weights: Vec<SynapticWeight>,
}

impl InputLink {
    pub fn new(source: SignalSource, weights: Vec<SynapticWeight>) -> Self {
        InputLink { source, weights }
    }
}

/// Reference to an element touched by a mutation, recorded in evo history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementRef {
    Bias,
    Neuron(NeuronId),
    Sensor(SensorId),
    Actuator(ActuatorId),
    Cortex(CortexId),
}

impl ElementRef {
    pub fn layer(&self) -> Option<LayerIndex> {
        match self {
            ElementRef::Bias => None,
            ElementRef::Neuron(id) => Some(id.layer()),
            ElementRef::Sensor(id) => Some(id.layer()),
            ElementRef::Actuator(id) => Some(id.layer()),
            ElementRef::Cortex(_) => None,
        }
    }
}

/// One applied mutation: operator tag plus the elements it touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvoHistEntry {
    pub operator: MutationOperator,
    pub elements: Vec<ElementRef>,
}

impl EvoHistEntry {
    pub fn new(operator: MutationOperator, elements: Vec<ElementRef>) -> Self {
        EvoHistEntry { operator, elements }
    }
}

/// Processing element of the evolved graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neuron {
    pub id: NeuronId,
    pub cortex_id: CortexId,
    /// Generation the neuron was created or last topologically touched in.
    pub generation: u64,
    pub activation: ActivationFunction,
    pub plasticity: PlasticityFunction,
    /// Per-neuron plasticity parameters (shape dictated by the rule).
    pub neural_params: Vec<f64>,
    pub aggregation: AggregationFunction,
    /// Ordered synaptic input list; order is observable semantics.
    pub input_idps: Vec<InputLink>,
    /// Ordered modulatory input list; only populated when the plasticity
    /// rule reads a modulatory channel.
    pub input_idps_modulation: Vec<InputLink>,
    pub output_ids: Vec<SignalTarget>,
    /// The subset of `output_ids` whose target layer is ≤ this neuron's.
    pub ro_ids: Vec<NeuronId>,
}

impl Neuron {
    /// Look up the synaptic input link for `source`.
    pub fn input_link(&self, source: &SignalSource) -> Option<&InputLink> {
        self.input_idps.iter().find(|l| &l.source == source)
    }

    pub fn has_input_from(&self, source: &SignalSource) -> bool {
        self.input_link(source).is_some()
    }

    pub fn has_output_to(&self, target: &SignalTarget) -> bool {
        self.output_ids.contains(target)
    }

    /// Total number of synaptic weights across all inputs.
    pub fn total_inbound_weights(&self) -> usize {
        self.input_idps.iter().map(|l| l.weights.len()).sum()
    }

    /// Recompute `ro_ids` from `output_ids`. Call after any output edit.
    pub fn refresh_ro_ids(&mut self) {
        self.ro_ids = self
            .output_ids
            .iter()
            .filter_map(|t| match t {
                SignalTarget::Neuron(nid) if nid.layer() <= self.id.layer() => Some(*nid),
                _ => None,
            })
            .collect();
    }
}

/// Which scape an adapter binds to. Private scapes are spawned per agent;
/// public scapes are shared by the whole population.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScapeRef {
    Private(String),
    Public(String),
}

impl ScapeRef {
    pub fn name(&self) -> &str {
        match self {
            ScapeRef::Private(n) | ScapeRef::Public(n) => n,
        }
    }
}

/// Geometry hint used for substrate placement of an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalFormat {
    NoGeo,
    Symmetric { dims: Vec<usize> },
}

/// External-interface adapter that reads the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: SensorId,
    /// Lookup key in the morphology library of the embedding application.
    pub name: String,
    pub cortex_id: Option<CortexId>,
    pub scape: ScapeRef,
    /// Output vector length.
    pub vl: usize,
    pub fanout_ids: Vec<NeuronId>,
    pub generation: u64,
    pub format: SignalFormat,
    pub parameters: serde_json::Value,
}

/// External-interface adapter that acts on the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actuator {
    pub id: ActuatorId,
    pub name: String,
    pub cortex_id: Option<CortexId>,
    pub scape: ScapeRef,
    /// Input vector length: one component per fan-in neuron.
    pub vl: usize,
    pub fanin_ids: Vec<NeuronId>,
    pub generation: u64,
    pub format: SignalFormat,
    pub parameters: serde_json::Value,
}

/// Coordinator record: ordered element id lists of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cortex {
    pub id: CortexId,
    pub agent_id: AgentId,
    pub sensor_ids: Vec<SensorId>,
    pub actuator_ids: Vec<ActuatorId>,
    pub neuron_ids: Vec<NeuronId>,
}

/// Dense-substrate description for substrate-encoded agents. The evolved
/// network acts as a pattern producer that paints this grid's weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substrate {
    pub id: SubstrateId,
    pub agent_id: AgentId,
    /// Neurode count per hidden substrate layer.
    pub densities: Vec<usize>,
    pub linkform: Linkform,
    pub plasticity: SubstratePlasticity,
    /// Connection-point sensors feeding coordinates into the evolved net.
    pub cpp_ids: Vec<SensorId>,
    /// Connection-expression actuators reading weights back out.
    pub cep_ids: Vec<ActuatorId>,
}

/// One individual: the evolvable record that owns a cortex and optionally a
/// substrate, plus its per-agent search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub specie_id: SpecieId,
    pub cortex_id: CortexId,
    pub substrate_id: Option<SubstrateId>,
    pub generation: u64,
    pub encoding: EncodingType,
    pub fingerprint: Fingerprint,
    pub constraint: Constraint,
    pub evo_hist: Vec<EvoHistEntry>,
    pub fitness: Vec<f64>,
    pub main_fitness: f64,
    /// Layer coordinate → neuron ids; exactly partitions the cortex's
    /// neurons.
    pub pattern: Vec<(LayerIndex, Vec<NeuronId>)>,
    pub tuning_selection_f: TuningSelection,
    pub annealing_parameter: f64,
    pub tuning_duration_f: TuningDuration,
    pub perturbation_range: f64,
    pub perturbation_qty: PerturbationQty,
    pub mutation_operators: Vec<MutationOperator>,
    pub tot_topological_mutations_f: TotTopologicalMutations,
    pub heredity_type: Heredity,
    pub parent_ids: Vec<AgentId>,
    pub offspring_ids: Vec<AgentId>,
    /// True once the agent has entered a hall of fame.
    pub champion: bool,
    /// Fitness-stagnation factor in (0, 1].
    pub fs: f64,
}

impl Agent {
    pub fn neuron_count(&self) -> usize {
        self.pattern.iter().map(|(_, ids)| ids.len()).sum()
    }

    /// All neuron ids in pattern order.
    pub fn pattern_neuron_ids(&self) -> Vec<NeuronId> {
        self.pattern
            .iter()
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    /// Insert a neuron id into the pattern, creating its layer on demand
    /// and keeping layers sorted by coordinate.
    pub fn pattern_insert(&mut self, id: NeuronId) {
        match self.pattern.iter_mut().find(|(l, _)| *l == id.layer()) {
            Some((_, ids)) => ids.push(id),
            None => {
                self.pattern.push((id.layer(), vec![id]));
                self.pattern.sort_by(|(a, _), (b, _)| a.cmp(b));
            }
        }
    }
}
