// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! The mutation engine.
//!
//! Mutating an agent bumps its generation, applies one evolution-strategy
//! mutator (retrying alternatives when a palette offers none), then applies
//! topological/parametric operators drawn from the agent's palette until
//! the target count succeeds. An operator that finds nothing to do reports
//! [`MutationOutcome::NotApplicable`] and the engine retries with another
//! draw; anything that would break a structural invariant is an error, not
//! an outcome.

use tracing::{trace, warn};

use bardo_neural::random::{gaussian, pick, random_f64, random_index, try_pick};
use bardo_neural::utils::{saturate, WEIGHT_SAT_LIMIT};
use bardo_neural::PlasticityFunction;
use bardo_state::{AgentGraph, Store};
use bardo_structures::{
    ActuatorId, AgentId, ElementRef, EvoHistEntry, InputLink, LayerIndex, MutationOperator,
    Neuron, NeuronId, PerturbationQty, SensorId, SignalSource, SignalTarget, StrategyMutator,
    SynapticWeight,
};

use crate::error::{EvolutionError, Result};
use crate::fingerprint::update_fingerprint;
use crate::genotype::{instantiate_actuator, instantiate_sensor, seed_neuron};
use crate::linker::{
    cut_neuron_to_neuron, link_neuron_to_actuator, link_neuron_to_neuron, link_sensor_to_neuron,
};
use crate::morphology::MorphologyRegistry;
use crate::tuning::select_for_tuning;

/// Result of one operator application.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// The operator changed the genotype; the entry goes into evo history.
    Applied(EvoHistEntry),
    /// Nothing to do (precondition unmet); the engine retries another
    /// operator. Never fatal.
    NotApplicable,
}

use MutationOutcome::{Applied, NotApplicable};

/// Sensors the agent's neurons may read: CPPs for substrate encoding, the
/// cortex sensors otherwise.
fn feed_sensor_ids(graph: &AgentGraph) -> Vec<SensorId> {
    match &graph.substrate {
        Some(substrate) => substrate.cpp_ids.clone(),
        None => graph.cortex.sensor_ids.clone(),
    }
}

/// Actuators the agent's neurons may drive: CEPs for substrate encoding.
fn drive_actuator_ids(graph: &AgentGraph) -> Vec<ActuatorId> {
    match &graph.substrate {
        Some(substrate) => substrate.cep_ids.clone(),
        None => graph.cortex.actuator_ids.clone(),
    }
}

/// Mutate an agent in place: generation bump, one strategy mutation, then
/// `tot_topological_mutations_f(neuron count)` successful operators, and a
/// fingerprint refresh.
pub fn mutate_agent(
    store: &Store,
    registry: &MorphologyRegistry,
    agent_id: &AgentId,
) -> Result<()> {
    let mut agent = store.read_agent(agent_id)?;
    agent.generation += 1;
    store.write_agent(agent);

    mutate_search_strategy(store, agent_id)?;

    let agent = store.read_agent(agent_id)?;
    let target = agent.tot_topological_mutations_f.count(agent.neuron_count());

    let mut applied = 0usize;
    let mut attempts = 0usize;
    let attempt_cap = 50 * target + 100;
    while applied < target && attempts < attempt_cap {
        attempts += 1;
        let agent = store.read_agent(agent_id)?;
        let op = *pick(&agent.mutation_operators);
        match apply_operator(store, registry, agent_id, op)? {
            Applied(entry) => {
                let mut agent = store.read_agent(agent_id)?;
                agent.evo_hist.push(entry);
                store.write_agent(agent);
                applied += 1;
                trace!(agent = %agent_id, ?op, "applied mutation");
            }
            NotApplicable => {}
        }
    }
    if applied == 0 {
        return Err(EvolutionError::MutationStalled(agent_id.to_string()));
    }
    if applied < target {
        warn!(agent = %agent_id, applied, target, "mutation pass under target");
    }

    update_fingerprint(store, agent_id)?;
    Ok(())
}

/// Apply one evolution-strategy mutator, trying each in random order until
/// one finds an alternative value in its palette. All-exhausted is fine.
fn mutate_search_strategy(store: &Store, agent_id: &AgentId) -> Result<()> {
    let mut order = StrategyMutator::all();
    // Fisher-Yates, thread-local rng.
    for i in (1..order.len()).rev() {
        order.swap(i, random_index(i + 1));
    }

    let mut agent = store.read_agent(agent_id)?;
    for mutator in order {
        let changed = match mutator {
            StrategyMutator::MutateTuningSelection => {
                let options: Vec<_> = agent
                    .constraint
                    .tuning_selection_fs
                    .iter()
                    .filter(|f| **f != agent.tuning_selection_f)
                    .copied()
                    .collect();
                match try_pick(&options) {
                    Some(f) => {
                        agent.tuning_selection_f = *f;
                        true
                    }
                    None => false,
                }
            }
            StrategyMutator::MutateTuningAnnealing => {
                let options: Vec<_> = agent
                    .constraint
                    .annealing_parameters
                    .iter()
                    .filter(|a| **a != agent.annealing_parameter)
                    .copied()
                    .collect();
                match try_pick(&options) {
                    Some(a) => {
                        agent.annealing_parameter = *a;
                        true
                    }
                    None => false,
                }
            }
            StrategyMutator::MutateTotTopologicalMutations => {
                let options: Vec<_> = agent
                    .constraint
                    .tot_topological_mutations_fs
                    .iter()
                    .filter(|f| **f != agent.tot_topological_mutations_f)
                    .copied()
                    .collect();
                match try_pick(&options) {
                    Some(f) => {
                        agent.tot_topological_mutations_f = *f;
                        true
                    }
                    None => false,
                }
            }
            StrategyMutator::MutateHeredityType => {
                let options: Vec<_> = agent
                    .constraint
                    .heredity_types
                    .iter()
                    .filter(|h| **h != agent.heredity_type)
                    .copied()
                    .collect();
                match try_pick(&options) {
                    Some(h) => {
                        agent.heredity_type = *h;
                        true
                    }
                    None => false,
                }
            }
        };
        if changed {
            store.write_agent(agent);
            return Ok(());
        }
    }
    Ok(())
}

/// Dispatch a single operator.
pub fn apply_operator(
    store: &Store,
    registry: &MorphologyRegistry,
    agent_id: &AgentId,
    op: MutationOperator,
) -> Result<MutationOutcome> {
    match op {
        MutationOperator::MutateWeights => mutate_weights(store, agent_id),
        MutationOperator::AddBias => add_bias(store, agent_id),
        MutationOperator::RemoveBias => remove_bias(store, agent_id),
        MutationOperator::MutateAf => mutate_af(store, agent_id),
        MutationOperator::MutatePf => mutate_pf(store, agent_id),
        MutationOperator::PerturbPf => perturb_pf(store, agent_id),
        MutationOperator::AddNeuron => add_neuron(store, agent_id),
        MutationOperator::Splice => splice(store, agent_id),
        MutationOperator::AddInlink => add_inlink(store, agent_id),
        MutationOperator::AddOutlink => add_outlink(store, agent_id),
        MutationOperator::AddSensorlink => add_sensorlink(store, agent_id),
        MutationOperator::AddActuatorlink => add_actuatorlink(store, agent_id),
        MutationOperator::AddSensor => add_sensor(store, registry, agent_id),
        MutationOperator::AddActuator => add_actuator(store, registry, agent_id),
    }
}

fn perturb_neuron_weights(neuron: &mut Neuron, spread: f64) {
    let total = neuron.total_inbound_weights();
    if total == 0 {
        return;
    }
    let mp = 1.0 / (total as f64).sqrt();
    for link in neuron.input_idps.iter_mut() {
        for w in link.weights.iter_mut() {
            if random_f64() < mp {
                w.value = saturate(w.value + gaussian() * spread, WEIGHT_SAT_LIMIT);
            }
        }
    }
}

fn mutate_weights(store: &Store, agent_id: &AgentId) -> Result<MutationOutcome> {
    let graph = store.agent_graph(agent_id)?;
    if graph.neurons.is_empty() {
        return Ok(NotApplicable);
    }
    let agent = &graph.agent;
    let targets: Vec<(NeuronId, f64)> = match agent.perturbation_qty {
        PerturbationQty::Single => {
            let ids: Vec<_> = graph.neurons.keys().copied().collect();
            let id = *pick(&ids);
            vec![(id, agent.perturbation_range * std::f64::consts::PI)]
        }
        PerturbationQty::Multiple => {
            let pool: Vec<(NeuronId, u64)> =
                graph.neurons.values().map(|n| (n.id, n.generation)).collect();
            let selected = select_for_tuning(
                &pool,
                agent.generation,
                agent.tuning_selection_f,
                agent.perturbation_range,
                agent.annealing_parameter,
            );
            if selected.is_empty() {
                let id = pool[random_index(pool.len())].0;
                vec![(id, agent.perturbation_range * std::f64::consts::PI)]
            } else {
                selected
            }
        }
    };

    let mut elements = Vec::with_capacity(targets.len());
    for (id, spread) in targets {
        let mut neuron = store.read_neuron(&id)?;
        perturb_neuron_weights(&mut neuron, spread);
        store.write_neuron(neuron);
        elements.push(ElementRef::Neuron(id));
    }
    Ok(Applied(EvoHistEntry::new(MutationOperator::MutateWeights, elements)))
}

fn bias_weight(pf: PlasticityFunction) -> SynapticWeight {
    SynapticWeight::new(random_f64() - 0.5, pf.weight_parameters())
}

fn add_bias(store: &Store, agent_id: &AgentId) -> Result<MutationOutcome> {
    let graph = store.agent_graph(agent_id)?;
    if graph.neurons.is_empty() {
        return Ok(NotApplicable);
    }
    let ids: Vec<_> = graph.neurons.keys().copied().collect();
    let id = *pick(&ids);
    let mut neuron = store.read_neuron(&id)?;

    let weight = bias_weight(neuron.plasticity);
    let synaptic_free = !neuron.has_input_from(&SignalSource::Bias);
    let modulatory_free = neuron.plasticity.needs_modulation()
        && !neuron
            .input_idps_modulation
            .iter()
            .any(|l| l.source == SignalSource::Bias);
    let channel = match (synaptic_free, modulatory_free) {
        (false, false) => return Ok(NotApplicable),
        (true, false) => &mut neuron.input_idps,
        (false, true) => &mut neuron.input_idps_modulation,
        (true, true) => {
            if random_f64() < 0.5 {
                &mut neuron.input_idps
            } else {
                &mut neuron.input_idps_modulation
            }
        }
    };
    channel.push(InputLink::new(SignalSource::Bias, vec![weight]));
    neuron.generation = graph.agent.generation;
    store.write_neuron(neuron);
    Ok(Applied(EvoHistEntry::new(
        MutationOperator::AddBias,
        vec![ElementRef::Neuron(id), ElementRef::Bias],
    )))
}

fn remove_bias(store: &Store, agent_id: &AgentId) -> Result<MutationOutcome> {
    let graph = store.agent_graph(agent_id)?;
    if graph.neurons.is_empty() {
        return Ok(NotApplicable);
    }
    let ids: Vec<_> = graph.neurons.keys().copied().collect();
    let id = *pick(&ids);
    let mut neuron = store.read_neuron(&id)?;

    let synaptic = neuron.has_input_from(&SignalSource::Bias);
    let modulatory = neuron
        .input_idps_modulation
        .iter()
        .any(|l| l.source == SignalSource::Bias);
    let channel = match (synaptic, modulatory) {
        (false, false) => return Ok(NotApplicable),
        (true, false) => &mut neuron.input_idps,
        (false, true) => &mut neuron.input_idps_modulation,
        (true, true) => {
            if random_f64() < 0.5 {
                &mut neuron.input_idps
            } else {
                &mut neuron.input_idps_modulation
            }
        }
    };
    channel.retain(|l| l.source != SignalSource::Bias);
    neuron.generation = graph.agent.generation;
    store.write_neuron(neuron);
    Ok(Applied(EvoHistEntry::new(
        MutationOperator::RemoveBias,
        vec![ElementRef::Neuron(id), ElementRef::Bias],
    )))
}

fn mutate_af(store: &Store, agent_id: &AgentId) -> Result<MutationOutcome> {
    let graph = store.agent_graph(agent_id)?;
    if graph.neurons.is_empty() {
        return Ok(NotApplicable);
    }
    let ids: Vec<_> = graph.neurons.keys().copied().collect();
    let id = *pick(&ids);
    let mut neuron = store.read_neuron(&id)?;
    let options: Vec<_> = graph
        .agent
        .constraint
        .neural_afs
        .iter()
        .filter(|af| **af != neuron.activation)
        .copied()
        .collect();
    let Some(af) = try_pick(&options) else {
        return Ok(NotApplicable);
    };
    neuron.activation = *af;
    neuron.generation = graph.agent.generation;
    store.write_neuron(neuron);
    Ok(Applied(EvoHistEntry::new(
        MutationOperator::MutateAf,
        vec![ElementRef::Neuron(id)],
    )))
}

fn mutate_pf(store: &Store, agent_id: &AgentId) -> Result<MutationOutcome> {
    let graph = store.agent_graph(agent_id)?;
    if graph.neurons.is_empty() {
        return Ok(NotApplicable);
    }
    let ids: Vec<_> = graph.neurons.keys().copied().collect();
    let id = *pick(&ids);
    let mut neuron = store.read_neuron(&id)?;
    let options: Vec<_> = graph
        .agent
        .constraint
        .neural_pfs
        .iter()
        .filter(|pf| **pf != neuron.plasticity)
        .copied()
        .collect();
    let Some(pf) = try_pick(&options) else {
        return Ok(NotApplicable);
    };
    let pf = *pf;
    neuron.plasticity = pf;
    neuron.neural_params = pf.neural_parameters();
    for link in neuron.input_idps.iter_mut() {
        for w in link.weights.iter_mut() {
            w.params = pf.weight_parameters();
        }
    }
    if pf.needs_modulation() {
        if neuron.input_idps_modulation.is_empty() {
            neuron
                .input_idps_modulation
                .push(InputLink::new(SignalSource::Bias, vec![bias_weight(pf)]));
        } else {
            for link in neuron.input_idps_modulation.iter_mut() {
                for w in link.weights.iter_mut() {
                    w.params = pf.weight_parameters();
                }
            }
        }
    } else {
        neuron.input_idps_modulation.clear();
    }
    neuron.generation = graph.agent.generation;
    store.write_neuron(neuron);
    Ok(Applied(EvoHistEntry::new(
        MutationOperator::MutatePf,
        vec![ElementRef::Neuron(id)],
    )))
}

fn perturb_pf(store: &Store, agent_id: &AgentId) -> Result<MutationOutcome> {
    let graph = store.agent_graph(agent_id)?;
    if graph.neurons.is_empty() {
        return Ok(NotApplicable);
    }
    let ids: Vec<_> = graph.neurons.keys().copied().collect();
    let id = *pick(&ids);
    let mut neuron = store.read_neuron(&id)?;
    let has_params = !neuron.neural_params.is_empty()
        || neuron
            .input_idps
            .iter()
            .chain(neuron.input_idps_modulation.iter())
            .any(|l| l.weights.iter().any(|w| !w.params.is_empty()));
    if !has_params {
        return Ok(NotApplicable);
    }
    let spread = graph.agent.perturbation_range * std::f64::consts::PI;
    PlasticityFunction::perturb_parameters(&mut neuron.neural_params, spread);
    for link in neuron
        .input_idps
        .iter_mut()
        .chain(neuron.input_idps_modulation.iter_mut())
    {
        for w in link.weights.iter_mut() {
            PlasticityFunction::perturb_parameters(&mut w.params, spread);
        }
    }
    neuron.generation = graph.agent.generation;
    store.write_neuron(neuron);
    Ok(Applied(EvoHistEntry::new(
        MutationOperator::PerturbPf,
        vec![ElementRef::Neuron(id)],
    )))
}

fn add_neuron(store: &Store, agent_id: &AgentId) -> Result<MutationOutcome> {
    let graph = store.agent_graph(agent_id)?;
    let mut agent = graph.agent.clone();
    let existing: Vec<NeuronId> = graph.neurons.keys().copied().collect();
    if existing.is_empty() {
        return Ok(NotApplicable);
    }

    // Existing layer or a fresh coordinate in [0, 1).
    let layer = if random_f64() < 0.5 {
        agent.pattern[random_index(agent.pattern.len())].0
    } else {
        LayerIndex::new(random_f64())
    };
    let neuron = seed_neuron(&agent.constraint, agent.cortex_id, layer, agent.generation);
    let new_id = neuron.id;
    store.write_neuron(neuron);

    // One inbound link from a random source.
    let feed = feed_sensor_ids(&graph);
    let in_options = existing.len() + feed.len();
    let linked_in = {
        let i = random_index(in_options);
        if i < feed.len() {
            link_sensor_to_neuron(store, &feed[i], &new_id)?
        } else {
            link_neuron_to_neuron(store, &existing[i - feed.len()], &new_id)?
        }
    };

    // One outbound link to a random downstream element.
    let mut drive: Vec<ActuatorId> = vec![];
    for aid in drive_actuator_ids(&graph) {
        let actuator = store.read_actuator(&aid)?;
        if actuator.fanin_ids.len() < actuator.vl {
            drive.push(aid);
        }
    }
    let out_options = existing.len() + drive.len();
    let linked_out = {
        let i = random_index(out_options);
        if i < drive.len() {
            link_neuron_to_actuator(store, &new_id, &drive[i])?
        } else {
            link_neuron_to_neuron(store, &new_id, &existing[i - drive.len()])?
        }
    };
    if !(linked_in && linked_out) {
        // Fresh neuron: both links are always new, so a failure here means
        // an invariant broke.
        return Err(EvolutionError::InvariantViolation(format!(
            "seed links for new neuron {} failed",
            new_id
        )));
    }

    let mut cortex = store.read_cortex(&agent.cortex_id)?;
    cortex.neuron_ids.push(new_id);
    store.write_cortex(cortex);
    agent.pattern_insert(new_id);
    store.write_agent(agent);
    Ok(Applied(EvoHistEntry::new(
        MutationOperator::AddNeuron,
        vec![ElementRef::Neuron(new_id)],
    )))
}

fn splice(store: &Store, agent_id: &AgentId) -> Result<MutationOutcome> {
    let graph = store.agent_graph(agent_id)?;
    let mut agent = graph.agent.clone();
    let candidates: Vec<&Neuron> = graph
        .neurons
        .values()
        .filter(|n| !n.output_ids.is_empty())
        .collect();
    if candidates.is_empty() {
        return Ok(NotApplicable);
    }
    let a = candidates[random_index(candidates.len())];
    let a_id = a.id;
    let target = a.output_ids[random_index(a.output_ids.len())];

    let new_layer = LayerIndex::midpoint(a_id.layer(), target.layer());
    let neuron = seed_neuron(&agent.constraint, agent.cortex_id, new_layer, agent.generation);
    let n_id = neuron.id;
    store.write_neuron(neuron);

    match target {
        SignalTarget::Neuron(b_id) => {
            if !cut_neuron_to_neuron(store, &a_id, &b_id)? {
                return Err(EvolutionError::InvariantViolation(format!(
                    "splice lost link {} -> {}",
                    a_id, b_id
                )));
            }
            link_neuron_to_neuron(store, &a_id, &n_id)?;
            link_neuron_to_neuron(store, &n_id, &b_id)?;
        }
        SignalTarget::Actuator(act_id) => {
            // Replace A's fan-in slot in place to keep the actuator's input
            // ordering stable.
            let mut actuator = store.read_actuator(&act_id)?;
            let Some(slot) = actuator.fanin_ids.iter().position(|id| *id == a_id) else {
                return Err(EvolutionError::InvariantViolation(format!(
                    "actuator {} does not read {}",
                    act_id, a_id
                )));
            };
            actuator.fanin_ids[slot] = n_id;
            store.write_actuator(actuator);

            let mut src = store.read_neuron(&a_id)?;
            src.output_ids.retain(|t| t != &SignalTarget::Actuator(act_id));
            src.refresh_ro_ids();
            store.write_neuron(src);

            let mut mid = store.read_neuron(&n_id)?;
            mid.output_ids.push(SignalTarget::Actuator(act_id));
            store.write_neuron(mid);

            link_neuron_to_neuron(store, &a_id, &n_id)?;
        }
    }

    let mut cortex = store.read_cortex(&agent.cortex_id)?;
    cortex.neuron_ids.push(n_id);
    store.write_cortex(cortex);
    agent.pattern_insert(n_id);
    store.write_agent(agent);

    let target_ref = match target {
        SignalTarget::Neuron(id) => ElementRef::Neuron(id),
        SignalTarget::Actuator(id) => ElementRef::Actuator(id),
    };
    Ok(Applied(EvoHistEntry::new(
        MutationOperator::Splice,
        vec![ElementRef::Neuron(a_id), ElementRef::Neuron(n_id), target_ref],
    )))
}

fn add_inlink(store: &Store, agent_id: &AgentId) -> Result<MutationOutcome> {
    let graph = store.agent_graph(agent_id)?;
    if graph.neurons.is_empty() {
        return Ok(NotApplicable);
    }
    let ids: Vec<_> = graph.neurons.keys().copied().collect();
    let id = *pick(&ids);
    let neuron = store.read_neuron(&id)?;

    let mut sensor_options: Vec<SensorId> = vec![];
    for sid in feed_sensor_ids(&graph) {
        if !neuron.has_input_from(&SignalSource::Sensor(sid)) {
            sensor_options.push(sid);
        }
    }
    let neuron_options: Vec<NeuronId> = ids
        .iter()
        .filter(|nid| !neuron.has_input_from(&SignalSource::Neuron(**nid)))
        .copied()
        .collect();
    let total = sensor_options.len() + neuron_options.len();
    if total == 0 {
        return Ok(NotApplicable);
    }
    let i = random_index(total);
    let (linked, source_ref) = if i < sensor_options.len() {
        (
            link_sensor_to_neuron(store, &sensor_options[i], &id)?,
            ElementRef::Sensor(sensor_options[i]),
        )
    } else {
        let from = neuron_options[i - sensor_options.len()];
        (
            link_neuron_to_neuron(store, &from, &id)?,
            ElementRef::Neuron(from),
        )
    };
    if !linked {
        return Ok(NotApplicable);
    }
    touch_generation(store, &id, graph.agent.generation)?;
    Ok(Applied(EvoHistEntry::new(
        MutationOperator::AddInlink,
        vec![source_ref, ElementRef::Neuron(id)],
    )))
}

fn add_outlink(store: &Store, agent_id: &AgentId) -> Result<MutationOutcome> {
    let graph = store.agent_graph(agent_id)?;
    if graph.neurons.is_empty() {
        return Ok(NotApplicable);
    }
    let ids: Vec<_> = graph.neurons.keys().copied().collect();
    let id = *pick(&ids);
    let neuron = store.read_neuron(&id)?;

    let neuron_options: Vec<NeuronId> = ids
        .iter()
        .filter(|nid| !neuron.has_output_to(&SignalTarget::Neuron(**nid)))
        .copied()
        .collect();
    let mut actuator_options: Vec<ActuatorId> = vec![];
    for aid in drive_actuator_ids(&graph) {
        let actuator = store.read_actuator(&aid)?;
        if actuator.fanin_ids.len() < actuator.vl && !actuator.fanin_ids.contains(&id) {
            actuator_options.push(aid);
        }
    }
    let total = neuron_options.len() + actuator_options.len();
    if total == 0 {
        return Ok(NotApplicable);
    }
    let i = random_index(total);
    let (linked, target_ref) = if i < neuron_options.len() {
        (
            link_neuron_to_neuron(store, &id, &neuron_options[i])?,
            ElementRef::Neuron(neuron_options[i]),
        )
    } else {
        let aid = actuator_options[i - neuron_options.len()];
        (
            link_neuron_to_actuator(store, &id, &aid)?,
            ElementRef::Actuator(aid),
        )
    };
    if !linked {
        return Ok(NotApplicable);
    }
    touch_generation(store, &id, graph.agent.generation)?;
    Ok(Applied(EvoHistEntry::new(
        MutationOperator::AddOutlink,
        vec![ElementRef::Neuron(id), target_ref],
    )))
}

fn add_sensorlink(store: &Store, agent_id: &AgentId) -> Result<MutationOutcome> {
    let graph = store.agent_graph(agent_id)?;
    let feed = feed_sensor_ids(&graph);
    if feed.is_empty() || graph.neurons.is_empty() {
        return Ok(NotApplicable);
    }
    let sid = *pick(&feed);
    let sensor = store.read_sensor(&sid)?;
    let options: Vec<NeuronId> = graph
        .neurons
        .keys()
        .filter(|nid| !sensor.fanout_ids.contains(nid))
        .copied()
        .collect();
    let Some(nid) = try_pick(&options) else {
        return Ok(NotApplicable);
    };
    let nid = *nid;
    if !link_sensor_to_neuron(store, &sid, &nid)? {
        return Ok(NotApplicable);
    }
    touch_generation(store, &nid, graph.agent.generation)?;
    Ok(Applied(EvoHistEntry::new(
        MutationOperator::AddSensorlink,
        vec![ElementRef::Sensor(sid), ElementRef::Neuron(nid)],
    )))
}

fn add_actuatorlink(store: &Store, agent_id: &AgentId) -> Result<MutationOutcome> {
    let graph = store.agent_graph(agent_id)?;
    if graph.neurons.is_empty() {
        return Ok(NotApplicable);
    }
    let mut open: Vec<ActuatorId> = vec![];
    for aid in drive_actuator_ids(&graph) {
        let actuator = store.read_actuator(&aid)?;
        if actuator.fanin_ids.len() < actuator.vl {
            open.push(aid);
        }
    }
    let Some(aid) = try_pick(&open) else {
        return Ok(NotApplicable);
    };
    let aid = *aid;
    let actuator = store.read_actuator(&aid)?;
    let options: Vec<NeuronId> = graph
        .neurons
        .keys()
        .filter(|nid| !actuator.fanin_ids.contains(nid))
        .copied()
        .collect();
    let Some(nid) = try_pick(&options) else {
        return Ok(NotApplicable);
    };
    let nid = *nid;
    if !link_neuron_to_actuator(store, &nid, &aid)? {
        return Ok(NotApplicable);
    }
    touch_generation(store, &nid, graph.agent.generation)?;
    Ok(Applied(EvoHistEntry::new(
        MutationOperator::AddActuatorlink,
        vec![ElementRef::Neuron(nid), ElementRef::Actuator(aid)],
    )))
}

fn add_sensor(
    store: &Store,
    registry: &MorphologyRegistry,
    agent_id: &AgentId,
) -> Result<MutationOutcome> {
    let graph = store.agent_graph(agent_id)?;
    if graph.substrate.is_some() {
        // Substrate agents grow their real interfaces through the substrate,
        // not through the pattern producer.
        return Ok(NotApplicable);
    }
    let morphology = registry.get(&graph.agent.constraint.morphology)?;
    let attached: Vec<&str> = graph.sensors.iter().map(|s| s.name.as_str()).collect();
    let unused: Vec<_> = morphology
        .sensors()
        .into_iter()
        .filter(|spec| !attached.contains(&spec.name.as_str()))
        .collect();
    if unused.is_empty() || graph.neurons.is_empty() {
        return Ok(NotApplicable);
    }
    let spec = &unused[random_index(unused.len())];
    let mut sensor = instantiate_sensor(spec, Some(graph.cortex.id));
    sensor.generation = graph.agent.generation;
    let sid = sensor.id;
    store.write_sensor(sensor);

    let ids: Vec<_> = graph.neurons.keys().copied().collect();
    let nid = *pick(&ids);
    link_sensor_to_neuron(store, &sid, &nid)?;

    let mut cortex = store.read_cortex(&graph.cortex.id)?;
    cortex.sensor_ids.push(sid);
    store.write_cortex(cortex);
    Ok(Applied(EvoHistEntry::new(
        MutationOperator::AddSensor,
        vec![ElementRef::Sensor(sid), ElementRef::Neuron(nid)],
    )))
}

fn add_actuator(
    store: &Store,
    registry: &MorphologyRegistry,
    agent_id: &AgentId,
) -> Result<MutationOutcome> {
    let graph = store.agent_graph(agent_id)?;
    if graph.substrate.is_some() {
        return Ok(NotApplicable);
    }
    let morphology = registry.get(&graph.agent.constraint.morphology)?;
    let attached: Vec<&str> = graph.actuators.iter().map(|a| a.name.as_str()).collect();
    let unused: Vec<_> = morphology
        .actuators()
        .into_iter()
        .filter(|spec| !attached.contains(&spec.name.as_str()))
        .collect();
    if unused.is_empty() || graph.neurons.is_empty() {
        return Ok(NotApplicable);
    }
    let spec = &unused[random_index(unused.len())];
    let mut actuator = instantiate_actuator(spec, Some(graph.cortex.id));
    actuator.generation = graph.agent.generation;
    let aid = actuator.id;
    store.write_actuator(actuator);

    let ids: Vec<_> = graph.neurons.keys().copied().collect();
    let nid = *pick(&ids);
    link_neuron_to_actuator(store, &nid, &aid)?;

    let mut cortex = store.read_cortex(&graph.cortex.id)?;
    cortex.actuator_ids.push(aid);
    store.write_cortex(cortex);
    Ok(Applied(EvoHistEntry::new(
        MutationOperator::AddActuator,
        vec![ElementRef::Neuron(nid), ElementRef::Actuator(aid)],
    )))
}

fn touch_generation(store: &Store, id: &NeuronId, generation: u64) -> Result<()> {
    let mut neuron = store.read_neuron(id)?;
    neuron.generation = generation;
    store.write_neuron(neuron);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotype::construct_agent;
    use crate::morphology::{ActuatorSpec, Morphology, SensorSpec};
    use bardo_structures::{Constraint, PopulationId, ScapeRef, Specie, SpecieId};
    use std::sync::Arc;

    struct RichMorphology;

    impl Morphology for RichMorphology {
        fn sensors(&self) -> Vec<SensorSpec> {
            vec![
                SensorSpec::new("eyes", 2, ScapeRef::Private("sim".into())),
                SensorSpec::new("ears", 3, ScapeRef::Private("sim".into())),
            ]
        }

        fn actuators(&self) -> Vec<ActuatorSpec> {
            vec![
                ActuatorSpec::new("hand", 1, ScapeRef::Private("sim".into())),
                ActuatorSpec::new("voice", 2, ScapeRef::Private("sim".into())),
            ]
        }
    }

    fn setup(constraint_tweak: impl FnOnce(&mut Constraint)) -> (Store, MorphologyRegistry, AgentId) {
        let store = Store::new();
        let registry = MorphologyRegistry::new();
        registry.register("rich", Arc::new(RichMorphology));
        let mut constraint = Constraint::for_morphology("rich");
        constraint_tweak(&mut constraint);
        let specie = Specie::new(SpecieId::generate(), PopulationId::generate(), constraint);
        let agent_id = construct_agent(&store, &registry, &specie).unwrap();
        (store, registry, agent_id)
    }

    fn assert_invariants(store: &Store, agent_id: &AgentId) {
        store.check_referential_closure(agent_id).unwrap();
        let graph = store.agent_graph(agent_id).unwrap();

        // Pattern exactly partitions the cortex neurons.
        let mut pattern_ids = graph.agent.pattern_neuron_ids();
        let mut cortex_ids = graph.cortex.neuron_ids.clone();
        pattern_ids.sort();
        cortex_ids.sort();
        assert_eq!(pattern_ids, cortex_ids);

        for neuron in graph.neurons.values() {
            // ro_ids is exactly the recurrent subset of output_ids.
            let expected: Vec<NeuronId> = neuron
                .output_ids
                .iter()
                .filter_map(|t| match t {
                    SignalTarget::Neuron(id) if id.layer() <= neuron.id.layer() => Some(*id),
                    _ => None,
                })
                .collect();
            assert_eq!(neuron.ro_ids, expected, "ro_ids drifted on {}", neuron.id);

            // Weight count per link matches the source vector length, and
            // bias appears at most once per channel.
            for channel in [&neuron.input_idps, &neuron.input_idps_modulation] {
                let mut bias_seen = 0;
                for link in channel.iter() {
                    let expected_len = match &link.source {
                        SignalSource::Bias => {
                            bias_seen += 1;
                            1
                        }
                        SignalSource::Neuron(_) => 1,
                        SignalSource::Sensor(id) => store.read_sensor(id).unwrap().vl,
                    };
                    assert_eq!(link.weights.len(), expected_len);
                }
                assert!(bias_seen <= 1, "duplicate bias on {}", neuron.id);
            }
        }

        // Actuator fan-ins stay within capacity and unique.
        for actuator in &graph.actuators {
            assert!(actuator.fanin_ids.len() <= actuator.vl);
            let mut fanins = actuator.fanin_ids.clone();
            fanins.sort();
            fanins.dedup();
            assert_eq!(fanins.len(), actuator.fanin_ids.len());
        }
    }

    #[test]
    fn test_every_operator_preserves_invariants() {
        let (store, registry, agent_id) = setup(|c| {
            c.neural_pfs = vec![
                PlasticityFunction::None,
                PlasticityFunction::Hebbian,
                PlasticityFunction::Neuromodulation,
            ];
        });
        let all_ops = MutationOperator::standard_set();
        for round in 0..200 {
            let op = all_ops[round % all_ops.len()];
            let outcome = apply_operator(&store, &registry, &agent_id, op).unwrap();
            if let Applied(entry) = &outcome {
                assert_eq!(entry.operator, op);
                assert!(!entry.elements.is_empty());
            }
            assert_invariants(&store, &agent_id);
        }
    }

    #[test]
    fn test_mutate_af_needs_alternatives() {
        let (store, registry, agent_id) = setup(|c| {
            c.neural_afs = vec![bardo_neural::ActivationFunction::Tanh];
        });
        let outcome =
            apply_operator(&store, &registry, &agent_id, MutationOperator::MutateAf).unwrap();
        assert_eq!(outcome, NotApplicable);
    }

    #[test]
    fn test_add_then_remove_bias() {
        let (store, registry, agent_id) = setup(|_| {});
        // The seed has no bias anywhere, so removal is a no-op first.
        let outcome =
            apply_operator(&store, &registry, &agent_id, MutationOperator::RemoveBias).unwrap();
        assert_eq!(outcome, NotApplicable);

        let added =
            apply_operator(&store, &registry, &agent_id, MutationOperator::AddBias).unwrap();
        assert!(matches!(added, Applied(_)));
        assert_invariants(&store, &agent_id);

        let removed =
            apply_operator(&store, &registry, &agent_id, MutationOperator::RemoveBias).unwrap();
        assert!(matches!(removed, Applied(_)));
        assert_invariants(&store, &agent_id);
    }

    #[test]
    fn test_splice_grows_network_but_keeps_actuator_order() {
        let (store, registry, agent_id) = setup(|_| {});
        let before = store.agent_graph(&agent_id).unwrap();
        let fanin_len: usize = before.actuators.iter().map(|a| a.fanin_ids.len()).sum();

        let outcome = apply_operator(&store, &registry, &agent_id, MutationOperator::Splice).unwrap();
        assert!(matches!(outcome, Applied(_)));
        assert_invariants(&store, &agent_id);

        let after = store.agent_graph(&agent_id).unwrap();
        assert_eq!(after.neurons.len(), before.neurons.len() + 1);
        let fanin_after: usize = after.actuators.iter().map(|a| a.fanin_ids.len()).sum();
        assert_eq!(fanin_len, fanin_after);
    }

    #[test]
    fn test_mutate_agent_end_to_end() {
        let (store, registry, agent_id) = setup(|_| {});
        let before = store.read_agent(&agent_id).unwrap();
        mutate_agent(&store, &registry, &agent_id).unwrap();
        let after = store.read_agent(&agent_id).unwrap();
        assert_eq!(after.generation, before.generation + 1);
        assert!(!after.evo_hist.is_empty());
        assert_invariants(&store, &agent_id);
    }

    #[test]
    fn test_mutated_lineages_diverge_in_fingerprint() {
        // Two agents mutated independently should (almost always) stop being
        // species-equivalent once their histories diverge.
        let (store, registry, a) = setup(|_| {});
        let b = crate::clone::clone_agent(&store, &a).unwrap();
        for _ in 0..5 {
            mutate_agent(&store, &registry, &b).unwrap();
        }
        let fa = store.read_agent(&a).unwrap().fingerprint;
        let fb = store.read_agent(&b).unwrap().fingerprint;
        assert_ne!(fa.generalized_evo_hist, fb.generalized_evo_hist);
    }
}
