// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! The exoself: per-agent mesh supervisor.
//!
//! The exoself owns the genotype snapshot and the task group of one agent.
//! It spawns every task idle, resolves all id references to mailbox
//! handles, configures the mesh, and drives evaluations:
//!
//! 1. an initial evaluation establishes the best-known fitness and weights,
//! 2. the tuning phase perturbs a selected set of neurons, re-evaluates,
//!    and either backs the new weights up (improvement) or restores the
//!    previous best, at most `tuning_duration_f` attempts,
//! 3. heredity decides what the genotype keeps: Lamarckian writes the tuned
//!    weights back to the store, Darwinian leaves the pre-tuning weights.
//!
//! A crashed task or a scape that never replies surfaces as an error; the
//! population layer scores such an evaluation zero.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::thread::JoinHandle;
use tracing::{debug, trace};

use bardo_evolution::tuning::{select_for_tuning, tuning_budget};
use bardo_state::Store;
use bardo_structures::{
    AgentId, Heredity, NeuronId, SignalFormat, SignalTarget,
};

use crate::actuator;
use crate::cortex;
use crate::error::{MeshError, Result};
use crate::messages::{
    ActuatorConfig, ActuatorMsg, CortexConfig, CortexMsg, ExoselfMsg, NeuronConfig, NeuronMsg,
    OutputEndpoint, SensorConfig, SensorMsg,
};
use crate::neuron;
use crate::scape::{ScapeHandle, ScapeRegistry};
use crate::sensor;
use crate::substrate::{self, SubstrateScape, SubstrateScapeState, SubstrateSpawn};

/// Knobs for one evaluation.
#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    /// Default recurrent priming vector.
    pub ro_signal: Vec<f64>,
    /// Saturation bound on neuron outputs.
    pub output_sat_limit: f64,
    /// Run the parametric-tuning phase after the initial evaluation.
    pub tune: bool,
    /// A scape that stays silent longer than this fails the evaluation.
    pub evaluation_timeout: Duration,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        EvaluationOptions {
            ro_signal: vec![0.0],
            output_sat_limit: std::f64::consts::TAU,
            tune: true,
            evaluation_timeout: Duration::from_secs(30),
        }
    }
}

/// What one finished evaluation reports to the population layer.
#[derive(Debug, Clone)]
pub struct MeshResult {
    pub agent_id: AgentId,
    pub fitness: Vec<f64>,
    pub main_fitness: f64,
    pub cycles: u64,
    pub time_ns: u128,
    pub goal_reached: bool,
    pub tuning_attempts: u32,
}

struct MeshTasks {
    neuron_txs: AHashMap<NeuronId, Sender<NeuronMsg>>,
    sensor_txs: Vec<Sender<SensorMsg>>,
    actuator_txs: Vec<Sender<ActuatorMsg>>,
    substrate_tx: Option<Sender<NeuronMsg>>,
    cortex_tx: Sender<CortexMsg>,
    handles: Vec<JoinHandle<()>>,
    scape_handles: Vec<ScapeHandle>,
}

impl MeshTasks {
    fn broadcast_neurons(&self, make: impl Fn() -> NeuronMsg) {
        for tx in self.neuron_txs.values() {
            let _ = tx.send(make());
        }
    }

    /// Two-phase reset: every task flushes and acknowledges before anyone
    /// re-primes, so no flush can swallow a neighbour's priming signal.
    fn reset_all(&self) {
        let (ack_tx, ack_rx) = unbounded();
        let mut expected = 0usize;
        for tx in self.neuron_txs.values() {
            let _ = tx.send(NeuronMsg::ResetPrep {
                ack: ack_tx.clone(),
            });
            expected += 1;
        }
        if let Some(tx) = &self.substrate_tx {
            let _ = tx.send(NeuronMsg::ResetPrep {
                ack: ack_tx.clone(),
            });
            expected += 1;
        }
        drop(ack_tx);
        for _ in 0..expected {
            if ack_rx.recv_timeout(Duration::from_secs(5)).is_err() {
                break;
            }
        }

        self.broadcast_neurons(|| NeuronMsg::Reset);
        if let Some(tx) = &self.substrate_tx {
            let _ = tx.send(NeuronMsg::Reset);
        }
        for tx in &self.actuator_txs {
            let _ = tx.send(ActuatorMsg::Reset);
        }
        for scape in &self.scape_handles {
            scape.lock().reset();
        }
    }

    fn shutdown(self) {
        self.broadcast_neurons(|| NeuronMsg::Terminate);
        if let Some(tx) = &self.substrate_tx {
            let _ = tx.send(NeuronMsg::Terminate);
        }
        for tx in &self.sensor_txs {
            let _ = tx.send(SensorMsg::Terminate);
        }
        for tx in &self.actuator_txs {
            let _ = tx.send(ActuatorMsg::Terminate);
        }
        let _ = self.cortex_tx.send(CortexMsg::Terminate);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

/// Materialize the agent, run the evaluation (with optional tuning), apply
/// heredity, persist the achieved fitness, and tear the mesh down.
pub fn evaluate_agent(
    store: &Store,
    scapes: &ScapeRegistry,
    agent_id: &AgentId,
    options: &EvaluationOptions,
) -> Result<MeshResult> {
    let started = Instant::now();
    let (exo_tx, exo_rx) = unbounded();
    let tasks = materialize(store, scapes, agent_id, options, exo_tx)?;

    let outcome = drive(store, agent_id, options, &tasks, &exo_rx);
    tasks.shutdown();

    let (fitness, total_cycles, goal_reached, attempts) = outcome?;
    let main_fitness = fitness.first().copied().unwrap_or(0.0);

    let mut agent = store.read_agent(agent_id)?;
    agent.fitness = fitness.clone();
    agent.main_fitness = main_fitness;
    store.write_agent(agent);

    Ok(MeshResult {
        agent_id: *agent_id,
        fitness,
        main_fitness,
        cycles: total_cycles,
        time_ns: started.elapsed().as_nanos(),
        goal_reached,
        tuning_attempts: attempts,
    })
}

fn await_completion(
    exo_rx: &Receiver<ExoselfMsg>,
    timeout: Duration,
) -> Result<(Vec<f64>, u64, bool)> {
    match exo_rx.recv_timeout(timeout) {
        Ok(ExoselfMsg::EvaluationComplete {
            fitness,
            cycles,
            goal_reached,
        }) => Ok((fitness, cycles, goal_reached)),
        Err(_) => Err(MeshError::MissingFitness("evaluation timed out".into())),
    }
}

fn drive(
    store: &Store,
    agent_id: &AgentId,
    options: &EvaluationOptions,
    tasks: &MeshTasks,
    exo_rx: &Receiver<ExoselfMsg>,
) -> Result<(Vec<f64>, u64, bool, u32)> {
    let graph = store.agent_graph(agent_id)?;
    let agent = &graph.agent;

    let _ = tasks.cortex_tx.send(CortexMsg::Reactivate);
    let (mut best_fitness, cycles, mut goal_reached) =
        await_completion(exo_rx, options.evaluation_timeout)?;
    let mut total_cycles = cycles;
    tasks.broadcast_neurons(|| NeuronMsg::WeightBackup);

    let mut attempts = 0u32;
    if options.tune && !goal_reached {
        let stats: Vec<(u64, usize)> = graph
            .neurons
            .values()
            .map(|n| (n.generation, n.total_inbound_weights()))
            .collect();
        let budget = tuning_budget(agent.tuning_duration_f, agent.generation, &stats);
        let pool: Vec<(NeuronId, u64)> =
            graph.neurons.values().map(|n| (n.id, n.generation)).collect();

        for _ in 0..budget {
            attempts += 1;
            let selection = select_for_tuning(
                &pool,
                agent.generation,
                agent.tuning_selection_f,
                agent.perturbation_range,
                agent.annealing_parameter,
            );
            for (nid, spread) in &selection {
                if let Some(tx) = tasks.neuron_txs.get(nid) {
                    let _ = tx.send(NeuronMsg::WeightPerturb { spread: *spread });
                }
            }
            tasks.reset_all();
            let _ = tasks.cortex_tx.send(CortexMsg::Reactivate);
            let (fitness, cycles, goal) = await_completion(exo_rx, options.evaluation_timeout)?;
            total_cycles += cycles;

            if fitness > best_fitness {
                trace!(agent = %agent_id, ?fitness, "tuning improved fitness");
                best_fitness = fitness;
                tasks.broadcast_neurons(|| NeuronMsg::WeightBackup);
            } else {
                tasks.broadcast_neurons(|| NeuronMsg::WeightRestore);
            }
            if goal {
                goal_reached = true;
                break;
            }
        }

        persist_heredity(store, tasks, agent.heredity_type)?;
    }

    debug!(
        agent = %agent_id,
        fitness = ?best_fitness,
        cycles = total_cycles,
        attempts,
        goal_reached,
        "evaluation complete"
    );
    Ok((best_fitness, total_cycles, goal_reached, attempts))
}

/// After tuning, the genotype keeps either the tuned weights (Lamarckian)
/// or its original ones (Darwinian, nothing to do: the store still holds
/// the pre-tuning snapshot).
fn persist_heredity(store: &Store, tasks: &MeshTasks, heredity: Heredity) -> Result<()> {
    if heredity == Heredity::Darwinian {
        return Ok(());
    }
    let (reply_tx, reply_rx) = unbounded();
    for tx in tasks.neuron_txs.values() {
        let _ = tx.send(NeuronMsg::GetBackup {
            reply: reply_tx.clone(),
        });
    }
    drop(reply_tx);
    while let Ok((id, input_idps, input_idps_modulation)) = reply_rx.recv() {
        let mut neuron = store.read_neuron(&id)?;
        neuron.input_idps = input_idps;
        neuron.input_idps_modulation = input_idps_modulation;
        store.write_neuron(neuron);
    }
    Ok(())
}

/// Spawn and configure the full task group for one agent.
fn materialize(
    store: &Store,
    scapes: &ScapeRegistry,
    agent_id: &AgentId,
    options: &EvaluationOptions,
    exo_tx: Sender<ExoselfMsg>,
) -> Result<MeshTasks> {
    let graph = store.agent_graph(agent_id)?;
    let mut handles = Vec::new();

    // One scape instance per binding name for this agent: every adapter
    // naming the same scape shares it.
    let mut scape_cache: AHashMap<String, ScapeHandle> = AHashMap::new();
    let mut provision = |name: &bardo_structures::ScapeRef| -> Result<ScapeHandle> {
        if let Some(handle) = scape_cache.get(name.name()) {
            return Ok(handle.clone());
        }
        let handle = scapes.provision(name)?;
        scape_cache.insert(name.name().to_string(), handle.clone());
        Ok(handle)
    };

    // Phase one: spawn everything idle.
    let mut neuron_txs: AHashMap<NeuronId, Sender<NeuronMsg>> = AHashMap::new();
    for id in graph.neurons.keys() {
        let (tx, handle) = neuron::spawn();
        neuron_txs.insert(*id, tx);
        handles.push(handle);
    }
    let (cortex_tx, cortex_handle) = cortex::spawn();
    handles.push(cortex_handle);

    let mut sensor_txs = Vec::new();
    let mut sensor_pairs = Vec::new();
    for s in &graph.sensors {
        let (tx, handle) = sensor::spawn();
        sensor_pairs.push((s.clone(), tx.clone()));
        sensor_txs.push(tx);
        handles.push(handle);
    }
    let mut actuator_txs = Vec::new();
    let mut actuator_pairs = Vec::new();
    for a in &graph.actuators {
        let (tx, handle) = actuator::spawn();
        actuator_pairs.push((a.clone(), tx.clone()));
        actuator_txs.push(tx);
        handles.push(handle);
    }

    // Substrate plumbing: CPP/CEP adapters and the substrate task itself.
    let mut substrate_tx: Option<Sender<NeuronMsg>> = None;
    let mut cep_txs: AHashMap<bardo_structures::ActuatorId, Sender<ActuatorMsg>> = AHashMap::new();
    let mut scape_handles: Vec<ScapeHandle> = Vec::new();

    if let Some(sub) = &graph.substrate {
        let shared = Arc::new(Mutex::new(SubstrateScapeState::default()));
        let sub_scape: ScapeHandle = Arc::new(Mutex::new(Box::new(SubstrateScape {
            shared: shared.clone(),
        }) as Box<dyn crate::scape::Scape>));
        let (inner_tx, inner_rx) = unbounded();

        let mut cpp_txs = Vec::new();
        for id in &sub.cpp_ids {
            let cpp = store.read_sensor(id)?;
            let (tx, handle) = sensor::spawn();
            let fanout = cpp
                .fanout_ids
                .iter()
                .filter_map(|nid| neuron_txs.get(nid).cloned())
                .collect();
            tx.send(SensorMsg::Configure(Box::new(SensorConfig {
                sensor: cpp,
                scape: sub_scape.clone(),
                fanout,
            })))
            .map_err(|_| MeshError::TaskFailed("cpp configure".into()))?;
            cpp_txs.push(tx);
            handles.push(handle);
        }
        for id in &sub.cep_ids {
            let cep = store.read_actuator(id)?;
            let (tx, handle) = actuator::spawn();
            tx.send(ActuatorMsg::Configure(Box::new(ActuatorConfig {
                actuator: cep.clone(),
                scape: sub_scape.clone(),
                cortex: inner_tx.clone(),
            })))
            .map_err(|_| MeshError::TaskFailed("cep configure".into()))?;
            cep_txs.insert(cep.id, tx);
            handles.push(handle);
        }

        let dims = graph
            .sensors
            .iter()
            .find_map(|s| match &s.format {
                SignalFormat::Symmetric { dims } => Some(dims.len().max(2)),
                SignalFormat::NoGeo => None,
            })
            .unwrap_or(2);
        let (tx, handle) = substrate::spawn(SubstrateSpawn {
            substrate: sub.clone(),
            sensors: graph.sensors.clone(),
            actuators: graph
                .actuators
                .iter()
                .cloned()
                .zip(actuator_txs.iter().cloned())
                .collect(),
            cpp_txs,
            cep_count: sub.cep_ids.len(),
            inner_rx,
            shared,
            dims,
        });
        substrate_tx = Some(tx);
        handles.push(handle);
    }

    // Phase two: resolve references and configure.
    for (id, neuron) in &graph.neurons {
        let mut outputs = Vec::with_capacity(neuron.output_ids.len());
        for target in &neuron.output_ids {
            let endpoint = match target {
                SignalTarget::Neuron(nid) => OutputEndpoint::Neuron(
                    neuron_txs
                        .get(nid)
                        .cloned()
                        .ok_or_else(|| MeshError::TaskFailed(format!("no task for {}", nid)))?,
                ),
                SignalTarget::Actuator(aid) => {
                    let tx = cep_txs
                        .get(aid)
                        .cloned()
                        .or_else(|| {
                            actuator_pairs
                                .iter()
                                .find(|(a, _)| a.id == *aid)
                                .map(|(_, tx)| tx.clone())
                        })
                        .ok_or_else(|| MeshError::TaskFailed(format!("no task for {}", aid)))?;
                    OutputEndpoint::Actuator(tx)
                }
            };
            outputs.push((*target, endpoint));
        }
        neuron_txs[id]
            .send(NeuronMsg::Configure(Box::new(NeuronConfig {
                neuron: neuron.clone(),
                outputs,
                ro_signal: options.ro_signal.clone(),
                output_sat_limit: options.output_sat_limit,
            })))
            .map_err(|_| MeshError::TaskFailed("neuron configure".into()))?;
    }

    for (s, tx) in &sensor_pairs {
        let scape = provision(&s.scape)?;
        scape_handles.push(scape.clone());
        let fanout = match &substrate_tx {
            // Real sensors of a substrate agent feed the substrate task.
            Some(sub_tx) => vec![sub_tx.clone()],
            None => s
                .fanout_ids
                .iter()
                .filter_map(|nid| neuron_txs.get(nid).cloned())
                .collect(),
        };
        tx.send(SensorMsg::Configure(Box::new(SensorConfig {
            sensor: s.clone(),
            scape,
            fanout,
        })))
        .map_err(|_| MeshError::TaskFailed("sensor configure".into()))?;
    }

    for (a, tx) in &actuator_pairs {
        let scape = provision(&a.scape)?;
        scape_handles.push(scape.clone());
        // Substrate-driven actuators keep an empty fan-in: the substrate
        // delivers their whole vector in one signal.
        let mut actuator = a.clone();
        if substrate_tx.is_some() {
            actuator.fanin_ids.clear();
        }
        tx.send(ActuatorMsg::Configure(Box::new(ActuatorConfig {
            actuator,
            scape,
            cortex: cortex_tx.clone(),
        })))
        .map_err(|_| MeshError::TaskFailed("actuator configure".into()))?;
    }

    cortex_tx
        .send(CortexMsg::Configure(Box::new(CortexConfig {
            sensors: sensor_txs.clone(),
            actuator_count: actuator_pairs.len(),
            exoself: exo_tx,
        })))
        .map_err(|_| MeshError::TaskFailed("cortex configure".into()))?;

    Ok(MeshTasks {
        neuron_txs,
        sensor_txs,
        actuator_txs,
        substrate_tx,
        cortex_tx,
        handles,
        scape_handles,
    })
}
