// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Typed messages between mesh tasks.
//!
//! Every task owns one unbounded mailbox. Senders are cloned freely during
//! the configure phase; message order is FIFO per sender, interleaved
//! across senders, which is all the cycle protocol relies on.

use crossbeam::channel::Sender;

use bardo_structures::{Actuator, InputLink, Neuron, NeuronId, Sensor, SignalSource, SignalTarget};

use crate::scape::{EndFlag, ScapeHandle};

/// Where a neuron's output goes: another neuron's mailbox or an actuator's.
#[derive(Clone)]
pub enum OutputEndpoint {
    Neuron(Sender<NeuronMsg>),
    Actuator(Sender<ActuatorMsg>),
}

/// Configuration delivered to a neuron task in phase two.
pub struct NeuronConfig {
    pub neuron: Neuron,
    /// Resolved endpoints in `output_ids` order.
    pub outputs: Vec<(SignalTarget, OutputEndpoint)>,
    /// Default priming signal for recurrent outputs.
    pub ro_signal: Vec<f64>,
    pub output_sat_limit: f64,
}

pub enum NeuronMsg {
    Configure(Box<NeuronConfig>),
    /// One source's output vector for the current cycle.
    Forward {
        from: SignalSource,
        signal: Vec<f64>,
    },
    /// Remember the current weights as best-known.
    WeightBackup,
    /// Apply one perturbation draw to the current weights.
    WeightPerturb { spread: f64 },
    /// Roll back to the remembered best.
    WeightRestore,
    /// Reply with the remembered best input links.
    GetBackup {
        reply: Sender<(NeuronId, Vec<InputLink>, Vec<InputLink>)>,
    },
    /// First reset phase: flush pending signals and acknowledge. No task
    /// emits new signals until every task has flushed, which keeps one
    /// task's re-priming from being swallowed by a neighbour's flush.
    ResetPrep { ack: Sender<()> },
    /// Second reset phase: replay recurrent priming and resume.
    Reset,
    Terminate,
}

/// Configuration delivered to a sensor task in phase two.
pub struct SensorConfig {
    pub sensor: Sensor,
    pub scape: ScapeHandle,
    /// Resolved fanout mailboxes in `fanout_ids` order.
    pub fanout: Vec<Sender<NeuronMsg>>,
}

pub enum SensorMsg {
    Configure(Box<SensorConfig>),
    /// Cortex requests one sensory reading.
    Sync,
    Terminate,
}

/// Configuration delivered to an actuator task in phase two.
pub struct ActuatorConfig {
    pub actuator: Actuator,
    pub scape: ScapeHandle,
    pub cortex: Sender<CortexMsg>,
}

pub enum ActuatorMsg {
    Configure(Box<ActuatorConfig>),
    /// One fan-in neuron's output for the current cycle.
    Forward {
        from: NeuronId,
        signal: Vec<f64>,
    },
    /// Drop partially assembled input.
    Reset,
    Terminate,
}

/// Configuration delivered to the cortex task in phase two.
pub struct CortexConfig {
    pub sensors: Vec<Sender<SensorMsg>>,
    pub actuator_count: usize,
    pub exoself: Sender<ExoselfMsg>,
}

pub enum CortexMsg {
    Configure(Box<CortexConfig>),
    /// An actuator finished its part of the cycle.
    SyncFromActuator {
        fitness: Vec<f64>,
        end_flag: EndFlag,
    },
    /// Begin (or resume after a reset) the cycle loop.
    Reactivate,
    Terminate,
}

/// Reports from the mesh up to the exoself.
pub enum ExoselfMsg {
    EvaluationComplete {
        fitness: Vec<f64>,
        cycles: u64,
        goal_reached: bool,
    },
}
