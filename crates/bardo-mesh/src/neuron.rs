// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! The neuron task.
//!
//! A neuron waits until every source in its input list has delivered a
//! signal for the current cycle, computes
//! `af(aggregate(inputs, weights) )` saturated to the configured limit,
//! fans the result out, and — when its plasticity rule is live — updates
//! its own weights from the pre/post signals and the modulatory channel.
//!
//! The input list order is the canonical ordering of the assembled input
//! vector: slot `i` always holds the latest signal of `input_idps[i]`'s
//! source. Bias entries are synthetic and never wait; they contribute a
//! constant `[1.0]`.

use crossbeam::channel::{unbounded, Receiver, Sender};
use std::thread::JoinHandle;
use tracing::{trace, warn};

use bardo_neural::random::{gaussian, random_f64};
use bardo_neural::utils::{saturate, WEIGHT_SAT_LIMIT};
use bardo_neural::{ActivationFunction, AggregationFunction, PlasticityFunction};
use bardo_structures::{InputLink, NeuronId, SignalSource, SignalTarget};

use crate::messages::{NeuronConfig, NeuronMsg, OutputEndpoint};

/// Spawn an idle neuron task; it blocks until its `Configure` arrives.
pub fn spawn() -> (Sender<NeuronMsg>, JoinHandle<()>) {
    let (tx, rx) = unbounded();
    let handle = std::thread::spawn(move || run(rx));
    (tx, handle)
}

struct NeuronState {
    id: NeuronId,
    activation: ActivationFunction,
    plasticity: PlasticityFunction,
    neural_params: Vec<f64>,
    aggregation: AggregationFunction,
    input_idps: Vec<InputLink>,
    input_idps_modulation: Vec<InputLink>,
    backup: (Vec<InputLink>, Vec<InputLink>),
    outputs: Vec<(SignalTarget, OutputEndpoint)>,
    ro_ids: Vec<NeuronId>,
    ro_signal: Vec<f64>,
    output_sat_limit: f64,
    slots: Vec<Option<Vec<f64>>>,
    mod_slots: Vec<Option<Vec<f64>>>,
    /// Previous cycle's inputs, for `diff_product`.
    prev_inputs: Vec<Vec<f64>>,
}

impl NeuronState {
    fn new(config: NeuronConfig) -> Self {
        let neuron = config.neuron;
        let slots = vec![None; neuron.input_idps.len()];
        let mod_slots = vec![None; neuron.input_idps_modulation.len()];
        NeuronState {
            id: neuron.id,
            activation: neuron.activation,
            plasticity: neuron.plasticity,
            neural_params: neuron.neural_params,
            aggregation: neuron.aggregation,
            backup: (neuron.input_idps.clone(), neuron.input_idps_modulation.clone()),
            input_idps: neuron.input_idps,
            input_idps_modulation: neuron.input_idps_modulation,
            outputs: config.outputs,
            ro_ids: neuron.ro_ids,
            ro_signal: config.ro_signal,
            output_sat_limit: config.output_sat_limit,
            slots,
            mod_slots,
            prev_inputs: vec![],
        }
    }

    /// Send the default signal to every recurrent target so downstream
    /// wait-sets can complete on the first cycle.
    fn prime(&self) {
        for (target, endpoint) in &self.outputs {
            if let (SignalTarget::Neuron(nid), OutputEndpoint::Neuron(tx)) = (target, endpoint) {
                if self.ro_ids.contains(nid) {
                    let _ = tx.send(NeuronMsg::Forward {
                        from: SignalSource::Neuron(self.id),
                        signal: self.ro_signal.clone(),
                    });
                }
            }
        }
    }

    fn accept(&mut self, from: SignalSource, signal: Vec<f64>) {
        for (i, link) in self.input_idps.iter().enumerate() {
            if link.source == from && self.slots[i].is_none() {
                self.slots[i] = Some(signal);
                return;
            }
        }
        for (i, link) in self.input_idps_modulation.iter().enumerate() {
            if link.source == from && self.mod_slots[i].is_none() {
                self.mod_slots[i] = Some(signal);
                return;
            }
        }
        warn!(neuron = %self.id, "dropping signal from unexpected or duplicate source");
    }

    fn ready(&self) -> bool {
        let pending = |links: &[InputLink], slots: &[Option<Vec<f64>>]| {
            links
                .iter()
                .zip(slots.iter())
                .any(|(l, s)| l.source != SignalSource::Bias && s.is_none())
        };
        !pending(&self.input_idps, &self.slots)
            && !pending(&self.input_idps_modulation, &self.mod_slots)
    }

    /// Aggregated modulatory scalar: dot product over the modulatory
    /// channel, bias contributing a constant 1.
    fn modulation(&self) -> f64 {
        let mut acc = 0.0;
        for (link, slot) in self.input_idps_modulation.iter().zip(self.mod_slots.iter()) {
            match (&link.source, slot) {
                (SignalSource::Bias, _) => {
                    acc += link.weights.first().map(|w| w.value).unwrap_or(0.0);
                }
                (_, Some(signal)) => {
                    for (w, x) in link.weights.iter().zip(signal.iter()) {
                        acc += w.value * x;
                    }
                }
                (_, None) => {}
            }
        }
        acc
    }

    fn fire(&mut self) {
        let inputs: Vec<Vec<f64>> = self
            .input_idps
            .iter()
            .zip(self.slots.iter())
            .map(|(link, slot)| match &link.source {
                SignalSource::Bias => vec![1.0],
                _ => slot.clone().expect("ready() guarantees filled slots"),
            })
            .collect();
        let weights: Vec<Vec<f64>> = self
            .input_idps
            .iter()
            .map(|l| l.weights.iter().map(|w| w.value).collect())
            .collect();

        let acc = self.aggregation.aggregate(&inputs, &weights, &self.prev_inputs);
        let output = saturate(self.activation.apply(acc), self.output_sat_limit);

        if !matches!(
            self.plasticity,
            PlasticityFunction::None | PlasticityFunction::Iterative
        ) {
            let modulation = self.modulation();
            for (link, link_inputs) in self.input_idps.iter_mut().zip(inputs.iter()) {
                for (w, pre) in link.weights.iter_mut().zip(link_inputs.iter()) {
                    w.value = self.plasticity.update_weight(
                        &self.neural_params,
                        w.value,
                        &w.params,
                        *pre,
                        output,
                        modulation,
                    );
                }
            }
        }

        self.prev_inputs = inputs;
        for slot in self.slots.iter_mut().chain(self.mod_slots.iter_mut()) {
            *slot = None;
        }

        for (_, endpoint) in &self.outputs {
            match endpoint {
                OutputEndpoint::Neuron(tx) => {
                    let _ = tx.send(NeuronMsg::Forward {
                        from: SignalSource::Neuron(self.id),
                        signal: vec![output],
                    });
                }
                OutputEndpoint::Actuator(tx) => {
                    let _ = tx.send(crate::messages::ActuatorMsg::Forward {
                        from: self.id,
                        signal: vec![output],
                    });
                }
            }
        }
        trace!(neuron = %self.id, output, "fired");
    }

    /// One perturbation draw over the synaptic weights: each weight is hit
    /// with probability `1/sqrt(total)`.
    fn perturb(&mut self, spread: f64) {
        let total: usize = self.input_idps.iter().map(|l| l.weights.len()).sum();
        if total == 0 {
            return;
        }
        let mp = 1.0 / (total as f64).sqrt();
        for link in self.input_idps.iter_mut() {
            for w in link.weights.iter_mut() {
                if random_f64() < mp {
                    w.value = saturate(w.value + gaussian() * spread, WEIGHT_SAT_LIMIT);
                }
            }
        }
    }

    fn reset_cycle(&mut self) {
        for slot in self.slots.iter_mut().chain(self.mod_slots.iter_mut()) {
            *slot = None;
        }
        self.prev_inputs.clear();
    }
}

fn run(rx: Receiver<NeuronMsg>) {
    // Phase one: idle until configured.
    let config = loop {
        match rx.recv() {
            Ok(NeuronMsg::Configure(config)) => break config,
            Ok(NeuronMsg::Terminate) | Err(_) => return,
            Ok(_) => continue,
        }
    };
    let mut state = NeuronState::new(*config);
    state.prime();

    loop {
        let msg = match rx.recv() {
            Ok(msg) => msg,
            Err(_) => return,
        };
        match msg {
            NeuronMsg::Forward { from, signal } => {
                state.accept(from, signal);
                if state.ready() {
                    state.fire();
                }
            }
            NeuronMsg::WeightBackup => {
                state.backup = (state.input_idps.clone(), state.input_idps_modulation.clone());
            }
            NeuronMsg::WeightPerturb { spread } => state.perturb(spread),
            NeuronMsg::WeightRestore => {
                state.input_idps = state.backup.0.clone();
                state.input_idps_modulation = state.backup.1.clone();
            }
            NeuronMsg::GetBackup { reply } => {
                let _ = reply.send((state.id, state.backup.0.clone(), state.backup.1.clone()));
            }
            NeuronMsg::ResetPrep { ack } => {
                // Flush stale signals; keep any control messages queued
                // behind them.
                while let Ok(pending) = rx.try_recv() {
                    match pending {
                        NeuronMsg::Forward { .. } => {}
                        NeuronMsg::WeightBackup => {
                            state.backup =
                                (state.input_idps.clone(), state.input_idps_modulation.clone());
                        }
                        NeuronMsg::WeightPerturb { spread } => state.perturb(spread),
                        NeuronMsg::WeightRestore => {
                            state.input_idps = state.backup.0.clone();
                            state.input_idps_modulation = state.backup.1.clone();
                        }
                        NeuronMsg::GetBackup { reply } => {
                            let _ = reply.send((
                                state.id,
                                state.backup.0.clone(),
                                state.backup.1.clone(),
                            ));
                        }
                        NeuronMsg::ResetPrep { ack } => {
                            let _ = ack.send(());
                        }
                        NeuronMsg::Reset | NeuronMsg::Configure(_) => {}
                        NeuronMsg::Terminate => return,
                    }
                }
                state.reset_cycle();
                let _ = ack.send(());
            }
            NeuronMsg::Reset => {
                state.prime();
            }
            NeuronMsg::Terminate => return,
            NeuronMsg::Configure(_) => {}
        }
    }
}
