// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! The actuator task.
//!
//! An actuator waits for a signal from every fan-in neuron, assembles the
//! ordered output vector (slot `i` belongs to `fanin_ids[i]`), hands it to
//! its scape, and forwards the scape's fitness reply to the cortex as a
//! `sync`.
//!
//! A substrate-driven actuator has no fan-in neurons; it instead accepts
//! one full-vector signal per cycle from the substrate task.

use crossbeam::channel::{unbounded, Receiver, Sender};
use std::thread::JoinHandle;
use tracing::warn;

use crate::messages::{ActuatorConfig, ActuatorMsg, CortexMsg};

/// Spawn an idle actuator task; it blocks until its `Configure` arrives.
pub fn spawn() -> (Sender<ActuatorMsg>, JoinHandle<()>) {
    let (tx, rx) = unbounded();
    let handle = std::thread::spawn(move || run(rx));
    (tx, handle)
}

fn run(rx: Receiver<ActuatorMsg>) {
    let config = loop {
        match rx.recv() {
            Ok(ActuatorMsg::Configure(config)) => break config,
            Ok(ActuatorMsg::Terminate) | Err(_) => return,
            Ok(_) => continue,
        }
    };
    let ActuatorConfig { actuator, scape, cortex } = *config;
    let substrate_driven = actuator.fanin_ids.is_empty();
    let mut slots: Vec<Option<f64>> = vec![None; actuator.fanin_ids.len()];

    loop {
        match rx.recv() {
            Ok(ActuatorMsg::Forward { from, signal }) => {
                let output: Option<Vec<f64>> = if substrate_driven {
                    Some(signal)
                } else {
                    match actuator.fanin_ids.iter().position(|id| *id == from) {
                        Some(i) if slots[i].is_none() => {
                            slots[i] = signal.first().copied();
                        }
                        Some(_) => warn!(actuator = %actuator.id, %from, "duplicate fan-in signal"),
                        None => warn!(actuator = %actuator.id, %from, "signal from unknown neuron"),
                    }
                    if slots.iter().all(|s| s.is_some()) {
                        let vector = slots.iter().map(|s| s.unwrap_or(0.0)).collect();
                        for slot in slots.iter_mut() {
                            *slot = None;
                        }
                        Some(vector)
                    } else {
                        None
                    }
                };
                if let Some(vector) = output {
                    let response = scape.lock().actuate(&actuator, &vector);
                    let _ = cortex.send(CortexMsg::SyncFromActuator {
                        fitness: response.fitness,
                        end_flag: response.end_flag,
                    });
                }
            }
            Ok(ActuatorMsg::Reset) => {
                for slot in slots.iter_mut() {
                    *slot = None;
                }
            }
            Ok(ActuatorMsg::Terminate) | Err(_) => return,
            Ok(ActuatorMsg::Configure(_)) => {}
        }
    }
}
