// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! The sensor task: on each cortex `Sync` it reads its scape and fans the
//! same vector out to every downstream neuron.

use crossbeam::channel::{unbounded, Receiver, Sender};
use std::thread::JoinHandle;
use tracing::warn;

use bardo_structures::SignalSource;

use crate::messages::{NeuronMsg, SensorConfig, SensorMsg};

/// Spawn an idle sensor task; it blocks until its `Configure` arrives.
pub fn spawn() -> (Sender<SensorMsg>, JoinHandle<()>) {
    let (tx, rx) = unbounded();
    let handle = std::thread::spawn(move || run(rx));
    (tx, handle)
}

fn run(rx: Receiver<SensorMsg>) {
    let config = loop {
        match rx.recv() {
            Ok(SensorMsg::Configure(config)) => break config,
            Ok(SensorMsg::Terminate) | Err(_) => return,
            Ok(_) => continue,
        }
    };
    let SensorConfig { sensor, scape, fanout } = *config;
    let source = SignalSource::Sensor(sensor.id);

    loop {
        match rx.recv() {
            Ok(SensorMsg::Sync) => {
                let signal = scape.lock().sense(&sensor);
                if signal.len() != sensor.vl {
                    warn!(
                        sensor = %sensor.id,
                        got = signal.len(),
                        expected = sensor.vl,
                        "scape returned a mis-sized sensory vector"
                    );
                }
                for tx in &fanout {
                    let _ = tx.send(NeuronMsg::Forward {
                        from: source,
                        signal: signal.clone(),
                    });
                }
            }
            Ok(SensorMsg::Terminate) | Err(_) => return,
            Ok(SensorMsg::Configure(_)) => {}
        }
    }
}
