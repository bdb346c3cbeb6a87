// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! The cortex task: per-agent cycle coordinator.
//!
//! One cycle = `sync` every sensor, then wait for a `sync` back from every
//! actuator. Fitness vectors accumulate component-wise across actuators and
//! cycles. An end flag of `Halt` finishes the evaluation; `GoalReached`
//! finishes it and marks the run's goal met.

use crossbeam::channel::{unbounded, Receiver, Sender};
use std::thread::JoinHandle;
use tracing::trace;

use crate::messages::{CortexConfig, CortexMsg, ExoselfMsg, SensorMsg};
use crate::scape::EndFlag;

/// Spawn an idle cortex task; it blocks until its `Configure` arrives.
pub fn spawn() -> (Sender<CortexMsg>, JoinHandle<()>) {
    let (tx, rx) = unbounded();
    let handle = std::thread::spawn(move || run(rx));
    (tx, handle)
}

fn vec_add(acc: &mut Vec<f64>, x: &[f64]) {
    if acc.len() < x.len() {
        acc.resize(x.len(), 0.0);
    }
    for (a, b) in acc.iter_mut().zip(x.iter()) {
        *a += b;
    }
}

fn run(rx: Receiver<CortexMsg>) {
    let config = loop {
        match rx.recv() {
            Ok(CortexMsg::Configure(config)) => break config,
            Ok(CortexMsg::Terminate) | Err(_) => return,
            Ok(_) => continue,
        }
    };
    let CortexConfig { sensors, actuator_count, exoself } = *config;

    let mut running = false;
    let mut awaiting = 0usize;
    let mut cycles = 0u64;
    let mut total_fitness: Vec<f64> = vec![];
    let mut halt = false;
    let mut goal = false;

    let start_cycle = |awaiting: &mut usize| {
        for tx in &sensors {
            let _ = tx.send(SensorMsg::Sync);
        }
        *awaiting = actuator_count;
    };

    loop {
        let msg = match rx.recv() {
            Ok(msg) => msg,
            Err(_) => return,
        };
        match msg {
            CortexMsg::Reactivate => {
                cycles = 0;
                total_fitness.clear();
                halt = false;
                goal = false;
                running = true;
                start_cycle(&mut awaiting);
            }
            CortexMsg::SyncFromActuator { fitness, end_flag } if running => {
                vec_add(&mut total_fitness, &fitness);
                match end_flag {
                    EndFlag::Continue => {}
                    EndFlag::Halt => halt = true,
                    EndFlag::GoalReached => {
                        halt = true;
                        goal = true;
                    }
                }
                awaiting = awaiting.saturating_sub(1);
                if awaiting == 0 {
                    cycles += 1;
                    if halt {
                        running = false;
                        trace!(cycles, ?total_fitness, goal, "evaluation halted");
                        let _ = exoself.send(ExoselfMsg::EvaluationComplete {
                            fitness: std::mem::take(&mut total_fitness),
                            cycles,
                            goal_reached: goal,
                        });
                    } else {
                        start_cycle(&mut awaiting);
                    }
                }
            }
            CortexMsg::SyncFromActuator { .. } => {
                // A late sync from a cancelled cycle; drop it.
            }
            CortexMsg::Terminate => return,
            CortexMsg::Configure(_) => {}
        }
    }
}
