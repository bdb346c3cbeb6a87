// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! The substrate executor.
//!
//! A substrate-encoded agent runs a dense grid of neurodes between its real
//! sensors and actuators. The evolved network never sees the environment
//! directly: it is a *pattern producer* that paints the grid's weights, one
//! query per substrate link, through coordinate pre-processor sensors
//! (CPPs) and connection-expression actuators (CEPs).
//!
//! The substrate task plays two protocol roles at once: toward the outer
//! mesh it behaves like one big neuron (receives `Forward` from every real
//! sensor, emits `Forward` to every real actuator); toward the pattern
//! producer it behaves like a cortex (syncs the CPPs, waits for every CEP).
//! Weights are painted on the first cycle, and repainted every cycle when
//! the substrate plasticity is `iterative`; `abcn` paints per-link learning
//! coefficients once and then updates weights locally from neurode
//! activities.

use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::thread::JoinHandle;
use tracing::warn;

use bardo_neural::utils::{saturate, saturate_dzone, WEIGHT_SAT_LIMIT};
use bardo_structures::{
    Actuator, LayerIndex, Linkform, NeuronId, Sensor, SignalSource, Substrate,
    SubstratePlasticity,
};

use crate::messages::{ActuatorMsg, CortexMsg, NeuronMsg, SensorMsg};
use crate::scape::{Scape, ScapeResponse};

/// Magnitudes below this are flushed to zero when a CEP sets a weight,
/// which keeps the painted substrate sparse.
const WEIGHT_EXPRESSION_THRESHOLD: f64 = 0.33;

/// The link currently being queried by the pattern producer.
#[derive(Debug, Clone, Default)]
pub struct SubstrateQuery {
    pub from: Vec<f64>,
    pub to: Vec<f64>,
    pub pre: f64,
    pub post: f64,
    pub weight: f64,
}

/// State shared between the substrate task and its CPP/CEP adapters.
#[derive(Default)]
pub struct SubstrateScapeState {
    pub query: SubstrateQuery,
    pub outputs: Vec<(String, Vec<f64>)>,
}

/// The internal scape CPPs sense and CEPs actuate against.
pub struct SubstrateScape {
    pub shared: Arc<Mutex<SubstrateScapeState>>,
}

impl Scape for SubstrateScape {
    fn sense(&mut self, sensor: &Sensor) -> Vec<f64> {
        let state = self.shared.lock();
        encode_cpp(&sensor.name, &state.query, sensor.vl)
    }

    fn actuate(&mut self, actuator: &Actuator, output: &[f64]) -> ScapeResponse {
        self.shared
            .lock()
            .outputs
            .push((actuator.name.clone(), output.to_vec()));
        ScapeResponse::cont(vec![])
    }
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn polar(v: &[f64]) -> [f64; 2] {
    let r = norm(v);
    let theta = v.get(1).copied().unwrap_or(0.0).atan2(v.first().copied().unwrap_or(0.0));
    [r, theta]
}

fn spherical(v: &[f64]) -> [f64; 3] {
    let x = v.first().copied().unwrap_or(0.0);
    let y = v.get(1).copied().unwrap_or(0.0);
    let z = v.get(2).copied().unwrap_or(0.0);
    let r = norm(v);
    let phi = y.atan2(x);
    let theta = if r == 0.0 { 0.0 } else { (z / r).acos() };
    [r, phi, theta]
}

/// Encode one link query into a CPP's sensory vector. The output is padded
/// or truncated to the CPP's declared vector length.
pub fn encode_cpp(name: &str, q: &SubstrateQuery, vl: usize) -> Vec<f64> {
    let mut out: Vec<f64> = match name {
        "centripetal_distances" => vec![norm(&q.from), norm(&q.to)],
        "cartesian_distance" => {
            let d = q
                .from
                .iter()
                .zip(q.to.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            vec![d]
        }
        "cartesian_coord_diffs" => q.from.iter().zip(q.to.iter()).map(|(a, b)| b - a).collect(),
        "cartesian_gaussed_coord_diffs" => q
            .from
            .iter()
            .zip(q.to.iter())
            .map(|(a, b)| (-((b - a) * (b - a))).exp())
            .collect(),
        "iow" => vec![q.pre, q.post, q.weight],
        "polar" => {
            let [r1, t1] = polar(&q.from);
            let [r2, t2] = polar(&q.to);
            vec![r1, t1, r2, t2]
        }
        "spherical" => {
            let [r1, p1, t1] = spherical(&q.from);
            let [r2, p2, t2] = spherical(&q.to);
            vec![r1, p1, t1, r2, p2, t2]
        }
        // "cartesian" and anything unrecognized.
        _ => q.from.iter().chain(q.to.iter()).copied().collect(),
    };
    out.resize(vl, 0.0);
    out
}

struct SubstrateLink {
    from: (usize, usize),
    to: (usize, usize),
    weight: f64,
    /// `[A, B, C, D, eta]` for abcn plasticity.
    abcn: [f64; 5],
}

struct Grid {
    /// Per-layer neurode coordinates; activities are stored separately.
    coords: Vec<Vec<Vec<f64>>>,
    activities: Vec<Vec<f64>>,
    links: Vec<SubstrateLink>,
    /// Output-layer feedback activities for `jordan_recurrent`.
    feedback: Vec<f64>,
}

impl Grid {
    /// Lay out neurodes on a hypercube: one axis walks the layers from −1
    /// (inputs) to +1 (outputs), a second spreads neurodes within a layer.
    fn new(substrate: &Substrate, input_len: usize, output_len: usize, dims: usize) -> Grid {
        let mut layer_sizes = vec![input_len.max(1)];
        layer_sizes.extend(substrate.densities.iter().map(|d| (*d).max(1)));
        layer_sizes.push(output_len.max(1));

        let depth = layer_sizes.len();
        let mut coords = Vec::with_capacity(depth);
        for (li, size) in layer_sizes.iter().enumerate() {
            let y = if depth == 1 {
                0.0
            } else {
                -1.0 + 2.0 * li as f64 / (depth - 1) as f64
            };
            let mut layer = Vec::with_capacity(*size);
            for ni in 0..*size {
                let x = if *size == 1 {
                    0.0
                } else {
                    -1.0 + 2.0 * ni as f64 / (*size - 1) as f64
                };
                let mut c = vec![x, y];
                c.resize(dims.max(2), 0.0);
                layer.push(c);
            }
            coords.push(layer);
        }

        let mut links = Vec::new();
        let mut push_links = |from_layer: usize, to_layer: usize, links: &mut Vec<SubstrateLink>| {
            for fi in 0..layer_sizes[from_layer] {
                for ti in 0..layer_sizes[to_layer] {
                    links.push(SubstrateLink {
                        from: (from_layer, fi),
                        to: (to_layer, ti),
                        weight: 0.0,
                        abcn: [0.0; 5],
                    });
                }
            }
        };
        match substrate.linkform {
            Linkform::L2lFeedforward | Linkform::JordanRecurrent => {
                for li in 0..depth - 1 {
                    push_links(li, li + 1, &mut links);
                }
            }
            Linkform::FullyInterconnected => {
                for from in 0..depth {
                    for to in from + 1..depth {
                        push_links(from, to, &mut links);
                    }
                }
            }
        }

        let activities = layer_sizes.iter().map(|s| vec![0.0; *s]).collect();
        Grid {
            coords,
            activities,
            links,
            feedback: vec![0.0; output_len.max(1)],
        }
    }

    /// Feed-forward propagation with tanh neurodes.
    fn propagate(&mut self, input: &[f64], jordan: bool) {
        for (slot, x) in self.activities[0].iter_mut().zip(input.iter()) {
            *slot = *x;
        }
        let depth = self.activities.len();
        for layer in 1..depth {
            let mut acc = vec![0.0; self.activities[layer].len()];
            for link in &self.links {
                if link.to.0 == layer {
                    acc[link.to.1] += link.weight * self.activities[link.from.0][link.from.1];
                }
            }
            // Jordan feedback folds last cycle's outputs into the first
            // processing layer.
            if jordan && layer == 1 {
                for (i, slot) in acc.iter_mut().enumerate() {
                    *slot += self.feedback.get(i % self.feedback.len()).copied().unwrap_or(0.0);
                }
            }
            for (slot, a) in self.activities[layer].iter_mut().zip(acc.iter()) {
                *slot = a.tanh();
            }
        }
        self.feedback = self.activities[depth - 1].clone();
    }

    fn output(&self) -> &[f64] {
        self.activities.last().map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Everything the exoself resolves before spawning the substrate task.
pub struct SubstrateSpawn {
    pub substrate: Substrate,
    pub sensors: Vec<Sensor>,
    pub actuators: Vec<(Actuator, Sender<ActuatorMsg>)>,
    pub cpp_txs: Vec<Sender<SensorMsg>>,
    pub cep_count: usize,
    /// CEP actuators deliver their syncs here.
    pub inner_rx: Receiver<CortexMsg>,
    pub shared: Arc<Mutex<SubstrateScapeState>>,
    pub dims: usize,
}

/// Spawn the substrate task. It shares the neuron message surface so real
/// sensors can fan into it and the exoself can reset and terminate it.
pub fn spawn(spawn_config: SubstrateSpawn) -> (Sender<NeuronMsg>, JoinHandle<()>) {
    let (tx, rx) = unbounded();
    let handle = std::thread::spawn(move || run(rx, spawn_config));
    (tx, handle)
}

fn run(rx: Receiver<NeuronMsg>, cfg: SubstrateSpawn) {
    let input_len: usize = cfg.sensors.iter().map(|s| s.vl).sum();
    let output_len: usize = cfg.actuators.iter().map(|(a, _)| a.vl).sum();
    let mut grid = Grid::new(&cfg.substrate, input_len, output_len, cfg.dims);
    let mut painted = false;

    // Synthetic identity for forwards into real actuators.
    let self_id = NeuronId::generate(LayerIndex::new(0.0));

    // Wait-set over real sensors, in cortex order.
    let expected: Vec<SignalSource> = cfg.sensors.iter().map(|s| SignalSource::Sensor(s.id)).collect();
    let mut slots: Vec<Option<Vec<f64>>> = vec![None; expected.len()];

    loop {
        let msg = match rx.recv() {
            Ok(msg) => msg,
            Err(_) => return,
        };
        match msg {
            NeuronMsg::Forward { from, signal } => {
                match expected.iter().position(|s| *s == from) {
                    Some(i) if slots[i].is_none() => slots[i] = Some(signal),
                    _ => warn!("substrate dropped unexpected signal"),
                }
                if slots.iter().all(|s| s.is_some()) {
                    let input: Vec<f64> = slots
                        .iter_mut()
                        .flat_map(|s| s.take().expect("checked above"))
                        .collect();

                    let repaint = match cfg.substrate.plasticity {
                        SubstratePlasticity::None | SubstratePlasticity::Abcn => !painted,
                        SubstratePlasticity::Iterative => true,
                    };
                    if repaint {
                        if !paint(&mut grid, &cfg) {
                            return;
                        }
                        painted = true;
                    }

                    grid.propagate(&input, cfg.substrate.linkform == Linkform::JordanRecurrent);

                    if cfg.substrate.plasticity == SubstratePlasticity::Abcn {
                        abcn_update(&mut grid);
                    }

                    // Split the output layer across the real actuators.
                    let mut offset = 0;
                    let output = grid.output().to_vec();
                    for (actuator, tx) in &cfg.actuators {
                        let end = (offset + actuator.vl).min(output.len());
                        let chunk = output[offset..end].to_vec();
                        offset = end;
                        let _ = tx.send(ActuatorMsg::Forward {
                            from: self_id,
                            signal: chunk,
                        });
                    }
                }
            }
            NeuronMsg::ResetPrep { ack } => {
                while let Ok(pending) = rx.try_recv() {
                    if matches!(pending, NeuronMsg::Terminate) {
                        return;
                    }
                }
                for slot in slots.iter_mut() {
                    *slot = None;
                }
                for layer in grid.activities.iter_mut() {
                    layer.iter_mut().for_each(|a| *a = 0.0);
                }
                grid.feedback.iter_mut().for_each(|a| *a = 0.0);
                // Weights come from the (possibly perturbed) pattern
                // producer, so repaint on the next cycle.
                painted = false;
                let _ = ack.send(());
            }
            NeuronMsg::Reset => {}
            NeuronMsg::Terminate => return,
            _ => {}
        }
    }
}

/// Query the pattern producer once per link and express the replies.
/// Returns false when the inner mesh is gone.
fn paint(grid: &mut Grid, cfg: &SubstrateSpawn) -> bool {
    for li in 0..grid.links.len() {
        let (from, to, weight, pre, post) = {
            let link = &grid.links[li];
            (
                grid.coords[link.from.0][link.from.1].clone(),
                grid.coords[link.to.0][link.to.1].clone(),
                link.weight,
                grid.activities[link.from.0][link.from.1],
                grid.activities[link.to.0][link.to.1],
            )
        };
        {
            let mut state = cfg.shared.lock();
            state.query = SubstrateQuery {
                from,
                to,
                pre,
                post,
                weight,
            };
            state.outputs.clear();
        }
        for tx in &cfg.cpp_txs {
            let _ = tx.send(SensorMsg::Sync);
        }
        for _ in 0..cfg.cep_count {
            if cfg.inner_rx.recv().is_err() {
                return false;
            }
        }
        let outputs = std::mem::take(&mut cfg.shared.lock().outputs);
        let link = &mut grid.links[li];
        for (name, out) in outputs {
            match name.as_str() {
                "set_weight" => {
                    let w = out.first().copied().unwrap_or(0.0);
                    link.weight = saturate_dzone(w, WEIGHT_SAT_LIMIT, WEIGHT_EXPRESSION_THRESHOLD);
                }
                "delta_weight" => {
                    let dw = out.first().copied().unwrap_or(0.0);
                    link.weight = saturate(link.weight + dw, WEIGHT_SAT_LIMIT);
                }
                "set_abcn" => {
                    for (slot, v) in link.abcn.iter_mut().zip(out.iter()) {
                        *slot = *v;
                    }
                    if link.weight == 0.0 {
                        link.weight = link.abcn[4];
                    }
                }
                other => warn!(cep = other, "unknown connection-expression point"),
            }
        }
    }
    true
}

/// Local ABCN weight update from the current neurode activities.
fn abcn_update(grid: &mut Grid) {
    for link in grid.links.iter_mut() {
        let pre = grid.activities[link.from.0][link.from.1];
        let post = grid.activities[link.to.0][link.to.1];
        let [a, b, c, d, eta] = link.abcn;
        let delta = eta * (a * pre * post + b * pre + c * post + d);
        link.weight = saturate(link.weight + delta, WEIGHT_SAT_LIMIT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bardo_structures::{AgentId, SubstrateId};

    fn substrate(linkform: Linkform) -> Substrate {
        Substrate {
            id: SubstrateId::generate(),
            agent_id: AgentId::generate(),
            densities: vec![3],
            linkform,
            plasticity: SubstratePlasticity::None,
            cpp_ids: vec![],
            cep_ids: vec![],
        }
    }

    #[test]
    fn test_feedforward_link_count() {
        let grid = Grid::new(&substrate(Linkform::L2lFeedforward), 2, 1, 2);
        // 2x3 + 3x1
        assert_eq!(grid.links.len(), 9);
    }

    #[test]
    fn test_fully_interconnected_link_count() {
        let grid = Grid::new(&substrate(Linkform::FullyInterconnected), 2, 1, 2);
        // 2x3 + 2x1 + 3x1
        assert_eq!(grid.links.len(), 11);
    }

    #[test]
    fn test_propagation_is_bounded_and_deterministic() {
        let mut grid = Grid::new(&substrate(Linkform::L2lFeedforward), 2, 1, 2);
        for link in grid.links.iter_mut() {
            link.weight = 1.0;
        }
        grid.propagate(&[0.5, -0.5], false);
        let first = grid.output().to_vec();
        grid.propagate(&[0.5, -0.5], false);
        assert_eq!(first, grid.output());
        assert!(first.iter().all(|x| x.abs() <= 1.0));
    }

    #[test]
    fn test_cpp_encodings() {
        let q = SubstrateQuery {
            from: vec![0.0, 0.0],
            to: vec![3.0, 4.0],
            pre: 0.1,
            post: 0.2,
            weight: 0.3,
        };
        assert_eq!(encode_cpp("cartesian", &q, 4), vec![0.0, 0.0, 3.0, 4.0]);
        assert_eq!(encode_cpp("cartesian_distance", &q, 1), vec![5.0]);
        assert_eq!(encode_cpp("centripetal_distances", &q, 2), vec![0.0, 5.0]);
        assert_eq!(encode_cpp("iow", &q, 3), vec![0.1, 0.2, 0.3]);
        assert_eq!(encode_cpp("cartesian_coord_diffs", &q, 2), vec![3.0, 4.0]);
    }

    #[test]
    fn test_weight_expression_threshold() {
        assert_eq!(saturate_dzone(0.1, WEIGHT_SAT_LIMIT, WEIGHT_EXPRESSION_THRESHOLD), 0.0);
        assert!(saturate_dzone(0.5, WEIGHT_SAT_LIMIT, WEIGHT_EXPRESSION_THRESHOLD) != 0.0);
    }
}
