// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Link creation and removal between element classes.
//!
//! Linking `X → Y` updates both endpoints: the source's fanout/output list
//! and the target's input list (one fresh weight per component of `X`'s
//! output vector). Recurrent bookkeeping (`ro_ids`) is refreshed whenever a
//! neuron's outputs change. Every function returns `Ok(false)` when the
//! link already exists (or capacity forbids it) so the mutation engine can
//! retry another operator.

use bardo_neural::random::random_f64;
use bardo_neural::PlasticityFunction;
use bardo_state::Store;
use bardo_structures::{
    ActuatorId, InputLink, NeuronId, SensorId, SignalSource, SignalTarget, SynapticWeight,
};

use crate::error::Result;

/// Fresh weights for a new link: one per source component, uniform in
/// `[-0.5, 0.5]`, with plasticity parameters seeded by the target's rule.
pub fn fresh_weights(vl: usize, pf: PlasticityFunction) -> Vec<SynapticWeight> {
    (0..vl)
        .map(|_| SynapticWeight::new(random_f64() - 0.5, pf.weight_parameters()))
        .collect()
}

/// Link a sensor to a neuron. `Ok(false)` if the link already exists.
pub fn link_sensor_to_neuron(store: &Store, sensor_id: &SensorId, neuron_id: &NeuronId) -> Result<bool> {
    let mut sensor = store.read_sensor(sensor_id)?;
    let mut neuron = store.read_neuron(neuron_id)?;
    let source = SignalSource::Sensor(*sensor_id);
    if sensor.fanout_ids.contains(neuron_id) || neuron.has_input_from(&source) {
        return Ok(false);
    }
    neuron
        .input_idps
        .push(InputLink::new(source, fresh_weights(sensor.vl, neuron.plasticity)));
    sensor.fanout_ids.push(*neuron_id);
    store.write_sensor(sensor);
    store.write_neuron(neuron);
    Ok(true)
}

/// Link neuron `from` to neuron `to` (may be the same neuron, which makes
/// the link recurrent by definition).
pub fn link_neuron_to_neuron(store: &Store, from: &NeuronId, to: &NeuronId) -> Result<bool> {
    let target = SignalTarget::Neuron(*to);
    let source = SignalSource::Neuron(*from);
    if from == to {
        let mut n = store.read_neuron(from)?;
        if n.has_output_to(&target) || n.has_input_from(&source) {
            return Ok(false);
        }
        let weights = fresh_weights(1, n.plasticity);
        n.input_idps.push(InputLink::new(source, weights));
        n.output_ids.push(target);
        n.refresh_ro_ids();
        store.write_neuron(n);
        return Ok(true);
    }
    let mut src = store.read_neuron(from)?;
    let mut dst = store.read_neuron(to)?;
    if src.has_output_to(&target) || dst.has_input_from(&source) {
        return Ok(false);
    }
    dst.input_idps
        .push(InputLink::new(source, fresh_weights(1, dst.plasticity)));
    src.output_ids.push(target);
    src.refresh_ro_ids();
    store.write_neuron(src);
    store.write_neuron(dst);
    Ok(true)
}

/// Link a neuron into an actuator's fan-in. Fails (`Ok(false)`) when the
/// actuator already reads the neuron or its fan-in is at capacity (`vl`).
pub fn link_neuron_to_actuator(store: &Store, from: &NeuronId, actuator_id: &ActuatorId) -> Result<bool> {
    let mut actuator = store.read_actuator(actuator_id)?;
    let mut neuron = store.read_neuron(from)?;
    let target = SignalTarget::Actuator(*actuator_id);
    if actuator.fanin_ids.contains(from)
        || neuron.has_output_to(&target)
        || actuator.fanin_ids.len() >= actuator.vl
    {
        return Ok(false);
    }
    actuator.fanin_ids.push(*from);
    neuron.output_ids.push(target);
    neuron.refresh_ro_ids();
    store.write_actuator(actuator);
    store.write_neuron(neuron);
    Ok(true)
}

/// Remove the link `from → to` between two neurons (used by splice).
/// `Ok(false)` when no such link exists.
pub fn cut_neuron_to_neuron(store: &Store, from: &NeuronId, to: &NeuronId) -> Result<bool> {
    let target = SignalTarget::Neuron(*to);
    let source = SignalSource::Neuron(*from);
    let mut src = store.read_neuron(from)?;
    if !src.has_output_to(&target) {
        return Ok(false);
    }
    src.output_ids.retain(|t| t != &target);
    src.refresh_ro_ids();
    if from == to {
        src.input_idps.retain(|l| l.source != source);
        store.write_neuron(src);
        return Ok(true);
    }
    store.write_neuron(src);
    let mut dst = store.read_neuron(to)?;
    dst.input_idps.retain(|l| l.source != source);
    store.write_neuron(dst);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bardo_neural::{ActivationFunction, AggregationFunction};
    use bardo_structures::{
        Actuator, CortexId, LayerIndex, Neuron, ScapeRef, Sensor, SignalFormat,
    };

    fn seed_neuron(store: &Store, layer: f64) -> NeuronId {
        let n = Neuron {
            id: NeuronId::generate(LayerIndex::new(layer)),
            cortex_id: CortexId::generate(),
            generation: 0,
            activation: ActivationFunction::Tanh,
            plasticity: PlasticityFunction::None,
            neural_params: vec![],
            aggregation: AggregationFunction::DotProduct,
            input_idps: vec![],
            input_idps_modulation: vec![],
            output_ids: vec![],
            ro_ids: vec![],
        };
        let id = n.id;
        store.write_neuron(n);
        id
    }

    fn seed_sensor(store: &Store, vl: usize) -> SensorId {
        let s = Sensor {
            id: SensorId::generate(),
            name: "s".into(),
            cortex_id: None,
            scape: ScapeRef::Private("sim".into()),
            vl,
            fanout_ids: vec![],
            generation: 0,
            format: SignalFormat::NoGeo,
            parameters: serde_json::Value::Null,
        };
        let id = s.id;
        store.write_sensor(s);
        id
    }

    fn seed_actuator(store: &Store, vl: usize) -> ActuatorId {
        let a = Actuator {
            id: ActuatorId::generate(),
            name: "a".into(),
            cortex_id: None,
            scape: ScapeRef::Private("sim".into()),
            vl,
            fanin_ids: vec![],
            generation: 0,
            format: SignalFormat::NoGeo,
            parameters: serde_json::Value::Null,
        };
        let id = a.id;
        store.write_actuator(a);
        id
    }

    #[test]
    fn test_sensor_link_weight_count_matches_vl() {
        let store = Store::new();
        let s = seed_sensor(&store, 3);
        let n = seed_neuron(&store, 0.0);
        assert!(link_sensor_to_neuron(&store, &s, &n).unwrap());
        let neuron = store.read_neuron(&n).unwrap();
        assert_eq!(neuron.input_idps[0].weights.len(), 3);
        assert!(neuron.input_idps[0]
            .weights
            .iter()
            .all(|w| w.value.abs() <= 0.5));
        // Duplicate link reports failure.
        assert!(!link_sensor_to_neuron(&store, &s, &n).unwrap());
    }

    #[test]
    fn test_recurrent_link_updates_ro_ids() {
        let store = Store::new();
        let hi = seed_neuron(&store, 0.5);
        let lo = seed_neuron(&store, 0.0);
        assert!(link_neuron_to_neuron(&store, &hi, &lo).unwrap());
        let src = store.read_neuron(&hi).unwrap();
        assert_eq!(src.ro_ids, vec![lo]);

        // Forward link is not recurrent.
        assert!(link_neuron_to_neuron(&store, &lo, &hi).unwrap());
        let fwd = store.read_neuron(&lo).unwrap();
        assert!(fwd.ro_ids.is_empty());
    }

    #[test]
    fn test_self_link() {
        let store = Store::new();
        let n = seed_neuron(&store, 0.5);
        assert!(link_neuron_to_neuron(&store, &n, &n).unwrap());
        let neuron = store.read_neuron(&n).unwrap();
        assert_eq!(neuron.ro_ids, vec![n]);
        assert_eq!(neuron.input_idps.len(), 1);
        assert!(!link_neuron_to_neuron(&store, &n, &n).unwrap());
    }

    #[test]
    fn test_actuator_capacity() {
        let store = Store::new();
        let a = seed_actuator(&store, 1);
        let n1 = seed_neuron(&store, 0.0);
        let n2 = seed_neuron(&store, 0.0);
        assert!(link_neuron_to_actuator(&store, &n1, &a).unwrap());
        assert!(!link_neuron_to_actuator(&store, &n2, &a).unwrap());
    }

    #[test]
    fn test_cut_link_removes_both_sides() {
        let store = Store::new();
        let a = seed_neuron(&store, 0.0);
        let b = seed_neuron(&store, 0.5);
        assert!(link_neuron_to_neuron(&store, &a, &b).unwrap());
        assert!(cut_neuron_to_neuron(&store, &a, &b).unwrap());
        assert!(store.read_neuron(&a).unwrap().output_ids.is_empty());
        assert!(store.read_neuron(&b).unwrap().input_idps.is_empty());
        assert!(!cut_neuron_to_neuron(&store, &a, &b).unwrap());
    }
}
