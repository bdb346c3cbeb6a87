// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! The morphology interface.
//!
//! Morphologies are supplied by the embedding application and resolved by
//! name. A morphology describes the sensors and actuators available to a
//! specie, which subset new agents start with, and — for substrate-encoded
//! species — the coordinate pre-processors (CPPs) and connection-expression
//! points (CEPs) the pattern-producer network is wired through.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use bardo_structures::{ScapeRef, SignalFormat, SubstratePlasticity};

use crate::error::{EvolutionError, Result};

/// Blueprint for a sensor; instantiated with a fresh id at construction.
#[derive(Debug, Clone)]
pub struct SensorSpec {
    pub name: String,
    pub vl: usize,
    pub scape: ScapeRef,
    pub format: SignalFormat,
    pub parameters: serde_json::Value,
}

impl SensorSpec {
    pub fn new(name: impl Into<String>, vl: usize, scape: ScapeRef) -> Self {
        SensorSpec {
            name: name.into(),
            vl,
            scape,
            format: SignalFormat::NoGeo,
            parameters: serde_json::Value::Null,
        }
    }
}

/// Blueprint for an actuator.
#[derive(Debug, Clone)]
pub struct ActuatorSpec {
    pub name: String,
    pub vl: usize,
    pub scape: ScapeRef,
    pub format: SignalFormat,
    pub parameters: serde_json::Value,
}

impl ActuatorSpec {
    pub fn new(name: impl Into<String>, vl: usize, scape: ScapeRef) -> Self {
        ActuatorSpec {
            name: name.into(),
            vl,
            scape,
            format: SignalFormat::NoGeo,
            parameters: serde_json::Value::Null,
        }
    }
}

/// An embedding-application-supplied sensor/actuator catalog.
pub trait Morphology: Send + Sync {
    /// Every sensor the morphology offers.
    fn sensors(&self) -> Vec<SensorSpec>;

    /// Every actuator the morphology offers.
    fn actuators(&self) -> Vec<ActuatorSpec>;

    /// The subset new agents start with (default: the first sensor).
    fn get_init_sensors(&self) -> Vec<SensorSpec> {
        self.sensors().into_iter().take(1).collect()
    }

    /// The subset new agents start with (default: the first actuator).
    fn get_init_actuators(&self) -> Vec<ActuatorSpec> {
        self.actuators().into_iter().take(1).collect()
    }

    /// Coordinate pre-processors for substrate encoding.
    fn get_init_substrate_cpps(
        &self,
        dims: usize,
        plasticity: SubstratePlasticity,
    ) -> Vec<SensorSpec> {
        standard_substrate_cpps(dims, plasticity)
    }

    /// Connection-expression points for substrate encoding.
    fn get_init_substrate_ceps(
        &self,
        dims: usize,
        plasticity: SubstratePlasticity,
    ) -> Vec<ActuatorSpec> {
        standard_substrate_ceps(dims, plasticity)
    }
}

/// The standard CPP set: each variant senses the coordinates of a candidate
/// substrate link `(from, to)` in a different projection. `polar` is 2D
/// only, `spherical` 3D only.
pub fn standard_substrate_cpps(dims: usize, _plasticity: SubstratePlasticity) -> Vec<SensorSpec> {
    let scape = ScapeRef::Private("substrate".into());
    let geo = |vl: usize| SensorSpec {
        name: String::new(),
        vl,
        scape: scape.clone(),
        format: SignalFormat::Symmetric { dims: vec![dims] },
        parameters: serde_json::Value::Null,
    };
    let named = |name: &str, vl: usize| SensorSpec {
        name: name.into(),
        ..geo(vl)
    };
    let mut cpps = vec![
        named("cartesian", 2 * dims),
        named("centripetal_distances", 2),
        named("cartesian_distance", 1),
        named("cartesian_coord_diffs", dims),
        named("cartesian_gaussed_coord_diffs", dims),
        named("iow", 3),
    ];
    if dims == 2 {
        cpps.push(named("polar", 4));
    }
    if dims == 3 {
        cpps.push(named("spherical", 6));
    }
    cpps
}

/// The standard CEP set, one per plasticity mode.
pub fn standard_substrate_ceps(dims: usize, plasticity: SubstratePlasticity) -> Vec<ActuatorSpec> {
    let scape = ScapeRef::Private("substrate".into());
    let spec = |name: &str, vl: usize| ActuatorSpec {
        name: name.into(),
        vl,
        scape: scape.clone(),
        format: SignalFormat::Symmetric { dims: vec![dims] },
        parameters: serde_json::Value::Null,
    };
    match plasticity {
        SubstratePlasticity::None => vec![spec("set_weight", 1)],
        SubstratePlasticity::Iterative => vec![spec("delta_weight", 1)],
        SubstratePlasticity::Abcn => vec![spec("set_abcn", 5)],
    }
}

/// Name → morphology map shared across the run.
#[derive(Default, Clone)]
pub struct MorphologyRegistry {
    inner: Arc<RwLock<AHashMap<String, Arc<dyn Morphology>>>>,
}

impl MorphologyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, morphology: Arc<dyn Morphology>) {
        self.inner.write().insert(name.into(), morphology);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Morphology>> {
        self.inner
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EvolutionError::UnknownMorphology(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TwoSensorMorphology;

    impl Morphology for TwoSensorMorphology {
        fn sensors(&self) -> Vec<SensorSpec> {
            vec![
                SensorSpec::new("a", 2, ScapeRef::Private("sim".into())),
                SensorSpec::new("b", 3, ScapeRef::Private("sim".into())),
            ]
        }

        fn actuators(&self) -> Vec<ActuatorSpec> {
            vec![ActuatorSpec::new("out", 1, ScapeRef::Private("sim".into()))]
        }
    }

    #[test]
    fn test_registry_roundtrip() {
        let registry = MorphologyRegistry::new();
        registry.register("two_sensor", Arc::new(TwoSensorMorphology));
        let m = registry.get("two_sensor").unwrap();
        assert_eq!(m.sensors().len(), 2);
        assert_eq!(m.get_init_sensors().len(), 1);
        assert!(registry.get("missing").is_err());
    }

    #[test]
    fn test_standard_cpps_respect_dimensionality() {
        let cpps2 = standard_substrate_cpps(2, SubstratePlasticity::None);
        assert!(cpps2.iter().any(|c| c.name == "polar"));
        assert!(!cpps2.iter().any(|c| c.name == "spherical"));

        let cpps3 = standard_substrate_cpps(3, SubstratePlasticity::None);
        assert!(cpps3.iter().any(|c| c.name == "spherical"));
        assert!(!cpps3.iter().any(|c| c.name == "polar"));

        let cartesian = cpps3.iter().find(|c| c.name == "cartesian").unwrap();
        assert_eq!(cartesian.vl, 6);
    }

    #[test]
    fn test_ceps_match_plasticity_mode() {
        assert_eq!(
            standard_substrate_ceps(2, SubstratePlasticity::None)[0].name,
            "set_weight"
        );
        assert_eq!(
            standard_substrate_ceps(2, SubstratePlasticity::Iterative)[0].name,
            "delta_weight"
        );
        let abcn = &standard_substrate_ceps(2, SubstratePlasticity::Abcn)[0];
        assert_eq!(abcn.name, "set_abcn");
        assert_eq!(abcn.vl, 5);
    }
}
