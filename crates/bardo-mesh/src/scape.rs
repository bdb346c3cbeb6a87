// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! The scape interface: the external environment agents sense and act on.
//!
//! Scapes are supplied by the embedding application and resolved by name.
//! Private scapes get a fresh instance per agent (all of that agent's
//! adapters share it); public scapes are one shared instance for the whole
//! population.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};

use bardo_structures::{Actuator, ScapeRef, Sensor};

use crate::error::{MeshError, Result};

/// What the scape says after an actuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndFlag {
    /// Keep cycling.
    Continue,
    /// The evaluation is over.
    Halt,
    /// The evaluation is over and the run's fitness goal is met.
    GoalReached,
}

/// Fitness reply delivered for one actuation.
#[derive(Debug, Clone)]
pub struct ScapeResponse {
    pub fitness: Vec<f64>,
    pub end_flag: EndFlag,
}

impl ScapeResponse {
    pub fn cont(fitness: Vec<f64>) -> Self {
        ScapeResponse {
            fitness,
            end_flag: EndFlag::Continue,
        }
    }

    pub fn halt(fitness: Vec<f64>) -> Self {
        ScapeResponse {
            fitness,
            end_flag: EndFlag::Halt,
        }
    }
}

/// An environment. Implementations are stateful; the mesh serializes access
/// through a mutex so `&mut self` methods are safe.
pub trait Scape: Send {
    /// Produce the sensory vector for one sensor (length `sensor.vl`).
    fn sense(&mut self, sensor: &Sensor) -> Vec<f64>;

    /// Apply an actuator's output and reply with fitness and an end flag.
    fn actuate(&mut self, actuator: &Actuator, output: &[f64]) -> ScapeResponse;

    /// Return to the initial state for the next evaluation attempt.
    fn reset(&mut self) {}
}

/// Shared handle to one scape instance.
pub type ScapeHandle = Arc<Mutex<Box<dyn Scape>>>;

/// How a named scape is provisioned.
#[derive(Clone)]
pub enum ScapeProvider {
    /// A fresh instance per agent.
    Private(Arc<dyn Fn() -> Box<dyn Scape> + Send + Sync>),
    /// One shared instance.
    Public(ScapeHandle),
}

/// Name → scape provider map for the run.
#[derive(Default, Clone)]
pub struct ScapeRegistry {
    inner: Arc<RwLock<AHashMap<String, ScapeProvider>>>,
}

impl ScapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_private<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Scape> + Send + Sync + 'static,
    {
        self.inner
            .write()
            .insert(name.into(), ScapeProvider::Private(Arc::new(factory)));
    }

    pub fn register_public(&self, name: impl Into<String>, scape: Box<dyn Scape>) {
        self.inner
            .write()
            .insert(name.into(), ScapeProvider::Public(Arc::new(Mutex::new(scape))));
    }

    /// Resolve a scape binding for one agent. Private bindings instantiate
    /// once per `(agent, name)`; the caller caches the handle so every
    /// adapter of the agent shares it.
    pub fn provision(&self, scape_ref: &ScapeRef) -> Result<ScapeHandle> {
        let name = scape_ref.name();
        let provider = self
            .inner
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| MeshError::UnknownScape(name.to_string()))?;
        Ok(match provider {
            ScapeProvider::Private(factory) => Arc::new(Mutex::new(factory())),
            ScapeProvider::Public(handle) => handle,
        })
    }
}
