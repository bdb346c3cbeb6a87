// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Plasticity rules: how a synaptic weight changes after each activation.
//!
//! A rule owns two parameter vectors:
//! - *neural parameters*, stored once per neuron,
//! - *weight parameters*, stored per synaptic weight.
//!
//! The modulated rules read an additional scalar aggregated from the
//! neuron's modulatory input channel; unmodulated rules ignore it.
//! All updated weights saturate at [`WEIGHT_SAT_LIMIT`].

use serde::{Deserialize, Serialize};

use crate::random::{gaussian, random_f64};
use crate::utils::{saturate, WEIGHT_SAT_LIMIT};

/// Plasticity rule tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlasticityFunction {
    /// Weights are constant.
    None,
    /// `Δw = η · pre · post` with a per-neuron learning rate.
    Hebbian,
    /// Hebbian with a per-weight learning rate.
    HebbianW,
    /// `Δw = η · post · (pre − post · w)` (self-normalizing Hebbian).
    Oja,
    /// ABCN update gated by the modulatory channel; `A` fixed at 0.1.
    SelfModulationV1,
    /// As V1 with an evolvable per-neuron `A`.
    SelfModulationV2,
    /// Evolvable per-neuron `A, B`.
    SelfModulationV3,
    /// Evolvable per-neuron `A, B, C`.
    SelfModulationV4,
    /// Evolvable per-neuron `A, B, C, D`.
    SelfModulationV5,
    /// Per-neuron `A, B, C`; per-weight `η, D`.
    SelfModulationV6,
    /// Full ABCN with every coefficient held per weight.
    Neuromodulation,
    /// The update arrives as an explicit delta from outside the neuron
    /// (substrate connection-expression points). The rule itself is inert.
    Iterative,
}

fn rand_coeff() -> f64 {
    (random_f64() - 0.5) * 2.0
}

impl PlasticityFunction {
    /// Per-weight parameter seed for a newly created synaptic weight.
    pub fn weight_parameters(&self) -> Vec<f64> {
        match self {
            PlasticityFunction::None
            | PlasticityFunction::Hebbian
            | PlasticityFunction::Oja
            | PlasticityFunction::Iterative => vec![],
            PlasticityFunction::HebbianW
            | PlasticityFunction::SelfModulationV1
            | PlasticityFunction::SelfModulationV2
            | PlasticityFunction::SelfModulationV3
            | PlasticityFunction::SelfModulationV4
            | PlasticityFunction::SelfModulationV5 => vec![rand_coeff()],
            PlasticityFunction::SelfModulationV6 => vec![rand_coeff(), rand_coeff()],
            PlasticityFunction::Neuromodulation => {
                vec![rand_coeff(), rand_coeff(), rand_coeff(), rand_coeff(), rand_coeff()]
            }
        }
    }

    /// Per-neuron parameter seed.
    pub fn neural_parameters(&self) -> Vec<f64> {
        match self {
            PlasticityFunction::None
            | PlasticityFunction::HebbianW
            | PlasticityFunction::SelfModulationV1
            | PlasticityFunction::Neuromodulation
            | PlasticityFunction::Iterative => vec![],
            PlasticityFunction::Hebbian | PlasticityFunction::Oja => vec![rand_coeff()],
            PlasticityFunction::SelfModulationV2 => vec![rand_coeff()],
            PlasticityFunction::SelfModulationV3 => vec![rand_coeff(), rand_coeff()],
            PlasticityFunction::SelfModulationV4 | PlasticityFunction::SelfModulationV6 => {
                vec![rand_coeff(), rand_coeff(), rand_coeff()]
            }
            PlasticityFunction::SelfModulationV5 => {
                vec![rand_coeff(), rand_coeff(), rand_coeff(), rand_coeff()]
            }
        }
    }

    /// True when the rule reads the neuron's modulatory input channel.
    pub fn needs_modulation(&self) -> bool {
        matches!(
            self,
            PlasticityFunction::SelfModulationV1
                | PlasticityFunction::SelfModulationV2
                | PlasticityFunction::SelfModulationV3
                | PlasticityFunction::SelfModulationV4
                | PlasticityFunction::SelfModulationV5
                | PlasticityFunction::SelfModulationV6
                | PlasticityFunction::Neuromodulation
        )
    }

    /// Apply one post-activation update to a single weight.
    ///
    /// `pre` is the weight's input component, `post` the neuron's output,
    /// `modulation` the aggregated modulatory scalar (zero when the channel
    /// is absent).
    pub fn update_weight(
        &self,
        neural: &[f64],
        w: f64,
        weight_params: &[f64],
        pre: f64,
        post: f64,
        modulation: f64,
    ) -> f64 {
        let p = |xs: &[f64], i: usize| xs.get(i).copied().unwrap_or(0.0);
        let delta = match self {
            PlasticityFunction::None | PlasticityFunction::Iterative => 0.0,
            PlasticityFunction::Hebbian => p(neural, 0) * pre * post,
            PlasticityFunction::HebbianW => p(weight_params, 0) * pre * post,
            PlasticityFunction::Oja => p(neural, 0) * post * (pre - post * w),
            PlasticityFunction::SelfModulationV1 => {
                modulation * p(weight_params, 0) * (0.1 * pre * post)
            }
            PlasticityFunction::SelfModulationV2 => {
                modulation * p(weight_params, 0) * (p(neural, 0) * pre * post)
            }
            PlasticityFunction::SelfModulationV3 => {
                modulation
                    * p(weight_params, 0)
                    * (p(neural, 0) * pre * post + p(neural, 1) * pre)
            }
            PlasticityFunction::SelfModulationV4 => {
                modulation
                    * p(weight_params, 0)
                    * (p(neural, 0) * pre * post + p(neural, 1) * pre + p(neural, 2) * post)
            }
            PlasticityFunction::SelfModulationV5 => {
                modulation
                    * p(weight_params, 0)
                    * (p(neural, 0) * pre * post
                        + p(neural, 1) * pre
                        + p(neural, 2) * post
                        + p(neural, 3))
            }
            PlasticityFunction::SelfModulationV6 => {
                modulation
                    * p(weight_params, 0)
                    * (p(neural, 0) * pre * post
                        + p(neural, 1) * pre
                        + p(neural, 2) * post
                        + p(weight_params, 1))
            }
            PlasticityFunction::Neuromodulation => {
                modulation
                    * p(weight_params, 4)
                    * (p(weight_params, 0) * pre * post
                        + p(weight_params, 1) * pre
                        + p(weight_params, 2) * post
                        + p(weight_params, 3))
            }
        };
        saturate(w + delta, WEIGHT_SAT_LIMIT)
    }

    /// Perturb a parameter vector in place: each entry is hit with
    /// probability `1/sqrt(len)` by a gaussian step scaled by `spread`.
    pub fn perturb_parameters(params: &mut [f64], spread: f64) {
        if params.is_empty() {
            return;
        }
        let mp = 1.0 / (params.len() as f64).sqrt();
        for p in params.iter_mut() {
            if random_f64() < mp {
                *p = saturate(*p + gaussian() * spread, WEIGHT_SAT_LIMIT);
            }
        }
    }

    pub fn standard_set() -> Vec<PlasticityFunction> {
        vec![PlasticityFunction::None]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlasticityFunction::None => "none",
            PlasticityFunction::Hebbian => "hebbian",
            PlasticityFunction::HebbianW => "hebbian_w",
            PlasticityFunction::Oja => "oja",
            PlasticityFunction::SelfModulationV1 => "self_modulation_v1",
            PlasticityFunction::SelfModulationV2 => "self_modulation_v2",
            PlasticityFunction::SelfModulationV3 => "self_modulation_v3",
            PlasticityFunction::SelfModulationV4 => "self_modulation_v4",
            PlasticityFunction::SelfModulationV5 => "self_modulation_v5",
            PlasticityFunction::SelfModulationV6 => "self_modulation_v6",
            PlasticityFunction::Neuromodulation => "neuromodulation",
            PlasticityFunction::Iterative => "iterative",
        }
    }
}
