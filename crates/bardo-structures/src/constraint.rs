// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Specie constraints: the palettes evolution is allowed to draw from.
//!
//! A constraint is immutable for the lifetime of a specie. Agents copy it at
//! construction and consult it whenever a mutation operator needs an
//! alternative value (a different activation function, another annealing
//! parameter, ...). The constraint stores *tags* only; kernels live in
//! `bardo-neural`.

use serde::{Deserialize, Serialize};

use bardo_neural::random::random_range;
use bardo_neural::{ActivationFunction, AggregationFunction, PlasticityFunction};

/// How the genotype maps to a phenotype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingType {
    /// The evolved graph is executed directly.
    Neural,
    /// The evolved graph paints the weights of a dense geometric substrate.
    Substrate,
}

/// What offspring inherit after a parent's tuning phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heredity {
    /// Offspring inherit the parent's pre-tuning weights.
    Darwinian,
    /// Offspring inherit the parent's tuned weights.
    Lamarckian,
}

/// Whether weight perturbation touches one neuron or a tuned selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerturbationQty {
    Single,
    Multiple,
}

/// Which neurons the tuning phase perturbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuningSelection {
    All,
    AllRandom,
    Current,
    CurrentRandom,
    Active,
    ActiveRandom,
    Dynamic,
    DynamicRandom,
}

/// Retry budget for the parametric-tuning phase of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuningDuration {
    /// Fixed number of attempts.
    Const(u32),
    /// `ceil(m · Σ len(input_weights))` over recently added neurons.
    WsizeProportional(f64),
    /// `ceil(m · count(recently added neurons))`.
    NsizeProportional(f64),
}

/// How many topological mutations one mutation pass applies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotTopologicalMutations {
    /// Uniform draw from `1..=ncount^power`.
    NCountExponential(f64),
    /// `max(1, round(ncount · m))`.
    NCountLinear(f64),
}

impl TotTopologicalMutations {
    /// Resolve the target mutation count for a network of `ncount` neurons.
    pub fn count(&self, ncount: usize) -> usize {
        let ncount = ncount.max(1);
        match self {
            TotTopologicalMutations::NCountExponential(power) => {
                let cap = (ncount as f64).powf(*power).round().max(1.0) as i64;
                random_range(1, cap + 1) as usize
            }
            TotTopologicalMutations::NCountLinear(m) => {
                ((ncount as f64 * m).round() as usize).max(1)
            }
        }
    }
}

/// Topological and parametric mutation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOperator {
    MutateWeights,
    AddBias,
    RemoveBias,
    MutateAf,
    MutatePf,
    PerturbPf,
    AddNeuron,
    Splice,
    AddInlink,
    AddOutlink,
    AddSensorlink,
    AddActuatorlink,
    AddSensor,
    AddActuator,
}

impl MutationOperator {
    /// The standard operator palette for neural-encoded species.
    pub fn standard_set() -> Vec<MutationOperator> {
        vec![
            MutationOperator::MutateWeights,
            MutationOperator::AddBias,
            MutationOperator::RemoveBias,
            MutationOperator::MutateAf,
            MutationOperator::MutatePf,
            MutationOperator::PerturbPf,
            MutationOperator::AddNeuron,
            MutationOperator::Splice,
            MutationOperator::AddInlink,
            MutationOperator::AddOutlink,
            MutationOperator::AddSensorlink,
            MutationOperator::AddActuatorlink,
            MutationOperator::AddSensor,
            MutationOperator::AddActuator,
        ]
    }
}

/// Evolution-strategy mutators: they change how an agent searches, not the
/// network topology itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyMutator {
    MutateTuningSelection,
    MutateTuningAnnealing,
    MutateTotTopologicalMutations,
    MutateHeredityType,
}

impl StrategyMutator {
    pub fn all() -> [StrategyMutator; 4] {
        [
            StrategyMutator::MutateTuningSelection,
            StrategyMutator::MutateTuningAnnealing,
            StrategyMutator::MutateTotTopologicalMutations,
            StrategyMutator::MutateHeredityType,
        ]
    }
}

/// Substrate weight-update mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstratePlasticity {
    None,
    Iterative,
    Abcn,
}

/// Substrate connection rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkform {
    /// Each substrate layer feeds the next.
    L2lFeedforward,
    /// Every neurode links to every neurode of every other layer.
    FullyInterconnected,
    /// Feedforward plus a recurrent loop through a context layer.
    JordanRecurrent,
}

/// The full palette record a specie hands to its agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Name resolved against the morphology registry of the embedding
    /// application.
    pub morphology: String,
    pub encodings: Vec<EncodingType>,
    pub neural_afs: Vec<ActivationFunction>,
    pub neural_pfs: Vec<PlasticityFunction>,
    pub neural_aggr_fs: Vec<AggregationFunction>,
    pub tuning_selection_fs: Vec<TuningSelection>,
    pub annealing_parameters: Vec<f64>,
    pub perturbation_ranges: Vec<f64>,
    pub mutation_operators: Vec<MutationOperator>,
    pub tot_topological_mutations_fs: Vec<TotTopologicalMutations>,
    pub tuning_duration_f: TuningDuration,
    pub heredity_types: Vec<Heredity>,
    pub substrate_plasticities: Vec<SubstratePlasticity>,
    pub substrate_linkforms: Vec<Linkform>,
}

impl Constraint {
    pub fn for_morphology(name: impl Into<String>) -> Self {
        Constraint {
            morphology: name.into(),
            ..Default::default()
        }
    }
}

impl Default for Constraint {
    fn default() -> Self {
        Constraint {
            morphology: String::new(),
            encodings: vec![EncodingType::Neural],
            neural_afs: ActivationFunction::standard_set(),
            neural_pfs: PlasticityFunction::standard_set(),
            neural_aggr_fs: AggregationFunction::standard_set(),
            tuning_selection_fs: vec![TuningSelection::DynamicRandom],
            annealing_parameters: vec![1.0, 0.9],
            perturbation_ranges: vec![1.0],
            mutation_operators: MutationOperator::standard_set(),
            tot_topological_mutations_fs: vec![
                TotTopologicalMutations::NCountExponential(0.5),
                TotTopologicalMutations::NCountLinear(1.0),
            ],
            tuning_duration_f: TuningDuration::WsizeProportional(0.5),
            heredity_types: vec![Heredity::Darwinian],
            substrate_plasticities: vec![SubstratePlasticity::None],
            substrate_linkforms: vec![Linkform::L2lFeedforward],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tot_mutations_linear() {
        assert_eq!(TotTopologicalMutations::NCountLinear(1.0).count(4), 4);
        assert_eq!(TotTopologicalMutations::NCountLinear(0.1).count(4), 1);
    }

    #[test]
    fn test_tot_mutations_exponential_in_range() {
        let f = TotTopologicalMutations::NCountExponential(0.5);
        for _ in 0..100 {
            let n = f.count(16);
            assert!((1..=4).contains(&n), "got {}", n);
        }
    }

    #[test]
    fn test_tot_mutations_handles_empty_network() {
        assert_eq!(TotTopologicalMutations::NCountExponential(0.5).count(0), 1);
    }

    #[test]
    fn test_default_constraint_palettes_nonempty() {
        let c = Constraint::default();
        assert!(!c.neural_afs.is_empty());
        assert!(!c.mutation_operators.is_empty());
        assert!(!c.tuning_selection_fs.is_empty());
        assert!(!c.heredity_types.is_empty());
    }
}
