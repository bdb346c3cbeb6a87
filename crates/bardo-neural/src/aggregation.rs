// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Input aggregation functions.
//!
//! A neuron's inbound signals arrive as one vector per source. Aggregation
//! reduces the ordered `(input, weight)` pairs to the scalar handed to the
//! activation function. The per-source ordering is canonical: callers must
//! pass inputs and weights in the same order the neuron's input list defines.

use serde::{Deserialize, Serialize};

/// Aggregation function tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationFunction {
    /// Standard weighted sum over every input component.
    DotProduct,
    /// Product of the weighted components. A single near-zero component
    /// gates the whole neuron, which makes this useful as a soft AND.
    MultProduct,
    /// Weighted sum over *temporal differences*: each component contributes
    /// `(x - x_prev) * w`, where `x_prev` is the same source's component
    /// from the previous cycle (zero on the first cycle).
    DiffProduct,
}

impl AggregationFunction {
    /// Reduce per-source input vectors against per-source weight vectors.
    ///
    /// `inputs[i]` and `weights[i]` belong to the i-th entry of the neuron's
    /// input list and must have equal lengths. `prev` carries the previous
    /// cycle's input vectors for `diff_product`; it is ignored by the other
    /// variants and may be empty on the first cycle.
    pub fn aggregate(&self, inputs: &[Vec<f64>], weights: &[Vec<f64>], prev: &[Vec<f64>]) -> f64 {
        debug_assert_eq!(inputs.len(), weights.len());
        match self {
            AggregationFunction::DotProduct => {
                let mut acc = 0.0;
                for (xs, ws) in inputs.iter().zip(weights.iter()) {
                    debug_assert_eq!(xs.len(), ws.len());
                    for (x, w) in xs.iter().zip(ws.iter()) {
                        acc += x * w;
                    }
                }
                acc
            }
            AggregationFunction::MultProduct => {
                let mut acc = 1.0;
                for (xs, ws) in inputs.iter().zip(weights.iter()) {
                    for (x, w) in xs.iter().zip(ws.iter()) {
                        acc *= x * w;
                    }
                }
                acc
            }
            AggregationFunction::DiffProduct => {
                let mut acc = 0.0;
                for (i, (xs, ws)) in inputs.iter().zip(weights.iter()).enumerate() {
                    for (j, (x, w)) in xs.iter().zip(ws.iter()).enumerate() {
                        let last = prev.get(i).and_then(|v| v.get(j)).copied().unwrap_or(0.0);
                        acc += (x - last) * w;
                    }
                }
                acc
            }
        }
    }

    pub fn standard_set() -> Vec<AggregationFunction> {
        vec![AggregationFunction::DotProduct]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationFunction::DotProduct => "dot_product",
            AggregationFunction::MultProduct => "mult_product",
            AggregationFunction::DiffProduct => "diff_product",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_product() {
        let inputs = vec![vec![0.8, 0.4]];
        let weights = vec![vec![0.5, 0.3]];
        let acc = AggregationFunction::DotProduct.aggregate(&inputs, &weights, &[]);
        assert!((acc - 0.52).abs() < 1e-12);
    }

    #[test]
    fn test_mult_product() {
        let inputs = vec![vec![2.0], vec![3.0]];
        let weights = vec![vec![0.5], vec![1.0]];
        let acc = AggregationFunction::MultProduct.aggregate(&inputs, &weights, &[]);
        assert!((acc - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_diff_product_first_cycle_uses_zero_memory() {
        let inputs = vec![vec![1.5]];
        let weights = vec![vec![2.0]];
        let acc = AggregationFunction::DiffProduct.aggregate(&inputs, &weights, &[]);
        assert!((acc - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_diff_product_subtracts_previous_inputs() {
        let inputs = vec![vec![1.5, 0.5]];
        let weights = vec![vec![2.0, 1.0]];
        let prev = vec![vec![1.0, 0.5]];
        let acc = AggregationFunction::DiffProduct.aggregate(&inputs, &weights, &prev);
        assert!((acc - 1.0).abs() < 1e-12);
    }
}
