// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Activation (transfer) functions.
//!
//! The genotype stores activation *tags*, never function pointers; the tag is
//! resolved to its kernel through [`ActivationFunction::apply`]. Adding a new
//! function means adding a variant here and listing it in the constraint
//! palette of the species that may use it.

use serde::{Deserialize, Serialize};

/// Activation function tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    Tanh,
    Sigmoid,
    Sin,
    Cos,
    Abs,
    Sgn,
    Linear,
    Relu,
    Gaussian,
    Sqrt,
    Log,
    Quadratic,
}

impl ActivationFunction {
    /// Apply the transfer function to the aggregated input.
    ///
    /// Every variant is total: singular points (`log(0)`, `sqrt` of a
    /// negative) are defined by sign-preserving extension so a neuron never
    /// emits NaN into the mesh.
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            ActivationFunction::Sin => x.sin(),
            ActivationFunction::Cos => x.cos(),
            ActivationFunction::Abs => x.abs(),
            ActivationFunction::Sgn => {
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            ActivationFunction::Linear => x,
            ActivationFunction::Relu => x.max(0.0),
            ActivationFunction::Gaussian => (-(x * x)).exp(),
            ActivationFunction::Sqrt => x.signum() * x.abs().sqrt(),
            ActivationFunction::Log => {
                if x == 0.0 {
                    0.0
                } else {
                    x.signum() * x.abs().ln().max(0.0)
                }
            }
            ActivationFunction::Quadratic => x.signum() * x * x,
        }
    }

    /// The standard palette used by neural-encoded species.
    pub fn standard_set() -> Vec<ActivationFunction> {
        vec![
            ActivationFunction::Tanh,
            ActivationFunction::Sigmoid,
            ActivationFunction::Sin,
            ActivationFunction::Cos,
            ActivationFunction::Gaussian,
            ActivationFunction::Abs,
            ActivationFunction::Linear,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationFunction::Tanh => "tanh",
            ActivationFunction::Sigmoid => "sigmoid",
            ActivationFunction::Sin => "sin",
            ActivationFunction::Cos => "cos",
            ActivationFunction::Abs => "abs",
            ActivationFunction::Sgn => "sgn",
            ActivationFunction::Linear => "linear",
            ActivationFunction::Relu => "relu",
            ActivationFunction::Gaussian => "gaussian",
            ActivationFunction::Sqrt => "sqrt",
            ActivationFunction::Log => "log",
            ActivationFunction::Quadratic => "quadratic",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tanh_reference_value() {
        let out = ActivationFunction::Tanh.apply(0.62);
        assert!((out - 0.62_f64.tanh()).abs() < 1e-12);
    }

    #[test]
    fn test_sigmoid_bounds() {
        for x in [-100.0, -1.0, 0.0, 1.0, 100.0] {
            let y = ActivationFunction::Sigmoid.apply(x);
            assert!(y >= 0.0 && y <= 1.0, "sigmoid({}) = {}", x, y);
        }
    }

    #[test]
    fn test_sgn_branches() {
        assert_eq!(ActivationFunction::Sgn.apply(3.2), 1.0);
        assert_eq!(ActivationFunction::Sgn.apply(-0.1), -1.0);
        assert_eq!(ActivationFunction::Sgn.apply(0.0), 0.0);
    }

    #[test]
    fn test_singular_points_are_finite() {
        for af in [
            ActivationFunction::Sqrt,
            ActivationFunction::Log,
            ActivationFunction::Gaussian,
        ] {
            for x in [-10.0, -1.0, 0.0, 1e-9, 10.0] {
                assert!(af.apply(x).is_finite(), "{:?}({}) not finite", af, x);
            }
        }
    }
}
