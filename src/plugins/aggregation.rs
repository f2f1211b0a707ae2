use crate::model::{FederatedModel, Model};
use bytes::Bytes;

/// Combines a set of `(local model, scaling factor)` pairs into a new
/// community model. Pure and deterministic in its inputs; must set
/// `num_contributors = len(input)` and leave `global_iteration` for the
/// caller to stamp.
pub trait AggregationFunction: Send + Sync {
    fn aggregate(&self, inputs: &[(Model, f64)]) -> FederatedModel;
}

fn decode(model: &Model) -> Vec<f32> {
    model
        .0
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn encode(values: &[f32]) -> Model {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    Model(Bytes::from(bytes))
}

/// The weighted-average aggregation rule (`FedAvg`).
///
/// Treats each model as a flat vector of little-endian `f32` parameters; the
/// concrete tensor codec a production deployment would use is out of scope
/// here, so this decoding is purely illustrative.
#[derive(Debug, Default, Clone, Copy)]
pub struct FedAvg;

impl AggregationFunction for FedAvg {
    fn aggregate(&self, inputs: &[(Model, f64)]) -> FederatedModel {
        let num_contributors = inputs.len() as u32;
        if inputs.is_empty() {
            return FederatedModel {
                model: Model::default(),
                num_contributors,
                global_iteration: 0,
                initialized: false,
            };
        }

        let len = inputs
            .iter()
            .map(|(model, _)| decode(model).len())
            .max()
            .unwrap_or(0);
        let mut acc = vec![0f32; len];
        for (model, factor) in inputs {
            let values = decode(model);
            for (i, v) in values.iter().enumerate() {
                acc[i] += (*v as f64 * factor) as f32;
            }
        }

        FederatedModel {
            model: encode(&acc),
            num_contributors,
            global_iteration: 0,
            initialized: true,
        }
    }
}

/// A marker type standing in for an externally-supplied homomorphic
/// encryption scheme handle. Its internals (key management, ciphertext
/// operations) are out of scope here; [`PrivacyPreservingWeightedAvg`] only
/// needs to know that one was supplied.
#[derive(Debug, Clone)]
pub struct FheSchemeHandle {
    pub scheme_name: String,
}

/// A privacy-preserving variant of [`FedAvg`] that consumes an externally
/// supplied encryption scheme handle (`Pwa`).
///
/// The reference numerical recipe is identical to [`FedAvg`] here: the
/// encrypted-domain arithmetic this rule would perform in production is
/// left unspecified.
pub struct PrivacyPreservingWeightedAvg {
    pub fhe_scheme: FheSchemeHandle,
}

impl AggregationFunction for PrivacyPreservingWeightedAvg {
    fn aggregate(&self, inputs: &[(Model, f64)]) -> FederatedModel {
        FedAvg.aggregate(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_of(values: &[f32]) -> Model {
        encode(values)
    }

    #[test]
    fn weighted_average_of_two_models() {
        let inputs = vec![
            (model_of(&[1.0, 2.0]), 0.5),
            (model_of(&[3.0, 4.0]), 0.5),
        ];
        let result = FedAvg.aggregate(&inputs);
        assert_eq!(result.num_contributors, 2);
        assert!(result.initialized);
        let decoded = decode(&result.model);
        assert!((decoded[0] - 2.0).abs() < 1e-4);
        assert!((decoded[1] - 3.0).abs() < 1e-4);
    }

    #[test]
    fn empty_input_is_uninitialized() {
        let result = FedAvg.aggregate(&[]);
        assert_eq!(result.num_contributors, 0);
        assert!(!result.initialized);
    }
}
