use crate::{common::LearnerId, model::FederatedModel};
use std::collections::HashMap;

/// Computes the per-learner weight used when aggregating local models.
/// Pure: must return exactly one non-negative factor per input id.
pub trait ScalingFunction: Send + Sync {
    fn compute_scaling_factors(
        &self,
        community_model: &FederatedModel,
        participating_dataset_sizes: &HashMap<LearnerId, u32>,
    ) -> HashMap<LearnerId, f64>;
}

/// Weighs each learner by the number of training examples it reported at
/// admission, relative to the total across all participants.
#[derive(Debug, Default, Clone, Copy)]
pub struct DatasetSizeScaling;

impl ScalingFunction for DatasetSizeScaling {
    fn compute_scaling_factors(
        &self,
        _community_model: &FederatedModel,
        participating_dataset_sizes: &HashMap<LearnerId, u32>,
    ) -> HashMap<LearnerId, f64> {
        let total: u64 = participating_dataset_sizes
            .values()
            .map(|&n| u64::from(n))
            .sum();
        if total == 0 {
            let share = if participating_dataset_sizes.is_empty() {
                0.0
            } else {
                1.0 / participating_dataset_sizes.len() as f64
            };
            return participating_dataset_sizes
                .keys()
                .map(|&id| (id, share))
                .collect();
        }
        participating_dataset_sizes
            .iter()
            .map(|(&id, &n)| (id, n as f64 / total as f64))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> FederatedModel {
        FederatedModel::seed(crate::model::Model::default())
    }

    #[test]
    fn weights_proportional_to_dataset_size() {
        let l1 = LearnerId::generate("l1", 1);
        let l2 = LearnerId::generate("l2", 2);
        let mut sizes = HashMap::new();
        sizes.insert(l1, 100);
        sizes.insert(l2, 300);

        let factors = DatasetSizeScaling.compute_scaling_factors(&model(), &sizes);
        assert_eq!(factors.len(), 2);
        assert!((factors[&l1] - 0.25).abs() < 1e-9);
        assert!((factors[&l2] - 0.75).abs() < 1e-9);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let factors = DatasetSizeScaling.compute_scaling_factors(&model(), &HashMap::new());
        assert!(factors.is_empty());
    }
}
