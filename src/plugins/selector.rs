use crate::common::LearnerId;

/// Picks which of the scheduled learners' models actually contribute to
/// aggregation.
pub trait Selector: Send + Sync {
    fn select(&self, to_schedule: &[LearnerId], all_learners: &[LearnerId]) -> Vec<LearnerId>;
}

/// Returns `to_schedule` unchanged: the "scheduled cardinality" reference
/// variant.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScheduledCardinalitySelector;

impl Selector for ScheduledCardinalitySelector {
    fn select(&self, to_schedule: &[LearnerId], _all_learners: &[LearnerId]) -> Vec<LearnerId> {
        to_schedule.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_the_scheduled_set() {
        let l1 = LearnerId::generate("l1", 1);
        let l2 = LearnerId::generate("l2", 2);
        let scheduled = vec![l1, l2];
        let all = vec![l1, l2, LearnerId::generate("l3", 3)];
        assert_eq!(
            ScheduledCardinalitySelector.select(&scheduled, &all),
            scheduled
        );
    }
}
