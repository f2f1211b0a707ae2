use crate::{common::LearnerId, model::CompletedLearningTask};

/// Decides, on every completion, whether the current round is finished and
/// who should train next. Returns an empty vector to mean "no round yet":
/// the round engine interprets that as "keep waiting."
///
/// The round's bookkeeping (`assigned`/`completed_so_far`) is handed in
/// explicitly rather than read back from Controller state, so implementations
/// stay pure and side-effect free.
pub trait Scheduler: Send + Sync {
    fn schedule_next(
        &self,
        just_completed: LearnerId,
        completed_task: &CompletedLearningTask,
        assigned: &[LearnerId],
        completed_so_far: &[LearnerId],
        all_learners: &[LearnerId],
    ) -> Vec<LearnerId>;
}

/// Waits until every learner assigned to the current round has reported,
/// then schedules every registered learner for the next round. Used for
/// both the `Synchronous` and `SemiSynchronous` protocols.
#[derive(Debug, Default, Clone, Copy)]
pub struct SynchronousScheduler;

impl Scheduler for SynchronousScheduler {
    fn schedule_next(
        &self,
        _just_completed: LearnerId,
        _completed_task: &CompletedLearningTask,
        assigned: &[LearnerId],
        completed_so_far: &[LearnerId],
        all_learners: &[LearnerId],
    ) -> Vec<LearnerId> {
        let all_assigned_done = assigned
            .iter()
            .all(|id| completed_so_far.contains(id));
        if assigned.is_empty() || !all_assigned_done {
            return Vec::new();
        }
        all_learners.to_vec()
    }
}

/// Schedules the very learner that just completed, immediately, regardless
/// of anyone else's progress (`Asynchronous`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AsynchronousScheduler;

impl Scheduler for AsynchronousScheduler {
    fn schedule_next(
        &self,
        just_completed: LearnerId,
        _completed_task: &CompletedLearningTask,
        _assigned: &[LearnerId],
        _completed_so_far: &[LearnerId],
        _all_learners: &[LearnerId],
    ) -> Vec<LearnerId> {
        vec![just_completed]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExecutionMetadata, Model};

    fn task(global_iteration: u32) -> CompletedLearningTask {
        CompletedLearningTask {
            model: Model::default(),
            execution_metadata: ExecutionMetadata {
                global_iteration,
                processing_ms_per_batch: 1.0,
                processing_ms_per_epoch: 1.0,
            },
        }
    }

    #[test]
    fn asynchronous_always_schedules_the_completer() {
        let l1 = LearnerId::generate("l1", 1);
        let result = AsynchronousScheduler.schedule_next(l1, &task(1), &[], &[], &[]);
        assert_eq!(result, vec![l1]);
    }

    #[test]
    fn synchronous_waits_for_all_assigned() {
        let l1 = LearnerId::generate("l1", 1);
        let l2 = LearnerId::generate("l2", 2);
        let assigned = vec![l1, l2];
        let all = vec![l1, l2];

        let still_waiting =
            SynchronousScheduler.schedule_next(l1, &task(1), &assigned, &[l1], &all);
        assert!(still_waiting.is_empty());

        let ready =
            SynchronousScheduler.schedule_next(l2, &task(1), &assigned, &[l1, l2], &all);
        assert_eq!(ready, all);
    }
}
