//! Two long-lived async pipelines, one for `RunTask` and one for
//! `EvaluateModel`, each with a submission side that never blocks on the
//! network and a single digest worker that drains completions in FIFO
//! completion order.

pub mod client;
mod pipeline;

use crate::{common::LearnerId, state::SharedState};
use client::{EvaluateModelRequest, EvaluateModelResponse, LearnerClient, RunTaskRequest, RunTaskResponse, TransportError};
use pipeline::Pipeline;
use std::sync::Arc;

struct RunTaskOutcome {
    learner_id: LearnerId,
    result: Result<RunTaskResponse, TransportError>,
}

struct EvalTaskOutcome {
    learner_id: LearnerId,
    ref_idx: usize,
    result: Result<EvaluateModelResponse, TransportError>,
}

pub struct Dispatcher {
    run_tasks: Pipeline<RunTaskOutcome>,
    eval_tasks: Pipeline<EvalTaskOutcome>,
}

impl Dispatcher {
    pub fn new(shared: Arc<SharedState>) -> Self {
        let run_tasks = Pipeline::new(move |outcome: RunTaskOutcome| async move {
            match outcome.result {
                Ok(_) => {}
                Err(err) => {
                    warn!(
                        "run_task failed for learner {}: {}",
                        outcome.learner_id, err.message
                    );
                }
            }
        });

        let eval_tasks = Pipeline::new(move |outcome: EvalTaskOutcome| {
            let shared = Arc::clone(&shared);
            async move {
                match outcome.result {
                    Err(err) => {
                        warn!(
                            "evaluate_model failed for learner {}: {}",
                            outcome.learner_id, err.message
                        );
                    }
                    Ok(response) => {
                        let mut learners = shared.learners.lock().await;
                        // A removed learner's late reply is discarded
                        // silently: the registry lookup below is the guard.
                        if !learners.contains(&outcome.learner_id) {
                            return;
                        }
                        if let Some(row) = learners.evaluation_lineage.get_mut(outcome.ref_idx) {
                            row.evaluations
                                .insert(outcome.learner_id, response.evaluations);
                        }
                    }
                }
            }
        });

        Self {
            run_tasks,
            eval_tasks,
        }
    }

    /// Fan out a `RunTask` call to every learner in `targets`. Never blocks
    /// on the network: each call is handed to the pipeline as a
    /// not-yet-polled future.
    pub fn send_run_task_async(
        &self,
        targets: &[(LearnerId, Arc<dyn LearnerClient>, RunTaskRequest)],
    ) {
        for (learner_id, connection, request) in targets.iter().cloned() {
            let connection = Arc::clone(&connection);
            self.run_tasks.submit(async move {
                let result = connection.run_task(request).await;
                RunTaskOutcome { learner_id, result }
            });
        }
    }

    /// Fan out an `EvaluateModel` call to every learner in `targets`,
    /// tagging each in-flight call with the `ref_idx` of the
    /// `CommunityModelEvaluation` row it should populate.
    pub fn send_evaluation_task_async(
        &self,
        ref_idx: usize,
        targets: &[(LearnerId, Arc<dyn LearnerClient>, EvaluateModelRequest)],
    ) {
        for (learner_id, connection, request) in targets.iter().cloned() {
            let connection = Arc::clone(&connection);
            self.eval_tasks.submit(async move {
                let result = connection.evaluate_model(request).await;
                EvalTaskOutcome {
                    learner_id,
                    ref_idx,
                    result,
                }
            });
        }
    }

    /// Shut down both completion queues: causes both digest workers to
    /// drain in-flight calls and exit.
    pub async fn shutdown(&self) {
        self.run_tasks.shutdown().await;
        self.eval_tasks.shutdown().await;
    }
}
