//! Turns "a learner has completed a task" into "select participants,
//! compute community model, dispatch evaluation, dispatch next training
//! round." Invoked only from Scheduling Pool jobs, never on the caller's
//! task.

use crate::{
    common::LearnerId,
    dispatch::{
        client::{EvaluateModelRequest, EvaluationDataset, Hyperparameters, RunTaskRequest, TaskSpec},
        Dispatcher,
    },
    model::{CommunityModelEvaluation, CompletedLearningTask, FederatedModel, FederatedTaskRuntimeMetadata, LearningTaskTemplate, Model},
    params::{ControllerParams, Protocol},
    plugins::{AggregationFunction, ScalingFunction, Scheduler, Selector},
    state::SharedState,
};
use chrono::Utc;
use std::{collections::HashMap, sync::Arc};

pub struct RoundEngine {
    shared: Arc<SharedState>,
    dispatcher: Arc<Dispatcher>,
    scaler: Arc<dyn ScalingFunction>,
    aggregator: Arc<dyn AggregationFunction>,
    scheduler: Arc<dyn Scheduler>,
    selector: Arc<dyn Selector>,
    params: ControllerParams,
}

impl RoundEngine {
    pub fn new(
        shared: Arc<SharedState>,
        dispatcher: Arc<Dispatcher>,
        scaler: Arc<dyn ScalingFunction>,
        aggregator: Arc<dyn AggregationFunction>,
        scheduler: Arc<dyn Scheduler>,
        selector: Arc<dyn Selector>,
        params: ControllerParams,
    ) -> Self {
        Self {
            shared,
            dispatcher,
            scaler,
            aggregator,
            scheduler,
            selector,
            params,
        }
    }

    fn build_run_task_request(&self, model: &FederatedModel, global_iteration: u32, template: LearningTaskTemplate) -> RunTaskRequest {
        RunTaskRequest {
            federated_model: model.clone(),
            task: TaskSpec {
                global_iteration,
                num_local_updates: template.num_local_updates,
                percent_validation: self.params.model_hyperparams.percent_validation,
            },
            hyperparameters: Hyperparameters {
                batch_size: self.params.model_hyperparams.batch_size,
                optimizer: self.params.model_hyperparams.optimizer,
            },
        }
    }

    fn build_evaluate_request(&self, model: &FederatedModel) -> EvaluateModelRequest {
        EvaluateModelRequest {
            model: model.clone(),
            batch_size: self.params.model_hyperparams.batch_size,
            evaluation_datasets: [
                EvaluationDataset::Training,
                EvaluationDataset::Validation,
                EvaluationDataset::Test,
            ],
        }
    }

    /// First admission for a newly registered learner. Returns silently if
    /// no community model has been seeded yet.
    pub async fn schedule_initial_task(&self, id: LearnerId) {
        let mut learners = self.shared.learners.lock().await;
        if !learners.community_model.initialized {
            return;
        }

        if learners.runtime_lineage.is_empty() {
            learners.global_iteration = 1;
            learners
                .runtime_lineage
                .push(FederatedTaskRuntimeMetadata::new(1, Vec::new()));
        }
        if let Some(row) = learners.runtime_lineage.last_mut() {
            row.assigned_to_learner_id.push(id);
        }

        let community_model = learners.community_model.clone();
        let global_iteration = learners.global_iteration;
        let connection = learners.connection(&id);
        let template = learners.task_template(&id);
        drop(learners);

        if let (Some(connection), Some(template)) = (connection, template) {
            let request = self.build_run_task_request(&community_model, global_iteration, template);
            self.dispatcher
                .send_run_task_async(&[(id, connection, request)]);
        }
    }

    /// Runs the full round transition triggered by one learner's completion.
    pub async fn schedule_tasks(&self, completed_id: LearnerId, completed_task: CompletedLearningTask) {
        let mut learners = self.shared.learners.lock().await;

        let g_completed = completed_task.execution_metadata.global_iteration;
        let idx = g_completed.saturating_sub(1) as usize;

        if let Some(row) = learners.runtime_lineage.get_mut(idx) {
            row.completed_by_learner_id.push(completed_id);
        }

        learners.set_latest_model(&completed_id, completed_task.model.clone());
        learners.push_local_task(&completed_id, completed_task.execution_metadata);

        let (assigned, completed_so_far) = match learners.runtime_lineage.get(idx) {
            Some(row) => (row.assigned_to_learner_id.clone(), row.completed_by_learner_id.clone()),
            None => (Vec::new(), Vec::new()),
        };
        let all_ids = learners.all_ids();

        let to_schedule = self.scheduler.schedule_next(
            completed_id,
            &completed_task,
            &assigned,
            &completed_so_far,
            &all_ids,
        );
        if to_schedule.is_empty() {
            return;
        }

        if let Some(row) = learners.runtime_lineage.get_mut(idx) {
            row.completed_at = Some(Utc::now());
        }

        let selected = self.selector.select(&to_schedule, &all_ids);

        let mut participating_models: Vec<(LearnerId, Model)> = Vec::new();
        let mut dataset_sizes: HashMap<LearnerId, u32> = HashMap::new();
        for id in &selected {
            if let Some(model) = learners.latest_model(id) {
                if !model.is_empty() {
                    if let Some(descriptor) = learners.descriptors.get(id) {
                        dataset_sizes.insert(*id, descriptor.dataset_spec.num_training_examples);
                    }
                    participating_models.push((*id, model));
                }
            }
        }

        let mut new_cm = if learners.community_model.initialized
            && (learners.global_iteration < 2 || participating_models.is_empty())
        {
            learners.community_model.clone()
        } else {
            let factors = self
                .scaler
                .compute_scaling_factors(&learners.community_model, &dataset_sizes);
            let inputs: Vec<(Model, f64)> = participating_models
                .iter()
                .map(|(id, model)| (model.clone(), *factors.get(id).unwrap_or(&0.0)))
                .collect();
            self.aggregator.aggregate(&inputs)
        };
        new_cm.global_iteration = g_completed;
        learners.community_model = new_cm.clone();

        learners
            .evaluation_lineage
            .push(CommunityModelEvaluation::new(g_completed));
        let ref_idx = learners.evaluation_lineage.len() - 1;

        let eval_targets: Vec<_> = to_schedule
            .iter()
            .filter_map(|id| {
                let connection = learners.connection(id)?;
                Some((*id, connection, self.build_evaluate_request(&new_cm)))
            })
            .collect();

        learners.global_iteration = g_completed + 1;
        let global_iteration = learners.global_iteration;
        learners.runtime_lineage.push(FederatedTaskRuntimeMetadata::new(
            global_iteration,
            to_schedule.clone(),
        ));

        if self.params.communication_specs.protocol == Protocol::SemiSynchronous
            && (learners.global_iteration == 2
                || self
                    .params
                    .communication_specs
                    .protocol_specs
                    .semi_sync_recompute_num_updates)
        {
            let mut slowest_ms_per_epoch = 0f64;
            for id in &to_schedule {
                if let Some(latest) = learners
                    .local_task_lineage
                    .get(id)
                    .and_then(|lineage| lineage.front())
                {
                    if latest.processing_ms_per_epoch > slowest_ms_per_epoch {
                        slowest_ms_per_epoch = latest.processing_ms_per_epoch;
                    }
                }
            }
            let t_max = self.params.communication_specs.protocol_specs.semi_sync_lambda
                * slowest_ms_per_epoch;
            for id in &to_schedule {
                if let Some(latest) = learners
                    .local_task_lineage
                    .get(id)
                    .and_then(|lineage| lineage.front())
                    .copied()
                {
                    if latest.processing_ms_per_batch > 0.0 {
                        let num_local_updates =
                            (t_max / latest.processing_ms_per_batch).ceil() as u32;
                        learners.set_task_template(id, LearningTaskTemplate { num_local_updates });
                    }
                }
            }
        }

        let run_targets: Vec<_> = to_schedule
            .iter()
            .filter_map(|id| {
                let connection = learners.connection(id)?;
                let template = learners.task_template(id)?;
                Some((
                    *id,
                    connection,
                    self.build_run_task_request(&new_cm, global_iteration, template),
                ))
            })
            .collect();

        drop(learners);

        self.dispatcher.send_evaluation_task_async(ref_idx, &eval_targets);
        self.dispatcher.send_run_task_async(&run_targets);
    }
}
