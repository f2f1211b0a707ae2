//! The crate's single public entry point, wiring the learner registry, the
//! Remote Dispatcher, the Scheduling Pool, and the Round Engine's plug-ins
//! together behind one object with a clear construction and shutdown
//! lifecycle.

use crate::{
    common::{AuthToken, LearnerId},
    dispatch::{
        client::{LearnerClientFactory, LearnerClient},
        Dispatcher,
    },
    error::ControllerError,
    model::{
        CommunityModelEvaluation, CompletedLearningTask, DatasetSpec, ExecutionMetadata,
        FederatedModel, FederatedTaskRuntimeMetadata, LearnerDescriptor, LearningTaskTemplate,
        Model, ServerEntity,
    },
    params::ControllerParams,
    plugins::{AggregationFunction, ScalingFunction, Scheduler, Selector},
    pool::{SchedulingPool, DEFAULT_WORKERS},
    round_engine::RoundEngine,
    state::SharedState,
};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct Controller {
    shared: Arc<SharedState>,
    dispatcher: Arc<Dispatcher>,
    round_engine: Arc<RoundEngine>,
    pool: Mutex<Option<SchedulingPool>>,
    connector: Arc<dyn LearnerClientFactory>,
    params: ControllerParams,
}

impl Controller {
    pub fn new(
        connector: Arc<dyn LearnerClientFactory>,
        scaler: Arc<dyn ScalingFunction>,
        aggregator: Arc<dyn AggregationFunction>,
        scheduler: Arc<dyn Scheduler>,
        selector: Arc<dyn Selector>,
        params: ControllerParams,
    ) -> Self {
        let shared = Arc::new(SharedState::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&shared)));
        let round_engine = Arc::new(RoundEngine::new(
            Arc::clone(&shared),
            Arc::clone(&dispatcher),
            scaler,
            aggregator,
            scheduler,
            selector,
            params.clone(),
        ));
        let pool = SchedulingPool::new(DEFAULT_WORKERS);
        Self {
            shared,
            dispatcher,
            round_engine,
            pool: Mutex::new(Some(pool)),
            connector,
            params,
        }
    }

    fn validate_endpoint(endpoint: &ServerEntity, dataset_spec: &DatasetSpec) -> Result<(), ControllerError> {
        endpoint
            .validate()
            .map_err(ControllerError::InvalidArgument)?;
        dataset_spec
            .validate()
            .map_err(ControllerError::InvalidArgument)?;
        Ok(())
    }

    /// Empty id/token: `InvalidArgument`. Unknown id: `NotFound`. Token
    /// mismatch: `on_mismatch`, since the two callers disagree on this one:
    /// `remove_learner` reports `Unauthenticated`, `learner_completed_task`
    /// reports `PermissionDenied`.
    async fn validate_learner(
        &self,
        id: &LearnerId,
        token: &AuthToken,
        on_mismatch: ControllerError,
    ) -> Result<(), ControllerError> {
        if token.is_empty() {
            return Err(ControllerError::InvalidArgument("auth token must not be empty".to_string()));
        }
        let learners = self.shared.learners.lock().await;
        if !learners.contains(id) {
            return Err(ControllerError::NotFound);
        }
        if !learners.validate_token(id, token) {
            return Err(on_mismatch);
        }
        Ok(())
    }

    /// Admits a learner, computes its initial task template, opens a
    /// connection, and enqueues `ScheduleInitialTask` on the Scheduling Pool.
    /// Never blocks on remote reachability.
    pub async fn add_learner(
        &self,
        endpoint: ServerEntity,
        dataset_spec: DatasetSpec,
    ) -> Result<LearnerDescriptor, ControllerError> {
        Self::validate_endpoint(&endpoint, &dataset_spec)?;

        let id = LearnerId::generate(&endpoint.host, endpoint.port);
        let mut learners = self.shared.learners.lock().await;
        if learners.contains(&id) {
            return Err(ControllerError::AlreadyExists);
        }

        let auth_token = AuthToken::generate();
        let descriptor = LearnerDescriptor {
            id,
            auth_token,
            endpoint: endpoint.clone(),
            dataset_spec,
        };

        let batch_size = self.params.model_hyperparams.batch_size.max(1);
        let num_local_updates =
            self.params.model_hyperparams.epochs * (dataset_spec.num_training_examples / batch_size);
        let template = LearningTaskTemplate { num_local_updates };

        let connection: Arc<dyn LearnerClient> = self.connector.connect(&endpoint.host, endpoint.port);
        learners.insert_learner(descriptor.clone(), template, connection);
        drop(learners);

        let round_engine = Arc::clone(&self.round_engine);
        self.submit_to_pool(async move {
            round_engine.schedule_initial_task(id).await;
        })
        .await;

        Ok(descriptor)
    }

    /// Atomic removal of the learner, its task template, and its connection
    /// handle. In-flight RPCs to it are left to complete; their replies are
    /// discarded by the digest loops once it is no longer registered.
    pub async fn remove_learner(&self, id: LearnerId, token: AuthToken) -> Result<(), ControllerError> {
        self.validate_learner(&id, &token, ControllerError::Unauthenticated).await?;
        let mut learners = self.shared.learners.lock().await;
        learners.remove_learner(&id);
        Ok(())
    }

    /// The sole entry point for the inbound `LearnerCompletedTask` RPC.
    /// State mutation happens inside a Scheduling Pool job so the caller can
    /// acknowledge the RPC promptly.
    pub async fn learner_completed_task(
        &self,
        id: LearnerId,
        token: AuthToken,
        task: CompletedLearningTask,
    ) -> Result<(), ControllerError> {
        self.validate_learner(&id, &token, ControllerError::PermissionDenied).await?;

        let round_engine = Arc::clone(&self.round_engine);
        self.submit_to_pool(async move {
            round_engine.schedule_tasks(id, task).await;
        })
        .await;

        Ok(())
    }

    /// Seeds or replaces the community model. The cold-start precondition
    /// the round engine checks on first admission is satisfied once this has
    /// been called at least once. `global_iteration` is updated exclusively
    /// by the round engine, so a replacement preserves whatever value is
    /// already there.
    pub async fn replace_community_model(&self, model: Model) {
        let _guard = self.shared.community.lock().await;
        let mut learners = self.shared.learners.lock().await;
        let global_iteration = learners.community_model.global_iteration;
        learners.community_model = FederatedModel::seed(model);
        learners.community_model.global_iteration = global_iteration;
    }

    pub async fn community_model(&self) -> FederatedModel {
        let _guard = self.shared.community.lock().await;
        let learners = self.shared.learners.lock().await;
        learners.community_model.clone()
    }

    pub async fn get_learners(&self) -> Vec<LearnerDescriptor> {
        let learners = self.shared.learners.lock().await;
        learners.descriptors.values().cloned().collect()
    }

    pub async fn get_num_learners(&self) -> usize {
        let learners = self.shared.learners.lock().await;
        learners.descriptors.len()
    }

    /// Oldest-first, first `n` entries: preserves append order rather than
    /// a reversed "head" reading.
    pub async fn get_runtime_lineage(&self, n: usize) -> Vec<FederatedTaskRuntimeMetadata> {
        let learners = self.shared.learners.lock().await;
        learners.runtime_lineage.iter().take(n).cloned().collect()
    }

    pub async fn get_evaluation_lineage(&self, n: usize) -> Vec<CommunityModelEvaluation> {
        let learners = self.shared.learners.lock().await;
        learners.evaluation_lineage.iter().take(n).cloned().collect()
    }

    /// Newest-first, first `n` entries: the per-learner deque is already
    /// stored newest-first.
    pub async fn get_local_task_lineage(&self, id: LearnerId, n: usize) -> Vec<ExecutionMetadata> {
        let learners = self.shared.learners.lock().await;
        learners
            .local_task_lineage
            .get(&id)
            .map(|lineage| lineage.iter().take(n).copied().collect())
            .unwrap_or_default()
    }

    async fn submit_to_pool(&self, job: impl std::future::Future<Output = ()> + Send + 'static) {
        if let Some(pool) = self.pool.lock().await.as_ref() {
            pool.submit(job);
        }
    }

    /// Idempotent. Shuts down both dispatcher pipelines, then waits for
    /// every queued Scheduling Pool job to finish.
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
        if let Some(pool) = self.pool.lock().await.take() {
            pool.shutdown().await;
        }
    }
}
