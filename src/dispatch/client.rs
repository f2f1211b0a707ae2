use crate::model::{EvaluationTriple, FederatedModel};
use async_trait::async_trait;
use derive_more::Display;

/// Hyperparameters that accompany every `RunTask` dispatch.
#[derive(Debug, Clone, Copy)]
pub struct Hyperparameters {
    pub batch_size: u32,
    pub optimizer: Optimizer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Optimizer {
    Sgd,
    Adam,
}

/// The per-round training assignment sent to a learner.
#[derive(Debug, Clone, Copy)]
pub struct TaskSpec {
    pub global_iteration: u32,
    pub num_local_updates: u32,
    pub percent_validation: f32,
}

#[derive(Debug, Clone)]
pub struct RunTaskRequest {
    pub federated_model: FederatedModel,
    pub task: TaskSpec,
    pub hyperparameters: Hyperparameters,
}

/// Purely informational: the RunTask reply carries no state the round
/// engine acts on. Training completion is observed via the inbound
/// `learner_completed_task` call instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTaskResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationDataset {
    Training,
    Validation,
    Test,
}

#[derive(Debug, Clone)]
pub struct EvaluateModelRequest {
    pub model: FederatedModel,
    pub batch_size: u32,
    pub evaluation_datasets: [EvaluationDataset; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct EvaluateModelResponse {
    pub evaluations: EvaluationTriple,
}

/// A transport-level failure talking to a learner. Carries enough context
/// for the digest loops to log without touching any shared state.
#[derive(Debug, Display, Clone)]
#[display(fmt = "{}", message)]
pub struct TransportError {
    pub message: String,
}

impl ::std::error::Error for TransportError {}

/// The Controller's view of a connection to a single learner.
///
/// This is the abstraction boundary between the concurrency core and a
/// concrete transport (tarpc, gRPC, ...); implementing one is out of scope
/// here, so tests use an in-memory mock instead.
#[async_trait]
pub trait LearnerClient: Send + Sync {
    async fn run_task(&self, request: RunTaskRequest) -> Result<RunTaskResponse, TransportError>;

    async fn evaluate_model(
        &self,
        request: EvaluateModelRequest,
    ) -> Result<EvaluateModelResponse, TransportError>;
}

/// Builds a fresh [`LearnerClient`] connection for a newly admitted learner.
///
/// Opening the connection MUST never block admission on remote
/// reachability; a trivial implementation can simply store the endpoint and
/// defer any handshake to the first call.
pub trait LearnerClientFactory: Send + Sync {
    fn connect(&self, host: &str, port: u16) -> ::std::sync::Arc<dyn LearnerClient>;
}
