use crate::common::{AuthToken, LearnerId};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// An opaque bag of model parameters.
///
/// The wire encoding of the contained tensors is out of scope here: the core
/// treats a model as an inert byte buffer and never inspects it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Model(pub Bytes);

impl Model {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The community model plus the bookkeeping fields the round engine stamps
/// onto it every time a new one is produced.
#[derive(Debug, Clone, Default)]
pub struct FederatedModel {
    pub model: Model,
    pub num_contributors: u32,
    pub global_iteration: u32,
    pub initialized: bool,
}

impl FederatedModel {
    pub fn seed(model: Model) -> Self {
        Self {
            model,
            num_contributors: 0,
            global_iteration: 0,
            initialized: true,
        }
    }
}

/// A learner's declared dataset sizes, validated on admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSpec {
    pub num_training_examples: u32,
    pub num_validation_examples: u32,
    pub num_test_examples: u32,
}

impl DatasetSpec {
    pub fn validate(&self) -> Result<(), String> {
        if self.num_training_examples == 0 {
            return Err("num_training_examples must be > 0".to_string());
        }
        Ok(())
    }
}

/// A learner's network location, as supplied to `add_learner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEntity {
    pub host: String,
    pub port: u16,
}

impl ServerEntity {
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("host must not be empty".to_string());
        }
        Ok(())
    }
}

/// The immutable, externally-visible identity of an admitted learner.
#[derive(Debug, Clone)]
pub struct LearnerDescriptor {
    pub id: LearnerId,
    pub auth_token: AuthToken,
    pub endpoint: ServerEntity,
    pub dataset_spec: DatasetSpec,
}

/// Per-learner knob recomputed under the semi-synchronous protocol.
#[derive(Debug, Clone, Copy)]
pub struct LearningTaskTemplate {
    pub num_local_updates: u32,
}

/// Metadata a learner reports alongside a completed local-training task.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionMetadata {
    pub global_iteration: u32,
    pub processing_ms_per_batch: f64,
    pub processing_ms_per_epoch: f64,
}

/// The payload of an inbound `learner_completed_task` call.
#[derive(Debug, Clone)]
pub struct CompletedLearningTask {
    pub model: Model,
    pub execution_metadata: ExecutionMetadata,
}

/// One row per round: which learners were assigned, which reported back,
/// and when the round opened/closed.
#[derive(Debug, Clone)]
pub struct FederatedTaskRuntimeMetadata {
    pub global_iteration: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub assigned_to_learner_id: Vec<LearnerId>,
    pub completed_by_learner_id: Vec<LearnerId>,
}

impl FederatedTaskRuntimeMetadata {
    pub fn new(global_iteration: u32, assigned_to_learner_id: Vec<LearnerId>) -> Self {
        Self {
            global_iteration,
            started_at: Utc::now(),
            completed_at: None,
            assigned_to_learner_id,
            completed_by_learner_id: Vec::new(),
        }
    }
}

/// The `{training, validation, test}` triple a learner reports back from an
/// `EvaluateModel` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationTriple {
    pub training: f64,
    pub validation: f64,
    pub test: f64,
}

/// One append-only row per round in which a new community model was formed.
#[derive(Debug, Clone)]
pub struct CommunityModelEvaluation {
    pub global_iteration: u32,
    pub evaluations: HashMap<LearnerId, EvaluationTriple>,
}

impl CommunityModelEvaluation {
    pub fn new(global_iteration: u32) -> Self {
        Self {
            global_iteration,
            evaluations: HashMap::new(),
        }
    }
}
