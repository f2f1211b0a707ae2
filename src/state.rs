use crate::{
    common::{AuthToken, LearnerId},
    dispatch::client::LearnerClient,
    model::{
        CommunityModelEvaluation, ExecutionMetadata, FederatedModel, FederatedTaskRuntimeMetadata,
        LearnerDescriptor, LearningTaskTemplate, Model,
    },
};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};
use tokio::sync::Mutex;

/// How many local-task metadata rows to retain per learner (newest-first).
/// The reference behavior keeps the whole history; capping it keeps memory
/// bounded without changing any externally observable semantics.
const LOCAL_TASK_HISTORY_CAP: usize = 64;

/// Everything the `learners` mutex guards: the registry, the per-learner
/// task template and connection-handle maps, the lineage vectors,
/// `global_iteration`, and, by deliberate simplification, the community
/// model itself.
pub struct LearnersState {
    pub global_iteration: u32,
    pub descriptors: HashMap<LearnerId, LearnerDescriptor>,
    pub task_templates: HashMap<LearnerId, LearningTaskTemplate>,
    pub connections: HashMap<LearnerId, Arc<dyn LearnerClient>>,
    pub latest_model: HashMap<LearnerId, Option<Model>>,
    pub local_task_lineage: HashMap<LearnerId, VecDeque<ExecutionMetadata>>,
    pub runtime_lineage: Vec<FederatedTaskRuntimeMetadata>,
    pub evaluation_lineage: Vec<CommunityModelEvaluation>,
    pub community_model: FederatedModel,
}

impl LearnersState {
    pub fn new() -> Self {
        Self {
            global_iteration: 0,
            descriptors: HashMap::new(),
            task_templates: HashMap::new(),
            connections: HashMap::new(),
            latest_model: HashMap::new(),
            local_task_lineage: HashMap::new(),
            runtime_lineage: Vec::new(),
            evaluation_lineage: Vec::new(),
            community_model: FederatedModel::default(),
        }
    }

    /// The three per-learner maps always share a key set.
    pub fn insert_learner(
        &mut self,
        descriptor: LearnerDescriptor,
        task_template: LearningTaskTemplate,
        connection: Arc<dyn LearnerClient>,
    ) {
        let id = descriptor.id;
        self.descriptors.insert(id, descriptor);
        self.task_templates.insert(id, task_template);
        self.connections.insert(id, connection);
        self.latest_model.insert(id, None);
        self.local_task_lineage.insert(id, VecDeque::new());
    }

    pub fn remove_learner(&mut self, id: &LearnerId) {
        self.descriptors.remove(id);
        self.task_templates.remove(id);
        self.connections.remove(id);
        self.latest_model.remove(id);
        self.local_task_lineage.remove(id);
    }

    pub fn contains(&self, id: &LearnerId) -> bool {
        self.descriptors.contains_key(id)
    }

    pub fn validate_token(&self, id: &LearnerId, token: &AuthToken) -> bool {
        self.descriptors
            .get(id)
            .map(|d| &d.auth_token == token)
            .unwrap_or(false)
    }

    pub fn all_ids(&self) -> Vec<LearnerId> {
        self.descriptors.keys().copied().collect()
    }

    /// Replaces the learner's stored model outright. History is
    /// single-element: each learner remembers only its latest local model.
    pub fn set_latest_model(&mut self, id: &LearnerId, model: Model) {
        if let Some(slot) = self.latest_model.get_mut(id) {
            *slot = Some(model);
        }
    }

    pub fn push_local_task(&mut self, id: &LearnerId, metadata: ExecutionMetadata) {
        if let Some(lineage) = self.local_task_lineage.get_mut(id) {
            lineage.push_front(metadata);
            lineage.truncate(LOCAL_TASK_HISTORY_CAP);
        }
    }

    pub fn connection(&self, id: &LearnerId) -> Option<Arc<dyn LearnerClient>> {
        self.connections.get(id).cloned()
    }

    pub fn latest_model(&self, id: &LearnerId) -> Option<Model> {
        self.latest_model.get(id).and_then(|m| m.clone())
    }

    pub fn task_template(&self, id: &LearnerId) -> Option<LearningTaskTemplate> {
        self.task_templates.get(id).copied()
    }

    pub fn set_task_template(&mut self, id: &LearnerId, template: LearningTaskTemplate) {
        if let Some(slot) = self.task_templates.get_mut(id) {
            *slot = template;
        }
    }
}

/// Top-level shared state: the `learners` lock plus the `community` lock
/// layered over the same community-model field for the public API path.
pub struct SharedState {
    pub learners: Mutex<LearnersState>,
    pub community: Mutex<()>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            learners: Mutex::new(LearnersState::new()),
            community: Mutex::new(()),
        }
    }
}
